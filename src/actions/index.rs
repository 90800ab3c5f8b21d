use crate::action::{Action, Invocation, MethodTable};
use crate::http::Response;

use super::page;

/// Front page and about page.
pub struct Index;

impl Index {
    fn get_index(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let list = inv
            .url_for("Character/list", super::NO_ARGS)
            .unwrap_or_else(|_| "/".to_string());
        page(
            inv,
            "Characters",
            &format!("<p>Browse the <a href='{list}'>character list</a>.</p>"),
        )
    }

    fn get_about(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        page(
            inv,
            "About",
            "<p>NINAF Is Not A Framework: routes, actions and a login gate.</p>",
        )
    }
}

impl Action for Index {
    const NAME: &'static str = "Index";

    fn methods(table: &mut MethodTable) {
        table.get("index", Self::get_index).get("about", Self::get_about);
    }
}
