use crate::action::{Action, Invocation, MethodTable};
use crate::http::{Response, StatusCode, escape};

use super::{NO_ARGS, field_error, or_server_error, page};

/// Names listed on the character page. There is no storage behind the
/// sample, so this list never changes.
const ROSTER: &[&str] = &["Arthur", "Bedevere", "Galahad", "Lancelot", "Sir Robin"];

/// Character pages. Showing and listing are open to everyone; the rest needs
/// a logged-in user.
pub struct Character;

impl Character {
    fn get_list(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let items = roster_items(inv, ROSTER.iter().copied());
        page(inv, "Characters", &format!("<ul>{items}</ul>"))
    }

    fn get_search(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let query = inv.request().query_param("q").unwrap_or_default();
        let needle = query.to_lowercase();
        let hits = ROSTER
            .iter()
            .copied()
            .filter(|name| name.to_lowercase().contains(&needle));
        let items = roster_items(inv, hits);
        let content = format!(
            "<form><input name='q' value='{}'><button>Find</button></form><ul>{items}</ul>",
            escape(query)
        );
        page(inv, "Find a character", &content)
    }

    fn get_show(inv: &mut Invocation<'_>, args: &[String]) -> Response {
        let name = args.first().map(String::as_str).unwrap_or_default();
        page(inv, name, &format!("<p>{} has no biography yet.</p>", escape(name)))
    }

    fn get_create(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        page(inv, "New character", &character_form("", None))
    }

    fn post_create(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let form = inv.request().form();
        let name = form.get("name").map(|n| n.trim()).unwrap_or_default();

        if name.is_empty() {
            let html = character_form(name, Some("A character needs a name"));
            let mut response = page(inv, "New character", &html);
            response.set_status(StatusCode::UnprocessableEntity, false);
            return response;
        }

        inv.context_mut().flash(format!("Created {name}"), "flash");
        let result = inv.redirect_route("Character/show", &[name]);
        or_server_error(inv, result)
    }

    fn get_edit(inv: &mut Invocation<'_>, args: &[String]) -> Response {
        let name = args.first().map(String::as_str).unwrap_or_default();
        page(inv, &format!("Edit {name}"), &character_form(name, None))
    }

    fn get_delete(inv: &mut Invocation<'_>, args: &[String]) -> Response {
        let name = args.first().map(String::as_str).unwrap_or_default();
        let content = format!(
            "<form method='post'><p>Delete {}?</p><button>Delete</button></form>",
            escape(name)
        );
        page(inv, "Delete character", &content)
    }

    fn post_delete(inv: &mut Invocation<'_>, args: &[String]) -> Response {
        let name = args.first().map(String::as_str).unwrap_or_default();
        tracing::info!(character = name, "character deleted");
        inv.context_mut().flash(format!("Deleted {name}"), "flash");
        let result = inv.redirect_route("Character/list", NO_ARGS);
        or_server_error(inv, result)
    }
}

impl Action for Character {
    const NAME: &'static str = "Character";
    const ALLOW: &'static [&'static str] = &["show", "list"];

    fn methods(table: &mut MethodTable) {
        table
            .get("list", Self::get_list)
            .get("search", Self::get_search)
            .get("show", Self::get_show)
            .get("create", Self::get_create)
            .post("create", Self::post_create)
            .get("edit", Self::get_edit)
            .get("delete", Self::get_delete)
            .post("delete", Self::post_delete);
    }
}

fn roster_items<'n>(inv: &Invocation<'_>, names: impl Iterator<Item = &'n str>) -> String {
    names
        .map(|name| {
            let href = inv
                .url_for("Character/show", &[name])
                .unwrap_or_else(|_| "/".to_string());
            format!("<li><a href='{}'>{}</a></li>", escape(&href), escape(name))
        })
        .collect()
}

fn character_form(name: &str, error: Option<&str>) -> String {
    format!(
        "<form method='post'><input name='name' value='{}'>{}<button>Save</button></form>",
        escape(name),
        field_error(error),
    )
}
