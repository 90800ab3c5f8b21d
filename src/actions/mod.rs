//! The sample application: a small character database front end.
//!
//! There is no storage behind it; the actions show how routes, verbs, the
//! access gate, sessions and reverse routing fit together.

use crate::action::{ActionRegistry, Invocation};
use crate::http::{Response, StatusCode, escape};
use crate::route::RouteError;

mod character;
mod index;
mod session;
mod user;

pub use character::Character;
pub use index::Index;
pub use session::Session;
pub use user::User;

/// Action references the sample pages link or redirect to.
///
/// Checked by [`Handler::validate`](crate::handler::Handler::validate) at startup.
pub const REVERSE_TARGETS: &[&str] = &[
    "Index/index",
    "Session/login",
    "Session/logout",
    "User/create",
    "User/show",
    "Character/list",
    "Character/show",
];

const NO_ARGS: &[&str] = &[];

/// Registers every sample action type.
pub fn registry() -> ActionRegistry {
    ActionRegistry::new()
        .register::<Index>()
        .register::<Session>()
        .register::<User>()
        .register::<Character>()
}

/// Wraps `content` in the site layout and renders it into the response.
fn page(inv: &mut Invocation<'_>, title: &str, content: &str) -> Response {
    let flash = inv.context_mut().take_flash();
    let account = match inv.context().user() {
        Some(user) => format!(
            "{} | <a href='{}'>Log out</a>",
            escape(user),
            link(inv, "Session/logout")
        ),
        None => format!("<a href='{}'>Log in</a>", link(inv, "Session/login")),
    };
    let home = link(inv, "Index/index");
    inv.render(format!(
        "<!DOCTYPE html>\n<html><head><title>{title}</title></head><body>\
         <nav><a href='{home}'>Home</a> | {account}</nav>{flash}\
         <h1>{title}</h1>{content}</body></html>",
        title = escape(title),
    ))
}

/// URL of a static route; targets are validated at startup, so a miss falls back to `/`.
fn link(inv: &Invocation<'_>, action: &str) -> String {
    inv.url_for(action, NO_ARGS).unwrap_or_else(|_| "/".to_string())
}

/// Turns a failed reverse lookup into a 500.
fn or_server_error(inv: &mut Invocation<'_>, result: Result<Response, RouteError>) -> Response {
    result.unwrap_or_else(|e| {
        tracing::error!(error = %e, "reverse route failed");
        inv.context_mut().debug(e.to_string());
        inv.response_mut()
            .set_status(StatusCode::InternalServerError, true);
        inv.take_response()
    })
}

/// Renders a form error message next to a field.
fn field_error(message: Option<&str>) -> String {
    message
        .map(|m| format!(" <span class='form-error msg'>{}</span>", escape(m)))
        .unwrap_or_default()
}
