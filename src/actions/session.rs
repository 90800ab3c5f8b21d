use crate::action::{Action, Invocation, MethodTable};
use crate::http::{Response, StatusCode, escape};

use super::{NO_ARGS, field_error, or_server_error, page};

/// Login and logout.
pub struct Session;

impl Session {
    fn get_login(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let form = login_form("", None);
        page(inv, "Log in", &form)
    }

    fn post_login(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let form = inv.request().form();
        let email = form.get("email").map(|e| e.trim()).unwrap_or_default();

        if email.is_empty() {
            let html = login_form(email, Some("Email address is required"));
            let mut response = page(inv, "Log in", &html);
            response.set_status(StatusCode::UnprocessableEntity, false);
            return response;
        }

        tracing::info!(user = email, "login");
        inv.context_mut().login(email);
        inv.context_mut().flash("Logged in", "flash");
        let result = inv.redirect_route("User/show", NO_ARGS);
        or_server_error(inv, result)
    }

    fn get_logout(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        inv.context_mut().logout();
        inv.context_mut().flash("Logged out", "flash");
        let result = inv.redirect_route("Index/index", NO_ARGS);
        or_server_error(inv, result)
    }
}

impl Action for Session {
    const NAME: &'static str = "Session";

    fn methods(table: &mut MethodTable) {
        table
            .get("login", Self::get_login)
            .post("login", Self::post_login)
            .get("logout", Self::get_logout);
    }
}

fn login_form(email: &str, error: Option<&str>) -> String {
    format!(
        "<form method='post'>\
         <input type='email' name='email' value='{}'>{}\
         <input type='password' name='password'>\
         <button>Log in</button></form>",
        escape(email),
        field_error(error),
    )
}
