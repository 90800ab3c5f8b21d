use crate::action::{Action, Invocation, MethodTable};
use crate::http::{Response, StatusCode, escape};

use super::{NO_ARGS, field_error, or_server_error, page};

const MIN_PASSWORD_LEN: usize = 8;

/// Registration and the logged-in user's account pages.
pub struct User;

/// Per-field validation messages for the registration form.
#[derive(Debug, Default)]
struct RegistrationErrors {
    email: Option<&'static str>,
    password: Option<&'static str>,
    confirm: Option<&'static str>,
}

impl RegistrationErrors {
    fn check(email: &str, password: &str, confirm: &str) -> Self {
        let mut errors = Self::default();
        if !email.contains('@') {
            errors.email = Some("Invalid email address");
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            errors.password = Some("Password must be at least 8 characters");
        } else if password != confirm {
            errors.confirm = Some("Passwords must match!");
        }
        errors
    }

    fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.confirm.is_none()
    }
}

impl User {
    fn get_create(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let form = registration_form("", &RegistrationErrors::default());
        page(inv, "Register", &form)
    }

    fn post_create(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let form = inv.request().form();
        let field = |name: &str| form.get(name).map(String::as_str).unwrap_or_default();
        let email = field("email").trim();

        let errors = RegistrationErrors::check(email, field("password"), field("confirm"));
        if !errors.is_empty() {
            tracing::debug!(?errors, "registration rejected");
            let html = registration_form(email, &errors);
            let mut response = page(inv, "Register", &html);
            response.set_status(StatusCode::UnprocessableEntity, false);
            return response;
        }

        tracing::info!(user = email, "account created");
        inv.context_mut().login(email);
        inv.context_mut().flash("Account created!", "flash");
        let result = inv.redirect_route("User/show", NO_ARGS);
        or_server_error(inv, result)
    }

    fn get_show(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let user = inv.context().user().unwrap_or_default().to_owned();
        page(
            inv,
            "Account",
            &format!("<p>Signed in as <strong>{}</strong>.</p>", escape(&user)),
        )
    }

    fn get_edit(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        let user = inv.context().user().unwrap_or_default().to_owned();
        let form = registration_form(&user, &RegistrationErrors::default());
        page(inv, "Edit account", &form)
    }

    fn get_delete(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        page(
            inv,
            "Delete account",
            "<form method='post'><p>This cannot be undone.</p><button>Delete</button></form>",
        )
    }

    fn post_delete(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
        if let Some(user) = inv.context().user() {
            tracing::info!(user, "account deleted");
        }
        inv.context_mut().logout();
        inv.context_mut().flash("Account deleted", "flash");
        let result = inv.redirect_route("Index/index", NO_ARGS);
        or_server_error(inv, result)
    }
}

impl Action for User {
    const NAME: &'static str = "User";
    const ALLOW: &'static [&'static str] = &["create"];

    fn methods(table: &mut MethodTable) {
        table
            .get("create", Self::get_create)
            .post("create", Self::post_create)
            .get("show", Self::get_show)
            .get("edit", Self::get_edit)
            .get("delete", Self::get_delete)
            .post("delete", Self::post_delete);
    }
}

fn registration_form(email: &str, errors: &RegistrationErrors) -> String {
    format!(
        "<form method='post'>\
         <input type='email' name='email' value='{}'>{}\
         <input type='password' name='password'>{}\
         <input type='password' name='confirm'>{}\
         <button>Save</button></form>",
        escape(email),
        field_error(errors.email),
        field_error(errors.password),
        field_error(errors.confirm),
    )
}
