//! The front controller.
//!
//! [`App`] ties a [`Handler`] to the session store and the settings. For every
//! request it loads the caller's session, resolves and executes the route,
//! writes the session back and decorates the response with debug output and
//! the session cookie.

use tracing::{debug, info};

use crate::action::ActionRegistry;
use crate::context::Context;
use crate::handler::Handler;
use crate::http::{Request, Response, escape};
use crate::route::{Route, RouteError};
use crate::session::SessionStore;
use crate::settings::Settings;

/// A fully wired application, shared by every connection.
#[derive(Debug)]
pub struct App {
    handler: Handler,
    sessions: SessionStore,
    settings: Settings,
    reverse_targets: Vec<String>,
}

impl App {
    /// Builds the application from settings and the registered actions.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when a configured route does not compile.
    pub fn new(settings: Settings, actions: ActionRegistry) -> Result<Self, RouteError> {
        let routes = settings.route_table()?;
        info!(routes = routes.len(), actions = actions.len(), "application built");
        Ok(Self {
            handler: Handler::new(routes, actions),
            sessions: SessionStore::new(),
            settings,
            reverse_targets: Vec::new(),
        })
    }

    /// Action references that [`App::validate`] must be able to resolve.
    #[must_use]
    pub fn with_reverse_targets(mut self, targets: &[&str]) -> Self {
        self.reverse_targets = targets.iter().map(|t| (*t).to_owned()).collect();
        self
    }

    /// Checks the route table against the registry and the reverse targets.
    ///
    /// # Errors
    ///
    /// See [`Handler::validate`].
    pub fn validate(&self) -> Result<(), RouteError> {
        let targets: Vec<&str> = self.reverse_targets.iter().map(String::as_str).collect();
        self.handler.validate(&targets)
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handles one request end to end.
    pub fn handle(&self, request: Request) -> Response {
        let cookie_name = self.settings.session.as_str();
        let mut session = self.sessions.load(request.cookie(cookie_name));

        let mut context = match session.data.user.take() {
            Some(user) => Context::authenticated(user, self.settings.debug),
            None => Context::new(self.settings.debug),
        };
        context.restore_flash(std::mem::take(&mut session.data.flash));

        let route = self.handler.find_route(&request);
        let summary = self.settings.debug.then(|| route.clone());
        let mut response = self.handler.execute(&request, route, &mut context);

        if context.session_ended() {
            if self.sessions.destroy(&session.id) {
                debug!(session = %session.id, "session destroyed");
            }
            session = SessionStore::fresh();
        }
        session.data.user = context.user().map(str::to_owned);
        session.data.flash = context.pending_flash().to_vec();
        let persisted = !session.data.is_empty();
        if persisted {
            self.sessions.save(&session.id, session.data);
        } else if !session.created {
            self.sessions.destroy(&session.id);
        }

        if let Some(route) = summary {
            let info = debug_info(&request, &route, &context);
            response.add_to_body(&info, "\n");
        }

        if session.created && persisted {
            debug!(session = %session.id, "issuing session cookie");
            response.add_header(
                "Set-Cookie",
                format!("{cookie_name}={}; Path=/; HttpOnly", session.id),
            );
        }

        response
    }
}

/// Renders the request and route summary appended in debug mode.
fn debug_info(request: &Request, route: &Route, context: &Context) -> String {
    let target = if route.is_set() {
        format!("{}::{}", route.class(), route.method())
    } else {
        "none".to_owned()
    };
    let mut lines = vec![
        format!("Path: {}", escape(request.path())),
        format!("Method: {}", request.verb()),
        format!("Route: {}", escape(&target)),
        format!("Args: {}", escape(&route.args().join(", "))),
    ];
    lines.extend(context.debug_output());
    format!("<div class='debug'>{}</div>", lines.join("<br>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{self, REVERSE_TARGETS};
    use crate::http::StatusCode;

    fn app(debug: bool) -> App {
        let settings = Settings {
            debug,
            ..Settings::default()
        };
        App::new(settings, actions::registry())
            .unwrap()
            .with_reverse_targets(REVERSE_TARGETS)
    }

    fn session_cookie(response: &Response) -> String {
        let header = response.headers().get("set-cookie").unwrap();
        let pair = header.split(';').next().unwrap();
        pair.to_owned()
    }

    #[test]
    fn default_app_validates() {
        app(false).validate().unwrap();
    }

    #[test]
    fn missing_reverse_target_fails_validation() {
        let app = app(false).with_reverse_targets(&["Character/forge"]);
        assert!(matches!(
            app.validate(),
            Err(RouteError::ReverseNotFound { .. })
        ));
    }

    #[test]
    fn anonymous_requests_store_nothing() {
        let app = app(false);
        for _ in 0..1000 {
            let res = app.handle(Request::new("/", "GET").unwrap());
            assert_eq!(res.status(), StatusCode::Ok);
            assert!(res.headers().get("set-cookie").is_none());
        }
        assert!(app.sessions().is_empty());
    }

    #[test]
    fn login_sets_cookie() {
        let app = app(false);
        let res = app.handle(
            Request::new("/login", "POST")
                .unwrap()
                .with_body("email=ada%40example.org"),
        );
        let cookie = session_cookie(&res);
        assert!(cookie.starts_with("ninaf_session="));
        assert!(res.headers().get("set-cookie").unwrap().ends_with("Path=/; HttpOnly"));
        assert_eq!(app.sessions().len(), 1);
    }

    #[test]
    fn login_survives_across_requests() {
        let app = app(false);
        let res = app.handle(
            Request::new("/login", "POST")
                .unwrap()
                .with_body("email=ada%40example.org"),
        );
        assert_eq!(res.status(), StatusCode::SeeOther);
        let cookie = session_cookie(&res);

        let res = app.handle(
            Request::new("/account", "GET")
                .unwrap()
                .with_header("Cookie", cookie.clone()),
        );
        assert_eq!(res.status(), StatusCode::Ok);
        assert!(res.body_str().contains("ada@example.org"));
        assert!(res.body_str().contains("<div class='flash'>Logged in</div>"));
        assert!(res.headers().get("set-cookie").is_none());

        // The flash is shown once.
        let res = app.handle(
            Request::new("/account", "GET")
                .unwrap()
                .with_header("Cookie", cookie),
        );
        assert!(!res.body_str().contains("Logged in</div>"));
    }

    #[test]
    fn unknown_cookie_is_not_stored() {
        let app = app(false);
        let res = app.handle(
            Request::new("/account", "GET")
                .unwrap()
                .with_header("Cookie", "ninaf_session=forged"),
        );
        assert_eq!(res.status(), StatusCode::Forbidden);
        assert!(res.headers().get("set-cookie").is_none());
        assert!(app.sessions().is_empty());
    }

    fn logged_in(app: &App) -> String {
        let res = app.handle(
            Request::new("/login", "POST")
                .unwrap()
                .with_body("email=ada%40example.org"),
        );
        session_cookie(&res)
    }

    fn session_id(cookie: &str) -> &str {
        cookie.split_once('=').unwrap().1
    }

    #[test]
    fn logout_destroys_session() {
        let app = app(false);
        let cookie = logged_in(&app);

        let res = app.handle(
            Request::new("/logout", "GET")
                .unwrap()
                .with_header("Cookie", cookie.clone()),
        );
        assert_eq!(res.status(), StatusCode::SeeOther);
        assert!(!app.sessions().contains(session_id(&cookie)));

        // The "Logged out" flash travels in a new session, shown once and then dropped.
        let next = session_cookie(&res);
        assert_ne!(next, cookie);
        let res = app.handle(Request::new("/", "GET").unwrap().with_header("Cookie", next));
        assert!(res.body_str().contains("<div class='flash'>Logged out</div>"));
        assert!(app.sessions().is_empty());

        let res = app.handle(
            Request::new("/account", "GET")
                .unwrap()
                .with_header("Cookie", cookie),
        );
        assert_eq!(res.status(), StatusCode::Forbidden);
    }

    #[test]
    fn account_delete_destroys_session() {
        let app = app(false);
        let cookie = logged_in(&app);

        let res = app.handle(
            Request::new("/account/delete", "POST")
                .unwrap()
                .with_header("Cookie", cookie.clone()),
        );
        assert_eq!(res.status(), StatusCode::SeeOther);
        assert!(!app.sessions().contains(session_id(&cookie)));
        assert_eq!(app.sessions().len(), 1);
    }

    #[test]
    fn debug_mode_appends_route_summary() {
        let res = app(true).handle(Request::new("/c/show/42", "GET").unwrap());
        let body = res.body_str();
        assert!(body.contains("Path: /c/show/42"));
        assert!(body.contains("Method: get"));
        assert!(body.contains("Route: Character::show"));
        assert!(body.contains("Args: 42"));
    }

    #[test]
    fn debug_mode_reports_missing_route() {
        let res = app(true).handle(Request::new("/nowhere", "GET").unwrap());
        assert_eq!(res.status(), StatusCode::NotFound);
        assert!(res.body_str().contains("Route: none"));
        assert!(res.body_str().contains("No route for &#039;/nowhere&#039;"));
    }

    #[test]
    fn debug_output_is_off_by_default() {
        let res = app(false).handle(Request::new("/nowhere", "GET").unwrap());
        assert!(!res.body_str().contains("class='debug'"));
    }
}
