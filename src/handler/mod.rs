//! Route resolution and action dispatch.
//!
//! [`Handler`] owns the route table and the action registry. Per request it
//! first resolves the path to a [`Route`] with [`Handler::find_route`], then
//! turns that route into a [`Response`] with [`Handler::execute`]:
//!
//! | Outcome                                      | Status |
//! |----------------------------------------------|--------|
//! | no route matched                             | 404    |
//! | access predicate refused the caller          | 403    |
//! | verb not served, but other verbs are         | 405 + `Allowed` header |
//! | verb not served and nothing else is either   | 500    |
//! | handler found                                | whatever the action returns |
//!
//! Every branch is terminal. None of them propagates an error to the caller.

use tracing::{debug, error, warn};

use crate::action::{ActionRegistry, Invocation};
use crate::context::Context;
use crate::http::{Method, Request, Response, StatusCode};
use crate::route::{Route, RouteError, RouteTable};

/// Resolves requests to routes and dispatches routes to actions.
///
/// Immutable once built; a server shares one `Handler` across all connections.
///
/// # Examples
///
/// ```rust
/// use ninaf::action::{Action, ActionRegistry, MethodTable};
/// use ninaf::context::Context;
/// use ninaf::handler::Handler;
/// use ninaf::http::{Request, StatusCode};
/// use ninaf::route::RouteTable;
///
/// struct Character;
///
/// impl Action for Character {
///     const NAME: &'static str = "Character";
///
///     fn methods(table: &mut MethodTable) {
///         table.get("show", |inv, args| inv.render(format!("character {}", args[0])));
///     }
/// }
///
/// let mut routes = RouteTable::new();
/// routes.add("/c/show/(.+)", "Character", "show").unwrap();
/// let handler = Handler::new(routes, ActionRegistry::new().register::<Character>());
///
/// let request = Request::new("/c/show/42", "GET").unwrap();
/// let route = handler.find_route(&request);
/// assert_eq!(route.args(), ["42"]);
///
/// let response = handler.execute(&request, route, &mut Context::new(false));
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.body_str(), "character 42");
/// ```
#[derive(Debug, Clone)]
pub struct Handler {
    routes: RouteTable,
    actions: ActionRegistry,
}

impl Handler {
    pub fn new(routes: RouteTable, actions: ActionRegistry) -> Self {
        Self { routes, actions }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Matches the request path against the table, in table order.
    ///
    /// Returns the unset [`Route`] when nothing matches.
    pub fn find_route(&self, request: &Request) -> Route {
        let path = request.path();
        let mut found = Route::new();

        for entry in self.routes.entries() {
            if let Some(args) = entry.pattern().captures(path) {
                found.set(entry.class(), entry.method(), args);
                found.set_policy(entry.policy().cloned());
                break;
            }
        }

        found
    }

    /// Dispatches `route` for `request` and returns the response to send.
    ///
    /// The action handler registered for `<verb>` and the route's method token
    /// is invoked with the route's captured arguments. When no handler exists,
    /// the verbs that do have one are reported in a 405, or a 500 is returned
    /// if there are none.
    pub fn execute(&self, request: &Request, route: Route, context: &mut Context) -> Response {
        if !route.is_set() {
            let message = format!("No route for '{}'", request.path());
            warn!(path = %request.path(), method = %request.method(), "no route");
            context.debug(&message);
            return Response::new(StatusCode::NotFound);
        }

        let class = route.class();
        let method = route.method();

        let Some(action) = self.actions.get(class) else {
            let message = format!("Action '{class}' is not registered");
            error!(action = class, "route targets an unregistered action");
            context.debug(&message);
            return Response::new(StatusCode::InternalServerError);
        };

        let granted = match route.policy() {
            Some(policy) => policy.grants(context, method),
            None => action.grant_access(context, method),
        };
        if !granted {
            debug!(action = class, method, "access denied");
            context.debug(format!("Access to '{class}/{method}' denied"));
            return Response::new(StatusCode::Forbidden);
        }

        let Some(call) = action.methods().lookup(request.method(), method) else {
            let message = format!("'{class}::{}_{method}' not found", request.verb());
            let allowed = action.methods().allowed(method);
            context.debug(&message);

            if allowed.is_empty() {
                error!(action = class, method, verb = %request.method(), "no handler for any verb");
                return Response::new(StatusCode::InternalServerError);
            }

            warn!(action = class, method, verb = %request.method(), "verb not allowed");
            let mut response = Response::new(StatusCode::MethodNotAllowed);
            response.set_header("Allowed", format_allowed(&allowed));
            return response;
        };

        debug!(action = class, method, verb = %request.method(), "dispatching");
        let mut invocation = Invocation::new(request, context, &self.routes);
        call(&mut invocation, route.args())
    }

    /// Reverse lookup of an `"Class/method"` action reference.
    ///
    /// # Errors
    ///
    /// See [`RouteTable::find_url`].
    pub fn find_url<S: AsRef<str>>(&self, action: &str, args: &[S]) -> Result<String, RouteError> {
        self.routes.find_url(action, args)
    }

    /// The dispatchable verbs `class` serves for `method`, in reporting order.
    pub fn allowed_methods(&self, class: &str, method: &str) -> Vec<Method> {
        self.actions
            .get(class)
            .map(|action| action.methods().allowed(method))
            .unwrap_or_default()
    }

    /// Checks the wiring between the route table and the action registry.
    ///
    /// Run at startup so misconfigurations fail fast instead of surfacing as
    /// 500s. `reverse_targets` lists the `"Class/method"` references the
    /// application links to; each must resolve.
    ///
    /// # Errors
    ///
    /// - [`RouteError::UnknownAction`] — a route targets an unregistered class.
    /// - [`RouteError::MissingHandler`] — a route's method token has no handler for any verb.
    /// - [`RouteError::ReverseNotFound`] / [`RouteError::MalformedAction`] — a reverse target fails.
    pub fn validate(&self, reverse_targets: &[&str]) -> Result<(), RouteError> {
        for entry in self.routes.entries() {
            let pattern = entry.pattern().as_str();
            let action = self
                .actions
                .get(entry.class())
                .ok_or_else(|| RouteError::UnknownAction {
                    pattern: pattern.to_owned(),
                    class: entry.class().to_owned(),
                })?;

            if !action.methods().serves(entry.method()) {
                return Err(RouteError::MissingHandler {
                    pattern: pattern.to_owned(),
                    class: entry.class().to_owned(),
                    method: entry.method().to_owned(),
                });
            }
        }

        for target in reverse_targets {
            self.routes.find_url(target, &[] as &[&str])?;
        }

        Ok(())
    }
}

/// Uppercased verbs joined by `", "`, e.g. `GET, POST`.
fn format_allowed(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::action::{Action, MethodTable};
    use crate::route::Policy;

    static SECRET_CALLS: AtomicUsize = AtomicUsize::new(0);

    struct Session;

    impl Action for Session {
        const NAME: &'static str = "Session";

        fn methods(table: &mut MethodTable) {
            table
                .get("login", |inv, _| inv.render("login form"))
                .post("login", |inv, _| inv.redirect("/"));
        }
    }

    struct Character;

    impl Action for Character {
        const NAME: &'static str = "Character";
        const ALLOW: &'static [&'static str] = &["show"];

        fn methods(table: &mut MethodTable) {
            table
                .get("show", |inv, args| inv.render(args.join("|")))
                .get("secret", |inv, _| {
                    SECRET_CALLS.fetch_add(1, Ordering::SeqCst);
                    inv.render("secret")
                })
                .put("edit", |inv, _| inv.render("edited"));
        }
    }

    struct Orphan;

    impl Action for Orphan {
        const NAME: &'static str = "Orphan";

        fn methods(table: &mut MethodTable) {
            table.on(Method::Patch, "touch", |inv, _| inv.render("touched"));
        }
    }

    fn registry() -> ActionRegistry {
        ActionRegistry::new()
            .register::<Session>()
            .register::<Character>()
            .register::<Orphan>()
    }

    fn handler(entries: &[(&str, &str, &str)]) -> Handler {
        let mut routes = RouteTable::new();
        for (pattern, class, method) in entries {
            routes.add(pattern, class, method).unwrap();
        }
        Handler::new(routes, registry())
    }

    fn request(path: &str, verb: &str) -> Request {
        Request::new(path, verb).unwrap()
    }

    fn run(handler: &Handler, path: &str, verb: &str, ctx: &mut Context) -> Response {
        let req = request(path, verb);
        let route = handler.find_route(&req);
        handler.execute(&req, route, ctx)
    }

    // ── find_route ────────────────────────────────────────────────────────────

    #[test]
    fn static_route_matches_exactly() {
        let h = handler(&[("/login", "Session", "login")]);
        let route = h.find_route(&request("/login", "get"));
        assert!(route.is_set());
        assert_eq!(route.class(), "Session");
        assert_eq!(route.method(), "login");
        assert!(route.args().is_empty());

        assert!(!h.find_route(&request("/login/", "get")).is_set());
        assert!(!h.find_route(&request("/logins", "get")).is_set());
    }

    #[test]
    fn dynamic_route_captures_args() {
        let h = handler(&[("/c/show/(.+)", "Character", "show")]);
        let route = h.find_route(&request("/c/show/42", "get"));
        assert_eq!(route.args(), ["42"]);
    }

    #[test]
    fn dynamic_route_sees_decoded_path() {
        let h = handler(&[("/c/show/(.+)", "Character", "show")]);
        let route = h.find_route(&request("/c/show/Sir%20Robin", "get"));
        assert_eq!(route.args(), ["Sir Robin"]);
    }

    #[test]
    fn first_matching_entry_wins() {
        let h = handler(&[
            ("/c/(.+)", "Character", "show"),
            ("/c/show/(.+)", "Character", "edit"),
        ]);
        let route = h.find_route(&request("/c/show/1", "get"));
        assert_eq!(route.method(), "show");
        assert_eq!(route.args(), ["show/1"]);
    }

    #[test]
    fn no_match_is_unset() {
        let h = handler(&[("/login", "Session", "login")]);
        assert!(!h.find_route(&request("/nowhere", "get")).is_set());
    }

    #[test]
    fn matched_route_carries_policy() {
        let mut routes = RouteTable::new();
        routes
            .add_with_policy("/c/edit/(.+)", "Character", "edit", Policy::RequiresAuth)
            .unwrap();
        let h = Handler::new(routes, registry());
        let route = h.find_route(&request("/c/edit/3", "put"));
        assert!(matches!(route.policy(), Some(Policy::RequiresAuth)));
    }

    // ── execute ───────────────────────────────────────────────────────────────

    #[test]
    fn unset_route_is_404() {
        let h = handler(&[]);
        let mut ctx = Context::new(true);
        let res = h.execute(&request("/x", "get"), Route::new(), &mut ctx);
        assert_eq!(res.status(), StatusCode::NotFound);
        assert_eq!(ctx.debug_output().as_deref(), Some("No route for &#039;/x&#039;"));
    }

    #[test]
    fn get_login_dispatches() {
        let h = handler(&[("/login", "Session", "login")]);
        let res = run(&h, "/login", "get", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_str(), "login form");
    }

    #[test]
    fn delete_login_is_405_with_allowed_header() {
        let h = handler(&[("/login", "Session", "login")]);
        let res = run(&h, "/login", "delete", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert_eq!(res.headers().get("Allowed"), Some("GET, POST"));
    }

    #[test]
    fn non_dispatch_verb_is_405() {
        let h = handler(&[("/login", "Session", "login")]);
        let res = run(&h, "/login", "patch", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert_eq!(res.headers().get("allowed"), Some("GET, POST"));
    }

    #[test]
    fn no_verb_served_is_500() {
        let h = handler(&[("/touch", "Orphan", "touch")]);
        let res = run(&h, "/touch", "get", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert!(res.headers().get("Allowed").is_none());
    }

    #[test]
    fn unknown_token_is_500() {
        let h = handler(&[("/login", "Session", "nothing")]);
        let res = run(&h, "/login", "get", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::InternalServerError);
    }

    #[test]
    fn unregistered_class_is_500() {
        let h = handler(&[("/ghost", "Ghost", "boo")]);
        let res = run(&h, "/ghost", "get", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::InternalServerError);
    }

    #[test]
    fn denied_access_is_403_without_running_handler() {
        let h = handler(&[("/c/secret", "Character", "secret")]);
        let before = SECRET_CALLS.load(Ordering::SeqCst);

        let res = run(&h, "/c/secret", "get", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::Forbidden);
        assert_eq!(SECRET_CALLS.load(Ordering::SeqCst), before);

        let res = run(&h, "/c/secret", "get", &mut Context::authenticated("ada", false));
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(SECRET_CALLS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn access_is_checked_before_method_lookup() {
        // anonymous DELETE on a non-allowed token is refused, not reported as 405
        let h = handler(&[("/c/edit/(.+)", "Character", "edit")]);
        let res = run(&h, "/c/edit/1", "delete", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::Forbidden);
    }

    #[test]
    fn route_policy_overrides_action_predicate() {
        let mut routes = RouteTable::new();
        routes
            .add_with_policy("/c/edit/(.+)", "Character", "edit", Policy::Public)
            .unwrap();
        routes
            .add_with_policy("/c/show/(.+)", "Character", "show", Policy::RequiresAuth)
            .unwrap();
        let h = Handler::new(routes, registry());

        let res = run(&h, "/c/edit/1", "put", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::Ok);

        let res = run(&h, "/c/show/1", "get", &mut Context::new(false));
        assert_eq!(res.status(), StatusCode::Forbidden);
    }

    #[test]
    fn custom_policy_sees_context_and_token() {
        let mut routes = RouteTable::new();
        routes
            .add_with_policy(
                "/c/show/(.+)",
                "Character",
                "show",
                Policy::custom(|ctx, method| method == "show" && ctx.user() == Some("gm")),
            )
            .unwrap();
        let h = Handler::new(routes, registry());

        let res = run(&h, "/c/show/1", "get", &mut Context::authenticated("ada", false));
        assert_eq!(res.status(), StatusCode::Forbidden);
        let res = run(&h, "/c/show/1", "get", &mut Context::authenticated("gm", false));
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[test]
    fn args_are_passed_positionally() {
        let h = handler(&[("/c/([a-z]+)/([0-9]+)", "Character", "show")]);
        let res = run(&h, "/c/abc/12", "get", &mut Context::new(false));
        assert_eq!(res.body_str(), "abc|12");
    }

    // ── find_url / allowed_methods / validate ─────────────────────────────────

    #[test]
    fn find_url_reverse_lookup() {
        let h = handler(&[("/c/show/(.+)", "Character", "show")]);
        assert_eq!(h.find_url("Character/show", &["42"]).unwrap(), "/c/show/42");
        assert!(matches!(
            h.find_url("Character/edit", &["42"]),
            Err(RouteError::ReverseNotFound { .. })
        ));
    }

    #[test]
    fn allowed_methods_by_class() {
        let h = handler(&[]);
        assert_eq!(h.allowed_methods("Session", "login"), vec![Method::Get, Method::Post]);
        assert!(h.allowed_methods("Ghost", "login").is_empty());
    }

    #[test]
    fn validate_accepts_consistent_wiring() {
        let h = handler(&[
            ("/login", "Session", "login"),
            ("/c/show/(.+)", "Character", "show"),
            ("/touch", "Orphan", "touch"),
        ]);
        assert!(h.validate(&["Session/login", "Character/show"]).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_action() {
        let h = handler(&[("/ghost", "Ghost", "boo")]);
        assert!(matches!(
            h.validate(&[]),
            Err(RouteError::UnknownAction { class, .. }) if class == "Ghost"
        ));
    }

    #[test]
    fn validate_rejects_missing_handler() {
        let h = handler(&[("/login", "Session", "logout")]);
        assert!(matches!(
            h.validate(&[]),
            Err(RouteError::MissingHandler { method, .. }) if method == "logout"
        ));
    }

    #[test]
    fn validate_rejects_unresolvable_reverse_target() {
        let h = handler(&[("/login", "Session", "login")]);
        assert!(matches!(
            h.validate(&["Session/logout"]),
            Err(RouteError::ReverseNotFound { .. })
        ));
    }
}
