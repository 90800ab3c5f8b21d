//! Actions: groups of verb-dispatched handlers for one resource.
//!
//! An action type implements [`Action`]: it names itself, declares the
//! `(verb, method token)` pairs it serves in a [`MethodTable`], and decides
//! who may call which token through [`Action::grant_access`]. Types are
//! collected into an [`ActionRegistry`] at startup; the dispatcher looks
//! handlers up there instead of probing for method names at runtime.
//!
//! ```rust
//! use ninaf::action::{Action, Invocation, MethodTable};
//! use ninaf::http::Response;
//!
//! struct Session;
//!
//! impl Session {
//!     fn get_login(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
//!         inv.render("<form method='post'>…</form>")
//!     }
//!
//!     fn post_login(inv: &mut Invocation<'_>, _args: &[String]) -> Response {
//!         inv.context_mut().login("ada@example.org");
//!         inv.redirect("/")
//!     }
//! }
//!
//! impl Action for Session {
//!     const NAME: &'static str = "Session";
//!
//!     fn methods(table: &mut MethodTable) {
//!         table.get("login", Self::get_login).post("login", Self::post_login);
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::http::{DISPATCH_METHODS, Method, Request, Response, StatusCode};
use crate::route::{RouteError, RouteTable};

/// A type-erased action handler.
///
/// Receives the per-request [`Invocation`] and the positional arguments
/// captured from the path, and returns the response to send.
pub type ActionMethod =
    Arc<dyn Fn(&mut Invocation<'_>, &[String]) -> Response + Send + Sync + 'static>;

/// Default access predicate shared by every action type.
///
/// For anonymous callers: a non-empty `allow` list denies every token not in
/// it, and a non-empty `deny` list denies every token in it. The two guards are
/// evaluated independently, so a token can be refused by either one.
/// Authenticated callers pass both.
pub fn default_access(allow: &[&str], deny: &[&str], ctx: &Context, method: &str) -> bool {
    if !allow.is_empty() && !allow.contains(&method) && !ctx.is_authenticated() {
        return false;
    }
    if !deny.is_empty() && deny.contains(&method) && !ctx.is_authenticated() {
        return false;
    }
    true
}

/// A resource whose handlers are dispatched by HTTP verb and method token.
pub trait Action: 'static {
    /// Class name used in route targets, e.g. `"Character"`.
    const NAME: &'static str;

    /// Tokens anonymous callers may use. Empty means no allow-list.
    const ALLOW: &'static [&'static str] = &[];

    /// Tokens anonymous callers may not use. Empty means no deny-list.
    const DENY: &'static [&'static str] = &[];

    /// Declares the handlers this action serves.
    fn methods(table: &mut MethodTable);

    /// Decides whether the caller may invoke `method`.
    ///
    /// Override to add stronger checks (role gates and the like); fall back to
    /// [`default_access`] when no extra policy applies.
    fn grant_access(ctx: &Context, method: &str) -> bool {
        default_access(Self::ALLOW, Self::DENY, ctx, method)
    }
}

/// The `(verb, method token) → handler` table of one action type.
#[derive(Clone, Default)]
pub struct MethodTable {
    handlers: HashMap<(Method, String), ActionMethod>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` requests routed to `token`.
    ///
    /// A second registration for the same pair replaces the first.
    pub fn on<F>(&mut self, method: Method, token: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Invocation<'_>, &[String]) -> Response + Send + Sync + 'static,
    {
        let handler: ActionMethod = Arc::new(handler);
        self.handlers.insert((method, token.to_owned()), handler);
        self
    }

    pub fn get<F>(&mut self, token: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Invocation<'_>, &[String]) -> Response + Send + Sync + 'static,
    {
        self.on(Method::Get, token, handler)
    }

    pub fn post<F>(&mut self, token: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Invocation<'_>, &[String]) -> Response + Send + Sync + 'static,
    {
        self.on(Method::Post, token, handler)
    }

    pub fn put<F>(&mut self, token: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Invocation<'_>, &[String]) -> Response + Send + Sync + 'static,
    {
        self.on(Method::Put, token, handler)
    }

    pub fn delete<F>(&mut self, token: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut Invocation<'_>, &[String]) -> Response + Send + Sync + 'static,
    {
        self.on(Method::Delete, token, handler)
    }

    /// Finds the handler for a verb and token.
    pub fn lookup(&self, method: &Method, token: &str) -> Option<&ActionMethod> {
        self.handlers.get(&(method.clone(), token.to_owned()))
    }

    /// Returns the dispatchable verbs (GET, POST, PUT, DELETE, in that order)
    /// that have a handler for `token`.
    pub fn allowed(&self, token: &str) -> Vec<Method> {
        DISPATCH_METHODS
            .into_iter()
            .filter(|method| self.lookup(method, token).is_some())
            .collect()
    }

    /// Returns `true` if any verb has a handler for `token`.
    pub fn serves(&self, token: &str) -> bool {
        self.handlers.keys().any(|(_, t)| t == token)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .map(|(method, token)| format!("{}_{token}", method.to_lowercase()))
            .collect();
        names.sort();
        f.debug_struct("MethodTable").field("handlers", &names).finish()
    }
}

/// A registered action type: its handlers and its access predicate.
#[derive(Clone)]
pub struct RegisteredAction {
    methods: MethodTable,
    grant: fn(&Context, &str) -> bool,
}

impl fmt::Debug for RegisteredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredAction")
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl RegisteredAction {
    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }

    pub fn grant_access(&self, ctx: &Context, method: &str) -> bool {
        (self.grant)(ctx, method)
    }
}

/// All action types known to the application, by class name.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, RegisteredAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers action type `A` under [`Action::NAME`]. Returns `self` for chaining.
    #[must_use]
    pub fn register<A: Action>(mut self) -> Self {
        let mut methods = MethodTable::new();
        A::methods(&mut methods);
        tracing::debug!(action = A::NAME, handlers = methods.len(), "action registered");
        self.actions.insert(
            A::NAME.to_owned(),
            RegisteredAction {
                methods,
                grant: A::grant_access,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredAction> {
        self.actions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// One action invocation: what a handler sees of the current request.
///
/// Holds the request, the mutable request context, the route table for
/// building links, and a fresh [`Response`] the handler can fill in.
pub struct Invocation<'a> {
    request: &'a Request,
    context: &'a mut Context,
    routes: &'a RouteTable,
    response: Response,
}

impl<'a> Invocation<'a> {
    pub fn new(request: &'a Request, context: &'a mut Context, routes: &'a RouteTable) -> Self {
        Self {
            request,
            context,
            routes,
            response: Response::default(),
        }
    }

    pub fn request(&self) -> &'a Request {
        self.request
    }

    pub fn context(&self) -> &Context {
        &*self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut *self.context
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Hands over the response built so far, leaving a fresh one behind.
    pub fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    /// Sets the body and returns the response.
    pub fn render(&mut self, body: impl Into<String>) -> Response {
        self.response.set_body(body);
        self.take_response()
    }

    /// Returns a `303 See Other` redirect to `url`.
    pub fn redirect(&mut self, url: impl Into<String>) -> Response {
        self.response.redirect(url, StatusCode::SeeOther);
        self.take_response()
    }

    /// Builds the URL for an `"Class/method"` action reference.
    pub fn url_for<S: AsRef<str>>(&self, action: &str, args: &[S]) -> Result<String, RouteError> {
        self.routes.find_url(action, args)
    }

    /// Redirects to the URL of an `"Class/method"` action reference.
    pub fn redirect_route<S: AsRef<str>>(
        &mut self,
        action: &str,
        args: &[S],
    ) -> Result<Response, RouteError> {
        let url = self.url_for(action, args)?;
        Ok(self.redirect(url))
    }
}
