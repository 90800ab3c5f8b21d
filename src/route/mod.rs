//! Routes: the ordered route table and the resolved [`Route`] value.
//!
//! A route table maps URL patterns to an `(action class, action method)`
//! target. Patterns come in two shapes:
//!
//! | Pattern          | Match rule                                   | Args        |
//! |------------------|----------------------------------------------|-------------|
//! | `/about`         | exact string equality with the path          | *(none)*    |
//! | `/c/show/(.+)`   | literal prefix, then `^(?:pattern)$` regex   | `["42"]`    |
//!
//! A pattern is dynamic as soon as it contains a `(`; the text before the first
//! `(` is its literal prefix. Entries are tried in table order and the first
//! match wins.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::context::Context;

mod table;

pub use table::{Pattern, RouteEntry, RouteTable};

/// Errors raised while building a route table or looking routes up in reverse.
///
/// None of these are HTTP errors: they describe a misconfigured table or a
/// bad action reference, and are meant to stop startup.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("malformed action reference '{action}', expected 'Class/method'")]
    MalformedAction { action: String },

    #[error("URL for '{action}' could not be determined")]
    ReverseNotFound { action: String },

    #[error("route '{pattern}' targets unknown action '{class}'")]
    UnknownAction { pattern: String, class: String },

    #[error("route '{pattern}' targets '{class}/{method}', which has no handler for any verb")]
    MissingHandler {
        pattern: String,
        class: String,
        method: String,
    },
}

/// Per-route access policy, overriding the action type's own predicate.
#[derive(Clone)]
pub enum Policy {
    /// Anyone may call the route.
    Public,
    /// Only authenticated callers may call the route.
    RequiresAuth,
    /// Arbitrary predicate over the request context and the route method token.
    Custom(Arc<dyn Fn(&Context, &str) -> bool + Send + Sync>),
}

impl Policy {
    /// Wraps a closure as a [`Policy::Custom`].
    pub fn custom(predicate: impl Fn(&Context, &str) -> bool + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    /// Returns `true` when the caller described by `ctx` may invoke `method`.
    pub fn grants(&self, ctx: &Context, method: &str) -> bool {
        match self {
            Self::Public => true,
            Self::RequiresAuth => ctx.is_authenticated(),
            Self::Custom(predicate) => predicate(ctx, method),
        }
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str("Public"),
            Self::RequiresAuth => f.write_str("RequiresAuth"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A resolved route: the action class, the action method token and the
/// positional arguments captured from the path.
///
/// The default value is the unset route, returned when nothing matched.
#[derive(Debug, Clone, Default)]
pub struct Route {
    class: String,
    method: String,
    args: Vec<String>,
    policy: Option<Policy>,
}

impl Route {
    /// Creates an unset route.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills in the target and arguments.
    pub fn set(&mut self, class: impl Into<String>, method: impl Into<String>, args: Vec<String>) {
        self.class = class.into();
        self.method = method.into();
        self.args = args;
    }

    /// Attaches the matched entry's access policy.
    pub fn set_policy(&mut self, policy: Option<Policy>) {
        self.policy = policy;
    }

    /// Returns `true` once a target has been set.
    pub fn is_set(&self) -> bool {
        !self.class.is_empty()
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn policy(&self) -> Option<&Policy> {
        self.policy.as_ref()
    }
}
