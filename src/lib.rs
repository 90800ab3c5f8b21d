//! # ninaf
//!
//! NINAF Is Not A Framework: regex routing, verb-aware action dispatch and a
//! session-backed access gate, served by a small async HTTP/1.1 server.
//!
//! A request flows through these pieces:
//!
//! 1. [`server`] reads it off the socket and hands it to the [`app::App`].
//! 2. The app loads the caller's session into a [`context::Context`].
//! 3. [`handler::Handler::find_route`] resolves the path against the
//!    [`route::RouteTable`].
//! 4. [`handler::Handler::execute`] checks access, picks the handler for the
//!    request verb from the action's [`action::MethodTable`] and runs it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use ninaf::{actions, App, Server, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load("ninaf.toml")?;
//!     let server = Server::bind(&settings.server.bind).await?;
//!     let app = App::new(settings, actions::registry())?
//!         .with_reverse_targets(actions::REVERSE_TARGETS);
//!     app.validate()?;
//!     server.serve(Arc::new(app)).await?;
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod actions;
pub mod app;
pub mod context;
pub mod handler;
pub mod http;
pub mod route;
pub mod server;
pub mod session;
pub mod settings;

pub use action::{Action, ActionRegistry, Invocation, MethodTable};
pub use app::App;
pub use context::Context;
pub use handler::Handler;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use route::{Policy, Route, RouteError, RouteTable};
pub use server::{Server, ServerError};
pub use settings::{Settings, SettingsError};
