//! Per-request context: the logged-in user, debug output and flash messages.
//!
//! A [`Context`] is built by the front controller for every request from the
//! caller's session, handed by `&mut` to the dispatcher and the action, and
//! written back to the session afterwards. Nothing in here is global: access
//! predicates and error formatting read the context they are given.

use crate::http::escape;

/// A flash message queued for display on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    /// CSS class of the wrapping element.
    pub class: String,
    pub message: String,
}

/// Request-scoped state shared between the dispatcher and the action.
#[derive(Debug, Default, Clone)]
pub struct Context {
    user: Option<String>,
    debug: bool,
    debug_messages: Vec<String>,
    flash: Vec<Flash>,
    session_ended: bool,
}

impl Context {
    /// Creates a context for an anonymous caller.
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    /// Creates a context for a caller logged in as `user`.
    pub fn authenticated(user: impl Into<String>, debug: bool) -> Self {
        Self {
            user: Some(user.into()),
            debug,
            ..Self::default()
        }
    }

    /// Returns `true` when the caller is logged in.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Returns the logged-in user, if any.
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn login(&mut self, user: impl Into<String>) {
        self.user = Some(user.into());
    }

    /// Logs the caller out and ends the session; the front controller
    /// discards the stored session and starts a new one if anything is left
    /// to carry (such as a flash message).
    pub fn logout(&mut self) {
        self.user = None;
        self.session_ended = true;
    }

    /// Returns `true` once [`logout`](Self::logout) was called during this request.
    pub fn session_ended(&self) -> bool {
        self.session_ended
    }

    /// Returns `true` when debug output is enabled for this request.
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Records a debug message, HTML-escaped. A no-op unless debug mode is on.
    pub fn debug(&mut self, message: impl AsRef<str>) {
        if self.debug {
            self.debug_messages.push(escape(message.as_ref()));
        }
    }

    /// Returns the recorded debug messages joined by `<br>`, or `None` if there are none.
    pub fn debug_output(&self) -> Option<String> {
        if self.debug_messages.is_empty() {
            None
        } else {
            Some(self.debug_messages.join("<br>"))
        }
    }

    /// Queues a flash message with the given CSS class.
    pub fn flash(&mut self, message: impl Into<String>, class: impl Into<String>) {
        self.flash.push(Flash {
            class: class.into(),
            message: message.into(),
        });
    }

    /// Returns the pending flash messages without consuming them.
    pub fn pending_flash(&self) -> &[Flash] {
        &self.flash
    }

    /// Replaces the pending flash messages, e.g. with those loaded from a session.
    pub fn restore_flash(&mut self, flash: Vec<Flash>) {
        self.flash = flash;
    }

    /// Drains the flash queue and renders it as `<div class='..'>..</div>` elements.
    pub fn take_flash(&mut self) -> String {
        self.flash
            .drain(..)
            .map(|f| format!("<div class='{}'>{}</div>", escape(&f.class), escape(&f.message)))
            .collect()
    }
}
