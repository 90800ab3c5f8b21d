//! Application settings, loaded once at startup from a TOML file.
//!
//! Every key is optional. A file without `[[routes]]` gets the sample
//! application's route table.
//!
//! ```toml
//! debug = true
//! session = "ninaf_session"
//! request_timeout_secs = 30
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [[routes]]
//! pattern = "/"
//! target = ["Index", "index"]
//!
//! [[routes]]
//! pattern = "/c/show/(.+)"
//! target = ["Character", "show"]
//! policy = "public"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::route::{Policy, RouteError, RouteTable};

/// Errors produced while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid route table: {0}")]
    Route(#[from] RouteError),
}

/// Root settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Append request/route diagnostics to every response body.
    pub debug: bool,

    /// Name of the session cookie.
    pub session: String,

    /// Per-request deadline enforced by the server.
    pub request_timeout_secs: u64,

    pub server: ServerSettings,

    /// Route table, in priority order.
    pub routes: Vec<RouteSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            session: "ninaf_session".to_string(),
            request_timeout_secs: 30,
            server: ServerSettings::default(),
            routes: default_routes(),
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address, e.g. `"127.0.0.1:8080"`.
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

/// One `[[routes]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteSettings {
    pub pattern: String,
    /// `[class, method token]`.
    pub target: (String, String),
    #[serde(default)]
    pub policy: Option<PolicySetting>,
}

/// Access policies expressible in a settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicySetting {
    Public,
    Auth,
}

impl From<PolicySetting> for Policy {
    fn from(setting: PolicySetting) -> Self {
        match setting {
            PolicySetting::Public => Policy::Public,
            PolicySetting::Auth => Policy::RequiresAuth,
        }
    }
}

impl Settings {
    /// Reads and parses a settings file.
    ///
    /// # Errors
    ///
    /// [`SettingsError::Io`] if the file cannot be read, [`SettingsError::Parse`]
    /// if it is not valid settings TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Compiles the configured routes into a [`RouteTable`].
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] for a pattern that does not compile.
    pub fn route_table(&self) -> Result<RouteTable, RouteError> {
        let mut table = RouteTable::new();
        for route in &self.routes {
            let (class, method) = &route.target;
            match route.policy {
                Some(policy) => table.add_with_policy(&route.pattern, class, method, policy.into())?,
                None => table.add(&route.pattern, class, method)?,
            }
        }
        Ok(table)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The sample application's routes.
pub fn default_routes() -> Vec<RouteSettings> {
    [
        ("/", "Index", "index"),
        ("/about", "Index", "about"),
        ("/login", "Session", "login"),
        ("/logout", "Session", "logout"),
        ("/register", "User", "create"),
        ("/account", "User", "show"),
        ("/account/edit", "User", "edit"),
        ("/account/delete", "User", "delete"),
        ("/c/find", "Character", "search"),
        ("/c/list", "Character", "list"),
        ("/c/new/", "Character", "create"),
        ("/c/show/(.+)", "Character", "show"),
        ("/c/edit/(.+)", "Character", "edit"),
        ("/c/delete/(.+)", "Character", "delete"),
    ]
    .into_iter()
    .map(|(pattern, class, method)| RouteSettings {
        pattern: pattern.to_string(),
        target: (class.to_string(), method.to_string()),
        policy: None,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn empty_file_uses_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.session, "ninaf_session");
        assert_eq!(settings.server.bind, "127.0.0.1:8080");
        assert_eq!(settings.request_timeout(), Duration::from_secs(30));
        assert_eq!(settings.routes, default_routes());
    }

    #[test]
    fn default_table_compiles_in_order() {
        let table = Settings::default().route_table().unwrap();
        assert_eq!(table.len(), 14);
        assert_eq!(table.entries()[0].pattern().as_str(), "/");
        assert!(table.entries()[11].pattern().is_dynamic());
    }

    #[test]
    fn explicit_routes_replace_defaults() {
        let settings = Settings::from_toml(
            r#"
            debug = true
            session = "bfdb"
            request_timeout_secs = 5

            [server]
            bind = "0.0.0.0:9000"

            [[routes]]
            pattern = "/c/show/(.+)"
            target = ["Character", "show"]
            policy = "auth"

            [[routes]]
            pattern = "/"
            target = ["Index", "index"]
            policy = "public"
            "#,
        )
        .unwrap();

        assert!(settings.debug);
        assert_eq!(settings.session, "bfdb");
        assert_eq!(settings.server.bind, "0.0.0.0:9000");
        assert_eq!(settings.routes.len(), 2);

        let table = settings.route_table().unwrap();
        let show = &table.entries()[0];
        assert_eq!(show.class(), "Character");
        assert!(!show.policy().unwrap().grants(&Context::new(false), "show"));
        assert!(table.entries()[1].policy().unwrap().grants(&Context::new(false), "index"));
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let err = Settings::from_toml(
            r#"
            [[routes]]
            pattern = "/"
            target = ["Index", "index"]
            policy = "admins"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn bad_pattern_fails_table_build() {
        let settings = Settings::from_toml(
            r#"
            [[routes]]
            pattern = "/c/show/(.+"
            target = ["Character", "show"]
            "#,
        )
        .unwrap();
        assert!(matches!(
            settings.route_table(),
            Err(RouteError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Settings::load("/nonexistent/ninaf.toml").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }
}
