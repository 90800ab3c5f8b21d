use regex::Regex;

use super::{Policy, RouteError};

/// Compiled form of a route pattern.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// No `(` in the pattern: matched by exact equality.
    Static(String),
    /// Contains a capture group: literal prefix check, then an anchored regex.
    Dynamic {
        source: String,
        prefix: String,
        regex: Regex,
    },
}

impl Pattern {
    /// Compiles a route pattern.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when a dynamic pattern is not a valid regex.
    pub fn parse(pattern: &str) -> Result<Self, RouteError> {
        let Some(pos) = pattern.find('(') else {
            return Ok(Self::Static(pattern.to_owned()));
        };

        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            RouteError::InvalidPattern {
                pattern: pattern.to_owned(),
                source,
            }
        })?;

        Ok(Self::Dynamic {
            source: pattern.to_owned(),
            prefix: pattern[..pos].to_owned(),
            regex,
        })
    }

    /// Returns the pattern as written in the table.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Static(s) => s,
            Self::Dynamic { source, .. } => source,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    /// Matches `path`, returning the captured arguments on success.
    ///
    /// Static patterns capture nothing. For dynamic ones, capture groups are
    /// returned in order; a group that did not participate yields `""`.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        match self {
            Self::Static(s) => (s == path).then(Vec::new),
            Self::Dynamic { prefix, regex, .. } => {
                // literal prefix first
                if !path.starts_with(prefix.as_str()) {
                    return None;
                }
                let caps = regex.captures(path)?;
                Some(
                    caps.iter()
                        .skip(1)
                        .map(|m| m.map_or_else(String::new, |m| m.as_str().to_owned()))
                        .collect(),
                )
            }
        }
    }
}

/// One row of the route table.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pattern: Pattern,
    class: String,
    method: String,
    policy: Option<Policy>,
}

impl RouteEntry {
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Action class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Action method token.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn policy(&self) -> Option<&Policy> {
        self.policy.as_ref()
    }

    fn targets(&self, class: &str, method: &str) -> bool {
        self.class == class && self.method == method
    }
}

/// The ordered route table. Read-only once built; share it behind an `Arc`.
///
/// # Examples
///
/// ```
/// use ninaf::route::RouteTable;
///
/// let mut table = RouteTable::new();
/// table.add("/", "Index", "index").unwrap();
/// table.add("/c/show/(.+)", "Character", "show").unwrap();
///
/// assert_eq!(table.find_url("Character/show", &["42"]).unwrap(), "/c/show/42");
/// assert_eq!(table.find_url("Index/index", &[] as &[&str]).unwrap(), "/");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry that uses the action type's own access predicate.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when the pattern does not compile.
    pub fn add(&mut self, pattern: &str, class: &str, method: &str) -> Result<(), RouteError> {
        self.push(pattern, class, method, None)
    }

    /// Appends an entry whose access is decided by `policy`.
    ///
    /// # Errors
    ///
    /// [`RouteError::InvalidPattern`] when the pattern does not compile.
    pub fn add_with_policy(
        &mut self,
        pattern: &str,
        class: &str,
        method: &str,
        policy: Policy,
    ) -> Result<(), RouteError> {
        self.push(pattern, class, method, Some(policy))
    }

    fn push(
        &mut self,
        pattern: &str,
        class: &str,
        method: &str,
        policy: Option<Policy>,
    ) -> Result<(), RouteError> {
        self.entries.push(RouteEntry {
            pattern: Pattern::parse(pattern)?,
            class: class.to_owned(),
            method: method.to_owned(),
            policy,
        });
        Ok(())
    }

    /// Entries in priority order.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reverse lookup: builds the URL for an `"Class/method"` action reference.
    ///
    /// The first entry targeting the action wins. A static pattern is returned
    /// as is; a dynamic one yields its literal prefix followed by `args` joined
    /// with `/`.
    ///
    /// # Errors
    ///
    /// - [`RouteError::MalformedAction`] — `action` is not of the form `Class/method`.
    /// - [`RouteError::ReverseNotFound`] — no entry targets the action.
    pub fn find_url<S: AsRef<str>>(&self, action: &str, args: &[S]) -> Result<String, RouteError> {
        let (class, method) = action
            .split_once('/')
            .ok_or_else(|| RouteError::MalformedAction {
                action: action.to_owned(),
            })?;

        let entry = self
            .entries
            .iter()
            .find(|entry| entry.targets(class, method))
            .ok_or_else(|| RouteError::ReverseNotFound {
                action: action.to_owned(),
            })?;

        let url = match &entry.pattern {
            Pattern::Static(s) => s.clone(),
            Pattern::Dynamic { prefix, .. } => {
                let joined: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
                format!("{prefix}{}", joined.join("/"))
            }
        };

        // an empty URL counts as unresolved
        if url.is_empty() {
            return Err(RouteError::ReverseNotFound {
                action: action.to_owned(),
            });
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Pattern::parse ────────────────────────────────────────────────────────

    #[test]
    fn pattern_parse_static() {
        assert!(matches!(Pattern::parse("/about").unwrap(), Pattern::Static(s) if s == "/about"));
    }

    #[test]
    fn pattern_parse_keeps_trailing_slash() {
        let pat = Pattern::parse("/c/new/").unwrap();
        assert_eq!(pat.as_str(), "/c/new/");
        assert!(pat.captures("/c/new").is_none());
        assert!(pat.captures("/c/new/").is_some());
    }

    #[test]
    fn pattern_parse_dynamic_prefix() {
        match Pattern::parse("/c/show/(.+)").unwrap() {
            Pattern::Dynamic { prefix, source, .. } => {
                assert_eq!(prefix, "/c/show/");
                assert_eq!(source, "/c/show/(.+)");
            }
            other => panic!("expected Dynamic, got {other:?}"),
        }
    }

    #[test]
    fn pattern_parse_invalid_regex() {
        let err = Pattern::parse("/broken/(.+").unwrap_err();
        assert!(matches!(err, RouteError::InvalidPattern { pattern, .. } if pattern == "/broken/(.+"));
    }

    // ── Pattern::captures ─────────────────────────────────────────────────────

    #[test]
    fn static_matches_only_exactly() {
        let pat = Pattern::parse("/login").unwrap();
        assert_eq!(pat.captures("/login"), Some(vec![]));
        assert!(pat.captures("/login/").is_none());
        assert!(pat.captures("/log").is_none());
        assert!(pat.captures("/login/extra").is_none());
    }

    #[test]
    fn dynamic_captures_in_order() {
        let pat = Pattern::parse("/u/([a-z]+)/c/([0-9]+)").unwrap();
        assert_eq!(
            pat.captures("/u/ada/c/7"),
            Some(vec!["ada".to_owned(), "7".to_owned()])
        );
    }

    #[test]
    fn dynamic_is_anchored_at_both_ends() {
        let pat = Pattern::parse("/c/show/([0-9]+)").unwrap();
        assert!(pat.captures("/c/show/42").is_some());
        assert!(pat.captures("/c/show/42x").is_none());
        assert!(pat.captures("/x/c/show/42").is_none());
    }

    #[test]
    fn dynamic_alternation_stays_anchored() {
        let pat = Pattern::parse("/a/(x)|/b").unwrap();
        assert!(pat.captures("/a/x").is_some());
        assert!(pat.captures("/a/xyz").is_none());
    }

    #[test]
    fn dynamic_requires_literal_prefix() {
        let pat = Pattern::parse("/c/show/(.*)").unwrap();
        assert!(pat.captures("/c/sho").is_none());
        assert_eq!(pat.captures("/c/show/"), Some(vec![String::new()]));
    }

    #[test]
    fn optional_group_yields_empty_string() {
        let pat = Pattern::parse("/p/([0-9]+)(/edit)?").unwrap();
        assert_eq!(
            pat.captures("/p/3"),
            Some(vec!["3".to_owned(), String::new()])
        );
    }

    // ── RouteTable::find_url ──────────────────────────────────────────────────

    fn table() -> RouteTable {
        let mut table = RouteTable::new();
        table.add("/login", "Session", "login").unwrap();
        table.add("/c/show/(.+)", "Character", "show").unwrap();
        table.add("/c/(.+)/(.+)", "Character", "pair").unwrap();
        table.add("/character/(.+)", "Character", "show").unwrap();
        table
    }

    #[test]
    fn find_url_static() {
        assert_eq!(table().find_url("Session/login", &[] as &[&str]).unwrap(), "/login");
    }

    #[test]
    fn find_url_dynamic_uses_first_entry() {
        assert_eq!(table().find_url("Character/show", &["42"]).unwrap(), "/c/show/42");
    }

    #[test]
    fn find_url_joins_args_with_slash() {
        let url = table()
            .find_url("Character/pair", &["a".to_owned(), "b".to_owned()])
            .unwrap();
        assert_eq!(url, "/c/a/b");
    }

    #[test]
    fn find_url_not_found() {
        let err = table().find_url("Character/edit", &["1"]).unwrap_err();
        assert!(matches!(err, RouteError::ReverseNotFound { action } if action == "Character/edit"));
    }

    #[test]
    fn find_url_malformed_action() {
        let err = table().find_url("Character", &[] as &[&str]).unwrap_err();
        assert!(matches!(err, RouteError::MalformedAction { .. }));
    }

    #[test]
    fn table_preserves_order() {
        let t = table();
        let patterns: Vec<_> = t.entries().iter().map(|e| e.pattern().as_str()).collect();
        assert_eq!(
            patterns,
            ["/login", "/c/show/(.+)", "/c/(.+)/(.+)", "/character/(.+)"]
        );
        assert_eq!(t.len(), 4);
    }
}
