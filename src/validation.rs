//! Selector, URL, and identifier validation.
//!
//! Pure functions with no side effects. Every layer above uses them to
//! reject malformed input before it reaches the browser.
//!
//! # Example
//!
//! ```
//! use browserve::validation::{validate_css_selector, validate_selector, validate_xpath_selector};
//!
//! assert!(validate_css_selector("#login-btn"));
//! assert!(!validate_css_selector("<script>"));
//! assert!(validate_xpath_selector("//div[@id='x']"));
//! assert!(!validate_css_selector("//div[@id='x']"));
//! assert!(validate_selector("//div[@id='x']"));
//! ```
//!
//! These are conservative safety checks, not full CSS or XPath grammars.

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

// ============================================================================
// Constants
// ============================================================================

/// Substrings that indicate script injection in either selector dialect.
const DANGEROUS_PATTERNS: &[&str] = &[
    "javascript:",
    "data:",
    "vbscript:",
    "expression(",
    "eval(",
    "settimeout",
    "setinterval",
];

/// Prefixes that identify an XPath expression.
const XPATH_STARTS: &[&str] = &[
    "/",
    "//",
    "./",
    "../",
    ".",
    "(",
    "id(",
    "name(",
    "class(",
    "text()",
    "contains(",
    "starts-with(",
    "normalize-space(",
    "following:",
    "preceding:",
    "ancestor:",
    "descendant:",
    "child:",
    "parent:",
    "self:",
];

/// Tokens that identify an XPath expression anywhere in the string.
const XPATH_INDICATORS: &[&str] = &[
    "//",
    "[@",
    "[contains(",
    "[text()",
    "following::",
    "preceding::",
];

/// Schemes accepted by [`validate_url`].
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "ftp", "file"];

/// Hosts accepted without a dot.
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0"];

/// Known interaction and navigation verbs.
const ACTION_TYPES: &[&str] = &[
    "click",
    "double_click",
    "right_click",
    "hover",
    "fill",
    "clear",
    "select",
    "check",
    "uncheck",
    "focus",
    "blur",
    "scroll",
    "drag",
    "drop",
    "navigate",
    "reload",
    "back",
    "forward",
    "wait",
    "screenshot",
];

/// Maximum length of sanitized element text, in characters.
pub const MAX_ELEMENT_TEXT_LEN: usize = 1000;

/// Upper bound for [`validate_timeout`], in seconds.
pub const MAX_TIMEOUT_SECS: f64 = 300.0;

static CSS_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[a-zA-Z0-9\-_#.\[\]=:(),"'*+~^$|>\s]+$"#).expect("valid CSS charset regex")
});

static XPATH_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[a-zA-Z0-9\-_\[\]@=():,."'*/+\s\\|]+$"#).expect("valid XPath charset regex")
});

static SESSION_ID_CHARSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9\-_.]+$").expect("valid session id regex"));

static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

// ============================================================================
// Selectors
// ============================================================================

/// Validates a CSS selector for basic safety.
///
/// Rejects markup and quote characters, script-like substrings, characters
/// outside the CSS charset, and unbalanced brackets or parentheses.
#[must_use]
pub fn validate_css_selector(selector: &str) -> bool {
    let selector = selector.trim();
    if selector.is_empty() {
        return false;
    }

    if selector.contains(['<', '>', '"', '\'', '`']) {
        return false;
    }

    if contains_dangerous_pattern(selector) {
        return false;
    }

    if !CSS_CHARSET.is_match(selector) {
        return false;
    }

    brackets_balanced(selector)
}

/// Validates an XPath expression for basic safety.
///
/// The expression must start with or contain a recognized XPath token.
#[must_use]
pub fn validate_xpath_selector(selector: &str) -> bool {
    let selector = selector.trim();
    if selector.is_empty() {
        return false;
    }

    if selector.contains(['<', '>']) {
        return false;
    }

    if contains_dangerous_pattern(selector) {
        return false;
    }

    let looks_like_xpath = XPATH_STARTS.iter().any(|start| selector.starts_with(start))
        || XPATH_INDICATORS
            .iter()
            .any(|indicator| selector.contains(indicator));
    if !looks_like_xpath {
        return false;
    }

    if !XPATH_CHARSET.is_match(selector) {
        return false;
    }

    brackets_balanced(selector)
}

/// Validates a selector in either dialect.
#[inline]
#[must_use]
pub fn validate_selector(selector: &str) -> bool {
    validate_css_selector(selector) || validate_xpath_selector(selector)
}

fn contains_dangerous_pattern(selector: &str) -> bool {
    let lower = selector.to_lowercase();
    DANGEROUS_PATTERNS.iter().any(|pattern| lower.contains(pattern))
}

fn brackets_balanced(selector: &str) -> bool {
    let mut stack = Vec::new();

    for ch in selector.chars() {
        match ch {
            '[' => stack.push(']'),
            '(' => stack.push(')'),
            ']' | ')' => {
                if stack.pop() != Some(ch) {
                    return false;
                }
            }
            _ => {}
        }
    }

    stack.is_empty()
}

// ============================================================================
// URLs
// ============================================================================

/// Validates URL structure.
///
/// Requires a scheme in {http, https, ftp, file} and a host. Hosts without a
/// dot are only accepted for loopback names or when a port is given.
#[must_use]
pub fn validate_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }

    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return false;
    }

    let Some(host) = parsed.host_str().filter(|h| !h.is_empty()) else {
        return false;
    };

    let host = host.to_lowercase();
    if LOOPBACK_HOSTS.contains(&host.as_str()) {
        return true;
    }

    host.contains('.') || host.contains(':') || parsed.port().is_some()
}

/// Normalizes a URL by trimming it and adding `https://` when no scheme is
/// present. Does not validate.
///
/// ```
/// use browserve::validation::sanitize_url;
///
/// assert_eq!(sanitize_url("example.com"), "https://example.com");
/// assert_eq!(sanitize_url("  http://test.com  "), "http://test.com");
/// ```
#[must_use]
pub fn sanitize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }

    let has_scheme = ["http://", "https://", "ftp://", "file://"]
        .iter()
        .any(|scheme| url.starts_with(scheme));

    if has_scheme {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

// ============================================================================
// Identifiers & Values
// ============================================================================

/// Validates a session identifier: 3 to 100 characters of alphanumerics,
/// hyphen, underscore, or dot.
#[must_use]
pub fn validate_session_id(session_id: &str) -> bool {
    let session_id = session_id.trim();
    let len = session_id.chars().count();
    (3..=100).contains(&len) && SESSION_ID_CHARSET.is_match(session_id)
}

/// Validates a timeout in seconds: strictly positive, at most 300.
#[inline]
#[must_use]
pub fn validate_timeout(timeout_secs: f64) -> bool {
    timeout_secs.is_finite() && timeout_secs > 0.0 && timeout_secs <= MAX_TIMEOUT_SECS
}

/// Checks an action verb against the known vocabulary, case-insensitively.
#[must_use]
pub fn validate_action_type(action_type: &str) -> bool {
    let normalized = action_type.trim().to_lowercase();
    ACTION_TYPES.contains(&normalized.as_str())
}

/// Sanitizes element text for logging.
///
/// Strips tags, collapses whitespace, trims, and truncates to
/// [`MAX_ELEMENT_TEXT_LEN`] characters with a trailing `...`.
#[must_use]
pub fn sanitize_element_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let stripped = HTML_TAG.replace_all(text, "");
    let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");
    let trimmed = collapsed.trim();

    if trimmed.chars().count() > MAX_ELEMENT_TEXT_LEN {
        let mut truncated: String = trimmed.chars().take(MAX_ELEMENT_TEXT_LEN - 3).collect();
        truncated.push_str("...");
        truncated
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
