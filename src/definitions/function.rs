//! # Function Definition

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Code-execution backend a definition is written for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Embedded in-process runtime
    Rhai,
    /// Sidecar worker runtime
    Javascript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rhai => "rhai",
            Language::Javascript => "javascript",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rhai" => Ok(Language::Rhai),
            "javascript" | "js" => Ok(Language::Javascript),
            other => Err(format!("unknown language '{}'", other)),
        }
    }
}

/// HTTP method a function is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// Case-insensitive comparison against an inbound method string
    pub fn matches(&self, inbound: &str) -> bool {
        inbound.eq_ignore_ascii_case(self.as_str())
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            other => Err(format!("unsupported http method '{}'", other)),
        }
    }
}

/// A stored function bound to an HTTP endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Unique function ID
    pub id: Uuid,

    /// Function name (unique slug)
    pub name: String,

    /// Function description
    #[serde(default)]
    pub description: String,

    /// Source code, stored verbatim
    pub code: String,

    /// Execution backend
    pub language: Language,

    /// Bound HTTP method
    pub http_method: HttpMethod,

    /// Endpoint slug, derived from the name
    pub endpoint: String,

    /// Whether the function is callable
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Optional pre-execution guard
    #[serde(default)]
    pub middleware_id: Option<Uuid>,

    /// Author identifier from the admin UI
    #[serde(default)]
    pub created_by: String,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl FunctionDefinition {
    /// Create a new function definition
    pub fn new(name: &str, code: &str, language: Language, http_method: HttpMethod) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            code: code.to_string(),
            language,
            http_method,
            endpoint: slugify(name),
            enabled: true,
            middleware_id: None,
            created_by: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a middleware guard
    pub fn with_middleware(mut self, middleware_id: Uuid) -> Self {
        self.middleware_id = Some(middleware_id);
        self
    }

    /// Set the enable flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Derive an endpoint slug from a name: lowercase alphanumerics, runs of
/// anything else collapse to a single dash.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_function_defaults() {
        let func = FunctionDefinition::new(
            "hello",
            "response.success = true;",
            Language::Rhai,
            HttpMethod::Get,
        );
        assert_eq!(func.name, "hello");
        assert_eq!(func.endpoint, "hello");
        assert!(func.enabled);
        assert!(func.middleware_id.is_none());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Send Welcome Email"), "send-welcome-email");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
        assert_eq!(slugify("__weird__name__"), "weird-name");
    }

    #[test]
    fn test_language_round_trip() {
        assert_eq!("rhai".parse::<Language>().unwrap(), Language::Rhai);
        assert_eq!("JS".parse::<Language>().unwrap(), Language::Javascript);
        assert!("python".parse::<Language>().is_err());
        assert_eq!(Language::Javascript.as_str(), "javascript");
    }

    #[test]
    fn test_method_matches_case_insensitive() {
        assert!(HttpMethod::Post.matches("post"));
        assert!(HttpMethod::Post.matches("POST"));
        assert!(!HttpMethod::Post.matches("GET"));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("delete".parse::<HttpMethod>().unwrap(), HttpMethod::Delete);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }
}
