//! # Middleware Definition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::function::Language;

/// A stored pre-execution guard, optionally linked from functions.
///
/// A middleware may be referenced by zero or more functions; the store
/// rejects deleting one that is still referenced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareDefinition {
    /// Unique middleware ID
    pub id: Uuid,

    /// Middleware name (unique)
    pub name: String,

    /// Middleware description
    #[serde(default)]
    pub description: String,

    /// Source code, stored verbatim
    pub code: String,

    /// Execution backend
    pub language: Language,

    /// Whether the middleware participates in resolution
    #[serde(default = "default_enabled")]
    pub enabled: bool,

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

impl MiddlewareDefinition {
    /// Create a new middleware definition
    pub fn new(name: &str, code: &str, language: Language) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            code: code.to_string(),
            language,
            enabled: true,
            created_by: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the enable flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
