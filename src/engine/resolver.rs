//! # Request Resolver
//!
//! Maps an inbound call (name + method) to a function definition. The
//! visibility rule is strict: only enabled records exist, and a disabled
//! record answers exactly like an absent one so existence never leaks.

use std::sync::Arc;

use crate::definitions::{DefinitionStore, FunctionDefinition, MiddlewareDefinition};

use super::errors::RoutingError;

/// A resolved call: the function, plus its guard when one is linked and
/// enabled.
#[derive(Debug, Clone)]
pub struct ResolvedCall {
    pub function: FunctionDefinition,
    pub middleware: Option<MiddlewareDefinition>,
}

/// Resolves inbound calls against the definition store
pub struct Resolver {
    store: Arc<dyn DefinitionStore>,
}

impl Resolver {
    pub fn new(store: Arc<dyn DefinitionStore>) -> Self {
        Self { store }
    }

    /// Resolve a call or fail with the only error class allowed a non-200.
    ///
    /// A linked middleware that is disabled resolves to no middleware at
    /// all: the function runs unguarded rather than failing resolution,
    /// mirroring the enabled-only visibility rule.
    pub async fn resolve(
        &self,
        name: Option<&str>,
        method: &str,
    ) -> Result<ResolvedCall, RoutingError> {
        let name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return Err(RoutingError::NameRequired),
        };

        let function = self
            .store
            .find_enabled_function(name)
            .await
            .map_err(|e| RoutingError::Internal(e.to_string()))?
            .ok_or(RoutingError::NotFound)?;

        if !function.http_method.matches(method) {
            return Err(RoutingError::MethodNotAllowed(function.http_method));
        }

        let middleware = match function.middleware_id {
            Some(id) => self
                .store
                .find_enabled_middleware(id)
                .await
                .map_err(|e| RoutingError::Internal(e.to_string()))?,
            None => None,
        };

        Ok(ResolvedCall {
            function,
            middleware,
        })
    }
}
