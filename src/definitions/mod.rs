//! # Definition Store Module
//!
//! Read access to the persisted function and middleware records the
//! external admin UI maintains. The engine only ever sees enabled records;
//! a disabled definition is indistinguishable from an absent one.

pub mod errors;
pub mod function;
pub mod middleware;
pub mod store;

pub use errors::{DefinitionError, DefinitionResult};
pub use function::{FunctionDefinition, HttpMethod, Language};
pub use middleware::MiddlewareDefinition;
pub use store::{DefinitionStore, MemoryDefinitionStore, SqlDefinitionStore};
