//! Configuration, prompt assembly, query handling and startup wiring.

pub mod bootstrap;
pub mod config;
pub mod prompt;
pub mod query;
pub mod vault;

pub use bootstrap::AppContext;
pub use config::Config;
pub use query::{Answer, FALLBACK_ANSWER, QueryError, QueryHandler};
