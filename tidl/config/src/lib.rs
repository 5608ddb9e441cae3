mod config;
mod schema;

pub use config::TidlConfig;
pub use schema::{TidlConfigSchema, TidlConfigSchemaExtensions, TidlConfigSchemaKeys};
