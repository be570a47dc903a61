mod raw;
mod loader;
pub mod error;

pub use loader::{load_provider_file, load_providers, parse_provider};
pub use error::ConfigError;
