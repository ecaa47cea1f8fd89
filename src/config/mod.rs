//! Configuration loading and validation
//!
//! Jobs run fine with built-in defaults; a TOML file can override any table.

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{Config, FetchConfig, OutputConfig, RetryConfig, ScrapeConfig};
pub use validation::{validate, validate_chapter_limit};
