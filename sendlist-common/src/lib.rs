pub mod address;
pub mod address_parser;
pub mod config;
pub mod error;
pub mod flags;
pub mod logging;

pub use address::{Address, Mailer};
pub use address_parser::AddressParser;
pub use config::ResolverConfig;
pub use error::{ConfigError, RecipientError, SourceError};
pub use flags::QueueFlags;
pub use tracing;
