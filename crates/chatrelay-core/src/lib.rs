pub mod config;
pub mod errors;
pub mod provider;

pub use config::{Settings, TranslateSettings};
pub use errors::{ConfigError, GatewayError, TranslateError};
pub use provider::{ChatModel, LanguageCatalog, Translator};
