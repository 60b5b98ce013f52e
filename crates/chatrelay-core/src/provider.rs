use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{GatewayError, TranslateError};

/// Trait implemented by each text-generation backend.
///
/// Implementations surface transport and API failures as typed errors; the
/// error-as-string contract the clients see lives one layer up, in the
/// gateway wrappers.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Generate a completion for a single user prompt.
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
    ) -> Result<String, GatewayError>;
}

/// Trait implemented by translation backends.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslateError>;

    /// Enumerate the language codes the backend can translate between.
    async fn list_languages(&self) -> Result<LanguageCatalog, TranslateError>;
}

/// Available translation language codes, as reported by the backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageCatalog {
    #[serde(rename = "from")]
    pub source: Vec<String>,
    #[serde(rename = "to")]
    pub target: Vec<String>,
}

impl LanguageCatalog {
    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.target.is_empty()
    }
}
