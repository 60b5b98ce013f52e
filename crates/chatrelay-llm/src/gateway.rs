use std::sync::Arc;

use chatrelay_core::errors::GatewayError;
use chatrelay_core::provider::{ChatModel, LanguageCatalog, Translator};

/// Returned when the LLM API could not be reached at all.
pub const UNAVAILABLE_REPLY: &str = "Sorry, I'm currently unavailable. Please try again later.";
/// Returned when the LLM API answered, but not with a usable completion.
pub const DEGRADED_REPLY: &str = "Sorry, I'm having trouble processing your request right now.";
/// Returned when the translation command fails for any reason.
pub const TRANSLATION_FAILED_REPLY: &str = "Error during translation";

pub const DEFAULT_MAX_TOKENS: u32 = 512;

/// User-facing boundary around a [`ChatModel`].
///
/// `reply` never fails: gateway faults are absorbed here and converted to a
/// fixed fallback string, so connection handlers see a plain `String` either
/// way. The typed error is logged before it is flattened, which is what lets
/// a log reader tell a real reply from a fallback.
pub struct ChatGateway {
    model: Arc<dyn ChatModel>,
    max_tokens: u32,
}

impl ChatGateway {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub async fn reply(&self, prompt: &str, model: &str) -> String {
        match self.model.generate(prompt, model, self.max_tokens).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    backend = self.model.name(),
                    kind = err.error_kind(),
                    error = %err,
                    "generation failed, returning fallback"
                );
                fallback_reply(&err).to_string()
            }
        }
    }
}

/// Pick the fixed fallback string for a gateway fault.
pub fn fallback_reply(err: &GatewayError) -> &'static str {
    if err.is_unavailable() {
        UNAVAILABLE_REPLY
    } else {
        DEGRADED_REPLY
    }
}

/// User-facing boundary around a [`Translator`], same contract as
/// [`ChatGateway`]: always a displayable result, faults logged then flattened.
pub struct TranslationGateway {
    translator: Arc<dyn Translator>,
}

impl TranslationGateway {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self { translator }
    }

    pub async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> String {
        match self.translator.translate(text, source_lang, target_lang).await {
            Ok(translated) => translated,
            Err(err) => {
                tracing::warn!(kind = err.error_kind(), error = %err, "translation failed");
                TRANSLATION_FAILED_REPLY.to_string()
            }
        }
    }

    pub async fn languages(&self) -> LanguageCatalog {
        match self.translator.list_languages().await {
            Ok(catalog) => catalog,
            Err(err) => {
                tracing::warn!(kind = err.error_kind(), error = %err, "language listing failed");
                LanguageCatalog::default()
            }
        }
    }
}
