use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use chatrelay_core::errors::{GatewayError, TranslateError};
use chatrelay_core::provider::{ChatModel, LanguageCatalog, Translator};

/// One recorded `generate` invocation.
#[derive(Clone, Debug)]
pub struct ChatCall {
    pub prompt: String,
    pub model: String,
    pub max_tokens: u32,
}

enum MockBehavior {
    /// Reply `echo: <prompt>`.
    Echo,
    /// Pop pre-programmed results in order; error when exhausted.
    Scripted(Mutex<VecDeque<Result<String, GatewayError>>>),
    /// Always return a clone of this error.
    Failing(GatewayError),
}

/// Deterministic [`ChatModel`] for tests. Records every call.
pub struct MockChatModel {
    behavior: MockBehavior,
    calls: Mutex<Vec<ChatCall>>,
}

impl MockChatModel {
    pub fn echo() -> Self {
        Self {
            behavior: MockBehavior::Echo,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn scripted(responses: impl IntoIterator<Item = Result<String, GatewayError>>) -> Self {
        Self {
            behavior: MockBehavior::Scripted(Mutex::new(responses.into_iter().collect())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: GatewayError) -> Self {
        Self {
            behavior: MockBehavior::Failing(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        max_tokens: u32,
    ) -> Result<String, GatewayError> {
        self.calls.lock().push(ChatCall {
            prompt: prompt.to_string(),
            model: model.to_string(),
            max_tokens,
        });

        match &self.behavior {
            MockBehavior::Echo => Ok(format!("echo: {prompt}")),
            MockBehavior::Scripted(queue) => queue.lock().pop_front().unwrap_or_else(|| {
                Err(GatewayError::MalformedResponse("mock script exhausted".into()))
            }),
            MockBehavior::Failing(error) => Err(error.clone()),
        }
    }
}

/// Deterministic [`Translator`] for tests. Replies `[from->to] <text>`.
pub struct MockTranslator {
    catalog: LanguageCatalog,
    fail: bool,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self {
            catalog: LanguageCatalog {
                source: vec!["de".into(), "en".into()],
                target: vec!["de".into(), "en".into(), "es".into()],
            },
            fail: false,
        }
    }

    pub fn with_catalog(catalog: LanguageCatalog) -> Self {
        Self { catalog, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            catalog: LanguageCatalog::default(),
            fail: true,
        }
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslateError> {
        if self.fail {
            return Err(TranslateError::Failed {
                code: Some(1),
                stderr: "mock failure".into(),
            });
        }
        Ok(format!("[{source_lang}->{target_lang}] {text}"))
    }

    async fn list_languages(&self) -> Result<LanguageCatalog, TranslateError> {
        if self.fail {
            return Err(TranslateError::Failed {
                code: Some(1),
                stderr: "mock failure".into(),
            });
        }
        Ok(self.catalog.clone())
    }
}
