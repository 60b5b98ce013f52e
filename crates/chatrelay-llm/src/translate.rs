use std::collections::BTreeSet;
use std::process::Output;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use chatrelay_core::config::TranslateSettings;
use chatrelay_core::errors::TranslateError;
use chatrelay_core::provider::{LanguageCatalog, Translator};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Translation backend that shells out to the Riva NMT command-line client.
///
/// The CLI's argument syntax stays confined to this module; callers only see
/// the [`Translator`] trait.
pub struct RivaTranslator {
    command: String,
    server: String,
    function_id: String,
    api_key: SecretString,
    timeout: Duration,
}

impl RivaTranslator {
    pub fn new(settings: &TranslateSettings, api_key: SecretString) -> Self {
        Self {
            command: settings.command.clone(),
            server: settings.server.clone(),
            function_id: settings.function_id.clone(),
            api_key,
            timeout: COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "--server".into(),
            self.server.clone(),
            "--use-ssl".into(),
            "--metadata".into(),
            "function-id".into(),
            self.function_id.clone(),
            "--metadata".into(),
            "authorization".into(),
            format!("Bearer {}", self.api_key.expose_secret()),
        ]
    }

    fn translate_args(&self, text: &str, source_lang: &str, target_lang: &str) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "--text".into(),
            text.to_string(),
            "--source-language-code".into(),
            source_lang.to_string(),
            "--target-language-code".into(),
            target_lang.to_string(),
        ]);
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<Output, TranslateError> {
        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.command)
                .args(&args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| TranslateError::Timeout(self.timeout))?
        .map_err(|source| TranslateError::Spawn {
            command: self.command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(TranslateError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output)
    }
}

#[async_trait]
impl Translator for RivaTranslator {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, TranslateError> {
        tracing::debug!(from = source_lang, to = target_lang, "running translation command");
        let output = self
            .run(self.translate_args(text, source_lang, target_lang))
            .await?;

        let stdout = String::from_utf8(output.stdout).map_err(|_| TranslateError::InvalidOutput)?;
        Ok(stdout.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn list_languages(&self) -> Result<LanguageCatalog, TranslateError> {
        let mut args = self.base_args();
        args.push("--list-models".into());
        let output = self.run(args).await?;

        let stdout = String::from_utf8(output.stdout).map_err(|_| TranslateError::InvalidOutput)?;
        Ok(parse_languages(&stdout))
    }
}

/// Parse `src_lang:` / `tgt_lang:` lines of the CLI's model listing into
/// sorted, deduplicated code lists.
pub fn parse_languages(raw: &str) -> LanguageCatalog {
    let mut source = BTreeSet::new();
    let mut target = BTreeSet::new();

    for line in raw.lines() {
        let line = line.trim();
        if let Some(code) = line.strip_prefix("src_lang:") {
            source.insert(code.trim().trim_matches('"').to_string());
        } else if let Some(code) = line.strip_prefix("tgt_lang:") {
            target.insert(code.trim().trim_matches('"').to_string());
        }
    }

    LanguageCatalog {
        source: source.into_iter().collect(),
        target: target.into_iter().collect(),
    }
}
