use secrecy::SecretString;

use crate::errors::ConfigError;

const DEFAULT_BASE_URL: &str = "https://integrate.api.nvidia.com/v1";
const DEFAULT_MODEL: &str = "meta/llama-3.1-8b-instruct";
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8888;
const DEFAULT_WS_PORT: u16 = 8890;
const DEFAULT_TRANSLATE_COMMAND: &str = "nmt";
const DEFAULT_TRANSLATE_SERVER: &str = "grpc.nvcf.nvidia.com:443";
const DEFAULT_TRANSLATE_FUNCTION_ID: &str = "0778f2eb-b64d-45e7-acae-7dd9b9b35b4d";
const DEFAULT_TEXT_FROM: &str = "en";
const DEFAULT_TEXT_TO: &str = "de";

/// Process configuration, loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub ws_port: u16,
    pub api_key: SecretString,
    pub base_url: String,
    pub model_name: String,
    pub translate: TranslateSettings,
}

/// Configuration for the external translation CLI.
#[derive(Clone, Debug)]
pub struct TranslateSettings {
    pub command: String,
    pub server: String,
    pub function_id: String,
    pub text_from: String,
    pub text_to: String,
}

impl Settings {
    /// Load settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup("NVIDIA_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_port(&lookup, "PORT", DEFAULT_PORT)?,
            ws_port: parse_port(&lookup, "WS_PORT", DEFAULT_WS_PORT)?,
            api_key: SecretString::from(api_key),
            base_url: lookup("NVIDIA_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model_name: lookup("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            translate: TranslateSettings {
                command: lookup("TRANSLATE_COMMAND")
                    .unwrap_or_else(|| DEFAULT_TRANSLATE_COMMAND.to_string()),
                server: lookup("TRANSLATE_SERVER")
                    .unwrap_or_else(|| DEFAULT_TRANSLATE_SERVER.to_string()),
                function_id: lookup("TRANSLATE_FUNCTION_ID")
                    .unwrap_or_else(|| DEFAULT_TRANSLATE_FUNCTION_ID.to_string()),
                text_from: lookup("TEXT_FROM").unwrap_or_else(|| DEFAULT_TEXT_FROM.to_string()),
                text_to: lookup("TEXT_TO").unwrap_or_else(|| DEFAULT_TEXT_TO.to_string()),
            },
        })
    }
}

fn parse_port(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u16,
) -> Result<u16, ConfigError> {
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn api_key_is_required() {
        let err = Settings::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));

        let err = Settings::from_lookup(lookup_from(&[("NVIDIA_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn defaults_applied() {
        let settings = Settings::from_lookup(lookup_from(&[("NVIDIA_API_KEY", "nvapi-test")]))
            .unwrap();
        assert_eq!(settings.host, "localhost");
        assert_eq!(settings.port, 8888);
        assert_eq!(settings.ws_port, 8890);
        assert_eq!(settings.base_url, "https://integrate.api.nvidia.com/v1");
        assert_eq!(settings.model_name, "meta/llama-3.1-8b-instruct");
        assert_eq!(settings.translate.text_from, "en");
        assert_eq!(settings.translate.text_to, "de");
        assert_eq!(settings.translate.server, "grpc.nvcf.nvidia.com:443");
    }

    #[test]
    fn overrides_win() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("NVIDIA_API_KEY", "nvapi-test"),
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("MODEL_NAME", "microsoft/phi-4-mini-instruct"),
            ("TEXT_TO", "fr"),
        ]))
        .unwrap();
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.port, 9000);
        assert_eq!(settings.model_name, "microsoft/phi-4-mini-instruct");
        assert_eq!(settings.translate.text_to, "fr");
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[
            ("NVIDIA_API_KEY", "nvapi-test"),
            ("PORT", "not-a-port"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { name: "PORT", .. }));
    }
}
