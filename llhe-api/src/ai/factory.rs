//! Capability provider selection
//!
//! Falls back to the rule-based implementation, with a warning, whenever the
//! configured provider cannot serve a capability.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use llhe_common::config::{AiConfig, ProviderKind};

use super::openai::{Models, OpenAiClient};
use super::{AiError, AiServices};

pub struct AiFactory;

impl AiFactory {
    pub fn from_config(config: &AiConfig) -> Result<AiServices, AiError> {
        let models = Models {
            chat: config.chat_model.clone(),
            embedding: config.embedding_model.clone(),
            transcription: config.transcription_model.clone(),
        };
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let mut services = AiServices::rules();

        match config.provider {
            ProviderKind::Rules => {
                info!("AI provider: rules");
            }
            ProviderKind::Hosted => match config.usable_api_key() {
                Some(key) => {
                    let client = Arc::new(OpenAiClient::hosted(&config.base_url, key, models, timeout)?);
                    services = services
                        .with_pii(client.clone())
                        .with_classifier(client.clone())
                        .with_embedder(client.clone())
                        .with_transcriber(client);
                    info!(base_url = %config.base_url, "AI provider: hosted");
                }
                None => {
                    warn!("Hosted AI provider selected but no API key configured; using rule-based fallbacks");
                }
            },
            ProviderKind::Local => {
                let local = &config.local;
                let pick = |capability: &str, url: &Option<String>| -> Result<Option<Arc<OpenAiClient>>, AiError> {
                    match url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
                        Some(url) => {
                            info!(capability, url, "AI provider: local");
                            Ok(Some(Arc::new(OpenAiClient::local(url, models.clone(), timeout)?)))
                        }
                        None => {
                            warn!(capability, "No local endpoint configured; using rule-based fallback");
                            Ok(None)
                        }
                    }
                };

                if let Some(client) = pick("pii", &local.pii)? {
                    services = services.with_pii(client);
                }
                if let Some(client) = pick("classifier", &local.classifier)? {
                    services = services.with_classifier(client);
                }
                if let Some(client) = pick("embedding", &local.embedding)? {
                    services = services.with_embedder(client);
                }
                if let Some(client) = pick("transcription", &local.transcription)? {
                    services = services.with_transcriber(client);
                }
            }
        }

        Ok(services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llhe_common::config::LocalEndpoints;

    #[test]
    fn test_rules_provider() {
        let config = AiConfig {
            provider: ProviderKind::Rules,
            api_key: Some("sk-ignored".to_string()),
            ..AiConfig::default()
        };
        let services = AiFactory::from_config(&config).unwrap();
        assert_eq!(services.classifier.provider(), "rules");
        assert_eq!(services.embedder.provider(), "rules");
    }

    #[test]
    fn test_hosted_without_key_falls_back() {
        let config = AiConfig::default();
        let services = AiFactory::from_config(&config).unwrap();
        assert_eq!(services.pii.provider(), "rules");
        assert_eq!(services.transcriber.provider(), "rules");
    }

    #[test]
    fn test_hosted_with_key() {
        let config = AiConfig {
            api_key: Some("sk-test".to_string()),
            ..AiConfig::default()
        };
        let services = AiFactory::from_config(&config).unwrap();
        assert_eq!(services.pii.provider(), "hosted");
        assert_eq!(services.classifier.provider(), "hosted");
        assert_eq!(services.embedder.provider(), "hosted");
        assert_eq!(services.transcriber.provider(), "hosted");
    }

    #[test]
    fn test_local_selects_per_capability() {
        let config = AiConfig {
            provider: ProviderKind::Local,
            local: LocalEndpoints {
                embedding: Some("http://localhost:11434/v1".to_string()),
                classifier: Some("   ".to_string()),
                ..LocalEndpoints::default()
            },
            ..AiConfig::default()
        };
        let services = AiFactory::from_config(&config).unwrap();
        assert_eq!(services.embedder.provider(), "local");
        assert_eq!(services.classifier.provider(), "rules");
        assert_eq!(services.pii.provider(), "rules");
        assert_eq!(services.transcriber.provider(), "rules");
    }
}
