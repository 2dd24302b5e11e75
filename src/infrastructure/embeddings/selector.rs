use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::{
    application::services::{EmbeddingProvider, ProviderSource},
    domain::DomainError,
    settings::{EmbeddingSettings, ProviderKind},
};

use super::{DisabledProvider, LocalProvider, OpenAiProvider};

/// Builds the configured provider on first request and hands out the same
/// instance afterwards. Construction failures are not cached.
pub struct ProviderSelector {
    settings: EmbeddingSettings,
    current: Mutex<Option<Arc<dyn EmbeddingProvider>>>,
}

impl ProviderSelector {
    pub fn new(settings: EmbeddingSettings) -> Self {
        Self {
            settings,
            current: Mutex::new(None),
        }
    }

    fn build(&self) -> Result<Arc<dyn EmbeddingProvider>, DomainError> {
        let provider: Arc<dyn EmbeddingProvider> = match self.settings.resolved_kind() {
            ProviderKind::OpenAi => Arc::new(OpenAiProvider::try_new(&self.settings)?),
            ProviderKind::Local => Arc::new(LocalProvider::new(self.settings.local_model.clone())),
            ProviderKind::Disabled => Arc::new(DisabledProvider),
        };
        Ok(provider)
    }

    /// Loads the local model up front when `PRELOAD_LOCAL_MODEL` is set.
    pub fn warm_up(&self) -> Result<(), DomainError> {
        if !self.settings.preload_local || self.resolved_kind() != ProviderKind::Local {
            return Ok(());
        }
        self.provider()?.warm_up()
    }
}

impl ProviderSource for ProviderSelector {
    fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>, DomainError> {
        // held across construction so concurrent first calls build only once
        let mut slot = self.current.lock();
        if let Some(provider) = slot.as_ref() {
            return Ok(Arc::clone(provider));
        }

        let provider = self.build()?;
        info!(
            target: "endee_mcp::embeddings",
            mode = self.settings.mode.id(),
            provider = provider.provider_name(),
            dimension = provider.dimension(),
            "embedding provider selected"
        );
        *slot = Some(Arc::clone(&provider));
        Ok(provider)
    }

    fn resolved_kind(&self) -> ProviderKind {
        self.settings.resolved_kind()
    }

    fn is_local_model_loaded(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|provider| provider.is_model_loaded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ProviderMode;

    fn selector(mode: ProviderMode, key: &str) -> ProviderSelector {
        let mut settings = EmbeddingSettings::with_mode(mode);
        settings.openai_api_key = key.into();
        ProviderSelector::new(settings)
    }

    #[test]
    fn test_selection_is_idempotent() {
        let selector = selector(ProviderMode::Local, "");
        let first = selector.provider().unwrap();
        let second = selector.provider().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_auto_prefers_openai_when_keyed() {
        let keyed = selector(ProviderMode::Auto, "sk-test");
        assert_eq!(keyed.resolved_kind(), ProviderKind::OpenAi);
        assert_eq!(
            keyed.provider().unwrap().provider_name(),
            "openai-text-embedding-3-small"
        );

        let unkeyed = selector(ProviderMode::Auto, "");
        assert_eq!(unkeyed.resolved_kind(), ProviderKind::Local);
        assert_eq!(
            unkeyed.provider().unwrap().provider_name(),
            "local-all-MiniLM-L6-v2"
        );
    }

    #[test]
    fn test_explicit_openai_without_key_is_not_cached() {
        let selector = selector(ProviderMode::OpenAi, "");
        for _ in 0..2 {
            assert!(matches!(
                selector.provider(),
                Err(DomainError::MissingCredential(_))
            ));
        }
        assert!(selector.current.lock().is_none());
    }

    #[test]
    fn test_none_mode_is_disabled() {
        let selector = selector(ProviderMode::None, "sk-test");
        let provider = selector.provider().unwrap();
        assert_eq!(provider.provider_name(), "none");
        assert!(matches!(
            provider.embed_texts(&[]),
            Err(DomainError::EmbeddingDisabled)
        ));
        assert!(!selector.is_local_model_loaded());
    }

    #[test]
    fn test_warm_up_skips_unless_requested() {
        let selector = selector(ProviderMode::Local, "");
        selector.warm_up().unwrap();
        assert!(selector.current.lock().is_none());
    }

    fn preloading(mode: ProviderMode, key: &str) -> ProviderSelector {
        let mut settings = EmbeddingSettings::with_mode(mode);
        settings.openai_api_key = key.into();
        settings.preload_local = true;
        ProviderSelector::new(settings)
    }

    #[test]
    fn test_preload_loads_local_model() {
        let selector = preloading(ProviderMode::Local, "");
        assert!(!selector.is_local_model_loaded());

        selector.warm_up().unwrap();
        assert!(selector.is_local_model_loaded());
        assert_eq!(
            selector.provider().unwrap().provider_name(),
            "local-all-MiniLM-L6-v2"
        );
    }

    #[test]
    fn test_preload_ignored_for_remote_and_disabled() {
        for (mode, key) in [(ProviderMode::Auto, "sk-test"), (ProviderMode::None, "")] {
            let selector = preloading(mode, key);
            selector.warm_up().unwrap();
            assert!(selector.current.lock().is_none());
            assert!(!selector.is_local_model_loaded());
        }
    }
}
