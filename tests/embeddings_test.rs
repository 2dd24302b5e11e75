//! Embedding providers against the mock OpenAI-compatible endpoint.

mod common;

use std::sync::Arc;

use common::{mock_embedding, MockServer, MOCK_EMBEDDING_DIM};
use endee_mcp::{
    application::{EmbeddingProvider, ProviderSource},
    domain::DomainError,
    infrastructure::{
        embeddings::{HashingEncoder, TextEncoder, MAX_INPUTS_PER_REQUEST},
        LocalProvider, OpenAiProvider, ProviderSelector,
    },
    settings::{ProviderKind, ProviderMode},
};

#[test]
fn test_openai_splits_large_batches() {
    let mock = MockServer::start();
    let provider = OpenAiProvider::try_new(&mock.embedding_settings(ProviderMode::OpenAi)).unwrap();

    let texts: Vec<String> = (0..MAX_INPUTS_PER_REQUEST + 2)
        .map(|i| format!("text {i}"))
        .collect();
    let vectors = provider.embed_texts(&texts).unwrap();

    assert_eq!(vectors.len(), texts.len());
    assert_eq!(mock.state.lock().embedding_batches, vec![MAX_INPUTS_PER_REQUEST, 2]);
    assert_eq!(vectors[2049], mock_embedding("text 2049"));
}

#[test]
fn test_openai_restores_input_order() {
    let mock = MockServer::start();
    let provider = OpenAiProvider::try_new(&mock.embedding_settings(ProviderMode::OpenAi)).unwrap();

    let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
    let vectors = provider.embed_texts(&texts).unwrap();
    for (text, vector) in texts.iter().zip(&vectors) {
        assert_eq!(vector, &mock_embedding(text));
        assert_eq!(vector.len(), MOCK_EMBEDDING_DIM);
    }

    let requests = mock.requests();
    assert_eq!(requests[0].path, "/openai/embeddings");
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer sk-test"));
}

#[test]
fn test_openai_upstream_failure() {
    let mock = MockServer::start();
    let provider = OpenAiProvider::try_new(&mock.embedding_settings(ProviderMode::OpenAi)).unwrap();

    match provider.embed_query("FAIL") {
        Err(DomainError::EmbeddingBackend(message)) => {
            assert!(message.contains("500"));
            assert!(message.contains("upstream model error"));
        }
        other => panic!("expected backend error, got {other:?}"),
    }
    assert_eq!(provider.embed_texts(&[]).unwrap().len(), 0);
    assert_eq!(mock.state.lock().embedding_batches, vec![1]);
}

#[test]
fn test_selector_caches_openai_provider() {
    let mock = MockServer::start();
    let selector = ProviderSelector::new(mock.embedding_settings(ProviderMode::Auto));
    assert_eq!(selector.resolved_kind(), ProviderKind::OpenAi);

    let first = selector.provider().unwrap();
    let second = selector.provider().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(first.model_name(), "text-embedding-3-small");
    assert!(!selector.is_local_model_loaded());

    let vector = second.embed_query("hello").unwrap();
    assert_eq!(vector, mock_embedding("hello"));
}

#[test]
fn test_local_provider_with_hashing_encoder() {
    let loads = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let provider = LocalProvider::with_loader(
        "sentence-transformers/all-MiniLM-L6-v2",
        Box::new(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let encoder: Arc<dyn TextEncoder> = Arc::new(HashingEncoder::try_new(384)?);
            Ok(encoder)
        }),
    );
    assert_eq!(provider.provider_name(), "local-all-MiniLM-L6-v2");
    assert_eq!(provider.dimension(), 384);
    assert!(!provider.is_model_loaded());

    let a = provider.embed_query("vector databases").unwrap();
    let b = provider.embed_query("vector databases").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 384);
    let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4);

    assert!(provider.is_model_loaded());
    assert_eq!(loads.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn test_local_provider_rejects_blank_text() {
    let provider = LocalProvider::with_loader(
        "custom/model",
        Box::new(|| {
            let encoder: Arc<dyn TextEncoder> = Arc::new(HashingEncoder::try_new(16)?);
            Ok(encoder)
        }),
    );
    assert!(matches!(
        provider.embed_query("   "),
        Err(DomainError::Validation(_))
    ));
}
