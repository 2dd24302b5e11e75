//! Embedding providers and the selector that picks one at runtime.

mod disabled;
#[cfg(feature = "fastembed-engine")]
mod fastembed_engine;
#[cfg_attr(feature = "fastembed-engine", allow(dead_code))]
mod hashing;
mod local;
mod openai;
mod selector;

pub use disabled::DisabledProvider;
pub use hashing::HashingEncoder;
pub use local::{local_dimension, EncoderLoader, LocalProvider, TextEncoder};
pub use openai::{openai_dimension, OpenAiProvider, MAX_INPUTS_PER_REQUEST};
pub use selector::ProviderSelector;
