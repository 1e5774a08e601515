//! Embedding providers for knowledge bases.
//!
//! A knowledge base is bound to one engine/model pair at creation; the
//! provider for that pair is built with [`create_provider`].

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
