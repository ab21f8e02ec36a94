//! Top-level module for the n-gram language model.
//!
//! This module provides:
//! - Per-order count tables (`CountTable`) built in a single training pass (`Trainer`)
//! - The persisted training output (`Artifact`)
//! - Smoothing strategies turning counts into scores (`Smoothing`)
//! - Seeded temperature / top-k sampling (`Sampler`)
//! - The generation loop (`Model`)

/// Immutable bundle of count tables, continuation tables and metadata.
///
/// Serialized with `postcard`, validated on load.
pub mod artifact;

/// Per-order frequency tables keyed by owned context tuples.
pub mod count_table;

/// Next-token counts of a single context.
pub mod followers;

/// Generation loop: prompt in, text plus usage out.
pub mod generator;

/// Generation request and response types.
pub mod request;

/// Temperature and top-k sampling over a score distribution.
pub mod sampler;

/// Simple backoff and Kneser-Ney scoring.
pub mod smoothing;

/// Single-pass count table construction.
pub mod trainer;

/// Dense token id assigned by the tokenizer.
pub type TokenId = u32;

pub use artifact::{Artifact, Metadata};
pub use count_table::{ContextKey, CountTable};
pub use generator::Model;
pub use request::{FinishReason, GenerationRequest, GenerationResponse, Usage};
pub use sampler::Sampler;
pub use smoothing::{Scores, Smoothing};
pub use trainer::{SmoothingKind, Trainer, TrainerConfig};
