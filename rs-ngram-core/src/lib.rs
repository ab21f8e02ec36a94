//! Token-level n-gram language model.
//!
//! This crate provides:
//! - Multi-order count tables trained in one pass over tokenized text
//! - Simple backoff and Kneser-Ney smoothing
//! - Seeded, temperature and top-k controlled generation
//! - A compact binary artifact format for trained models
//!
//! Text segmentation is delegated to a [`tokenizer::Tokenizer`]; the model
//! itself only sees token ids.

/// Core n-gram model: training, smoothing, sampling and generation.
pub mod model;

/// Tokenizer boundary and a character-level implementation.
pub mod tokenizer;

mod error;

/// I/O utilities (corpus loading, path helpers).
///
/// Not exposed
pub(crate) mod io;

pub use error::{Error, Result};
