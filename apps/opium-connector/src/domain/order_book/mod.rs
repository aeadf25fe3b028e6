//! Order book domain: ladder state and payload normalization.

mod book;
mod normalizer;

pub use book::{BookRow, OrderBook};
pub use normalizer::{BookUpdateMode, BookUpdateNormalizer, NormalizedBookUpdate};
