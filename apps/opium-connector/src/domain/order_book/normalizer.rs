//! Normalization of raw venue depth payloads into book rows.
//!
//! Venues disagree on what their push channel carries: some stream true
//! incremental diffs, others push the complete book on every update while
//! labelling it a diff. Feeding a full-book payload through the diff path
//! corrupts the ladder (absent levels are never removed), so the routing
//! decision is an explicit per-venue configuration, not a guess.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::book::BookRow;

/// What the venue's push channel actually delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookUpdateMode {
    /// Every push is the complete book; route to snapshot application.
    FullBook,
    /// Pushes are true incremental diffs gated by the update-id cursor.
    Incremental,
}

/// A depth payload after wire decoding, before ladder application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedBookUpdate {
    /// Bid rows, best (highest price) first.
    pub bids: Vec<BookRow>,
    /// Ask rows, best (lowest price) first.
    pub asks: Vec<BookRow>,
    /// Sequence number embedded in the payload.
    pub update_id: u64,
}

/// Stateless translator from raw depth rows to normalized, sorted rows.
#[derive(Debug, Clone, Copy)]
pub struct BookUpdateNormalizer {
    mode: BookUpdateMode,
}

impl BookUpdateNormalizer {
    /// Create a normalizer for the given venue update mode.
    #[must_use]
    pub const fn new(mode: BookUpdateMode) -> Self {
        Self { mode }
    }

    /// Whether push payloads must be applied as snapshots.
    #[must_use]
    pub const fn routes_to_snapshot(&self) -> bool {
        matches!(self.mode, BookUpdateMode::FullBook)
    }

    /// Sort and sanitize raw rows into a `NormalizedBookUpdate`.
    ///
    /// Rows with a negative amount are dropped (decode artifacts); zero
    /// amounts are kept because in a diff they delete a level.
    #[must_use]
    pub fn normalize(
        &self,
        mut bids: Vec<BookRow>,
        mut asks: Vec<BookRow>,
        update_id: u64,
    ) -> NormalizedBookUpdate {
        bids.retain(|row| row.amount >= Decimal::ZERO);
        asks.retain(|row| row.amount >= Decimal::ZERO);
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        NormalizedBookUpdate {
            bids,
            asks,
            update_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sorts_both_sides() {
        let normalizer = BookUpdateNormalizer::new(BookUpdateMode::Incremental);
        let update = normalizer.normalize(
            vec![
                BookRow::new(dec!(14.3), dec!(1)),
                BookRow::new(dec!(14.4), dec!(2)),
            ],
            vec![
                BookRow::new(dec!(14.7), dec!(1)),
                BookRow::new(dec!(14.6), dec!(3)),
            ],
            42,
        );
        assert_eq!(update.bids[0].price, dec!(14.4));
        assert_eq!(update.asks[0].price, dec!(14.6));
        assert_eq!(update.update_id, 42);
    }

    #[test]
    fn drops_negative_amounts_keeps_zero() {
        let normalizer = BookUpdateNormalizer::new(BookUpdateMode::Incremental);
        let update = normalizer.normalize(
            vec![
                BookRow::new(dec!(14.4), dec!(-1)),
                BookRow::new(dec!(14.3), dec!(0)),
            ],
            vec![],
            1,
        );
        assert_eq!(update.bids, vec![BookRow::new(dec!(14.3), dec!(0))]);
    }

    #[test]
    fn full_book_mode_routes_to_snapshot() {
        assert!(BookUpdateNormalizer::new(BookUpdateMode::FullBook).routes_to_snapshot());
        assert!(!BookUpdateNormalizer::new(BookUpdateMode::Incremental).routes_to_snapshot());
    }
}
