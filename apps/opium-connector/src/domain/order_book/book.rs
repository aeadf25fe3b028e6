//! In-memory order book with monotonic update-sequence tracking.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::domain::shared::TradingPair;

/// One normalized price level row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookRow {
    /// Price of the level.
    pub price: Decimal,
    /// Quantity resting at the level. Zero removes the level in a diff.
    pub amount: Decimal,
}

impl BookRow {
    /// Create a new row.
    #[must_use]
    pub const fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }
}

/// Bid/ask ladder for a single instrument.
///
/// The `update_id` cursor is monotonically non-decreasing: snapshots replace
/// the ladder and the cursor unconditionally (they are authoritative), while
/// diffs carrying a stale update id are dropped so that replayed or
/// reordered updates cannot corrupt the ladder.
#[derive(Debug, Clone)]
pub struct OrderBook {
    trading_pair: TradingPair,
    /// Price -> quantity. Iterated in reverse for best bid.
    bids: BTreeMap<Decimal, Decimal>,
    /// Price -> quantity. Iterated forward for best ask.
    asks: BTreeMap<Decimal, Decimal>,
    update_id: u64,
    last_trade_price: Option<Decimal>,
}

impl OrderBook {
    /// Create an empty book.
    #[must_use]
    pub const fn new(trading_pair: TradingPair) -> Self {
        Self {
            trading_pair,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            update_id: 0,
            last_trade_price: None,
        }
    }

    /// Instrument this book tracks.
    #[must_use]
    pub const fn trading_pair(&self) -> &TradingPair {
        &self.trading_pair
    }

    /// Current update-sequence cursor.
    #[must_use]
    pub const fn update_id(&self) -> u64 {
        self.update_id
    }

    /// Replace the full ladder and cursor from an authoritative snapshot.
    pub fn apply_snapshot(&mut self, bids: &[BookRow], asks: &[BookRow], update_id: u64) {
        self.bids.clear();
        self.asks.clear();
        for row in bids {
            if row.amount > Decimal::ZERO {
                self.bids.insert(row.price, row.amount);
            }
        }
        for row in asks {
            if row.amount > Decimal::ZERO {
                self.asks.insert(row.price, row.amount);
            }
        }
        self.update_id = update_id;
    }

    /// Apply an incremental update.
    ///
    /// Returns `false` without touching the ladder when `update_id` is not
    /// ahead of the cursor (stale or duplicate delivery).
    pub fn apply_diff(&mut self, bids: &[BookRow], asks: &[BookRow], update_id: u64) -> bool {
        if update_id <= self.update_id {
            return false;
        }
        for row in bids {
            Self::apply_level(&mut self.bids, row);
        }
        for row in asks {
            Self::apply_level(&mut self.asks, row);
        }
        self.update_id = update_id;
        true
    }

    fn apply_level(side: &mut BTreeMap<Decimal, Decimal>, row: &BookRow) {
        if row.amount.is_zero() {
            side.remove(&row.price);
        } else {
            side.insert(row.price, row.amount);
        }
    }

    /// Record the price of a public trade print.
    pub fn record_trade(&mut self, price: Decimal) {
        self.last_trade_price = Some(price);
    }

    /// Best (highest) bid, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<BookRow> {
        self.bids
            .iter()
            .next_back()
            .map(|(price, amount)| BookRow::new(*price, *amount))
    }

    /// Best (lowest) ask, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<BookRow> {
        self.asks
            .iter()
            .next()
            .map(|(price, amount)| BookRow::new(*price, *amount))
    }

    /// Mid price between best bid and best ask.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    /// Price of the most recent trade print, if any was observed.
    #[must_use]
    pub const fn last_trade_price(&self) -> Option<Decimal> {
        self.last_trade_price
    }

    /// Number of populated bid levels.
    #[must_use]
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    /// Number of populated ask levels.
    #[must_use]
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }
}
