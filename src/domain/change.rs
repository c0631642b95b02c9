//! Change detection between two snapshot sets

use serde::{Deserialize, Serialize};
use std::fmt;

use super::product::{ProductSnapshot, SnapshotSet, StockStatus};
use crate::shared::types::{Asin, Money};

/// Classified change for one ASIN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeKind {
    DiscountStarted,
    DiscountEnded,
    DiscountChanged,
    BackInStock,
    OutOfStock,
    NoPriorData,
}

impl ChangeKind {
    pub fn is_discount(&self) -> bool {
        matches!(
            self,
            ChangeKind::DiscountStarted | ChangeKind::DiscountEnded | ChangeKind::DiscountChanged
        )
    }

    pub fn is_stock(&self) -> bool {
        matches!(self, ChangeKind::BackInStock | ChangeKind::OutOfStock)
    }

    /// Everything except `NoPriorData` may become a notification
    pub fn is_notifiable(&self) -> bool {
        self.is_discount() || self.is_stock()
    }

    pub fn describe(&self) -> &'static str {
        match self {
            ChangeKind::DiscountStarted => "discount started",
            ChangeKind::DiscountEnded => "discount ended",
            ChangeKind::DiscountChanged => "discount changed",
            ChangeKind::BackInStock => "back in stock",
            ChangeKind::OutOfStock => "out of stock",
            ChangeKind::NoPriorData => "first observation",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Output of diffing one ASIN's previous and current snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub asin: Asin,
    pub kind: ChangeKind,
    pub previous_price: Option<Money>,
    pub current_price: Option<Money>,
    pub list_price: Option<Money>,
    pub discount_percent: u8,
    pub previous_discount_percent: u8,
    pub in_stock_current: StockStatus,
    /// Discount transition detected alongside a stock transition that took precedence
    pub discount_transition: Option<ChangeKind>,
}

impl ChangeEvent {
    fn from_pair(
        kind: ChangeKind,
        previous: Option<&ProductSnapshot>,
        current: &ProductSnapshot,
    ) -> Self {
        Self {
            asin: current.asin.clone(),
            kind,
            previous_price: previous.and_then(|p| p.price.clone()),
            current_price: current.price.clone(),
            list_price: current.list_price.clone(),
            discount_percent: current.discount_percent(),
            previous_discount_percent: previous.map(|p| p.discount_percent()).unwrap_or(0),
            in_stock_current: current.in_stock,
            discount_transition: None,
        }
    }
}

fn stock_transition(previous: &ProductSnapshot, current: &ProductSnapshot) -> Option<ChangeKind> {
    match (previous.in_stock.is_available(), current.in_stock.is_available()) {
        (false, true) => Some(ChangeKind::BackInStock),
        (true, false) => Some(ChangeKind::OutOfStock),
        _ => None,
    }
}

fn discount_transition(previous: &ProductSnapshot, current: &ProductSnapshot) -> Option<ChangeKind> {
    match (previous.is_discounted(), current.is_discounted()) {
        (false, true) => Some(ChangeKind::DiscountStarted),
        (true, false) => Some(ChangeKind::DiscountEnded),
        (true, true) => (current.discount_percent().abs_diff(previous.discount_percent()) >= 1)
            .then_some(ChangeKind::DiscountChanged),
        (false, false) => None,
    }
}

/// Diff `current` against `previous`, emitting at most one event per ASIN in `current`,
/// in `current`'s order. ASINs without any transition produce no event.
pub fn detect_changes(previous: &SnapshotSet, current: &SnapshotSet) -> Vec<ChangeEvent> {
    current
        .iter()
        .filter_map(|snapshot| classify(previous.get(&snapshot.asin), snapshot))
        .collect()
}

/// Classify a single ASIN. Stock transitions take precedence over discount transitions.
pub fn classify(previous: Option<&ProductSnapshot>, current: &ProductSnapshot) -> Option<ChangeEvent> {
    let Some(previous) = previous else {
        return Some(ChangeEvent::from_pair(ChangeKind::NoPriorData, None, current));
    };

    let stock = stock_transition(previous, current);
    let discount = discount_transition(previous, current);

    match (stock, discount) {
        (Some(stock), discount) => {
            let mut event = ChangeEvent::from_pair(stock, Some(previous), current);
            event.discount_transition = discount;
            Some(event)
        }
        (None, Some(discount)) => Some(ChangeEvent::from_pair(discount, Some(previous), current)),
        (None, None) => None,
    }
}
