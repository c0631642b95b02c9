//! Product snapshots and discount arithmetic

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::shared::types::{Asin, Money};

/// Observed stock availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Available,
    Unavailable,
    Unknown,
}

impl StockStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, StockStatus::Available)
    }
}

/// One ASIN's observed state at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub asin: Asin,
    pub title: String,
    pub price: Option<Money>,
    pub list_price: Option<Money>,
    pub in_stock: StockStatus,
    pub sold_by_amazon: Option<bool>,
    pub observed_at: DateTime<Utc>,

    // Presentation details, not used for diffing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_page_url: Option<String>,
}

impl ProductSnapshot {
    /// Snapshot with only the fields needed for diffing; presentation details left empty.
    pub fn new(asin: Asin, title: impl Into<String>, observed_at: DateTime<Utc>) -> Self {
        Self {
            asin,
            title: title.into(),
            price: None,
            list_price: None,
            in_stock: StockStatus::Unknown,
            sold_by_amazon: None,
            observed_at,
            availability_message: None,
            seller: None,
            image_url: None,
            detail_page_url: None,
        }
    }

    /// `price < list_price`, false when either is missing or currencies differ
    pub fn is_discounted(&self) -> bool {
        match (&self.price, &self.list_price) {
            (Some(price), Some(list)) if price.same_currency(list) => price.amount < list.amount,
            _ => false,
        }
    }

    /// Unrounded discount percentage, clamped to [0, 100]
    pub fn raw_discount_percent(&self) -> Decimal {
        match (&self.price, &self.list_price) {
            (Some(price), Some(list))
                if price.same_currency(list) && list.amount > Decimal::ZERO =>
            {
                let pct = Decimal::ONE_HUNDRED * (Decimal::ONE - price.amount / list.amount);
                pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
            }
            _ => Decimal::ZERO,
        }
    }

    /// Discount percentage rounded half away from zero, 0 when not computable
    pub fn discount_percent(&self) -> u8 {
        self.raw_discount_percent()
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u8()
            .unwrap_or(0)
    }

    /// `list_price - price` when the product is discounted
    pub fn saved_amount(&self) -> Option<Money> {
        match (&self.price, &self.list_price) {
            (Some(price), Some(list)) if self.is_discounted() => {
                Some(Money::new(list.amount - price.amount, list.currency.clone()))
            }
            _ => None,
        }
    }

    /// True when the price exceeds the list price; the discount is then treated as zero.
    pub fn has_inverted_prices(&self) -> bool {
        match (&self.price, &self.list_price) {
            (Some(price), Some(list)) if price.same_currency(list) => price.amount > list.amount,
            _ => false,
        }
    }
}

/// One run's full observation, keyed by ASIN and remembering insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotSet {
    order: Vec<Asin>,
    products: HashMap<Asin, ProductSnapshot>,
}

impl SnapshotSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a snapshot. A replaced ASIN keeps its original position.
    pub fn insert(&mut self, snapshot: ProductSnapshot) {
        let asin = snapshot.asin.clone();
        if self.products.insert(asin.clone(), snapshot).is_none() {
            self.order.push(asin);
        }
    }

    pub fn get(&self, asin: &Asin) -> Option<&ProductSnapshot> {
        self.products.get(asin)
    }

    pub fn contains(&self, asin: &Asin) -> bool {
        self.products.contains_key(asin)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Snapshots in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ProductSnapshot> {
        self.order.iter().filter_map(|asin| self.products.get(asin))
    }

    pub fn asins(&self) -> impl Iterator<Item = &Asin> {
        self.order.iter()
    }

    /// Append every snapshot of `other`, later entries replacing earlier ones
    pub fn extend(&mut self, other: SnapshotSet) {
        let SnapshotSet { order, mut products } = other;
        for asin in order {
            if let Some(snapshot) = products.remove(&asin) {
                self.insert(snapshot);
            }
        }
    }
}

impl FromIterator<ProductSnapshot> for SnapshotSet {
    fn from_iter<I: IntoIterator<Item = ProductSnapshot>>(iter: I) -> Self {
        let mut set = SnapshotSet::new();
        for snapshot in iter {
            set.insert(snapshot);
        }
        set
    }
}
