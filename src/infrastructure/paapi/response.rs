//! PA-API GetItems response shapes and normalization into snapshots

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use super::{GetItemsOutcome, MissingItem};
use crate::domain::product::{ProductSnapshot, StockStatus};
use crate::shared::types::{Asin, Money};

const AMAZON_MERCHANTS: &[&str] = &["Amazon", "Amazon.co.jp", "Amazon.com"];
const IN_STOCK_MARKERS: &[&str] = &["在庫あり", "通常配送無料", "お届け予定", "In Stock", "in stock"];
const OUT_OF_STOCK_MARKERS: &[&str] = &["在庫切れ", "現在お取り扱いできません", "Currently unavailable", "Out of Stock"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemsResponse {
    #[serde(default)]
    pub items_result: Option<ItemsResult>,
    #[serde(default)]
    pub errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResult {
    #[serde(default)]
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    #[serde(rename = "ASIN")]
    pub asin: String,
    #[serde(rename = "DetailPageURL", default)]
    pub detail_page_url: Option<String>,
    #[serde(default)]
    pub item_info: Option<ItemInfo>,
    #[serde(default)]
    pub offers: Option<Offers>,
    #[serde(default)]
    pub images: Option<Images>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemInfo {
    #[serde(default)]
    pub title: Option<DisplayValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisplayValue {
    #[serde(default)]
    pub display_value: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Offers {
    #[serde(default)]
    pub listings: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Listing {
    #[serde(default)]
    pub price: Option<OfferPrice>,
    #[serde(default)]
    pub saving_basis: Option<OfferPrice>,
    #[serde(default)]
    pub availability: Option<Availability>,
    #[serde(default)]
    pub merchant_info: Option<MerchantInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OfferPrice {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Availability {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MerchantInfo {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Images {
    #[serde(default)]
    pub primary: Option<ImageSet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageSet {
    #[serde(default)]
    pub large: Option<Image>,
}

#[derive(Debug, Deserialize)]
pub struct Image {
    #[serde(rename = "URL")]
    pub url: String,
}

/// Everything needed to turn a response into snapshots
pub struct NormalizeContext<'a> {
    pub marketplace: &'a str,
    pub partner_tag: &'a str,
    pub default_currency: &'a str,
    pub observed_at: DateTime<Utc>,
}

impl NormalizeContext<'_> {
    fn money(&self, price: &OfferPrice) -> Option<Money> {
        let amount = price.amount?;
        let currency = price
            .currency
            .clone()
            .unwrap_or_else(|| self.default_currency.to_string());
        Some(Money::new(amount, currency))
    }

    /// Product link carrying the associate tag
    pub fn product_link(&self, asin: &Asin, detail_page_url: Option<&str>) -> String {
        match detail_page_url {
            Some(url) if url.contains("?tag=") || url.contains("&tag=") => url.to_string(),
            Some(url) => {
                let sep = if url.contains('?') { '&' } else { '?' };
                format!("{}{}tag={}", url, sep, self.partner_tag)
            }
            None => format!("https://{}/dp/{}?tag={}", self.marketplace, asin, self.partner_tag),
        }
    }
}

fn stock_status(availability: Option<&Availability>) -> StockStatus {
    let Some(availability) = availability else {
        return StockStatus::Unknown;
    };
    match availability.kind.as_deref() {
        Some("Now") | Some("Backorderable") => return StockStatus::Available,
        Some("OutOfStock") | Some("Unavailable") => return StockStatus::Unavailable,
        _ => {}
    }
    match availability.message.as_deref() {
        Some(msg) if OUT_OF_STOCK_MARKERS.iter().any(|m| msg.contains(m)) => StockStatus::Unavailable,
        Some(msg) if IN_STOCK_MARKERS.iter().any(|m| msg.contains(m)) => StockStatus::Available,
        _ => StockStatus::Unknown,
    }
}

/// Normalize one item. Missing vendor fields become `None` / `Unknown`.
pub fn normalize_item(item: &Item, ctx: &NormalizeContext<'_>) -> Option<ProductSnapshot> {
    let asin: Asin = match item.asin.parse() {
        Ok(asin) => asin,
        Err(e) => {
            warn!(asin = %item.asin, error = %e, "Item with invalid ASIN in response");
            return None;
        }
    };

    let title = item
        .item_info
        .as_ref()
        .and_then(|info| info.title.as_ref())
        .and_then(|t| t.display_value.clone())
        .unwrap_or_default();

    let listing = item.offers.as_ref().and_then(|offers| offers.listings.first());

    let mut snapshot = ProductSnapshot::new(asin, title, ctx.observed_at);
    snapshot.price = listing.and_then(|l| l.price.as_ref()).and_then(|p| ctx.money(p));
    snapshot.list_price = listing
        .and_then(|l| l.saving_basis.as_ref())
        .and_then(|p| ctx.money(p));
    snapshot.in_stock = stock_status(listing.and_then(|l| l.availability.as_ref()));
    snapshot.availability_message = listing
        .and_then(|l| l.availability.as_ref())
        .and_then(|a| a.message.clone());
    snapshot.seller = listing
        .and_then(|l| l.merchant_info.as_ref())
        .and_then(|m| m.name.clone());
    snapshot.sold_by_amazon = snapshot
        .seller
        .as_deref()
        .map(|name| AMAZON_MERCHANTS.contains(&name));
    snapshot.image_url = item
        .images
        .as_ref()
        .and_then(|i| i.primary.as_ref())
        .and_then(|p| p.large.as_ref())
        .map(|l| l.url.clone());
    snapshot.detail_page_url = Some(ctx.product_link(&snapshot.asin, item.detail_page_url.as_deref()));

    if snapshot.has_inverted_prices() {
        warn!(
            asin = %snapshot.asin,
            price = ?snapshot.price.as_ref().map(|p| p.amount),
            list_price = ?snapshot.list_price.as_ref().map(|p| p.amount),
            "Price above list price, treating discount as zero"
        );
    }

    Some(snapshot)
}

/// Split a response into snapshots and per-ASIN permanent failures for `requested`.
pub fn normalize_response(
    response: GetItemsResponse,
    requested: &[Asin],
    ctx: &NormalizeContext<'_>,
) -> GetItemsOutcome {
    let snapshots: Vec<ProductSnapshot> = response
        .items_result
        .map(|r| r.items)
        .unwrap_or_default()
        .iter()
        .filter_map(|item| normalize_item(item, ctx))
        .filter(|s| requested.contains(&s.asin))
        .collect();

    let missing = requested
        .iter()
        .filter(|asin| !snapshots.iter().any(|s| &s.asin == *asin))
        .map(|asin| {
            let reason = response
                .errors
                .iter()
                .find(|e| e.message.contains(asin.as_str()))
                .map(|e| format!("{}: {}", e.code, e.message))
                .unwrap_or_else(|| "item not returned by marketplace API".to_string());
            MissingItem {
                asin: asin.clone(),
                reason,
            }
        })
        .collect();

    GetItemsOutcome { snapshots, missing }
}
