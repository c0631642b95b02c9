//! Channel-agnostic notification text

use crate::domain::change::{ChangeEvent, ChangeKind};
use crate::domain::product::{ProductSnapshot, StockStatus};
use crate::infrastructure::channels::Message;
use crate::shared::types::{Asin, Money};
use crate::shared::utils::format_amount;

const UNTITLED: &str = "(untitled)";

fn price_label(money: &Money) -> String {
    if money.currency == "JPY" {
        format!("{}円", format_amount(money.amount))
    } else {
        money.to_string()
    }
}

fn stock_label(status: StockStatus, message: Option<&str>) -> String {
    match message {
        Some(m) if !m.trim().is_empty() => m.trim().to_string(),
        _ => match status {
            StockStatus::Available => "在庫あり".to_string(),
            StockStatus::Unavailable => "在庫切れ".to_string(),
            StockStatus::Unknown => "不明".to_string(),
        },
    }
}

/// Builds the post body for an approved event
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    marketplace: String,
    partner_tag: String,
    hashtags: Vec<String>,
}

impl MessageFormatter {
    pub fn new(marketplace: impl Into<String>, partner_tag: impl Into<String>, hashtags: Vec<String>) -> Self {
        Self {
            marketplace: marketplace.into(),
            partner_tag: partner_tag.into(),
            hashtags,
        }
    }

    fn link(&self, asin: &Asin, snapshot: Option<&ProductSnapshot>) -> String {
        match snapshot.and_then(|s| s.detail_page_url.as_deref()) {
            Some(url) => url.to_string(),
            None => format!("https://{}/dp/{}?tag={}", self.marketplace, asin, self.partner_tag),
        }
    }

    fn headline(event: &ChangeEvent) -> String {
        match event.kind {
            ChangeKind::DiscountStarted => format!("🔥【{}%オフ】Amazon割引情報🔥", event.discount_percent),
            ChangeKind::DiscountChanged => format!(
                "🔁【割引率変更 {}%→{}%】Amazon割引情報",
                event.previous_discount_percent, event.discount_percent
            ),
            ChangeKind::DiscountEnded => "⏰【セール終了】Amazon割引が終了しました".to_string(),
            ChangeKind::BackInStock => "📦【入荷速報】Amazonで在庫復活！📦".to_string(),
            ChangeKind::OutOfStock => "⚠️【在庫切れ】Amazonで売り切れました".to_string(),
            ChangeKind::NoPriorData => "📢【商品情報更新】Amazon商品情報📢".to_string(),
        }
    }

    /// `snapshot` is the current observation of the event's ASIN, when available
    pub fn format(&self, event: &ChangeEvent, snapshot: Option<&ProductSnapshot>) -> Message {
        let title = snapshot
            .map(|s| s.title.trim())
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED);

        let mut text = format!("{}\n\n{}\n\n", Self::headline(event), title);

        // Discount details ride along on stock events too
        match (&event.current_price, &event.list_price) {
            (Some(price), Some(list)) if event.discount_percent > 0 => {
                text.push_str(&format!("✅ 現在価格: {}\n", price_label(price)));
                text.push_str(&format!("❌ 元の価格: {}\n", price_label(list)));
                if let Some(saved) = snapshot.and_then(|s| s.saved_amount()) {
                    text.push_str(&format!("💰 割引額: {}\n", price_label(&saved)));
                }
            }
            (Some(price), _) => {
                text.push_str(&format!("💲 価格: {}\n", price_label(price)));
                if event.kind == ChangeKind::DiscountEnded {
                    if let Some(previous) = &event.previous_price {
                        text.push_str(&format!("📉 セール時価格: {}\n", price_label(previous)));
                    }
                }
            }
            (None, _) => {}
        }

        if event.kind.is_stock() {
            let message = snapshot.and_then(|s| s.availability_message.as_deref());
            text.push_str(&format!("📋 在庫状況: {}\n", stock_label(event.in_stock_current, message)));
        }
        if let Some(seller) = snapshot.and_then(|s| s.seller.as_deref()) {
            text.push_str(&format!("🏪 販売: {}\n", seller));
        }

        text.push_str(&format!("\n🛒 商品ページ: {}", self.link(&event.asin, snapshot)));
        if !self.hashtags.is_empty() {
            text.push_str("\n\n");
            text.push_str(&self.hashtags.join(" "));
        }

        Message {
            text,
            image_url: snapshot.and_then(|s| s.image_url.clone()),
        }
    }
}
