//! Signed GetItems client

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, info};

use super::response::{normalize_response, GetItemsResponse, NormalizeContext};
use super::signer::RequestSigner;
use super::{GetItemsOutcome, ProductApi};
use crate::config::{MarketplaceCfg, MarketplaceCredentials};
use crate::shared::errors::FetchError;
use crate::shared::types::Asin;

const GET_ITEMS_PATH: &str = "/paapi5/getitems";

const RESOURCES: &[&str] = &[
    "ItemInfo.Title",
    "Offers.Listings.Price",
    "Offers.Listings.SavingBasis",
    "Offers.Listings.Availability.Message",
    "Offers.Listings.Availability.Type",
    "Offers.Listings.MerchantInfo",
    "Images.Primary.Large",
];

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetItemsRequest<'a> {
    item_ids: Vec<&'a str>,
    resources: &'a [&'a str],
    partner_tag: &'a str,
    partner_type: &'a str,
    marketplace: &'a str,
}

/// Product Advertising API 5 client
pub struct PaApiClient {
    http_client: Client,
    signer: RequestSigner,
    host: String,
    marketplace: String,
    partner_tag: String,
    currency: String,
}

impl PaApiClient {
    pub fn new(cfg: &MarketplaceCfg, credentials: &MarketplaceCredentials) -> Result<Self, FetchError> {
        let http_client = Client::builder()
            .timeout(cfg.timeout())
            .build()
            .map_err(|e| FetchError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            signer: RequestSigner::new(
                &credentials.access_key,
                &credentials.secret_key,
                &cfg.region,
                &cfg.host,
            ),
            host: cfg.host.clone(),
            marketplace: cfg.marketplace.clone(),
            partner_tag: credentials.partner_tag.clone(),
            currency: currency_for(&cfg.marketplace).to_string(),
        })
    }
}

/// Fallback currency when a listing omits one
fn currency_for(marketplace: &str) -> &'static str {
    match marketplace.rsplit('.').next() {
        Some("jp") => "JPY",
        Some("uk") => "GBP",
        Some("de") | Some("fr") | Some("it") | Some("es") => "EUR",
        Some("ca") => "CAD",
        Some("in") => "INR",
        _ => "USD",
    }
}

/// Map a non-success status to the error taxonomy
fn classify_status(status: StatusCode, body: &str) -> FetchError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            FetchError::Timeout(format!("HTTP {}", status))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FetchError::Auth(format!("HTTP {}: {}", status, body))
        }
        s if s.is_server_error() => FetchError::Unavailable(format!("HTTP {}: {}", status, body)),
        _ => FetchError::Rejected(format!("HTTP {}: {}", status, body)),
    }
}

#[async_trait]
impl ProductApi for PaApiClient {
    async fn get_items(&self, asins: &[Asin]) -> Result<GetItemsOutcome, FetchError> {
        let request = GetItemsRequest {
            item_ids: asins.iter().map(|a| a.as_str()).collect(),
            resources: RESOURCES,
            partner_tag: &self.partner_tag,
            partner_type: "Associates",
            marketplace: &self.marketplace,
        };
        let payload = serde_json::to_string(&request).map_err(|e| FetchError::Decode(e.to_string()))?;

        let now = Utc::now();
        let headers = self.signer.sign(GET_ITEMS_PATH, "GetItems", &payload, now);

        info!(count = asins.len(), "Requesting product data");
        let mut builder = self
            .http_client
            .post(format!("https://{}{}", self.host, GET_ITEMS_PATH));
        for (name, value) in &headers {
            if name != "host" {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        let response = builder.body(payload).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let parsed: GetItemsResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;
        debug!(
            items = parsed.items_result.as_ref().map(|r| r.items.len()).unwrap_or(0),
            errors = parsed.errors.len(),
            "GetItems response parsed"
        );

        let ctx = NormalizeContext {
            marketplace: &self.marketplace,
            partner_tag: &self.partner_tag,
            default_currency: &self.currency,
            observed_at: now,
        };
        Ok(normalize_response(parsed, asins, &ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS, ""), FetchError::RateLimited);
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::GATEWAY_TIMEOUT, "").is_transient());
        assert!(!classify_status(StatusCode::BAD_REQUEST, "InvalidPartnerTag").is_transient());
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "UnrecognizedClient"),
            FetchError::Auth(_)
        ));
    }

    #[test]
    fn test_request_payload_shape() {
        let request = GetItemsRequest {
            item_ids: vec!["B0CC944LHR"],
            resources: RESOURCES,
            partner_tag: "tracker-22",
            partner_type: "Associates",
            marketplace: "www.amazon.co.jp",
        };
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["ItemIds"][0], "B0CC944LHR");
        assert_eq!(json["PartnerTag"], "tracker-22");
        assert_eq!(json["PartnerType"], "Associates");
        assert_eq!(json["Marketplace"], "www.amazon.co.jp");
        assert!(json["Resources"].as_array().unwrap().len() >= 6);
    }

    #[test]
    fn test_currency_for_marketplace() {
        assert_eq!(currency_for("www.amazon.co.jp"), "JPY");
        assert_eq!(currency_for("www.amazon.com"), "USD");
        assert_eq!(currency_for("www.amazon.de"), "EUR");
    }
}
