//! XPMarket API Client
//!
//! Per-token detail lookups for XRPL tokens. There is no bulk endpoint and
//! field naming differs between deployments, so price and change values are
//! probed through fixed alias lists.

use super::error::SourceError;
use super::price_source::{coerce_number, TokenPriceSource};
use crate::debug::DebugChannel;
use crate::models::{ChangePeriod, Changes, NormalizedRow, SourceKind, XrplToken};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const PROVIDER: &str = "XPMarket";

const ERROR_BODY_CHARS: usize = 200;

pub const DEFAULT_BASE_URL: &str = "https://api.xpmarket.com/api/v1";

/// Price field aliases, highest priority first
const PRICE_KEYS: &[&str] = &["last_price", "price", "lastPrice", "last"];

/// Change field aliases per period, highest priority first
const CHANGE_KEYS: &[(&str, &[&str])] = &[
    (
        "1h",
        &[
            "change_1h",
            "price_change_1h",
            "price_change_percentage_1h",
            "price_change_1h_in_currency",
        ],
    ),
    (
        "24h",
        &[
            "change_24h",
            "price_change_24h",
            "price_change_percentage_24h",
            "price_change_24h_in_currency",
        ],
    ),
    (
        "7d",
        &[
            "change_7d",
            "price_change_7d",
            "price_change_percentage_7d",
            "price_change_7d_in_currency",
        ],
    ),
    (
        "30d",
        &[
            "change_30d",
            "price_change_30d",
            "price_change_percentage_30d",
            "price_change_30d_in_currency",
        ],
    ),
    (
        "1y",
        &[
            "change_1y",
            "price_change_1y",
            "price_change_percentage_1y",
            "price_change_1y_in_currency",
        ],
    ),
];

/// Candidate change fields for a period; empty for periods XPMarket never reports
pub fn change_keys(period: &ChangePeriod) -> &'static [&'static str] {
    CHANGE_KEYS
        .iter()
        .find(|(name, _)| *name == period.as_str())
        .map(|(_, keys)| *keys)
        .unwrap_or(&[])
}

/// XPMarket token detail client
pub struct XpMarketClient {
    client: Client,
    base_url: String,
    debug: DebugChannel,
}

impl XpMarketClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        debug: DebugChannel,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("CryptoMulti/1.0")
            .build()
            .map_err(|e| SourceError::request(PROVIDER, e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            debug,
        })
    }

    /// `{base}/tokens/{issuer}/{currency}`, each segment percent-encoded
    pub fn token_url(&self, token: &XrplToken) -> Result<Url, SourceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SourceError::invalid_url(PROVIDER, e.to_string()))?;
        let cannot_be_base = format!("{} cannot be a base", self.base_url);

        url.path_segments_mut()
            .map_err(|_| SourceError::invalid_url(PROVIDER, cannot_be_base))?
            .pop_if_empty()
            .push("tokens")
            .push(&token.issuer)
            .push(&token.currency);

        Ok(url)
    }
}

#[async_trait]
impl TokenPriceSource for XpMarketClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_token(
        &self,
        token: &XrplToken,
        periods: &[ChangePeriod],
    ) -> Result<NormalizedRow, SourceError> {
        let url = self.token_url(token)?;

        debug!("Fetching {} from XPMarket: {}", token.key(), url);
        self.debug.emit(PROVIDER, url.as_str());

        let response = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| SourceError::request(PROVIDER, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::request(PROVIDER, e))?;

        if !status.is_success() {
            return Err(SourceError::http(
                PROVIDER,
                status.as_u16(),
                &body,
                ERROR_BODY_CHARS,
            ));
        }

        let detail: Value =
            serde_json::from_str(&body).map_err(|e| SourceError::decode(PROVIDER, e))?;

        Ok(normalize_token(token, &detail, periods))
    }
}

/// Build a row from a token detail document
pub fn normalize_token(
    token: &XrplToken,
    detail: &Value,
    periods: &[ChangePeriod],
) -> NormalizedRow {
    let changes: Changes = periods
        .iter()
        .map(|p| (p.clone(), token_change(detail, p)))
        .collect();

    NormalizedRow {
        source: SourceKind::XpMarket,
        id: token.key(),
        name: token.display_label(),
        symbol: token.currency.clone(),
        price: token_price(detail),
        changes,
        error: None,
    }
}

/// First non-null price alias
fn token_price(detail: &Value) -> Option<f64> {
    PRICE_KEYS
        .iter()
        .filter_map(|key| detail.get(*key))
        .find(|value| !value.is_null())
        .and_then(coerce_number)
}

/// First present change alias; a present null ends the search as absent
fn token_change(detail: &Value, period: &ChangePeriod) -> Option<f64> {
    change_keys(period)
        .iter()
        .find_map(|key| detail.get(*key))
        .and_then(coerce_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token() -> XrplToken {
        XrplToken {
            issuer: "rISSUER".to_string(),
            currency: "PLR".to_string(),
            label: Some("Pillar".to_string()),
        }
    }

    fn periods() -> Vec<ChangePeriod> {
        vec![ChangePeriod::new("24h"), ChangePeriod::new("7d")]
    }

    #[test]
    fn test_token_url_encodes_segments() {
        let client = XpMarketClient::new(
            "https://api.xpmarket.com/api/v1/",
            Duration::from_secs(5),
            DebugChannel::disabled(),
        )
        .unwrap();
        let weird = XrplToken {
            issuer: "r/ISS UER".to_string(),
            currency: "A?B".to_string(),
            label: None,
        };

        let url = client.token_url(&token()).unwrap();
        assert_eq!(url.as_str(), "https://api.xpmarket.com/api/v1/tokens/rISSUER/PLR");

        let url = client.token_url(&weird).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.xpmarket.com/api/v1/tokens/r%2FISS%20UER/A%3FB"
        );
    }

    #[test]
    fn test_price_alias_priority() {
        let detail = json!({"price": 0.5, "last": 0.7});
        assert_eq!(token_price(&detail), Some(0.5));

        let detail = json!({"last_price": null, "lastPrice": "0.25"});
        assert_eq!(token_price(&detail), Some(0.25));

        assert_eq!(token_price(&json!({"volume": 10})), None);
    }

    #[test]
    fn test_change_alias_first_present_wins() {
        let detail = json!({"price_change_24h": 1.0, "price_change_percentage_24h": 2.0});
        assert_eq!(token_change(&detail, &ChangePeriod::new("24h")), Some(1.0));

        // A present null stops the search
        let detail = json!({"change_24h": null, "price_change_24h": 3.0});
        assert_eq!(token_change(&detail, &ChangePeriod::new("24h")), None);
    }

    #[test]
    fn test_price_24h_is_not_a_change() {
        let detail = json!({"last_price": 1.2, "price_24h": 1.1});
        let row = normalize_token(&token(), &detail, &periods());

        assert_eq!(row.price, Some(1.2));
        assert_eq!(row.changes.get(&ChangePeriod::new("24h")), Some(&None));
        assert_eq!(row.change(&ChangePeriod::new("24h")), None);
    }

    #[test]
    fn test_unknown_period_is_absent() {
        assert!(change_keys(&ChangePeriod::new("14d")).is_empty());
        let detail = json!({"change_14d": 5.0});
        assert_eq!(token_change(&detail, &ChangePeriod::new("14d")), None);
    }

    #[test]
    fn test_normalize_token_identity() {
        let detail = json!({"last_price": "0.031", "change_7d": -12.5});
        let row = normalize_token(&token(), &detail, &periods());

        assert_eq!(row.source, SourceKind::XpMarket);
        assert_eq!(row.id, "PLR:rISSUER");
        assert_eq!(row.name, "Pillar");
        assert_eq!(row.symbol, "PLR");
        assert_eq!(row.price, Some(0.031));
        assert_eq!(row.change(&ChangePeriod::new("7d")), Some(-12.5));
    }
}
