//! CoinGecko API Client
//!
//! Batch market data from `/coins/markets`: one request covers every
//! configured CoinGecko coin, so any failure fails the whole batch.

use super::error::SourceError;
use super::price_source::{coerce_number, BatchPriceSource};
use crate::debug::DebugChannel;
use crate::models::{ChangePeriod, Changes, NormalizedRow, SourceKind};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

const PROVIDER: &str = "CoinGecko";

/// Characters of an error body kept in the error message
const ERROR_BODY_CHARS: usize = 250;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_PER_PAGE: u32 = 250;

/// CoinGecko markets client
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    per_page: u32,
    debug: DebugChannel,
}

impl CoinGeckoClient {
    /// Create a client against `base_url` (e.g. `https://api.coingecko.com/api/v3`)
    pub fn new(
        base_url: &str,
        per_page: u32,
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
            per_page,
            debug,
        })
    }

    /// Build the `/coins/markets` URL for one batch
    pub fn markets_url(
        &self,
        ids: &[String],
        vs_currency: &str,
        periods: &[ChangePeriod],
    ) -> Result<Url, SourceError> {
        let mut url = Url::parse(&format!("{}/coins/markets", self.base_url))
            .map_err(|e| SourceError::invalid_url(PROVIDER, e.to_string()))?;

        let period_list: Vec<&str> = periods.iter().map(ChangePeriod::as_str).collect();
        url.query_pairs_mut()
            .append_pair("vs_currency", vs_currency)
            .append_pair("ids", &dedup_ids(ids).join(","))
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair("page", "1")
            .append_pair("sparkline", "false")
            .append_pair("price_change_percentage", &period_list.join(","));

        Ok(url)
    }
}

#[async_trait]
impl BatchPriceSource for CoinGeckoClient {
    fn provider_name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_markets(
        &self,
        ids: &[String],
        vs_currency: &str,
        periods: &[ChangePeriod],
    ) -> Result<Vec<NormalizedRow>, SourceError> {
        let url = self.markets_url(ids, vs_currency, periods)?;

        debug!("Fetching {} coins from CoinGecko: {}", ids.len(), url);
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

        parse_markets(&body, periods)
    }
}

/// Ids in first-seen order without repeats
fn dedup_ids(ids: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(String::as_str)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Decode a markets response body into rows
///
/// The body must be a JSON array. Entries are normalized one by one; an entry
/// without a string `id` is skipped, leaving its coin to the "no data" row.
pub fn parse_markets(
    body: &str,
    periods: &[ChangePeriod],
) -> Result<Vec<NormalizedRow>, SourceError> {
    let entries: Vec<Value> =
        serde_json::from_str(body).map_err(|e| SourceError::decode(PROVIDER, e))?;

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let row = entry
                .as_object()
                .and_then(|fields| normalize_market(fields, periods));
            if row.is_none() {
                warn!("Skipping CoinGecko market entry without an id: {}", entry);
            }
            row
        })
        .collect())
}

fn normalize_market(
    fields: &Map<String, Value>,
    periods: &[ChangePeriod],
) -> Option<NormalizedRow> {
    let id = fields.get("id").and_then(Value::as_str)?;
    let text = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let changes: Changes = periods
        .iter()
        .map(|p| (p.clone(), market_change(fields, p)))
        .collect();

    Some(NormalizedRow {
        source: SourceKind::CoinGecko,
        id: id.to_string(),
        name: text("name"),
        symbol: text("symbol"),
        price: fields.get("current_price").and_then(coerce_number),
        changes,
        error: None,
    })
}

/// Currency-qualified change field, falling back to the bare one when the
/// first is missing or null
fn market_change(fields: &Map<String, Value>, period: &ChangePeriod) -> Option<f64> {
    let qualified = format!("price_change_percentage_{}_in_currency", period);
    let bare = format!("price_change_percentage_{}", period);

    [qualified, bare]
        .iter()
        .filter_map(|key| fields.get(key))
        .find(|value| !value.is_null())
        .and_then(coerce_number)
}
