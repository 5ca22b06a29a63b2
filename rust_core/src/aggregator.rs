//! Fetch-cycle aggregation
//!
//! Runs the CoinGecko batch, then the XPMarket per-token loop, and lines the
//! resulting rows up with the configured coin list. Every configured coin
//! gets exactly one output row, in configured order.

use crate::clients::{
    BatchPriceSource, CoinGeckoClient, SourceError, TokenFailure, TokenPriceSource, XpMarketClient,
};
use crate::config::WidgetConfig;
use crate::debug::DebugChannel;
use crate::models::{ChangePeriod, CoinSpec, NormalizedRow, OrderedRow, XrplToken};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Error text of a configured coin the sources returned nothing for
pub const NO_DATA: &str = "no data";

pub struct Aggregator {
    coins: Arc<[CoinSpec]>,
    vs_currency: String,
    periods: Vec<ChangePeriod>,
    coingecko: Arc<dyn BatchPriceSource>,
    xpmarket: Arc<dyn TokenPriceSource>,
}

impl Aggregator {
    pub fn new(
        coins: Vec<CoinSpec>,
        vs_currency: &str,
        periods: Vec<ChangePeriod>,
        coingecko: Arc<dyn BatchPriceSource>,
        xpmarket: Arc<dyn TokenPriceSource>,
    ) -> Self {
        Self {
            coins: coins.into(),
            vs_currency: vs_currency.to_string(),
            periods,
            coingecko,
            xpmarket,
        }
    }

    /// Wire the reqwest-backed sources described by `config`
    pub fn from_config(config: &WidgetConfig, debug: DebugChannel) -> Result<Self, SourceError> {
        let coingecko = CoinGeckoClient::new(
            &config.api_coingecko,
            config.per_page,
            config.request_timeout,
            debug.clone(),
        )?;
        let xpmarket = XpMarketClient::new(&config.api_xpmarket, config.request_timeout, debug)?;

        Ok(Self::new(
            config.coins.clone(),
            &config.vs_currency,
            config.change_periods.clone(),
            Arc::new(coingecko),
            Arc::new(xpmarket),
        ))
    }

    pub fn coins(&self) -> &[CoinSpec] {
        &self.coins
    }

    /// Run one complete fetch cycle
    ///
    /// # Returns
    /// * `Ok(rows)` - One row per configured coin; XPMarket failures and
    ///   missing coins appear as rows with `error` set
    /// * `Err` - The CoinGecko batch failed; no partial table is produced
    pub async fn run_cycle(&self) -> Result<Vec<OrderedRow>, SourceError> {
        let started = Instant::now();
        let mut rows: Vec<NormalizedRow> = Vec::new();

        let gecko_ids: Vec<String> = self
            .coins
            .iter()
            .filter_map(|coin| match coin {
                CoinSpec::CoinGecko(gecko) => Some(gecko.id.clone()),
                CoinSpec::XpMarket(_) => None,
            })
            .collect();

        if !gecko_ids.is_empty() {
            match self
                .coingecko
                .fetch_markets(&gecko_ids, &self.vs_currency, &self.periods)
                .await
            {
                Ok(batch) => rows.extend(batch),
                Err(e) => {
                    warn!("{} batch failed, aborting cycle: {}", self.coingecko.provider_name(), e);
                    return Err(e);
                }
            }
        }

        let tokens: Vec<XrplToken> = self
            .coins
            .iter()
            .filter_map(|coin| match coin {
                CoinSpec::XpMarket(token) => Some(token.clone()),
                CoinSpec::CoinGecko(_) => None,
            })
            .collect();

        if !tokens.is_empty() {
            let results = self.xpmarket.fetch_tokens(&tokens, &self.periods).await;
            rows.extend(
                results
                    .into_iter()
                    .map(|result| result.unwrap_or_else(TokenFailure::into_row)),
            );
        }

        let ordered = merge_rows(&self.coins, &rows);

        info!(
            "Fetch cycle complete: {} rows ({} with errors) in {}ms",
            ordered.len(),
            ordered.iter().filter(|r| r.row.is_error()).count(),
            started.elapsed().as_millis()
        );

        Ok(ordered)
    }
}

/// Align adapter rows with the configured coin list
///
/// For each coin, the first row with the same source and key is used; a coin
/// listed twice yields the same row twice. Coins without a row get a
/// `"no data"` placeholder. The configured label always wins over the
/// upstream name.
pub fn merge_rows(coins: &[CoinSpec], rows: &[NormalizedRow]) -> Vec<OrderedRow> {
    coins
        .iter()
        .map(|coin| {
            let kind = coin.kind();
            let key = coin.key();
            let row = rows
                .iter()
                .find(|row| row.source == kind && row.id == key)
                .cloned()
                .unwrap_or_else(|| NormalizedRow::unavailable(coin, NO_DATA));

            OrderedRow {
                label: coin.display_label(),
                row,
            }
        })
        .collect()
}
