//! Price Source Traits
//!
//! Common interface for the upstream APIs the ticker reads from.
//! CoinGecko is queried as one batch; XPMarket one token at a time.

use super::error::SourceError;
use crate::models::{ChangePeriod, CoinSpec, NormalizedRow, XrplToken};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Result of fetching a single token. Failures stay data, not control flow.
pub type TokenResult = Result<NormalizedRow, TokenFailure>;

/// A token whose fetch failed, with enough identity to render its row
#[derive(Debug, Clone, PartialEq)]
pub struct TokenFailure {
    pub token: XrplToken,
    pub error: SourceError,
}

impl TokenFailure {
    /// Error row: no price, no changes, error text set
    pub fn into_row(self) -> NormalizedRow {
        NormalizedRow::unavailable(&CoinSpec::XpMarket(self.token), self.error.to_string())
    }
}

/// Source that answers for many coins in one request
///
/// A failure covers the whole batch.
#[async_trait]
pub trait BatchPriceSource: Send + Sync {
    /// Display name used in errors and logs (e.g. "CoinGecko")
    fn provider_name(&self) -> &'static str;

    /// Fetch market rows for `ids`, priced in `vs_currency`
    ///
    /// # Returns
    /// * `Ok(Vec<NormalizedRow>)` - One row per coin upstream returned (unknown ids are omitted)
    /// * `Err` - Transport, HTTP or decode failure
    async fn fetch_markets(
        &self,
        ids: &[String],
        vs_currency: &str,
        periods: &[ChangePeriod],
    ) -> Result<Vec<NormalizedRow>, SourceError>;
}

/// Source with no bulk endpoint, queried per token
#[async_trait]
pub trait TokenPriceSource: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Fetch one token's detail
    async fn fetch_token(
        &self,
        token: &XrplToken,
        periods: &[ChangePeriod],
    ) -> Result<NormalizedRow, SourceError>;

    /// Fetch tokens one after another, isolating failures per token
    ///
    /// Always returns exactly one result per input token, in input order.
    async fn fetch_tokens(
        &self,
        tokens: &[XrplToken],
        periods: &[ChangePeriod],
    ) -> Vec<TokenResult> {
        let mut results = Vec::with_capacity(tokens.len());

        for token in tokens {
            match self.fetch_token(token, periods).await {
                Ok(row) => {
                    debug!(
                        "Got {} from {} (price: {:?})",
                        token.key(),
                        self.provider_name(),
                        row.price
                    );
                    results.push(Ok(row));
                }
                Err(error) => {
                    warn!("{} failed for {}: {}", self.provider_name(), token.key(), error);
                    results.push(Err(TokenFailure {
                        token: token.clone(),
                        error,
                    }));
                }
            }
        }

        results
    }
}

/// Loose numeric coercion for upstream values
///
/// Numbers pass through, numeric strings are parsed, everything else
/// (null, bools, objects, blank or non-numeric strings) is absent.
pub(crate) fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
            }
        }
        _ => None,
    }
}
