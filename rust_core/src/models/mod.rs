//! Shared data model for the ticker pipeline
//!
//! - `CoinSpec`: one configured coin or token, in display order
//! - `NormalizedRow`: what a source adapter produces for one upstream item
//! - `OrderedRow`: a row aligned to its configuration slot, with display label

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Upstream API family a coin is fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "coingecko")]
    CoinGecko,
    #[serde(rename = "xpmarket")]
    XpMarket,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoinGecko => "coingecko",
            Self::XpMarket => "xpmarket",
        }
    }

    /// Case-insensitive parse of a configured source name
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "coingecko" => Some(Self::CoinGecko),
            "xpmarket" => Some(Self::XpMarket),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percentage-change horizon such as "24h" or "7d", always lower-case
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ChangePeriod(String);

impl ChangePeriod {
    pub fn new(period: impl AsRef<str>) -> Self {
        Self(period.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ChangePeriod {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ChangePeriod {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<ChangePeriod> for String {
    fn from(value: ChangePeriod) -> Self {
        value.0
    }
}

impl fmt::Display for ChangePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Period -> percent change. `None` means the source had no value for it.
pub type Changes = BTreeMap<ChangePeriod, Option<f64>>;

/// A coin listed on the CoinGecko markets endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeckoCoin {
    pub id: String,
    pub label: Option<String>,
}

/// An XRPL token looked up on XPMarket by issuer and currency code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XrplToken {
    pub issuer: String,
    pub currency: String,
    pub label: Option<String>,
}

impl XrplToken {
    /// Composite row key, `currency:issuer`
    pub fn key(&self) -> String {
        format!("{}:{}", self.currency, self.issuer)
    }

    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| self.currency.clone())
    }
}

/// One configured entry of the ticker, in display order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCoinSpec")]
pub enum CoinSpec {
    CoinGecko(GeckoCoin),
    XpMarket(XrplToken),
}

impl CoinSpec {
    pub fn gecko(id: &str, label: Option<&str>) -> Self {
        Self::CoinGecko(GeckoCoin {
            id: id.to_string(),
            label: label.map(str::to_string),
        })
    }

    pub fn xrpl(issuer: &str, currency: &str, label: Option<&str>) -> Self {
        Self::XpMarket(XrplToken {
            issuer: issuer.to_string(),
            currency: currency.to_string(),
            label: label.map(str::to_string),
        })
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::CoinGecko(_) => SourceKind::CoinGecko,
            Self::XpMarket(_) => SourceKind::XpMarket,
        }
    }

    /// Key an adapter row must carry to be matched to this entry
    pub fn key(&self) -> String {
        match self {
            Self::CoinGecko(coin) => coin.id.clone(),
            Self::XpMarket(token) => token.key(),
        }
    }

    /// Configured label, else the coin id or token currency
    pub fn display_label(&self) -> String {
        match self {
            Self::CoinGecko(coin) => coin.label.clone().unwrap_or_else(|| coin.id.clone()),
            Self::XpMarket(token) => token.display_label(),
        }
    }

    /// Symbol shown when no upstream data is available
    pub fn fallback_symbol(&self) -> &str {
        match self {
            Self::CoinGecko(coin) => &coin.id,
            Self::XpMarket(token) => &token.currency,
        }
    }
}

/// Loose on-disk shape of a coin entry
#[derive(Debug, Default, Deserialize)]
struct RawCoinSpec {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    issuer: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<RawCoinSpec> for CoinSpec {
    type Error = String;

    fn try_from(raw: RawCoinSpec) -> Result<Self, Self::Error> {
        // Entries without a source are CoinGecko coins
        let kind = match raw.source.as_deref() {
            None => SourceKind::CoinGecko,
            Some(name) => {
                SourceKind::parse(name).ok_or_else(|| format!("unknown coin source '{}'", name))?
            }
        };
        let label = non_empty(raw.label);

        match kind {
            SourceKind::CoinGecko => {
                let id = non_empty(raw.id).ok_or("coingecko coin requires an 'id'")?;
                Ok(Self::CoinGecko(GeckoCoin { id, label }))
            }
            SourceKind::XpMarket => {
                let issuer = non_empty(raw.issuer).ok_or("xpmarket token requires an 'issuer'")?;
                let currency =
                    non_empty(raw.currency).ok_or("xpmarket token requires a 'currency'")?;
                Ok(Self::XpMarket(XrplToken {
                    issuer,
                    currency,
                    label,
                }))
            }
        }
    }
}

/// Common row shape produced by every source adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    pub source: SourceKind,
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub price: Option<f64>,
    pub changes: Changes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NormalizedRow {
    /// Row for a configured coin that has nothing to show
    pub fn unavailable(spec: &CoinSpec, error: impl Into<String>) -> Self {
        Self {
            source: spec.kind(),
            id: spec.key(),
            name: spec.display_label(),
            symbol: spec.fallback_symbol().to_string(),
            price: None,
            changes: Changes::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn change(&self, period: &ChangePeriod) -> Option<f64> {
        self.changes.get(period).copied().flatten()
    }
}

/// A row placed at its configuration index, carrying the display label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedRow {
    pub label: String,
    #[serde(flatten)]
    pub row: NormalizedRow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_spec_defaults_to_coingecko() {
        let spec: CoinSpec = serde_json::from_str(r#"{"id": "bitcoin", "label": "BTC"}"#).unwrap();
        assert_eq!(spec, CoinSpec::gecko("bitcoin", Some("BTC")));
        assert_eq!(spec.key(), "bitcoin");
    }

    #[test]
    fn test_xrpl_token_key_and_label() {
        let spec: CoinSpec = serde_json::from_str(
            r#"{"source": "XPMarket", "issuer": "rISSUER", "currency": "PLR"}"#,
        )
        .unwrap();
        assert_eq!(spec.kind(), SourceKind::XpMarket);
        assert_eq!(spec.key(), "PLR:rISSUER");
        assert_eq!(spec.display_label(), "PLR");
        assert_eq!(spec.fallback_symbol(), "PLR");
    }

    #[test]
    fn test_coin_spec_rejects_incomplete_entries() {
        assert!(serde_json::from_str::<CoinSpec>(r#"{"source": "coingecko"}"#).is_err());
        let missing_currency = r#"{"source": "xpmarket", "issuer": "r1"}"#;
        assert!(serde_json::from_str::<CoinSpec>(missing_currency).is_err());
        assert!(serde_json::from_str::<CoinSpec>(r#"{"source": "kraken", "id": "x"}"#).is_err());
    }

    #[test]
    fn test_change_period_is_lowercased() {
        assert_eq!(ChangePeriod::new(" 24H ").as_str(), "24h");
        let period: ChangePeriod = serde_json::from_str(r#""7D""#).unwrap();
        assert_eq!(period, ChangePeriod::new("7d"));
    }

    #[test]
    fn test_ordered_row_serializes_flat() {
        let row = OrderedRow {
            label: "PLR".to_string(),
            row: NormalizedRow::unavailable(&CoinSpec::xrpl("rISSUER", "PLR", None), "no data"),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["label"], "PLR");
        assert_eq!(json["source"], "xpmarket");
        assert_eq!(json["id"], "PLR:rISSUER");
        assert_eq!(json["error"], "no data");
        assert!(json["price"].is_null());
    }
}
