//! Configuration for the ticker
//!
//! Structured settings (the coin list) come from an optional JSON file named
//! by `CRYPTOMULTI_CONFIG`; scalar settings can be overridden from the
//! environment.

use crate::clients::{coingecko, xpmarket};
use crate::models::{ChangePeriod, CoinSpec};
use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub header: String,
    pub coins: Vec<CoinSpec>,

    // Display
    pub vs_currency: String,
    pub change_periods: Vec<ChangePeriod>,
    pub show_headers: bool,
    pub fiat_round: usize,
    pub non_fiat_round: usize,

    // Scheduling
    pub update_interval: Duration,
    pub retry_delay: Duration,

    // Upstream
    pub api_coingecko: String,
    pub api_xpmarket: String,
    pub per_page: u32,
    pub request_timeout: Duration,

    pub debug: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            header: "Crypto".to_string(),
            coins: vec![
                CoinSpec::gecko("bitcoin", Some("BTC")),
                CoinSpec::gecko("ethereum", Some("ETH")),
                CoinSpec::gecko("solana", Some("SOL")),
                CoinSpec::gecko("cardano", Some("ADA")),
            ],
            vs_currency: "usd".to_string(),
            change_periods: vec![ChangePeriod::new("24h"), ChangePeriod::new("7d")],
            show_headers: true,
            fiat_round: 2,
            non_fiat_round: 6,
            update_interval: Duration::from_secs(5 * 60),
            retry_delay: Duration::from_secs(30),
            api_coingecko: coingecko::DEFAULT_BASE_URL.to_string(),
            api_xpmarket: xpmarket::DEFAULT_BASE_URL.to_string(),
            per_page: coingecko::DEFAULT_PER_PAGE,
            request_timeout: Duration::from_secs(30),
            debug: false,
        }
    }
}

/// On-disk JSON shape; durations are milliseconds
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    header: Option<String>,
    coins: Option<Vec<CoinSpec>>,
    vs_currency: Option<String>,
    change_periods: Option<Vec<ChangePeriod>>,
    show_headers: Option<bool>,
    fiat_round: Option<usize>,
    non_fiat_round: Option<usize>,
    update_interval: Option<u64>,
    retry_delay: Option<u64>,
    api_coin_gecko: Option<String>,
    #[serde(rename = "apiXPMarket")]
    api_xpmarket: Option<String>,
    per_page: Option<u32>,
    request_timeout: Option<u64>,
    debug: Option<bool>,
}

impl WidgetConfig {
    /// Load from `CRYPTOMULTI_CONFIG` (if set) and apply environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var("CRYPTOMULTI_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };

        if let Ok(vs) = env::var("CRYPTOMULTI_VS_CURRENCY") {
            config.vs_currency = vs;
        }
        if let Ok(list) = env::var("CRYPTOMULTI_CHANGE_PERIODS") {
            config.change_periods = parse_periods(&list);
        }
        if let Ok(url) = env::var("CRYPTOMULTI_COINGECKO_URL") {
            config.api_coingecko = url;
        }
        if let Ok(url) = env::var("CRYPTOMULTI_XPMARKET_URL") {
            config.api_xpmarket = url;
        }

        config.update_interval = Duration::from_secs(parse_u64(
            "CRYPTOMULTI_UPDATE_INTERVAL_SECS",
            config.update_interval.as_secs(),
        )?);
        config.retry_delay = Duration::from_secs(parse_u64(
            "CRYPTOMULTI_RETRY_DELAY_SECS",
            config.retry_delay.as_secs(),
        )?);
        config.request_timeout = Duration::from_secs(parse_u64(
            "CRYPTOMULTI_REQUEST_TIMEOUT_SECS",
            config.request_timeout.as_secs(),
        )?);
        config.per_page = parse_u32("CRYPTOMULTI_PER_PAGE", config.per_page)?;
        config.debug = parse_bool("CRYPTOMULTI_DEBUG", config.debug)?;

        config.normalized()
    }

    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let file: FileConfig = serde_json::from_str(text)?;
        let mut config = Self::default();

        if let Some(header) = file.header {
            config.header = header;
        }
        if let Some(coins) = file.coins {
            config.coins = coins;
        }
        if let Some(vs) = file.vs_currency {
            config.vs_currency = vs;
        }
        if let Some(periods) = file.change_periods {
            config.change_periods = periods;
        }
        if let Some(show) = file.show_headers {
            config.show_headers = show;
        }
        if let Some(round) = file.fiat_round {
            config.fiat_round = round;
        }
        if let Some(round) = file.non_fiat_round {
            config.non_fiat_round = round;
        }
        if let Some(ms) = file.update_interval {
            config.update_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.retry_delay {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(url) = file.api_coin_gecko {
            config.api_coingecko = url;
        }
        if let Some(url) = file.api_xpmarket {
            config.api_xpmarket = url;
        }
        if let Some(per_page) = file.per_page {
            config.per_page = per_page;
        }
        if let Some(ms) = file.request_timeout {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(debug) = file.debug {
            config.debug = debug;
        }

        config.normalized()
    }

    /// Lower-case currency and periods, then validate
    fn normalized(mut self) -> Result<Self> {
        self.vs_currency = self.vs_currency.trim().to_lowercase();
        if self.vs_currency.is_empty() {
            self.vs_currency = "usd".to_string();
        }

        // ChangePeriod lower-cases on construction; drop blanks
        self.change_periods.retain(|p| !p.as_str().is_empty());
        if self.change_periods.is_empty() {
            self.change_periods = vec![ChangePeriod::new("24h")];
        }

        if self.update_interval.is_zero() {
            return Err(anyhow!("updateInterval must be > 0"));
        }
        if self.retry_delay.is_zero() {
            return Err(anyhow!("retryDelay must be > 0"));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("requestTimeout must be > 0"));
        }
        if self.per_page == 0 || self.per_page > 250 {
            return Err(anyhow!("perPage must be between 1 and 250"));
        }
        Url::parse(&self.api_coingecko)
            .map_err(|e| anyhow!("apiCoinGecko is not a valid URL: {}", e))?;
        Url::parse(&self.api_xpmarket)
            .map_err(|e| anyhow!("apiXPMarket is not a valid URL: {}", e))?;

        Ok(self)
    }
}

/// Comma-separated period list, e.g. "24h, 7D"
fn parse_periods(list: &str) -> Vec<ChangePeriod> {
    list.split(',')
        .map(ChangePeriod::new)
        .filter(|p| !p.as_str().is_empty())
        .collect()
}

/// Parse environment variable as u64 with default fallback
fn parse_u64(var_name: &str, default: u64) -> Result<u64> {
    match env::var(var_name) {
        Ok(val) => val.trim().parse().map_err(|_| anyhow!("{} must be a valid u64", var_name)),
        Err(_) => Ok(default),
    }
}

/// Parse environment variable as u32 with default fallback
fn parse_u32(var_name: &str, default: u32) -> Result<u32> {
    match env::var(var_name) {
        Ok(val) => val.trim().parse().map_err(|_| anyhow!("{} must be a valid u32", var_name)),
        Err(_) => Ok(default),
    }
}

/// Parse environment variable as bool with default fallback
fn parse_bool(var_name: &str, default: bool) -> Result<bool> {
    match env::var(var_name) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("{} must be a boolean", var_name)),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-based loading is not tested here; env vars are process-global and
    // tests run in parallel.

    #[test]
    fn test_defaults_are_valid() {
        let config = WidgetConfig::default().normalized().unwrap();
        assert_eq!(config.coins.len(), 4);
        assert_eq!(config.update_interval, Duration::from_secs(300));
        assert_eq!(config.retry_delay, Duration::from_secs(30));
        assert_eq!(config.vs_currency, "usd");
    }

    #[test]
    fn test_from_json_overrides_and_normalizes() {
        let config = WidgetConfig::from_json(
            r#"{
                "coins": [
                    {"source": "coingecko", "id": "bitcoin", "label": "BTC"},
                    {"source": "xpmarket", "issuer": "rISSUER", "currency": "PLR", "label": "PLR"}
                ],
                "vsCurrency": "XRP",
                "changePeriods": ["24H", "7d"],
                "updateInterval": 60000,
                "retryDelay": 5000,
                "apiXPMarket": "http://localhost:9000/api/v1"
            }"#,
        )
        .unwrap();

        assert_eq!(config.coins.len(), 2);
        assert_eq!(config.coins[1], CoinSpec::xrpl("rISSUER", "PLR", Some("PLR")));
        assert_eq!(config.vs_currency, "xrp");
        assert_eq!(config.change_periods, vec![ChangePeriod::new("24h"), ChangePeriod::new("7d")]);
        assert_eq!(config.update_interval, Duration::from_secs(60));
        assert_eq!(config.retry_delay, Duration::from_secs(5));
        assert_eq!(config.api_xpmarket, "http://localhost:9000/api/v1");
        assert_eq!(config.api_coingecko, coingecko::DEFAULT_BASE_URL);
    }

    #[test]
    fn test_empty_periods_fall_back_to_24h() {
        let config = WidgetConfig::from_json(r#"{"changePeriods": []}"#).unwrap();
        assert_eq!(config.change_periods, vec![ChangePeriod::new("24h")]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(WidgetConfig::from_json(r#"{"retryDelay": 0}"#).is_err());
        assert!(WidgetConfig::from_json(r#"{"perPage": 500}"#).is_err());
        assert!(WidgetConfig::from_json(r#"{"apiCoinGecko": "not a url"}"#).is_err());
        let missing_issuer = r#"{"coins": [{"source": "xpmarket", "currency": "PLR"}]}"#;
        assert!(WidgetConfig::from_json(missing_issuer).is_err());
    }

    #[test]
    fn test_parse_periods() {
        assert_eq!(
            parse_periods("1H, 24h,,7d "),
            vec![ChangePeriod::new("1h"), ChangePeriod::new("24h"), ChangePeriod::new("7d")]
        );
    }

    #[test]
    fn test_parse_u64_with_default() {
        assert_eq!(parse_u64("NON_EXISTENT_VAR_CRYPTOMULTI", 42).unwrap(), 42);
        assert!(parse_bool("NON_EXISTENT_VAR_CRYPTOMULTI", true).unwrap());
    }
}
