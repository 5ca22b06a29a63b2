pub mod coingecko;
pub mod error;
pub mod price_source;
pub mod xpmarket;

// Re-export commonly used types
pub use coingecko::CoinGeckoClient;
pub use error::SourceError;
pub use price_source::{BatchPriceSource, TokenFailure, TokenPriceSource, TokenResult};
pub use xpmarket::XpMarketClient;
