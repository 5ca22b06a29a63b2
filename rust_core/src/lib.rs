//! CryptoMulti Core - price table pipeline for a multi-source crypto ticker.
//!
//! This module provides:
//! - CoinGecko batch market client (`/coins/markets`)
//! - XPMarket per-token client with field-alias probing
//! - Merge of both sources into one row per configured coin, in configured order
//! - Refresh scheduler with separate success / retry intervals and clean shutdown
//! - Configuration from a JSON file plus environment overrides
//! - Value formatting shared by presentation layers

pub mod aggregator;
pub mod clients;
pub mod config;
pub mod debug;
pub mod models;
pub mod scheduler;
pub mod utils;

pub use aggregator::{merge_rows, Aggregator, NO_DATA};
pub use clients::{BatchPriceSource, SourceError, TokenPriceSource};
pub use config::WidgetConfig;
pub use debug::{DebugChannel, DebugEvent};
pub use models::{ChangePeriod, CoinSpec, NormalizedRow, OrderedRow, SourceKind};
pub use scheduler::{CycleOutcome, RefreshScheduler, SchedulerHandle, SchedulerPhase, WidgetState};
