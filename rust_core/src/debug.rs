//! Optional diagnostic side channel
//!
//! Adapters report the URLs they request here when the `debug` flag is set.
//! Nothing on this channel is needed for correctness.

use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// A request about to be sent upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugEvent {
    pub provider: &'static str,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct DebugChannel {
    sender: Option<UnboundedSender<DebugEvent>>,
}

impl DebugChannel {
    /// A channel that drops everything
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Enabled channel plus the receiving end for the consumer
    pub fn enabled() -> (Self, UnboundedReceiver<DebugEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    pub fn emit(&self, provider: &'static str, url: &str) {
        if let Some(sender) = &self.sender {
            // Receiver may already be gone during shutdown
            let _ = sender.send(DebugEvent {
                provider,
                url: url.to_string(),
            });
        }
    }
}
