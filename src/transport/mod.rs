pub mod channel;
pub mod frame;

use serde_json::Value;

pub use channel::{ChannelConfig, SocketChannel};
pub use frame::Frame;

/// Local lifecycle pseudo-events dispatched to registered handlers.
pub const CONNECT: &str = "connect";
pub const DISCONNECT: &str = "disconnect";

/// Outbound half of the dispatch channel as seen by the rest of the crate.
pub trait EventChannel: Send + Sync {
    /// Fire-and-forget. Never blocks, never reports failure.
    fn emit(&self, event: &str, data: Value);

    fn is_connected(&self) -> bool;
}
