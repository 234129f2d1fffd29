use serde::{Deserialize, Serialize};

/// Tag carried by every envelope describing why it was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Connectivity probe sent once while the client is being built.
    Connect,
    /// A regular event from a producer.
    Data,
    /// Final marker written while the client drains.
    Closing,
}
