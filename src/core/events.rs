//! Change notifications for filter state
//!
//! Every apply that changes the state signature publishes a [`FilterChange`]
//! on a [`ChangeBus`]. The bus uses `tokio::sync::broadcast`, so any number
//! of views can follow the same filter manager.
//!
//! ```text
//! apply() ──▶ signature changed? ──▶ callback(params, query)
//!                                 └─▶ ChangeBus::publish() ──▶ subscribers
//! ```

use crate::core::signer::Signature;
use crate::core::state::FilterState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A state change that passed signature comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterChange {
    /// The new parameter object
    pub params: FilterState,
    /// The same parameters, URL-encoded
    pub query: String,
    /// Signature of `params`
    pub signature: Signature,
}

/// Envelope wrapping a change with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the change was applied
    pub timestamp: DateTime<Utc>,
    /// The change itself
    pub change: FilterChange,
}

impl ChangeEnvelope {
    pub fn new(change: FilterChange) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            change,
        }
    }
}

/// Broadcast channel for filter changes
///
/// Cheap to clone; clones share the same channel.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEnvelope>,
}

impl ChangeBus {
    /// Create a bus buffering up to `capacity` changes for slow receivers
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change to all subscribers
    ///
    /// Returns the number of receivers the change was delivered to.
    pub fn publish(&self, change: FilterChange) -> usize {
        // send() only fails without receivers
        self.sender.send(ChangeEnvelope::new(change)).unwrap_or(0)
    }

    /// Receive every change published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEnvelope> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(64)
    }
}
