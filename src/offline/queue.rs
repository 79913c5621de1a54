//! Offline Queue
//!
//! FIFO of deferred mutations. Items leave the queue only after they have
//! been replayed successfully.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheStore, SetOptions};
use crate::error::{Result, TransformError};

// == Offline Action ==
/// A cache mutation captured for later replay, carrying the same
/// arguments as the live operation it stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfflineAction {
    Set {
        key: String,
        value: serde_json::Value,
        #[serde(default)]
        options: SetOptions,
    },
    Delete {
        key: String,
    },
    Clear,
}

impl OfflineAction {
    /// Captures a `set` of any serializable value.
    pub fn set<V: Serialize + ?Sized>(
        key: impl Into<String>,
        value: &V,
        options: SetOptions,
    ) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(TransformError::Serialize)?;
        Ok(OfflineAction::Set {
            key: key.into(),
            value,
            options,
        })
    }

    pub fn delete(key: impl Into<String>) -> Self {
        OfflineAction::Delete { key: key.into() }
    }

    /// Wire tag of the action.
    pub fn tag(&self) -> &'static str {
        match self {
            OfflineAction::Set { .. } => "SET",
            OfflineAction::Delete { .. } => "DELETE",
            OfflineAction::Clear => "CLEAR",
        }
    }

    /// Applies the action to the store through the matching live operation.
    pub fn apply(&self, store: &mut CacheStore) -> Result<()> {
        match self {
            OfflineAction::Set {
                key,
                value,
                options,
            } => store.set(key, value, *options),
            OfflineAction::Delete { key } => {
                store.delete(key);
                Ok(())
            }
            OfflineAction::Clear => {
                store.clear();
                Ok(())
            }
        }
    }
}

// == Offline Queue Item ==
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineQueueItem {
    #[serde(flatten)]
    pub action: OfflineAction,
    /// Enqueue time (Unix milliseconds)
    pub enqueued_at: u64,
}

// == Offline Queue ==
/// Ordered buffer of pending actions.
#[derive(Debug, Default)]
pub struct OfflineQueue {
    items: VecDeque<OfflineQueueItem>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action. Returns the new queue length.
    pub fn push(&mut self, action: OfflineAction, enqueued_at: u64) -> usize {
        self.items.push_back(OfflineQueueItem {
            action,
            enqueued_at,
        });
        self.items.len()
    }

    /// Oldest pending item.
    pub fn front(&self) -> Option<&OfflineQueueItem> {
        self.items.front()
    }

    /// Drops the oldest item once it has been replayed.
    pub fn pop_front(&mut self) -> Option<OfflineQueueItem> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
