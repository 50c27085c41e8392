// lib/crates/spawn-common/src/history.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One past run, persisted as an element of `~/.spawn/history.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRecord {
    pub agent: String,
    pub cloud: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<Connection>,
}

/// How to reach the server a run created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub ip: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// A connection is deleted only when `deleted` is explicitly `true`.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted == Some(true)
    }
}

impl SpawnRecord {
    /// A record is active unless its connection has been marked deleted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.connection.as_ref().is_some_and(Connection::is_deleted)
    }

    /// Exact match on agent, cloud and name.
    #[must_use]
    pub fn matches(&self, agent: &str, cloud: &str, name: &str) -> bool {
        self.agent == agent && self.cloud == cloud && self.name.as_deref() == Some(name)
    }
}
