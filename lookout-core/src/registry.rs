//! Connected-viewer registry
//!
//! Tracks who is watching: display name and connect time per session, plus
//! an opaque per-session handle (the server stores each session's outbound
//! queue here). Not synchronized; the owner serializes access.

use std::collections::HashMap;

use chrono::Local;
use serde::{Deserialize, Serialize};

/// Opaque connection identifier
pub type ClientId = String;

pub const DEFAULT_USERNAME: &str = "Anonymous";

/// Public view of a session, as sent in client lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub username: String,
    /// Local time, `YYYY-MM-DD HH:MM:SS`
    pub connected_at: String,
}

struct Entry<H> {
    info: ClientInfo,
    seq: u64,
    handle: H,
}

pub struct ClientRegistry<H = ()> {
    entries: HashMap<ClientId, Entry<H>>,
    next_seq: u64,
}

impl<H> ClientRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Register a session under the default name.
    ///
    /// Returns false, leaving the existing entry untouched, if `id` is
    /// already registered.
    pub fn add(&mut self, id: impl Into<ClientId>, handle: H) -> bool {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return false;
        }
        let info = ClientInfo {
            id: id.clone(),
            username: DEFAULT_USERNAME.to_string(),
            connected_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(id, Entry { info, seq, handle });
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<ClientInfo> {
        self.entries.remove(id).map(|entry| entry.info)
    }

    /// Set the display name. Blank names fall back to the default.
    pub fn set_name(&mut self, id: &str, name: &str) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                let name = name.trim();
                entry.info.username = if name.is_empty() {
                    DEFAULT_USERNAME.to_string()
                } else {
                    name.to_string()
                };
                true
            }
            None => false,
        }
    }

    pub fn name(&self, id: &str) -> Option<&str> {
        self.entries.get(id).map(|e| e.info.username.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn handle(&self, id: &str) -> Option<&H> {
        self.entries.get(id).map(|e| &e.handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current entries in connect order.
    pub fn snapshot(&self) -> Vec<ClientInfo> {
        let mut entries: Vec<&Entry<H>> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.info.clone()).collect()
    }
}

impl<H: Clone> ClientRegistry<H> {
    /// Clone out every handle, for delivery outside the owner's lock.
    pub fn handles(&self) -> Vec<H> {
        self.entries.values().map(|e| e.handle.clone()).collect()
    }
}

impl<H> Default for ClientRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
