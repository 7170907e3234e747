//! Named channel registry: at most one live transport per name.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::ClientError;
use crate::network::Transport;

/// Maps a channel name to its single live transport.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Box<dyn Transport>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `transport` under `name`. Any transport already holding
    /// the name is closed first, so no open socket is left dangling.
    pub fn add(&mut self, name: &str, transport: Box<dyn Transport>) {
        if let Some(old) = self.channels.remove(name) {
            // close() only signals the connection task; it cannot call
            // back into the registry.
            old.close();
        }
        self.channels.insert(name.to_string(), transport);
    }

    /// Writes an already-serialized frame to the named channel.
    pub fn send_raw(&self, name: &str, text: String) -> Result<(), ClientError> {
        match self.channels.get(name) {
            Some(transport) => transport.send(text),
            None => Err(ClientError::ChannelNotFound(name.to_string())),
        }
    }

    /// Closes and deregisters `name`. Removing an absent name is a no-op.
    pub fn remove(&mut self, name: &str) {
        if let Some(transport) = self.channels.remove(name) {
            transport.close();
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }
}

/// Cloneable handle to the registry shared by the active sessions.
///
/// The lock is held for map access only, never across an await.
#[derive(Clone, Default)]
pub struct Channels {
    inner: Arc<Mutex<ChannelRegistry>>,
}

impl Channels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, name: &str, transport: Box<dyn Transport>) {
        self.inner.lock().unwrap().add(name, transport);
    }

    /// Serializes `message` to JSON and writes it to the named channel.
    ///
    /// A missing channel surfaces as [`ClientError::ChannelNotFound`];
    /// callers treat that as a dropped message, not a failure.
    pub fn send<T: Serialize>(&self, name: &str, message: &T) -> Result<(), ClientError> {
        let text = serde_json::to_string(message)?;
        self.inner.lock().unwrap().send_raw(name, text)
    }

    pub fn remove(&self, name: &str) {
        self.inner.lock().unwrap().remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().unwrap().contains(name)
    }
}
