use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;

use super::config::SessionConfig;
use super::connection::Connection;
use crate::Result;
use crate::exception::ExceptionHandler;

#[derive(Debug)]
struct Slots {
    capacity: usize,
    /// Oldest first
    entries: VecDeque<(String, Connection)>,
}

impl Slots {
    fn find(&self, key: &str) -> Option<&Connection> {
        self.entries
            .iter()
            .find_map(|(k, connection)| (k == key).then_some(connection))
    }

    // Every connection leaving the slots is retired before the lock is released.

    fn remove(&mut self, key: &str) -> Option<Connection> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        let (_, connection) = self.entries.remove(index)?;
        connection.retire();
        Some(connection)
    }

    /// Pops the oldest entries until at most `limit` remain.
    fn evict_to(&mut self, limit: usize) -> Vec<(String, Connection)> {
        let excess = self.entries.len().saturating_sub(limit);
        let evicted: Vec<_> = self.entries.drain(..excess).collect();
        for (_, connection) in &evicted {
            connection.retire();
        }
        evicted
    }
}

/// Bounded, insertion-ordered set of connections keyed by endpoint.
///
/// Admitting a new endpoint when the registry is full evicts and closes the oldest one.
/// The lock is never held while a connection is being closed. A connection that leaves the
/// registry is retired and cannot be started again.
#[derive(Debug)]
pub struct Registry {
    exceptions: Arc<ExceptionHandler>,
    slots: Mutex<Slots>,
}

impl Registry {
    pub(crate) fn new(capacity: usize, exceptions: Arc<ExceptionHandler>) -> Self {
        Self {
            exceptions,
            slots: Mutex::new(Slots {
                capacity,
                entries: VecDeque::new(),
            }),
        }
    }

    /// Returns the connection registered for `key`, creating it from `config` if there is none.
    ///
    /// An existing connection keeps its original session parameters and its place in the
    /// eviction order.
    pub async fn get_or_create(&self, key: &str, config: SessionConfig) -> Connection {
        let (connection, evicted) = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = slots.find(key) {
                return existing.clone();
            }

            let limit = slots.capacity.saturating_sub(1);
            let evicted = slots.evict_to(limit);
            let connection =
                Connection::new(key.to_owned(), config, Arc::clone(&self.exceptions));
            slots
                .entries
                .push_back((key.to_owned(), connection.clone()));
            (connection, evicted)
        };

        self.close_evicted(evicted).await;
        connection
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Connection> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find(key)
            .cloned()
    }

    /// Removes and closes the connection for `key`. Returns whether one was registered.
    pub async fn close(&self, key: &str) -> bool {
        let removed = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);

        match removed {
            Some(connection) => {
                connection.close().await;
                true
            }
            None => false,
        }
    }

    /// Closes every connection and empties the registry.
    pub async fn close_all(&self) {
        let drained = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .evict_to(0);

        join_all(drained.iter().map(|(_, connection)| connection.close())).await;
    }

    /// Changes the capacity, evicting the oldest connections that no longer fit.
    pub async fn set_capacity(&self, capacity: usize) -> Result<()> {
        if capacity == 0 {
            return Err(self
                .exceptions
                .validation("connection limit must be greater than 0"));
        }

        let evicted = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.capacity = capacity;
            slots.evict_to(capacity)
        };

        self.close_evicted(evicted).await;
        Ok(())
    }

    /// Registered endpoints, oldest first.
    #[must_use]
    pub fn active_keys(&self) -> Vec<String> {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity
    }

    async fn close_evicted(&self, evicted: Vec<(String, Connection)>) {
        if evicted.is_empty() {
            return;
        }

        let logging = evicted
            .first()
            .is_some_and(|(_, connection)| connection.session_config().logging);
        if logging {
            for (key, _) in &evicted {
                tracing::debug!(endpoint = %key, "evicting WebSocket connection");
            }
        }

        join_all(evicted.iter().map(|(_, connection)| connection.close())).await;
    }
}
