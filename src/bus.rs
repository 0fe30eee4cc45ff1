// src/bus.rs

//! Data bus: the key/value store tasks exchange field values through.
//!
//! [`DataBus`] is one store, safe for concurrent access per key.
//! [`BusSet`] is the group of buses attached to a scene engine: reads scan
//! the buses in session order and return the first hit, writes go to every
//! bus.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;

use crate::types::{FieldMap, FieldName, FieldValue, SessionId};

/// Session id of the bus every new engine starts with.
pub const DEFAULT_SESSION: SessionId = 0;

/// Concurrency-safe field store for one execution scope.
///
/// `DashMap` shards its locks, so a `set` and a `get` on the same key are
/// serialized while unrelated keys proceed in parallel. Values are cloned
/// out; nobody ever observes a value mid-write.
#[derive(Debug, Default)]
pub struct DataBus {
    values: DashMap<FieldName, FieldValue>,
}

impl DataBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent value written for `field`, or `None` if never written.
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        self.values.get(field).map(|v| v.value().clone())
    }

    pub fn set(&self, field: impl Into<FieldName>, value: FieldValue) {
        self.values.insert(field.into(), value);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Owned copy of everything on the bus.
    pub fn snapshot(&self) -> FieldMap {
        self.values
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.values.clear();
    }
}

/// The data buses attached to one engine, keyed by session id.
#[derive(Debug)]
pub struct BusSet {
    buses: RwLock<BTreeMap<SessionId, Arc<DataBus>>>,
}

impl Default for BusSet {
    fn default() -> Self {
        Self::new()
    }
}

impl BusSet {
    /// A set holding one fresh bus under [`DEFAULT_SESSION`].
    pub fn new() -> Self {
        let set = Self::empty();
        set.attach(DEFAULT_SESSION, Arc::new(DataBus::new()));
        set
    }

    pub fn empty() -> Self {
        Self {
            buses: RwLock::new(BTreeMap::new()),
        }
    }

    /// Attach `bus` under `session`, returning any bus it replaces.
    pub fn attach(&self, session: SessionId, bus: Arc<DataBus>) -> Option<Arc<DataBus>> {
        self.buses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session, bus)
    }

    pub fn detach(&self, session: SessionId) -> Option<Arc<DataBus>> {
        self.buses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session)
    }

    pub fn bus(&self, session: SessionId) -> Option<Arc<DataBus>> {
        self.buses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session)
            .cloned()
    }

    pub fn sessions(&self) -> Vec<SessionId> {
        self.buses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// First value found for `field`, scanning buses in session order.
    pub fn get(&self, field: &str) -> Option<FieldValue> {
        self.buses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find_map(|bus| bus.get(field))
    }

    /// Write `value` to every attached bus.
    pub fn broadcast(&self, field: &str, value: FieldValue) {
        let buses = self.buses.read().unwrap_or_else(PoisonError::into_inner);
        for bus in buses.values() {
            bus.set(field, value.clone());
        }
    }
}
