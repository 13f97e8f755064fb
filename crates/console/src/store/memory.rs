use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;
use serde_json::Value;

use super::registry::{self, KeyStyle};
use super::{EntityStore, Key, Kind, Record, StoreError, StoreResult};

struct Table {
    key_style: KeyStyle,
    records: RwLock<BTreeMap<Key, Value>>,
    next_id: AtomicI64,
}

impl Table {
    fn new(key_style: KeyStyle) -> Self {
        Self {
            key_style,
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

/// Process-local store with one table per registered kind.
pub struct InMemoryEntityStore {
    tables: HashMap<Kind, Table>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        let registry = registry::registry();
        let tables = registry
            .kinds()
            .filter_map(|kind| {
                registry
                    .descriptor(kind)
                    .map(|desc| (kind, Table::new(desc.key_style)))
            })
            .collect();
        Self { tables }
    }

    pub fn len(&self, kind: Kind) -> usize {
        self.tables
            .get(&kind)
            .map(|table| table.records.read().len())
            .unwrap_or_default()
    }

    fn table(&self, kind: Kind) -> StoreResult<&Table> {
        self.tables
            .get(&kind)
            .ok_or(StoreError::Unregistered { kind })
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore for InMemoryEntityStore {
    fn get(&self, key: &Key) -> StoreResult<Option<Record>> {
        let table = self.table(key.kind())?;
        Ok(table.records.read().get(key).map(|fields| Record {
            key: key.clone(),
            fields: fields.clone(),
        }))
    }

    fn put(&self, kind: Kind, key: Option<Key>, fields: Value) -> StoreResult<Key> {
        let table = self.table(kind)?;
        let key = match key {
            Some(key) if key.kind() != kind => {
                return Err(StoreError::KindMismatch { key, expected: kind });
            }
            Some(key) => {
                if let Some(id) = key.id() {
                    // Caller-chosen ids must never be handed out again.
                    table.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
                }
                key
            }
            None if table.key_style == KeyStyle::Named => {
                return Err(StoreError::MissingKey { kind });
            }
            None => Key::numeric(kind, table.next_id.fetch_add(1, Ordering::SeqCst)),
        };
        table.records.write().insert(key.clone(), fields);
        tracing::trace!(key = %key, "store.put");
        Ok(key)
    }

    fn delete(&self, key: &Key) -> StoreResult<bool> {
        let table = self.table(key.kind())?;
        let removed = table.records.write().remove(key).is_some();
        tracing::trace!(key = %key, removed, "store.delete");
        Ok(removed)
    }

    fn list(&self, kind: Kind) -> StoreResult<Vec<Record>> {
        let table = self.table(kind)?;
        Ok(table
            .records
            .read()
            .iter()
            .map(|(key, fields)| Record {
                key: key.clone(),
                fields: fields.clone(),
            })
            .collect())
    }
}
