//! Keyed persistence for console entities.
//!
//! Records are stored as JSON field bags under a [`Key`]. Typed access goes
//! through [`EntityStoreExt`], which every store gets for free.

pub mod memory;
pub mod registry;
pub mod seed;

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use memory::InMemoryEntityStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Package,
    PackageVersion,
    Repository,
    License,
}

impl Kind {
    pub const ALL: [Kind; 4] = [
        Kind::Package,
        Kind::PackageVersion,
        Kind::Repository,
        Kind::License,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Package => "Package",
            Kind::PackageVersion => "PackageVersion",
            Kind::Repository => "Repository",
            Kind::License => "License",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a record within its kind. Immutable once assigned.
///
/// Named keys sort before numeric ones, so listings show natural names first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Key {
    Named { kind: Kind, name: String },
    Numeric { kind: Kind, id: i64 },
}

impl Key {
    pub fn named(kind: Kind, name: impl Into<String>) -> Self {
        Key::Named {
            kind,
            name: name.into(),
        }
    }

    pub fn numeric(kind: Kind, id: i64) -> Self {
        Key::Numeric { kind, id }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Key::Named { kind, .. } | Key::Numeric { kind, .. } => *kind,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Key::Named { name, .. } => Some(name),
            Key::Numeric { .. } => None,
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Key::Numeric { id, .. } => Some(*id),
            Key::Named { .. } => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Named { kind, name } => write!(f, "{kind}:{name}"),
            Key::Numeric { kind, id } => write!(f, "{kind}#{id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub key: Key,
    pub fields: Value,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity kind {kind} is not registered")]
    Unregistered { kind: Kind },

    #[error("{kind} records need a named key")]
    MissingKey { kind: Kind },

    #[error("key {key} does not belong to kind {expected}")]
    KindMismatch { key: Key, expected: Kind },

    #[error("failed to encode {kind} entity")]
    Encode {
        kind: Kind,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode record {key}")]
    Decode {
        key: Key,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Synchronous keyed store. Calls may block the calling worker.
///
/// Writes are single-record and last-write-wins; no version token is kept.
pub trait EntityStore: Send + Sync {
    /// Absent keys yield `Ok(None)`.
    fn get(&self, key: &Key) -> StoreResult<Option<Record>>;

    /// Upserts `fields` under `key`, or under a fresh numeric key of `kind`
    /// when `key` is `None`. Returns the key the record now lives under.
    fn put(&self, kind: Kind, key: Option<Key>, fields: Value) -> StoreResult<Key>;

    /// Returns whether a record was removed.
    fn delete(&self, key: &Key) -> StoreResult<bool>;

    /// All records of `kind`, ordered by key.
    fn list(&self, kind: Kind) -> StoreResult<Vec<Record>>;
}

/// A persisted domain type.
pub trait Entity: Serialize + DeserializeOwned {
    const KIND: Kind;

    /// Key carried over from a previous load or save.
    fn assigned_key(&self) -> Option<&Key>;

    fn assign_key(&mut self, key: Key);

    /// Key derived from the entity's own fields, for kinds that have one.
    fn natural_key(&self) -> Option<Key> {
        None
    }

    /// The key a save would write under. An assigned key always wins over
    /// the natural one, so edits to naming fields never move a record.
    fn key(&self) -> Option<Key> {
        self.assigned_key().cloned().or_else(|| self.natural_key())
    }
}

/// Typed access on top of any [`EntityStore`].
pub trait EntityStoreExt: EntityStore {
    fn load<T: Entity>(&self, key: &Key) -> StoreResult<Option<T>> {
        ensure_kind(key, T::KIND)?;
        self.get(key)?.map(decode::<T>).transpose()
    }

    /// Persists `entity` and writes the resulting key back into it, so a
    /// second save of the same state is an upsert of the same record.
    fn save<T: Entity>(&self, entity: &mut T) -> StoreResult<Key> {
        let key = entity.key();
        if let Some(key) = key.as_ref() {
            ensure_kind(key, T::KIND)?;
        }
        let fields = serde_json::to_value(&*entity).map_err(|source| StoreError::Encode {
            kind: T::KIND,
            source,
        })?;
        let key = self.put(T::KIND, key, fields)?;
        entity.assign_key(key.clone());
        Ok(key)
    }

    fn load_all<T: Entity>(&self) -> StoreResult<Vec<T>> {
        self.list(T::KIND)?.into_iter().map(decode::<T>).collect()
    }
}

impl<S: EntityStore + ?Sized> EntityStoreExt for S {}

fn ensure_kind(key: &Key, expected: Kind) -> StoreResult<()> {
    if key.kind() == expected {
        Ok(())
    } else {
        Err(StoreError::KindMismatch {
            key: key.clone(),
            expected,
        })
    }
}

fn decode<T: Entity>(record: Record) -> StoreResult<T> {
    let Record { key, fields } = record;
    let mut entity: T = match serde_json::from_value(fields) {
        Ok(entity) => entity,
        Err(source) => return Err(StoreError::Decode { key, source }),
    };
    entity.assign_key(key);
    Ok(entity)
}
