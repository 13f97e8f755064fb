//! Persisted domain records.

use serde::{Deserialize, Serialize};

use crate::store::{Entity, EntityStore, EntityStoreExt, Key, Kind, StoreResult};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    #[serde(skip)]
    pub key: Option<Key>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub license: String,
}

impl Package {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn key_for(name: &str) -> Key {
        Key::named(Kind::Package, name)
    }

    /// The package that owns `name`: the record keyed by it, or a
    /// surrogate-keyed package that was given the name after creation.
    /// Names are unique across both, so at most one package matches.
    pub fn find_by_name(store: &dyn EntityStore, name: &str) -> StoreResult<Option<Package>> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(None);
        }
        if let Some(package) = store.load::<Package>(&Self::key_for(name))? {
            return Ok(Some(package));
        }
        Ok(store.load_all::<Package>()?.into_iter().find(|package| {
            package.key.as_ref().and_then(Key::id).is_some() && package.name.trim() == name
        }))
    }
}

impl Entity for Package {
    const KIND: Kind = Kind::Package;

    fn assigned_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    fn assign_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn natural_key(&self) -> Option<Key> {
        let name = self.name.trim();
        (!name.is_empty()).then(|| Self::key_for(name))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub package: String,
    #[serde(default)]
    pub versions: String,
    #[serde(default)]
    pub env_var: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageVersion {
    #[serde(skip)]
    pub key: Option<Key>,
    pub package: String,
    pub version: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub one_file: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub files: Vec<PackageFile>,
}

impl PackageVersion {
    pub fn new(package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Versions are named `<package>@<version>`.
    pub fn key_for(package: &str, version: &str) -> Key {
        Key::named(Kind::PackageVersion, format!("{package}@{version}"))
    }

    /// A detached clone to be edited into a new version. The clone has no
    /// key until it is saved under its own package/version pair.
    pub fn staged_copy(&self) -> Self {
        Self {
            key: None,
            ..self.clone()
        }
    }
}

impl Entity for PackageVersion {
    const KIND: Kind = Kind::PackageVersion;

    fn assigned_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    fn assign_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn natural_key(&self) -> Option<Key> {
        if self.package.is_empty() || self.version.is_empty() {
            return None;
        }
        Some(Self::key_for(&self.package, &self.version))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(skip)]
    pub key: Option<Key>,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Entity for Repository {
    const KIND: Kind = Kind::Repository;

    fn assigned_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    fn assign_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn natural_key(&self) -> Option<Key> {
        (!self.name.is_empty()).then(|| Key::named(Kind::Repository, self.name.as_str()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    #[serde(skip)]
    pub key: Option<Key>,
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl Entity for License {
    const KIND: Kind = Kind::License;

    fn assigned_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    fn assign_key(&mut self, key: Key) {
        self.key = Some(key);
    }

    fn natural_key(&self) -> Option<Key> {
        (!self.name.is_empty()).then(|| Key::named(Kind::License, self.name.as_str()))
    }
}
