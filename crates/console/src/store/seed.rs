use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_yaml_bw as serde_yaml;

use super::{EntityStore, EntityStoreExt, StoreResult};
use crate::model::{License, Package, PackageVersion, Repository};

/// Entities loaded into a fresh store at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub versions: Vec<PackageVersion>,
    #[serde(default)]
    pub repositories: Vec<Repository>,
    #[serde(default)]
    pub licenses: Vec<License>,
}

impl SeedFile {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse seed file {:?}", path))
    }

    /// Writes every entity and returns how many records were stored.
    pub fn apply(self, store: &dyn EntityStore) -> StoreResult<usize> {
        let mut written = 0;
        for mut license in self.licenses {
            store.save(&mut license)?;
            written += 1;
        }
        for mut repository in self.repositories {
            store.save(&mut repository)?;
            written += 1;
        }
        for mut package in self.packages {
            store.save(&mut package)?;
            written += 1;
        }
        for mut version in self.versions {
            store.save(&mut version)?;
            written += 1;
        }
        tracing::info!(records = written, "store.seeded");
        Ok(written)
    }
}
