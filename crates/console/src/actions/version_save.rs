use once_cell::sync::Lazy;
use regex::Regex;

use super::{ActionContext, Reply, StagedAction};
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::{Dependency, Package, PackageFile, PackageVersion};
use crate::request::ActionRequest;
use crate::store::EntityStoreExt;

static VERSION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+(\.\d+)*$").unwrap_or_else(|err| panic!("version pattern: {err}"))
});

/// Writes a new package version, typically the confirmed result of a copy.
#[derive(Debug, Default)]
pub struct PackageVersionSave;

impl StagedAction for PackageVersionSave {
    const NAME: &'static str = "package_version_save";

    type Input = PackageVersion;
    type Subject = PackageVersion;

    fn parse_input(&self, request: &ActionRequest) -> ConsoleResult<PackageVersion> {
        let mut version = PackageVersion::new(request.required("package")?, request.required("version")?);
        version.url = request.non_blank("url").unwrap_or_default().to_string();
        version.sha1 = request
            .non_blank("sha1")
            .unwrap_or_default()
            .to_ascii_lowercase();
        version.one_file = request.flag("oneFile");
        version.tags = request
            .param("tags")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        version.dependencies = dependencies(request);
        version.files = files(request);
        Ok(version)
    }

    fn load_or_create(
        &self,
        version: PackageVersion,
        _cx: &ActionContext<'_>,
    ) -> ConsoleResult<PackageVersion> {
        Ok(version)
    }

    fn validate(&self, version: &PackageVersion, cx: &ActionContext<'_>) -> ConsoleResult<()> {
        if !VERSION_TOKEN.is_match(&version.version) {
            return Err(ConsoleError::bad_request(format!(
                "`{}` is not a version number",
                version.version
            )));
        }
        if Package::find_by_name(cx.store, &version.package)?.is_none() {
            return Err(ConsoleError::bad_request(format!(
                "package {} does not exist",
                version.package
            )));
        }
        let key = PackageVersion::key_for(&version.package, &version.version);
        if cx.store.get(&key)?.is_some() {
            return Err(ConsoleError::bad_request(format!(
                "version {} of {} already exists",
                version.version, version.package
            )));
        }
        if !version.sha1.is_empty() && !is_sha1(&version.sha1) {
            return Err(ConsoleError::bad_request("sha1 must be 40 hexadecimal digits"));
        }
        Ok(())
    }

    fn persist(&self, version: &mut PackageVersion, cx: &ActionContext<'_>) -> ConsoleResult<()> {
        let key = cx.store.save(version)?;
        tracing::info!(
            key = %key,
            by = cx.principal.map(|p| p.name.as_str()).unwrap_or("-"),
            "package_version.saved"
        );
        Ok(())
    }

    fn respond(&self, _version: PackageVersion, cx: &ActionContext<'_>) -> ConsoleResult<Reply> {
        Ok(cx.redirect_to_listing())
    }
}

fn is_sha1(value: &str) -> bool {
    hex::decode(value).is_ok_and(|bytes| bytes.len() == 20)
}

fn dependencies(request: &ActionRequest) -> Vec<Dependency> {
    let versions = request.indexed("depVersions");
    let env_vars = request.indexed("depEnvVar");
    request
        .indexed("depPackage")
        .into_iter()
        .filter(|(_, package)| !package.trim().is_empty())
        .map(|(index, package)| Dependency {
            package: package.trim().to_string(),
            versions: versions.get(&index).map(|v| v.trim().to_string()).unwrap_or_default(),
            env_var: env_vars.get(&index).map(|v| v.trim().to_string()).unwrap_or_default(),
        })
        .collect()
}

fn files(request: &ActionRequest) -> Vec<PackageFile> {
    let contents = request.indexed("content");
    request
        .indexed("path")
        .into_iter()
        .filter(|(_, path)| !path.trim().is_empty())
        .map(|(index, path)| PackageFile {
            path: path.trim().to_string(),
            content: contents.get(&index).map(|c| c.to_string()).unwrap_or_default(),
        })
        .collect()
}
