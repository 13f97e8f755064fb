use super::{ActionContext, Reply, StagedAction};
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::PackageVersion;
use crate::render::Page;
use crate::request::ActionRequest;
use crate::store::{EntityStoreExt, Key, Kind};

pub const TEMPLATE: &str = "CopyPackageVersion.html";

/// Stages a copy of an existing version: shows the edit form pre-filled
/// from the source. Writing the copy is left to the version save action.
#[derive(Debug, Default)]
pub struct CopyPackageVersion;

pub struct CopySource {
    name: String,
    version: PackageVersion,
}

impl StagedAction for CopyPackageVersion {
    const NAME: &'static str = "copy_package_version";

    type Input = Key;
    type Subject = CopySource;

    fn parse_input(&self, request: &ActionRequest) -> ConsoleResult<Key> {
        let name = request.required("name")?;
        Ok(Key::named(Kind::PackageVersion, name))
    }

    fn load_or_create(&self, key: Key, cx: &ActionContext<'_>) -> ConsoleResult<CopySource> {
        let version: PackageVersion = cx
            .store
            .load(&key)?
            .ok_or_else(|| ConsoleError::not_found(format!("package version {key}")))?;
        let name = key.name().unwrap_or_default().to_string();
        Ok(CopySource { name, version })
    }

    fn respond(&self, source: CopySource, _cx: &ActionContext<'_>) -> ConsoleResult<Reply> {
        let copy = source.version.staged_copy();
        let page = Page::new(TEMPLATE)
            .with("source", source.name)
            .with_serialized("version", &copy)?;
        Ok(Reply::Page(page))
    }
}
