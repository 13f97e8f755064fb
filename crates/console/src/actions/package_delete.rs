use super::{ActionContext, Reply, StagedAction};
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::{Package, PackageVersion};
use crate::request::ActionRequest;
use crate::store::{EntityStoreExt, Key, Kind};

/// Removes a package, addressed by `name` or numeric `id`, together with
/// its versions.
#[derive(Debug, Default)]
pub struct PackageDelete;

pub struct Doomed {
    key: Key,
    package: Package,
}

impl StagedAction for PackageDelete {
    const NAME: &'static str = "package_delete";

    type Input = Key;
    type Subject = Doomed;

    fn parse_input(&self, request: &ActionRequest) -> ConsoleResult<Key> {
        if let Some(id) = request.numeric("id")? {
            return Ok(Key::numeric(Kind::Package, id));
        }
        request
            .non_blank("name")
            .map(Package::key_for)
            .ok_or_else(|| ConsoleError::bad_request("parameter `name` or `id` is required"))
    }

    fn load_or_create(&self, key: Key, cx: &ActionContext<'_>) -> ConsoleResult<Doomed> {
        let package: Package = cx
            .store
            .load(&key)?
            .ok_or_else(|| ConsoleError::not_found(format!("package {key}")))?;
        Ok(Doomed { key, package })
    }

    fn persist(&self, doomed: &mut Doomed, cx: &ActionContext<'_>) -> ConsoleResult<()> {
        let name = doomed.package.name.trim();
        // Versions hang off the name; only the package owning it takes them along.
        let owns_name = Package::find_by_name(cx.store, name)?
            .is_some_and(|owner| owner.key.as_ref() == Some(&doomed.key));
        let mut versions = 0;
        if owns_name {
            for version in cx.store.load_all::<PackageVersion>()? {
                if version.package != name {
                    continue;
                }
                if let Some(key) = version.key.as_ref() {
                    versions += usize::from(cx.store.delete(key)?);
                }
            }
        }
        cx.store.delete(&doomed.key)?;
        tracing::info!(key = %doomed.key, versions, "package.deleted");
        Ok(())
    }

    fn respond(&self, _doomed: Doomed, cx: &ActionContext<'_>) -> ConsoleResult<Reply> {
        Ok(cx.redirect_to_listing())
    }
}
