use super::{ActionContext, Reply, StagedAction};
use crate::error::{ConsoleError, ConsoleResult};
use crate::model::Package;
use crate::request::ActionRequest;
use crate::store::{EntityStoreExt, Key, Kind};

/// Creates a package, or edits an existing one addressed by numeric `id`
/// or by its name `key`.
///
/// Edits apply only the fields present in the request; everything else the
/// stored package holds is kept. Package names are unique: a create or a
/// rename onto a name another package owns is rejected. Packages keyed by
/// their name cannot be renamed.
#[derive(Debug, Default)]
pub struct PackageSave;

#[derive(Debug, Default)]
pub struct PackageForm {
    id: Option<i64>,
    key: Option<String>,
    name: Option<String>,
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    icon: Option<String>,
    license: Option<String>,
}

impl PackageForm {
    fn target(&self) -> ConsoleResult<Option<Key>> {
        match (self.id, self.key.as_deref()) {
            (Some(_), Some(_)) => Err(ConsoleError::bad_request(
                "pass either `id` or `key`, not both",
            )),
            (Some(id), None) => Ok(Some(Key::numeric(Kind::Package, id))),
            (None, Some(name)) => Ok(Some(Package::key_for(name))),
            (None, None) => Ok(None),
        }
    }

    fn apply(self, package: &mut Package) {
        let fields = [
            (self.name, &mut package.name),
            (self.title, &mut package.title),
            (self.url, &mut package.url),
            (self.description, &mut package.description),
            (self.icon, &mut package.icon),
            (self.license, &mut package.license),
        ];
        for (submitted, field) in fields {
            if let Some(value) = submitted {
                *field = value;
            }
        }
    }
}

pub struct PendingPackage {
    package: Package,
    created: bool,
    previous_name: String,
}

impl PendingPackage {
    fn renamed(&self) -> bool {
        self.package.name.trim() != self.previous_name
    }
}

impl StagedAction for PackageSave {
    const NAME: &'static str = "package_save";

    type Input = PackageForm;
    type Subject = PendingPackage;

    fn parse_input(&self, request: &ActionRequest) -> ConsoleResult<PackageForm> {
        let text = |name: &str| request.param(name).map(|value| value.trim().to_string());
        Ok(PackageForm {
            id: request.numeric("id")?,
            key: request.non_blank("key").map(str::to_string),
            name: text("name"),
            title: text("title"),
            url: text("url"),
            description: request.param("description").map(str::to_string),
            icon: text("icon"),
            license: text("license"),
        })
    }

    fn load_or_create(
        &self,
        form: PackageForm,
        cx: &ActionContext<'_>,
    ) -> ConsoleResult<PendingPackage> {
        let Some(key) = form.target()? else {
            let mut package = Package::default();
            form.apply(&mut package);
            return Ok(PendingPackage {
                package,
                created: true,
                previous_name: String::new(),
            });
        };
        let mut package: Package = cx
            .store
            .load(&key)?
            .ok_or_else(|| ConsoleError::not_found(format!("package {key}")))?;
        let previous_name = package.name.trim().to_string();
        form.apply(&mut package);
        Ok(PendingPackage {
            package,
            created: false,
            previous_name,
        })
    }

    fn validate(&self, pending: &PendingPackage, cx: &ActionContext<'_>) -> ConsoleResult<()> {
        if !pending.created && !pending.renamed() {
            return Ok(());
        }
        if !pending.created && matches!(pending.package.key, Some(Key::Named { .. })) {
            return Err(ConsoleError::bad_request(format!(
                "package {} is keyed by its name and cannot be renamed",
                pending.previous_name
            )));
        }
        let name = pending.package.name.trim();
        if let Some(owner) = Package::find_by_name(cx.store, name)?
            && owner.key != pending.package.key
        {
            return Err(ConsoleError::bad_request(format!(
                "package {name} already exists"
            )));
        }
        Ok(())
    }

    fn persist(&self, pending: &mut PendingPackage, cx: &ActionContext<'_>) -> ConsoleResult<()> {
        let key = cx.store.save(&mut pending.package)?;
        tracing::info!(key = %key, created = pending.created, "package.saved");
        Ok(())
    }

    fn respond(&self, _pending: PendingPackage, cx: &ActionContext<'_>) -> ConsoleResult<Reply> {
        Ok(cx.redirect_to_listing())
    }
}
