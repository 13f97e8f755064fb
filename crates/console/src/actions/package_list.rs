use serde_json::{Value, json};

use super::{ActionContext, Reply, StagedAction};
use crate::error::ConsoleResult;
use crate::model::Package;
use crate::render::Page;
use crate::request::ActionRequest;
use crate::store::{Entity, EntityStoreExt};

pub const TEMPLATE: &str = "PackageList.html";

#[derive(Debug, Default)]
pub struct PackageList;

impl StagedAction for PackageList {
    const NAME: &'static str = "package_list";

    type Input = ();
    type Subject = Vec<Package>;

    fn parse_input(&self, _request: &ActionRequest) -> ConsoleResult<()> {
        Ok(())
    }

    fn load_or_create(&self, _input: (), cx: &ActionContext<'_>) -> ConsoleResult<Vec<Package>> {
        Ok(cx.store.load_all::<Package>()?)
    }

    fn respond(&self, packages: Vec<Package>, _cx: &ActionContext<'_>) -> ConsoleResult<Reply> {
        let rows = packages.iter().map(row).collect::<Vec<_>>();
        Ok(Reply::Page(
            Page::new(TEMPLATE)
                .with("count", rows.len())
                .with("packages", rows),
        ))
    }
}

fn row(package: &Package) -> Value {
    let key = package.key();
    json!({
        "key": key.as_ref().map(ToString::to_string),
        "id": key.as_ref().and_then(|key| key.id()),
        "name": package.name,
        "title": package.title,
        "url": package.url,
        "description": package.description,
        "icon": package.icon,
    })
}
