use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ConsoleError, ConsoleResult};
use crate::security::{IdentityProvider, Principal};

pub type Variables = Map<String, Value>;

pub const ERROR_TEMPLATE: &str = "Error.html";
pub const LOGIN_FOOTER: &str = "basic/LoginFooter.html";
pub const LOGOUT_FOOTER: &str = "basic/LogoutFooter.html";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (
        "PackageList.html",
        include_str!("../templates/PackageList.html"),
    ),
    (
        "CopyPackageVersion.html",
        include_str!("../templates/CopyPackageVersion.html"),
    ),
    (ERROR_TEMPLATE, include_str!("../templates/Error.html")),
    (
        LOGIN_FOOTER,
        include_str!("../templates/basic/LoginFooter.html"),
    ),
    (
        LOGOUT_FOOTER,
        include_str!("../templates/basic/LogoutFooter.html"),
    ),
];

/// A rendering instruction: which template, with which variables.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    template: String,
    variables: Variables,
}

impl Page {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            variables: Variables::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_serialized<T: Serialize>(
        self,
        name: impl Into<String>,
        value: &T,
    ) -> ConsoleResult<Self> {
        let value = serde_json::to_value(value)?;
        Ok(self.with(name, value))
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn into_parts(self) -> (String, Variables) {
        (self.template, self.variables)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub body: String,
    pub content_type: &'static str,
}

pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, variables: &Variables) -> ConsoleResult<Rendered>;
}

pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl HandlebarsRenderer {
    pub fn builtin() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        for (name, body) in BUILTIN_TEMPLATES {
            registry
                .register_template_string(name, *body)
                .with_context(|| format!("failed to register built-in template {name}"))?;
        }
        Ok(Self { registry })
    }

    /// Built-in templates, with same-named files under `dir` taking their place.
    pub fn with_overrides(dir: Option<&Path>) -> Result<Self> {
        let mut renderer = Self::builtin()?;
        if let Some(dir) = dir {
            let count = renderer.register_dir(dir, dir)?;
            tracing::info!(dir = %dir.display(), templates = count, "loaded template overrides");
        }
        Ok(renderer)
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    fn register_dir(&mut self, root: &Path, dir: &Path) -> Result<usize> {
        let mut count = 0;
        let entries =
            fs::read_dir(dir).with_context(|| format!("failed to read template dir {:?}", dir))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                count += self.register_dir(root, &path)?;
                continue;
            }
            let Some(name) = template_name(root, &path) else {
                continue;
            };
            let body = fs::read_to_string(&path)
                .with_context(|| format!("failed to read template {:?}", path))?;
            self.registry
                .register_template_string(&name, body)
                .with_context(|| format!("failed to register template {name}"))?;
            tracing::debug!(template = %name, "registered template override");
            count += 1;
        }
        Ok(count)
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, template: &str, variables: &Variables) -> ConsoleResult<Rendered> {
        let body = self
            .registry
            .render(template, variables)
            .map_err(|source| ConsoleError::Template {
                template: template.to_string(),
                source: Box::new(source),
            })?;
        Ok(Rendered {
            body,
            content_type: content_type_for(template),
        })
    }
}

/// Exactly one of the login or logout footers, depending on whether the
/// caller is signed in.
pub fn login_footer(
    renderer: &dyn TemplateRenderer,
    identity: &dyn IdentityProvider,
    principal: Option<&Principal>,
    return_path: &str,
) -> ConsoleResult<String> {
    let mut variables = Variables::new();
    let template = match principal {
        Some(principal) => {
            variables.insert("name".into(), principal.name.clone().into());
            variables.insert("logoutURL".into(), identity.logout_url(return_path).into());
            LOGOUT_FOOTER
        }
        None => {
            variables.insert("loginURL".into(), identity.login_url(return_path).into());
            LOGIN_FOOTER
        }
    };
    Ok(renderer.render(template, &variables)?.body)
}

fn template_name(root: &Path, path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    if !matches!(ext, "html" | "txt" | "js") {
        return None;
    }
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|part| part.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

fn content_type_for(template: &str) -> &'static str {
    match template.rsplit_once('.').map(|(_, ext)| ext) {
        Some("js") => "application/javascript; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "text/html; charset=utf-8",
    }
}
