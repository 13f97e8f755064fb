use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_yaml_bw as serde_yaml;

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub seed: Option<PathBuf>,
    #[serde(default = "default_listing_path")]
    pub listing_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub source: IdentitySource,
    #[serde(default = "default_user_header")]
    pub header: String,
    #[serde(default = "default_claim")]
    pub claim: String,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_logout_url")]
    pub logout_url: String,
}

/// Where the caller's identity comes from. Both sources trust a fronting
/// proxy that authenticates the request before it reaches the console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    #[default]
    Header,
    Jwt,
}

impl FromStr for IdentitySource {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "header" | "" => Ok(Self::Header),
            "jwt" => Ok(Self::Jwt),
            other => bail!("unsupported identity source `{other}`"),
        }
    }
}

impl ConsoleConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let mut config: ConsoleConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        config.resolve_paths(path.parent());
        Ok(config)
    }

    /// Applies `CONSOLE_*` environment overrides on top of the loaded values.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(port) = env::var("CONSOLE_PORT") {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid CONSOLE_PORT `{port}`"))?;
        }
        if let Some(dir) = env::var_os("CONSOLE_TEMPLATES_DIR") {
            self.templates_dir = Some(PathBuf::from(dir));
        }
        if let Ok(admins) = env::var("CONSOLE_ADMINS") {
            self.identity.admins = admins
                .split(',')
                .map(str::trim)
                .filter(|admin| !admin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(source) = env::var("CONSOLE_IDENTITY") {
            self.identity.source = source.parse()?;
        }
        Ok(self)
    }

    fn resolve_paths(&mut self, base: Option<&Path>) {
        self.templates_dir = self
            .templates_dir
            .take()
            .map(|dir| resolve_relative(base, dir));
        self.seed = self.seed.take().map(|seed| resolve_relative(base, seed));
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            templates_dir: None,
            identity: IdentityConfig::default(),
            seed: None,
            listing_path: default_listing_path(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            source: IdentitySource::default(),
            header: default_user_header(),
            claim: default_claim(),
            admins: Vec::new(),
            login_url: default_login_url(),
            logout_url: default_logout_url(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_listing_path() -> String {
    "/p".to_string()
}

fn default_user_header() -> String {
    "x-forwarded-user".to_string()
}

fn default_claim() -> String {
    "email".to_string()
}

fn default_login_url() -> String {
    "/_auth/login".to_string()
}

fn default_logout_url() -> String {
    "/_auth/logout".to_string()
}

fn resolve_relative(base: Option<&Path>, value: PathBuf) -> PathBuf {
    match base {
        Some(base) if value.is_relative() => base.join(value),
        _ => value,
    }
}
