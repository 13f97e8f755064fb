use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum::http::HeaderName;
use axum::http::header::AUTHORIZATION;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::form_urlencoded;

use crate::config::{IdentityConfig, IdentitySource};
use crate::request::ActionRequest;

/// Access levels, weakest first. A caller satisfies a route when its own
/// tier is at least the route's tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityTier {
    Anonymous,
    User,
    Administrator,
}

impl SecurityTier {
    pub fn satisfies(self, required: SecurityTier) -> bool {
        self >= required
    }
}

impl fmt::Display for SecurityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SecurityTier::Anonymous => "anonymous",
            SecurityTier::User => "user",
            SecurityTier::Administrator => "administrator",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub name: String,
    pub admin: bool,
}

impl Principal {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            admin: false,
        }
    }

    pub fn admin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            admin: true,
        }
    }
}

/// The hosting platform's authentication, seen from the console.
pub trait IdentityProvider: Send + Sync {
    fn principal_of(&self, request: &ActionRequest) -> Option<Principal>;
    fn login_url(&self, return_path: &str) -> String;
    fn logout_url(&self, return_path: &str) -> String;
}

/// Resolves callers to tiers. Built once at startup and shared.
#[derive(Clone)]
pub struct SecurityContext {
    provider: Arc<dyn IdentityProvider>,
}

impl SecurityContext {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(ProxyIdentity::from_config(config)?)))
    }

    pub fn resolve_principal(&self, request: &ActionRequest) -> Option<Principal> {
        self.provider.principal_of(request)
    }

    pub fn tier_of(principal: Option<&Principal>) -> SecurityTier {
        match principal {
            None => SecurityTier::Anonymous,
            Some(principal) if principal.admin => SecurityTier::Administrator,
            Some(_) => SecurityTier::User,
        }
    }

    pub fn provider(&self) -> &dyn IdentityProvider {
        self.provider.as_ref()
    }
}

#[derive(Clone, Debug)]
enum PrincipalSource {
    Header(HeaderName),
    Jwt { header: HeaderName, claim: String },
}

/// Identity asserted by an authenticating reverse proxy, either as a plain
/// header or as a bearer JWT. Token signatures are checked by the proxy.
#[derive(Clone, Debug)]
pub struct ProxyIdentity {
    source: PrincipalSource,
    admins: HashSet<String>,
    login_base: String,
    logout_base: String,
}

impl ProxyIdentity {
    pub fn from_config(config: &IdentityConfig) -> Result<Self> {
        let source = match config.source {
            IdentitySource::Header => {
                let header = HeaderName::from_bytes(config.header.trim().as_bytes())
                    .map_err(|err| anyhow!("invalid identity header `{}`: {err}", config.header))?;
                PrincipalSource::Header(header)
            }
            IdentitySource::Jwt => PrincipalSource::Jwt {
                header: AUTHORIZATION,
                claim: config.claim.clone(),
            },
        };
        Ok(Self {
            source,
            admins: config
                .admins
                .iter()
                .map(|admin| admin.trim().to_ascii_lowercase())
                .collect(),
            login_base: config.login_url.clone(),
            logout_base: config.logout_url.clone(),
        })
    }

    fn is_admin(&self, name: &str) -> bool {
        self.admins.contains(&name.to_ascii_lowercase())
    }
}

impl IdentityProvider for ProxyIdentity {
    fn principal_of(&self, request: &ActionRequest) -> Option<Principal> {
        match &self.source {
            PrincipalSource::Header(name) => {
                let user = request
                    .headers()
                    .get(name)
                    .and_then(|value| value.to_str().ok())
                    .map(str::trim)
                    .filter(|value| !value.is_empty())?;
                Some(Principal {
                    name: user.to_string(),
                    admin: self.is_admin(user),
                })
            }
            PrincipalSource::Jwt { header, claim } => {
                let token = request
                    .headers()
                    .get(header)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.strip_prefix("Bearer "))?;
                let payload = decode_jwt_payload(token.trim())
                    .map_err(|err| {
                        tracing::warn!(error = %err, "failed to decode jwt payload");
                        err
                    })
                    .ok()?;
                let name = payload
                    .get(claim)
                    .and_then(Value::as_str)
                    .filter(|name| !name.is_empty())?;
                let admin_claim = payload
                    .get("admin")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Some(Principal {
                    name: name.to_string(),
                    admin: admin_claim || self.is_admin(name),
                })
            }
        }
    }

    fn login_url(&self, return_path: &str) -> String {
        with_continue(&self.login_base, return_path)
    }

    fn logout_url(&self, return_path: &str) -> String {
        with_continue(&self.logout_base, return_path)
    }
}

fn decode_jwt_payload(token: &str) -> Result<Value> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow!("invalid jwt structure"))?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=').as_bytes())?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn with_continue(base: &str, return_path: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("continue", return_path)
        .finish();
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}{query}")
}
