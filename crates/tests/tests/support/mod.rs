#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Request, StatusCode};
use repo_console::config::ConsoleConfig;
use repo_console::{EntityStore, InMemoryEntityStore, boot, http};
use tower::ServiceExt;

pub const ADMIN: &str = "root@example.com";
pub const USER: &str = "ann@example.com";

pub struct Console {
    pub app: Router,
    pub store: Arc<dyn EntityStore>,
}

impl Console {
    pub fn start(mut config: ConsoleConfig) -> Result<Self> {
        if config.identity.admins.is_empty() {
            config.identity.admins = vec![ADMIN.to_string()];
        }
        let store: Arc<dyn EntityStore> = Arc::new(InMemoryEntityStore::new());
        let state = boot::init_with_store(&config, Arc::clone(&store))?;
        Ok(Self {
            app: http::router(state),
            store,
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::start(ConsoleConfig::default())
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Reply> {
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(Reply {
            status,
            headers,
            body: String::from_utf8(bytes.to_vec())?,
        })
    }

    pub async fn get(&self, uri: &str, user: Option<&str>) -> Result<Reply> {
        self.send(request("GET", uri, user, None)?).await
    }

    pub async fn post(&self, uri: &str, user: Option<&str>, form: &str) -> Result<Reply> {
        self.send(request("POST", uri, user, Some(form))?).await
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl Reply {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get("location")
            .and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

pub fn request(
    method: &str,
    uri: &str,
    user: Option<&str>,
    form: Option<&str>,
) -> Result<Request<Body>> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-forwarded-user", user);
    }
    let body = match form {
        Some(form) => {
            builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
            Body::from(form.to_string())
        }
        None => Body::empty(),
    };
    Ok(builder.body(body)?)
}

pub struct EnvGuard {
    key: &'static str,
    prev: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &'static str, value: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe {
            std::env::set_var(key, value.as_ref());
        }
        Self { key, prev }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        if let Some(ref value) = self.prev {
            unsafe {
                std::env::set_var(self.key, value);
            }
        } else {
            unsafe {
                std::env::remove_var(self.key);
            }
        }
    }
}
