//! The axum surface: `/healthz` plus a fallback that hands every other
//! request to the [`Dispatcher`].

pub mod health;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Router, serve};
use tokio::net::TcpListener;
use url::form_urlencoded;

use crate::actions::Reply;
use crate::error::{ConsoleError, ConsoleResult};
use crate::render::{ERROR_TEMPLATE, Page, TemplateRenderer, login_footer};
use crate::request::ActionRequest;
use crate::router::Dispatcher;
use crate::security::Principal;

use self::health::HealthState;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Clone)]
pub struct ServerState {
    pub dispatcher: Arc<Dispatcher>,
    pub renderer: Arc<dyn TemplateRenderer>,
    pub health: Arc<HealthState>,
}

impl ServerState {
    pub fn new(dispatcher: Dispatcher, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            renderer,
            health: Arc::new(HealthState::new()),
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/healthz", get(health::handler))
        .fallback(dispatch)
        .with_state(state)
}

pub struct ConsoleServer {
    addr: SocketAddr,
    router: Router,
}

impl ConsoleServer {
    pub fn new(port: u16, state: ServerState) -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            router: router(state),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!(addr = %self.addr, "starting console server");
        let listener = TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        serve(listener, self.router).await?;
        Ok(())
    }
}

async fn dispatch(
    State(state): State<ServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let params = collect_params(&uri, &headers, &body);
    let return_path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let request = ActionRequest::new(method, uri.path())
        .with_headers(headers)
        .with_params(params);

    let worker = state.clone();
    let joined =
        tokio::task::spawn_blocking(move || respond(&worker, &request, &return_path)).await;
    match joined {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(error = %err, "dispatch task failed");
            state.health.record_failure(err.to_string());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                "internal error\n",
            )
                .into_response()
        }
    }
}

/// Query pairs first, then form body pairs, so the body wins on conflict.
fn collect_params(uri: &Uri, headers: &HeaderMap, body: &[u8]) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(query) = uri.query() {
        params.extend(form_urlencoded::parse(query.as_bytes()).into_owned());
    }
    let is_form = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE));
    if is_form {
        params.extend(form_urlencoded::parse(body).into_owned());
    }
    params
}

fn respond(state: &ServerState, request: &ActionRequest, return_path: &str) -> Response {
    let principal = state.dispatcher.security().resolve_principal(request);
    let outcome = state
        .dispatcher
        .dispatch_as(request, principal.as_ref())
        .and_then(|reply| match reply {
            Reply::Redirect(target) => Ok(Redirect::to(&target).into_response()),
            Reply::Page(page) => render_page(state, page, principal.as_ref(), return_path),
        });
    match outcome {
        Ok(response) => {
            state.health.record_success();
            response
        }
        Err(err) => error_response(state, err, principal.as_ref(), return_path),
    }
}

fn render_page(
    state: &ServerState,
    page: Page,
    principal: Option<&Principal>,
    return_path: &str,
) -> ConsoleResult<Response> {
    let (template, mut variables) = page.into_parts();
    let footer = login_footer(
        state.renderer.as_ref(),
        state.dispatcher.security().provider(),
        principal,
        return_path,
    )?;
    variables.insert("footer".into(), footer.into());
    if let Some(principal) = principal {
        variables.insert("principal".into(), serde_json::to_value(principal)?);
    }
    let rendered = state.renderer.render(&template, &variables)?;
    Ok(([(CONTENT_TYPE, rendered.content_type)], rendered.body).into_response())
}

fn error_response(
    state: &ServerState,
    err: ConsoleError,
    principal: Option<&Principal>,
    return_path: &str,
) -> Response {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(kind = err.kind(), error = ?err, "request.failed");
        state.health.record_failure(err.to_string());
    } else {
        tracing::warn!(kind = err.kind(), error = %err, "request.rejected");
        state.health.record_success();
    }

    let message = err.public_message();
    let page = Page::new(ERROR_TEMPLATE)
        .with("status", status.as_u16())
        .with("reason", status.canonical_reason().unwrap_or_default())
        .with("message", message.clone());
    match render_page(state, page, principal, return_path) {
        Ok(mut response) => {
            *response.status_mut() = status;
            response
        }
        Err(render_err) => {
            tracing::error!(error = ?render_err, "failed to render error page");
            (
                status,
                [(CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("{} {message}\n", status.as_u16()),
            )
                .into_response()
        }
    }
}
