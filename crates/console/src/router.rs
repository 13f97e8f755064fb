//! Ordered pattern routing and tier-checked dispatch.
//!
//! The route table is built once at startup and never changes. Dispatch
//! walks it in registration order; the first pattern that matches the whole
//! path decides the outcome, including when the caller's tier is too low.

use std::sync::Arc;

use regex::Regex;

use crate::actions::{
    ActionContext, ActionSettings, CopyPackageVersion, Handler, PackageDelete, PackageList,
    PackageSave, PackageVersionSave, Reply,
};
use crate::error::{ConsoleError, ConsoleResult};
use crate::request::ActionRequest;
use crate::security::{Principal, SecurityContext, SecurityTier};
use crate::store::EntityStore;

/// Builds a fresh handler for each dispatched request.
pub type HandlerFactory = fn() -> Box<dyn Handler>;

pub fn boxed<H: Handler + Default + 'static>() -> Box<dyn Handler> {
    Box::<H>::default()
}

pub struct Route {
    pattern: Regex,
    source: String,
    tier: SecurityTier,
    factory: HandlerFactory,
}

impl Route {
    /// Compiles `pattern` so that it only matches an entire path.
    pub fn new(
        pattern: &str,
        tier: SecurityTier,
        factory: HandlerFactory,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(&format!("^(?:{pattern})$"))?,
            source: pattern.to_string(),
            tier,
            factory,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }

    pub fn tier(&self) -> SecurityTier {
        self.tier
    }

    pub fn handler(&self) -> Box<dyn Handler> {
        (self.factory)()
    }
}

#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn first_match(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    pub fn route(
        mut self,
        pattern: &str,
        tier: SecurityTier,
        factory: HandlerFactory,
    ) -> Result<Self, regex::Error> {
        self.routes.push(Route::new(pattern, tier, factory)?);
        Ok(self)
    }

    pub fn build(self) -> RouteTable {
        RouteTable {
            routes: self.routes,
        }
    }
}

/// The console's routes, in priority order.
pub fn console_routes() -> Result<RouteTable, regex::Error> {
    Ok(RouteTable::builder()
        .route("/p", SecurityTier::Anonymous, boxed::<PackageList>)?
        .route("/p/save", SecurityTier::Administrator, boxed::<PackageSave>)?
        .route("/p/delete", SecurityTier::Administrator, boxed::<PackageDelete>)?
        .route(
            "/package-version/copy",
            SecurityTier::Anonymous,
            boxed::<CopyPackageVersion>,
        )?
        .route(
            "/package-version/save",
            SecurityTier::User,
            boxed::<PackageVersionSave>,
        )?
        .build())
}

#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    security: SecurityContext,
    store: Arc<dyn EntityStore>,
    settings: Arc<ActionSettings>,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        security: SecurityContext,
        store: Arc<dyn EntityStore>,
        settings: ActionSettings,
    ) -> Self {
        Self {
            routes,
            security,
            store,
            settings: Arc::new(settings),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn security(&self) -> &SecurityContext {
        &self.security
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn dispatch(&self, request: &ActionRequest) -> ConsoleResult<Reply> {
        let principal = self.security.resolve_principal(request);
        self.dispatch_as(request, principal.as_ref())
    }

    /// Dispatches on behalf of an already resolved principal.
    pub fn dispatch_as(
        &self,
        request: &ActionRequest,
        principal: Option<&Principal>,
    ) -> ConsoleResult<Reply> {
        let path = request.path();
        if path.is_empty() {
            return Err(ConsoleError::bad_request("request path is empty"));
        }
        let actual = SecurityContext::tier_of(principal);
        let Some(route) = self.routes.first_match(path) else {
            tracing::debug!(method = %request.method(), path, "route.unmatched");
            return Err(ConsoleError::not_found(format!("route for {path}")));
        };

        let span = tracing::info_span!(
            "route.dispatch",
            method = %request.method(),
            path,
            route = route.pattern(),
            tier = %actual
        );
        let _entered = span.enter();

        if !actual.satisfies(route.tier()) {
            tracing::warn!(required = %route.tier(), "route.denied");
            return Err(ConsoleError::Authorization {
                path: path.to_string(),
                required: route.tier(),
                actual,
            });
        }

        let handler = route.handler();
        tracing::debug!(action = handler.name(), "route.matched");
        let cx = ActionContext {
            store: self.store.as_ref(),
            principal,
            settings: &self.settings,
        };
        handler.perform(request, &cx)
    }
}
