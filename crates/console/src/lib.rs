#![forbid(unsafe_code)]

pub mod actions;
pub mod boot;
pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod render;
pub mod request;
pub mod router;
pub mod security;
pub mod store;

pub use actions::{Handler, Reply, StagedAction};
pub use config::ConsoleConfig;
pub use error::{ConsoleError, ConsoleResult};
pub use http::{ConsoleServer, ServerState};
pub use request::ActionRequest;
pub use router::{Dispatcher, RouteTable};
pub use security::{Principal, SecurityContext, SecurityTier};
pub use store::{EntityStore, EntityStoreExt, InMemoryEntityStore, Key, Kind};
