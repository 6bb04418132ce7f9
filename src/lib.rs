//! # offline-gateway
//!
//! An offline-first caching gateway for a portfolio site. Intercepted requests
//! are served cache-first, network-first or stale-while-revalidate depending
//! on what they ask for, and cache generations are rotated across deployments
//! through an install/activate lifecycle.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use offline_gateway::cache::MemoryStorage;
//! use offline_gateway::config::GatewayConfig;
//! use offline_gateway::events::{Dispatcher, LoggingClients};
//! use offline_gateway::gateway::Gateway;
//! use offline_gateway::network::{Fetch, HttpFetcher};
//! use offline_gateway::server::{ProxyService, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::load(None)?;
//!     let listen = config.listen.clone();
//!     let network: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(&config)?);
//!     let gateway = Gateway::new(config, Arc::new(MemoryStorage::new()), Arc::clone(&network), Arc::new(LoggingClients));
//!     gateway.install().await?;
//!
//!     let service = ProxyService::new(Dispatcher::new(Arc::new(gateway)), network);
//!     Server::bind(listen).await?.run(move |req| {
//!         let service = service.clone();
//!         async move { service.handle(req).await }
//!     }).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod events;
pub mod gateway;
pub mod http;
pub mod network;
pub mod router;
pub mod server;

pub use config::GatewayConfig;
pub use events::{Dispatcher, Event, EventOutcome, FetchOutcome};
pub use gateway::{Gateway, GatewayError, LifecycleState};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{ProxyService, Server, ServerError};
