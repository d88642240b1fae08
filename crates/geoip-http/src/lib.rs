//! HTTP layer for the GeoIP server.
//!
//! This crate turns a [`geoip_core::GeoLocator`] into a running service:
//! the [`LookupDispatcher`] implements the per-request pipeline (routing,
//! CORS, signature checks, lookup, events), [`GeoIpHttpService`] adapts it to
//! hyper, and [`GeoIpServer`] owns the plain and TLS listeners.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use geoip_core::{CountryDatabase, ServerConfig};
//! use geoip_http::GeoIpServer;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let database = CountryDatabase::load("GeoIPCountryWhois.csv")?;
//! let server = GeoIpServer::new(ServerConfig::default(), Arc::new(database))?;
//! server.subscribe(|event: &geoip_core::ServerEvent| println!("{}", event.name()));
//! let running = server.start().await;
//! running.wait().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`cors`] - CORS negotiation
//! - [`listener`] - Plain and TLS listener lifecycle
//! - [`response`] - JSON responses and error formatting
//! - [`router`] - Lookup route matching and query decoding
//! - [`service`] - Request pipeline and hyper `Service` implementation
//! - [`tls`] - TLS material loading

pub mod cors;
pub mod listener;
pub mod response;
pub mod router;
pub mod service;
pub mod tls;

pub use cors::{CorsNegotiator, CorsOutcome};
pub use listener::{BindError, GeoIpServer, RunningServer};
pub use response::{ApiError, GeoIpResponse};
pub use service::{GeoIpHttpService, LookupDispatcher};
pub use tls::TlsError;
