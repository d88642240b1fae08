//! Core types, configuration, and the lookup capability for the GeoIP server.
//!
//! This crate provides the building blocks shared by the authentication and
//! HTTP layers: the immutable [`ServerConfig`], the request and event types,
//! the [`EventBus`] that replaces an ambient event emitter, and the
//! [`GeoLocator`] capability together with the range-table
//! [`CountryDatabase`] implementation.

pub mod config;
pub mod database;
mod error;
pub mod events;
pub mod locator;
mod template;
mod types;

pub use config::{ServerConfig, TlsConfig};
pub use database::CountryDatabase;
pub use error::{GeoIpError, GeoIpResult, LookupError};
pub use events::{EventBus, EventSubscriber, ListeningEvent, LookupEvent, ServerEvent};
pub use locator::GeoLocator;
pub use template::PathTemplate;
pub use types::{GeoRecord, IncomingRequest};
