//! GeoIP HTTP service implementing the hyper `Service` trait.
//!
//! The request pipeline runs synchronously, without an await point:
//!
//! 1. Route: the path must match the lookup template.
//! 2. CORS: negotiate headers; preflights are answered here.
//! 3. Method: only `GET` and `HEAD` reach authentication.
//! 4. Authenticate the request signature.
//! 5. Look up the address, emit a `lookup` event, respond with the record.
//!
//! `HEAD` runs the same pipeline; its response keeps the headers and
//! `content-length` of the `GET` answer but drops the body.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderValue, Method};
use http_body::Body as _;
use http_body_util::Full;
use tracing::{debug, error};

use geoip_auth::{SIGNATURE_HEADER, authenticate};
use geoip_core::{
    EventBus, GeoIpResult, GeoLocator, IncomingRequest, LookupEvent, ServerConfig, ServerEvent,
};

use crate::cors::CorsNegotiator;
use crate::response::{
    ApiError, GeoIpResponse, REQUEST_ID_HEADER, empty_response, error_to_response, json_response,
};
use crate::router::{LookupRoute, parse_query};

/// Value of the `server` header.
pub const SERVER_NAME: &str = "geoip-server";

/// Methods served on the lookup path, without `OPTIONS`.
const LOOKUP_METHODS: &str = "GET, HEAD";

/// Methods served on the lookup path when CORS is enabled.
const LOOKUP_METHODS_WITH_CORS: &str = "GET, HEAD, OPTIONS";

/// Resolves lookup requests into responses.
///
/// Shared by every listener of a server through an `Arc`.
pub struct LookupDispatcher {
    config: Arc<ServerConfig>,
    route: LookupRoute,
    cors: CorsNegotiator,
    locator: Arc<dyn GeoLocator>,
    events: Arc<EventBus>,
}

impl fmt::Debug for LookupDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupDispatcher")
            .field("config", &self.config)
            .field("route", &self.route)
            .field("cors", &self.cors)
            .field("locator", &"...")
            .field("events", &self.events)
            .finish()
    }
}

impl LookupDispatcher {
    /// Create a dispatcher.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the lookup path or the CORS origin
    /// is invalid.
    pub fn new(
        config: Arc<ServerConfig>,
        locator: Arc<dyn GeoLocator>,
        events: Arc<EventBus>,
    ) -> GeoIpResult<Self> {
        let route = LookupRoute::new(config.lookup_template()?);
        let cors = CorsNegotiator::new(&config)?;
        Ok(Self {
            config,
            route,
            cors,
            locator,
            events,
        })
    }

    /// The event bus lookups are reported on.
    #[must_use]
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Handle one request.
    #[must_use]
    pub fn handle(
        &self,
        parts: &http::request::Parts,
        remote_addr: Option<SocketAddr>,
    ) -> GeoIpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = self.process(parts, remote_addr, &request_id);
        let response = add_common_headers(response, &request_id);
        if parts.method == Method::HEAD {
            strip_body(response)
        } else {
            response
        }
    }

    fn process(
        &self,
        parts: &http::request::Parts,
        remote_addr: Option<SocketAddr>,
        request_id: &str,
    ) -> GeoIpResponse {
        let path = parts.uri.path();

        // 1. Route.
        let Some(ip) = self.route.resolve(path) else {
            debug!(%path, "no route");
            let err = ApiError::not_found(format!("No route for {path}."));
            return error_to_response(&err, request_id);
        };

        // 2. CORS.
        let cors = self.cors.negotiate(&parts.method, &parts.headers);
        if let Some(status) = cors.short_circuit {
            let mut response = empty_response(status, request_id);
            cors.apply(&mut response);
            return response;
        }

        let mut response = self.lookup(parts, ip, remote_addr, request_id);
        cors.apply(&mut response);
        response
    }

    fn lookup(
        &self,
        parts: &http::request::Parts,
        ip: String,
        remote_addr: Option<SocketAddr>,
        request_id: &str,
    ) -> GeoIpResponse {
        // 3. Method.
        if parts.method != Method::GET && parts.method != Method::HEAD {
            let err = ApiError::method_not_allowed(&parts.method);
            let mut response = error_to_response(&err, request_id);
            let allow = if self.cors.is_enabled() {
                LOOKUP_METHODS_WITH_CORS
            } else {
                LOOKUP_METHODS
            };
            response
                .headers_mut()
                .insert(http::header::ALLOW, HeaderValue::from_static(allow));
            return response;
        }

        let request = IncomingRequest::builder()
            .ip(ip)
            .path(parts.uri.path())
            .query_params(parse_query(parts.uri.query()))
            .signature_header(
                parts
                    .headers
                    .get(SIGNATURE_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned),
            )
            .remote_addr(remote_addr)
            .build();

        // 4. Authenticate.
        if let Err(auth_err) = authenticate(&request, self.config.secret_key.as_deref()) {
            debug!(ip = %request.ip, error = %auth_err, "request rejected");
            return error_to_response(&ApiError::from(auth_err), request_id);
        }

        // 5. Resolve.
        let geo = match self.locator.lookup_str(&request.ip) {
            Ok(Some(geo)) => geo,
            Ok(None) => {
                let err = ApiError::not_found(format!("No location found for {}.", request.ip));
                return error_to_response(&err, request_id);
            }
            Err(lookup_err) => {
                let err = ApiError::from(lookup_err);
                if err.status.is_server_error() {
                    error!(ip = %request.ip, error = %err, "lookup failed");
                }
                return error_to_response(&err, request_id);
            }
        };

        let json = match serde_json::to_vec(&geo) {
            Ok(json) => json,
            Err(e) => {
                let err = ApiError::internal(format!("Failed to serialize record: {e}"));
                return error_to_response(&err, request_id);
            }
        };

        self.events.emit(&ServerEvent::Lookup(LookupEvent {
            ip: request.ip.clone(),
            geo,
            request: Arc::new(request),
        }));

        json_response(json, request_id)
    }
}

/// Hyper `Service` wrapping a shared [`LookupDispatcher`].
///
/// Generic over the request body, which is never read.
#[derive(Debug, Clone)]
pub struct GeoIpHttpService {
    dispatcher: Arc<LookupDispatcher>,
    remote_addr: Option<SocketAddr>,
}

impl GeoIpHttpService {
    /// Create a new `GeoIpHttpService`.
    #[must_use]
    pub fn new(dispatcher: Arc<LookupDispatcher>) -> Self {
        Self {
            dispatcher,
            remote_addr: None,
        }
    }

    /// A copy of this service that records `addr` as the peer of every
    /// request.
    #[must_use]
    pub fn with_remote_addr(&self, addr: SocketAddr) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            remote_addr: Some(addr),
        }
    }
}

impl<B> hyper::service::Service<http::Request<B>> for GeoIpHttpService {
    type Response = GeoIpResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let (parts, _body) = req.into_parts();
        let response = self.dispatcher.handle(&parts, self.remote_addr);
        Box::pin(async move { Ok(response) })
    }
}

/// Add common response headers to every response.
fn add_common_headers(mut response: GeoIpResponse, request_id: &str) -> GeoIpResponse {
    let headers = response.headers_mut();

    if let Ok(hv) = HeaderValue::from_str(request_id) {
        headers.entry(REQUEST_ID_HEADER).or_insert(hv);
    }

    headers.insert(http::header::SERVER, HeaderValue::from_static(SERVER_NAME));

    response
}

/// Replace the body with an empty one, keeping its length in `content-length`.
fn strip_body(response: GeoIpResponse) -> GeoIpResponse {
    let (mut parts, body) = response.into_parts();
    if let Some(len) = body.size_hint().exact() {
        parts
            .headers
            .insert(http::header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    GeoIpResponse::from_parts(parts, Full::new(Bytes::new()))
}
