//! Common types used throughout middleware chains.
//!
//! Requests and responses are standard `http` types with a `Full<Bytes>`
//! body; gRPC transports map their frames onto the same shape.

use bytes::Bytes;
use daedalus_core::RuntimeError;
use http_body_util::Full;
use serde::{Deserialize, Serialize};

/// The request type carried through a chain.
pub type Request = http::Request<Full<Bytes>>;

/// The reply type produced by a handler.
pub type Response = http::Response<Full<Bytes>>;

/// What a handler or middleware returns: a reply or an error.
pub type HandlerResult = Result<Response, RuntimeError>;

/// Which pipeline a middleware belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Outgoing calls made by this process.
    Client,
    /// Incoming calls served by this process.
    Server,
}

impl Side {
    /// Returns the side as a lowercase string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extension trait for building replies.
pub trait ResponseExt {
    /// Creates a `200 OK` reply with the given body.
    fn ok(body: impl Into<Bytes>) -> Response;

    /// Creates a JSON error reply from a runtime error.
    fn from_error(error: &RuntimeError, request_id: Option<&str>) -> Response;
}

impl ResponseExt for Response {
    fn ok(body: impl Into<Bytes>) -> Response {
        let mut response = http::Response::new(Full::new(body.into()));
        *response.status_mut() = http::StatusCode::OK;
        response
    }

    fn from_error(error: &RuntimeError, request_id: Option<&str>) -> Response {
        let status = match error.kind() {
            daedalus_core::ErrorKind::NotFound => http::StatusCode::NOT_FOUND,
            daedalus_core::ErrorKind::Timeout => http::StatusCode::GATEWAY_TIMEOUT,
            daedalus_core::ErrorKind::ConfigInvalid => http::StatusCode::BAD_REQUEST,
            _ => http::StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::to_vec(&error.to_envelope(request_id)).unwrap_or_default();

        let mut response = http::Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = status;
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        response
    }
}
