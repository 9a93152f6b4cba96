//! Per-call context.
//!
//! The [`CallContext`] carries state through a middleware chain for the
//! duration of one call. Middleware enrich it (request id, metadata,
//! trace ids) and later stages or the handler read it back.

use crate::types::Side;
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Unique identifier for a call.
///
/// Generated as a UUID v7 so ids sort by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a new request id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parses a request id from its string form.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Context that flows through a middleware chain.
///
/// # Example
///
/// ```
/// use daedalus_middleware::context::CallContext;
/// use daedalus_middleware::Side;
/// use std::time::Duration;
///
/// let mut ctx = CallContext::new(Side::Server)
///     .with_service("greeter")
///     .with_timeout(Duration::from_secs(1));
/// ctx.set_metadata("x-md-tenant", "acme");
///
/// assert_eq!(ctx.service(), Some("greeter"));
/// assert_eq!(ctx.metadata("x-md-tenant"), Some("acme"));
/// assert!(!ctx.is_expired());
/// ```
pub struct CallContext {
    request_id: RequestId,
    side: Side,
    service: Option<String>,
    operation: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    deadline: Option<Instant>,
    started_at: Instant,
    metadata: BTreeMap<String, String>,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl CallContext {
    /// Creates a context for `side` with a fresh request id.
    #[must_use]
    pub fn new(side: Side) -> Self {
        Self {
            request_id: RequestId::new(),
            side,
            service: None,
            operation: None,
            trace_id: None,
            span_id: None,
            deadline: None,
            started_at: Instant::now(),
            metadata: BTreeMap::new(),
            extensions: HashMap::new(),
        }
    }

    /// Sets the service name.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Sets the operation name.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Sets a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Replaces the request id.
    pub fn set_request_id(&mut self, request_id: RequestId) {
        self.request_id = request_id;
    }

    /// Returns the side this call runs on.
    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Returns the service name, if set.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    /// Returns the operation name, if set.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// Sets the operation name.
    pub fn set_operation(&mut self, operation: impl Into<String>) {
        self.operation = Some(operation.into());
    }

    /// Returns the trace id, if set.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Sets the trace id.
    pub fn set_trace_id(&mut self, trace_id: impl Into<String>) {
        self.trace_id = Some(trace_id.into());
    }

    /// Returns the span id, if set.
    #[must_use]
    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    /// Sets the span id.
    pub fn set_span_id(&mut self, span_id: impl Into<String>) {
        self.span_id = Some(span_id.into());
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets the deadline.
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Returns the time left before the deadline, or `None` without one.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns `true` once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Returns when the call started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the call started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns a metadata value.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Sets a metadata value. Keys are stored lowercase.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata
            .insert(key.into().to_ascii_lowercase(), value.into());
    }

    /// Returns all metadata, sorted by key.
    #[must_use]
    pub fn metadata_map(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Stores a typed extension value.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Retrieves a typed extension value mutably.
    pub fn get_extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Removes and returns a typed extension value.
    pub fn remove_extension<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.extensions
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("request_id", &self.request_id)
            .field("side", &self.side)
            .field("service", &self.service)
            .field("operation", &self.operation)
            .field("trace_id", &self.trace_id)
            .field("deadline", &self.deadline)
            .field("metadata", &self.metadata)
            .field("extension_count", &self.extensions.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_request_id() {
        let a = CallContext::new(Side::Server);
        let b = CallContext::new(Side::Server);
        assert_ne!(a.request_id(), b.request_id());
        assert_eq!(a.side(), Side::Server);
    }

    #[test]
    fn test_request_id_parse() {
        let id = RequestId::new();
        assert_eq!(RequestId::parse(&id.to_string()), Some(id));
        assert_eq!(RequestId::parse("not-a-uuid"), None);
    }

    #[test]
    fn test_deadline() {
        let ctx = CallContext::new(Side::Client);
        assert!(!ctx.is_expired());
        assert!(ctx.remaining().is_none());

        let ctx = CallContext::new(Side::Client).with_deadline(Instant::now());
        assert!(ctx.is_expired());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_metadata_keys_are_lowercased() {
        let mut ctx = CallContext::new(Side::Server);
        ctx.set_metadata("X-MD-Tenant", "acme");
        assert_eq!(ctx.metadata("x-md-tenant"), Some("acme"));
        assert_eq!(ctx.metadata_map().len(), 1);
    }

    #[test]
    fn test_extensions() {
        #[derive(Debug, PartialEq)]
        struct Attempt(u32);

        let mut ctx = CallContext::new(Side::Client);
        ctx.set_extension(Attempt(1));
        ctx.get_extension_mut::<Attempt>().unwrap().0 += 1;

        assert_eq!(ctx.get_extension::<Attempt>(), Some(&Attempt(2)));
        assert_eq!(ctx.remove_extension::<Attempt>(), Some(Attempt(2)));
        assert!(ctx.get_extension::<Attempt>().is_none());
    }
}
