//! Carrier of already-built middleware.
//!
//! During one build pass the chain builder publishes every middleware it
//! appends into a [`Carrier`], keyed by the entry's effective name. Later
//! factories (most importantly `selector`) receive a snapshot of the
//! carrier through their options and look up earlier instances by name.

use crate::middleware::BoxedMiddleware;
use crate::types::Side;
use std::collections::HashMap;
use std::fmt;

/// Client and server maps of built middleware.
#[derive(Clone, Default)]
pub struct Carrier {
    client: HashMap<String, BoxedMiddleware>,
    server: HashMap<String, BoxedMiddleware>,
}

impl Carrier {
    /// Creates an empty carrier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a client middleware, replacing any previous instance.
    pub fn put_client(&mut self, name: impl Into<String>, middleware: BoxedMiddleware) {
        self.client.insert(name.into(), middleware);
    }

    /// Publishes a server middleware, replacing any previous instance.
    pub fn put_server(&mut self, name: impl Into<String>, middleware: BoxedMiddleware) {
        self.server.insert(name.into(), middleware);
    }

    /// Publishes a middleware on `side`.
    pub fn put(&mut self, side: Side, name: impl Into<String>, middleware: BoxedMiddleware) {
        match side {
            Side::Client => self.put_client(name, middleware),
            Side::Server => self.put_server(name, middleware),
        }
    }

    /// Looks up a client middleware.
    #[must_use]
    pub fn client(&self, name: &str) -> Option<BoxedMiddleware> {
        self.client.get(name).cloned()
    }

    /// Looks up a server middleware.
    #[must_use]
    pub fn server(&self, name: &str) -> Option<BoxedMiddleware> {
        self.server.get(name).cloned()
    }

    /// Looks up a middleware on `side`.
    #[must_use]
    pub fn get(&self, side: Side, name: &str) -> Option<BoxedMiddleware> {
        match side {
            Side::Client => self.client(name),
            Side::Server => self.server(name),
        }
    }

    /// Returns the number of client middleware.
    #[must_use]
    pub fn client_len(&self) -> usize {
        self.client.len()
    }

    /// Returns the number of server middleware.
    #[must_use]
    pub fn server_len(&self) -> usize {
        self.server.len()
    }

    /// Returns the names published on `side`, sorted.
    #[must_use]
    pub fn names(&self, side: Side) -> Vec<String> {
        let map = match side {
            Side::Client => &self.client,
            Side::Server => &self.server,
        };
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Carrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Carrier")
            .field("client", &self.names(Side::Client))
            .field("server", &self.names(Side::Server))
            .finish()
    }
}
