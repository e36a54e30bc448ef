//! Remote host abstraction.
//!
//! A [`RemoteHost`] pairs an origin with a ready-to-use connection client.
//! Load balancers hand them out; the dispatcher borrows one per attempt.

use std::fmt;
use std::sync::Arc;

use crate::config::Origin;
use crate::http::client::OriginClient;

/// An origin plus a connection client for it.
#[derive(Clone)]
pub struct RemoteHost {
    origin: Origin,
    client: Arc<dyn OriginClient>,
}

impl RemoteHost {
    pub fn new(origin: Origin, client: Arc<dyn OriginClient>) -> Self {
        Self { origin, client }
    }

    pub fn id(&self) -> &str {
        &self.origin.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn client(&self) -> &Arc<dyn OriginClient> {
        &self.client
    }
}

impl fmt::Debug for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteHost")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl PartialEq for RemoteHost {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin
    }
}
