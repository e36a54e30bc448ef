//! Load balancing contract.
//!
//! # Data Flow
//! ```text
//! Dispatcher builds Preferences
//!     → preferred origin (sticky.rs, from the request's cookies)
//!     → avoid-list (origins already tried in this retry chain)
//!     → LoadBalancer::choose(&preferences)
//!     → Some(RemoteHost) (remote_host.rs) or None
//! ```
//!
//! # Design Decisions
//! - Selection algorithms live outside this crate; only the contract is here
//! - The avoid-list is advisory: a balancer may still return an avoided origin
//! - Sticky-session support is a capability query, not a type check
//! - Implementations are shared across requests and must be thread-safe

pub mod remote_host;
pub mod sticky;

pub use remote_host::RemoteHost;

use crate::config::Origin;

/// Hints passed to a load balancer when choosing an origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    preferred_origin: Option<String>,
    avoid_origins: Vec<Origin>,
}

impl Preferences {
    pub fn new(preferred_origin: Option<String>, avoid_origins: Vec<Origin>) -> Self {
        Self {
            preferred_origin,
            avoid_origins,
        }
    }

    /// Preferences that only carry an avoid-list built from tried hosts.
    pub fn avoiding(previous: &[RemoteHost]) -> Self {
        Self::new(None, previous.iter().map(|h| h.origin().clone()).collect())
    }

    /// Origin id the caller would like to be pinned to.
    pub fn preferred_origin(&self) -> Option<&str> {
        self.preferred_origin.as_deref()
    }

    /// Origins already tried in this logical request.
    pub fn avoid_origins(&self) -> &[Origin] {
        &self.avoid_origins
    }

    pub fn avoids(&self, origin: &Origin) -> bool {
        self.avoid_origins.iter().any(|o| o.id == origin.id)
    }
}

/// Chooses a remote host for a request.
pub trait LoadBalancer: Send + Sync {
    /// Return an eligible host, or `None` if there is none.
    fn choose(&self, preferences: &Preferences) -> Option<RemoteHost>;

    /// Whether responses should carry a sticky-session cookie.
    fn sticky_sessions_enabled(&self) -> bool {
        false
    }
}
