//! Backend service configuration schema.
//!
//! A [`BackendServiceConfig`] describes one application: its identity, the path
//! it answers on, its origins and the settings used to talk to them. It is only
//! constructed through [`BackendServiceBuilder::build`], which validates it once.
//! Afterwards it is immutable and shared via `Arc` by every in-flight request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::validation::validate_backend_service;
use crate::error::ConfigError;

/// Application id used when none is configured.
pub const GENERIC_APP: &str = "generic-app";

/// Response timeout applied when the configured value is zero.
pub const DEFAULT_RESPONSE_TIMEOUT_MILLIS: u64 = 1000;

/// Max header size meaning "use the transport default".
pub const USE_DEFAULT_MAX_HEADER_SIZE: usize = 0;

/// Protocol used to reach the origins of a backend service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Protocol {
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("HTTP"),
            Protocol::Https => f.write_str("HTTPS"),
        }
    }
}

/// A single origin server belonging to an application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Origin {
    /// Origin identifier. Defaults to `host:port` when left empty.
    #[serde(default)]
    pub id: String,

    /// Owning application. Filled in from the backend service when left empty.
    #[serde(default)]
    pub application_id: String,

    pub host: String,

    pub port: u16,
}

impl Origin {
    /// Create an anonymous origin; its id is derived from `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            id: format!("{}:{}", host, port),
            application_id: GENERIC_APP.to_string(),
            host,
            port,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_application_id(mut self, app_id: impl Into<String>) -> Self {
        self.application_id = app_id.into();
        self
    }

    pub fn host_and_port(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.application_id, self.id, self.host_and_port())
    }
}

/// Connection pool settings handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionPoolSettings {
    /// Maximum in-flight exchanges per origin. Also bounds idle pooled connections.
    pub max_connections_per_host: usize,

    /// Maximum requests waiting for a free connection per origin.
    pub max_pending_connections_per_host: usize,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_millis: u64,

    /// How long a request may wait for a pooled connection, in milliseconds.
    pub pending_connection_timeout_millis: u64,

    /// Connection lifetime in seconds. Negative means connections never expire.
    pub connection_expiration_seconds: i64,
}

impl ConnectionPoolSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_millis)
    }

    pub fn pending_connection_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_connection_timeout_millis)
    }

    pub fn connection_expiration(&self) -> Option<Duration> {
        u64::try_from(self.connection_expiration_seconds)
            .ok()
            .map(Duration::from_secs)
    }
}

impl Default for ConnectionPoolSettings {
    fn default() -> Self {
        Self {
            max_connections_per_host: 50,
            max_pending_connections_per_host: 25,
            connect_timeout_millis: 2000,
            pending_connection_timeout_millis: 2000,
            connection_expiration_seconds: -1,
        }
    }
}

/// Health check settings. Probing itself happens outside the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    pub enabled: bool,

    /// Path probed on each origin.
    pub uri: Option<String>,

    pub interval_millis: u64,

    pub timeout_millis: u64,

    /// Consecutive successes before an origin is marked healthy.
    pub healthy_threshold: u32,

    /// Consecutive failures before an origin is marked unhealthy.
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            uri: None,
            interval_millis: 5000,
            timeout_millis: 2000,
            healthy_threshold: 2,
            unhealthy_threshold: 2,
        }
    }
}

/// Sticky session settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StickySessionConfig {
    pub enabled: bool,

    /// Lifetime of the sticky-session cookie in seconds.
    pub timeout_seconds: u64,
}

impl StickySessionConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn enabled(timeout_seconds: u64) -> Self {
        Self {
            enabled: true,
            timeout_seconds,
        }
    }

    /// Cookie max-age, only when positive.
    pub fn max_age(&self) -> Option<u64> {
        (self.timeout_seconds > 0).then_some(self.timeout_seconds)
    }
}

impl Default for StickySessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_seconds: 43_200,
        }
    }
}

/// One URL rewrite: a regex over the request target and its replacement.
///
/// The replacement may reference capture groups as `$1`, `$name`, etc.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RewriteConfig {
    pub url_pattern: String,
    pub replacement: String,
}

impl RewriteConfig {
    pub fn new(url_pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            url_pattern: url_pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// An extra trusted certificate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Certificate {
    pub alias: String,
    pub certificate_path: String,
}

/// TLS settings for talking to origins. Presence implies HTTPS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsSettings {
    /// Verify origin certificates.
    pub authenticate: bool,

    pub ssl_provider: String,

    pub trust_store_path: Option<String>,

    pub additional_certs: Vec<Certificate>,

    pub protocols: Vec<String>,

    pub cipher_suites: Vec<String>,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            authenticate: true,
            ssl_provider: "default".to_string(),
            trust_store_path: None,
            additional_certs: Vec::new(),
            protocols: vec!["TLSv1.2".to_string(), "TLSv1.3".to_string()],
            cipher_suites: Vec::new(),
        }
    }
}

/// Validated, immutable description of a backend service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendServiceConfig {
    id: String,
    path: String,
    origins: Vec<Origin>,
    connection_pool: ConnectionPoolSettings,
    health_check: Option<HealthCheckConfig>,
    sticky_session: StickySessionConfig,
    rewrites: Vec<RewriteConfig>,
    override_host_header: bool,
    response_timeout_millis: u64,
    max_header_size: usize,
    tls: Option<TlsSettings>,
}

impl BackendServiceConfig {
    pub fn builder() -> BackendServiceBuilder {
        BackendServiceBuilder::default()
    }

    /// A builder pre-filled with this configuration, for "with changes" copies.
    pub fn to_builder(&self) -> BackendServiceBuilder {
        BackendServiceBuilder {
            id: self.id.clone(),
            path: self.path.clone(),
            origins: self.origins.clone(),
            connection_pool: self.connection_pool.clone(),
            health_check: self.health_check.clone(),
            sticky_session: self.sticky_session.clone(),
            rewrites: self.rewrites.clone(),
            override_host_header: self.override_host_header,
            response_timeout_millis: self.response_timeout_millis,
            max_header_size: self.max_header_size,
            tls: self.tls.clone(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    pub fn connection_pool(&self) -> &ConnectionPoolSettings {
        &self.connection_pool
    }

    /// `None` when health checking is disabled.
    pub fn health_check(&self) -> Option<&HealthCheckConfig> {
        self.health_check.as_ref()
    }

    pub fn sticky_session(&self) -> &StickySessionConfig {
        &self.sticky_session
    }

    pub fn rewrites(&self) -> &[RewriteConfig] {
        &self.rewrites
    }

    pub fn override_host_header(&self) -> bool {
        self.override_host_header
    }

    /// Configured value, zero included.
    pub fn response_timeout_millis(&self) -> u64 {
        self.response_timeout_millis
    }

    /// Effective response timeout; zero means the default.
    pub fn response_timeout(&self) -> Duration {
        if self.response_timeout_millis == 0 {
            Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MILLIS)
        } else {
            Duration::from_millis(self.response_timeout_millis)
        }
    }

    pub fn max_header_size(&self) -> usize {
        self.max_header_size
    }

    pub fn tls(&self) -> Option<&TlsSettings> {
        self.tls.as_ref()
    }

    pub fn protocol(&self) -> Protocol {
        if self.tls.is_some() {
            Protocol::Https
        } else {
            Protocol::Http
        }
    }
}

/// Builder for [`BackendServiceConfig`]. Also the on-disk representation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendServiceBuilder {
    id: String,
    path: String,
    origins: Vec<Origin>,
    connection_pool: ConnectionPoolSettings,
    health_check: Option<HealthCheckConfig>,
    sticky_session: StickySessionConfig,
    rewrites: Vec<RewriteConfig>,
    override_host_header: bool,
    response_timeout_millis: u64,
    max_header_size: usize,
    tls: Option<TlsSettings>,
}

impl Default for BackendServiceBuilder {
    fn default() -> Self {
        Self {
            id: GENERIC_APP.to_string(),
            path: "/".to_string(),
            origins: Vec::new(),
            connection_pool: ConnectionPoolSettings::default(),
            health_check: None,
            sticky_session: StickySessionConfig::default(),
            rewrites: Vec::new(),
            override_host_header: false,
            response_timeout_millis: DEFAULT_RESPONSE_TIMEOUT_MILLIS,
            max_header_size: USE_DEFAULT_MAX_HEADER_SIZE,
            tls: None,
        }
    }
}

impl BackendServiceBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn origins(mut self, origins: impl IntoIterator<Item = Origin>) -> Self {
        self.origins = origins.into_iter().collect();
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.origins.push(origin);
        self
    }

    pub fn connection_pool(mut self, settings: ConnectionPoolSettings) -> Self {
        self.connection_pool = settings;
        self
    }

    pub fn health_check(mut self, config: Option<HealthCheckConfig>) -> Self {
        self.health_check = config;
        self
    }

    pub fn sticky_session(mut self, config: StickySessionConfig) -> Self {
        self.sticky_session = config;
        self
    }

    pub fn rewrites(mut self, rewrites: impl IntoIterator<Item = RewriteConfig>) -> Self {
        self.rewrites = rewrites.into_iter().collect();
        self
    }

    pub fn override_host_header(mut self, enabled: bool) -> Self {
        self.override_host_header = enabled;
        self
    }

    pub fn response_timeout_millis(mut self, millis: u64) -> Self {
        self.response_timeout_millis = millis;
        self
    }

    pub fn max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = size;
        self
    }

    pub fn https(mut self, tls: Option<TlsSettings>) -> Self {
        self.tls = tls;
        self
    }

    /// Normalize and validate. Every validation error is reported at once.
    pub fn build(self) -> Result<BackendServiceConfig, ConfigError> {
        let id = self.id;
        let origins = self
            .origins
            .into_iter()
            .map(|mut origin| {
                if origin.id.is_empty() {
                    origin.id = origin.host_and_port();
                }
                if origin.application_id.is_empty() || origin.application_id == GENERIC_APP {
                    origin.application_id = id.clone();
                }
                origin
            })
            .collect();

        let config = BackendServiceConfig {
            id,
            path: self.path,
            origins,
            connection_pool: self.connection_pool,
            health_check: self.health_check.filter(|hc| hc.enabled),
            sticky_session: self.sticky_session,
            rewrites: self.rewrites,
            override_host_header: self.override_host_header,
            response_timeout_millis: self.response_timeout_millis,
            max_header_size: self.max_header_size,
            tls: self.tls,
        };

        validate_backend_service(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
