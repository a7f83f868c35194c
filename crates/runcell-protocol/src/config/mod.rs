//! Per-request execution configuration.
//!
//! The `config` object of a request selects the executor and describes the
//! capabilities, resource limits and session state for one invocation. The
//! object is decoded strictly: unknown keys, wrong value types and values
//! outside their documented ranges are rejected as [`ConfigError`] before
//! anything is spawned.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Selects which executor handles a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run the script in a separate isolated runtime process.
    #[default]
    Isolated,
    /// Run the script inside the worker under the restricted interpreter.
    InProcess,
}

/// One named axis of access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Reading environment variables.
    Environment,
    /// Reading from the filesystem.
    FilesystemRead,
    /// Writing to the filesystem.
    FilesystemWrite,
    /// Opening network connections.
    Network,
    /// Spawning subprocesses.
    ProcessSpawn,
    /// Calling foreign (native) functions.
    ForeignCall,
}

impl Capability {
    /// Every capability class, in the fixed order used for flag generation.
    pub const ALL: [Self; 6] = [
        Self::Environment,
        Self::FilesystemRead,
        Self::FilesystemWrite,
        Self::Network,
        Self::ProcessSpawn,
        Self::ForeignCall,
    ];

    /// Returns the request configuration key for this capability.
    #[must_use]
    pub const fn config_key(self) -> &'static str {
        match self {
            Self::Environment => "allow_env",
            Self::FilesystemRead => "allow_read",
            Self::FilesystemWrite => "allow_write",
            Self::Network => "allow_net",
            Self::ProcessSpawn => "allow_run",
            Self::ForeignCall => "allow_ffi",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// Access granted for a single capability class.
///
/// On the wire a grant is `false`, `true`, or an array of strings. `null`
/// is accepted and treated as `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GrantRepr", into = "GrantRepr")]
pub enum Grant {
    /// No access.
    #[default]
    Denied,
    /// Unrestricted access.
    All,
    /// Access restricted to the listed values (paths, hosts, variables...).
    AllowList(Vec<String>),
}

impl Grant {
    /// Builds an allow-list grant from any iterator of strings.
    pub fn allow<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllowList(values.into_iter().map(Into::into).collect())
    }

    /// Returns the allow-list entries, if this grant is an allow-list.
    #[must_use]
    pub fn allow_list(&self) -> Option<&[String]> {
        match self {
            Self::AllowList(values) => Some(values.as_slice()),
            Self::Denied | Self::All => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum GrantRepr {
    Unset,
    Flag(bool),
    List(Vec<String>),
}

impl From<GrantRepr> for Grant {
    fn from(repr: GrantRepr) -> Self {
        match repr {
            GrantRepr::Unset | GrantRepr::Flag(false) => Self::Denied,
            GrantRepr::Flag(true) => Self::All,
            GrantRepr::List(values) => Self::AllowList(values),
        }
    }
}

impl From<Grant> for GrantRepr {
    fn from(grant: Grant) -> Self {
        match grant {
            Grant::Denied => Self::Flag(false),
            Grant::All => Self::Flag(true),
            Grant::AllowList(values) => Self::List(values),
        }
    }
}

/// Grants for every capability class. Absent grants are denied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSpec {
    environment: Grant,
    read: Grant,
    write: Grant,
    network: Grant,
    process_spawn: Grant,
    foreign_call: Grant,
}

impl PermissionSpec {
    /// Creates a specification that denies every capability.
    #[must_use]
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Replaces the grant for one capability.
    #[must_use]
    pub fn with(mut self, capability: Capability, grant: Grant) -> Self {
        *self.slot_mut(capability) = grant;
        self
    }

    /// Returns the grant for one capability.
    #[must_use]
    pub const fn grant(&self, capability: Capability) -> &Grant {
        match capability {
            Capability::Environment => &self.environment,
            Capability::FilesystemRead => &self.read,
            Capability::FilesystemWrite => &self.write,
            Capability::Network => &self.network,
            Capability::ProcessSpawn => &self.process_spawn,
            Capability::ForeignCall => &self.foreign_call,
        }
    }

    /// Iterates over all grants in the fixed capability order.
    pub fn iter(&self) -> impl Iterator<Item = (Capability, &Grant)> {
        Capability::ALL
            .into_iter()
            .map(move |capability| (capability, self.grant(capability)))
    }

    const fn slot_mut(&mut self, capability: Capability) -> &mut Grant {
        match capability {
            Capability::Environment => &mut self.environment,
            Capability::FilesystemRead => &mut self.read,
            Capability::FilesystemWrite => &mut self.write,
            Capability::Network => &mut self.network,
            Capability::ProcessSpawn => &mut self.process_spawn,
            Capability::ForeignCall => &mut self.foreign_call,
        }
    }
}

/// How the isolated runtime manages its package cache directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeModulesDir {
    /// Let the runtime create and populate the directory as needed.
    #[default]
    Auto,
    /// Use a directory populated ahead of time.
    Manual,
    /// Do not use a local package directory.
    None,
}

impl NodeModulesDir {
    /// Returns the value as understood by the runtime command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::None => "none",
        }
    }
}

/// Hard bounds applied to one execution. `None` means runtime default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceLimits {
    timeout: Option<Duration>,
    memory_limit_mb: Option<u32>,
}

impl ResourceLimits {
    /// Creates limits from their optional parts.
    #[must_use]
    pub const fn new(timeout: Option<Duration>, memory_limit_mb: Option<u32>) -> Self {
        Self {
            timeout,
            memory_limit_mb,
        }
    }

    /// Wall-clock bound for the execution.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Heap limit for the isolated runtime in megabytes.
    #[must_use]
    pub const fn memory_limit_mb(&self) -> Option<u32> {
        self.memory_limit_mb
    }

    /// Fills in the timeout when the request did not specify one.
    #[must_use]
    pub fn or_timeout(mut self, fallback: Option<Duration>) -> Self {
        if self.timeout.is_none() {
            self.timeout = fallback;
        }
        self
    }
}

/// Opaque session state threaded through successive sandbox invocations.
///
/// The host never interprets either part; it stores what a previous result
/// returned and supplies it again on the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    bytes: Option<Vec<u8>>,
    metadata: Option<Map<String, Value>>,
}

impl SessionState {
    /// Creates session state from its optional parts.
    #[must_use]
    pub const fn new(bytes: Option<Vec<u8>>, metadata: Option<Map<String, Value>>) -> Self {
        Self { bytes, metadata }
    }

    /// Serialised interpreter state from a previous invocation.
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    /// Structured metadata from a previous invocation.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    /// Returns true when neither part is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_none() && self.metadata.is_none()
    }

    /// Splits the state into its parts.
    #[must_use]
    pub fn into_parts(self) -> (Option<Vec<u8>>, Option<Map<String, Value>>) {
        (self.bytes, self.metadata)
    }
}

/// The decoded `config` object of an execution request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    mode: ExecutionMode,
    allow_env: Grant,
    allow_read: Grant,
    allow_write: Grant,
    allow_net: Grant,
    allow_run: Grant,
    allow_ffi: Grant,
    node_modules_dir: NodeModulesDir,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_limit_mb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_seconds: Option<f64>,
    stateful: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_bytes: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_metadata: Option<Map<String, Value>>,
}

impl ExecutionConfig {
    /// Decodes and validates a `config` value taken from a request.
    ///
    /// `null` decodes to the default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the value is not an object of the
    /// documented shape or when a field is out of range.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_value(value).map_err(ConfigError::malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks field ranges and allow-list entries.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (capability, grant) in self.permissions().iter() {
            let Some(entries) = grant.allow_list() else {
                continue;
            };
            for entry in entries {
                if entry.trim().is_empty() {
                    return Err(ConfigError::EmptyAllowListEntry { capability });
                }
                if entry.contains(',') {
                    return Err(ConfigError::InvalidAllowListEntry {
                        capability,
                        entry: entry.clone(),
                    });
                }
            }
        }

        if let Some(value) = self.timeout_seconds
            && Duration::try_from_secs_f64(value).is_err()
        {
            return Err(ConfigError::InvalidTimeout { value });
        }

        if self.memory_limit_mb == Some(0) {
            return Err(ConfigError::ZeroMemoryLimit);
        }

        Ok(())
    }

    /// Selects the executor.
    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the grant for one capability.
    #[must_use]
    pub fn with_grant(mut self, capability: Capability, grant: Grant) -> Self {
        let slot = match capability {
            Capability::Environment => &mut self.allow_env,
            Capability::FilesystemRead => &mut self.allow_read,
            Capability::FilesystemWrite => &mut self.allow_write,
            Capability::Network => &mut self.allow_net,
            Capability::ProcessSpawn => &mut self.allow_run,
            Capability::ForeignCall => &mut self.allow_ffi,
        };
        *slot = grant;
        self
    }

    /// Sets the wall-clock bound in seconds.
    #[must_use]
    pub const fn with_timeout_seconds(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    /// Sets the heap limit in megabytes.
    #[must_use]
    pub const fn with_memory_limit_mb(mut self, megabytes: u32) -> Self {
        self.memory_limit_mb = Some(megabytes);
        self
    }

    /// Sets the package cache directory mode.
    #[must_use]
    pub const fn with_node_modules_dir(mut self, mode: NodeModulesDir) -> Self {
        self.node_modules_dir = mode;
        self
    }

    /// Requests that the sandbox return updated session state.
    #[must_use]
    pub const fn with_stateful(mut self, stateful: bool) -> Self {
        self.stateful = stateful;
        self
    }

    /// Supplies session state from a previous invocation.
    #[must_use]
    pub fn with_session(mut self, session: SessionState) -> Self {
        let (bytes, metadata) = session.into_parts();
        self.session_bytes = bytes;
        self.session_metadata = metadata;
        self
    }

    /// Returns the selected executor.
    #[must_use]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns the capability grants.
    #[must_use]
    pub fn permissions(&self) -> PermissionSpec {
        PermissionSpec::deny_all()
            .with(Capability::Environment, self.allow_env.clone())
            .with(Capability::FilesystemRead, self.allow_read.clone())
            .with(Capability::FilesystemWrite, self.allow_write.clone())
            .with(Capability::Network, self.allow_net.clone())
            .with(Capability::ProcessSpawn, self.allow_run.clone())
            .with(Capability::ForeignCall, self.allow_ffi.clone())
    }

    /// Returns the resource limits.
    ///
    /// Call [`validate`](Self::validate) first; an out-of-range timeout is
    /// treated as absent here.
    #[must_use]
    pub fn limits(&self) -> ResourceLimits {
        let timeout = self
            .timeout_seconds
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        ResourceLimits::new(timeout, self.memory_limit_mb)
    }

    /// Returns the session state supplied with the request.
    #[must_use]
    pub fn session(&self) -> SessionState {
        SessionState::new(self.session_bytes.clone(), self.session_metadata.clone())
    }

    /// Returns the package cache directory mode.
    #[must_use]
    pub const fn node_modules_dir(&self) -> NodeModulesDir {
        self.node_modules_dir
    }

    /// Returns true when the sandbox should report updated session state.
    #[must_use]
    pub const fn is_stateful(&self) -> bool {
        self.stateful
    }
}
