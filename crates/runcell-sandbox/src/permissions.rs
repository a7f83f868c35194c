//! Translation of capability grants into runtime permission flags.

use runcell_protocol::{Capability, Grant, NodeModulesDir, PermissionSpec};

/// Paths granted for filesystem reads and writes when the request grants
/// nothing. The runtime needs them to load its own packages.
pub const DEFAULT_FILESYSTEM_ALLOW_LIST: &[&str] = &["node_modules"];

/// Ordered permission flags for one runtime invocation.
///
/// The same [`PermissionSpec`] always yields the same flags in the same
/// order: one entry per granted class, in [`Capability::ALL`] order, followed
/// by the package directory mode.
///
/// ```
/// use runcell_protocol::{Capability, Grant, NodeModulesDir, PermissionSpec};
/// use runcell_sandbox::RuntimePermissions;
///
/// let spec = PermissionSpec::deny_all().with(Capability::Network, Grant::allow(["example.com"]));
/// let permissions = RuntimePermissions::from_spec(&spec, NodeModulesDir::Auto);
/// assert_eq!(
///     permissions.flags(),
///     [
///         "--allow-read=node_modules",
///         "--allow-write=node_modules",
///         "--allow-net=example.com",
///         "--node-modules-dir=auto",
///     ]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePermissions {
    flags: Vec<String>,
}

impl RuntimePermissions {
    /// Builds the flag list for `spec`.
    #[must_use]
    pub fn from_spec(spec: &PermissionSpec, node_modules_dir: NodeModulesDir) -> Self {
        let mut flags: Vec<String> = spec
            .iter()
            .filter_map(|(capability, grant)| capability_flag(capability, grant))
            .collect();
        flags.push(format!("--node-modules-dir={}", node_modules_dir.as_str()));
        Self { flags }
    }

    /// The flags in invocation order.
    #[must_use]
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Consumes the list and returns the flags.
    #[must_use]
    pub fn into_flags(self) -> Vec<String> {
        self.flags
    }
}

const fn flag_name(capability: Capability) -> &'static str {
    match capability {
        Capability::Environment => "--allow-env",
        Capability::FilesystemRead => "--allow-read",
        Capability::FilesystemWrite => "--allow-write",
        Capability::Network => "--allow-net",
        Capability::ProcessSpawn => "--allow-run",
        Capability::ForeignCall => "--allow-ffi",
    }
}

const fn has_filesystem_default(capability: Capability) -> bool {
    matches!(
        capability,
        Capability::FilesystemRead | Capability::FilesystemWrite
    )
}

fn capability_flag(capability: Capability, grant: &Grant) -> Option<String> {
    let name = flag_name(capability);
    match grant {
        Grant::All => Some(name.to_owned()),
        Grant::AllowList(entries) if !entries.is_empty() => {
            Some(format!("{name}={}", entries.join(",")))
        }
        Grant::Denied | Grant::AllowList(_) => has_filesystem_default(capability)
            .then(|| format!("{name}={}", DEFAULT_FILESYSTEM_ALLOW_LIST.join(","))),
    }
}
