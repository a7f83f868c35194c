//! Describes where the worker finds its request and response channels.
//!
//! Hosts normally hand the worker two inherited file descriptors that are
//! distinct from stdout and stderr. Tests and ad-hoc runs can point either
//! channel at a filesystem path instead.

use std::fmt;

use camino::Utf8PathBuf;

/// Source or sink for one framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelBinding {
    /// A file descriptor inherited from the host process.
    Descriptor(i32),
    /// A regular file or named pipe on the filesystem.
    Path(Utf8PathBuf),
}

impl ChannelBinding {
    /// Chooses the path when one is configured, otherwise the descriptor.
    #[must_use]
    pub fn resolve(path: Option<&Utf8PathBuf>, fd: i32) -> Self {
        match path {
            Some(path) => Self::Path(path.clone()),
            None => Self::Descriptor(fd),
        }
    }
}

impl fmt::Display for ChannelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptor(fd) => write!(f, "fd:{fd}"),
            Self::Path(path) => write!(f, "{path}"),
        }
    }
}
