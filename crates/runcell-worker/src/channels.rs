//! Binding of the request and response channels.
//!
//! A channel is either an inherited file descriptor or a filesystem path.
//! Descriptors 0 to 2 are refused: the channels must stay distinct from the
//! diagnostic streams.

use std::fs::File;
use std::io;
use std::os::fd::{FromRawFd, RawFd};
use std::sync::Arc;

use nix::fcntl::{FcntlArg, fcntl};
use thiserror::Error;

use runcell_config::ChannelBinding;

const FIRST_CHANNEL_FD: RawFd = 3;

/// Errors raised while binding a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The descriptor is one of the standard streams.
    #[error("descriptor {fd} is reserved for standard I/O")]
    Reserved {
        /// The refused descriptor.
        fd: RawFd,
    },
    /// The descriptor was not inherited from the parent.
    #[error("descriptor {fd} is not open: {source}")]
    NotOpen {
        /// The missing descriptor.
        fd: RawFd,
        /// Error reported by `fcntl(F_GETFD)`.
        #[source]
        source: nix::Error,
    },
    /// The path could not be opened.
    #[error("failed to open channel {binding}: {source}")]
    Open {
        /// The binding that failed.
        binding: ChannelBinding,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

/// Opens the request channel for reading.
///
/// # Errors
///
/// Returns [`ChannelError`] when the channel cannot be opened.
pub fn open_request(binding: &ChannelBinding) -> Result<File, ChannelError> {
    match binding {
        ChannelBinding::Descriptor(fd) => adopt_descriptor(*fd),
        ChannelBinding::Path(path) => File::open(path).map_err(|err| open_error(binding, err)),
    }
}

/// Opens the response channel for writing, truncating any existing file.
///
/// # Errors
///
/// Returns [`ChannelError`] when the channel cannot be opened.
pub fn open_response(binding: &ChannelBinding) -> Result<File, ChannelError> {
    match binding {
        ChannelBinding::Descriptor(fd) => adopt_descriptor(*fd),
        ChannelBinding::Path(path) => File::create(path).map_err(|err| open_error(binding, err)),
    }
}

fn adopt_descriptor(fd: RawFd) -> Result<File, ChannelError> {
    if fd < FIRST_CHANNEL_FD {
        return Err(ChannelError::Reserved { fd });
    }
    fcntl(fd, FcntlArg::F_GETFD).map_err(|source| ChannelError::NotOpen { fd, source })?;
    // SAFETY: the descriptor is open, lies outside the standard streams, and
    // is adopted exactly once per process, so the returned File is its only
    // owner.
    Ok(unsafe { File::from_raw_fd(fd) })
}

fn open_error(binding: &ChannelBinding, source: io::Error) -> ChannelError {
    ChannelError::Open {
        binding: binding.clone(),
        source: Arc::new(source),
    }
}
