//! Worker start-up: configuration, channel binding and telemetry.
//!
//! The response channel is bound before anything else that can fail, so later
//! start-up failures can still be answered with a `sandboxError`.

use std::fs::File;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::{debug, warn};

use runcell_config::Config;

use crate::channels::{self, ChannelError};
use crate::telemetry::{self, TelemetryHandle};

const BOOTSTRAP_TARGET: &str = "runcell_worker::bootstrap";

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader {
    /// Loads the worker configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader error when any configuration layer is invalid.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Errors surfaced before the worker can read its request.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// The response channel could not be bound.
    #[error("failed to bind channel: {source}")]
    Channel {
        /// Underlying channel error.
        #[source]
        source: ChannelError,
    },
}

impl From<ChannelError> for BootstrapError {
    fn from(source: ChannelError) -> Self {
        Self::Channel { source }
    }
}

/// A configured worker with its response channel bound.
///
/// The request channel is kept as the outcome of binding it, so a failure can
/// be reported on the response channel.
#[derive(Debug)]
pub struct Bootstrapped {
    config: Config,
    telemetry: TelemetryHandle,
    request: Result<File, ChannelError>,
    response: File,
}

impl Bootstrapped {
    /// The resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The diagnostics filter in force.
    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryHandle {
        &self.telemetry
    }

    /// Splits into the configuration, the request channel binding outcome and
    /// the response channel.
    #[must_use]
    pub fn into_parts(self) -> (Config, Result<File, ChannelError>, File) {
        (self.config, self.request, self.response)
    }
}

/// Loads configuration, binds the response channel, installs telemetry and
/// then binds the request channel.
///
/// # Errors
///
/// Returns [`BootstrapError`] when configuration fails to load or the response
/// channel cannot be bound. A request channel failure is carried in the
/// returned [`Bootstrapped`] instead.
pub fn bootstrap_with(loader: &dyn ConfigLoader) -> Result<Bootstrapped, BootstrapError> {
    let config = loader
        .load()
        .map_err(|source| BootstrapError::Configuration { source })?;

    let response_channel = config.response_channel();
    let response = channels::open_response(&response_channel)?;
    let telemetry = telemetry::initialise(&config);

    let request_channel = config.request_channel();
    debug!(
        target: BOOTSTRAP_TARGET,
        request = %request_channel,
        response = %response_channel,
        filter = telemetry.filter(),
        "binding channels"
    );
    let request = channels::open_request(&request_channel);
    if let Err(err) = &request {
        warn!(target: BOOTSTRAP_TARGET, error = %err, "failed to bind request channel");
    }

    Ok(Bootstrapped {
        config,
        telemetry,
        request,
        response,
    })
}
