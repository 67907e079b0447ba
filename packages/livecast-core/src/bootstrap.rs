//! Application bootstrap and dependency wiring.
//!
//! This module contains the composition root, the single place where the
//! Cast client, the stream resolver and the device actor are instantiated
//! and wired together.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;

use crate::cast::{CastClient, CastClientImpl, Device};
use crate::error::{LivecastError, LivecastResult};
use crate::events::EventEmitter;
use crate::runtime::TokioSpawner;
use crate::services::{spawn_device_actor, ArbitrationEngine, DeviceActorHandle};
use crate::state::Config;
use crate::stream::directory::NAME_PLACEHOLDER;
use crate::stream::{IcecastDirectoryResolver, StreamResolver, StreamTable, UrlTemplateResolver};

/// Where stream names are resolved to playback URLs.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSource {
    /// Icecast `status-json.xsl` URL; only live mounts resolve.
    Directory(String),
    /// URL template containing `{name}`.
    Template(String),
}

/// Container for all bootstrapped services.
#[derive(Clone)]
pub struct BootstrappedServices {
    /// Cast client shared with anything outside the actor.
    pub cast: Arc<dyn CastClient>,
    /// Mailbox of the device actor.
    pub actor: DeviceActorHandle,
    /// Shared HTTP client for connection pooling.
    http_client: Client,
    /// Task spawner for background operations.
    pub spawner: TokioSpawner,
    /// Cancellation token for graceful shutdown.
    pub cancel_token: CancellationToken,
    /// How long shutdown waits for the actor's in-flight notification.
    shutdown_grace: Duration,
}

impl BootstrappedServices {
    /// Returns the shared HTTP client.
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// Initiates graceful shutdown of all services.
    ///
    /// The actor finishes the notification it is handling, then exits.
    pub async fn shutdown(&self) {
        log::info!("[Bootstrap] Beginning graceful shutdown...");
        self.cancel_token.cancel();

        if tokio::time::timeout(self.shutdown_grace, self.actor.stopped())
            .await
            .is_err()
        {
            log::warn!(
                "[Bootstrap] Device actor still busy after {:?}, not waiting further",
                self.shutdown_grace
            );
            return;
        }
        log::info!("[Bootstrap] Shutdown complete");
    }
}

/// Creates the shared HTTP client for directory requests.
fn create_http_client(timeout: Duration) -> LivecastResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LivecastError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

fn create_resolver(
    source: &StreamSource,
    http_client: &Client,
    config: &Config,
) -> LivecastResult<Arc<dyn StreamResolver>> {
    match source {
        StreamSource::Directory(url) => Ok(Arc::new(IcecastDirectoryResolver::new(
            http_client.clone(),
            url.clone(),
            config.image_url.clone(),
            config.network_timeout(),
        ))),
        StreamSource::Template(template) if template.contains(NAME_PLACEHOLDER) => Ok(Arc::new(
            UrlTemplateResolver::new(template.clone(), config.image_url.clone()),
        )),
        StreamSource::Template(template) => Err(LivecastError::Configuration(format!(
            "URL template {:?} has no {} placeholder",
            template, NAME_PLACEHOLDER
        ))),
    }
}

/// Bootstraps all services for one device.
///
/// Services are created in dependency order:
///
/// 1. Shared infrastructure (HTTP client, cancellation token, spawner)
/// 2. Cast client
/// 3. Stream resolver (depends on HTTP client)
/// 4. Arbitration engine (depends on cast client, resolver, emitter)
/// 5. Device actor (owns the engine)
///
/// # Arguments
/// * `config` - Core configuration
/// * `device` - Device to control
/// * `streams` - Configured streams and their priorities
/// * `source` - How stream names resolve to URLs
/// * `emitter` - Receiver of domain events
///
/// # Errors
///
/// Returns [`LivecastError::Configuration`] if the configuration is invalid
/// or the stream table is empty.
pub fn bootstrap_services(
    config: &Config,
    device: Device,
    streams: StreamTable,
    source: StreamSource,
    emitter: Arc<dyn EventEmitter>,
) -> LivecastResult<BootstrappedServices> {
    config.validate().map_err(LivecastError::Configuration)?;
    if streams.is_empty() {
        return Err(LivecastError::Configuration(
            "at least one stream must be configured".to_string(),
        ));
    }

    let spawner = TokioSpawner::current();
    let http_client = create_http_client(config.network_timeout())?;
    let cancel_token = CancellationToken::new();

    let cast: Arc<dyn CastClient> = Arc::new(CastClientImpl::new(
        config.network_timeout(),
        config.app_load_timeout(),
    ));

    let resolver = create_resolver(&source, &http_client, config)?;

    log::info!(
        "[Bootstrap] Arbitrating {} stream(s) on {} via {:?}",
        streams.len(),
        device,
        source
    );

    let engine = ArbitrationEngine::new(
        Arc::clone(&cast),
        device,
        streams,
        resolver,
        config.arbitration.clone(),
        emitter,
    );

    let mute_poll = config
        .arbitration
        .use_mute_interlock
        .then(|| config.arbitration.mute_poll_interval());

    let actor = spawn_device_actor(
        &spawner,
        engine,
        mute_poll,
        config.mailbox_capacity,
        cancel_token.clone(),
    );

    Ok(BootstrappedServices {
        cast,
        actor,
        http_client,
        spawner,
        cancel_token,
        shutdown_grace: config.app_load_timeout() + config.network_timeout(),
    })
}
