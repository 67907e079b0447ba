//! Livecast Core - shared library for Livecast.
//!
//! Livecast keeps a single Google Cast device playing the highest-priority
//! live audio stream. It controls the device over the Cast v2 protocol and
//! reacts to "stream started" / "stream ended" notifications.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cast`]: Cast v2 wire format, channel sessions, correlated RPC and discovery
//! - [`stream`]: Configured streams and their resolution to playback URLs
//! - [`services`]: Arbitration engine, mute interlock, volume restore, device actor
//! - [`notifications`]: Decoding of stream lifecycle notifications
//! - [`events`]: Domain events for observers
//! - [`state`]: Core configuration
//! - [`runtime`]: Task spawning abstraction
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`CastClient`](cast::CastClient): Device and media control, mockable in tests
//! - [`StreamResolver`](stream::StreamResolver): Stream name to playable URL
//! - [`EventEmitter`](events::EventEmitter): Emitting domain events
//! - [`TaskSpawner`](runtime::TaskSpawner): Spawning background tasks

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod cast;
pub mod error;
pub mod events;
pub mod notifications;
pub mod protocol_constants;
pub mod runtime;
pub mod services;
pub mod state;
pub mod stream;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{
    DirectoryResult, DiscoveryResult, ErrorCode, LivecastError, LivecastResult, RpcResult,
};
pub use events::{
    ArbitrationEvent, DeviceEvent, EventEmitter, LoggingEventEmitter, NoopEventEmitter,
};
pub use notifications::{topic_for, StreamNotification};
pub use runtime::{TaskSpawner, TokioSpawner};
pub use state::{ArbitrationConfig, Config};
pub use utils::now_millis;

// Re-export Cast types
pub use cast::{
    discover_device, select_device, CastClient, CastClientImpl, Device, DiscoveredDevice, LoadMode,
};

// Re-export service types
pub use services::{ArbitrationEngine, ArbitrationOutcome, DeviceActorHandle};

// Re-export stream types
pub use stream::{StreamDescriptor, StreamSpec, StreamTable};

// Re-export bootstrap types
pub use bootstrap::{bootstrap_services, BootstrappedServices, StreamSource};
