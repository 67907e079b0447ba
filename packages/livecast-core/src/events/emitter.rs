//! Event emitter abstraction for decoupling services from transport.
//!
//! Services depend on the [`EventEmitter`] trait rather than a concrete
//! sink, so the server can log events while tests count them.

use super::{ArbitrationEvent, DeviceEvent};

/// Trait for emitting domain events without knowledge of transport.
///
/// # Example
///
/// ```ignore
/// struct MyService {
///     emitter: Arc<dyn EventEmitter>,
/// }
///
/// impl MyService {
///     fn do_something(&self) {
///         self.emitter.emit_device(DeviceEvent::Unmuted { timestamp: now_millis() });
///     }
/// }
/// ```
pub trait EventEmitter: Send + Sync {
    /// Emits an arbitration decision.
    fn emit_arbitration(&self, event: ArbitrationEvent);

    /// Emits a device state observation.
    fn emit_device(&self, event: DeviceEvent);
}

/// No-op emitter for testing or when nothing consumes events.
pub struct NoopEventEmitter;

impl EventEmitter for NoopEventEmitter {
    fn emit_arbitration(&self, _event: ArbitrationEvent) {}

    fn emit_device(&self, _event: DeviceEvent) {}
}

/// Logging emitter.
///
/// Logs all events at debug level as structured `tracing` fields.
pub struct LoggingEventEmitter;

impl EventEmitter for LoggingEventEmitter {
    fn emit_arbitration(&self, event: ArbitrationEvent) {
        tracing::debug!(?event, "arbitration_event");
    }

    fn emit_device(&self, event: DeviceEvent) {
        tracing::debug!(?event, "device_event");
    }
}
