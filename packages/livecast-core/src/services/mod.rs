//! Application services layer.
//!
//! Arbitration logic and its helpers sit on top of the Cast client traits
//! (`cast/`) and the stream table (`stream/`). The device actor serializes
//! everything that touches one device.

pub mod arbitration;
pub mod device_actor;
pub mod mute_interlock;
pub mod player_state;
pub mod volume_restore;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use arbitration::{ArbitrationEngine, ArbitrationOutcome, ArbitrationState};
pub use device_actor::{run_device_actor, spawn_device_actor, DeviceActorHandle};
pub use mute_interlock::MuteInterlock;
pub use player_state::{query_player_state, PlayerStateSnapshot};
pub use volume_restore::{auto_unmute, restore_volume, RestoreDecision};
