//! Mute interlock.
//!
//! When the user mutes the device, auto-unmute is suppressed for a cooldown
//! so a deliberate mute is not undone by the next stream start. Samples come
//! from the periodic poll; only a false-to-true transition arms the interlock.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct MuteInterlock {
    enabled: bool,
    cooldown: Duration,
    deadline: Option<Instant>,
    /// Last observed mute flag. Starts unmuted.
    previous_muted: bool,
}

impl MuteInterlock {
    pub fn new(enabled: bool, cooldown: Duration) -> Self {
        Self {
            enabled,
            cooldown,
            deadline: None,
            previous_muted: false,
        }
    }

    /// Whether auto-unmute is currently suppressed. Expiry is checked lazily.
    pub fn is_active(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() < deadline)
    }

    /// Records a mute sample; `None` (failed query) is no sample at all.
    ///
    /// Returns `true` when this sample armed the interlock.
    pub fn observe(&mut self, muted: Option<bool>) -> bool {
        let Some(muted) = muted else {
            return false;
        };
        if !self.enabled {
            self.previous_muted = muted;
            return false;
        }

        let armed = !self.is_active() && !self.previous_muted && muted;
        if armed {
            self.deadline = Some(Instant::now() + self.cooldown);
            log::info!(
                "[MuteInterlock] Mute observed, suppressing auto-unmute for {:?}",
                self.cooldown
            );
        }

        self.previous_muted = muted;
        armed
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(900);

    #[tokio::test(start_paused = true)]
    async fn arms_on_false_to_true_transition() {
        let mut interlock = MuteInterlock::new(true, COOLDOWN);
        assert!(!interlock.observe(Some(false)));
        assert!(interlock.observe(Some(true)));
        assert!(interlock.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn first_sample_is_compared_against_unmuted() {
        let mut interlock = MuteInterlock::new(true, COOLDOWN);
        assert!(interlock.observe(Some(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_not_extended_while_active() {
        let mut interlock = MuteInterlock::new(true, COOLDOWN);
        interlock.observe(Some(true));

        tokio::time::advance(Duration::from_secs(600)).await;
        interlock.observe(Some(false));
        assert!(!interlock.observe(Some(true)));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(!interlock.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_samples_are_ignored() {
        let mut interlock = MuteInterlock::new(true, COOLDOWN);
        interlock.observe(Some(true));
        tokio::time::advance(COOLDOWN).await;
        assert!(!interlock.is_active());

        // Still muted from before: no new transition.
        assert!(!interlock.observe(None));
        assert!(!interlock.observe(Some(true)));
        assert!(!interlock.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_interlock_never_arms() {
        let mut interlock = MuteInterlock::new(false, COOLDOWN);
        assert!(!interlock.observe(Some(true)));
        assert!(!interlock.is_active());
    }
}
