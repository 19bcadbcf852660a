//! [`TargetingController`] – detection → actuation state machine.
//!
//! The controller is an explicit value owned by the detection loop and
//! persists across cycles.  Each [`step`][TargetingController::step] consumes
//! the cycle's verified detection (or its absence) and returns a
//! [`Decision`]: the command to issue and how long to wait before the next
//! capture.
//!
//! # Transitions
//!
//! | From | Input | To | Command |
//! |---|---|---|---|
//! | any but `Cooldown` | center `(1,1)`, ready | `Firing` → `Cooldown` | `Fire` |
//! | any but `Cooldown` | center `(1,1)`, not ready | `Centered` | no-op |
//! | any but `Cooldown` | column 0 | `Tracking` | aim left |
//! | any but `Cooldown` | column 2 | `Tracking` | aim right |
//! | any but `Cooldown` | column 1, row ≠ 1 | `Tracking` | no-op |
//! | `Cooldown` | anything, timer running | `Cooldown` | no-op |
//! | `Cooldown` | timer elapsed | `Idle`, then as above | |
//! | `Idle`/`Tracking`/`Centered` | nothing | unchanged | no-op |
//!
//! Only the column drives aiming; the row is logged.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use turret_types::{ActuationCommand, Detection, TargetingState};

use crate::miss_guard::MissGuard;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Named post-fire cooldown durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CooldownProfile {
    /// 2 s: fire again as soon as the mechanism allows.
    #[default]
    Aggressive,
    /// 6 s: wait for a full reload cycle.
    LoadCycle,
}

impl CooldownProfile {
    pub fn duration(&self) -> Duration {
        match self {
            CooldownProfile::Aggressive => Duration::from_secs(2),
            CooldownProfile::LoadCycle => Duration::from_secs(6),
        }
    }
}

/// Tunables of the [`TargetingController`].
#[derive(Debug, Clone, PartialEq)]
pub struct TargetingConfig {
    /// Pan steps per aim correction.
    pub aim_step: i32,
    /// Time after a shot during which detections are ignored.
    pub cooldown: Duration,
    pub post_aim_settle: Duration,
    pub not_ready_settle: Duration,
    pub post_fire_settle: Duration,
    pub inter_cycle: Duration,
    /// Revert to `Idle` after this many consecutive empty cycles.  `None`
    /// keeps the last state indefinitely.
    pub max_missed_cycles: Option<u32>,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            aim_step: 50,
            cooldown: CooldownProfile::default().duration(),
            post_aim_settle: Duration::from_millis(500),
            not_ready_settle: Duration::from_millis(200),
            post_fire_settle: Duration::from_millis(1000),
            inter_cycle: Duration::from_millis(250),
            max_missed_cycles: None,
        }
    }
}

/// Outcome of one controller step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub command: ActuationCommand,
    /// Delay before the next capture.
    pub settle: Duration,
}

// ─────────────────────────────────────────────────────────────────────────────
// TargetingController
// ─────────────────────────────────────────────────────────────────────────────

pub struct TargetingController {
    config: TargetingConfig,
    state: TargetingState,
    cooldown_until: Option<Instant>,
    miss_guard: Option<MissGuard>,
}

impl TargetingController {
    pub fn new(config: TargetingConfig) -> Self {
        let miss_guard = config.max_missed_cycles.map(|n| {
            info!(
                max_missed_cycles = n,
                "lost-target reset enabled: tracking reverts to idle after repeated misses"
            );
            MissGuard::new(n)
        });
        Self {
            config,
            state: TargetingState::Idle,
            cooldown_until: None,
            miss_guard,
        }
    }

    pub fn state(&self) -> TargetingState {
        self.state
    }

    pub fn config(&self) -> &TargetingConfig {
        &self.config
    }

    /// Time left in the current cooldown, if one is running.
    pub fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.cooldown_until
            .filter(|_| self.state == TargetingState::Cooldown)
            .map(|until| until.saturating_duration_since(now))
    }

    /// Advance the state machine by one cycle.
    ///
    /// `ready` is called at most once, and only for a centered detection
    /// outside cooldown.
    pub fn step(
        &mut self,
        detection: Option<&Detection>,
        now: Instant,
        ready: impl FnOnce() -> bool,
    ) -> Decision {
        if self.state == TargetingState::Cooldown {
            match self.cooldown_until {
                Some(until) if now < until => {
                    debug!(
                        remaining_ms = until.saturating_duration_since(now).as_millis() as u64,
                        "cooldown active, ignoring detection"
                    );
                    return self.hold(self.config.inter_cycle);
                }
                _ => {
                    info!("cooldown elapsed");
                    self.transition(TargetingState::Idle);
                    self.cooldown_until = None;
                }
            }
        }

        let Some(detection) = detection else {
            return self.on_miss();
        };
        if let Some(guard) = self.miss_guard.as_mut() {
            guard.reset();
        }

        debug!(
            row = detection.row,
            col = detection.col,
            confidence = detection.confidence,
            "verified detection"
        );

        if detection.is_centered() {
            self.transition(TargetingState::Centered);
            if !ready() {
                info!("target centered but mechanism not ready");
                return self.hold(self.config.not_ready_settle);
            }
            self.transition(TargetingState::Firing);
            self.transition(TargetingState::Cooldown);
            self.cooldown_until = Some(now + self.config.cooldown);
            info!(
                cooldown_ms = self.config.cooldown.as_millis() as u64,
                "fire"
            );
            return Decision {
                command: ActuationCommand::Fire,
                settle: self.config.post_fire_settle,
            };
        }

        self.transition(TargetingState::Tracking);
        let steps = match detection.col {
            0 => -self.config.aim_step,
            1 => {
                debug!(row = detection.row, "target in center column, off-center row");
                return self.hold(self.config.inter_cycle);
            }
            _ => self.config.aim_step,
        };
        info!(steps, col = detection.col, "aim correction");
        Decision {
            command: ActuationCommand::Aim { steps },
            settle: self.config.post_aim_settle,
        }
    }

    fn on_miss(&mut self) -> Decision {
        let lost = self
            .miss_guard
            .as_mut()
            .is_some_and(|guard| guard.record_miss());
        if lost && self.state != TargetingState::Idle {
            info!(from = %self.state, "target lost, reverting to idle");
            self.transition(TargetingState::Idle);
        }
        self.hold(self.config.inter_cycle)
    }

    fn hold(&self, settle: Duration) -> Decision {
        Decision {
            command: ActuationCommand::NoOp,
            settle,
        }
    }

    fn transition(&mut self, next: TargetingState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "targeting state change");
            self.state = next;
        }
    }
}
