//! Actuation traits and the [`TurretRig`] command dispatcher.
//!
//! The targeting controller decides in terms of logical
//! [`ActuationCommand`]s.  The rig owns one driver per role and translates
//! each command into the matching driver call, so the controller never
//! knows which hardware sits underneath.

use tracing::{debug, info};
use turret_types::{ActuationCommand, TurretError};

/// Rotates the aiming axis.
pub trait Aimer: Send + Sync {
    /// Stable identifier, e.g. `"pan_stepper"`.
    fn id(&self) -> &str;

    /// Rotate by `steps`; negative values turn left.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::ActuationFault`] if the command cannot be
    /// delivered.
    fn emit_aim(&mut self, steps: i32) -> Result<(), TurretError>;
}

/// Releases one shot.
pub trait Trigger: Send + Sync {
    /// Stable identifier, e.g. `"trigger_servo"`.
    fn id(&self) -> &str;

    /// Fire once.
    ///
    /// # Errors
    ///
    /// Returns [`TurretError::ActuationFault`] if the command cannot be
    /// delivered.
    fn emit_fire(&mut self) -> Result<(), TurretError>;
}

/// Reports whether the mechanism can fire right now (loaded, not jammed).
pub trait ReadinessSensor: Send + Sync {
    fn id(&self) -> &str;

    /// Sampled once per centered detection.
    fn is_ready_to_fire(&mut self) -> bool;
}

/// One driver per actuation role.
pub struct TurretRig {
    aimer: Box<dyn Aimer>,
    trigger: Box<dyn Trigger>,
    readiness: Box<dyn ReadinessSensor>,
}

impl TurretRig {
    pub fn new(
        aimer: Box<dyn Aimer>,
        trigger: Box<dyn Trigger>,
        readiness: Box<dyn ReadinessSensor>,
    ) -> Self {
        Self {
            aimer,
            trigger,
            readiness,
        }
    }

    pub fn is_ready_to_fire(&mut self) -> bool {
        self.readiness.is_ready_to_fire()
    }

    /// Forward `command` to the matching driver.  [`ActuationCommand::NoOp`]
    /// touches no hardware.
    ///
    /// # Errors
    ///
    /// Propagates the driver's [`TurretError::ActuationFault`].
    pub fn dispatch(&mut self, command: ActuationCommand) -> Result<(), TurretError> {
        match command {
            ActuationCommand::NoOp => Ok(()),
            ActuationCommand::Aim { steps } => {
                debug!(aimer = self.aimer.id(), steps, "aim");
                self.aimer.emit_aim(steps)
            }
            ActuationCommand::Fire => {
                info!(trigger = self.trigger.id(), "fire");
                self.trigger.emit_fire()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Log {
        aims: Vec<i32>,
        shots: u32,
    }

    struct MockAimer(Arc<Mutex<Log>>);
    struct MockTrigger(Arc<Mutex<Log>>);
    struct JammedTrigger;
    struct AlwaysReady;

    impl Aimer for MockAimer {
        fn id(&self) -> &str {
            "mock_aimer"
        }
        fn emit_aim(&mut self, steps: i32) -> Result<(), TurretError> {
            self.0.lock().unwrap().aims.push(steps);
            Ok(())
        }
    }

    impl Trigger for MockTrigger {
        fn id(&self) -> &str {
            "mock_trigger"
        }
        fn emit_fire(&mut self) -> Result<(), TurretError> {
            self.0.lock().unwrap().shots += 1;
            Ok(())
        }
    }

    impl Trigger for JammedTrigger {
        fn id(&self) -> &str {
            "jammed"
        }
        fn emit_fire(&mut self) -> Result<(), TurretError> {
            Err(TurretError::ActuationFault {
                component: "jammed".to_string(),
                details: "servo stalled".to_string(),
            })
        }
    }

    impl ReadinessSensor for AlwaysReady {
        fn id(&self) -> &str {
            "always"
        }
        fn is_ready_to_fire(&mut self) -> bool {
            true
        }
    }

    #[test]
    fn dispatch_routes_commands() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut rig = TurretRig::new(
            Box::new(MockAimer(log.clone())),
            Box::new(MockTrigger(log.clone())),
            Box::new(AlwaysReady),
        );

        rig.dispatch(ActuationCommand::NoOp).unwrap();
        rig.dispatch(ActuationCommand::Aim { steps: -50 }).unwrap();
        rig.dispatch(ActuationCommand::Fire).unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.aims, vec![-50]);
        assert_eq!(log.shots, 1);
        assert!(rig.is_ready_to_fire());
    }

    #[test]
    fn dispatch_propagates_driver_fault() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut rig = TurretRig::new(
            Box::new(MockAimer(log)),
            Box::new(JammedTrigger),
            Box::new(AlwaysReady),
        );
        let err = rig.dispatch(ActuationCommand::Fire).unwrap_err();
        assert!(err.to_string().contains("servo stalled"));
    }
}
