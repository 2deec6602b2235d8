//! Collaborator seams: command dispatcher and status surface.
//!
//! The engine returns effects; hosts perform them through these narrow
//! traits. [`apply_effects`] is the reference driver used by the CLI and
//! tests: it invokes the dispatcher exactly once per dispatch effect,
//! surfaces failures without retrying, and hands timer schedules back to the
//! caller.

use std::fmt;
use std::time::Duration;

use crate::keymap::{Effect, Invocation, StatusUpdate};

/// The external command invocation failed. Reported, never retried; the
/// engine has already reset by the time this surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub command: String,
    pub message: String,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispatch of {:?} failed: {}", self.command, self.message)
    }
}

impl std::error::Error for DispatchError {}

/// Executes resolved commands on behalf of the engine.
pub trait CommandDispatcher {
    fn invoke(&mut self, invocation: &Invocation) -> Result<(), DispatchError>;
}

/// Receives status text plus an accessibility label.
pub trait StatusSurface {
    fn show(&mut self, update: &StatusUpdate);
}

/// Dispatcher that logs and records invocations. Used by the CLI simulator
/// and convenient in tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    pub invocations: Vec<Invocation>,
}

impl CommandDispatcher for RecordingDispatcher {
    fn invoke(&mut self, invocation: &Invocation) -> Result<(), DispatchError> {
        tracing::info!(
            "dispatch {} args={} count={}",
            invocation.command,
            invocation.args,
            invocation.count
        );
        self.invocations.push(invocation.clone());
        Ok(())
    }
}

/// Status surface that records every update it is shown.
#[derive(Debug, Clone, Default)]
pub struct RecordingStatusSurface {
    pub updates: Vec<StatusUpdate>,
}

impl StatusSurface for RecordingStatusSurface {
    fn show(&mut self, update: &StatusUpdate) {
        self.updates.push(update.clone());
    }
}

/// A deferred callback the host must schedule after applying effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerRequest {
    /// Deliver `Event::TimeoutElapsed(generation)` after `delay`
    Timeout { generation: u64, delay: Duration },
    /// Deliver `Event::StatusClearElapsed(generation)` after `delay`
    StatusClear { generation: u64, delay: Duration },
}

/// Perform a batch of effects against the collaborators.
///
/// Dispatch failures are reported to the status surface and logged; the
/// engine's state is unaffected (it already reset when it emitted the
/// dispatch). Timer requests are returned for the host's event loop.
pub fn apply_effects(
    effects: Vec<Effect>,
    dispatcher: &mut dyn CommandDispatcher,
    surface: &mut dyn StatusSurface,
) -> Vec<TimerRequest> {
    let mut timers = Vec::new();

    for effect in effects {
        match effect {
            Effect::Dispatch(invocation) => {
                if let Err(e) = dispatcher.invoke(&invocation) {
                    tracing::warn!("{}", e);
                    surface.show(&StatusUpdate {
                        text: format!("✗ {}", e.command),
                        label: e.to_string(),
                    });
                }
            }
            Effect::UpdateStatus(update) => surface.show(&update),
            Effect::ScheduleTimeout { generation, delay } => {
                timers.push(TimerRequest::Timeout { generation, delay });
            }
            Effect::ScheduleStatusClear { generation, delay } => {
                timers.push(TimerRequest::StatusClear { generation, delay });
            }
            Effect::NoBinding { sequence } => {
                tracing::debug!(
                    "no binding for {:?}",
                    crate::keymap::types::format_sequence(&sequence)
                );
            }
            Effect::EvalFailed(e) => {
                tracing::warn!("expression evaluation failed: {}", e);
                surface.show(&StatusUpdate {
                    text: "✗ expression error".to_string(),
                    label: e.to_string(),
                });
            }
        }
    }

    timers
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingDispatcher;

    impl CommandDispatcher for FailingDispatcher {
        fn invoke(&mut self, invocation: &Invocation) -> Result<(), DispatchError> {
            Err(DispatchError {
                command: invocation.command.clone(),
                message: "host rejected".to_string(),
            })
        }
    }

    fn invocation(command: &str) -> Invocation {
        Invocation {
            command: command.to_string(),
            args: serde_json::Value::Null,
            count: 1,
        }
    }

    #[test]
    fn test_apply_effects_dispatches_once() {
        let mut dispatcher = RecordingDispatcher::default();
        let mut surface = RecordingStatusSurface::default();

        let timers = apply_effects(
            vec![Effect::Dispatch(invocation("file.save"))],
            &mut dispatcher,
            &mut surface,
        );

        assert_eq!(dispatcher.invocations.len(), 1);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_dispatch_failure_is_reported_not_retried() {
        let mut dispatcher = FailingDispatcher;
        let mut surface = RecordingStatusSurface::default();

        apply_effects(
            vec![Effect::Dispatch(invocation("file.save"))],
            &mut dispatcher,
            &mut surface,
        );

        assert_eq!(surface.updates.len(), 1);
        assert!(surface.updates[0].text.contains("file.save"));
    }

    #[test]
    fn test_timer_requests_returned() {
        let mut dispatcher = RecordingDispatcher::default();
        let mut surface = RecordingStatusSurface::default();

        let timers = apply_effects(
            vec![Effect::ScheduleTimeout {
                generation: 7,
                delay: Duration::from_millis(500),
            }],
            &mut dispatcher,
            &mut surface,
        );

        assert_eq!(
            timers,
            vec![TimerRequest::Timeout {
                generation: 7,
                delay: Duration::from_millis(500)
            }]
        );
    }
}
