//! Deadline-driven execution of relay test sequences.
//!
//! [`SequenceRun`] is a plain state machine: callers hand it the current
//! instant and it reports the next deadline. [`run_sequence`] drives a run to
//! completion through a [`Pacer`], which is how the single cooperative loop
//! blocks for the literal step durations while still honoring an abort signal.

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::time::Duration;

use crate::channels::Channel;
use crate::peripherals::{PeripheralFault, RelayActuator};
use crate::sequences::{SequencePreset, TestSequence, TestStep};
use crate::time::MonotonicInstant;

/// Result of waiting on a [`Pacer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Pause {
    Elapsed,
    Aborted,
}

/// Blocking time source used while a sequence or a timed message runs.
pub trait Pacer {
    type Instant: MonotonicInstant;

    fn now(&mut self) -> Self::Instant;

    /// Blocks until `deadline`, returning early with [`Pause::Aborted`] when
    /// the runtime's abort signal fires.
    fn wait_until(&mut self, deadline: Self::Instant) -> Pause;

    fn pause(&mut self, duration: Duration) -> Pause {
        let deadline = self.now() + duration;
        self.wait_until(deadline)
    }
}

/// Errors raised while driving relays for a sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceError {
    /// Energizing or releasing a step failed; every relay was commanded off.
    Actuation {
        channel: Option<Channel>,
        fault: PeripheralFault,
    },
    /// The final all-off command itself failed.
    Release(PeripheralFault),
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceError::Actuation {
                channel: Some(channel),
                fault,
            } => write!(f, "relay {channel} failed: {fault}"),
            SequenceError::Actuation {
                channel: None,
                fault,
            } => write!(f, "rest step failed: {fault}"),
            SequenceError::Release(fault) => write!(f, "all-off failed: {fault}"),
        }
    }
}

/// Lifecycle of a run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunState {
    Idle,
    Holding,
    Settling,
    Complete,
    Aborted,
}

/// Transition reported by [`SequenceRun::start`] and [`SequenceRun::poll`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunEvent {
    StepStarted { index: usize, step: TestStep },
    Settling { index: usize },
    Completed,
}

/// How a sequence ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceOutcome {
    Completed,
    Aborted,
}

/// Summary handed back to the control loop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SequenceReport {
    pub preset: SequencePreset,
    pub outcome: SequenceOutcome,
    pub completed_steps: usize,
}

/// In-flight sequence state.
#[derive(Debug)]
pub struct SequenceRun<T> {
    sequence: TestSequence,
    state: RunState,
    step_index: usize,
    completed_steps: usize,
    deadline: Option<T>,
}

impl<T> SequenceRun<T>
where
    T: MonotonicInstant,
{
    #[must_use]
    pub fn new(sequence: TestSequence) -> Self {
        Self {
            sequence,
            state: RunState::Idle,
            step_index: 0,
            completed_steps: 0,
            deadline: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[must_use]
    pub fn sequence(&self) -> &TestSequence {
        &self.sequence
    }

    /// Index of the step currently holding or settling.
    #[must_use]
    pub fn current_step_index(&self) -> Option<usize> {
        match self.state {
            RunState::Holding | RunState::Settling => Some(self.step_index),
            _ => None,
        }
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<T> {
        self.deadline
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, RunState::Complete | RunState::Aborted)
    }

    #[must_use]
    pub fn report(&self) -> SequenceReport {
        let outcome = if self.state == RunState::Complete {
            SequenceOutcome::Completed
        } else {
            SequenceOutcome::Aborted
        };
        SequenceReport {
            preset: self.sequence.preset,
            outcome,
            completed_steps: self.completed_steps,
        }
    }

    /// Energizes the first step.
    pub fn start<A>(&mut self, actuator: &mut A, now: T) -> Result<RunEvent, SequenceError>
    where
        A: RelayActuator + ?Sized,
    {
        self.step_index = 0;
        self.completed_steps = 0;
        self.enter_step(actuator, now)
    }

    /// Advances the run if its deadline has passed.
    pub fn poll<A>(&mut self, actuator: &mut A, now: T) -> Result<Option<RunEvent>, SequenceError>
    where
        A: RelayActuator + ?Sized,
    {
        let Some(deadline) = self.deadline else {
            return Ok(None);
        };
        if now < deadline {
            return Ok(None);
        }

        match self.state {
            RunState::Holding => {
                let step = self.sequence.steps[self.step_index];
                if let Some(channel) = step.channel {
                    if let Err(fault) = actuator.set(channel, false) {
                        return Err(self.fail(actuator, step.channel, fault));
                    }
                }
                self.completed_steps += 1;

                if self.sequence.settle.is_zero() {
                    self.step_index += 1;
                    self.enter_step(actuator, now).map(Some)
                } else {
                    self.state = RunState::Settling;
                    self.deadline = Some(now + self.sequence.settle);
                    Ok(Some(RunEvent::Settling {
                        index: self.step_index,
                    }))
                }
            }
            RunState::Settling => {
                self.step_index += 1;
                self.enter_step(actuator, now).map(Some)
            }
            RunState::Idle | RunState::Complete | RunState::Aborted => Ok(None),
        }
    }

    /// Stops the run and commands every relay off.
    pub fn abort<A>(&mut self, actuator: &mut A) -> Result<(), SequenceError>
    where
        A: RelayActuator + ?Sized,
    {
        self.state = RunState::Aborted;
        self.deadline = None;
        actuator.all_off().map_err(SequenceError::Release)
    }

    fn enter_step<A>(&mut self, actuator: &mut A, now: T) -> Result<RunEvent, SequenceError>
    where
        A: RelayActuator + ?Sized,
    {
        let Some(step) = self.sequence.steps.get(self.step_index).copied() else {
            self.state = RunState::Complete;
            self.deadline = None;
            return Ok(RunEvent::Completed);
        };

        let applied = match step.channel {
            Some(channel) => actuator.set(channel, true),
            None => actuator.all_off(),
        };
        if let Err(fault) = applied {
            return Err(self.fail(actuator, step.channel, fault));
        }

        self.state = RunState::Holding;
        self.deadline = Some(now + step.hold);
        Ok(RunEvent::StepStarted {
            index: self.step_index,
            step,
        })
    }

    fn fail<A>(
        &mut self,
        actuator: &mut A,
        channel: Option<Channel>,
        fault: PeripheralFault,
    ) -> SequenceError
    where
        A: RelayActuator + ?Sized,
    {
        self.state = RunState::Aborted;
        self.deadline = None;
        let _ = actuator.all_off();
        SequenceError::Actuation { channel, fault }
    }
}

/// Receives run transitions while [`run_sequence`] blocks.
pub trait SequenceObserver {
    fn on_event(&mut self, event: RunEvent);
}

impl SequenceObserver for () {
    fn on_event(&mut self, _event: RunEvent) {}
}

/// Borrowed actuator that releases every relay when dropped.
pub struct ReleaseOnDrop<'a, A>
where
    A: RelayActuator + ?Sized,
{
    actuator: &'a mut A,
}

impl<'a, A> ReleaseOnDrop<'a, A>
where
    A: RelayActuator + ?Sized,
{
    pub fn new(actuator: &'a mut A) -> Self {
        Self { actuator }
    }
}

impl<A> Deref for ReleaseOnDrop<'_, A>
where
    A: RelayActuator + ?Sized,
{
    type Target = A;

    fn deref(&self) -> &Self::Target {
        self.actuator
    }
}

impl<A> DerefMut for ReleaseOnDrop<'_, A>
where
    A: RelayActuator + ?Sized,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.actuator
    }
}

impl<A> Drop for ReleaseOnDrop<'_, A>
where
    A: RelayActuator + ?Sized,
{
    fn drop(&mut self) {
        let _ = self.actuator.all_off();
    }
}

/// Runs `sequence` to completion, blocking on `pacer` between deadlines.
///
/// The actuator is borrowed for the whole run and every relay is released on
/// every exit path, including aborts and actuation failures.
pub fn run_sequence<A, P, O>(
    actuator: &mut A,
    sequence: &TestSequence,
    pacer: &mut P,
    observer: &mut O,
) -> Result<SequenceReport, SequenceError>
where
    A: RelayActuator + ?Sized,
    P: Pacer + ?Sized,
    O: SequenceObserver + ?Sized,
{
    let mut relays = ReleaseOnDrop::new(actuator);
    let mut run = SequenceRun::new(*sequence);

    let mut event = Some(run.start(&mut *relays, pacer.now())?);
    loop {
        if let Some(event) = event.take() {
            observer.on_event(event);
        }
        let Some(deadline) = run.next_deadline() else {
            break;
        };
        if pacer.wait_until(deadline) == Pause::Aborted {
            run.abort(&mut *relays)?;
            break;
        }
        event = run.poll(&mut *relays, pacer.now())?;
    }

    Ok(run.report())
}
