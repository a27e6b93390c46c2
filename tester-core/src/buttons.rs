//! Debounced button tracking.
//!
//! Raw levels come from pull-up inputs: [`Level::High`] means released and
//! [`Level::Low`] means pressed. The tracker turns those samples into timing
//! qualified [`InputEvent`]s and knows nothing about operating modes.

use core::time::Duration;

use heapless::Vec;

use crate::time::MonotonicInstant;

/// Raw pin level.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    High,
    Low,
}

impl Level {
    #[must_use]
    pub const fn from_pressed(pressed: bool) -> Self {
        if pressed { Level::Low } else { Level::High }
    }

    #[must_use]
    pub const fn is_pressed(self) -> bool {
        matches!(self, Level::Low)
    }
}

/// Logical buttons on the front panel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Button {
    Mode,
    Action,
}

/// Discrete button transitions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ButtonEvent {
    Pressed,
    Released,
    LongPressed,
}

/// Event tagged with the button that produced it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InputEvent {
    pub button: Button,
    pub event: ButtonEvent,
}

impl InputEvent {
    #[must_use]
    pub const fn new(button: Button, event: ButtonEvent) -> Self {
        Self { button, event }
    }
}

/// Timing thresholds for the tracker.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ButtonTimings {
    /// Presses of the mode button closer together than this are dropped.
    pub debounce: Duration,
    /// Hold time after which the action button reports a long press.
    pub long_press: Duration,
}

impl ButtonTimings {
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);
    pub const DEFAULT_LONG_PRESS: Duration = Duration::from_millis(2_000);
}

impl Default for ButtonTimings {
    fn default() -> Self {
        Self {
            debounce: Self::DEFAULT_DEBOUNCE,
            long_press: Self::DEFAULT_LONG_PRESS,
        }
    }
}

/// Events produced by one sample of both buttons.
pub type SampleEvents = Vec<InputEvent, 2>;

#[derive(Debug)]
struct ModeState<T> {
    level: Level,
    last_accepted: Option<T>,
    accepted_pending_release: bool,
}

#[derive(Debug)]
struct ActionState<T> {
    level: Level,
    pressed_at: Option<T>,
    long_fired: bool,
}

/// Converts raw samples of the mode and action buttons into events.
#[derive(Debug)]
pub struct ButtonTracker<T> {
    timings: ButtonTimings,
    mode: ModeState<T>,
    action: ActionState<T>,
}

impl<T> ButtonTracker<T>
where
    T: MonotonicInstant,
{
    #[must_use]
    pub fn new() -> Self {
        Self::with_timings(ButtonTimings::default())
    }

    #[must_use]
    pub fn with_timings(timings: ButtonTimings) -> Self {
        Self {
            timings,
            mode: ModeState {
                level: Level::High,
                last_accepted: None,
                accepted_pending_release: false,
            },
            action: ActionState {
                level: Level::High,
                pressed_at: None,
                long_fired: false,
            },
        }
    }

    #[must_use]
    pub fn timings(&self) -> ButtonTimings {
        self.timings
    }

    /// Feeds one sample of both buttons taken at `now`.
    pub fn sample(&mut self, mode: Level, action: Level, now: T) -> SampleEvents {
        let mut events = SampleEvents::new();
        if let Some(event) = self.sample_mode(mode, now) {
            let _ = events.push(InputEvent::new(Button::Mode, event));
        }
        if let Some(event) = self.sample_action(action, now) {
            let _ = events.push(InputEvent::new(Button::Action, event));
        }
        events
    }

    fn sample_mode(&mut self, level: Level, now: T) -> Option<ButtonEvent> {
        let previous = core::mem::replace(&mut self.mode.level, level);
        match (previous, level) {
            (Level::High, Level::Low) => {
                let outside_window = self.mode.last_accepted.is_none_or(|last| {
                    now.saturating_duration_since(last) > self.timings.debounce
                });
                if outside_window {
                    self.mode.last_accepted = Some(now);
                    self.mode.accepted_pending_release = true;
                    Some(ButtonEvent::Pressed)
                } else {
                    None
                }
            }
            (Level::Low, Level::High) if self.mode.accepted_pending_release => {
                self.mode.accepted_pending_release = false;
                Some(ButtonEvent::Released)
            }
            _ => None,
        }
    }

    fn sample_action(&mut self, level: Level, now: T) -> Option<ButtonEvent> {
        let previous = core::mem::replace(&mut self.action.level, level);
        match (previous, level) {
            (Level::High, Level::Low) => {
                self.action.pressed_at = Some(now);
                self.action.long_fired = false;
                None
            }
            (Level::Low, Level::Low) => {
                let started = self.action.pressed_at?;
                if !self.action.long_fired
                    && now.saturating_duration_since(started) > self.timings.long_press
                {
                    self.action.long_fired = true;
                    Some(ButtonEvent::LongPressed)
                } else {
                    None
                }
            }
            (Level::Low, Level::High) => {
                let started = self.action.pressed_at.take()?;
                let long_fired = core::mem::replace(&mut self.action.long_fired, false);
                let held = now.saturating_duration_since(started);
                if !long_fired && held < self.timings.long_press {
                    Some(ButtonEvent::Pressed)
                } else {
                    None
                }
            }
            (Level::High, Level::High) => None,
        }
    }
}

impl<T> Default for ButtonTracker<T>
where
    T: MonotonicInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
