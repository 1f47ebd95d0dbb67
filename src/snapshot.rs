//! Per-frame snapshots of the aggregated gamepad state.
//!
//! [`GamepadSnapshot`] is an **owned**, read-only copy of the [`GamepadState`] at
//! a point in time (typically "this frame"). It is cheap to clone for fan-out to
//! several consumers.
//!
//! [`GamepadView`] keeps the current and previous snapshot so callers can ask
//! for edges (`just pressed`, `just released`) without tracking history
//! themselves.
//!
//! # Semantics
//! - A snapshot is **immutable**. To refresh, call `tick()` on the catalog and
//!   take a new one.
//! - Snapshots do **not** poll devices; they reflect the last drained events.
//!
//! # Examples
//! ```no_run
//! use padhub::{DeviceCatalog, GamepadButton, GamepadView};
//! # fn frame(catalog: &mut DeviceCatalog, view: &mut GamepadView) {
//! catalog.tick();
//! view.update(catalog.state());
//! if view.is_button_just_pressed(GamepadButton::A) {
//!     println!("jump");
//! }
//! # }
//! ```

use crate::aggregator::{GamepadAxis, GamepadButton, GamepadState, Vec2};
use std::collections::BTreeSet;

/// Owned copy of a [`GamepadState`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GamepadSnapshot {
    pub buttons: BTreeSet<GamepadButton>,
    pub left_stick: Vec2,
    pub right_stick: Vec2,
    pub left_trigger: f32,
    pub right_trigger: f32,
}

impl GamepadSnapshot {
    #[inline]
    pub fn is_pressed(&self, button: GamepadButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn axis(&self, axis: GamepadAxis) -> f32 {
        match axis {
            GamepadAxis::LeftTrigger => self.left_trigger,
            GamepadAxis::RightTrigger => self.right_trigger,
            GamepadAxis::LeftStickVertical => self.left_stick.y,
            GamepadAxis::LeftStickHorizontal => self.left_stick.x,
            GamepadAxis::RightStickVertical => self.right_stick.y,
            GamepadAxis::RightStickHorizontal => self.right_stick.x,
        }
    }
}

impl GamepadState {
    /// Take an owned copy of the current state.
    pub fn snapshot(&self) -> GamepadSnapshot {
        GamepadSnapshot {
            buttons: self.held.clone(),
            left_stick: self.left_stick,
            right_stick: self.right_stick,
            left_trigger: self.left_trigger,
            right_trigger: self.right_trigger,
        }
    }
}

/// Current and previous frame, for edge detection.
#[derive(Clone, Debug, Default)]
pub struct GamepadView {
    current: GamepadSnapshot,
    previous: GamepadSnapshot,
}

impl GamepadView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift the current frame to previous and capture `state` as current.
    pub fn update(&mut self, state: &GamepadState) {
        self.previous = std::mem::replace(&mut self.current, state.snapshot());
    }

    pub fn current(&self) -> &GamepadSnapshot {
        &self.current
    }

    pub fn previous(&self) -> &GamepadSnapshot {
        &self.previous
    }

    pub fn is_button_down(&self, button: GamepadButton) -> bool {
        self.current.is_pressed(button)
    }

    pub fn is_button_up(&self, button: GamepadButton) -> bool {
        !self.current.is_pressed(button)
    }

    pub fn was_button_down(&self, button: GamepadButton) -> bool {
        self.previous.is_pressed(button)
    }

    pub fn was_button_up(&self, button: GamepadButton) -> bool {
        !self.previous.is_pressed(button)
    }

    pub fn is_button_just_pressed(&self, button: GamepadButton) -> bool {
        self.is_button_down(button) && self.was_button_up(button)
    }

    pub fn is_button_just_released(&self, button: GamepadButton) -> bool {
        self.is_button_up(button) && self.was_button_down(button)
    }

    pub fn left_stick(&self) -> Vec2 {
        self.current.left_stick
    }

    pub fn right_stick(&self) -> Vec2 {
        self.current.right_stick
    }

    pub fn left_trigger(&self) -> f32 {
        self.current.left_trigger
    }

    pub fn right_trigger(&self) -> f32 {
        self.current.right_trigger
    }
}
