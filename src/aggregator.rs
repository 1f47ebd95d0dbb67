//! Cross-device logical gamepad state.
//!
//! Every attached controller feeds the same [`GamepadState`]: logical button ids
//! map to abstract [`GamepadButton`]s, axis ids 0–3 drive the two sticks, axis 4
//! is the hat switch and axes 5–6 are the triggers. Events are applied in arrival
//! order and the last one wins.
//!
//! Held buttons are tracked per device and the public set is their union, so one
//! pad releasing `A` does not cancel another pad holding it. The device that last
//! wrote each analog axis is remembered, which lets a removed device take its
//! contribution with it.

use crate::config::InputConfig;
use crate::event::DeviceId;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GamepadButton {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Start,
    Back,
    LeftThumb,
    RightThumb,
    LeftShoulder,
    RightShoulder,
    A,
    B,
    X,
    Y,
}

impl GamepadButton {
    pub const ALL: [GamepadButton; 14] = [
        GamepadButton::DpadUp,
        GamepadButton::DpadDown,
        GamepadButton::DpadLeft,
        GamepadButton::DpadRight,
        GamepadButton::Start,
        GamepadButton::Back,
        GamepadButton::LeftThumb,
        GamepadButton::RightThumb,
        GamepadButton::LeftShoulder,
        GamepadButton::RightShoulder,
        GamepadButton::A,
        GamepadButton::B,
        GamepadButton::X,
        GamepadButton::Y,
    ];

    /// Abstract button for a device-local logical button id.
    ///
    /// Ids 6 and 7 (usually the analog trigger clicks) and anything past 11 have
    /// no mapping.
    pub fn from_button_id(id: u16) -> Option<Self> {
        use GamepadButton::*;
        Some(match id {
            0 => X,
            1 => A,
            2 => B,
            3 => Y,
            4 => LeftShoulder,
            5 => RightShoulder,
            8 => Back,
            9 => Start,
            10 => LeftThumb,
            11 => RightThumb,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamepadAxis {
    LeftTrigger,
    RightTrigger,
    LeftStickVertical,
    LeftStickHorizontal,
    RightStickVertical,
    RightStickHorizontal,
}

impl GamepadAxis {
    pub const ALL: [GamepadAxis; 6] = [
        GamepadAxis::LeftTrigger,
        GamepadAxis::RightTrigger,
        GamepadAxis::LeftStickVertical,
        GamepadAxis::LeftStickHorizontal,
        GamepadAxis::RightStickVertical,
        GamepadAxis::RightStickHorizontal,
    ];
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Aggregated state of every attached controller.
///
/// Sticks are in `[-1, 1]²` with up and right positive; triggers are in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GamepadState {
    pub(crate) held: BTreeSet<GamepadButton>,
    pub(crate) left_stick: Vec2,
    pub(crate) right_stick: Vec2,
    pub(crate) left_trigger: f32,
    pub(crate) right_trigger: f32,
}

impl GamepadState {
    pub fn held_buttons(&self) -> &BTreeSet<GamepadButton> {
        &self.held
    }

    pub fn pressed_buttons(&self) -> impl Iterator<Item = GamepadButton> + '_ {
        self.held.iter().copied()
    }

    pub fn is_button_pressed(&self, button: GamepadButton) -> bool {
        self.held.contains(&button)
    }

    pub fn left_stick(&self) -> Vec2 {
        self.left_stick
    }

    pub fn right_stick(&self) -> Vec2 {
        self.right_stick
    }

    pub fn left_trigger(&self) -> f32 {
        self.left_trigger
    }

    pub fn right_trigger(&self) -> f32 {
        self.right_trigger
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

    /// All six analog values, in [`GamepadAxis::ALL`] order.
    pub fn analog_axes(&self) -> [(GamepadAxis, f32); 6] {
        GamepadAxis::ALL.map(|a| (a, self.axis(a)))
    }

    fn axis_mut(&mut self, axis: GamepadAxis) -> &mut f32 {
        match axis {
            GamepadAxis::LeftTrigger => &mut self.left_trigger,
            GamepadAxis::RightTrigger => &mut self.right_trigger,
            GamepadAxis::LeftStickVertical => &mut self.left_stick.y,
            GamepadAxis::LeftStickHorizontal => &mut self.left_stick.x,
            GamepadAxis::RightStickVertical => &mut self.right_stick.y,
            GamepadAxis::RightStickHorizontal => &mut self.right_stick.x,
        }
    }
}

/// Logical axis id of the hat switch.
pub const HAT_AXIS: u16 = 4;

/// Hat slot meaning "centered".
pub const HAT_CENTERED: i32 = 8;

const HAT_DIRECTIONS: [(GamepadButton, [i32; 3]); 4] = [
    (GamepadButton::DpadUp, [7, 0, 1]),
    (GamepadButton::DpadRight, [1, 2, 3]),
    (GamepadButton::DpadDown, [3, 4, 5]),
    (GamepadButton::DpadLeft, [5, 6, 7]),
];

pub struct StateAggregator {
    state: GamepadState,
    held_by: BTreeMap<DeviceId, BTreeSet<GamepadButton>>,
    last_writer: HashMap<GamepadAxis, DeviceId>,
    stick_deadzone: f32,
    trigger_floor: f32,
    clear_on_detach: bool,
}

impl Default for StateAggregator {
    fn default() -> Self {
        Self::new(&InputConfig::default())
    }
}

impl StateAggregator {
    pub fn new(config: &InputConfig) -> Self {
        Self {
            state: GamepadState::default(),
            held_by: BTreeMap::new(),
            last_writer: HashMap::new(),
            stick_deadzone: config.stick_deadzone,
            trigger_floor: config.trigger_floor,
            clear_on_detach: config.clear_on_detach,
        }
    }

    pub fn state(&self) -> &GamepadState {
        &self.state
    }

    pub fn button_changed(&mut self, device: DeviceId, button_id: u16, pressed: bool) {
        if let Some(button) = GamepadButton::from_button_id(button_id) {
            self.set_held(device, button, pressed);
        }
    }

    /// Apply one axis update.
    ///
    /// `value` is the calibrated sample in `[-1, 1]`. The hat axis is decoded from
    /// `raw`, which carries the slot (0 = up, clockwise, 8 = centered).
    pub fn axis_moved(&mut self, device: DeviceId, axis_id: u16, value: f32, raw: i32) {
        let (axis, value) = match axis_id {
            0 => (GamepadAxis::LeftStickHorizontal, self.deadzone(value)),
            1 => (GamepadAxis::LeftStickVertical, self.deadzone(-value)),
            2 => (GamepadAxis::RightStickHorizontal, self.deadzone(value)),
            3 => (GamepadAxis::RightStickVertical, self.deadzone(-value)),
            HAT_AXIS => return self.hat_moved(device, raw),
            5 => (GamepadAxis::LeftTrigger, self.trigger(value)),
            6 => (GamepadAxis::RightTrigger, self.trigger(value)),
            _ => return,
        };
        *self.state.axis_mut(axis) = value;
        self.last_writer.insert(axis, device);
    }

    /// Drop everything `device` contributed, if configured to.
    pub fn device_removed(&mut self, device: DeviceId) {
        if !self.clear_on_detach {
            return;
        }
        if let Some(held) = self.held_by.remove(&device) {
            for button in held {
                if !self.held_elsewhere(device, button) {
                    self.state.held.remove(&button);
                }
            }
        }
        let written: Vec<GamepadAxis> = self
            .last_writer
            .iter()
            .filter(|(_, d)| **d == device)
            .map(|(a, _)| *a)
            .collect();
        for axis in written {
            self.last_writer.remove(&axis);
            *self.state.axis_mut(axis) = 0.0;
        }
    }

    fn hat_moved(&mut self, device: DeviceId, slot: i32) {
        if slot == HAT_CENTERED {
            // Centering releases the d-pad for every device, not just this one.
            for (button, _) in HAT_DIRECTIONS {
                for held in self.held_by.values_mut() {
                    held.remove(&button);
                }
                self.state.held.remove(&button);
            }
        } else if (0..HAT_CENTERED).contains(&slot) {
            for (button, slots) in HAT_DIRECTIONS {
                self.set_held(device, button, slots.contains(&slot));
            }
        }
    }

    fn set_held(&mut self, device: DeviceId, button: GamepadButton, pressed: bool) {
        if pressed {
            self.held_by.entry(device).or_default().insert(button);
            self.state.held.insert(button);
        } else {
            if let Some(held) = self.held_by.get_mut(&device) {
                held.remove(&button);
            }
            if !self.held_elsewhere(device, button) {
                self.state.held.remove(&button);
            }
        }
    }

    fn held_elsewhere(&self, device: DeviceId, button: GamepadButton) -> bool {
        self.held_by
            .iter()
            .any(|(d, held)| *d != device && held.contains(&button))
    }

    fn deadzone(&self, v: f32) -> f32 {
        if v.abs() < self.stick_deadzone {
            0.0
        } else {
            v
        }
    }

    fn trigger(&self, v: f32) -> f32 {
        let v = if v < -1.0 + self.trigger_floor { -1.0 } else { v };
        ((1.0 + v) / 2.0).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAD: DeviceId = DeviceId(0);
    const OTHER: DeviceId = DeviceId(1);

    fn dpad(state: &GamepadState) -> Vec<GamepadButton> {
        state
            .pressed_buttons()
            .filter(|b| {
                matches!(
                    b,
                    GamepadButton::DpadUp
                        | GamepadButton::DpadDown
                        | GamepadButton::DpadLeft
                        | GamepadButton::DpadRight
                )
            })
            .collect()
    }

    #[test]
    fn press_release_round_trip() {
        let mut agg = StateAggregator::default();
        agg.button_changed(PAD, 1, true);
        assert!(agg.state().is_button_pressed(GamepadButton::A));
        agg.button_changed(PAD, 1, false);
        assert!(!agg.state().is_button_pressed(GamepadButton::A));
        assert!(agg.state().held_buttons().is_empty());
    }

    #[test]
    fn button_table() {
        let mapped: Vec<_> = (0..16).filter_map(GamepadButton::from_button_id).collect();
        assert_eq!(mapped.len(), 10);
        assert_eq!(GamepadButton::from_button_id(0), Some(GamepadButton::X));
        assert_eq!(GamepadButton::from_button_id(9), Some(GamepadButton::Start));
        assert_eq!(GamepadButton::from_button_id(6), None);
        assert_eq!(GamepadButton::from_button_id(7), None);

        let mut agg = StateAggregator::default();
        agg.button_changed(PAD, 7, true);
        assert!(agg.state().held_buttons().is_empty());
    }

    #[test]
    fn hat_decodes_diagonals_and_center() {
        let mut agg = StateAggregator::default();
        agg.axis_moved(PAD, HAT_AXIS, 0.0, 1);
        assert_eq!(
            dpad(agg.state()),
            vec![GamepadButton::DpadUp, GamepadButton::DpadRight]
        );
        agg.axis_moved(PAD, HAT_AXIS, 0.0, 4);
        assert_eq!(dpad(agg.state()), vec![GamepadButton::DpadDown]);
        agg.axis_moved(PAD, HAT_AXIS, 0.0, 12);
        assert_eq!(dpad(agg.state()), vec![GamepadButton::DpadDown]);
        agg.axis_moved(PAD, HAT_AXIS, 1.0, HAT_CENTERED);
        assert!(dpad(agg.state()).is_empty());
    }

    #[test]
    fn hat_center_clears_dpad_held_by_other_pads() {
        let other = DeviceId(1);
        let mut agg = StateAggregator::default();
        agg.axis_moved(PAD, HAT_AXIS, 0.0, 0);
        agg.axis_moved(other, HAT_AXIS, 0.0, 2);
        assert_eq!(
            dpad(agg.state()),
            vec![GamepadButton::DpadUp, GamepadButton::DpadRight]
        );
        agg.axis_moved(other, HAT_AXIS, 0.0, HAT_CENTERED);
        assert!(dpad(agg.state()).is_empty());

        // Nothing stale is left behind for a later release to resurrect.
        agg.button_changed(other, 1, true);
        agg.button_changed(other, 1, false);
        agg.device_removed(PAD);
        assert!(dpad(agg.state()).is_empty());
        assert!(agg.state().held_buttons().is_empty());
    }

    #[test]
    fn sticks_invert_y_and_apply_deadzone() {
        let mut agg = StateAggregator::default();
        agg.axis_moved(PAD, 0, 0.5, 0);
        agg.axis_moved(PAD, 1, -1.0, 0);
        agg.axis_moved(PAD, 2, 0.05, 0);
        agg.axis_moved(PAD, 3, 0.25, 0);
        assert_eq!(agg.state().left_stick(), Vec2::new(0.5, 1.0));
        assert_eq!(agg.state().right_stick(), Vec2::new(0.0, -0.25));
    }

    #[test]
    fn trigger_mapping() {
        let mut agg = StateAggregator::default();
        agg.axis_moved(PAD, 5, -1.0, 0);
        agg.axis_moved(PAD, 6, 1.0, 0);
        assert_eq!(agg.state().left_trigger(), 0.0);
        assert_eq!(agg.state().right_trigger(), 1.0);

        agg.axis_moved(PAD, 5, -0.995, 0);
        assert_eq!(agg.state().left_trigger(), 0.0);
        agg.axis_moved(PAD, 5, 0.0, 0);
        assert_eq!(agg.state().left_trigger(), 0.5);
    }

    #[test]
    fn analog_axes_lists_all_six() {
        let mut agg = StateAggregator::default();
        agg.axis_moved(PAD, 6, 1.0, 0);
        agg.axis_moved(PAD, 0, -1.0, 0);
        let axes = agg.state().analog_axes();
        assert_eq!(axes.len(), 6);
        assert_eq!(axes[1], (GamepadAxis::RightTrigger, 1.0));
        assert_eq!(axes[3], (GamepadAxis::LeftStickHorizontal, -1.0));
    }

    #[test]
    fn union_across_devices() {
        let mut agg = StateAggregator::default();
        agg.button_changed(PAD, 1, true);
        agg.button_changed(OTHER, 1, true);
        agg.button_changed(PAD, 1, false);
        assert!(agg.state().is_button_pressed(GamepadButton::A));
        agg.button_changed(OTHER, 1, false);
        assert!(!agg.state().is_button_pressed(GamepadButton::A));
    }

    #[test]
    fn removal_clears_contributions() {
        let mut agg = StateAggregator::default();
        agg.button_changed(PAD, 2, true);
        agg.button_changed(OTHER, 3, true);
        agg.axis_moved(PAD, 0, 1.0, 0);
        agg.axis_moved(OTHER, 2, -1.0, 0);
        agg.axis_moved(PAD, 5, 1.0, 0);

        agg.device_removed(PAD);
        let state = agg.state();
        assert!(!state.is_button_pressed(GamepadButton::B));
        assert!(state.is_button_pressed(GamepadButton::Y));
        assert_eq!(state.left_stick(), Vec2::ZERO);
        assert_eq!(state.right_stick().x, -1.0);
        assert_eq!(state.left_trigger(), 0.0);
    }

    #[test]
    fn removal_can_keep_stale_state() {
        let cfg = InputConfig {
            clear_on_detach: false,
            ..InputConfig::default()
        };
        let mut agg = StateAggregator::new(&cfg);
        agg.button_changed(PAD, 0, true);
        agg.device_removed(PAD);
        assert!(agg.state().is_button_pressed(GamepadButton::X));
    }
}
