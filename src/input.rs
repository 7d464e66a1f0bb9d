/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Joystick input for the emulator.

use std::default::Default;

/// The buttons on the MTMC-16 joystick.
///
/// The value of each button is its bit in the byte reported by the
/// `joystick` system call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up = 0x80,
    Down = 0x40,
    Left = 0x20,
    Right = 0x10,
    L = 0x08,
    Space = 0x04,
    A = 0x02,
    S = 0x01,
}

/// Represents the state of the joystick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct State {
    /// The pressed buttons, as a bit mask.
    buttons: u8,
}

impl State {
    /// Returns a new input state with no buttons pressed.
    pub fn new() -> Self {
        State::default()
    }

    /// Marks the given button as pressed.
    pub fn press(&mut self, button: Button) {
        self.buttons |= button as u8;
    }

    /// Marks the given button as released.
    pub fn release(&mut self, button: Button) {
        self.buttons &= !(button as u8);
    }

    /// Returns whether the given button is pressed.
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons & button as u8 != 0
    }

    /// Returns the pressed buttons as a bit mask.
    pub fn bits(&self) -> u8 {
        self.buttons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buttons() {
        let mut state = State::new();
        state.press(Button::Up);
        state.press(Button::S);
        state.press(Button::Space);
        state.release(Button::Space);
        state.release(Button::Left);

        assert_eq!(state.bits(), 0x81);
        assert!(state.is_pressed(Button::Up));
        assert!(!state.is_pressed(Button::Space));
    }
}
