use glam::Vec2;

pub const KEY_CODE_LIMIT: usize = 256;
pub const MOUSE_BUTTON_LIMIT: usize = 8;

/// Latched keyboard/mouse state fed by host events.
///
/// Queries read the latest host-delivered state ("now"), not a frame-start
/// snapshot. The `*_pressed` queries are edge-triggered: they compare against
/// the snapshot rolled by `end_frame` at the end of the previous tick, so a
/// key held across frames reports pressed exactly once.
pub struct InputState {
    keys: [bool; KEY_CODE_LIMIT],
    keys_prev: [bool; KEY_CODE_LIMIT],
    buttons: [bool; MOUSE_BUTTON_LIMIT],
    buttons_prev: [bool; MOUSE_BUTTON_LIMIT],
    mouse: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            keys: [false; KEY_CODE_LIMIT],
            keys_prev: [false; KEY_CODE_LIMIT],
            buttons: [false; MOUSE_BUTTON_LIMIT],
            buttons_prev: [false; MOUSE_BUTTON_LIMIT],
            mouse: Vec2::ZERO,
        }
    }

    pub fn set_key_down(&mut self, code: i64) {
        if let Some(slot) = slot(code, KEY_CODE_LIMIT) {
            self.keys[slot] = true;
        }
    }

    pub fn set_key_up(&mut self, code: i64) {
        if let Some(slot) = slot(code, KEY_CODE_LIMIT) {
            self.keys[slot] = false;
        }
    }

    pub fn set_mouse_button(&mut self, button: i64, down: bool) {
        if let Some(slot) = slot(button, MOUSE_BUTTON_LIMIT) {
            self.buttons[slot] = down;
        }
    }

    pub fn set_mouse_position(&mut self, x: f32, y: f32) {
        self.mouse = Vec2::new(x, y);
    }

    /// Rolls the previous-frame snapshot forward. Called by the scheduler
    /// once per tick, after script queries have run.
    pub fn end_frame(&mut self) {
        self.keys_prev = self.keys;
        self.buttons_prev = self.buttons;
    }

    pub fn key_held(&self, code: i64) -> bool {
        slot(code, KEY_CODE_LIMIT).map_or(false, |slot| self.keys[slot])
    }

    pub fn key_pressed(&self, code: i64) -> bool {
        slot(code, KEY_CODE_LIMIT).map_or(false, |slot| self.keys[slot] && !self.keys_prev[slot])
    }

    pub fn button_held(&self, button: i64) -> bool {
        slot(button, MOUSE_BUTTON_LIMIT).map_or(false, |slot| self.buttons[slot])
    }

    pub fn button_pressed(&self, button: i64) -> bool {
        slot(button, MOUSE_BUTTON_LIMIT)
            .map_or(false, |slot| self.buttons[slot] && !self.buttons_prev[slot])
    }

    pub fn mouse_position(&self) -> Vec2 {
        self.mouse
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

fn slot(code: i64, limit: usize) -> Option<usize> {
    usize::try_from(code).ok().filter(|&slot| slot < limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressed_reports_exactly_one_frame() {
        let mut input = InputState::new();
        input.set_key_down(32);
        assert!(input.key_held(32));
        assert!(input.key_pressed(32), "first frame after the event is an edge");
        input.end_frame();
        assert!(input.key_held(32));
        assert!(!input.key_pressed(32), "still held, no longer an edge");
        input.set_key_up(32);
        input.end_frame();
        input.set_key_down(32);
        assert!(input.key_pressed(32), "release and re-press is a fresh edge");
    }

    #[test]
    fn mouse_buttons_follow_the_same_edge_rule() {
        let mut input = InputState::new();
        input.set_mouse_button(0, true);
        assert!(input.button_held(0));
        assert!(input.button_pressed(0));
        input.end_frame();
        assert!(!input.button_pressed(0));
        input.set_mouse_button(0, false);
        assert!(!input.button_held(0));
    }

    #[test]
    fn out_of_range_codes_are_ignored() {
        let mut input = InputState::new();
        input.set_key_down(-1);
        input.set_key_down(9999);
        input.set_mouse_button(42, true);
        assert!(!input.key_held(-1));
        assert!(!input.key_held(9999));
        assert!(!input.button_held(42));
    }

    #[test]
    fn mouse_position_latches_latest_event() {
        let mut input = InputState::new();
        input.set_mouse_position(10.0, 20.0);
        input.set_mouse_position(11.0, 21.0);
        assert_eq!(input.mouse_position(), Vec2::new(11.0, 21.0));
    }
}
