//! Keyboard and mouse handling

use crate::camera::Camera;
use winit::event::{ElementState, MouseButton, MouseScrollDelta};
use winit::keyboard::Key;

const ORBIT_SPEED: f32 = 0.01;
const PAN_SPEED: f32 = 0.002;
const ZOOM_SPEED: f32 = 0.1;

/// The single character a key press stands for, as typed
pub fn key_char(key: &Key) -> Option<char> {
    match key {
        Key::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Mouse state driving the orbit camera: left drag orbits, right drag pans, wheel zooms
#[derive(Debug, Default, Clone)]
pub struct MouseState {
    left: bool,
    right: bool,
    last_position: Option<(f64, f64)>,
}

impl MouseState {
    pub fn button(&mut self, button: MouseButton, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        match button {
            MouseButton::Left => self.left = pressed,
            MouseButton::Right => self.right = pressed,
            _ => {}
        }
    }

    /// Apply a cursor move to the camera; returns whether the camera changed
    pub fn moved(&mut self, x: f64, y: f64, camera: &mut Camera) -> bool {
        let last = self.last_position.replace((x, y));
        let Some((last_x, last_y)) = last else {
            return false;
        };
        let (dx, dy) = ((x - last_x) as f32, (y - last_y) as f32);

        if self.left {
            camera.orbit(dx * ORBIT_SPEED, dy * ORBIT_SPEED);
            true
        } else if self.right {
            camera.pan(dx * PAN_SPEED, dy * PAN_SPEED);
            true
        } else {
            false
        }
    }

    pub fn scrolled(&self, delta: MouseScrollDelta, camera: &mut Camera) {
        let lines = match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
        };
        camera.zoom((lines * ZOOM_SPEED).clamp(-0.9, 0.9));
    }

    pub fn left_window(&mut self) {
        self.last_position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use winit::keyboard::NamedKey;

    #[test]
    fn test_key_char_keeps_case() {
        assert_eq!(key_char(&Key::Character("r".into())), Some('r'));
        assert_eq!(key_char(&Key::Character("Q".into())), Some('Q'));
        assert_eq!(key_char(&Key::Character("ab".into())), None);
        assert_eq!(key_char(&Key::Named(NamedKey::Escape)), None);
    }

    #[test]
    fn test_drag_orbits_only_while_pressed() {
        let mut camera = Camera::default();
        let start = camera.position;
        let mut mouse = MouseState::default();

        assert!(!mouse.moved(10.0, 10.0, &mut camera));
        assert!(!mouse.moved(40.0, 10.0, &mut camera));
        assert_eq!(camera.position, start);

        mouse.button(MouseButton::Left, ElementState::Pressed);
        assert!(mouse.moved(70.0, 10.0, &mut camera));
        assert_ne!(camera.position, start);

        mouse.button(MouseButton::Left, ElementState::Released);
        let after = camera.position;
        assert!(!mouse.moved(90.0, 30.0, &mut camera));
        assert_eq!(camera.position, after);
    }

    #[test]
    fn test_wheel_zooms_in() {
        let mut camera = Camera::default();
        let mouse = MouseState::default();
        mouse.scrolled(MouseScrollDelta::LineDelta(0.0, 1.0), &mut camera);
        assert_relative_eq!(camera.distance(), 0.9, epsilon = 1e-5);
    }
}
