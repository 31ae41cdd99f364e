use glam::Vec2;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::camera::OrbitControls;
use crate::debug_panel::{DebugPanel, DebugSettings};
use crate::error::SceneError;
use crate::uniforms::UniformSet;

/// Clear colours the `B` key cycles through.
pub const CLEAR_COLOR_PRESETS: [&str; 4] = ["#201919", "#000000", "#0b1a2c", "#2b2118"];

/// Identifier for a keyboard key the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    Character(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Up,
    Down,
    PageUp,
    PageDown,
    Escape,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);

    pub fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    /// Maps a winit button; ids that do not fit in a `u8` are ignored.
    pub fn from_winit(button: winit::event::MouseButton) -> Option<Self> {
        use winit::event::MouseButton as Winit;
        match button {
            Winit::Left => Some(Self(0)),
            Winit::Right => Some(Self(1)),
            Winit::Middle => Some(Self(2)),
            Winit::Other(id) => u8::try_from(id).ok().map(Self),
        }
    }
}

/// Debug panel change triggered by a key press.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelAction {
    NudgePointSize(i32),
    CycleClearColor,
}

impl PanelAction {
    pub fn from_key(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::Named(NamedKey::Up) => Some(Self::NudgePointSize(1)),
            KeyCode::Named(NamedKey::Down) => Some(Self::NudgePointSize(-1)),
            KeyCode::Named(NamedKey::PageUp) => Some(Self::NudgePointSize(10)),
            KeyCode::Named(NamedKey::PageDown) => Some(Self::NudgePointSize(-10)),
            KeyCode::Character('B') | KeyCode::Character('b') => Some(Self::CycleClearColor),
            _ => None,
        }
    }
}

/// Pointer and keyboard state that drives the orbit controls and the
/// debug panel.
#[derive(Debug, Default)]
pub struct InputState {
    dragging: bool,
    cursor: Option<Vec2>,
    preset: usize,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn set_mouse_button_down(&mut self, button: MouseButton) {
        if button == MouseButton::LEFT {
            self.dragging = true;
        }
    }

    pub fn set_mouse_button_up(&mut self, button: MouseButton) {
        if button == MouseButton::LEFT {
            self.dragging = false;
        }
    }

    /// Records the cursor and feeds drag motion into `controls`.
    ///
    /// `surface_height` is the logical height of the viewport, so a drag
    /// across the full height turns the camera by a full revolution.
    pub fn set_mouse_position(
        &mut self,
        position: Vec2,
        surface_height: f32,
        controls: &mut OrbitControls,
    ) {
        if let (true, Some(previous)) = (self.dragging, self.cursor) {
            controls.rotate(position - previous, surface_height);
        }
        self.cursor = Some(position);
    }

    pub fn mouse_position(&self) -> Option<Vec2> {
        self.cursor
    }

    /// Wheel lines scrolled; positive values move the camera closer.
    pub fn scroll(&mut self, lines: f32, controls: &mut OrbitControls) {
        controls.zoom(lines);
    }

    /// Applies the panel action bound to `key`, if any.
    pub fn handle_key(
        &mut self,
        key: KeyCode,
        panel: &DebugPanel,
        uniforms: &mut UniformSet,
        settings: &mut DebugSettings,
    ) -> Result<Option<PanelAction>, SceneError> {
        let Some(action) = PanelAction::from_key(key) else {
            return Ok(None);
        };
        match action {
            PanelAction::NudgePointSize(steps) => {
                let size = panel.nudge_point_size(steps, uniforms);
                debug!("firefly point size set to {size}");
            }
            PanelAction::CycleClearColor => {
                self.preset = (self.preset + 1) % CLEAR_COLOR_PRESETS.len();
                panel.set_clear_color(CLEAR_COLOR_PRESETS[self.preset], settings)?;
                debug!("clear color set to {}", CLEAR_COLOR_PRESETS[self.preset]);
            }
        }
        Ok(Some(action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::parse_hex_color;

    #[test]
    fn drag_feeds_rotation_only_while_pressed() {
        let mut input = InputState::new();
        let mut controls = OrbitControls::default();

        input.set_mouse_position(Vec2::new(10.0, 10.0), 600.0, &mut controls);
        input.set_mouse_position(Vec2::new(40.0, 10.0), 600.0, &mut controls);
        assert_eq!(controls.pending_rotation(), Vec2::ZERO);

        input.set_mouse_button_down(MouseButton::LEFT);
        input.set_mouse_position(Vec2::new(70.0, 10.0), 600.0, &mut controls);
        assert!(controls.pending_rotation().x != 0.0);
        assert_eq!(input.mouse_position(), Some(Vec2::new(70.0, 10.0)));

        input.set_mouse_button_up(MouseButton::LEFT);
        assert!(!input.is_dragging());
    }

    #[test]
    fn winit_buttons_map_without_truncation() {
        use winit::event::MouseButton as Winit;
        assert_eq!(MouseButton::from_winit(Winit::Left), Some(MouseButton::LEFT));
        assert_eq!(MouseButton::from_winit(Winit::Middle), Some(MouseButton::new(2)));
        assert_eq!(MouseButton::from_winit(Winit::Other(7)), Some(MouseButton::new(7)));
        assert_eq!(MouseButton::from_winit(Winit::Other(256)), None);

        let mut input = InputState::new();
        if let Some(button) = MouseButton::from_winit(Winit::Other(256)) {
            input.set_mouse_button_down(button);
        }
        assert!(!input.is_dragging());
    }

    #[test]
    fn right_button_does_not_start_a_drag() {
        let mut input = InputState::new();
        input.set_mouse_button_down(MouseButton::new(1));
        assert!(!input.is_dragging());
    }

    #[test]
    fn keys_map_to_panel_actions() {
        assert_eq!(
            PanelAction::from_key(KeyCode::Named(NamedKey::Up)),
            Some(PanelAction::NudgePointSize(1))
        );
        assert_eq!(
            PanelAction::from_key(KeyCode::Named(NamedKey::PageDown)),
            Some(PanelAction::NudgePointSize(-10))
        );
        assert_eq!(
            PanelAction::from_key(KeyCode::Character('B')),
            Some(PanelAction::CycleClearColor)
        );
        assert_eq!(PanelAction::from_key(KeyCode::Named(NamedKey::Escape)), None);
    }

    #[test]
    fn clear_color_key_cycles_presets() {
        let mut input = InputState::new();
        let mut uniforms = UniformSet::new(1.0);
        let mut settings = DebugSettings::default();

        let action = input
            .handle_key(KeyCode::Character('B'), &DebugPanel, &mut uniforms, &mut settings)
            .unwrap();
        assert_eq!(action, Some(PanelAction::CycleClearColor));
        assert_eq!(
            settings.clear_color,
            parse_hex_color(CLEAR_COLOR_PRESETS[1]).unwrap()
        );
    }

    #[test]
    fn point_size_keys_stay_within_slider_range() {
        let mut input = InputState::new();
        let mut uniforms = UniformSet::new(1.0);
        let mut settings = DebugSettings::default();
        for _ in 0..3 {
            input
                .handle_key(
                    KeyCode::Named(NamedKey::PageUp),
                    &DebugPanel,
                    &mut uniforms,
                    &mut settings,
                )
                .unwrap();
        }
        assert_eq!(uniforms.fireflies.base_point_size, 50.0);
    }
}
