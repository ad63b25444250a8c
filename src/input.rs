//! Input event forwarding
//!
//! Translates host pointer/keyboard events into one of two delivery shapes:
//! compositor-routed [`PointerInput`] (device coordinates scaled by pixel
//! density) or window-routed [`WindowMessage`]s (vertical coordinate flipped
//! to the native origin, wheel rotation rewritten as an in-page scroll
//! script). Selection between the two happens in the instance runtime based
//! on which controller variant initialized.

use crate::engine::{PointerInput, PointerInputKind, WindowMessage};

/// Primary-button flag in [`PointerInput::buttons`]
pub const BUTTON_PRIMARY: u32 = 1;

/// Native wheel units per host wheel step
const WHEEL_UNIT: f32 = 120.0;

/// Pixels scrolled per host wheel step on the script fallback path
const SCROLL_STEP_PX: f32 = 40.0;

/// Pointer phase as encoded by the host's small state code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    /// Hover movement, no buttons held
    Move,
    /// Primary button pressed
    Down,
    /// Movement with the primary button held
    Drag,
    /// Primary button released
    Up,
}

impl PointerPhase {
    /// Decode the host's state code; unknown codes read as plain movement
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => PointerPhase::Down,
            2 => PointerPhase::Drag,
            3 => PointerPhase::Up,
            _ => PointerPhase::Move,
        }
    }
}

/// One pointer event as posted by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// X in view coordinates (origin bottom-left on the host side)
    pub x: f32,
    /// Y in view coordinates
    pub y: f32,
    /// Wheel rotation in host wheel steps; 0 for none
    pub wheel_delta: f32,
    /// Pointer phase
    pub phase: PointerPhase,
}

/// Keyboard phase as encoded by the host's state code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPhase {
    /// Key pressed
    Down,
    /// Character repeat/press
    Press,
    /// Key released
    Up,
}

impl KeyPhase {
    /// Decode the host's state code; unknown codes read as a press
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => KeyPhase::Down,
            3 => KeyPhase::Up,
            _ => KeyPhase::Press,
        }
    }
}

/// One keyboard event as posted by the host
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEvent {
    /// Pointer x at event time (view coordinates)
    pub x: i32,
    /// Pointer y at event time
    pub y: i32,
    /// Characters produced by the key, if any
    pub chars: String,
    /// Native virtual-key code, 0 when unknown
    pub key_code: u16,
    /// Keyboard phase
    pub phase: KeyPhase,
}

// Virtual-key codes for the control characters the engine's text input does
// not accept as character messages.
const VK_BACK: u16 = 0x08;
const VK_TAB: u16 = 0x09;
const VK_RETURN: u16 = 0x0D;
const VK_ESCAPE: u16 = 0x1B;
const VK_DELETE: u16 = 0x2E;

/// Map a control character to its virtual-key code, if it has one
pub fn virtual_key_for_char(ch: char) -> Option<u16> {
    match ch {
        '\u{8}' => Some(VK_BACK),
        '\t' => Some(VK_TAB),
        '\r' | '\n' => Some(VK_RETURN),
        '\u{1b}' => Some(VK_ESCAPE),
        '\u{7f}' => Some(VK_DELETE),
        _ => None,
    }
}

/// Scale view coordinates by the active pixel density
pub fn scale_point(x: f32, y: f32, density: f32) -> (i32, i32) {
    let d = if density > 0.0 { density } else { 1.0 };
    ((x * d).round() as i32, (y * d).round() as i32)
}

/// Flip a vertical coordinate to the native top-left origin
pub fn flip_y(y: f32, view_height: u32) -> f32 {
    view_height as f32 - y
}

/// Build the compositor-routed pointer input for one event
pub fn compositor_pointer(event: &PointerEvent, density: f32) -> PointerInput {
    let (x, y) = scale_point(event.x, event.y, density);
    if event.wheel_delta != 0.0 {
        return PointerInput {
            kind: PointerInputKind::Wheel,
            x,
            y,
            buttons: 0,
            wheel_delta: (event.wheel_delta * WHEEL_UNIT).round() as i32,
        };
    }
    let (kind, buttons) = match event.phase {
        PointerPhase::Move => (PointerInputKind::Move, 0),
        PointerPhase::Drag => (PointerInputKind::Move, BUTTON_PRIMARY),
        PointerPhase::Down => (PointerInputKind::Down, BUTTON_PRIMARY),
        PointerPhase::Up => (PointerInputKind::Up, 0),
    };
    PointerInput {
        kind,
        x,
        y,
        buttons,
        wheel_delta: 0,
    }
}

/// Build the window-routed message sequence for one pointer event.
///
/// Wheel rotation is not represented here; the caller evaluates
/// [`wheel_scroll_script`] in-page instead.
pub fn window_pointer_messages(event: &PointerEvent, view_height: u32) -> Vec<WindowMessage> {
    let x = event.x.round() as i32;
    let y = flip_y(event.y, view_height).round() as i32;
    match event.phase {
        PointerPhase::Move | PointerPhase::Drag => vec![WindowMessage::MouseMove { x, y }],
        // Position the cursor before pressing so the hit test lands.
        PointerPhase::Down => vec![
            WindowMessage::MouseMove { x, y },
            WindowMessage::MouseDown { x, y },
        ],
        PointerPhase::Up => vec![WindowMessage::MouseUp { x, y }],
    }
}

/// In-page scroll equivalent for a wheel rotation
pub fn wheel_scroll_script(wheel_delta: f32) -> String {
    let px = (-wheel_delta * SCROLL_STEP_PX).round() as i32;
    format!("window.scrollBy(0, {});", px)
}

/// Build the window-routed message sequence for one keyboard event.
///
/// Control characters become virtual-key down/up pairs; printable
/// characters are delivered as character input, which is what the engine's
/// text handling expects.
pub fn key_messages(event: &KeyEvent) -> Vec<WindowMessage> {
    let mut messages = Vec::new();
    match event.phase {
        KeyPhase::Down | KeyPhase::Press => {
            for ch in event.chars.chars() {
                match virtual_key_for_char(ch) {
                    Some(vk) => {
                        messages.push(WindowMessage::KeyDown { virtual_key: vk });
                        messages.push(WindowMessage::KeyUp { virtual_key: vk });
                    }
                    None => messages.push(WindowMessage::Char { ch }),
                }
            }
            if event.chars.is_empty() && event.key_code != 0 && event.phase == KeyPhase::Down {
                messages.push(WindowMessage::KeyDown {
                    virtual_key: event.key_code,
                });
            }
        }
        KeyPhase::Up => {
            if event.key_code != 0 {
                messages.push(WindowMessage::KeyUp {
                    virtual_key: event.key_code,
                });
            }
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pointer(x: f32, y: f32, wheel: f32, phase: PointerPhase) -> PointerEvent {
        PointerEvent {
            x,
            y,
            wheel_delta: wheel,
            phase,
        }
    }

    // ========================================================================
    // Phase decoding
    // ========================================================================

    #[test]
    fn test_pointer_phase_codes() {
        assert_eq!(PointerPhase::from_code(0), PointerPhase::Move);
        assert_eq!(PointerPhase::from_code(1), PointerPhase::Down);
        assert_eq!(PointerPhase::from_code(2), PointerPhase::Drag);
        assert_eq!(PointerPhase::from_code(3), PointerPhase::Up);
        assert_eq!(PointerPhase::from_code(99), PointerPhase::Move);
    }

    #[test]
    fn test_key_phase_codes() {
        assert_eq!(KeyPhase::from_code(1), KeyPhase::Down);
        assert_eq!(KeyPhase::from_code(3), KeyPhase::Up);
        assert_eq!(KeyPhase::from_code(2), KeyPhase::Press);
    }

    // ========================================================================
    // Coordinate handling
    // ========================================================================

    #[test]
    fn test_scale_point_by_density() {
        assert_eq!(scale_point(100.0, 50.0, 2.0), (200, 100));
        assert_eq!(scale_point(100.4, 50.5, 1.0), (100, 51));
    }

    #[test]
    fn test_scale_point_rejects_nonpositive_density() {
        assert_eq!(scale_point(10.0, 20.0, 0.0), (10, 20));
        assert_eq!(scale_point(10.0, 20.0, -1.0), (10, 20));
    }

    #[test]
    fn test_flip_y() {
        assert_eq!(flip_y(0.0, 600), 600.0);
        assert_eq!(flip_y(600.0, 600), 0.0);
        assert_eq!(flip_y(150.0, 600), 450.0);
    }

    // ========================================================================
    // Compositor-routed pointer translation
    // ========================================================================

    #[test]
    fn test_compositor_pointer_down_sets_button_flag() {
        let input = compositor_pointer(&pointer(10.0, 20.0, 0.0, PointerPhase::Down), 1.0);
        assert_eq!(input.kind, PointerInputKind::Down);
        assert_eq!(input.buttons, BUTTON_PRIMARY);
    }

    #[test]
    fn test_compositor_pointer_drag_is_move_with_button() {
        let input = compositor_pointer(&pointer(10.0, 20.0, 0.0, PointerPhase::Drag), 1.0);
        assert_eq!(input.kind, PointerInputKind::Move);
        assert_eq!(input.buttons, BUTTON_PRIMARY);
    }

    #[test]
    fn test_compositor_pointer_scales_coordinates() {
        let input = compositor_pointer(&pointer(100.0, 40.0, 0.0, PointerPhase::Move), 1.5);
        assert_eq!((input.x, input.y), (150, 60));
    }

    #[test]
    fn test_compositor_wheel_overrides_phase() {
        let input = compositor_pointer(&pointer(0.0, 0.0, 2.0, PointerPhase::Move), 1.0);
        assert_eq!(input.kind, PointerInputKind::Wheel);
        assert_eq!(input.wheel_delta, 240);
    }

    // ========================================================================
    // Window-routed pointer translation
    // ========================================================================

    #[test]
    fn test_window_pointer_down_moves_then_presses() {
        let msgs = window_pointer_messages(&pointer(10.0, 100.0, 0.0, PointerPhase::Down), 600);
        assert_eq!(
            msgs,
            vec![
                WindowMessage::MouseMove { x: 10, y: 500 },
                WindowMessage::MouseDown { x: 10, y: 500 },
            ]
        );
    }

    #[test]
    fn test_window_pointer_flips_vertical() {
        let msgs = window_pointer_messages(&pointer(0.0, 0.0, 0.0, PointerPhase::Move), 480);
        assert_eq!(msgs, vec![WindowMessage::MouseMove { x: 0, y: 480 }]);
    }

    #[test]
    fn test_wheel_scroll_script_direction() {
        assert_eq!(wheel_scroll_script(1.0), "window.scrollBy(0, -40);");
        assert_eq!(wheel_scroll_script(-2.0), "window.scrollBy(0, 80);");
    }

    // ========================================================================
    // Keyboard translation
    // ========================================================================

    #[test]
    fn test_printable_chars_become_char_messages() {
        let event = KeyEvent {
            x: 0,
            y: 0,
            chars: "ab".to_string(),
            key_code: 0,
            phase: KeyPhase::Press,
        };
        assert_eq!(
            key_messages(&event),
            vec![
                WindowMessage::Char { ch: 'a' },
                WindowMessage::Char { ch: 'b' },
            ]
        );
    }

    #[test]
    fn test_enter_maps_to_virtual_key_pair() {
        let event = KeyEvent {
            x: 0,
            y: 0,
            chars: "\r".to_string(),
            key_code: 0,
            phase: KeyPhase::Down,
        };
        assert_eq!(
            key_messages(&event),
            vec![
                WindowMessage::KeyDown { virtual_key: 0x0D },
                WindowMessage::KeyUp { virtual_key: 0x0D },
            ]
        );
    }

    #[test]
    fn test_bare_key_code_down_and_up() {
        let down = KeyEvent {
            x: 0,
            y: 0,
            chars: String::new(),
            key_code: 0x25,
            phase: KeyPhase::Down,
        };
        assert_eq!(
            key_messages(&down),
            vec![WindowMessage::KeyDown { virtual_key: 0x25 }]
        );

        let up = KeyEvent {
            key_code: 0x25,
            phase: KeyPhase::Up,
            ..down
        };
        assert_eq!(
            key_messages(&up),
            vec![WindowMessage::KeyUp { virtual_key: 0x25 }]
        );
    }

    #[test]
    fn test_virtual_key_table() {
        assert_eq!(virtual_key_for_char('\u{8}'), Some(0x08));
        assert_eq!(virtual_key_for_char('\t'), Some(0x09));
        assert_eq!(virtual_key_for_char('\u{1b}'), Some(0x1B));
        assert_eq!(virtual_key_for_char('x'), None);
    }
}
