use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

use crate::config::Profile;
use crate::system::SystemControls;

/// Wheel units per notch.
pub const WHEEL_DELTA: i32 = 120;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("`{cmd}` failed: {stderr}")]
    Command { cmd: String, stderr: String },
    #[error("unexpected output: {0}")]
    Parse(String),
    #[error("{0} not available")]
    Unavailable(&'static str),
    #[error("uinput: {0}")]
    Device(String),
}

#[cfg(target_os = "linux")]
impl From<uinput::Error> for ActionError {
    fn from(e: uinput::Error) -> Self {
        ActionError::Device(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn slot(self) -> usize {
        match self {
            MouseButton::Left => 0,
            MouseButton::Right => 1,
            MouseButton::Middle => 2,
        }
    }
}

impl FromStr for MouseButton {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(anyhow!("unknown mouse button: {other}")),
        }
    }
}

/// One primitive output action, as recorded or printed in dry-run mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    PointerMoveTo { x: f64, y: f64 },
    ButtonDown { button: MouseButton },
    ButtonUp { button: MouseButton },
    Click { button: MouseButton },
    DoubleClick,
    Scroll { delta: i32 },
    HorizontalScroll { delta: i32 },
    SetVolume { level: f32 },
    SetBrightness { level: f32 },
    ToggleMute,
}

/// Where control actions end up. Button up on a released button is a no-op.
pub trait ActionSink {
    fn screen_size(&self) -> (i32, i32);
    fn pointer_position(&self) -> (f64, f64);

    fn pointer_move_to(&mut self, x: f64, y: f64) -> Result<(), ActionError>;
    fn button_down(&mut self, button: MouseButton) -> Result<(), ActionError>;
    fn button_up(&mut self, button: MouseButton) -> Result<(), ActionError>;
    fn click(&mut self, button: MouseButton) -> Result<(), ActionError>;
    fn double_click(&mut self) -> Result<(), ActionError>;
    fn scroll(&mut self, delta: i32) -> Result<(), ActionError>;
    fn horizontal_scroll(&mut self, delta: i32) -> Result<(), ActionError>;

    fn volume_level(&self) -> Result<f32, ActionError>;
    fn set_volume_level(&mut self, level: f32) -> Result<(), ActionError>;
    fn brightness_level(&self) -> Result<f32, ActionError>;
    fn set_brightness_level(&mut self, level: f32) -> Result<(), ActionError>;
    fn toggle_mute(&mut self) -> Result<(), ActionError>;

    /// Called after every frame's actions have been issued.
    fn end_frame(&mut self, _frame: u64) -> Result<(), ActionError> {
        Ok(())
    }
}

/// Absolute pointer position kept on our side, clamped to the screen.
#[derive(Debug, Clone, Copy)]
struct VirtualCursor {
    x: f64,
    y: f64,
    width: i32,
    height: i32,
}

impl VirtualCursor {
    fn centered(width: i32, height: i32) -> Self {
        Self {
            x: width as f64 / 2.0,
            y: height as f64 / 2.0,
            width,
            height,
        }
    }

    /// Moves to the clamped target; returns the whole-pixel delta travelled.
    fn move_to(&mut self, x: f64, y: f64) -> (i32, i32) {
        let nx = x.clamp(0.0, (self.width - 1).max(0) as f64).round();
        let ny = y.clamp(0.0, (self.height - 1).max(0) as f64).round();
        let delta = ((nx - self.x.round()) as i32, (ny - self.y.round()) as i32);
        self.x = nx;
        self.y = ny;
        delta
    }
}

fn notches(delta: i32) -> i32 {
    match delta / WHEEL_DELTA {
        0 => delta.signum(),
        n => n,
    }
}

// ---------------------------------------------------------------------------
// uinput-backed sink
// ---------------------------------------------------------------------------

pub struct UinputSink {
    #[allow(dead_code)]
    linux: Option<Box<LinuxUinput>>,
    cursor: VirtualCursor,
    pressed: [bool; 3],
    system: SystemControls,
}

impl UinputSink {
    pub fn new(profile: &Profile) -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let mut sink = Self::noop(profile);
            sink.linux = Some(Box::new(LinuxUinput::create()?));
            return Ok(sink);
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; pointer output is a NO-OP");
            Ok(Self::noop(profile))
        }
    }

    /// Sink without a virtual device; system controls still work.
    pub fn noop(profile: &Profile) -> Self {
        Self {
            linux: None,
            cursor: VirtualCursor::centered(profile.screen.width, profile.screen.height),
            pressed: [false; 3],
            system: SystemControls::new(&profile.system),
        }
    }

    fn button(&mut self, button: MouseButton, down: bool) -> Result<(), ActionError> {
        if self.pressed[button.slot()] == down {
            return Ok(());
        }
        self.pressed[button.slot()] = down;
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.button(button, down)?;
        }
        Ok(())
    }

    fn wheel(&mut self, vertical: bool, delta: i32) -> Result<(), ActionError> {
        if delta == 0 {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.wheel(vertical, notches(delta))?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = (vertical, notches(delta));
        Ok(())
    }
}

impl ActionSink for UinputSink {
    fn screen_size(&self) -> (i32, i32) {
        (self.cursor.width, self.cursor.height)
    }

    fn pointer_position(&self) -> (f64, f64) {
        (self.cursor.x, self.cursor.y)
    }

    fn pointer_move_to(&mut self, x: f64, y: f64) -> Result<(), ActionError> {
        let (dx, dy) = self.cursor.move_to(x, y);
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.linux.as_mut() {
            dev.rel_move(dx, dy)?;
        }
        Ok(())
    }

    fn button_down(&mut self, button: MouseButton) -> Result<(), ActionError> {
        self.button(button, true)
    }

    fn button_up(&mut self, button: MouseButton) -> Result<(), ActionError> {
        self.button(button, false)
    }

    fn click(&mut self, button: MouseButton) -> Result<(), ActionError> {
        self.button(button, true)?;
        self.button(button, false)
    }

    fn double_click(&mut self) -> Result<(), ActionError> {
        self.click(MouseButton::Left)?;
        self.click(MouseButton::Left)
    }

    fn scroll(&mut self, delta: i32) -> Result<(), ActionError> {
        self.wheel(true, delta)
    }

    fn horizontal_scroll(&mut self, delta: i32) -> Result<(), ActionError> {
        self.wheel(false, delta)
    }

    fn volume_level(&self) -> Result<f32, ActionError> {
        self.system.volume_level()
    }

    fn set_volume_level(&mut self, level: f32) -> Result<(), ActionError> {
        self.system.set_volume_level(level)
    }

    fn brightness_level(&self) -> Result<f32, ActionError> {
        self.system.brightness_level()
    }

    fn set_brightness_level(&mut self, level: f32) -> Result<(), ActionError> {
        self.system.set_brightness_level(level)
    }

    fn toggle_mute(&mut self) -> Result<(), ActionError> {
        self.system.toggle_mute()
    }
}

#[cfg(target_os = "linux")]
struct LinuxUinput {
    dev: uinput::device::Device,
}

#[cfg(target_os = "linux")]
impl LinuxUinput {
    fn create() -> Result<Self> {
        use uinput::event::{controller::Mouse, relative};

        let dev = uinput::default()?
            .name("Handctl Virtual Pointer")?
            // relative axes + wheel
            .event(relative::Position::X)?
            .event(relative::Position::Y)?
            .event(relative::Wheel::Vertical)?
            .event(relative::Wheel::Horizontal)?
            // mouse buttons
            .event(Mouse::Left)?
            .event(Mouse::Right)?
            .event(Mouse::Middle)?
            .create()?;

        info!("uinput: created virtual pointer");
        Ok(Self { dev })
    }

    fn sync(&mut self) -> Result<(), ActionError> {
        self.dev.synchronize()?;
        Ok(())
    }

    fn rel_move(&mut self, dx: i32, dy: i32) -> Result<(), ActionError> {
        use uinput::event::relative::Position;
        if dx != 0 {
            self.dev.send(Position::X, dx)?;
        }
        if dy != 0 {
            self.dev.send(Position::Y, dy)?;
        }
        self.sync()
    }

    fn button(&mut self, button: MouseButton, down: bool) -> Result<(), ActionError> {
        use uinput::event::controller::Mouse;
        let code = match button {
            MouseButton::Left => Mouse::Left,
            MouseButton::Right => Mouse::Right,
            MouseButton::Middle => Mouse::Middle,
        };
        self.dev.send(code, i32::from(down))?;
        self.sync()
    }

    fn wheel(&mut self, vertical: bool, steps: i32) -> Result<(), ActionError> {
        use uinput::event::relative::Wheel;
        let axis = if vertical { Wheel::Vertical } else { Wheel::Horizontal };
        self.dev.send(axis, steps)?;
        self.sync()
    }
}

// ---------------------------------------------------------------------------
// recording sink (tests, --dry-run)
// ---------------------------------------------------------------------------

/// In-memory sink. With `echo` set, each frame's actions are printed as a
/// JSON line and then dropped.
#[derive(Debug)]
pub struct RecordingSink {
    actions: Vec<Action>,
    cursor: VirtualCursor,
    volume: f32,
    brightness: f32,
    muted: bool,
    echo: bool,
}

impl RecordingSink {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            actions: Vec::new(),
            cursor: VirtualCursor::centered(width, height),
            volume: 0.5,
            brightness: 0.5,
            muted: false,
            echo: false,
        }
    }

    pub fn echoing(width: i32, height: i32) -> Self {
        Self {
            echo: true,
            ..Self::new(width, height)
        }
    }

    #[cfg(test)]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn take(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.actions)
    }

    #[cfg(test)]
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn push(&mut self, a: Action) -> Result<(), ActionError> {
        debug!("action: {a:?}");
        self.actions.push(a);
        Ok(())
    }
}

impl ActionSink for RecordingSink {
    fn screen_size(&self) -> (i32, i32) {
        (self.cursor.width, self.cursor.height)
    }

    fn pointer_position(&self) -> (f64, f64) {
        (self.cursor.x, self.cursor.y)
    }

    fn pointer_move_to(&mut self, x: f64, y: f64) -> Result<(), ActionError> {
        self.cursor.move_to(x, y);
        self.push(Action::PointerMoveTo { x, y })
    }

    fn button_down(&mut self, button: MouseButton) -> Result<(), ActionError> {
        self.push(Action::ButtonDown { button })
    }

    fn button_up(&mut self, button: MouseButton) -> Result<(), ActionError> {
        self.push(Action::ButtonUp { button })
    }

    fn click(&mut self, button: MouseButton) -> Result<(), ActionError> {
        self.push(Action::Click { button })
    }

    fn double_click(&mut self) -> Result<(), ActionError> {
        self.push(Action::DoubleClick)
    }

    fn scroll(&mut self, delta: i32) -> Result<(), ActionError> {
        self.push(Action::Scroll { delta })
    }

    fn horizontal_scroll(&mut self, delta: i32) -> Result<(), ActionError> {
        self.push(Action::HorizontalScroll { delta })
    }

    fn volume_level(&self) -> Result<f32, ActionError> {
        Ok(self.volume)
    }

    fn set_volume_level(&mut self, level: f32) -> Result<(), ActionError> {
        self.volume = level;
        self.push(Action::SetVolume { level })
    }

    fn brightness_level(&self) -> Result<f32, ActionError> {
        Ok(self.brightness)
    }

    fn set_brightness_level(&mut self, level: f32) -> Result<(), ActionError> {
        self.brightness = level;
        self.push(Action::SetBrightness { level })
    }

    fn toggle_mute(&mut self) -> Result<(), ActionError> {
        self.muted = !self.muted;
        self.push(Action::ToggleMute)
    }

    fn end_frame(&mut self, frame: u64) -> Result<(), ActionError> {
        if !self.echo || self.actions.is_empty() {
            return Ok(());
        }
        let actions = self.take();
        let line = serde_json::json!({ "frame": frame, "actions": actions });
        println!("{line}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_clamps_to_screen() {
        let mut c = VirtualCursor::centered(100, 50);
        assert_eq!(c.move_to(60.0, 25.0), (10, 0));
        assert_eq!(c.move_to(500.0, -20.0), (39, -25));
        assert_eq!((c.x, c.y), (99.0, 0.0));
    }

    #[test]
    fn wheel_units_become_notches() {
        assert_eq!(notches(120), 1);
        assert_eq!(notches(-240), -2);
        assert_eq!(notches(30), 1);
        assert_eq!(notches(-1), -1);
    }

    #[test]
    fn recording_sink_tracks_pointer_and_levels() {
        let mut sink = RecordingSink::new(1920, 1080);
        assert_eq!(sink.pointer_position(), (960.0, 540.0));
        sink.pointer_move_to(100.4, 200.6).unwrap();
        assert_eq!(sink.pointer_position(), (100.0, 201.0));
        sink.set_volume_level(0.8).unwrap();
        assert_eq!(sink.volume_level().unwrap(), 0.8);
        sink.toggle_mute().unwrap();
        assert!(sink.is_muted());
        assert_eq!(sink.actions().len(), 3);
    }

    #[test]
    fn actions_serialize_tagged() {
        let v = serde_json::to_value(Action::Click { button: MouseButton::Right }).unwrap();
        assert_eq!(v, serde_json::json!({"action": "click", "button": "right"}));
    }

    #[test]
    fn parses_button_names() {
        assert_eq!("LEFT".parse::<MouseButton>().unwrap(), MouseButton::Left);
        assert!("thumb".parse::<MouseButton>().is_err());
    }
}
