//! Volume, mute and backlight brightness.
//!
//! Audio goes through PipeWire's `wpctl`; brightness through the sysfs
//! backlight class.

use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use crate::actions::ActionError;
use crate::config::SystemConfig;

const BACKLIGHT_ROOT: &str = "/sys/class/backlight";

#[derive(Debug, Clone)]
pub struct SystemControls {
    audio_sink: String,
    backlight: Option<PathBuf>,
}

impl SystemControls {
    pub fn new(cfg: &SystemConfig) -> Self {
        let backlight = if cfg.backlight.trim().is_empty() {
            first_backlight()
        } else {
            Some(Path::new(BACKLIGHT_ROOT).join(cfg.backlight.trim()))
        };
        if let Some(dev) = &backlight {
            info!("system: backlight device {}", dev.display());
        }
        Self {
            audio_sink: cfg.audio_sink.clone(),
            backlight,
        }
    }

    pub fn volume_level(&self) -> Result<f32, ActionError> {
        let out = wpctl(&["get-volume", &self.audio_sink])?;
        parse_wpctl_volume(&out).ok_or_else(|| ActionError::Parse(format!("wpctl get-volume: {out:?}")))
    }

    pub fn set_volume_level(&self, level: f32) -> Result<(), ActionError> {
        let level = format!("{:.2}", level.clamp(0.0, 1.0));
        wpctl(&["set-volume", &self.audio_sink, &level]).map(|_| ())
    }

    pub fn toggle_mute(&self) -> Result<(), ActionError> {
        wpctl(&["set-mute", &self.audio_sink, "toggle"]).map(|_| ())
    }

    pub fn brightness_level(&self) -> Result<f32, ActionError> {
        let dev = self.backlight_dev()?;
        let cur = read_u32(&dev.join("brightness"))?;
        let max = read_u32(&dev.join("max_brightness"))?;
        if max == 0 {
            return Err(ActionError::Parse(format!("{}: max_brightness is 0", dev.display())));
        }
        Ok(cur as f32 / max as f32)
    }

    pub fn set_brightness_level(&self, level: f32) -> Result<(), ActionError> {
        let dev = self.backlight_dev()?;
        let max = read_u32(&dev.join("max_brightness"))?;
        let raw = (level.clamp(0.0, 1.0) * max as f32).round() as u32;
        fs::write(dev.join("brightness"), raw.to_string())?;
        debug!("system: brightness {raw}/{max}");
        Ok(())
    }

    fn backlight_dev(&self) -> Result<&Path, ActionError> {
        self.backlight.as_deref().ok_or(ActionError::Unavailable("backlight"))
    }
}

pub fn list_backlights() -> Vec<String> {
    let mut out = vec![];
    if let Ok(rd) = fs::read_dir(BACKLIGHT_ROOT) {
        for e in rd.flatten() {
            if let Some(name) = e.file_name().to_str() {
                out.push(name.to_string());
            }
        }
    }
    out.sort();
    out
}

pub fn wpctl_available() -> bool {
    Command::new("wpctl").arg("--version").output().is_ok()
}

fn first_backlight() -> Option<PathBuf> {
    list_backlights().into_iter().next().map(|n| Path::new(BACKLIGHT_ROOT).join(n))
}

fn wpctl(args: &[&str]) -> Result<String, ActionError> {
    let out = Command::new("wpctl").args(args).output()?;
    if !out.status.success() {
        return Err(ActionError::Command {
            cmd: format!("wpctl {}", args.join(" ")),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

fn read_u32(path: &Path) -> Result<u32, ActionError> {
    let txt = fs::read_to_string(path)?;
    txt.trim()
        .parse()
        .map_err(|_| ActionError::Parse(format!("{}: {:?}", path.display(), txt.trim())))
}

/// Parses `Volume: 0.40` (optionally followed by ` [MUTED]`).
fn parse_wpctl_volume(out: &str) -> Option<f32> {
    out.trim()
        .strip_prefix("Volume:")?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}
