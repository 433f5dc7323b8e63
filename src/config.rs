use anyhow::{Context, Result, anyhow};
use directories::UserDirs;
use log::info;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::mpsc,
};

use crate::arbiter::DominantHand;

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hands {
    pub dominant: DominantHand,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Screen {
    pub width: i32,
    pub height: i32,
}

/// Recognition and control constants. Defaults are the tuned values; change
/// them only with care.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Tip-reach / base-segment ratio above which a finger counts as extended.
    pub extension_ratio: f32,
    /// Thumb tip to index tip distance that makes a pinch.
    pub pinch_distance: f32,
    /// Index/middle tip spread relative to knuckle spread for the V sign.
    pub spread_ratio: f32,
    /// Index/middle depth difference under which two fingers count as closed.
    pub closed_depth: f32,
    /// A raw gesture settles once seen more than this many frames in a row.
    pub debounce_frames: u32,
    pub pinch_axis_threshold: f32,
    pub pinch_stable_frames: u32,
    /// Squared pixel displacement treated as jitter.
    pub jitter_dist_sq: f64,
    /// Squared pixel displacement up to which motion is damped.
    pub slow_dist_sq: f64,
    pub slow_gain: f64,
    pub fast_gain: f64,
    /// Committed pinch level is divided by this before it touches volume or
    /// brightness.
    pub level_divisor: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            extension_ratio: 0.5,
            pinch_distance: 0.05,
            spread_ratio: 1.7,
            closed_depth: 0.1,
            debounce_frames: 4,
            pinch_axis_threshold: 0.3,
            pinch_stable_frames: 5,
            jitter_dist_sq: 25.0,
            slow_dist_sq: 900.0,
            slow_gain: 0.07,
            fast_gain: 2.1,
            level_divisor: 50.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// `wpctl` target for volume and mute.
    pub audio_sink: String,
    /// Device name under /sys/class/backlight; empty picks the first one.
    pub backlight: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            audio_sink: "@DEFAULT_AUDIO_SINK@".to_string(),
            backlight: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub meta: Meta,
    pub hands: Hands,
    pub screen: Screen,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone)]
pub struct ConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("handctl"))
}

fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        let cfgdir = config_dir()?;
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile(&profdir.join(format!("{active_name}.toml")))?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn profile_path(&self) -> PathBuf {
        self.profiles_dir.join(format!("{}.toml", self.active_name))
    }

    /// Re-reads the active profile; the current one is kept on error.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profile_path())?;
        Ok(())
    }

    /// Switches the persisted active profile.
    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        self.profile = load_profile(&p)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        Ok(())
    }

    /// Uses `name` for this process only.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        self.profile = load_profile(&p)?;
        self.active_name = name.to_string();
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }
}

fn load_profile(path: &Path) -> Result<Profile> {
    let txt = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_profile(&txt).with_context(|| format!("failed to load {}", path.display()))
}

pub fn parse_profile(txt: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(txt)?;
    validate_profile(&profile)?;
    Ok(profile)
}

fn validate_profile(p: &Profile) -> Result<()> {
    if p.screen.width <= 0 || p.screen.height <= 0 {
        return Err(anyhow!("screen.width and screen.height must be positive"));
    }

    let t = &p.thresholds;
    if !(t.extension_ratio > 0.0 && t.extension_ratio < 2.0) {
        return Err(anyhow!("thresholds.extension_ratio must be in (0,2)"));
    }
    if !(t.pinch_distance > 0.0 && t.pinch_distance < 1.0) {
        return Err(anyhow!(
            "thresholds.pinch_distance must be in (0,1) normalized units"
        ));
    }
    if t.spread_ratio <= 0.0 || t.closed_depth <= 0.0 || t.pinch_axis_threshold <= 0.0 {
        return Err(anyhow!(
            "thresholds.spread_ratio, closed_depth and pinch_axis_threshold must be positive"
        ));
    }
    if t.debounce_frames == 0 || t.pinch_stable_frames == 0 {
        return Err(anyhow!("frame counts must be at least 1"));
    }
    if t.jitter_dist_sq < 0.0 || t.slow_dist_sq < t.jitter_dist_sq {
        return Err(anyhow!(
            "thresholds.jitter_dist_sq must be >= 0 and <= slow_dist_sq"
        ));
    }
    if t.level_divisor <= 0.0 {
        return Err(anyhow!("thresholds.level_divisor must be positive"));
    }
    if p.system.audio_sink.trim().is_empty() {
        return Err(anyhow!("system.audio_sink must not be empty"));
    }
    Ok(())
}

/// Watches the profiles directory; every event is forwarded on the channel.
pub fn watch_profiles(path: &Path) -> Result<(RecommendedWatcher, mpsc::Receiver<notify::Result<notify::Event>>)> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    info!("watching {} for changes", path.display());
    Ok((watcher, rx))
}

pub fn doctor_report(state: Option<&ConfigState>) -> serde_json::Value {
    let uinput_ok = Path::new("/dev/uinput").exists();
    let in_input_group = check_in_input_group();
    serde_json::json!({
        "uinput_present": uinput_ok,
        "input_group_member": in_input_group,
        "wpctl_available": crate::system::wpctl_available(),
        "backlights": crate::system::list_backlights(),
        "profiles_dir": state.map(|s| s.profiles_dir.clone()),
        "active_profile": state.map(|s| s.active_name.clone()),
        "hints": {
            "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
            "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input",
            "backlight_write_access": "add a udev rule granting the video group write access to brightness"
        }
    })
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:")
                && line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
            {
                return true;
            }
        }
    }
    false
}
