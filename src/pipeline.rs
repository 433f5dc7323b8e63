use anyhow::Result;
use log::{debug, error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
    mpsc::Receiver,
};

use crate::actions::{ActionSink, RecordingSink, UinputSink};
use crate::config::{self, ConfigState};
use crate::input::DetectorStream;
use crate::orchestrator::{FrameOrchestrator, FrameOutcome};

pub enum InputSource {
    Stdin,
    File(String),
    Command(String),
}

pub struct RunOptions {
    pub input: InputSource,
    pub profile: Option<String>,
    pub dry_run: bool,
}

pub fn run_pipeline(opts: RunOptions) -> Result<()> {
    let mut cfg = ConfigState::load_or_install_default()?;
    if let Some(name) = &opts.profile {
        cfg.select(name)?;
    }
    info!(
        "using profile '{}' ({})",
        cfg.active_name,
        cfg.profile.meta.name.as_deref().unwrap_or("unnamed")
    );

    let shutdown = shutdown_flag()?;

    // Watch the profiles directory: editors often replace the file on save.
    let watch = match config::watch_profiles(&cfg.profiles_dir) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("profile hot-reload disabled: {e}");
            None
        }
    };

    let mut source = match &opts.input {
        InputSource::Stdin => DetectorStream::stdin(),
        InputSource::File(path) => DetectorStream::open(path)?,
        InputSource::Command(cmd) => DetectorStream::spawn(cmd)?,
    };

    let screen = &cfg.profile.screen;
    let mut sink: Box<dyn ActionSink> = if opts.dry_run {
        Box::new(RecordingSink::echoing(screen.width, screen.height))
    } else {
        Box::new(UinputSink::new(&cfg.profile).unwrap_or_else(|e| {
            warn!("uinput unavailable ({e}); pointer output disabled");
            UinputSink::noop(&cfg.profile)
        }))
    };

    let mut orchestrator = FrameOrchestrator::new(&cfg.profile);
    let mut frame_no: u64 = 0;
    let mut last_outcome: Option<FrameOutcome> = None;

    while !shutdown.load(Ordering::Relaxed) {
        if let Some((_, rx)) = &watch {
            if profile_changed(rx, &cfg) {
                match cfg.reload() {
                    Ok(()) => {
                        orchestrator.apply_profile(&cfg.profile);
                        info!("profile '{}' reloaded", cfg.active_name);
                    }
                    Err(e) => error!("reload failed, keeping previous profile: {e:#}"),
                }
            }
        }

        let Some(next) = source.next_frame() else {
            info!("detector stream ended after {frame_no} frames");
            break;
        };
        frame_no += 1;

        let frame = match next {
            Ok(f) => f,
            Err(e) => {
                warn!("frame {frame_no} skipped: {e}");
                continue;
            }
        };

        let outcome = orchestrator.process(&frame.hands, sink.as_mut());
        if last_outcome != Some(outcome) {
            let ctl = orchestrator.controller();
            debug!(
                "frame {frame_no}: {outcome:?} dragging={} click_armed={} muted={} pinch={:?}",
                ctl.is_dragging(),
                ctl.is_click_armed(),
                ctl.is_muted(),
                ctl.pinch_session().map(|s| (s.axis(), s.level()))
            );
            last_outcome = Some(outcome);
        }
        flush(sink.as_mut(), frame_no);
    }

    if shutdown.load(Ordering::Relaxed) {
        info!("termination requested; stopping after frame {frame_no}");
    }
    let ctl = orchestrator.controller();
    if ctl.is_dragging() || ctl.is_grabbing() {
        info!("releasing held buttons");
    }
    orchestrator.shutdown(sink.as_mut());
    flush(sink.as_mut(), frame_no);
    Ok(())
}

/// SIGINT/SIGTERM set the returned flag. A second signal while the first is
/// still pending exits at once, so a read blocked on an idle stdin can still
/// be interrupted.
fn shutdown_flag() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(sig, 1, Arc::clone(&flag))?;
        signal_hook::flag::register(sig, Arc::clone(&flag))?;
    }
    Ok(flag)
}

fn flush(sink: &mut dyn ActionSink, frame_no: u64) -> bool {
    match sink.end_frame(frame_no) {
        Ok(()) => true,
        Err(e) => {
            error!("frame {frame_no}: flushing actions failed: {e}");
            false
        }
    }
}

fn profile_changed(rx: &Receiver<notify::Result<notify::Event>>, cfg: &ConfigState) -> bool {
    let target = cfg.profile_path();
    let name = target.file_name();
    let mut changed = false;
    while let Ok(res) = rx.try_recv() {
        match res {
            Ok(ev) => {
                if (ev.kind.is_modify() || ev.kind.is_create()) && ev.paths.iter().any(|p| p.file_name() == name) {
                    changed = true;
                }
            }
            Err(e) => warn!("profile watcher error: {e}"),
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionError, MouseButton};

    /// Sink whose device is gone: every call fails.
    struct UnpluggedSink;

    fn gone<T>() -> Result<T, ActionError> {
        Err(ActionError::Unavailable("device"))
    }

    impl ActionSink for UnpluggedSink {
        fn screen_size(&self) -> (i32, i32) {
            (1920, 1080)
        }
        fn pointer_position(&self) -> (f64, f64) {
            (0.0, 0.0)
        }
        fn pointer_move_to(&mut self, _x: f64, _y: f64) -> Result<(), ActionError> {
            gone()
        }
        fn button_down(&mut self, _button: MouseButton) -> Result<(), ActionError> {
            gone()
        }
        fn button_up(&mut self, _button: MouseButton) -> Result<(), ActionError> {
            gone()
        }
        fn click(&mut self, _button: MouseButton) -> Result<(), ActionError> {
            gone()
        }
        fn double_click(&mut self) -> Result<(), ActionError> {
            gone()
        }
        fn scroll(&mut self, _delta: i32) -> Result<(), ActionError> {
            gone()
        }
        fn horizontal_scroll(&mut self, _delta: i32) -> Result<(), ActionError> {
            gone()
        }
        fn volume_level(&self) -> Result<f32, ActionError> {
            gone()
        }
        fn set_volume_level(&mut self, _level: f32) -> Result<(), ActionError> {
            gone()
        }
        fn brightness_level(&self) -> Result<f32, ActionError> {
            gone()
        }
        fn set_brightness_level(&mut self, _level: f32) -> Result<(), ActionError> {
            gone()
        }
        fn toggle_mute(&mut self) -> Result<(), ActionError> {
            gone()
        }
        fn end_frame(&mut self, _frame: u64) -> Result<(), ActionError> {
            gone()
        }
    }

    #[test]
    fn flush_reports_sink_failure() {
        assert!(!flush(&mut UnpluggedSink, 7));
        assert!(flush(&mut RecordingSink::new(640, 480), 7));
    }

    #[test]
    fn first_termination_signal_only_sets_the_flag() {
        let flag = shutdown_flag().unwrap();
        assert!(!flag.load(Ordering::Relaxed));
        signal_hook::low_level::raise(SIGTERM).unwrap();
        assert!(flag.load(Ordering::Relaxed));
    }
}
