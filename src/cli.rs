use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::env;

use crate::actions::{ActionSink, MouseButton, UinputSink, WHEEL_DELTA};
use crate::config::{self, ConfigState};
use crate::pipeline::{self, InputSource, RunOptions};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("run") => {
            let input: Option<String> = pargs.opt_value_from_str("--input")?;
            let detector: Option<String> = pargs.opt_value_from_str("--detector")?;
            let profile: Option<String> = pargs.opt_value_from_str("--profile")?;
            let dry_run = pargs.contains("--dry-run");

            let input = match (input, detector) {
                (Some(_), Some(_)) => {
                    return Err(anyhow!("--input and --detector are mutually exclusive"));
                }
                (Some(p), None) if p == "-" => InputSource::Stdin,
                (Some(p), None) => InputSource::File(p),
                (None, Some(cmd)) => InputSource::Command(cmd),
                (None, None) => InputSource::Stdin,
            };
            pipeline::run_pipeline(RunOptions {
                input,
                profile,
                dry_run,
            })
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl use <profile_name>"))?;
            let mut cfg = ConfigState::load_or_install_default()?;
            cfg.set_active(&name)?;
            print_response(&serde_json::json!({"ok": true, "active": cfg.active_name}));
            Ok(())
        }

        Some("list") => {
            let cfg = ConfigState::load_or_install_default()?;
            let profiles: Vec<String> = cfg
                .list_profiles()
                .into_iter()
                .map(|p| {
                    if p == cfg.active_name {
                        format!("*{p}")
                    } else {
                        p
                    }
                })
                .collect();
            print_response(&serde_json::json!({
                "profiles": profiles,
                "config_dir": cfg.config_dir,
            }));
            Ok(())
        }

        Some("doctor") => {
            let cfg = ConfigState::load_or_install_default();
            if let Err(e) = &cfg {
                eprintln!("warning: config unavailable: {e:#}");
            }
            print_response(&config::doctor_report(cfg.as_ref().ok()));
            Ok(())
        }

        Some("emit") => {
            // usage:
            //   handctl emit click right
            //   handctl emit scroll 3
            //   handctl emit volume 0.4
            let what: String = pargs.free_from_str().map_err(|_| {
                anyhow!("usage: handctl emit <click|scroll|hscroll|mute|volume|brightness> ...")
            })?;
            let cfg = ConfigState::load_or_install_default()?;
            let mut sink = UinputSink::new(&cfg.profile)?;
            match what.as_str() {
                "click" => {
                    let btn: MouseButton = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: handctl emit click <left|right|middle>"))?;
                    sink.click(btn)?;
                    println!("ok: clicked {btn:?}");
                }
                "scroll" => {
                    let steps: i32 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: handctl emit scroll <steps>"))?;
                    sink.scroll(steps * WHEEL_DELTA)?;
                    println!("ok: scrolled vertical {steps}");
                }
                "hscroll" => {
                    let steps: i32 = pargs
                        .free_from_str()
                        .map_err(|_| anyhow!("usage: handctl emit hscroll <steps>"))?;
                    sink.horizontal_scroll(steps * WHEEL_DELTA)?;
                    println!("ok: scrolled horizontal {steps}");
                }
                "mute" => {
                    sink.toggle_mute()?;
                    println!("ok: toggled mute");
                }
                "volume" => {
                    let level = level_arg(&mut pargs, "volume")?;
                    sink.set_volume_level(level)?;
                    println!("ok: volume {:.2}", sink.volume_level()?);
                }
                "brightness" => {
                    let level = level_arg(&mut pargs, "brightness")?;
                    sink.set_brightness_level(level)?;
                    println!("ok: brightness {:.2}", sink.brightness_level()?);
                }
                other => return Err(anyhow!("unknown emit kind: {other}")),
            }
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn level_arg(pargs: &mut Arguments, what: &str) -> Result<f32> {
    let level: f32 = pargs
        .free_from_str()
        .map_err(|_| anyhow!("usage: handctl emit {what} <0..1>"))?;
    if !(0.0..=1.0).contains(&level) {
        return Err(anyhow!("{what} level must be within 0..1, got {level}"));
    }
    Ok(level)
}

fn print_help() {
    println!(
        r#"handctl - hand-gesture pointer and media control

USAGE:
  handctl help [command]                   Show general or command-specific help
  handctl run [--input PATH|-]             Read detector frames from a file or stdin
              [--detector CMD]             ...or from a detector process' stdout
              [--profile NAME] [--dry-run] Print actions as JSON instead of emitting them
  handctl use <name>                       Switch active profile
  handctl list                             List profiles
  handctl doctor                           Diagnose permissions and devices
  handctl emit click <left|right|middle>   Emit a mouse click
  handctl emit scroll <steps>              Emit vertical scroll (+/- steps)
  handctl emit hscroll <steps>             Emit horizontal scroll (+/- steps)
  handctl emit mute                        Toggle audio mute
  handctl emit volume <0..1>               Set output volume
  handctl emit brightness <0..1>           Set screen brightness

TIPS:
  - Profiles: ~/.config/handctl/profiles
  - Active profile pointer: ~/.config/handctl/active
  - Logging: RUST_LOG=debug handctl run ...
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: handctl run [--input PATH|-] [--detector CMD] [--profile NAME] [--dry-run]\n\
             Drives pointer, scroll, volume and brightness from detector frames (one JSON\n\
             object per line). Edits to the active profile are picked up while running."
        ),
        "use" => println!("usage: handctl use <name>\nMakes <name> the persisted active profile."),
        "list" => {
            println!("usage: handctl list\nLists available profiles; marks active with '*'.")
        }
        "doctor" => println!(
            "usage: handctl doctor\nChecks uinput access, wpctl and backlight devices."
        ),
        "emit" => println!(
            "usage:\n  handctl emit click <left|right|middle>\n  handctl emit scroll <steps>\n  handctl emit hscroll <steps>\n  handctl emit mute\n  handctl emit volume <0..1>\n  handctl emit brightness <0..1>"
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
