use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use pico_args::Arguments;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::{
    env, io,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crate::config::{self, Profile, ProfileStore, ProfileWatcher};
use crate::pipeline::{self, RunOptions, RunSummary};
use crate::source;

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
            let input = input_arg(&mut pargs)?;
            let json = pargs.contains("--json");
            let mute = pargs.contains("--mute");
            let watch = pargs.contains("--watch");
            let (profile, path) = resolve_profile(&mut pargs)?;
            warn_leftovers(pargs);

            let watcher = if watch {
                Some(ProfileWatcher::new(&path)?)
            } else {
                None
            };
            let opts = RunOptions {
                json,
                mute,
                watcher,
            };
            let mut src = source::open(&input).with_context(|| format!("cannot open {input}"))?;
            let stop = install_stop_flag()?;
            let summary = pipeline::run_pipeline(
                src.as_mut(),
                &profile,
                opts,
                &mut io::stdout().lock(),
                &stop,
            )?;
            print_summary(&summary, json);
            Ok(())
        }

        Some("classify") => {
            let input = input_arg(&mut pargs)?;
            let (profile, _) = resolve_profile(&mut pargs)?;
            warn_leftovers(pargs);

            let mut src = source::open(&input).with_context(|| format!("cannot open {input}"))?;
            let stop = install_stop_flag()?;
            let summary =
                pipeline::classify_frames(src.as_mut(), &profile, &mut io::stdout().lock(), &stop)?;
            info!(
                "classified {} frames ({} skipped)",
                summary.frames, summary.skipped
            );
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handcalc use <profile_name>"))?;
            let mut store = ProfileStore::load_or_install_default()?;
            store.set_active(&name)?;
            println!("active profile: {name}");
            Ok(())
        }

        Some("list") => {
            let store = ProfileStore::load_or_install_default()?;
            for name in store.list_profiles() {
                let mark = if name == store.active_name { "*" } else { " " };
                println!("{mark} {name}");
            }
            Ok(())
        }

        Some("show") => {
            let store = ProfileStore::load_or_install_default()?;
            print_response(&store.report()?);
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

fn input_arg(pargs: &mut Arguments) -> Result<String> {
    Ok(pargs
        .opt_value_from_str("--input")?
        .unwrap_or_else(|| "-".to_string()))
}

/// `--profile-file PATH` wins over `--profile NAME`, which wins over the
/// active profile. Returns the path too, for `--watch`.
fn resolve_profile(pargs: &mut Arguments) -> Result<(Profile, PathBuf)> {
    let file: Option<PathBuf> = pargs.opt_value_from_str("--profile-file")?;
    let name: Option<String> = pargs.opt_value_from_str("--profile")?;

    if let Some(path) = file {
        if name.is_some() {
            warn!("--profile ignored because --profile-file was given");
        }
        let profile = config::load_profile_file(&path)?;
        return Ok((profile, path));
    }

    let store = ProfileStore::load_or_install_default()?;
    match name {
        Some(name) => {
            let profile = store.load_named(&name)?;
            Ok((profile, store.profile_path(&name)))
        }
        None => Ok((store.profile.clone(), store.active_path())),
    }
}

fn warn_leftovers(pargs: Arguments) {
    let rest = pargs.finish();
    if !rest.is_empty() {
        warn!("ignoring unexpected arguments: {rest:?}");
    }
}

/// SIGINT/SIGTERM raise the returned flag; the frame loop exits after the
/// frame in progress. A second signal gets the default behaviour.
fn install_stop_flag() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let flag = Arc::clone(&stop);
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("signal {sig} received; stopping");
            flag.store(true, Ordering::Relaxed);
        }
    });
    Ok(stop)
}

fn print_summary(summary: &RunSummary, json: bool) {
    if json {
        let v = serde_json::json!({ "summary": summary });
        println!("{v}");
        return;
    }
    println!("display:    {}", summary.display);
    println!("expression: {}", summary.expression);
    println!(
        "frames: {} (skipped {}), actions: {}",
        summary.frames, summary.skipped, summary.actions
    );
}

fn print_help() {
    println!(
        r#"handcalc - hand-gesture calculator core

USAGE:
  handcalc help [command]                 Show general or command-specific help
  handcalc run [options]                  Replay landmark frames through the calculator
  handcalc classify [options]             Print the raw gesture of every frame
  handcalc use <name>                     Switch active profile
  handcalc list                           List profiles
  handcalc show                           Show config paths and the active profile

OPTIONS (run, classify):
  --input PATH|-                          JSON-lines landmark frames (default: stdin)
  --profile NAME                          Use a named profile instead of the active one
  --profile-file PATH                     Use a profile file outside the profile directory

TIPS:
  - Profiles: ~/.config/handcalc/profiles
  - Active profile pointer: ~/.config/handcalc/active
  - Log level: HANDCALC_LOG=debug
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "run" => println!(
            "usage: handcalc run [--input PATH|-] [--profile NAME | --profile-file PATH] [--json] [--watch] [--mute]\n\
             Classifies, stabilizes and dispatches every frame, then prints the final display.\n\
             --json   one record per frame on stdout\n\
             --watch  reload the profile when its file changes\n\
             --mute   drop spoken announcements"
        ),
        "classify" => println!(
            "usage: handcalc classify [--input PATH|-] [--profile NAME | --profile-file PATH]\n\
             Prints the unstabilized gesture and finger states of every frame as JSON lines."
        ),
        "use" => {
            println!("usage: handcalc use <name>\nValidates profile <name> and makes it active.")
        }
        "list" => {
            println!("usage: handcalc list\nLists available profiles; marks active with '*'.")
        }
        "show" => println!(
            "usage: handcalc show\nPrints config paths and the active profile as JSON."
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
