use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{Profile, ProfileWatcher};
use crate::dispatch::Dispatcher;
use crate::feedback::{Banner, Feedback};
use crate::fingers::FingerState;
use crate::gestures::{Classification, Classifier, GestureDetector, GestureId, Rgb};
use crate::hand::{Frame, MAX_HANDS};
use crate::source::LandmarkSource;

#[derive(Default)]
pub struct RunOptions {
    /// Emit one JSON record per frame on the output.
    pub json: bool,
    pub mute: bool,
    pub watcher: Option<ProfileWatcher>,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub frames: usize,
    pub skipped: usize,
    pub actions: usize,
    pub display: String,
    pub expression: String,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
    frame: usize,
    gesture: GestureId,
    name: &'a str,
    confidence: f32,
    color: Rgb,
    display: &'a str,
    expression: String,
    cooldown: u32,
    banner: Option<&'a Banner>,
}

#[derive(Serialize)]
struct RawRecord {
    frame: usize,
    gesture: GestureId,
    name: &'static str,
    confidence: f32,
    color: Rgb,
    fingers: Vec<[u8; 5]>,
}

/// Pulls the next usable frame, logging and counting undecodable lines.
fn next_frame(source: &mut dyn LandmarkSource, skipped: &mut usize) -> Result<Option<Frame>> {
    loop {
        match source.next_frame() {
            Ok(frame) => return Ok(frame),
            Err(e) if e.is_recoverable() => {
                warn!("skipping frame: {e}");
                *skipped += 1;
            }
            Err(e) => return Err(e).context("landmark source failed"),
        }
    }
}

fn limit_hands(frame: &mut Frame, index: usize) {
    let dropped = frame.truncate_hands(MAX_HANDS);
    if dropped > 0 {
        warn!("frame {index}: {dropped} extra hand(s) ignored");
    }
}

/// Full loop: stable classification, dispatch, cooldown and feedback, until
/// the source ends or `stop` is raised.
pub fn run_pipeline(
    source: &mut dyn LandmarkSource,
    profile: &Profile,
    opts: RunOptions,
    out: &mut dyn Write,
    stop: &AtomicBool,
) -> Result<RunSummary> {
    let mut detector = GestureDetector::new(profile);
    let mut dispatcher = Dispatcher::new(profile)?;
    let mut feedback = Feedback::new(profile.feedback.clone());
    if opts.mute {
        feedback.set_voice(false);
    }
    info!(
        "pipeline started with profile '{}' (voice {})",
        profile.display_name(),
        if feedback.voice_enabled() { "on" } else { "off" }
    );

    let mut summary = RunSummary::default();
    while !stop.load(Ordering::Relaxed) {
        let Some(mut frame) = next_frame(source, &mut summary.skipped)? else {
            break;
        };
        let index = summary.frames;
        summary.frames += 1;
        limit_hands(&mut frame, index);

        if frame.hands.is_empty() {
            dispatcher.forget_last();
        }
        let stable = detector.classify_stable(&frame.hands);
        if stable.gesture.is_actionable() {
            debug!(
                "frame {index}: stable {} ({:.2})",
                stable.gesture, stable.confidence
            );
        }
        dispatcher.dispatch(&stable, &mut detector, &mut feedback);
        dispatcher.tick();
        feedback.tick();
        feedback.drain();

        if opts.json {
            let calc = dispatcher.calculator();
            let record = FrameRecord {
                frame: index,
                gesture: stable.gesture,
                name: stable.name,
                confidence: stable.confidence,
                color: stable.color,
                display: calc.display(),
                expression: calc.expression(),
                cooldown: dispatcher.cooldown(),
                banner: feedback.banner(),
            };
            serde_json::to_writer(&mut *out, &record)?;
            writeln!(out)?;
        }

        if let Some(next) = opts.watcher.as_ref().and_then(ProfileWatcher::poll) {
            apply_profile(&next, &mut detector, &mut dispatcher, &mut feedback);
        }
    }
    if stop.load(Ordering::Relaxed) {
        info!("stop requested after {} frames", summary.frames);
    }

    let calc = dispatcher.calculator();
    summary.actions = dispatcher.dispatched();
    summary.display = calc.display().to_string();
    summary.expression = calc.expression();
    info!(
        "processed {} frames ({} skipped), {} actions",
        summary.frames, summary.skipped, summary.actions
    );
    Ok(summary)
}

fn apply_profile(
    profile: &Profile,
    detector: &mut GestureDetector,
    dispatcher: &mut Dispatcher,
    feedback: &mut Feedback,
) {
    // bindings are validated on load, so this only fails on a logic error
    if let Err(e) = dispatcher.update_profile(profile) {
        warn!("profile '{}' rejected: {e}", profile.display_name());
        return;
    }
    detector.update_profile(profile);
    feedback.update_settings(profile.feedback.clone());
    info!("profile '{}' reloaded", profile.display_name());
}

/// Raw per-frame classification with no stabilization or dispatch.
pub fn classify_frames(
    source: &mut dyn LandmarkSource,
    profile: &Profile,
    out: &mut dyn Write,
    stop: &AtomicBool,
) -> Result<RunSummary> {
    let classifier = Classifier::new(profile);
    let mut summary = RunSummary::default();

    while !stop.load(Ordering::Relaxed) {
        let Some(mut frame) = next_frame(source, &mut summary.skipped)? else {
            break;
        };
        let index = summary.frames;
        summary.frames += 1;
        limit_hands(&mut frame, index);

        let Classification {
            gesture,
            name,
            confidence,
            color,
        } = classifier.classify(&frame.hands);
        let fingers = frame
            .hands
            .iter()
            .map(|h| classifier.finger_state(h))
            .map(|f: FingerState| f.bits())
            .collect();
        let record = RawRecord {
            frame: index,
            gesture,
            name,
            confidence,
            color,
            fingers,
        };
        serde_json::to_writer(&mut *out, &record)?;
        writeln!(out)?;
    }
    Ok(summary)
}
