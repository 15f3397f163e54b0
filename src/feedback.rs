use std::collections::VecDeque;

use log::{debug, info};
use serde::Serialize;

use crate::config::FeedbackSettings;
use crate::gestures::Rgb;

/// Transient on-screen message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub text: String,
    pub color: Rgb,
    pub frames_left: u32,
}

/// Fire-and-forget sink for user feedback. Rendering and speech stay
/// outside the core; the pipeline reads the banner and drains the queue.
#[derive(Debug)]
pub struct Feedback {
    settings: FeedbackSettings,
    banner: Option<Banner>,
    queue: VecDeque<String>,
}

impl Feedback {
    pub fn new(settings: FeedbackSettings) -> Self {
        Self {
            queue: VecDeque::with_capacity(settings.queue_len),
            settings,
            banner: None,
        }
    }

    pub fn voice_enabled(&self) -> bool {
        self.settings.voice
    }

    pub fn set_voice(&mut self, on: bool) {
        self.settings.voice = on;
        if !on {
            self.queue.clear();
        }
    }

    pub fn show(&mut self, text: impl Into<String>, color: Rgb) {
        self.show_for(text, color, self.settings.banner_frames);
    }

    pub fn show_result(&mut self, text: impl Into<String>, color: Rgb) {
        self.show_for(text, color, self.settings.result_banner_frames);
    }

    pub fn show_for(&mut self, text: impl Into<String>, color: Rgb, frames: u32) {
        let text = text.into();
        debug!("banner '{text}' for {frames} frames");
        self.banner = Some(Banner {
            text,
            color,
            frames_left: frames,
        });
    }

    /// Queues a spoken message; the oldest is dropped when the queue is full.
    pub fn announce(&mut self, msg: impl Into<String>) {
        if !self.settings.voice {
            return;
        }
        if self.queue.len() >= self.settings.queue_len {
            self.queue.pop_front();
        }
        self.queue.push_back(msg.into());
    }

    pub fn drain(&mut self) -> Vec<String> {
        let out: Vec<String> = self.queue.drain(..).collect();
        for msg in &out {
            info!("say: {msg}");
        }
        out
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    /// Once per frame.
    pub fn tick(&mut self) {
        if let Some(b) = self.banner.as_mut() {
            b.frames_left = b.frames_left.saturating_sub(1);
            if b.frames_left == 0 {
                self.banner = None;
            }
        }
    }

    /// Keeps the current voice toggle across profile reloads.
    pub fn update_settings(&mut self, settings: FeedbackSettings) {
        let voice = self.settings.voice && settings.voice;
        self.settings = settings;
        self.settings.voice = voice;
        while self.queue.len() > self.settings.queue_len {
            self.queue.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_expires() {
        let mut fb = Feedback::new(FeedbackSettings {
            banner_frames: 2,
            ..Default::default()
        });
        fb.show("ONE (1)", Rgb(100, 255, 100));
        assert_eq!(fb.banner().map(|b| b.frames_left), Some(2));
        fb.tick();
        assert!(fb.banner().is_some());
        fb.tick();
        assert!(fb.banner().is_none());
    }

    #[test]
    fn test_result_banner_lasts_longer() {
        let mut fb = Feedback::new(FeedbackSettings::default());
        fb.show_result("= 42", Rgb(0, 255, 255));
        assert_eq!(fb.banner().map(|b| b.frames_left), Some(60));
        fb.show("CLEAR ALL", Rgb::RED);
        assert_eq!(fb.banner().map(|b| b.frames_left), Some(40));
        assert_eq!(fb.banner().map(|b| b.text.as_str()), Some("CLEAR ALL"));
    }

    #[test]
    fn test_queue_drops_oldest() {
        let mut fb = Feedback::new(FeedbackSettings::default());
        for i in 0..7 {
            fb.announce(format!("msg {i}"));
        }
        let out = fb.drain();
        assert_eq!(out.len(), 5);
        assert_eq!(out.first().map(String::as_str), Some("msg 2"));
        assert_eq!(out.last().map(String::as_str), Some("msg 6"));
        assert!(fb.drain().is_empty());
    }

    #[test]
    fn test_muted_sink_drops_announcements() {
        let mut fb = Feedback::new(FeedbackSettings::default());
        fb.set_voice(false);
        fb.announce("three");
        assert!(fb.drain().is_empty());
        // banners still show
        fb.show("THREE (3)", Rgb::GRAY);
        assert!(fb.banner().is_some());
    }

    #[test]
    fn test_reload_keeps_mute() {
        let mut fb = Feedback::new(FeedbackSettings::default());
        fb.set_voice(false);
        fb.update_settings(FeedbackSettings::default());
        assert!(!fb.voice_enabled());
    }
}
