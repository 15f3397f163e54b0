use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{debug, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, channel},
};

use crate::dispatch::ActionMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
}

/// Finger-State Estimator constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerThresholds {
    /// Thumb is extended when wrist→tip exceeds wrist→IP by this factor.
    pub thumb_ratio: f32,
    /// Tip must sit this many pixels above the PIP for the vertical vote.
    pub vertical_margin_px: f32,
    /// Wrist→tip must exceed wrist→MCP by this factor for the radial vote.
    pub radial_ratio: f32,
    /// PIP straightness (180° = straight) above which the angle vote passes.
    pub straight_angle_deg: f32,
    /// Votes out of three needed to call a finger extended.
    pub min_votes: usize,
}

impl Default for FingerThresholds {
    fn default() -> Self {
        Self {
            thumb_ratio: 1.15,
            vertical_margin_px: 20.0,
            radial_ratio: 1.25,
            straight_angle_deg: 140.0,
            min_votes: 2,
        }
    }
}

/// Single-hand orientation constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationThresholds {
    /// Max |index_tip.y - pinky_tip.y| for the fingertips to count as level.
    pub tip_level_px: f32,
    /// Horizontal wrist→middle-tip extent must dominate vertical by this factor.
    pub extent_ratio: f32,
    /// Thumb tip must be this far above the wrist for "equal".
    pub thumb_up_margin_px: f32,
}

impl Default for OrientationThresholds {
    fn default() -> Self {
        Self {
            tip_level_px: 50.0,
            extent_ratio: 1.8,
            thumb_up_margin_px: 30.0,
        }
    }
}

/// Two-hand "+" formation over the middle fingers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossThresholds {
    pub min_angle_deg: f32,
    pub max_angle_deg: f32,
    pub max_tip_distance_px: f32,
    /// One component must exceed the other by this factor to name an axis.
    pub axis_ratio: f32,
}

impl Default for CrossThresholds {
    fn default() -> Self {
        Self {
            min_angle_deg: 80.0,
            max_angle_deg: 100.0,
            max_tip_distance_px: 150.0,
            axis_ratio: 1.5,
        }
    }
}

/// Two-hand "X" formation over the index fingers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XThresholds {
    pub min_angle_deg: f32,
    pub max_angle_deg: f32,
    pub max_tip_distance_px: f32,
    pub min_base_distance_px: f32,
    /// Each tip must lie within this fraction of the base spread from the
    /// midpoint of the two bases.
    pub convergence_ratio: f32,
}

impl Default for XThresholds {
    fn default() -> Self {
        Self {
            min_angle_deg: 40.0,
            max_angle_deg: 140.0,
            max_tip_distance_px: 200.0,
            min_base_distance_px: 100.0,
            convergence_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerSettings {
    /// Window length N.
    pub capacity: usize,
    /// No decision is made until the window holds this many frames.
    pub min_fill: usize,
    /// Fraction of the window the winner must hold (inclusive).
    pub threshold: f64,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            capacity: 10,
            min_fill: 8,
            threshold: 0.70,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Stable confidence must be strictly above this to act.
    pub confidence_gate: f32,
    /// Frames of quiet after an action (backspace uses half).
    pub cooldown_frames: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            confidence_gate: 0.7,
            cooldown_frames: 25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackSettings {
    pub voice: bool,
    pub queue_len: usize,
    pub banner_frames: u32,
    pub result_banner_frames: u32,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            voice: true,
            queue_len: 5,
            banner_frames: 40,
            result_banner_frames: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub fingers: FingerThresholds,
    #[serde(default)]
    pub orientation: OrientationThresholds,
    #[serde(default)]
    pub cross: CrossThresholds,
    #[serde(default)]
    pub x_formation: XThresholds,
    #[serde(default)]
    pub stabilizer: StabilizerSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub feedback: FeedbackSettings,
    /// gesture id -> action string; unlisted gestures keep their default action
    #[serde(default)]
    pub bindings: HashMap<String, String>,
}

impl Profile {
    pub fn display_name(&self) -> &str {
        self.meta.name.as_deref().unwrap_or("unnamed")
    }
}

/// On-disk profile directory plus the currently active profile.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("handcalc"))
}

pub fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl ProfileStore {
    pub fn load_or_install_default() -> Result<Self> {
        Self::open(&config_dir()?)
    }

    /// Opens (and on first use populates) a config directory: installs the
    /// embedded default profile and an `active` pointer naming it.
    pub fn open(cfgdir: &Path) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            fs::write(&active_ptr, b"default")?;
        }

        let active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = load_profile_file(&profdir.join(format!("{active_name}.toml")))?;

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir.to_path_buf(),
            profiles_dir: profdir,
            active_ptr,
        })
    }

    pub fn profile_path(&self, name: &str) -> PathBuf {
        self.profiles_dir.join(format!("{name}.toml"))
    }

    pub fn active_path(&self) -> PathBuf {
        self.profile_path(&self.active_name)
    }

    pub fn load_named(&self, name: &str) -> Result<Profile> {
        load_profile_file(&self.profile_path(name))
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profile_path(name);
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        // validate before switching so a broken profile never becomes active
        let profile = load_profile_file(&p)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
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

    pub fn report(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "config_dir": self.config_dir,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "profiles": self.list_profiles(),
            "profile": serde_json::to_value(&self.profile)?,
        }))
    }
}

pub fn load_profile_file(path: &Path) -> Result<Profile> {
    let txt = fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    let profile = parse_profile(&txt).map_err(|e| anyhow!("{}: {e}", path.display()))?;
    debug!("loaded profile '{}' from {}", profile.display_name(), path.display());
    Ok(profile)
}

pub fn parse_profile(txt: &str) -> Result<Profile> {
    let profile: Profile = toml::from_str(txt).map_err(|e| anyhow!("failed to parse: {e}"))?;
    validate_profile(&profile)?;
    Ok(profile)
}

fn validate_profile(p: &Profile) -> Result<()> {
    let f = &p.fingers;
    positive("fingers.thumb_ratio", f.thumb_ratio)?;
    positive("fingers.radial_ratio", f.radial_ratio)?;
    non_negative("fingers.vertical_margin_px", f.vertical_margin_px)?;
    angle("fingers.straight_angle_deg", f.straight_angle_deg)?;
    if !(1..=3).contains(&f.min_votes) {
        return Err(anyhow!("fingers.min_votes must be 1, 2 or 3"));
    }

    let o = &p.orientation;
    positive("orientation.tip_level_px", o.tip_level_px)?;
    positive("orientation.extent_ratio", o.extent_ratio)?;
    non_negative("orientation.thumb_up_margin_px", o.thumb_up_margin_px)?;

    let c = &p.cross;
    angle_range("cross", c.min_angle_deg, c.max_angle_deg)?;
    positive("cross.max_tip_distance_px", c.max_tip_distance_px)?;
    positive("cross.axis_ratio", c.axis_ratio)?;

    let x = &p.x_formation;
    angle_range("x_formation", x.min_angle_deg, x.max_angle_deg)?;
    positive("x_formation.max_tip_distance_px", x.max_tip_distance_px)?;
    positive("x_formation.min_base_distance_px", x.min_base_distance_px)?;
    positive("x_formation.convergence_ratio", x.convergence_ratio)?;

    let s = &p.stabilizer;
    if s.capacity == 0 {
        return Err(anyhow!("stabilizer.capacity must be at least 1"));
    }
    if s.min_fill == 0 || s.min_fill > s.capacity {
        return Err(anyhow!(
            "stabilizer.min_fill must be in 1..={} (capacity), got {}",
            s.capacity,
            s.min_fill
        ));
    }
    if !(s.threshold > 0.0 && s.threshold <= 1.0) {
        return Err(anyhow!("stabilizer.threshold must be in (0,1]"));
    }

    if !(0.0..1.0).contains(&p.dispatch.confidence_gate) {
        return Err(anyhow!("dispatch.confidence_gate must be in [0,1)"));
    }
    if p.feedback.queue_len == 0 {
        return Err(anyhow!("feedback.queue_len must be at least 1"));
    }

    ActionMap::from_bindings(&p.bindings)?;
    Ok(())
}

fn positive(key: &str, v: f32) -> Result<()> {
    if v > 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(anyhow!("{key} must be positive, got {v}"))
    }
}

fn non_negative(key: &str, v: f32) -> Result<()> {
    if v >= 0.0 && v.is_finite() {
        Ok(())
    } else {
        Err(anyhow!("{key} must not be negative, got {v}"))
    }
}

fn angle(key: &str, v: f32) -> Result<()> {
    if (0.0..=180.0).contains(&v) {
        Ok(())
    } else {
        Err(anyhow!("{key} must be within [0,180] degrees, got {v}"))
    }
}

fn angle_range(section: &str, min: f32, max: f32) -> Result<()> {
    angle(&format!("{section}.min_angle_deg"), min)?;
    angle(&format!("{section}.max_angle_deg"), max)?;
    if min >= max {
        return Err(anyhow!("{section}: min_angle_deg must be below max_angle_deg"));
    }
    Ok(())
}

/// Watches a profile file and yields freshly validated profiles when it
/// changes. The parent directory is watched so editors that replace the file
/// are still seen.
pub struct ProfileWatcher {
    path: PathBuf,
    rx: Receiver<notify::Result<Event>>,
    _watcher: RecommendedWatcher,
}

impl ProfileWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("watching {} for changes", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            rx,
            _watcher: watcher,
        })
    }

    /// Non-blocking. Returns the new profile if the file changed and parses;
    /// a broken edit is logged and the last good profile stays in effect.
    pub fn poll(&self) -> Option<Profile> {
        let mut touched = false;
        while let Ok(res) = self.rx.try_recv() {
            match res {
                Ok(evt) => {
                    let relevant = matches!(evt.kind, EventKind::Create(_) | EventKind::Modify(_))
                        && evt
                            .paths
                            .iter()
                            .any(|p| p.file_name() == self.path.file_name());
                    touched |= relevant;
                }
                Err(e) => warn!("profile watch error: {e}"),
            }
        }
        if !touched {
            return None;
        }
        match load_profile_file(&self.path) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("reload failed, keeping last good profile: {e}");
                None
            }
        }
    }
}
