use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::recording::RecorderMode;

const DEFAULT_SOURCE_URL: &str = "stub://cat_cam";
const DEFAULT_TARGET_FPS: u32 = 15;
const DEFAULT_FRAME_WIDTH: u32 = 1280;
const DEFAULT_FRAME_HEIGHT: u32 = 720;
const DEFAULT_DETECTOR_BACKEND: &str = "motion";
const DEFAULT_MIN_CONFIDENCE: f32 = 0.25;
const DEFAULT_HITS_TO_START: u32 = 3;
const DEFAULT_MISSES_TO_END: u32 = 5;
const DEFAULT_OUTPUT_DIR: &str = "cat_captures";
const DEFAULT_MODE: RecorderMode = RecorderMode::Photo;
const DEFAULT_PHOTO_SAMPLE_INTERVAL: u32 = 15;
const DEFAULT_MASK_THRESHOLD: f32 = 0.5;

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    tracker: Option<TrackerConfigFile>,
    recording: Option<RecordingConfigFile>,
    mask: Option<MaskConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    min_confidence: Option<f32>,
    input_width: Option<u32>,
    input_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    hits_to_start: Option<u32>,
    misses_to_end: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RecordingConfigFile {
    output_dir: Option<PathBuf>,
    default_mode: Option<String>,
    photo_sample_interval: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct MaskConfigFile {
    mode: Option<String>,
    path: Option<PathBuf>,
    threshold: Option<f32>,
}

/// Region mask mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaskMode {
    All,
    Bitmap,
}

impl FromStr for MaskMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(MaskMode::All),
            "bitmap" => Ok(MaskMode::Bitmap),
            other => Err(format!("unknown mask mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    pub tracker: TrackerSettings,
    pub recording: RecordingSettings,
    pub mask: MaskSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub min_confidence: f32,
    /// Model input size (tract backend); defaults to the source frame size.
    pub input_width: u32,
    pub input_height: u32,
}

#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub hits_to_start: u32,
    pub misses_to_end: u32,
}

#[derive(Debug, Clone)]
pub struct RecordingSettings {
    pub output_dir: PathBuf,
    pub default_mode: RecorderMode,
    pub photo_sample_interval: u32,
}

#[derive(Debug, Clone)]
pub struct MaskSettings {
    pub mode: MaskMode,
    pub path: Option<PathBuf>,
    pub threshold: f32,
}

impl MonitorConfig {
    /// Load configuration: JSON file named by `CATWATCH_CONFIG` (if set),
    /// then `CATWATCH_*` env overrides, then validation. Invalid
    /// configuration is fatal before any frame is processed.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("CATWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let source = SourceSettings {
            url: file
                .source
                .as_ref()
                .and_then(|source| source.url.clone())
                .unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            target_fps: file
                .source
                .as_ref()
                .and_then(|source| source.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
            width: file
                .source
                .as_ref()
                .and_then(|source| source.width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            height: file
                .source
                .as_ref()
                .and_then(|source| source.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
        };
        let detector = DetectorSettings {
            backend: file
                .detector
                .as_ref()
                .and_then(|detector| detector.backend.clone())
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
            model_path: file
                .detector
                .as_ref()
                .and_then(|detector| detector.model_path.clone()),
            min_confidence: file
                .detector
                .as_ref()
                .and_then(|detector| detector.min_confidence)
                .unwrap_or(DEFAULT_MIN_CONFIDENCE),
            input_width: file
                .detector
                .as_ref()
                .and_then(|detector| detector.input_width)
                .unwrap_or(source.width),
            input_height: file
                .detector
                .as_ref()
                .and_then(|detector| detector.input_height)
                .unwrap_or(source.height),
        };
        let tracker = TrackerSettings {
            hits_to_start: file
                .tracker
                .as_ref()
                .and_then(|tracker| tracker.hits_to_start)
                .unwrap_or(DEFAULT_HITS_TO_START),
            misses_to_end: file
                .tracker
                .as_ref()
                .and_then(|tracker| tracker.misses_to_end)
                .unwrap_or(DEFAULT_MISSES_TO_END),
        };
        let recording = RecordingSettings {
            output_dir: file
                .recording
                .as_ref()
                .and_then(|recording| recording.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            default_mode: match file
                .recording
                .as_ref()
                .and_then(|recording| recording.default_mode.as_deref())
            {
                Some(raw) => raw.parse().map_err(|e| anyhow!("{}", e))?,
                None => DEFAULT_MODE,
            },
            photo_sample_interval: file
                .recording
                .as_ref()
                .and_then(|recording| recording.photo_sample_interval)
                .unwrap_or(DEFAULT_PHOTO_SAMPLE_INTERVAL),
        };
        let mask = MaskSettings {
            mode: match file.mask.as_ref().and_then(|mask| mask.mode.as_deref()) {
                Some(raw) => raw.parse().map_err(|e| anyhow!("{}", e))?,
                // A configured mask path implies bitmap mode.
                None if file
                    .mask
                    .as_ref()
                    .is_some_and(|mask| mask.path.is_some()) =>
                {
                    MaskMode::Bitmap
                }
                None => MaskMode::All,
            },
            path: file.mask.as_ref().and_then(|mask| mask.path.clone()),
            threshold: file
                .mask
                .and_then(|mask| mask.threshold)
                .unwrap_or(DEFAULT_MASK_THRESHOLD),
        };
        Ok(Self {
            source,
            detector,
            tracker,
            recording,
            mask,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("CATWATCH_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source.url = url;
            }
        }
        if let Ok(mode) = std::env::var("CATWATCH_MODE") {
            if !mode.trim().is_empty() {
                self.recording.default_mode = mode.parse().map_err(|e| anyhow!("{}", e))?;
            }
        }
        if let Ok(dir) = std::env::var("CATWATCH_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.recording.output_dir = PathBuf::from(dir);
            }
        }
        if let Ok(path) = std::env::var("CATWATCH_MASK_PATH") {
            if !path.trim().is_empty() {
                self.mask.path = Some(PathBuf::from(path));
                self.mask.mode = MaskMode::Bitmap;
            }
        }
        if let Ok(raw) = std::env::var("CATWATCH_MIN_CONFIDENCE") {
            self.detector.min_confidence = raw
                .parse()
                .map_err(|_| anyhow!("CATWATCH_MIN_CONFIDENCE must be a float"))?;
        }
        if let Ok(raw) = std::env::var("CATWATCH_HITS_TO_START") {
            self.tracker.hits_to_start = raw
                .parse()
                .map_err(|_| anyhow!("CATWATCH_HITS_TO_START must be an integer"))?;
        }
        if let Ok(raw) = std::env::var("CATWATCH_MISSES_TO_END") {
            self.tracker.misses_to_end = raw
                .parse()
                .map_err(|_| anyhow!("CATWATCH_MISSES_TO_END must be an integer"))?;
        }
        if let Ok(raw) = std::env::var("CATWATCH_PHOTO_SAMPLE_INTERVAL") {
            self.recording.photo_sample_interval = raw
                .parse()
                .map_err(|_| anyhow!("CATWATCH_PHOTO_SAMPLE_INTERVAL must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be >= 1"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source frame size must be non-zero"));
        }
        if !(0.0..=1.0).contains(&self.detector.min_confidence) {
            return Err(anyhow!(
                "min_confidence must be within [0, 1], got {}",
                self.detector.min_confidence
            ));
        }
        if self.tracker.hits_to_start == 0 {
            return Err(anyhow!("hits_to_start must be >= 1"));
        }
        if self.tracker.misses_to_end == 0 {
            return Err(anyhow!("misses_to_end must be >= 1"));
        }
        if self.recording.photo_sample_interval == 0 {
            return Err(anyhow!("photo_sample_interval must be >= 1"));
        }
        if !(self.mask.threshold > 0.0 && self.mask.threshold <= 1.0) {
            return Err(anyhow!(
                "mask threshold must be in (0, 1], got {}",
                self.mask.threshold
            ));
        }
        if self.mask.mode == MaskMode::Bitmap && self.mask.path.is_none() {
            return Err(anyhow!("mask mode 'bitmap' requires a mask path"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
