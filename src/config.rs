use serde::Deserialize;
use std::path::{Path, PathBuf};

use audiolens::audio::decode::ChannelMode;
use audiolens::AnalysisOptions;

use crate::cli::OutputFormat;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_waveform_points")]
    pub waveform_points: usize,
    #[serde(default = "default_waveform_chunk")]
    pub waveform_chunk: usize,
    #[serde(default = "default_stats_sample_cap")]
    pub stats_sample_cap: usize,
    #[serde(default = "default_centroid_frames")]
    pub centroid_frames: usize,
    #[serde(default = "default_key_segment_max")]
    pub key_segment_max: usize,
    #[serde(default = "default_tonality_frame_size")]
    pub tonality_frame_size: usize,
    #[serde(default = "default_tonality_max_frames")]
    pub tonality_max_frames: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub channel: ChannelMode,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            waveform_points: default_waveform_points(),
            waveform_chunk: default_waveform_chunk(),
            stats_sample_cap: default_stats_sample_cap(),
            centroid_frames: default_centroid_frames(),
            key_segment_max: default_key_segment_max(),
            tonality_frame_size: default_tonality_frame_size(),
            tonality_max_frames: default_tonality_max_frames(),
        }
    }
}

impl AnalysisConfig {
    pub fn to_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            waveform_points: self.waveform_points,
            waveform_chunk: self.waveform_chunk,
            stats_sample_cap: self.stats_sample_cap,
            centroid_frames: self.centroid_frames,
            key_segment_max: self.key_segment_max,
            tonality_frame_size: self.tonality_frame_size,
            tonality_max_frames: self.tonality_max_frames,
        }
    }
}

fn default_waveform_points() -> usize { 4000 }
fn default_waveform_chunk() -> usize { 1000 }
fn default_stats_sample_cap() -> usize { 50_000 }
fn default_centroid_frames() -> usize { 10 }
fn default_key_segment_max() -> usize { 65_536 }
fn default_tonality_frame_size() -> usize { 8192 }
fn default_tonality_max_frames() -> usize { 64 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// `audiolens.toml` in the working directory, then the user config locations.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("audiolens.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("audiolens").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("audiolens").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
