use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

use audiolens::audio::decode::ChannelMode;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// Final result as pretty JSON
    Json,
    /// Every pipeline event as one JSON object per line
    Events,
}

#[derive(Parser, Debug)]
#[command(name = "audiolens", about = "Tempo, key, tonality and loudness analysis for audio files")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG, AAC)
    pub input: PathBuf,

    /// Config file (defaults to audiolens.toml or the user config directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// How multi-channel audio is reduced to one channel
    #[arg(long, value_enum, default_value_t = ChannelMode::Mix)]
    pub channel: ChannelMode,

    /// Target number of waveform display points
    #[arg(long, default_value_t = 4000)]
    pub waveform_points: usize,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,
}
