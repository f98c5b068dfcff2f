mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use audiolens::audio::decode::{self, ChannelMode};
use audiolens::{spawn_analysis, AnalysisEvent, AnalysisResult};
use cli::{Cli, OutputFormat};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let config_path = cli.config.clone().or_else(config::discover_config);
    let mut options = audiolens::AnalysisOptions::default();
    if let Some(ref path) = config_path {
        if let Some(cfg) = config::load_config(path) {
            log::info!("Loaded config from {}", path.display());
            options = cfg.analysis.to_options();
            // Merge: config values apply only when CLI is at its default
            if cli.format == OutputFormat::Text { cli.format = cfg.output.format; }
            if cli.channel == ChannelMode::Mix { cli.channel = cfg.input.channel; }
            if cli.waveform_points == 4000 { cli.waveform_points = options.waveform_points; }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }
    options.waveform_points = cli.waveform_points;

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    log::info!("audiolens - audio analysis");
    log::info!("Input: {}", cli.input.display());

    log::info!("Decoding audio...");
    let audio = decode::decode_audio(&cli.input, cli.channel)?;

    let handle = spawn_analysis(audio.samples, audio.sample_rate, options);

    let show_progress = !cli.no_progress && cli.format != OutputFormat::Events;
    let pb = if show_progress {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut outcome: Option<Result<AnalysisResult, String>> = None;
    for event in handle.events.iter() {
        if cli.format == OutputFormat::Events {
            println!("{}", serde_json::to_string(&event)?);
        }

        match event {
            AnalysisEvent::Progress { stage, percent } => {
                if let Some(ref pb) = pb {
                    pb.set_position(percent as u64);
                    pb.set_message(stage.label());
                }
            }
            AnalysisEvent::Complete(result) => outcome = Some(Ok(result)),
            AnalysisEvent::Error { message } => outcome = Some(Err(message)),
            _ => {}
        }
    }
    handle.join();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let result = match outcome {
        Some(Ok(result)) => result,
        Some(Err(message)) => anyhow::bail!("Analysis failed: {}", message),
        None => anyhow::bail!("Analysis ended without a result"),
    };

    match cli.format {
        OutputFormat::Text => print_summary(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Events => {}
    }

    Ok(())
}

fn print_summary(result: &AnalysisResult) {
    let stats = &result.stats;
    println!("Duration:          {:.2} s @ {} Hz", stats.duration_seconds, stats.sample_rate);
    println!("RMS / Peak:        {:.3} / {:.3}", stats.rms, stats.peak);
    println!("Dynamic range:     {:.3}", stats.dynamic_range);
    println!("Zero crossings:    {:.0} /s", stats.zero_crossing_rate);
    println!("Spectral centroid: {:.0} Hz", stats.spectral_centroid_hz);

    let tempo = &result.tempo;
    println!(
        "Tempo:             {:.1} BPM (confidence {:.0}%, {}, {} peaks)",
        tempo.bpm,
        tempo.confidence * 100.0,
        tempo.method,
        tempo.peak_count
    );

    let key = &result.key;
    println!(
        "Dominant note:     {} ({:.2} Hz, confidence {:.0}%)",
        key.note_name,
        key.dominant_frequency_hz,
        key.confidence * 100.0
    );

    let tonality = &result.tonality;
    println!(
        "Tonality:          {} {:?} (confidence {:.0}%)",
        tonality.key_note,
        tonality.tonality,
        tonality.confidence * 100.0
    );
    println!("Waveform points:   {}", result.waveform.len());
}
