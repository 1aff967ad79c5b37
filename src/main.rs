use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use bookvox::cli::{Cli, Commands};
use bookvox::config::{Config, api_key_from_env};
use bookvox::pipeline::{PipelineReport, ProgressReporter};
use bookvox::player::{CpalOutput, list_output_devices};
use bookvox::session::{SessionParams, start_session};
use bookvox::synth::GeminiSynthesizer;
use bookvox::transport::TransportHandle;
use bookvox::{Book, segment, voice};
use clap::{CommandFactory, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(Commands::Play {
            file,
            chapter,
            segment,
            ..
        }) => {
            let config = load_config(&cli)?;
            run_play(&config, file, *chapter, *segment, cli.quiet)?;
        }
        Some(Commands::Render {
            file,
            output,
            chapter,
            segment,
        }) => {
            let config = load_config(&cli)?;
            run_render(&config, file, output.as_deref(), *chapter, *segment, cli.quiet)?;
        }
        Some(Commands::Chapters { file }) => {
            list_chapters(file)?;
        }
        Some(Commands::Voices) => {
            list_voices();
        }
        Some(Commands::Devices) => {
            for device in list_output_devices()? {
                println!("{device}");
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_path);
    let config = cli.apply_overrides(Config::load_or_default(&path)?.with_env_overrides());
    config.validate()?;
    Ok(config)
}

fn run_play(
    config: &Config,
    file: &Path,
    chapter: usize,
    segment: usize,
    quiet: bool,
) -> Result<()> {
    let book = Book::load(file)?;
    let api_key = api_key_from_env()?;

    let reporter: Arc<dyn ProgressReporter> = if quiet {
        Arc::new(SilentReporter)
    } else {
        Arc::new(StatusReporter)
    };
    let synthesizer = GeminiSynthesizer::new(&config.synthesis, api_key)?
        .with_reporter(Arc::clone(&reporter));
    let device = CpalOutput::new(config.playback.device.as_deref());

    let mut params = SessionParams::from_config(config);
    params.start_chapter = chapter.saturating_sub(1);
    params.start_position = segment.max(1);

    let session = start_session(
        &book,
        &params,
        Arc::new(synthesizer),
        reporter,
        Box::new(device),
    )?;

    if !quiet {
        eprintln!(
            "{} {} with {} ({})",
            "playing".green().bold(),
            book.name,
            config.synthesis.voice.bold(),
            config.synthesis.style,
        );
        eprintln!("controls: p=pause/resume  f=+15s  b=-15s  <number>=speed  q=quit");
    }
    spawn_key_listener(session.transport());

    let outcome = session.wait();
    if let Some(failure) = outcome.failure {
        eprintln!(
            "bookvox: stopped after {}/{} segment(s): {}",
            outcome.delivered, outcome.total, failure
        );
        bail!("synthesis failed: {failure}");
    }
    if !quiet {
        eprintln!(
            "{} ({} segment(s))",
            "finished".green().bold(),
            outcome.delivered
        );
    }
    Ok(())
}

/// Map stdin lines to transport commands. Fire-and-forget; once the
/// session ends the sends are silently dropped.
fn spawn_key_listener(transport: TransportHandle) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "" => {}
                "p" => transport.pause_toggle(),
                "f" => transport.seek_forward(),
                "b" => transport.seek_back(),
                "q" | "s" => {
                    transport.stop();
                    break;
                }
                other => {
                    if let Ok(speed) = other.parse::<f64>() {
                        transport.set_speed(speed);
                    } else {
                        eprintln!("bookvox: unknown control '{other}'");
                    }
                }
            }
        }
    });
}

fn run_render(
    config: &Config,
    file: &Path,
    output: Option<&Path>,
    chapter: usize,
    segment: usize,
    quiet: bool,
) -> Result<()> {
    let book = Book::load(file)?;
    let api_key = api_key_from_env()?;

    let output: PathBuf = match output {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(format!("{}.wav", book.name)),
    };

    let reporter: Arc<dyn ProgressReporter> = if quiet {
        Arc::new(SilentReporter)
    } else {
        Arc::new(BarReporter::new())
    };
    let synthesizer = GeminiSynthesizer::new(&config.synthesis, api_key)?
        .with_reporter(Arc::clone(&reporter));

    let mut params = SessionParams::from_config(config);
    params.start_chapter = chapter.saturating_sub(1);
    params.start_position = segment.max(1);

    let summary = bookvox::render::render_to_wav(
        &book,
        &params,
        Arc::new(synthesizer),
        reporter,
        &output,
    )
    .with_context(|| format!("rendering {}", file.display()))?;

    if !quiet {
        eprintln!(
            "{} {} ({} segment(s), {:.1}s)",
            "wrote".green().bold(),
            output.display(),
            summary.segments,
            summary.duration_seconds,
        );
    }
    Ok(())
}

fn list_chapters(file: &Path) -> Result<()> {
    let book = Book::load(file)?;
    for (i, chapter) in book.chapters.iter().enumerate() {
        println!(
            "{:3}  {}  ({} words)",
            i + 1,
            chapter.title.bold(),
            segment::word_count(&chapter.text)
        );
    }
    Ok(())
}

fn list_voices() {
    for (name, label) in voice::VOICES {
        println!("{:12} {}", name.bold(), label);
    }
    println!();
    println!("styles: Storyteller, Narrator, Podcast, or any free-text directive");
}

/// Discards all reports (`--quiet`).
struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _report: &PipelineReport) {}
}

/// One status line per event, for interactive playback.
struct StatusReporter;

impl ProgressReporter for StatusReporter {
    fn report(&self, report: &PipelineReport) {
        match report {
            PipelineReport::Delivered { label, .. } => {
                eprintln!("  {} {label}", "+".green());
            }
            other => eprintln!("bookvox: {other}"),
        }
    }
}

/// indicatif progress bar for offline rendering.
struct BarReporter {
    bar: Mutex<ProgressBar>,
}

impl BarReporter {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self {
            bar: Mutex::new(bar),
        }
    }
}

impl ProgressReporter for BarReporter {
    fn report(&self, report: &PipelineReport) {
        let Ok(bar) = self.bar.lock() else { return };
        match report {
            PipelineReport::Delivered {
                label,
                ordinal,
                total,
            } => {
                if bar.length() != Some(*total as u64) {
                    bar.set_length(*total as u64);
                }
                bar.set_position(ordinal + 1);
                bar.set_message(label.clone());
            }
            PipelineReport::Retrying { .. } | PipelineReport::Failed { .. } => {
                bar.println(format!("bookvox: {report}"));
            }
            PipelineReport::Complete { .. } => bar.finish_with_message("done"),
        }
    }
}
