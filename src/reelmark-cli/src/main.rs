use anyhow::Result;
use clap::{Parser, Subcommand};
use reelmark_core::{init_logging, AnalyticsSink, AppDirs, Config, JsonLinesSink};
use reelmark_plugin::{channel, parse_line, AnalyticsPlugin, HostMessage, PluginError, RunSummary};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "reelmark", version, about = "Playback analytics adapter")]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a recorded host message log through the plugin
    Replay {
        /// JSON-lines file of host messages
        file: PathBuf,
    },
    /// Read host messages from stdin until it closes
    Listen,
    /// Configuration commands
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print the active milestone table
    Milestones,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Load and validate the configuration
    Check,
    /// Print the default configuration as TOML
    Default,
}

#[derive(Debug, Error)]
enum InputError {
    #[error("failed to open host message log {path}: {source}")]
    Open { path: PathBuf, source: io::Error },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ReadStats {
    lines: usize,
    delivered: usize,
    malformed: usize,
}

/// Shared with the reader thread, which is never joined.
#[derive(Debug, Default)]
struct ReadCounters {
    lines: AtomicUsize,
    delivered: AtomicUsize,
    malformed: AtomicUsize,
}

impl ReadCounters {
    fn snapshot(&self) -> ReadStats {
        ReadStats {
            lines: self.lines.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// How a session ends once host input closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    /// A finished log: let an armed fallback flush fire before teardown.
    Recorded,
    /// A live host: closing input means the host went away.
    Live,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Config(ConfigCommand::Default) = cli.command {
        print!("{}", Config::default().to_toml_string()?);
        return Ok(());
    }

    let (dirs, config) = load_config(cli.config.as_deref())?;
    let _logging = init_logging(&config.logging, &config.analytics, &dirs)?;

    match cli.command {
        Command::Replay { file } => {
            let reader = File::open(&file).map_err(|source| InputError::Open {
                path: file.clone(),
                source,
            })?;
            tracing::info!(file = %file.display(), "replaying host messages");
            run_session(
                &config,
                BufReader::new(reader),
                stdout_sink(),
                InputMode::Recorded,
            )?;
        }
        Command::Listen => {
            tracing::info!("listening for host messages on stdin");
            run_session(
                &config,
                BufReader::new(io::stdin()),
                stdout_sink(),
                InputMode::Live,
            )?;
        }
        Command::Config(ConfigCommand::Check) => {
            let source = cli
                .config
                .clone()
                .unwrap_or_else(|| Config::config_path(&dirs));
            println!("Configuration OK ({})", source.display());
            println!("  mechanism: {:?}", config.analytics.mechanism);
            println!("  milestones: {}", config.analytics.milestones.len());
        }
        Command::Config(ConfigCommand::Default) => {}
        Command::Milestones => print_milestones(&config),
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<(AppDirs, Config)> {
    match path {
        Some(path) => {
            let base = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let dirs = AppDirs::rooted_at(base);
            let config = Config::load_from(path)?;
            Ok((dirs, config))
        }
        None => {
            let dirs = AppDirs::discover()?;
            let config = Config::load_or_default(&dirs)?;
            Ok((dirs, config))
        }
    }
}

fn stdout_sink() -> Arc<dyn AnalyticsSink> {
    Arc::new(JsonLinesSink::new(io::stdout()))
}

/// Drive one plugin until the host destroys it or input closes.
///
/// The reader thread is detached: after `Destroy` it may still be blocked
/// on input that never closes, and the session must not wait for it.
fn run_session<R>(
    config: &Config,
    reader: R,
    sink: Arc<dyn AnalyticsSink>,
    mode: InputMode,
) -> Result<RunSummary>
where
    R: BufRead + Send + 'static,
{
    let plugin = AnalyticsPlugin::new(config.analytics.clone(), config.collector, sink);
    let (handle, runner) = channel(plugin, reelmark_plugin::DEFAULT_INBOX_CAPACITY);
    let runner = runner.drain_fallback_on_close(mode == InputMode::Recorded);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;

    let counters = Arc::new(ReadCounters::default());
    let reader_counters = Arc::clone(&counters);
    std::thread::Builder::new()
        .name("host-input".into())
        .spawn(move || {
            forward_lines(reader, &reader_counters, |message| {
                match handle.blocking_send(message) {
                    Ok(()) => true,
                    Err(error) => {
                        tracing::debug!(%error, "plugin stopped accepting messages");
                        false
                    }
                }
            })
        })?;

    let (plugin, summary) = runtime.block_on(runner.run());
    let stats = counters.snapshot();

    let unsent = plugin.classifier().gate().buffered_len();
    if unsent > 0 {
        tracing::warn!(unsent, "session ended with events still waiting for stream metadata");
    }
    tracing::info!(
        lines = stats.lines,
        malformed = stats.malformed,
        messages = summary.messages,
        fallback_flushes = summary.fallback_flushes,
        "session finished"
    );
    Ok(summary)
}

/// Decode host messages line by line, handing each to `deliver` until it
/// returns `false` or input ends.
fn forward_lines<R, F>(reader: R, counters: &ReadCounters, mut deliver: F)
where
    R: BufRead,
    F: FnMut(HostMessage) -> bool,
{
    for (index, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(source) => {
                tracing::warn!(error = %PluginError::Read(source), "stopping host input");
                break;
            }
        };
        counters.lines.fetch_add(1, Ordering::Relaxed);
        match parse_line(index + 1, &line) {
            Ok(Some(message)) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
                if !deliver(message) {
                    break;
                }
            }
            Ok(None) => {}
            Err(error) => {
                counters.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%error, "skipping host message");
            }
        }
    }
}

fn print_milestones(config: &Config) {
    println!("Fraction  Event");
    for milestone in &config.analytics.milestones {
        println!("{:>8.2}  {}", milestone.fraction, milestone.event);
    }
}
