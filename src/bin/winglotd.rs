//! winglotd - Windows scheduled task and update metrics exporter daemon.
//!
//! Scrapes the configured collectors periodically and writes the Prometheus
//! text exposition to stdout or to a file (textfile-collector style).

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use winglot::collector::{
    Collector, ScheduledTaskCollector, UpdateCollector, scheduled_task, update,
};
#[cfg(not(windows))]
use winglot::com::mock::{MockTaskScheduler, MockUpdateAgent};
#[cfg(windows)]
use winglot::com::windows::{Win32TaskScheduler, Win32UpdateAgent};
use winglot::config::Config;
use winglot::exporter::{Exporter, Scrape};
use winglot::util::{format_duration, parse_duration};

/// Windows scheduled task and update metrics exporter.
#[derive(Parser, Debug)]
#[command(name = "winglotd", about = "Windows task and update metrics exporter", version)]
struct Args {
    /// JSON configuration file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Collectors to enable, comma separated (overrides the config file).
    #[arg(long, value_delimiter = ',')]
    collectors: Option<Vec<String>>,

    /// Time between scrapes (e.g. "15s", "1m").
    #[arg(short, long, default_value = "15s", value_parser = parse_interval)]
    interval: Duration,

    /// Scrape once, write the output and exit.
    #[arg(long)]
    once: bool,

    /// Write the exposition to this file instead of stdout.
    /// The file is replaced atomically on every scrape.
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Search the online update catalog ("true") or the local cache ("false").
    #[arg(long, value_name = "BOOL")]
    update_online: Option<bool>,

    /// Time between two pending-update searches (e.g. "6h").
    #[arg(long, value_parser = parse_duration)]
    update_scrape_interval: Option<Duration>,

    /// Regex of task paths to report.
    #[arg(long)]
    task_include: Option<String>,

    /// Regex of task paths to skip.
    #[arg(long)]
    task_exclude: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Parses the scrape interval; zero would turn the loop into a busy loop.
fn parse_interval(input: &str) -> Result<Duration, String> {
    match parse_duration(input) {
        Ok(interval) if interval.is_zero() => Err("interval must be greater than zero".to_string()),
        Ok(interval) => Ok(interval),
        Err(e) => Err(e.to_string()),
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so stdout stays a clean exposition.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["winglotd", "winglot"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the config file (or defaults) and applies command-line overrides.
fn load_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(collectors) = &args.collectors {
        config.collectors = collectors
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }
    if let Some(online) = args.update_online {
        config.update.online = online;
    }
    if let Some(interval) = args.update_scrape_interval {
        config.update.scrape_interval = interval;
    }
    if let Some(include) = &args.task_include {
        config.scheduled_task.include = include.clone();
    }
    if let Some(exclude) = &args.task_exclude {
        config.scheduled_task.exclude = exclude.clone();
    }

    config.validate()?;
    Ok(config)
}

#[cfg(windows)]
fn scheduled_task_collector(config: &Config) -> Box<dyn Collector> {
    Box::new(ScheduledTaskCollector::new(
        config.scheduled_task.clone(),
        Win32TaskScheduler,
    ))
}

#[cfg(not(windows))]
fn scheduled_task_collector(config: &Config) -> Box<dyn Collector> {
    Box::new(ScheduledTaskCollector::new(
        config.scheduled_task.clone(),
        MockTaskScheduler::typical_host(),
    ))
}

#[cfg(windows)]
fn update_collector(config: &Config) -> Box<dyn Collector> {
    Box::new(UpdateCollector::new(config.update.clone(), Win32UpdateAgent))
}

#[cfg(not(windows))]
fn update_collector(config: &Config) -> Box<dyn Collector> {
    Box::new(UpdateCollector::new(
        config.update.clone(),
        MockUpdateAgent::typical_host(),
    ))
}

/// Registers the enabled collectors in config order.
fn build_exporter(config: &Config) -> Exporter {
    let mut exporter = Exporter::new();
    for name in &config.collectors {
        match name.as_str() {
            scheduled_task::NAME => exporter.register(scheduled_task_collector(config)),
            update::NAME => exporter.register(update_collector(config)),
            other => warn!(collector = other, "unknown collector ignored"),
        }
    }
    exporter
}

/// Writes the exposition to stdout, or atomically replaces `path`.
fn write_output(path: Option<&Path>, text: &str) -> std::io::Result<()> {
    match path {
        Some(path) => {
            let tmp = path.with_extension("tmp");
            std::fs::write(&tmp, text)?;
            std::fs::rename(&tmp, path)
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()
        }
    }
}

/// Describes a scrape for logging.
fn describe_scrape(scrape: &Scrape) -> String {
    scrape
        .outcomes
        .iter()
        .map(|o| {
            let status = if o.succeeded() { "ok" } else { "failed" };
            format!("{}={} ({}ms)", o.name, status, o.duration.as_millis())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("winglotd {} starting", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    info!(
        "Config: interval={}, collectors=[{}], output={}",
        format_duration(args.interval),
        config.collectors.join(", "),
        args.output
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string())
    );
    #[cfg(not(windows))]
    warn!("Not running on Windows: collectors use the in-memory mock backends");

    let mut exporter = build_exporter(&config);
    if exporter.build() == 0 {
        error!("No collector could be built");
        std::process::exit(1);
    }

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting scrape loop");
    let mut scrape_count: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let scrape = exporter.scrape();
        scrape_count += 1;
        info!(
            "Scrape #{}: {} samples [{}]",
            scrape_count,
            scrape.samples.len(),
            describe_scrape(&scrape)
        );

        match scrape.render() {
            Ok(text) => {
                if let Err(e) = write_output(args.output.as_deref(), &text) {
                    error!("Failed to write output: {}", e);
                }
            }
            Err(e) => error!("Failed to render metrics: {}", e),
        }

        if args.once {
            break;
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = args.interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
        debug!("Scrape interval elapsed");
    }

    info!("Shutting down...");
    exporter.close();
    info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("winglotd").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let args = parse(&[
            "--collectors",
            "update",
            "--update-online",
            "true",
            "--update-scrape-interval",
            "30m",
            "--task-include",
            "/Microsoft/.+",
        ]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.collectors, vec!["update".to_string()]);
        assert!(config.update.online);
        assert_eq!(config.update.scrape_interval, Duration::from_secs(1800));
        assert_eq!(config.scheduled_task.include, "/Microsoft/.+");
    }

    #[test]
    fn unknown_collector_is_rejected() {
        let args = parse(&["--collectors", "scheduled_task,perfdata"]);
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn interval_accepts_human_durations() {
        assert_eq!(parse(&["-i", "1m"]).interval, Duration::from_secs(60));
        assert!(Args::try_parse_from(["winglotd", "-i", "soon"]).is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Args::try_parse_from(["winglotd", "-i", "0"]).is_err());
        assert!(Args::try_parse_from(["winglotd", "--interval", "0s"]).is_err());
        assert_eq!(parse(&["-i", "250ms"]).interval, Duration::from_millis(250));
    }

    #[test]
    fn update_online_can_be_turned_off() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("winglot.json");
        std::fs::write(&path, r#"{"update": {"online": true}}"#).unwrap();
        let path = path.to_str().unwrap();

        let config = load_config(&parse(&["--config", path])).unwrap();
        assert!(config.update.online);

        let config = load_config(&parse(&["--config", path, "--update-online", "false"])).unwrap();
        assert!(!config.update.online);
    }

    #[test]
    fn build_exporter_follows_config_order() {
        let mut config = Config::default();
        config.collectors = vec![update::NAME.to_string(), scheduled_task::NAME.to_string()];
        let exporter = build_exporter(&config);
        assert_eq!(exporter.names(), vec!["update", "scheduled_task"]);
    }

    #[test]
    fn write_output_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("winglot.prom");
        write_output(Some(&path), "first\n").unwrap();
        write_output(Some(&path), "second\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
        assert!(!path.with_extension("tmp").exists());
    }
}
