use clap::Parser;
use iter8::config::{load_config, Iter8Config};
use iter8::{bounded_take, partition, tap, BoundError, IterExt, Monitor, MonitorError};
use nix::sys::signal::Signal;
use regex::Regex;
use std::error::Error;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Stream lines through iter8's helpers. Send the status signal (Ctrl-T on
/// BSD/macOS) while it runs to see how far it got.
#[derive(Parser, Debug)]
#[command(name = "iter8", version, about)]
pub struct Cli {
    /// Input file (default: stdin)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Config file path
    #[arg(short, long, default_value = "iter8.toml")]
    config: PathBuf,

    /// First index (overrides config)
    #[arg(long)]
    start: Option<usize>,

    /// Status signal, e.g. SIGUSR1 (overrides config; default SIGINFO, or
    /// SIGUSR1 where SIGINFO does not exist)
    #[arg(long)]
    signal: Option<String>,

    /// Stop after N lines (overrides config)
    #[arg(long, allow_hyphen_values = true)]
    take: Option<i64>,

    /// Log a progress line every K lines read (overrides config)
    #[arg(long)]
    every: Option<u64>,

    /// Partition lines: matches to stdout, the rest to stderr
    #[arg(long, value_name = "REGEX")]
    split: Option<String>,

    /// Don't install the status signal handler
    #[arg(long)]
    no_monitor: bool,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (handler install/restore, usage hint)
    #[arg(short, long)]
    verbose: bool,

    /// Only warnings and errors (status replies still shown)
    #[arg(short, long)]
    quiet: bool,
}

/// CLI overrides merged into the config file.
#[derive(Debug)]
struct Settings {
    input: Option<PathBuf>,
    start: usize,
    signal: Option<Signal>,
    take: Option<usize>,
    every: u64,
    split: Option<Regex>,
}

fn resolve(cli: &Cli, mut cfg: Iter8Config) -> Result<Settings, Box<dyn Error>> {
    if let Some(signal) = &cli.signal {
        cfg.monitor.signal = Some(signal.clone());
    }

    let signal = if cli.no_monitor || !cfg.monitor.enabled {
        None
    } else {
        match cfg.monitor.resolve_signal() {
            Ok(signal) => Some(signal),
            Err(MonitorError::Unsupported { signal }) if cfg.monitor.signal.is_none() => {
                tracing::warn!(
                    missing = signal,
                    fallback = Signal::SIGUSR1.as_str(),
                    "no status signal on this platform, listening on SIGUSR1"
                );
                Some(Signal::SIGUSR1)
            }
            Err(e) => return Err(e.into()),
        }
    };

    let take = match cli.take.or(cfg.take.limit) {
        Some(n) => Some(usize::try_from(n).map_err(|_| BoundError::Negative { n })?),
        None => None,
    };

    let split = match &cli.split {
        Some(pattern) => Some(Regex::new(pattern)?),
        None => None,
    };

    Ok(Settings {
        input: cli.input.clone(),
        start: cli.start.unwrap_or(cfg.monitor.start),
        signal,
        take,
        every: cli.every.unwrap_or(cfg.tap.every),
        split,
    })
}

fn open_input(settings: &Settings) -> io::Result<Box<dyn BufRead>> {
    match &settings.input {
        Some(path) => Ok(Box::new(BufReader::new(std::fs::File::open(path)?))),
        None => Ok(Box::new(io::stdin().lock())),
    }
}

fn run(
    settings: &Settings,
    input: Box<dyn BufRead>,
    out: &mut dyn Write,
    rest: &mut dyn Write,
) -> Result<(), Box<dyn Error>> {
    let every = settings.every;
    let lines = tap(input.lines(), move |index, _| {
        let read = index as u64 + 1;
        if every > 0 && read % every == 0 {
            tracing::info!(lines = read, "lines read");
        }
    });
    let lines: Box<dyn Iterator<Item = io::Result<String>>> = match settings.take {
        Some(n) => Box::new(bounded_take(lines, n)),
        None => Box::new(lines),
    };

    let pairs: Box<dyn Iterator<Item = (usize, io::Result<String>)>> = match settings.signal {
        Some(signal) => Box::new(
            lines.monitored_with(Monitor::new().signal(signal).start(settings.start))?,
        ),
        None => {
            let start = settings.start;
            Box::new(lines.enumerate().map(move |(i, line)| (i + start, line)))
        }
    };

    match &settings.split {
        Some(re) => {
            let numbered = pairs
                .map(|(i, line)| line.map(|l| (i, l)))
                .collect::<io::Result<Vec<_>>>()?;
            let (matching, others) = partition(numbered, |(_, line)| re.is_match(line));
            tracing::info!(
                matched = matching.len(),
                unmatched = others.len(),
                "split complete"
            );
            for (_, line) in &matching {
                writeln!(out, "{line}")?;
            }
            for (_, line) in &others {
                writeln!(rest, "{line}")?;
            }
        }
        None => {
            for (index, line) in pairs {
                writeln!(out, "{index}\t{}", line?)?;
            }
        }
    }

    out.flush()?;
    rest.flush()?;
    Ok(())
}

fn is_broken_pipe(e: &(dyn Error + 'static)) -> bool {
    e.downcast_ref::<io::Error>()
        .is_some_and(|io| io.kind() == io::ErrorKind::BrokenPipe)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let status_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "iter8={level},{}={status_level}",
                    iter8::sink::SIGINFO_TARGET
                ))
            }),
        )
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let result = load_config(&cli.config)
        .map_err(Box::<dyn Error>::from)
        .and_then(|cfg| resolve(&cli, cfg));
    let settings = match result {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(?settings, "resolved settings");

    if cli.dry_run {
        println!("iter8 v{}", env!("CARGO_PKG_VERSION"));
        println!("Config file: {}", cli.config.display());
        println!("{settings:#?}");
        return ExitCode::SUCCESS;
    }

    let outcome = open_input(&settings)
        .map_err(Box::<dyn Error>::from)
        .and_then(|input| {
            let mut out = io::BufWriter::new(io::stdout().lock());
            let mut rest = io::stderr().lock();
            run(&settings, input, &mut out, &mut rest)
        });

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_broken_pipe(e.as_ref()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
