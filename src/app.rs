use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::model::FuzzResult;
use crate::payloader::CaseMode;
use crate::recursion::DirectoryHeuristic;
use crate::runner::{FuzzEvent, Options, Runner, ScanResult, TimeThreshold, WordlistBinding};
use crate::utils;

fn print_banner() {
    const BANNER: &str = r#"
   ____                        _ ____
  / __/_ ________ __ _  (_) / /
 / _// // /_ /_ //  ' \/ / / /
/_/  \_,_//__/__/_/_/_/_/_/_/
    "#;
    print!("{}", BANNER);
    println!(
        "       v{} - concurrent web fuzzer",
        env!("CARGO_PKG_VERSION")
    );
    println!();
}

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[derive(Debug)]
struct RunConfig {
    options: Options,
    no_color: bool,
    show_misses: bool,
    json: bool,
}

fn seconds(name: &str, value: f64) -> Result<Duration, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid {name} '{value}', expected a non-negative number"));
    }
    Ok(Duration::from_secs_f64(value))
}

// command line over config file over built-in defaults
fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;
    let defaults = Options::default();
    let cfg_json = cfg.json.unwrap_or(false);

    let no_color = if args.color {
        false
    } else {
        args.no_color || cfg.no_color.unwrap_or(false)
    };

    let url = args
        .url
        .or(cfg.url)
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| "a target url is required (-u)".to_string())?;

    let methods = match args.methods.or(cfg.methods) {
        Some(raw) => utils::parse_http_methods_csv(&raw)
            .map_err(|e| format!("invalid methods '{raw}': {e}"))?,
        None => defaults.methods.clone(),
    };

    let headers = if args.header.is_empty() {
        cfg.headers.unwrap_or_default()
    } else {
        args.header
    };

    let proxies = match args.proxies {
        Some(raw) => utils::parse_csv_list(&raw),
        None => cfg.proxies.unwrap_or_default(),
    };

    let timeout = args
        .timeout
        .or(cfg.timeout)
        .map(|t| seconds("timeout", t))
        .transpose()?;
    let delay = args
        .delay
        .or(cfg.delay)
        .map(|d| seconds("delay", d))
        .transpose()?
        .unwrap_or(defaults.delay);

    let wordlist_specs = if args.wordlist.is_empty() {
        cfg.wordlists.unwrap_or_default()
    } else {
        args.wordlist
    };
    if wordlist_specs.is_empty() {
        return Err("at least one wordlist is required (-w)".to_string());
    }
    let wordlists = wordlist_specs
        .iter()
        .map(|spec| WordlistBinding::parse(spec).map_err(|e| format!("invalid wordlist '{spec}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;

    let case = match args.case.or(cfg.case) {
        Some(raw) => CaseMode::parse(&raw).map_err(|e| e.to_string())?,
        None => CaseMode::Keep,
    };
    let match_time = args
        .match_time
        .or(cfg.match_time)
        .map(|raw| TimeThreshold::parse(&raw))
        .transpose()
        .map_err(|e| e.to_string())?;
    let recursion_heuristic = match args.recursion_heuristic.or(cfg.recursion_heuristic) {
        Some(raw) => DirectoryHeuristic::parse(&raw).map_err(|e| e.to_string())?,
        None => defaults.recursion_heuristic,
    };

    let threads = args.threads.or(cfg.threads).unwrap_or(defaults.threads);
    if threads == 0 {
        return Err("invalid threads, expected positive integer".to_string());
    }

    let options = Options {
        url,
        methods,
        data: args.data.or(cfg.data).unwrap_or_default(),
        headers,
        cookie: args.cookie.or(cfg.cookie),
        proxy: args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty()),
        proxies,
        timeout,
        follow_redirects: args.follow_redirects || cfg.follow_redirects.unwrap_or(false),
        wordlists,
        prefixes: args
            .prefix
            .or(cfg.prefix)
            .map(|raw| utils::parse_csv_list(&raw))
            .unwrap_or_default(),
        suffixes: args
            .suffix
            .or(cfg.suffix)
            .map(|raw| utils::parse_csv_list(&raw))
            .unwrap_or_default(),
        case,
        encoders: args.encoders.or(cfg.encoders),
        encode_only: args.encode_only.or(cfg.encode_only),
        match_status: args.match_status.or(cfg.match_status),
        match_length: args.match_length.or(cfg.match_length),
        match_time,
        calibrate: args.calibrate || cfg.calibrate.unwrap_or(false),
        threads,
        delay,
        blacklist_status: args.blacklist_status.or(cfg.blacklist_status),
        recursive: args.recursive || cfg.recursive.unwrap_or(false),
        max_rlevel: args.max_rlevel.or(cfg.max_rlevel).unwrap_or(defaults.max_rlevel),
        recursion_heuristic,
        scanners: if args.scanner.is_empty() {
            cfg.scanners.unwrap_or_default()
        } else {
            args.scanner
        },
        ignore_errors: args.ignore_errors || cfg.ignore_errors.unwrap_or(false),
        skip_connection_check: args.skip_connection_check
            || cfg.skip_connection_check.unwrap_or(false),
    };

    Ok(RunConfig {
        options,
        no_color,
        show_misses: args.show_misses,
        json: args.json || cfg_json,
    })
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fuzzmill=warn")),
        1 => EnvFilter::new("fuzzmill=info"),
        2 => EnvFilter::new("fuzzmill=debug"),
        _ => EnvFilter::new("fuzzmill=trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn colored_status(status: u16) -> ColoredString {
    let text = status.to_string();
    match status {
        200..=299 => text.bold().green(),
        300..=399 => text.bold().blue(),
        400..=499 => text.bold().yellow(),
        _ => text.bold().red(),
    }
}

fn format_result(result: &FuzzResult) -> String {
    let mut line = format!(
        "{}{}{} {:>8}B {:>6}W {:>6}L {:>7.3}s :: {} :: {}",
        "[".bold().white(),
        colored_status(result.status),
        "]".bold().white(),
        result.body_size,
        result.word_count,
        result.line_count,
        result.rtt,
        result.url.bold().blue(),
        result.payload.to_string().white(),
    );
    if let Some(ip) = result.ip {
        line.push_str(&format!(" :: {ip}"));
    }
    if let Some(location) = result.location.as_deref() {
        line.push_str(&format!(" -> {}", location.cyan()));
    }
    for (scanner, findings) in result.scanner_results.iter() {
        line.push_str(&format!(
            "\n      {} {}",
            format!("{scanner}:").bold().green(),
            findings.join(", ")
        ));
    }
    line
}

fn build_progress_bar() -> Result<ProgressBar, String> {
    let pb = ProgressBar::new(0);
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: [{pos}/{len}] :: {per_sec} :: Duration: [{elapsed_precise}] :: {msg}",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?
        .progress_chars(r#"#>-"#),
    );
    Ok(pb)
}

// render runner events until the runner drops its sender
async fn print_events(
    mut rx: mpsc::UnboundedReceiver<FuzzEvent>,
    pb: ProgressBar,
    show_misses: bool,
    json: bool,
) {
    while let Some(event) = rx.recv().await {
        match event {
            FuzzEvent::JobStarted {
                method,
                source,
                units,
            } => {
                pb.inc_length(units as u64);
                pb.set_message(format!("{method} {source}"));
            }
            FuzzEvent::JobFinished { .. } => {}
            FuzzEvent::Hit(result) if json => {
                pb.inc(1);
                match serde_json::to_string(&result) {
                    Ok(line) => pb.suspend(|| println!("{line}")),
                    Err(e) => warn!("failed to serialize result: {e}"),
                }
            }
            FuzzEvent::Hit(result) => {
                pb.inc(1);
                pb.println(format_result(&result));
            }
            FuzzEvent::Miss(result) => {
                pb.inc(1);
                if show_misses && !json {
                    pb.println(format!("{}", format_result(&result).dimmed()));
                }
            }
            FuzzEvent::Error { payload, message, .. } => {
                pb.inc(1);
                pb.println(format!(
                    "{} {} :: {}",
                    "error ::".bold().red(),
                    payload,
                    message
                ));
            }
        }
    }
}

fn print_summary(result: &ScanResult) {
    println!();
    format_kv_line("Hits", &result.hits.len().to_string());
    format_kv_line("Requests", &result.requests.to_string());
    format_kv_line("Errors", &result.errors.to_string());
    format_kv_line("Jobs", &result.jobs.to_string());
    println!(
        ":: Completed :: scan took {:.1}s ::",
        result.elapsed.as_secs_f64()
    );
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();

    let opts = &run.options;
    format_kv_line("URL", &opts.url);
    format_kv_line("Methods", &opts.methods.join(","));
    format_kv_line(
        "Wordlists",
        &opts
            .wordlists
            .iter()
            .map(|w| format!("{} -> {}", w.source.name(), w.fuzz_mark))
            .collect::<Vec<_>>()
            .join(", "),
    );
    format_kv_line("Threads", &opts.threads.to_string());
    format_kv_line(
        "Recursion",
        &format!(
            "enabled={} max-rlevel={}",
            format_bool(opts.recursive),
            opts.max_rlevel
        ),
    );
    if let Some(blacklist) = opts.blacklist_status.as_deref() {
        format_kv_line("Blacklist", blacklist);
    }
    if !opts.scanners.is_empty() {
        format_kv_line("Scanners", &opts.scanners.join(","));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let runner = Runner::new(run.options.clone())
        .map_err(|e| e.to_string())?
        .with_events(tx);
    format_kv_line("Fuzzing", runner.fuzzing_type().label());
    println!();

    let pb = build_progress_bar()?;
    let printer = tokio::spawn(print_events(rx, pb.clone(), run.show_misses, run.json));

    let outcome = runner.run().await;
    drop(runner);
    if let Err(e) = printer.await {
        warn!("output task failed: {e}");
    }
    pb.finish_and_clear();

    let result = outcome.map_err(|e| e.to_string())?;
    print_summary(&result);
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };
    init_logging(args.verbose);

    let cfg = match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => {
                if let Err(e) = config::ensure_default_config_file(&path) {
                    warn!("{e}");
                }
                config::load_config(&path, true)?
            }
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}
