// Main CLI entry point for proxyscan
// Plays the host proxy: feeds captured exchanges through the pipeline and reports findings

use clap::{Arg, ArgAction, Command};
use proxyscan::config::ScanConfig;
use proxyscan::finding_log::FindingLog;
use proxyscan::models::ExchangeSource;
use proxyscan::parsers::HarSource;
use proxyscan::pipeline::Pipeline;
use proxyscan::reporting::{export_csv, export_markdown, format_row};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("proxyscan={}", default_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(matches: &clap::ArgMatches) -> Result<ScanConfig, proxyscan::ScanError> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ScanConfig::load(Path::new(path))?,
        None => ScanConfig::default(),
    };

    if matches.get_flag("no_idempotency") {
        config.idempotency.enabled = false;
    }
    if matches.get_flag("no_pii") {
        config.pii_enabled = false;
    }
    if matches.get_flag("strict_url_join") {
        config.idempotency.strict_url_join = true;
    }
    if let Some(max) = matches.get_one::<usize>("max_in_flight") {
        config.idempotency.max_in_flight = Some(*max);
    }
    if let Some(secs) = matches.get_one::<u64>("replay_timeout") {
        config.idempotency.replay_timeout_secs = *secs;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let matches = Command::new("proxyscan")
        .version(clap::crate_version!())
        .author("Jake Abendroth")
        .about("Passive analysis of captured HTTP traffic: POST-to-GET downgrades and PII leaks")
        .after_help("EXAMPLES:\n  proxyscan --input capture.har\n  proxyscan -i captures/ --strict-url-join --max-in-flight 8 --csv-report\n  RUST_LOG=proxyscan=debug proxyscan -i capture.har --no-pii")
        .arg(Arg::new("input")
            .short('i')
            .long("input")
            .required(true)
            .num_args(1)
            .help("HAR file, or directory searched recursively for .har files"))
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .num_args(1)
            .help("JSON configuration file"))
        .arg(Arg::new("output_dir")
            .short('o')
            .long("output-dir")
            .num_args(1)
            .default_value(".")
            .help("Directory for exported reports"))
        .arg(Arg::new("no_idempotency")
            .long("no-idempotency")
            .action(ArgAction::SetTrue)
            .help("Disable the POST-to-GET replay check"))
        .arg(Arg::new("no_pii")
            .long("no-pii")
            .action(ArgAction::SetTrue)
            .help("Disable response body pattern scanning"))
        .arg(Arg::new("strict_url_join")
            .long("strict-url-join")
            .action(ArgAction::SetTrue)
            .help("Join the POST body with '&' when the URL already has a query string"))
        .arg(Arg::new("max_in_flight")
            .long("max-in-flight")
            .num_args(1)
            .value_parser(clap::value_parser!(usize))
            .help("Cap on concurrent replay requests (default: unbounded)"))
        .arg(Arg::new("replay_timeout")
            .long("replay-timeout")
            .num_args(1)
            .value_parser(clap::value_parser!(u64))
            .help("Replay request timeout in seconds (default: 10)"))
        .arg(Arg::new("csv_report")
            .long("csv-report")
            .action(ArgAction::SetTrue)
            .help("Output CSV report (default: on)"))
        .arg(Arg::new("markdown_report")
            .long("markdown-report")
            .action(ArgAction::SetTrue)
            .help("Output Markdown report (default: on)"))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::SetTrue)
            .help("Debug logging"))
        .get_matches();

    init_tracing(matches.get_flag("verbose"));

    let input = matches.get_one::<String>("input").expect("input is required");
    let output_dir = matches.get_one::<String>("output_dir").map(PathBuf::from).unwrap_or_default();
    let csv_report = matches.get_flag("csv_report") || !matches.get_flag("markdown_report");
    let markdown_report = matches.get_flag("markdown_report") || !matches.get_flag("csv_report");

    let config = build_config(&matches).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    if !Path::new(input).exists() {
        eprintln!("Unsupported input: {} does not exist. Use a .har file or a directory of them.", input);
        std::process::exit(2);
    }

    let exchanges = HarSource.load(input).unwrap_or_else(|e| {
        eprintln!("Failed to load captures: {}", e);
        std::process::exit(1);
    });
    println!("Loaded {} exchanges.", exchanges.len());

    let log = Arc::new(FindingLog::new());
    let pipeline = Pipeline::from_config(&config, Arc::clone(&log), Handle::current()).unwrap_or_else(|e| {
        eprintln!("Failed to build pipeline: {}", e);
        std::process::exit(1);
    });
    info!("Analyzers: {}", pipeline.analyzer_names().join(", "));

    // Console viewer: print each row as it lands
    let viewer = Arc::downgrade(&log);
    log.subscribe(move |rows| {
        let Some(log) = viewer.upgrade() else { return };
        for index in rows {
            if let Ok(finding) = log.get(index) {
                println!("{}", format_row(index, &finding));
            }
        }
    });

    // Dispatch is synchronous; keep it off the runtime's worker threads
    let pipeline = Arc::new(pipeline);
    let dispatcher = Arc::clone(&pipeline);
    let dispatched = tokio::task::spawn_blocking(move || {
        for exchange in &exchanges {
            dispatcher.dispatch(exchange);
        }
    })
    .await;
    if let Err(e) = dispatched {
        eprintln!("Dispatch aborted: {}", e);
        std::process::exit(1);
    }

    let replays = pipeline.replays();
    if replays.pending() > 0 {
        info!("Waiting for {} replay(s) to finish", replays.pending());
    }
    replays.wait_idle().await;

    let findings = log.snapshot();
    println!("{} finding(s).", findings.len());

    if csv_report {
        match export_csv(&findings, &output_dir) {
            Ok(path) => println!("CSV report: {}", path.display()),
            Err(e) => eprintln!("Failed to write CSV report: {}", e),
        }
    }
    if markdown_report {
        match export_markdown(&findings, &output_dir) {
            Ok(path) => println!("Markdown report: {}", path.display()),
            Err(e) => eprintln!("Failed to write Markdown report: {}", e),
        }
    }
}
