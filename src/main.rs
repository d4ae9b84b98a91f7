//! Facebind CLI
//!
//! Usage:
//!   facebind --profiles p.json --frames frames.jsonl   # Replay detector frames
//!   facebind --profiles p.json --frames -              # Read frames from stdin
//!   facebind --profiles p.json --check                 # Compile every rule, report problems
//!   facebind --profiles p.json --serve                 # HTTP API server
//!   facebind ... --json                                # JSON output

use clap::Parser;
use colored::Colorize;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use facebind::core::{
    load_profiles_or_default, load_settings, run_server, save_profiles, BindingEngine,
    CollectingSink, ConsoleDispatcher, ExpressionCompiler, GatedDispatcher, ServerOptions,
    TracingSink,
};
use facebind::types::{FrameReport, FrameStatus, ProfileSet, Settings};
use facebind::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "facebind",
    version = VERSION,
    about = "Facebind - Turn facial expressions into key and mouse actions",
    long_about = "Facebind evaluates per-frame facial blendshape scores against\n\
                  user-defined bindings and fires key/mouse actions on transitions.\n\n\
                  Modes:\n  \
                  --frames FILE  Replay detector output (one JSON frame per line, '-' for stdin)\n  \
                  --check        Compile every rule and report diagnostics\n  \
                  --serve        HTTP API server mode\n\n\
                  Bindings:\n  \
                  simple    - one blendshape crosses a threshold\n  \
                  advanced  - start/stop expressions with debounce"
)]
struct Args {
    /// Profile file (JSON)
    #[arg(short, long, default_value = "profiles.json")]
    profiles: PathBuf,

    /// Settings file (JSON)
    #[arg(long, default_value = "settings.json")]
    settings: PathBuf,

    /// Detector frames to replay, one JSON object per line ('-' for stdin)
    #[arg(short, long)]
    frames: Option<String>,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Compile every rule and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.no_color {
        colored::control::set_override(false);
    }

    let settings = load_settings(&args.settings);
    let profiles = load_profiles_or_default(&args.profiles);

    let code = if args.check {
        run_check(profiles, &args)
    } else if args.serve {
        run_serve(profiles, settings, &args).await
    } else if let Some(ref source) = args.frames {
        run_replay(profiles, settings, source, &args)
    } else {
        eprintln!("Nothing to do: pass --frames, --check or --serve (see --help)");
        2
    };
    std::process::exit(code);
}

/// RUST_LOG wins; otherwise info, or debug with --verbose
fn init_tracing(verbose: bool) {
    let default = if verbose { "facebind=debug" } else { "facebind=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Compile every rule and print what went wrong
fn run_check(mut profiles: ProfileSet, args: &Args) -> i32 {
    let sink = Arc::new(CollectingSink::new());
    let engine = BindingEngine::new(
        Arc::new(ExpressionCompiler::new()),
        Arc::new(GatedDispatcher::new(Arc::new(ConsoleDispatcher), false)),
        sink.clone(),
    );
    engine.normalize(&mut profiles);

    let diagnostics = sink.take();
    if args.json {
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("cannot encode diagnostics: {}", e),
        }
    } else {
        for diagnostic in &diagnostics {
            println!("{}", diagnostic.to_parseable_string());
        }
        let bindings: usize = profiles.profiles.iter().map(|p| p.bindings.len()).sum();
        let summary = format!(
            "{} profile(s), {} binding(s), {} problem(s)",
            profiles.len(),
            bindings,
            diagnostics.iter().filter(|d| d.code.is_failure()).count()
        );
        if diagnostics.iter().any(|d| d.code.is_failure()) {
            println!("{}", summary.red());
        } else {
            println!("{}", summary.green());
        }
    }

    if diagnostics.iter().any(|d| d.code.is_failure()) { 1 } else { 0 }
}

/// Replay detector frames through the selected profile
fn run_replay(mut profiles: ProfileSet, settings: Settings, source: &str, args: &Args) -> i32 {
    let engine = BindingEngine::new(
        Arc::new(ExpressionCompiler::new()),
        Arc::new(GatedDispatcher::new(Arc::new(ConsoleDispatcher), settings.allow_input_simulation)),
        Arc::new(TracingSink),
    );
    engine.normalize(&mut profiles);

    let reader: Box<dyn BufRead> = if source == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        match std::fs::File::open(source) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                error!(path = source, "cannot open frames: {}", e);
                return 1;
            }
        }
    };

    let mut frames = 0usize;
    let mut fired = 0usize;
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("cannot read frames: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let selection = profiles.selection();
        let report = engine.process_line(&mut profiles, selection, &line);
        frames += 1;
        fired += report.fired().count();
        print_report(&report, args);
    }

    info!(frames, fired, "replay finished");

    if settings.auto_save_profiles {
        if let Err(e) = save_profiles(&profiles, &args.profiles) {
            error!("cannot save profiles: {}", e);
            return 1;
        }
    }
    0
}

fn print_report(report: &FrameReport, args: &Args) {
    if args.json {
        match serde_json::to_string(report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("cannot encode report: {}", e),
        }
        return;
    }

    if report.status != FrameStatus::Evaluated {
        return;
    }
    for event in &report.transitions {
        if args.no_color {
            println!("{}", event.to_parseable_string());
        } else {
            println!("{}", event.to_terminal_string());
        }
    }
}

async fn run_serve(profiles: ProfileSet, settings: Settings, args: &Args) -> i32 {
    println!("{}", format!("Facebind v{} - API Server", VERSION).bold());
    println!();

    let options = ServerOptions {
        profiles,
        settings,
        profiles_path: Some(args.profiles.clone()),
    };
    match run_server(&args.addr, options).await {
        Ok(()) => 0,
        Err(e) => {
            error!("server error: {}", e);
            1
        }
    }
}
