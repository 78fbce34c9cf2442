//! zsh-kernel - stdio driver
//!
//! Reads one JSON request per line from stdin and writes JSON replies and
//! output events to stdout, one per line. SIGINT received by the driver
//! interrupts the running execution.

use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use zsh_kernel::{
    handle_startup_error, validate_system_requirements, CompletenessStatus, CompletionReply,
    Config, ConfigLoader, ExecutionEngine, ExecutionRequest, ExecutionResult, InspectionReply,
    KernelInfo, OutputEvent,
};

/// Command line options
#[derive(Debug, Default)]
struct KernelArgs {
    /// Configuration file path
    config_path: Option<PathBuf>,
    /// Enable debug logging
    debug: bool,
    /// Print kernel info and exit
    info: bool,
    /// Save the effective configuration and exit
    write_config: bool,
}

impl KernelArgs {
    /// Parse command line arguments
    fn parse() -> anyhow::Result<Self> {
        let args: Vec<String> = env::args().collect();
        let mut kernel_args = KernelArgs::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    let path = args
                        .get(i + 1)
                        .ok_or_else(|| anyhow!("--config needs a path"))?;
                    kernel_args.config_path = Some(PathBuf::from(path));
                    i += 1;
                }
                "--debug" | "-d" => {
                    kernel_args.debug = true;
                }
                "--info" => {
                    kernel_args.info = true;
                }
                "--write-config" => {
                    kernel_args.write_config = true;
                }
                "--help" | "-h" => {
                    print_help();
                    process::exit(0);
                }
                "--version" | "-v" => {
                    println!("{} v{}", zsh_kernel::NAME, zsh_kernel::VERSION);
                    process::exit(0);
                }
                arg => {
                    return Err(anyhow!("Unknown option: {}", arg));
                }
            }
            i += 1;
        }

        Ok(kernel_args)
    }
}

/// Print help information
fn print_help() {
    println!("zsh-kernel - drive an interactive Z shell over stdin/stdout");
    println!();
    println!("USAGE:");
    println!("    zsh-kernel [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <PATH>    Path to configuration file");
    println!("    -d, --debug            Enable debug logging");
    println!("        --info             Print kernel info as JSON and exit");
    println!("        --write-config     Save the effective configuration and exit");
    println!("    -h, --help             Print this help message");
    println!("    -v, --version          Print version information");
    println!();
    println!("REQUESTS (one JSON object per line):");
    println!("    {{\"type\": \"execute\", \"code\": \"echo 1\"}}");
    println!("    {{\"type\": \"is_complete\", \"code\": \"if true\"}}");
    println!("    {{\"type\": \"inspect\", \"code\": \"ls -l\", \"cursor_pos\": 1}}");
    println!("    {{\"type\": \"complete\", \"code\": \"git ch\", \"cursor_pos\": 6}}");
    println!("    {{\"type\": \"kernel_info\"}}");
    println!("    {{\"type\": \"shutdown\"}}");
    println!();
    println!("ENVIRONMENT:");
    println!("    ZSH_KERNEL_CONFIG      Path to configuration file");
    println!("    ZSH_KERNEL_DEBUG       Enable debug logging (1 or true)");
    println!("    RUST_LOG               Set logging level (error, warn, info, debug, trace)");
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Request {
    Execute(ExecutionRequest),
    IsComplete { code: String },
    Inspect { code: String, cursor_pos: usize },
    Complete { code: String, cursor_pos: usize },
    KernelInfo,
    Shutdown,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Reply {
    Stream(OutputEvent),
    ExecuteReply {
        execution_count: u64,
        #[serde(flatten)]
        result: ExecutionResult,
    },
    IsCompleteReply {
        status: CompletenessStatus,
    },
    InspectReply(InspectionReply),
    CompleteReply(CompletionReply),
    KernelInfoReply(KernelInfo),
    ShutdownReply,
    Error {
        message: String,
    },
}

fn write_reply(reply: &Reply) -> anyhow::Result<()> {
    let line = serde_json::to_string(reply)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()?;
    Ok(())
}

fn init_logging(args: &KernelArgs, config: &Config) -> anyhow::Result<()> {
    let debug = args.debug
        || env::var("ZSH_KERNEL_DEBUG")
            .map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"));
    let log_level = if debug { "debug" } else { config.log.level.as_str() };
    let env_filter = env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from(env_filter))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    match &config.log.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

/// Configuration plus a problem to report once logging is up
struct LoadedConfig {
    config: Config,
    loader: ConfigLoader,
    fallback_reason: Option<String>,
}

/// Load configuration from file or default locations
///
/// An explicit file must load; a broken file in the default locations is
/// replaced by defaults.
fn load_configuration(args: &KernelArgs) -> anyhow::Result<LoadedConfig> {
    let config_path = args
        .config_path
        .clone()
        .or_else(|| env::var("ZSH_KERNEL_CONFIG").ok().map(PathBuf::from));

    let mut loader = ConfigLoader::new();
    if let Some(path) = &config_path {
        let config = ConfigLoader::load_from_file(path)
            .map_err(|e| anyhow!(handle_startup_error(&e)))?;
        loader.set_current_path(path.clone());
        return Ok(LoadedConfig {
            config,
            loader,
            fallback_reason: None,
        });
    }

    let (config, fallback_reason) = with_fallback(ConfigLoader::load());
    Ok(LoadedConfig {
        config,
        loader,
        fallback_reason,
    })
}

/// Defaults in place of a configuration that failed to load, with the reason
fn with_fallback(loaded: zsh_kernel::Result<Config>) -> (Config, Option<String>) {
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(handle_startup_error(&e))),
    }
}

/// Ask the shell for its version to fill in the language info
async fn probe_kernel_info(engine: &mut ExecutionEngine) -> KernelInfo {
    let mut events: Vec<OutputEvent> = Vec::new();
    let result = engine
        .execute(&ExecutionRequest::new("print -r -- $ZSH_VERSION"), &mut events)
        .await;
    if !result.is_ok() {
        warn!("Cannot determine zsh version: {:?}", result.error);
        return KernelInfo::new();
    }
    let version: String = events.iter().map(|event| event.text.as_str()).collect();
    KernelInfo::new().with_language_version(version)
}

async fn run_execute(
    engine: &mut ExecutionEngine,
    request: ExecutionRequest,
    execution_count: &mut u64,
) -> anyhow::Result<()> {
    if !request.silent && request.store_history {
        *execution_count += 1;
    }

    let (mut events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel::<OutputEvent>();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if let Err(e) = write_reply(&Reply::Stream(event)) {
                error!("Cannot write output event: {}", e);
            }
        }
    });

    let result = engine.execute(&request, &mut events_tx).await;
    drop(events_tx);
    forwarder.await.context("output forwarder failed")?;

    if let Some(record) = &result.error {
        info!("Execution ended with {}: {}", record.kind, record.message);
    }
    write_reply(&Reply::ExecuteReply {
        execution_count: *execution_count,
        result,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = KernelArgs::parse().unwrap_or_else(|e| {
        eprintln!("{}", e);
        print_help();
        process::exit(2);
    });

    if args.info {
        println!("{}", serde_json::to_string_pretty(&KernelInfo::new())?);
        return Ok(());
    }

    let LoadedConfig {
        config,
        loader,
        fallback_reason,
    } = load_configuration(&args)?;

    if args.write_config {
        let path = loader.save(&config).map_err(|e| anyhow!(handle_startup_error(&e)))?;
        println!("{}", path.display());
        return Ok(());
    }

    init_logging(&args, &config)?;
    info!("Starting {} v{}", zsh_kernel::NAME, zsh_kernel::VERSION);
    if let Some(reason) = fallback_reason {
        warn!("{}. Using defaults", reason);
    }
    validate_system_requirements();

    let mut engine = ExecutionEngine::start(config)
        .await
        .map_err(|e| anyhow!(handle_startup_error(&e)))?;
    let kernel_info = probe_kernel_info(&mut engine).await;

    let interrupt = engine.interrupt_handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("SIGINT received, interrupting execution");
            interrupt.request();
        }
    });

    let mut execution_count: u64 = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Malformed request: {}", e);
                write_reply(&Reply::Error {
                    message: format!("malformed request: {}", e),
                })?;
                continue;
            }
        };
        debug!("request: {:?}", request);

        match request {
            Request::Execute(request) => {
                run_execute(&mut engine, request, &mut execution_count).await?;
            }
            Request::IsComplete { code } => {
                let status = engine.is_complete(&code).await;
                write_reply(&Reply::IsCompleteReply { status })?;
            }
            Request::Inspect { code, cursor_pos } => {
                let reply = engine.inspect(&code, cursor_pos).await;
                write_reply(&Reply::InspectReply(reply))?;
            }
            Request::Complete { code, cursor_pos } => {
                let reply = engine.complete(&code, cursor_pos).await;
                write_reply(&Reply::CompleteReply(reply))?;
            }
            Request::KernelInfo => {
                write_reply(&Reply::KernelInfoReply(kernel_info.clone()))?;
            }
            Request::Shutdown => {
                engine.shutdown();
                write_reply(&Reply::ShutdownReply)?;
                break;
            }
        }
    }

    let uptime = chrono::Utc::now() - engine.session().started_at();
    engine.shutdown();
    info!(
        "{} shutdown complete after {}s",
        zsh_kernel::NAME,
        uptime.num_seconds()
    );
    Ok(())
}
