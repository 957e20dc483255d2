use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use client::{HttpBackend, ReconnectPolicy, map_slide, subscribe, ws_url};
use compagnon_core::model::{ModuleId, SessionCode};
use compagnon_core::presentation::{ClientNavigationView, NavigationError, Role};
use services::{ControllerConfig, ControllerError, PresentationController, ViewSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidSession { raw: String },
    InvalidModule { raw: String },
    InvalidPollInterval { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidSession { raw } => write!(f, "invalid --session value: {raw}"),
            ArgsError::InvalidModule { raw } => write!(f, "invalid --module value: {raw}"),
            ArgsError::InvalidPollInterval { raw } => {
                write!(f, "invalid --poll-interval-ms value: {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!(
        "  cargo run -p client --bin viewer -- --session <code> [--server <url>] [--module <id>] [--facilitator] [--poll-interval-ms <ms>]"
    );
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --server {DEFAULT_SERVER}");
    eprintln!("  --module first module of the session");
    eprintln!("  --poll-interval-ms 3000");
    eprintln!();
    eprintln!("Commands on stdin: n (next), p (previous), c (mark completed), q (quit)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COMPAGNON_SERVER_URL, COMPAGNON_POLL_INTERVAL_MS, RUST_LOG");
}

struct Args {
    server: String,
    session: SessionCode,
    module: Option<ModuleId>,
    role: Role,
    poll_interval: Duration,
}

fn parse_poll_interval(raw: &str) -> Result<Duration, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .ok_or_else(|| ArgsError::InvalidPollInterval {
            raw: raw.to_string(),
        })
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut server =
            std::env::var("COMPAGNON_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER.to_string());
        let mut poll_interval = match std::env::var("COMPAGNON_POLL_INTERVAL_MS") {
            Ok(raw) => parse_poll_interval(&raw)?,
            Err(_) => services::presentation::DEFAULT_POLL_INTERVAL,
        };
        let mut session = None;
        let mut module = None;
        let mut role = Role::Participant;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--server" => server = require_value(args, "--server")?,
                "--session" => {
                    let value = require_value(args, "--session")?;
                    session = Some(
                        SessionCode::new(&value)
                            .map_err(|_| ArgsError::InvalidSession { raw: value.clone() })?,
                    );
                }
                "--module" => {
                    let value = require_value(args, "--module")?;
                    module = Some(
                        value
                            .parse::<ModuleId>()
                            .map_err(|_| ArgsError::InvalidModule { raw: value.clone() })?,
                    );
                }
                "--facilitator" => role = Role::Facilitator,
                "--poll-interval-ms" => {
                    poll_interval = parse_poll_interval(&require_value(args, "--poll-interval-ms")?)?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            server,
            session: session.ok_or(ArgsError::MissingFlag { flag: "--session" })?,
            module,
            role,
            poll_interval,
        })
    }
}

fn render(snapshot: &ViewSnapshot, total: usize) {
    let slide = map_slide(snapshot, total);
    let mut line = format!("[{}] {}", slide.position, slide.kind_label);
    if slide.completed {
        line.push_str(" (done)");
    }
    if let Some(status) = slide.status {
        line.push_str(&format!(" - {status}"));
    }
    if let Some(error) = &snapshot.last_error {
        line.push_str(&format!(" [sync error: {error}]"));
    }
    println!("{line}");
}

fn report(err: &ControllerError) {
    match err {
        ControllerError::Navigation(NavigationError::Gated) => {
            println!("{}", client::vm::WAITING_FOR_FACILITATOR);
        }
        other => println!("{other}"),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(&mut std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let backend = HttpBackend::new(&args.server)?;
    let session = backend.session(&args.session).await?;
    let module_id = match args.module {
        Some(module_id) => module_id,
        None => *session
            .module_ids
            .first()
            .ok_or(ArgsError::MissingFlag { flag: "--module" })?,
    };
    let outline = backend.outline(&args.session, module_id).await?;
    let total = outline.templates.len();
    info!(session = %args.session, module_id = %module_id, slides = total, "mounting view");

    let view = ClientNavigationView::mount(
        args.role,
        args.session.clone(),
        module_id,
        outline.templates,
        outline.initial_index,
    )?;
    let events = subscribe(
        ws_url(backend.base_url(), &args.session)?,
        ReconnectPolicy::default(),
    );
    let controller = PresentationController::spawn(
        view,
        Arc::new(backend),
        events,
        ControllerConfig {
            poll_interval: args.poll_interval,
        },
    );

    println!("{} - {}", outline.title, session.mode);
    let mut snapshots = controller.subscribe();
    render(&snapshots.borrow_and_update(), total);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                render(&snapshot, total);
                if snapshot.session_ended {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let result = match line.trim() {
                    "n" | "next" => controller.next().await.map(drop),
                    "p" | "prev" | "previous" => controller.previous().await.map(drop),
                    "c" | "done" => controller.mark_completed().await,
                    "q" | "quit" => break,
                    "" => Ok(()),
                    other => {
                        println!("unknown command: {other}");
                        Ok(())
                    }
                };
                if let Err(err) = result {
                    report(&err);
                }
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
