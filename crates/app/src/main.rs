mod terminal;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use persistence::{HttpBridge, HttpBridgeConfig, InMemoryBridge, PersistenceBridge, TokenSource};
use services::{EngineEvent, EngineOptions, FinalizeOutcome, KeyOutcome, QuizEngine};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::terminal::{Silent, TerminalHost};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingQuestions,
    UnknownArg(String),
    InvalidEndpoint { raw: String },
    InvalidSeed { raw: String },
    TokenWithoutEndpoint,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingQuestions => write!(f, "--questions <file> is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidEndpoint { raw } => write!(f, "invalid --endpoint value: {raw}"),
            ArgsError::InvalidSeed { raw } => write!(f, "invalid --seed value: {raw}"),
            ArgsError::TokenWithoutEndpoint => {
                write!(f, "--token needs --endpoint or QUIZ_ENDPOINT_URL")
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
    eprintln!("  cargo run -p app -- run   --questions <file> [--endpoint <url>] [--token <t>]");
    eprintln!("                            [--interleave-key <path>] [--seed <n>]");
    eprintln!("  cargo run -p app -- order --questions <file> [--interleave-key <path>] [--seed <n>]");
    eprintln!();
    eprintln!("Without --endpoint (or QUIZ_ENDPOINT_URL) answers are kept in memory.");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_ENDPOINT_URL, QUIZ_CSRF_TOKEN, QUIZ_INTERLEAVE_KEY, QUIZ_ORDER_SEED,");
    eprintln!("  QUIZ_AUTO_ADVANCE_MS, QUIZ_CONFIRM_INTERVAL_MS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    Order,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "order" => Some(Self::Order),
            _ => None,
        }
    }
}

struct Args {
    questions: PathBuf,
    bridge: Option<HttpBridgeConfig>,
    options: EngineOptions,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut questions = None;
        let mut bridge = HttpBridgeConfig::from_env();
        let mut token = None;
        let mut options = EngineOptions::from_env();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--questions" => questions = Some(PathBuf::from(require_value(args, "--questions")?)),
                "--endpoint" => {
                    let value = require_value(args, "--endpoint")?;
                    let endpoint = Url::parse(value.trim())
                        .map_err(|_| ArgsError::InvalidEndpoint { raw: value.clone() })?;
                    let existing = bridge.map(|config| config.token);
                    bridge = Some(HttpBridgeConfig {
                        endpoint,
                        token: existing.unwrap_or_else(|| TokenSource::from(String::new())),
                    });
                }
                "--token" => token = Some(require_value(args, "--token")?),
                "--interleave-key" => {
                    options.interleave_key = Some(require_value(args, "--interleave-key")?);
                }
                "--seed" => {
                    let value = require_value(args, "--seed")?;
                    let seed = value
                        .parse::<u64>()
                        .map_err(|_| ArgsError::InvalidSeed { raw: value.clone() })?;
                    options.order_seed = Some(seed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        match (bridge.as_mut(), token) {
            (Some(config), Some(token)) => config.token = token.into(),
            (None, Some(_)) => return Err(ArgsError::TokenWithoutEndpoint),
            (_, None) => {}
        }

        Ok(Self {
            questions: questions.ok_or(ArgsError::MissingQuestions)?,
            bridge,
            options,
        })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));
    // A second init (tests, embedding) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Terminal words mapped onto engine key names.
fn key_for(line: &str) -> &str {
    match line {
        "p" | "prev" | "<" => "ArrowLeft",
        "n" | "next" | ">" => "ArrowRight",
        other => other,
    }
}

enum Input {
    Line(Option<String>),
    Event(EngineEvent),
}

async fn drive(mut engine: QuizEngine) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let input = tokio::select! {
            line = lines.next_line() => Input::Line(line?),
            Some(event) = engine.next_event() => Input::Event(event),
        };

        let line = match input {
            Input::Event(event) => {
                engine.handle_event(event);
                continue;
            }
            Input::Line(None) => break,
            Input::Line(Some(line)) => line,
        };

        match line.trim() {
            "" => {}
            "q" | "quit" => break,
            "j" | "jump" => {
                engine.jump_to_first_unanswered();
            }
            "f" | "finish" => match engine.request_finalize() {
                FinalizeOutcome::Ready => {
                    println!();
                    for (question_id, value) in engine.answers_in_order() {
                        println!("{question_id}\t{value}");
                    }
                    break;
                }
                FinalizeOutcome::Blocked { missing } => {
                    println!("{missing} question(s) still unanswered.");
                }
                FinalizeOutcome::NoContent => break,
            },
            other => match engine.handle_key(key_for(other)) {
                Ok(KeyOutcome::Ignored) => println!("unknown input: {other}"),
                Ok(_) => {}
                Err(err) => println!("{err}"),
            },
        }
    }

    if tokio::time::timeout(FLUSH_TIMEOUT, engine.flush_autosaves())
        .await
        .is_err()
    {
        tracing::warn!(
            pending = engine.autosaves_in_flight(),
            "gave up waiting for autosaves"
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();

    let payload = tokio::fs::read_to_string(&parsed.questions).await?;
    let bridge: Arc<dyn PersistenceBridge> = match parsed.bridge {
        Some(config) => {
            tracing::info!(endpoint = %config.endpoint, "autosaving over http");
            Arc::new(HttpBridge::new(config))
        }
        None => Arc::new(InMemoryBridge::new()),
    };

    match cmd {
        Command::Order => {
            let engine = QuizEngine::builder(Arc::new(Silent), bridge)
                .with_options(parsed.options)
                .start_from_payload(&payload)?;
            for record in engine.state().sequence() {
                println!("{}\t{}", record.id(), record.text());
            }
            Ok(())
        }
        Command::Run => {
            let engine = QuizEngine::builder(Arc::new(TerminalHost), bridge)
                .with_options(parsed.options)
                .start_from_payload(&payload)?;
            drive(engine).await
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
