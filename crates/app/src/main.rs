mod terminal;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use backend::{CourseBackend, CourseScript, HttpBackend, HttpBackendConfig, InMemoryRuntime};
use playback_core::model::{CourseId, ParseIdError};
use services::{Clock, CoursePlayer, PlaybackConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEMO_COURSE: &str = include_str!("demo_course.json");
const DEMO_COURSE_ID: &str = "demo";

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    EmptyValue { flag: &'static str },
    MissingCourse,
    InvalidCourse(ParseIdError),
    UnknownArg(String),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::EmptyValue { flag } => write!(f, "{flag} must not be empty"),
            ArgsError::MissingCourse => write!(f, "play needs --course <id> or COURSE_ID"),
            ArgsError::InvalidCourse(err) => write!(f, "invalid course id: {err}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    let value = args.next().ok_or(ArgsError::MissingValue { flag })?;
    if value.trim().is_empty() {
        return Err(ArgsError::EmptyValue { flag });
    }
    Ok(value)
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- demo [--script <course.json>]");
    eprintln!("  cargo run -p app -- play --course <id> [--api-url <url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  demo plays a bundled course against an in-process runtime");
    eprintln!("  --api-url http://localhost:8000/");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_ID, COURSE_API_URL, COURSE_API_TIMEOUT_MS,");
    eprintln!("  COURSE_MESSAGE_DELAY_MS, COURSE_ANSWER_DELAY_MS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Demo,
    Play,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "demo" => Some(Self::Demo),
            "play" => Some(Self::Play),
            _ => None,
        }
    }
}

enum Args {
    Demo {
        script: Option<PathBuf>,
    },
    Play {
        course: CourseId,
        api_url: Option<String>,
    },
}

impl Args {
    fn parse_demo(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut script = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--script" => script = Some(PathBuf::from(require_value(args, "--script")?)),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(Self::Demo { script })
    }

    /// `env_course` is the `COURSE_ID` fallback; `--course` wins over it.
    fn parse_play(
        args: &mut impl Iterator<Item = String>,
        env_course: Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut course = env_course;
        let mut api_url = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--course" => course = Some(require_value(args, "--course")?),
                "--api-url" => api_url = Some(require_value(args, "--api-url")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        let course = course
            .ok_or(ArgsError::MissingCourse)?
            .parse::<CourseId>()
            .map_err(ArgsError::InvalidCourse)?;
        Ok(Self::Play { course, api_url })
    }
}

fn init_tracing() {
    // Logs go to stderr so they do not interleave with the course text.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

type Selected = (Arc<dyn CourseBackend>, CourseId);

fn demo_backend(script: Option<PathBuf>) -> Result<Selected, Box<dyn std::error::Error>> {
    let json = match script {
        Some(path) => std::fs::read_to_string(path)?,
        None => DEMO_COURSE.to_string(),
    };
    let course = CourseId::new(DEMO_COURSE_ID);
    let script = CourseScript::from_json(course.clone(), &json)?;
    info!(elements = script.len(), "loaded demo course");
    let backend: Arc<dyn CourseBackend> = Arc::new(InMemoryRuntime::new().with_course(script));
    Ok((backend, course))
}

fn http_backend(
    api_url: Option<String>,
) -> Result<Arc<dyn CourseBackend>, Box<dyn std::error::Error>> {
    let mut config = HttpBackendConfig::from_env()?;
    if let Some(url) = api_url {
        config = config.with_base_url(&url)?;
    }
    info!(url = %config.base_url, "using course server");
    let backend: Arc<dyn CourseBackend> = Arc::new(HttpBackend::new(config)?);
    Ok(backend)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Without a subcommand, play the bundled demo.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Demo,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Demo,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };
    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = match cmd {
        Command::Demo => Args::parse_demo(&mut iter),
        Command::Play => Args::parse_play(&mut iter, std::env::var("COURSE_ID").ok()),
    }
    .map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = PlaybackConfig::from_env()?;
    let (backend, course) = match parsed {
        Args::Demo { script } => demo_backend(script)?,
        Args::Play { course, api_url } => (http_backend(api_url)?, course),
    };

    let player = CoursePlayer::new(Clock::system(), backend, config);
    let events = player.subscribe();
    player.begin(course).await?;

    let outcome = terminal::play(&player, events).await;
    player.shutdown();
    outcome?;
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
