mod backend;
mod config;
mod error;
mod observer;

use std::path::PathBuf;
use std::sync::Arc;

use agent::tools::{ToolRegistry, drone};
use agent::{Agent, LoggingContext, StepOutcome, prompt};
use chrono::{Local, TimeZone};
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use serde_json::Value;
use sim::{DroneCamera, FlightApi, KinematicSim, ObservationOptions};
use storage::{Event, EventKind, EventStore, Role};
use tracing::info;

use backend::ModelBackend;
use config::{CONFIG_FILE, Config, SimConfig};
use error::{Error, Result};
use observer::EventLogObserver;

const DB_FILE: &str = "flightlog.db";
const MAX_DISPLAY_LEN: usize = 200;

#[derive(Parser)]
#[command(name = "drone-agent")]
#[command(about = "Fly a drone with a vision-language model", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task until the model stops calling tools
    Run {
        /// Task in natural language
        task: String,
        /// Step budget (defaults to agent.max_steps)
        #[arg(long)]
        max_steps: Option<usize>,
    },
    /// Run a single step with the front camera view
    Step {
        /// Instruction in natural language
        instruction: String,
    },
    /// Print the simulated vehicle's current observation as JSON
    Observe {
        /// Include frame metadata for this camera (repeatable)
        #[arg(short, long = "camera")]
        cameras: Vec<DroneCamera>,
        /// Embed each frame as a data URL
        #[arg(long)]
        data: bool,
    },
    /// List the available tools
    Tools,
    /// List recorded runs
    Sessions {
        /// Show only the last N sessions
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show the flight log of a run
    Logs {
        /// Session ID (prefix match supported)
        #[arg(short, long)]
        session: String,
        /// Filter by event kind
        #[arg(short, long, value_parser = PossibleValuesParser::new(EventKind::NAMES))]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let mut config = Config::load_or_default(&cli.config)?;
    config.apply_env(|key| std::env::var(key).ok())?;

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    let logging = LoggingContext::init(logging)?;
    if let Some(file) = logging.log_file() {
        info!(file = %file.display(), "writing log file");
    }

    match cli.command {
        Commands::Run { task, max_steps } => {
            let max_steps = max_steps.unwrap_or(config.agent.max_steps);
            cmd_run(&config, &task, max_steps).await
        }
        Commands::Step { instruction } => cmd_step(&config, &instruction).await,
        Commands::Observe { cameras, data } => cmd_observe(&config.sim, cameras, data),
        Commands::Tools => cmd_tools(),
        Commands::Sessions { limit } => cmd_sessions(limit),
        Commands::Logs { session, kind } => cmd_logs(&session, kind.as_deref()),
    }
}

async fn cmd_run(config: &Config, task: &str, max_steps: usize) -> Result<()> {
    let (agent, observer) = build_agent(config, task)?;
    println!("Session ID: {}", observer.session());
    println!("Model: {}\n", config.model.model_name());

    let history = agent.chat(task, max_steps).await;
    for (i, outcome) in history.iter().enumerate() {
        print_outcome(i + 1, outcome);
    }
    if let Some(last) = history.last() {
        println!("\n{}", prompt::final_response(history.len(), last));
    }

    observer.finish(history.len())?;
    Ok(())
}

async fn cmd_step(config: &Config, instruction: &str) -> Result<()> {
    let (agent, observer) = build_agent(config, instruction)?;
    println!("Session ID: {}\n", observer.session());

    let outcome = agent.step(instruction, true, &[]).await;
    print_outcome(1, &outcome);

    observer.finish(1)?;
    Ok(())
}

fn build_agent(
    config: &Config,
    task: &str,
) -> Result<(Agent<ModelBackend>, Arc<EventLogObserver>)> {
    let backend = ModelBackend::from_config(&config.model)?;
    let sim = build_sim(&config.sim)?;

    let store = create_store()?;
    let observer = Arc::new(EventLogObserver::start(store, task)?);

    let mut agent = Agent::new(backend, sim)
        .with_max_tokens(config.model.max_tokens)
        .with_observer(observer.clone());
    if let Some(schema) = config.model.load_response_schema()? {
        agent = agent.with_response_schema(schema);
    }
    Ok((agent, observer))
}

fn build_sim(config: &SimConfig) -> Result<Arc<KinematicSim>> {
    let sim = match &config.placeholder_image {
        Some(path) => KinematicSim::from_image_file(path)?,
        None => KinematicSim::new(),
    };
    Ok(Arc::new(sim))
}

fn cmd_observe(config: &SimConfig, cameras: Vec<DroneCamera>, include_data: bool) -> Result<()> {
    let sim = build_sim(config)?;
    let snapshot = observe(sim.as_ref(), cameras, include_data)?;
    println!("{snapshot:#}");
    Ok(())
}

fn observe(api: &dyn FlightApi, cameras: Vec<DroneCamera>, include_data: bool) -> Result<Value> {
    let options = ObservationOptions {
        cameras,
        include_data,
    };
    Ok(sim::observation(api, &options)?)
}

fn cmd_tools() -> Result<()> {
    let mut tools = ToolRegistry::new();
    drone::register(&mut tools, Arc::new(KinematicSim::new()));
    println!("{}", tools.list_tools_summary());
    Ok(())
}

fn print_outcome(step: usize, outcome: &StepOutcome) {
    let status = if outcome.success() { "ok" } else { "failed" };
    println!(
        "[{step}] {}: {status}",
        outcome.tool_name().unwrap_or("(no tool)")
    );

    if let Some(plan) = outcome.plan() {
        for line in plan.lines() {
            println!("    | {line}");
        }
    }
    for record in outcome.results() {
        println!("    {} -> {}", record.tool_name, summarize(&record.result));
    }
    if outcome.success() {
        if let Some(reason) = outcome.reason() {
            println!("    reason: {reason}");
        }
    } else if let Some(error) = outcome.error() {
        match outcome.error_type() {
            Some(kind) => println!("    error ({}): {error}", kind.as_str()),
            None => println!("    error: {error}"),
        }
    }
}

/// One-line rendering of a tool result without embedded image data.
fn summarize(value: &Value) -> String {
    match value {
        Value::Object(map) if map.contains_key("image_url") => {
            let mut map = map.clone();
            map.remove("image_url");
            Value::Object(map).to_string()
        }
        other => other.to_string(),
    }
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_DISPLAY_LEN) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

fn cmd_sessions(limit: usize) -> Result<()> {
    let store = open_store()?;
    let sessions = store.list_sessions()?;

    if sessions.is_empty() {
        println!("No sessions found.");
        return Ok(());
    }

    println!(
        "{:<36}  {:<16}  {:<5}  {:<7}  TASK",
        "SESSION ID", "STARTED", "TOOLS", "STATUS"
    );
    println!("{}", "-".repeat(100));

    for summary in sessions.into_iter().take(limit) {
        let started = Local
            .from_utc_datetime(&summary.started_at.naive_utc())
            .format("%Y-%m-%d %H:%M");
        let status = if summary.ended_at.is_some() {
            "ended"
        } else {
            "open"
        };
        println!(
            "{:<36}  {:<16}  {:<5}  {status:<7}  {}",
            summary.id,
            started.to_string(),
            summary.tool_calls,
            summary.task.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

fn cmd_logs(session_prefix: &str, kind_filter: Option<&str>) -> Result<()> {
    let store = open_store()?;
    let session_id = store.resolve_session(session_prefix)?;
    let events = store.load_events(session_id, kind_filter)?;

    if events.is_empty() {
        println!("No events found for session {session_id}");
        return Ok(());
    }

    println!("Session: {session_id}\n");

    for event in events {
        print_event(&event);
    }

    Ok(())
}

fn print_event(event: &Event) {
    let time = Local
        .from_utc_datetime(&event.timestamp.naive_utc())
        .format("%H:%M:%S");

    match &event.kind {
        EventKind::SessionStart { task } => {
            println!("[{time}] === Session started: {} ===", truncate(task));
        }
        EventKind::SessionEnd { steps } => {
            println!("[{time}] === Session ended after {steps} step(s) ===");
        }
        EventKind::Message { role, content } => {
            let role_str = match role {
                Role::User => "USER",
                Role::Assistant => "ASSISTANT",
                Role::System => "SYSTEM",
            };
            println!("[{time}] {role_str}: {}", truncate(content));
        }
        EventKind::Plan { text } => {
            println!("[{time}] PLAN: {}", truncate(text));
        }
        EventKind::ToolCall { name, input } => {
            println!("[{time}] TOOL CALL: {name} {input}");
        }
        EventKind::ToolResult {
            name,
            output,
            success,
        } => {
            let label = if *success { "TOOL RESULT" } else { "TOOL ERROR" };
            println!("[{time}] {label}: {name} {}", truncate(&summarize(output)));
        }
        EventKind::Status { snapshot } => {
            let p = &snapshot["position"];
            println!(
                "[{time}] STATUS: x={} y={} z={}",
                p["x"], p["y"], p["z"]
            );
        }
    }
}

fn db_path() -> Result<PathBuf> {
    let data_dir = dirs_data_dir().ok_or(Error::NoDataDir)?;
    Ok(data_dir.join(DB_FILE))
}

fn create_store() -> Result<EventStore> {
    let path = db_path()?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    info!(path = %path.display(), "opening flight log");
    Ok(EventStore::open(&path)?)
}

fn open_store() -> Result<EventStore> {
    let path = db_path()?;
    if !path.exists() {
        return Err(Error::DatabaseNotFound { path });
    }
    Ok(EventStore::open(&path)?)
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/drone-agent"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("drone-agent"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("drone-agent"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn cli_parses_run_with_globals() {
        let cli = Cli::try_parse_from([
            "drone-agent",
            "run",
            "take off and climb",
            "--max-steps",
            "3",
            "--verbose",
            "--config",
            "custom.toml",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert!(matches!(
            cli.command,
            Commands::Run { ref task, max_steps: Some(3) } if task == "take off and climb"
        ));
    }

    #[test]
    fn logs_kind_is_checked() {
        let cli = Cli::try_parse_from(["drone-agent", "logs", "-s", "abcd", "-k", "tool_call"]).unwrap();
        assert!(matches!(cli.command, Commands::Logs { kind: Some(ref k), .. } if k == "tool_call"));

        assert!(Cli::try_parse_from(["drone-agent", "logs", "-s", "abcd", "-k", "bogus"]).is_err());
    }

    #[test]
    fn observe_parses_repeated_cameras() {
        let cli = Cli::try_parse_from([
            "drone-agent",
            "observe",
            "-c",
            "FRONT_LEFT",
            "--camera",
            "BOTTOM_CENTER",
            "--data",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Observe { ref cameras, data: true }
                if cameras == &[DroneCamera::FrontLeft, DroneCamera::BottomCenter]
        ));

        assert!(Cli::try_parse_from(["drone-agent", "observe", "-c", "TOP"]).is_err());
    }

    #[test]
    fn observe_reports_pose_and_frames() {
        let sim = KinematicSim::new();
        let bare = observe(&sim, Vec::new(), false).unwrap();
        assert!(bare.get("pose").is_some());
        assert!(bare.get("rgb").is_none());

        let snapshot = observe(&sim, vec![DroneCamera::FrontCenter], true).unwrap();
        let frame = &snapshot["rgb"]["FRONT_CENTER"];
        assert_eq!(frame["camera_id"], "0");
        assert!(frame["image_url"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn summarize_drops_image_data() {
        let result = json!({"camera": "FRONT_LEFT", "image_url": "data:image/png;base64,AAAA"});
        assert_eq!(summarize(&result), r#"{"camera":"FRONT_LEFT"}"#);
        assert_eq!(summarize(&Value::Null), "null");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "起".repeat(MAX_DISPLAY_LEN + 1);
        let short = truncate(&text);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), MAX_DISPLAY_LEN + 3);
        assert_eq!(truncate("hover"), "hover");
    }

    #[test]
    fn build_sim_uses_placeholder_by_default() {
        let sim = build_sim(&SimConfig::default()).unwrap();
        assert!(sim.command_log().is_empty());

        let missing = SimConfig {
            placeholder_image: Some(PathBuf::from("/nonexistent/frame.png")),
        };
        assert!(build_sim(&missing).is_err());
    }
}
