//! BugBot - turns rough bug descriptions into structured bug reports
//!
//! Runs the report pipeline from the terminal: a guided chat, a one-shot
//! generate command, and a normalizer for saved model output.

use anyhow::{Context, Result};
use bugbot_adapters::bug_site::build_bug_report_url;
use bugbot_adapters::config::{Config, DEFAULT_SESSION_TTL_SECS};
use bugbot_adapters::examples::JsonlExampleSource;
use bugbot_adapters::logging;
use bugbot_core::{CanonicalReport, GenerationOutcome, ReportInput, SystemClock};
use bugbot_engine::{MessageOutcome, Normalizer, Orchestrator, ReportPipeline, SessionManager};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines, Stdin};

/// How often idle sessions and cached reports are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(
    name = "bugbot",
    about = "Turn rough bug descriptions into structured bug reports",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Guided conversation: description, steps, environment, then a report
    Chat {
        /// One-line summary of the bug
        summary: String,
        #[arg(long, default_value = "local")]
        user: String,
        #[arg(long, default_value = "terminal")]
        thread: String,
        #[arg(long)]
        severity: Option<String>,
    },
    /// Generate a report in one shot, answering follow-up questions if asked
    Generate {
        #[arg(long)]
        summary: String,
        #[arg(long)]
        description: Option<String>,
        /// Repeat for each step, in order
        #[arg(long = "step")]
        steps: Vec<String>,
        #[arg(long)]
        environment: Option<String>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        component: Option<String>,
    },
    /// Normalize raw model output from a file (or `-` for stdin)
    Normalize { path: PathBuf },
}

type InputLines = Lines<BufReader<Stdin>>;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");
    let args = Args::parse();
    let config = Config::load();

    match args.command {
        Command::Chat {
            summary,
            user,
            thread,
            severity,
        } => run_chat(&config, &user, &thread, &summary, severity).await,
        Command::Generate {
            summary,
            description,
            steps,
            environment,
            severity,
            component,
        } => {
            let input = ReportInput {
                detailed_description: description,
                steps,
                environment_notes: environment,
                severity,
                component,
                ..ReportInput::new(summary)
            };
            run_generate(&config, input).await
        }
        Command::Normalize { path } => run_normalize(&config, &path).await,
    }
}

fn build_orchestrator(config: &Config) -> Result<Arc<Orchestrator>> {
    let examples = JsonlExampleSource::new(&config.examples_path);
    let orchestrator = Orchestrator::from_config(config, &examples)
        .with_context(|| format!("check your settings in {}", Config::config_location()))?;
    Ok(Arc::new(orchestrator))
}

fn session_ttl(config: &Config) -> chrono::Duration {
    i64::try_from(config.session_ttl_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_SESSION_TTL_SECS as i64))
}

fn print_report(report: &CanonicalReport) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    println!();
    println!("  Open the bug form: {}", build_bug_report_url(report));
    Ok(())
}

/// Read one message: lines until a blank line or end of input.
async fn read_message(lines: &mut InputLines) -> Result<Option<String>> {
    let mut collected: Vec<String> = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            if collected.is_empty() {
                continue;
            }
            break;
        }
        collected.push(line);
    }
    if collected.is_empty() {
        Ok(None)
    } else {
        Ok(Some(collected.join("\n")))
    }
}

async fn run_chat(
    config: &Config,
    user: &str,
    thread: &str,
    summary: &str,
    severity: Option<String>,
) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let manager = Arc::new(SessionManager::new(
        orchestrator,
        session_ttl(config),
        Arc::new(SystemClock),
    ));

    let sweeper = {
        let manager = manager.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                manager.sweep_expired();
            }
        })
    };

    println!("{}", manager.start_session(user, thread, summary, severity));
    println!("  (finish each message with an empty line; /quit to cancel)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(message) = read_message(&mut lines).await? {
        if message.trim() == "/quit" {
            manager.abandon(user, thread);
            println!("  Session cancelled.");
            break;
        }

        let outcome = manager.handle_message(user, thread, &message).await;
        if let Some(text) = outcome.message() {
            println!();
            println!("{}", text);
        }
        if let MessageOutcome::Completed { report, .. } = &outcome {
            println!();
            print_report(report)?;
        }
        if outcome.ends_session() {
            break;
        }
    }

    sweeper.abort();
    Ok(())
}

async fn run_generate(config: &Config, input: ReportInput) -> Result<()> {
    let pipeline = ReportPipeline::new(
        build_orchestrator(config)?,
        session_ttl(config),
        Arc::new(SystemClock),
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut outcome = pipeline.submit(input).await.outcome;
    loop {
        match outcome {
            GenerationOutcome::Report { report, .. } => return print_report(&report),
            GenerationOutcome::Fatal { message } => {
                anyhow::bail!(message);
            }
            GenerationOutcome::NeedMoreInfo {
                followup_id,
                fields,
                message,
            } => {
                println!("{}", message);
                println!("  (leave every answer empty to generate anyway)");
                let mut answers = Vec::new();
                for field in &fields {
                    println!("  {}:", field.label());
                    let answer = lines.next_line().await?.unwrap_or_default();
                    if !answer.trim().is_empty() {
                        answers.push((*field, answer));
                    }
                }
                outcome = if answers.is_empty() {
                    pipeline.generate_anyway(&followup_id).await
                } else {
                    pipeline.submit_followup(&followup_id, &answers).await
                };
            }
        }
    }
}

async fn run_normalize(config: &Config, path: &Path) -> Result<()> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        tokio::io::stdin().read_to_string(&mut buf).await?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };

    let normalizer = Normalizer::new(config.known_components.clone());
    match normalizer.normalize(&raw) {
        Ok(report) => print_report(&report),
        Err(signal) => {
            tracing::debug!(%signal, "model output was an insufficiency verdict");
            println!("{}", signal.user_message());
            if let Some(message) = signal.message() {
                println!("  Model said: {}", message);
            }
            Ok(())
        }
    }
}
