use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lab_assign::api::{run_server, ApiState};
use lab_assign::config::ServiceConfig;
use lab_assign::eligibility::{evaluate_batch, Candidate, EvaluationResult, TimeWindow};
use lab_assign::lab::{Device, Seed, Task, User};
use lab_assign::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "lab-assign")]
#[command(version)]
#[command(about = "Assignment eligibility service for laboratory test management")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the HTTP assignment service
    Serve(ServeArgs),

    /// Evaluate candidates for a task from a JSON document
    Evaluate {
        /// Document of the form {"task": {...}, "candidates": [{"user", "device", "start_time", "end_time"}]}
        input: PathBuf,

        /// Output format
        #[arg(long, short = 'o', default_value = "table")]
        output: OutputFormat,
    },

    /// Print the built-in demo seed as JSON
    Seed,
}

// =============================================================================
// Server Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// JSON seed with tasks, users and devices
    #[arg(long, conflicts_with = "demo")]
    seed: Option<PathBuf>,

    /// Start with the built-in demo lab
    #[arg(long)]
    demo: bool,

    /// Disable permissive CORS headers
    #[arg(long)]
    strict_cors: bool,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Offline Evaluation
// =============================================================================

#[derive(Deserialize)]
struct EvaluationDocument {
    task: Task,
    #[serde(default)]
    candidates: Vec<DocumentCandidate>,
}

#[derive(Deserialize)]
struct DocumentCandidate {
    user: User,
    device: Device,
    start_time: Option<String>,
    end_time: Option<String>,
}

#[derive(Serialize)]
struct CandidateOutput {
    index: usize,
    user_id: u64,
    device_id: u64,
    #[serde(flatten)]
    result: EvaluationResult,
}

#[derive(Serialize)]
struct EvaluateOutput {
    task_id: u64,
    test_type: String,
    results: Vec<CandidateOutput>,
}

async fn run_serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServiceConfig::new(SocketAddr::new(args.host, args.port))
        .with_permissive_cors(!args.strict_cors);
    if let Some(path) = args.seed {
        config = config.with_seed(path);
    }

    let seed = match (&config.seed_path, args.demo) {
        (Some(path), _) => Seed::load(path).await?,
        (None, true) => Seed::demo(),
        (None, false) => Seed::default(),
    };

    tracing::info!(
        listen_addr = %config.listen_addr,
        seed = ?config.seed_path,
        demo = args.demo,
        tasks = seed.tasks.len(),
        users = seed.users.len(),
        devices = seed.devices.len(),
        "Starting lab-assign"
    );

    let state = ApiState::from_seed(seed)?;
    let shutdown = install_shutdown_handler();
    run_server(&config, state, shutdown).await?;
    Ok(())
}

async fn run_evaluate(
    input: PathBuf,
    output: &OutputFormat,
) -> Result<bool, Box<dyn std::error::Error>> {
    let data = tokio::fs::read(&input).await?;
    let doc: EvaluationDocument = serde_json::from_slice(&data)?;

    let windows = doc
        .candidates
        .iter()
        .map(|c| TimeWindow::from_parts(c.start_time.as_deref(), c.end_time.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;
    let candidates: Vec<Candidate<'_>> = doc
        .candidates
        .iter()
        .zip(windows)
        .map(|(c, window)| Candidate::new(&c.user, &c.device, window))
        .collect();

    let results = evaluate_batch(&doc.task, &candidates)?;
    let all_eligible = results.iter().all(|(_, r)| r.eligible);

    match output {
        OutputFormat::Json => {
            let out = EvaluateOutput {
                task_id: doc.task.id,
                test_type: doc.task.test_type.clone(),
                results: results
                    .into_iter()
                    .map(|(index, result)| CandidateOutput {
                        index,
                        user_id: candidates[index].user.id,
                        device_id: candidates[index].device.id,
                        result,
                    })
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Table => {
            println!("Task {} ({})", doc.task.id, doc.task.test_type);
            if results.is_empty() {
                println!("No candidates.");
                return Ok(true);
            }
            println!(
                "{:<6} {:<16} {:<24} {:<9} VIOLATIONS",
                "#", "USER", "DEVICE", "ELIGIBLE"
            );
            println!("{}", "-".repeat(78));
            for (index, result) in &results {
                let c = &candidates[*index];
                let violations = if result.violations.is_empty() {
                    "-".to_string()
                } else {
                    result
                        .violations
                        .iter()
                        .map(|v| v.code())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                println!(
                    "{:<6} {:<16} {:<24} {:<9} {}",
                    index,
                    c.user.username,
                    c.device.name,
                    if result.eligible { "yes" } else { "no" },
                    violations
                );
            }
        }
    }
    Ok(all_eligible)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Commands::Serve(serve_args) => {
            run_serve(serve_args).await?;
        }
        Commands::Evaluate { input, output } => {
            if !run_evaluate(input, &output).await? {
                std::process::exit(1);
            }
        }
        Commands::Seed => {
            println!("{}", serde_json::to_string_pretty(&Seed::demo())?);
        }
    }

    Ok(())
}
