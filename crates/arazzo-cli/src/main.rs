// Copyright (c) 2025 Arazzo Engine Contributors
// SPDX-License-Identifier: Apache-2.0

//! Arazzo workflow CLI: validate a document and run its workflows.

use std::fs;

use anyhow::{Context, Result};
use arazzo_core::config::EngineConfig;
use arazzo_core::model::Document;
use arazzo_core::workflow::{Orchestrator, WorkflowStatus};
use arazzo_invoker::RecordingInvoker;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "arazzo")]
#[command(version, about = "Arazzo workflow execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an Arazzo document
    Validate {
        /// Path to the Arazzo document (YAML or JSON)
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Run one workflow (or all workflows, in dependency order, if
    /// `--workflow` is omitted)
    Run {
        /// Path to the Arazzo document (YAML or JSON)
        #[arg(value_name = "FILE")]
        file: String,

        /// Workflow id to run; all workflows run in dependency order if omitted
        #[arg(short, long)]
        workflow: Option<String>,

        /// Input JSON string, or a path to a JSON file
        #[arg(short, long)]
        input: Option<String>,

        /// Don't perform real operation invocations; echo synthetic
        /// 200 responses and print what would have been called
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("arazzo={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Validate { file } => validate_document(&file),
        Commands::Run { file, workflow, input, dry_run } => {
            run_document(&file, workflow.as_deref(), input.as_deref(), dry_run).await
        }
    };

    if let Err(e) = result {
        error!("{e}");
        eprintln!("{} {e}", "Error:".red().bold());
        std::process::exit(1);
    }
}

fn load_document(file_path: &str) -> Result<Document> {
    let content = fs::read_to_string(file_path)
        .with_context(|| format!("failed to read document: {file_path}"))?;
    if file_path.ends_with(".json") {
        Document::from_json(&content).with_context(|| format!("failed to parse {file_path}"))
    } else {
        Document::from_yaml(&content).with_context(|| format!("failed to parse {file_path}"))
    }
}

fn validate_document(file_path: &str) -> Result<()> {
    info!(file = %file_path, "validating document");
    println!("{} {}", "Validating:".cyan().bold(), file_path);

    let document = load_document(file_path)?;

    println!("{}", "Document is valid".green().bold());
    println!("  Title: {}", document.info.title);
    println!("  Version: {}", document.info.version);
    println!("  Workflows: {}", document.workflows.len());
    for workflow in &document.workflows {
        println!("    - {} ({} steps)", workflow.workflow_id, workflow.steps.len());
    }
    Ok(())
}

async fn run_document(
    file_path: &str,
    workflow_id: Option<&str>,
    input: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    info!(file = %file_path, "running document");
    let document = load_document(file_path)?;
    let inputs = parse_input(input)?;
    let config = EngineConfig::default();

    if dry_run {
        println!("{}", "Dry run: no real operations will be invoked".yellow().bold());
    }
    let invoker = RecordingInvoker::default();

    match workflow_id {
        Some(id) => {
            let outcome = Orchestrator::run_workflow(&document, id, inputs, &invoker, &config)
                .await
                .with_context(|| format!("workflow '{id}' did not complete"))?;
            print_outcome(id, &outcome);
        }
        None => {
            let outcomes = Orchestrator::run_all(&document, inputs, &invoker, &config)
                .await
                .with_context(|| "workflow run failed")?;
            for (id, outcome) in &outcomes {
                print_outcome(id, outcome);
            }
        }
    }

    if dry_run {
        println!("\n{}", "Recorded calls:".cyan().bold());
        for call in invoker.calls() {
            println!("  -> {}", call.target_description);
        }
    }

    Ok(())
}

fn print_outcome(workflow_id: &str, outcome: &arazzo_core::workflow::WorkflowRunOutcome) {
    match outcome.status {
        WorkflowStatus::Success => println!(
            "{} {} {}",
            "done".green().bold(),
            workflow_id,
            serde_json::to_string(&outcome.outputs).unwrap_or_default().dimmed()
        ),
        WorkflowStatus::Failure => println!(
            "{} {} {}",
            "failed".red().bold(),
            workflow_id,
            outcome.error.as_deref().unwrap_or("").dimmed()
        ),
        WorkflowStatus::Cancelled => println!("{} {}", "cancelled".yellow().bold(), workflow_id),
    }
}

fn parse_input(input: Option<&str>) -> Result<Value> {
    let Some(raw) = input else {
        return Ok(Value::Object(Default::default()));
    };
    if std::path::Path::new(raw).exists() {
        let content = fs::read_to_string(raw).with_context(|| format!("failed to read input file: {raw}"))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse input JSON from {raw}"))
    } else {
        serde_json::from_str(raw).with_context(|| "failed to parse input JSON string")
    }
}
