#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # veritas
//! ## Introduction
//!
//! Evaluates academic theses with a panel of three virtual evaluators backed by
//! an OpenAI-compatible chat-completions service.
//!
//! ## Usage
//!
//! Set `PERPLEXITY_API_KEY` (a `.env` file in the working directory is read
//! too), then either run `veritas serve` and open `http://localhost:8000`, or
//! evaluate a local file with `veritas evaluate tese.pdf`.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use bpaf::*;
use dotenvy::dotenv;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, util::SubscriberInitExt};
use veritas::{config::Settings, evaluator::Evaluator, extract, report, server};

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Run the HTTP service
    Serve {
        /// Overrides `VERITAS_HOST`
        host: Option<String>,
        /// Overrides `VERITAS_PORT`
        port: Option<u16>,
    },
    /// Evaluate a local file
    Evaluate {
        /// Document to evaluate
        file: PathBuf,
        /// Print raw JSON instead of a table
        json: bool,
    },
    /// Print the effective configuration
    Check,
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    let host = long("host")
        .help("Address to bind, overrides VERITAS_HOST")
        .argument::<String>("HOST")
        .optional();
    let port = long("port")
        .help("Port to bind, overrides VERITAS_PORT")
        .argument::<u16>("PORT")
        .optional();
    let serve = construct!(Cmd::Serve { host, port })
        .to_options()
        .command("serve")
        .help("Run the HTTP evaluation service");

    let json = long("json")
        .help("Print the evaluation as JSON")
        .switch();
    let file = positional::<PathBuf>("FILE").help("PDF, DOCX, or TXT document to evaluate");
    let evaluate = construct!(Cmd::Evaluate { json, file })
        .to_options()
        .command("evaluate")
        .help("Evaluate a local document and print the report");

    let check = pure(Cmd::Check)
        .to_options()
        .command("check")
        .help("Print the effective configuration; the API key is never shown");

    let cmd = construct!([serve, evaluate, check]);

    cmd.to_options()
        .descr("Thesis evaluation with a panel of virtual evaluators")
        .run()
}

/// Extracts, evaluates, and prints one local document.
async fn evaluate(settings: Settings, file: PathBuf, json: bool) -> Result<()> {
    let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let extracted = extract::extract(&bytes, &name)
        .with_context(|| format!("Failed to extract text from {}", file.display()))?;
    let evaluator = Evaluator::from_settings(Arc::new(settings))?;
    let result = evaluator
        .evaluate(&extracted.text)
        .await
        .with_context(|| format!("Failed to evaluate {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", report::render(&result));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let settings = Settings::from_env();

    match options() {
        Cmd::Serve { host, port } => server::serve(settings.with_bind_address(host, port)).await?,
        Cmd::Evaluate { file, json } => evaluate(settings, file, json).await?,
        Cmd::Check => println!("{}", settings.describe()),
    };

    Ok(())
}
