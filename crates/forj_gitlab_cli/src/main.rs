//! forjj-gitlab - GitLab plugin for forjj.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Plugin task failure (see `error_message` in the answer)

use std::process::ExitCode;

use anyhow::{anyhow, Result};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use forj_cli::{opts, CliError, ClapEngine, ValueType};
use forj_gitlab::{new_cli, run, PluginDescriptor, PluginError, PluginRequest};

mod output;

use output::{render, OutputFormat};

pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const TASK_FAILURE: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    // Answers go to stdout, logs to stderr.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("forj=info,warn")))
        .try_init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match execute(&args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

async fn execute(args: &[String]) -> Result<u8> {
    let desc = PluginDescriptor::embedded()?;
    let engine = ClapEngine::new("forjj-gitlab")
        .with_about(&desc.description)
        .with_version(desc.version.clone());
    let mut cli = new_cli(engine, &desc)?;
    cli.add_app_flag(
        ValueType::String,
        "output",
        "Answer format: yaml or json.",
        Some(opts().with_default("yaml").short('o')),
    );
    cli.done()?;

    let cmd = match cli.parse(args, &mut ()) {
        Ok(cmd) => cmd,
        Err(CliError::Help(text)) => {
            print!("{}", text);
            return Ok(ExitCodes::SUCCESS);
        }
        Err(e) => return Err(e.into()),
    };
    let format: OutputFormat = cli
        .get_app_flag("output")
        .and_then(|p| p.string_value())
        .unwrap_or("yaml")
        .parse()?;

    let action = cmd
        .names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("No action given. Use --help."))?;
    debug!("Action '{}' selected", action);

    if desc.action(&action).map_or(false, |a| a.internal) {
        print!("{}", render(format, cli.all_values())?);
        return Ok(ExitCodes::SUCCESS);
    }

    let req = PluginRequest::from_cli(&cli, &action)?;
    let ret = run(&req, None).await;
    print!("{}", render(format, &ret)?);
    Ok(if ret.is_error() {
        ExitCodes::TASK_FAILURE
    } else {
        ExitCodes::SUCCESS
    })
}

fn categorize_error(e: &anyhow::Error) -> u8 {
    let cli_error = e
        .downcast_ref::<CliError>()
        .or_else(|| match e.downcast_ref::<PluginError>() {
            Some(PluginError::Cli(inner)) => Some(inner),
            _ => None,
        });
    match cli_error {
        Some(CliError::Usage(_)) => ExitCodes::INVALID_ARGS,
        _ if e.to_string().starts_with("No action given") => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
