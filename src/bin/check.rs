//! Leo Auth Check
//!
//! Evaluate one request against a bootstrap policy file and print the decision

use anyhow::Context;
use clap::Parser;
use leo_auth::{
    AuthConfig, AuthError, Authorizer, BootstrapConfig, ContextValue, MemoryStore, Principal,
    RequestDescriptor,
};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "leo-auth-check")]
#[command(about = "Check a request against Leo bootstrap policies")]
struct Args {
    /// Bootstrap policy file (.json or .toml)
    #[arg(short = 'b', long)]
    bootstrap: PathBuf,

    /// Principal record as JSON; overrides --principal and --identity
    #[arg(long)]
    principal_file: Option<PathBuf>,

    /// Principal id
    #[arg(short = 'p', long, default_value = "anonymous")]
    principal: String,

    /// Identity the principal belongs to (repeatable)
    #[arg(short = 'i', long = "identity")]
    identities: Vec<String>,

    /// Principal context entry as key=value (repeatable)
    #[arg(short = 'c', long = "context", value_parser = parse_pair)]
    context: Vec<(String, String)>,

    /// Action to check, e.g. myapp:read
    #[arg(short = 'a', long)]
    action: String,

    /// LRN template, e.g. lrn:leo:bus:::queue/{queue}
    #[arg(short = 'l', long)]
    lrn: String,

    /// LRN placeholder value as name=value (repeatable)
    #[arg(long = "param", value_parser = parse_pair)]
    params: Vec<(String, String)>,

    /// Context field exposed to conditions (repeatable)
    #[arg(long = "context-field")]
    context_fields: Vec<String>,

    /// Request attribute as key=value; JSON values are parsed (repeatable)
    #[arg(long = "attribute", value_parser = parse_pair)]
    attributes: Vec<(String, String)>,
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid pair '{}'. Expected key=value", s)),
    }
}

fn load_principal(args: &Args) -> anyhow::Result<Principal> {
    if let Some(path) = &args.principal_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading principal file {:?}", path))?;
        return Principal::from_json(&text).context("parsing principal record");
    }

    let mut principal = Principal::new(&args.principal);
    for identity in &args.identities {
        principal = principal.with_identity(identity);
    }
    for (key, value) in &args.context {
        let value = match serde_json::from_str::<Value>(value) {
            Ok(json) => ContextValue::from_json(&json).unwrap_or_else(|| ContextValue::scalar(value)),
            Err(_) => ContextValue::scalar(value),
        };
        principal = principal.with_context(key, value);
    }
    Ok(principal)
}

fn build_request(args: &Args) -> RequestDescriptor {
    let mut request = RequestDescriptor::new(&args.action, &args.lrn);
    for (name, value) in &args.params {
        request = request.with_param(name, value);
    }
    if !args.context_fields.is_empty() {
        request = request.with_context_fields(args.context_fields.iter().cloned());
    }
    for (key, value) in &args.attributes {
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone()));
        request = request.with_attribute(key, value);
    }
    request
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let bootstrap = BootstrapConfig::from_file(&args.bootstrap)
        .with_context(|| format!("loading bootstrap policies from {:?}", args.bootstrap))?;
    info!(
        identities = bootstrap.identities.len(),
        policies = bootstrap.policies.len(),
        "Loaded bootstrap policies"
    );

    let config = AuthConfig::default().with_bootstrap(bootstrap);
    let authorizer = Authorizer::new(MemoryStore::new(), config)?;

    let principal = load_principal(&args)?;
    let request = build_request(&args);
    debug!(?principal, ?request, "Checking request");

    match authorizer.authorize_principal(&principal, &request).await {
        Ok(_) => {
            println!("ALLOW");
            Ok(ExitCode::SUCCESS)
        }
        Err(AuthError::AccessDenied) => {
            println!("DENY");
            Ok(ExitCode::from(1))
        }
        Err(err) => {
            eprintln!("error: {}", err);
            Ok(ExitCode::from(2))
        }
    }
}
