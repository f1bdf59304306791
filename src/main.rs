mod cli;

use trimforge::{
    config,
    notifications,
    orchestrator::{EditRequest, Orchestrator},
};
use trimforge_common::OperationId;
use trimforge_db::{pool::init_pool, Operation, OperationState, OperationStore};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "trimforge=trace,trimforge_av=trace,trimforge_db=debug,trimforge_common=debug".to_string()
        } else {
            "trimforge=info,trimforge_av=info,trimforge_db=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Submit {
            user,
            source,
            start,
            end,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(submit(config_path, EditRequest::new(user, source, start, end)))
        }
        Commands::Status { user, operation } => status(config_path, &user, operation),
        Commands::Fetch { user, operation } => fetch(config_path, &user, operation),
        Commands::History { user, limit } => history(config_path, &user, limit),
        Commands::AddUser {
            email,
            password_hash,
        } => add_user(config_path, &email, &password_hash),
        Commands::Subscribe { user, descriptor } => {
            subscribe(config_path, &user, Some(descriptor.as_path()))
        }
        Commands::Unsubscribe { user } => subscribe(config_path, &user, None),
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or_else(|| cli.config.clone());
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("trimforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load config, prepare storage, and open the database.
fn open_store(config_path: Option<&Path>) -> Result<(config::Config, OperationStore)> {
    let config = config::load_config_or_default(config_path)?;
    config::prepare_storage(&config)?;

    let db_path = config.storage.database_path.to_string_lossy().to_string();
    tracing::debug!("Opening database at {}", db_path);
    let pool = init_pool(&db_path).with_context(|| format!("Failed to open database: {db_path}"))?;

    Ok((config, OperationStore::new(pool)))
}

fn open_orchestrator(config_path: Option<&Path>) -> Result<(config::Config, Orchestrator)> {
    let (config, store) = open_store(config_path)?;
    let notifier = notifications::from_config(&config.push);
    let orchestrator = Orchestrator::new(&config, store, notifier);
    Ok((config, orchestrator))
}

async fn submit(config_path: Option<&Path>, request: EditRequest) -> Result<()> {
    let (config, orchestrator) = open_orchestrator(config_path)?;

    let recovered = orchestrator.recover_interrupted()?;
    if !recovered.is_empty() {
        tracing::info!(
            "Failed {} operations interrupted by a previous run",
            recovered.len()
        );
    }

    if let Err(e) = trimforge_av::require_tool(&config.transcoder.program) {
        tracing::warn!("{}; the operation will fail", e);
    }

    let submission = orchestrator.submit(&request).await?;
    println!(
        "Operation {} queued (output {})",
        submission.operation_id, submission.output_ref
    );

    let operation_id = submission.operation_id;
    match submission.job.wait().await? {
        OperationState::Finished => {
            let download = orchestrator.fetch_result(&request.user, Some(operation_id))?;
            println!("✓ Finished: {}", download.path.display());
            Ok(())
        }
        state => {
            let operation = orchestrator.status(&request.user, Some(operation_id))?;
            anyhow::bail!(
                "Operation {} {}: {}",
                operation_id,
                state,
                operation.error_message.unwrap_or_default()
            )
        }
    }
}

fn status(config_path: Option<&Path>, user: &str, operation: Option<i64>) -> Result<()> {
    let (_, orchestrator) = open_orchestrator(config_path)?;
    let operation = orchestrator.status(user, operation.map(OperationId::from))?;
    print_operation(&operation);
    Ok(())
}

fn fetch(config_path: Option<&Path>, user: &str, operation: Option<i64>) -> Result<()> {
    let (_, orchestrator) = open_orchestrator(config_path)?;
    let download = orchestrator.fetch_result(user, operation.map(OperationId::from))?;
    println!("{}", download.path.display());
    Ok(())
}

fn history(config_path: Option<&Path>, user: &str, limit: usize) -> Result<()> {
    let (_, orchestrator) = open_orchestrator(config_path)?;
    let operations = orchestrator.history(user, limit)?;
    if operations.is_empty() {
        println!("No operations");
    }
    for operation in &operations {
        println!(
            "{:>6}  {:<8}  {} [{} - {}] -> {}",
            operation.id.to_string(),
            operation.state.to_string(),
            operation.source_ref,
            operation.trim_start,
            operation.trim_end,
            operation.output_ref
        );
    }
    Ok(())
}

fn print_operation(operation: &Operation) {
    println!("Operation {}", operation.id);
    println!("  State:   {}", operation.state);
    println!("  Source:  {}", operation.source_ref);
    println!("  Range:   {} - {}", operation.trim_start, operation.trim_end);
    println!("  Output:  {}", operation.output_ref);
    println!("  Created: {}", operation.created_at.to_rfc3339());
    if let Some(completed) = operation.completed_at {
        println!("  Done:    {}", completed.to_rfc3339());
    }
    if let Some(ref error) = operation.error_message {
        println!("  Error:   {}", error);
    }
}

fn add_user(config_path: Option<&Path>, email: &str, password_hash: &str) -> Result<()> {
    let (_, store) = open_store(config_path)?;
    let user_id = store.register_user(email.trim(), password_hash)?;
    let user = store
        .get_user(user_id)?
        .with_context(|| format!("User {user_id} vanished after registration"))?;
    println!("✓ Registered {} (id {})", user.email, user.id);
    Ok(())
}

fn subscribe(config_path: Option<&Path>, user: &str, descriptor: Option<&Path>) -> Result<()> {
    let (_, store) = open_store(config_path)?;
    let user_id = store
        .resolve_user(user.trim())?
        .with_context(|| format!("Unknown user: {user}"))?;

    match descriptor {
        Some(path) => {
            let blob = std::fs::read(path)
                .with_context(|| format!("Failed to read subscription descriptor: {:?}", path))?;
            store.set_subscription(user_id, Some(&blob))?;
            println!("✓ Push subscription registered for {}", user);
        }
        None => {
            store.set_subscription(user_id, None)?;
            println!("✓ Push subscription removed for {}", user);
        }
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = trimforge_av::check_tools(&config.transcoder.program);
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("The transcoder is missing. Install ffmpeg or set transcoder.program.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::Config::default()
        }
    };

    println!("  Database: {:?}", config.storage.database_path);
    println!("  Uploads:  {:?}", config.storage.upload_dir);
    println!("  Outputs:  {:?}", config.storage.output_dir);
    println!(
        "  Transcoder: {:?} (timeout {}s, {} concurrent)",
        config.transcoder.program,
        config.transcoder.timeout_secs,
        config.transcoder.max_concurrent_jobs
    );
    println!(
        "  Push gateway: {}",
        config.push.gateway_url.as_deref().unwrap_or("disabled")
    );

    Ok(())
}
