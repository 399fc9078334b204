use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use twos_chat_core::{
    CancelToken, ChatSession, OpenAiBackend, PersistedState, PollOptions, ResourceOutcome,
    StateFile, StderrProgress, SyncCoordinator, SyncOptions, SyncReport, TwosClient,
    DEFAULT_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_TWOS_BASE_URL,
};

#[derive(Parser)]
#[command(name = "twos-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path of the JSON file holding credentials and resource IDs.
    #[arg(long, default_value = "twos-chat-state.json")]
    state_file: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_key: Option<String>,

    /// OpenAI API base URL
    #[arg(long, default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// Twos API base URL
    #[arg(long, default_value = DEFAULT_TWOS_BASE_URL)]
    twos_base_url: String,

    /// Model used for the provisioned assistant
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
}

#[derive(Subcommand)]
enum Command {
    /// Log in to Twos and store the user ID and token in the state file.
    Login {
        #[arg(long)]
        username: String,
        /// Password; read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Fetch all notes, upload them, and provision a fresh vector store and assistant.
    Sync {
        /// Upload workers; values above 1 switch to the concurrent upload path.
        #[arg(long, default_value = "1")]
        concurrency: usize,
    },
    /// Chat against the synced notes.
    Chat {
        /// Send a single message and exit; omit for an interactive session.
        #[arg(long)]
        message: Option<String>,
        /// Milliseconds between run-status checks.
        #[arg(long, default_value = "1000")]
        poll_interval_ms: u64,
        /// Abort a run after this many status checks; unbounded when omitted.
        #[arg(long)]
        max_poll_attempts: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let state_file = StateFile::new(&cli.state_file);

    match &cli.command {
        Command::Login { username, password } => login(&cli, &state_file, username, password.clone()).await,
        Command::Sync { concurrency } => sync(&cli, &state_file, *concurrency).await,
        Command::Chat {
            message,
            poll_interval_ms,
            max_poll_attempts,
        } => {
            chat(
                &cli,
                &state_file,
                message.clone(),
                PollOptions {
                    interval: std::time::Duration::from_millis(*poll_interval_ms),
                    max_attempts: *max_poll_attempts,
                },
            )
            .await
        }
    }
}

async fn login(
    cli: &Cli,
    state_file: &StateFile,
    username: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let password = match password {
        Some(password) => password,
        None => prompt_password()?,
    };

    let auth = TwosClient::login(&cli.twos_base_url, username, &password).await?;

    let mut state = state_file.load()?;
    state.twos_user_id = Some(auth.user_id);
    state.twos_token = Some(auth.token);
    if let Some(key) = &cli.openai_key {
        state.openai_api_key = Some(key.clone());
    }
    state_file.save(&state)?;

    println!("Logged in as {username}; credentials saved to {}", cli.state_file);
    Ok(())
}

async fn sync(cli: &Cli, state_file: &StateFile, concurrency: usize) -> anyhow::Result<()> {
    let state = state_file.load()?;
    let backend = backend(cli, &state)?;
    let (user_id, token) = twos_credentials(&state)?;

    let options = SyncOptions {
        upload_concurrency: (concurrency > 1).then_some(concurrency),
        ..SyncOptions::default()
    };

    let coordinator = SyncCoordinator::new(Arc::new(backend), state_file.clone(), options)
        .with_progress(Arc::new(StderrProgress));
    let source = TwosClient::new(&cli.twos_base_url, user_id, token);

    info!(started_at = %Utc::now().to_rfc3339(), "starting sync");
    let report = coordinator.sync(&source).await.inspect_err(|error| {
        tracing::error!(%error, "sync failed");
        eprintln!("Sync failed, please try again.");
    })?;

    warn_on_leaks(&report);
    println!(
        "Synced {} batches into vector store {} (assistant {})",
        report.batches_uploaded, report.vector_store_id, report.assistant_id
    );
    Ok(())
}

async fn chat(
    cli: &Cli,
    state_file: &StateFile,
    message: Option<String>,
    poll: PollOptions,
) -> anyhow::Result<()> {
    let state = state_file.load()?;
    let backend = backend(cli, &state)?;
    let mut session =
        ChatSession::from_state(Arc::new(backend), &state)?.with_poll_options(poll);

    let cancel = CancelToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    if let Some(message) = message {
        let reply = session.send_with_cancel(&message, Some(&cancel)).await?;
        println!("{reply}");
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if cancel.is_cancelled() {
            break;
        }

        match session.send_with_cancel(line, Some(&cancel)).await {
            Ok(reply) => println!("{reply}"),
            Err(error) => {
                warn!(%error, "message failed");
                eprintln!("An error occurred. Please try again.");
            }
        }
    }
    Ok(())
}

fn backend(cli: &Cli, state: &PersistedState) -> anyhow::Result<OpenAiBackend> {
    let api_key = cli
        .openai_key
        .clone()
        .or_else(|| state.openai_api_key.clone())
        .context("OpenAI API key required (use --openai-key or OPENAI_API_KEY)")?;
    Ok(OpenAiBackend::new(&cli.openai_base_url, api_key, &cli.model)?)
}

fn twos_credentials(state: &PersistedState) -> anyhow::Result<(String, String)> {
    let user_id = state
        .twos_user_id
        .clone()
        .context("no Twos user ID in the state file; run `twos-chat login` first")?;
    let token = state
        .twos_token
        .clone()
        .context("no Twos token in the state file; run `twos-chat login` first")?;
    Ok((user_id, token))
}

fn warn_on_leaks(report: &SyncReport) {
    if let ResourceOutcome::Failed(reason) = &report.cleanup.assistant {
        warn!(reason = %reason, "previous assistant could not be deleted");
    }
    if let ResourceOutcome::Failed(reason) = &report.cleanup.vector_store {
        warn!(reason = %reason, "previous vector store could not be deleted");
    }
}

fn prompt_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut password = String::new();
    std::io::stdin().lock().read_line(&mut password)?;
    Ok(password.trim_end_matches(['\r', '\n']).to_string())
}
