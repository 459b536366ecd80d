use anyhow::Context;
use clap::Parser;
use config::{
    ErrorLocale, FailedTurnPolicy, PathManager, Settings, load_env_file, resolve_api_key,
};
use llm::{DEFAULT_BASE_URL, GeminiProvider, ModelProvider};
use reverie_audio::DefaultAudioSource;
use reverie_core::{MessageRole, SendOutcome, SessionController, SessionEvent};
use tokio::sync::mpsc::UnboundedReceiver;

use clap_derive::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

mod commands;
mod logging;

use commands::{Command, CommandResult, LineBuffer};

#[derive(Parser, Debug)]
#[command(name = "reverie", author, version, about = "A conversation with an analyst", long_about = None)]
struct Args {
    /// Model identifier (defaults to the settings file)
    #[arg(long)]
    model: Option<String>,

    /// Custom base URL for the Gemini API (e.g., for proxy)
    #[arg(long, env = "GEMINI_BASE_URL")]
    base_url: Option<String>,

    /// Wait for each full reply instead of streaming it
    #[arg(long)]
    batch: bool,

    /// Keep the backend's default safety thresholds
    #[arg(long)]
    no_safety_override: bool,

    /// Language of the fallback message: auto, en, zh, bilingual
    #[arg(long)]
    error_locale: Option<ErrorLocale>,

    /// What a failed turn leaves in the model context: omit, record
    #[arg(long)]
    failed_turn: Option<FailedTurnPolicy>,

    /// Extra attempts for a call that fails before any reply text arrives
    #[arg(long)]
    retry: Option<u32>,

    /// Mirror logs to stderr
    #[arg(long, short)]
    tracing: bool,

    /// Directory holding settings.toml and logs/ (defaults to the platform directories)
    #[arg(long, env = config::paths::HOME_VAR)]
    home: Option<PathBuf>,

    /// List the models the API key can use and exit
    #[arg(long)]
    list_models: bool,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            settings.base_url = Some(base_url.clone());
        }
        let session = &mut settings.session;
        if self.batch {
            session.streaming = false;
        }
        if self.no_safety_override {
            session.safety_override = false;
        }
        if let Some(locale) = self.error_locale {
            session.error_locale = locale;
        }
        if let Some(policy) = self.failed_turn {
            session.failed_turn = policy;
        }
        if let Some(retry) = self.retry {
            session.retry_attempts = retry;
        }
    }
}

fn print_status_bar(model_name: &str, streaming: bool) {
    let terminal_width: usize = 80;
    let mode = if streaming { "stream" } else { "batch" };
    let status = format!(" {} • {} ", model_name, mode);
    let padding = terminal_width.saturating_sub(status.chars().count() + 2);
    let left_pad = padding / 2;
    let right_pad = padding - left_pad;

    println!("┌{}┐", "─".repeat(terminal_width - 2));
    println!("│{}{}{}│", " ".repeat(left_pad), status, " ".repeat(right_pad));
    println!("└{}┘", "─".repeat(terminal_width - 2));
}

/// Prints session events to the terminal
#[derive(Default)]
struct Printer {
    /// A reply line has been started and not yet terminated
    line_open: bool,
}

impl Printer {
    fn render(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::MessageAppended { message, .. } if message.role == MessageRole::Model => {
                if self.line_open {
                    println!();
                }
                print!("analyst: {}", message.content);
                self.line_open = true;
            }
            SessionEvent::MessageUpdated { delta, .. } => print!("{}", delta),
            SessionEvent::RecordingChanged(true) => println!("● Recording. Type /record to stop."),
            SessionEvent::RecordingChanged(false) => println!("■ Recording stopped."),
            SessionEvent::AttachmentStaged(kind) => println!("[{} attached]", kind),
            SessionEvent::Alert(message) => eprintln!("! {}", message),
            _ => {}
        }
        let _ = io::stdout().flush();
    }

    fn drain(&mut self, events: &mut UnboundedReceiver<SessionEvent>) {
        while let Ok(event) = events.try_recv() {
            self.render(event);
        }
    }

    fn end_reply(&mut self) {
        if std::mem::take(&mut self.line_open) {
            println!();
        }
    }
}

/// Send the staged input, printing the reply as it arrives
async fn send_and_render(
    session: &SessionController,
    events: &mut UnboundedReceiver<SessionEvent>,
    printer: &mut Printer,
) -> SendOutcome {
    let send = session.send();
    tokio::pin!(send);
    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            Some(event) = events.recv() => printer.render(event),
        }
    };
    printer.drain(events);
    printer.end_reply();
    outcome
}

async fn list_models(provider: &GeminiProvider, streaming: bool) -> anyhow::Result<()> {
    let models = provider.list_models().await?;
    for model in models {
        let limit = model
            .input_token_limit
            .map(|limit| format!("{} tokens", limit))
            .unwrap_or_default();
        let note = if model.supports_session(streaming) {
            ""
        } else {
            " (batch only)"
        };
        println!("{:<40} {:<32} {}{}", model.id, model.name(), limit, note);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    let args = Args::parse();

    if let Some(home) = &args.home {
        PathManager::set_home(home.clone());
    }
    let _log_guard = logging::init_logging(args.tracing);

    let mut settings = Settings::load().context("Failed to load settings")?;
    args.apply(&mut settings);

    let api_key = match resolve_api_key() {
        Ok(key) => key,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };

    let base_url = settings.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    let provider = GeminiProvider::new(base_url, &api_key)?;

    if args.list_models {
        return list_models(&provider, settings.session.streaming).await;
    }

    let model = provider
        .create_chat_model(&settings.model)
        .with_context(|| format!("Unknown model: {}", settings.model))?;

    info!(model = %settings.model, base_url, options = ?settings.session, "Starting session");

    let session = SessionController::new(
        model,
        Arc::new(DefaultAudioSource::new()),
        settings.session.clone(),
    );
    let mut events = session.subscribe();

    print_status_bar(session.model_name(), session.options().streaming);
    println!();
    println!("Type /help for commands, Ctrl+D or /quit to exit.");
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut buffer = LineBuffer::default();
    let mut printer = Printer::default();

    loop {
        print!("{}", if buffer.is_continuing() { "… " } else { "> " });
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
            None => {
                println!();
                println!("Goodbye!");
                break;
            }
        };

        let Some(input) = buffer.push(&line) else {
            continue;
        };
        let trimmed = input.trim();

        if trimmed.starts_with('/') && !input.contains('\n') {
            match Command::parse(trimmed) {
                Ok(cmd) => {
                    let result = cmd.execute(&session).await;
                    printer.drain(&mut events);
                    match result {
                        CommandResult::Exit => break,
                        CommandResult::Continue => continue,
                    }
                }
                Err(err) => {
                    println!("{}", err);
                    println!();
                    continue;
                }
            }
        }

        session.set_text(input);
        match send_and_render(&session, &mut events, &mut printer).await {
            SendOutcome::Skipped(_) => continue,
            SendOutcome::Replied => {}
            SendOutcome::Failed(e) => info!("Turn failed: {}", e),
        }
        println!();
    }

    if session.is_recording() {
        let _ = session.stop_recording().await;
    }

    println!("Conversation had {} messages", session.messages().len());
    Ok(())
}
