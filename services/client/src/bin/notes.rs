//! services/client/src/bin/notes.rs

use clap::{Args, Parser, Subcommand, ValueEnum};
use client_lib::{
    config::Config,
    diagnostics,
    error::ClientError,
    session::{AuthOutcome, GuardDecision},
    state::AppState,
};
use notes_core::{
    Credentials, EditPatch, Note, NoteInput, NotePage, NoteQuery, RecordId, Registration,
    SortOrder, Visibility,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "notes", version, about = "Command-line client for the notes service")]
struct Cli {
    /// Backend origin; overrides NOTES_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with email and password.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account. Log in separately afterwards.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    /// Show who the stored credentials belong to.
    Whoami,
    /// Print the sign-in URL, or adopt the token it handed back.
    Oauth {
        #[arg(long)]
        token: Option<String>,
    },
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        password: Option<String>,
    },
    List(ListArgs),
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long)]
        public: bool,
        /// Save as a draft; only one of title or content is required.
        #[arg(long)]
        draft: bool,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        public: Option<bool>,
    },
    Delete {
        id: String,
    },
    /// Append stdin lines to a note's body, autosaving as you type. The note
    /// is saved explicitly at end of input.
    Edit {
        id: String,
    },
    Stats,
    Features,
    /// Check the backend and report what answered.
    Doctor,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    limit: u32,
    #[arg(long)]
    search: Option<String>,
    #[arg(long, default_value = "updated_at")]
    sort_by: String,
    #[arg(long, value_enum, default_value_t = SortArg::Desc)]
    sort_order: SortArg,
    #[arg(long, value_enum)]
    visibility: Option<VisibilityArg>,
    /// Only drafts.
    #[arg(long, conflicts_with = "public")]
    drafts: bool,
    /// Everyone's public notes; no login needed.
    #[arg(long)]
    public: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Asc,
    Desc,
}

#[derive(Clone, Copy, ValueEnum)]
enum VisibilityArg {
    All,
    Public,
    Private,
}

impl ListArgs {
    fn to_query(&self) -> NoteQuery {
        NoteQuery {
            page: self.page,
            limit: self.limit,
            search: self.search.clone(),
            sort_by: self.sort_by.clone(),
            sort_order: match self.sort_order {
                SortArg::Asc => SortOrder::Asc,
                SortArg::Desc => SortOrder::Desc,
            },
            visibility: self.visibility.map(|v| match v {
                VisibilityArg::All => Visibility::All,
                VisibilityArg::Public => Visibility::Public,
                VisibilityArg::Private => Visibility::Private,
            }),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    dotenvy::dotenv().ok();
    let config = match load_config(cli.api_url.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. Backend at {}", config.api_origin);

    // --- 2. Build the Application Context ---
    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            return ExitCode::FAILURE;
        }
    };

    // --- 3. Run the Command ---
    let result = run(&state, cli.command).await;
    state.shutdown();
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}

/// Environment configuration, with `--api-url` taking precedence over
/// `NOTES_API_URL`.
fn load_config(api_url: Option<&str>) -> Result<Config, ClientError> {
    let config = Config::from_lookup(|key| match (key, api_url) {
        ("NOTES_API_URL", Some(url)) => Some(url.to_string()),
        _ => std::env::var(key).ok(),
    })?;
    Ok(config)
}

async fn run(state: &AppState, command: Command) -> Result<ExitCode, ClientError> {
    match command {
        Command::Login { email, password } => {
            let password = password_or_stdin(password).await?;
            let outcome = state.session.login(&Credentials { email, password }).await;
            Ok(report(outcome, |o| {
                let name = o.user.as_ref().map(|u| u.name.as_str()).unwrap_or_default();
                format!("Logged in as {}", name)
            }))
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let password = password_or_stdin(password).await?;
            let outcome = state
                .session
                .register(&Registration {
                    name,
                    email,
                    password,
                })
                .await;
            Ok(report(outcome, |_| {
                "Account created. Run `notes login` to sign in.".to_string()
            }))
        }
        Command::Logout => {
            let pending = state.session.logout();
            println!("Logged out");
            if let Err(e) = pending.await {
                warn!("Logout task failed: {}", e);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Whoami => {
            if let Some(code) = require_login(state).await {
                return Ok(code);
            }
            if let Some(session) = state.session.current_session() {
                match session.email {
                    Some(email) => println!("{} <{}> (id {})", session.display_name, email, session.user_id),
                    None => println!("{} (id {})", session.display_name, session.user_id),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Oauth { token: None } => {
            println!("{}", state.session.oauth_url());
            Ok(ExitCode::SUCCESS)
        }
        Command::Oauth { token: Some(token) } => {
            let resolved = state.session.adopt_token(&token).await;
            match resolved.session() {
                Some(session) => {
                    println!("Logged in as {}", session.display_name);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("error: the token was not accepted");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::ForgotPassword { email } => {
            let outcome = state.session.forgot_password(&email).await;
            Ok(report(outcome, |o| {
                o.message
                    .clone()
                    .unwrap_or_else(|| "Check your inbox for a reset link.".to_string())
            }))
        }
        Command::ResetPassword { token, password } => {
            let password = password_or_stdin(password).await?;
            let outcome = state.session.reset_password(&token, &password).await;
            Ok(report(outcome, |o| {
                o.message
                    .clone()
                    .unwrap_or_else(|| "Password updated.".to_string())
            }))
        }
        Command::List(args) => {
            let query = args.to_query();
            if args.public {
                print_page(&state.notes.list_public_notes(&query).await?);
                return Ok(ExitCode::SUCCESS);
            }
            if let Some(code) = require_login(state).await {
                return Ok(code);
            }
            let page = if args.drafts {
                state.notes.list_drafts(&query).await?
            } else {
                state.notes.list_notes(&query).await?
            };
            print_page(&page);
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { id } => {
            if let Some(code) = require_login(state).await {
                return Ok(code);
            }
            let note = state.notes.get_note(&parse_id(&id)).await?;
            print_note(&note);
            Ok(ExitCode::SUCCESS)
        }
        Command::Create {
            title,
            content,
            public,
            draft,
        } => {
            if let Some(code) = require_login(state).await {
                return Ok(code);
            }
            let input = NoteInput {
                is_public: public,
                ..NoteInput::new(title, content)
            };
            let note = if draft {
                state.notes.save_draft(&input).await?
            } else {
                state.notes.create_note(&input).await?
            };
            print_note(&note);
            Ok(ExitCode::SUCCESS)
        }
        Command::Update {
            id,
            title,
            content,
            public,
        } => {
            if let Some(code) = require_login(state).await {
                return Ok(code);
            }
            let id = parse_id(&id);
            let mut input = state.notes.get_note(&id).await?.to_input();
            if let Some(title) = title {
                input.title = title;
            }
            if let Some(content) = content {
                input.content = content;
            }
            if let Some(public) = public {
                input.is_public = public;
            }
            input.is_draft = false;
            let note = state.notes.update_note(&id, &input).await?;
            print_note(&note);
            Ok(ExitCode::SUCCESS)
        }
        Command::Delete { id } => {
            if let Some(code) = require_login(state).await {
                return Ok(code);
            }
            let id = parse_id(&id);
            state.autosave.cancel(&id);
            state.notes.delete_note(&id).await?;
            println!("Deleted note {}", id);
            Ok(ExitCode::SUCCESS)
        }
        Command::Edit { id } => {
            if let Some(code) = require_login(state).await {
                return Ok(code);
            }
            edit(state, parse_id(&id)).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Stats => {
            if let Some(code) = require_login(state).await {
                return Ok(code);
            }
            print_json(&state.notes.stats().await?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Features => {
            print_json(&state.notes.features().await?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Doctor => {
            let report = diagnostics::run(&state.transport).await;
            println!("Backend: {}", report.origin);
            println!(
                "Bearer token stored: {}",
                if report.token_stored { "yes" } else { "no" }
            );
            for check in &report.checks {
                let mark = if check.success { "ok  " } else { "FAIL" };
                println!("[{}] {:<13} {}", mark, check.name, check.detail);
            }
            Ok(if report.all_passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// Streams stdin into the note body through the autosave scheduler, then
/// saves the final text explicitly.
async fn edit(state: &AppState, id: RecordId) -> Result<(), ClientError> {
    let note = state.notes.get_note(&id).await?;
    let mut content = note.content.clone();
    state.autosave.track(&id, note.title.clone(), content.clone());
    eprintln!(
        "Editing '{}'. Lines are appended and autosaved after {} ms of quiet; end input to save.",
        note.title,
        state.autosave.delay().as_millis()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
            _ = state.shutdown.cancelled() => None,
        };
        let Some(line) = line else { break };
        if !content.is_empty() {
            content.push('\n');
        }
        content.push_str(&line);
        state.autosave.on_edit(Some(&id), EditPatch::content(content.clone()));
    }

    state.autosave.cancel(&id);
    let input = NoteInput {
        content,
        ..note.to_input()
    };
    let saved = state.notes.update_note(&id, &input).await?;
    eprintln!("Saved.");
    print_note(&saved);
    Ok(())
}

/// Runs the initial credential check and turns a redirect into an exit code.
async fn require_login(state: &AppState) -> Option<ExitCode> {
    state.start().await;
    match state.session.require_auth() {
        GuardDecision::Allow => None,
        GuardDecision::Redirect(route) => {
            eprintln!(
                "error: not logged in (run `notes login`; web route {})",
                route.path()
            );
            Some(ExitCode::FAILURE)
        }
        GuardDecision::Pending => Some(ExitCode::FAILURE),
    }
}

fn report(outcome: AuthOutcome, success: impl FnOnce(&AuthOutcome) -> String) -> ExitCode {
    if outcome.success {
        println!("{}", success(&outcome));
        ExitCode::SUCCESS
    } else {
        eprintln!(
            "error: {}",
            outcome.error.as_deref().unwrap_or("Request failed")
        );
        ExitCode::FAILURE
    }
}

async fn password_or_stdin(password: Option<String>) -> Result<String, ClientError> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    Ok(lines.next_line().await?.unwrap_or_default())
}

fn parse_id(raw: &str) -> RecordId {
    match raw.parse::<RecordId>() {
        Ok(id) => id,
        Err(never) => match never {},
    }
}

fn print_page(page: &NotePage) {
    if page.notes.is_empty() {
        println!("No notes.");
    }
    for note in &page.notes {
        let id = note.id.as_ref().map(ToString::to_string).unwrap_or_default();
        let mut flags = Vec::new();
        if note.is_public {
            flags.push("public");
        }
        if note.is_draft {
            flags.push("draft");
        }
        let updated = note
            .updated_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{:>6}  {:<40}  {:<16}  {}", id, note.title, updated, flags.join(","));
    }
    println!("(total pages: {})", page.total_pages);
}

fn print_note(note: &Note) {
    let id = note.id.as_ref().map(ToString::to_string).unwrap_or_default();
    println!("# {} (id {})", note.title, id);
    if note.is_public {
        println!("public");
    }
    if note.is_draft {
        println!("draft");
    }
    println!();
    println!("{}", note.content);
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}
