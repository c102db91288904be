//! Command line interface for ProjectBuddy.

#[macro_use]
extern crate tracing;

use std::error::Error as StdError;
use std::io::Write as _;
use std::path::PathBuf;
use std::pin::pin;
use std::process::ExitCode;
use std::time::Duration;

use buddy_cohere_model::{CohereConfigBuilder, CohereProvider};
use buddy_core::ErrorKind;
use buddy_core::conversation::Role;
use buddy_core::draft::{ProjectBrief, generate_draft};
use chrono::Local;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use projectbuddy::export::export_to_dir;
use projectbuddy::{
    Category, Project, ProjectSession, ProjectSessionBuilder, ProjectStore,
};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;

type BoxError = Box<dyn StdError + Send + Sync>;

const BAR_CHAR: &str = "▎";

#[derive(Debug, Parser)]
#[command(name = "projectbuddy", about = "Draft, discuss and export project documents")]
struct Cli {
    /// Directory holding the project files.
    #[arg(long, env = "PROJECTBUDDY_DIR", default_value = "./projects")]
    dir: PathBuf,

    #[arg(long, env = "COHERE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "COHERE_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "COHERE_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Creates a project and drafts its document.
    New {
        #[arg(long)]
        title: String,
        /// One of business, academic or personal.
        #[arg(long, default_value = "academic")]
        category: Category,
        #[arg(long)]
        description: String,
        #[arg(long)]
        deadline: Option<String>,
        /// Starts with an empty document instead of a generated draft.
        #[arg(long)]
        no_draft: bool,
    },
    /// Lists the projects, most recently edited first.
    List,
    /// Prints a project document.
    Show { id: String },
    /// Chats with the assistant about a project document.
    Chat { id: String },
    /// Exports a project as a Word document.
    Export {
        id: String,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

enum SessionEvent {
    Fragment(String),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".bright_red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let store = ProjectStore::new(&cli.dir);
    let provider = model_provider(&cli);

    match cli.command {
        Command::New {
            title,
            category,
            description,
            deadline,
            no_draft,
        } => {
            let mut project = Project::new(title, category, description);
            if let Some(deadline) = deadline {
                project = project.with_deadline(deadline);
            }
            if !no_draft {
                let brief =
                    ProjectBrief::new(&project.title, &project.description);
                let spinner = spinner("✍️  Drafting...");
                let draft = generate_draft(&provider, &brief).await;
                spinner.finish_and_clear();
                project.content = draft?;
            }
            store.create(&project).await?;
            println!("{} {}", "Created".bright_green(), project.id.bold());
        }
        Command::List => {
            for project in store.list().await? {
                let edited = project
                    .last_edited
                    .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_owned());
                println!(
                    "{}  {}  {}  {}",
                    project.id.bold(),
                    project.title,
                    project.category.dimmed(),
                    edited.dimmed()
                );
            }
        }
        Command::Show { id } => {
            let project = load_project(&store, &id).await?;
            print_document(&project, &project.content);
        }
        Command::Chat { id } => {
            chat(store, provider, &id).await?;
        }
        Command::Export { id, out } => {
            let project = load_project(&store, &id).await?;
            let path =
                export_to_dir(&out, &project, Local::now().date_naive()).await?;
            println!("{} {}", "Exported".bright_green(), path.display());
        }
    }
    Ok(())
}

fn model_provider(cli: &Cli) -> CohereProvider {
    let mut builder = CohereConfigBuilder::new().api_key(cli.api_key.clone());
    if let Some(base_url) = &cli.base_url {
        builder = builder.with_base_url(base_url);
    }
    if let Some(model) = &cli.model {
        builder = builder.with_model(model);
    }
    CohereProvider::new(builder.build())
}

async fn load_project(store: &ProjectStore, id: &str) -> Result<Project, BoxError> {
    store
        .load(id)
        .await?
        .ok_or_else(|| format!("project {id:?} not found").into())
}

async fn chat(
    store: ProjectStore,
    provider: CohereProvider,
    id: &str,
) -> Result<(), BoxError> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut session =
        ProjectSessionBuilder::with_model_provider(provider, store)
            .on_fragment(move |fragment| {
                event_tx
                    .send(SessionEvent::Fragment(fragment.to_owned()))
                    .ok();
            })
            .open(id)
            .await?;

    let project = session.project();
    println!(
        "{} {}",
        "Chatting about".dimmed(),
        project.title.bright_white().bold()
    );
    println!(
        "{}",
        "Commands: /show /replace <file> /save /discard /export [dir] /quit"
            .dimmed()
    );
    for turn in session.session().history().iter() {
        print_turn(turn.role() == Role::User, turn.message());
    }

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            match run_command(&mut session, command).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    println!("{}{}", BAR_CHAR.bright_red(), err.bright_red());
                }
            }
            continue;
        }
        ask(&session, line, &mut event_rx).await;
    }
    Ok(())
}

/// Runs a REPL command, returning `false` when the REPL should exit.
async fn run_command(
    session: &mut ProjectSession,
    command: &str,
) -> Result<bool, BoxError> {
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map(|(name, arg)| (name, arg.trim()))
        .unwrap_or((command, ""));
    match name {
        "quit" | "exit" => return Ok(false),
        "show" => {
            let text = session.document().current_text();
            print_document(session.project(), &text);
        }
        "replace" => {
            if arg.is_empty() {
                println!("{}", "usage: /replace <file>".dimmed());
                return Ok(true);
            }
            let text = tokio::fs::read_to_string(arg).await?;
            session.document().begin_edit();
            session.document().update_draft(text);
            println!("{}", "Draft replaced, /save to keep it.".dimmed());
        }
        "save" => {
            if session.save_document().await? {
                println!("{}", "Saved.".bright_green());
            } else {
                println!("{}", "Nothing to save.".dimmed());
            }
        }
        "discard" => {
            session.document().cancel_edit();
            println!("{}", "Draft discarded.".dimmed());
        }
        "export" => {
            let dir = if arg.is_empty() { "." } else { arg };
            let mut project = session.project().clone();
            project.content = session.document().current_text();
            let path = export_to_dir(
                dir.as_ref(),
                &project,
                Local::now().date_naive(),
            )
            .await?;
            println!("{} {}", "Exported".bright_green(), path.display());
        }
        _ => println!("{}", format!("unknown command: /{name}").dimmed()),
    }
    Ok(true)
}

async fn ask(
    session: &ProjectSession,
    message: &str,
    event_rx: &mut mpsc::UnboundedReceiver<SessionEvent>,
) {
    let mut send = pin!(session.send_message(message));
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());
    let mut progress_bar = Some(spinner("🤔 Thinking..."));
    let mut started = false;
    let mut interrupted = false;

    let result = loop {
        select! {
            result = &mut send => break result,
            Some(event) = event_rx.recv() => {
                // Finish the progress bar before printing anything else.
                if let Some(progress_bar) = progress_bar.take() {
                    progress_bar.finish_and_clear();
                }
                let SessionEvent::Fragment(fragment) = event;
                if !started {
                    print!("{}🤖 ", BAR_CHAR.bright_cyan());
                    started = true;
                }
                print!("{}", fragment.bright_white());
                std::io::stdout().flush().ok();
            }
            _ = &mut ctrl_c, if !interrupted => {
                debug!("interrupted by the user");
                interrupted = true;
                session.session().cancel();
            }
        }
    };
    if let Some(progress_bar) = progress_bar.take() {
        progress_bar.finish_and_clear();
    }

    // Fragments are sent before the reply resolves.
    while let Ok(SessionEvent::Fragment(fragment)) = event_rx.try_recv() {
        if !started {
            print!("{}🤖 ", BAR_CHAR.bright_cyan());
            started = true;
        }
        print!("{}", fragment.bright_white());
    }
    if started {
        println!();
    }

    match result {
        Ok(_) => {}
        // Only a rejected request goes without the apology turn.
        Err(err)
            if err.kind() == ErrorKind::StreamInterrupted
                || (err.kind() == ErrorKind::Transport
                    && err.status().is_none()) =>
        {
            if let Some(turn) = session.session().history().last() {
                print_turn(false, turn.message());
            }
            warn!("reply interrupted: {err}");
        }
        Err(err) if err.kind() == ErrorKind::Cancelled => {
            println!("{}", "Cancelled.".dimmed());
        }
        Err(err) => {
            println!("{}{}", BAR_CHAR.bright_red(), err.bright_red());
        }
    }
}

fn print_turn(from_user: bool, message: &str) {
    if from_user {
        println!("{}{}", BAR_CHAR.bright_yellow(), message);
    } else {
        println!(
            "{}🤖 {}",
            BAR_CHAR.bright_cyan(),
            message.bright_white()
        );
    }
}

fn print_document(project: &Project, text: &str) {
    println!("{}", project.title.bright_white().bold());
    println!(
        "{}",
        format!("Department of {}", project.category.department()).dimmed()
    );
    println!();
    println!("{text}");
}

fn spinner(message: &'static str) -> ProgressBar {
    let progress_bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {wide_msg}") {
        progress_bar.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    progress_bar.set_message(message);
    progress_bar.enable_steady_tick(Duration::from_millis(100));
    progress_bar
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
