use clap::{Parser, Subcommand};
use intake_adapters::{ApiConfig, HttpGateway};
use intake_core::{JournalFeed, ServiceGateway, ToggleOutcome, WizardError, WizardSession, WizardStep};
use intake_domain::{Attachment, PrimaryFields};
use log::debug;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

/// Cliente de línea de comandos del backend de intake.
#[derive(Parser)]
#[command(name = "intake-cli", version)]
struct Cli {
    /// URL base del API (por defecto la de `.env` o http://localhost:5000/api).
    #[arg(long, env = "INTAKE_API_BASE_URL", global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Da de alta un alumno y, con `--iep`, guarda los objetivos elegidos.
    AddStudent {
        #[arg(long)]
        name: String,
        #[arg(long)]
        grade: String,
        /// PDF del IEP del que extraer objetivos.
        #[arg(long)]
        iep: Option<PathBuf>,
        /// Índices (desde 1) de los objetivos a guardar; por defecto todos.
        #[arg(long, value_delimiter = ',')]
        select: Vec<usize>,
    },
    /// Muestra un alumno y sus objetivos guardados.
    ShowStudent { id: u64 },
    /// Lista las entradas del diario.
    Entries,
    /// Alterna el "me gusta" de una entrada.
    Like { id: u64 },
}

fn fail(code: i32, msg: impl std::fmt::Display) -> ! {
    eprintln!("[intake] {msg}");
    exit(code)
}

fn report(err: &WizardError) -> ! {
    debug!("{err}");
    let code = if err.is_remote() { 5 } else { 4 };
    fail(code, format!("{} ({err})", err.user_message()))
}

fn read_attachment(path: &PathBuf) -> Attachment {
    let bytes = std::fs::read(path).unwrap_or_else(|e| fail(2, format!("cannot read {}: {e}", path.display())));
    let file_name = path.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| "iep.pdf".to_string());
    Attachment::pdf(file_name, bytes)
}

/// Índices sin repetir, en el orden dado: un índice repetido no debe
/// deseleccionar el objetivo.
fn unique_indices(select: Vec<usize>) -> Vec<usize> {
    let mut seen = HashSet::new();
    select.into_iter().filter(|i| seen.insert(*i)).collect()
}

async fn add_student(gateway: Arc<dyn ServiceGateway>, name: String, grade: String, iep: Option<PathBuf>, select: Vec<usize>) {
    let session = WizardSession::new(gateway);
    let fields = PrimaryFields::new().with("name", name).with("grade", grade);
    let attachment = iep.as_ref().map(read_attachment);

    let step = session.submit_primary(&fields, attachment.as_ref())
                      .await
                      .unwrap_or_else(|e| report(&e));
    let id = session.entity_id().unwrap_or_default();
    println!("student {id} created");
    if step == WizardStep::Complete {
        return;
    }

    let candidates = session.candidates();
    if let Some(notice) = session.notice() {
        println!("{notice}");
        return;
    }
    for (i, goal) in candidates.iter().enumerate() {
        println!("  {}. {} (baseline: {})", i + 1, goal.preview(), goal.baseline);
    }
    let chosen = if select.is_empty() {
        (1..=candidates.len()).collect()
    } else {
        unique_indices(select)
    };
    for i in chosen {
        let goal = candidates.get(i.wrapping_sub(1))
                             .unwrap_or_else(|| fail(2, format!("no goal number {i}")));
        session.toggle_selection(goal).unwrap_or_else(|e| report(&e));
    }
    session.commit_selection().await.unwrap_or_else(|e| report(&e));
    println!("{} goals saved for student {id}", session.selected().len());
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = ApiConfig::from_env().unwrap_or_else(|e| fail(3, e));
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    let http = HttpGateway::new(&config).unwrap_or_else(|e| fail(3, e));
    let gateway: Arc<dyn ServiceGateway> = Arc::new(http);

    match cli.command {
        Command::AddStudent { name, grade, iep, select } => add_student(gateway, name, grade, iep, select).await,
        Command::ShowStudent { id } => {
            let student = gateway.fetch_primary(id)
                                 .await
                                 .unwrap_or_else(|e| fail(5, format!("Failed to load student ({e})")));
            match serde_json::to_string_pretty(&student) {
                Ok(json) => println!("{json}"),
                Err(e) => fail(5, e),
            }
        }
        Command::Entries => {
            let feed = JournalFeed::new(gateway);
            feed.load().await.unwrap_or_else(|e| report(&e));
            for e in feed.entries() {
                let heart = if e.liked == Some(true) { "♥" } else { "♡" };
                println!("{:>4} {} {:>3}  {}  [{}]", e.id, heart, e.like_count, e.title, e.tags.join(", "));
            }
        }
        Command::Like { id } => {
            let feed = JournalFeed::new(gateway);
            feed.load().await.unwrap_or_else(|e| report(&e));
            match feed.toggle_like(id).await {
                Ok(ToggleOutcome::Confirmed { count, active }) => {
                    println!("entry {id}: {} ({count} likes)", if active { "liked" } else { "unliked" })
                }
                Ok(other) => println!("entry {id}: {other:?}"),
                Err(e) => report(&e),
            }
        }
    }
}
