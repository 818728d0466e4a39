use std::fmt;
use std::path::{Path, PathBuf};

use certify_core::model::{
    Catalog, CategoryId, FileMeta, KpiId, ProjectId, QuestionId, QuestionKind, ResponseValue,
    StorageHandle, UploadId,
};
use clap::{Parser, Subcommand};
use services::{AppServices, Clock, ConflictPolicy, QuestionnaireService, SaveOutcome};
use tracing::debug;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Debug)]
enum ArgsError {
    InvalidDbUrl { raw: String },
    InvalidProjectId { raw: String },
    InvalidBoolean { question: QuestionId, raw: String },
    TooManyValues { question: QuestionId },
    UnreadableFile { path: PathBuf, reason: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidProjectId { raw } => write!(f, "invalid --project value: {raw:?}"),
            ArgsError::InvalidBoolean { question, raw } => {
                write!(f, "{question} expects yes/no, got {raw:?}")
            }
            ArgsError::TooManyValues { question } => {
                write!(f, "{question} takes a single value")
            }
            ArgsError::UnreadableFile { path, reason } => {
                write!(f, "cannot read {}: {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for ArgsError {}

/// Track certification questionnaire progress for a project.
#[derive(Debug, Parser)]
#[command(name = "certify", version)]
struct Cli {
    /// SQLite database holding questionnaire snapshots.
    #[arg(long, env = "CERTIFY_DB_URL", default_value = "sqlite://certify.sqlite3")]
    db: String,

    /// Project whose questionnaire is edited.
    #[arg(long, env = "CERTIFY_PROJECT_ID", default_value = "default")]
    project: String,

    /// JSON rubric to use instead of the built-in one.
    #[arg(long, env = "CERTIFY_CATALOG")]
    catalog: Option<PathBuf>,

    /// Refuse to save when another editor changed the snapshot.
    #[arg(long)]
    reject_conflicts: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the rubric tree.
    Catalog,
    /// Show progress overall or for one category.
    Status {
        #[arg(long)]
        category: Option<String>,
    },
    /// Answer a question and save. No values clears the answer.
    Answer { question: String, values: Vec<String> },
    /// Attach a document to an upload slot and save.
    Upload { slot: String, path: PathBuf },
    /// Remove an answer or an upload record and save.
    Remove {
        #[arg(required_unless_present = "upload")]
        question: Option<String>,
        #[arg(long, conflicts_with = "question")]
        upload: Option<String>,
    },
    /// Check required questions of a KPI, save, and print the next KPI.
    Next { kpi: String },
    /// Delete the saved snapshot and all answers.
    Clear,
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

/// Turns raw CLI words into a value shaped for the question kind.
fn parse_answer(
    question: &QuestionId,
    kind: QuestionKind,
    mut values: Vec<String>,
) -> Result<ResponseValue, ArgsError> {
    if values.is_empty() {
        return Ok(ResponseValue::Empty);
    }
    match kind {
        QuestionKind::MultiSelect => Ok(ResponseValue::Choices(values)),
        QuestionKind::SingleChoice | QuestionKind::Boolean if values.len() > 1 => {
            Err(ArgsError::TooManyValues {
                question: question.clone(),
            })
        }
        QuestionKind::SingleChoice => Ok(ResponseValue::Text(values.remove(0))),
        QuestionKind::Boolean => {
            let raw = values.remove(0);
            match raw.trim().to_ascii_lowercase().as_str() {
                "yes" | "y" | "true" => Ok(ResponseValue::Flag(true)),
                "no" | "n" | "false" => Ok(ResponseValue::Flag(false)),
                _ => Err(ArgsError::InvalidBoolean {
                    question: question.clone(),
                    raw,
                }),
            }
        }
    }
}

fn file_meta_for(path: &Path) -> Result<FileMeta, ArgsError> {
    let unreadable = |reason: String| ArgsError::UnreadableFile {
        path: path.to_path_buf(),
        reason,
    };
    let metadata = std::fs::metadata(path).map_err(|e| unreadable(e.to_string()))?;
    if !metadata.is_file() {
        return Err(unreadable("not a regular file".into()));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| unreadable("missing file name".into()))?;
    Ok(FileMeta::from_file_name(name, metadata.len()))
}

fn print_catalog(catalog: &Catalog) {
    for category in catalog.categories() {
        println!("{}: {}", category.id, category.title);
        for kpi in &category.kpis {
            println!("  {}: {} ({} pts)", kpi.id, kpi.title, kpi.max_points);
            for q in &kpi.questions {
                let marker = if q.required { "*" } else { " " };
                if q.options.is_empty() {
                    println!("    {marker} {} [{}] {}", q.id, q.kind, q.label);
                } else {
                    println!(
                        "    {marker} {} [{}: {}] {}",
                        q.id,
                        q.kind,
                        q.options.join("|"),
                        q.label
                    );
                }
            }
            for slot in &kpi.uploads {
                println!(
                    "    ^ {} [{} ≤{}MB] {}",
                    slot.id,
                    slot.allowed_extensions.join(","),
                    slot.max_size_mb,
                    slot.label
                );
            }
        }
    }
}

fn print_status(
    questionnaire: &QuestionnaireService,
    category: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let rows = match category {
        Some(raw) => vec![questionnaire.category_progress(&CategoryId::new(raw))?],
        None => questionnaire.all_category_progress(),
    };
    for row in rows {
        println!(
            "{:<16} {:>3}%  {}/{} KPIs  {}/{} items  {}/{} pts",
            row.category_id,
            row.overall_progress_percent,
            row.completed_kpis,
            row.total_kpis,
            row.completed_items,
            row.total_items,
            row.earned_points,
            row.max_points
        );
    }
    let overall = questionnaire.overall_progress();
    println!(
        "{:<16} {:>3}%  {}/{} KPIs  {}/{} items  {}/{} pts",
        "overall",
        overall.percent,
        overall.completed_kpis,
        overall.total_kpis,
        overall.completed_items,
        overall.total_items,
        overall.earned_points,
        overall.max_points
    );
    match questionnaire.persistence().last_saved_at() {
        Some(at) => println!("last saved {}", at.to_rfc3339()),
        None => println!("never saved"),
    }
    Ok(())
}

async fn save(questionnaire: &QuestionnaireService) -> Result<(), Box<dyn std::error::Error>> {
    match questionnaire.save().await? {
        SaveOutcome::Saved { saved_at } => println!("saved at {}", saved_at.to_rfc3339()),
        SaveOutcome::Unchanged => println!("nothing to save"),
    }
    Ok(())
}

fn init_logging(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let project_id: ProjectId = cli
        .project
        .parse()
        .map_err(|_| ArgsError::InvalidProjectId {
            raw: cli.project.clone(),
        })?;
    let db_url = normalize_sqlite_url(cli.db);
    prepare_sqlite_file(&db_url)?;
    let policy = if cli.reject_conflicts {
        ConflictPolicy::RejectOnConflict
    } else {
        ConflictPolicy::LastWriterWins
    };
    debug!(%db_url, project = %project_id, ?policy, "starting");

    let services = AppServices::new_sqlite(
        &db_url,
        Clock::default(),
        project_id,
        cli.catalog.as_deref(),
        policy,
    )
    .await?;
    let questionnaire = services.questionnaire();

    match cli.command {
        Command::Catalog => print_catalog(questionnaire.catalog()),
        Command::Status { category } => print_status(&questionnaire, category)?,
        Command::Answer { question, values } => {
            let question = QuestionId::new(question);
            let kind = questionnaire.catalog().question(&question)?.kind;
            let value = parse_answer(&question, kind, values)?;
            questionnaire.answer(&question, value)?;
            save(&questionnaire).await?;
        }
        Command::Upload { slot, path } => {
            let slot = UploadId::new(slot);
            let meta = file_meta_for(&path)?;
            let handle = std::fs::canonicalize(&path)
                .ok()
                .map(|p| StorageHandle::new(p.display().to_string()));
            questionnaire.attach_upload(&slot, meta, handle)?;
            save(&questionnaire).await?;
        }
        Command::Remove { question, upload } => {
            let removed = match (question, upload) {
                (_, Some(slot)) => questionnaire.remove_upload(&UploadId::new(slot))?,
                (Some(question), None) => {
                    questionnaire.clear_answer(&QuestionId::new(question))?
                }
                (None, None) => false,
            };
            if removed {
                save(&questionnaire).await?;
            } else {
                println!("nothing to remove");
            }
        }
        Command::Next { kpi } => match questionnaire.save_and_next(&KpiId::new(kpi)).await? {
            Some(next) => println!("next: {next}"),
            None => println!("all KPIs visited"),
        },
        Command::Clear => {
            questionnaire.clear_all().await?;
            println!("cleared {}", services.project_id());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.verbose) {
        eprintln!("{err}");
    }

    if let Err(err) = run(cli).await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
