#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{CommandFactory as _, Parser, Subcommand};
use tracing::debug;

use crate::board::focus::descendant_closure;
use crate::board::model::{
    ColumnId, Priority, Task, TaskDraft, TaskId, TaskStatus, format_date, parse_date, parse_tags,
};
use crate::board::service::BoardService;
use crate::board::tree::{BoardDocument, TaskTree};
use crate::config::{self, Config};
use crate::error::TierboardError;
use crate::logging;
use crate::output::table::Table;
use crate::store::file::FileStore;
use crate::store::session::Session;
use crate::store::workspace::WorkspaceRegistry;
use crate::store::{BoardStore, StoreKey};
use crate::tui;

#[derive(Debug, Parser)]
#[command(
    name = "tierboard",
    version,
    about = "Four-column hierarchical task board"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "ws")]
    Workspace(WorkspaceArgs),
    Task(TaskArgs),
    /// Write the board to a JSON or YAML file
    Export(TransferArgs),
    /// Replace the board with a JSON or YAML file
    Import(TransferArgs),
    Login(LoginArgs),
    Logout,
    Whoami,
    Config(ConfigArgs),
    Completion(CompletionArgs),
    Version,
}

#[derive(Debug, Parser)]
pub struct WorkspaceArgs {
    #[command(subcommand)]
    pub cmd: WorkspaceCmd,
}

#[derive(Debug, Subcommand)]
pub enum WorkspaceCmd {
    List,
    Add { name: String },
    Rename { old: String, new: String },
    #[command(alias = "remove")]
    Rm { name: String },
    /// Make a workspace the active one
    Use { name: String },
}

#[derive(Debug, Parser)]
pub struct TaskArgs {
    /// Workspace to operate on (defaults to the active one)
    #[arg(short = 'w', long = "workspace", global = true)]
    pub workspace: Option<String>,
    #[command(subcommand)]
    pub cmd: TaskCmd,
}

#[derive(Debug, Subcommand)]
pub enum TaskCmd {
    #[command(alias = "ls")]
    List(TaskListArgs),
    Add(TaskAddArgs),
    #[command(alias = "remove")]
    Rm { id: String },
    /// Reorder a task among its siblings (0-based indices)
    Move {
        column: ColumnId,
        from: usize,
        to: usize,
    },
    Status { id: String, status: TaskStatus },
    /// Print a task and everything below it
    Focus { id: String },
}

#[derive(Debug, Parser)]
pub struct TaskListArgs {
    /// Output in JSON format
    #[arg(long = "json", conflicts_with = "csv")]
    pub json: bool,
    /// Output as CSV
    #[arg(long = "csv")]
    pub csv: bool,
}

#[derive(Debug, Parser)]
pub struct TaskAddArgs {
    /// final, parent, child or grandchild
    pub column: ColumnId,
    pub title: String,
    /// Id (or unique id prefix/suffix) of the parent task
    #[arg(short = 'p', long = "parent")]
    pub parent: Option<String>,
    #[arg(long = "priority", default_value = "none")]
    pub priority: Priority,
    /// YYYY-MM-DD
    #[arg(short = 'd', long = "deadline")]
    pub deadline: Option<String>,
    /// Comma-separated tags
    #[arg(short = 't', long = "tags")]
    pub tags: Option<String>,
    /// #RRGGBB, final tasks only
    #[arg(short = 'c', long = "color")]
    pub color: Option<String>,
    #[arg(long = "content", default_value = "")]
    pub content: String,
}

#[derive(Debug, Parser)]
pub struct TransferArgs {
    pub file: PathBuf,
    /// Workspace to operate on (defaults to the active one)
    #[arg(short = 'w', long = "workspace")]
    pub workspace: Option<String>,
}

#[derive(Debug, Parser)]
pub struct LoginArgs {
    pub user: String,
}

#[derive(Debug, Parser)]
pub struct CompletionArgs {
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub cmd: ConfigCmd,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCmd {
    List,
    Set(ConfigSetArgs),
    Get(ConfigGetArgs),
}

#[derive(Debug, Parser)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Parser)]
pub struct ConfigGetArgs {
    pub key: String,
}

pub async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let Some(cmd) = cli.cmd else {
        return cmd_default().await;
    };
    logging::init_stderr();

    match cmd {
        Commands::Completion(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "tierboard", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Version => Ok(cmd_version()),
        Commands::Config(args) => match args.cmd {
            ConfigCmd::List => {
                print!("{}", config::list_resolved_toml()?);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCmd::Set(set) => {
                config::set_value_string(&set.key, &set.value)?;
                println!("Set {} = {}", set.key, set.value);
                Ok(ExitCode::SUCCESS)
            }
            ConfigCmd::Get(get) => match config::get_value_string(&get.key)? {
                Some(v) => {
                    println!("{v}");
                    Ok(ExitCode::SUCCESS)
                }
                None => anyhow::bail!(
                    "configuration key '{}' not found - use 'tierboard config list' to see available keys",
                    get.key
                ),
            },
        },
        Commands::Login(args) => cmd_login(&args.user).await,
        Commands::Logout => cmd_logout().await,
        Commands::Whoami => {
            let env = Env::load().await?;
            match env.session.user() {
                Some(user) => println!("{user}"),
                None => println!("local (not signed in)"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Workspace(args) => cmd_workspace(args.cmd).await,
        Commands::Task(args) => cmd_task(args).await,
        Commands::Export(args) => cmd_export(&args).await,
        Commands::Import(args) => cmd_import(&args).await,
    }
}

/// Config, store and identity shared by every board command.
struct Env {
    cfg: Config,
    config_path: PathBuf,
    store: Arc<dyn BoardStore>,
    session: Session,
    session_path: PathBuf,
}

impl Env {
    async fn load() -> anyhow::Result<Self> {
        let (cfg, paths) = tokio::task::spawn_blocking(|| -> anyhow::Result<_> {
            let (cfg, _doc, paths) = config::load()?;
            Ok((cfg, paths))
        })
        .await??;
        let session_path = cfg.session_path()?;
        let session = Session::load(&session_path)
            .with_context(|| format!("failed to read session {}", session_path.display()))?;
        let store: Arc<dyn BoardStore> = Arc::new(FileStore::new(cfg.data_dir()?));
        debug!(user = ?session.user(), "environment loaded");
        Ok(Self {
            cfg,
            config_path: paths.config_file,
            store,
            session,
            session_path,
        })
    }

    fn registry(&self) -> WorkspaceRegistry {
        WorkspaceRegistry::open(Arc::clone(&self.store), self.session.scope())
    }

    /// Key of `workspace`, or of the active workspace.
    fn key(&self, workspace: Option<&str>) -> anyhow::Result<StoreKey> {
        let registry = self.registry();
        match workspace {
            Some(name) if !registry.list().contains(name) => {
                Err(TierboardError::WorkspaceNotFound(name.to_owned()).into())
            }
            Some(name) => Ok(registry.key(name)),
            None => Ok(registry.active_key()),
        }
    }

    fn board(&self, workspace: Option<&str>) -> anyhow::Result<BoardService> {
        let key = self.key(workspace)?;
        Ok(BoardService::open(
            Arc::clone(&self.store),
            key,
            self.cfg.board.palette.clone(),
        ))
    }
}

async fn cmd_default() -> anyhow::Result<ExitCode> {
    let env = Env::load().await?;

    if tui::is_tty() {
        logging::init_file(&env.cfg.log_path()?)?;
        let ctx = tui::app::AppContext {
            cfg: env.cfg,
            config_path: env.config_path,
            session: env.session,
            store: env.store,
        };
        tui::app::run(ctx).await?;
        return Ok(ExitCode::SUCCESS);
    }

    logging::init_stderr();
    let board = env.board(None)?;
    println!("Workspace: {}", board.key());
    print_tasks(board.tree(), board.tree().iter(), OutputFormat::Table)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_login(user: &str) -> anyhow::Result<ExitCode> {
    let mut env = Env::load().await?;
    env.session.sign_in(user)?;
    env.session.save(&env.session_path)?;
    println!("Signed in as {}", user.trim());
    Ok(ExitCode::SUCCESS)
}

async fn cmd_logout() -> anyhow::Result<ExitCode> {
    let mut env = Env::load().await?;
    if env.session.sign_out() {
        env.session.save(&env.session_path)?;
        println!("Signed out");
    } else {
        println!("Not signed in");
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_workspace(cmd: WorkspaceCmd) -> anyhow::Result<ExitCode> {
    let env = Env::load().await?;
    let mut registry = env.registry();
    match cmd {
        WorkspaceCmd::List => {
            let list = registry.list();
            for name in list.names() {
                let marker = if name == list.active() { "* " } else { "  " };
                println!("{marker}{name}");
            }
        }
        WorkspaceCmd::Add { name } => {
            let name = registry.add(&name)?;
            println!("Added workspace {name}");
        }
        WorkspaceCmd::Rename { old, new } => {
            let new = registry.rename(&old, &new)?;
            println!("Renamed {old} -> {new}");
        }
        WorkspaceCmd::Rm { name } => {
            registry.remove(&name)?;
            println!("Removed workspace {name} (active: {})", registry.list().active());
        }
        WorkspaceCmd::Use { name } => {
            registry.activate(&name)?;
            println!("Switched to {name}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_task(args: TaskArgs) -> anyhow::Result<ExitCode> {
    let env = Env::load().await?;
    let mut board = env.board(args.workspace.as_deref())?;

    match args.cmd {
        TaskCmd::List(list) => {
            let format = OutputFormat::from_flags(list.json, list.csv);
            print_tasks(board.tree(), board.tree().iter(), format)?;
            return Ok(ExitCode::SUCCESS);
        }
        TaskCmd::Focus { id } => {
            let id = resolve_task_id(board.tree(), &id)?;
            let members = descendant_closure(board.tree(), &id);
            let tasks = board.tree().iter().filter(|t| members.contains(&t.id));
            print_tasks(board.tree(), tasks, OutputFormat::Table)?;
            return Ok(ExitCode::SUCCESS);
        }
        TaskCmd::Add(add) => {
            let draft = draft_from_args(board.tree(), &add)?;
            let id = board.add_task(add.column, draft)?;
            println!("{id}");
        }
        TaskCmd::Rm { id } => {
            let id = resolve_task_id(board.tree(), &id)?;
            let task = board.delete_task(&id)?;
            let orphans = board
                .tree()
                .iter()
                .filter(|t| t.parent_id.as_ref() == Some(&task.id))
                .count();
            if orphans > 0 {
                println!("Deleted \"{}\" ({orphans} subtask(s) now have no parent)", task.title);
            } else {
                println!("Deleted \"{}\"", task.title);
            }
        }
        TaskCmd::Move { column, from, to } => {
            let len = board.tree().column(column).len();
            if !board.move_task(column, from, to) {
                anyhow::bail!("index out of range: {column} has {len} task(s)");
            }
            println!("Moved {column} #{from} -> #{to}");
        }
        TaskCmd::Status { id, status } => {
            let id = resolve_task_id(board.tree(), &id)?;
            board.set_status(&id, status)?;
            println!("{id}: {}", status.as_str());
        }
    }

    if let Some(err) = board.take_save_error() {
        anyhow::bail!("failed to save board {}: {err}", board.key());
    }
    Ok(ExitCode::SUCCESS)
}

fn draft_from_args(tree: &TaskTree, args: &TaskAddArgs) -> anyhow::Result<TaskDraft> {
    let parent_id = match args.parent.as_deref() {
        Some(p) if args.column == ColumnId::Final => {
            anyhow::bail!("final tasks have no parent (got --parent {p})")
        }
        Some(p) => Some(resolve_task_id(tree, p)?),
        None => None,
    };
    let deadline = args.deadline.as_deref().map(parse_date).transpose()?;
    Ok(TaskDraft {
        title: args.title.clone(),
        content: args.content.clone(),
        deadline,
        priority: args.priority,
        tags: args.tags.as_deref().map(parse_tags).unwrap_or_default(),
        parent_id,
        color: args.color.clone(),
        ..TaskDraft::default()
    })
}

/// Exact id, or a prefix or suffix matching exactly one task.
fn resolve_task_id(tree: &TaskTree, pattern: &str) -> anyhow::Result<TaskId> {
    let pattern = pattern.trim();
    if let Some(task) = tree.iter().find(|t| t.id.as_str() == pattern) {
        return Ok(task.id.clone());
    }
    let matches: Vec<&Task> = tree
        .iter()
        .filter(|t| {
            !pattern.is_empty()
                && (t.id.as_str().starts_with(pattern) || t.id.as_str().ends_with(pattern))
        })
        .collect();
    match matches.as_slice() {
        [task] => Ok(task.id.clone()),
        [] => Err(TierboardError::TaskNotFound(pattern.to_owned()).into()),
        many => anyhow::bail!("'{pattern}' matches {} tasks; use a longer id", many.len()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    fn from_flags(json: bool, csv: bool) -> Self {
        if json {
            Self::Json
        } else if csv {
            Self::Csv
        } else {
            Self::Table
        }
    }
}

fn print_tasks<'a>(
    tree: &TaskTree,
    tasks: impl Iterator<Item = &'a Task>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let tasks: Vec<&Task> = tasks.collect();
    if format == OutputFormat::Json {
        let mut out = serde_json::to_string_pretty(&tasks)?;
        out.push('\n');
        print!("{out}");
        return Ok(());
    }
    if tasks.is_empty() && format == OutputFormat::Table {
        println!("No tasks");
        return Ok(());
    }

    let mut t = Table::new([
        "ID", "COLUMN", "TITLE", "STATUS", "PRIORITY", "DEADLINE", "TAGS", "COLOR",
    ]);
    for task in tasks {
        t.row([
            task.id.to_string(),
            task.column_id.to_string(),
            task.title.clone(),
            task.status.as_str().to_owned(),
            task.priority.as_str().to_owned(),
            task.deadline.map(format_date).unwrap_or_default(),
            task.tags.join(","),
            tree.find_ancestor_color(task).unwrap_or("-").to_owned(),
        ]);
    }
    match format {
        OutputFormat::Csv => t.write_csv()?,
        _ => t.max_width(40).print()?,
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocFormat {
    Json,
    Yaml,
}

impl DocFormat {
    fn for_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Json,
        }
    }
}

fn write_document(path: &Path, doc: &BoardDocument) -> anyhow::Result<()> {
    let raw = match DocFormat::for_path(path) {
        DocFormat::Json => {
            let mut s = serde_json::to_string_pretty(doc)?;
            s.push('\n');
            s
        }
        DocFormat::Yaml => serde_yaml::to_string(doc)?,
    };
    std::fs::write(path, raw).map_err(|source| TierboardError::IoPath {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn read_document(path: &Path) -> anyhow::Result<BoardDocument> {
    let raw = std::fs::read_to_string(path).map_err(|source| TierboardError::IoPath {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = match DocFormat::for_path(path) {
        DocFormat::Json => serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse JSON in {}", path.display()))?,
        DocFormat::Yaml => serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse YAML in {}", path.display()))?,
    };
    Ok(doc)
}

async fn cmd_export(args: &TransferArgs) -> anyhow::Result<ExitCode> {
    let env = Env::load().await?;
    let board = env.board(args.workspace.as_deref())?;
    write_document(&args.file, &board.tree().to_document())?;
    println!(
        "Exported {} task(s) from {} to {}",
        board.tree().len(),
        board.key(),
        args.file.display()
    );
    Ok(ExitCode::SUCCESS)
}

async fn cmd_import(args: &TransferArgs) -> anyhow::Result<ExitCode> {
    let env = Env::load().await?;
    let doc = read_document(&args.file)?;
    let mut board = env.board(args.workspace.as_deref())?;
    board.replace(doc);
    if let Some(err) = board.take_save_error() {
        anyhow::bail!("failed to save board {}: {err}", board.key());
    }
    println!("Imported {} task(s) into {}", board.tree().len(), board.key());
    Ok(ExitCode::SUCCESS)
}

fn cmd_version() -> ExitCode {
    println!("tierboard version {}", env!("CARGO_PKG_VERSION"));
    println!("  rust: {}", rustc_version_runtime::version());
    println!(
        "  os/arch: {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    ExitCode::SUCCESS
}
