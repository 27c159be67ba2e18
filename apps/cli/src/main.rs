use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use neoeditor_project::{Listing, SessionStore, TreeNode, Workbench};
use neoeditor_settings::{
    JsonFileStore, LoggingPreferences, PreferencesStore, PREFERENCES_FILE_NAME,
};

const STATE_DIR: &str = ".neoeditor";

#[derive(Parser)]
#[command(
    name = "neoeditor-cli",
    about = "Drive a NeoEditor workspace session from the command line",
    author,
    version
)]
struct Cli {
    /// 工作區根目錄，存放 `.neoeditor/` 設定；預設為目前目錄。 / Workspace root holding `.neoeditor/` (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 開啟資料夾分頁。 / Open a folder tab.
    OpenFolder(PathArg),
    /// 關閉資料夾分頁；其下的檔案分頁保持開啟。 / Close a folder tab; files under it stay open.
    CloseFolder(PathArg),
    /// 切換目前的資料夾分頁。 / Make an open folder current.
    SelectFolder(PathArg),
    /// 開啟檔案分頁。 / Open a file tab.
    Open(PathArg),
    /// 關閉檔案分頁（不儲存）。 / Close a file tab without saving.
    Close(PathArg),
    /// 切換目前的檔案分頁。 / Make an open file current.
    Select(PathArg),
    /// 儲存目前（或指定）的檔案分頁。 / Save the current file tab, or the named one.
    Save(SaveArgs),
    /// 改名或移動檔案/資料夾，並同步已開啟的分頁。 / Rename or move an entry and update open tabs.
    Rename(RenameArgs),
    /// 刪除檔案/資料夾，並關閉其下的分頁。 / Delete an entry and close the tabs under it.
    Delete(PathArg),
    /// 在資料夾中建立空白檔案。 / Create an empty file inside a directory.
    NewFile(CreateArgs),
    /// 在資料夾中建立子資料夾。 / Create a sub-directory.
    NewFolder(CreateArgs),
    /// 以 JSON 輸出工作階段狀態。 / Print the session as JSON.
    Status,
    /// 列出目前資料夾的目錄樹。 / Print the current folder's tree.
    Tree(TreeArgs),
}

#[derive(Args)]
struct PathArg {
    path: PathBuf,
}

#[derive(Args)]
struct SaveArgs {
    path: Option<PathBuf>,
}

#[derive(Args)]
struct RenameArgs {
    from: PathBuf,
    to: PathBuf,
}

#[derive(Args)]
struct CreateArgs {
    /// 目標資料夾。 / Parent directory.
    dir: PathBuf,
    /// 新項目名稱（單一路徑元件）。 / Name of the new entry (one path component).
    name: String,
}

#[derive(Args)]
struct TreeArgs {
    /// 要列出的資料夾；預設為目前資料夾。 / Folder to print; defaults to the current one.
    #[arg(long)]
    folder: Option<PathBuf>,
    /// 額外展開的子資料夾。 / Sub-directories to expand before printing.
    #[arg(long, value_name = "DIR")]
    expand: Vec<PathBuf>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli { workspace, command } = Cli::parse();
    let workspace_root = resolve_workspace(workspace)?;
    let preferences = PreferencesStore::load(preferences_path(&workspace_root))
        .context("load preferences")?;
    init_logging(&preferences.preferences().logging);

    let session_prefs = &preferences.preferences().session;
    let mut store =
        JsonFileStore::new(workspace_root.join(STATE_DIR).join(&session_prefs.store_file));
    let sessions = SessionStore::new(session_prefs.key.clone());
    let mut bench = Workbench::local();

    let layout = if session_prefs.restore_on_startup {
        let state = bench.startup(&store, &sessions);
        for issue in &state.report.issues {
            eprintln!("warning: {issue}");
        }
        state.layout
    } else {
        debug!("session restore disabled by preferences");
        sessions.load_or_empty(&store).layout
    };

    // 動作失敗時仍保存工作階段。 / The session is persisted even when the action failed.
    let outcome = execute(&mut bench, command);
    bench
        .shutdown(&mut store, &sessions, layout)
        .with_context(|| format!("persist session to {}", store.path().display()))?;
    outcome
}

fn execute(bench: &mut Workbench, command: Commands) -> Result<()> {
    match command {
        Commands::OpenFolder(arg) => {
            let path = resolve_input_path(&arg.path)?;
            bench
                .open_folder(&path)
                .with_context(|| format!("open folder {}", path.display()))?;
            println!("Opened folder {}", path.display());
        }
        Commands::CloseFolder(arg) => {
            let path = resolve_input_path(&arg.path)?;
            report_toggle(bench.close_folder(&path)?, "Closed folder", &path);
        }
        Commands::SelectFolder(arg) => {
            let path = resolve_input_path(&arg.path)?;
            if !bench.select_folder(&path)? {
                bail!("folder {} is not open", path.display());
            }
        }
        Commands::Open(arg) => {
            let path = resolve_input_path(&arg.path)?;
            bench
                .open_file(&path)
                .with_context(|| format!("open {}", path.display()))?;
            println!("Opened {}", path.display());
        }
        Commands::Close(arg) => {
            let path = resolve_input_path(&arg.path)?;
            report_toggle(bench.close_file(&path)?, "Closed", &path);
        }
        Commands::Select(arg) => {
            let path = resolve_input_path(&arg.path)?;
            if !bench.select_file(&path)? {
                bail!("file {} is not open", path.display());
            }
        }
        Commands::Save(args) => match args.path {
            Some(path) => {
                let path = resolve_input_path(&path)?;
                bench
                    .save_file(&path)
                    .with_context(|| format!("save {}", path.display()))?;
                println!("Saved {}", path.display());
            }
            None => {
                if !bench.save_current_file().context("save current file")? {
                    println!("No file is open");
                }
            }
        },
        Commands::Rename(args) => {
            let from = resolve_input_path(&args.from)?;
            let to = resolve_input_path(&args.to)?;
            bench
                .rename_entry(&from, &to)
                .with_context(|| format!("rename {}", from.display()))?;
            println!("Renamed {} -> {}", from.display(), to.display());
        }
        Commands::Delete(arg) => {
            let path = resolve_input_path(&arg.path)?;
            bench
                .delete_entry(&path)
                .with_context(|| format!("delete {}", path.display()))?;
            println!("Deleted {}", path.display());
        }
        Commands::NewFile(args) => {
            let dir = resolve_input_path(&args.dir)?;
            let created = bench.create_file(&dir, &args.name)?;
            println!("Created {created}");
        }
        Commands::NewFolder(args) => {
            let dir = resolve_input_path(&args.dir)?;
            let created = bench.create_folder(&dir, &args.name)?;
            println!("Created {created}");
        }
        Commands::Status => {
            let snapshot = bench.capture();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Tree(args) => print_tree(bench, args)?,
    }
    Ok(())
}

fn report_toggle(changed: bool, verb: &str, path: &Path) {
    if changed {
        println!("{verb} {}", path.display());
    } else {
        println!("{} is not open", path.display());
    }
}

fn print_tree(bench: &mut Workbench, args: TreeArgs) -> Result<()> {
    let root = match args.folder {
        Some(folder) => {
            let folder = resolve_input_path(&folder)?;
            if bench.folders().get(&folder).is_none() {
                bail!("folder {} is not open", folder.display());
            }
            folder
        }
        None => match bench.folders().current_folder() {
            Some(entry) => entry.root_path().to_path_buf(),
            None => bail!("no folder is open"),
        },
    };
    for dir in &args.expand {
        let dir = resolve_input_path(dir)?;
        if !bench.expand_folder(&root, &dir)? {
            bail!("{} is not part of {}", dir.display(), root.display());
        }
    }

    let folders = bench.folders();
    let entry = folders
        .get(&root)
        .with_context(|| format!("folder {} is not open", root.display()))?;
    println!("{}/", entry.display_label());
    let mut lines = Vec::new();
    render_children(entry.tree().root(), 1, &mut lines);
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn render_children(node: &TreeNode, depth: usize, out: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    if let Listing::Unreadable(reason) = &node.listing {
        out.push(format!("{indent}<unreadable: {reason}>"));
        return;
    }
    for child in node.children() {
        if child.is_directory() {
            out.push(format!("{indent}{}/", child.name));
            if child.expanded {
                render_children(child, depth + 1, out);
            }
        } else {
            out.push(format!("{indent}{}", child.name));
        }
    }
}

fn init_logging(logging: &LoggingPreferences) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&logging.level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format_timestamp(None);
    // 測試中可能重複初始化。 / A second initialisation is ignored.
    let _ = builder.try_init();
}

fn preferences_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(STATE_DIR).join(PREFERENCES_FILE_NAME)
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => resolve_input_path(&path),
        None => std::env::current_dir().context("determine current directory"),
    }
}

fn resolve_input_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("determine current directory")?
            .join(path))
    }
}
