use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use version_diff::config::{Config, OutputFormat, Settings};
use version_diff::diff;
use version_diff::display::entry_text;
use version_diff::messages::{Job, SessionUpdate};
use version_diff::session::{DiffSession, NavKey, SessionError};
use version_diff::source::{Collaborators, FileReader, FsReader, GitCli};
use version_diff::store::DiskSnapshotStore;
use version_diff::version::{BackendKind, Side};
use version_diff::worker::Worker;

const HELP: &str = "commands: h l (focus side), k j (newer/older), sel <left|right> <n>, \
                    show, more, switch <backend>, backends, retry, reload, q";
const BACKEND_TIMEOUT: Duration = Duration::from_secs(30);
const COLUMN_WIDTH: usize = 60;

/// Compare two versions of a file from its sync, recovery or git history.
#[derive(Parser, Debug)]
#[command(name = "version-diff", version, about)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// File to compare.
    #[arg(required = true)]
    file: Option<PathBuf>,

    /// History backend: sync, recovery or git. Defaults to the configured one.
    backend: Option<BackendKind>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Record the file's current content as a recovery snapshot.
    Snapshot {
        /// File to record.
        file: PathBuf,
    },
}

/// One line typed at the prompt
#[derive(Debug, Clone, Copy, PartialEq)]
enum Input {
    Quit,
    Key(NavKey),
    Select(Side, usize),
    Show,
    More,
    Switch(BackendKind),
    Backends,
    Retry,
    Reload,
    Nothing,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let input = match words.as_slice() {
        [] => Input::Nothing,
        ["q" | "quit"] => Input::Quit,
        ["h"] => Input::Key(NavKey::Left),
        ["l"] => Input::Key(NavKey::Right),
        ["k"] => Input::Key(NavKey::Up),
        ["j"] => Input::Key(NavKey::Down),
        ["sel", side, index] => {
            let index = index.parse().map_err(|e| format!("bad index {index}: {e}"))?;
            Input::Select(side.parse()?, index)
        }
        ["show"] => Input::Show,
        ["more"] => Input::More,
        ["switch", kind] => Input::Switch(kind.parse()?),
        ["backends"] => Input::Backends,
        ["retry"] => Input::Retry,
        ["reload"] => Input::Reload,
        _ => return Err(HELP.to_string()),
    };
    Ok(input)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .compact()
        .init();
}

/// The directory history is resolved against and the file's path inside it.
///
/// Inside a git work tree that is the work tree root, otherwise the file's
/// parent directory.
fn locate(file: &Path, git_binary: &str) -> Result<(PathBuf, PathBuf), Box<dyn Error>> {
    let file = file.canonicalize()?;
    let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();

    let root = GitCli::new(&parent, git_binary)
        .toplevel()
        .ok()
        .and_then(|top| top.canonicalize().ok())
        .filter(|top| file.starts_with(top))
        .unwrap_or(parent);
    let relative = file.strip_prefix(&root)?.to_path_buf();
    Ok((root, relative))
}

fn open_store(config: &Config, root: &Path) -> Option<DiskSnapshotStore> {
    match DiskSnapshotStore::new(config) {
        Ok(store) => Some(store.with_base(root)),
        Err(e) => {
            warn!("Snapshot store unavailable: {e}");
            None
        }
    }
}

fn snapshot(config: &Config, file: &Path) -> Result<(), Box<dyn Error>> {
    let (root, relative) = locate(file, &config.settings.git_binary)?;
    let content = FsReader::new(&root).read(&relative)?;
    let store = DiskSnapshotStore::new(config)?.with_base(&root);

    match store.save(&relative, &content)? {
        Some(timestamp) => println!("Recorded snapshot {timestamp} of {}", relative.display()),
        None => println!("{} is unchanged since its last snapshot", relative.display()),
    }
    Ok(())
}

/// ANSI colours for a unified patch; blue and yellow replace green and red
/// for colour-blind users
fn colorize(patch: &str, color_blind: bool) -> String {
    let (added, removed) = if color_blind { ("34", "33") } else { ("32", "31") };
    patch
        .lines()
        .map(|line| {
            let code = match line.as_bytes().first() {
                _ if line.starts_with("+++") || line.starts_with("---") => "1",
                Some(b'+') => added,
                Some(b'-') => removed,
                Some(b'@') => "36",
                _ => return format!("{line}\n"),
            };
            format!("\x1b[{code}m{line}\x1b[0m\n")
        })
        .collect()
}

fn render_diff(left: &str, right: &str, session: &DiffSession, settings: &Settings) -> String {
    match settings.output_format {
        OutputFormat::LineByLine => {
            let patch = session
                .unified_diff(settings.context_lines)
                .unwrap_or_default();
            if io::stdout().is_terminal() {
                colorize(&patch, settings.color_blind)
            } else {
                patch
            }
        }
        OutputFormat::SideBySide => diff::side_by_side(
            left,
            right,
            settings.diff_style,
            settings.match_words_threshold,
            COLUMN_WIDTH,
        ),
    }
}

/// Character counts of the change, or a note when only blank lines moved
fn summary(left: &str, right: &str) -> String {
    let lines = diff::compute_diff(left, right);
    if !diff::has_meaningful_changes(&lines) {
        return "Only whitespace changed.".to_string();
    }
    let stats = diff::calculate_stats(&diff::group_into_rows(&lines));
    format!("+{} -{} characters", stats.added_count, stats.removed_count)
}

fn print_session(session: &DiffSession, settings: &Settings) {
    if let Some(kind) = session.kind() {
        println!("== {} ==", kind.title());
    }

    if let Some(unavailable) = session.unavailable() {
        println!("{}", unavailable.error);
        println!("{}", unavailable.guide);
        return;
    }

    let Some(timelines) = session.timelines() else {
        println!("Loading...");
        return;
    };

    for side in [Side::Left, Side::Right] {
        let timeline = timelines.side(side);
        let marker = if session.focused_side() == side { "*" } else { " " };
        println!("{marker}{side}");
        for (index, descriptor) in timeline.versions().iter().enumerate() {
            let active = if index == timeline.active_index() { ">" } else { " " };
            let text = entry_text(descriptor, session.path());
            println!("  {active} {index:>3}  {}  {}", text.title, text.details.join(" | "));
        }
    }
    if session.is_loading_more() {
        println!("  (older versions are still loading)");
    } else if session.has_more() {
        let oldest = session
            .pagination_cursor()
            .map(|cursor| cursor.last_loaded_id)
            .unwrap_or_default();
        println!("  (versions older than {oldest} not loaded yet, type `more`)");
    }

    match session.diff_input() {
        Some((left, right)) if left == right => println!("\nNo differences."),
        Some((left, right)) => {
            println!("\n{}", render_diff(left, right, session, settings));
            println!("{}", summary(left, right));
        }
        None => println!("\nContent is still loading; `retry` fetches it again."),
    }
}

fn print_backends(session: &DiffSession) {
    let availability = session.availability();
    for kind in BackendKind::ALL {
        let state = if availability.is_available(kind) { "available" } else { "unavailable" };
        let current = if session.kind() == Some(kind) { " (current)" } else { "" };
        let name = kind.to_string();
        println!("  {name:<9} {}: {state}{current}", kind.title());
    }
}

fn report(updates: &[SessionUpdate]) {
    for update in updates {
        match update {
            SessionUpdate::ContentFailed { side, error } => {
                println!("Could not load {side} version: {error}")
            }
            SessionUpdate::LoadMoreFailed(error) => println!("Could not load more: {error}"),
            SessionUpdate::VersionsAppended { count: 0, .. } => println!("No older versions."),
            _ => {}
        }
    }
}

/// Jobs started by `input`
fn dispatch(session: &mut DiffSession, input: Input) -> Result<Vec<Job>, SessionError> {
    let jobs = match input {
        Input::Key(key) => session.handle_key(key)?.into_iter().collect(),
        Input::Select(side, index) => vec![session.select_version(side, index)?],
        Input::More => session.load_more()?.into_iter().collect(),
        Input::Switch(kind) => session.switch_backend(kind),
        Input::Retry => {
            let focus = session.focused_side();
            vec![session.retry(focus)?]
        }
        Input::Reload => session.reload(),
        Input::Quit | Input::Show | Input::Backends | Input::Nothing => Vec::new(),
    };
    Ok(jobs)
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::load().unwrap_or_else(|e| {
        warn!("Using default settings: {e}");
        Config::default()
    });

    if let Some(Commands::Snapshot { file }) = &cli.command {
        return snapshot(&config, file);
    }
    let Some(file) = cli.file else {
        return Err("a file to compare is required".into());
    };
    let kind = cli.backend.unwrap_or(config.settings.default_backend);

    let settings = &config.settings;
    let (root, relative) = locate(&file, &settings.git_binary)?;

    let mut collaborators = Collaborators::new(Arc::new(FsReader::new(&root)))
        .with_git(Arc::new(GitCli::new(&root, settings.git_binary.as_str())));
    if let Some(store) = open_store(&config, &root) {
        collaborators = collaborators.with_snapshots(Arc::new(store));
    }

    let worker = Worker::spawn();
    let mut session = DiffSession::new(relative, collaborators);
    let jobs = session.initialize(kind);
    report(&worker.settle(&mut session, jobs, BACKEND_TIMEOUT));
    print_session(&session, settings);

    let stdin = io::stdin();
    loop {
        print!("{}> ", session.kind().map(|k| k.to_string()).unwrap_or_default());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = match parse_input(&line) {
            Ok(Input::Quit) => break,
            Ok(input) => input,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match input {
            Input::Show => match session.focused_content() {
                Some(content) => println!("{content}"),
                None => println!("The {} version is not loaded.", session.focused_side()),
            },
            Input::Backends => print_backends(&session),
            _ => match dispatch(&mut session, input) {
                Ok(jobs) => {
                    report(&worker.settle(&mut session, jobs, BACKEND_TIMEOUT));
                    print_session(&session, settings);
                }
                Err(e) => println!("{e}"),
            },
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_takes_file_and_optional_backend() {
        let cli = Cli::try_parse_from(["version-diff", "notes.md", "git"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("notes.md")));
        assert_eq!(cli.backend, Some(BackendKind::Git));
        assert_eq!(cli.command, None);

        let cli = Cli::try_parse_from(["version-diff", "notes.md"]).unwrap();
        assert_eq!(cli.backend, None);
    }

    #[test]
    fn cli_rejects_bad_arguments() {
        assert!(Cli::try_parse_from(["version-diff"]).is_err());
        assert!(Cli::try_parse_from(["version-diff", "snapshot"]).is_err());
        assert!(Cli::try_parse_from(["version-diff", "notes.md", "svn"]).is_err());
        assert!(Cli::try_parse_from(["version-diff", "notes.md", "git", "extra"]).is_err());
        assert!(Cli::try_parse_from(["version-diff", "snapshot", "a.md", "git"]).is_err());
    }

    #[test]
    fn cli_snapshot_subcommand() {
        let cli = Cli::try_parse_from(["version-diff", "snapshot", "notes.md"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Snapshot {
                file: PathBuf::from("notes.md")
            })
        );
        assert_eq!(cli.file, None);

        // A file named like the subcommand is reachable through its path
        let cli = Cli::try_parse_from(["version-diff", "./snapshot"]).unwrap();
        assert_eq!(cli.file, Some(PathBuf::from("./snapshot")));
    }

    #[test]
    fn prompt_input() {
        assert_eq!(parse_input("k\n"), Ok(Input::Key(NavKey::Up)));
        assert_eq!(parse_input("sel r 2"), Ok(Input::Select(Side::Right, 2)));
        assert_eq!(parse_input(" show "), Ok(Input::Show));
        assert_eq!(parse_input("switch git"), Ok(Input::Switch(BackendKind::Git)));
        assert_eq!(parse_input(""), Ok(Input::Nothing));
        assert!(parse_input("sel middle 2").is_err());
        assert!(parse_input("sel left two").is_err());
        assert!(parse_input("render").is_err());
    }

    #[test]
    fn summary_counts_characters() {
        assert_eq!(summary("hello cat\n", "hello dog\n"), "+3 -3 characters");
        assert_eq!(summary("a\n", "a\n\n"), "Only whitespace changed.");
    }
}
