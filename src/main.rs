use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use git_hunks::cache::HunkInfo;
use git_hunks::parse::{parse_file_refs, parse_hunk_refs};
use git_hunks::stager::FileHunks;
use git_hunks::{ContextMode, Options, StageError, StageOutcome, Stager, diff};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "GIT_HUNKS_LOG";

#[derive(Parser)]
#[command(name = "git-hunks", version)]
#[command(about = "Non-interactive git staging by hunk id or line number")]
struct Cli {
    /// Repository to operate on
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct ModeArgs {
    /// Diff without context so adjacent edits become separate hunks
    #[arg(long)]
    precise: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List unstaged hunks with their ids
    List {
        /// Files to list (default: all changed files)
        files: Vec<String>,
        #[command(flatten)]
        mode: ModeArgs,
        /// Show changed lines with the numbers `lines` accepts
        #[arg(long)]
        lines: bool,
    },
    /// Stage hunks by id or position (e.g., "src/lib.rs:a3f9,2")
    Stage {
        #[arg(required = true)]
        hunk_refs: Vec<String>,
        #[command(flatten)]
        mode: ModeArgs,
        /// Print the patch instead of applying it
        #[arg(long)]
        dry_run: bool,
    },
    /// Stage lines by number (e.g., "flake.nix:10..15,-20")
    Lines {
        #[arg(required = true)]
        file_refs: Vec<String>,
        #[command(flatten)]
        mode: ModeArgs,
        /// Print the patch instead of applying it
        #[arg(long)]
        dry_run: bool,
    },
    /// Reverse a previous staging (0 = most recent)
    Undo {
        #[arg(default_value_t = 0)]
        step: usize,
        /// Show the patch that would be reversed
        #[arg(long)]
        dry_run: bool,
    },
    /// Show recorded stagings, most recent first
    History,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
    /// Generate a man page
    Man,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(fmt_layer).try_init();
}

fn options(mode: ModeArgs, dry_run: bool) -> Options {
    Options {
        context: if mode.precise {
            ContextMode::Precise
        } else {
            ContextMode::Normal
        },
        dry_run,
    }
}

fn format_hunks(hunks: &[HunkInfo]) -> String {
    hunks
        .iter()
        .map(|info| {
            format!(
                "  {}  #{}  {}  (+{} -{})  {}\n",
                info.id,
                info.index(),
                info.hunk.header(),
                info.stats.added,
                info.stats.deleted,
                info.summary
            )
        })
        .collect()
}

fn print_file(file: &FileHunks, lines: bool) {
    if lines {
        println!("{}", diff::format_file(&file.diff));
    } else {
        println!("{}", file.path);
        print!("{}", format_hunks(&file.hunks));
    }
}

fn report_stage(outcome: &StageOutcome) {
    if outcome.applied {
        if let Some(entry) = &outcome.entry {
            eprintln!("Staged {} ({})", entry.target_files.join(", "), entry.id);
        }
    } else {
        print!("{}", outcome.patch);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::List { files, mode, lines } => {
            let stager = Stager::open(&cli.repo, options(mode, false))?;
            let listing = stager.list_hunks(&files)?;
            for file in &listing.files {
                print_file(file, lines);
            }
            for skipped in &listing.skipped {
                eprintln!("Skipped {}: {}", skipped.path, skipped.reason);
            }
        }
        Commands::Stage {
            hunk_refs,
            mode,
            dry_run,
        } => {
            let requests = hunk_refs
                .iter()
                .map(|input| parse_hunk_refs(input))
                .collect::<Result<Vec<_>, _>>()?;
            let stager = Stager::open(&cli.repo, options(mode, dry_run))?;
            report_stage(&stager.stage_hunks(&requests)?);
        }
        Commands::Lines {
            file_refs,
            mode,
            dry_run,
        } => {
            let requests = file_refs
                .iter()
                .map(|input| parse_file_refs(input))
                .collect::<Result<Vec<_>, _>>()?;
            let stager = Stager::open(&cli.repo, options(mode, dry_run))?;
            report_stage(&stager.stage_lines(&requests)?);
        }
        Commands::Undo { step, dry_run } => {
            let stager = Stager::open(
                &cli.repo,
                Options {
                    dry_run,
                    ..Options::default()
                },
            )?;
            let outcome = stager.undo(step)?;
            if outcome.applied {
                eprintln!("Undid {}", outcome.entry.id);
            } else {
                print!("{}", outcome.entry.patch);
            }
        }
        Commands::History => {
            let stager = Stager::open(&cli.repo, Options::default())?;
            for (step, entry) in stager.history()?.iter().enumerate() {
                println!(
                    "{step}  {}  {}  {}",
                    entry.id,
                    entry.applied_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.description.as_deref().unwrap_or_default()
                );
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "git-hunks", &mut std::io::stdout());
        }
        Commands::Man => {
            clap_mangen::Man::new(Cli::command()).render(&mut std::io::stdout())?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Err(e) = run(cli) else {
        return ExitCode::SUCCESS;
    };

    eprintln!("error: {e}");
    if let Some(StageError::SelectorNotFound { hunks, .. }) = e.downcast_ref::<StageError>() {
        eprint!("Current hunks:\n{}", format_hunks(hunks));
    }
    ExitCode::FAILURE
}
