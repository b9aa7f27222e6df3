//! autogit - CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use autogit::config::{self, Config};
use autogit::engine::Engine;
use autogit::git::{CommitOutcome, CycleOptions, GitBackend, RepositoryController, VcsBackend};
use autogit::llm::Provider;
use autogit::watch::{FsWatcher, StatusPoller};
use autogit::{CommitMessageGenerator, ExclusionMatcher};

/// Commit working-tree changes automatically, with AI-written messages.
#[derive(Parser, Debug)]
#[command(name = "autogit")]
#[command(about = "Commit working-tree changes automatically, with AI-written messages")]
#[command(version)]
struct Cli {
    /// Path inside the repository to work on
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the working tree and commit after every quiet period
    Watch(WatchArgs),

    /// Run one commit cycle now
    Commit(CycleArgs),

    /// Show changed files as the next cycle would see them
    Status(CycleArgs),
}

#[derive(Args, Debug)]
struct CycleArgs {
    /// Additional glob pattern to exclude (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,

    /// Leave untracked files alone
    #[arg(long)]
    no_untracked: bool,

    /// Commit locally without pushing
    #[arg(long)]
    no_push: bool,

    /// Text generator used for commit messages
    #[arg(long, value_enum)]
    provider: Option<Provider>,
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[command(flatten)]
    cycle: CycleArgs,

    /// Quiet period before committing, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Also poll git status at this interval, in milliseconds
    #[arg(long)]
    poll_ms: Option<u64>,
}

impl CycleArgs {
    fn apply(&self, config: &mut Config) {
        config.exclude_patterns.extend(self.exclude.iter().cloned());
        if self.no_untracked {
            config.include_untracked = false;
        }
        if self.no_push {
            config.push = false;
        }
        if let Some(provider) = self.provider {
            config.generator.provider = provider;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Step 1: Locate the repository
    let backend = GitBackend::discover(&cli.repo)
        .context("Not a git repository. Run autogit from within a git repository.")?;

    // Step 2: Load config (file + environment), then CLI flags
    let loaded = config::load(backend.workdir()).context("Failed to load configuration")?;
    for warning in &loaded.warnings {
        warn!("{}", warning);
    }
    let mut config = loaded.config;

    match cli.command {
        Command::Watch(args) => {
            args.cycle.apply(&mut config);
            if let Some(delay_ms) = args.delay_ms {
                config.delay_ms = delay_ms;
            }
            if let Some(poll_ms) = args.poll_ms {
                config.poll_interval_ms = Some(poll_ms);
            }
            watch(backend, config).await
        }
        Command::Commit(args) => {
            args.apply(&mut config);
            commit(backend, &config).await
        }
        Command::Status(args) => {
            args.apply(&mut config);
            status(&backend, &config).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("autogit=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("autogit=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_controller(backend: Arc<dyn VcsBackend>, config: &Config) -> RepositoryController {
    let messages = CommitMessageGenerator::new(config.generator.provider.generator())
        .with_max_length(config.max_commit_message_length)
        .with_timeout(config.generator_timeout());

    let options = CycleOptions {
        include_untracked: config.include_untracked,
        exclude: ExclusionMatcher::new(&config.exclude_patterns),
        push: config.push,
        remote: config.remote.clone(),
    };

    RepositoryController::new(backend, messages, options)
}

/// Run the engine until Ctrl-C.
async fn watch(backend: GitBackend, config: Config) -> Result<ExitCode> {
    let root = backend.workdir().to_path_buf();
    let backend: Arc<dyn VcsBackend> = Arc::new(backend);
    let controller = Arc::new(build_controller(Arc::clone(&backend), &config));

    let (engine, _task) = Engine::spawn(
        controller,
        config.delay(),
        ExclusionMatcher::new(&config.exclude_patterns),
    );
    let mut outcomes = engine.subscribe();

    let _watcher = FsWatcher::start(&root, engine.clone())
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    let poller = config
        .poll_interval()
        .filter(|interval| !interval.is_zero())
        .map(|interval| StatusPoller::new(Arc::clone(&backend), interval).spawn(engine.clone()));

    if config.enabled {
        engine.enable();
        println!(
            "Watching {} (commit after {}ms of quiet). Press Ctrl-C to stop.",
            root.display(),
            config.delay_ms
        );
    } else {
        println!("Auto-commit is disabled in {}.", config::CONFIG_FILE);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = outcomes.recv() => match received {
                Ok(outcome) => print_outcome(&outcome),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} commit outcome(s)", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if let Some(poller) = poller {
        poller.abort();
    }
    println!("Stopped.");
    Ok(ExitCode::SUCCESS)
}

/// Run one cycle and report it.
async fn commit(backend: GitBackend, config: &Config) -> Result<ExitCode> {
    let controller = build_controller(Arc::new(backend), config);
    let outcome = controller.run_cycle().await;
    print_outcome(&outcome);

    if outcome.is_failure() {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Print live status, marking paths the next cycle would leave alone.
async fn status(backend: &GitBackend, config: &Config) -> Result<ExitCode> {
    let entries = backend
        .status()
        .await
        .context("Failed to read repository status")?;

    if entries.is_empty() {
        println!("Nothing to commit, working tree clean.");
        return Ok(ExitCode::SUCCESS);
    }

    let exclude = ExclusionMatcher::new(&config.exclude_patterns);
    for entry in &entries {
        let change = entry.classify();
        let note = if exclude.is_excluded(&entry.path) {
            " (excluded)"
        } else if entry.is_untracked() && !config.include_untracked {
            " (untracked, skipped)"
        } else {
            ""
        };
        println!("  {}{}", change, note);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_outcome(outcome: &CommitOutcome) {
    if outcome.is_failure() {
        eprintln!("✗ {}", outcome.summary());
        if let Some(hint) = outcome.error.as_ref().and_then(|e| e.guidance()) {
            eprintln!("  {}", hint);
        }
    } else if outcome.is_noop() {
        println!("· {}", outcome.summary());
    } else {
        println!("✓ {}", outcome.summary());
    }

    for path in &outcome.skipped_paths {
        eprintln!("  skipped {}", path);
    }
}
