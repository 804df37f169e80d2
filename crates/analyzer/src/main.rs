use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use ziglens_analyzer::commands::{self, load_project, resolve_document};
use ziglens_analyzer::{BackgroundParser, SchedulerConfig};

/// Semantic analyzer for Zig sources
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Standard library directory, instead of asking `zig env`
    #[arg(long, global = true)]
    std_dir: Option<PathBuf>,

    /// Number of analysis threads
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    /// Disable colors in problem reports
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze files and their imports, and print their problems
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the completion items at a position (one-based line and column)
    Complete {
        file: PathBuf,
        line: u32,
        column: u32,
    },
    /// Print the scope tree and declarations of a file
    Dump { file: PathBuf },
}

impl Command {
    fn first_file(&self) -> &PathBuf {
        match self {
            Self::Check { files } => &files[0],
            Self::Complete { file, .. } | Self::Dump { file } => file,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let first = resolve_document(args.command.first_file())?;
    let project = load_project(&first, args.std_dir.clone())?;
    let mut config = SchedulerConfig::default();
    if let Some(jobs) = args.jobs {
        config.workers = jobs;
    }
    let parser = BackgroundParser::new(Arc::new(project), config)
        .context("Cannot start the analysis threads")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match &args.command {
        Command::Check { files } => {
            let documents = files
                .iter()
                .map(|file| resolve_document(file))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let summary = commands::check(&parser, &documents, !args.no_color, &mut out)?;
            writeln!(
                out,
                "Checked {} file(s): {} problem(s), {} error(s)",
                summary.documents, summary.problems, summary.errors
            )?;
            if summary.errors > 0 {
                out.flush()?;
                drop(parser);
                std::process::exit(1);
            }
        }
        Command::Complete { line, column, .. } => {
            commands::complete(&parser, &first, *line, *column, &mut out)?;
        }
        Command::Dump { .. } => {
            commands::dump(&parser, &first, &mut out)?;
        }
    }
    Ok(())
}
