#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs::File;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;

use brace::cli::{CliArgs, Command, GenerateArgs, IndexArgs, ViewArgs};
use brace::config::ViewerConfig;
use brace::csv::RowReader;
use brace::index::{self, SharedRowIndex};
use brace::report::ViewReport;
use brace::runtime::Viewer;

fn view(args: ViewArgs, mut config: ViewerConfig) -> Result<()> {
    args.apply_to(&mut config);
    config.validate()?;
    let timeout = Duration::from_secs(args.timeout);

    let mut viewer = Viewer::open(&args.path, &config)
        .with_context(|| format!("Failed to open {}", args.path.display()))?;
    viewer.submit_viewport(args.request());

    if args.wait_index && !viewer.wait_for_index(timeout) {
        tracing::warn!("Row count is not exact yet");
    }
    viewer.settle(timeout);

    let report = match viewer.answer() {
        Some(answer) => ViewReport::from_answer(answer),
        None => match viewer.last_error() {
            Some(e) => bail!("Query failed: {}", e),
            None => bail!("No answer within {}s", args.timeout),
        },
    };
    if let Some(e) = viewer.last_error() {
        tracing::warn!("Showing previous window: {}", e);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_table());
    }
    Ok(())
}

fn count(args: IndexArgs, mut config: ViewerConfig) -> Result<()> {
    if let Some(delimiter) = args.delimiter {
        config.cell_delimiter = Some(delimiter);
    }
    config.validate()?;
    let dialect = config.dialect_for(&args.path)?;
    let file =
        File::open(&args.path).with_context(|| format!("Failed to open {}", args.path.display()))?;

    let shared = SharedRowIndex::new(config.checkpoint_stride);
    let mut writer = shared.writer();
    let mut reader = RowReader::new(file, dialect, config.read_size);
    let cancel = AtomicBool::new(false);
    let started = Instant::now();
    index::build(
        &mut reader,
        &mut writer,
        config.index_progress_rows,
        &cancel,
        |index| {
            let frontier = index.frontier();
            tracing::debug!("Indexed {} rows, {} bytes", frontier.row, frontier.offset);
        },
    )
    .with_context(|| format!("Failed to scan {}", args.path.display()))?;

    let index = shared.snapshot();
    if args.checkpoints {
        for cp in index.checkpoints() {
            println!("{}\t{}", cp.row, cp.offset);
        }
    }
    println!(
        "{} rows, {} checkpoints, {:.2?}",
        index.total_rows().unwrap_or(0),
        index.checkpoints().len(),
        started.elapsed()
    );
    Ok(())
}

fn generate(args: GenerateArgs) -> Result<()> {
    brace::generate::generate(&args.path, args.rows, args.seed)
        .with_context(|| format!("Failed to write {}", args.path.display()))?;
    println!("Wrote {} rows to {}", args.rows, args.path.display());
    Ok(())
}

fn main() -> Result<()> {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    brace::tracing::init();

    let args = CliArgs::parse();
    let config = ViewerConfig::load();

    match args.command {
        Command::View(args) => view(args, config),
        Command::Index(args) => count(args, config),
        Command::Generate(args) => generate(args),
    }
}
