use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use takeout_restore_core::{process, ProcessOptions};

#[derive(Parser)]
#[command(
    name = "takeout-restore",
    version,
    about = "Restore metadata from Google Takeout JSON sidecars into media files"
)]
struct Cli {
    /// Takeout folder, or a folder of Takeout zip archives with --extract
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Destination for extracted files (default: same as input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file; explicit flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Extract zip archives before processing
    #[arg(short, long)]
    extract: bool,

    /// Delete zip archives after extraction
    #[arg(long)]
    delete_zips: bool,

    /// Keep sidecar JSON files after processing (default: delete them)
    #[arg(short, long)]
    keep_json: bool,

    /// Do not update filesystem dates
    #[arg(long)]
    no_file_dates: bool,

    /// Show what would be done without changing anything
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Path to the ExifTool executable
    #[arg(long)]
    exiftool: Option<PathBuf>,
}

/// Config file counterpart of ProcessOptions: everything optional so flags
/// can fill the gaps.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    extract_zips: Option<bool>,
    delete_zips: Option<bool>,
    keep_json: Option<bool>,
    update_file_dates: Option<bool>,
    dry_run: Option<bool>,
    exiftool_path: Option<PathBuf>,
}

impl ConfigFile {
    fn load(path: &PathBuf) -> anyhow::Result<Self> {
        let file =
            File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let config: ConfigFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }
}

/// Merge flags over the config file. Boolean flags only override when set;
/// paths given on the command line always win.
fn build_options(cli: &Cli, config: ConfigFile) -> anyhow::Result<ProcessOptions> {
    let input = cli
        .input
        .clone()
        .or(config.input)
        .context("--input is required (or set \"input\" in the config file)")?;

    Ok(ProcessOptions {
        input,
        output: cli.output.clone().or(config.output),
        extract_zips: cli.extract || config.extract_zips.unwrap_or(false),
        delete_zips: cli.delete_zips || config.delete_zips.unwrap_or(false),
        keep_json: cli.keep_json || config.keep_json.unwrap_or(false),
        update_file_dates: if cli.no_file_dates {
            false
        } else {
            config.update_file_dates.unwrap_or(true)
        },
        dry_run: cli.dry_run || config.dry_run.unwrap_or(false),
        exiftool_path: cli.exiftool.clone().or(config.exiftool_path),
    })
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let t_total = std::time::Instant::now();

    let config = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let options = build_options(&cli, config)?;

    if !options.input.exists() {
        anyhow::bail!("input path does not exist: {}", options.input.display());
    }
    if options.dry_run {
        eprintln!("Dry run - no changes will be made");
    }

    let bar = ProgressBar::hidden();
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} {msg}")
            .unwrap(),
    );
    let stage = Mutex::new(String::new());

    let result = process(&options, &move |name, current, total, message| {
        let mut active = stage.lock().unwrap();
        if *active != name {
            *active = name.to_string();
            bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            bar.set_length(total);
            bar.set_position(0);
        }
        bar.set_position(current + 1);
        bar.set_message(format!("{name}: {message}"));
    })?;

    eprintln!(
        "Done! {} media files, {} matched, {} unmatched, {} metadata written, {} sidecars removed ({:.2}s)",
        result.media_found,
        result.media_matched,
        result.media_unmatched,
        result.metadata_written,
        result.sidecars_deleted,
        t_total.elapsed().as_secs_f64()
    );

    if !result.matched_by_strategy.is_empty() {
        let breakdown: Vec<String> = result
            .matched_by_strategy
            .iter()
            .map(|(strategy, count)| format!("{strategy} {count}"))
            .collect();
        eprintln!("Matched by: {}", breakdown.join(", "));
    }

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }

    if result.injection_failed > 0 {
        anyhow::bail!("{} files failed metadata injection", result.injection_failed);
    }

    Ok(())
}
