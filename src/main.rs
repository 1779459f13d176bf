//! page-capture: capture a paged desktop reader into a PDF
//!
//! Subcommands for listing windows, calibrating the next-page button,
//! inspecting resume state, running a capture, and assembling pages.

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use page_capture::{
    assemble::{AssembleOptions, assemble_store, should_clean_pages},
    calibration::{Calibration, calibrate_from_cursor},
    capture::{CaptureFacade, InputDriver, constants, create_default_backend},
    config::{CaptureConfig, CropMargins},
    controller::CaptureController,
    error::CaptureError,
    hotkeys::{HotkeyAction, HotkeyBindings, spawn_dispatcher},
    model::{CaptureReport, Offset, WindowSelector},
    pages::PageStore,
    session::SessionState,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_PAGES_DIR: &str = "temp_book_pages";
const DEFAULT_OUTPUT: &str = "converted_book.pdf";

const TROUBLESHOOTING: &str = "\
Troubleshooting:
  Black or blank pages usually mean the reader window was minimized, covered
  by another window, or that screen recording is not permitted for this
  program. Bring the reader to the front, grant the permission, delete the
  bad page files from the end of the pages directory, and run again: the
  capture resumes after the last good page.";

#[derive(Parser)]
#[command(name = "page-capture", version)]
#[command(about = "Capture a paged desktop reader into numbered images and a single PDF")]
#[command(after_help = TROUBLESHOOTING)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct WindowArgs {
    /// Reader window title (regex, substring, or fuzzy); repeatable
    #[arg(long = "title")]
    titles: Vec<String>,
    /// Owning application name
    #[arg(long)]
    owner:  Option<String>,
}

impl WindowArgs {
    fn selector(&self) -> WindowSelector {
        let selector = if self.titles.is_empty() {
            WindowSelector::default()
        } else {
            WindowSelector::by_titles(self.titles.clone())
        };

        match &self.owner {
            Some(owner) => selector.with_owner(owner.clone()),
            None => selector,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List all capturable windows
    ListWindows,
    /// Record the next-page button position relative to the reader window
    Calibrate {
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Print the next page index that a run would capture
    ResumeIndex {
        /// Directory holding the page images
        #[arg(long, default_value = DEFAULT_PAGES_DIR)]
        pages_dir: PathBuf,
    },
    /// Capture pages, then assemble them into a PDF
    Run {
        #[command(flatten)]
        window:            WindowArgs,
        /// Next-page button offset from the window's top-left corner
        /// (interactive calibration when omitted)
        #[arg(long, value_name = "DX,DY", allow_hyphen_values = true)]
        offset:            Option<Offset>,
        /// Last page index to capture (0 = until stopped or the pages repeat)
        #[arg(long, default_value_t = 0)]
        pages:             u32,
        /// Wait after each click, in milliseconds
        #[arg(
            long,
            default_value_t = constants::DEFAULT_DELAY_MS,
            value_parser = clap::value_parser!(u64).range(constants::MIN_CLI_DELAY_MS..)
        )]
        delay_ms:          u64,
        /// Pixels to crop from each edge
        #[arg(long, value_name = "LEFT,TOP,RIGHT,BOTTOM", default_value = "280,80,50,50")]
        margins:           CropMargins,
        /// Countdown before the first capture, in milliseconds
        #[arg(long)]
        start_delay_ms:    Option<u64>,
        /// Directory holding the page images
        #[arg(long, default_value = DEFAULT_PAGES_DIR)]
        pages_dir:         PathBuf,
        /// Output PDF path
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output:            PathBuf,
        /// Keep page images after a complete run
        #[arg(long)]
        keep_pages:        bool,
        /// Only capture; do not build the PDF
        #[arg(long)]
        no_assemble:       bool,
        /// Keep going when a click leaves the page unchanged
        #[arg(long)]
        no_stop_on_repeat: bool,
        /// Print the run report as JSON
        #[arg(long)]
        json:              bool,
    },
    /// Assemble existing page images into a PDF
    Assemble {
        /// Directory holding the page images
        #[arg(long, default_value = DEFAULT_PAGES_DIR)]
        pages_dir: PathBuf,
        /// Output PDF path
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output:    PathBuf,
        /// JPEG quality of embedded pages (1-100)
        #[arg(long, default_value_t = constants::PDF_JPEG_QUALITY,
              value_parser = clap::value_parser!(u8).range(1..=100))]
        quality:   u8,
        /// Delete the page images afterwards
        #[arg(long)]
        clean:     bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Respects RUST_LOG; default level: info
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("page_capture=info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListWindows => list_windows().await,
        Commands::Calibrate { window } => {
            let (backend, input) = create_default_backend().map_err(with_hint)?;
            let (tx, mut rx) = mpsc::unbounded_channel();
            let _listener = start_listener(&tx);

            let calibration =
                interactive_calibration(backend.as_ref(), input.as_ref(), &window.selector(), &mut rx)
                    .await?;
            println!("Calibrated. Pass this to run:\n  --offset {}", calibration.offset);
            Ok(())
        }
        Commands::ResumeIndex { pages_dir } => {
            println!("{}", PageStore::new(pages_dir).resume_index());
            Ok(())
        }
        Commands::Run {
            window,
            offset,
            pages,
            delay_ms,
            margins,
            start_delay_ms,
            pages_dir,
            output,
            keep_pages,
            no_assemble,
            no_stop_on_repeat,
            json,
        } => {
            let mut builder = CaptureConfig::builder()
                .selector(window.selector())
                .total_pages(pages)
                .delay(Duration::from_millis(delay_ms))
                .margins(margins)
                .stop_on_repeat(!no_stop_on_repeat);
            if let Some(ms) = start_delay_ms {
                builder = builder.start_delay(Duration::from_millis(ms));
            }

            let options = RunOptions {
                offset,
                pages_dir,
                output,
                keep_pages,
                assemble: !no_assemble,
                json,
            };
            run(builder.build(), options).await
        }
        Commands::Assemble {
            pages_dir,
            output,
            quality,
            clean,
        } => {
            let store = PageStore::new(pages_dir);
            let options = AssembleOptions {
                jpeg_quality: quality,
            };
            let count = assemble_blocking(store.clone(), output.clone(), options).await?;
            println!("Wrote {} page(s) to {}", count, output.display());

            if clean {
                store.clear().map_err(with_hint)?;
            }
            Ok(())
        }
    }
}

/// Output handling for the `run` subcommand
struct RunOptions {
    offset:     Option<Offset>,
    pages_dir:  PathBuf,
    output:     PathBuf,
    keep_pages: bool,
    assemble:   bool,
    json:       bool,
}

async fn list_windows() -> Result<()> {
    let (backend, _input) = create_default_backend().map_err(with_hint)?;
    let windows = backend.list_windows().await.map_err(with_hint)?;

    println!("Found {} windows:\n", windows.len());
    for window in windows {
        println!("  ID: {}", window.id);
        println!("  Title: {}", window.title);
        if !window.owner.is_empty() {
            println!("  Application: {}", window.owner);
        }
        if window.pid > 0 {
            println!("  PID: {}", window.pid);
        }
        println!(
            "  Bounds: {}x{} at {}{}",
            window.rect.width,
            window.rect.height,
            window.rect.origin(),
            if window.minimized { " (minimized)" } else { "" }
        );
        println!();
    }

    Ok(())
}

async fn run(config: CaptureConfig, options: RunOptions) -> Result<()> {
    let (backend, input) = create_default_backend().map_err(with_hint)?;
    let bindings = HotkeyBindings::default();
    let session = SessionState::shared();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _listener = start_listener(&tx);

    let calibration = match options.offset {
        Some(offset) => Calibration::from_offset(offset),
        None => interactive_calibration(backend.as_ref(), input.as_ref(), &config.selector, &mut rx).await?,
    };
    let config = CaptureConfig {
        calibration: Some(calibration),
        ..config
    };

    let dispatcher = spawn_dispatcher(rx, session.clone());
    let ctrl_c = {
        let tx = tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            let _ = tx.send(HotkeyAction::EmergencyStop);
            info!("Stopping after the current step; press Ctrl+C again to quit immediately");

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Second Ctrl+C, exiting without assembling");
                std::process::exit(130);
            }
        })
    };

    info!("Hotkeys: {} (Ctrl+C also stops)", bindings.describe());

    let controller = CaptureController::new(backend, input, session);
    let pages_dir = options.pages_dir.clone();
    let report = tokio::spawn(async move { controller.run(&config, &pages_dir).await })
        .await
        .context("capture task failed")?
        .map_err(with_hint)?;

    ctrl_c.abort();
    drop(tx);
    dispatcher.abort();

    print_report(&report, options.json)?;

    if options.assemble && report.final_index > 0 {
        let store = PageStore::new(&options.pages_dir);
        let count = assemble_blocking(store.clone(), options.output.clone(), AssembleOptions::default()).await?;
        println!("Wrote {} page(s) to {}", count, options.output.display());

        if should_clean_pages(report.reason, options.keep_pages) {
            store.clear().map_err(with_hint)?;
        } else {
            info!("Page images kept in {}", options.pages_dir.display());
        }
    }

    Ok(())
}

/// Waits for the calibration key and records the cursor position
async fn interactive_calibration(
    backend: &dyn CaptureFacade,
    input: &dyn InputDriver,
    selector: &WindowSelector,
    rx: &mut mpsc::UnboundedReceiver<HotkeyAction>,
) -> Result<Calibration> {
    let bindings = HotkeyBindings::default();
    println!(
        "Hover the mouse over the reader's next-page button and press {} ({} to cancel)",
        bindings.calibrate, bindings.emergency_stop
    );

    while let Some(action) = rx.recv().await {
        match action {
            HotkeyAction::Calibrate => {
                return calibrate_from_cursor(backend, input, selector)
                    .await
                    .map_err(with_hint);
            }
            HotkeyAction::EmergencyStop | HotkeyAction::BackupStop => {
                anyhow::bail!("Calibration cancelled");
            }
            HotkeyAction::TogglePause => {}
        }
    }

    Err(with_hint(CaptureError::CalibrationMissing))
}

#[cfg(feature = "desktop")]
fn start_listener(tx: &mpsc::UnboundedSender<HotkeyAction>) -> Option<page_capture::hotkeys::KeyboardListener> {
    Some(page_capture::hotkeys::KeyboardListener::spawn(
        HotkeyBindings::default(),
        tx.clone(),
        Duration::from_millis(constants::poll_interval_ms()),
    ))
}

#[cfg(not(feature = "desktop"))]
fn start_listener(_tx: &mpsc::UnboundedSender<HotkeyAction>) -> Option<()> {
    tracing::warn!("Global hotkeys need the desktop feature");
    None
}

async fn assemble_blocking(store: PageStore, output: PathBuf, options: AssembleOptions) -> Result<usize> {
    tokio::task::spawn_blocking(move || assemble_store(&store, &output, &options))
        .await
        .context("assembly task failed")?
        .map_err(with_hint)
}

fn print_report(report: &CaptureReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Stopped: {}", report.reason);
    println!("Pages captured this run: {}", report.pages_captured);
    println!("Last page on disk: {}", report.final_index);
    if let Some(error) = &report.error {
        println!("Error: {}", error);
    }
    if !report.reason.is_complete() {
        println!(
            "Run again with the same --pages-dir to resume at page {}",
            report.final_index + 1
        );
    }
    Ok(())
}

fn with_hint(error: CaptureError) -> anyhow::Error {
    anyhow::anyhow!("{}\n\nHint: {}", error, error.remediation_hint())
}
