use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;

use crate::colormap;
use crate::config::RunConfig;
use crate::grid::{Grid, LoadError};

/// A progress line is logged for every 100th successfully rendered frame.
const PROGRESS_LOG_INTERVAL: usize = 100;

/// Outcome of a frame pipeline run. `produced + skipped + errored` equals
/// `requested`.
///
/// `skipped` counts absent snapshot files only. A snapshot that exists but
/// fails to parse is contained like any other per-frame failure and counted
/// under `errored`, together with render/save failures; neither bucket aborts
/// the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    pub requested: usize,
    pub produced: usize,
    pub skipped: usize,
    pub errored: usize,
}

/// Deterministic frame filename for a step index. The zero padding keeps
/// lexical order equal to numeric order, which downstream encoders rely on
/// when globbing the frame directory.
pub fn frame_filename(index: u32) -> String {
    format!("landscape_frame_{:05}.png", index)
}

/// Renders one heatmap frame per step index in the configured range.
///
/// Each index is independent: a missing snapshot is skipped with a warning,
/// and any other per-frame failure is logged and counted without aborting the
/// run. Indices map to private, index-derived output paths, so the render
/// loop is a lock-free parallel map; progress is aggregated through atomic
/// counters rather than assuming ascending completion order.
pub fn render_frames(cfg: &RunConfig) -> Result<FrameReport> {
    fs::create_dir_all(&cfg.frames_dir).with_context(|| {
        format!(
            "Failed to create frame directory '{}'",
            cfg.frames_dir.display()
        )
    })?;

    let indices: Vec<u32> = (cfg.first_index..=cfg.last_index).collect();
    let requested = indices.len();
    info!(
        "Rendering up to {} frames from '{}' into '{}'...",
        requested,
        cfg.snapshot_dir.display(),
        cfg.frames_dir.display()
    );

    let progress = ProgressBar::new(requested as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]")
            .expect("Invalid progress bar template")
            .progress_chars("#>-"),
    );

    let produced = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);
    let errored = AtomicUsize::new(0);

    indices.par_iter().for_each(|&index| {
        let path = cfg.snapshot_path(index);
        match Grid::load_csv(&path) {
            Ok(grid) => match save_frame(&grid, index, cfg) {
                Ok(()) => {
                    let done = produced.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % PROGRESS_LOG_INTERVAL == 0 {
                        info!("Rendered {} frames (latest: {})", done, frame_filename(index));
                    }
                }
                Err(e) => {
                    warn!("Frame {} failed during render/save: {:#}", index, e);
                    errored.fetch_add(1, Ordering::Relaxed);
                }
            },
            Err(LoadError::NotFound { .. }) => {
                warn!(
                    "Snapshot for step {} not found at '{}'. Skipping frame.",
                    index,
                    path.display()
                );
                skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!("Frame {} dropped: {}", index, e);
                errored.fetch_add(1, Ordering::Relaxed);
            }
        }
        progress.inc(1);
    });

    let report = FrameReport {
        requested,
        produced: produced.into_inner(),
        skipped: skipped.into_inner(),
        errored: errored.into_inner(),
    };

    progress.finish_with_message(format!("Rendered {} frames", report.produced));
    info!(
        "{} of {} frames rendered into '{}' ({} skipped, {} errored).",
        report.produced,
        report.requested,
        cfg.frames_dir.display(),
        report.skipped,
        report.errored
    );

    Ok(report)
}

/// Rasterizes and persists one frame. The image is written to a temporary
/// path and renamed into place, so an aborted run leaves either a complete
/// frame or no file at all.
fn save_frame(grid: &Grid, index: u32, cfg: &RunConfig) -> Result<()> {
    let image = colormap::rasterize(grid, cfg.pixels_per_cell, colormap::coordinate_color);

    let final_path = cfg.frames_dir.join(frame_filename(index));
    let tmp_path = cfg.frames_dir.join(format!("{}.tmp", frame_filename(index)));

    image
        .save_with_format(&tmp_path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write '{}'", tmp_path.display()))?;
    fs::rename(&tmp_path, &final_path)
        .with_context(|| format!("failed to move frame into '{}'", final_path.display()))?;

    Ok(())
}
