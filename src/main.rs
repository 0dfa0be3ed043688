use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{error, info, LevelFilter};

mod advisory;
mod cluster;
mod colormap;
mod compare;
mod config;
mod frames;
mod grid;
mod stats;

use config::{Args, RunConfig};
use grid::{Grid, ShapeMismatch};

fn main() -> Result<()> {
    let args = Args::parse();

    Builder::from_default_env()
        .filter(None, LevelFilter::Info)
        .init();

    let cfg = RunConfig::resolve(args)?;

    info!("Starting Landscape Visualizer...");
    info!("Origin snapshot: {}", cfg.origin_path.display());
    info!("Final snapshot: {}", cfg.final_path.display());
    info!(
        "Frame index range: [{}..{}]",
        cfg.first_index, cfg.last_index
    );
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    run(&cfg)
}

/// Runs the comparison phase, the frame phase, and the advisory.
///
/// The two phases are independent. A shape mismatch between the mandatory
/// snapshots aborts only the comparison phase; the frames still render since
/// each one depends on nothing but its own per-step file. Mandatory-load
/// failures (`NotFound`/`Malformed`) remain fatal for the whole run.
fn run(cfg: &RunConfig) -> Result<()> {
    let start_time = Instant::now();

    if cfg.skip_comparison {
        info!("Skipping comparison phase as requested.");
    } else if let Err(e) = run_comparison_phase(cfg) {
        match e.downcast_ref::<ShapeMismatch>() {
            Some(mismatch) => {
                error!(
                    "Comparison phase aborted, no comparison artifacts written: {}",
                    mismatch
                );
            }
            None => return Err(e),
        }
    }

    let frame_report = if cfg.skip_frames {
        info!("Skipping frame phase as requested.");
        None
    } else {
        Some(frames::render_frames(cfg)?)
    };

    advisory::print_instructions(&cfg.frames_dir, cfg.fps);

    if let Some(report) = frame_report {
        info!(
            "Frame summary: {} produced, {} skipped, {} errored out of {} requested.",
            report.produced, report.skipped, report.errored, report.requested
        );
    }
    info!("Run completed in {:.2?}.", start_time.elapsed());

    Ok(())
}

/// Loads the two mandatory snapshots and renders the comparison artifacts.
/// Load failures here are fatal, unlike the per-frame loads of the frame
/// phase.
fn run_comparison_phase(cfg: &RunConfig) -> Result<()> {
    info!("Comparing initial and final states");

    info!("Loading origin data from '{}'...", cfg.origin_path.display());
    let origin = Grid::load_csv(&cfg.origin_path).with_context(|| {
        format!(
            "Mandatory origin snapshot failed to load: '{}'",
            cfg.origin_path.display()
        )
    })?;
    info!("Origin data shape: {}x{}", origin.rows(), origin.cols());

    info!("Loading final data from '{}'...", cfg.final_path.display());
    let final_grid = Grid::load_csv(&cfg.final_path).with_context(|| {
        format!(
            "Mandatory final snapshot failed to load: '{}'",
            cfg.final_path.display()
        )
    })?;
    info!(
        "Final data shape: {}x{}",
        final_grid.rows(),
        final_grid.cols()
    );

    let report = compare::render_comparison(cfg, &origin, &final_grid)?;
    info!(
        "Comparison artifacts written: {} ({} group(s) failed).",
        report.written.len(),
        report.failed
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_csv(path: &Path, content: &str) {
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn phase_test_config(dir: &TempDir) -> RunConfig {
        RunConfig {
            origin_path: dir.path().join("origin.csv"),
            final_path: dir.path().join("final.csv"),
            snapshot_dir: dir.path().join("snapshots"),
            results_dir: dir.path().join("results"),
            frames_dir: dir.path().join("frames"),
            first_index: 1,
            last_index: 3,
            pixels_per_cell: 1,
            ..RunConfig::default()
        }
    }

    #[test]
    fn shape_mismatch_does_not_block_frame_phase() {
        let dir = TempDir::new().unwrap();
        let cfg = phase_test_config(&dir);

        // 2x2 origin against a 2x3 final: comparison phase must abort
        write_csv(&cfg.origin_path, "0.1,0.2\n0.3,0.4\n");
        write_csv(&cfg.final_path, "0.1,0.2,0.3\n0.4,0.5,0.6\n");

        fs::create_dir_all(&cfg.snapshot_dir).unwrap();
        for index in 1..=3u32 {
            write_csv(&cfg.snapshot_path(index), "0.1,0.9\n0.4,0.6\n");
        }

        run(&cfg).unwrap();

        for index in 1..=3u32 {
            assert!(
                cfg.frames_dir.join(frames::frame_filename(index)).exists(),
                "frame {} must render despite the comparison failure",
                index
            );
        }
        assert!(
            !cfg.results_dir.exists(),
            "mismatched comparison must write no artifacts"
        );
    }

    #[test]
    fn missing_mandatory_snapshot_terminates_the_run() {
        let dir = TempDir::new().unwrap();
        let cfg = phase_test_config(&dir);

        // No origin.csv at all; per-step snapshots exist but must not render
        write_csv(&cfg.final_path, "0.1,0.2\n0.3,0.4\n");
        fs::create_dir_all(&cfg.snapshot_dir).unwrap();
        write_csv(&cfg.snapshot_path(1), "0.1,0.9\n0.4,0.6\n");

        assert!(run(&cfg).is_err());
        assert!(!cfg.frames_dir.exists());
    }
}
