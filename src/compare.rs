use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use log::{error, info};
use plotters::coord::Shift;
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cluster::{self, Partition};
use crate::colormap;
use crate::config::RunConfig;
use crate::grid::Grid;
use crate::stats::{self, Summary};

const HISTOGRAM_BINS: usize = 30;
const KDE_POINTS: usize = 200;

/// Which comparison artifacts made it to disk. Groups are independent: one
/// failing group is logged and counted without blocking the others.
#[derive(Debug, Default)]
pub struct ComparisonReport {
    pub written: Vec<PathBuf>,
    pub failed: usize,
}

/// Renders the three origin/final comparison artifact groups and prints the
/// summary statistics for both states.
///
/// Shape compatibility is checked first; a mismatch aborts the whole phase
/// before any artifact is written.
pub fn render_comparison(
    cfg: &RunConfig,
    origin: &Grid,
    final_grid: &Grid,
) -> Result<ComparisonReport> {
    let diff = stats::difference(final_grid, origin)?;

    fs::create_dir_all(&cfg.results_dir).with_context(|| {
        format!(
            "Failed to create results directory '{}'",
            cfg.results_dir.display()
        )
    })?;

    log_state_summary("Initial State", &stats::describe(origin.values()));
    log_state_summary("Final State", &stats::describe(final_grid.values()));

    let diff_summary = stats::describe(diff.values());
    let max_abs_change = stats::max_abs(diff.values());
    info!("Change (Final - Initial) Statistics");
    info!("  Mean Change: {:.4}", diff_summary.mean);
    info!("  Abs Max Change: {:.4}", max_abs_change);

    let mut report = ComparisonReport::default();

    let distribution_path = cfg.results_dir.join("distribution_comparison.png");
    record_group(
        &mut report,
        "distribution comparison",
        distribution_path.clone(),
        plot_distribution(&distribution_path, origin.values(), final_grid.values()),
    );

    let heatmap_path = cfg.results_dir.join("heatmap_comparison.png");
    record_group(
        &mut report,
        "heatmap comparison",
        heatmap_path.clone(),
        plot_heatmaps(&heatmap_path, origin, final_grid, &diff),
    );

    let cluster_path = cfg.results_dir.join("cluster_comparison.png");
    record_group(
        &mut report,
        "cluster comparison",
        cluster_path.clone(),
        plot_clusters(&cluster_path, cfg, origin.values(), final_grid.values()),
    );

    Ok(report)
}

fn record_group(report: &mut ComparisonReport, name: &str, path: PathBuf, result: Result<()>) {
    match result {
        Ok(()) => {
            info!("Saved {} to '{}'", name, path.display());
            report.written.push(path);
        }
        Err(e) => {
            error!("Failed to render {}: {:#}", name, e);
            report.failed += 1;
        }
    }
}

fn log_state_summary(label: &str, summary: &Summary) {
    info!("{} Statistics", label);
    info!("  Mean: {:.4}", summary.mean);
    info!("  Variance: {:.4}", summary.variance);
    info!("  Std Dev: {:.4}", summary.std_dev);
    info!("  Min: {:.4}", summary.min);
    info!("  Max: {:.4}", summary.max);
}

/// Joint value range of both samples, padded so bars and points stay off the
/// chart border. Degenerate (constant) ranges get a fixed half-unit pad.
fn value_range(a: &[f32], b: &[f32]) -> (f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in a.iter().chain(b) {
        min = min.min(v);
        max = max.max(v);
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if max - min < 1e-6 {
        return (min - 0.5, max + 0.5);
    }
    let pad = (max - min) * 0.05;
    (min - pad, max + pad)
}

/// Density-normalized histogram: each bar is count / (n * bin_width), so the
/// bar areas sum to one.
fn density_histogram(sample: &[f32], x_min: f32, x_max: f32, bins: usize) -> Vec<f32> {
    let bin_width = (x_max - x_min) / bins as f32;
    let mut counts = vec![0usize; bins];
    for &v in sample {
        let bin = (((v - x_min) / bin_width) as usize).min(bins - 1);
        counts[bin] += 1;
    }
    let norm = sample.len() as f32 * bin_width;
    counts.iter().map(|&c| c as f32 / norm).collect()
}

/// Gaussian kernel density estimate over an evaluation grid, with Silverman's
/// rule-of-thumb bandwidth.
fn kde_curve(sample: &[f32], x_min: f32, x_max: f32, points: usize) -> Vec<(f32, f32)> {
    let summary = stats::describe(sample);
    let n = sample.len() as f32;
    let bandwidth = (1.06 * summary.std_dev * n.powf(-0.2)).max(1e-3);
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f32::consts::PI).sqrt());

    (0..points)
        .map(|i| {
            let x = x_min + (x_max - x_min) * i as f32 / (points - 1) as f32;
            let density: f32 = sample
                .iter()
                .map(|&v| {
                    let z = (x - v) / bandwidth;
                    (-0.5 * z * z).exp()
                })
                .sum();
            (x, density * norm)
        })
        .collect()
}

/// Histogram + KDE overlay panel and a quartile box summary panel.
fn plot_distribution(path: &Path, origin: &[f32], final_vals: &[f32]) -> Result<()> {
    let root = BitMapBackend::new(path, (1600, 700)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    draw_histogram_panel(&panels[0], origin, final_vals)?;
    draw_box_panel(&panels[1], origin, final_vals)?;

    root.present()?;
    Ok(())
}

fn draw_histogram_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    origin: &[f32],
    final_vals: &[f32],
) -> Result<()> {
    let (x_min, x_max) = value_range(origin, final_vals);
    let bin_width = (x_max - x_min) / HISTOGRAM_BINS as f32;

    let origin_hist = density_histogram(origin, x_min, x_max, HISTOGRAM_BINS);
    let final_hist = density_histogram(final_vals, x_min, x_max, HISTOGRAM_BINS);
    let origin_kde = kde_curve(origin, x_min, x_max, KDE_POINTS);
    let final_kde = kde_curve(final_vals, x_min, x_max, KDE_POINTS);

    let y_max = origin_hist
        .iter()
        .chain(&final_hist)
        .copied()
        .chain(origin_kde.iter().chain(&final_kde).map(|&(_, y)| y))
        .fold(1e-3f32, f32::max)
        * 1.1;

    let mut chart = ChartBuilder::on(area)
        .caption(
            "Distribution of Opinion Coordinates (Initial vs Final)",
            ("sans-serif", 22),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, 0f32..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Opinion coordinate")
        .y_desc("Density")
        .draw()?;

    chart
        .draw_series(origin_hist.iter().enumerate().map(|(i, &d)| {
            let x0 = x_min + i as f32 * bin_width;
            Rectangle::new([(x0, 0.0), (x0 + bin_width, d)], BLUE.mix(0.35).filled())
        }))?
        .label("Initial")
        .legend(|(x, y)| Rectangle::new([(x, y - 4), (x + 12, y + 4)], BLUE.mix(0.35).filled()));

    chart
        .draw_series(final_hist.iter().enumerate().map(|(i, &d)| {
            let x0 = x_min + i as f32 * bin_width;
            Rectangle::new([(x0, 0.0), (x0 + bin_width, d)], RED.mix(0.35).filled())
        }))?
        .label("Final")
        .legend(|(x, y)| Rectangle::new([(x, y - 4), (x + 12, y + 4)], RED.mix(0.35).filled()));

    chart.draw_series(LineSeries::new(origin_kde, &BLUE))?;
    chart.draw_series(LineSeries::new(final_kde, &RED))?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    Ok(())
}

fn draw_box_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    origin: &[f32],
    final_vals: &[f32],
) -> Result<()> {
    let (y_min, y_max) = value_range(origin, final_vals);

    let mut chart = ChartBuilder::on(area)
        .caption("Summary of Opinion Coordinates", ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0f32..3f32, y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(4)
        .x_label_formatter(&|x: &f32| {
            if (x - 1.0).abs() < 0.2 {
                "Initial".to_string()
            } else if (x - 2.0).abs() < 0.2 {
                "Final".to_string()
            } else {
                String::new()
            }
        })
        .y_desc("Opinion coordinate")
        .draw()?;

    chart.draw_series(vec![
        Boxplot::new_vertical(1.0f32, &Quartiles::new(origin)).width(60),
        Boxplot::new_vertical(2.0f32, &Quartiles::new(final_vals)).width(60),
    ])?;

    Ok(())
}

/// Three-panel heatmap: origin and final on the fixed [0, 1] landscape scale,
/// the difference on a symmetric scale centered at zero.
fn plot_heatmaps(path: &Path, origin: &Grid, final_grid: &Grid, diff: &Grid) -> Result<()> {
    const MARGIN: u32 = 16;

    // Scale panels up to roughly 360 px wide regardless of grid resolution
    let scale = (360 / origin.cols().max(1) as u32).clamp(1, 16);
    let limit = stats::max_abs(diff.values());

    let panels = [
        colormap::rasterize(origin, scale, colormap::coordinate_color),
        colormap::rasterize(final_grid, scale, colormap::coordinate_color),
        colormap::rasterize(diff, scale, |v| colormap::difference_color(v, limit)),
    ];

    let panel_w = panels[0].width();
    let panel_h = panels[0].height();
    let mut canvas = RgbaImage::from_pixel(
        3 * panel_w + 4 * MARGIN,
        panel_h + 2 * MARGIN,
        Rgba([255, 255, 255, 255]),
    );

    for (i, panel) in panels.iter().enumerate() {
        let x = MARGIN + i as u32 * (panel_w + MARGIN);
        image::imageops::replace(&mut canvas, panel, x as i64, MARGIN as i64);
    }

    canvas
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

/// Two scatter panels colored by the k-means labels of each state. The two
/// samples are standardized and clustered independently, so labels and
/// centers are not comparable across panels.
fn plot_clusters(path: &Path, cfg: &RunConfig, origin: &[f32], final_vals: &[f32]) -> Result<()> {
    let origin_part = cluster::partition(origin, cfg.cluster_k, cfg.cluster_seed)?;
    let final_part = cluster::partition(final_vals, cfg.cluster_k, cfg.cluster_seed)?;

    log_partition("Initial State Clusters", &origin_part);
    log_partition("Final State Clusters", &final_part);

    let root = BitMapBackend::new(path, (1200, 500)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    draw_scatter_panel(
        &panels[0],
        "Initial State Clusters",
        origin,
        &origin_part,
        cfg.cluster_seed,
    )?;
    draw_scatter_panel(
        &panels[1],
        "Final State Clusters",
        final_vals,
        &final_part,
        cfg.cluster_seed.wrapping_add(1),
    )?;

    root.present()?;
    Ok(())
}

fn log_partition(label: &str, partition: &Partition) {
    info!("{}", label);
    for (cluster, count) in partition.counts.iter().enumerate() {
        info!("  Cluster {} Count: {}", cluster, count);
    }
    info!("  Cluster Centers (standardized): {:?}", partition.centers);
}

fn draw_scatter_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    title: &str,
    values: &[f32],
    partition: &Partition,
    jitter_seed: u64,
) -> Result<()> {
    const COLORS: [RGBColor; 6] = [BLUE, GREEN, MAGENTA, CYAN, RED, BLACK];

    let (x_min, x_max) = value_range(values, values);

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 22))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(30)
        .build_cartesian_2d(x_min..x_max, -1.0f32..1.0f32)?;

    chart
        .configure_mesh()
        .x_desc("Opinion coordinate")
        .y_labels(0)
        .draw()?;

    // Vertical jitter only; the y axis carries no information
    let mut rng = StdRng::seed_from_u64(jitter_seed);
    let jitter: Vec<f32> = values.iter().map(|_| rng.random_range(-0.6..0.6)).collect();

    for cluster_idx in 0..partition.centers.len() {
        let color = COLORS[cluster_idx % COLORS.len()];
        let points: Vec<(f32, f32)> = (0..values.len())
            .filter(|&i| partition.labels[i] == cluster_idx)
            .map(|i| (values[i], jitter[i]))
            .collect();

        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 2, color.filled())),
            )?
            .label(format!("Cluster {}", cluster_idx))
            .legend(move |(x, y)| Circle::new((x + 6, y), 3, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ShapeMismatch;
    use tempfile::TempDir;

    fn uniform_grid(rows: usize, cols: usize, v: f32) -> Grid {
        Grid::from_data(rows, cols, vec![v; rows * cols])
    }

    #[test]
    fn shape_mismatch_aborts_before_artifacts() {
        let dir = TempDir::new().unwrap();
        let cfg = RunConfig {
            results_dir: dir.path().join("results"),
            ..RunConfig::default()
        };

        let origin = uniform_grid(5, 5, 0.2);
        let final_grid = uniform_grid(5, 6, 0.8);

        let err = render_comparison(&cfg, &origin, &final_grid).unwrap_err();
        assert!(err.downcast_ref::<ShapeMismatch>().is_some());
        assert!(!cfg.results_dir.exists(), "no artifacts may be written");
    }

    #[test]
    fn failing_group_does_not_block_the_others() {
        let dir = TempDir::new().unwrap();
        let cfg = RunConfig {
            results_dir: dir.path().join("results"),
            ..RunConfig::default()
        };

        // Occupy two artifact paths with directories so those saves fail
        fs::create_dir_all(cfg.results_dir.join("distribution_comparison.png")).unwrap();
        fs::create_dir_all(cfg.results_dir.join("cluster_comparison.png")).unwrap();

        let origin = uniform_grid(8, 8, 0.2);
        let final_grid = uniform_grid(8, 8, 0.8);

        let report = render_comparison(&cfg, &origin, &final_grid).unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(
            report.written,
            vec![cfg.results_dir.join("heatmap_comparison.png")]
        );
        assert!(cfg.results_dir.join("heatmap_comparison.png").exists());
    }

    #[test]
    fn density_histogram_integrates_to_one() {
        let sample: Vec<f32> = (0..1000).map(|i| i as f32 / 1000.0).collect();
        let hist = density_histogram(&sample, 0.0, 1.0, HISTOGRAM_BINS);

        let bin_width = 1.0 / HISTOGRAM_BINS as f32;
        let total: f32 = hist.iter().map(|d| d * bin_width).sum();
        assert!((total - 1.0).abs() < 1e-4, "total mass was {}", total);
    }

    #[test]
    fn value_range_pads_degenerate_input() {
        let (min, max) = value_range(&[0.4, 0.4], &[0.4]);
        assert!(min < 0.4 && max > 0.4);
    }

    #[test]
    fn kde_is_non_negative_and_peaks_near_mass() {
        let sample = vec![0.5f32; 200];
        let curve = kde_curve(&sample, 0.0, 1.0, 101);

        assert!(curve.iter().all(|&(_, y)| y >= 0.0));
        let (peak_x, _) = curve
            .iter()
            .copied()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        assert!((peak_x - 0.5).abs() < 0.02);
    }

    #[test]
    fn heatmap_triptych_writes_single_canvas() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("heatmap.png");

        let origin = uniform_grid(10, 10, 0.2);
        let final_grid = uniform_grid(10, 10, 0.8);
        let diff = stats::difference(&final_grid, &origin).unwrap();

        plot_heatmaps(&path, &origin, &final_grid, &diff).unwrap();

        let image = image::open(&path).unwrap();
        // 3 panels of 10 cells at 16 px plus margins
        assert_eq!(image.width(), 3 * 160 + 4 * 16);
        assert_eq!(image.height(), 160 + 2 * 16);
    }
}
