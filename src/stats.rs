use crate::grid::{Grid, ShapeMismatch};

/// Descriptive statistics over a flattened sample.
///
/// Variance is the population variance (divide by N, not N-1), matching the
/// summary lines printed for each simulation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub mean: f32,
    pub variance: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
}

/// Computes summary statistics for a non-empty sample.
///
/// Order-independent: any flattening of the same grid yields the same result.
pub fn describe(sample: &[f32]) -> Summary {
    assert!(!sample.is_empty(), "describe requires a non-empty sample");

    let n = sample.len() as f64;
    let mut sum = 0.0f64;
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;

    for &v in sample {
        sum += v as f64;
        min = min.min(v);
        max = max.max(v);
    }
    let mean = sum / n;

    let mut sq_sum = 0.0f64;
    for &v in sample {
        let d = v as f64 - mean;
        sq_sum += d * d;
    }
    let variance = sq_sum / n;

    Summary {
        mean: mean as f32,
        variance: variance as f32,
        std_dev: variance.sqrt() as f32,
        min,
        max,
    }
}

/// Elementwise `final - origin` difference map.
///
/// The two grids must share dimensions; the comparison phase fails fast on a
/// mismatch before any artifact is produced.
pub fn difference(final_grid: &Grid, origin: &Grid) -> Result<Grid, ShapeMismatch> {
    if final_grid.shape() != origin.shape() {
        return Err(ShapeMismatch {
            rows_a: origin.rows(),
            cols_a: origin.cols(),
            rows_b: final_grid.rows(),
            cols_b: final_grid.cols(),
        });
    }

    let data = final_grid
        .values()
        .iter()
        .zip(origin.values())
        .map(|(f, o)| f - o)
        .collect();

    Ok(Grid::from_data(final_grid.rows(), final_grid.cols(), data))
}

/// Absolute-value maximum of a sample. Used for the symmetric color range of
/// the difference heatmap and the "abs max change" summary line.
pub fn max_abs(sample: &[f32]) -> f32 {
    sample.iter().fold(0.0f32, |acc, v| acc.max(v.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_grid(rows: usize, cols: usize, v: f32) -> Grid {
        Grid::from_data(rows, cols, vec![v; rows * cols])
    }

    #[test]
    fn constant_grid_summary() {
        let grid = constant_grid(4, 5, 0.37);
        let summary = describe(grid.values());

        assert!((summary.mean - 0.37).abs() < 1e-6);
        assert!(summary.variance.abs() < 1e-9);
        assert!(summary.std_dev.abs() < 1e-9);
        assert_eq!(summary.min, 0.37);
        assert_eq!(summary.max, 0.37);
    }

    #[test]
    fn describe_is_order_independent() {
        let sample = vec![0.9, 0.1, 0.5, 0.3, 0.7, 0.2];
        let mut reversed = sample.clone();
        reversed.reverse();

        assert_eq!(describe(&sample), describe(&reversed));
    }

    #[test]
    fn identical_grids_have_zero_difference() {
        let grid = Grid::from_data(2, 3, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let diff = difference(&grid, &grid).unwrap();

        assert!(diff.values().iter().all(|&v| v == 0.0));
        assert_eq!(max_abs(diff.values()), 0.0);
    }

    #[test]
    fn difference_is_elementwise_final_minus_origin() {
        let origin = Grid::from_data(1, 3, vec![0.1, 0.5, 0.9]);
        let final_grid = Grid::from_data(1, 3, vec![0.4, 0.5, 0.3]);

        let diff = difference(&final_grid, &origin).unwrap();
        let expected = [0.3f32, 0.0, -0.6];
        for (got, want) in diff.values().iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
        assert!((max_abs(diff.values()) - 0.6).abs() < 1e-6);
    }

    #[test]
    fn difference_rejects_shape_mismatch() {
        let a = constant_grid(5, 5, 0.0);
        let b = constant_grid(5, 6, 0.0);

        let err = difference(&b, &a).unwrap_err();
        assert_eq!(
            err,
            ShapeMismatch {
                rows_a: 5,
                cols_a: 5,
                rows_b: 5,
                cols_b: 6
            }
        );
    }
}
