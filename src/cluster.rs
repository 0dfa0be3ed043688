use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of independent k-means initializations kept per fit. The best
/// (lowest inertia) run wins, which stabilizes center placement against
/// unlucky seeding.
const N_INIT: usize = 10;
const MAX_ITERATIONS: usize = 100;
const CONVERGENCE_TOL: f32 = 1e-6;

/// Result of a k-means fit over a standardized 1-D sample.
///
/// Labels are opaque integers in `0..k`; which label lands on which side of
/// the distribution is not stable across fits on different samples. Centers
/// are reported in standardized space and deliberately never rescaled back
/// to original units.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// One label per sample element, in sample order.
    pub labels: Vec<usize>,
    /// One center per cluster, in standardized coordinate space.
    pub centers: Vec<f32>,
    /// Element count per label.
    pub counts: Vec<usize>,
}

/// Rescales a sample to zero mean and unit variance.
///
/// Center and scale come from this sample alone; origin and final samples are
/// standardized independently of each other. A zero-variance sample maps to
/// all zeros.
pub fn standardize(sample: &[f32]) -> Vec<f32> {
    let summary = crate::stats::describe(sample);
    let scale = if summary.std_dev > 1e-12 {
        summary.std_dev
    } else {
        1.0
    };
    sample.iter().map(|v| (v - summary.mean) / scale).collect()
}

/// Standardizes `sample` and fits k-means with a fixed seed.
///
/// Deterministic for a given sample and seed, up to label permutation.
pub fn partition(sample: &[f32], k: usize, seed: u64) -> Result<Partition> {
    if k == 0 {
        anyhow::bail!("cluster count must be at least 1");
    }
    if sample.len() < k {
        anyhow::bail!(
            "sample of {} elements cannot be split into {} clusters",
            sample.len(),
            k
        );
    }

    let data = standardize(sample);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut centers = seed_centers(&data, k, &mut rng);
    let (mut labels, mut best_inertia) = lloyd(&data, &mut centers);
    for _ in 1..N_INIT {
        let mut candidate = seed_centers(&data, k, &mut rng);
        let (candidate_labels, inertia) = lloyd(&data, &mut candidate);
        if inertia < best_inertia {
            centers = candidate;
            labels = candidate_labels;
            best_inertia = inertia;
        }
    }

    let mut counts = vec![0usize; k];
    for &label in &labels {
        counts[label] += 1;
    }

    Ok(Partition {
        labels,
        centers,
        counts,
    })
}

/// k-means++ style seeding: first center uniform, later centers weighted by
/// squared distance to the nearest already-chosen center.
fn seed_centers(data: &[f32], k: usize, rng: &mut StdRng) -> Vec<f32> {
    let mut centers = Vec::with_capacity(k);
    centers.push(data[rng.random_range(0..data.len())]);

    let mut dist_sq: Vec<f64> = data
        .iter()
        .map(|&v| ((v - centers[0]) as f64).powi(2))
        .collect();

    while centers.len() < k {
        let total: f64 = dist_sq.iter().sum();
        let next = if total <= f64::EPSILON {
            // All remaining mass sits on existing centers; fall back to uniform
            data[rng.random_range(0..data.len())]
        } else {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = data.len() - 1;
            for (i, &d) in dist_sq.iter().enumerate() {
                target -= d;
                if target <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            data[chosen]
        };

        for (i, &v) in data.iter().enumerate() {
            dist_sq[i] = dist_sq[i].min(((v - next) as f64).powi(2));
        }
        centers.push(next);
    }

    centers
}

/// Lloyd iterations until centers stop moving. Returns final labels and the
/// total within-cluster squared distance (inertia).
fn lloyd(data: &[f32], centers: &mut [f32]) -> (Vec<usize>, f64) {
    let k = centers.len();
    let mut labels = vec![0usize; data.len()];

    for _ in 0..MAX_ITERATIONS {
        for (i, &v) in data.iter().enumerate() {
            labels[i] = nearest_center(v, centers);
        }

        let mut sums = vec![0.0f64; k];
        let mut counts = vec![0usize; k];
        for (i, &v) in data.iter().enumerate() {
            sums[labels[i]] += v as f64;
            counts[labels[i]] += 1;
        }

        let mut movement = 0.0f32;
        for c in 0..k {
            let new_center = if counts[c] > 0 {
                (sums[c] / counts[c] as f64) as f32
            } else {
                // Re-seat an empty cluster on the point farthest from its
                // current assignment
                farthest_point(data, &labels, centers)
            };
            movement = movement.max((new_center - centers[c]).abs());
            centers[c] = new_center;
        }

        if movement < CONVERGENCE_TOL {
            break;
        }
    }

    for (i, &v) in data.iter().enumerate() {
        labels[i] = nearest_center(v, centers);
    }

    let inertia = data
        .iter()
        .zip(&labels)
        .map(|(&v, &l)| ((v - centers[l]) as f64).powi(2))
        .sum();

    (labels, inertia)
}

#[inline]
fn nearest_center(value: f32, centers: &[f32]) -> usize {
    let mut best = 0usize;
    let mut best_dist = f32::INFINITY;
    for (c, &center) in centers.iter().enumerate() {
        let dist = (value - center).abs();
        if dist < best_dist {
            best_dist = dist;
            best = c;
        }
    }
    best
}

fn farthest_point(data: &[f32], labels: &[usize], centers: &[f32]) -> f32 {
    let mut best = data[0];
    let mut best_dist = -1.0f32;
    for (i, &v) in data.iter().enumerate() {
        let dist = (v - centers[labels[i]]).abs();
        if dist > best_dist {
            best_dist = dist;
            best = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bimodal_sample() -> Vec<f32> {
        let mut sample = vec![0.0f32; 500];
        sample.extend(vec![1.0f32; 500]);
        sample
    }

    #[test]
    fn standardize_centers_and_scales() {
        let sample = vec![1.0f32, 2.0, 3.0, 4.0, 5.0];
        let standardized = standardize(&sample);

        let summary = crate::stats::describe(&standardized);
        assert!(summary.mean.abs() < 1e-6);
        assert!((summary.variance - 1.0).abs() < 1e-5);
    }

    #[test]
    fn standardize_constant_sample_is_all_zero() {
        let standardized = standardize(&[0.42f32; 100]);
        assert!(standardized.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn well_separated_clusters_split_evenly() {
        let sample = bimodal_sample();
        let result = partition(&sample, 2, 42).unwrap();

        assert_eq!(result.counts.iter().sum::<usize>(), sample.len());
        assert!(result.counts.iter().all(|&c| c > 0));

        let mut sorted = result.counts.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![500, 500]);

        // Centers straddle the standardized mean (zero)
        assert_eq!(result.centers.len(), 2);
        let positive = result.centers.iter().filter(|&&c| c > 0.0).count();
        assert_eq!(positive, 1);
    }

    #[test]
    fn partition_is_deterministic_for_fixed_seed() {
        let sample = bimodal_sample();
        let a = partition(&sample, 2, 42).unwrap();
        let b = partition(&sample, 2, 42).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn labels_follow_cluster_membership() {
        let sample = bimodal_sample();
        let result = partition(&sample, 2, 42).unwrap();

        // All elements with the same value share a label
        let low_label = result.labels[0];
        assert!(result.labels[..500].iter().all(|&l| l == low_label));
        let high_label = result.labels[500];
        assert!(result.labels[500..].iter().all(|&l| l == high_label));
        assert_ne!(low_label, high_label);
    }

    #[test]
    fn rejects_undersized_sample() {
        assert!(partition(&[0.5f32], 2, 42).is_err());
        assert!(partition(&[0.5f32, 0.6], 0, 42).is_err());
    }
}
