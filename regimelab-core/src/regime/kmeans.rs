//! Seeded k-means with k-means++ initialisation.
//!
//! Lloyd iterations run until the label assignment stops changing or the
//! iteration cap is reached. All randomness comes from the caller's `StdRng`,
//! so a fit is a pure function of `(points, k, seed)`.

use rand::rngs::StdRng;
use rand::Rng;

/// Result of one k-means fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit<const D: usize> {
    pub centroids: Vec<[f64; D]>,
    pub labels: Vec<usize>,
    /// Sum of squared distances from each point to its assigned centroid.
    pub inertia: f64,
    pub iterations: usize,
}

impl<const D: usize> KMeansFit<D> {
    /// Index of the centroid nearest to `point`. Ties go to the lowest index.
    pub fn predict(&self, point: &[f64; D]) -> usize {
        nearest(point, &self.centroids).0
    }

    /// Number of fitted points labelled `cluster`.
    pub fn cluster_size(&self, cluster: usize) -> usize {
        self.labels.iter().filter(|&&l| l == cluster).count()
    }
}

/// Fit `k` clusters once, seeded from `rng`.
///
/// Callers guarantee `points.len() >= k >= 1`.
pub fn fit<const D: usize>(
    points: &[[f64; D]],
    k: usize,
    max_iterations: usize,
    rng: &mut StdRng,
) -> KMeansFit<D> {
    let mut centroids = init_plus_plus(points, k, rng);
    let mut labels = assign(points, &centroids);
    let mut iterations = 0;

    for _ in 0..max_iterations {
        iterations += 1;
        update_centroids(points, &labels, &mut centroids);
        let next = assign(points, &centroids);
        if next == labels {
            break;
        }
        labels = next;
    }

    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| squared_distance(p, &centroids[l]))
        .sum();

    KMeansFit {
        centroids,
        labels,
        inertia,
        iterations,
    }
}

/// Run `n_init` seeded restarts and keep the lowest-inertia fit.
///
/// `rng_for(restart)` supplies the generator for each restart. Earlier
/// restarts win ties.
pub fn fit_best<const D: usize>(
    points: &[[f64; D]],
    k: usize,
    n_init: usize,
    max_iterations: usize,
    mut rng_for: impl FnMut(u64) -> StdRng,
) -> KMeansFit<D> {
    let mut best = fit(points, k, max_iterations, &mut rng_for(0));
    for restart in 1..n_init {
        let candidate = fit(points, k, max_iterations, &mut rng_for(restart as u64));
        if candidate.inertia < best.inertia {
            best = candidate;
        }
    }
    best
}

// ── Internals ────────────────────────────────────────────────────────

fn squared_distance<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// (index, squared distance) of the nearest centroid; strict `<` keeps the first on ties.
fn nearest<const D: usize>(point: &[f64; D], centroids: &[[f64; D]]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (j, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

fn init_plus_plus<const D: usize>(
    points: &[[f64; D]],
    k: usize,
    rng: &mut StdRng,
) -> Vec<[f64; D]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..points.len())]);

    let mut distances = vec![0.0; points.len()];
    while centroids.len() < k {
        for (d, p) in distances.iter_mut().zip(points) {
            *d = nearest(p, &centroids).1;
        }
        let total: f64 = distances.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            // Every point coincides with a centroid.
            centroids.push(points[0]);
            continue;
        }

        let threshold = rng.gen::<f64>() * total;
        let mut cumulative = 0.0;
        let mut chosen = None;
        for (i, &d) in distances.iter().enumerate() {
            cumulative += d;
            if d > 0.0 {
                chosen = Some(i);
                if cumulative >= threshold {
                    break;
                }
            }
        }
        // total > 0 guarantees at least one positive distance
        centroids.push(points[chosen.unwrap_or(0)]);
    }
    centroids
}

fn assign<const D: usize>(points: &[[f64; D]], centroids: &[[f64; D]]) -> Vec<usize> {
    points.iter().map(|p| nearest(p, centroids).0).collect()
}

/// Move each centroid to the mean of its members. Empty clusters keep their centroid.
fn update_centroids<const D: usize>(
    points: &[[f64; D]],
    labels: &[usize],
    centroids: &mut [[f64; D]],
) {
    let mut sums = vec![[0.0; D]; centroids.len()];
    let mut counts = vec![0usize; centroids.len()];
    for (p, &l) in points.iter().zip(labels) {
        counts[l] += 1;
        for (s, x) in sums[l].iter_mut().zip(p) {
            *s += x;
        }
    }
    for (j, centroid) in centroids.iter_mut().enumerate() {
        if counts[j] == 0 {
            continue;
        }
        let n = counts[j] as f64;
        for d in 0..D {
            centroid[d] = sums[j][d] / n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn blobs() -> Vec<[f64; 2]> {
        let mut pts = Vec::new();
        for i in 0..10 {
            let jitter = i as f64 * 0.01;
            pts.push([0.0 + jitter, 0.0 - jitter]);
            pts.push([10.0 - jitter, 10.0 + jitter]);
            pts.push([-10.0 + jitter, 10.0 - jitter]);
        }
        pts
    }

    #[test]
    fn separates_well_spaced_blobs() {
        let pts = blobs();
        let fit = fit_best(&pts, 3, 3, 300, StdRng::seed_from_u64);
        assert_eq!(fit.centroids.len(), 3);
        let mut sizes: Vec<usize> = (0..3).map(|c| fit.cluster_size(c)).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![10, 10, 10]);
        assert!(fit.inertia < 1.0);
    }

    #[test]
    fn same_seed_same_fit() {
        let pts = blobs();
        let a = fit(&pts, 3, 300, &mut StdRng::seed_from_u64(9));
        let b = fit(&pts, 3, 300, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn identical_points_do_not_panic() {
        let pts = vec![[1.0, 1.0]; 8];
        let fit = fit(&pts, 3, 300, &mut StdRng::seed_from_u64(1));
        assert_eq!(fit.centroids.len(), 3);
        assert_eq!(fit.inertia, 0.0);
        // strict-less tie rule puts everything in cluster 0
        assert_eq!(fit.cluster_size(0), 8);
        assert_eq!(fit.predict(&[1.0, 1.0]), 0);
    }

    #[test]
    fn predict_picks_nearest_centroid() {
        let pts = blobs();
        let fit = fit_best(&pts, 3, 2, 300, StdRng::seed_from_u64);
        let c = fit.predict(&[9.5, 9.8]);
        let expected = fit.labels[1];
        assert_eq!(c, expected);
    }

    #[test]
    fn best_of_restarts_never_worse_than_first() {
        let pts = blobs();
        let single = fit(&pts, 3, 300, &mut StdRng::seed_from_u64(0));
        let best = fit_best(&pts, 3, 5, 300, StdRng::seed_from_u64);
        assert!(best.inertia <= single.inertia);
    }
}
