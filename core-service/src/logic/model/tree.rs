//! Decision Trees - Histogram-binned CART
//!
//! Shared by every tree learner. Columns are quantized once per fit into at
//! most `MAX_BINS` buckets; split search then scans per-bin sums instead of
//! re-sorting rows at every node.
//!
//! Two split criteria:
//! - `Gini`: classification trees, leaf = positive fraction
//! - `Newton`: second-order boosting trees, leaf = -G / (H + λ)

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const MAX_BINS: usize = 64;

// ============================================================================
// BINNED MATRIX
// ============================================================================

/// Column-quantized copy of a training matrix
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    n_rows: usize,
    n_cols: usize,
    /// Row-major bin ids
    bins: Vec<u8>,
    /// Per column, ascending cut values; bin(x) = #cuts < x
    cuts: Vec<Vec<f64>>,
}

impl BinnedMatrix {
    pub fn from_rows(x: ArrayView2<'_, f64>) -> Self {
        let (n_rows, n_cols) = x.dim();
        let mut cuts = Vec::with_capacity(n_cols);

        for col in 0..n_cols {
            let mut column: Vec<f64> = x.column(col).to_vec();
            column.sort_by(|a, b| a.total_cmp(b));
            column.dedup();

            let column_cuts = if column.len() <= MAX_BINS {
                column.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
            } else {
                let mut picked: Vec<f64> = (1..MAX_BINS)
                    .map(|i| column[i * column.len() / MAX_BINS])
                    .collect();
                picked.dedup();
                picked
            };
            cuts.push(column_cuts);
        }

        let mut bins = vec![0u8; n_rows * n_cols];
        for row in 0..n_rows {
            for col in 0..n_cols {
                let v = x[[row, col]];
                bins[row * n_cols + col] = cuts[col].partition_point(|&c| c < v) as u8;
            }
        }

        Self { n_rows, n_cols, bins, cuts }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    fn bin(&self, row: usize, col: usize) -> usize {
        self.bins[row * self.n_cols + col] as usize
    }

    fn n_bins(&self, col: usize) -> usize {
        self.cuts[col].len() + 1
    }
}

// ============================================================================
// TREE STRUCTURE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Samples with `x[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: u32,
        right: u32,
    },
    Leaf { value: f64 },
}

/// Flat, arena-allocated tree. Node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.predict_with(|feature| x[feature])
    }

    /// Walk the tree reading features through `feature_value`, e.g. from an ndarray row
    pub fn predict_with(&self, feature_value: impl Fn(usize) -> f64) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split { feature, threshold, left, right } => {
                    idx = if feature_value(*feature) <= *threshold { *left as usize } else { *right as usize };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left as usize).max(walk(nodes, *right as usize))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    /// Structural sanity check for deserialized trees.
    /// Children always come after their parent, so a well-formed tree has no cycles.
    pub fn is_well_formed(&self, n_features: usize) -> bool {
        let len = self.nodes.len();
        len > 0
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                TreeNode::Leaf { value } => value.is_finite(),
                TreeNode::Split { feature, threshold, left, right } => {
                    let (left, right) = (*left as usize, *right as usize);
                    *feature < n_features
                        && !threshold.is_nan()
                        && left > i
                        && right > i
                        && left < len
                        && right < len
                }
            })
    }
}

// ============================================================================
// SPLIT STATISTICS
// ============================================================================

/// Additive per-row statistic. Gini: `a` = label. Newton: `a` = gradient, `b` = hessian.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stat {
    pub n: f64,
    pub a: f64,
    pub b: f64,
}

impl Stat {
    fn add(&mut self, other: &Stat) {
        self.n += other.n;
        self.a += other.a;
        self.b += other.b;
    }

    fn minus(&self, other: &Stat) -> Stat {
        Stat { n: self.n - other.n, a: self.a - other.a, b: self.b - other.b }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Criterion {
    Gini,
    Newton { lambda: f64 },
}

impl Criterion {
    fn leaf(&self, s: &Stat) -> f64 {
        match self {
            Criterion::Gini => if s.n > 0.0 { s.a / s.n } else { 0.0 },
            Criterion::Newton { lambda } => -s.a / (s.b + lambda),
        }
    }

    /// Node score; a split's gain is score(left) + score(right) - score(parent)
    fn score(&self, s: &Stat) -> f64 {
        match self {
            Criterion::Gini => {
                if s.n <= 0.0 {
                    return 0.0;
                }
                let p = s.a / s.n;
                -(s.n * 2.0 * p * (1.0 - p))
            }
            Criterion::Newton { lambda } => s.a * s.a / (s.b + lambda),
        }
    }

    fn is_pure(&self, s: &Stat) -> bool {
        match self {
            Criterion::Gini => s.a <= 0.0 || s.a >= s.n,
            Criterion::Newton { .. } => false,
        }
    }
}

// ============================================================================
// GROWER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitRule {
    /// Exhaustive scan of every bin boundary
    Best,
    /// One uniformly drawn boundary per candidate feature (extra trees)
    Random,
}

#[derive(Debug, Clone, Copy)]
pub struct GrowParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Candidate features per split; `0` means all
    pub max_features: usize,
    pub split_rule: SplitRule,
    pub criterion: Criterion,
}

struct Candidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct Grower<'a> {
    data: &'a BinnedMatrix,
    stats: &'a [Stat],
    params: GrowParams,
    nodes: Vec<TreeNode>,
    hist: Vec<Stat>,
}

/// Grow one tree over `rows` (indices into `data`, repeats allowed for bootstrap)
pub fn grow(
    data: &BinnedMatrix,
    stats: &[Stat],
    rows: &mut [usize],
    params: GrowParams,
    rng: &mut StdRng,
) -> Tree {
    let mut grower = Grower {
        data,
        stats,
        params,
        nodes: Vec::new(),
        hist: vec![Stat::default(); MAX_BINS + 1],
    };
    grower.build(rows, 0, rng);
    Tree { nodes: grower.nodes }
}

impl<'a> Grower<'a> {
    fn build(&mut self, rows: &mut [usize], depth: usize, rng: &mut StdRng) -> u32 {
        let idx = self.nodes.len() as u32;
        self.nodes.push(TreeNode::Leaf { value: 0.0 });

        let mut total = Stat::default();
        for &r in rows.iter() {
            total.add(&self.stats[r]);
        }

        let stop = depth >= self.params.max_depth
            || rows.len() < self.params.min_samples_split
            || rows.len() < 2 * self.params.min_samples_leaf
            || self.params.criterion.is_pure(&total);

        let best = if stop { None } else { self.find_split(rows, &total, rng) };

        let Some(best) = best else {
            self.nodes[idx as usize] = TreeNode::Leaf { value: self.params.criterion.leaf(&total) };
            return idx;
        };

        let mid = partition(rows, |r| self.data.bin(r, best.feature) <= best.bin);
        let (left_rows, right_rows) = rows.split_at_mut(mid);

        let left = self.build(left_rows, depth + 1, rng);
        let right = self.build(right_rows, depth + 1, rng);

        self.nodes[idx as usize] = TreeNode::Split {
            feature: best.feature,
            threshold: self.data.cuts[best.feature][best.bin],
            left,
            right,
        };
        idx
    }

    fn find_split(&mut self, rows: &[usize], total: &Stat, rng: &mut StdRng) -> Option<Candidate> {
        let n_cols = self.data.n_cols();
        let k = match self.params.max_features {
            0 => n_cols,
            k => k.min(n_cols),
        };
        let features = rand::seq::index::sample(rng, n_cols, k);

        let parent_score = self.params.criterion.score(total);
        let min_leaf = self.params.min_samples_leaf as f64;
        let mut best: Option<Candidate> = None;

        for feature in features.iter() {
            let n_bins = self.data.n_bins(feature);
            if n_bins < 2 {
                continue;
            }

            let hist = &mut self.hist[..n_bins];
            hist.iter_mut().for_each(|h| *h = Stat::default());
            for &r in rows {
                hist[self.data.bin(r, feature)].add(&self.stats[r]);
            }

            let (lo, hi) = match (
                hist.iter().position(|h| h.n > 0.0),
                hist.iter().rposition(|h| h.n > 0.0),
            ) {
                (Some(lo), Some(hi)) if lo < hi => (lo, hi),
                _ => continue,
            };

            let candidates: Vec<usize> = match self.params.split_rule {
                SplitRule::Best => (lo..hi).collect(),
                SplitRule::Random => vec![rng.gen_range(lo..hi)],
            };

            let mut left = Stat::default();
            let mut next = lo;
            for bin in candidates {
                while next <= bin {
                    left.add(&hist[next]);
                    next += 1;
                }
                let right = total.minus(&left);
                if left.n < min_leaf || right.n < min_leaf {
                    continue;
                }

                let criterion = self.params.criterion;
                let gain = criterion.score(&left) + criterion.score(&right) - parent_score;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Candidate { feature, bin, gain });
                }
            }
        }

        best
    }
}

/// In-place partition; returns the count of rows satisfying `pred` (moved to the front)
fn partition(rows: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..rows.len() {
        if pred(rows[i]) {
            rows.swap(mid, i);
            mid += 1;
        }
    }
    mid
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;

    fn gini_params(split_rule: SplitRule) -> GrowParams {
        GrowParams {
            max_depth: 8,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 0,
            split_rule,
            criterion: Criterion::Gini,
        }
    }

    fn threshold_data() -> (Array2<f64>, Vec<Stat>) {
        // label = x0 > 5, x1 is noise
        let n = 40;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 / 4.0 } else { (i % 3) as f64 });
        let stats = (0..n)
            .map(|i| Stat { n: 1.0, a: if x[[i, 0]] > 5.0 { 1.0 } else { 0.0 }, b: 0.0 })
            .collect();
        (x, stats)
    }

    #[test]
    fn test_binning_respects_cut_order() {
        let x = Array2::from_shape_vec((4, 1), vec![3.0, 1.0, 2.0, 1.0]).unwrap();
        let binned = BinnedMatrix::from_rows(x.view());

        assert_eq!(binned.cuts[0], vec![1.5, 2.5]);
        assert_eq!(binned.bin(0, 0), 2);
        assert_eq!(binned.bin(1, 0), 0);
        assert_eq!(binned.bin(2, 0), 1);
    }

    #[test]
    fn test_binning_caps_bin_count() {
        let x = Array2::from_shape_fn((1000, 1), |(i, _)| i as f64);
        let binned = BinnedMatrix::from_rows(x.view());
        assert!(binned.n_bins(0) <= MAX_BINS);
    }

    #[test]
    fn test_gini_tree_separates_threshold() {
        let (x, stats) = threshold_data();
        let binned = BinnedMatrix::from_rows(x.view());
        let mut rows: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let tree = grow(&binned, &stats, &mut rows, gini_params(SplitRule::Best), &mut rng);

        assert_eq!(tree.predict(&[1.0, 0.0]), 0.0);
        assert_eq!(tree.predict(&[9.0, 2.0]), 1.0);
        assert!(tree.is_well_formed(2));
    }

    #[test]
    fn test_random_split_still_learns() {
        let (x, stats) = threshold_data();
        let binned = BinnedMatrix::from_rows(x.view());
        let mut rows: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(11);

        let params = GrowParams { max_depth: 40, ..gini_params(SplitRule::Random) };
        let tree = grow(&binned, &stats, &mut rows, params, &mut rng);

        // Fully grown, so every training row is classified correctly
        for i in 0..x.nrows() {
            let row = [x[[i, 0]], x[[i, 1]]];
            assert_eq!(tree.predict(&row), stats[i].a);
        }
    }

    #[test]
    fn test_max_depth_zero_is_single_leaf() {
        let (x, stats) = threshold_data();
        let binned = BinnedMatrix::from_rows(x.view());
        let mut rows: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(1);
        let params = GrowParams { max_depth: 0, ..gini_params(SplitRule::Best) };

        let tree = grow(&binned, &stats, &mut rows, params, &mut rng);

        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_newton_leaf_value() {
        let criterion = Criterion::Newton { lambda: 1.0 };
        let s = Stat { n: 3.0, a: -1.5, b: 0.5 };
        assert!((criterion.leaf(&s) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_partition() {
        let mut rows = vec![5, 2, 8, 1, 9];
        let mid = partition(&mut rows, |r| r < 5);
        assert_eq!(mid, 2);
        assert!(rows[..mid].iter().all(|&r| r < 5));
        assert!(rows[mid..].iter().all(|&r| r >= 5));
    }
}
