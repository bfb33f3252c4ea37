//! Random-forest regressor
//!
//! Bagged regression trees: each tree sees a bootstrap resample of the rows,
//! considers every feature at every split and picks the midpoint threshold
//! with the largest squared-error reduction. Trees are grown to `max_depth`
//! or until a node is pure or holds a single row.
//!
//! Trees train in parallel. Tree `i` draws its resample from
//! `StdRng::seed_from_u64(seed + i)`, so the forest is identical for any
//! thread count.

use super::{Row, DIM};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Squared-error reduction a split must exceed
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub seed: u64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, row: &Row) -> f64 {
        let mut at = 0;
        loop {
            match self.nodes[at] {
                Node::Leaf(v) => return v,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => at = if row[feature] <= threshold { left } else { right },
            }
        }
    }
}

/// Builds one tree over a bootstrap index set
struct TreeBuilder<'a> {
    x: &'a [Row],
    y: &'a [f64],
    max_depth: usize,
    nodes: Vec<Node>,
}

impl<'a> TreeBuilder<'a> {
    fn grow(mut self, rows: &mut [usize]) -> Tree {
        self.build(rows, 0);
        Tree { nodes: self.nodes }
    }

    fn build(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let id = self.nodes.len();
        let mean = rows.iter().map(|&i| self.y[i]).sum::<f64>() / rows.len().max(1) as f64;
        self.nodes.push(Node::Leaf(mean));

        if depth >= self.max_depth || rows.len() < 2 {
            return id;
        }
        let Some((feature, threshold)) = self.best_split(rows) else {
            return id;
        };

        let split_at = partition(rows, |i| self.x[i][feature] <= threshold);
        let (lo, hi) = rows.split_at_mut(split_at);
        let left = self.build(lo, depth + 1);
        let right = self.build(hi, depth + 1);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    /// Feature and threshold with the lowest child squared error
    fn best_split(&self, rows: &[usize]) -> Option<(usize, f64)> {
        let n = rows.len();
        // Work on values centred at the node mean to keep sums well conditioned
        let mean = rows.iter().map(|&i| self.y[i]).sum::<f64>() / n as f64;
        let total_sq: f64 = rows.iter().map(|&i| (self.y[i] - mean).powi(2)).sum();
        if total_sq <= MIN_GAIN {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        let mut best_sse = total_sq - MIN_GAIN;
        let mut order = rows.to_vec();

        for feature in 0..DIM {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..n - 1 {
                let yi = self.y[order[k]] - mean;
                left_sum += yi;
                left_sq += yi * yi;

                let v = self.x[order[k]][feature];
                let next = self.x[order[k + 1]][feature];
                if next <= v {
                    continue;
                }
                let nl = (k + 1) as f64;
                let nr = (n - k - 1) as f64;
                let right_sum = -left_sum;
                let sse = (left_sq - left_sum * left_sum / nl) + ((total_sq - left_sq) - right_sum * right_sum / nr);
                if sse < best_sse {
                    best_sse = sse;
                    let mid = v + (next - v) / 2.0;
                    // Midpoint of adjacent floats can round up to `next`
                    best = Some((feature, if mid < next { mid } else { v }));
                }
            }
        }
        best
    }
}

/// Reorder `rows` so every element satisfying `pred` comes first; returns
/// the count of such elements
fn partition(rows: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut split = 0;
    for k in 0..rows.len() {
        if pred(rows[k]) {
            rows.swap(split, k);
            split += 1;
        }
    }
    split
}

/// Bagged regression-tree ensemble
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<Tree>,
}

impl RandomForest {
    /// Fit on `x` / `y`; an empty training set yields a forest that predicts 0
    pub fn fit(x: &[Row], y: &[f64], params: &ForestParams) -> Self {
        let n = x.len().min(y.len());
        if n == 0 || params.n_trees == 0 {
            return Self { trees: Vec::new() };
        }

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let mut rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let builder = TreeBuilder {
                    x,
                    y,
                    max_depth: params.max_depth,
                    nodes: Vec::new(),
                };
                builder.grow(&mut rows)
            })
            .collect();

        Self { trees }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the per-tree predictions
    pub fn predict_row(&self, row: &Row) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    pub fn predict(&self, rows: &[Row]) -> Vec<f64> {
        rows.par_iter().map(|r| self.predict_row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(n_trees: usize, max_depth: usize) -> ForestParams {
        ForestParams {
            n_trees,
            max_depth,
            seed: 42,
        }
    }

    fn grid(n: usize) -> Vec<Row> {
        (0..n).map(|i| [i as f64 / n as f64, 0.0, 0.0, 0.0, 0.0]).collect()
    }

    #[test]
    fn test_learns_step_function() {
        let x = grid(200);
        let y: Vec<f64> = x.iter().map(|r| if r[0] < 0.5 { 1.0 } else { 3.0 }).collect();
        let forest = RandomForest::fit(&x, &y, &params(20, 4));
        assert!((forest.predict_row(&[0.1, 0.0, 0.0, 0.0, 0.0]) - 1.0).abs() < 0.05);
        assert!((forest.predict_row(&[0.9, 0.0, 0.0, 0.0, 0.0]) - 3.0).abs() < 0.05);
    }

    #[test]
    fn test_picks_informative_feature() {
        // Feature 3 carries the signal, feature 0 is a shuffled distractor
        let x: Vec<Row> = (0..100)
            .map(|i| [((i * 37) % 100) as f64, 0.0, 0.0, i as f64, 0.0])
            .collect();
        let y: Vec<f64> = x.iter().map(|r| r[3] * 0.1).collect();
        let forest = RandomForest::fit(&x, &y, &params(10, 10));
        let pred = forest.predict_row(&[0.0, 0.0, 0.0, 80.0, 0.0]);
        assert!((pred - 8.0).abs() < 0.5, "pred {}", pred);
    }

    #[test]
    fn test_depth_zero_is_bootstrap_mean() {
        let x = grid(50);
        let y = vec![2.5; 50];
        let forest = RandomForest::fit(&x, &y, &params(5, 0));
        assert!((forest.predict_row(&x[3]) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic_across_fits() {
        let x = grid(120);
        let y: Vec<f64> = x.iter().map(|r| (r[0] * 6.0).sin()).collect();
        let a = RandomForest::fit(&x, &y, &params(16, 6)).predict(&x);
        let b = RandomForest::fit(&x, &y, &params(16, 6)).predict(&x);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_training_set() {
        let forest = RandomForest::fit(&[], &[], &params(5, 5));
        assert_eq!(forest.n_trees(), 0);
        assert_eq!(forest.predict_row(&[1.0; DIM]), 0.0);
    }

    #[test]
    fn test_partition() {
        let mut rows = vec![5, 1, 4, 2, 3];
        let k = partition(&mut rows, |i| i <= 2);
        assert_eq!(k, 2);
        let mut head = rows[..k].to_vec();
        head.sort();
        assert_eq!(head, vec![1, 2]);
    }
}
