use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::graph::DependencyGraph;

/// PageRank over the import graph.
///
/// An edge `a -> b` (a imports b) is a vote for `b`. Files that import
/// nothing spread their mass evenly over every file, so total mass stays 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRank {
    pub damping: f64,
    /// Stop once the L1 change between rounds drops below this.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for PageRank {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

/// Importance scores for every node of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    pub scores: BTreeMap<String, f64>,
    /// Rounds of power iteration performed
    pub iterations: usize,
    /// False when the iteration cap ended the run
    pub converged: bool,
}

impl Ranking {
    pub fn score(&self, path: &str) -> Option<f64> {
        self.scores.get(path).copied()
    }

    /// Highest score first; equal scores by path.
    pub fn ordered(&self) -> Vec<(&str, f64)> {
        let mut ordered: Vec<(&str, f64)> = self
            .scores
            .iter()
            .map(|(path, score)| (path.as_str(), *score))
            .collect();
        ordered.sort_by(|(path_a, score_a), (path_b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| path_a.cmp(path_b))
        });
        ordered
    }

    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl PageRank {
    pub fn rank(&self, graph: &DependencyGraph) -> Ranking {
        let nodes: Vec<&str> = graph.nodes().iter().map(String::as_str).collect();
        let n = nodes.len();
        if n == 0 {
            return Ranking {
                converged: true,
                ..Ranking::default()
            };
        }

        let index: HashMap<&str, usize> = nodes.iter().enumerate().map(|(i, p)| (*p, i)).collect();

        // Voters per node, and how many votes each voter splits its score over.
        let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut out_degree = vec![0usize; n];
        for (from, targets) in graph.edges() {
            let Some(&i) = index.get(from.as_str()) else {
                continue;
            };
            for to in targets {
                if let Some(&j) = index.get(to.as_str()) {
                    incoming[j].push(i);
                    out_degree[i] += 1;
                }
            }
        }

        let size = n as f64;
        let teleport = (1.0 - self.damping) / size;
        let mut scores = vec![1.0 / size; n];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;

            let dangling: f64 = (0..n)
                .filter(|&i| out_degree[i] == 0)
                .map(|i| scores[i])
                .sum();
            let dangling_share = self.damping * dangling / size;

            let next: Vec<f64> = (0..n)
                .map(|j| {
                    let votes: f64 = incoming[j]
                        .iter()
                        .map(|&i| scores[i] / out_degree[i] as f64)
                        .sum();
                    teleport + dangling_share + self.damping * votes
                })
                .collect();

            let delta: f64 = next.iter().zip(&scores).map(|(a, b)| (a - b).abs()).sum();
            scores = next;
            if delta < self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            tracing::debug!(iterations, "pagerank hit the iteration cap");
        }

        Ranking {
            scores: nodes
                .into_iter()
                .zip(scores)
                .map(|(path, score)| (path.to_string(), score))
                .collect(),
            iterations,
            converged,
        }
    }
}
