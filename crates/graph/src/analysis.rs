//! String probabilities, sampling and the row-stochastic check.

use std::collections::HashMap;

use crate::arena::NodeId;
use crate::error::GraphError;
use crate::model::Dtmc;

/// Tolerance of the row-sum check in [`Dtmc::validate`].
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

const MAX_SWEEPS: usize = 100_000;
const SWEEP_TOLERANCE: f64 = 1e-15;

impl Dtmc {
    /// Checks that the outgoing probabilities of every non-final node sum to 1.
    pub fn validate(&self) -> Result<(), GraphError> {
        for (id, data) in self.nodes.iter() {
            if self.is_final(id) {
                continue;
            }
            let sum: f64 = data
                .outgoing
                .iter()
                .filter_map(|k| self.edges.get(k))
                .sum();
            if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(GraphError::NotStochastic { node: id, sum });
            }
        }
        Ok(())
    }

    /// Probability that a run from the initial node emits exactly `s` and
    /// stops in a final node.
    ///
    /// Labels may span several characters and are matched as prefixes of the
    /// remaining input. Cycles of ε-edges are solved by Gauss-Seidel sweeps.
    pub fn string_probability(&self, s: &str) -> f64 {
        let ids: Vec<NodeId> = self.nodes().collect();
        let position: HashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, &id)| (id, i)).collect();

        let mut epsilon: Vec<Vec<(usize, f64)>> = vec![Vec::new(); ids.len()];
        let mut symbol: Vec<Vec<(usize, &str, f64)>> = vec![Vec::new(); ids.len()];
        for (key, p) in self.edges() {
            let (from, to) = (position[&key.from], position[&key.to]);
            if key.is_epsilon() {
                epsilon[from].push((to, p));
            } else {
                symbol[from].push((to, key.label.as_str(), p));
            }
        }

        let len = s.len();
        // values[i][n]: probability of emitting s[i..] from node n and stopping.
        let mut values = vec![vec![0.0; ids.len()]; len + 1];
        for i in (0..=len).rev() {
            if !s.is_char_boundary(i) {
                continue;
            }
            let rest = &s[i..];
            let base: Vec<f64> = ids
                .iter()
                .enumerate()
                .map(|(n, &id)| {
                    let stop = if i == len && self.is_final(id) { 1.0 } else { 0.0 };
                    let step: f64 = symbol[n]
                        .iter()
                        .filter(|(_, label, _)| rest.starts_with(label))
                        .map(|&(to, label, p)| p * values[i + label.len()][to])
                        .sum();
                    stop + step
                })
                .collect();

            let mut current = base.clone();
            for _ in 0..MAX_SWEEPS {
                let mut change: f64 = 0.0;
                for n in 0..ids.len() {
                    let next = base[n]
                        + epsilon[n]
                            .iter()
                            .map(|&(to, p)| p * current[to])
                            .sum::<f64>();
                    change = change.max((next - current[n]).abs());
                    current[n] = next;
                }
                if change < SWEEP_TOLERANCE {
                    break;
                }
            }
            values[i] = current;
        }
        values[0][position[&self.initial()]]
    }

    /// Walks the chain from the initial node and returns the emitted string.
    ///
    /// Each step draws the next edge from the cumulative distribution of the
    /// outgoing probabilities. Returns `None` when the walk reaches a
    /// non-final node with no way out, falls into the unassigned probability
    /// mass of a non-stochastic node, or exceeds `max_steps`.
    pub fn sample(&self, rng: &mut impl rand::Rng, max_steps: usize) -> Option<String> {
        let mut node = self.initial();
        let mut out = String::new();
        for _ in 0..max_steps {
            if self.is_final(node) {
                return Some(out);
            }
            let data = self.nodes.get(node)?;
            let u: f64 = rng.random();
            let mut cumulative = 0.0;
            let mut chosen = None;
            for key in &data.outgoing {
                cumulative += self.edges.get(key).copied().unwrap_or(0.0);
                chosen = Some(key);
                if cumulative >= u {
                    break;
                }
            }
            // Fall back to the last edge only when rounding kept the sum below the draw.
            if cumulative < u && 1.0 - cumulative > ROW_SUM_TOLERANCE {
                return None;
            }
            let key = chosen?;
            out.push_str(&key.label);
            node = key.to;
        }
        self.is_final(node).then_some(out)
    }
}
