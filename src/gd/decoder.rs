//! Solution decoding: guess set and determination graph

use super::graph::{DeterminationGraph, Vertex};
use crate::error::{GdError, GdResult};
use crate::relations::{DeductionRules, IndexedModel, VarId};
use crate::sat::BoolVar;
use std::collections::HashMap;

/// Knowledge flag of every variable at every round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStates {
    /// `known[t][v]`
    known: Vec<Vec<bool>>,
}

impl RoundStates {
    /// Extract round states; every `known(v, t)` must be assigned
    pub fn from_assignment(
        assignment: &HashMap<BoolVar, bool>,
        num_variables: usize,
        max_steps: usize,
    ) -> GdResult<Self> {
        let mut known = Vec::with_capacity(max_steps + 1);
        for t in 0..=max_steps {
            let mut round = Vec::with_capacity(num_variables);
            for v in 0..num_variables {
                let var = BoolVar::known(v, t);
                let value = assignment.get(&var).copied().ok_or_else(|| {
                    GdError::Encoding(format!("assignment is missing {}", var))
                })?;
                round.push(value);
            }
            known.push(round);
        }
        Ok(Self { known })
    }

    pub fn from_rounds(known: Vec<Vec<bool>>) -> Self {
        Self { known }
    }

    pub fn is_known(&self, v: VarId, round: usize) -> bool {
        self.known[round][v]
    }

    pub fn max_steps(&self) -> usize {
        self.known.len().saturating_sub(1)
    }

    /// Earliest round at which `v` is known
    pub fn first_known(&self, v: VarId) -> Option<usize> {
        self.known.iter().position(|round| round[v])
    }

    pub fn known_count(&self, round: usize) -> usize {
        self.known[round].iter().filter(|&&k| k).count()
    }
}

/// Decoder output, still in variable indices
#[derive(Debug, Clone)]
pub struct DecodedSolution {
    /// Variables guessed at round 0, outside the known set
    pub guessed: Vec<VarId>,
    pub graph: DeterminationGraph,
    /// First known round of every variable determined after round 0
    pub first_known: Vec<(VarId, usize)>,
}

/// Turns round states into a guess set and determination graph
pub struct SolutionDecoder<'a> {
    relations: &'a IndexedModel,
    rules: &'a DeductionRules,
}

impl<'a> SolutionDecoder<'a> {
    pub fn new(relations: &'a IndexedModel, rules: &'a DeductionRules) -> Self {
        Self { relations, rules }
    }

    pub fn decode(&self, states: &RoundStates, guess_budget: usize) -> GdResult<DecodedSolution> {
        let n = self.relations.num_variables();
        let max_steps = states.max_steps();
        let name = |v: VarId| self.relations.name(v).to_string();

        self.check_boundaries(states)?;

        let guessed: Vec<VarId> = (0..n)
            .filter(|&v| states.is_known(v, 0) && !self.relations.is_known(v))
            .collect();
        if guessed.len() > guess_budget {
            return Err(GdError::Encoding(format!(
                "{} guesses exceed the budget of {}",
                guessed.len(),
                guess_budget
            )));
        }

        let mut graph = DeterminationGraph::new();
        for &v in self.relations.known().iter().chain(&guessed) {
            graph.add_vertex(Vertex::new(name(v), 0));
        }

        for t in 0..max_steps {
            for v in 0..n {
                let before = states.is_known(v, t);
                let after = states.is_known(v, t + 1);
                let satisfied: Vec<_> = self
                    .rules
                    .alternatives(v)
                    .iter()
                    .filter(|alt| alt.sources.iter().all(|&s| states.is_known(s, t)))
                    .collect();

                if before && !after {
                    return Err(GdError::Encoding(format!(
                        "'{}' is known at round {} but not at round {}",
                        name(v),
                        t,
                        t + 1
                    )));
                }
                if after && satisfied.is_empty() {
                    return Err(GdError::Encoding(format!(
                        "'{}' is known at round {} without a satisfied deduction",
                        name(v),
                        t + 1
                    )));
                }
                if !after && !satisfied.is_empty() {
                    return Err(GdError::Encoding(format!(
                        "'{}' is deducible at round {} but not marked known",
                        name(v),
                        t + 1
                    )));
                }

                if !before && after {
                    let target = Vertex::new(name(v), t + 1);
                    for alternative in satisfied {
                        if let Some(rid) = alternative.relation {
                            for &s in &alternative.sources {
                                graph.add_edge(Vertex::new(name(s), t), target.clone(), rid);
                            }
                        }
                    }
                }
            }
        }

        for &v in self.relations.targets() {
            if let Some(round) = states.first_known(v) {
                graph.add_vertex(Vertex::new(name(v), round));
            }
        }

        let first_known = (0..n)
            .filter_map(|v| match states.first_known(v) {
                Some(round) if round > 0 => Some((v, round)),
                _ => None,
            })
            .collect();

        Ok(DecodedSolution {
            guessed,
            graph,
            first_known,
        })
    }

    /// Forced round-0 and final-round values must hold in the assignment
    fn check_boundaries(&self, states: &RoundStates) -> GdResult<()> {
        if states.known.first().map(Vec::len) != Some(self.relations.num_variables()) {
            return Err(GdError::Encoding(
                "round states do not match the relation model".to_string(),
            ));
        }

        let max_steps = states.max_steps();
        for &v in self.relations.known() {
            if !states.is_known(v, 0) {
                return Err(GdError::Encoding(format!(
                    "known variable '{}' is not known at round 0",
                    self.relations.name(v)
                )));
            }
        }
        for &v in self.relations.not_guessed() {
            if states.is_known(v, 0) {
                return Err(GdError::Encoding(format!(
                    "excluded variable '{}' is guessed",
                    self.relations.name(v)
                )));
            }
        }
        for &v in self.relations.targets() {
            if !states.is_known(v, max_steps) {
                return Err(GdError::Encoding(format!(
                    "target '{}' is not known at round {}",
                    self.relations.name(v),
                    max_steps
                )));
            }
        }
        Ok(())
    }
}
