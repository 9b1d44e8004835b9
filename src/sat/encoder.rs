//! Time-expansion encoder for guess-and-determine problems
//!
//! Round `t + 1` knowledge is exactly what one deduction step reaches from
//! round `t`. The identity alternative keeps knowledge monotone, and the
//! round budget bounds how far the closure is unrolled.

use super::constraints::{Constraint, ConstraintModel, Formula, ModelStatistics, Objective};
use super::variables::BoolVar;
use crate::error::GdResult;
use crate::relations::{DeductionRules, IndexedModel, VarId};
use tracing::{debug, info};

/// Per-run encoding parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingParams {
    /// Maximum number of guessed variables; `None` means unconstrained
    pub max_guess: Option<usize>,
    pub max_steps: usize,
    pub optimize: bool,
}

/// The guess budget was replaced because it was unset or too large
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetAdjustment {
    pub requested: Option<usize>,
    pub resolved: usize,
}

impl std::fmt::Display for BudgetAdjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.requested {
            Some(requested) => write!(
                f,
                "guess budget {} exceeds the {} free variables, using {}",
                requested, self.resolved, self.resolved
            ),
            None => write!(
                f,
                "no guess budget given, using the {} free variables",
                self.resolved
            ),
        }
    }
}

/// Encoder output: the model plus the facts the decoder needs
#[derive(Debug, Clone)]
pub struct EncodedModel {
    pub model: ConstraintModel,
    /// Resolved guess budget
    pub guess_budget: usize,
    pub budget_adjustment: Option<BudgetAdjustment>,
    /// Variables whose round-0 value is chosen by the solver
    pub free_initial: Vec<VarId>,
    pub max_steps: usize,
}

impl EncodedModel {
    pub fn render(&self) -> String {
        self.model.render()
    }

    /// Round-0 booleans counted against the guess budget
    pub fn guess_variables(&self) -> Vec<BoolVar> {
        self.free_initial
            .iter()
            .map(|&v| BoolVar::known(v, 0))
            .collect()
    }
}

/// Builds the time-expanded constraint model for one relation model
pub struct TimeExpansionEncoder<'a> {
    relations: &'a IndexedModel,
    rules: &'a DeductionRules,
    params: EncodingParams,
}

impl<'a> TimeExpansionEncoder<'a> {
    pub fn new(relations: &'a IndexedModel, rules: &'a DeductionRules, params: EncodingParams) -> Self {
        Self {
            relations,
            rules,
            params,
        }
    }

    /// Resolve the guess budget against the number of free variables
    pub fn resolve_budget(max_guess: Option<usize>, free: usize) -> (usize, Option<BudgetAdjustment>) {
        match max_guess {
            Some(budget) if budget <= free => (budget, None),
            requested => (
                free,
                Some(BudgetAdjustment {
                    requested,
                    resolved: free,
                }),
            ),
        }
    }

    pub fn encode(&self) -> GdResult<EncodedModel> {
        let n = self.relations.num_variables();
        let max_steps = self.params.max_steps;
        let mut model = ConstraintModel::new(n, max_steps);

        let free_initial = self.relations.free_variables();
        let (guess_budget, budget_adjustment) =
            Self::resolve_budget(self.params.max_guess, free_initial.len());
        if let Some(adjustment) = &budget_adjustment {
            info!("{}", adjustment);
        }

        model.add_comment(format!(
            "guess-and-determine model for {}",
            self.relations.problem_name()
        ));
        model.add_comment(format!(
            "max_guess = {}, max_steps = {}",
            guess_budget, max_steps
        ));

        self.encode_rounds(&mut model)?;

        // Round 0: guess budget over the free variables
        let guesses: Vec<BoolVar> = free_initial.iter().map(|&v| BoolVar::known(v, 0)).collect();
        for v in 0..n {
            model.declare(BoolVar::known(v, 0))?;
        }
        if !guesses.is_empty() {
            model.add(Constraint::AtMost {
                vars: guesses.clone(),
                bound: guess_budget,
            })?;
        }

        for &v in self.relations.targets() {
            let var = BoolVar::known(v, max_steps);
            model.declare(var)?;
            model.add(Constraint::Fix { var, value: true })?;
        }
        for &v in self.relations.known() {
            model.add(Constraint::Fix {
                var: BoolVar::known(v, 0),
                value: true,
            })?;
        }
        for &v in self.relations.not_guessed() {
            model.add(Constraint::Fix {
                var: BoolVar::known(v, 0),
                value: false,
            })?;
        }

        let objective = if self.params.optimize {
            Objective::Minimize(guesses)
        } else {
            Objective::Satisfy
        };
        model.set_objective(objective)?;

        debug!(
            "Encoded {} rounds: {} booleans, {} constraints",
            max_steps,
            model.registry().len(),
            model.constraints().len()
        );

        Ok(EncodedModel {
            model,
            guess_budget,
            budget_adjustment,
            free_initial,
            max_steps,
        })
    }

    /// known(v, t+1) <-> OR_i path(v, t+1, i) and path(v, t+1, i) <-> AND_s known(s, t)
    fn encode_rounds(&self, model: &mut ConstraintModel) -> GdResult<()> {
        for t in 0..self.params.max_steps {
            for (v, alternatives) in self.rules.iter() {
                let next = model_declare(model, BoolVar::known(v, t + 1))?;

                let mut paths = Vec::with_capacity(alternatives.len());
                for (i, alternative) in alternatives.iter().enumerate() {
                    let path = model_declare(model, BoolVar::path(v, t + 1, i))?;
                    let mut sources = Vec::with_capacity(alternative.sources.len());
                    for &s in &alternative.sources {
                        sources.push(model_declare(model, BoolVar::known(s, t))?);
                    }
                    model.add(Constraint::Equiv {
                        lhs: path,
                        rhs: Formula::And(sources),
                    })?;
                    paths.push(path);
                }

                model.add(Constraint::Equiv {
                    lhs: next,
                    rhs: Formula::Or(paths),
                })?;
            }
        }
        Ok(())
    }

    pub fn statistics(&self, encoded: &EncodedModel) -> EncodingStatistics {
        EncodingStatistics {
            problem_name: self.relations.problem_name().to_string(),
            variables: self.relations.num_variables(),
            relations: self.relations.relations().len(),
            alternatives: self.rules.total_alternatives(),
            max_steps: encoded.max_steps,
            guess_budget: encoded.guess_budget,
            model: encoded.model.statistics(),
        }
    }
}

fn model_declare(model: &mut ConstraintModel, var: BoolVar) -> GdResult<BoolVar> {
    model.declare(var)?;
    Ok(var)
}

/// Statistics about an encoded problem
#[derive(Debug, Clone)]
pub struct EncodingStatistics {
    pub problem_name: String,
    pub variables: usize,
    pub relations: usize,
    pub alternatives: usize,
    pub max_steps: usize,
    pub guess_budget: usize,
    pub model: ModelStatistics,
}

impl std::fmt::Display for EncodingStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Encoding Statistics for {}:", self.problem_name)?;
        writeln!(f, "  Variables: {}", self.variables)?;
        writeln!(f, "  Relations: {}", self.relations)?;
        writeln!(f, "  Deduction alternatives: {}", self.alternatives)?;
        writeln!(f, "  Rounds: {}", self.max_steps)?;
        writeln!(f, "  Guess budget: {}", self.guess_budget)?;
        write!(f, "{}", self.model)?;
        Ok(())
    }
}

/// Model size predicted from the deduction rules, before encoding
#[derive(Debug, Clone)]
pub struct EncodingEstimate {
    pub max_steps: usize,
    pub knowledge_variables: usize,
    pub path_variables: usize,
    pub constraints: usize,
}

impl EncodingEstimate {
    pub fn new(rules: &DeductionRules, max_steps: usize) -> Self {
        let n = rules.num_variables();
        let alternatives = rules.total_alternatives();
        Self {
            max_steps,
            knowledge_variables: n * (max_steps + 1),
            path_variables: alternatives * max_steps,
            constraints: (n + alternatives) * max_steps,
        }
    }
}

impl std::fmt::Display for EncodingEstimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Model Size Estimate ({} rounds):", self.max_steps)?;
        writeln!(f, "  Knowledge variables: {}", self.knowledge_variables)?;
        writeln!(f, "  Path selectors: {}", self.path_variables)?;
        writeln!(f, "  Closure constraints: {}", self.constraints)?;
        Ok(())
    }
}
