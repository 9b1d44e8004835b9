//! Structured constraint model and its renderings
//!
//! The encoder fills a [`ConstraintModel`] with declarations, constraints and
//! one objective. The model renders to MiniZinc text for external solvers and
//! to CNF clauses for the in-process SAT backend.

use super::variables::{BoolVar, VariableRegistry, VariableStatistics};
use crate::error::{GdError, GdResult};
use itertools::Itertools;
use std::fmt;

/// Represents a SAT clause (disjunction of literals)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub literals: Vec<i32>, // Positive for variable, negative for negation
}

impl Clause {
    /// Create a new clause from literals
    pub fn new(literals: Vec<i32>) -> Self {
        Self { literals }
    }

    /// Create a unit clause (single literal)
    pub fn unit(literal: i32) -> Self {
        Self {
            literals: vec![literal],
        }
    }

    /// Create a binary clause (two literals)
    pub fn binary(lit1: i32, lit2: i32) -> Self {
        Self {
            literals: vec![lit1, lit2],
        }
    }
}

/// Right-hand side of a biconditional
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    /// Disjunction; empty means `false`
    Or(Vec<BoolVar>),
    /// Conjunction; empty means `true`
    And(Vec<BoolVar>),
}

impl Formula {
    pub fn operands(&self) -> &[BoolVar] {
        match self {
            Formula::Or(vars) | Formula::And(vars) => vars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `lhs <-> rhs`
    Equiv { lhs: BoolVar, rhs: Formula },
    /// Forced assignment
    Fix { var: BoolVar, value: bool },
    /// Cardinality: at most `bound` of `vars` are true
    AtMost { vars: Vec<BoolVar>, bound: usize },
}

impl Constraint {
    fn variables(&self) -> Vec<&BoolVar> {
        match self {
            Constraint::Equiv { lhs, rhs } => {
                std::iter::once(lhs).chain(rhs.operands()).collect()
            }
            Constraint::Fix { var, .. } => vec![var],
            Constraint::AtMost { vars, .. } => vars.iter().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Objective {
    Satisfy,
    /// Minimize the number of true variables
    Minimize(Vec<BoolVar>),
}

/// Declarations, constraints and objective of one encoded problem
#[derive(Debug, Clone)]
pub struct ConstraintModel {
    registry: VariableRegistry,
    constraints: Vec<Constraint>,
    objective: Objective,
    comments: Vec<String>,
}

impl ConstraintModel {
    pub fn new(num_variables: usize, max_steps: usize) -> Self {
        Self {
            registry: VariableRegistry::new(num_variables, max_steps),
            constraints: Vec::new(),
            objective: Objective::Satisfy,
            comments: Vec::new(),
        }
    }

    /// Declare a boolean; repeated declarations collapse onto the first
    pub fn declare(&mut self, var: BoolVar) -> GdResult<i32> {
        self.registry.declare(var)
    }

    /// Add a constraint whose variables must all be declared already
    pub fn add(&mut self, constraint: Constraint) -> GdResult<()> {
        for var in constraint.variables() {
            self.require_declared(var)?;
        }
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn set_objective(&mut self, objective: Objective) -> GdResult<()> {
        if let Objective::Minimize(vars) = &objective {
            for var in vars {
                self.require_declared(var)?;
            }
        }
        self.objective = objective;
        Ok(())
    }

    /// Attach a comment line to the rendered header
    pub fn add_comment(&mut self, comment: impl Into<String>) {
        self.comments.push(comment.into());
    }

    fn require_declared(&self, var: &BoolVar) -> GdResult<()> {
        if self.registry.contains(var) {
            Ok(())
        } else {
            Err(GdError::Encoding(format!(
                "constraint references undeclared variable {}",
                var
            )))
        }
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Render as MiniZinc text; equal models render byte-identically
    pub fn render(&self) -> String {
        let mut out = String::new();

        for comment in &self.comments {
            out.push_str("% ");
            out.push_str(comment);
            out.push('\n');
        }

        for (var, _) in self.registry.iter() {
            out.push_str(&format!("var bool: {};\n", var));
        }

        for constraint in &self.constraints {
            let line = match constraint {
                Constraint::Equiv { lhs, rhs } => {
                    let body = match rhs {
                        Formula::Or(vars) if vars.is_empty() => "false".to_string(),
                        Formula::And(vars) if vars.is_empty() => "true".to_string(),
                        Formula::Or(vars) => format!("({})", vars.iter().join(" \\/ ")),
                        Formula::And(vars) => format!("({})", vars.iter().join(" /\\ ")),
                    };
                    format!("constraint {} <-> {};", lhs, body)
                }
                Constraint::Fix { var, value } => format!("constraint {} = {};", var, value),
                Constraint::AtMost { vars, bound } => {
                    format!("constraint {} <= {};", sum_expression(vars), bound)
                }
            };
            out.push_str(&line);
            out.push('\n');
        }

        match &self.objective {
            Objective::Satisfy => out.push_str("solve satisfy;\n"),
            Objective::Minimize(vars) => {
                out.push_str(&format!("solve minimize {};\n", sum_expression(vars)));
            }
        }

        out
    }

    /// Translate to CNF over the registry's ids.
    ///
    /// Cardinality constraints use a sequential counter whose auxiliary
    /// variables are numbered after the declared ones.
    pub fn to_cnf(&self) -> GdResult<Cnf> {
        let mut cnf = Cnf {
            clauses: Vec::new(),
            num_vars: self.registry.len() as i32,
        };

        for constraint in &self.constraints {
            match constraint {
                Constraint::Equiv { lhs, rhs } => {
                    let a = self.literal(lhs)?;
                    let operands = rhs
                        .operands()
                        .iter()
                        .map(|var| self.literal(var))
                        .collect::<GdResult<Vec<_>>>()?;
                    // Or: a -> (b1 | ... | bn), bi -> a. And is the dual.
                    let sign = match rhs {
                        Formula::Or(_) => 1,
                        Formula::And(_) => -1,
                    };
                    let mut long = vec![-sign * a];
                    long.extend(operands.iter().map(|&b| sign * b));
                    cnf.clauses.push(Clause::new(long));
                    for &b in &operands {
                        cnf.clauses.push(Clause::binary(sign * a, -sign * b));
                    }
                }
                Constraint::Fix { var, value } => {
                    let lit = self.literal(var)?;
                    cnf.clauses.push(Clause::unit(if *value { lit } else { -lit }));
                }
                Constraint::AtMost { vars, bound } => {
                    let lits = vars
                        .iter()
                        .map(|var| self.literal(var))
                        .collect::<GdResult<Vec<_>>>()?;
                    cnf.add_at_most(&lits, *bound);
                }
            }
        }

        Ok(cnf)
    }

    /// SAT literals of the objective's variables
    pub fn objective_literals(&self) -> GdResult<Vec<i32>> {
        match &self.objective {
            Objective::Satisfy => Ok(Vec::new()),
            Objective::Minimize(vars) => vars.iter().map(|var| self.literal(var)).collect(),
        }
    }

    fn literal(&self, var: &BoolVar) -> GdResult<i32> {
        self.registry.id(var).ok_or_else(|| {
            GdError::Encoding(format!("variable {} has no SAT id", var))
        })
    }

    pub fn statistics(&self) -> ModelStatistics {
        let mut equivalences = 0;
        let mut fixed = 0;
        let mut cardinality = 0;
        for constraint in &self.constraints {
            match constraint {
                Constraint::Equiv { .. } => equivalences += 1,
                Constraint::Fix { .. } => fixed += 1,
                Constraint::AtMost { .. } => cardinality += 1,
            }
        }

        ModelStatistics {
            variables: self.registry.statistics(),
            equivalences,
            fixed,
            cardinality,
            minimizing: matches!(self.objective, Objective::Minimize(_)),
        }
    }
}

fn sum_expression(vars: &[BoolVar]) -> String {
    if vars.is_empty() {
        "0".to_string()
    } else {
        vars.iter().join(" + ")
    }
}

/// Clauses ready for a SAT solver
#[derive(Debug, Clone, Default)]
pub struct Cnf {
    pub clauses: Vec<Clause>,
    /// Highest variable id in use
    pub num_vars: i32,
}

impl Cnf {
    pub fn new_var(&mut self) -> i32 {
        self.num_vars += 1;
        self.num_vars
    }

    /// Sequential counter encoding of `sum(lits) <= bound`
    pub fn add_at_most(&mut self, lits: &[i32], bound: usize) {
        let n = lits.len();
        if bound >= n {
            return;
        }
        if bound == 0 {
            self.clauses.extend(lits.iter().map(|&x| Clause::unit(-x)));
            return;
        }

        // s[i][j]: at least j+1 of lits[0..=i] are true
        let s: Vec<Vec<i32>> = (0..n - 1)
            .map(|_| (0..bound).map(|_| self.new_var()).collect())
            .collect();

        self.clauses.push(Clause::binary(-lits[0], s[0][0]));
        for j in 1..bound {
            self.clauses.push(Clause::unit(-s[0][j]));
        }

        for i in 1..n - 1 {
            self.clauses.push(Clause::binary(-lits[i], s[i][0]));
            self.clauses.push(Clause::binary(-s[i - 1][0], s[i][0]));
            for j in 1..bound {
                self.clauses
                    .push(Clause::new(vec![-lits[i], -s[i - 1][j - 1], s[i][j]]));
                self.clauses.push(Clause::binary(-s[i - 1][j], s[i][j]));
            }
            self.clauses.push(Clause::binary(-lits[i], -s[i - 1][bound - 1]));
        }

        self.clauses
            .push(Clause::binary(-lits[n - 1], -s[n - 2][bound - 1]));
    }
}

#[derive(Debug, Clone)]
pub struct ModelStatistics {
    pub variables: VariableStatistics,
    pub equivalences: usize,
    pub fixed: usize,
    pub cardinality: usize,
    pub minimizing: bool,
}

impl fmt::Display for ModelStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Constraint Model:")?;
        writeln!(f, "  {}", self.variables)?;
        writeln!(f, "  Biconditionals: {}", self.equivalences)?;
        writeln!(f, "  Fixed assignments: {}", self.fixed)?;
        writeln!(f, "  Cardinality constraints: {}", self.cardinality)?;
        writeln!(
            f,
            "  Objective: {}",
            if self.minimizing { "minimize guesses" } else { "satisfy" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force_count(cnf: &Cnf, lits: &[i32]) -> Vec<usize> {
        // Enumerate assignments of the original literals and check that some
        // extension of the auxiliaries satisfies every clause.
        let n = lits.len();
        let aux = (cnf.num_vars as usize) - n;
        let mut feasible_counts = Vec::new();
        for mask in 0u32..(1 << n) {
            let satisfiable = (0u32..(1 << aux)).any(|aux_mask| {
                let value = |lit: i32| {
                    let v = lit.unsigned_abs() as usize - 1;
                    let bit = if v < n {
                        (mask >> v) & 1 == 1
                    } else {
                        (aux_mask >> (v - n)) & 1 == 1
                    };
                    if lit > 0 { bit } else { !bit }
                };
                cnf.clauses
                    .iter()
                    .all(|clause| clause.literals.iter().any(|&lit| value(lit)))
            });
            if satisfiable {
                feasible_counts.push(mask.count_ones() as usize);
            }
        }
        feasible_counts
    }

    #[test]
    fn test_sequential_counter_bounds() {
        let lits = [1, 2, 3, 4];
        for bound in 0..=4 {
            let mut cnf = Cnf {
                clauses: Vec::new(),
                num_vars: 4,
            };
            cnf.add_at_most(&lits, bound);
            let counts = brute_force_count(&cnf, &lits);
            assert_eq!(counts.len(), (0..16u32).filter(|m| m.count_ones() as usize <= bound).count());
            assert!(counts.iter().all(|&c| c <= bound));
        }
    }

    fn small_model() -> ConstraintModel {
        let mut model = ConstraintModel::new(2, 1);
        let a0 = BoolVar::known(0, 0);
        let b0 = BoolVar::known(1, 0);
        let b1 = BoolVar::known(1, 1);
        let p0 = BoolVar::path(1, 1, 0);
        let p1 = BoolVar::path(1, 1, 1);
        for var in [b1, p0, b0, p1, a0, b0] {
            model.declare(var).unwrap();
        }
        model
            .add(Constraint::Equiv {
                lhs: p0,
                rhs: Formula::And(vec![b0]),
            })
            .unwrap();
        model
            .add(Constraint::Equiv {
                lhs: p1,
                rhs: Formula::And(vec![a0]),
            })
            .unwrap();
        model
            .add(Constraint::Equiv {
                lhs: b1,
                rhs: Formula::Or(vec![p0, p1]),
            })
            .unwrap();
        model
            .add(Constraint::AtMost {
                vars: vec![b0],
                bound: 0,
            })
            .unwrap();
        model.add(Constraint::Fix { var: a0, value: true }).unwrap();
        model.set_objective(Objective::Minimize(vec![b0])).unwrap();
        model.add_comment("small");
        model
    }

    #[test]
    fn test_render_layout() {
        let text = small_model().render();
        let expected = "% small\n\
                        var bool: k1_1;\n\
                        var bool: p1_1_0;\n\
                        var bool: k1_0;\n\
                        var bool: p1_1_1;\n\
                        var bool: k0_0;\n\
                        constraint p1_1_0 <-> (k1_0);\n\
                        constraint p1_1_1 <-> (k0_0);\n\
                        constraint k1_1 <-> (p1_1_0 \\/ p1_1_1);\n\
                        constraint k1_0 <= 0;\n\
                        constraint k0_0 = true;\n\
                        solve minimize k1_0;\n";
        assert_eq!(text, expected);
        assert_eq!(text.matches("solve ").count(), 1);
    }

    #[test]
    fn test_render_is_deterministic() {
        assert_eq!(small_model().render(), small_model().render());
    }

    #[test]
    fn test_undeclared_variable_is_encoding_error() {
        let mut model = ConstraintModel::new(2, 1);
        model.declare(BoolVar::known(0, 1)).unwrap();
        let err = model
            .add(Constraint::Equiv {
                lhs: BoolVar::known(0, 1),
                rhs: Formula::Or(vec![BoolVar::path(0, 1, 0)]),
            })
            .unwrap_err();
        assert!(matches!(err, GdError::Encoding(_)));
        assert!(model.constraints().is_empty());

        let err = model
            .set_objective(Objective::Minimize(vec![BoolVar::known(1, 0)]))
            .unwrap_err();
        assert!(matches!(err, GdError::Encoding(_)));
    }

    #[test]
    fn test_empty_formulas_render_as_constants() {
        let mut model = ConstraintModel::new(1, 1);
        let p = BoolVar::path(0, 1, 0);
        let k = BoolVar::known(0, 1);
        model.declare(p).unwrap();
        model.declare(k).unwrap();
        model
            .add(Constraint::Equiv {
                lhs: p,
                rhs: Formula::And(vec![]),
            })
            .unwrap();
        model
            .add(Constraint::Equiv {
                lhs: k,
                rhs: Formula::Or(vec![]),
            })
            .unwrap();
        let text = model.render();
        assert!(text.contains("constraint p0_1_0 <-> true;"));
        assert!(text.contains("constraint k0_1 <-> false;"));
        assert!(text.ends_with("solve satisfy;\n"));

        let cnf = model.to_cnf().unwrap();
        assert!(cnf.clauses.contains(&Clause::unit(1)));
        assert!(cnf.clauses.contains(&Clause::unit(-2)));
    }

    #[test]
    fn test_cnf_translation() {
        let model = small_model();
        let cnf = model.to_cnf().unwrap();
        assert_eq!(cnf.num_vars, 5);
        // k1_1 <-> (p1_1_0 \/ p1_1_1): one long clause plus two binaries
        assert!(cnf.clauses.contains(&Clause::new(vec![-1, 2, 4])));
        assert!(cnf.clauses.contains(&Clause::binary(1, -2)));
        // p1_1_1 <-> k0_0
        assert!(cnf.clauses.contains(&Clause::new(vec![4, -5])));
        assert!(cnf.clauses.contains(&Clause::binary(-4, 5)));
        assert!(cnf.clauses.contains(&Clause::unit(-3)));
        assert!(cnf.clauses.contains(&Clause::unit(5)));
        assert_eq!(model.objective_literals().unwrap(), vec![3]);

        let stats = model.statistics();
        assert_eq!(stats.equivalences, 3);
        assert_eq!(stats.fixed, 1);
        assert!(stats.minimizing);
    }
}
