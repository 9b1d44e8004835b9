//! Boolean variable registry for the time-expanded encoding

use crate::error::{GdError, GdResult};
use crate::relations::VarId;
use indexmap::IndexMap;
use std::fmt;

/// Boolean variables of the time-expanded model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoolVar {
    /// Variable `var` is known at round `round`
    Known { var: VarId, round: usize },
    /// Alternative `alternative` of `var` had all its sources known at `round - 1`
    Path {
        var: VarId,
        round: usize,
        alternative: usize,
    },
}

impl BoolVar {
    pub fn known(var: VarId, round: usize) -> Self {
        BoolVar::Known { var, round }
    }

    pub fn path(var: VarId, round: usize, alternative: usize) -> Self {
        BoolVar::Path {
            var,
            round,
            alternative,
        }
    }

    /// Model identifier; built from indices so arbitrary names never collide
    pub fn identifier(&self) -> String {
        match self {
            BoolVar::Known { var, round } => format!("k{}_{}", var, round),
            BoolVar::Path {
                var,
                round,
                alternative,
            } => format!("p{}_{}_{}", var, round, alternative),
        }
    }

    /// Inverse of [`BoolVar::identifier`]
    pub fn parse(identifier: &str) -> Option<Self> {
        let kind = identifier.get(..1)?;
        let rest = identifier.get(1..)?;
        let fields = rest
            .split('_')
            .map(|part| part.parse::<usize>().ok())
            .collect::<Option<Vec<_>>>()?;

        match (kind, fields.as_slice()) {
            ("k", [var, round]) => Some(BoolVar::known(*var, *round)),
            ("p", [var, round, alternative]) => Some(BoolVar::path(*var, *round, *alternative)),
            _ => None,
        }
    }
}

impl fmt::Display for BoolVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// Declares model variables once, in first-use order, and numbers them from 1
#[derive(Debug, Clone)]
pub struct VariableRegistry {
    /// Declared variable to SAT variable id (positive integer)
    ids: IndexMap<BoolVar, i32>,
    num_variables: usize,
    max_steps: usize,
}

impl VariableRegistry {
    pub fn new(num_variables: usize, max_steps: usize) -> Self {
        Self {
            ids: IndexMap::new(),
            num_variables,
            max_steps,
        }
    }

    /// Declare a variable, returning its id; redeclaring is a no-op
    pub fn declare(&mut self, var: BoolVar) -> GdResult<i32> {
        if let Some(&id) = self.ids.get(&var) {
            return Ok(id);
        }

        self.validate_variable(&var)?;

        let id = self.ids.len() as i32 + 1;
        self.ids.insert(var, id);
        Ok(id)
    }

    pub fn id(&self, var: &BoolVar) -> Option<i32> {
        self.ids.get(var).copied()
    }

    pub fn contains(&self, var: &BoolVar) -> bool {
        self.ids.contains_key(var)
    }

    /// Resolve a model identifier back to a declared variable
    pub fn lookup(&self, identifier: &str) -> Option<BoolVar> {
        BoolVar::parse(identifier).filter(|var| self.ids.contains_key(var))
    }

    /// Declared variables in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&BoolVar, i32)> {
        self.ids.iter().map(|(var, &id)| (var, id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    fn validate_variable(&self, var: &BoolVar) -> GdResult<()> {
        let (v, round) = match var {
            BoolVar::Known { var, round } => (*var, *round),
            BoolVar::Path { var, round, .. } => {
                if *round == 0 {
                    return Err(GdError::Encoding(format!(
                        "path variable {} cannot belong to round 0",
                        var
                    )));
                }
                (*var, *round)
            }
        };

        if v >= self.num_variables {
            return Err(GdError::Encoding(format!(
                "variable index {} out of bounds (variables: {})",
                v, self.num_variables
            )));
        }
        if round > self.max_steps {
            return Err(GdError::Encoding(format!(
                "round {} out of bounds (max steps: {})",
                round, self.max_steps
            )));
        }
        Ok(())
    }

    pub fn statistics(&self) -> VariableStatistics {
        let known_variables = self
            .ids
            .keys()
            .filter(|var| matches!(var, BoolVar::Known { .. }))
            .count();

        VariableStatistics {
            total_variables: self.ids.len(),
            known_variables,
            path_variables: self.ids.len() - known_variables,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariableStatistics {
    pub total_variables: usize,
    pub known_variables: usize,
    pub path_variables: usize,
}

impl fmt::Display for VariableStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} variables ({} knowledge, {} path selectors)",
            self.total_variables, self.known_variables, self.path_variables
        )
    }
}
