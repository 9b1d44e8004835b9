//! Relation model: variables, relations and the known/target/not-guessed sets

use crate::error::{GdError, GdResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Index of a variable inside an [`IndexedModel`]
pub type VarId = usize;

/// Index of a relation inside a model's relation list
pub type RelationId = usize;

/// A deduction relation over variables of type `V`.
///
/// Symmetric relations determine any member from all the others.
/// Implication relations determine only their last member from the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "variables", rename_all = "snake_case")]
pub enum Relation<V = String> {
    Symmetric(Vec<V>),
    Implication(Vec<V>),
}

impl<V> Relation<V> {
    pub fn members(&self) -> &[V] {
        match self {
            Relation::Symmetric(members) | Relation::Implication(members) => members,
        }
    }

    pub fn is_symmetric(&self) -> bool {
        matches!(self, Relation::Symmetric(_))
    }

    /// The designated determined element of an implication relation
    pub fn determined(&self) -> Option<&V> {
        match self {
            Relation::Symmetric(_) => None,
            Relation::Implication(members) => members.last(),
        }
    }
}

/// Structured relation input, as produced by a relation-file reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationModel {
    pub problem_name: String,
    /// All variable names, in declaration order
    pub variables: Vec<String>,
    pub known: Vec<String>,
    pub targets: Vec<String>,
    #[serde(default)]
    pub not_guessed: Vec<String>,
    /// Relations in declaration order; the position is the relation id
    pub relations: Vec<Relation>,
}

impl RelationModel {
    /// Assemble a model from separate symmetric and implication lists.
    ///
    /// Symmetric relations receive the lower relation ids.
    pub fn from_parts(
        problem_name: impl Into<String>,
        variables: Vec<String>,
        known: Vec<String>,
        targets: Vec<String>,
        not_guessed: Vec<String>,
        symmetric: Vec<Vec<String>>,
        implication: Vec<Vec<String>>,
    ) -> Self {
        let relations = symmetric
            .into_iter()
            .map(Relation::Symmetric)
            .chain(implication.into_iter().map(Relation::Implication))
            .collect();

        Self {
            problem_name: problem_name.into(),
            variables,
            known,
            targets,
            not_guessed,
            relations,
        }
    }

    pub fn symmetric_count(&self) -> usize {
        self.relations.iter().filter(|r| r.is_symmetric()).count()
    }

    pub fn implication_count(&self) -> usize {
        self.relations.len() - self.symmetric_count()
    }

    /// Validate the model and resolve all names to variable indices
    pub fn index(&self) -> GdResult<IndexedModel> {
        let mut lookup = HashMap::with_capacity(self.variables.len());
        for (id, name) in self.variables.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(GdError::InvalidRelation(format!(
                    "variable #{} has an empty name",
                    id
                )));
            }
            if lookup.insert(name.as_str(), id).is_some() {
                return Err(GdError::InvalidRelation(format!(
                    "variable '{}' is declared more than once",
                    name
                )));
            }
        }

        let resolve = |name: &str, context: &str| -> GdResult<VarId> {
            lookup.get(name).copied().ok_or_else(|| {
                GdError::InvalidRelation(format!("{} references unknown variable '{}'", context, name))
            })
        };

        let mut relations = Vec::with_capacity(self.relations.len());
        for (rid, relation) in self.relations.iter().enumerate() {
            let context = format!("relation #{}", rid);
            let members = relation.members();
            if members.len() < 2 {
                return Err(GdError::InvalidRelation(format!(
                    "{} has {} member(s), at least 2 are required",
                    context,
                    members.len()
                )));
            }

            let mut ids = Vec::with_capacity(members.len());
            for name in members {
                let id = resolve(name, &context)?;
                if ids.contains(&id) {
                    return Err(GdError::InvalidRelation(format!(
                        "{} mentions '{}' more than once",
                        context, name
                    )));
                }
                ids.push(id);
            }

            relations.push(match relation {
                Relation::Symmetric(_) => Relation::Symmetric(ids),
                Relation::Implication(_) => Relation::Implication(ids),
            });
        }

        let resolve_set = |names: &[String], context: &str| -> GdResult<Vec<VarId>> {
            let mut ids: Vec<VarId> = Vec::with_capacity(names.len());
            for name in names {
                let id = resolve(name, context)?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Ok(ids)
        };

        let known = resolve_set(&self.known, "known set")?;
        let targets = resolve_set(&self.targets, "target set")?;
        let not_guessed = resolve_set(&self.not_guessed, "not-guessed set")?;

        let mut known_mask = vec![false; self.variables.len()];
        for &v in &known {
            known_mask[v] = true;
        }
        let mut not_guessed_mask = vec![false; self.variables.len()];
        for &v in &not_guessed {
            if known_mask[v] {
                return Err(GdError::InvalidRelation(format!(
                    "variable '{}' is both known and not-guessed",
                    self.variables[v]
                )));
            }
            not_guessed_mask[v] = true;
        }

        Ok(IndexedModel {
            problem_name: self.problem_name.clone(),
            variables: self.variables.clone(),
            known,
            targets,
            not_guessed,
            relations,
            known_mask,
            not_guessed_mask,
        })
    }
}

/// A validated relation model with names resolved to indices.
///
/// Read-only once built, so every id it hands out stays in range.
#[derive(Debug, Clone)]
pub struct IndexedModel {
    problem_name: String,
    variables: Vec<String>,
    known: Vec<VarId>,
    targets: Vec<VarId>,
    not_guessed: Vec<VarId>,
    relations: Vec<Relation<VarId>>,
    known_mask: Vec<bool>,
    not_guessed_mask: Vec<bool>,
}

impl IndexedModel {
    pub fn problem_name(&self) -> &str {
        &self.problem_name
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn known(&self) -> &[VarId] {
        &self.known
    }

    pub fn targets(&self) -> &[VarId] {
        &self.targets
    }

    pub fn not_guessed(&self) -> &[VarId] {
        &self.not_guessed
    }

    pub fn relations(&self) -> &[Relation<VarId>] {
        &self.relations
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn name(&self, v: VarId) -> &str {
        &self.variables[v]
    }

    pub fn is_known(&self, v: VarId) -> bool {
        self.known_mask[v]
    }

    pub fn is_not_guessed(&self, v: VarId) -> bool {
        self.not_guessed_mask[v]
    }

    /// Variables whose round-0 value is left to the solver
    pub fn free_variables(&self) -> Vec<VarId> {
        (0..self.num_variables()).filter(|&v| !self.known_mask[v]).collect()
    }

    pub fn names(&self, ids: &[VarId]) -> Vec<String> {
        ids.iter().map(|&v| self.variables[v].clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample_model() -> RelationModel {
        RelationModel::from_parts(
            "sample",
            names(&["a", "b", "c", "x", "y", "z"]),
            names(&["a"]),
            names(&["b"]),
            names(&["z"]),
            vec![names(&["a", "b", "c"])],
            vec![names(&["x", "y", "z"])],
        )
    }

    #[test]
    fn test_from_parts_orders_symmetric_first() {
        let model = sample_model();
        assert_eq!(model.relations.len(), 2);
        assert!(model.relations[0].is_symmetric());
        assert_eq!(model.relations[1].determined(), Some(&"z".to_string()));
        assert_eq!(model.symmetric_count(), 1);
        assert_eq!(model.implication_count(), 1);
    }

    #[test]
    fn test_index_resolves_names() {
        let indexed = sample_model().index().unwrap();
        assert_eq!(indexed.num_variables(), 6);
        assert_eq!(indexed.known(), &[0]);
        assert_eq!(indexed.targets(), &[1]);
        assert_eq!(indexed.relations()[1], Relation::Implication(vec![3, 4, 5]));
        assert!(indexed.is_known(0));
        assert!(indexed.is_not_guessed(5));
        assert_eq!(indexed.free_variables(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_indexed_model_is_detached_from_source() {
        let mut model = sample_model();
        let indexed = model.index().unwrap();

        model.relations.push(Relation::Implication(Vec::new()));
        model.known.clear();
        model.targets.push("q".to_string());

        assert_eq!(indexed.problem_name(), "sample");
        assert_eq!(indexed.variables().len(), 6);
        assert_eq!(indexed.relations().len(), 2);
        assert_eq!(indexed.names(indexed.known()), vec!["a"]);
        assert_eq!(indexed.names(indexed.targets()), vec!["b"]);
        assert_eq!(indexed.names(indexed.not_guessed()), vec!["z"]);
        assert!(model.index().is_err());
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let mut model = sample_model();
        model.relations.push(Relation::Symmetric(names(&["a", "w"])));
        let err = model.index().unwrap_err();
        assert!(matches!(err, GdError::InvalidRelation(_)));
        assert!(err.to_string().contains("'w'"));
    }

    #[test]
    fn test_overlapping_known_and_not_guessed_rejected() {
        let mut model = sample_model();
        model.not_guessed.push("a".to_string());
        assert!(matches!(model.index(), Err(GdError::InvalidRelation(_))));
    }

    #[test]
    fn test_short_or_repeating_relations_rejected() {
        let mut model = sample_model();
        model.relations.push(Relation::Implication(names(&["a"])));
        assert!(model.index().is_err());

        let mut model = sample_model();
        model.relations.push(Relation::Symmetric(names(&["a", "b", "a"])));
        assert!(model.index().is_err());
    }

    #[test]
    fn test_duplicate_variable_rejected() {
        let mut model = sample_model();
        model.variables.push("a".to_string());
        assert!(model.index().is_err());
    }

    #[test]
    fn test_relation_json_shape() {
        let relation: Relation = Relation::Implication(names(&["x", "y"]));
        let json = serde_json::to_string(&relation).unwrap();
        assert_eq!(json, r#"{"kind":"implication","variables":["x","y"]}"#);
    }
}
