//! Deduction closure: one-step derivation alternatives per variable

use super::model::{IndexedModel, Relation, RelationId, VarId};
use rayon::prelude::*;

/// One way of concluding a variable in a single round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    /// Relation that justifies the step; `None` for the identity alternative
    pub relation: Option<RelationId>,
    /// Variables that must all be known in the previous round
    pub sources: Vec<VarId>,
}

impl Alternative {
    pub fn identity(v: VarId) -> Self {
        Self {
            relation: None,
            sources: vec![v],
        }
    }

    pub fn is_identity(&self) -> bool {
        self.relation.is_none()
    }
}

/// Ordered derivation alternatives for every variable of a model.
///
/// Alternative 0 is always the identity rule. The rest follow relation
/// order, and identical alternatives are kept.
#[derive(Debug, Clone)]
pub struct DeductionRules {
    rules: Vec<Vec<Alternative>>,
}

impl DeductionRules {
    pub fn build(model: &IndexedModel) -> Self {
        // Relations each variable can be determined by, in relation order
        let mut determinable: Vec<Vec<RelationId>> = vec![Vec::new(); model.num_variables()];
        for (rid, relation) in model.relations().iter().enumerate() {
            match relation {
                Relation::Symmetric(members) => {
                    for &v in members {
                        determinable[v].push(rid);
                    }
                }
                Relation::Implication(members) => {
                    if let Some(&last) = members.last() {
                        determinable[last].push(rid);
                    }
                }
            }
        }

        let rules = determinable
            .par_iter()
            .enumerate()
            .map(|(v, relation_ids)| {
                let mut alternatives = Vec::with_capacity(relation_ids.len() + 1);
                alternatives.push(Alternative::identity(v));
                for &rid in relation_ids {
                    let sources = match &model.relations()[rid] {
                        Relation::Symmetric(members) => {
                            members.iter().copied().filter(|&s| s != v).collect()
                        }
                        Relation::Implication(members) => members
                            .split_last()
                            .map(|(_, premises)| premises.to_vec())
                            .unwrap_or_default(),
                    };
                    alternatives.push(Alternative {
                        relation: Some(rid),
                        sources,
                    });
                }
                alternatives
            })
            .collect();

        Self { rules }
    }

    /// Alternatives for `v`, identity first
    pub fn alternatives(&self, v: VarId) -> &[Alternative] {
        &self.rules[v]
    }

    pub fn num_variables(&self) -> usize {
        self.rules.len()
    }

    pub fn total_alternatives(&self) -> usize {
        self.rules.iter().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &[Alternative])> {
        self.rules.iter().enumerate().map(|(v, alts)| (v, alts.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::model::RelationModel;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn build(symmetric: Vec<Vec<String>>, implication: Vec<Vec<String>>) -> DeductionRules {
        let model = RelationModel::from_parts(
            "test",
            names(&["a", "b", "c", "x", "y", "z"]),
            vec![],
            vec![],
            vec![],
            symmetric,
            implication,
        );
        DeductionRules::build(&model.index().unwrap())
    }

    #[test]
    fn test_identity_always_first() {
        let rules = build(vec![], vec![]);
        for (v, alternatives) in rules.iter() {
            assert_eq!(alternatives.len(), 1);
            assert!(alternatives[0].is_identity());
            assert_eq!(alternatives[0].sources, vec![v]);
        }
        assert_eq!(rules.total_alternatives(), 6);
    }

    #[test]
    fn test_symmetric_complements() {
        let rules = build(vec![names(&["a", "b", "c"])], vec![]);
        for v in 0..3 {
            let alternatives = rules.alternatives(v);
            assert_eq!(alternatives.len(), 2);
            assert_eq!(alternatives[1].relation, Some(0));
            assert!(!alternatives[1].sources.contains(&v));
            assert_eq!(alternatives[1].sources.len(), 2);
        }
        assert_eq!(rules.alternatives(1)[1].sources, vec![0, 2]);
        assert_eq!(rules.alternatives(3).len(), 1);
    }

    #[test]
    fn test_implication_attaches_to_last_only() {
        let rules = build(vec![], vec![names(&["x", "y", "z"])]);
        assert_eq!(rules.alternatives(3).len(), 1);
        assert_eq!(rules.alternatives(4).len(), 1);
        let z = rules.alternatives(5);
        assert_eq!(z.len(), 2);
        assert_eq!(z[1].sources, vec![3, 4]);
        assert_eq!(z[1].relation, Some(0));
    }

    #[test]
    fn test_duplicates_preserved_in_relation_order() {
        let rules = build(
            vec![names(&["a", "b"]), names(&["a", "b"])],
            vec![names(&["c", "b"])],
        );
        let b = rules.alternatives(1);
        assert_eq!(b.len(), 4);
        assert_eq!(b[1], b[2].clone().with_relation(0));
        assert_eq!(b[1].relation, Some(0));
        assert_eq!(b[2].relation, Some(1));
        assert_eq!(b[3].relation, Some(2));
        assert_eq!(b[3].sources, vec![2]);
    }

    impl Alternative {
        fn with_relation(mut self, rid: RelationId) -> Self {
            self.relation = Some(rid);
            self
        }
    }
}
