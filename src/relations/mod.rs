//! Relation model, relation files and the deduction closure

pub mod deductions;
pub mod io;
pub mod model;

pub use deductions::{Alternative, DeductionRules};
pub use io::{
    create_example_relation_files, load_relation_file, parse_relation_text, save_relation_file,
};
pub use model::{IndexedModel, Relation, RelationId, RelationModel, VarId};
