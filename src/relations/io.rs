//! Reading and writing relation files
//!
//! Text format: `#` starts a comment, section headers switch the parser mode
//! and `end` stops parsing.
//!
//! ```text
//! variables
//! a, b, c, x, y, z
//! connection relations
//! a, b, c
//! x, y => z
//! algebraic relations
//! a + b + x + 1
//! known
//! a
//! target
//! c
//! not guessed
//! z
//! end
//! ```

use super::model::{Relation, RelationModel};
use anyhow::{Context, Result};
use indexmap::IndexSet;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Variables,
    Connection,
    Algebraic,
    Known,
    Target,
    NotGuessed,
}

impl Section {
    fn from_header(line: &str) -> Option<Self> {
        let normalized = line.to_ascii_lowercase().replace(['_', '-'], " ");
        match normalized.trim_end_matches(':').trim() {
            "variables" => Some(Section::Variables),
            "connection relations" => Some(Section::Connection),
            "algebraic relations" => Some(Section::Algebraic),
            "known" => Some(Section::Known),
            "target" | "targets" => Some(Section::Target),
            "not guessed" | "notguessed" => Some(Section::NotGuessed),
            _ => None,
        }
    }
}

/// Accumulates parsed content while keeping first-appearance order
#[derive(Default)]
struct RelationBuilder {
    variables: IndexSet<String>,
    known: Vec<String>,
    targets: Vec<String>,
    not_guessed: Vec<String>,
    symmetric: Vec<Vec<String>>,
    implication: Vec<Vec<String>>,
}

impl RelationBuilder {
    fn intern(&mut self, name: &str) -> String {
        self.variables.insert(name.to_string());
        name.to_string()
    }

    fn names(&mut self, line: &str, line_no: usize) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for token in line.split(',').map(str::trim) {
            if token.is_empty() {
                anyhow::bail!("Line {}: empty variable name in '{}'", line_no, line);
            }
            if !is_identifier(token) {
                anyhow::bail!("Line {}: invalid variable name '{}'", line_no, token);
            }
            names.push(self.intern(token));
        }
        Ok(names)
    }

    fn connection(&mut self, line: &str, line_no: usize) -> Result<()> {
        match line.split_once("=>") {
            Some((premises, conclusion)) => {
                let mut members = self.names(premises, line_no)?;
                let determined = self.names(conclusion, line_no)?;
                if determined.len() != 1 {
                    anyhow::bail!(
                        "Line {}: an implication must determine exactly one variable",
                        line_no
                    );
                }
                members.extend(determined);
                self.implication.push(members);
            }
            None => {
                let members = self.names(line, line_no)?;
                self.symmetric.push(members);
            }
        }
        Ok(())
    }

    /// Linear GF(2) equation: constants drop out, repeated terms cancel
    fn algebraic(&mut self, line: &str, line_no: usize) -> Result<()> {
        let equation = match line.split_once('=') {
            Some((lhs, rhs)) => format!("{} + {}", lhs, rhs),
            None => line.to_string(),
        };

        let mut remaining: IndexSet<String> = IndexSet::new();
        for term in equation.split('+').map(str::trim) {
            if term.is_empty() {
                anyhow::bail!("Line {}: empty term in '{}'", line_no, line);
            }
            if term == "0" || term == "1" {
                continue;
            }
            if term.contains('*') {
                anyhow::bail!(
                    "Line {}: non-linear term '{}' must be linearized first",
                    line_no,
                    term
                );
            }
            if !is_identifier(term) {
                anyhow::bail!("Line {}: invalid variable name '{}'", line_no, term);
            }
            let name = self.intern(term);
            if !remaining.shift_remove(&name) {
                remaining.insert(name);
            }
        }

        match remaining.len() {
            0 => {}
            1 => self.known.extend(remaining),
            _ => self.symmetric.push(remaining.into_iter().collect()),
        }
        Ok(())
    }

    fn finish(self, problem_name: &str) -> RelationModel {
        RelationModel::from_parts(
            problem_name,
            self.variables.into_iter().collect(),
            self.known,
            self.targets,
            self.not_guessed,
            self.symmetric,
            self.implication,
        )
    }
}

fn is_identifier(token: &str) -> bool {
    token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '[' || c == ']' || c == '.')
}

/// Names the text reader gives back unchanged; headers and `end` would be
/// read as structure when they stand alone on a line
fn is_writable_name(name: &str) -> bool {
    !name.is_empty()
        && is_identifier(name)
        && !name.eq_ignore_ascii_case("end")
        && Section::from_header(name).is_none()
}

/// Load a relation model; `.json` files are read as serialized models
pub fn load_relation_file<P: AsRef<Path>>(path: P) -> Result<RelationModel> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read relation file: {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext == "json") {
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse relation file: {}", path.display()));
    }

    let problem_name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("relations");

    parse_relation_text(&content, problem_name)
        .with_context(|| format!("Failed to parse relation file: {}", path.display()))
}

/// Parse the line-oriented relation format
pub fn parse_relation_text(content: &str, problem_name: &str) -> Result<RelationModel> {
    let mut builder = RelationBuilder::default();
    let mut section: Option<Section> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("end") {
            break;
        }
        if let Some(next) = Section::from_header(line) {
            section = Some(next);
            continue;
        }

        match section {
            None => anyhow::bail!("Line {}: content before any section header", line_no),
            Some(Section::Variables) => {
                builder.names(line, line_no)?;
            }
            Some(Section::Connection) => builder.connection(line, line_no)?,
            Some(Section::Algebraic) => builder.algebraic(line, line_no)?,
            Some(Section::Known) => {
                let names = builder.names(line, line_no)?;
                builder.known.extend(names);
            }
            Some(Section::Target) => {
                let names = builder.names(line, line_no)?;
                builder.targets.extend(names);
            }
            Some(Section::NotGuessed) => {
                let names = builder.names(line, line_no)?;
                builder.not_guessed.extend(names);
            }
        }
    }

    if builder.variables.is_empty() {
        anyhow::bail!("Relation file declares no variables");
    }

    Ok(builder.finish(problem_name))
}

/// Render a model in the text format.
///
/// Parsing the result yields the same model as long as symmetric relations
/// precede implications, which is the order both readers produce. Models
/// whose names the reader would split or misread are rejected.
pub fn relation_model_to_text(model: &RelationModel) -> Result<String> {
    let members = model.relations.iter().flat_map(|relation| relation.members());
    let mut names = model
        .variables
        .iter()
        .chain(members)
        .chain(&model.known)
        .chain(&model.targets)
        .chain(&model.not_guessed);
    if let Some(bad) = names.find(|name| !is_writable_name(name)) {
        anyhow::bail!(
            "Variable name '{}' cannot be written in the text relation format",
            bad
        );
    }

    let mut out = String::new();
    out.push_str(&format!("# {}\n", model.problem_name.replace('\n', " ")));

    out.push_str("variables\n");
    out.push_str(&model.variables.join(", "));
    out.push('\n');

    out.push_str("connection relations\n");
    for relation in &model.relations {
        match relation {
            Relation::Symmetric(members) => {
                out.push_str(&members.join(", "));
            }
            Relation::Implication(members) => {
                let (last, rest) = members.split_last().map_or(("", &[][..]), |(l, r)| (l.as_str(), r));
                out.push_str(&format!("{} => {}", rest.join(", "), last));
            }
        }
        out.push('\n');
    }

    for (header, names) in [
        ("known", &model.known),
        ("target", &model.targets),
        ("not guessed", &model.not_guessed),
    ] {
        out.push_str(header);
        out.push('\n');
        for name in names {
            out.push_str(name);
            out.push('\n');
        }
    }

    out.push_str("end\n");
    Ok(out)
}

/// Save a relation model; `.json` paths get the serialized model
pub fn save_relation_file<P: AsRef<Path>>(model: &RelationModel, path: P) -> Result<()> {
    let path = path.as_ref();
    let content = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::to_string_pretty(model).context("Failed to serialize relation model")?
    } else {
        relation_model_to_text(model)
            .with_context(|| format!("Failed to render relation model '{}'", model.problem_name))?
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write relation file: {}", path.display()))?;

    Ok(())
}

/// Create example relation files for testing
pub fn create_example_relation_files<P: AsRef<Path>>(output_dir: P) -> Result<()> {
    let dir = output_dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    // One symmetric relation: any two of a, b, c give the third
    let triangle = "# triangle\n\
                    connection relations\n\
                    a, b, c\n\
                    known\n\
                    a\n\
                    target\n\
                    b\n\
                    end\n";
    std::fs::write(dir.join("triangle.txt"), triangle).context("Failed to write triangle.txt")?;

    // XOR chain: s0 and s4 known, each s_i = s_{i-1} + k_i, recover all key bits
    let mut chain = String::from("# xor chain\nalgebraic relations\n");
    for i in 1..=4 {
        chain.push_str(&format!("s{} + s{} + k{}\n", i, i - 1, i));
    }
    chain.push_str("known\ns0, s4\ntarget\nk1, k2, k3, k4\nend\n");
    std::fs::write(dir.join("xor_chain.txt"), chain).context("Failed to write xor_chain.txt")?;

    // Directional relations: x and y give z, never the other way round
    let implication = "# implication\n\
                       connection relations\n\
                       x, y => z\n\
                       y, z, w\n\
                       known\n\
                       x\n\
                       target\n\
                       w\n\
                       not guessed\n\
                       z\n\
                       end\n";
    std::fs::write(dir.join("implication.txt"), implication)
        .context("Failed to write implication.txt")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_connection_relations() {
        let content = "# demo\nconnection relations\na, b, c\nx, y => z\nknown\na\ntarget\nz\nnot guessed\ny\nend\nignored, after, end\n";
        let model = parse_relation_text(content, "demo").unwrap();

        assert_eq!(model.problem_name, "demo");
        assert_eq!(model.variables, vec!["a", "b", "c", "x", "y", "z"]);
        assert_eq!(model.relations.len(), 2);
        assert_eq!(
            model.relations[1],
            Relation::Implication(vec!["x".into(), "y".into(), "z".into()])
        );
        assert_eq!(model.known, vec!["a"]);
        assert_eq!(model.targets, vec!["z"]);
        assert_eq!(model.not_guessed, vec!["y"]);
    }

    #[test]
    fn test_symmetric_relations_come_first() {
        let content = "connection relations\nx => y\na, b\nend\n";
        let model = parse_relation_text(content, "order").unwrap();
        assert!(model.relations[0].is_symmetric());
        assert!(!model.relations[1].is_symmetric());
    }

    #[test]
    fn test_algebraic_relations() {
        let content = "algebraic relations\na + b + c + 1\nd + d + e\nf + f\nknown\na\nend\n";
        let model = parse_relation_text(content, "alg").unwrap();

        assert_eq!(model.relations.len(), 1);
        assert_eq!(
            model.relations[0],
            Relation::Symmetric(vec!["a".into(), "b".into(), "c".into()])
        );
        // d cancels, leaving e determined as a constant
        assert_eq!(model.known, vec!["e", "a"]);
        assert!(model.variables.contains(&"f".to_string()));
    }

    #[test]
    fn test_algebraic_rejects_non_linear_terms() {
        let content = "algebraic relations\na*b + c\nend\n";
        let err = parse_relation_text(content, "bad").unwrap_err();
        assert!(err.to_string().contains("non-linear"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_relation_text("a, b\n", "x").is_err());
        assert!(parse_relation_text("connection relations\na, , b\n", "x").is_err());
        assert!(parse_relation_text("connection relations\na => b, c\n", "x").is_err());
        assert!(parse_relation_text("# nothing\nend\n", "x").is_err());
    }

    #[test]
    fn test_text_round_trip_preserves_model() {
        let content = "variables\nq\nconnection relations\na, b, c\nx, y => z\nknown\na\ntarget\nz\nnot guessed\ny\nend\n";
        let model = parse_relation_text(content, "round").unwrap();
        let rendered = relation_model_to_text(&model).unwrap();
        let reparsed = parse_relation_text(&rendered, "round").unwrap();
        assert_eq!(model, reparsed);
    }

    #[test]
    fn test_unwritable_names_rejected() {
        let model = |name: &str| {
            RelationModel::from_parts(
                "names",
                vec!["a".to_string(), name.to_string()],
                vec!["a".to_string()],
                vec![name.to_string()],
                vec![],
                vec![vec!["a".to_string(), name.to_string()]],
                vec![],
            )
        };

        for name in ["x y", "x,y", "x=>y", "", "end", "known", "not_guessed"] {
            assert!(relation_model_to_text(&model(name)).is_err(), "'{}' should be rejected", name);
        }
        assert!(relation_model_to_text(&model("s[1].hi")).is_ok());

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("bad.txt");
        let err = save_relation_file(&model("x, y"), &path).unwrap_err();
        assert!(format!("{:#}", err).contains("'x, y'"));
        assert!(!path.exists());

        let json_path = temp_dir.path().join("bad.json");
        save_relation_file(&model("x, y"), &json_path).unwrap();
        assert_eq!(load_relation_file(&json_path).unwrap(), model("x, y"));
    }

    #[test]
    fn test_file_io_and_examples() {
        let temp_dir = tempdir().unwrap();
        create_example_relation_files(temp_dir.path()).unwrap();

        for name in ["triangle.txt", "xor_chain.txt", "implication.txt"] {
            let model = load_relation_file(temp_dir.path().join(name)).unwrap();
            assert!(model.index().is_ok(), "{} should validate", name);
        }

        let chain = load_relation_file(temp_dir.path().join("xor_chain.txt")).unwrap();
        assert_eq!(chain.problem_name, "xor_chain");
        assert_eq!(chain.relations.len(), 4);

        let json_path = temp_dir.path().join("nested/chain.json");
        save_relation_file(&chain, &json_path).unwrap();
        let loaded = load_relation_file(&json_path).unwrap();
        assert_eq!(loaded, chain);
    }
}
