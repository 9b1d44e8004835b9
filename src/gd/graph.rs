//! Determination graph reconstructed from a solved assignment

use crate::relations::RelationId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A variable at a given round
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vertex {
    pub variable: String,
    pub round: usize,
}

impl Vertex {
    pub fn new(variable: impl Into<String>, round: usize) -> Self {
        Self {
            variable: variable.into(),
            round,
        }
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.variable, self.round)
    }
}

/// `source` at round t helped determine `target` at round t + 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterminationEdge {
    pub source: Vertex,
    pub target: Vertex,
    /// Relations through which the edge was recorded, in recording order
    pub relations: Vec<RelationId>,
    /// Number of satisfied alternatives that produced this edge
    pub multiplicity: usize,
}

impl DeterminationEdge {
    /// Recorded by more than one alternative
    pub fn is_redundant(&self) -> bool {
        self.multiplicity > 1
    }
}

#[derive(Serialize, Deserialize)]
struct GraphParts {
    vertices: Vec<Vertex>,
    edges: Vec<DeterminationEdge>,
}

/// Vertices and deduplicated edges, both in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphParts", into = "GraphParts")]
pub struct DeterminationGraph {
    vertices: IndexSet<Vertex>,
    edges: Vec<DeterminationEdge>,
    edge_index: HashMap<(Vertex, Vertex), usize>,
}

impl DeterminationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the vertex was already present
    pub fn add_vertex(&mut self, vertex: Vertex) -> bool {
        self.vertices.insert(vertex)
    }

    /// Record an edge; repeating an edge raises its multiplicity
    pub fn add_edge(&mut self, source: Vertex, target: Vertex, relation: RelationId) {
        self.add_vertex(source.clone());
        self.add_vertex(target.clone());

        let key = (source, target);
        match self.edge_index.get(&key) {
            Some(&idx) => {
                let edge = &mut self.edges[idx];
                edge.multiplicity += 1;
                edge.relations.push(relation);
            }
            None => {
                let (source, target) = key.clone();
                self.edge_index.insert(key, self.edges.len());
                self.edges.push(DeterminationEdge {
                    source,
                    target,
                    relations: vec![relation],
                    multiplicity: 1,
                });
            }
        }
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.iter()
    }

    pub fn edges(&self) -> &[DeterminationEdge] {
        &self.edges
    }

    pub fn contains_vertex(&self, vertex: &Vertex) -> bool {
        self.vertices.contains(vertex)
    }

    pub fn edge(&self, source: &Vertex, target: &Vertex) -> Option<&DeterminationEdge> {
        self.edge_index
            .get(&(source.clone(), target.clone()))
            .map(|&idx| &self.edges[idx])
    }

    /// Edges ending in `target`
    pub fn incoming<'a>(&'a self, target: &'a Vertex) -> impl Iterator<Item = &'a DeterminationEdge> {
        self.edges.iter().filter(move |edge| &edge.target == target)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn unique_edge_count(&self) -> usize {
        self.edges.iter().filter(|edge| !edge.is_redundant()).count()
    }

    pub fn redundant_edge_count(&self) -> usize {
        self.edges.len() - self.unique_edge_count()
    }
}

impl From<GraphParts> for DeterminationGraph {
    fn from(parts: GraphParts) -> Self {
        let edge_index = parts
            .edges
            .iter()
            .enumerate()
            .map(|(idx, edge)| ((edge.source.clone(), edge.target.clone()), idx))
            .collect();
        Self {
            vertices: parts.vertices.into_iter().collect(),
            edges: parts.edges,
            edge_index,
        }
    }
}

impl From<DeterminationGraph> for GraphParts {
    fn from(graph: DeterminationGraph) -> Self {
        Self {
            vertices: graph.vertices.into_iter().collect(),
            edges: graph.edges,
        }
    }
}
