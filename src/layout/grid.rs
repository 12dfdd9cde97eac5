//! Grid grouping and connector lines for rendering laid-out nodes

use crate::plan::{TaskNode, parse_reference};
use serde::Serialize;

/// A line from an upstream node's output to a downstream parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub from: String,
    pub to: String,
    /// Parameter on `to` fed by the connection
    pub param: String,
    /// Path into `from`'s output
    pub path: String,
    pub from_column: usize,
    pub from_row: usize,
    pub to_column: usize,
    pub to_row: usize,
}

/// Connectors for every resolvable dependency reference, in node order
///
/// References to steps that are not on the grid produce no line.
pub fn connectors(nodes: &[TaskNode]) -> Vec<Connector> {
    let mut lines = Vec::new();

    for node in nodes {
        let Some(ref references) = node.step.dependencies else {
            continue;
        };
        for (param, reference) in references {
            let Some(parsed) = parse_reference(reference) else {
                continue;
            };
            let from_id = parsed.step_id;
            if from_id == node.id() {
                continue;
            }
            if let Some(from) = nodes.iter().find(|n| n.id() == from_id) {
                lines.push(Connector {
                    from: from_id.to_string(),
                    to: node.id().to_string(),
                    param: param.clone(),
                    path: parsed.path.to_string(),
                    from_column: from.column,
                    from_row: from.row,
                    to_column: node.column,
                    to_row: node.row,
                });
            }
        }
    }

    lines
}

/// Nodes grouped into columns, each column ordered by row
#[derive(Debug, Clone, Serialize)]
pub struct Grid<'a> {
    pub columns: Vec<Vec<&'a TaskNode>>,
}

impl<'a> Grid<'a> {
    pub fn new(nodes: &'a [TaskNode]) -> Self {
        let width = nodes.iter().map(|n| n.column + 1).max().unwrap_or(0);
        let mut columns: Vec<Vec<&TaskNode>> = vec![Vec::new(); width];
        for node in nodes {
            columns[node.column].push(node);
        }
        for column in &mut columns {
            column.sort_by_key(|n| n.row);
        }
        Self { columns }
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Height of the tallest column
    pub fn height(&self) -> usize {
        self.columns.iter().map(Vec::len).max().unwrap_or(0)
    }

    #[cfg(test)]
    pub fn get(&self, column: usize, row: usize) -> Option<&'a TaskNode> {
        self.columns.get(column).and_then(|c| c.get(row)).copied()
    }
}
