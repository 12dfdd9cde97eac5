//! Column/row assignment for workflow steps

use crate::plan::{Step, TaskNode, referenced_step};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Step id -> ids of the steps it directly depends on
pub type DependencyMap = BTreeMap<String, BTreeSet<String>>;

/// Collect each step's direct dependencies from its reference strings
///
/// Every step gets an entry. Self references and strings that don't look
/// like `$<stepId>.<path>` are ignored. Referenced ids are kept even when no
/// such step exists in `steps`.
pub fn build_dependency_map(steps: &[Step]) -> DependencyMap {
    let mut map = DependencyMap::new();

    for step in steps {
        let deps = map.entry(step.id.clone()).or_default();
        let Some(ref references) = step.dependencies else {
            continue;
        };
        for reference in references.values() {
            match referenced_step(reference) {
                Some(id) if id != step.id => {
                    deps.insert(id.to_string());
                }
                _ => {}
            }
        }
    }

    map
}

/// Depth resolution over a dependency map with memoization and a cycle guard
struct DepthResolver<'a> {
    deps: &'a DependencyMap,
    depths: HashMap<&'a str, usize>,
    cyclic: HashSet<&'a str>,
    path: Vec<&'a str>,
}

impl<'a> DepthResolver<'a> {
    fn new(deps: &'a DependencyMap) -> Self {
        Self {
            deps,
            depths: HashMap::new(),
            cyclic: HashSet::new(),
            path: Vec::new(),
        }
    }

    fn depth(&mut self, id: &'a str) -> usize {
        if let Some(&depth) = self.depths.get(id) {
            return depth;
        }

        // Re-entering a node on the current path: everything from that node
        // down to here is on a cycle and gets flattened to column 0.
        if let Some(pos) = self.path.iter().position(|p| *p == id) {
            for node in &self.path[pos..] {
                self.cyclic.insert(*node);
            }
            return 0;
        }

        let deps = self.deps;
        let Some(direct) = deps.get(id) else {
            // Referenced but not in the plan
            return 0;
        };

        self.path.push(id);
        let mut depth = 0;
        for dep in direct {
            depth = depth.max(self.depth(dep.as_str()) + 1);
        }
        self.path.pop();

        if self.cyclic.contains(id) {
            depth = 0;
        }
        self.depths.insert(id, depth);
        depth
    }
}

/// Lay out steps on a column grid
///
/// Column is the longest dependency chain ending at the step, row is the
/// step's position among same-column steps in input order. All nodes start
/// out `pending`; callers merge any previous status back themselves.
pub fn layout_tasks(steps: &[Step]) -> Vec<TaskNode> {
    if steps.is_empty() {
        return Vec::new();
    }

    let deps = build_dependency_map(steps);
    let mut resolver = DepthResolver::new(&deps);
    let columns: Vec<usize> = steps.iter().map(|s| resolver.depth(&s.id)).collect();

    if !resolver.cyclic.is_empty() {
        let mut ids: Vec<_> = resolver.cyclic.iter().copied().collect();
        ids.sort_unstable();
        tracing::warn!(steps = ?ids, "Circular step references flattened to column 0");
    }

    let mut rows_used: HashMap<usize, usize> = HashMap::new();
    steps
        .iter()
        .zip(columns)
        .map(|(step, column)| {
            let row = rows_used.entry(column).or_insert(0);
            let node = TaskNode::new(step.clone(), column, *row);
            *row += 1;
            node
        })
        .collect()
}
