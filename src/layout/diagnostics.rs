//! Non-fatal plan diagnostics
//!
//! Layout never rejects a plan. These checks surface the problems layout
//! silently tolerates so they can be logged or reported by `validate`.

use super::engine::{DependencyMap, build_dependency_map};
use crate::plan::{Step, referenced_step};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// A problem found in a step list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    DuplicateStepId {
        step: String,
    },
    DanglingReference {
        step: String,
        param: String,
        reference: String,
    },
    MalformedReference {
        step: String,
        param: String,
        reference: String,
    },
    Cycle {
        steps: Vec<String>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DuplicateStepId { step } => write!(f, "duplicate step id: {}", step),
            Diagnostic::DanglingReference {
                step,
                param,
                reference,
            } => write!(
                f,
                "step '{}' param '{}' references missing step ({})",
                step, param, reference
            ),
            Diagnostic::MalformedReference {
                step,
                param,
                reference,
            } => write!(
                f,
                "step '{}' param '{}' has malformed reference '{}'",
                step, param, reference
            ),
            Diagnostic::Cycle { steps } => {
                write!(f, "circular dependency between steps: {}", steps.join(" -> "))
            }
        }
    }
}

/// Check a step list for duplicate ids, unresolved references and cycles
pub fn diagnose(steps: &[Step]) -> Vec<Diagnostic> {
    let mut found = Vec::new();

    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.id.as_str()) {
            found.push(Diagnostic::DuplicateStepId {
                step: step.id.clone(),
            });
        }
    }

    for step in steps {
        let Some(ref references) = step.dependencies else {
            continue;
        };
        for (param, reference) in references {
            match referenced_step(reference) {
                Some(id) if !seen.contains(id) => found.push(Diagnostic::DanglingReference {
                    step: step.id.clone(),
                    param: param.clone(),
                    reference: reference.clone(),
                }),
                Some(_) => {}
                None => found.push(Diagnostic::MalformedReference {
                    step: step.id.clone(),
                    param: param.clone(),
                    reference: reference.clone(),
                }),
            }
        }
    }

    let deps = build_dependency_map(steps);
    found.extend(find_cycles(&deps).into_iter().map(|steps| Diagnostic::Cycle { steps }));

    found
}

/// Each distinct cycle once, as the ids along it
fn find_cycles(deps: &DependencyMap) -> Vec<Vec<String>> {
    fn visit<'a>(
        id: &'a str,
        deps: &'a DependencyMap,
        done: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
        reported: &mut HashSet<BTreeSet<&'a str>>,
    ) {
        if done.contains(id) {
            return;
        }
        if let Some(pos) = path.iter().position(|p| *p == id) {
            let members: BTreeSet<&str> = path[pos..].iter().copied().collect();
            if reported.insert(members) {
                let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
                cycle.push(id.to_string());
                cycles.push(cycle);
            }
            return;
        }
        let Some(direct) = deps.get(id) else {
            return;
        };

        path.push(id);
        for dep in direct {
            visit(dep, deps, done, path, cycles, reported);
        }
        path.pop();
        done.insert(id);
    }

    let mut done = HashSet::new();
    let mut path = Vec::new();
    let mut cycles = Vec::new();
    let mut reported = HashSet::new();
    for id in deps.keys() {
        visit(id, deps, &mut done, &mut path, &mut cycles, &mut reported);
    }
    cycles
}
