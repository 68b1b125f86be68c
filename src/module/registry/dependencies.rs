//! Module dependency resolution
//!
//! Checks every dependency constraint of every loaded module against the
//! module store and determines a dependencies-first order.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::debug;

use crate::module::registry::store::{ModuleRecord, ModuleStore};
use crate::module::registry::version::VersionReq;
use crate::module::traits::{ModuleError, ModuleId};

/// Dependency constraint: target module name plus version requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub target: String,
    pub requirement: VersionReq,
}

impl Constraint {
    /// Highest loaded version of the target satisfying the requirement
    pub fn bind(&self, store: &ModuleStore) -> Option<ModuleId> {
        store
            .versions_of(&self.target)
            .filter(|v| self.requirement.matches(v))
            .max()
            .map(|v| ModuleId::new(self.target.clone(), v.clone()))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target, self.requirement)
    }
}

/// Dependency resolution result
#[derive(Debug, Clone)]
pub struct DependencyResolution {
    /// Modules in launch order (dependencies first)
    pub load_order: Vec<ModuleId>,
    /// Module -> modules its constraints bound to, in declaration order
    pub bindings: HashMap<ModuleId, Vec<ModuleId>>,
}

/// Resolution failure together with the modules it condemns
#[derive(Debug)]
pub struct ResolutionFailure {
    pub error: ModuleError,
    pub failed: Vec<ModuleId>,
}

/// Dependency resolver
pub struct ModuleDependencies;

impl ModuleDependencies {
    /// Resolve module dependencies and determine launch order
    ///
    /// Modules are checked in load order and constraints in declaration
    /// order; the first unsatisfied constraint aborts resolution.
    pub fn resolve(store: &ModuleStore) -> Result<DependencyResolution, ResolutionFailure> {
        let mut bindings: HashMap<ModuleId, Vec<ModuleId>> = HashMap::new();

        for record in store.iter() {
            let bound = Self::bind_all(record, store)?;
            bindings.insert(record.id.clone(), bound);
        }

        let order: Vec<ModuleId> = store.iter().map(|r| r.id.clone()).collect();
        let load_order = Self::topological_sort(&order, &bindings).map_err(|cycle| {
            ResolutionFailure {
                failed: cycle.clone(),
                error: ModuleError::DependencyCycle { modules: cycle },
            }
        })?;

        debug!(
            "Dependency resolution complete: {}",
            load_order
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(DependencyResolution {
            load_order,
            bindings,
        })
    }

    fn bind_all(
        record: &ModuleRecord,
        store: &ModuleStore,
    ) -> Result<Vec<ModuleId>, ResolutionFailure> {
        record
            .constraints
            .iter()
            .map(|constraint| {
                constraint.bind(store).ok_or_else(|| {
                    debug!("{} has no match for {}", record.id, constraint);
                    ResolutionFailure {
                        failed: vec![record.id.clone()],
                        error: ModuleError::DependencyNotFound {
                            module: record.id.clone(),
                            target: constraint.target.clone(),
                            requirement: constraint.requirement.to_string(),
                        },
                    }
                })
            })
            .collect()
    }

    /// Topological sort of dependencies (Kahn's algorithm)
    ///
    /// Ties are broken by load order. On a cycle, returns its members.
    fn topological_sort(
        modules: &[ModuleId],
        bindings: &HashMap<ModuleId, Vec<ModuleId>>,
    ) -> Result<Vec<ModuleId>, Vec<ModuleId>> {
        let mut in_degree: HashMap<&ModuleId, usize> = modules.iter().map(|m| (m, 0)).collect();
        let mut dependents: HashMap<&ModuleId, Vec<&ModuleId>> = HashMap::new();

        for module in modules {
            for dep in bindings.get(module).into_iter().flatten() {
                dependents.entry(dep).or_default().push(module);
                if let Some(degree) = in_degree.get_mut(module) {
                    *degree += 1;
                }
            }
        }

        let mut queue: VecDeque<&ModuleId> = modules
            .iter()
            .filter(|m| in_degree.get(m).copied() == Some(0))
            .collect();
        let mut result = Vec::with_capacity(modules.len());

        while let Some(module) = queue.pop_front() {
            result.push(module.clone());
            for &dependent in dependents.get(module).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if result.len() == modules.len() {
            return Ok(result);
        }

        let done: HashSet<&ModuleId> = result.iter().collect();
        Err(Self::find_cycle(modules, bindings, &done))
    }

    /// Walk unresolved dependencies from the first stuck module until a
    /// module repeats; the repeated tail is a cycle.
    fn find_cycle(
        modules: &[ModuleId],
        bindings: &HashMap<ModuleId, Vec<ModuleId>>,
        done: &HashSet<&ModuleId>,
    ) -> Vec<ModuleId> {
        let Some(start) = modules.iter().find(|m| !done.contains(m)) else {
            return Vec::new();
        };

        let mut path: Vec<&ModuleId> = vec![start];
        let mut seen: HashMap<&ModuleId, usize> = HashMap::from([(start, 0)]);
        let mut current = start;

        // Every stuck module has at least one stuck dependency
        while let Some(next) = bindings
            .get(current)
            .into_iter()
            .flatten()
            .find(|d| !done.contains(d))
        {
            if let Some(&pos) = seen.get(next) {
                return path[pos..].iter().map(|&m| m.clone()).collect();
            }
            seen.insert(next, path.len());
            path.push(next);
            current = next;
        }

        path.into_iter().cloned().collect()
    }
}
