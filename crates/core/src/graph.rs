//! The validated future graph.
//!
//! Construction is the only place a graph is checked: duplicate ids, dangling
//! references, references to the wrong kind of future, and cycles are all
//! rejected here, so the batcher and the engine can assume a well-formed DAG.

use std::collections::{BTreeMap, BTreeSet};

use crate::argument::ParameterRef;
use crate::error::GraphError;
use crate::future::{Future, FutureId, ReferenceRole};
use crate::module::ModuleDescription;

#[derive(Debug, Clone)]
pub struct Graph {
    futures: BTreeMap<FutureId, Future>,
    /// Declaration order, kept for reports.
    order: Vec<FutureId>,
    dependencies: BTreeMap<FutureId, BTreeSet<FutureId>>,
    dependents: BTreeMap<FutureId, BTreeSet<FutureId>>,
}

impl Graph {
    pub fn new(futures: Vec<Future>) -> Result<Graph, GraphError> {
        let mut by_id: BTreeMap<FutureId, Future> = BTreeMap::new();
        let mut order = Vec::with_capacity(futures.len());
        for future in futures {
            let id = future.id().clone();
            if by_id.contains_key(&id) {
                return Err(GraphError::DuplicateId(id));
            }
            order.push(id.clone());
            by_id.insert(id, future);
        }

        for id in &order {
            let future = &by_id[id];
            for reference in future.references() {
                let Some(target) = by_id.get(&reference.target) else {
                    return Err(GraphError::UnknownReference {
                        future: id.clone(),
                        field: reference.field,
                        target: reference.target,
                    });
                };
                let kind = target.kind();
                let expected = match reference.role {
                    ReferenceRole::Ordering => None,
                    ReferenceRole::Value if !kind.yields_value() => {
                        Some("a value-producing future")
                    }
                    ReferenceRole::Contract | ReferenceRole::Library
                        if !kind.yields_contract() =>
                    {
                        Some("a contract future")
                    }
                    ReferenceRole::Transaction if !kind.sends_transaction() => {
                        Some("a transaction-sending future")
                    }
                    _ => None,
                };
                if let Some(expected) = expected {
                    return Err(GraphError::IncompatibleReference {
                        future: id.clone(),
                        field: reference.field,
                        target: reference.target,
                        target_kind: kind,
                        expected,
                    });
                }
            }
        }

        let mut dependencies: BTreeMap<FutureId, BTreeSet<FutureId>> = BTreeMap::new();
        let mut dependents: BTreeMap<FutureId, BTreeSet<FutureId>> = BTreeMap::new();
        for id in &order {
            dependents.entry(id.clone()).or_default();
        }
        for id in &order {
            let deps = by_id[id].dependencies();
            for dep in &deps {
                dependents.entry(dep.clone()).or_default().insert(id.clone());
            }
            dependencies.insert(id.clone(), deps);
        }

        let cycles = find_cycles(&dependencies);
        if !cycles.is_empty() {
            return Err(GraphError::Cycle {
                participants: cycles,
            });
        }

        Ok(Graph {
            futures: by_id,
            order,
            dependencies,
            dependents,
        })
    }

    pub fn from_module(module: ModuleDescription) -> Result<Graph, GraphError> {
        Graph::new(module.into_futures())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &FutureId) -> Option<&Future> {
        self.futures.get(id)
    }

    pub fn contains(&self, id: &FutureId) -> bool {
        self.futures.contains_key(id)
    }

    /// Futures in declaration order.
    pub fn futures(&self) -> impl Iterator<Item = &Future> {
        self.order.iter().map(move |id| &self.futures[id])
    }

    pub fn ids(&self) -> &[FutureId] {
        &self.order
    }

    /// Direct dependencies of `id`.
    pub fn dependencies(&self, id: &FutureId) -> BTreeSet<FutureId> {
        self.dependencies.get(id).cloned().unwrap_or_default()
    }

    /// Direct dependents of `id`.
    pub fn dependents(&self, id: &FutureId) -> BTreeSet<FutureId> {
        self.dependents.get(id).cloned().unwrap_or_default()
    }

    /// Transitive dependencies of `id`, excluding `id` itself.
    pub fn dependency_closure(&self, id: &FutureId) -> BTreeSet<FutureId> {
        walk(id, &self.dependencies)
    }

    /// Transitive dependents of `id`, excluding `id` itself.
    pub fn dependents_closure(&self, id: &FutureId) -> BTreeSet<FutureId> {
        walk(id, &self.dependents)
    }

    /// Every parameter referenced by any future, with the future using it.
    pub fn parameter_refs(&self) -> Vec<(FutureId, ParameterRef)> {
        let mut out = Vec::new();
        for future in self.futures() {
            for (_, arg) in future.arguments() {
                let mut params = Vec::new();
                arg.parameter_refs(&mut params);
                out.extend(params.into_iter().map(|p| (future.id().clone(), p.clone())));
            }
        }
        out
    }
}

fn walk(start: &FutureId, edges: &BTreeMap<FutureId, BTreeSet<FutureId>>) -> BTreeSet<FutureId> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<&FutureId> = edges.get(start).into_iter().flatten().collect();
    while let Some(next) = stack.pop() {
        if seen.insert(next.clone()) {
            stack.extend(edges.get(next).into_iter().flatten());
        }
    }
    seen
}

// ──────────────────────────────────────────────
// Cycle pre-pass (Tarjan's strongly connected components)
// ──────────────────────────────────────────────

struct Tarjan<'a> {
    edges: &'a BTreeMap<FutureId, BTreeSet<FutureId>>,
    index: BTreeMap<&'a FutureId, usize>,
    lowlink: BTreeMap<&'a FutureId, usize>,
    on_stack: BTreeSet<&'a FutureId>,
    stack: Vec<&'a FutureId>,
    next_index: usize,
    components: Vec<Vec<FutureId>>,
}

impl<'a> Tarjan<'a> {
    fn visit(&mut self, node: &'a FutureId) {
        self.index.insert(node, self.next_index);
        self.lowlink.insert(node, self.next_index);
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack.insert(node);

        let edges = self.edges;
        for succ in edges.get(node).into_iter().flatten() {
            if !self.index.contains_key(succ) {
                self.visit(succ);
                let low = self.lowlink[node].min(self.lowlink[succ]);
                self.lowlink.insert(node, low);
            } else if self.on_stack.contains(succ) {
                let low = self.lowlink[node].min(self.index[succ]);
                self.lowlink.insert(node, low);
            }
        }

        if self.lowlink[node] == self.index[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(member);
                component.push(member.clone());
                if member == node {
                    break;
                }
            }
            let self_edge = edges.get(node).is_some_and(|s| s.contains(node));
            if component.len() > 1 || self_edge {
                component.sort();
                self.components.push(component);
            }
        }
    }
}

/// Every cycle in the graph, as sorted lists of participants.
pub fn find_cycles(edges: &BTreeMap<FutureId, BTreeSet<FutureId>>) -> Vec<Vec<FutureId>> {
    let mut tarjan = Tarjan {
        edges,
        index: BTreeMap::new(),
        lowlink: BTreeMap::new(),
        on_stack: BTreeSet::new(),
        stack: Vec::new(),
        next_index: 0,
        components: Vec::new(),
    };
    for node in edges.keys() {
        if !tarjan.index.contains_key(node) {
            tarjan.visit(node);
        }
    }
    let mut components = tarjan.components;
    components.sort();
    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph(futures: serde_json::Value) -> Result<Graph, GraphError> {
        let module = ModuleDescription::from_json_str(
            &json!({ "id": "M", "futures": futures }).to_string(),
        )
        .unwrap();
        Graph::from_module(module)
    }

    fn ids(set: &BTreeSet<FutureId>) -> Vec<&str> {
        set.iter().map(|id| id.as_str()).collect()
    }

    #[test]
    fn closure_follows_libraries_and_arguments() {
        let g = graph(json!([
            { "id": "Lib", "type": "library-deployment", "contractName": "Lib" },
            { "id": "A", "type": "contract-deployment", "contractName": "Foo", "libraries": { "Lib": "Lib" } },
            { "id": "B", "type": "contract-deployment", "contractName": "Bar", "constructorArgs": [{ "$future": "A" }] },
        ]))
        .unwrap();

        let b = FutureId::from_raw("M#B");
        assert_eq!(ids(&g.dependency_closure(&b)), vec!["M#A", "M#Lib"]);
        assert_eq!(
            ids(&g.dependents_closure(&FutureId::from_raw("M#Lib"))),
            vec!["M#A", "M#B"]
        );
    }

    #[test]
    fn unknown_reference_is_rejected() {
        let err = graph(json!([
            { "id": "C", "type": "call", "contract": "Missing", "functionName": "f" },
        ]))
        .unwrap_err();
        assert!(matches!(err, GraphError::UnknownReference { ref field, .. } if field == "contract"));
    }

    #[test]
    fn call_result_cannot_be_used_as_value() {
        let err = graph(json!([
            { "id": "A", "type": "contract-deployment", "contractName": "Foo" },
            { "id": "C", "type": "call", "contract": "A", "functionName": "f" },
            { "id": "D", "type": "contract-deployment", "contractName": "Bar", "constructorArgs": [{ "$future": "C" }] },
        ]))
        .unwrap_err();
        assert!(matches!(err, GraphError::IncompatibleReference { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = graph(json!([
            { "id": "A", "type": "contract-deployment", "contractName": "Foo" },
            { "id": "A", "type": "contract-deployment", "contractName": "Bar" },
        ]))
        .unwrap_err();
        assert_eq!(err, GraphError::DuplicateId(FutureId::from_raw("M#A")));
    }

    #[test]
    fn every_cycle_participant_is_reported() {
        let err = graph(json!([
            { "id": "A", "type": "contract-deployment", "contractName": "Foo", "after": ["B"] },
            { "id": "B", "type": "contract-deployment", "contractName": "Foo", "after": ["C"] },
            { "id": "C", "type": "contract-deployment", "contractName": "Foo", "after": ["A"] },
            { "id": "D", "type": "contract-deployment", "contractName": "Foo", "after": ["E"] },
            { "id": "E", "type": "contract-deployment", "contractName": "Foo", "after": ["D"] },
            { "id": "S", "type": "contract-deployment", "contractName": "Foo", "after": ["S"] },
            { "id": "Ok", "type": "contract-deployment", "contractName": "Foo", "after": ["A"] },
        ]))
        .unwrap_err();
        let GraphError::Cycle { participants } = err else {
            panic!("expected a cycle error");
        };
        let rendered: Vec<Vec<&str>> = participants
            .iter()
            .map(|c| c.iter().map(|id| id.as_str()).collect())
            .collect();
        assert_eq!(
            rendered,
            vec![vec!["M#A", "M#B", "M#C"], vec!["M#D", "M#E"], vec!["M#S"]]
        );
    }
}
