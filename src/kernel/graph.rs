//! Dependency graph resolution.
//!
//! # Responsibilities
//! - Walk every registration and the dependencies it declares
//! - Fail on cycles, missing providers, ambiguous bindings and group type
//!   mismatches before anything is constructed
//! - Produce the construction order
//!
//! # Design Decisions
//! - Depth-first postorder: a node is emitted after all its dependencies
//! - Roots and each node's dependencies are visited in registration order, so
//!   the same registration code always yields the same order
//! - Cycle paths are reported from the first revisited node, in traversal
//!   order

use std::collections::HashMap;

use crate::kernel::error::{CycleError, KernelError};
use crate::kernel::inject::{Requirement, Target};
use crate::kernel::registry::Registry;
use crate::kernel::types::{NodeKey, TypeKey};

/// The resolved dependency graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    order: Vec<NodeKey>,
    edges: HashMap<NodeKey, Vec<NodeKey>>,
}

impl Graph {
    /// Construction order: no node precedes any of its dependencies.
    pub fn order(&self) -> &[NodeKey] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Direct dependencies of `node`, in visiting order.
    pub fn dependencies(&self, node: &NodeKey) -> &[NodeKey] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn position(&self, node: &NodeKey) -> Option<usize> {
        self.order.iter().position(|n| n == node)
    }

    /// Position of the component or contract `T` in construction order.
    pub fn position_of<T: ?Sized + 'static>(&self) -> Option<usize> {
        self.position(&NodeKey::Type(TypeKey::of::<T>()))
    }

    /// Human-readable construction order.
    pub fn labels(&self) -> Vec<String> {
        self.order.iter().map(ToString::to_string).collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

struct Walk<'a> {
    registry: &'a Registry,
    marks: HashMap<NodeKey, Mark>,
    stack: Vec<NodeKey>,
    order: Vec<NodeKey>,
    edges: HashMap<NodeKey, Vec<NodeKey>>,
}

/// Build the graph for everything in `registry`.
pub(crate) fn build(registry: &Registry) -> Result<Graph, KernelError> {
    let mut walk = Walk {
        registry,
        marks: HashMap::new(),
        stack: Vec::new(),
        order: Vec::new(),
        edges: HashMap::new(),
    };

    for root in &registry.roots {
        walk.visit(*root)?;
    }

    Ok(Graph {
        order: walk.order,
        edges: walk.edges,
    })
}

impl Walk<'_> {
    fn visit(&mut self, node: NodeKey) -> Result<(), KernelError> {
        match self.marks.get(&node) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(self.cycle_to(&node).into()),
            None => {}
        }

        self.marks.insert(node, Mark::Visiting);
        self.stack.push(node);

        let children = self.children(&node)?;
        for child in &children {
            self.visit(*child)?;
        }

        self.stack.pop();
        self.marks.insert(node, Mark::Done);
        self.order.push(node);
        self.edges.insert(node, children);
        Ok(())
    }

    fn cycle_to(&self, node: &NodeKey) -> CycleError {
        let start = self.stack.iter().position(|n| n == node).unwrap_or(0);
        CycleError {
            path: self.stack[start..].iter().map(ToString::to_string).collect(),
        }
    }

    fn children(&self, node: &NodeKey) -> Result<Vec<NodeKey>, KernelError> {
        let registry = self.registry;
        let mut children = match node {
            NodeKey::Type(key) => {
                if let Some(spec) = registry.components.get(key) {
                    self.targets(node, &spec.requirements)?
                } else if let Some(bindings) = registry.bindings.get(key) {
                    if bindings.len() > 1 {
                        return Err(KernelError::AmbiguousBinding {
                            interface: key.to_string(),
                            candidates: bindings.iter().map(|b| b.concrete.to_string()).collect(),
                        });
                    }
                    bindings.iter().map(|b| NodeKey::Type(b.concrete)).collect()
                } else {
                    Vec::new()
                }
            }
            NodeKey::Group(name) => registry.groups.get(name).map_or_else(Vec::new, |group| {
                (0..group.members.len())
                    .map(|index| NodeKey::Member { group: *name, index })
                    .collect()
            }),
            NodeKey::Member { group, index } => {
                match registry.groups.get(group).and_then(|g| g.members.get(*index)) {
                    Some(member) => self.targets(node, &member.requirements)?,
                    None => Vec::new(),
                }
            }
        };

        children.sort_by_key(|child| registry.seq_of(child));
        children.dedup();
        Ok(children)
    }

    fn targets(
        &self,
        requester: &NodeKey,
        requirements: &[Requirement],
    ) -> Result<Vec<NodeKey>, KernelError> {
        let registry = self.registry;
        let mut targets = Vec::with_capacity(requirements.len());

        for requirement in requirements {
            match requirement.target {
                Target::Type(key) => {
                    if registry.provides(&key) {
                        targets.push(NodeKey::Type(key));
                    } else if !requirement.optional {
                        return Err(KernelError::UnresolvedDependency {
                            requester: requester.to_string(),
                            missing: key.to_string(),
                        });
                    }
                }
                Target::Group { name, member } => match registry.groups.get(name) {
                    Some(group) if group.member == member => targets.push(NodeKey::Group(name)),
                    Some(group) => {
                        return Err(KernelError::GroupMismatch {
                            requester: requester.to_string(),
                            group: name.to_string(),
                            expected: member.to_string(),
                            found: group.member.to_string(),
                        })
                    }
                    // Nobody contributed: delivered empty.
                    None => {}
                },
            }
        }
        Ok(targets)
    }
}
