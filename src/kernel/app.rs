//! The resolved application: instances, hooks and the run loop.
//!
//! # Responsibilities
//! - Construct every node of the graph exactly once, in order
//! - Hand the collected hooks to the lifecycle coordinator
//! - Drive start → wait for termination → stop
//!
//! # Design Decisions
//! - Construction is eager: a successful resolve means every constructor ran
//! - A failed constructor aborts resolution; no hook of an already built
//!   component runs

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::schema::LifecycleConfig;
use crate::kernel::error::KernelError;
use crate::kernel::graph::{self, Graph};
use crate::kernel::group::{Group, GroupKey};
use crate::kernel::inject::Instances;
use crate::kernel::registry::Registry;
use crate::kernel::types::NodeKey;
use crate::lifecycle::coordinator::Coordinator;
use crate::lifecycle::signals;
use crate::lifecycle::{Lifecycle, LifecycleState, Shutdown};
use crate::observability::metrics;

/// A resolved application, ready to start.
pub struct App {
    graph: Graph,
    instances: Instances,
    coordinator: Coordinator,
    shutdown: Arc<Shutdown>,
    config: LifecycleConfig,
}

impl App {
    pub(crate) fn build(mut registry: Registry, config: LifecycleConfig) -> Result<Self, KernelError> {
        let began = Instant::now();
        let graph = graph::build(&registry)?;
        tracing::debug!(order = ?graph.labels(), "Dependency graph resolved");

        let mut instances = Instances::default();
        let mut hooks = Vec::new();

        for node in graph.order() {
            match *node {
                NodeKey::Type(key) => {
                    if let Some(spec) = registry.components.remove(&key) {
                        let mut lifecycle = Lifecycle::new(key.to_string());
                        let slot = (spec.construct)(&instances, node, &mut lifecycle)?;
                        instances.insert(*node, slot);
                        hooks.extend(lifecycle.into_hooks());
                    } else if let Some(binding) = registry.bindings.get(&key).and_then(|b| b.first()) {
                        let slot = instances
                            .slot(&NodeKey::Type(binding.concrete))
                            .and_then(|concrete| (binding.cast)(concrete))
                            .ok_or_else(|| KernelError::UnresolvedDependency {
                                requester: key.to_string(),
                                missing: binding.concrete.to_string(),
                            })?;
                        instances.insert(*node, slot);
                    }
                }
                NodeKey::Member { group, index } => {
                    let construct = registry
                        .groups
                        .get_mut(group)
                        .and_then(|g| g.members.get_mut(index))
                        .and_then(|m| m.construct.take());
                    if let Some(construct) = construct {
                        let mut lifecycle = Lifecycle::new(node.to_string());
                        let slot = construct(&instances, node, &mut lifecycle)?;
                        instances.insert(*node, slot);
                        hooks.extend(lifecycle.into_hooks());
                    }
                }
                NodeKey::Group(name) => {
                    if let Some(spec) = registry.groups.get(name) {
                        let slot = {
                            let members: Vec<&(dyn Any + Send + Sync)> = (0..spec.members.len())
                                .filter_map(|index| {
                                    instances.slot(&NodeKey::Member { group: name, index })
                                })
                                .collect();
                            (spec.collect)(&members)
                        };
                        let slot = slot.ok_or_else(|| KernelError::GroupMismatch {
                            requester: node.to_string(),
                            group: name.to_string(),
                            expected: spec.member.to_string(),
                            found: "a member of another type".to_string(),
                        })?;
                        instances.insert(*node, slot);
                    }
                }
            }
        }

        let shutdown = instances.get::<Shutdown>().unwrap_or_default();
        let coordinator = Coordinator::new(hooks, config.stop_timeout());
        metrics::record_resolution(graph.len(), coordinator.hook_count(), began.elapsed());
        tracing::info!(
            components = graph.len(),
            hooks = coordinator.hook_count(),
            "Application resolved"
        );

        Ok(Self {
            graph,
            instances,
            coordinator,
            shutdown,
            config,
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    /// The singleton registered or bound for `T`.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.instances.get::<T>()
    }

    /// The members of group `G`, as a dependent would receive them.
    pub fn group<G: GroupKey>(&self) -> Option<Group<G>> {
        self.instances.group::<G>()
    }

    pub fn state(&self) -> LifecycleState {
        self.coordinator.state()
    }

    /// Handle for requesting a stop of [`run`](Self::run) from elsewhere.
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    /// Run every start hook in construction order, all bounded by one
    /// deadline `timeout` from now. On failure, already started hooks are
    /// stopped in reverse before the error is returned.
    pub async fn start(&mut self, timeout: Duration) -> Result<(), KernelError> {
        self.coordinator.start(timeout).await
    }

    /// Run the stop hook of every started component in reverse start order.
    /// Every hook runs; all failures are returned together. A second call is
    /// a no-op.
    pub async fn stop(&mut self, timeout: Duration) -> Result<(), KernelError> {
        self.coordinator.stop(timeout).await
    }

    /// Start, block until SIGINT/SIGTERM or a [`Shutdown`] request, then stop.
    pub async fn run(mut self) -> Result<(), KernelError> {
        self.start(self.config.start_timeout()).await?;
        signals::wait_for_termination(&self.shutdown).await;
        self.stop(self.config.stop_timeout()).await
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("components", &self.graph.len())
            .field("state", &self.coordinator.state())
            .finish()
    }
}
