//! Provider registry and the application builder.
//!
//! # Responsibilities
//! - Accept component, group-member and binding registrations
//! - Reject conflicting registrations as soon as they are made
//! - Seal itself when resolution begins
//!
//! # Design Decisions
//! - Registration methods take `&self`; a mutex guards the maps so modules may
//!   register from several threads during init
//! - Once sealed the registry is moved out of the mutex, so resolution and
//!   instantiation run without locking
//! - Plain and group registrations of the same type are separate kinds and
//!   never conflict

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::schema::LifecycleConfig;
use crate::kernel::app::App;
use crate::kernel::binding::{BindingSpec, Upcast};
use crate::kernel::error::{BoxError, KernelError};
use crate::kernel::group::{self, Collector, GroupKey};
use crate::kernel::inject::{Dependencies, Instances, Requirement, Slot};
use crate::kernel::types::{NodeKey, TypeKey};
use crate::lifecycle::{Lifecycle, LifecycleState, Shutdown};

pub(crate) type Construct =
    Box<dyn FnOnce(&Instances, &NodeKey, &mut Lifecycle) -> Result<Slot, KernelError> + Send>;

pub(crate) struct ComponentSpec {
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) construct: Construct,
    pub(crate) seq: usize,
}

pub(crate) struct MemberSpec {
    pub(crate) requirements: Vec<Requirement>,
    /// Taken when the member is instantiated.
    pub(crate) construct: Option<Construct>,
    pub(crate) seq: usize,
}

pub(crate) struct GroupSpec {
    pub(crate) member: TypeKey,
    pub(crate) members: Vec<MemberSpec>,
    pub(crate) collect: Collector,
    pub(crate) seq: usize,
}

/// Everything registered so far. Roots are kept in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) components: HashMap<TypeKey, ComponentSpec>,
    pub(crate) bindings: HashMap<TypeKey, Vec<BindingSpec>>,
    pub(crate) groups: HashMap<&'static str, GroupSpec>,
    pub(crate) roots: Vec<NodeKey>,
    next_seq: usize,
}

impl Registry {
    fn next_seq(&mut self) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub(crate) fn provides(&self, key: &TypeKey) -> bool {
        self.components.contains_key(key) || self.bindings.contains_key(key)
    }

    /// Registration sequence number of a node, used to break ordering ties.
    pub(crate) fn seq_of(&self, node: &NodeKey) -> usize {
        match node {
            NodeKey::Type(key) => self
                .components
                .get(key)
                .map(|spec| spec.seq)
                .or_else(|| {
                    self.bindings
                        .get(key)
                        .and_then(|bindings| bindings.first())
                        .map(|binding| binding.seq)
                })
                .unwrap_or(usize::MAX),
            NodeKey::Group(name) => self.groups.get(name).map_or(usize::MAX, |g| g.seq),
            NodeKey::Member { group, index } => self
                .groups
                .get(group)
                .and_then(|g| g.members.get(*index))
                .map_or(usize::MAX, |m| m.seq),
        }
    }
}

struct BuilderState {
    registry: Registry,
    state: LifecycleState,
}

/// Collects registrations for one application.
///
/// Modules are plain functions taking `&AppBuilder`:
///
/// ```
/// use std::sync::Arc;
/// use service_kernel::kernel::{AppBuilder, KernelError};
///
/// struct Settings { greeting: String }
/// struct Greeter { settings: Arc<Settings> }
///
/// fn greeting_module(app: &AppBuilder) -> Result<(), KernelError> {
///     app.supply(Settings { greeting: "hello".into() })?;
///     app.provide(|(settings,): (Arc<Settings>,), _| Ok(Greeter { settings }))
/// }
///
/// let app = AppBuilder::new();
/// app.module("greeting", greeting_module).unwrap();
/// let resolved = app.resolve().unwrap();
/// assert_eq!(resolved.get::<Greeter>().unwrap().settings.greeting, "hello");
/// ```
pub struct AppBuilder {
    inner: Mutex<BuilderState>,
    lifecycle: LifecycleConfig,
}

impl AppBuilder {
    /// A builder with the default lifecycle timeouts. The built-in
    /// [`Shutdown`] component is already registered.
    pub fn new() -> Self {
        Self::with_lifecycle(LifecycleConfig::default())
    }

    pub fn with_lifecycle(lifecycle: LifecycleConfig) -> Self {
        let builder = Self {
            inner: Mutex::new(BuilderState {
                registry: Registry::default(),
                state: LifecycleState::Registered,
            }),
            lifecycle,
        };
        let mut state = builder.lock();
        let seq = state.registry.next_seq();
        let key = TypeKey::of::<Shutdown>();
        state.registry.components.insert(
            key,
            ComponentSpec {
                requirements: Vec::new(),
                construct: Box::new(|_: &Instances, _: &NodeKey, _: &mut Lifecycle| {
                    Ok(Box::new(Arc::new(Shutdown::new())) as Slot)
                }),
                seq,
            },
        );
        state.registry.roots.push(NodeKey::Type(key));
        drop(state);
        builder
    }

    pub fn lifecycle_config(&self) -> &LifecycleConfig {
        &self.lifecycle
    }

    /// Current builder state: registered, resolving, resolved or failed.
    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    fn lock(&self) -> MutexGuard<'_, BuilderState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, BuilderState>, KernelError> {
        let guard = self.lock();
        if guard.state != LifecycleState::Registered {
            return Err(KernelError::RegistrationClosed);
        }
        Ok(guard)
    }

    /// Register a singleton constructor for `T`.
    ///
    /// The constructor receives its dependencies as the tuple `D` and a
    /// [`Lifecycle`] to attach start/stop hooks to.
    pub fn provide<T, D, F>(&self, ctor: F) -> Result<(), KernelError>
    where
        T: Send + Sync + 'static,
        D: Dependencies,
        F: FnOnce(D, &mut Lifecycle) -> Result<T, BoxError> + Send + 'static,
    {
        let construct: Construct = Box::new(
            move |instances: &Instances, node: &NodeKey, lifecycle: &mut Lifecycle| {
                let deps = D::fetch(instances, node)?;
                let value = ctor(deps, lifecycle).map_err(|source| KernelError::Constructor {
                    component: node.to_string(),
                    source,
                })?;
                Ok(Box::new(Arc::new(value)) as Slot)
            },
        );

        let key = TypeKey::of::<T>();
        let mut state = self.lock_open()?;
        let registry = &mut state.registry;
        if registry.provides(&key) {
            return Err(KernelError::RegistrationConflict {
                type_name: key.to_string(),
            });
        }

        let seq = registry.next_seq();
        registry.components.insert(
            key,
            ComponentSpec {
                requirements: D::requirements(),
                construct,
                seq,
            },
        );
        registry.roots.push(NodeKey::Type(key));
        tracing::debug!(component = %key, "Registered component");
        Ok(())
    }

    /// Register an already-built value as a leaf component.
    pub fn supply<T: Send + Sync + 'static>(&self, value: T) -> Result<(), KernelError> {
        self.provide::<T, (), _>(move |(), _| Ok(value))
    }

    /// Append a member to group `G`. Members are delivered in the order they
    /// are registered, duplicates included.
    pub fn register_group_member<G, D, F>(&self, ctor: F) -> Result<(), KernelError>
    where
        G: GroupKey,
        D: Dependencies,
        F: FnOnce(D, &mut Lifecycle) -> Result<Arc<G::Member>, BoxError> + Send + 'static,
    {
        let construct: Construct = Box::new(
            move |instances: &Instances, node: &NodeKey, lifecycle: &mut Lifecycle| {
                let deps = D::fetch(instances, node)?;
                let member = ctor(deps, lifecycle).map_err(|source| KernelError::Constructor {
                    component: node.to_string(),
                    source,
                })?;
                Ok(Box::new(member) as Slot)
            },
        );

        let member_type = TypeKey::of::<G::Member>();
        let mut state = self.lock_open()?;
        let registry = &mut state.registry;
        let seq = registry.next_seq();
        let member = MemberSpec {
            requirements: D::requirements(),
            construct: Some(construct),
            seq,
        };

        match registry.groups.entry(G::NAME) {
            Entry::Occupied(mut entry) => {
                if entry.get().member != member_type {
                    return Err(KernelError::RegistrationConflict {
                        type_name: format!(
                            "group {:?} (holds {}, not {})",
                            G::NAME,
                            entry.get().member,
                            member_type
                        ),
                    });
                }
                entry.get_mut().members.push(member);
            }
            Entry::Vacant(entry) => {
                entry.insert(GroupSpec {
                    member: member_type,
                    members: vec![member],
                    collect: group::collect::<G::Member>,
                    seq,
                });
                registry.roots.push(NodeKey::Group(G::NAME));
            }
        }
        tracing::debug!(group = G::NAME, member = %member_type, "Registered group member");
        Ok(())
    }

    /// Declare that the singleton `C` satisfies contract `I` for dependents
    /// requesting `Arc<I>`.
    ///
    /// `C` must already be registered. The same instance is shared; no second
    /// value is constructed.
    pub fn bind<I, C>(&self) -> Result<(), KernelError>
    where
        I: ?Sized + Upcast<C>,
        C: Send + Sync + 'static,
    {
        let interface = TypeKey::of::<I>();
        let concrete = TypeKey::of::<C>();
        let mut state = self.lock_open()?;
        let registry = &mut state.registry;

        if !registry.components.contains_key(&concrete) {
            return Err(KernelError::UnresolvedDependency {
                requester: interface.to_string(),
                missing: concrete.to_string(),
            });
        }
        if registry.components.contains_key(&interface) {
            return Err(KernelError::RegistrationConflict {
                type_name: interface.to_string(),
            });
        }

        let seq = registry.next_seq();
        let bindings = registry.bindings.entry(interface).or_default();
        bindings.push(BindingSpec::new::<I, C>(seq));
        if bindings.len() == 1 {
            registry.roots.push(NodeKey::Type(interface));
        }
        tracing::debug!(interface = %interface, concrete = %concrete, "Registered binding");
        Ok(())
    }

    /// Run a registration function under a named tracing span.
    pub fn module<F>(&self, name: &str, register: F) -> Result<(), KernelError>
    where
        F: FnOnce(&AppBuilder) -> Result<(), KernelError>,
    {
        let span = tracing::debug_span!("module", name = %name);
        let _entered = span.enter();
        register(self)
    }

    /// Seal the registry, build the graph and construct every component.
    ///
    /// Registration calls made after this return
    /// [`KernelError::RegistrationClosed`].
    pub fn resolve(&self) -> Result<App, KernelError> {
        let registry = {
            let mut state = self.lock_open()?;
            state.state = LifecycleState::Resolving;
            std::mem::take(&mut state.registry)
        };

        let result = App::build(registry, self.lifecycle.clone());
        self.lock().state = match &result {
            Ok(_) => LifecycleState::Resolved,
            Err(e) => {
                tracing::error!(error = %e, "Resolution failed");
                LifecycleState::Failed
            }
        };
        result
    }

    /// Resolve, start, wait for termination, stop.
    pub async fn run(&self) -> Result<(), KernelError> {
        self.resolve()?.run().await
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Speaker: Send + Sync {}
    crate::contract!(Speaker);

    struct Loud;
    impl Speaker for Loud {}

    struct Names;
    impl GroupKey for Names {
        const NAME: &'static str = "names";
        type Member = str;
    }

    struct Numbers;
    impl GroupKey for Numbers {
        const NAME: &'static str = "names";
        type Member = u32;
    }

    #[test]
    fn duplicate_component_conflicts() {
        let app = AppBuilder::new();
        app.supply(Loud).unwrap();
        let err = app.supply(Loud).unwrap_err();
        assert!(matches!(err, KernelError::RegistrationConflict { .. }));
    }

    #[test]
    fn shutdown_is_built_in() {
        let app = AppBuilder::new();
        let err = app.supply(Shutdown::new()).unwrap_err();
        assert!(matches!(err, KernelError::RegistrationConflict { .. }));
    }

    #[test]
    fn binding_requires_registered_concrete() {
        let app = AppBuilder::new();
        let err = app.bind::<dyn Speaker, Loud>().unwrap_err();
        match err {
            KernelError::UnresolvedDependency { requester, missing } => {
                assert!(requester.contains("Speaker"));
                assert!(missing.ends_with("Loud"));
            }
            other => panic!("unexpected error: {other}"),
        }

        app.supply(Loud).unwrap();
        app.bind::<dyn Speaker, Loud>().unwrap();
    }

    #[test]
    fn group_name_is_tied_to_one_member_type() {
        let app = AppBuilder::new();
        app.register_group_member::<Names, (), _>(|(), _| Ok(Arc::from("a"))).unwrap();
        let err = app
            .register_group_member::<Numbers, (), _>(|(), _| Ok(Arc::new(1u32)))
            .unwrap_err();
        assert!(matches!(err, KernelError::RegistrationConflict { .. }));
    }

    #[test]
    fn plain_and_group_registrations_coexist() {
        struct Widgets;
        impl GroupKey for Widgets {
            const NAME: &'static str = "widgets";
            type Member = Loud;
        }

        let app = AppBuilder::new();
        app.supply(Loud).unwrap();
        app.register_group_member::<Widgets, (), _>(|(), _| Ok(Arc::new(Loud)))
            .unwrap();
    }

    #[test]
    fn registration_closes_on_resolve() {
        let app = AppBuilder::new();
        assert_eq!(app.state(), LifecycleState::Registered);
        app.resolve().unwrap();
        assert_eq!(app.state(), LifecycleState::Resolved);

        assert!(matches!(app.supply(Loud), Err(KernelError::RegistrationClosed)));
        assert!(matches!(app.resolve(), Err(KernelError::RegistrationClosed)));
    }
}
