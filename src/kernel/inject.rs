//! Typed dependency declaration and retrieval.
//!
//! A constructor names its dependencies through the tuple it accepts. Each
//! element implements [`Dependency`], which reports what it needs before the
//! graph is built and fetches it from [`Instances`] once its providers exist.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::kernel::error::KernelError;
use crate::kernel::group::{Group, GroupKey};
use crate::kernel::types::{NodeKey, TypeKey};

pub(crate) type Slot = Box<dyn Any + Send + Sync>;

/// What a dependency points at in the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// A singleton component or a bound contract.
    Type(TypeKey),
    /// A named group with a fixed member type.
    Group { name: &'static str, member: TypeKey },
}

/// A declared dependency of a constructor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requirement {
    pub target: Target,
    /// Optional requirements may be left without a provider.
    pub optional: bool,
}

/// Built instances, keyed by graph node.
///
/// Type nodes hold an `Arc<T>`, group nodes a `Vec<Arc<Member>>`.
#[derive(Default)]
pub struct Instances {
    slots: HashMap<NodeKey, Slot>,
}

impl Instances {
    pub(crate) fn insert(&mut self, key: NodeKey, slot: Slot) {
        self.slots.insert(key, slot);
    }

    pub(crate) fn slot(&self, key: &NodeKey) -> Option<&(dyn Any + Send + Sync)> {
        self.slots.get(key).map(|slot| slot.as_ref())
    }

    /// The singleton provided for `T`, directly or through a binding.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.slot(&NodeKey::Type(TypeKey::of::<T>()))?
            .downcast_ref::<Arc<T>>()
            .cloned()
    }

    /// Members of group `G` in registration order. `None` if a different
    /// member type was registered under the same name.
    pub fn group<G: GroupKey>(&self) -> Option<Group<G>> {
        match self.slot(&NodeKey::Group(G::NAME)) {
            None => Some(Group::empty()),
            Some(slot) => slot
                .downcast_ref::<Vec<Arc<G::Member>>>()
                .map(|members| Group::new(members.clone())),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A single injectable handle.
pub trait Dependency: Sized + Send + 'static {
    fn requirement() -> Requirement;

    fn fetch(instances: &Instances, requester: &NodeKey) -> Result<Self, KernelError>;
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Arc<T> {
    fn requirement() -> Requirement {
        Requirement {
            target: Target::Type(TypeKey::of::<T>()),
            optional: false,
        }
    }

    fn fetch(instances: &Instances, requester: &NodeKey) -> Result<Self, KernelError> {
        instances
            .get::<T>()
            .ok_or_else(|| KernelError::UnresolvedDependency {
                requester: requester.to_string(),
                missing: TypeKey::of::<T>().to_string(),
            })
    }
}

impl<T: ?Sized + Send + Sync + 'static> Dependency for Option<Arc<T>> {
    fn requirement() -> Requirement {
        Requirement {
            optional: true,
            ..<Arc<T> as Dependency>::requirement()
        }
    }

    fn fetch(instances: &Instances, _requester: &NodeKey) -> Result<Self, KernelError> {
        Ok(instances.get::<T>())
    }
}

impl<G: GroupKey> Dependency for Group<G> {
    fn requirement() -> Requirement {
        Requirement {
            target: Target::Group {
                name: G::NAME,
                member: TypeKey::of::<G::Member>(),
            },
            optional: true,
        }
    }

    fn fetch(instances: &Instances, requester: &NodeKey) -> Result<Self, KernelError> {
        instances.group::<G>().ok_or_else(|| KernelError::GroupMismatch {
            requester: requester.to_string(),
            group: G::NAME.to_string(),
            expected: TypeKey::of::<G::Member>().to_string(),
            found: "a different member type".to_string(),
        })
    }
}

/// The full dependency list of a constructor: `()` or a tuple of
/// [`Dependency`] handles.
pub trait Dependencies: Sized + Send + 'static {
    fn requirements() -> Vec<Requirement>;

    fn fetch(instances: &Instances, requester: &NodeKey) -> Result<Self, KernelError>;
}

impl Dependencies for () {
    fn requirements() -> Vec<Requirement> {
        Vec::new()
    }

    fn fetch(_instances: &Instances, _requester: &NodeKey) -> Result<Self, KernelError> {
        Ok(())
    }
}

macro_rules! impl_dependencies {
    ($($dep:ident),+) => {
        impl<$($dep: Dependency),+> Dependencies for ($($dep,)+) {
            fn requirements() -> Vec<Requirement> {
                vec![$($dep::requirement()),+]
            }

            fn fetch(instances: &Instances, requester: &NodeKey) -> Result<Self, KernelError> {
                Ok(($($dep::fetch(instances, requester)?,)+))
            }
        }
    };
}

impl_dependencies!(A);
impl_dependencies!(A, B);
impl_dependencies!(A, B, C);
impl_dependencies!(A, B, C, D);
impl_dependencies!(A, B, C, D, E);
impl_dependencies!(A, B, C, D, E, F);
impl_dependencies!(A, B, C, D, E, F, G);
impl_dependencies!(A, B, C, D, E, F, G, H);
impl_dependencies!(A, B, C, D, E, F, G, H, I);
impl_dependencies!(A, B, C, D, E, F, G, H, I, J);
