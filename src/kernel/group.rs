//! Named, ordered collections of contributions.
//!
//! # Responsibilities
//! - Name a group and fix its member type at the type level ([`GroupKey`])
//! - Deliver every member, in registration order, as one [`Group`] value
//!
//! # Design Decisions
//! - Members are never deduplicated; two registrations yield two entries
//! - A group nobody contributed to is delivered empty, not reported missing
//! - Group dependencies skip the binder entirely

use std::any::Any;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::kernel::inject::Slot;

/// Marker type naming a group and its member type.
///
/// ```
/// use service_kernel::kernel::GroupKey;
///
/// trait Route: Send + Sync {}
///
/// struct Routes;
/// impl GroupKey for Routes {
///     const NAME: &'static str = "http.routes";
///     type Member = dyn Route;
/// }
/// ```
pub trait GroupKey: 'static {
    const NAME: &'static str;
    type Member: ?Sized + Send + Sync + 'static;
}

/// The aggregated members of group `G`.
pub struct Group<G: GroupKey> {
    members: Vec<Arc<G::Member>>,
}

impl<G: GroupKey> Group<G> {
    pub(crate) fn new(members: Vec<Arc<G::Member>>) -> Self {
        Self { members }
    }

    pub(crate) fn empty() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        G::NAME
    }

    pub fn into_vec(self) -> Vec<Arc<G::Member>> {
        self.members
    }
}

impl<G: GroupKey> Clone for Group<G> {
    fn clone(&self) -> Self {
        Self {
            members: self.members.clone(),
        }
    }
}

impl<G: GroupKey> Deref for Group<G> {
    type Target = [Arc<G::Member>];

    fn deref(&self) -> &Self::Target {
        &self.members
    }
}

impl<G: GroupKey> fmt::Debug for Group<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &G::NAME)
            .field("len", &self.members.len())
            .finish()
    }
}

/// Assembles the member slots of a group into its delivered `Vec<Arc<M>>`.
///
/// Stored as a function pointer at first registration so the graph can collect
/// a group without knowing `M`.
pub(crate) type Collector = fn(&[&(dyn Any + Send + Sync)]) -> Option<Slot>;

pub(crate) fn collect<M: ?Sized + Send + Sync + 'static>(
    members: &[&(dyn Any + Send + Sync)],
) -> Option<Slot> {
    let mut collected: Vec<Arc<M>> = Vec::with_capacity(members.len());
    for member in members {
        collected.push(member.downcast_ref::<Arc<M>>()?.clone());
    }
    Some(Box::new(collected))
}
