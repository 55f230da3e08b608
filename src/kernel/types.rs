//! Type identity for providers, bindings and groups.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a component or contract type.
///
/// Equality and hashing use the `TypeId` only; the name is kept for error
/// messages and logs.
#[derive(Clone, Copy, Debug)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`. Works for unsized contract types such as `dyn Logger`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A vertex of the dependency graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKey {
    /// A directly registered component, or a contract satisfied by a binding.
    Type(TypeKey),
    /// A named group, delivered as one ordered sequence.
    Group(&'static str),
    /// The `index`-th registered member of a group.
    Member { group: &'static str, index: usize },
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Type(key) => write!(f, "{}", key),
            NodeKey::Group(name) => write!(f, "group {:?}", name),
            NodeKey::Member { group, index } => write!(f, "{}[{}]", group, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Contract {}
    struct Concrete;

    #[test]
    fn keys_compare_by_type_id() {
        assert_eq!(TypeKey::of::<Concrete>(), TypeKey::of::<Concrete>());
        assert_ne!(TypeKey::of::<Concrete>(), TypeKey::of::<dyn Contract>());

        let set: HashSet<_> = [TypeKey::of::<u8>(), TypeKey::of::<u8>()].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn node_display() {
        assert_eq!(NodeKey::Group("http.handlers").to_string(), "group \"http.handlers\"");
        let member = NodeKey::Member { group: "http.handlers", index: 1 };
        assert_eq!(member.to_string(), "http.handlers[1]");
        assert!(NodeKey::Type(TypeKey::of::<Concrete>()).to_string().ends_with("Concrete"));
    }
}
