//! Interface binding.
//!
//! # Responsibilities
//! - Let a concrete singleton satisfy an abstract contract (`dyn Trait`)
//! - Convert the stored `Arc<C>` into `Arc<dyn Trait>` without a second instance
//!
//! # Design Decisions
//! - The capability check is a trait bound: `bind::<dyn Logger, Console>()`
//!   only compiles when `Console: Logger`
//! - Exactly one binding per contract; extra bindings are rejected at resolve

use std::any::Any;
use std::sync::Arc;

use crate::kernel::inject::Slot;
use crate::kernel::types::TypeKey;

/// Conversion from a concrete singleton to the contract type `Self`.
///
/// Implement it for a contract with [`contract!`](crate::contract):
///
/// ```
/// use std::sync::Arc;
/// use service_kernel::contract;
///
/// pub trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
/// contract!(Clock);
/// ```
pub trait Upcast<C: Send + Sync + 'static>: Send + Sync + 'static {
    fn upcast(concrete: Arc<C>) -> Arc<Self>;
}

/// Derives [`Upcast`] for `dyn Trait` from every `T: Trait`.
///
/// The trait must have `Send + Sync` as supertraits.
#[macro_export]
macro_rules! contract {
    ($($contract:tt)+) => {
        impl<C> $crate::kernel::Upcast<C> for dyn $($contract)+
        where
            C: $($contract)+ + Send + Sync + 'static,
        {
            fn upcast(concrete: ::std::sync::Arc<C>) -> ::std::sync::Arc<Self> {
                concrete
            }
        }
    };
}

pub(crate) type Cast = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Option<Slot> + Send>;

/// A registered `interface -> concrete` binding.
pub(crate) struct BindingSpec {
    pub(crate) concrete: TypeKey,
    pub(crate) cast: Cast,
    pub(crate) seq: usize,
}

impl BindingSpec {
    pub(crate) fn new<I, C>(seq: usize) -> Self
    where
        I: ?Sized + Upcast<C>,
        C: Send + Sync + 'static,
    {
        Self {
            concrete: TypeKey::of::<C>(),
            cast: Box::new(|slot: &(dyn Any + Send + Sync)| {
                let concrete = slot.downcast_ref::<Arc<C>>()?;
                let contract: Arc<I> = I::upcast(concrete.clone());
                Some(Box::new(contract) as Slot)
            }),
            seq,
        }
    }
}
