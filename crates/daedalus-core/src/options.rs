//! Typed option context and functional options.
//!
//! The [`OptionContext`] is a heterogeneous map keyed by value type: it holds
//! at most one value per type, so two options can never collide on a string
//! key. Functional options ([`Opt`]) are shareable `OptionContext ->
//! OptionContext` transformations that builders thread through a fresh
//! context at the start of a build pass.
//!
//! # Example
//!
//! ```
//! use daedalus_core::options::{self, apply, configure, cond, group};
//!
//! #[derive(Debug, Clone, Default, PartialEq)]
//! struct ServerOptions {
//!     name: String,
//!     port: u16,
//! }
//!
//! let opts = vec![
//!     configure(|o: &mut ServerOptions| o.name = "greeter".to_string()),
//!     cond(false, configure(|o: &mut ServerOptions| o.port = 1)),
//!     group([configure(|o: &mut ServerOptions| o.port = 9000)]),
//! ];
//!
//! let (_ctx, cfg) = apply(ServerOptions::default(), &opts);
//! assert_eq!(cfg, ServerOptions { name: "greeter".to_string(), port: 9000 });
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A type-keyed value carrier.
///
/// Values are stored behind `Arc`, so cloning a context is cheap and clones
/// share the stored values. A context is built and consumed within a single
/// build pass and is not meant for concurrent mutation.
#[derive(Clone, Default)]
pub struct OptionContext {
    values: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl OptionContext {
    /// Creates an empty context.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the context with `value` stored in the slot for `T`.
    ///
    /// Any previous value of the same type is replaced.
    #[must_use]
    pub fn with_value<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.set(value);
        self
    }

    /// Stores `value` in the slot for `T`.
    pub fn set<T: Send + Sync + 'static>(&mut self, value: T) {
        self.values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Returns the value stored for `T`, if any.
    #[must_use]
    pub fn value<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns a copy of the value stored for `T`, or `T::default()` when the
    /// slot is empty.
    #[must_use]
    pub fn value_or_default<T: Clone + Default + Send + Sync + 'static>(&self) -> T {
        self.value::<T>().cloned().unwrap_or_default()
    }

    /// Checks whether a value of type `T` is present.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Updates the value for `T` in place, starting from `T::default()` when
    /// the slot is empty.
    #[must_use]
    pub fn update<T, F>(mut self, f: F) -> Self
    where
        T: Clone + Default + Send + Sync + 'static,
        F: FnOnce(&mut T),
    {
        let mut value = self.value_or_default::<T>();
        f(&mut value);
        self.set(value);
        self
    }

    /// Copies every value of `other` into this context.
    ///
    /// Values present in both contexts take the value from `other`.
    #[must_use]
    pub fn merge(mut self, other: &OptionContext) -> Self {
        for (key, value) in &other.values {
            self.values.insert(*key, Arc::clone(value));
        }
        self
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for OptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionContext")
            .field("value_count", &self.values.len())
            .finish()
    }
}

/// A functional option.
///
/// Options are reference counted so the same option list can be applied to
/// several build passes (for example the client and server side of a
/// service).
pub type Opt = Arc<dyn Fn(OptionContext) -> OptionContext + Send + Sync>;

/// Wraps a closure as an [`Opt`].
pub fn option<F>(f: F) -> Opt
where
    F: Fn(OptionContext) -> OptionContext + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Option storing `value` in the slot for its type.
pub fn with_value<T: Clone + Send + Sync + 'static>(value: T) -> Opt {
    option(move |ctx| ctx.with_value(value.clone()))
}

/// Option copying every value of `source` into the context being built.
pub fn with_context(source: OptionContext) -> Opt {
    option(move |ctx| ctx.merge(&source))
}

/// Option updating the configuration struct `T` in place.
///
/// This is how options mutate the structured configuration seeded by
/// [`apply`].
pub fn configure<T, F>(f: F) -> Opt
where
    T: Clone + Default + Send + Sync + 'static,
    F: Fn(&mut T) + Send + Sync + 'static,
{
    option(move |ctx| ctx.update::<T, _>(|cfg| f(cfg)))
}

/// Applies `opt` only when `enabled` is true.
pub fn cond(enabled: bool, opt: Opt) -> Opt {
    if enabled {
        opt
    } else {
        option(|ctx| ctx)
    }
}

/// Combines options into one, applied left to right.
pub fn group(opts: impl IntoIterator<Item = Opt>) -> Opt {
    let opts: Vec<Opt> = opts.into_iter().collect();
    option(move |ctx| apply_to(ctx, &opts))
}

/// Threads `opts` through `ctx` in order.
#[must_use]
pub fn apply_to(ctx: OptionContext, opts: &[Opt]) -> OptionContext {
    opts.iter().fold(ctx, |ctx, opt| opt(ctx))
}

/// Seeds an empty context with `cfg`, applies `opts`, and returns the
/// resulting context together with the configuration read back from its
/// slot.
///
/// If an option replaces the configuration slot, the replacement is
/// returned.
pub fn apply<T>(cfg: T, opts: &[Opt]) -> (OptionContext, T)
where
    T: Clone + Default + Send + Sync + 'static,
{
    let ctx = apply_to(OptionContext::empty().with_value(cfg), opts);
    let cfg = ctx.value_or_default::<T>();
    (ctx, cfg)
}

/// Builds a `T` from its default value and `opts`.
pub fn new_t<T>(opts: &[Opt]) -> T
where
    T: Clone + Default + Send + Sync + 'static,
{
    apply(T::default(), opts).1
}
