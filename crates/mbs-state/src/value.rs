//! Type-erased, stage-tagged values: discrete variables and cache entries.
//!
//! # Design
//!
//! The store never knows what a discrete variable or cache entry *means*.
//! Each value of type `T` is wrapped in a [`Value<T>`] and stored behind a
//! `Box<dyn AbstractValue>` in a per-subsystem arena indexed by small
//! integers.  Typed access downcasts back to `Value<T>`; asking for the wrong
//! `T` is reported as [`StageError::ValueTypeMismatch`].
//!
//! Cache entries sit behind a `RefCell` so they can be filled through a
//! shared `&State` while a subsystem realizes a stage.

use std::any::{Any, type_name};
use std::cell::{Ref, RefCell, RefMut};

use mbs_core::{Stage, StageError, StageResult};

// ── Trait object ──────────────────────────────────────────────────────────────

/// Type-erased interface for a stored value.
///
/// The trait is sealed (only implementable inside this crate) via the private
/// `Sealed` supertrait; [`Value<T>`] is the only implementation.
pub trait AbstractValue: Send + 'static + sealed::Sealed {
    /// `std::any::type_name` of the wrapped `T`, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Deep copy, used when a whole `State` is copied.
    fn clone_box(&self) -> Box<dyn AbstractValue>;

    #[doc(hidden)]
    fn as_any(&self) -> &dyn Any;

    #[doc(hidden)]
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

mod sealed {
    pub trait Sealed {}
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// A `T` wrapped so it can be stored as `Box<dyn AbstractValue>`.
#[derive(Clone, Debug, PartialEq)]
pub struct Value<T: Clone + Send + 'static>(pub T);

impl<T: Clone + Send + 'static> sealed::Sealed for Value<T> {}

impl<T: Clone + Send + 'static> AbstractValue for Value<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn clone_box(&self) -> Box<dyn AbstractValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn mismatch<T>(what: &'static str, actual: &'static str) -> StageError {
    StageError::ValueTypeMismatch {
        what,
        expected: type_name::<T>(),
        actual,
    }
}

fn downcast_ref<'a, T: Clone + Send + 'static>(
    what:  &'static str,
    value: &'a dyn AbstractValue,
) -> StageResult<&'a T> {
    value
        .as_any()
        .downcast_ref::<Value<T>>()
        .map(|v| &v.0)
        .ok_or_else(|| mismatch::<T>(what, value.type_name()))
}

fn downcast_mut<'a, T: Clone + Send + 'static>(
    what:  &'static str,
    value: &'a mut dyn AbstractValue,
) -> StageResult<&'a mut T> {
    let actual = value.type_name();
    value
        .as_any_mut()
        .downcast_mut::<Value<T>>()
        .map(|v| &mut v.0)
        .ok_or_else(|| mismatch::<T>(what, actual))
}

// ── DiscreteVariable ──────────────────────────────────────────────────────────

/// An owned, stage-tagged state value outside the continuous Y vector.
pub(crate) struct DiscreteVariable {
    stage: Stage,
    value: Box<dyn AbstractValue>,
}

impl DiscreteVariable {
    pub(crate) fn new<T: Clone + Send + 'static>(stage: Stage, value: T) -> Self {
        Self {
            stage,
            value: Box::new(Value(value)),
        }
    }

    #[inline]
    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn get<T: Clone + Send + 'static>(&self) -> StageResult<&T> {
        downcast_ref::<T>("discrete variable", self.value.as_ref())
    }

    pub(crate) fn get_mut<T: Clone + Send + 'static>(&mut self) -> StageResult<&mut T> {
        downcast_mut::<T>("discrete variable", self.value.as_mut())
    }

    /// `true` if the stored value is a `T`.  Checked before invalidating so
    /// a failed typed update leaves the stages untouched.
    pub(crate) fn holds<T: Clone + Send + 'static>(&self) -> bool {
        self.value.as_any().is::<Value<T>>()
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.value.type_name()
    }
}

impl Clone for DiscreteVariable {
    fn clone(&self) -> Self {
        Self {
            stage: self.stage,
            value: self.value.clone_box(),
        }
    }
}

// ── CacheEntry ────────────────────────────────────────────────────────────────

/// An owned, stage-tagged derived value, writable through `&self`.
///
/// The value given at allocation is kept so a copy of the `State` can start
/// from it instead of from whatever was last computed.
pub(crate) struct CacheEntry {
    stage:   Stage,
    initial: Box<dyn AbstractValue>,
    value:   RefCell<Box<dyn AbstractValue>>,
}

impl CacheEntry {
    pub(crate) fn new<T: Clone + Send + 'static>(stage: Stage, value: T) -> Self {
        let initial: Box<dyn AbstractValue> = Box::new(Value(value));
        Self {
            stage,
            value: RefCell::new(initial.clone_box()),
            initial,
        }
    }

    #[inline]
    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn borrow<T: Clone + Send + 'static>(&self) -> StageResult<Ref<'_, T>> {
        let guard = self
            .value
            .try_borrow()
            .map_err(|_| StageError::CacheBorrowed { what: "cache entry" })?;
        let actual = guard.type_name();
        Ref::filter_map(guard, |b| b.as_any().downcast_ref::<Value<T>>().map(|v| &v.0))
            .map_err(|_| mismatch::<T>("cache entry", actual))
    }

    pub(crate) fn borrow_mut<T: Clone + Send + 'static>(&self) -> StageResult<RefMut<'_, T>> {
        let guard = self
            .value
            .try_borrow_mut()
            .map_err(|_| StageError::CacheBorrowed { what: "cache entry" })?;
        let actual = guard.type_name();
        RefMut::filter_map(guard, |b| {
            b.as_any_mut().downcast_mut::<Value<T>>().map(|v| &mut v.0)
        })
        .map_err(|_| mismatch::<T>("cache entry", actual))
    }

    /// A new entry holding the allocation-time value; the current contents
    /// are not carried over.
    pub(crate) fn fresh(&self) -> Self {
        Self {
            stage:   self.stage,
            initial: self.initial.clone_box(),
            value:   RefCell::new(self.initial.clone_box()),
        }
    }
}
