use core::any::Any;

// -----------------------------------------------------------------------------
// Value

/// The engine's dynamic value currency.
///
/// Every value flowing through a read or write operation is an owned,
/// type-erased box. Ownership transfers exactly once, from the producing
/// strategy to the consuming assignment; shared values are expressed by
/// boxing a shared handle such as `Rc<RefCell<T>>`, never by cloning the
/// box.
pub type Value = Box<dyn Any>;

/// Downcasts a borrowed engine value to a concrete type.
///
/// # Panics
///
/// Panics if the value does not hold a `T`. The engine only hands values
/// to hooks registered for their exact type, so a failure here is a
/// programming error in a strategy, not an input error.
#[inline]
pub(crate) fn cast_ref<T: Any>(value: &dyn Any) -> &T {
    value.downcast_ref::<T>().unwrap_or_else(|| {
        panic!(
            "engine value does not hold a `{}`",
            core::any::type_name::<T>()
        )
    })
}

/// Mutable counterpart of [`cast_ref`].
///
/// # Panics
///
/// Panics if the value does not hold a `T`.
#[inline]
pub(crate) fn cast_mut<T: Any>(value: &mut dyn Any) -> &mut T {
    value.downcast_mut::<T>().unwrap_or_else(|| {
        panic!(
            "engine value does not hold a `{}`",
            core::any::type_name::<T>()
        )
    })
}
