//! Typed identity for bindings.
//!
//! A [`Key`] names a value slot by its Rust type: two keys are equal exactly
//! when their types are equal, so `Holder<u32>` and `Holder<String>` occupy
//! distinct slots even though both render with the same generic base name.
//! [`TypedKey`] carries the type at compile time so registration, overrides,
//! and resolution stay type-checked end to end.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

/// Type-erased identity of a binding.
///
/// Equality and hashing use [`TypeId`]; the captured type name is carried for
/// diagnostics only.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    id: TypeId,
    name: &'static str,
}

impl Key {
    /// Key for the value type `T`.
    ///
    /// Trait objects work as keys too: `Key::of::<dyn Service>()` is distinct
    /// from the key of any concrete implementation.
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Human-readable type name, as used in diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Key").field(&self.name).finish()
    }
}

/// Compile-time typed handle for a [`Key`].
///
/// Obtained from [`key`]; pairs the erased key with its value type so that
/// [`Binder::bind`](crate::module::Binder::bind) and
/// [`Overrides::replace`](crate::overrides::Overrides::replace) can tie a
/// producer to the slot it fills.
pub struct TypedKey<T: ?Sized> {
    key: Key,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T> TypedKey<T>
where
    T: ?Sized + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            key: Key::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// Erased form of this key.
    pub fn erased(self) -> Key {
        self.key
    }
}

impl<T: ?Sized> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for TypedKey<T> {}

impl<T: ?Sized> fmt::Display for TypedKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

impl<T: ?Sized> fmt::Debug for TypedKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypedKey").field(&self.key.name).finish()
    }
}

/// Typed key for the value type `T`.
pub fn key<T>() -> TypedKey<T>
where
    T: ?Sized + 'static,
{
    TypedKey::new()
}
