//! Lightweight handle types for shared ownership and weak parent references.
//!
//! Provide two complementary handle types:
//! - [Handle<T>] owns a strong reference to an object using [alloc::sync::Arc]. Cloning a
//!   handle acquires a reference and dropping it releases one, so every exit path of a caller
//!   (error paths included) gives back what it took.
//! - [HandleRef<T>] stores a weak reference ([alloc::sync::Weak]) and is suitable for parent
//!   pointers or other non-owning references that must not keep the target alive.
//!
//! Key guarantees and semantics:
//! - Call [Handle::create_ref] to derive a [HandleRef] from an existing strong [Handle].
//! - Call [HandleRef::get_handle] to attempt an upgrade; it returns [None] if the strong owner(s)
//!   have dropped the object. **Consumers must handle the [None] case explicitly.**
//! - [Handle::strong_count] reports the number of live strong references, which lets tests
//!   detect a reference that was acquired and never released.
use alloc::sync::{Arc, Weak};
use core::{fmt, ops::Deref, ptr};

/// Strong owning handle backed by [Arc<T>].
///
/// The inner value is reference-counted; cloning the handle increments the count.
/// Use [Handle<T>::create_ref] to produce a weak [HandleRef<T>] suitable for parent pointers.
pub struct Handle<T: ?Sized> {
    inner: Arc<T>,
}

impl<T: ?Sized> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> From<T> for Handle<T> {
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl<T: ?Sized> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl<T: ?Sized> Handle<T> {
    /// Create a non-owning [HandleRef<T>] that refers to the same underlying object.
    ///
    /// The returned [HandleRef<T>] does not increment the strong reference count and
    /// must be upgraded with [HandleRef::get_handle] before use.
    pub fn create_ref(&self) -> HandleRef<T> {
        HandleRef {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles point to the same object.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Arc::ptr_eq(&this.inner, &other.inner)
    }

    /// Whether this handle points to `target`.
    pub fn is(&self, target: &T) -> bool {
        ptr::addr_eq(Arc::as_ptr(&self.inner), target as *const T)
    }

    /// Number of strong references currently alive, this one included.
    pub fn strong_count(this: &Self) -> usize {
        Arc::strong_count(&this.inner)
    }
}

/// Weak (non-owning) handle backed by [Weak<T>].
///
/// A [HandleRef<T>] represents an optional reference to an object which may be destroyed
/// independently of the referrers. Use [HandleRef<T>::get_handle] to attempt to obtain a strong [Handle<T>].
pub struct HandleRef<T: ?Sized> {
    inner: Weak<T>,
}

impl<T: ?Sized> Clone for HandleRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for HandleRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(HandleRef)")
    }
}

impl<T: ?Sized> HandleRef<T> {
    /// Attempt to upgrade the weak reference into a strong [Handle<T>].
    ///
    /// Return `Some(Handle<T>)` if the target is still alive, otherwise return `None`.
    pub fn get_handle(&self) -> Option<Handle<T>> {
        Weak::upgrade(&self.inner).map(|inner| Handle { inner })
    }

    /// Whether this reference points to `target`, without upgrading it.
    pub fn is(&self, target: &T) -> bool {
        ptr::addr_eq(Weak::as_ptr(&self.inner), target as *const T)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_and_drop_balance_the_count() {
        let handle = Handle::from(7u32);
        assert_eq!(Handle::strong_count(&handle), 1);
        let other = handle.clone();
        assert_eq!(Handle::strong_count(&handle), 2);
        assert!(Handle::ptr_eq(&handle, &other));
        drop(other);
        assert_eq!(Handle::strong_count(&handle), 1);
    }

    #[test]
    fn weak_ref_does_not_keep_target_alive() {
        let handle = Handle::from(1u8);
        let weak = handle.create_ref();
        assert!(weak.is(&handle));
        assert_eq!(Handle::strong_count(&handle), 1);
        assert!(weak.get_handle().is_some());
        drop(handle);
        assert!(weak.get_handle().is_none());
    }

    #[test]
    fn identity_is_by_address_not_value() {
        let a = Handle::from(5u64);
        let b = Handle::from(5u64);
        assert!(a.is(&a));
        assert!(!a.is(&b));
    }
}
