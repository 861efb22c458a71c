//! Remote Object References
//!
//! A [`Binder`] is a reference to an object that may live in another process.
//! Clones share one node; two binders are equal iff they share a node, no
//! matter what the node carries.
//!
//! [`Strong<I>`] pairs a binder with the typed interface it was created for,
//! and [`Binder::cast`] recovers that pairing after a reference has crossed a
//! parcel.
//!
//! # Release Notifications
//!
//! A node may carry a release listener. When the last reference to the node is
//! dropped the listener is queued on the dropping thread's IPC command queue
//! (see [`crate::ipc`]); it runs on the next flush, not at drop time.

use std::any::{type_name, Any};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ParcelError, StatusError};
use crate::ipc::{self, PendingCommand};

type ReleaseListener = Box<dyn FnOnce() -> Result<(), StatusError> + Send>;

/// Process-unique id of a binder node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BinderId(u64);

impl BinderId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BinderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binder-{}", self.0)
    }
}

struct Node {
    id: BinderId,
    descriptor: String,
    local: Option<Box<dyn Any + Send + Sync>>,
    on_release: Mutex<Option<ReleaseListener>>,
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Some(listener) = self.on_release.get_mut().take() {
            let label = format!("release {} ({})", self.id, self.descriptor);
            ipc::queue_command(PendingCommand::new(label, listener));
        }
    }
}

/// Reference to a (possibly remote) object
#[derive(Clone)]
pub struct Binder {
    node: Arc<Node>,
}

impl Binder {
    /// Create an opaque identity token
    #[must_use]
    pub fn token(descriptor: impl Into<String>) -> Self {
        Self::from_parts(descriptor.into(), None)
    }

    fn from_parts(descriptor: String, local: Option<Box<dyn Any + Send + Sync>>) -> Self {
        Self {
            node: Arc::new(Node {
                id: BinderId::next(),
                descriptor,
                local,
                on_release: Mutex::new(None),
            }),
        }
    }

    /// Node id, stable across clones
    #[must_use]
    pub fn id(&self) -> BinderId {
        self.node.id
    }

    /// Interface descriptor the node was created with
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.node.descriptor
    }

    /// Whether both references point at the same node
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.node, &b.node)
    }

    /// Number of live references to the node
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.node)
    }

    /// Install the listener queued when the last reference drops
    ///
    /// Replaces any listener installed earlier.
    pub fn on_last_release<F>(&self, listener: F)
    where
        F: FnOnce() -> Result<(), StatusError> + Send + 'static,
    {
        *self.node.on_release.lock() = Some(Box::new(listener));
    }

    /// Recover the typed interface this node was created for
    ///
    /// # Errors
    ///
    /// Returns `ParcelError::BadType` if the node is a bare token or was
    /// created for a different interface.
    pub fn cast<I>(&self) -> Result<Strong<I>, ParcelError>
    where
        I: ?Sized + Send + Sync + 'static,
    {
        let interface = self
            .node
            .local
            .as_ref()
            .and_then(|local| local.downcast_ref::<Arc<I>>())
            .cloned()
            .ok_or_else(|| ParcelError::BadType {
                expected: type_name::<I>().to_string(),
                found: self.node.descriptor.clone(),
            })?;

        Ok(Strong {
            binder: self.clone(),
            interface,
        })
    }
}

impl PartialEq for Binder {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl Eq for Binder {}

impl Hash for Binder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.id.hash(state);
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("id", &self.node.id)
            .field("descriptor", &self.node.descriptor)
            .finish()
    }
}

/// Typed interface together with the binder that identifies it on the wire
pub struct Strong<I: ?Sized> {
    binder: Binder,
    interface: Arc<I>,
}

impl<I> Strong<I>
where
    I: ?Sized + Send + Sync + 'static,
{
    /// Publish `interface` under a fresh binder node
    #[must_use]
    pub fn new(descriptor: impl Into<String>, interface: Arc<I>) -> Self {
        let local: Box<dyn Any + Send + Sync> = Box::new(Arc::clone(&interface));
        Self {
            binder: Binder::from_parts(descriptor.into(), Some(local)),
            interface,
        }
    }
}

impl<I: ?Sized> Strong<I> {
    /// Binder identifying this interface
    #[must_use]
    pub fn as_binder(&self) -> &Binder {
        &self.binder
    }

    /// Shared pointer to the interface itself
    #[must_use]
    pub fn interface(&self) -> &Arc<I> {
        &self.interface
    }
}

impl<I: ?Sized> Clone for Strong<I> {
    fn clone(&self) -> Self {
        Self {
            binder: self.binder.clone(),
            interface: Arc::clone(&self.interface),
        }
    }
}

impl<I: ?Sized> Deref for Strong<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.interface
    }
}

impl<I: ?Sized> PartialEq for Strong<I> {
    fn eq(&self, other: &Self) -> bool {
        self.binder == other.binder
    }
}

impl<I: ?Sized> fmt::Debug for Strong<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Strong").field(&self.binder).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct Hello;

    impl Greeter for Hello {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    trait Other: Send + Sync {}

    #[test]
    fn test_clones_share_identity() {
        let a = Binder::token("test.Token");
        let b = a.clone();
        let c = Binder::token("test.Token");

        assert!(Binder::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_cast_recovers_interface() {
        let greeter: Arc<dyn Greeter> = Arc::new(Hello);
        let strong = Strong::new("test.IGreeter", greeter);
        let binder = strong.as_binder().clone();

        let cast = binder.cast::<dyn Greeter>().unwrap();
        assert_eq!(cast.greet(), "hello");
        assert_eq!(cast, strong);
        assert!(Arc::ptr_eq(cast.interface(), strong.interface()));
    }

    #[test]
    fn test_cast_to_wrong_interface_fails() {
        let greeter: Arc<dyn Greeter> = Arc::new(Hello);
        let strong = Strong::new("test.IGreeter", greeter);

        let err = strong.as_binder().cast::<dyn Other>().unwrap_err();
        assert!(matches!(
            err,
            ParcelError::BadType { ref found, .. } if found == "test.IGreeter"
        ));

        let token = Binder::token("test.Token");
        assert!(token.cast::<dyn Greeter>().is_err());
    }

    #[test]
    fn test_last_release_is_queued_not_sent() {
        let released = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&released);

        let a = Binder::token("test.Token");
        a.on_last_release(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });
        let b = a.clone();

        drop(a);
        assert_eq!(ipc::pending_commands(), 0);

        drop(b);
        assert_eq!(ipc::pending_commands(), 1);
        assert!(!released.load(Ordering::SeqCst));

        assert_eq!(ipc::flush_commands(), 1);
        assert!(released.load(Ordering::SeqCst));
    }
}
