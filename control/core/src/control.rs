//! Surface Control - Handle to a Compositor-Owned Layer
//!
//! A [`SurfaceControl`] identifies a layer that lives in the compositor. It
//! does not own the layer's implementation; it holds the references needed to
//! name, configure and release it.
//!
//! # Identity
//!
//! Two handles denote the same layer iff their remote handles are the same
//! binder node ([`SurfaceControl::is_same_surface`]). Session, producer, layer
//! id and transform hint play no part in identity.
//!
//! # Thread Safety
//!
//! ```text
//!   SurfaceControl
//!   ├── client        immutable, lock-free
//!   ├── handle        immutable, lock-free
//!   ├── layer_id      immutable, lock-free
//!   └── state: Mutex
//!         ├── producer
//!         ├── transform_hint
//!         └── surface (lazy cache)
//! ```
//!
//! The lock is held only across check-and-create or check-and-read blocks and
//! is always released before calling out to a collaborator.
//!
//! # Destruction
//!
//! Dropping the last `Arc<SurfaceControl>` releases the references and then
//! flushes the thread's IPC command queue, so the compositor hears about the
//! release right away instead of on some later unrelated call.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::binder::{Binder, Strong};
use crate::composer::{FrameStats, SurfaceComposerClient};
use crate::error::{NotInitialized, StatusError};
use crate::ipc;
use crate::producer::{ConnectedApi, GraphicBufferProducer};
use crate::surface::Surface;

/// Mutable state guarded by the per-instance lock
struct State {
    producer: Option<Strong<dyn GraphicBufferProducer>>,
    transform_hint: u32,
    surface: Option<Arc<Surface>>,
}

/// Client-side handle to a compositor layer
pub struct SurfaceControl {
    client: Option<Arc<SurfaceComposerClient>>,
    handle: Option<Binder>,
    layer_id: i32,
    state: Mutex<State>,
}

impl SurfaceControl {
    /// Create a handle from its parts
    ///
    /// Nothing is validated here; a handle without a session or remote handle
    /// is constructible and only rejected when used.
    #[must_use]
    pub fn new(
        client: Option<Arc<SurfaceComposerClient>>,
        handle: Option<Binder>,
        producer: Option<Strong<dyn GraphicBufferProducer>>,
        layer_id: i32,
        transform_hint: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            handle,
            layer_id,
            state: Mutex::new(State {
                producer,
                transform_hint,
                surface: None,
            }),
        })
    }

    /// Create a handle sharing every reference with `other`
    ///
    /// The copy starts with an empty surface cache.
    #[must_use]
    pub fn copy_of(other: &Self) -> Arc<Self> {
        let (producer, transform_hint) = other.snapshot();
        Self::new(
            other.client.clone(),
            other.handle.clone(),
            producer,
            other.layer_id,
            transform_hint,
        )
    }

    /// Producer and transform hint taken under a single lock acquisition
    pub(crate) fn snapshot(&self) -> (Option<Strong<dyn GraphicBufferProducer>>, u32) {
        let state = self.state.lock();
        (state.producer.clone(), state.transform_hint)
    }

    // -------------------------------------------------------------------------
    // Identity & validation
    // -------------------------------------------------------------------------

    /// Both references a usable handle needs, or `NotInitialized`
    fn initialized(&self) -> Result<(&Arc<SurfaceComposerClient>, &Binder), NotInitialized> {
        match (&self.client, &self.handle) {
            (Some(client), Some(handle)) => Ok((client, handle)),
            (client, handle) => {
                error!(
                    layer_id = self.layer_id,
                    has_handle = handle.is_some(),
                    has_client = client.is_some(),
                    "Invalid surface control: missing handle or client"
                );
                Err(NotInitialized)
            }
        }
    }

    /// Check that the session and remote handle are both present
    pub fn validate(&self) -> Result<(), NotInitialized> {
        self.initialized().map(|_| ())
    }

    /// Whether [`SurfaceControl::validate`] would succeed, without logging
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.client.is_some() && self.handle.is_some()
    }

    /// Whether two handles denote the same remote layer
    ///
    /// Returns false if either side is absent. Otherwise compares the remote
    /// handles by node identity; two handles that both lack a remote handle
    /// compare equal.
    #[must_use]
    pub fn is_same_surface(lhs: Option<&Self>, rhs: Option<&Self>) -> bool {
        match (lhs, rhs) {
            (Some(lhs), Some(rhs)) => lhs.handle == rhs.handle,
            _ => false,
        }
    }

    /// Detach whichever API is connected to the producer
    ///
    /// A handle without a producer has nothing to detach.
    pub fn disconnect(&self) {
        let producer = self.state.lock().producer.clone();
        let Some(producer) = producer else {
            return;
        };

        if let Err(e) = producer.disconnect(ConnectedApi::CurrentlyConnected) {
            warn!(layer_id = self.layer_id, error = %e, "Producer disconnect failed");
        }
    }

    /// Reset the layer's frame statistics
    pub fn clear_layer_frame_stats(&self) -> Result<(), StatusError> {
        let (client, handle) = self.initialized()?;
        client.clear_layer_frame_stats(handle)
    }

    /// Fetch the layer's frame statistics
    pub fn get_layer_frame_stats(&self) -> Result<FrameStats, StatusError> {
        let (client, handle) = self.initialized()?;
        client.get_layer_frame_stats(handle)
    }

    // -------------------------------------------------------------------------
    // Lazy surface cache
    // -------------------------------------------------------------------------

    fn generate_surface_locked(&self, state: &mut State) -> Arc<Surface> {
        // Always consumed by the compositor, never rendered into by the
        // process holding this handle.
        let surface = Arc::new(Surface::new(state.producer.clone(), false));
        debug!(
            layer_id = self.layer_id,
            surface_id = %surface.id(),
            "Surface generated"
        );
        state.surface = Some(Arc::clone(&surface));
        surface
    }

    /// Cached surface, created on first use
    pub fn get_surface(&self) -> Arc<Surface> {
        let mut state = self.state.lock();
        if let Some(surface) = &state.surface {
            return Arc::clone(surface);
        }
        self.generate_surface_locked(&mut state)
    }

    /// Create a fresh surface and make it the cached one
    ///
    /// Holders of the previous surface keep it; only the cache slot changes.
    pub fn create_surface(&self) -> Arc<Surface> {
        let mut state = self.state.lock();
        self.generate_surface_locked(&mut state)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Layer id within the session
    #[must_use]
    pub fn layer_id(&self) -> i32 {
        self.layer_id
    }

    /// Session this handle was created through (or decoded into)
    #[must_use]
    pub fn client(&self) -> Option<Arc<SurfaceComposerClient>> {
        self.client.clone()
    }

    /// Remote identity of the layer
    #[must_use]
    pub fn handle(&self) -> Option<Binder> {
        self.handle.clone()
    }

    /// Producer endpoint of the layer's buffer queue
    #[must_use]
    pub fn graphic_buffer_producer(&self) -> Option<Strong<dyn GraphicBufferProducer>> {
        self.state.lock().producer.clone()
    }

    /// Current transform hint
    #[must_use]
    pub fn transform_hint(&self) -> u32 {
        self.state.lock().transform_hint
    }

    /// Replace the transform hint
    pub fn set_transform_hint(&self, hint: u32) {
        self.state.lock().transform_hint = hint;
    }
}

impl Drop for SurfaceControl {
    fn drop(&mut self) {
        self.client.take();
        self.handle.take();
        {
            let state = self.state.get_mut();
            state.producer.take();
            state.surface.take();
        }

        // The layer's resources are heavy; send the releases now.
        let sent = ipc::flush_commands();
        trace!(layer_id = self.layer_id, commands = sent, "Surface control released");
    }
}

impl fmt::Debug for SurfaceControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SurfaceControl")
            .field("layer_id", &self.layer_id)
            .field("handle", &self.handle)
            .field("valid", &self.is_valid())
            .field("has_producer", &state.producer.is_some())
            .field("transform_hint", &state.transform_hint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::{LayerRequest, LAYER_HANDLE_DESCRIPTOR};
    use crate::loopback::{LoopbackComposer, LoopbackProducer};
    use std::sync::Barrier;

    fn session() -> (Arc<LoopbackComposer>, Arc<SurfaceComposerClient>) {
        let (composer, client) = LoopbackComposer::spawn();
        (composer, Arc::new(SurfaceComposerClient::new(client)))
    }

    #[test]
    fn test_is_same_surface_rejects_absent() {
        let (_composer, client) = session();
        let sc = client
            .create_surface(&LayerRequest::container("root"))
            .unwrap();

        assert!(!SurfaceControl::is_same_surface(None, Some(&sc)));
        assert!(!SurfaceControl::is_same_surface(Some(&sc), None));
        assert!(!SurfaceControl::is_same_surface(None, None));
    }

    #[test]
    fn test_is_same_surface_follows_handle_only() {
        let (_composer, client) = session();
        let sc = client
            .create_surface(&LayerRequest::buffered("a", 64, 64))
            .unwrap();
        let copy = SurfaceControl::copy_of(&sc);
        let other = client
            .create_surface(&LayerRequest::buffered("b", 64, 64))
            .unwrap();

        assert!(SurfaceControl::is_same_surface(Some(&sc), Some(&sc)));
        assert!(SurfaceControl::is_same_surface(Some(&sc), Some(&copy)));
        assert!(!SurfaceControl::is_same_surface(Some(&sc), Some(&other)));

        // Same handle, everything else different
        let impostor = SurfaceControl::new(None, sc.handle(), None, 999, 7);
        assert!(SurfaceControl::is_same_surface(Some(&sc), Some(&impostor)));
    }

    #[test]
    fn test_copy_starts_with_empty_cache() {
        let (_composer, client) = session();
        let sc = client
            .create_surface(&LayerRequest::buffered("a", 64, 64))
            .unwrap();
        sc.set_transform_hint(4);
        let original_surface = sc.get_surface();

        let copy = SurfaceControl::copy_of(&sc);
        assert_eq!(copy.layer_id(), sc.layer_id());
        assert_eq!(copy.transform_hint(), 4);
        assert_eq!(copy.graphic_buffer_producer(), sc.graphic_buffer_producer());
        assert!(!Arc::ptr_eq(&copy.get_surface(), &original_surface));
    }

    #[test]
    fn test_validate() {
        let (_composer, client) = session();
        let handle = Binder::token(LAYER_HANDLE_DESCRIPTOR);

        let full = SurfaceControl::new(Some(client.clone()), Some(handle.clone()), None, 1, 0);
        assert_eq!(full.validate(), Ok(()));
        assert!(full.is_valid());

        let no_client = SurfaceControl::new(None, Some(handle), None, 1, 0);
        assert_eq!(no_client.validate(), Err(NotInitialized));

        let no_handle = SurfaceControl::new(Some(client), None, None, 1, 0);
        assert_eq!(no_handle.validate(), Err(NotInitialized));
        assert!(!no_handle.is_valid());
    }

    #[test]
    fn test_frame_stats_require_valid_handle() {
        let sc = SurfaceControl::new(None, Some(Binder::token(LAYER_HANDLE_DESCRIPTOR)), None, 1, 0);

        assert_eq!(sc.clear_layer_frame_stats(), Err(StatusError::NotInitialized));
        assert_eq!(sc.get_layer_frame_stats(), Err(StatusError::NotInitialized));
    }

    #[test]
    fn test_frame_stats_delegate_to_session() {
        let (composer, client) = session();
        let sc = client
            .create_surface(&LayerRequest::buffered("a", 64, 64))
            .unwrap();
        let handle = sc.handle().unwrap();

        composer.record_frame(&handle, 100, 110, 90);
        composer.record_frame(&handle, 200, 215, 180);
        assert_eq!(sc.get_layer_frame_stats().unwrap().frame_count(), 2);

        sc.clear_layer_frame_stats().unwrap();
        assert!(sc.get_layer_frame_stats().unwrap().is_empty());

        composer.kill();
        assert_eq!(sc.get_layer_frame_stats(), Err(StatusError::DeadObject));
    }

    #[test]
    fn test_get_surface_is_cached() {
        let (_composer, client) = session();
        let sc = client
            .create_surface(&LayerRequest::buffered("a", 64, 64))
            .unwrap();

        let first = sc.get_surface();
        let second = sc.get_surface();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!first.is_controlled_by_app());
        assert_eq!(first.producer(), sc.graphic_buffer_producer().as_ref());
    }

    #[test]
    fn test_create_surface_replaces_cache() {
        let (_composer, client) = session();
        let sc = client
            .create_surface(&LayerRequest::buffered("a", 64, 64))
            .unwrap();

        let old = sc.get_surface();
        let fresh = sc.create_surface();
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert!(Arc::ptr_eq(&sc.get_surface(), &fresh));

        // The old holder keeps its surface
        assert_ne!(old.id(), fresh.id());
        assert_eq!(Arc::strong_count(&old), 1);
    }

    #[test]
    fn test_concurrent_get_surface_creates_one_instance() {
        const THREADS: usize = 8;

        let (_composer, client) = session();
        let sc = client
            .create_surface(&LayerRequest::buffered("a", 64, 64))
            .unwrap();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let sc = Arc::clone(&sc);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    sc.get_surface().id()
                })
            })
            .collect();

        let ids: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(sc.get_surface().id(), ids[0]);
    }

    #[test]
    fn test_snapshot_reads_producer_and_hint_together() {
        let (_producer, strong) = LoopbackProducer::spawn();
        let sc = SurfaceControl::new(None, None, Some(strong.clone()), 0, 5);

        let (producer, hint) = sc.snapshot();
        assert_eq!(producer, Some(strong));
        assert_eq!(hint, 5);

        sc.set_transform_hint(6);
        assert_eq!(sc.snapshot().1, 6);
    }

    #[test]
    fn test_transform_hint_roundtrip() {
        let sc = SurfaceControl::new(None, None, None, 0, 0);
        for hint in [0, 1, 3, 7, u32::MAX] {
            sc.set_transform_hint(hint);
            assert_eq!(sc.transform_hint(), hint);
        }
    }

    #[test]
    fn test_disconnect_without_producer_is_noop() {
        let (_composer, client) = session();
        let sc = client
            .create_surface(&LayerRequest::container("root"))
            .unwrap();

        sc.disconnect();
        assert!(sc.graphic_buffer_producer().is_none());
    }

    #[test]
    fn test_disconnect_detaches_current_api() {
        let (producer, strong) = LoopbackProducer::spawn();
        let sc = SurfaceControl::new(None, None, Some(strong), 0, 0);

        sc.disconnect();
        sc.disconnect();
        assert_eq!(
            producer.disconnects(),
            vec![ConnectedApi::CurrentlyConnected, ConnectedApi::CurrentlyConnected]
        );

        // A dead producer is logged, not reported
        producer.kill();
        sc.disconnect();
        assert_eq!(producer.disconnects().len(), 2);
    }

    #[test]
    fn test_debug_hides_session() {
        let sc = SurfaceControl::new(None, None, None, 12, 3);
        let text = format!("{sc:?}");
        assert!(text.contains("layer_id: 12"));
        assert!(text.contains("valid: false"));
    }
}
