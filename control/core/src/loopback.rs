//! Loopback Collaborators
//!
//! In-process stand-ins for the compositor session and the buffer producer.
//! They let a handle be created, shipped through a parcel and released without
//! a compositor process on the other end.
//!
//! # Usage
//!
//! ```ignore
//! let (composer, client) = LoopbackComposer::spawn();
//! let session = Arc::new(SurfaceComposerClient::new(client));
//! let sc = session.create_surface(&LayerRequest::buffered("video", 1280, 720))?;
//!
//! assert_eq!(composer.live_layers(), 1);
//! drop(sc);
//! assert_eq!(composer.live_layers(), 0);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::binder::{Binder, BinderId, Strong};
use crate::composer::{
    ComposerClient, CreatedLayer, FrameStats, LayerRequest, COMPOSER_CLIENT_DESCRIPTOR,
    LAYER_HANDLE_DESCRIPTOR,
};
use crate::error::StatusError;
use crate::producer::{ConnectedApi, GraphicBufferProducer, GRAPHIC_BUFFER_PRODUCER_DESCRIPTOR};

/// Refresh period reported in frame stats (60 Hz)
pub const LOOPBACK_REFRESH_PERIOD_NANO: i64 = 16_666_667;

struct LayerRecord {
    name: String,
    stats: FrameStats,
    producer: Option<Arc<LoopbackProducer>>,
}

/// In-process compositor session
///
/// Layers stay registered until the last reference to their handle is
/// released and the release command is flushed.
pub struct LoopbackComposer {
    layers: Arc<Mutex<HashMap<BinderId, LayerRecord>>>,
    next_layer_id: AtomicI32,
    alive: AtomicBool,
}

impl LoopbackComposer {
    /// Create a composer and the session interface that reaches it
    #[must_use]
    pub fn spawn() -> (Arc<Self>, Strong<dyn ComposerClient>) {
        let composer = Arc::new(Self {
            layers: Arc::new(Mutex::new(HashMap::new())),
            next_layer_id: AtomicI32::new(1),
            alive: AtomicBool::new(true),
        });
        let interface: Arc<dyn ComposerClient> = composer.clone();
        (composer, Strong::new(COMPOSER_CLIENT_DESCRIPTOR, interface))
    }

    /// Simulate the compositor dying; every later call fails with `DeadObject`
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Whether [`LoopbackComposer::kill`] has not been called
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Number of layers whose handles have not been released
    #[must_use]
    pub fn live_layers(&self) -> usize {
        self.layers.lock().len()
    }

    /// Debug name of a live layer
    #[must_use]
    pub fn layer_name(&self, handle: &Binder) -> Option<String> {
        self.layers
            .lock()
            .get(&handle.id())
            .map(|record| record.name.clone())
    }

    /// Concrete producer behind a live layer's producer endpoint
    #[must_use]
    pub fn producer_for(&self, handle: &Binder) -> Option<Arc<LoopbackProducer>> {
        self.layers
            .lock()
            .get(&handle.id())
            .and_then(|record| record.producer.clone())
    }

    /// Append one presented frame to a layer's stats
    ///
    /// Returns false if the layer is unknown.
    pub fn record_frame(&self, handle: &Binder, desired: i64, actual: i64, ready: i64) -> bool {
        let mut layers = self.layers.lock();
        let Some(record) = layers.get_mut(&handle.id()) else {
            return false;
        };
        record.stats.desired_present_times_nano.push(desired);
        record.stats.actual_present_times_nano.push(actual);
        record.stats.frame_ready_times_nano.push(ready);
        true
    }

    fn check_alive(&self) -> Result<(), StatusError> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(StatusError::DeadObject)
        }
    }

    fn unknown_layer(handle: &Binder) -> StatusError {
        StatusError::BadValue(format!("unknown layer handle {}", handle.id()))
    }
}

impl ComposerClient for LoopbackComposer {
    fn create_layer(&self, request: &LayerRequest) -> Result<CreatedLayer, StatusError> {
        self.check_alive()?;

        let handle = Binder::token(LAYER_HANDLE_DESCRIPTOR);
        let id = handle.id();
        let layers = Arc::downgrade(&self.layers);
        handle.on_last_release(move || {
            let layers = layers.upgrade().ok_or(StatusError::DeadObject)?;
            if layers.lock().remove(&id).is_some() {
                tracing::debug!(handle = %id, "Loopback layer released");
            }
            Ok(())
        });

        let (producer, endpoint) = if request.with_producer {
            let (producer, endpoint) = LoopbackProducer::spawn();
            (Some(producer), Some(endpoint))
        } else {
            (None, None)
        };

        self.layers.lock().insert(
            id,
            LayerRecord {
                name: request.name.clone(),
                stats: FrameStats {
                    refresh_period_nano: LOOPBACK_REFRESH_PERIOD_NANO,
                    ..FrameStats::default()
                },
                producer,
            },
        );

        Ok(CreatedLayer {
            handle,
            producer: endpoint,
            layer_id: self.next_layer_id.fetch_add(1, Ordering::SeqCst),
            transform_hint: 0,
        })
    }

    fn clear_layer_frame_stats(&self, handle: &Binder) -> Result<(), StatusError> {
        self.check_alive()?;
        let mut layers = self.layers.lock();
        let record = layers
            .get_mut(&handle.id())
            .ok_or_else(|| Self::unknown_layer(handle))?;
        record.stats = FrameStats {
            refresh_period_nano: LOOPBACK_REFRESH_PERIOD_NANO,
            ..FrameStats::default()
        };
        Ok(())
    }

    fn get_layer_frame_stats(&self, handle: &Binder) -> Result<FrameStats, StatusError> {
        self.check_alive()?;
        self.layers
            .lock()
            .get(&handle.id())
            .map(|record| record.stats.clone())
            .ok_or_else(|| Self::unknown_layer(handle))
    }
}

/// In-process buffer producer that records disconnect requests
pub struct LoopbackProducer {
    disconnects: Mutex<Vec<ConnectedApi>>,
    alive: AtomicBool,
}

impl LoopbackProducer {
    /// Create a producer and the endpoint that reaches it
    #[must_use]
    pub fn spawn() -> (Arc<Self>, Strong<dyn GraphicBufferProducer>) {
        let producer = Arc::new(Self {
            disconnects: Mutex::new(Vec::new()),
            alive: AtomicBool::new(true),
        });
        let interface: Arc<dyn GraphicBufferProducer> = producer.clone();
        (
            producer,
            Strong::new(GRAPHIC_BUFFER_PRODUCER_DESCRIPTOR, interface),
        )
    }

    /// Every API token passed to a successful `disconnect`, in order
    #[must_use]
    pub fn disconnects(&self) -> Vec<ConnectedApi> {
        self.disconnects.lock().clone()
    }

    /// Simulate the producer dying
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl GraphicBufferProducer for LoopbackProducer {
    fn disconnect(&self, api: ConnectedApi) -> Result<(), StatusError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(StatusError::DeadObject);
        }
        self.disconnects.lock().push(api);
        Ok(())
    }
}
