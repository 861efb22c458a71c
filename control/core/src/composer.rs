//! Compositor Session
//!
//! [`SurfaceComposerClient`] is the client's bound channel to the compositing
//! service. It wraps the remote [`ComposerClient`] interface and issues
//! handle-scoped requests on behalf of [`SurfaceControl`] handles.
//!
//! The session is also the subsystem that first creates a remote layer:
//! [`SurfaceComposerClient::create_surface`] asks the compositor for a layer
//! and wraps the answer in a new handle.

use std::fmt;
use std::sync::Arc;

use crate::binder::{Binder, Strong};
use crate::control::SurfaceControl;
use crate::error::StatusError;
use crate::producer::GraphicBufferProducer;

/// Interface descriptor of compositor session binders
pub const COMPOSER_CLIENT_DESCRIPTOR: &str = "android.gui.ISurfaceComposerClient";

/// Interface descriptor of layer handle tokens
pub const LAYER_HANDLE_DESCRIPTOR: &str = "android.gui.ILayerHandle";

/// Presentation timing collected for one layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Display refresh period in nanoseconds
    pub refresh_period_nano: i64,
    /// When each frame was meant to be presented
    pub desired_present_times_nano: Vec<i64>,
    /// When each frame was actually presented
    pub actual_present_times_nano: Vec<i64>,
    /// When each frame's buffer became ready
    pub frame_ready_times_nano: Vec<i64>,
}

impl FrameStats {
    /// Number of frames recorded
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.desired_present_times_nano.len()
    }

    /// Whether no frames have been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.desired_present_times_nano.is_empty()
    }
}

/// Parameters for a new layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRequest {
    /// Debug name of the layer
    pub name: String,
    /// Requested width in pixels
    pub width: u32,
    /// Requested height in pixels
    pub height: u32,
    /// Whether the layer gets a buffer queue (and thus a producer endpoint)
    pub with_producer: bool,
}

impl LayerRequest {
    /// Buffer-backed layer of the given size
    #[must_use]
    pub fn buffered(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            with_producer: true,
        }
    }

    /// Container layer without a buffer queue
    #[must_use]
    pub fn container(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            width: 0,
            height: 0,
            with_producer: false,
        }
    }
}

/// Compositor's answer to a [`LayerRequest`]
#[derive(Debug, Clone)]
pub struct CreatedLayer {
    /// Remote identity of the layer
    pub handle: Binder,
    /// Producer endpoint, absent for container layers
    pub producer: Option<Strong<dyn GraphicBufferProducer>>,
    /// Layer id within the session
    pub layer_id: i32,
    /// Initial transform hint
    pub transform_hint: u32,
}

/// Compositor-side session interface
pub trait ComposerClient: Send + Sync {
    /// Create a layer owned by this session
    fn create_layer(&self, request: &LayerRequest) -> Result<CreatedLayer, StatusError>;

    /// Reset the frame statistics of the layer identified by `handle`
    fn clear_layer_frame_stats(&self, handle: &Binder) -> Result<(), StatusError>;

    /// Fetch the frame statistics of the layer identified by `handle`
    fn get_layer_frame_stats(&self, handle: &Binder) -> Result<FrameStats, StatusError>;
}

/// Client session bound to the compositor
pub struct SurfaceComposerClient {
    client: Strong<dyn ComposerClient>,
}

impl SurfaceComposerClient {
    /// Wrap a compositor session interface
    #[must_use]
    pub fn new(client: Strong<dyn ComposerClient>) -> Self {
        Self { client }
    }

    /// The remote session interface, as written to the wire
    #[must_use]
    pub fn client(&self) -> &Strong<dyn ComposerClient> {
        &self.client
    }

    /// Ask the compositor for a new layer and wrap it in a handle
    pub fn create_surface(
        self: &Arc<Self>,
        request: &LayerRequest,
    ) -> Result<Arc<SurfaceControl>, StatusError> {
        let layer = self.client.create_layer(request)?;
        tracing::debug!(
            name = %request.name,
            layer_id = layer.layer_id,
            has_producer = layer.producer.is_some(),
            "Layer created"
        );
        Ok(SurfaceControl::new(
            Some(Arc::clone(self)),
            Some(layer.handle),
            layer.producer,
            layer.layer_id,
            layer.transform_hint,
        ))
    }

    /// Reset frame statistics for a layer
    pub fn clear_layer_frame_stats(&self, handle: &Binder) -> Result<(), StatusError> {
        self.client.clear_layer_frame_stats(handle)
    }

    /// Fetch frame statistics for a layer
    pub fn get_layer_frame_stats(&self, handle: &Binder) -> Result<FrameStats, StatusError> {
        self.client.get_layer_frame_stats(handle)
    }
}

impl fmt::Debug for SurfaceComposerClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceComposerClient")
            .field("client", self.client.as_binder())
            .finish()
    }
}
