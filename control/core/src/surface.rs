//! Locally visible surface wrapping a layer's producer endpoint

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::binder::Strong;
use crate::producer::GraphicBufferProducer;

/// Process-unique surface identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(u64);

impl SurfaceId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface-{}", self.0)
    }
}

/// Surface handed to code that renders into a layer
pub struct Surface {
    id: SurfaceId,
    producer: Option<Strong<dyn GraphicBufferProducer>>,
    controlled_by_app: bool,
}

impl Surface {
    /// Wrap a producer endpoint
    ///
    /// `controlled_by_app` tells the producer whether the application that
    /// owns this surface also renders into it.
    #[must_use]
    pub fn new(producer: Option<Strong<dyn GraphicBufferProducer>>, controlled_by_app: bool) -> Self {
        Self {
            id: SurfaceId::next(),
            producer,
            controlled_by_app,
        }
    }

    /// Unique id of this instance
    #[must_use]
    pub fn id(&self) -> SurfaceId {
        self.id
    }

    /// Producer endpoint, if the layer has one
    #[must_use]
    pub fn producer(&self) -> Option<&Strong<dyn GraphicBufferProducer>> {
        self.producer.as_ref()
    }

    /// Whether the owning application renders into this surface itself
    #[must_use]
    pub fn is_controlled_by_app(&self) -> bool {
        self.controlled_by_app
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("id", &self.id)
            .field("producer", &self.producer.as_ref().map(Strong::as_binder))
            .field("controlled_by_app", &self.controlled_by_app)
            .finish()
    }
}
