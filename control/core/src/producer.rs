//! Buffer producer endpoint
//!
//! The interface through which buffers are submitted for eventual display by
//! the remote compositor. This crate only ever asks a producer to disconnect.

use std::fmt;

use crate::error::StatusError;

/// Interface descriptor of buffer producer binders
pub const GRAPHIC_BUFFER_PRODUCER_DESCRIPTOR: &str = "android.gui.IGraphicBufferProducer";

/// API a producer consumer connects (or disconnects) with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectedApi {
    /// Whichever API is connected right now
    CurrentlyConnected,
    /// EGL / GL rendering
    Egl,
    /// Software (CPU) rendering
    Cpu,
    /// Media codecs
    Media,
    /// Camera
    Camera,
}

impl ConnectedApi {
    /// Wire value of the token
    #[must_use]
    pub fn as_raw(self) -> i32 {
        match self {
            Self::CurrentlyConnected => -1,
            Self::Egl => 1,
            Self::Cpu => 2,
            Self::Media => 3,
            Self::Camera => 4,
        }
    }

    /// Parse a wire value
    #[must_use]
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            -1 => Some(Self::CurrentlyConnected),
            1 => Some(Self::Egl),
            2 => Some(Self::Cpu),
            3 => Some(Self::Media),
            4 => Some(Self::Camera),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectedApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CurrentlyConnected => write!(f, "currently-connected"),
            Self::Egl => write!(f, "egl"),
            Self::Cpu => write!(f, "cpu"),
            Self::Media => write!(f, "media"),
            Self::Camera => write!(f, "camera"),
        }
    }
}

/// Buffer producer side of a layer's buffer queue
pub trait GraphicBufferProducer: Send + Sync {
    /// Detach the consumer connected with `api`
    fn disconnect(&self, api: ConnectedApi) -> Result<(), StatusError>;
}
