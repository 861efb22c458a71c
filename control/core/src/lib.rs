//! Surface Control - Client-Side Handle to Compositor Layers
//!
//! This crate provides the handle a client process holds for a layer that
//! lives inside the compositor. The handle names the layer, forwards
//! handle-scoped requests to the session that created it, lazily hands out a
//! renderable [`Surface`], and can be flattened into a [`Parcel`] so another
//! process can refer to the same layer.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Client Process                           │
//! │                                                                   │
//! │   SurfaceComposerClient ──create_surface──▶ SurfaceControl        │
//! │          │                                   │    │    │          │
//! │          │ clear/get frame stats             │    │    └─ Surface │
//! │          ▼                                   │    │      (cached) │
//! │   Strong<dyn ComposerClient>       handle ◀──┘    └─▶ Strong<dyn  │
//! │          │                         (Binder)     GraphicBuffer-    │
//! │          │                                      Producer>         │
//! │          │           write_to_parcel / read_from_parcel           │
//! │          │                     ▲           │                      │
//! │          │                     │   Parcel  ▼                      │
//! └──────────┼─────────────────────┴───────────────────────────────────┘
//!            │                 release commands
//!            ▼                 (ipc::flush_commands)
//!      ┌───────────┐
//!      │Compositor │
//!      └───────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SurfaceControl`]: the handle itself
//! - [`SurfaceComposerClient`]: the session handles are created through
//! - [`Parcel`]: flat buffer plus object table used to ship handles
//! - [`Binder`] / [`Strong`]: reference-counted remote object identities
//! - [`Surface`]: renderable surface built from a layer's producer endpoint
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use surface_control::{
//!     LayerRequest, LoopbackComposer, Parcel, SurfaceComposerClient, SurfaceControl,
//! };
//!
//! let (composer, client) = LoopbackComposer::spawn();
//! let session = Arc::new(SurfaceComposerClient::new(client));
//! let sc = session.create_surface(&LayerRequest::buffered("video", 1280, 720))?;
//!
//! let mut parcel = Parcel::new();
//! sc.write_to_parcel(&mut parcel)?;
//! let remote = SurfaceControl::read_from_parcel(&mut parcel)?;
//! assert!(SurfaceControl::is_same_surface(Some(&sc), Some(&remote)));
//! ```
//!
//! # Module Overview
//!
//! - [`binder`]: remote object references and last-release notification
//! - [`composer`]: compositor session and its remote interface
//! - [`config`]: TOML/env configuration for parcel limits and logging
//! - [`control`]: the surface control handle
//! - [`error`]: error types
//! - [`ipc`]: per-thread queue of outgoing commands
//! - [`loopback`]: in-process collaborators for tests and diagnostics
//! - [`parcel`]: the wire buffer
//! - [`producer`]: buffer producer interface
//! - [`surface`]: renderable surface wrapper

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod binder;
pub mod composer;
pub mod config;
pub mod control;
pub mod error;
pub mod ipc;
pub mod loopback;
pub mod parcel;
pub mod producer;
pub mod surface;

mod protocol;

// Core handle
pub use control::SurfaceControl;
pub use surface::{Surface, SurfaceId};

// Session and collaborators
pub use composer::{
    ComposerClient, CreatedLayer, FrameStats, LayerRequest, SurfaceComposerClient,
    COMPOSER_CLIENT_DESCRIPTOR, LAYER_HANDLE_DESCRIPTOR,
};
pub use producer::{ConnectedApi, GraphicBufferProducer, GRAPHIC_BUFFER_PRODUCER_DESCRIPTOR};
pub use loopback::{LoopbackComposer, LoopbackProducer};

// Wire plumbing
pub use binder::{Binder, BinderId, Strong};
pub use parcel::{
    Parcel, DEFAULT_INITIAL_CAPACITY, DEFAULT_MAX_PARCEL_SIZE, OBJECT_REFERENCE_SIZE, WORD_SIZE,
};
pub use protocol::{NULLABLE_SURFACE_CONTROL_WIRE_SIZE, SURFACE_CONTROL_WIRE_SIZE};

// Errors
pub use error::{DecodeError, EncodeError, NotInitialized, ParcelError, StatusError, WireField};

// Configuration
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigSource,
    ParcelConfig, SurfaceControlConfig,
};
