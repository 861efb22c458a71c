//! Surface Control Wire Protocol
//!
//! # Full Form
//!
//! ```text
//! +-----------------+-----------------+-----------------+-----------+-----------+
//! | session (ref)   | handle (ref)    | producer (ref)  | layer id  | transform |
//! | non-null        | non-null        | nullable        | i32       | u32       |
//! +-----------------+-----------------+-----------------+-----------+-----------+
//! ```
//!
//! # Nullable Form
//!
//! A leading boolean "present" flag, followed by the full form only if set.
//!
//! # Producer-Only Form
//!
//! A single nullable reference to the producer endpoint, for when only the
//! buffer-producer identity has to cross the boundary.
//!
//! Every field is written or read in order and the first failure aborts the
//! whole operation. There is no rollback: a parcel that saw a failure must be
//! discarded.

use std::sync::Arc;

use tracing::debug;

use crate::binder::Strong;
use crate::composer::{ComposerClient, SurfaceComposerClient};
use crate::control::SurfaceControl;
use crate::error::{DecodeError, EncodeError, ParcelError, WireField};
use crate::parcel::{Parcel, OBJECT_REFERENCE_SIZE, WORD_SIZE};
use crate::producer::GraphicBufferProducer;

/// Encoded size of the full form: three references, layer id, transform hint
pub const SURFACE_CONTROL_WIRE_SIZE: usize = 3 * OBJECT_REFERENCE_SIZE + 2 * WORD_SIZE;

/// Encoded size of a present handle in the nullable form
pub const NULLABLE_SURFACE_CONTROL_WIRE_SIZE: usize = WORD_SIZE + SURFACE_CONTROL_WIRE_SIZE;

impl SurfaceControl {
    /// Encode this handle in the full form
    ///
    /// # Errors
    ///
    /// Fails with `UnexpectedNull` on the session or handle field if the
    /// handle is not valid, or with the first buffer failure.
    pub fn write_to_parcel(&self, parcel: &mut Parcel) -> Result<(), EncodeError> {
        let client = self
            .client()
            .ok_or(ParcelError::UnexpectedNull)
            .map_err(EncodeError::at(WireField::Session))?;
        let handle = self
            .handle()
            .ok_or(ParcelError::UnexpectedNull)
            .map_err(EncodeError::at(WireField::Handle))?;
        let (producer, transform_hint) = self.snapshot();

        parcel
            .write_strong_binder(Some(client.client().as_binder()))
            .map_err(EncodeError::at(WireField::Session))?;
        parcel
            .write_strong_binder(Some(&handle))
            .map_err(EncodeError::at(WireField::Handle))?;
        parcel
            .write_strong_binder(producer.as_ref().map(Strong::as_binder))
            .map_err(EncodeError::at(WireField::Producer))?;
        parcel
            .write_i32(self.layer_id())
            .map_err(EncodeError::at(WireField::LayerId))?;
        parcel
            .write_u32(transform_hint)
            .map_err(EncodeError::at(WireField::TransformHint))?;

        Ok(())
    }

    /// Decode a handle written by [`SurfaceControl::write_to_parcel`]
    ///
    /// The decoded handle gets a newly constructed session wrapping the
    /// decoded session interface; the reader is not the original owner, so
    /// nothing is shared with whichever session wrote the parcel.
    pub fn read_from_parcel(parcel: &mut Parcel) -> Result<Arc<Self>, DecodeError> {
        let client = parcel
            .read_strong_binder()
            .and_then(|binder| binder.cast::<dyn ComposerClient>())
            .map_err(DecodeError::at(WireField::Session))?;
        let handle = parcel
            .read_strong_binder()
            .map_err(DecodeError::at(WireField::Handle))?;
        let producer = parcel
            .read_nullable_strong_binder()
            .and_then(|binder| {
                binder
                    .map(|binder| binder.cast::<dyn GraphicBufferProducer>())
                    .transpose()
            })
            .map_err(DecodeError::at(WireField::Producer))?;
        let layer_id = parcel
            .read_i32()
            .map_err(DecodeError::at(WireField::LayerId))?;
        let transform_hint = parcel
            .read_u32()
            .map_err(DecodeError::at(WireField::TransformHint))?;

        debug!(
            layer_id,
            transform_hint,
            has_producer = producer.is_some(),
            "Surface control decoded"
        );

        Ok(Self::new(
            Some(Arc::new(SurfaceComposerClient::new(client))),
            Some(handle),
            producer,
            layer_id,
            transform_hint,
        ))
    }

    /// Encode an optional handle behind a presence flag
    pub fn write_nullable_to_parcel(
        parcel: &mut Parcel,
        control: Option<&Self>,
    ) -> Result<(), EncodeError> {
        parcel
            .write_bool(control.is_some())
            .map_err(EncodeError::at(WireField::Presence))?;
        match control {
            Some(control) => control.write_to_parcel(parcel),
            None => Ok(()),
        }
    }

    /// Decode an optional handle written by [`SurfaceControl::write_nullable_to_parcel`]
    pub fn read_nullable_from_parcel(parcel: &mut Parcel) -> Result<Option<Arc<Self>>, DecodeError> {
        let present = parcel
            .read_bool()
            .map_err(DecodeError::at(WireField::Presence))?;
        if !present {
            return Ok(None);
        }
        Self::read_from_parcel(parcel).map(Some)
    }

    /// Encode only the producer endpoint of `control`
    ///
    /// Writes a null reference if `control` is absent or has no producer.
    pub fn write_surface_to_parcel(
        control: Option<&Self>,
        parcel: &mut Parcel,
    ) -> Result<(), EncodeError> {
        let producer = control.and_then(Self::graphic_buffer_producer);
        parcel
            .write_strong_binder(producer.as_ref().map(Strong::as_binder))
            .map_err(EncodeError::at(WireField::Producer))
    }
}
