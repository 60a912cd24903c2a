//! Immutable description of one header type.

use std::{fmt, sync::Arc};

use super::ProtocolId;
use crate::chain::HeaderView;

/// Computes the length of a header from a view starting at its first byte.
///
/// The view extends to the end of the frame. Returning `0` signals that no
/// valid header is present at this offset and terminates the chain walk.
pub type HeaderLengthFn = Arc<dyn Fn(&HeaderView<'_>) -> usize + Send + Sync>;

/// Identifier, human name and length computation for one protocol.
#[derive(Clone)]
pub struct ProtocolDescriptor {
    id: ProtocolId,
    name: String,
    header_len: HeaderLengthFn,
}

impl ProtocolDescriptor {
    /// Describe a protocol whose header length is computed by `header_len`.
    #[must_use]
    pub fn new(
        id: ProtocolId,
        name: impl Into<String>,
        header_len: impl Fn(&HeaderView<'_>) -> usize + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            header_len: Arc::new(header_len),
        }
    }

    /// Describe a protocol with a constant header length.
    ///
    /// Frames shorter than `len` from the header start produce no header.
    ///
    /// # Examples
    ///
    /// ```
    /// use flowframe::{FrameBuffer, ProtocolDescriptor, ProtocolId, chain::HeaderView};
    ///
    /// let udp = ProtocolDescriptor::fixed(ProtocolId::new(5), "udp", 8);
    /// let buffer = FrameBuffer::new(vec![0_u8; 12]);
    /// let view = HeaderView::to_end(&buffer, udp.id(), 0);
    /// assert_eq!(udp.header_length(&view), 8);
    /// ```
    #[must_use]
    pub fn fixed(id: ProtocolId, name: impl Into<String>, len: usize) -> Self {
        Self::new(id, name, move |view: &HeaderView<'_>| {
            if view.len() >= len { len } else { 0 }
        })
    }

    /// Identifier this descriptor is registered under.
    #[must_use]
    pub const fn id(&self) -> ProtocolId { self.id }

    /// Human-readable protocol name.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Evaluate the header length for the header starting at `view`.
    #[must_use]
    pub fn header_length(&self, view: &HeaderView<'_>) -> usize { (self.header_len)(view) }
}

impl fmt::Debug for ProtocolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
