/*! Specialized containers.

The `storage` module provides the byte containers used by the stream
layer. The containers own their storage and grow on demand, so the
crate requires `alloc`.
*/

mod ring_buffer;

pub use self::ring_buffer::RingBuffer;

/// Error returned when a buffer cannot allocate the storage it needs.
///
/// The failed operation has no other effects; the buffer keeps its
/// previous contents and capacity.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfMemory;

impl core::fmt::Display for OutOfMemory {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "out of memory")
    }
}

impl core::error::Error for OutOfMemory {}
