/*! Stream send and receive buffering.

The `stream` module couples the byte containers from the [`storage`]
module to the streams of a QUIC-like transport engine. It deals with
*buffering*, not with the transport itself: packetization, loss recovery
and flow control stay in the engine, which reaches into these buffers
through a narrow interface.

The buffering is explicit, in the same spirit as the socket buffers of
embedded TCP/IP stacks: the application decides on the good size for a
stream's buffers, creates them, and lets the engine fill and drain them.
The engine side of the contract is the [`StreamEngine`] trait; the
application side is [`StreamBuffer`] for one stream and [`StreamSet`] for
keeping attachments over the lifetime of their streams.

[`storage`]: crate::storage
*/

mod buffer;
mod set;

pub use self::buffer::{DEFAULT_CAPACITY, StreamBuffer};
pub use self::set::{StreamHandle, StreamSet, StreamStorage};

use crate::storage::OutOfMemory;

/// Engine-side obligations of a single stream.
///
/// An implementation is passed into the buffer operations that have to
/// notify or query the transport. The value is already scoped to one
/// stream; implementations that manage several streams are expected to
/// hand out a per-stream view.
pub trait StreamEngine {
    /// The send buffer changed. With `activate` the stream has new bytes
    /// or a pending FIN and should be scheduled for emission; without it
    /// the front of the buffer moved and in-flight offsets stay valid.
    fn send_buffer_changed(&mut self, activate: bool);

    /// The application consumed `delta` bytes from the front of the
    /// receive buffer. Used to extend the peer's flow control credit.
    fn receive_consumed(&mut self, delta: usize);

    /// Number of bytes contiguously received, counted from the
    /// application's current read position.
    fn received_contiguous_len(&self) -> usize;

    /// Whether the peer finished the stream and every byte of it has
    /// been received.
    fn transfer_complete(&self) -> bool;

    /// The local side finished sending. `final_size` is the definitive
    /// total number of bytes of the outgoing stream.
    fn set_send_final_size(&mut self, final_size: u64);
}

/// A per-stream attachment, with the local endpoint's role fixed at
/// creation.
///
/// The engine invokes the `on_*` methods below when it needs stream data
/// or delivers some. Each variant carries the same buffer pair; the role
/// decides which directions are legal, and invoking a direction the role
/// does not have is a bug in the caller.
#[derive(Debug)]
pub enum Attachment {
    /// The local endpoint only sends.
    Sender(StreamBuffer),
    /// The local endpoint only receives.
    Receiver(StreamBuffer),
    /// Both directions are live.
    Duplex(StreamBuffer),
}

impl Attachment {
    /// Query whether the local endpoint may send on this stream.
    pub fn can_send(&self) -> bool {
        matches!(self, Attachment::Sender(_) | Attachment::Duplex(_))
    }

    /// Query whether the local endpoint may receive on this stream.
    pub fn can_receive(&self) -> bool {
        matches!(self, Attachment::Receiver(_) | Attachment::Duplex(_))
    }

    /// Access the underlying buffer pair.
    pub fn buffer(&self) -> &StreamBuffer {
        match self {
            Attachment::Sender(buffer)
            | Attachment::Receiver(buffer)
            | Attachment::Duplex(buffer) => buffer,
        }
    }

    /// Access the underlying buffer pair mutably.
    pub fn buffer_mut(&mut self) -> &mut StreamBuffer {
        match self {
            Attachment::Sender(buffer)
            | Attachment::Receiver(buffer)
            | Attachment::Duplex(buffer) => buffer,
        }
    }

    /// The engine acknowledged `delta` bytes; drop them from the front of
    /// the send buffer.
    ///
    /// # Panics
    /// Panics if the role cannot send.
    pub fn on_send_shift(&mut self, cx: &mut impl StreamEngine, delta: usize) {
        assert!(self.can_send());
        self.buffer_mut().egress_shift(cx, delta)
    }

    /// The engine needs stream bytes starting at `offset` for a packet.
    ///
    /// # Panics
    /// Panics if the role cannot send.
    pub fn on_send_emit(&self, offset: usize, data: &mut [u8]) -> (usize, bool) {
        assert!(self.can_send());
        self.buffer().egress_emit(offset, data)
    }

    /// The engine delivered received bytes at `offset` past the current
    /// read position.
    ///
    /// # Panics
    /// Panics if the role cannot receive.
    pub fn on_receive(&mut self, offset: usize, data: &[u8]) -> Result<(), OutOfMemory> {
        assert!(self.can_receive());
        self.buffer_mut().ingress_receive(offset, data)
    }

    /// The peer asked the local endpoint to stop sending. Pending egress
    /// is discarded and the send side closes without a final size.
    ///
    /// # Panics
    /// Panics if the role cannot send.
    pub fn on_stop_sending(&mut self, error_code: u64) {
        assert!(self.can_send());
        net_debug!("stop sending, error {}", error_code);
        self.buffer_mut().egress_abort();
    }

    /// The peer reset its sending side. Buffered ingress is discarded.
    ///
    /// # Panics
    /// Panics if the role cannot receive.
    pub fn on_receive_reset(&mut self, error_code: u64) {
        assert!(self.can_receive());
        net_debug!("stream reset, error {}", error_code);
        self.buffer_mut().ingress_abort();
    }
}
