//! Buffer pair backing one stream.

use crate::storage::{OutOfMemory, RingBuffer};

use super::StreamEngine;

/// Initial capacity of each direction's ring buffer, in bytes.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Send and receive buffering for a single stream.
///
/// The egress ring holds application bytes that have been written but not
/// yet acknowledged by the peer; the engine reads them by offset when it
/// builds packets, possibly several times for retransmission, and drops
/// them from the front once acknowledged. The ingress ring holds bytes
/// delivered by the engine, possibly with gaps where frames arrived out
/// of order; the application reads the contiguous front and consumes it.
///
/// Offsets given to the operations below are relative to the current
/// front of the respective ring. Tracking which received byte ranges are
/// deliverable stays with the engine; this type only asks it through
/// [`StreamEngine::received_contiguous_len`] and
/// [`StreamEngine::transfer_complete`].
#[derive(Debug)]
pub struct StreamBuffer {
    egress: RingBuffer,
    /// Cumulative number of bytes ever written to the send side.
    bytes_written: u64,
    send_open: bool,
    ingress: RingBuffer,
}

impl StreamBuffer {
    /// Create a stream buffer with [`DEFAULT_CAPACITY`] rings.
    pub fn new() -> Result<StreamBuffer, OutOfMemory> {
        StreamBuffer::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a stream buffer whose rings start at `capacity` bytes.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<StreamBuffer, OutOfMemory> {
        Ok(StreamBuffer {
            egress: RingBuffer::new(capacity)?,
            bytes_written: 0,
            send_open: true,
            ingress: RingBuffer::new(capacity)?,
        })
    }

    /// Return the cumulative number of bytes written to the send side.
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Query whether the send side still accepts writes.
    #[inline]
    pub fn is_send_open(&self) -> bool {
        self.send_open
    }

    /// Return the number of buffered egress bytes.
    #[inline]
    pub fn egress_len(&self) -> usize {
        self.egress.len()
    }

    /// Return the number of buffered ingress bytes, gaps included.
    #[inline]
    pub fn ingress_len(&self) -> usize {
        self.ingress.len()
    }

    /// Append application bytes to the send buffer and schedule the
    /// stream for emission.
    ///
    /// # Panics
    /// Panics if the send side has been shut down.
    pub fn egress_write(
        &mut self,
        cx: &mut impl StreamEngine,
        data: &[u8],
    ) -> Result<(), OutOfMemory> {
        assert!(self.send_open, "write to a finished send side");
        self.egress.enqueue_slice(data)?;
        self.bytes_written += data.len() as u64;
        net_trace!("egress write of {} bytes, {} pending", data.len(), self.egress.len());
        cx.send_buffer_changed(true);
        Ok(())
    }

    /// Drop `delta` acknowledged bytes from the front of the send buffer.
    ///
    /// A zero `delta` returns without notifying the engine.
    ///
    /// # Panics
    /// Panics if `delta` exceeds the buffered egress bytes.
    pub fn egress_shift(&mut self, cx: &mut impl StreamEngine, delta: usize) {
        if delta == 0 {
            return;
        }
        self.egress.dequeue_allocated(delta);
        cx.send_buffer_changed(false);
    }

    /// Copy send bytes starting at `offset` into `data` for packetization.
    ///
    /// Returns the number of bytes copied and whether the copy reached
    /// the end of the buffered bytes.
    ///
    /// # Panics
    /// Panics if `offset` exceeds the buffered egress bytes.
    pub fn egress_emit(&self, offset: usize, data: &mut [u8]) -> (usize, bool) {
        self.egress.read_allocated(offset, data)
    }

    /// Finish the send side, fixing its final size at the number of
    /// bytes written so far.
    ///
    /// # Panics
    /// Panics if the send side has already been shut down.
    pub fn egress_shutdown(&mut self, cx: &mut impl StreamEngine) {
        assert!(self.send_open, "send side already shut down");
        self.send_open = false;
        net_debug!("send side finished at {} bytes", self.bytes_written);
        cx.set_send_final_size(self.bytes_written);
        cx.send_buffer_changed(true);
    }

    /// Discard pending egress and close the send side without recording
    /// a final size. Used when the peer asks the local endpoint to stop
    /// sending.
    pub fn egress_abort(&mut self) {
        net_debug!("egress aborted, {} bytes dropped", self.egress.len());
        self.egress.clear();
        self.send_open = false;
    }

    /// Store received bytes at `offset` past the current read position.
    ///
    /// Gaps left by out-of-order arrival are filled by later calls; the
    /// engine's range tracker decides when the front becomes deliverable.
    /// Empty `data` is ignored.
    pub fn ingress_receive(&mut self, offset: usize, data: &[u8]) -> Result<(), OutOfMemory> {
        if data.is_empty() {
            return Ok(());
        }
        net_trace!("ingress receive of {} bytes at {}", data.len(), offset);
        self.ingress.set_slice(offset, data)
    }

    /// Borrow the deliverable prefix of the receive buffer.
    ///
    /// The length is taken from the engine: everything stored once
    /// [`StreamEngine::transfer_complete`] holds, otherwise
    /// [`StreamEngine::received_contiguous_len`]. The returned slice
    /// never crosses the ring's wrap point, so one call may return less
    /// than the deliverable total; calling again after
    /// [`ingress_shift`](Self::ingress_shift) yields the remainder.
    pub fn ingress_get(&self, cx: &impl StreamEngine) -> &[u8] {
        let deliverable = if cx.transfer_complete() {
            self.ingress.len()
        } else {
            cx.received_contiguous_len()
        };
        self.ingress.get_allocated(0, deliverable)
    }

    /// Drop `delta` consumed bytes from the front of the receive buffer
    /// and report them to the engine for flow control.
    ///
    /// # Panics
    /// Panics if `delta` exceeds the buffered ingress bytes.
    pub fn ingress_shift(&mut self, cx: &mut impl StreamEngine, delta: usize) {
        self.ingress.dequeue_allocated(delta);
        cx.receive_consumed(delta);
    }

    /// Discard buffered ingress. Used when the peer resets the stream.
    pub fn ingress_abort(&mut self) {
        net_debug!("ingress aborted, {} bytes dropped", self.ingress.len());
        self.ingress.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[derive(Debug, Default)]
    struct RecordingEngine {
        activations: Vec<bool>,
        consumed: Vec<usize>,
        contiguous: usize,
        complete: bool,
        final_size: Option<u64>,
    }

    impl StreamEngine for RecordingEngine {
        fn send_buffer_changed(&mut self, activate: bool) {
            self.activations.push(activate);
        }

        fn receive_consumed(&mut self, delta: usize) {
            self.consumed.push(delta);
        }

        fn received_contiguous_len(&self) -> usize {
            self.contiguous
        }

        fn transfer_complete(&self) -> bool {
            self.complete
        }

        fn set_send_final_size(&mut self, final_size: u64) {
            self.final_size = Some(final_size);
        }
    }

    #[test]
    fn test_egress_write_activates() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();

        buf.egress_write(&mut cx, b"hello").unwrap();
        buf.egress_write(&mut cx, b" world").unwrap();

        assert_eq!(buf.egress_len(), 11);
        assert_eq!(buf.bytes_written(), 11);
        assert_eq!(cx.activations, [true, true]);
    }

    #[test]
    fn test_egress_emit_is_offset_addressed() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.egress_write(&mut cx, b"abcdefgh").unwrap();

        let mut out = [0u8; 4];
        assert_eq!(buf.egress_emit(0, &mut out), (4, false));
        assert_eq!(&out, b"abcd");

        // The same bytes can be emitted again for retransmission.
        assert_eq!(buf.egress_emit(0, &mut out), (4, false));
        assert_eq!(buf.egress_emit(4, &mut out), (4, true));
        assert_eq!(&out, b"efgh");

        assert_eq!(buf.egress_emit(8, &mut out), (0, true));
    }

    #[test]
    fn test_egress_shift_moves_front() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.egress_write(&mut cx, b"abcdefgh").unwrap();
        cx.activations.clear();

        buf.egress_shift(&mut cx, 4);
        assert_eq!(buf.egress_len(), 4);
        assert_eq!(cx.activations, [false]);

        // Offsets rebase against the new front.
        let mut out = [0u8; 4];
        assert_eq!(buf.egress_emit(0, &mut out), (4, true));
        assert_eq!(&out, b"efgh");

        // Cumulative accounting is unaffected by acknowledgements.
        assert_eq!(buf.bytes_written(), 8);
    }

    #[test]
    fn test_egress_shift_zero_is_silent() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.egress_write(&mut cx, b"abc").unwrap();
        cx.activations.clear();

        buf.egress_shift(&mut cx, 0);
        assert!(cx.activations.is_empty());
    }

    #[test]
    fn test_egress_shutdown_records_final_size() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.egress_write(&mut cx, b"abcde").unwrap();
        cx.activations.clear();

        buf.egress_shutdown(&mut cx);
        assert!(!buf.is_send_open());
        assert_eq!(cx.final_size, Some(5));
        // The pending FIN still needs the stream scheduled.
        assert_eq!(cx.activations, [true]);
    }

    #[test]
    #[should_panic(expected = "finished send side")]
    fn test_egress_write_after_shutdown_panics() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.egress_shutdown(&mut cx);
        let _ = buf.egress_write(&mut cx, b"late");
    }

    #[test]
    #[should_panic(expected = "already shut down")]
    fn test_egress_shutdown_twice_panics() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.egress_shutdown(&mut cx);
        buf.egress_shutdown(&mut cx);
    }

    #[test]
    fn test_egress_abort_closes_without_final_size() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.egress_write(&mut cx, b"pending").unwrap();

        buf.egress_abort();
        assert_eq!(buf.egress_len(), 0);
        assert!(!buf.is_send_open());
        assert_eq!(cx.final_size, None);
    }

    #[test]
    fn test_ingress_out_of_order_delivery() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();

        buf.ingress_receive(5, b" world").unwrap();
        assert_eq!(buf.ingress_len(), 11);
        // Not deliverable until the tracker reports the gap filled.
        cx.contiguous = 0;
        assert_eq!(buf.ingress_get(&cx), b"");

        buf.ingress_receive(0, b"hello").unwrap();
        cx.contiguous = 11;
        assert_eq!(buf.ingress_get(&cx), b"hello world");
    }

    #[test]
    fn test_ingress_get_respects_tracker() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.ingress_receive(0, b"abcdef").unwrap();

        cx.contiguous = 4;
        assert_eq!(buf.ingress_get(&cx), b"abcd");

        // Once the transfer is complete the tracker is not consulted.
        cx.complete = true;
        cx.contiguous = 0;
        assert_eq!(buf.ingress_get(&cx), b"abcdef");
    }

    #[test]
    fn test_ingress_empty_receive_is_noop() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();

        buf.ingress_receive(100, b"").unwrap();
        assert_eq!(buf.ingress_len(), 0);
        cx.complete = true;
        assert_eq!(buf.ingress_get(&cx), b"");
    }

    #[test]
    fn test_ingress_shift_reports_consumption() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.ingress_receive(0, b"abcdef").unwrap();

        buf.ingress_shift(&mut cx, 4);
        assert_eq!(buf.ingress_len(), 2);
        buf.ingress_shift(&mut cx, 0);
        assert_eq!(cx.consumed, [4, 0]);

        cx.contiguous = 2;
        assert_eq!(buf.ingress_get(&cx), b"ef");
    }

    #[test]
    fn test_ingress_get_loops_across_wrap() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::with_capacity(8).unwrap();

        // Consume part of a first delivery so the next one wraps.
        buf.ingress_receive(0, b"abcdef").unwrap();
        cx.contiguous = 6;
        buf.ingress_shift(&mut cx, 5);
        cx.contiguous = 1;
        buf.ingress_receive(1, b"ghij").unwrap();
        cx.contiguous = 5;
        assert_eq!(buf.ingress_len(), 5);

        // The view stops at the wrap point; shifting exposes the rest.
        let mut delivered = Vec::new();
        while delivered.len() < 5 {
            let chunk = buf.ingress_get(&cx);
            assert!(!chunk.is_empty());
            delivered.extend_from_slice(chunk);
            let len = chunk.len();
            buf.ingress_shift(&mut cx, len);
            cx.contiguous -= len;
        }
        assert_eq!(delivered, b"fghij");
    }

    #[test]
    fn test_ingress_abort_discards() {
        let mut cx = RecordingEngine::default();
        let mut buf = StreamBuffer::new().unwrap();
        buf.ingress_receive(0, b"abc").unwrap();

        buf.ingress_abort();
        assert_eq!(buf.ingress_len(), 0);
        cx.complete = true;
        assert_eq!(buf.ingress_get(&cx), b"");
    }

    // Pump bytes from one stream buffer to another the way an engine
    // would: emit in small frames, deliver some of them swapped, shift
    // acknowledged bytes, and read the contiguous front on the far side.
    #[test]
    fn test_two_buffer_relay() {
        let mut send_cx = RecordingEngine::default();
        let mut recv_cx = RecordingEngine::default();
        let mut sender = StreamBuffer::with_capacity(16).unwrap();
        let mut receiver = StreamBuffer::with_capacity(16).unwrap();

        let message = b"the quick brown fox jumps over the lazy dog";
        sender.egress_write(&mut send_cx, message).unwrap();
        sender.egress_shutdown(&mut send_cx);
        assert_eq!(send_cx.final_size, Some(message.len() as u64));

        let mut received: Vec<u8> = Vec::new();
        while received.len() < message.len() {
            // Frame up to 7 bytes at a time, two frames per round,
            // delivered in reverse order.
            let mut frames = Vec::new();
            let mut offset = 0;
            for _ in 0..2 {
                let mut payload = [0u8; 7];
                let (len, reached_end) = sender.egress_emit(offset, &mut payload);
                if len > 0 {
                    frames.push((offset, payload, len));
                    offset += len;
                }
                if reached_end {
                    break;
                }
            }

            // The sender front and the receiver front advance in step,
            // so the emit offsets are valid receive offsets as-is.
            for &(frame_offset, ref payload, len) in frames.iter().rev() {
                receiver
                    .ingress_receive(frame_offset, &payload[..len])
                    .unwrap();
            }
            sender.egress_shift(&mut send_cx, offset);

            // Both frames of the round are now in, so the front is
            // contiguous up to everything stored.
            recv_cx.contiguous = receiver.ingress_len();
            loop {
                let chunk_len = {
                    let chunk = receiver.ingress_get(&recv_cx);
                    if chunk.is_empty() {
                        break;
                    }
                    received.extend_from_slice(chunk);
                    chunk.len()
                };
                receiver.ingress_shift(&mut recv_cx, chunk_len);
                recv_cx.contiguous -= chunk_len;
            }
        }

        assert_eq!(received, message);
    }
}
