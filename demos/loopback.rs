//! Echoes a message between two duplex stream attachments.
//!
//! Two endpoints are wired back to back through a toy engine: frames of
//! at most `--mtu` bytes are pulled from one endpoint's egress and
//! delivered into the other's ingress, optionally with each pair of
//! frames swapped to exercise out-of-order receive. The server echoes
//! everything it reads and finishes when the inbound stream completes;
//! the client verifies the echo.

use getopts::Options;
use log::{debug, info};
use quicbuf::stream::{Attachment, StreamBuffer, StreamEngine, StreamHandle, StreamSet};
use std::env;
use std::process;

/// Per-stream transport state: send scheduling on one side, a received
/// range tracker on the other. Range offsets are relative to the
/// application's current read position, like the buffer's.
#[derive(Debug, Default)]
struct LoopEngine {
    scheduled: bool,
    acked: u64,
    send_final: Option<u64>,
    fin_sent: bool,
    ranges: Vec<(usize, usize)>,
    consumed: u64,
    recv_final: Option<u64>,
}

impl LoopEngine {
    fn note_received(&mut self, start: usize, end: usize) {
        self.ranges.push((start, end));
        self.ranges.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::new();
        for &(start, end) in &self.ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        self.ranges = merged;
    }
}

impl StreamEngine for LoopEngine {
    fn send_buffer_changed(&mut self, activate: bool) {
        if activate {
            self.scheduled = true;
        }
    }

    fn receive_consumed(&mut self, delta: usize) {
        self.consumed += delta as u64;
        self.ranges.retain_mut(|range| {
            range.0 = range.0.saturating_sub(delta);
            range.1 = range.1.saturating_sub(delta);
            range.1 > 0
        });
    }

    fn received_contiguous_len(&self) -> usize {
        match self.ranges.first() {
            Some(&(0, end)) => end,
            _ => 0,
        }
    }

    fn transfer_complete(&self) -> bool {
        match self.recv_final {
            Some(final_size) => {
                self.ranges.len() <= 1
                    && self.consumed + self.received_contiguous_len() as u64 == final_size
            }
            None => false,
        }
    }

    fn set_send_final_size(&mut self, final_size: u64) {
        self.send_final = Some(final_size);
    }
}

/// Move every pending frame of one direction, delivering in-order or
/// with adjacent frames swapped.
fn pump(
    set: &mut StreamSet<'_>,
    from: StreamHandle,
    from_engine: &mut LoopEngine,
    to: StreamHandle,
    to_engine: &mut LoopEngine,
    mtu: usize,
    reorder: bool,
    label: &str,
) {
    if !from_engine.scheduled {
        return;
    }
    from_engine.scheduled = false;

    let mut frames: Vec<(u64, Vec<u8>, bool)> = Vec::new();
    let mut emitted = 0;
    {
        let sender = set.get(from);
        loop {
            let mut payload = vec![0u8; mtu];
            let (len, reached_end) = sender.on_send_emit(emitted, &mut payload);
            payload.truncate(len);
            if len > 0 {
                let abs = from_engine.acked + emitted as u64;
                let fin = from_engine.send_final == Some(abs + len as u64);
                frames.push((abs, payload, fin));
                emitted += len;
            }
            if reached_end {
                break;
            }
        }
    }
    // A shutdown with nothing left to send still has to tell the peer
    // the final size.
    if let Some(final_size) = from_engine.send_final {
        if !from_engine.fin_sent && frames.is_empty() && from_engine.acked == final_size {
            frames.push((final_size, Vec::new(), true));
        }
    }

    // The toy transport acknowledges instantly.
    set.get_mut(from).on_send_shift(from_engine, emitted);
    from_engine.acked += emitted as u64;

    if reorder {
        for pair in frames.chunks_mut(2) {
            pair.reverse();
        }
    }

    for (abs, payload, fin) in frames {
        let offset = (abs - to_engine.consumed) as usize;
        debug!(
            "{}: frame at {} ({} bytes{})",
            label,
            abs,
            payload.len(),
            if fin { ", fin" } else { "" }
        );
        if !payload.is_empty() {
            to_engine.note_received(offset, offset + payload.len());
        }
        if fin {
            to_engine.recv_final = Some(abs + payload.len() as u64);
        }
        set.get_mut(to).on_receive(offset, &payload).unwrap();
        if fin {
            from_engine.fin_sent = true;
        }
    }
}

/// Read and consume everything deliverable on a stream's ingress side.
fn drain(set: &mut StreamSet<'_>, handle: StreamHandle, engine: &mut LoopEngine) -> Vec<u8> {
    let mut out = Vec::new();
    let buffer = set.get_mut(handle).buffer_mut();
    loop {
        let chunk_len = {
            let chunk = buffer.ingress_get(engine);
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(chunk);
            chunk.len()
        };
        buffer.ingress_shift(engine, chunk_len);
    }
    out
}

fn main() {
    env_logger::init();

    let mut opts = Options::new();
    opts.optopt("m", "message", "message to echo", "TEXT");
    opts.optopt("", "mtu", "frame payload size in bytes", "BYTES");
    opts.optflag("r", "reorder", "deliver each pair of frames swapped");
    opts.optflag("h", "help", "print this help");
    let matches = match opts.parse(env::args().skip(1)) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };
    if matches.opt_present("h") {
        print!("{}", opts.usage("Usage: loopback [options]"));
        return;
    }
    let message = matches
        .opt_str("m")
        .unwrap_or_else(|| "the quick brown fox jumps over the lazy dog".to_string());
    let mtu: usize = matches
        .opt_str("mtu")
        .map(|s| s.parse().expect("invalid mtu"))
        .unwrap_or(7);
    assert!(mtu > 0, "mtu must be positive");
    let reorder = matches.opt_present("r");

    let mut set = StreamSet::new(Vec::new());
    let client = set.add(Attachment::Duplex(StreamBuffer::new().unwrap()));
    let server = set.add(Attachment::Duplex(StreamBuffer::new().unwrap()));
    let mut client_engine = LoopEngine::default();
    let mut server_engine = LoopEngine::default();

    set.get_mut(client)
        .buffer_mut()
        .egress_write(&mut client_engine, message.as_bytes())
        .unwrap();
    set.get_mut(client)
        .buffer_mut()
        .egress_shutdown(&mut client_engine);
    info!("client sent {} bytes, mtu {}, reorder {}", message.len(), mtu, reorder);

    let mut echoed = Vec::new();
    let mut rounds = 0;
    loop {
        rounds += 1;
        assert!(rounds < 100, "relay did not converge");

        pump(
            &mut set,
            client,
            &mut client_engine,
            server,
            &mut server_engine,
            mtu,
            reorder,
            "client->server",
        );

        let inbound = drain(&mut set, server, &mut server_engine);
        if !inbound.is_empty() {
            set.get_mut(server)
                .buffer_mut()
                .egress_write(&mut server_engine, &inbound)
                .unwrap();
        }
        if server_engine.transfer_complete()
            && set.get(server).buffer().ingress_len() == 0
            && set.get(server).buffer().is_send_open()
        {
            set.get_mut(server)
                .buffer_mut()
                .egress_shutdown(&mut server_engine);
        }

        pump(
            &mut set,
            server,
            &mut server_engine,
            client,
            &mut client_engine,
            mtu,
            reorder,
            "server->client",
        );

        echoed.extend_from_slice(&drain(&mut set, client, &mut client_engine));
        if client_engine.transfer_complete() && set.get(client).buffer().ingress_len() == 0 {
            break;
        }
    }

    assert_eq!(echoed, message.as_bytes());
    info!("echo of {} bytes verified after {} rounds", echoed.len(), rounds);
}
