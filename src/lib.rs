/*! Per-stream byte buffering for QUIC-like transports.

quicbuf provides the buffering that sits between an application's byte
streams and a transport engine that sends and receives those bytes in
arbitrary-offset, possibly out-of-order chunks. It is built from two
pieces:

- [`storage::RingBuffer`], a growable circular byte buffer addressed by
  logical offset from its front, supporting append, sparse offset
  writes, offset reads and front consumption;
- [`stream::StreamBuffer`], which pairs an egress ring and an ingress
  ring for one stream and keeps the transport engine informed through
  the [`stream::StreamEngine`] trait. [`stream::Attachment`] fixes a
  stream's role (send, receive or both) and [`stream::StreamSet`] stores
  attachments for the lifetime of their streams.

The crate is `no_std` and requires `alloc`: buffers own their heap
storage and grow by doubling when writes do not fit. There is no
internal synchronization; every buffer belongs to exactly one stream and
is driven from one thread.

# Features

- `std`: conveniences for hosted targets (default).
- `log`: emit diagnostics through the `log` crate (default).
- `defmt`: emit diagnostics through `defmt` instead.
*/

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("You may not enable both `defmt` and `log` features.");

extern crate alloc;

#[macro_use]
mod macros;

pub mod storage;
pub mod stream;
