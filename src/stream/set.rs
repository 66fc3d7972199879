//! Registry of stream attachments.

use core::fmt;
use managed::ManagedSlice;

use super::Attachment;

/// Opaque struct with space for storing one stream attachment.
///
/// This is public so you can use it to allocate space for storing
/// attachments when creating a StreamSet with borrowed storage.
#[derive(Debug, Default)]
pub struct StreamStorage {
    inner: Option<Attachment>,
}

impl StreamStorage {
    pub const EMPTY: Self = Self { inner: None };
}

/// A handle, identifying a stream attachment in a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamHandle(usize);

impl fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An extensible set of stream attachments.
///
/// A stream's attachment is added when the stream opens and removed when
/// it closes; the handle stands in for the attachment everywhere in
/// between. The lifetime `'a` is the lifetime of the storage; with owned
/// storage (passed in as a `Vec`) you can use `StreamSet<'static>`.
#[derive(Debug)]
pub struct StreamSet<'a> {
    streams: ManagedSlice<'a, StreamStorage>,
}

impl<'a> StreamSet<'a> {
    /// Create a stream set using the provided storage.
    pub fn new<StreamsT>(streams: StreamsT) -> StreamSet<'a>
    where
        StreamsT: Into<ManagedSlice<'a, StreamStorage>>,
    {
        let streams = streams.into();
        StreamSet { streams }
    }

    /// Add a stream attachment to the set, and return its handle.
    ///
    /// # Panics
    /// This function panics if the storage is fixed-size (not a `Vec`) and is full.
    pub fn add(&mut self, attachment: Attachment) -> StreamHandle {
        fn put(index: usize, slot: &mut StreamStorage, attachment: Attachment) -> StreamHandle {
            net_trace!("[{}]: attaching", index);
            slot.inner = Some(attachment);
            StreamHandle(index)
        }

        for (index, slot) in self.streams.iter_mut().enumerate() {
            if slot.inner.is_none() {
                return put(index, slot, attachment);
            }
        }

        match &mut self.streams {
            ManagedSlice::Borrowed(_) => panic!("adding an attachment to a full StreamSet"),
            ManagedSlice::Owned(streams) => {
                streams.push(StreamStorage { inner: None });
                let index = streams.len() - 1;
                put(index, &mut streams[index], attachment)
            }
        }
    }

    /// Get a stream attachment from the set by its handle.
    ///
    /// # Panics
    /// This function may panic if the handle does not belong to this stream set.
    pub fn get(&self, handle: StreamHandle) -> &Attachment {
        match self.streams[handle.0].inner.as_ref() {
            Some(attachment) => attachment,
            None => panic!("handle does not refer to a valid attachment"),
        }
    }

    /// Get a mutable stream attachment from the set by its handle.
    ///
    /// # Panics
    /// This function may panic if the handle does not belong to this stream set.
    pub fn get_mut(&mut self, handle: StreamHandle) -> &mut Attachment {
        match self.streams[handle.0].inner.as_mut() {
            Some(attachment) => attachment,
            None => panic!("handle does not refer to a valid attachment"),
        }
    }

    /// Remove a stream attachment from the set, without changing its state.
    ///
    /// # Panics
    /// This function may panic if the handle does not belong to this stream set.
    pub fn remove(&mut self, handle: StreamHandle) -> Attachment {
        net_trace!("[{}]: detaching", handle.0);
        match self.streams[handle.0].inner.take() {
            Some(attachment) => attachment,
            None => panic!("handle does not refer to a valid attachment"),
        }
    }

    /// Get an iterator to the inner attachments.
    pub fn iter(&self) -> impl Iterator<Item = (StreamHandle, &Attachment)> {
        self.streams
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.inner.as_ref().map(|a| (StreamHandle(index), a)))
    }

    /// Get a mutable iterator to the inner attachments.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (StreamHandle, &mut Attachment)> {
        self.streams
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| slot.inner.as_mut().map(|a| (StreamHandle(index), a)))
    }
}
