//! Growable byte ring buffer.
//!
//! A `RingBuffer` is a circular buffer over heap storage that doubles its
//! capacity when a write does not fit. Contents are addressed by logical
//! offset from the front, which lets stream code retransmit already
//! buffered bytes and store bytes that arrive out of order.

use alloc::vec::Vec;

use super::OutOfMemory;

fn allocate_storage(size: usize) -> Result<Vec<u8>, OutOfMemory> {
    let mut storage = Vec::new();
    storage.try_reserve_exact(size).map_err(|_| OutOfMemory)?;
    storage.resize(size, 0);
    Ok(storage)
}

/// A growable circular byte buffer.
///
/// Logical byte `i` lives at `storage[(read_at + i) % capacity]`. One slot
/// is always kept unoccupied so that `read_at == write_at` means empty and
/// a full buffer is still distinguishable from an empty one. The buffer
/// therefore holds at most `capacity() - 1` bytes between growths.
///
/// # Growth
///
/// Writes that do not fit grow the storage by repeated doubling until the
/// increase covers the request. Growth is all or nothing: on allocation
/// failure the operation returns [`OutOfMemory`] and the buffer keeps its
/// previous contents, cursors and capacity.
#[derive(Debug)]
pub struct RingBuffer {
    storage: Vec<u8>,
    /// Position of the first allocated byte.
    read_at: usize,
    /// Position one past the last allocated byte.
    write_at: usize,
}

impl RingBuffer {
    /// Create a new ring buffer with the given capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<RingBuffer, OutOfMemory> {
        assert!(capacity > 0);
        Ok(RingBuffer {
            storage: allocate_storage(capacity)?,
            read_at: 0,
            write_at: 0,
        })
    }

    /// Clear the buffer, discarding its contents but keeping the storage.
    pub fn clear(&mut self) {
        self.read_at = 0;
        self.write_at = 0;
    }

    /// Return the size of the underlying storage.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Return the number of allocated (in-use) bytes.
    #[inline]
    pub fn len(&self) -> usize {
        if self.write_at >= self.read_at {
            self.write_at - self.read_at
        } else {
            self.capacity() - self.read_at + self.write_at
        }
    }

    /// Query whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.read_at == self.write_at
    }

    /// Return the length of the front run that can be read without
    /// crossing the wrap point.
    #[inline]
    pub fn contiguous_len(&self) -> usize {
        if self.write_at >= self.read_at {
            self.write_at - self.read_at
        } else {
            self.capacity() - self.read_at
        }
    }

    /// Return the space available for new bytes before the buffer grows.
    #[inline]
    pub fn window(&self) -> usize {
        // One slot stays unoccupied, see the type documentation.
        self.capacity() - self.len() - 1
    }

    /// Grow the storage by doubling until the capacity increase is at
    /// least `min_grow_amount`.
    ///
    /// A used region that straddles the wrap point is relocated so that
    /// its tail segment keeps its distance from the end of storage.
    pub fn grow(&mut self, min_grow_amount: usize) -> Result<(), OutOfMemory> {
        let old_capacity = self.capacity();
        let mut new_capacity = old_capacity.checked_mul(2).ok_or(OutOfMemory)?;
        while new_capacity - old_capacity < min_grow_amount {
            new_capacity = new_capacity.checked_mul(2).ok_or(OutOfMemory)?;
        }

        let mut new_storage = allocate_storage(new_capacity)?;
        if self.write_at >= self.read_at {
            new_storage[self.read_at..self.write_at]
                .copy_from_slice(&self.storage[self.read_at..self.write_at]);
        } else {
            new_storage[..self.write_at].copy_from_slice(&self.storage[..self.write_at]);
            let new_read_at = self.read_at + new_capacity - old_capacity;
            new_storage[new_read_at..].copy_from_slice(&self.storage[self.read_at..]);
            self.read_at = new_read_at;
        }
        self.storage = new_storage;
        Ok(())
    }

    /// Dequeue (consume) `count` bytes from the front.
    ///
    /// # Panics
    /// Panics if `count` exceeds the allocated length.
    pub fn dequeue_allocated(&mut self, count: usize) {
        assert!(count <= self.len());
        self.read_at += count;
        if self.read_at >= self.capacity() {
            self.read_at -= self.capacity();
        }
    }

    /// Read allocated bytes starting at logical `offset` into `data`.
    ///
    /// Returns the number of bytes copied and whether the read reached the
    /// end of the allocated region. The count is clamped to the bytes
    /// present; a read that starts at `len()` copies nothing and reports
    /// `true`.
    ///
    /// # Panics
    /// Panics if `offset` exceeds the allocated length.
    pub fn read_allocated(&self, offset: usize, data: &mut [u8]) -> (usize, bool) {
        assert!(offset <= self.len());
        let remaining = self.len() - offset;
        let (size, reached_end) = if data.len() < remaining {
            (data.len(), false)
        } else {
            (remaining, true)
        };

        let capacity = self.capacity();
        let start_at = (self.read_at + offset) % capacity;
        if start_at + size <= capacity {
            data[..size].copy_from_slice(&self.storage[start_at..start_at + size]);
        } else {
            let first = capacity - start_at;
            data[..first].copy_from_slice(&self.storage[start_at..]);
            data[first..size].copy_from_slice(&self.storage[..size - first]);
        }
        (size, reached_end)
    }

    /// Return a slice of allocated bytes starting at logical `offset`.
    ///
    /// The slice is clamped to the bytes present and never crosses the
    /// wrap point; a wrapped remainder is returned by another call after
    /// the front has been dequeued. An `offset` past the allocated region
    /// yields an empty slice.
    pub fn get_allocated(&self, offset: usize, mut size: usize) -> &[u8] {
        if offset > self.len() {
            return &[];
        }

        let start_at = (self.read_at + offset) % self.capacity();
        if start_at.saturating_add(size) > self.capacity() {
            size = self.capacity() - start_at;
        }
        if offset.saturating_add(size) > self.len() {
            size = self.len() - offset;
        }

        &self.storage[start_at..start_at + size]
    }

    /// Enqueue the bytes of `data` at the back, growing the buffer first
    /// when they do not fit.
    ///
    /// Growth requests only the shortfall, so the doubling policy decides
    /// the new capacity from how much is missing, not from `data.len()`.
    pub fn enqueue_slice(&mut self, data: &[u8]) -> Result<(), OutOfMemory> {
        if self.window() < data.len() {
            self.grow(data.len() - self.window())?;
        }

        let capacity = self.capacity();
        if self.write_at + data.len() <= capacity {
            self.storage[self.write_at..self.write_at + data.len()].copy_from_slice(data);
        } else {
            let first = capacity - self.write_at;
            self.storage[self.write_at..].copy_from_slice(&data[..first]);
            self.storage[..data.len() - first].copy_from_slice(&data[first..]);
        }
        self.write_at = (self.write_at + data.len()) % capacity;
        Ok(())
    }

    /// Write the bytes of `data` at logical `offset`, growing the buffer
    /// first when the write does not fit.
    ///
    /// The write may start or end past the current allocated length. The
    /// allocated region then extends to cover it, and any bytes between
    /// the old end and `offset` are indeterminate until a later write
    /// fills them. A write kept strictly within the allocated region
    /// leaves `len()` unchanged.
    pub fn set_slice(&mut self, offset: usize, data: &[u8]) -> Result<(), OutOfMemory> {
        let needed = offset
            .checked_add(data.len())
            .and_then(|end| end.checked_add(1))
            .ok_or(OutOfMemory)?;
        if needed > self.capacity() {
            self.grow(needed - self.capacity())?;
        }

        let capacity = self.capacity();
        let start_at = (self.read_at + offset) % capacity;
        if start_at + data.len() <= capacity {
            self.storage[start_at..start_at + data.len()].copy_from_slice(data);
        } else {
            let first = capacity - start_at;
            self.storage[start_at..].copy_from_slice(&data[..first]);
            self.storage[..data.len() - first].copy_from_slice(&data[first..]);
        }
        if offset + data.len() > self.len() {
            self.write_at = (self.read_at + offset + data.len()) % capacity;
        }
        Ok(())
    }
}
