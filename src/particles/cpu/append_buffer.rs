//! Append/consume buffer with an atomic hidden counter
//!
//! Mirrors a structured buffer with a counter on the device: any number of
//! lanes may append (or consume) concurrently and each gets a distinct
//! position. Appending and consuming in the same parallel section is not
//! supported, and neither is the device's.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use rayon::prelude::*;

use crate::gpu::buffer_layouts::IndexBufferElement;

/// Element that fits in one 64-bit atomic cell
pub trait AppendElement: Copy + Send + Sync {
    fn pack(self) -> u64;
    fn unpack(bits: u64) -> Self;
}

impl AppendElement for u32 {
    fn pack(self) -> u64 {
        self as u64
    }

    fn unpack(bits: u64) -> Self {
        bits as u32
    }
}

impl AppendElement for IndexBufferElement {
    fn pack(self) -> u64 {
        ((self.index as u64) << 32) | self.distance.to_bits() as u64
    }

    fn unpack(bits: u64) -> Self {
        Self {
            distance: f32::from_bits(bits as u32),
            index: (bits >> 32) as u32,
        }
    }
}

pub struct AppendBuffer<T: AppendElement> {
    cells: Vec<AtomicU64>,
    count: AtomicU32,
    _element: PhantomData<T>,
}

impl<T: AppendElement> AppendBuffer<T> {
    pub fn new(capacity: u32) -> Self {
        Self {
            cells: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU32::new(0),
            _element: PhantomData,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.cells.len() as u32
    }

    pub fn len(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite the hidden counter without touching the contents
    pub fn set_len(&self, len: u32) {
        debug_assert!(len <= self.capacity());
        self.count.store(len, Ordering::Release);
    }

    /// Append `value`, returning the position it landed at.
    ///
    /// Callers guarantee the buffer has room; a write past the end is
    /// dropped the way robust buffer access drops it on the device.
    pub fn append(&self, value: T) -> u32 {
        let at = self.count.fetch_add(1, Ordering::AcqRel);
        debug_assert!(at < self.capacity(), "append past capacity");
        if let Some(cell) = self.cells.get(at as usize) {
            cell.store(value.pack(), Ordering::Release);
        }
        at
    }

    /// Pop the most recently appended element.
    ///
    /// Callers guarantee the buffer is non-empty; the Emit stage bounds its
    /// lanes by a snapshot of the count to keep that true.
    pub fn consume(&self) -> T {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "consume from empty buffer");
        let at = previous.wrapping_sub(1) as usize;
        T::unpack(self.cells.get(at).map_or(0, |c| c.load(Ordering::Acquire)))
    }

    /// Element at `position`, if it is below the current count
    pub fn get(&self, position: u32) -> Option<T> {
        if position >= self.len() {
            return None;
        }
        self.cells
            .get(position as usize)
            .map(|c| T::unpack(c.load(Ordering::Acquire)))
    }

    /// Contents below the current count, bottom first
    pub fn to_vec(&self) -> Vec<T> {
        let len = (self.len() as usize).min(self.cells.len());
        self.cells[..len]
            .iter()
            .map(|c| T::unpack(c.load(Ordering::Acquire)))
            .collect()
    }

    /// Replace the contents and count with `values`
    pub fn overwrite(&self, values: &[T]) {
        debug_assert!(values.len() <= self.cells.len());
        self.cells
            .par_iter()
            .zip(values.par_iter())
            .for_each(|(cell, value)| cell.store(value.pack(), Ordering::Release));
        self.set_len(values.len().min(self.cells.len()) as u32);
    }
}

impl AppendBuffer<u32> {
    /// Store `i` at every position `i` and set the count to capacity
    pub fn fill_with_positions(&self) {
        self.cells
            .par_iter()
            .enumerate()
            .for_each(|(i, cell)| cell.store(i as u64, Ordering::Release));
        self.set_len(self.capacity());
    }
}
