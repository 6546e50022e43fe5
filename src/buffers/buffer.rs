//! Aligned slot buffer backing a single channel

use std::{alloc::Layout, marker::PhantomData, ptr::NonNull, slice};

use bytemuck::Pod;
use memmap2::{MmapMut, MmapOptions};

use crate::error::{Result, StreamError};

use super::config::{Backing, SlotGeometry, SLOT_ALIGNMENT};

/// Owner of the raw memory behind a slot buffer
#[derive(Debug)]
enum Storage {
    Heap(Layout),
    Mapped(MmapMut),
}

/// A contiguous, 4096-byte aligned region of `slot_count` slots holding
/// `slot_length` elements of `T` each.
///
/// The memory is zero-initialised on creation, which is a valid value for
/// any `Pod` element. The device writes into and reads from this memory
/// through the base pointer handed over at channel registration.
#[derive(Debug)]
pub struct SlotBuffer<T> {
    /// Base of the region
    base: NonNull<T>,
    geometry: SlotGeometry,
    backing: Backing,
    storage: Storage,
    _phantom: PhantomData<T>,
}

impl<T: Pod> SlotBuffer<T> {
    /// Allocate a zeroed slot buffer of the given geometry
    pub fn new(slot_length: usize, slot_count: usize, backing: Backing) -> Result<Self> {
        let geometry = SlotGeometry::with_count::<T>(slot_length, slot_count);
        geometry.validate()?;

        let bytes = geometry.total_bytes()?;
        let alignment = SLOT_ALIGNMENT.max(std::mem::align_of::<T>());

        let (raw, storage) = match backing {
            Backing::Heap => {
                let layout = Layout::from_size_align(bytes, alignment).map_err(|e| {
                    StreamError::allocation(bytes, alignment, e.to_string())
                })?;
                let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
                let raw = NonNull::new(ptr).ok_or_else(|| {
                    StreamError::allocation(bytes, alignment, "allocator returned null")
                })?;
                (raw, Storage::Heap(layout))
            }
            Backing::AnonymousMap => {
                let mut mmap = MmapOptions::new()
                    .len(bytes)
                    .map_anon()
                    .map_err(|e| StreamError::allocation(bytes, alignment, e.to_string()))?;
                let raw = NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| {
                    StreamError::allocation(bytes, alignment, "mapping returned null")
                })?;
                (raw, Storage::Mapped(mmap))
            }
        };

        let address = raw.as_ptr() as usize;
        if address % alignment != 0 {
            if let Storage::Heap(layout) = storage {
                unsafe { std::alloc::dealloc(raw.as_ptr(), layout) };
            }
            return Err(StreamError::alignment(address, alignment));
        }

        Ok(Self {
            base: raw.cast::<T>(),
            geometry,
            backing,
            storage,
            _phantom: PhantomData,
        })
    }
}

impl<T> SlotBuffer<T> {
    pub fn geometry(&self) -> SlotGeometry {
        self.geometry
    }

    /// Number of elements per slot
    pub fn slot_length(&self) -> usize {
        self.geometry.slot_length
    }

    /// Number of slots
    pub fn slot_count(&self) -> usize {
        self.geometry.slot_count
    }

    pub fn backing(&self) -> Backing {
        self.backing
    }

    /// Total size of the region in bytes
    pub fn byte_len(&self) -> usize {
        self.geometry.total_elements() * self.geometry.element_size
    }

    /// Base address as seen by the device
    pub fn base_ptr(&self) -> NonNull<u8> {
        self.base.cast::<u8>()
    }

    /// Get a slot by index
    pub fn slot(&self, index: usize) -> Option<&[T]> {
        if index >= self.geometry.slot_count {
            return None;
        }
        let len = self.geometry.slot_length;
        Some(unsafe { slice::from_raw_parts(self.base.as_ptr().add(index * len), len) })
    }

    /// Get a mutable slot by index
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut [T]> {
        if index >= self.geometry.slot_count {
            return None;
        }
        let len = self.geometry.slot_length;
        Some(unsafe { slice::from_raw_parts_mut(self.base.as_ptr().add(index * len), len) })
    }

    /// The whole region as one slice
    pub fn as_slice(&self) -> &[T] {
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.geometry.total_elements()) }
    }
}

impl<T> Drop for SlotBuffer<T> {
    fn drop(&mut self) {
        match &self.storage {
            Storage::Heap(layout) => unsafe {
                std::alloc::dealloc(self.base.as_ptr() as *mut u8, *layout);
            },
            // The mapping is released when MmapMut drops
            Storage::Mapped(_) => {}
        }
    }
}

unsafe impl<T: Send> Send for SlotBuffer<T> {}
