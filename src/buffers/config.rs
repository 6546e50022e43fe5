//! Slot geometry and backing configuration

use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Alignment mandated for slot buffer base addresses
pub const SLOT_ALIGNMENT: usize = 4096;

/// Default number of slots per channel (double buffering)
pub const DEFAULT_SLOT_COUNT: usize = 2;

/// Memory backing of a slot buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backing {
    /// Aligned heap allocation
    Heap,
    /// Anonymous memory mapping (page aligned)
    AnonymousMap,
}

impl Default for Backing {
    fn default() -> Self {
        Self::Heap
    }
}

impl Backing {
    /// Get a human-readable name for the backing type
    pub fn name(&self) -> &'static str {
        match self {
            Backing::Heap => "heap",
            Backing::AnonymousMap => "mmap",
        }
    }

    /// Parse the short name used on the command line
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "heap" => Ok(Backing::Heap),
            "mmap" | "anonymous-map" => Ok(Backing::AnonymousMap),
            other => Err(StreamError::invalid_parameter(
                "backing",
                format!("unknown backing '{}', expected 'heap' or 'mmap'", other),
            )),
        }
    }
}

/// Shape of a channel's slot buffer, in elements rather than bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotGeometry {
    /// Elements per slot
    pub slot_length: usize,
    /// Number of slots
    pub slot_count: usize,
    /// Size of one element in bytes
    pub element_size: usize,
}

impl SlotGeometry {
    /// Geometry for `slot_length` elements of `T` with the default slot count
    pub fn of<T>(slot_length: usize) -> Self {
        Self::with_count::<T>(slot_length, DEFAULT_SLOT_COUNT)
    }

    pub fn with_count<T>(slot_length: usize, slot_count: usize) -> Self {
        Self {
            slot_length,
            slot_count,
            element_size: std::mem::size_of::<T>(),
        }
    }

    /// Size of one slot in bytes
    pub fn slot_bytes(&self) -> usize {
        self.slot_length * self.element_size
    }

    /// Total number of elements across all slots
    pub fn total_elements(&self) -> usize {
        self.slot_length * self.slot_count
    }

    /// Total buffer size in bytes, checked for overflow
    pub fn total_bytes(&self) -> Result<usize> {
        self.slot_count
            .checked_mul(self.slot_length)
            .and_then(|n| n.checked_mul(self.element_size))
            .ok_or_else(|| {
                StreamError::allocation(usize::MAX, SLOT_ALIGNMENT, "slot buffer size overflows usize")
            })
    }

    /// Validate the geometry
    pub fn validate(&self) -> Result<()> {
        if self.slot_length == 0 {
            return Err(StreamError::invalid_parameter(
                "slot_length",
                "Slot length must be greater than 0",
            ));
        }

        if self.slot_count == 0 {
            return Err(StreamError::invalid_parameter(
                "slot_count",
                "Slot count must be greater than 0",
            ));
        }

        if self.element_size == 0 {
            return Err(StreamError::invalid_parameter(
                "element_size",
                "Zero-sized slot elements are not supported",
            ));
        }

        self.total_bytes().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_sizes() {
        let geometry = SlotGeometry::of::<i16>(2048);
        assert_eq!(geometry.slot_count, DEFAULT_SLOT_COUNT);
        assert_eq!(geometry.slot_bytes(), 4096);
        assert_eq!(geometry.total_bytes().unwrap(), 8192);
        assert_eq!(geometry.total_elements(), 4096);
        geometry.validate().unwrap();
    }

    #[test]
    fn test_geometry_rejects_zero() {
        assert!(SlotGeometry::of::<i16>(0).validate().is_err());
        assert!(SlotGeometry::with_count::<i16>(16, 0).validate().is_err());
        assert!(SlotGeometry::with_count::<()>(16, 2).validate().is_err());
    }

    #[test]
    fn test_geometry_overflow() {
        let geometry = SlotGeometry::with_count::<u64>(usize::MAX / 2, 2);
        assert!(matches!(
            geometry.total_bytes(),
            Err(StreamError::Allocation { .. })
        ));
    }

    #[test]
    fn test_backing_names() {
        assert_eq!(Backing::from_name("heap").unwrap(), Backing::Heap);
        assert_eq!(Backing::from_name("mmap").unwrap(), Backing::AnonymousMap);
        assert!(Backing::from_name("gpu").is_err());
        assert_eq!(Backing::AnonymousMap.name(), "mmap");
    }
}
