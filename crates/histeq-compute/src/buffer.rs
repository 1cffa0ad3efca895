use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::ComputeError;

/// How kernels may access a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Kernels only read the buffer.
    ReadOnly,
    /// Kernels only write the buffer.
    WriteOnly,
    /// Kernels read and write the buffer.
    ReadWrite,
}

impl AccessMode {
    /// Whether kernels may read the buffer.
    pub fn is_readable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    /// Whether kernels may write the buffer.
    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// The element type stored in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    /// unsigned 8-bit elements, e.g. pixels
    U8,
    /// unsigned 32-bit elements, e.g. counters
    U32,
}

impl ElementKind {
    /// Size of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            ElementKind::U8 => 1,
            ElementKind::U32 => 4,
        }
    }
}

/// Type-erased buffer storage, as bound to a kernel argument.
#[derive(Debug, Clone)]
pub enum BufferMemory {
    /// storage of a `Buffer<u8>`
    U8(Arc<[AtomicU8]>),
    /// storage of a `Buffer<u32>`
    U32(Arc<[AtomicU32]>),
}

impl BufferMemory {
    /// The element type of the storage.
    pub fn kind(&self) -> ElementKind {
        match self {
            BufferMemory::U8(_) => ElementKind::U8,
            BufferMemory::U32(_) => ElementKind::U32,
        }
    }

    /// Number of elements in the storage.
    pub fn len(&self) -> usize {
        match self {
            BufferMemory::U8(m) => m.len(),
            BufferMemory::U32(m) => m.len(),
        }
    }

    /// Whether the storage holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An element type that device buffers can hold.
///
/// Every element has an atomic twin so that concurrent work-items can share a
/// buffer without locks. Plain loads and stores use relaxed ordering; the
/// dispatch boundary is what orders one kernel's writes before the next reads.
pub trait DeviceElement: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// The atomic cell type backing one element.
    type Atomic: Send + Sync + 'static;

    /// The runtime tag of the element type.
    const KIND: ElementKind;

    /// Create an atomic cell holding `value`.
    fn new_atomic(value: Self) -> Self::Atomic;

    /// Load the value of a cell.
    fn load(cell: &Self::Atomic) -> Self;

    /// Store a value into a cell.
    fn store(cell: &Self::Atomic, value: Self);

    /// Erase the element type of the storage.
    fn erase(memory: Arc<[Self::Atomic]>) -> BufferMemory;
}

impl DeviceElement for u8 {
    type Atomic = AtomicU8;
    const KIND: ElementKind = ElementKind::U8;

    fn new_atomic(value: Self) -> Self::Atomic {
        AtomicU8::new(value)
    }

    fn load(cell: &Self::Atomic) -> Self {
        cell.load(Ordering::Relaxed)
    }

    fn store(cell: &Self::Atomic, value: Self) {
        cell.store(value, Ordering::Relaxed)
    }

    fn erase(memory: Arc<[Self::Atomic]>) -> BufferMemory {
        BufferMemory::U8(memory)
    }
}

impl DeviceElement for u32 {
    type Atomic = AtomicU32;
    const KIND: ElementKind = ElementKind::U32;

    fn new_atomic(value: Self) -> Self::Atomic {
        AtomicU32::new(value)
    }

    fn load(cell: &Self::Atomic) -> Self {
        cell.load(Ordering::Relaxed)
    }

    fn store(cell: &Self::Atomic, value: Self) {
        cell.store(value, Ordering::Relaxed)
    }

    fn erase(memory: Arc<[Self::Atomic]>) -> BufferMemory {
        BufferMemory::U32(memory)
    }
}

/// A typed handle to a device-visible buffer.
///
/// Cloning the handle does not copy the storage; both handles refer to the same
/// device memory.
pub struct Buffer<T: DeviceElement> {
    memory: Arc<[T::Atomic]>,
    access: AccessMode,
    _marker: PhantomData<T>,
}

impl<T: DeviceElement> Buffer<T> {
    /// Allocate host-visible device memory with every element set to `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::InvalidBufferSize`] if `len` is zero.
    pub fn zeroed(access: AccessMode, len: usize) -> Result<Self, ComputeError> {
        if len == 0 {
            return Err(ComputeError::InvalidBufferSize(len));
        }

        let memory = (0..len)
            .map(|_| T::new_atomic(T::default()))
            .collect::<Arc<[T::Atomic]>>();

        Ok(Self {
            memory,
            access,
            _marker: PhantomData,
        })
    }

    /// Number of elements in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    /// Whether the buffer holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// Size of the buffer in bytes.
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.len() * T::KIND.size_in_bytes()
    }

    /// The kernel access mode of the buffer.
    #[inline]
    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// The atomic cells of the buffer.
    #[inline]
    pub fn cells(&self) -> &[T::Atomic] {
        &self.memory
    }

    /// Copy the buffer contents into a host vector.
    pub fn to_vec(&self) -> Vec<T> {
        self.memory.iter().map(T::load).collect()
    }

    /// Type-erased view of the storage, for binding as a kernel argument.
    pub fn memory(&self) -> BufferMemory {
        T::erase(self.memory.clone())
    }
}

impl<T: DeviceElement> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            memory: self.memory.clone(),
            access: self.access,
            _marker: PhantomData,
        }
    }
}

impl<T: DeviceElement> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("kind", &T::KIND)
            .field("len", &self.len())
            .field("access", &self.access)
            .finish()
    }
}
