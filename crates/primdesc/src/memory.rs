//! Memory (buffer) descriptor capability and the plain tensor record stored in
//! operation descriptors.
//!
//! Primitive descriptors never look inside a [`MemoryDesc`]; they only hand the
//! handle provided by the bound implementation back to the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scalar element types a tensor record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DType {
    Si8,
    Ui8,
    Si16,
    Si32,
    Bf16,
    F16,
    #[default]
    F32,
}

impl DType {
    /// Returns `true` when the dtype is a signed or unsigned integer.
    pub fn is_integer(self) -> bool {
        matches!(self, DType::Si8 | DType::Ui8 | DType::Si16 | DType::Si32)
    }

    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::Si8 | DType::Ui8 => 1,
            DType::Si16 | DType::Bf16 | DType::F16 => 2,
            DType::Si32 | DType::F32 => 4,
        }
    }

    /// Default accumulation type for reductions over this dtype.
    pub fn accumulation(self) -> DType {
        if self.is_integer() {
            DType::Si32
        } else {
            DType::F32
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DType::Si8 => "s8",
            DType::Ui8 => "u8",
            DType::Si16 => "s16",
            DType::Si32 => "s32",
            DType::Bf16 => "bf16",
            DType::F16 => "f16",
            DType::F32 => "f32",
        }
    }
}

/// Physical layout requested for a 4D tensor.
///
/// `Any` lets the implementation pick; it is resolved when an implementation
/// binds a concrete memory descriptor to a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MemoryFormat {
    #[default]
    Any,
    Nchw,
    Nhwc,
}

impl MemoryFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryFormat::Any => "any",
            MemoryFormat::Nchw => "nchw",
            MemoryFormat::Nhwc => "nhwc",
        }
    }
}

/// Logical 4D tensor record: dims in `N, C, H, W` order regardless of `format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TensorDesc {
    pub dims: [usize; 4],
    pub dtype: DType,
    pub format: MemoryFormat,
}

impl TensorDesc {
    pub const fn new(dims: [usize; 4], dtype: DType, format: MemoryFormat) -> Self {
        Self {
            dims,
            dtype,
            format,
        }
    }

    /// `N, C, H, W` tensor with a dtype and an implementation-chosen layout.
    pub const fn nchw_any(n: usize, c: usize, h: usize, w: usize, dtype: DType) -> Self {
        Self::new([n, c, h, w], dtype, MemoryFormat::Any)
    }

    /// Returns `true` for the all-zero record left in unused descriptor slots.
    pub fn is_zero(&self) -> bool {
        self.dims.iter().all(|dim| *dim == 0)
    }
}

impl fmt::Display for TensorDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [n, c, h, w] = self.dims;
        write!(
            f,
            "{}:{}:{n}x{c}x{h}x{w}",
            self.dtype.as_str(),
            self.format.as_str()
        )
    }
}

/// Opaque handle describing the memory layout bound to one port.
///
/// Produced by an implementation; primitive descriptors only forward it.
pub trait MemoryDesc: fmt::Debug + Send + Sync {
    /// Logical dims of the described buffer.
    fn dims(&self) -> &[usize];

    fn dtype(&self) -> DType;

    /// Resolved physical layout. Never `MemoryFormat::Any` for a bound buffer.
    fn format(&self) -> MemoryFormat;

    /// Size of the described buffer in bytes.
    fn byte_len(&self) -> Option<usize> {
        self.dims()
            .iter()
            .try_fold(self.dtype().size_in_bytes(), |len, dim| len.checked_mul(*dim))
    }
}
