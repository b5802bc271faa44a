//! Physical layout of 4D CPU buffers.
//!
//! Dims and strides are always reported in logical `N, C, H, W` order; the format
//! only decides which logical axis is innermost in memory.

use primdesc::{DType, MemoryDesc, MemoryFormat, TensorDesc};

/// Resolves `Any` to the layout the reference implementations prefer.
pub const fn resolve_format(format: MemoryFormat) -> MemoryFormat {
    match format {
        MemoryFormat::Any | MemoryFormat::Nchw => MemoryFormat::Nchw,
        MemoryFormat::Nhwc => MemoryFormat::Nhwc,
    }
}

/// Logical axes listed from outermost to innermost in memory.
pub const fn physical_order(format: MemoryFormat) -> [usize; 4] {
    match resolve_format(format) {
        MemoryFormat::Nhwc => [0, 2, 3, 1],
        _ => [0, 1, 2, 3],
    }
}

/// Dense logical-order strides for `dims` laid out as `format`, with overflow checking.
pub fn dense_strides(dims: [usize; 4], format: MemoryFormat) -> Option<[usize; 4]> {
    let order = physical_order(format);
    let mut strides = [0usize; 4];
    let mut stride = 1usize;
    for &axis in order.iter().rev() {
        strides[axis] = stride;
        stride = stride.checked_mul(dims[axis])?;
    }
    Some(strides)
}

/// Concrete memory descriptor bound by the reference CPU implementations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuMemoryDesc {
    dims: [usize; 4],
    dtype: DType,
    format: MemoryFormat,
    strides: [usize; 4],
}

impl CpuMemoryDesc {
    /// Returns `None` when the buffer size overflows `usize`.
    pub fn new(dims: [usize; 4], dtype: DType, format: MemoryFormat) -> Option<Self> {
        let format = resolve_format(format);
        let strides = dense_strides(dims, format)?;
        dims.iter()
            .try_fold(dtype.size_in_bytes(), |len, dim| len.checked_mul(*dim))?;
        Some(Self {
            dims,
            dtype,
            format,
            strides,
        })
    }

    pub fn from_tensor_desc(desc: &TensorDesc) -> Option<Self> {
        Self::new(desc.dims, desc.dtype, desc.format)
    }

    pub fn strides(&self) -> &[usize; 4] {
        &self.strides
    }
}

impl MemoryDesc for CpuMemoryDesc {
    fn dims(&self) -> &[usize] {
        &self.dims
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn format(&self) -> MemoryFormat {
        self.format
    }
}
