use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::{DType, TensorDesc};
use crate::primitive::{PrimitiveKind, PropKind};

/// Reduction applied over each pooling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolingAlg {
    Max,
    /// Average over the full window, padded positions included.
    AvgIncludePadding,
    /// Average over the in-bounds part of the window only.
    AvgExcludePadding,
}

impl PoolingAlg {
    pub fn as_str(self) -> &'static str {
        match self {
            PoolingAlg::Max => "pooling_max",
            PoolingAlg::AvgIncludePadding => "pooling_avg_include_padding",
            PoolingAlg::AvgExcludePadding => "pooling_avg_exclude_padding",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaddingKind {
    #[default]
    Zero,
}

/// Spatial window parameters, indexed `[height, width]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PoolingWindow {
    pub kernel: [usize; 2],
    pub strides: [usize; 2],
    /// Top and left padding.
    pub padding_l: [usize; 2],
    /// Bottom and right padding.
    pub padding_r: [usize; 2],
}

impl PoolingWindow {
    pub const fn new(
        kernel: [usize; 2],
        strides: [usize; 2],
        padding_l: [usize; 2],
        padding_r: [usize; 2],
    ) -> Self {
        Self {
            kernel,
            strides,
            padding_l,
            padding_r,
        }
    }

    /// Square window with no padding.
    pub const fn square(kernel: usize, stride: usize) -> Self {
        Self::new([kernel, kernel], [stride, stride], [0, 0], [0, 0])
    }

    /// Output extent along a spatial axis (0 = height, 1 = width) for an input extent.
    pub fn output_extent(&self, axis: usize, input: usize) -> Option<usize> {
        pooling_output_extent(
            input,
            self.kernel[axis],
            self.strides[axis],
            self.padding_l[axis],
            self.padding_r[axis],
        )
    }
}

/// Computes `(input + pad_lo + pad_hi - kernel) / stride + 1`.
///
/// Returns `None` for a zero stride or when the window does not fit the padded input.
pub fn pooling_output_extent(
    input: usize,
    kernel: usize,
    stride: usize,
    pad_lo: usize,
    pad_hi: usize,
) -> Option<usize> {
    if stride == 0 {
        return None;
    }
    let padded = input.checked_add(pad_lo)?.checked_add(pad_hi)?;
    let span = padded.checked_sub(kernel)?;
    Some(span / stride + 1)
}

/// Destination tensor record for pooling `src` through `window`, same dtype and format.
pub fn pooled_dst_desc(src: &TensorDesc, window: &PoolingWindow) -> Option<TensorDesc> {
    let [n, c, h, w] = src.dims;
    let oh = window.output_extent(0, h)?;
    let ow = window.output_extent(1, w)?;
    Some(TensorDesc::new([n, c, oh, ow], src.dtype, src.format))
}

/// Malformed pooling operation descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescError {
    #[error("operation descriptor is a {0:?} descriptor, not pooling")]
    NotPooling(PrimitiveKind),
    #[error("{initializer} pooling descriptor cannot carry prop kind {found:?}")]
    InvalidPropKind {
        initializer: &'static str,
        found: PropKind,
    },
    #[error("kernel extent on spatial axis {axis} is zero")]
    ZeroKernel { axis: usize },
    #[error("stride on spatial axis {axis} is zero")]
    ZeroStride { axis: usize },
    #[error("{tensor} has a zero extent on dim {dim}")]
    ZeroDimension { tensor: &'static str, dim: usize },
    #[error("{input_tensor} is {input:?} but {output_tensor} is {output:?} on mini-batch/channels")]
    BatchChannelMismatch {
        input_tensor: &'static str,
        output_tensor: &'static str,
        input: [usize; 2],
        output: [usize; 2],
    },
    #[error("padding {padding} on spatial axis {axis} is not smaller than kernel {kernel}")]
    PaddingExceedsKernel {
        axis: usize,
        padding: usize,
        kernel: usize,
    },
    #[error("window {window} exceeds padded input {padded_input} on spatial axis {axis}")]
    WindowLargerThanInput {
        axis: usize,
        window: usize,
        padded_input: usize,
    },
    #[error("output extent on spatial axis {axis} is {actual}, expected {expected}")]
    OutputExtentMismatch {
        axis: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum DescSerdeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid pooling descriptor: {0}")]
    Invalid(#[from] DescError),
}

/// Immutable record of a pooling operation's shape and geometry.
///
/// Forward descriptors populate `src_desc`/`dst_desc`; backward descriptors populate
/// `diff_src_desc`/`diff_dst_desc`. The unused pair stays at `TensorDesc::default()`.
/// `padding[0]` holds `[top, left]` and `padding[1]` holds `[bottom, right]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolingDesc {
    pub primitive_kind: PrimitiveKind,
    pub prop_kind: PropKind,
    pub alg_kind: PoolingAlg,
    pub src_desc: TensorDesc,
    pub diff_src_desc: TensorDesc,
    pub dst_desc: TensorDesc,
    pub diff_dst_desc: TensorDesc,
    pub strides: [usize; 2],
    pub kernel: [usize; 2],
    pub padding: [[usize; 2]; 2],
    #[serde(default)]
    pub padding_kind: PaddingKind,
    pub accum_dtype: DType,
}

impl PoolingDesc {
    /// Initializes a forward pooling descriptor, rejecting inconsistent geometry.
    pub fn forward(
        prop_kind: PropKind,
        alg_kind: PoolingAlg,
        src_desc: TensorDesc,
        dst_desc: TensorDesc,
        window: PoolingWindow,
    ) -> Result<Self, DescError> {
        if !prop_kind.is_forward() {
            return Err(DescError::InvalidPropKind {
                initializer: "forward",
                found: prop_kind,
            });
        }
        check_geometry(("src", &src_desc), ("dst", &dst_desc), &window)?;
        Ok(Self {
            primitive_kind: PrimitiveKind::Pooling,
            prop_kind,
            alg_kind,
            src_desc,
            diff_src_desc: TensorDesc::default(),
            dst_desc,
            diff_dst_desc: TensorDesc::default(),
            strides: window.strides,
            kernel: window.kernel,
            padding: [window.padding_l, window.padding_r],
            padding_kind: PaddingKind::Zero,
            accum_dtype: src_desc.dtype.accumulation(),
        })
    }

    /// Initializes a backward (data gradient) pooling descriptor.
    pub fn backward(
        alg_kind: PoolingAlg,
        diff_src_desc: TensorDesc,
        diff_dst_desc: TensorDesc,
        window: PoolingWindow,
    ) -> Result<Self, DescError> {
        check_geometry(
            ("diff_src", &diff_src_desc),
            ("diff_dst", &diff_dst_desc),
            &window,
        )?;
        Ok(Self {
            primitive_kind: PrimitiveKind::Pooling,
            prop_kind: PropKind::BackwardData,
            alg_kind,
            src_desc: TensorDesc::default(),
            diff_src_desc,
            dst_desc: TensorDesc::default(),
            diff_dst_desc,
            strides: window.strides,
            kernel: window.kernel,
            padding: [window.padding_l, window.padding_r],
            padding_kind: PaddingKind::Zero,
            accum_dtype: diff_src_desc.dtype.accumulation(),
        })
    }

    pub fn window(&self) -> PoolingWindow {
        PoolingWindow::new(self.kernel, self.strides, self.padding[0], self.padding[1])
    }

    pub fn is_forward(&self) -> bool {
        self.prop_kind.is_forward()
    }

    /// Re-runs the initializer checks, e.g. on a deserialized record.
    pub fn validate(&self) -> Result<(), DescError> {
        if self.primitive_kind != PrimitiveKind::Pooling {
            return Err(DescError::NotPooling(self.primitive_kind));
        }
        let window = self.window();
        if self.is_forward() {
            check_geometry(("src", &self.src_desc), ("dst", &self.dst_desc), &window)
        } else {
            check_geometry(
                ("diff_src", &self.diff_src_desc),
                ("diff_dst", &self.diff_dst_desc),
                &window,
            )
        }
    }

    pub fn to_json_string(&self) -> Result<String, DescSerdeError> {
        serde_json::to_string_pretty(self).map_err(DescSerdeError::from)
    }

    pub fn from_json_str(src: &str) -> Result<Self, DescSerdeError> {
        let desc: PoolingDesc = serde_json::from_str(src)?;
        desc.validate()?;
        Ok(desc)
    }
}

fn check_geometry(
    (input_name, input): (&'static str, &TensorDesc),
    (output_name, output): (&'static str, &TensorDesc),
    window: &PoolingWindow,
) -> Result<(), DescError> {
    for axis in 0..2 {
        if window.kernel[axis] == 0 {
            return Err(DescError::ZeroKernel { axis });
        }
        if window.strides[axis] == 0 {
            return Err(DescError::ZeroStride { axis });
        }
    }
    for (tensor, desc) in [(input_name, input), (output_name, output)] {
        if let Some(dim) = desc.dims.iter().position(|extent| *extent == 0) {
            return Err(DescError::ZeroDimension { tensor, dim });
        }
    }

    let input_nc = [input.dims[0], input.dims[1]];
    let output_nc = [output.dims[0], output.dims[1]];
    if input_nc != output_nc {
        return Err(DescError::BatchChannelMismatch {
            input_tensor: input_name,
            output_tensor: output_name,
            input: input_nc,
            output: output_nc,
        });
    }

    for axis in 0..2 {
        let kernel = window.kernel[axis];
        for padding in [window.padding_l[axis], window.padding_r[axis]] {
            if padding >= kernel {
                return Err(DescError::PaddingExceedsKernel {
                    axis,
                    padding,
                    kernel,
                });
            }
        }

        let in_extent = input.dims[axis + 2];
        let expected = window.output_extent(axis, in_extent).ok_or_else(|| {
            DescError::WindowLargerThanInput {
                axis,
                window: kernel,
                padded_input: in_extent
                    .saturating_add(window.padding_l[axis])
                    .saturating_add(window.padding_r[axis]),
            }
        })?;
        let actual = output.dims[axis + 2];
        if expected != actual {
            return Err(DescError::OutputExtentMismatch {
                axis,
                expected,
                actual,
            });
        }
    }
    Ok(())
}
