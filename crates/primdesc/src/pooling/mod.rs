//! Pooling primitive descriptors.
//!
//! [`PoolingFwdPd`] and [`PoolingBwdPd`] are sibling types that share the
//! [`PoolingPd`] capability: code written against "a pooling descriptor" only
//! branches on direction where it constructs one. Which side carries the optional
//! workspace port differs between them:
//!
//! | descriptor | inputs | outputs |
//! |---|---|---|
//! | forward | `src` | `dst`, optional `workspace` |
//! | backward | `diff_dst`, optional `workspace` | `diff_src` |
//!
//! Workspace presence is decided by the bound implementation and read through
//! its `workspace_md()`, never stored on the descriptor.

mod bwd;
mod desc;
mod fwd;

use std::fmt::Write as _;

use thiserror::Error;

use crate::memory::TensorDesc;
use crate::primitive::PrimitiveDesc;

pub use crate::primitive::PropKind;
pub use bwd::{PoolingBwdImpl, PoolingBwdPd};
pub use desc::{
    pooled_dst_desc, pooling_output_extent, DescError, DescSerdeError, PaddingKind, PoolingAlg,
    PoolingDesc, PoolingWindow,
};
pub use fwd::{PoolingFwdImpl, PoolingFwdPd};

/// An implementation declined to bind itself to a pooling descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImplError {
    #[error("unimplemented: {reason}")]
    Unimplemented { reason: String },
}

impl ImplError {
    pub fn unimplemented(reason: impl Into<String>) -> Self {
        ImplError::Unimplemented {
            reason: reason.into(),
        }
    }
}

pub type ImplResult<T> = Result<T, ImplError>;

/// Capability shared by forward and backward pooling descriptors.
///
/// Geometry accessors are projections of the stored [`PoolingDesc`]: `mb`, `c`,
/// `ih`, `iw` come from [`PoolingPd::input_tensor`], `oh`, `ow` from
/// [`PoolingPd::output_tensor`], the rest from the window fields.
pub trait PoolingPd: PrimitiveDesc {
    fn desc(&self) -> &PoolingDesc;

    /// `src` for forward descriptors, `diff_src` for backward ones.
    fn input_tensor(&self) -> &TensorDesc;

    /// `dst` for forward descriptors, `diff_dst` for backward ones.
    fn output_tensor(&self) -> &TensorDesc;

    fn hint_fwd_pd(&self) -> Option<&PoolingFwdPd<'_>>;

    fn is_fwd(&self) -> bool {
        self.desc().is_forward()
    }

    fn has_workspace(&self) -> bool {
        self.workspace_md(0).is_some()
    }

    fn mb(&self) -> usize {
        self.input_tensor().dims[0]
    }

    fn c(&self) -> usize {
        self.input_tensor().dims[1]
    }

    fn ih(&self) -> usize {
        self.input_tensor().dims[2]
    }

    fn iw(&self) -> usize {
        self.input_tensor().dims[3]
    }

    fn oh(&self) -> usize {
        self.output_tensor().dims[2]
    }

    fn ow(&self) -> usize {
        self.output_tensor().dims[3]
    }

    fn kh(&self) -> usize {
        self.desc().kernel[0]
    }

    fn kw(&self) -> usize {
        self.desc().kernel[1]
    }

    fn ksh(&self) -> usize {
        self.desc().strides[0]
    }

    fn ksw(&self) -> usize {
        self.desc().strides[1]
    }

    fn pad_t(&self) -> usize {
        self.desc().padding[0][0]
    }

    fn pad_b(&self) -> usize {
        self.desc().padding[1][0]
    }

    fn pad_l(&self) -> usize {
        self.desc().padding[0][1]
    }

    fn pad_r(&self) -> usize {
        self.desc().padding[1][1]
    }
}

/// One-line summary of a pooling descriptor, e.g.
/// `ref:any,forward_training,pooling_max,mb2ic3ih8iw8oh4ow4kh2kw2sh2sw2pt0pb0pl0pr0`.
pub fn pooling_info<P: PoolingPd + ?Sized>(pd: &P) -> String {
    let desc = pd.desc();
    let mut info = format!(
        "{},{},{},",
        pd.impl_name(),
        desc.prop_kind.as_str(),
        desc.alg_kind.as_str()
    );
    let _ = write!(
        info,
        "mb{}ic{}ih{}iw{}oh{}ow{}kh{}kw{}sh{}sw{}pt{}pb{}pl{}pr{}",
        pd.mb(),
        pd.c(),
        pd.ih(),
        pd.iw(),
        pd.oh(),
        pd.ow(),
        pd.kh(),
        pd.kw(),
        pd.ksh(),
        pd.ksw(),
        pd.pad_t(),
        pd.pad_b(),
        pd.pad_l(),
        pd.pad_r()
    );
    info
}
