//! Reference pooling implementations.
//!
//! Forward max pooling in training mode keeps the arg-max position of every
//! window in a workspace shaped like `dst`; the backward pass reads it back
//! instead of recomputing the maxima. Inference and average pooling need no
//! workspace.

use primdesc::pooling::{ImplError, ImplResult, PoolingAlg, PoolingBwdImpl, PoolingFwdImpl};
use primdesc::primitive::RoundMode;
use primdesc::{
    DType, MemoryDesc, PoolingDesc, PoolingFwdPd, PrimitiveAttr, PrimitiveDesc, PropKind,
    TensorDesc,
};

use crate::layout::CpuMemoryDesc;

/// Name both reference implementations register under.
pub const REF_IMPL_NAME: &str = "ref:any";

/// Windows with fewer positions than this index the workspace with `u8`.
const U8_WORKSPACE_WINDOW_LIMIT: usize = 256;

/// Element type of the max-pooling workspace for a kernel.
pub fn workspace_dtype(kernel: [usize; 2]) -> DType {
    match kernel[0].checked_mul(kernel[1]) {
        Some(positions) if positions < U8_WORKSPACE_WINDOW_LIMIT => DType::Ui8,
        _ => DType::Si32,
    }
}

fn bind_data(desc: &TensorDesc, tensor: &str) -> ImplResult<CpuMemoryDesc> {
    if !matches!(desc.dtype, DType::F32 | DType::Si32 | DType::Si8 | DType::Ui8) {
        return Err(ImplError::unimplemented(format!(
            "{tensor} dtype {} is not supported",
            desc.dtype.as_str()
        )));
    }
    CpuMemoryDesc::from_tensor_desc(desc)
        .ok_or_else(|| ImplError::unimplemented(format!("{tensor} {desc} overflows usize")))
}

fn bind_pair(
    (input_name, input): (&str, &TensorDesc),
    (output_name, output): (&str, &TensorDesc),
) -> ImplResult<(CpuMemoryDesc, CpuMemoryDesc)> {
    if input.dtype != output.dtype {
        return Err(ImplError::unimplemented(format!(
            "{input_name} ({}) and {output_name} ({}) dtypes differ",
            input.dtype.as_str(),
            output.dtype.as_str()
        )));
    }
    Ok((bind_data(input, input_name)?, bind_data(output, output_name)?))
}

/// Integer averages are rounded to nearest; other rounding modes are declined.
fn check_round_mode(alg: PoolingAlg, data: DType, attr: &PrimitiveAttr) -> ImplResult<()> {
    let averages = matches!(
        alg,
        PoolingAlg::AvgIncludePadding | PoolingAlg::AvgExcludePadding
    );
    if averages && data.is_integer() && attr.round_mode != RoundMode::Nearest {
        return Err(ImplError::unimplemented(format!(
            "round mode {:?} for {} average pooling",
            attr.round_mode,
            data.as_str()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RefPoolingFwd {
    src: CpuMemoryDesc,
    dst: CpuMemoryDesc,
    workspace: Option<CpuMemoryDesc>,
}

impl RefPoolingFwd {
    pub fn create(
        desc: &PoolingDesc,
        attr: &PrimitiveAttr,
        _hint_fwd_pd: Option<&PoolingFwdPd<'_>>,
    ) -> ImplResult<Box<dyn PoolingFwdImpl>> {
        let (src, dst) = bind_pair(("src", &desc.src_desc), ("dst", &desc.dst_desc))?;
        check_round_mode(desc.alg_kind, desc.src_desc.dtype, attr)?;
        let workspace =
            if desc.alg_kind == PoolingAlg::Max && desc.prop_kind == PropKind::ForwardTraining {
                let md = CpuMemoryDesc::new(
                    desc.dst_desc.dims,
                    workspace_dtype(desc.kernel),
                    dst.format(),
                )
                .ok_or_else(|| ImplError::unimplemented("workspace size overflows usize"))?;
                Some(md)
            } else {
                None
            };
        Ok(Box::new(Self {
            src,
            dst,
            workspace,
        }))
    }
}

impl PoolingFwdImpl for RefPoolingFwd {
    fn name(&self) -> &str {
        REF_IMPL_NAME
    }

    fn src_md(&self) -> &dyn MemoryDesc {
        &self.src
    }

    fn dst_md(&self) -> &dyn MemoryDesc {
        &self.dst
    }

    fn workspace_md(&self) -> Option<&dyn MemoryDesc> {
        self.workspace.as_ref().map(|md| md as &dyn MemoryDesc)
    }
}

#[derive(Debug, Clone)]
pub struct RefPoolingBwd {
    diff_src: CpuMemoryDesc,
    diff_dst: CpuMemoryDesc,
    workspace: Option<CpuMemoryDesc>,
}

impl RefPoolingBwd {
    /// Max pooling takes its workspace layout from the forward hint, which must
    /// have one.
    pub fn create(
        desc: &PoolingDesc,
        attr: &PrimitiveAttr,
        hint_fwd_pd: &PoolingFwdPd<'_>,
    ) -> ImplResult<Box<dyn PoolingBwdImpl>> {
        let (diff_src, diff_dst) = bind_pair(
            ("diff_src", &desc.diff_src_desc),
            ("diff_dst", &desc.diff_dst_desc),
        )?;
        check_round_mode(desc.alg_kind, desc.diff_src_desc.dtype, attr)?;
        let workspace = match desc.alg_kind {
            PoolingAlg::Max => {
                let hint_ws = hint_fwd_pd.workspace_md(0).ok_or_else(|| {
                    ImplError::unimplemented(
                        "max pooling backward needs a forward hint with a workspace",
                    )
                })?;
                Some(mirror_workspace(hint_ws)?)
            }
            PoolingAlg::AvgIncludePadding | PoolingAlg::AvgExcludePadding => None,
        };
        Ok(Box::new(Self {
            diff_src,
            diff_dst,
            workspace,
        }))
    }
}

fn mirror_workspace(md: &dyn MemoryDesc) -> ImplResult<CpuMemoryDesc> {
    let dims = <[usize; 4]>::try_from(md.dims()).map_err(|_| {
        ImplError::unimplemented(format!("workspace of rank {} is not 4D", md.dims().len()))
    })?;
    CpuMemoryDesc::new(dims, md.dtype(), md.format())
        .ok_or_else(|| ImplError::unimplemented("workspace size overflows usize"))
}

impl PoolingBwdImpl for RefPoolingBwd {
    fn name(&self) -> &str {
        REF_IMPL_NAME
    }

    fn diff_src_md(&self) -> &dyn MemoryDesc {
        &self.diff_src
    }

    fn diff_dst_md(&self) -> &dyn MemoryDesc {
        &self.diff_dst
    }

    fn workspace_md(&self) -> Option<&dyn MemoryDesc> {
        self.workspace.as_ref().map(|md| md as &dyn MemoryDesc)
    }
}
