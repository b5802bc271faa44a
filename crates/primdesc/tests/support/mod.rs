#![allow(dead_code)]

use primdesc::pooling::{PoolingBwdImpl, PoolingFwdImpl, PoolingWindow};
use primdesc::{
    DType, Engine, MemoryDesc, MemoryFormat, PoolingAlg, PoolingBwdPd, PoolingDesc, PoolingFwdPd,
    PrimitiveAttr, PropKind, TensorDesc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubMd {
    pub dims: Vec<usize>,
    pub dtype: DType,
}

impl StubMd {
    pub fn from_tensor(desc: &TensorDesc) -> Self {
        Self {
            dims: desc.dims.to_vec(),
            dtype: desc.dtype,
        }
    }
}

impl MemoryDesc for StubMd {
    fn dims(&self) -> &[usize] {
        &self.dims
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn format(&self) -> MemoryFormat {
        MemoryFormat::Nchw
    }
}

#[derive(Debug)]
pub struct StubFwd {
    pub name: &'static str,
    pub src: StubMd,
    pub dst: StubMd,
    pub workspace: Option<StubMd>,
}

impl StubFwd {
    pub fn new(desc: &PoolingDesc, with_workspace: bool) -> Self {
        let dst = StubMd::from_tensor(&desc.dst_desc);
        Self {
            name: "stub",
            src: StubMd::from_tensor(&desc.src_desc),
            workspace: with_workspace.then(|| StubMd {
                dims: dst.dims.clone(),
                dtype: DType::Ui8,
            }),
            dst,
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl PoolingFwdImpl for StubFwd {
    fn name(&self) -> &str {
        self.name
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

#[derive(Debug)]
pub struct StubBwd {
    pub name: &'static str,
    pub diff_src: StubMd,
    pub diff_dst: StubMd,
    pub workspace: Option<StubMd>,
}

impl StubBwd {
    pub fn new(desc: &PoolingDesc, with_workspace: bool) -> Self {
        let diff_dst = StubMd::from_tensor(&desc.diff_dst_desc);
        Self {
            name: "stub",
            diff_src: StubMd::from_tensor(&desc.diff_src_desc),
            workspace: with_workspace.then(|| StubMd {
                dims: diff_dst.dims.clone(),
                dtype: DType::Ui8,
            }),
            diff_dst,
        }
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl PoolingBwdImpl for StubBwd {
    fn name(&self) -> &str {
        self.name
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

/// `[2, 3, 8, 8]` pooled by a 2x2 window with stride 2 into `[2, 3, 4, 4]`.
pub fn fwd_desc(prop_kind: PropKind, alg: PoolingAlg) -> PoolingDesc {
    PoolingDesc::forward(
        prop_kind,
        alg,
        TensorDesc::nchw_any(2, 3, 8, 8, DType::F32),
        TensorDesc::nchw_any(2, 3, 4, 4, DType::F32),
        PoolingWindow::square(2, 2),
    )
    .unwrap_or_else(|err| panic!("sample forward desc should be valid: {err}"))
}

pub fn bwd_desc(alg: PoolingAlg) -> PoolingDesc {
    PoolingDesc::backward(
        alg,
        TensorDesc::nchw_any(2, 3, 8, 8, DType::F32),
        TensorDesc::nchw_any(2, 3, 4, 4, DType::F32),
        PoolingWindow::square(2, 2),
    )
    .unwrap_or_else(|err| panic!("sample backward desc should be valid: {err}"))
}

pub fn fwd_pd(desc: &PoolingDesc, with_workspace: bool) -> PoolingFwdPd<'static> {
    PoolingFwdPd::new(
        Engine::cpu(),
        desc,
        PrimitiveAttr::default(),
        None,
        Box::new(StubFwd::new(desc, with_workspace)),
    )
}

pub fn bwd_pd<'h>(
    desc: &PoolingDesc,
    hint: &'h PoolingFwdPd<'h>,
    with_workspace: bool,
) -> PoolingBwdPd<'h> {
    PoolingBwdPd::new(
        Engine::cpu(),
        desc,
        PrimitiveAttr::default(),
        hint,
        Box::new(StubBwd::new(desc, with_workspace)),
    )
}
