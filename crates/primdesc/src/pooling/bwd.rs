use std::fmt;

use crate::engine::Engine;
use crate::memory::{MemoryDesc, TensorDesc};
use crate::primitive::{
    base_query, OpDesc, PrimitiveAttr, PrimitiveDesc, PrimitiveDescBase, PrimitiveKind, Query,
    QueryResult, QueryValue,
};

use super::{pooling_info, PoolingDesc, PoolingFwdPd, PoolingPd};

/// Memory descriptors a backward pooling implementation binds to its ports.
pub trait PoolingBwdImpl: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Gradient with respect to the forward input.
    fn diff_src_md(&self) -> &dyn MemoryDesc;

    /// Gradient with respect to the forward output.
    fn diff_dst_md(&self) -> &dyn MemoryDesc;

    fn workspace_md(&self) -> Option<&dyn MemoryDesc> {
        None
    }
}

/// Backward pooling primitive descriptor: inputs `diff_dst` and an optional
/// workspace; output `diff_src`.
///
/// The forward hint is borrowed for shape and workspace information. Its geometry
/// is not checked against this descriptor's.
#[derive(Debug)]
pub struct PoolingBwdPd<'h> {
    base: PrimitiveDescBase,
    desc: PoolingDesc,
    hint_fwd_pd: &'h PoolingFwdPd<'h>,
    imp: Box<dyn PoolingBwdImpl>,
}

impl<'h> PoolingBwdPd<'h> {
    pub fn new(
        engine: Engine,
        desc: &PoolingDesc,
        attr: PrimitiveAttr,
        hint_fwd_pd: &'h PoolingFwdPd<'h>,
        imp: Box<dyn PoolingBwdImpl>,
    ) -> Self {
        Self {
            base: PrimitiveDescBase::new(engine, PrimitiveKind::Pooling, attr),
            desc: desc.clone(),
            hint_fwd_pd,
            imp,
        }
    }

    /// The forward descriptor this one was created against.
    pub fn hint(&self) -> &PoolingFwdPd<'h> {
        self.hint_fwd_pd
    }
}

impl PrimitiveDesc for PoolingBwdPd<'_> {
    fn engine(&self) -> &Engine {
        self.base.engine()
    }

    fn kind(&self) -> PrimitiveKind {
        self.base.kind()
    }

    fn attr(&self) -> &PrimitiveAttr {
        self.base.attr()
    }

    fn impl_name(&self) -> &str {
        self.imp.name()
    }

    fn op_desc(&self) -> Option<OpDesc<'_>> {
        Some(OpDesc::Pooling(&self.desc))
    }

    fn input_port(&self, index: usize) -> Option<&dyn MemoryDesc> {
        match index {
            0 => self.diff_dst_md(0),
            1 => self.workspace_md(0),
            _ => None,
        }
    }

    fn output_port(&self, index: usize) -> Option<&dyn MemoryDesc> {
        match index {
            0 => self.diff_src_md(0),
            _ => None,
        }
    }

    fn input_port_count(&self) -> usize {
        1 + usize::from(self.workspace_md(0).is_some())
    }

    fn output_port_count(&self) -> usize {
        1
    }

    fn diff_src_md(&self, index: usize) -> Option<&dyn MemoryDesc> {
        (index == 0).then(|| self.imp.diff_src_md())
    }

    fn diff_dst_md(&self, index: usize) -> Option<&dyn MemoryDesc> {
        (index == 0).then(|| self.imp.diff_dst_md())
    }

    fn workspace_md(&self, index: usize) -> Option<&dyn MemoryDesc> {
        if index == 0 {
            self.imp.workspace_md()
        } else {
            None
        }
    }

    fn query(&self, what: Query, index: usize) -> QueryResult<'_> {
        match what {
            Query::PoolingDesc => Ok(QueryValue::Pooling(&self.desc)),
            _ => base_query(self, what, index),
        }
    }
}

impl PoolingPd for PoolingBwdPd<'_> {
    fn desc(&self) -> &PoolingDesc {
        &self.desc
    }

    fn input_tensor(&self) -> &TensorDesc {
        &self.desc.diff_src_desc
    }

    fn output_tensor(&self) -> &TensorDesc {
        &self.desc.diff_dst_desc
    }

    fn hint_fwd_pd(&self) -> Option<&PoolingFwdPd<'_>> {
        Some(self.hint_fwd_pd)
    }
}

impl fmt::Display for PoolingBwdPd<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pooling_info(self))
    }
}
