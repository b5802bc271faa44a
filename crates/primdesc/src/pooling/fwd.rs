use std::fmt;

use crate::engine::Engine;
use crate::memory::{MemoryDesc, TensorDesc};
use crate::primitive::{
    base_query, OpDesc, PrimitiveAttr, PrimitiveDesc, PrimitiveDescBase, PrimitiveKind, PropKind,
    Query, QueryResult, QueryValue,
};

use super::{pooling_info, PoolingDesc, PoolingPd};

/// Memory descriptors a forward pooling implementation binds to its ports.
pub trait PoolingFwdImpl: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn src_md(&self) -> &dyn MemoryDesc;

    fn dst_md(&self) -> &dyn MemoryDesc;

    /// Auxiliary state handed to the matching backward pass, if this implementation keeps any.
    fn workspace_md(&self) -> Option<&dyn MemoryDesc> {
        None
    }
}

/// Forward pooling primitive descriptor: input `src`; outputs `dst` and an
/// optional workspace.
#[derive(Debug)]
pub struct PoolingFwdPd<'h> {
    base: PrimitiveDescBase,
    desc: PoolingDesc,
    hint_fwd_pd: Option<&'h PoolingFwdPd<'h>>,
    imp: Box<dyn PoolingFwdImpl>,
}

impl<'h> PoolingFwdPd<'h> {
    /// Stores a copy of `desc`; the hint is only borrowed.
    pub fn new(
        engine: Engine,
        desc: &PoolingDesc,
        attr: PrimitiveAttr,
        hint_fwd_pd: Option<&'h PoolingFwdPd<'h>>,
        imp: Box<dyn PoolingFwdImpl>,
    ) -> Self {
        Self {
            base: PrimitiveDescBase::new(engine, PrimitiveKind::Pooling, attr),
            desc: desc.clone(),
            hint_fwd_pd,
            imp,
        }
    }

    pub fn is_training(&self) -> bool {
        self.desc.prop_kind == PropKind::ForwardTraining
    }
}

impl PrimitiveDesc for PoolingFwdPd<'_> {
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
            0 => self.src_md(0),
            _ => None,
        }
    }

    fn output_port(&self, index: usize) -> Option<&dyn MemoryDesc> {
        match index {
            0 => self.dst_md(0),
            1 => self.workspace_md(0),
            _ => None,
        }
    }

    fn input_port_count(&self) -> usize {
        1
    }

    fn output_port_count(&self) -> usize {
        1 + usize::from(self.workspace_md(0).is_some())
    }

    fn src_md(&self, index: usize) -> Option<&dyn MemoryDesc> {
        (index == 0).then(|| self.imp.src_md())
    }

    fn dst_md(&self, index: usize) -> Option<&dyn MemoryDesc> {
        (index == 0).then(|| self.imp.dst_md())
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

impl PoolingPd for PoolingFwdPd<'_> {
    fn desc(&self) -> &PoolingDesc {
        &self.desc
    }

    fn input_tensor(&self) -> &TensorDesc {
        &self.desc.src_desc
    }

    fn output_tensor(&self) -> &TensorDesc {
        &self.desc.dst_desc
    }

    fn hint_fwd_pd(&self) -> Option<&PoolingFwdPd<'_>> {
        self.hint_fwd_pd
    }
}

impl fmt::Display for PoolingFwdPd<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pooling_info(self))
    }
}
