//! Base primitive-descriptor abstraction and the type-erased query protocol.
//!
//! Every concrete descriptor implements [`PrimitiveDesc`]. Its `query` handles the
//! kinds the descriptor defines itself and hands everything else to [`base_query`],
//! which answers the generic categories (engine, kind, attributes, port counts,
//! per-role memory descriptors) or reports [`QueryError::Unimplemented`].

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::Engine;
use crate::memory::MemoryDesc;
use crate::pooling::PoolingDesc;

/// Operation family of a primitive descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Convolution,
    Eltwise,
    Pooling,
    Lrn,
    BatchNormalization,
    InnerProduct,
}

impl PrimitiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveKind::Convolution => "convolution",
            PrimitiveKind::Eltwise => "eltwise",
            PrimitiveKind::Pooling => "pooling",
            PrimitiveKind::Lrn => "lrn",
            PrimitiveKind::BatchNormalization => "batch_normalization",
            PrimitiveKind::InnerProduct => "inner_product",
        }
    }
}

/// Propagation direction requested by an operation descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropKind {
    ForwardTraining,
    ForwardInference,
    BackwardData,
}

impl PropKind {
    pub fn is_forward(self) -> bool {
        matches!(self, PropKind::ForwardTraining | PropKind::ForwardInference)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PropKind::ForwardTraining => "forward_training",
            PropKind::ForwardInference => "forward_inference",
            PropKind::BackwardData => "backward_data",
        }
    }
}

/// Rounding applied when an implementation converts to an integer dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoundMode {
    #[default]
    Nearest,
    Down,
}

/// Attributes attached to a primitive descriptor at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrimitiveAttr {
    #[serde(default)]
    pub round_mode: RoundMode,
}

/// Type-erased view of the operation descriptor a primitive descriptor was built from.
#[derive(Debug, Clone, Copy)]
pub enum OpDesc<'a> {
    Pooling(&'a PoolingDesc),
}

impl OpDesc<'_> {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            OpDesc::Pooling(desc) => desc.primitive_kind,
        }
    }
}

/// Metadata categories a caller can ask a primitive descriptor about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    Engine,
    PrimitiveKind,
    Attr,
    ImplInfo,
    NumInputs,
    NumOutputs,
    MemoryConsumption,
    OpDesc,
    PoolingDesc,
    /// Answered by convolution descriptors only.
    ConvolutionDesc,
    InputPd,
    OutputPd,
    SrcPd,
    DiffSrcPd,
    DstPd,
    DiffDstPd,
    WorkspacePd,
}

/// Answer to a [`Query`].
#[derive(Debug, Clone, Copy)]
pub enum QueryValue<'a> {
    Engine(&'a Engine),
    PrimitiveKind(PrimitiveKind),
    Attr(&'a PrimitiveAttr),
    ImplInfo(&'a str),
    Count(usize),
    Bytes(usize),
    OpDesc(OpDesc<'a>),
    Pooling(&'a PoolingDesc),
    Memory(&'a dyn MemoryDesc),
}

impl<'a> QueryValue<'a> {
    pub fn as_engine(&self) -> Option<&'a Engine> {
        match *self {
            QueryValue::Engine(engine) => Some(engine),
            _ => None,
        }
    }

    pub fn as_count(&self) -> Option<usize> {
        match *self {
            QueryValue::Count(count) => Some(count),
            _ => None,
        }
    }

    pub fn as_impl_info(&self) -> Option<&'a str> {
        match *self {
            QueryValue::ImplInfo(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_pooling_desc(&self) -> Option<&'a PoolingDesc> {
        match *self {
            QueryValue::Pooling(desc) => Some(desc),
            QueryValue::OpDesc(OpDesc::Pooling(desc)) => Some(desc),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<&'a dyn MemoryDesc> {
        match *self {
            QueryValue::Memory(md) => Some(md),
            _ => None,
        }
    }
}

/// Reasons a query produces no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The queried role exists in the protocol but this descriptor has no buffer for it.
    #[error("{what:?} at index {index} is not required by this primitive descriptor")]
    NotRequired { what: Query, index: usize },
    #[error("invalid arguments for {what:?} at index {index}")]
    InvalidArguments { what: Query, index: usize },
    #[error("{0:?} is not implemented by this primitive descriptor")]
    Unimplemented(Query),
}

pub type QueryResult<'a> = Result<QueryValue<'a>, QueryError>;

/// Identity state shared by every primitive descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveDescBase {
    engine: Engine,
    kind: PrimitiveKind,
    attr: PrimitiveAttr,
}

impl PrimitiveDescBase {
    pub fn new(engine: Engine, kind: PrimitiveKind, attr: PrimitiveAttr) -> Self {
        Self { engine, kind, attr }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn attr(&self) -> &PrimitiveAttr {
        &self.attr
    }
}

/// Uniform interface of every primitive descriptor.
///
/// Port accessors return `None` for indices outside the descriptor's port space;
/// they never panic.
pub trait PrimitiveDesc: fmt::Debug + Send + Sync {
    fn engine(&self) -> &Engine;

    fn kind(&self) -> PrimitiveKind;

    fn attr(&self) -> &PrimitiveAttr;

    /// Name of the implementation bound to this descriptor.
    fn impl_name(&self) -> &str;

    fn op_desc(&self) -> Option<OpDesc<'_>> {
        None
    }

    fn input_port(&self, index: usize) -> Option<&dyn MemoryDesc>;

    fn output_port(&self, index: usize) -> Option<&dyn MemoryDesc>;

    fn input_port_count(&self) -> usize;

    fn output_port_count(&self) -> usize;

    fn src_md(&self, _index: usize) -> Option<&dyn MemoryDesc> {
        None
    }

    fn diff_src_md(&self, _index: usize) -> Option<&dyn MemoryDesc> {
        None
    }

    fn dst_md(&self, _index: usize) -> Option<&dyn MemoryDesc> {
        None
    }

    fn diff_dst_md(&self, _index: usize) -> Option<&dyn MemoryDesc> {
        None
    }

    fn workspace_md(&self, _index: usize) -> Option<&dyn MemoryDesc> {
        None
    }

    fn query(&self, what: Query, index: usize) -> QueryResult<'_> {
        base_query(self, what, index)
    }
}

/// Generic query handling shared by all primitive descriptors.
pub fn base_query<P>(pd: &P, what: Query, index: usize) -> QueryResult<'_>
where
    P: PrimitiveDesc + ?Sized,
{
    match what {
        Query::Engine => Ok(QueryValue::Engine(pd.engine())),
        Query::PrimitiveKind => Ok(QueryValue::PrimitiveKind(pd.kind())),
        Query::Attr => Ok(QueryValue::Attr(pd.attr())),
        Query::ImplInfo => Ok(QueryValue::ImplInfo(pd.impl_name())),
        Query::NumInputs => Ok(QueryValue::Count(pd.input_port_count())),
        Query::NumOutputs => Ok(QueryValue::Count(pd.output_port_count())),
        Query::MemoryConsumption => Ok(QueryValue::Bytes(0)),
        Query::OpDesc => match pd.op_desc() {
            Some(op_desc) if index == 0 => Ok(QueryValue::OpDesc(op_desc)),
            _ => Err(QueryError::InvalidArguments { what, index }),
        },
        Query::InputPd => memory_value(pd.input_port(index), what, index),
        Query::OutputPd => memory_value(pd.output_port(index), what, index),
        Query::SrcPd => memory_value(pd.src_md(index), what, index),
        Query::DiffSrcPd => memory_value(pd.diff_src_md(index), what, index),
        Query::DstPd => memory_value(pd.dst_md(index), what, index),
        Query::DiffDstPd => memory_value(pd.diff_dst_md(index), what, index),
        Query::WorkspacePd => memory_value(pd.workspace_md(index), what, index),
        Query::PoolingDesc | Query::ConvolutionDesc => Err(QueryError::Unimplemented(what)),
    }
}

fn memory_value(md: Option<&dyn MemoryDesc>, what: Query, index: usize) -> QueryResult<'_> {
    md.map(QueryValue::Memory)
        .ok_or(QueryError::NotRequired { what, index })
}
