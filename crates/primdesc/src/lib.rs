//! Primitive descriptors for pooling.
//!
//! A primitive descriptor captures what computation is requested (shapes, kernel
//! geometry, padding, forward or backward propagation) as an immutable object that
//! can be introspected before any numeric kernel runs. Callers discover port arity,
//! per-port memory descriptors and operation metadata through [`PrimitiveDesc`]
//! without knowing the concrete descriptor type.

extern crate self as primdesc;

pub use linkme;

pub mod engine;
mod env;
pub mod memory;
pub mod pooling;
pub mod primitive;
pub mod registry;

pub use engine::{Engine, EngineKind};
pub use memory::{DType, MemoryDesc, MemoryFormat, TensorDesc};
pub use pooling::{
    PoolingAlg, PoolingBwdImpl, PoolingBwdPd, PoolingDesc, PoolingFwdImpl, PoolingFwdPd,
    PoolingPd, PropKind,
};
pub use primitive::{
    OpDesc, PrimitiveAttr, PrimitiveDesc, PrimitiveKind, Query, QueryError, QueryResult,
    QueryValue,
};
