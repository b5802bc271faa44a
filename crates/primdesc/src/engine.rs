//! Engine identity a primitive descriptor is bound to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device family an engine executes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    Cpu,
}

impl EngineKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::Cpu => "cpu",
        }
    }
}

/// A concrete engine instance: a device kind plus its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Engine {
    kind: EngineKind,
    index: usize,
}

impl Engine {
    pub const fn new(kind: EngineKind, index: usize) -> Self {
        Self { kind, index }
    }

    /// Convenience constructor for the first CPU engine.
    pub const fn cpu() -> Self {
        Self::new(EngineKind::Cpu, 0)
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.index)
    }
}
