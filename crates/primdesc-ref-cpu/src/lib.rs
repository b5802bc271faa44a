//! Reference CPU pooling implementations for `primdesc`.
//!
//! Both directions register as `ref:any` on [`EngineKind::Cpu`]. Registration runs
//! automatically before the first registry lookup; [`register_ref_pooling`] can also
//! be called directly and is idempotent.

pub mod layout;
pub mod pooling;

use primdesc::registry::{register_pooling_bwd, register_pooling_fwd};
use primdesc::EngineKind;

pub use layout::CpuMemoryDesc;
pub use pooling::{workspace_dtype, RefPoolingBwd, RefPoolingFwd, REF_IMPL_NAME};

/// Registers both directions; safe to call again to make sure they are present.
pub fn register_ref_pooling() {
    log::debug!("registering reference pooling as {REF_IMPL_NAME}");
    register_pooling_fwd(REF_IMPL_NAME, EngineKind::Cpu, RefPoolingFwd::create);
    register_pooling_bwd(REF_IMPL_NAME, EngineKind::Cpu, RefPoolingBwd::create);
}

#[primdesc::linkme::distributed_slice(primdesc::registry::IMPL_REGISTRARS)]
#[linkme(crate = primdesc::linkme)]
static REGISTER_REF_POOLING: fn() = register_ref_pooling;
