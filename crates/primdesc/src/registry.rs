//! Runtime registry of pooling implementations.
//!
//! Implementations register a constructor per direction under a name and an engine
//! kind. Creating a descriptor walks the matching constructors in registration order
//! and binds the first one that accepts the operation descriptor, so earlier
//! registrations take precedence. An [`ImplPolicy`] can force a specific name.
//!
//! Crates can register from a `linkme` registrar so their implementations are
//! available before the first lookup:
//!
//! ```ignore
//! #[primdesc::linkme::distributed_slice(primdesc::registry::IMPL_REGISTRARS)]
//! #[linkme(crate = primdesc::linkme)]
//! static REGISTER_MY_POOLING: fn() = register_my_pooling;
//! ```

use std::fmt;
use std::sync::{Arc, Once, OnceLock, PoisonError, RwLock};

use thiserror::Error;

use crate::engine::{Engine, EngineKind};
use crate::env;
use crate::pooling::{
    pooling_info, DescError, ImplError, ImplResult, PoolingBwdImpl, PoolingBwdPd, PoolingDesc,
    PoolingFwdImpl, PoolingFwdPd,
};
use crate::primitive::{PrimitiveAttr, PropKind};

/// Builds a forward implementation for a descriptor, or declines with [`ImplError`].
pub type PoolingFwdConstructor = Arc<
    dyn Fn(
            &PoolingDesc,
            &PrimitiveAttr,
            Option<&PoolingFwdPd<'_>>,
        ) -> ImplResult<Box<dyn PoolingFwdImpl>>
        + Send
        + Sync,
>;

/// Builds a backward implementation for a descriptor and its forward hint.
pub type PoolingBwdConstructor = Arc<
    dyn Fn(&PoolingDesc, &PrimitiveAttr, &PoolingFwdPd<'_>) -> ImplResult<Box<dyn PoolingBwdImpl>>
        + Send
        + Sync,
>;

/// Functions run once before the first registry lookup.
///
/// Registrars may only call the `register_*` functions; looking up from a registrar
/// would wait on itself.
#[linkme::distributed_slice]
pub static IMPL_REGISTRARS: [fn()] = [..];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

/// How the registry picks among matching implementations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ImplPolicy {
    /// First implementation, in registration order, that accepts the descriptor.
    #[default]
    Default,
    /// Only the named implementation is tried.
    Force { implementation: String },
}

impl ImplPolicy {
    /// Parses `force=<name>`, a bare `<name>`, or an empty / `default` string.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("default") {
            return ImplPolicy::Default;
        }
        let name = trimmed.strip_prefix("force=").unwrap_or(trimmed).trim();
        if name.is_empty() {
            ImplPolicy::Default
        } else {
            ImplPolicy::Force {
                implementation: name.to_string(),
            }
        }
    }

    /// Policy configured through `PRIMDESC_POOLING_IMPL`.
    pub fn from_env() -> Self {
        env::pooling_impl_override()
            .map(ImplPolicy::parse)
            .unwrap_or_default()
    }

    fn admits(&self, name: &str) -> bool {
        match self {
            ImplPolicy::Default => true,
            ImplPolicy::Force { implementation } => implementation == name,
        }
    }
}

/// Failure to create a pooling primitive descriptor.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error("invalid pooling descriptor: {0}")]
    InvalidDesc(#[from] DescError),
    #[error("forced implementation '{name}' is not registered for {direction} pooling on {engine}")]
    ForcedUnavailable {
        name: String,
        direction: Direction,
        engine: Engine,
    },
    #[error("no {direction} pooling implementation on {engine} accepts the descriptor ({} rejected)", .rejections.len())]
    NoImplementation {
        direction: Direction,
        engine: Engine,
        rejections: Vec<(String, ImplError)>,
    },
}

struct Entry<C> {
    name: String,
    engine_kind: EngineKind,
    constructor: C,
}

struct ImplRegistry {
    forward: RwLock<Vec<Entry<PoolingFwdConstructor>>>,
    backward: RwLock<Vec<Entry<PoolingBwdConstructor>>>,
}

impl ImplRegistry {
    fn new() -> Self {
        Self {
            forward: RwLock::new(Vec::new()),
            backward: RwLock::new(Vec::new()),
        }
    }
}

fn insert_entry<C>(entries: &RwLock<Vec<Entry<C>>>, entry: Entry<C>) {
    let mut entries = entries.write().unwrap_or_else(PoisonError::into_inner);
    match entries
        .iter_mut()
        .find(|existing| existing.name == entry.name && existing.engine_kind == entry.engine_kind)
    {
        Some(existing) => *existing = entry,
        None => entries.push(entry),
    }
}

fn snapshot<C: Clone>(
    entries: &RwLock<Vec<Entry<C>>>,
    engine_kind: EngineKind,
) -> Vec<(String, C)> {
    entries
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|entry| entry.engine_kind == engine_kind)
        .map(|entry| (entry.name.clone(), entry.constructor.clone()))
        .collect()
}

fn names<C>(entries: &RwLock<Vec<Entry<C>>>) -> Vec<String> {
    entries
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .map(|entry| entry.name.clone())
        .collect()
}

static GLOBAL_REGISTRY: OnceLock<ImplRegistry> = OnceLock::new();
static REGISTRARS: Once = Once::new();

fn global_registry() -> &'static ImplRegistry {
    GLOBAL_REGISTRY.get_or_init(ImplRegistry::new)
}

fn populated_registry() -> &'static ImplRegistry {
    REGISTRARS.call_once(|| {
        for registrar in IMPL_REGISTRARS.iter() {
            registrar();
        }
    });
    global_registry()
}

/// Registers a forward pooling implementation. Re-registering a name for the same
/// engine kind replaces the constructor and keeps its position.
pub fn register_pooling_fwd<F>(name: impl Into<String>, engine_kind: EngineKind, constructor: F)
where
    F: Fn(
            &PoolingDesc,
            &PrimitiveAttr,
            Option<&PoolingFwdPd<'_>>,
        ) -> ImplResult<Box<dyn PoolingFwdImpl>>
        + Send
        + Sync
        + 'static,
{
    let name = name.into();
    log::debug!(
        "registering forward pooling implementation {name} for {}",
        engine_kind.as_str()
    );
    insert_entry(
        &global_registry().forward,
        Entry {
            name,
            engine_kind,
            constructor: Arc::new(constructor),
        },
    );
}

/// Registers a backward pooling implementation.
pub fn register_pooling_bwd<F>(name: impl Into<String>, engine_kind: EngineKind, constructor: F)
where
    F: Fn(&PoolingDesc, &PrimitiveAttr, &PoolingFwdPd<'_>) -> ImplResult<Box<dyn PoolingBwdImpl>>
        + Send
        + Sync
        + 'static,
{
    let name = name.into();
    log::debug!(
        "registering backward pooling implementation {name} for {}",
        engine_kind.as_str()
    );
    insert_entry(
        &global_registry().backward,
        Entry {
            name,
            engine_kind,
            constructor: Arc::new(constructor),
        },
    );
}

/// Registered implementation names for a direction, in registration order.
pub fn list_pooling_impls(direction: Direction) -> Vec<String> {
    let registry = populated_registry();
    match direction {
        Direction::Forward => names(&registry.forward),
        Direction::Backward => names(&registry.backward),
    }
}

pub fn has_pooling_impl(direction: Direction, name: &str) -> bool {
    list_pooling_impls(direction)
        .iter()
        .any(|registered| registered == name)
}

/// Creates a forward pooling descriptor using the environment's [`ImplPolicy`].
pub fn create_pooling_fwd_pd<'h>(
    engine: Engine,
    desc: &PoolingDesc,
    attr: PrimitiveAttr,
    hint_fwd_pd: Option<&'h PoolingFwdPd<'h>>,
) -> Result<PoolingFwdPd<'h>, CreateError> {
    create_pooling_fwd_pd_with_policy(engine, desc, attr, hint_fwd_pd, &ImplPolicy::from_env())
}

pub fn create_pooling_fwd_pd_with_policy<'h>(
    engine: Engine,
    desc: &PoolingDesc,
    attr: PrimitiveAttr,
    hint_fwd_pd: Option<&'h PoolingFwdPd<'h>>,
    policy: &ImplPolicy,
) -> Result<PoolingFwdPd<'h>, CreateError> {
    if !desc.is_forward() {
        return Err(DescError::InvalidPropKind {
            initializer: "forward",
            found: desc.prop_kind,
        }
        .into());
    }
    desc.validate()?;

    let candidates = snapshot(&populated_registry().forward, engine.kind());
    let imp = select(Direction::Forward, engine, policy, candidates, |constructor| {
        constructor(desc, &attr, hint_fwd_pd)
    })?;
    let pd = PoolingFwdPd::new(engine, desc, attr, hint_fwd_pd, imp);
    report_created(Direction::Forward, &pooling_info(&pd));
    Ok(pd)
}

/// Creates a backward pooling descriptor using the environment's [`ImplPolicy`].
pub fn create_pooling_bwd_pd<'h>(
    engine: Engine,
    desc: &PoolingDesc,
    attr: PrimitiveAttr,
    hint_fwd_pd: &'h PoolingFwdPd<'h>,
) -> Result<PoolingBwdPd<'h>, CreateError> {
    create_pooling_bwd_pd_with_policy(engine, desc, attr, hint_fwd_pd, &ImplPolicy::from_env())
}

pub fn create_pooling_bwd_pd_with_policy<'h>(
    engine: Engine,
    desc: &PoolingDesc,
    attr: PrimitiveAttr,
    hint_fwd_pd: &'h PoolingFwdPd<'h>,
    policy: &ImplPolicy,
) -> Result<PoolingBwdPd<'h>, CreateError> {
    if desc.prop_kind != PropKind::BackwardData {
        return Err(DescError::InvalidPropKind {
            initializer: "backward",
            found: desc.prop_kind,
        }
        .into());
    }
    desc.validate()?;

    let candidates = snapshot(&populated_registry().backward, engine.kind());
    let imp = select(Direction::Backward, engine, policy, candidates, |constructor| {
        constructor(desc, &attr, hint_fwd_pd)
    })?;
    let pd = PoolingBwdPd::new(engine, desc, attr, hint_fwd_pd, imp);
    report_created(Direction::Backward, &pooling_info(&pd));
    Ok(pd)
}

fn select<C, T>(
    direction: Direction,
    engine: Engine,
    policy: &ImplPolicy,
    candidates: Vec<(String, C)>,
    mut try_create: impl FnMut(&C) -> ImplResult<T>,
) -> Result<T, CreateError> {
    let admitted: Vec<_> = candidates
        .into_iter()
        .filter(|(name, _)| policy.admits(name))
        .collect();

    if let ImplPolicy::Force { implementation } = policy {
        if admitted.is_empty() {
            log::warn!(
                "forced {direction} pooling implementation {implementation} is not registered for {engine}"
            );
            return Err(CreateError::ForcedUnavailable {
                name: implementation.clone(),
                direction,
                engine,
            });
        }
    }

    let mut rejections = Vec::new();
    for (name, constructor) in admitted {
        match try_create(&constructor) {
            Ok(imp) => return Ok(imp),
            Err(err) => {
                log::debug!("{direction} pooling implementation {name} skipped: {err}");
                rejections.push((name, err));
            }
        }
    }
    Err(CreateError::NoImplementation {
        direction,
        engine,
        rejections,
    })
}

fn report_created(direction: Direction, info: &str) {
    if env::verbose_enabled() {
        log::info!("primdesc,create,pooling,{direction},{info}");
    } else {
        log::debug!("created {direction} pooling descriptor {info}");
    }
}
