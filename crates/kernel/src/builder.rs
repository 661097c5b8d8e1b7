use crate::error::{PortDirection, WiringError};
use crate::module::Module;
use crate::reference::PortRef;
use crate::router::WiringGraph;
use crate::world::World;
use biosim_common::ModuleId;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct PendingConnection {
    source: String,
    destinations: Vec<String>,
}

/// Stages modules and connections, then commits the connections to a
/// world's router in one step.
///
/// Modules are registered with the world as soon as they are added.
/// Connections are only parsed and validated by [`WiringBuilder::apply`];
/// if any of them is invalid, none is committed.
///
/// ```
/// use biosim_kernel::{Module, WiringBuilder, World};
///
/// struct Eye;
/// impl Module for Eye {}
/// struct Lgn;
/// impl Module for Lgn {}
///
/// let mut world = World::default();
/// let mut wb = WiringBuilder::new(&mut world);
/// wb.add("eye", Eye)?.add("lgn", Lgn)?;
/// wb.connect("eye.out.visual_stream", ["lgn.in.retina"]);
/// assert_eq!(wb.apply()?, 1);
/// # Ok::<(), biosim_kernel::WiringError>(())
/// ```
pub struct WiringBuilder<'w> {
    world: &'w mut World,
    registry: BTreeMap<String, ModuleId>,
    pending: Vec<PendingConnection>,
}

impl<'w> WiringBuilder<'w> {
    pub fn new(world: &'w mut World) -> Self {
        Self {
            world,
            registry: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &*self.world
    }

    /// Aliases registered through this builder.
    pub fn registry(&self) -> &BTreeMap<String, ModuleId> {
        &self.registry
    }

    /// Number of staged, not yet applied, connections.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn add(
        &mut self,
        alias: impl Into<String>,
        module: impl Module + 'static,
    ) -> Result<&mut Self, WiringError> {
        self.add_boxed(alias, Box::new(module))
    }

    pub fn add_boxed(
        &mut self,
        alias: impl Into<String>,
        module: Box<dyn Module>,
    ) -> Result<&mut Self, WiringError> {
        let alias = alias.into();
        if self.registry.contains_key(&alias) {
            return Err(WiringError::DuplicateAlias { alias });
        }
        let id = self.world.add_boxed_module(alias.clone(), module)?;
        self.registry.insert(alias, id);
        Ok(self)
    }

    /// Stage `source` → each of `destinations`. Nothing is checked yet.
    pub fn connect<I>(&mut self, source: impl Into<String>, destinations: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.pending.push(PendingConnection {
            source: source.into(),
            destinations: destinations.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Validate every staged connection, then commit them all.
    ///
    /// Per edge, checks run in order: both aliases exist, the source port is
    /// a declared output (when outputs are declared), the destination port is
    /// a declared input (when inputs are declared). The first failure aborts
    /// the whole apply with nothing committed. Staged connections are consumed
    /// either way.
    ///
    /// Returns the number of new routes; re-connecting an existing route
    /// does not count.
    pub fn apply(&mut self) -> Result<usize, WiringError> {
        let pending = std::mem::take(&mut self.pending);
        let plan = plan_edges(self.world.router().graph(), &pending)?;

        let planned = plan.len();
        let mut committed = 0;
        for (source, topic, destination) in plan {
            if self.world.router_mut().commit(source, &topic, destination) {
                committed += 1;
            }
        }
        tracing::info!(planned, committed, "wiring applied");
        Ok(committed)
    }
}

fn plan_edges(
    graph: &WiringGraph,
    pending: &[PendingConnection],
) -> Result<Vec<(ModuleId, String, ModuleId)>, WiringError> {
    let mut plan = Vec::new();
    for conn in pending {
        let src = PortRef::parse(&conn.source)?;
        if conn.destinations.is_empty() {
            let context = format!("connect {}", conn.source);
            let source = resolve(graph, &context, &src.alias)?;
            graph.require_port(&context, source, PortDirection::Output, &src.port)?;
            continue;
        }
        for dst_ref in &conn.destinations {
            let dst = PortRef::parse(dst_ref)?;
            let context = format!("connect {} -> {}", conn.source, dst_ref);
            let source = resolve(graph, &context, &src.alias)?;
            let destination = resolve(graph, &context, &dst.alias)?;
            graph.require_port(&context, source, PortDirection::Output, &src.port)?;
            graph.require_port(&context, destination, PortDirection::Input, &dst.port)?;
            plan.push((source, src.port.clone(), destination));
        }
    }
    Ok(plan)
}

fn resolve(graph: &WiringGraph, context: &str, alias: &str) -> Result<ModuleId, WiringError> {
    graph.lookup(alias).ok_or_else(|| WiringError::UnknownModule {
        context: context.to_string(),
        alias: alias.to_string(),
    })
}
