//! Wiring graph and the runtime signal router that owns it.
//!
//! # Invariants
//! - A `(source, topic, destination)` triple appears at most once.
//! - Destinations of a route keep insertion order.
//! - Removing a module drops every route it takes part in.

use crate::error::{PortDirection, WiringError};
use crate::module::ModuleSpec;
use biosim_common::ModuleId;
use serde::Serialize;
use std::collections::BTreeMap;

/// A committed edge, described by aliases for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDescription {
    pub source: String,
    pub topic: String,
    pub destination: String,
}

impl RouteDescription {
    pub fn as_tuple(&self) -> (&str, &str, &str) {
        (&self.source, &self.topic, &self.destination)
    }
}

#[derive(Debug, Clone)]
struct RegisteredModule {
    alias: String,
    spec: ModuleSpec,
}

#[derive(Debug, Clone, Copy)]
struct Route {
    destination: ModuleId,
    seq: u64,
}

/// Validated routes plus the declared ports of every registered module.
///
/// BTreeMap keeps iteration deterministic. `seq` records global insertion
/// order so [`WiringGraph::edges`] can list edges in the order they were
/// committed.
#[derive(Debug, Clone, Default)]
pub struct WiringGraph {
    modules: BTreeMap<ModuleId, RegisteredModule>,
    routes: BTreeMap<(ModuleId, String), Vec<Route>>,
    next_seq: u64,
}

impl WiringGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn edge_count(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    pub fn alias(&self, id: ModuleId) -> Option<&str> {
        self.modules.get(&id).map(|m| m.alias.as_str())
    }

    pub fn spec(&self, id: ModuleId) -> Option<&ModuleSpec> {
        self.modules.get(&id).map(|m| &m.spec)
    }

    /// Find a module by alias.
    pub fn lookup(&self, alias: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .find(|(_, m)| m.alias == alias)
            .map(|(id, _)| *id)
    }

    /// Registered modules in id order.
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &str, &ModuleSpec)> {
        self.modules
            .iter()
            .map(|(id, m)| (*id, m.alias.as_str(), &m.spec))
    }

    /// Committed edges in insertion order.
    pub fn edges(&self) -> Vec<(ModuleId, &str, ModuleId)> {
        let mut edges: Vec<(u64, ModuleId, &str, ModuleId)> = self
            .routes
            .iter()
            .flat_map(|((source, topic), routes)| {
                routes
                    .iter()
                    .map(move |r| (r.seq, *source, topic.as_str(), r.destination))
            })
            .collect();
        edges.sort_by_key(|(seq, ..)| *seq);
        edges
            .into_iter()
            .map(|(_, source, topic, destination)| (source, topic, destination))
            .collect()
    }

    pub fn destinations(&self, source: ModuleId, topic: &str) -> Vec<ModuleId> {
        self.routes
            .get(&(source, topic.to_string()))
            .map(|routes| routes.iter().map(|r| r.destination).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, source: ModuleId, topic: &str, destination: ModuleId) -> bool {
        self.routes
            .get(&(source, topic.to_string()))
            .is_some_and(|routes| routes.iter().any(|r| r.destination == destination))
    }

    /// Check that `id` is registered, naming it in `context` otherwise.
    pub fn require_module(&self, context: &str, id: ModuleId) -> Result<(), WiringError> {
        if self.modules.contains_key(&id) {
            Ok(())
        } else {
            Err(WiringError::UnknownModule {
                context: context.to_string(),
                alias: id.to_string(),
            })
        }
    }

    /// Check `port` against a module's declared set for `direction`.
    /// An empty declared set accepts any port.
    pub fn require_port(
        &self,
        context: &str,
        id: ModuleId,
        direction: PortDirection,
        port: &str,
    ) -> Result<(), WiringError> {
        self.require_module(context, id)?;
        let module = &self.modules[&id];
        let declared = match direction {
            PortDirection::Input => &module.spec.inputs,
            PortDirection::Output => &module.spec.outputs,
        };
        if declared.is_empty() || declared.contains(port) {
            return Ok(());
        }
        Err(WiringError::PortNotDeclared {
            context: context.to_string(),
            alias: module.alias.clone(),
            port: port.to_string(),
            direction,
            declared: declared.iter().cloned().collect(),
        })
    }

    fn register(&mut self, id: ModuleId, alias: String, spec: ModuleSpec) {
        self.modules.insert(id, RegisteredModule { alias, spec });
    }

    fn unregister(&mut self, id: ModuleId) -> usize {
        if self.modules.remove(&id).is_none() {
            return 0;
        }
        let before = self.edge_count();
        self.routes.retain(|(source, _), routes| {
            routes.retain(|r| r.destination != id);
            *source != id && !routes.is_empty()
        });
        before - self.edge_count()
    }

    fn insert(&mut self, source: ModuleId, topic: &str, destination: ModuleId) -> bool {
        if self.contains(source, topic, destination) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.routes
            .entry((source, topic.to_string()))
            .or_default()
            .push(Route { destination, seq });
        true
    }

    fn remove(&mut self, source: ModuleId, topic: &str, destination: ModuleId) -> bool {
        let key = (source, topic.to_string());
        let Some(routes) = self.routes.get_mut(&key) else {
            return false;
        };
        let before = routes.len();
        routes.retain(|r| r.destination != destination);
        let removed = routes.len() != before;
        if routes.is_empty() {
            self.routes.remove(&key);
        }
        removed
    }
}

/// Runtime owner of the wiring graph.
///
/// The router only knows module ids. Delivering a signal means calling into
/// module code, which the world does using the snapshot returned by
/// [`SignalRouter::snapshot_destinations`].
#[derive(Debug, Default)]
pub struct SignalRouter {
    graph: WiringGraph,
}

impl SignalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &WiringGraph {
        &self.graph
    }

    pub(crate) fn register(&mut self, id: ModuleId, alias: String, spec: ModuleSpec) {
        self.graph.register(id, alias, spec);
    }

    /// Forget a module and every route it is part of. Returns the number of
    /// routes dropped.
    pub(crate) fn unregister(&mut self, id: ModuleId) -> usize {
        self.graph.unregister(id)
    }

    /// Connect `source`'s `topic` to `destination`, which receives it on an
    /// input port of the same name.
    ///
    /// Returns `Ok(false)` when the route already exists.
    pub fn connect(
        &mut self,
        source: ModuleId,
        topic: &str,
        destination: ModuleId,
    ) -> Result<bool, WiringError> {
        self.connect_port(source, topic, destination, topic)
    }

    /// Like [`SignalRouter::connect`], validating `input_port` on the
    /// destination instead of the topic name.
    pub fn connect_port(
        &mut self,
        source: ModuleId,
        topic: &str,
        destination: ModuleId,
        input_port: &str,
    ) -> Result<bool, WiringError> {
        let context = self.context(source, topic, destination, input_port);
        self.graph.require_module(&context, source)?;
        self.graph.require_module(&context, destination)?;
        self.graph
            .require_port(&context, source, PortDirection::Output, topic)?;
        self.graph
            .require_port(&context, destination, PortDirection::Input, input_port)?;
        Ok(self.commit(source, topic, destination))
    }

    /// Insert an edge that has already been validated.
    pub(crate) fn commit(&mut self, source: ModuleId, topic: &str, destination: ModuleId) -> bool {
        let added = self.graph.insert(source, topic, destination);
        if added {
            tracing::debug!(
                source = self.graph.alias(source).unwrap_or_default(),
                topic,
                destination = self.graph.alias(destination).unwrap_or_default(),
                "route committed"
            );
        }
        added
    }

    /// Remove a single route. Absent routes are not an error.
    pub fn disconnect(&mut self, source: ModuleId, topic: &str, destination: ModuleId) -> bool {
        self.graph.remove(source, topic, destination)
    }

    /// Copy of the destination list for `(source, topic)`.
    ///
    /// Delivery iterates over this copy so handlers may connect, disconnect
    /// or publish while a delivery is in flight.
    pub fn snapshot_destinations(&self, source: ModuleId, topic: &str) -> Vec<ModuleId> {
        self.graph.destinations(source, topic)
    }

    /// Committed edges as alias triples, in insertion order.
    pub fn describe(&self) -> Vec<RouteDescription> {
        self.graph
            .edges()
            .into_iter()
            .map(|(source, topic, destination)| RouteDescription {
                source: self.display_name(source),
                topic: topic.to_string(),
                destination: self.display_name(destination),
            })
            .collect()
    }

    fn display_name(&self, id: ModuleId) -> String {
        self.graph
            .alias(id)
            .map_or_else(|| id.to_string(), str::to_string)
    }

    fn context(&self, source: ModuleId, topic: &str, destination: ModuleId, port: &str) -> String {
        format!(
            "connect {}.out.{} -> {}.in.{}",
            self.display_name(source),
            topic,
            self.display_name(destination),
            port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ports;

    fn router_with(specs: &[(&str, ModuleSpec)]) -> (SignalRouter, Vec<ModuleId>) {
        let mut router = SignalRouter::new();
        let mut ids = Vec::new();
        for (i, (alias, spec)) in specs.iter().enumerate() {
            let id = ModuleId(i as u64);
            router.register(id, alias.to_string(), spec.clone());
            ids.push(id);
        }
        (router, ids)
    }

    fn open() -> ModuleSpec {
        ModuleSpec::default()
    }

    #[test]
    fn connect_is_idempotent() {
        let (mut router, ids) = router_with(&[("a", open()), ("b", open())]);
        assert!(router.connect(ids[0], "sig", ids[1]).unwrap());
        assert!(!router.connect(ids[0], "sig", ids[1]).unwrap());
        assert_eq!(router.graph().edge_count(), 1);
    }

    #[test]
    fn destinations_keep_insertion_order() {
        let (mut router, ids) =
            router_with(&[("a", open()), ("c", open()), ("b", open()), ("d", open())]);
        router.connect(ids[0], "sig", ids[3]).unwrap();
        router.connect(ids[0], "sig", ids[1]).unwrap();
        router.connect(ids[0], "sig", ids[2]).unwrap();
        assert_eq!(
            router.snapshot_destinations(ids[0], "sig"),
            vec![ids[3], ids[1], ids[2]]
        );
    }

    #[test]
    fn describe_lists_edges_in_commit_order() {
        let (mut router, ids) = router_with(&[("a", open()), ("b", open()), ("c", open())]);
        router.connect(ids[1], "y", ids[2]).unwrap();
        router.connect(ids[0], "x", ids[1]).unwrap();
        router.connect(ids[1], "y", ids[0]).unwrap();
        let described: Vec<_> = router.describe();
        let tuples: Vec<_> = described.iter().map(RouteDescription::as_tuple).collect();
        assert_eq!(tuples, vec![("b", "y", "c"), ("a", "x", "b"), ("b", "y", "a")]);
    }

    #[test]
    fn disconnect_removes_exactly_one_triple() {
        let (mut router, ids) = router_with(&[("a", open()), ("b", open()), ("c", open())]);
        router.connect(ids[0], "x", ids[1]).unwrap();
        router.connect(ids[0], "x", ids[2]).unwrap();
        let before = router.describe();
        assert!(router.disconnect(ids[0], "x", ids[1]));
        let after = router.describe();
        assert_eq!(before.len() - after.len(), 1);
        assert_eq!(after[0].as_tuple(), ("a", "x", "c"));
    }

    #[test]
    fn disconnect_absent_route_is_noop() {
        let (mut router, ids) = router_with(&[("a", open()), ("b", open())]);
        assert!(!router.disconnect(ids[0], "x", ids[1]));
        assert!(!router.disconnect(ModuleId(99), "x", ids[1]));
    }

    #[test]
    fn connect_validates_declared_ports() {
        let eye = ModuleSpec {
            outputs: ports(["visual_stream"]),
            ..ModuleSpec::default()
        };
        let lgn = ModuleSpec {
            inputs: ports(["visual_stream"]),
            ..ModuleSpec::default()
        };
        let (mut router, ids) = router_with(&[("eye", eye), ("lgn", lgn)]);

        let err = router.connect(ids[0], "nope", ids[1]).unwrap_err();
        assert!(matches!(
            err,
            WiringError::PortNotDeclared { ref alias, ref port, direction: PortDirection::Output, .. }
                if alias == "eye" && port == "nope"
        ));

        let err = router.connect_port(ids[0], "visual_stream", ids[1], "retina").unwrap_err();
        assert!(err.to_string().contains("module 'lgn' has no input port 'retina'"));

        assert!(router.connect(ids[0], "visual_stream", ids[1]).unwrap());
    }

    #[test]
    fn connect_unknown_module() {
        let (mut router, ids) = router_with(&[("a", open())]);
        let err = router.connect(ids[0], "x", ModuleId(7)).unwrap_err();
        assert!(matches!(err, WiringError::UnknownModule { .. }));
        assert_eq!(router.graph().edge_count(), 0);
    }

    #[test]
    fn unregister_drops_routes_both_ways() {
        let (mut router, ids) = router_with(&[("a", open()), ("b", open()), ("c", open())]);
        router.connect(ids[0], "x", ids[1]).unwrap();
        router.connect(ids[1], "y", ids[2]).unwrap();
        router.connect(ids[2], "z", ids[0]).unwrap();
        assert_eq!(router.unregister(ids[1]), 2);
        let tuples: Vec<_> = router
            .describe()
            .iter()
            .map(|d| (d.source.clone(), d.topic.clone(), d.destination.clone()))
            .collect();
        assert_eq!(tuples, vec![("c".into(), "z".into(), "a".into())]);
        assert!(router.graph().lookup("b").is_none());
    }
}
