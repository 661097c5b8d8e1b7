use crate::visuals::{VisualSpec, normalize_visuals};
use biosim_kernel::{ModuleDescription, RouteDescription, World};
use serde::Serialize;
use serde_json::{Value, json};

/// World inspector for dashboards and developer tooling.
///
/// Provides read-only queries against the world: counts, the per-module
/// declared ports, module visuals and the committed wiring.
pub struct WorldInspector;

impl WorldInspector {
    /// Produce a summary of the world state.
    pub fn summary(world: &World) -> WorldSummary {
        WorldSummary {
            modules: world.module_count(),
            edges: world.router().graph().edge_count(),
            listeners: world.listener_count(),
            loaded: world.is_loaded(),
            runs: world.runs(),
            solver: world.solver().name().to_string(),
        }
    }

    /// Alias, declared ports and subscriptions of every module.
    pub fn spec(world: &World) -> Vec<ModuleDescription> {
        world.describe_modules()
    }

    /// Description of one module by alias.
    pub fn inspect_module(world: &World, alias: &str) -> Option<ModuleDescription> {
        let id = world.module_id(alias)?;
        world.describe_modules().into_iter().find(|m| m.id == id)
    }

    pub fn wiring(world: &World) -> Vec<RouteDescription> {
        world.describe_wiring()
    }

    /// Valid visuals of every module that has something to show, in
    /// registration order. Invalid specs are dropped.
    pub fn visuals(world: &World) -> Vec<ModuleVisuals> {
        world
            .describe_modules()
            .into_iter()
            .filter_map(|m| {
                let raw = world.module(m.id)?.visualize()?;
                let visuals = normalize_visuals(&raw);
                (!visuals.is_empty()).then_some(ModuleVisuals {
                    alias: m.alias,
                    visuals,
                })
            })
            .collect()
    }

    /// Everything above in one JSON document.
    pub fn to_json(world: &World) -> Value {
        json!({
            "summary": Self::summary(world),
            "modules": Self::spec(world),
            "wiring": Self::wiring(world),
            "visuals": Self::visuals(world),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleVisuals {
    pub alias: String,
    pub visuals: Vec<VisualSpec>,
}

/// Summary of world state for the inspector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSummary {
    pub modules: usize,
    pub edges: usize,
    pub listeners: usize,
    pub loaded: bool,
    pub runs: u64,
    pub solver: String,
}

impl std::fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "World: modules={} edges={} listeners={} loaded={} runs={} solver={}",
            self.modules, self.edges, self.listeners, self.loaded, self.runs, self.solver
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosim_kernel::BioWorldEvent;
    use biosim_kernel::{Module, Payload, ports};
    use std::collections::BTreeSet;

    struct Eye;
    impl Module for Eye {
        fn outputs(&self) -> BTreeSet<String> {
            ports(["visual_stream"])
        }
        fn subscriptions(&self) -> BTreeSet<BioWorldEvent> {
            BTreeSet::from([BioWorldEvent::Step])
        }
    }

    struct Lgn;
    impl Module for Lgn {
        fn inputs(&self) -> BTreeSet<String> {
            ports(["visual_stream"])
        }
        fn visualize(&self) -> Option<Payload> {
            Some(json!([
                { "render": "bar", "data": { "relay": 1 } },
                { "render": "" },
            ]))
        }
    }

    fn wired() -> World {
        let mut world = World::default();
        let eye = world.add_module("eye", Eye).unwrap();
        let lgn = world.add_module("lgn", Lgn).unwrap();
        world.connect(eye, "visual_stream", lgn).unwrap();
        world
    }

    #[test]
    fn summary_empty_world() {
        let world = World::default();
        let summary = WorldInspector::summary(&world);
        assert_eq!(summary.modules, 0);
        assert_eq!(summary.edges, 0);
        assert!(!summary.loaded);
        assert_eq!(summary.solver, "fixed");
    }

    #[test]
    fn summary_tracks_runs() {
        let mut world = wired();
        world.on(|_, _| Ok(()));
        world.simulate(1, 0.1).unwrap();
        world.simulate(1, 0.1).unwrap();

        let summary = WorldInspector::summary(&world);
        assert_eq!(summary.modules, 2);
        assert_eq!(summary.edges, 1);
        assert_eq!(summary.listeners, 1);
        assert!(summary.loaded);
        assert_eq!(summary.runs, 2);
    }

    #[test]
    fn spec_lists_ports() {
        let world = wired();
        let eye = WorldInspector::inspect_module(&world, "eye").unwrap();
        assert!(eye.spec.outputs.contains("visual_stream"));
        assert!(eye.spec.subscribes_to(BioWorldEvent::Step));
        assert!(!eye.spec.subscribes_to(BioWorldEvent::Loaded));
        assert!(WorldInspector::inspect_module(&world, "ghost").is_none());
        assert_eq!(WorldInspector::spec(&world).len(), 2);
    }

    #[test]
    fn json_document_has_all_sections() {
        let world = wired();
        let doc = WorldInspector::to_json(&world);
        assert_eq!(doc["summary"]["modules"], 2);
        assert_eq!(doc["modules"][0]["alias"], "eye");
        assert_eq!(doc["modules"][0]["outputs"][0], "visual_stream");
        assert_eq!(
            doc["wiring"][0],
            json!({ "source": "eye", "topic": "visual_stream", "destination": "lgn" })
        );
    }

    #[test]
    fn visuals_skip_silent_modules_and_bad_specs() {
        let world = wired();
        let visuals = WorldInspector::visuals(&world);
        assert_eq!(visuals.len(), 1);
        assert_eq!(visuals[0].alias, "lgn");
        assert_eq!(visuals[0].visuals.len(), 1);
        assert_eq!(visuals[0].visuals[0].render, "bar");

        let doc = WorldInspector::to_json(&world);
        assert_eq!(
            doc["visuals"],
            json!([{ "alias": "lgn", "visuals": [{ "render": "bar", "data": { "relay": 1 } }] }])
        );
    }

    #[test]
    fn summary_display() {
        let world = World::default();
        let s = format!("{}", WorldInspector::summary(&world));
        assert!(s.contains("modules=0"));
        assert!(s.contains("solver=fixed"));
    }
}
