use biosim_common::BioWorldEvent;
use biosim_config::{build_from_config, load_wiring};
use biosim_kernel::{HandlerError, World};
use biosim_packs::neuro::{Eye, Lgn, SuperiorColliculus};
use biosim_solvers::SolverRegistry;
use std::cell::RefCell;
use std::rc::Rc;

const BRAIN: &str = "
solver:
  name: default_bio
  params:
    temperature: {initial: 37.0, rate_per_time: -1.0, bounds: {min: 36.5, max: 38.0}}
modules:
  eye: {type: neuro.eye, args: {gain: 2.0}}
  lgn: neuro.lgn
  sc: neuro.superior_colliculus
wiring:
  - {from: eye.out.visual_stream, to: [lgn.in.retina]}
  - {from: lgn.out.thalamus, to: [sc.in.vision]}
";

fn tuples(world: &World) -> Vec<(String, String, String)> {
    world
        .describe_wiring()
        .into_iter()
        .map(|d| (d.source, d.topic, d.destination))
        .collect()
}

#[test]
fn yaml_brain_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("brain.yaml");
    std::fs::write(&path, BRAIN).unwrap();

    let config = load_wiring(&path).unwrap();
    let mut world = World::default();
    let report = build_from_config(
        &mut world,
        &config,
        &biosim_packs::registry(),
        &SolverRegistry::with_builtins(),
    )
    .unwrap();
    assert_eq!(report.edges, 2);
    assert_eq!(
        tuples(&world),
        vec![
            ("eye".to_string(), "visual_stream".to_string(), "lgn".to_string()),
            ("lgn".to_string(), "thalamus".to_string(), "sc".to_string()),
        ]
    );

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    world.on(move |event, _payload| -> Result<(), HandlerError> {
        sink.borrow_mut().push(event);
        Ok(())
    });

    let summary = world.simulate(2, 0.1).unwrap();
    assert_eq!(summary.steps, 2);
    assert!((summary.time - 0.2).abs() < 1e-9);
    // 37.0 - 0.1 - 0.1, still inside bounds
    let temperature = summary.get_f64("temperature").unwrap();
    assert!((temperature - 36.8).abs() < 1e-9);

    assert_eq!(
        *events.borrow(),
        vec![
            BioWorldEvent::Loaded,
            BioWorldEvent::BeforeSimulation,
            BioWorldEvent::Step,
            BioWorldEvent::Step,
            BioWorldEvent::AfterSimulation,
        ]
    );
}

#[test]
fn programmatic_chain_matches_document() {
    let mut world = World::default();
    let sc = SuperiorColliculus::new();
    let probe = sc.probe();
    let eye = world.add_module("eye", Eye::new()).unwrap();
    let lgn = world.add_module("lgn", Lgn::new()).unwrap();
    let sc = world.add_module("sc", sc).unwrap();
    // lgn and sc take these topics on differently named inputs
    assert!(world.connect(eye, Eye::TOPIC, lgn).is_err());
    assert!(world.connect_port(eye, Eye::TOPIC, lgn, Lgn::INPUT).unwrap());
    assert!(world.connect_port(lgn, Lgn::TOPIC, sc, SuperiorColliculus::INPUT).unwrap());

    let summary = world.simulate(2, 0.1).unwrap();
    assert_eq!(summary.steps, 2);
    assert_eq!(probe.count(), 2);
    assert_eq!(
        tuples(&world),
        vec![
            ("eye".to_string(), "visual_stream".to_string(), "lgn".to_string()),
            ("lgn".to_string(), "thalamus".to_string(), "sc".to_string()),
        ]
    );
}
