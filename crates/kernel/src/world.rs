use crate::error::{HandlerError, WiringError};
use crate::module::{Module, ModuleSpec};
use crate::router::{RouteDescription, SignalRouter};
use crate::solver::{FixedStepSolver, Overrides, RunSummary, Solver, SolverError};
use biosim_common::{BioWorldEvent, ListenerId, ModuleId, Payload};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

/// How many times a busy module's inbox is drained after its handler
/// returns. Signals still queued after the last round are dropped.
pub const MAX_FEEDBACK_ROUNDS: usize = 16;

/// A global lifecycle listener.
pub type Listener = Box<dyn FnMut(BioWorldEvent, &Payload) -> Result<(), HandlerError>>;

/// Errors from world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Wiring(#[from] WiringError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("timestep must be finite and positive, got {0}")]
    InvalidTimestep(f64),
    #[error("simulate called while a simulation is already running")]
    AlreadySimulating,
}

/// Description of a registered module, for dashboards and inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescription {
    pub id: ModuleId,
    pub alias: String,
    #[serde(flatten)]
    pub spec: ModuleSpec,
}

/// The orchestrator: owns modules, listeners, the signal router and the
/// solver, and drives the event lifecycle.
///
/// Lifecycle per world: `Loaded` once on the first `simulate`, then for every
/// `simulate` call `BeforeSimulation`, one `Step` per solver step and
/// `AfterSimulation`. Within one event, global listeners run before modules;
/// both run in registration order.
///
/// Dispatch takes a module out of its slot while its handler runs, so the
/// handler can receive `&mut World`. A signal addressed to a module whose
/// handler is already on the stack is queued in that module's inbox and
/// delivered as soon as the running handler returns, before dispatch moves
/// on. Draining stops after [`MAX_FEEDBACK_ROUNDS`] rounds so that a signal
/// cycle cannot recurse forever.
pub struct World {
    solver: Arc<dyn Solver>,
    router: SignalRouter,
    /// `None` while the module's own handler is running.
    modules: BTreeMap<ModuleId, Option<Box<dyn Module>>>,
    /// Signals for modules that were busy when they arrived.
    inboxes: BTreeMap<ModuleId, VecDeque<Deferred>>,
    listeners: Vec<(ListenerId, Listener)>,
    next_module: u64,
    next_listener: u64,
    loaded: bool,
    simulating: bool,
    runs: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new(FixedStepSolver)
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("solver", &self.solver)
            .field("modules", &self.modules.len())
            .field("edges", &self.router.graph().edge_count())
            .field("listeners", &self.listeners.len())
            .field("loaded", &self.loaded)
            .field("runs", &self.runs)
            .finish_non_exhaustive()
    }
}

impl World {
    pub fn new(solver: impl Solver + 'static) -> Self {
        Self::with_solver(Arc::new(solver))
    }

    pub fn with_solver(solver: Arc<dyn Solver>) -> Self {
        Self {
            solver,
            router: SignalRouter::new(),
            modules: BTreeMap::new(),
            inboxes: BTreeMap::new(),
            listeners: Vec::new(),
            next_module: 0,
            next_listener: 0,
            loaded: false,
            simulating: false,
            runs: 0,
        }
    }

    pub fn solver(&self) -> &Arc<dyn Solver> {
        &self.solver
    }

    pub fn set_solver(&mut self, solver: Arc<dyn Solver>) {
        self.solver = solver;
    }

    /// Replace the solver with a reconfigured copy. Other holders of the
    /// previous solver are unaffected.
    pub fn apply_solver_overrides(&mut self, overrides: &Overrides) -> Result<(), WorldError> {
        let solver = self.solver.with_overrides(overrides)?;
        tracing::info!(solver = solver.name(), "solver reconfigured");
        self.solver = solver;
        Ok(())
    }

    pub fn router(&self) -> &SignalRouter {
        &self.router
    }

    pub(crate) fn router_mut(&mut self) -> &mut SignalRouter {
        &mut self.router
    }

    /// Whether `Loaded` has been emitted.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Completed `simulate` calls, failed ones included.
    pub fn runs(&self) -> u64 {
        self.runs
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module_id(&self, alias: &str) -> Option<ModuleId> {
        self.router.graph().lookup(alias)
    }

    pub fn alias(&self, id: ModuleId) -> Option<&str> {
        self.router.graph().alias(id)
    }

    /// Read access to a module. `None` while its own handler is running.
    pub fn module(&self, id: ModuleId) -> Option<&dyn Module> {
        self.modules.get(&id)?.as_deref()
    }

    /// Register a module under `alias`.
    pub fn add_module(
        &mut self,
        alias: impl Into<String>,
        module: impl Module + 'static,
    ) -> Result<ModuleId, WiringError> {
        self.add_boxed_module(alias, Box::new(module))
    }

    pub fn add_boxed_module(
        &mut self,
        alias: impl Into<String>,
        mut module: Box<dyn Module>,
    ) -> Result<ModuleId, WiringError> {
        let alias = alias.into();
        if self.router.graph().lookup(&alias).is_some() {
            return Err(WiringError::DuplicateAlias { alias });
        }
        let id = ModuleId(self.next_module);
        self.next_module += 1;
        module.attached(id, &alias);
        let spec = ModuleSpec::of(&*module);
        tracing::debug!(%id, alias = %alias, inputs = spec.inputs.len(), outputs = spec.outputs.len(), "module registered");
        self.router.register(id, alias, spec);
        self.modules.insert(id, Some(module));
        Ok(id)
    }

    /// Deregister a module and drop its routes as source and destination.
    ///
    /// Returns the module, or `None` if it is unknown or is being removed from
    /// inside its own handler (it is dropped once the handler returns).
    pub fn remove_module(&mut self, id: ModuleId) -> Option<Box<dyn Module>> {
        let dropped = self.router.unregister(id);
        self.inboxes.remove(&id);
        let module = self.modules.remove(&id).flatten();
        tracing::debug!(%id, routes = dropped, "module removed");
        module
    }

    /// Subscribe to every lifecycle event.
    pub fn on(
        &mut self,
        listener: impl FnMut(BioWorldEvent, &Payload) -> Result<(), HandlerError> + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Route `source`'s `topic` to `destination`. See [`SignalRouter::connect`].
    pub fn connect(
        &mut self,
        source: ModuleId,
        topic: &str,
        destination: ModuleId,
    ) -> Result<bool, WiringError> {
        self.router.connect(source, topic, destination)
    }

    /// Route `source`'s `topic` to `destination`'s `input_port`.
    /// See [`SignalRouter::connect_port`].
    pub fn connect_port(
        &mut self,
        source: ModuleId,
        topic: &str,
        destination: ModuleId,
        input_port: &str,
    ) -> Result<bool, WiringError> {
        self.router.connect_port(source, topic, destination, input_port)
    }

    pub fn disconnect(&mut self, source: ModuleId, topic: &str, destination: ModuleId) -> bool {
        self.router.disconnect(source, topic, destination)
    }

    /// Committed edges as `(source, topic, destination)` aliases.
    pub fn describe_wiring(&self) -> Vec<RouteDescription> {
        self.router.describe()
    }

    pub fn describe_modules(&self) -> Vec<ModuleDescription> {
        self.router
            .graph()
            .modules()
            .map(|(id, alias, spec)| ModuleDescription {
                id,
                alias: alias.to_string(),
                spec: spec.clone(),
            })
            .collect()
    }

    /// Deliver a signal to every destination connected to `(source, topic)`.
    ///
    /// Returns how many destinations were reached. Failing handlers are
    /// logged and count as reached, as do signals queued for a busy module.
    pub fn publish_biosignal(&mut self, source: ModuleId, topic: &str, payload: &Payload) -> usize {
        let destinations = self.router.snapshot_destinations(source, topic);
        let mut delivered = 0;
        for destination in destinations {
            let result = self.with_module(destination, |module, world| {
                module.on_signal(topic, payload, source, world)
            });
            match result {
                Dispatch::Skipped => {}
                Dispatch::Busy => {
                    tracing::trace!(%destination, topic, "destination busy; signal queued");
                    self.inboxes.entry(destination).or_default().push_back(Deferred {
                        topic: topic.to_string(),
                        payload: payload.clone(),
                        source,
                    });
                    delivered += 1;
                }
                Dispatch::Done(Ok(())) => delivered += 1,
                Dispatch::Done(Err(err)) => {
                    delivered += 1;
                    tracing::warn!(
                        module = self.alias(destination).unwrap_or_default(),
                        source = self.alias(source).unwrap_or_default(),
                        topic,
                        error = %err,
                        "signal handler failed"
                    );
                }
            }
        }
        delivered
    }

    /// Call `reset` on every module.
    pub fn reset_modules(&mut self) {
        for module in self.modules.values_mut().flatten() {
            module.reset();
        }
    }

    /// Run the solver for `steps` steps of base increment `dt`.
    ///
    /// # Panics
    /// If the solver breaks its contract: emitting anything but `Step`,
    /// emitting step indices out of order, emitting the wrong number of
    /// steps or reporting a step count that differs from the request.
    pub fn simulate(&mut self, steps: u64, dt: f64) -> Result<RunSummary, WorldError> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(WorldError::InvalidTimestep(dt));
        }
        if self.simulating {
            return Err(WorldError::AlreadySimulating);
        }
        let solver = Arc::clone(&self.solver);
        let span = tracing::info_span!("simulate", steps, dt, solver = solver.name());
        let _enter = span.enter();

        self.simulating = true;
        if !self.loaded {
            self.loaded = true;
            let payload = json!({ "modules": self.modules.len() });
            self.dispatch_event(BioWorldEvent::Loaded, &payload);
        }
        self.dispatch_event(
            BioWorldEvent::BeforeSimulation,
            &json!({ "steps": steps, "dt": dt }),
        );

        let mut emitted: u64 = 0;
        let result = solver.simulate(steps, dt, &mut |event, payload| {
            assert_eq!(
                event,
                BioWorldEvent::Step,
                "solver '{}' may only emit STEP",
                solver.name()
            );
            let index = payload.get("i").and_then(|i| i.as_u64());
            assert_eq!(
                index,
                Some(emitted),
                "solver '{}' emitted step indices out of order",
                solver.name()
            );
            emitted += 1;
            self.dispatch_event(event, payload);
        });

        self.runs += 1;
        let outcome = match result {
            Ok(summary) => {
                assert_eq!(
                    emitted,
                    steps,
                    "solver '{}' emitted {emitted} steps, expected {steps}",
                    solver.name()
                );
                assert_eq!(
                    summary.steps,
                    steps,
                    "solver '{}' reported {} steps, expected {steps}",
                    solver.name(),
                    summary.steps
                );
                self.dispatch_event(BioWorldEvent::AfterSimulation, &summary.to_payload());
                tracing::info!(steps = summary.steps, time = summary.time, "simulation finished");
                Ok(summary)
            }
            Err(err) => {
                tracing::warn!(error = %err, steps_emitted = emitted, "solver failed");
                self.dispatch_event(
                    BioWorldEvent::AfterSimulation,
                    &json!({ "steps": emitted, "error": err.to_string() }),
                );
                Err(err.into())
            }
        };
        self.simulating = false;
        outcome
    }

    fn dispatch_event(&mut self, event: BioWorldEvent, payload: &Payload) {
        for (id, listener) in self.listeners.iter_mut() {
            if let Err(err) = listener(event, payload) {
                tracing::warn!(listener = id.0, %event, error = %err, "listener failed");
            }
        }

        let targets: Vec<ModuleId> = self
            .router
            .graph()
            .modules()
            .filter(|(_, _, spec)| spec.subscribes_to(event))
            .map(|(id, _, _)| id)
            .collect();
        for id in targets {
            let result = self.with_module(id, |module, world| module.on_event(event, payload, world));
            if let Dispatch::Done(Err(err)) = result {
                tracing::warn!(
                    module = self.alias(id).unwrap_or_default(),
                    %event,
                    error = %err,
                    "event handler failed"
                );
            }
        }
    }

    /// Run `f` with module `id` taken out of its slot, then deliver whatever
    /// was queued for it meanwhile.
    fn with_module<F>(&mut self, id: ModuleId, f: F) -> Dispatch
    where
        F: FnOnce(&mut dyn Module, &mut World) -> Result<(), HandlerError>,
    {
        let Some(slot) = self.modules.get_mut(&id) else {
            return Dispatch::Skipped;
        };
        let Some(mut module) = slot.take() else {
            return Dispatch::Busy;
        };
        let result = f(&mut *module, self);
        self.drain_inbox(id, &mut *module);
        match self.modules.get_mut(&id) {
            Some(slot) => *slot = Some(module),
            None => tracing::debug!(%id, "module removed during its own dispatch"),
        }
        Dispatch::Done(result)
    }

    /// Deliver signals queued for `id` while it was busy. The module stays
    /// out of its slot, so anything it provokes for itself lands in the
    /// inbox for the next round.
    fn drain_inbox(&mut self, id: ModuleId, module: &mut dyn Module) {
        for _ in 0..MAX_FEEDBACK_ROUNDS {
            if !self.modules.contains_key(&id) {
                break;
            }
            let Some(batch) = self.inboxes.remove(&id) else {
                return;
            };
            for Deferred { topic, payload, source } in batch {
                if let Err(err) = module.on_signal(&topic, &payload, source, self) {
                    tracing::warn!(
                        module = self.alias(id).unwrap_or_default(),
                        source = self.alias(source).unwrap_or_default(),
                        topic = %topic,
                        error = %err,
                        "signal handler failed"
                    );
                }
            }
        }
        if let Some(dropped) = self.inboxes.remove(&id) {
            tracing::warn!(
                module = self.alias(id).unwrap_or_default(),
                dropped = dropped.len(),
                rounds = MAX_FEEDBACK_ROUNDS,
                "feedback limit reached; queued signals dropped"
            );
        }
    }
}

/// A signal held back until its destination's handler returns.
#[derive(Debug)]
struct Deferred {
    topic: String,
    payload: Payload,
    source: ModuleId,
}

enum Dispatch {
    Skipped,
    Busy,
    Done(Result<(), HandlerError>),
}
