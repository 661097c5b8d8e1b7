//! Pause and resume for long runs.
//!
//! A solver run cannot be interrupted once started, so a controller splits
//! a run of `total_steps` into chunks and issues one `simulate` call per
//! chunk. Pausing takes effect between chunks. Every chunk is a complete
//! run from the world's point of view: it is bracketed by its own
//! `BeforeSimulation`/`AfterSimulation` and its step indices start at 0.

use biosim_kernel::{RunSummary, World, WorldError};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("chunk size must be at least 1")]
    ZeroChunk,
    #[error("run is paused")]
    Paused,
    #[error("run already finished after {steps} steps")]
    Finished { steps: u64 },
    #[error(transparent)]
    World(#[from] WorldError),
}

/// How far a controlled run has got.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub completed: u64,
    pub total: u64,
    /// Simulated time accumulated over all chunks.
    pub elapsed: f64,
    pub paused: bool,
}

#[derive(Debug, Clone)]
pub struct RunController {
    total_steps: u64,
    dt: f64,
    chunk: u64,
    completed: u64,
    elapsed: f64,
    paused: bool,
}

impl RunController {
    pub fn new(total_steps: u64, dt: f64, chunk: u64) -> Result<Self, ControlError> {
        if chunk == 0 {
            return Err(ControlError::ZeroChunk);
        }
        Ok(Self {
            total_steps,
            dt,
            chunk,
            completed: 0,
            elapsed: 0.0,
            paused: false,
        })
    }

    pub fn pause(&mut self) {
        if !self.paused {
            tracing::info!(completed = self.completed, total = self.total_steps, "run paused");
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            tracing::info!(completed = self.completed, total = self.total_steps, "run resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.total_steps
    }

    pub fn remaining(&self) -> u64 {
        self.total_steps.saturating_sub(self.completed)
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.completed,
            total: self.total_steps,
            elapsed: self.elapsed,
            paused: self.paused,
        }
    }

    /// Run the next chunk.
    ///
    /// A world error leaves the progress counters where they were.
    pub fn advance(&mut self, world: &mut World) -> Result<RunSummary, ControlError> {
        if self.paused {
            return Err(ControlError::Paused);
        }
        if self.is_finished() {
            return Err(ControlError::Finished {
                steps: self.completed,
            });
        }
        let steps = self.chunk.min(self.remaining());
        let summary = world.simulate(steps, self.dt)?;
        self.completed += summary.steps;
        self.elapsed += summary.time;
        tracing::debug!(
            steps,
            completed = self.completed,
            total = self.total_steps,
            "chunk finished"
        );
        Ok(summary)
    }

    /// Advance until finished or paused. `between` runs after every chunk
    /// and may pause the controller.
    ///
    /// Returns the number of chunks run.
    pub fn run<F>(&mut self, world: &mut World, mut between: F) -> Result<u64, ControlError>
    where
        F: FnMut(&mut Self, &RunSummary),
    {
        let mut chunks = 0;
        while !self.paused && !self.is_finished() {
            let summary = self.advance(world)?;
            chunks += 1;
            between(self, &summary);
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosim_kernel::BioWorldEvent;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn counting_world() -> (World, Rc<RefCell<Vec<BioWorldEvent>>>) {
        let mut world = World::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        world.on(move |event, _| {
            sink.borrow_mut().push(event);
            Ok(())
        });
        (world, seen)
    }

    #[test]
    fn runs_in_chunks_until_done() {
        let (mut world, seen) = counting_world();
        let mut controller = RunController::new(5, 0.5, 2).unwrap();
        let chunks = controller.run(&mut world, |_, _| {}).unwrap();
        assert_eq!(chunks, 3);
        assert!(controller.is_finished());
        let progress = controller.progress();
        assert_eq!(progress.completed, 5);
        assert!((progress.elapsed - 2.5).abs() < 1e-12);

        let steps = seen.borrow().iter().filter(|e| **e == BioWorldEvent::Step).count();
        let afters = seen
            .borrow()
            .iter()
            .filter(|e| **e == BioWorldEvent::AfterSimulation)
            .count();
        assert_eq!(steps, 5);
        assert_eq!(afters, 3);
        assert_eq!(world.runs(), 3);

        assert!(matches!(
            controller.advance(&mut world),
            Err(ControlError::Finished { steps: 5 })
        ));
    }

    #[test]
    fn pause_stops_between_chunks() {
        let (mut world, _) = counting_world();
        let mut controller = RunController::new(10, 0.1, 3).unwrap();
        let chunks = controller
            .run(&mut world, |ctl, _| {
                if ctl.progress().completed >= 3 {
                    ctl.pause();
                }
            })
            .unwrap();
        assert_eq!(chunks, 1);
        assert!(controller.is_paused());
        assert!(matches!(controller.advance(&mut world), Err(ControlError::Paused)));
        assert_eq!(controller.remaining(), 7);

        controller.resume();
        let summary = controller.advance(&mut world).unwrap();
        assert_eq!(summary.steps, 3);
        assert_eq!(controller.run(&mut world, |_, _| {}).unwrap(), 2);
        assert_eq!(controller.progress().completed, 10);
    }

    #[test]
    fn world_errors_leave_progress_untouched() {
        let mut world = World::default();
        let mut controller = RunController::new(4, -1.0, 2).unwrap();
        assert!(matches!(
            controller.advance(&mut world),
            Err(ControlError::World(WorldError::InvalidTimestep(_)))
        ));
        assert_eq!(controller.progress().completed, 0);
    }

    #[test]
    fn zero_chunk_is_rejected() {
        assert!(matches!(RunController::new(4, 0.1, 0), Err(ControlError::ZeroChunk)));
    }
}
