//! Lifecycle of the daemon solver thread.
//!
//! The solver thread owns the working solution exclusively. Problem changes
//! and the termination request reach it through a channel and are applied
//! strictly between search steps. Best solutions leave it as detached
//! [`SolutionSnapshot`]s, so no mutable state crosses the thread boundary.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::change::ProblemChange;
use crate::config::SolverConfig;
use crate::domain::{LocationId, Vehicle, VehicleId};
use crate::error::SolverError;
use crate::events::{ErrorEvent, ErrorNotifier};
use crate::plan::SolutionSnapshot;
use crate::solution::{PlanningVisit, Score, WorkingSolution};
use crate::solver::{CheapestInsertion, ScoreDirector, Search, StepOutcome};

/// Builds a fresh search for every solver start.
pub type SearchFactory = Arc<dyn Fn() -> Box<dyn Search> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    NotStarted,
    Running,
    Stopped,
}

enum Command {
    Change(ProblemChange),
    Terminate,
}

struct Worker {
    commands: Sender<Command>,
    /// Changes sent to the solver thread but not yet applied.
    pending: Arc<AtomicUsize>,
    handle: JoinHandle<Result<(), SolverError>>,
}

struct Lifecycle {
    state: SolverState,
    worker: Option<Worker>,
}

pub struct SolverManager {
    config: SolverConfig,
    search: SearchFactory,
    best_solutions: Sender<SolutionSnapshot>,
    errors: Arc<ErrorNotifier>,
    lifecycle: Mutex<Lifecycle>,
}

impl SolverManager {
    /// Accepted best solutions are sent to `best_solutions`; failures of the
    /// solver thread are reported through `errors`.
    pub fn new(config: SolverConfig, best_solutions: Sender<SolutionSnapshot>, errors: Arc<ErrorNotifier>) -> Self {
        Self {
            config,
            search: Arc::new(|| Box::new(CheapestInsertion) as Box<dyn Search>),
            best_solutions,
            errors,
            lifecycle: Mutex::new(Lifecycle {
                state: SolverState::NotStarted,
                worker: None,
            }),
        }
    }

    pub fn with_search(mut self, factory: SearchFactory) -> Self {
        self.search = factory;
        self
    }

    pub fn state(&self) -> SolverState {
        self.lifecycle.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SolverState::Running
    }

    /// Starts daemon solving of `solution` on a dedicated thread.
    ///
    /// A stopped solver may be started again; a running one may not.
    pub fn start_solver(&self, solution: WorkingSolution) -> Result<(), SolverError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state == SolverState::Running {
            return Err(SolverError::AlreadyStarted);
        }

        let (commands, inbox) = mpsc::channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker_loop = WorkerLoop {
            inbox,
            pending: Arc::clone(&pending),
            search: (self.search)(),
            best_solutions: self.best_solutions.clone(),
            idle_wait: self.config.idle_wait(),
        };
        let errors = Arc::clone(&self.errors);
        let visits = solution.visit_ids().len();
        let vehicles = solution.vehicle_ids().len();

        let handle = thread::Builder::new()
            .name("solver".to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(move || worker_loop.run(solution)))
                    .unwrap_or_else(|payload| Err(SolverError::Panicked(panic_message(payload.as_ref()))));
                if let Err(err) = &result {
                    errors.notify(ErrorEvent::solver(err, "daemon solver"));
                }
                result
            })
            .map_err(|err| SolverError::Spawn(err.to_string()))?;

        lifecycle.state = SolverState::Running;
        lifecycle.worker = Some(Worker {
            commands,
            pending,
            handle,
        });
        info!(visits, vehicles, "solver started");
        Ok(())
    }

    /// Terminates the solver and waits for its thread to exit.
    ///
    /// Returns the error that ended the solver thread, if any. Stopping a
    /// solver that is not running does nothing.
    pub fn stop_solver(&self) -> Result<(), SolverError> {
        let mut lifecycle = self.lifecycle.lock();
        let Some(worker) = lifecycle.worker.take() else {
            return Ok(());
        };
        lifecycle.state = SolverState::Stopped;

        // The thread may already be gone; join reports why.
        let _ = worker.commands.send(Command::Terminate);
        let result = worker
            .handle
            .join()
            .unwrap_or_else(|payload| Err(SolverError::Panicked(panic_message(payload.as_ref()))));
        match &result {
            Ok(()) => info!("solver stopped"),
            Err(err) => warn!(error = %err, "solver stopped after failure"),
        }
        result
    }

    pub fn add_visit(&self, visit: PlanningVisit) -> Result<(), SolverError> {
        self.submit(ProblemChange::AddVisit(visit))
    }

    pub fn remove_visit(&self, id: LocationId) -> Result<(), SolverError> {
        self.submit(ProblemChange::RemoveVisit(id))
    }

    pub fn add_vehicle(&self, vehicle: Vehicle) -> Result<(), SolverError> {
        self.submit(ProblemChange::AddVehicle(vehicle))
    }

    pub fn remove_vehicle(&self, id: VehicleId) -> Result<(), SolverError> {
        self.submit(ProblemChange::RemoveVehicle(id))
    }

    pub fn change_capacity(&self, vehicle: VehicleId, capacity: u32) -> Result<(), SolverError> {
        self.submit(ProblemChange::ChangeVehicleCapacity { vehicle, capacity })
    }

    /// Queues `change` for the solver thread. Returns once it is queued, not
    /// once it is applied.
    pub fn submit(&self, change: ProblemChange) -> Result<(), SolverError> {
        let lifecycle = self.lifecycle.lock();
        let worker = live_worker(&lifecycle)?;

        debug!(change = %change, "submitting problem change");
        worker.pending.fetch_add(1, Ordering::SeqCst);
        if worker.commands.send(Command::Change(change)).is_err() {
            worker.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(SolverError::TerminatedUnexpectedly);
        }
        Ok(())
    }
}

impl Drop for SolverManager {
    fn drop(&mut self) {
        if let Some(worker) = self.lifecycle.get_mut().worker.take() {
            let _ = worker.commands.send(Command::Terminate);
            let _ = worker.handle.join();
        }
    }
}

fn live_worker(lifecycle: &Lifecycle) -> Result<&Worker, SolverError> {
    let worker = match (&lifecycle.state, &lifecycle.worker) {
        (SolverState::Running, Some(worker)) => worker,
        _ => return Err(SolverError::NotRunning),
    };
    if worker.handle.is_finished() {
        error!("daemon solver thread finished while running");
        return Err(SolverError::TerminatedUnexpectedly);
    }
    Ok(worker)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct BestSolutionChanged {
    snapshot: SolutionSnapshot,
    score: Score,
    all_changes_processed: bool,
}

struct WorkerLoop {
    inbox: Receiver<Command>,
    pending: Arc<AtomicUsize>,
    search: Box<dyn Search>,
    best_solutions: Sender<SolutionSnapshot>,
    idle_wait: Duration,
}

impl WorkerLoop {
    fn run(mut self, solution: WorkingSolution) -> Result<(), SolverError> {
        let mut director = ScoreDirector::new(solution)?;
        self.publish(&director)?;

        let mut received = None;
        loop {
            let mut applied = 0;
            loop {
                let command = match received.take() {
                    Some(command) => command,
                    None => match self.inbox.try_recv() {
                        Ok(command) => command,
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => return Ok(()),
                    },
                };
                match command {
                    Command::Terminate => {
                        debug!(score = %director.score(), "solver terminating");
                        return Ok(());
                    }
                    Command::Change(change) => {
                        let result = change.apply(&mut director);
                        self.pending.fetch_sub(1, Ordering::SeqCst);
                        if let Err(err) = result {
                            error!(change = %change, error = %err, "problem change failed");
                            return Err(err);
                        }
                        applied += 1;
                    }
                }
            }
            if applied > 0 {
                self.publish(&director)?;
            }

            match self.search.step(&mut director)? {
                StepOutcome::Improved => self.publish(&director)?,
                StepOutcome::Idle => match self.inbox.recv_timeout(self.idle_wait) {
                    Ok(command) => received = Some(command),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return Ok(()),
                },
            }
        }
    }

    /// Captures the chains of the working solution before the next step
    /// mutates them again.
    fn publish(&self, director: &ScoreDirector) -> Result<(), SolverError> {
        let score = director.score();
        let event = BestSolutionChanged {
            snapshot: director.working_solution().snapshot(score)?,
            score,
            all_changes_processed: self.pending.load(Ordering::SeqCst) == 0,
        };
        self.on_best_solution(event);
        Ok(())
    }

    fn on_best_solution(&self, event: BestSolutionChanged) {
        if !event.all_changes_processed {
            debug!(score = %event.score, "discarding best solution with unapplied problem changes");
            return;
        }
        if self.best_solutions.send(event.snapshot).is_err() {
            debug!("best solution listener is gone");
        }
    }
}
