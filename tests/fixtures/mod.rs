//! Test fixtures for vrp-live-planner.
//!
//! Provides realistic test data and instrumented collaborators:
//! - Real Las Vegas / Henderson places (from OpenStreetMap)
//! - Cost sources that count calls, break symmetry or refuse routes
//! - Helpers for waiting on published plans

#![allow(dead_code, unused_imports)]

pub mod las_vegas;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use vrp_live_planner::Coordinates;
use vrp_live_planner::RoutingPlan;
use vrp_live_planner::error::DistanceError;
use vrp_live_planner::haversine::Haversine;
use vrp_live_planner::traits::CostSource;

pub use las_vegas::*;

/// Haversine distances, recording every call.
#[derive(Debug, Default)]
pub struct CountingCostSource {
    calls: AtomicUsize,
    pairs: Mutex<Vec<(Coordinates, Coordinates)>>,
}

impl CountingCostSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// How often the ordered pair was requested.
    pub fn calls_for(&self, from: Coordinates, to: Coordinates) -> usize {
        self.pairs
            .lock()
            .iter()
            .filter(|&&(f, t)| f == from && t == to)
            .count()
    }
}

impl CostSource for CountingCostSource {
    fn cost(&self, from: Coordinates, to: Coordinates) -> Result<Option<u64>, DistanceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pairs.lock().push((from, to));
        Haversine::new().cost(from, to)
    }
}

/// Northbound legs cost a fixed surcharge on top of the haversine distance.
#[derive(Debug, Default)]
pub struct UphillCostSource;

pub const UPHILL_SURCHARGE: u64 = 500;

impl CostSource for UphillCostSource {
    fn cost(&self, from: Coordinates, to: Coordinates) -> Result<Option<u64>, DistanceError> {
        let base = Haversine::meters(from, to).round() as u64;
        let surcharge = if to.lat > from.lat { UPHILL_SURCHARGE } else { 0 };
        Ok(Some(base + surcharge))
    }
}

/// Reports no route to or from one island point.
#[derive(Debug)]
pub struct IslandCostSource {
    pub island: Coordinates,
}

impl CostSource for IslandCostSource {
    fn cost(&self, from: Coordinates, to: Coordinates) -> Result<Option<u64>, DistanceError> {
        if from == self.island || to == self.island {
            return Ok(None);
        }
        Haversine::new().cost(from, to)
    }
}

/// Only refuses routes leaving the island point.
#[derive(Debug)]
pub struct OutboundIslandCostSource {
    pub island: Coordinates,
}

impl CostSource for OutboundIslandCostSource {
    fn cost(&self, from: Coordinates, to: Coordinates) -> Result<Option<u64>, DistanceError> {
        if from == self.island {
            return Ok(None);
        }
        Haversine::new().cost(from, to)
    }
}

pub const PLAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Waits for a published plan that satisfies `accept`.
pub fn wait_for_plan(
    plans: &Receiver<Arc<RoutingPlan>>,
    accept: impl Fn(&RoutingPlan) -> bool,
) -> Option<Arc<RoutingPlan>> {
    let deadline = Instant::now() + PLAN_TIMEOUT;
    loop {
        let remaining = deadline.checked_duration_since(Instant::now())?;
        let plan = plans.recv_timeout(remaining).ok()?;
        if accept(&plan) {
            return Some(plan);
        }
    }
}

/// Polls `condition` until it holds or the plan timeout passes.
pub fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + PLAN_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
