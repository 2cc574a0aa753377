//! Construction and local search over the working solution.
//!
//! Every move is made through the [`ScoreDirector`], so a search step leaves
//! the score and the shadow links consistent whether or not it improved.

use tracing::trace;

use crate::domain::LocationId;
use crate::error::SolverError;
use crate::solution::{Score, Standstill};
use crate::solver::ScoreDirector;

/// What a single search step did to the working solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The working solution changed and its score is the new best.
    Improved,
    /// No move improved the score; the search waits for problem changes.
    Idle,
}

/// A search that runs one move at a time between problem changes.
pub trait Search: Send {
    fn step(&mut self, director: &mut ScoreDirector) -> Result<StepOutcome, SolverError>;
}

/// Cheapest insertion for unassigned visits, then first-improvement
/// relocation of assigned visits.
#[derive(Debug, Default, Clone, Copy)]
pub struct CheapestInsertion;

impl Search for CheapestInsertion {
    fn step(&mut self, director: &mut ScoreDirector) -> Result<StepOutcome, SolverError> {
        let unassigned = director.working_solution().unassigned().first().copied();
        if let Some(visit) = unassigned {
            // Without vehicles the visit stays unassigned until one is added.
            if insert_cheapest(director, visit)? {
                return Ok(StepOutcome::Improved);
            }
        }
        relocate_first_improvement(director)
    }
}

/// Inserts the unassigned `visit` after the standstill with the best score.
/// Returns false when there is nowhere to insert it.
fn insert_cheapest(director: &mut ScoreDirector, visit: LocationId) -> Result<bool, SolverError> {
    let mut best: Option<(Score, Standstill)> = None;
    for candidate in candidates(director) {
        director.insert_after(visit, candidate)?;
        let score = director.score();
        director.detach(visit)?;
        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, candidate));
        }
    }

    let Some((score, after)) = best else {
        return Ok(false);
    };
    director.insert_after(visit, after)?;
    trace!(%visit, ?after, %score, "inserted visit");
    Ok(true)
}

fn relocate_first_improvement(director: &mut ScoreDirector) -> Result<StepOutcome, SolverError> {
    let current = director.score();
    let assigned: Vec<(LocationId, Standstill)> = director
        .working_solution()
        .visits()
        .filter_map(|visit| visit.previous().map(|previous| (visit.id(), previous)))
        .collect();

    for (visit, original) in assigned {
        director.detach(visit)?;
        for candidate in candidates(director) {
            if candidate == original {
                continue;
            }
            director.insert_after(visit, candidate)?;
            if director.score() > current {
                trace!(%visit, after = ?candidate, score = %director.score(), "relocated visit");
                return Ok(StepOutcome::Improved);
            }
            director.detach(visit)?;
        }
        director.insert_after(visit, original)?;
    }

    Ok(StepOutcome::Idle)
}

/// Standstills an unassigned visit could follow: every vehicle and every
/// assigned visit.
fn candidates(director: &ScoreDirector) -> Vec<Standstill> {
    let solution = director.working_solution();
    let vehicles = solution.vehicle_ids().iter().copied().map(Standstill::Vehicle);
    let visits = solution
        .visits()
        .filter(|visit| visit.is_assigned())
        .map(|visit| Standstill::Visit(visit.id()));
    vehicles.chain(visits).collect()
}
