//! Polyline representation for route tracks.
//!
//! A route track is a list of polylines, one per leg of the itinerary.
//! Encoding to the compact polyline format happens at the transport
//! boundary, not here.

use serde::{Deserialize, Serialize};

use crate::domain::Coordinates;

/// One leg of a route track as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Coordinates>,
}

impl Polyline {
    pub fn new(points: Vec<Coordinates>) -> Self {
        Self { points }
    }

    /// A straight segment between two points.
    pub fn straight(from: Coordinates, to: Coordinates) -> Self {
        Self {
            points: vec![from, to],
        }
    }

    pub fn points(&self) -> &[Coordinates] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Coordinates> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<Coordinates> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Coordinates> {
        self.points.last().copied()
    }
}

impl From<Vec<(f64, f64)>> for Polyline {
    fn from(points: Vec<(f64, f64)>) -> Self {
        Self::new(points.into_iter().map(Coordinates::from).collect())
    }
}
