use crate::errors::ValidationError;
use crate::geodesy::{self, TraverseLeg};
use crate::models::{SplitLine, Vertex};

/// Survey-style line construction: pick a start point on the map, then add
/// courses of distance and bearing. Each course starts where the last ended.
#[derive(Clone, Debug, Default)]
pub struct BearingDistanceCapture {
    picking_start: bool,
    start: Option<Vertex>,
    chain: Vec<Vertex>,
}

impl BearingDistanceCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next map pick will set the start point.
    pub fn arm_start_pick(&mut self) {
        self.picking_start = true;
    }

    pub fn is_picking_start(&self) -> bool {
        self.picking_start
    }

    /// Consumes a map pick if one was armed.
    pub fn map_pick(&mut self, at: Vertex) -> bool {
        if !self.picking_start {
            return false;
        }
        self.picking_start = false;
        self.start = Some(at);
        true
    }

    pub fn set_start(&mut self, at: Vertex) {
        self.start = Some(at);
    }

    pub fn start(&self) -> Option<Vertex> {
        self.start
    }

    /// Forgets the start point but keeps the courses already laid out.
    pub fn clear_start(&mut self) {
        self.start = None;
        self.picking_start = false;
    }

    pub fn add_leg(&mut self, leg: TraverseLeg) -> Result<Vertex, ValidationError> {
        let start = self.start.ok_or(ValidationError::NoStartPoint)?;
        if !leg.is_finite() {
            return Err(ValidationError::InvalidSegment);
        }

        // A start picked away from the chain's end opens with a jump to it
        if self.chain.last() != Some(&start) {
            self.chain.push(start);
        }

        let next = geodesy::destination(start, leg.distance_m, leg.bearing_deg);
        self.chain.push(next);
        self.start = Some(next);

        Ok(next)
    }

    /// Drops the most recent course and moves the start back to where it began.
    pub fn undo_leg(&mut self) -> Option<Vertex> {
        let removed = self.chain.pop()?;
        match self.chain.len() {
            0 => {}
            1 => {
                self.start = self.chain.pop();
            }
            _ => {
                self.start = self.chain.last().copied();
            }
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn chain(&self) -> &[Vertex] {
        &self.chain
    }

    pub fn line(&self) -> Option<SplitLine> {
        SplitLine::new(self.chain.clone())
    }
}
