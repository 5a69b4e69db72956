//! Commands for the map rendering surface.
//!
//! Editing sessions never touch the map directly. They push [`MapCommand`]s
//! into a channel created when the editor is wired up, and whatever draws the
//! map drains the receiving end.

use crate::models::Vertex;
use geo::BoundingRect;
use geo_types::{Polygon, Rect};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapLayer {
    /// Split-line markers, polylines and the rubber-band line.
    Drawings,
    /// Server-computed subdivision parts.
    Preview,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    Vertex,
    BearingStart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    /// Vertices of a line still being drawn, trailing to the cursor.
    Ghost,
    Split,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartStyle {
    Normal,
    Focused,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MapCommand {
    ClearLayer(MapLayer),
    DrawMarker {
        at: Vertex,
        kind: MarkerKind,
    },
    DrawLine {
        vertices: Vec<Vertex>,
        kind: LineKind,
    },
    DrawPreviewPart {
        index: usize,
        polygon: Polygon<f64>,
    },
    StylePreviewPart {
        index: usize,
        style: PartStyle,
    },
    FitBounds(Rect<f64>),
}

/// Sending half of the map command channel.
#[derive(Clone, Debug)]
pub struct MapSurface {
    tx: UnboundedSender<MapCommand>,
}

impl MapSurface {
    pub fn channel() -> (Self, UnboundedReceiver<MapCommand>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    /// A surface nobody listens to, for headless use.
    pub fn detached() -> Self {
        Self::channel().0
    }

    pub fn send(&self, command: MapCommand) {
        if self.tx.send(command).is_err() {
            tracing::trace!("map surface closed, dropping command");
        }
    }

    pub fn clear(&self, layer: MapLayer) {
        self.send(MapCommand::ClearLayer(layer));
    }

    pub fn fit_polygon(&self, polygon: &Polygon<f64>) {
        if let Some(bounds) = polygon.bounding_rect() {
            self.send(MapCommand::FitBounds(bounds));
        }
    }
}

/// Drains everything queued so far without waiting.
pub fn drain(rx: &mut UnboundedReceiver<MapCommand>) -> Vec<MapCommand> {
    let mut out = Vec::new();
    while let Ok(command) = rx.try_recv() {
        out.push(command);
    }
    out
}
