//! Split-line capture. Three input styles, one output: the list of
//! [`SplitLine`]s a subdivision preview is requested with.

pub mod bearing;
pub mod freehand;
pub mod point_list;

use crate::map_surface::{LineKind, MapCommand, MapLayer, MapSurface, MarkerKind};
use crate::models::{SplitLine, Vertex};
use bearing::BearingDistanceCapture;
use freehand::FreehandCapture;
use point_list::PointListCapture;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureMode {
    Freehand,
    PointList,
    BearingDistance,
}

impl CaptureMode {
    pub fn label(&self) -> &'static str {
        match self {
            CaptureMode::Freehand => "line drawing",
            CaptureMode::PointList => "point",
            CaptureMode::BearingDistance => "distance/bearing",
        }
    }
}

#[derive(Clone, Debug)]
pub enum LineCaptureEngine {
    Freehand(FreehandCapture),
    PointList(PointListCapture),
    BearingDistance(BearingDistanceCapture),
}

impl LineCaptureEngine {
    pub fn new(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Freehand => LineCaptureEngine::Freehand(FreehandCapture::new()),
            CaptureMode::PointList => LineCaptureEngine::PointList(PointListCapture::new()),
            CaptureMode::BearingDistance => {
                LineCaptureEngine::BearingDistance(BearingDistanceCapture::new())
            }
        }
    }

    pub fn mode(&self) -> CaptureMode {
        match self {
            LineCaptureEngine::Freehand(_) => CaptureMode::Freehand,
            LineCaptureEngine::PointList(_) => CaptureMode::PointList,
            LineCaptureEngine::BearingDistance(_) => CaptureMode::BearingDistance,
        }
    }

    /// Owned copy of the finished lines, safe to hand to a request.
    pub fn snapshot(&self) -> Vec<SplitLine> {
        match self {
            LineCaptureEngine::Freehand(c) => c.lines().to_vec(),
            LineCaptureEngine::PointList(c) => c.line().into_iter().collect(),
            LineCaptureEngine::BearingDistance(c) => c.line().into_iter().collect(),
        }
    }

    pub fn has_lines(&self) -> bool {
        match self {
            LineCaptureEngine::Freehand(c) => !c.lines().is_empty(),
            LineCaptureEngine::PointList(c) => c.points().len() >= 2,
            LineCaptureEngine::BearingDistance(c) => c.chain().len() >= 2,
        }
    }

    /// Removes the newest unit of input: a whole line when drawing, one
    /// point or one course otherwise.
    pub fn undo(&mut self) -> bool {
        match self {
            LineCaptureEngine::Freehand(c) => c.undo_last_line().is_some(),
            LineCaptureEngine::PointList(c) => c.undo_point().is_some(),
            LineCaptureEngine::BearingDistance(c) => c.undo_leg().is_some(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            LineCaptureEngine::Freehand(c) => c.clear(),
            LineCaptureEngine::PointList(c) => c.clear(),
            LineCaptureEngine::BearingDistance(c) => c.clear(),
        }
    }

    /// Every captured vertex in input order, for export.
    pub fn vertices(&self) -> Vec<Vertex> {
        match self {
            LineCaptureEngine::Freehand(c) => c.vertices().collect(),
            LineCaptureEngine::PointList(c) => c.points().to_vec(),
            LineCaptureEngine::BearingDistance(c) => c.chain().to_vec(),
        }
    }

    pub fn freehand_mut(&mut self) -> Option<&mut FreehandCapture> {
        match self {
            LineCaptureEngine::Freehand(c) => Some(c),
            _ => None,
        }
    }

    pub fn point_list_mut(&mut self) -> Option<&mut PointListCapture> {
        match self {
            LineCaptureEngine::PointList(c) => Some(c),
            _ => None,
        }
    }

    pub fn bearing_mut(&mut self) -> Option<&mut BearingDistanceCapture> {
        match self {
            LineCaptureEngine::BearingDistance(c) => Some(c),
            _ => None,
        }
    }

    /// Redraws the drawings layer from scratch.
    pub fn render(&self, map: &MapSurface) {
        map.clear(MapLayer::Drawings);

        let markers: Vec<Vertex> = match self {
            LineCaptureEngine::Freehand(c) => {
                c.vertices().chain(c.in_progress().iter().copied()).collect()
            }
            _ => self.vertices(),
        };
        for at in markers {
            map.send(MapCommand::DrawMarker {
                at,
                kind: MarkerKind::Vertex,
            });
        }

        for line in self.snapshot() {
            map.send(MapCommand::DrawLine {
                vertices: line.vertices().to_vec(),
                kind: LineKind::Split,
            });
        }

        match self {
            LineCaptureEngine::Freehand(c) => {
                if let Some(vertices) = c.ghost() {
                    map.send(MapCommand::DrawLine {
                        vertices,
                        kind: LineKind::Ghost,
                    });
                }
            }
            LineCaptureEngine::BearingDistance(c) => {
                if let Some(at) = c.start() {
                    map.send(MapCommand::DrawMarker {
                        at,
                        kind: MarkerKind::BearingStart,
                    });
                }
            }
            LineCaptureEngine::PointList(_) => {}
        }
    }
}
