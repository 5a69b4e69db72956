use super::consolidate::ConsolidateSession;
use super::subdivide::SubdivideSession;
use crate::capture::CaptureMode;
use crate::config::{EditorConfig, RetryPolicy};
use crate::map_surface::MapSurface;
use crate::models::Parcel;
use crate::registry::ParcelRegistry;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToolKind {
    None,
    Subdivide,
    Consolidate,
}

enum ActiveTool<R> {
    None,
    Subdivide(SubdivideSession<R>),
    Consolidate(ConsolidateSession<R>),
}

impl<R> Default for ActiveTool<R> {
    fn default() -> Self {
        ActiveTool::None
    }
}

/// Owns whichever editing tool is open. Only one tool is open at a time;
/// opening one closes the other, discarding its unsaved work.
pub struct EditorWorkbench<R> {
    registry: Arc<R>,
    map: MapSurface,
    retry: RetryPolicy,
    active: ActiveTool<R>,
}

impl<R: ParcelRegistry> EditorWorkbench<R> {
    pub fn new(registry: Arc<R>, map: MapSurface, config: &EditorConfig) -> Self {
        Self {
            registry,
            map,
            retry: config.retry_policy(),
            active: ActiveTool::None,
        }
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    pub fn active_tool(&self) -> ToolKind {
        match self.active {
            ActiveTool::None => ToolKind::None,
            ActiveTool::Subdivide(_) => ToolKind::Subdivide,
            ActiveTool::Consolidate(_) => ToolKind::Consolidate,
        }
    }

    /// Opens the subdivide tool, or switches its input mode if already open.
    pub fn open_subdivide(&mut self, mode: CaptureMode) {
        if let ActiveTool::Subdivide(session) = &mut self.active {
            if let Err(e) = session.set_mode(mode) {
                tracing::debug!("mode stays {:?}: {}", session.mode(), e);
            }
            return;
        }

        self.close();
        tracing::info!("opening subdivide tool ({})", mode.label());
        self.active = ActiveTool::Subdivide(
            SubdivideSession::new(self.registry.clone(), self.map.clone(), mode)
                .with_retry_policy(self.retry),
        );
    }

    pub fn open_consolidate(&mut self) {
        if matches!(self.active, ActiveTool::Consolidate(_)) {
            return;
        }

        self.close();
        tracing::info!("opening consolidate tool");
        self.active = ActiveTool::Consolidate(
            ConsolidateSession::new(self.registry.clone()).with_retry_policy(self.retry),
        );
    }

    pub fn close(&mut self) {
        match std::mem::take(&mut self.active) {
            ActiveTool::Subdivide(mut session) => session.discard(),
            ActiveTool::Consolidate(mut session) => session.cancel(),
            ActiveTool::None => {}
        }
    }

    pub fn subdivide(&mut self) -> Option<&mut SubdivideSession<R>> {
        match &mut self.active {
            ActiveTool::Subdivide(session) => Some(session),
            _ => None,
        }
    }

    pub fn consolidate(&mut self) -> Option<&mut ConsolidateSession<R>> {
        match &mut self.active {
            ActiveTool::Consolidate(session) => Some(session),
            _ => None,
        }
    }

    /// Routes a click on a rendered parcel to the open tool. Returns false
    /// when no tool took it.
    pub fn parcel_clicked(&mut self, parcel: Parcel) -> bool {
        match &mut self.active {
            ActiveTool::Subdivide(session) => session.select_parcel(parcel),
            ActiveTool::Consolidate(session) => {
                session.toggle_select(parcel);
                true
            }
            ActiveTool::None => false,
        }
    }
}
