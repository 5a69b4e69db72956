use crate::models::{SplitLine, Vertex};

/// Click-to-draw split lines. Primary clicks add vertices to the line being
/// drawn, a secondary click closes it.
#[derive(Clone, Debug, Default)]
pub struct FreehandCapture {
    current: Vec<Vertex>,
    cursor: Option<Vertex>,
    finished: Vec<SplitLine>,
}

impl FreehandCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_vertex(&mut self, at: Vertex) {
        self.current.push(at);
    }

    /// Tracks the pointer; returns the rubber-band line when a line is open.
    pub fn pointer_moved(&mut self, at: Vertex) -> Option<Vec<Vertex>> {
        self.cursor = Some(at);
        self.ghost()
    }

    pub fn ghost(&self) -> Option<Vec<Vertex>> {
        if self.current.is_empty() {
            return None;
        }
        let mut ghost = self.current.clone();
        ghost.extend(self.cursor);
        Some(ghost)
    }

    /// Closes the open line. A line with fewer than two vertices is dropped.
    /// Returns true if a line was added.
    pub fn finish_line(&mut self) -> bool {
        let vertices = std::mem::take(&mut self.current);
        self.cursor = None;

        match SplitLine::new(vertices) {
            Some(line) => {
                self.finished.push(line);
                true
            }
            None => false,
        }
    }

    pub fn undo_last_line(&mut self) -> Option<SplitLine> {
        self.finished.pop()
    }

    pub fn clear(&mut self) {
        self.current.clear();
        self.cursor = None;
        self.finished.clear();
    }

    pub fn in_progress(&self) -> &[Vertex] {
        &self.current
    }

    pub fn lines(&self) -> &[SplitLine] {
        &self.finished
    }

    /// Every vertex of every finished line, in drawing order.
    pub fn vertices(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.finished
            .iter()
            .flat_map(|line| line.vertices().iter().copied())
    }
}
