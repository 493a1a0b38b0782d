//! The authoritative, process-local stroke log.

use crate::stroke::Stroke;

/// Ordered sequence of strokes in application order.
///
/// The store only changes through `apply_draw`, `apply_clear_all` and
/// `apply_clear_user`, so its content is a pure function of the bus events
/// it has been fed.
// TODO: bound the log (max stroke count or periodic compaction); it currently
// grows for as long as the board is never cleared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeStore {
    strokes: Vec<Stroke>,
}

impl StrokeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stroke to the end of the log.
    pub fn apply_draw(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    /// Drop every stroke.
    pub fn apply_clear_all(&mut self) {
        self.strokes.clear();
    }

    /// Drop every stroke authored by `user_id`, keeping the others in order.
    ///
    /// Returns how many strokes were removed.
    pub fn apply_clear_user(&mut self, user_id: &str) -> usize {
        let before = self.strokes.len();
        self.strokes.retain(|stroke| stroke.user_id() != user_id);
        before - self.strokes.len()
    }

    /// Point-in-time copy of the log, for resyncing clients.
    pub fn snapshot(&self) -> Vec<Stroke> {
        self.strokes.clone()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}
