//! Drag/Position Manager
//!
//! Screen position of the minimized overlay, persisted on its own key. A drag
//! is a local session value owned by the manager; every way out of a drag
//! (`end_drag`, `cancel_drag`, a new `begin_drag`) takes it down.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging;
use crate::models::{OverlaySize, Position, Viewport};
use crate::services::durable_store::{DurableStore, POSITION_KEY};

/// Edge snapping parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapSettings {
    /// Distance from an edge under which a release snaps to it
    pub threshold: f64,
    /// Gap left between a snapped overlay and the edge
    pub margin: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            threshold: 48.0,
            margin: 16.0,
        }
    }
}

/// An in-progress drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    /// Pointer position relative to the overlay's top-left corner
    grab_offset: Position,
    /// Where the overlay was when the drag began
    origin: Position,
}

#[derive(Debug, Clone)]
pub struct OverlayPositionManager {
    position: Position,
    viewport: Viewport,
    size: OverlaySize,
    snap: SnapSettings,
    drag: Option<DragSession>,
}

impl OverlayPositionManager {
    pub fn new(viewport: Viewport, size: OverlaySize, snap: SnapSettings) -> Self {
        Self {
            position: default_position(viewport, size, snap),
            viewport,
            size,
            snap,
            drag: None,
        }
    }

    /// Restore the saved position, clamped into `viewport`. Missing or
    /// malformed entries fall back to the bottom-right default.
    pub fn load(
        store: &dyn DurableStore,
        viewport: Viewport,
        size: OverlaySize,
        snap: SnapSettings,
    ) -> Self {
        let mut manager = Self::new(viewport, size, snap);

        match store.get(POSITION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Position>(&raw) {
                Ok(saved) if saved.x.is_finite() && saved.y.is_finite() => {
                    manager.position = manager.clamp(saved);
                }
                Ok(_) => {
                    logging::log_storage_recovered(POSITION_KEY, "non-finite coordinates");
                    discard(store);
                }
                Err(e) => {
                    logging::log_storage_recovered(POSITION_KEY, &e.to_string());
                    discard(store);
                }
            },
            Ok(None) => {}
            Err(e) => logging::log_warning(&e.to_string(), "load overlay position", None),
        }

        manager
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Start dragging with the pointer at `pointer`
    pub fn begin_drag(&mut self, pointer: Position) {
        if let Some(stale) = self.drag.take() {
            debug!(origin = ?stale.origin, "Replacing unfinished drag session");
        }

        self.drag = Some(DragSession {
            grab_offset: pointer.offset_from(self.position),
            origin: self.position,
        });
    }

    /// Follow the pointer; not persisted until the drag ends
    pub fn drag_to(&mut self, pointer: Position) -> bool {
        match self.drag {
            Some(session) => {
                self.position = pointer.offset_from(session.grab_offset);
                true
            }
            None => false,
        }
    }

    /// Release: snap to nearby edges, clamp, persist
    pub fn end_drag(&mut self, store: &dyn DurableStore) -> Option<Position> {
        self.drag.take()?;

        self.position = self.clamp(self.snap_to_edges(self.position));
        self.save(store);
        Some(self.position)
    }

    /// Abandon the drag (e.g. the overlay went away) and go back to the origin
    pub fn cancel_drag(&mut self) -> bool {
        match self.drag.take() {
            Some(session) => {
                self.position = session.origin;
                true
            }
            None => false,
        }
    }

    /// Adopt a new viewport, pulling the overlay back into bounds
    pub fn set_viewport(&mut self, viewport: Viewport, store: &dyn DurableStore) -> Position {
        self.viewport = viewport;

        let clamped = self.clamp(self.position);
        if clamped != self.position {
            self.position = clamped;
            self.save(store);
        }
        self.position
    }

    /// Back to the default corner, without persisting
    pub fn reset(&mut self) {
        self.drag = None;
        self.position = default_position(self.viewport, self.size, self.snap);
    }

    pub fn save(&self, store: &dyn DurableStore) {
        let result = serde_json::to_string(&self.position)
            .map_err(|e| e.to_string())
            .and_then(|raw| store.set(POSITION_KEY, &raw).map_err(|e| e.to_string()));

        if let Err(e) = result {
            logging::log_warning(&e, "save overlay position", None);
        }
    }

    fn snap_to_edges(&self, position: Position) -> Position {
        let Position { mut x, mut y } = position;
        let max_x = self.size.max_x(self.viewport);
        let max_y = self.size.max_y(self.viewport);
        let SnapSettings { threshold, margin } = self.snap;

        if x < threshold {
            x = margin;
        } else if max_x - x < threshold {
            x = max_x - margin;
        }

        if y < threshold {
            y = margin;
        } else if max_y - y < threshold {
            y = max_y - margin;
        }

        Position::new(x, y)
    }

    fn clamp(&self, position: Position) -> Position {
        Position::new(
            position.x.clamp(0.0, self.size.max_x(self.viewport)),
            position.y.clamp(0.0, self.size.max_y(self.viewport)),
        )
    }
}

fn default_position(viewport: Viewport, size: OverlaySize, snap: SnapSettings) -> Position {
    Position::new(
        (size.max_x(viewport) - snap.margin).max(0.0),
        (size.max_y(viewport) - snap.margin).max(0.0),
    )
}

fn discard(store: &dyn DurableStore) {
    if let Err(e) = store.remove(POSITION_KEY) {
        logging::log_warning(&e.to_string(), "discard overlay position", None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::durable_store::MemoryStore;

    fn manager() -> OverlayPositionManager {
        OverlayPositionManager::new(
            Viewport::new(1000.0, 600.0),
            OverlaySize {
                width: 200.0,
                height: 100.0,
            },
            SnapSettings {
                threshold: 40.0,
                margin: 10.0,
            },
        )
    }

    fn drag(manager: &mut OverlayPositionManager, to: Position, store: &MemoryStore) -> Position {
        let start = manager.position();
        manager.begin_drag(Position::new(start.x + 5.0, start.y + 5.0));
        manager.drag_to(Position::new(to.x + 5.0, to.y + 5.0));
        manager.end_drag(store).unwrap()
    }

    #[test]
    fn test_default_position_is_bottom_right() {
        assert_eq!(manager().position(), Position::new(790.0, 490.0));
    }

    #[test]
    fn test_release_in_middle_stays_put() {
        let store = MemoryStore::new();
        let mut manager = manager();

        let released = drag(&mut manager, Position::new(300.0, 200.0), &store);

        assert_eq!(released, Position::new(300.0, 200.0));
        assert_eq!(
            store.get(POSITION_KEY).unwrap().as_deref(),
            Some(r#"{"x":300.0,"y":200.0}"#)
        );
    }

    #[test]
    fn test_release_near_edges_snaps_with_margin() {
        let store = MemoryStore::new();
        let mut manager = manager();

        assert_eq!(
            drag(&mut manager, Position::new(25.0, 250.0), &store),
            Position::new(10.0, 250.0)
        );
        assert_eq!(
            drag(&mut manager, Position::new(780.0, 5.0), &store),
            Position::new(790.0, 10.0)
        );
    }

    #[test]
    fn test_release_outside_viewport_is_clamped() {
        let store = MemoryStore::new();
        let mut manager = manager();

        let released = drag(&mut manager, Position::new(-500.0, 2000.0), &store);
        assert_eq!(released, Position::new(10.0, 490.0));
    }

    #[test]
    fn test_drag_move_does_not_persist() {
        let store = MemoryStore::new();
        let mut manager = manager();

        manager.begin_drag(Position::new(800.0, 500.0));
        assert!(manager.drag_to(Position::new(400.0, 300.0)));

        assert_eq!(manager.position(), Position::new(390.0, 290.0));
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_cancel_returns_to_origin_and_ends_session() {
        let mut manager = manager();
        let origin = manager.position();

        manager.begin_drag(Position::new(800.0, 500.0));
        manager.drag_to(Position::new(100.0, 100.0));
        assert!(manager.cancel_drag());

        assert_eq!(manager.position(), origin);
        assert!(!manager.is_dragging());
        assert!(!manager.drag_to(Position::new(0.0, 0.0)));
    }

    #[test]
    fn test_end_without_drag_is_noop() {
        let store = MemoryStore::new();
        let mut manager = manager();

        assert_eq!(manager.end_drag(&store), None);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_resize_clamps_and_persists_only_when_moved() {
        let store = MemoryStore::new();
        let mut manager = manager();

        manager.set_viewport(Viewport::new(1200.0, 700.0), &store);
        assert_eq!(store.write_count(), 0);

        let clamped = manager.set_viewport(Viewport::new(500.0, 300.0), &store);
        assert_eq!(clamped, Position::new(300.0, 200.0));
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_load_clamps_saved_position() {
        let store = MemoryStore::new();
        store.set(POSITION_KEY, r#"{"x":5000.0,"y":10.0}"#).unwrap();

        let manager = OverlayPositionManager::load(
            &store,
            Viewport::new(1000.0, 600.0),
            OverlaySize {
                width: 200.0,
                height: 100.0,
            },
            SnapSettings::default(),
        );

        assert_eq!(manager.position(), Position::new(800.0, 10.0));
    }

    #[test]
    fn test_load_discards_malformed_position() {
        let store = MemoryStore::new();
        store.set(POSITION_KEY, "[1,2").unwrap();

        let manager = OverlayPositionManager::load(
            &store,
            Viewport::default(),
            OverlaySize::default(),
            SnapSettings::default(),
        );

        assert_eq!(
            manager.position(),
            default_position(Viewport::default(), OverlaySize::default(), SnapSettings::default())
        );
        assert_eq!(store.get(POSITION_KEY).unwrap(), None);
    }
}
