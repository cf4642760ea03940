//! Top-level scene container.

use super::SceneObject;
use std::sync::Arc;

/// The root of a scene graph handed to the rendering engine.
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<Arc<SceneObject>>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `object`. Attaching the same object twice is a no-op.
    pub fn add(&mut self, object: Arc<SceneObject>) {
        if !self.contains(&object) {
            self.objects.push(object);
        }
    }

    /// Detach `object`. Returns whether it was attached.
    pub fn remove(&mut self, object: &Arc<SceneObject>) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| !Arc::ptr_eq(o, object));
        self.objects.len() != before
    }

    pub fn contains(&self, object: &Arc<SceneObject>) -> bool {
        self.objects.iter().any(|o| Arc::ptr_eq(o, object))
    }

    pub fn objects(&self) -> &[Arc<SceneObject>] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Advance texture animations by one game tick. Returns how many
    /// materials were redrawn.
    pub fn tick(&self) -> usize {
        self.objects.iter().map(|object| object.tick()).sum()
    }

    /// Detach and dispose everything.
    pub fn clear(&mut self) {
        for object in self.objects.drain(..) {
            object.dispose();
        }
    }
}
