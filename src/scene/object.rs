//! Scene graph nodes and per-instance transforms.

use super::{Material, Mesh};
use crate::error::{RenderError, Result};
use crate::resource_pack::{BlockModel, ModelElement};
use glam::{EulerRot, Mat4, Quat, Vec3};
use parking_lot::Mutex;
use std::sync::Arc;

/// Per-slot transforms of an instanced object.
#[derive(Debug)]
struct Instancing {
    capacity: Option<usize>,
    /// `None` marks a released slot.
    matrices: Vec<Option<Mat4>>,
    free: Vec<usize>,
}

#[derive(Debug)]
struct ObjectInner {
    mesh: Option<Mesh>,
    material: Option<Material>,
    transform: Mat4,
    instancing: Option<Instancing>,
    children: Vec<Arc<SceneObject>>,
    disposed: bool,
}

/// A node in the scene graph: optional geometry and material, a transform,
/// and children.
///
/// Once [`SceneObject::enable_instancing`] has been called the object owns a
/// table of instance transforms instead of being drawn once. Slots are handed
/// out by [`SceneObject::next_instance`].
#[derive(Debug)]
pub struct SceneObject {
    name: String,
    inner: Mutex<ObjectInner>,
}

impl SceneObject {
    /// An empty group node.
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None, None)
    }

    pub fn with_mesh(name: impl Into<String>, mesh: Mesh, material: Material) -> Self {
        Self::build(name.into(), Some(mesh), Some(material))
    }

    /// A full cube with the missing-texture material, rendered in place of
    /// assets that could not be resolved.
    pub fn placeholder(name: impl Into<String>) -> Self {
        let model = BlockModel {
            elements: Some(vec![ModelElement::cube("#missing")]),
            ..Default::default()
        };
        Self::with_mesh(name, Mesh::from_model(&model), Material::missing())
    }

    fn build(name: String, mesh: Option<Mesh>, material: Option<Material>) -> Self {
        Self {
            name,
            inner: Mutex::new(ObjectInner {
                mesh,
                material,
                transform: Mat4::IDENTITY,
                instancing: None,
                children: Vec::new(),
                disposed: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> Option<Mesh> {
        self.inner.lock().mesh.clone()
    }

    pub fn material(&self) -> Option<Material> {
        self.inner.lock().material.clone()
    }

    /// Whether this object renders the missing-texture material.
    pub fn is_placeholder(&self) -> bool {
        self.inner
            .lock()
            .material
            .as_ref()
            .map(Material::is_missing)
            .unwrap_or(false)
    }

    // Object transform

    pub fn matrix(&self) -> Mat4 {
        self.inner.lock().transform
    }

    pub fn set_matrix(&self, matrix: Mat4) {
        self.inner.lock().transform = matrix;
    }

    pub fn position(&self) -> Vec3 {
        decompose(&self.matrix()).2
    }

    pub fn set_position(&self, position: Vec3) {
        self.update_transform(|_, rotation, scale| (position, rotation, scale));
    }

    pub fn rotation(&self) -> Quat {
        decompose(&self.matrix()).1
    }

    pub fn set_rotation(&self, rotation: Quat) {
        self.update_transform(|position, _, scale| (position, rotation, scale));
    }

    /// Set the rotation from XYZ Euler angles in degrees.
    pub fn set_rotation_euler_degrees(&self, degrees: [f32; 3]) {
        let [x, y, z] = degrees;
        self.set_rotation(Quat::from_euler(
            EulerRot::XYZ,
            x.to_radians(),
            y.to_radians(),
            z.to_radians(),
        ));
    }

    pub fn scale(&self) -> Vec3 {
        decompose(&self.matrix()).0
    }

    pub fn set_scale(&self, scale: Vec3) {
        self.update_transform(|position, rotation, _| (position, rotation, scale));
    }

    fn update_transform(&self, f: impl FnOnce(Vec3, Quat, Vec3) -> (Vec3, Quat, Vec3)) {
        let mut inner = self.inner.lock();
        inner.transform = recompose(&inner.transform, f);
    }

    // Instancing

    pub fn is_instanced(&self) -> bool {
        self.inner.lock().instancing.is_some()
    }

    /// Opt into instanced rendering with at most `capacity` live slots.
    /// Calling it again on an instanced object changes nothing.
    pub fn enable_instancing(&self, capacity: Option<usize>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(RenderError::Disposed(self.name.clone()));
        }
        if inner.instancing.is_none() {
            log::debug!("Enabling instancing for {}", self.name);
            inner.instancing = Some(Instancing {
                capacity,
                matrices: Vec::new(),
                free: Vec::new(),
            });
        }
        Ok(())
    }

    /// Claim an instance slot initialised to the identity transform.
    ///
    /// Released slots are reissued first; otherwise slots grow monotonically.
    pub fn next_instance(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(RenderError::Disposed(self.name.clone()));
        }
        let instancing = inner
            .instancing
            .as_mut()
            .ok_or_else(|| RenderError::NotInstanced(self.name.clone()))?;

        if let Some(slot) = instancing.free.pop() {
            instancing.matrices[slot] = Some(Mat4::IDENTITY);
            return Ok(slot);
        }
        if let Some(capacity) = instancing.capacity {
            if instancing.matrices.len() >= capacity {
                return Err(RenderError::InstanceCapacity {
                    object: self.name.clone(),
                    capacity,
                });
            }
        }
        instancing.matrices.push(Some(Mat4::IDENTITY));
        Ok(instancing.matrices.len() - 1)
    }

    /// Return `slot` to the free list.
    pub fn release_instance(&self, slot: usize) -> Result<()> {
        let mut inner = self.inner.lock();
        let instancing = inner
            .instancing
            .as_mut()
            .ok_or_else(|| RenderError::NotInstanced(self.name.clone()))?;
        match instancing.matrices.get_mut(slot) {
            Some(matrix) if matrix.is_some() => {
                *matrix = None;
                instancing.free.push(slot);
                Ok(())
            }
            _ => Err(RenderError::InvalidSlot {
                object: self.name.clone(),
                slot,
            }),
        }
    }

    /// Number of live instance slots.
    pub fn instance_count(&self) -> usize {
        self.inner
            .lock()
            .instancing
            .as_ref()
            .map(|instancing| instancing.matrices.iter().filter(|m| m.is_some()).count())
            .unwrap_or(0)
    }

    /// Transforms of every live slot, by slot index.
    pub fn instance_matrices(&self) -> Vec<(usize, Mat4)> {
        let inner = self.inner.lock();
        let Some(instancing) = &inner.instancing else {
            return Vec::new();
        };
        instancing
            .matrices
            .iter()
            .enumerate()
            .filter_map(|(slot, matrix)| matrix.map(|m| (slot, m)))
            .collect()
    }

    fn with_slot<T>(&self, slot: usize, f: impl FnOnce(&mut Mat4) -> T) -> Result<T> {
        let mut inner = self.inner.lock();
        if inner.disposed {
            return Err(RenderError::Disposed(self.name.clone()));
        }
        let instancing = inner
            .instancing
            .as_mut()
            .ok_or_else(|| RenderError::NotInstanced(self.name.clone()))?;
        match instancing.matrices.get_mut(slot) {
            Some(Some(matrix)) => Ok(f(matrix)),
            _ => Err(RenderError::InvalidSlot {
                object: self.name.clone(),
                slot,
            }),
        }
    }

    pub fn instance_matrix(&self, slot: usize) -> Result<Mat4> {
        self.with_slot(slot, |matrix| *matrix)
    }

    pub fn set_instance_matrix(&self, slot: usize, value: Mat4) -> Result<()> {
        self.with_slot(slot, |matrix| *matrix = value)
    }

    pub fn instance_position(&self, slot: usize) -> Result<Vec3> {
        self.with_slot(slot, |matrix| decompose(matrix).2)
    }

    pub fn set_instance_position(&self, slot: usize, position: Vec3) -> Result<()> {
        self.with_slot(slot, |matrix| {
            *matrix = recompose(matrix, |_, rotation, scale| (position, rotation, scale))
        })
    }

    pub fn instance_rotation(&self, slot: usize) -> Result<Quat> {
        self.with_slot(slot, |matrix| decompose(matrix).1)
    }

    pub fn set_instance_rotation(&self, slot: usize, rotation: Quat) -> Result<()> {
        self.with_slot(slot, |matrix| {
            *matrix = recompose(matrix, |position, _, scale| (position, rotation, scale))
        })
    }

    pub fn instance_scale(&self, slot: usize) -> Result<Vec3> {
        self.with_slot(slot, |matrix| decompose(matrix).0)
    }

    pub fn set_instance_scale(&self, slot: usize, scale: Vec3) -> Result<()> {
        self.with_slot(slot, |matrix| {
            *matrix = recompose(matrix, |position, rotation, _| (position, rotation, scale))
        })
    }

    // Hierarchy

    pub fn add_child(&self, child: Arc<SceneObject>) {
        self.inner.lock().children.push(child);
    }

    /// Detach `child`. Returns whether it was attached.
    pub fn remove_child(&self, child: &Arc<SceneObject>) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.children.len();
        inner.children.retain(|c| !Arc::ptr_eq(c, child));
        inner.children.len() != before
    }

    /// Detach every child and return them.
    pub fn clear_children(&self) -> Vec<Arc<SceneObject>> {
        std::mem::take(&mut self.inner.lock().children)
    }

    pub fn children(&self) -> Vec<Arc<SceneObject>> {
        self.inner.lock().children.clone()
    }

    /// Advance texture animations of this object and its descendants.
    /// Returns how many materials changed.
    pub fn tick(&self) -> usize {
        let (changed, children) = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return 0;
            }
            let changed = inner.material.as_mut().map(Material::tick).unwrap_or(false);
            (changed as usize, inner.children.clone())
        };
        changed + children.iter().map(|child| child.tick()).sum::<usize>()
    }

    /// Release geometry, material and instance slots, then dispose every
    /// child.
    pub fn dispose(&self) {
        let children = {
            let mut inner = self.inner.lock();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.mesh = None;
            inner.material = None;
            inner.instancing = None;
            std::mem::take(&mut inner.children)
        };
        log::debug!("Disposed {}", self.name);
        for child in children {
            child.dispose();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }
}

fn decompose(matrix: &Mat4) -> (Vec3, Quat, Vec3) {
    let (scale, rotation, translation) = matrix.to_scale_rotation_translation();
    (scale, rotation, translation)
}

fn recompose(matrix: &Mat4, f: impl FnOnce(Vec3, Quat, Vec3) -> (Vec3, Quat, Vec3)) -> Mat4 {
    let (scale, rotation, position) = decompose(matrix);
    let (position, rotation, scale) = f(position, rotation, scale);
    Mat4::from_scale_rotation_translation(scale, rotation, position)
}

/// One instance slot of an instanced [`SceneObject`].
#[derive(Debug, Clone)]
pub struct InstanceRef {
    object: Arc<SceneObject>,
    slot: usize,
}

impl InstanceRef {
    pub fn new(object: Arc<SceneObject>, slot: usize) -> Self {
        Self { object, slot }
    }

    pub fn object(&self) -> &Arc<SceneObject> {
        &self.object
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn matrix(&self) -> Result<Mat4> {
        self.object.instance_matrix(self.slot)
    }

    pub fn set_matrix(&self, matrix: Mat4) -> Result<()> {
        self.object.set_instance_matrix(self.slot, matrix)
    }

    pub fn position(&self) -> Result<Vec3> {
        self.object.instance_position(self.slot)
    }

    pub fn set_position(&self, position: Vec3) -> Result<()> {
        self.object.set_instance_position(self.slot, position)
    }

    pub fn rotation(&self) -> Result<Quat> {
        self.object.instance_rotation(self.slot)
    }

    pub fn set_rotation(&self, rotation: Quat) -> Result<()> {
        self.object.set_instance_rotation(self.slot, rotation)
    }

    pub fn scale(&self) -> Result<Vec3> {
        self.object.instance_scale(self.slot)
    }

    pub fn set_scale(&self, scale: Vec3) -> Result<()> {
        self.object.set_instance_scale(self.slot, scale)
    }

    /// Give the slot back to the object.
    pub fn release(self) -> Result<()> {
        self.object.release_instance(self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instanced(capacity: Option<usize>) -> SceneObject {
        let object = SceneObject::new("minecraft:stone");
        object.enable_instancing(capacity).unwrap();
        object
    }

    #[test]
    fn test_slots_increase_monotonically() {
        let object = instanced(None);
        let slots: Vec<usize> = (0..5).map(|_| object.next_instance().unwrap()).collect();
        assert_eq!(slots, vec![0, 1, 2, 3, 4]);
        assert_eq!(object.instance_count(), 5);
        assert_eq!(object.instance_matrix(3).unwrap(), Mat4::IDENTITY);
    }

    #[test]
    fn test_released_slot_is_reused() {
        let object = instanced(None);
        let a = object.next_instance().unwrap();
        let b = object.next_instance().unwrap();
        object.set_instance_position(b, Vec3::new(1.0, 2.0, 3.0)).unwrap();

        object.release_instance(b).unwrap();
        assert!(matches!(object.instance_matrix(b), Err(RenderError::InvalidSlot { .. })));
        assert!(matches!(object.release_instance(b), Err(RenderError::InvalidSlot { .. })));

        let c = object.next_instance().unwrap();
        assert_eq!(c, b);
        assert_eq!(object.instance_matrix(c).unwrap(), Mat4::IDENTITY);
        assert_eq!(object.next_instance().unwrap(), 2);
        assert_ne!(a, c);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let object = instanced(Some(2));
        object.next_instance().unwrap();
        object.next_instance().unwrap();

        let err = object.next_instance().unwrap_err();
        assert!(matches!(err, RenderError::InstanceCapacity { capacity: 2, .. }));
        assert!(err.is_invariant_violation());

        object.release_instance(0).unwrap();
        assert_eq!(object.next_instance().unwrap(), 0);
    }

    #[test]
    fn test_instance_ops_require_instancing() {
        let object = SceneObject::new("minecraft:stone");
        assert!(matches!(object.next_instance(), Err(RenderError::NotInstanced(_))));
        assert!(matches!(
            object.set_instance_position(0, Vec3::ONE),
            Err(RenderError::NotInstanced(_))
        ));

        object.set_position(Vec3::new(0.0, 1.0, 0.0));
        assert!((object.position() - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_instance_transforms_are_independent() {
        let object = Arc::new(instanced(None));
        let first = InstanceRef::new(object.clone(), object.next_instance().unwrap());
        let second = InstanceRef::new(object.clone(), object.next_instance().unwrap());

        first.set_position(Vec3::new(4.0, 0.0, 0.0)).unwrap();
        first.set_scale(Vec3::splat(2.0)).unwrap();
        second.set_rotation(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2)).unwrap();

        assert!((first.position().unwrap() - Vec3::new(4.0, 0.0, 0.0)).length() < 1e-5);
        assert!((first.scale().unwrap() - Vec3::splat(2.0)).length() < 1e-5);
        assert!((second.position().unwrap()).length() < 1e-6);
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        assert!(second.rotation().unwrap().dot(expected).abs() > 0.9999);
        assert_eq!(object.matrix(), Mat4::IDENTITY);

        second.release().unwrap();
        assert_eq!(object.instance_count(), 1);
    }

    #[test]
    fn test_dispose_is_recursive() {
        let root = SceneObject::new("root");
        let child = Arc::new(SceneObject::placeholder("child"));
        root.add_child(child.clone());
        root.enable_instancing(None).unwrap();

        root.dispose();
        assert!(root.is_disposed());
        assert!(child.is_disposed());
        assert!(child.mesh().is_none());
        assert!(root.children().is_empty());
        assert!(matches!(root.next_instance(), Err(RenderError::Disposed(_))));
    }

    #[test]
    fn test_remove_child() {
        let root = SceneObject::new("root");
        let a = Arc::new(SceneObject::new("a"));
        let b = Arc::new(SceneObject::new("b"));
        root.add_child(a.clone());
        root.add_child(b.clone());

        assert!(root.remove_child(&a));
        assert!(!root.remove_child(&a));
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.clear_children().len(), 1);
    }

    #[test]
    fn test_placeholder_is_a_missing_cube() {
        let object = SceneObject::placeholder("minecraft:unknown");
        assert!(object.is_placeholder());
        assert_eq!(object.mesh().unwrap().triangle_count(), 12);
    }
}
