//! Scene objects built from resolved models.
//!
//! Geometry, materials and transforms are kept engine-neutral: a rendering
//! engine reads meshes, PNG material images and (instance) matrices from the
//! objects here and mirrors them into its own scene graph.

mod block;
mod geometry;
mod graph;
mod manager;
mod material;
mod object;

pub use block::BlockObject;
pub use geometry::{Mesh, Vertex};
pub use graph::Scene;
pub use manager::InstanceManager;
pub use material::Material;
pub use object::{InstanceRef, SceneObject};
