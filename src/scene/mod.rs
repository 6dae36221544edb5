//! 3D scene: camera, orbit controls, lighting, frame clock, and the CPU
//! renderer that turns the posed avatar into an egui mesh.

pub mod camera;
pub mod light;
pub mod renderer;

pub use camera::{OrbitControls, PerspectiveCamera};
pub use light::{Clock, DirectionalLight};
pub use renderer::{RenderStats, SceneRenderer};
