//! Visualization for kinfu-rs
//!
//! Real-time display of fusion output using wgpu and winit:
//! - the engine's shaded rendering, shown as an image
//! - the model's surface points under an orbit camera
//! - keyboard input forwarded to the caller

pub mod camera;
pub mod gpu;
pub mod image_renderer;
pub mod input;
pub mod point_renderer;
pub mod viewer;

pub use camera::*;
pub use gpu::{GpuContext, WindowSurface};
pub use image_renderer::ImageRenderer;
pub use input::{key_char, MouseState};
pub use point_renderer::{cloud_to_vertices, PointCloudRenderer, PointVertex, RenderConfig};
pub use viewer::{FusionViewer, ViewerConfig};
