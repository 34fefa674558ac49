//! Two-window viewer polled from the caller's loop
//!
//! One window shows the fused model as rendered by the engine, the other the
//! model's surface points under an orbit camera. Nothing runs on its own:
//! the owner calls [`FusionViewer::spin_once`] once per loop iteration.

use crate::camera::Camera;
use crate::gpu::{GpuContext, WindowSurface};
use crate::image_renderer::ImageRenderer;
use crate::input::{key_char, MouseState};
use crate::point_renderer::{cloud_to_vertices, PointCloudRenderer, RenderConfig};
use kinfu_core::{Drawable, Error, Point3f, PointCloud, RenderImage, Result};
use std::sync::Arc;
use std::time::Duration;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{EventLoop, EventLoopWindowTarget};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{WindowBuilder, WindowId};

/// Window layout of a [`FusionViewer`]
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub title: String,
    /// Initial inner size of both windows (logical pixels)
    pub window_size: (u32, u32),
    pub render: RenderConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "kinfu".to_string(),
            window_size: (640, 480),
            render: RenderConfig::default(),
        }
    }
}

/// State touched by window events
struct ViewerState {
    ctx: GpuContext,
    image_window: WindowSurface,
    cloud_window: WindowSurface,
    image_renderer: ImageRenderer,
    point_renderer: PointCloudRenderer,
    camera: Camera,
    mouse: MouseState,
    keys: Vec<char>,
    stopped: bool,
}

/// Display for a running fusion session
pub struct FusionViewer {
    event_loop: EventLoop<()>,
    state: ViewerState,
    /// Aim the camera at the next non-empty cloud
    reframe: bool,
}

impl FusionViewer {
    pub fn new(config: ViewerConfig) -> Result<Self> {
        let event_loop =
            EventLoop::new().map_err(|e| Error::Visualization(format!("Failed to create event loop: {}", e)))?;

        let (width, height) = config.window_size;
        let build_window = |title: String| {
            WindowBuilder::new()
                .with_title(title)
                .with_inner_size(LogicalSize::new(width, height))
                .build(&event_loop)
                .map(Arc::new)
                .map_err(|e| Error::Visualization(format!("Failed to create window: {}", e)))
        };
        let image_window = build_window(format!("{}: render", config.title))?;
        let cloud_window = build_window(format!("{}: points", config.title))?;

        let instance = GpuContext::create_instance();
        let image_surface = WindowSurface::create_surface(&instance, &image_window)?;
        let cloud_surface = WindowSurface::create_surface(&instance, &cloud_window)?;
        let ctx = pollster::block_on(GpuContext::from_instance(instance, Some(&image_surface)))?;

        let image_window = WindowSurface::configure(&ctx, image_window, image_surface)?;
        let cloud_window = WindowSurface::configure(&ctx, cloud_window, cloud_surface)?;

        let image_renderer = ImageRenderer::new(&ctx, image_window.format());
        let (cloud_width, cloud_height) = cloud_window.size();
        let point_renderer =
            PointCloudRenderer::new(&ctx, cloud_window.format(), cloud_width, cloud_height, config.render);

        let mut camera = Camera::default();
        camera.aspect_ratio = cloud_width as f32 / cloud_height as f32;

        log::info!("viewer: windows open, drag to orbit, right drag to pan, wheel to zoom");

        Ok(Self {
            event_loop,
            state: ViewerState {
                ctx,
                image_window,
                cloud_window,
                image_renderer,
                point_renderer,
                camera,
                mouse: MouseState::default(),
                keys: Vec::new(),
                stopped: false,
            },
            reframe: true,
        })
    }

    /// Replace the image in the render window
    pub fn show_image(&mut self, image: &RenderImage) {
        self.state.image_renderer.upload(&self.state.ctx, image);
    }

    /// Replace the points in the cloud window
    pub fn show_cloud(&mut self, cloud: &PointCloud<Point3f>) {
        let state = &mut self.state;
        if self.reframe && !cloud.is_empty() {
            let (min, max) = cloud.bounding_box();
            state.camera.frame_bounds(&min, &max);
            self.reframe = false;
        }

        let color = state.point_renderer.config().point_color;
        state.point_renderer.set_vertices(&state.ctx, &cloud_to_vertices(cloud, color));
    }

    /// Aim the camera at the next cloud shown, e.g. after the model was reset
    pub fn reset_view(&mut self) {
        self.reframe = true;
    }

    pub fn camera(&self) -> &Camera {
        &self.state.camera
    }

    /// Process pending window events without blocking and redraw both windows.
    ///
    /// Returns the characters typed since the last call.
    pub fn spin_once(&mut self) -> Result<Vec<char>> {
        if self.state.stopped {
            return Ok(Vec::new());
        }

        let state = &mut self.state;
        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, target| state.handle_event(event, target));
        if let PumpStatus::Exit(code) = status {
            log::debug!("viewer: event loop exited with {}", code);
            self.state.stopped = true;
        }

        if !self.state.stopped {
            self.state.draw()?;
        }
        Ok(std::mem::take(&mut self.state.keys))
    }

    /// Whether the user closed a window
    pub fn was_stopped(&self) -> bool {
        self.state.stopped
    }
}

impl ViewerState {
    fn handle_event(&mut self, event: Event<()>, target: &EventLoopWindowTarget<()>) {
        let Event::WindowEvent { window_id, event } = event else {
            return;
        };

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                log::info!("viewer: window closed");
                self.stopped = true;
                target.exit();
            }
            WindowEvent::Resized(size) => self.resize(window_id, size.width, size.height),
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed && !event.repeat => {
                if let Some(c) = key_char(&event.logical_key) {
                    self.keys.push(c);
                }
            }
            WindowEvent::MouseInput { state, button, .. } if window_id == self.cloud_window.window.id() => {
                self.mouse.button(button, state);
            }
            WindowEvent::CursorMoved { position, .. } if window_id == self.cloud_window.window.id() => {
                self.mouse.moved(position.x, position.y, &mut self.camera);
            }
            WindowEvent::CursorLeft { .. } => self.mouse.left_window(),
            WindowEvent::MouseWheel { delta, .. } if window_id == self.cloud_window.window.id() => {
                self.mouse.scrolled(delta, &mut self.camera);
            }
            _ => {}
        }
    }

    fn resize(&mut self, window_id: WindowId, width: u32, height: u32) {
        if window_id == self.image_window.window.id() {
            self.image_window.resize(&self.ctx, width, height);
        } else if window_id == self.cloud_window.window.id() && self.cloud_window.resize(&self.ctx, width, height) {
            self.point_renderer.resize(&self.ctx, width, height);
            self.camera.aspect_ratio = width as f32 / height as f32;
        }
    }

    fn draw(&mut self) -> Result<()> {
        if let Some(frame) = self.image_window.acquire(&self.ctx)? {
            let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.image_renderer.render(&self.ctx, &view);
            frame.present();
        }

        if let Some(frame) = self.cloud_window.acquire(&self.ctx)? {
            let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.point_renderer.update_camera(&self.ctx, &self.camera);
            self.point_renderer.render(&self.ctx, &view);
            frame.present();
        }
        Ok(())
    }
}
