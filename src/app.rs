use std::sync::Arc;

use anyhow::Context;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

use crate::config::Config;
use crate::render::frame::{FrameDriver, FrameEvent, LoopState, SceneParams};
use crate::render::session::{Assets, RenderSession};

struct Running {
    window: Arc<Window>,
    session: RenderSession,
    driver: FrameDriver,
}

/// Window lifecycle around a [`RenderSession`].
///
/// Assets are validated before the event loop starts; the window, GPU
/// context and audio stream are created on the first `resumed`.
pub struct App {
    config: Config,
    assets: Option<Assets>,
    running: Option<Running>,
    error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: Config, assets: Assets) -> Self {
        Self {
            config,
            assets: Some(assets),
            running: None,
            error: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn take_error(&mut self) -> Option<anyhow::Error> {
        self.error.take()
    }

    fn start(&mut self, event_loop: &ActiveEventLoop, assets: Assets) -> anyhow::Result<Running> {
        let window_config = &self.config.window;
        let attributes = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height));
        let window = event_loop
            .create_window(attributes)
            .context("Failed to create window")?;
        let window = Arc::new(window);

        let mut session = RenderSession::new(Arc::clone(&window), assets, window_config.vsync)?;
        let mut driver = FrameDriver::new(
            SceneParams::from_config(&self.config),
            self.config.audio.smoothing,
            session.gpu.aspect_ratio(),
        );
        driver.install(&mut session);
        window.request_redraw();

        Ok(Running {
            window,
            session,
            driver,
        })
    }
}

fn frame_event(event: &WindowEvent) -> Option<FrameEvent> {
    match event {
        WindowEvent::CloseRequested => Some(FrameEvent::CloseRequested),
        WindowEvent::KeyboardInput { event, .. }
            if event.state == ElementState::Pressed
                && event.logical_key == Key::Named(NamedKey::Escape) =>
        {
            Some(FrameEvent::EscapePressed)
        }
        WindowEvent::Resized(size) => Some(FrameEvent::Resized {
            width: size.width,
            height: size.height,
        }),
        _ => None,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(assets) = self.assets.take() else {
            return;
        };
        match self.start(event_loop, assets) {
            Ok(running) => self.running = Some(running),
            Err(err) => {
                self.error = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        if running.window.id() != id {
            return;
        }

        let state = if let WindowEvent::RedrawRequested = event {
            running.driver.render_frame(&mut running.session)
        } else if let Some(frame_event) = frame_event(&event) {
            running.driver.handle_event(&mut running.session, frame_event)
        } else {
            running.driver.state()
        };

        if state == LoopState::Terminating {
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.take() {
            log::debug!("Event loop exiting");
            running.session.shutdown();
        }
    }
}
