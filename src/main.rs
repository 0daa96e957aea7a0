//! Magic Drum - Main Entry Point
//!
//! Opens two windows (the composited camera feed and the segmentation mask)
//! and drives the capture-process-render loop from the main window's redraw
//! cycle.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use magic_drum::config::{KitConfig, DEFAULT_CONFIG_PATH};
use magic_drum::App;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{WindowAttributes, WindowId};

const MAIN_WINDOW_TITLE: &str = "Magic Drum";
const MASK_WINDOW_TITLE: &str = "Mask";
const DEFAULT_WIDTH: u32 = 960;
const DEFAULT_HEIGHT: u32 = 720;
const TARGET_FPS: u32 = 30;

/// Application state machine
enum AppState {
    /// Initial state before windows are created
    Uninitialized,
    /// Windows and graphics context are ready
    Running { app: App },
}

struct MagicDrumApp {
    state: AppState,
    next_redraw_at: Instant,
}

impl MagicDrumApp {
    fn new() -> Self {
        Self {
            state: AppState::Uninitialized,
            next_redraw_at: Instant::now(),
        }
    }
}

impl ApplicationHandler for MagicDrumApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let AppState::Uninitialized = &self.state {
            let config = match KitConfig::load_or_default(Path::new(DEFAULT_CONFIG_PATH)) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("Failed to load kit config: {}", e);
                    event_loop.exit();
                    return;
                }
            };

            let main_window = match event_loop.create_window(
                WindowAttributes::default()
                    .with_title(MAIN_WINDOW_TITLE)
                    .with_inner_size(LogicalSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)),
            ) {
                Ok(w) => Arc::new(w),
                Err(e) => {
                    log::error!("Failed to create window: {}", e);
                    event_loop.exit();
                    return;
                }
            };

            let mask_window = match event_loop.create_window(
                WindowAttributes::default()
                    .with_title(MASK_WINDOW_TITLE)
                    .with_inner_size(LogicalSize::new(640, 480)),
            ) {
                Ok(w) => Arc::new(w),
                Err(e) => {
                    log::error!("Failed to create mask window: {}", e);
                    event_loop.exit();
                    return;
                }
            };

            match pollster::block_on(App::new(main_window, mask_window, config)) {
                Ok(app) => {
                    log::info!("Magic Drum ready! Press Q or Escape to quit");
                    self.state = AppState::Running { app };
                }
                Err(e) => {
                    log::error!("Startup failed: {:#}", e);
                    event_loop.exit();
                }
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let AppState::Running { app } = &mut self.state else {
            return;
        };

        let egui_consumed = if window_id == app.main_window_id() {
            app.handle_window_event(&event)
        } else {
            false
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } if !egui_consumed => match key_code {
                KeyCode::KeyQ | KeyCode::Escape => {
                    log::info!("Quit key pressed, exiting...");
                    event_loop.exit();
                }
                KeyCode::F11 if window_id == app.main_window_id() => {
                    let window = app.main_window();
                    if window.fullscreen().is_some() {
                        window.set_fullscreen(None);
                    } else {
                        window.set_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
                    }
                }
                _ => {}
            },

            WindowEvent::Resized(physical_size) => {
                if window_id == app.main_window_id() {
                    app.resize_main(physical_size);
                } else if window_id == app.mask_window_id() {
                    app.resize_mask(physical_size);
                }
            }

            WindowEvent::RedrawRequested if window_id == app.main_window_id() => {
                // One full pipeline iteration per redraw. A capture failure
                // ends the run, matching the "stop on read failure" policy.
                if let Err(e) = app.step() {
                    log::error!("Unable to read video: {}", e);
                    event_loop.exit();
                    return;
                }

                match app.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        log::warn!("Surface lost, reconfiguring...");
                        app.reconfigure_surfaces();
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory!");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {:?}", e);
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Running { app } = &mut self.state else {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        };

        // Drive redraws at the target rate; the blocking capture read sets
        // the real pace when the camera is slower.
        let frame_duration = Duration::from_nanos(1_000_000_000u64 / TARGET_FPS as u64);
        let now = Instant::now();

        if now >= self.next_redraw_at {
            app.main_window().request_redraw();
            self.next_redraw_at += frame_duration;

            // Reset if too far behind
            if now > self.next_redraw_at + frame_duration * 2 {
                self.next_redraw_at = now + frame_duration;
            }
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_redraw_at));
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Magic Drum v{}", env!("CARGO_PKG_VERSION"));

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = MagicDrumApp::new();
    event_loop.run_app(&mut app).expect("Event loop error");
}
