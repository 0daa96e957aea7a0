//! Application state: graphics context, pipeline collaborators and the
//! per-frame step.
//!
//! Owns the wgpu device plus one surface per window (composited feed and
//! segmentation mask), the camera, the drum kit, the audio engine and the
//! pad overlays. The per-frame step runs the whole pipeline: capture,
//! segment, extract blobs, detect hits, compose, upload.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::audio::AudioEngine;
use crate::camera::{CaptureError, FrameSource};
use crate::config::KitConfig;
use crate::kit::{DrumKind, DrumKit};
use crate::render::{self, PadOverlay};
use crate::vision::{blob, morph, segment, BLUE_RANGE, GREEN_RANGE};

/// A window with its own surface and configuration.
struct ViewSurface {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl ViewSurface {
    fn new(
        instance: &wgpu::Instance,
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        window: Arc<Window>,
    ) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;

        let caps = surface.get_capabilities(adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(device, &config);

        Ok(Self {
            window,
            surface,
            config,
        })
    }

    fn resize(&mut self, device: &wgpu::Device, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(device, &self.config);
        }
    }

    fn reconfigure(&self, device: &wgpu::Device) {
        self.surface.configure(device, &self.config);
    }
}

/// A CPU-fed texture, lazily (re)created to match the incoming image size.
struct StreamTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

impl StreamTexture {
    fn upload(
        slot: &mut Option<StreamTexture>,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        label: &str,
        data: &[u8],
        width: u32,
        height: u32,
    ) {
        let needs_new = match slot {
            None => true,
            Some(t) => t.width != width || t.height != height,
        };

        if needs_new {
            log::info!("Creating {} texture: {}x{}", label, width, height);
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            });
            *slot = Some(StreamTexture {
                texture,
                bind_group,
                width,
                height,
            });
        }

        if let Some(t) = slot {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &t.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }
}

/// Main application state.
pub struct App {
    device: wgpu::Device,
    queue: wgpu::Queue,

    main_view: ViewSurface,
    mask_view: ViewSurface,

    passthrough_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    main_pipeline: wgpu::RenderPipeline,
    mask_pipeline: wgpu::RenderPipeline,

    frame_texture: Option<StreamTexture>,
    mask_texture: Option<StreamTexture>,
    frame_size: Option<(u32, u32)>,

    // egui overlay on the main window (pad labels)
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    // Pipeline collaborators
    camera: FrameSource,
    kit: DrumKit,
    audio: AudioEngine,
    overlays: HashMap<DrumKind, PadOverlay>,

    started: Instant,

    // Frame timing
    fps: f64,
    last_fps_update: Instant,
    frames_since_update: u64,
}

impl App {
    /// Create the app: validate config, load assets, open camera and audio,
    /// then set up the graphics context for both windows.
    pub async fn new(
        main_window: Arc<Window>,
        mask_window: Arc<Window>,
        config: KitConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let mut overlays = HashMap::new();
        for pad in &config.pads {
            let overlay = PadOverlay::load(&pad.image, pad.rect)?;
            overlays.insert(pad.kind, overlay);
        }

        let audio = AudioEngine::new(&config)?;
        let camera = FrameSource::open(0)?;
        let kit = DrumKit::from_config(&config);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // The adapter only needs to be compatible with one surface; both
        // windows live on the same display stack.
        let probe_surface = instance
            .create_surface(main_window.clone())
            .context("failed to create surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&probe_surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        drop(probe_surface);

        log::info!("Using GPU: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Magic Drum Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .context("failed to create device")?;

        let main_view = ViewSurface::new(&instance, &adapter, &device, main_window)?;
        let mask_view = ViewSurface::new(&instance, &adapter, &device, mask_window)?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Passthrough Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/passthrough.wgsl").into()),
        });

        let passthrough_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Passthrough Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let main_pipeline = Self::create_passthrough_pipeline(
            &device,
            &passthrough_layout,
            &shader,
            main_view.config.format,
        );
        let mask_pipeline = Self::create_passthrough_pipeline(
            &device,
            &passthrough_layout,
            &shader,
            mask_view.config.format,
        );

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &main_view.window,
            Some(main_view.window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer =
            egui_wgpu::Renderer::new(&device, main_view.config.format, None, 1, false);

        let now = Instant::now();

        Ok(Self {
            device,
            queue,
            main_view,
            mask_view,
            passthrough_layout,
            sampler,
            main_pipeline,
            mask_pipeline,
            frame_texture: None,
            mask_texture: None,
            frame_size: None,
            egui_ctx,
            egui_state,
            egui_renderer,
            camera,
            kit,
            audio,
            overlays,
            started: now,
            fps: 0.0,
            last_fps_update: now,
            frames_since_update: 0,
        })
    }

    fn create_passthrough_pipeline(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Passthrough Pipeline Layout"),
            bind_group_layouts: &[layout],
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Passthrough Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    pub fn main_window_id(&self) -> winit::window::WindowId {
        self.main_view.window.id()
    }

    pub fn mask_window_id(&self) -> winit::window::WindowId {
        self.mask_view.window.id()
    }

    pub fn main_window(&self) -> &Window {
        &self.main_view.window
    }

    pub fn resize_main(&mut self, new_size: PhysicalSize<u32>) {
        self.main_view.resize(&self.device, new_size);
    }

    pub fn resize_mask(&mut self, new_size: PhysicalSize<u32>) {
        self.mask_view.resize(&self.device, new_size);
    }

    pub fn reconfigure_surfaces(&self) {
        self.main_view.reconfigure(&self.device);
        self.mask_view.reconfigure(&self.device);
    }

    /// Handle a main-window event, returning true if egui consumed it.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        self.egui_state
            .on_window_event(&self.main_view.window, event)
            .consumed
    }

    /// Run one pipeline iteration: capture, segment, extract blobs, detect
    /// hits, compose, upload. A capture error is fatal to the loop.
    pub fn step(&mut self) -> Result<(), CaptureError> {
        let mut frame = self.camera.read_frame()?;
        frame.flip_horizontal();

        let raw_mask = segment::segment(&frame, &[BLUE_RANGE, GREEN_RANGE]);
        let mask = morph::open(&raw_mask);
        let blobs = blob::extract_blobs(&mask);

        let now = self.started.elapsed().as_secs_f64();
        for kind in self.kit.handle_blobs(&blobs, now) {
            if let Err(e) = self.audio.play(kind) {
                log::warn!("Playback failed for {:?}: {}", kind, e);
            }
        }

        let composited = render::compose(&frame, self.kit.pads(), &self.overlays, &blobs);
        StreamTexture::upload(
            &mut self.frame_texture,
            &self.device,
            &self.queue,
            &self.passthrough_layout,
            &self.sampler,
            "frame",
            &composited,
            frame.width,
            frame.height,
        );

        let mask_rgba = render::mask_to_rgba(&mask);
        StreamTexture::upload(
            &mut self.mask_texture,
            &self.device,
            &self.queue,
            &self.passthrough_layout,
            &self.sampler,
            "mask",
            &mask_rgba,
            mask.width,
            mask.height,
        );

        self.frame_size = Some((frame.width, frame.height));
        Ok(())
    }

    /// Present both windows: composited feed plus labels, then the mask.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let main_output = self.main_view.surface.get_current_texture()?;
        let main_target = main_output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &main_target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(frame_tex) = &self.frame_texture {
                pass.set_pipeline(&self.main_pipeline);
                pass.set_bind_group(0, &frame_tex.bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }

        self.render_labels(&mut encoder, &main_target);

        let mask_result = self.render_mask(&mut encoder);

        self.queue.submit(std::iter::once(encoder.finish()));
        main_output.present();
        if let Some(mask_output) = mask_result {
            mask_output.present();
        }

        self.update_fps();
        Ok(())
    }

    /// Encode the mask window pass. A lost mask surface only skips this
    /// window for a frame; it is reconfigured on the next resize.
    fn render_mask(&self, encoder: &mut wgpu::CommandEncoder) -> Option<wgpu::SurfaceTexture> {
        let mask_output = match self.mask_view.surface.get_current_texture() {
            Ok(output) => output,
            Err(e) => {
                log::warn!("Mask surface unavailable: {:?}", e);
                self.mask_view.reconfigure(&self.device);
                return None;
            }
        };
        let mask_target = mask_output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Mask Present Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &mask_target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some(mask_tex) = &self.mask_texture {
            pass.set_pipeline(&self.mask_pipeline);
            pass.set_bind_group(0, &mask_tex.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        drop(pass);

        Some(mask_output)
    }

    /// egui pass on the main window: per-pad speed/beat labels.
    fn render_labels(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView) {
        let Some((frame_w, frame_h)) = self.frame_size else {
            return;
        };

        let raw_input = self.egui_state.take_egui_input(&self.main_view.window);
        let ppp = self.main_view.window.scale_factor() as f32;
        // Frame pixels -> egui points, for labels anchored to pad rects.
        let sx = self.main_view.config.width as f32 / ppp / frame_w as f32;
        let sy = self.main_view.config.height as f32 / ppp / frame_h as f32;

        let labels: Vec<(f32, f32, f32, String, String)> = self
            .kit
            .pads()
            .iter()
            .map(|pad| {
                let rect = pad.rect();
                (
                    rect.x as f32 * sx,
                    rect.y as f32 * sy,
                    (rect.y + rect.height) as f32 * sy,
                    format!("Speed: {:.2} Hz", pad.hit_speed()),
                    format!("Beats: {}", pad.hit_count()),
                )
            })
            .collect();
        let fps = self.fps;

        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            let painter = ctx.layer_painter(egui::LayerId::new(
                egui::Order::Foreground,
                egui::Id::new("pad_labels"),
            ));
            for (x, top, bottom, speed, beats) in &labels {
                painter.text(
                    egui::pos2(*x, top - 4.0),
                    egui::Align2::LEFT_BOTTOM,
                    speed,
                    egui::FontId::proportional(14.0),
                    egui::Color32::WHITE,
                );
                painter.text(
                    egui::pos2(*x, bottom + 4.0),
                    egui::Align2::LEFT_TOP,
                    beats,
                    egui::FontId::proportional(14.0),
                    egui::Color32::WHITE,
                );
            }
            painter.text(
                egui::pos2(8.0, 8.0),
                egui::Align2::LEFT_TOP,
                format!("{:.1} FPS  |  Q to quit", fps),
                egui::FontId::proportional(12.0),
                egui::Color32::from_gray(200),
            );
        });

        self.egui_state
            .handle_platform_output(&self.main_view.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.main_view.config.width, self.main_view.config.height],
            pixels_per_point: ppp,
        };

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let render_pass_static: &mut wgpu::RenderPass<'static> =
                unsafe { std::mem::transmute(&mut render_pass) };

            self.egui_renderer
                .render(render_pass_static, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }

    fn update_fps(&mut self) {
        self.frames_since_update += 1;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f64();
        if elapsed >= 1.0 {
            self.fps = self.frames_since_update as f64 / elapsed;
            self.frames_since_update = 0;
            self.last_fps_update = now;
        }
    }
}
