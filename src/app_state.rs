use std::sync::Arc;
use winit::window::Window;
use instant::Instant;
use rand::SeedableRng;
use rand::rngs::StdRng;
use wgpu::util::DeviceExt;


use crate::clock::{FrameTrigger, RedrawClock};
use crate::color;
use crate::field::{FieldAnimator, FieldConfig, ParticleField};
use crate::models::{Vertex2D, CircleInstance, LineVertex};
use crate::projection::{ScreenProjection, ViewUniform};
use crate::resize::ResizeHub;
use crate::surface::{Bounds, FrameBatch, Layer};


const VIEW_WGSL: &str = include_str!("./shaders/view.wgsl");
const FADE_WGSL: &str = include_str!("./shaders/fade.wgsl");
const LINES_WGSL: &str = include_str!("./shaders/lines.wgsl");
const CIRCLES_WGSL: &str = include_str!("./shaders/circles.wgsl");
const PRESENT_WGSL: &str = include_str!("./shaders/present.wgsl");

// Initial vertex buffer capacities; both grow on demand.
const INITIAL_CIRCLE_CAPACITY: usize = 128;
const INITIAL_LINE_VERTEX_CAPACITY: usize = 4096;

/// Persistent texture the frames accumulate on, so the fade leaves trails.
struct TrailTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    needs_clear: bool,
}

pub struct State {
    window: Arc<Window>,
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub is_surface_configured: bool,
    needs_srgb_output_conversion: bool,

    pub projection: ScreenProjection,
    view_buffer: wgpu::Buffer,
    view_bind_group: wgpu::BindGroup,

    fade_pipeline: wgpu::RenderPipeline,
    line_render_pipeline: wgpu::RenderPipeline,
    circle_render_pipeline: wgpu::RenderPipeline,
    present_pipeline: wgpu::RenderPipeline,

    trail_bind_group_layout: wgpu::BindGroupLayout,
    trail: TrailTarget,

    circle_instance_buffer: wgpu::Buffer,
    quad_vertex_buffer: wgpu::Buffer,
    quad_index_buffer: wgpu::Buffer,
    line_vertex_buffer: wgpu::Buffer,

    batch: FrameBatch,
    pub field_config: FieldConfig,
    animator: Option<FieldAnimator<RedrawClock>>,
    frame_trigger: Option<FrameTrigger>,
    resize_hub: ResizeHub,
    // Cleared by an explicit teardown so a later resize does not restart the field.
    autostart: bool,

    pub last_frame_instant: instant::Instant,
    pub frame_count_in_second: u32,
    pub current_fps: u32,
}

impl State {
    pub async fn new(window: Arc<Window>, field_config: FieldConfig) -> anyhow::Result<State> {
        let size = window.inner_size();

        let gpu = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::BROWSER_WEBGPU,
            ..Default::default()
        });

        // Surface itself is !Send on WASM due to HtmlCanvasElement
        let surface = gpu
            .create_surface(window.clone())
            .map_err(|e| anyhow::anyhow!("Failed to create GPU surface: {e}"))?;

        let adapter = gpu
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| anyhow::anyhow!("No compatible GPU adapter found: {e}"))?;
        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create GPU device: {e}"))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let texture_format = surface_caps.formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("Surface reports no supported formats"))?;

        let needs_srgb_output_conversion = !texture_format.is_srgb();

        log::info!(
            "Using {} ({:?}, Target Format: {:?}), Needs Shader sRGB Output Conversion: {}",
            adapter_info.name,
            adapter_info.backend,
            texture_format,
            needs_srgb_output_conversion
        );

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: texture_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        let projection = ScreenProjection::new(config.width, config.height);
        let view_uniform = projection.uniform([0.0; 4], needs_srgb_output_conversion);

        let view_buffer = device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("View Buffer"),
                contents: bytemuck::cast_slice(&[view_uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            }
        );

        let view_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }
            ],
            label: Some("View Bind Group Layout"),
        });

        let view_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &view_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: view_buffer.as_entire_binding(),
                }
            ],
            label: Some("View Bind Group"),
        });

        let trail_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                }
            ],
            label: Some("Trail Bind Group Layout"),
        });

        // --- Shader modules ---
        let shader = |label: &str, body: &str, with_view: bool| {
            let source = if with_view { format!("{VIEW_WGSL}\n{body}") } else { body.to_owned() };
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        };
        let fade_shader_module = shader("Fade Shader", FADE_WGSL, true);
        let lines_shader_module = shader("Lines Shader", LINES_WGSL, true);
        let circles_shader_module = shader("Circles Shader", CIRCLES_WGSL, true);
        let present_shader_module = shader("Present Shader", PRESENT_WGSL, false);

        // --- Pipeline layouts ---
        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[
                &view_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let present_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Present Pipeline Layout"),
            bind_group_layouts: &[
                &trail_bind_group_layout,
            ],
            push_constant_ranges: &[],
        });

        let fade_pipeline = create_pipeline(
            &device,
            "Fade Render Pipeline",
            &render_pipeline_layout,
            &fade_shader_module,
            &[],
            texture_format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        );

        let line_render_pipeline = create_pipeline(
            &device,
            "Line Render Pipeline",
            &render_pipeline_layout,
            &lines_shader_module,
            &[LineVertex::layout()],
            texture_format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        );

        let circle_render_pipeline = create_pipeline(
            &device,
            "Circle Render Pipeline",
            &render_pipeline_layout,
            &circles_shader_module,
            &[Vertex2D::layout(), CircleInstance::layout()],
            texture_format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        );

        let present_pipeline = create_pipeline(
            &device,
            "Present Render Pipeline",
            &present_pipeline_layout,
            &present_shader_module,
            &[],
            texture_format,
            None,
        );

        let trail = create_trail_target(&device, &trail_bind_group_layout, &config);

        let circle_instance_buffer = create_vertex_buffer(
            &device,
            "Circle Instance Buffer",
            (INITIAL_CIRCLE_CAPACITY * std::mem::size_of::<CircleInstance>()) as u64,
        );

        let quad_vertex_buffer = device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("Quad Vertex Buffer"),
                contents: bytemuck::cast_slice(Vertex2D::QUAD_VERTICES.as_slice()),
                usage: wgpu::BufferUsages::VERTEX,
            }
        );

        let quad_index_buffer = device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("Quad Index Buffer"),
                contents: bytemuck::cast_slice(Vertex2D::QUAD_INDICES.as_slice()),
                usage: wgpu::BufferUsages::INDEX,
            }
        );

        let line_vertex_buffer = create_vertex_buffer(
            &device,
            "Line Vertex Buffer",
            (INITIAL_LINE_VERTEX_CAPACITY * std::mem::size_of::<LineVertex>()) as u64,
        );

        Ok( Self {
            window,
            surface, device, queue, config, is_surface_configured: false, needs_srgb_output_conversion,
            projection, view_buffer, view_bind_group,
            fade_pipeline, line_render_pipeline, circle_render_pipeline, present_pipeline,
            trail_bind_group_layout, trail,
            circle_instance_buffer, quad_vertex_buffer, quad_index_buffer, line_vertex_buffer,
            batch: FrameBatch::default(),
            field_config,
            animator: None,
            frame_trigger: None,
            resize_hub: ResizeHub::new(),
            autostart: true,
            last_frame_instant: Instant::now(), frame_count_in_second: 0, current_fps: 0,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            log::info!("Resize {}, {}", width, height);
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.trail = create_trail_target(&self.device, &self.trail_bind_group_layout, &self.config);

            self.projection.resize(width, height);
            let bounds = self.bounds();
            self.batch.set_bounds(bounds);
            self.is_surface_configured = true;

            if self.animator.is_none() && self.autostart {
                self.start_field();
            } else {
                self.resize_hub.publish(bounds);
            }
            // No request_redraw here, it's App's responsibility
        }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.config.width as f32, self.config.height as f32)
    }

    /// Replaces any running field with a fresh one built from `field_config`.
    pub fn start_field(&mut self) {
        self.stop_field();
        self.autostart = true;
        if !self.is_surface_configured {
            log::debug!("Surface not configured yet, field starts on first resize");
            return;
        }

        let mut rng = match self.field_config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let field = ParticleField::initialize(self.field_config.clone(), self.bounds(), &mut rng);
        let (clock, trigger) = RedrawClock::new(self.window.clone());
        self.animator = Some(FieldAnimator::new(field, clock, self.resize_hub.subscribe()));
        self.frame_trigger = Some(trigger);
        self.trail.needs_clear = true;
    }

    /// Tears the running field down. The last frame stays on screen.
    pub fn stop_field(&mut self) {
        if let Some(mut animator) = self.animator.take() {
            animator.teardown();
        }
        self.frame_trigger = None;
        self.autostart = false;
    }

    pub fn is_field_running(&self) -> bool {
        self.animator.as_ref().is_some_and(FieldAnimator::is_running)
    }

    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        if !self.is_surface_configured {
            return Ok(());
        }

        // --- FPS Calculation ---
        self.frame_count_in_second += 1;
        let now = Instant::now();
        let elapsed = (now - self.last_frame_instant).as_secs_f32();

        if elapsed >= 1.0 {
            self.current_fps = self.frame_count_in_second;
            self.frame_count_in_second = 0;
            self.last_frame_instant = now;
        }
        // --- End FPS Calculation ---

        // Only a redraw the animator asked for advances the field; any other
        // redraw just shows the trail again.
        let fired = match (self.animator.as_mut(), self.frame_trigger.as_ref()) {
            (Some(animator), Some(trigger)) => match trigger.take() {
                Some(handle) => {
                    self.batch.clear();
                    animator.fire(handle, &mut self.batch)
                }
                None => false,
            },
            _ => false,
        };

        if fired {
            self.upload_batch();
        }
        let draw_trail = fired || self.trail.needs_clear;
        if draw_trail {
            let fade = self.batch.fade.map(color::to_linear_array).unwrap_or([0.0; 4]);
            let uniform: ViewUniform = self.projection.uniform(fade, self.needs_srgb_output_conversion);
            self.queue.write_buffer(&self.view_buffer, 0, bytemuck::cast_slice(&[uniform]));
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        if draw_trail {
            let load = if self.trail.needs_clear {
                wgpu::LoadOp::Clear(color::to_wgpu_color(self.field_config.background()))
            } else {
                wgpu::LoadOp::Load
            };
            self.trail.needs_clear = false;

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Trail Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.trail.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if fired {
                render_pass.set_bind_group(0, &self.view_bind_group, &[]);

                for layer in self.batch.layers() {
                    match layer {
                        Layer::Fade => {
                            render_pass.set_pipeline(&self.fade_pipeline);
                            render_pass.draw(0..3, 0..1);
                        }
                        Layer::Circles => {
                            render_pass.set_pipeline(&self.circle_render_pipeline);
                            render_pass.set_vertex_buffer(0, self.quad_vertex_buffer.slice(..));
                            render_pass.set_vertex_buffer(1, self.circle_instance_buffer.slice(..));
                            render_pass.set_index_buffer(self.quad_index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                            render_pass.draw_indexed(
                                0..Vertex2D::QUAD_INDICES.len() as u32,
                                0,
                                0..self.batch.circles.len() as u32,
                            );
                        }
                        Layer::Lines => {
                            render_pass.set_pipeline(&self.line_render_pipeline);
                            render_pass.set_vertex_buffer(0, self.line_vertex_buffer.slice(..));
                            render_pass.draw(0..self.batch.line_vertices.len() as u32, 0..1);
                        }
                    }
                }
            }
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.present_pipeline);
            render_pass.set_bind_group(0, &self.trail.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn upload_batch(&mut self) {
        write_growing_buffer(
            &self.device,
            &self.queue,
            &mut self.circle_instance_buffer,
            bytemuck::cast_slice(&self.batch.circles),
            "Circle Instance Buffer (Resized)",
        );
        write_growing_buffer(
            &self.device,
            &self.queue,
            &mut self.line_vertex_buffer,
            bytemuck::cast_slice(&self.batch.line_vertices),
            "Line Vertex Buffer (Resized)",
        );
    }
}

impl Drop for State {
    fn drop(&mut self) {
        self.stop_field();
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    buffers: &[wgpu::VertexBufferLayout],
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

fn create_trail_target(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    config: &wgpu::SurfaceConfiguration,
) -> TrailTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Trail Texture"),
        size: wgpu::Extent3d {
            width: config.width.max(1),
            height: config.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            }
        ],
        label: Some("Trail Bind Group"),
    });
    TrailTarget { _texture: texture, view, bind_group, needs_clear: true }
}

fn create_vertex_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn write_growing_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    buffer: &mut wgpu::Buffer,
    data: &[u8],
    label: &str,
) {
    if data.is_empty() {
        return;
    }
    if buffer.size() < data.len() as u64 {
        let size = (data.len() as u64).next_power_of_two();
        log::debug!("Growing {} to {} bytes", label, size);
        *buffer = create_vertex_buffer(device, label, size);
    }
    queue.write_buffer(buffer, 0, data);
}
