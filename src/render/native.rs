use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::Vec3;
use log::{debug, info};
use wgpu::util::DeviceExt;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::window::{Window, WindowId};

use crate::assets::{ColorSpace, TextureData};
use crate::error::RenderError;
use crate::material::Material;
use crate::obj::VERTEX_STRIDE;
use crate::particles::FireflyField;
use crate::scene::{MeshKey, SceneNode};

use super::{Frame, FrameRenderer};

/// Colour used for meshes the bindings left without a material.
const UNASSIGNED_COLOR: Vec3 = Vec3::splat(0.5);

/// GPU renderer backed by wgpu that draws the portal scene into a window.
pub struct Renderer {
    // Declared before `window` so the surface is dropped first.
    surface: wgpu::Surface,
    window: Arc<Window>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    logical_size: (u32, u32),
    pixel_ratio: f32,
    target: RenderTarget,
    blit_sampler: wgpu::Sampler,
    blit_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    object_layout: wgpu::BindGroupLayout,
    baked_pipeline: wgpu::RenderPipeline,
    surface_pipeline: wgpu::RenderPipeline,
    firefly_pipeline: wgpu::RenderPipeline,
    mesh_cache: HashMap<MeshKey, MeshBuffers>,
    texture_cache: HashMap<String, wgpu::BindGroup>,
    fireflies: Option<InstanceBuffer>,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(window: Arc<Window>, pixel_ratio: f32) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow::anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        // SAFETY: the renderer owns an `Arc` of the window and drops the
        // surface before it.
        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        info!("Using GPU adapter {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("renderer-device"),
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no supported formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[uniform_entry(0, std::mem::size_of::<GlobalUniform>())],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[uniform_entry(0, std::mem::size_of::<ObjectUniform>())],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture-bind-layout"),
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

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let builder = PipelineBuilder {
            device: &device,
            format: surface_format,
        };
        let baked_pipeline = builder.mesh_pipeline(
            "baked",
            &format!("{GLOBALS_WGSL}{MESH_VERTEX_WGSL}{BAKED_WGSL}"),
            &[&global_layout, &texture_layout],
        );
        let surface_pipeline = builder.mesh_pipeline(
            "surface",
            &format!("{GLOBALS_WGSL}{MESH_VERTEX_WGSL}{NOISE_WGSL}{SURFACE_WGSL}"),
            &[&global_layout, &object_layout],
        );
        let firefly_pipeline = builder.firefly_pipeline(
            &format!("{GLOBALS_WGSL}{FIREFLY_WGSL}"),
            &[&global_layout],
        );
        let blit_pipeline = builder.blit_pipeline(BLIT_WGSL, &[&texture_layout]);

        let blit_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("blit-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let logical: LogicalSize<u32> = size.to_logical(window.scale_factor());
        let logical_size = (logical.width, logical.height);
        let (width, height) = render_target_size(logical_size, pixel_ratio);
        let target = RenderTarget::create(
            &device,
            surface_format,
            width,
            height,
            &texture_layout,
            &blit_sampler,
        );

        Ok(Self {
            surface,
            window,
            device,
            queue,
            config,
            logical_size,
            pixel_ratio,
            target,
            blit_sampler,
            blit_pipeline,
            global_buffer,
            global_bind_group,
            texture_layout,
            object_layout,
            baked_pipeline,
            surface_pipeline,
            firefly_pipeline,
            mesh_cache: HashMap::new(),
            texture_cache: HashMap::new(),
            fireflies: None,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Reconfigures the swap chain at the window's physical size.
    fn configure_surface(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Recreates the offscreen target when the logical size or the pixel
    /// ratio changed its resolution.
    fn resize_target(&mut self) {
        let (width, height) = render_target_size(self.logical_size, self.pixel_ratio);
        if (width, height) == (self.target.width, self.target.height) {
            return;
        }
        debug!("render target resized to {width}x{height}");
        self.target = RenderTarget::create(
            &self.device,
            self.config.format,
            width,
            height,
            &self.texture_layout,
            &self.blit_sampler,
        );
    }

    fn write_globals(&self, frame: &Frame<'_>) {
        let uniforms = frame.uniforms;
        let uniform = GlobalUniform {
            view_proj: frame.camera.view_proj().to_cols_array_2d(),
            view: frame.camera.view.to_cols_array_2d(),
            projection: frame.camera.projection.to_cols_array_2d(),
            portal_color_start: uniforms
                .portal
                .color_start
                .extend(uniforms.portal.elapsed_time)
                .into(),
            portal_color_end: uniforms.portal.color_end.extend(1.0).into(),
            firefly: [
                uniforms.fireflies.elapsed_time,
                uniforms.fireflies.pixel_ratio,
                uniforms.fireflies.base_point_size,
                0.0,
            ],
            resolution: [
                self.target.width as f32,
                self.target.height as f32,
                0.0,
                0.0,
            ],
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&uniform));
    }

    fn ensure_mesh_loaded(&mut self, key: MeshKey, node: &SceneNode) {
        if self.mesh_cache.contains_key(&key) || node.mesh.indices.is_empty() {
            return;
        }
        let binding = match &node.material {
            Some(Material::Baked { texture }) => {
                self.ensure_texture_loaded(texture);
                MeshBinding::Baked(texture.label.clone())
            }
            Some(Material::FlatTint { color }) => MeshBinding::Surface(self.object_bind_group(
                &node.name,
                *color,
                SurfaceMode::Flat,
            )),
            Some(Material::PortalShader) => MeshBinding::Surface(self.object_bind_group(
                &node.name,
                Vec3::ONE,
                SurfaceMode::Portal,
            )),
            None => MeshBinding::Surface(self.object_bind_group(
                &node.name,
                UNASSIGNED_COLOR,
                SurfaceMode::Flat,
            )),
        };
        let vertex = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-vertices", node.name)),
                contents: bytemuck::cast_slice(&node.mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{}-indices", node.name)),
                contents: bytemuck::cast_slice(&node.mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        debug!("uploaded mesh {} ({} indices)", node.name, node.mesh.indices.len());
        self.mesh_cache.insert(
            key,
            MeshBuffers {
                vertex,
                index,
                index_count: node.mesh.indices.len() as u32,
                binding,
            },
        );
    }

    fn object_bind_group(&self, name: &str, color: Vec3, mode: SurfaceMode) -> wgpu::BindGroup {
        let uniform = ObjectUniform {
            color: color.extend(1.0).into(),
            params: [mode as u32 as f32, 0.0, 0.0, 0.0],
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{name}-object-uniform")),
                contents: bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object-bind-group"),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    fn ensure_texture_loaded(&mut self, data: &TextureData) {
        if self.texture_cache.contains_key(&data.label) {
            return;
        }
        let size = wgpu::Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        };
        let format = match data.color_space {
            ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&data.label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * data.width),
                rows_per_image: Some(data.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("baked-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture-bind-group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        self.texture_cache.insert(data.label.clone(), bind_group);
    }

    fn ensure_fireflies_loaded(&mut self, field: &FireflyField) {
        if self.fireflies.is_some() || field.is_empty() {
            return;
        }
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("firefly-instances"),
                contents: bytemuck::cast_slice(&field.instance_data()),
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.fireflies = Some(InstanceBuffer {
            buffer,
            count: field.len() as u32,
        });
    }
}

impl FrameRenderer for Renderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.logical_size = (width, height);
        let size = self.window.inner_size();
        self.configure_surface(size);
        self.resize_target();
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.pixel_ratio = pixel_ratio;
        self.resize_target();
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        let output = self.surface.get_current_texture().map_err(|err| match err {
            wgpu::SurfaceError::Lost => RenderError::SurfaceLost,
            wgpu::SurfaceError::Outdated => RenderError::SurfaceOutdated,
            wgpu::SurfaceError::Timeout => RenderError::Timeout,
            wgpu::SurfaceError::OutOfMemory => RenderError::OutOfMemory,
        })?;

        self.write_globals(frame);
        for (key, node) in frame.scene.indexed_meshes() {
            self.ensure_mesh_loaded(key, node);
        }
        if let Some(field) = frame.scene.fireflies() {
            self.ensure_fireflies_loaded(field);
        }

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });

        let clear = frame.settings.clear_color;
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.x as f64,
                            g: clear.y as f64,
                            b: clear.z as f64,
                            a: 1.0,
                        }),
                        store: true,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: true,
                    }),
                    stencil_ops: None,
                }),
            });

            pass.set_bind_group(0, &self.global_bind_group, &[]);

            // Opaque meshes first, then the additive fireflies on top.
            for (key, _) in frame.scene.indexed_meshes() {
                let Some(mesh) = self.mesh_cache.get(&key) else {
                    continue;
                };
                match &mesh.binding {
                    MeshBinding::Baked(label) => {
                        let Some(texture) = self.texture_cache.get(label) else {
                            continue;
                        };
                        pass.set_pipeline(&self.baked_pipeline);
                        pass.set_bind_group(1, texture, &[]);
                    }
                    MeshBinding::Surface(bind_group) => {
                        pass.set_pipeline(&self.surface_pipeline);
                        pass.set_bind_group(1, bind_group, &[]);
                    }
                }
                pass.set_vertex_buffer(0, mesh.vertex.slice(..));
                pass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }

            if let Some(fireflies) = &self.fireflies {
                pass.set_pipeline(&self.firefly_pipeline);
                pass.set_vertex_buffer(0, fireflies.buffer.slice(..));
                pass.draw(0..6, 0..fireflies.count);
            }
        }
        {
            // Scales the target up to the window's physical size.
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline(&self.blit_pipeline);
            pass.set_bind_group(0, &self.target.blit_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn reconfigure(&mut self) {
        let size = self.window.inner_size();
        self.configure_surface(size);
    }
}

/// Resolution the scene is drawn at: the logical size scaled by the capped
/// pixel ratio, at least one pixel each way.
pub fn render_target_size(logical_size: (u32, u32), pixel_ratio: f32) -> (u32, u32) {
    let scale = |value: u32| ((value as f32 * pixel_ratio).round() as u32).max(1);
    (scale(logical_size.0), scale(logical_size.1))
}

fn uniform_entry(binding: u32, size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: wgpu::BufferSize::new(size as u64),
        },
        count: None,
    }
}

struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    format: wgpu::TextureFormat,
}

impl PipelineBuilder<'_> {
    fn layout(&self, label: &str, layouts: &[&wgpu::BindGroupLayout]) -> wgpu::PipelineLayout {
        self.device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label}-pipeline-layout")),
                bind_group_layouts: layouts,
                push_constant_ranges: &[],
            })
    }

    fn shader(&self, label: &str, source: &str) -> wgpu::ShaderModule {
        self.device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{label}-shader")),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
    }

    /// Opaque pipeline for meshes with `position.xyz` + `uv.xy` vertices.
    fn mesh_pipeline(
        &self,
        label: &str,
        source: &str,
        layouts: &[&wgpu::BindGroupLayout],
    ) -> wgpu::RenderPipeline {
        let shader = self.shader(label, source);
        let layout = self.layout(label, layouts);
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("{label}-pipeline")),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &MESH_ATTRIBUTES,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
    }

    /// Fullscreen triangle that samples the render target.
    fn blit_pipeline(
        &self,
        source: &str,
        layouts: &[&wgpu::BindGroupLayout],
    ) -> wgpu::RenderPipeline {
        let shader = self.shader("blit", source);
        let layout = self.layout("blit", layouts);
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("blit-pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
    }

    /// Instanced camera-facing quads, additive and without depth writes.
    fn firefly_pipeline(
        &self,
        source: &str,
        layouts: &[&wgpu::BindGroupLayout],
    ) -> wgpu::RenderPipeline {
        let shader = self.shader("firefly", source);
        let layout = self.layout("firefly", layouts);
        let additive = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::One,
            operation: wgpu::BlendOperation::Add,
        };
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("firefly-pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: (4 * std::mem::size_of::<f32>()) as u64,
                        step_mode: wgpu::VertexStepMode::Instance,
                        attributes: &FIREFLY_ATTRIBUTES,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(wgpu::BlendState {
                            color: additive,
                            alpha: additive,
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
    }
}

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
const FIREFLY_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32];

#[derive(Clone, Copy)]
#[repr(u32)]
enum SurfaceMode {
    Flat = 0,
    Portal = 1,
}

enum MeshBinding {
    /// Keyed by texture label in the texture cache.
    Baked(String),
    Surface(wgpu::BindGroup),
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    binding: MeshBinding,
}

struct InstanceBuffer {
    buffer: wgpu::Buffer,
    count: u32,
}

/// Offscreen colour and depth attachments the scene is drawn into before
/// being scaled onto the surface.
struct RenderTarget {
    width: u32,
    height: u32,
    _color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: DepthBuffer,
    blit_bind_group: wgpu::BindGroup,
}

impl RenderTarget {
    fn create(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
    ) -> Self {
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("render-target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let blit_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit-bind-group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            width,
            height,
            _color: color,
            color_view,
            depth: DepthBuffer::create(device, width, height),
            blit_bind_group,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view_proj: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    /// rgb + elapsed time in w.
    portal_color_start: [f32; 4],
    portal_color_end: [f32; 4],
    /// time, pixel ratio, base point size.
    firefly: [f32; 4],
    resolution: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ObjectUniform {
    color: [f32; 4],
    params: [f32; 4],
}

const GLOBALS_WGSL: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    portal_color_start: vec4<f32>,
    portal_color_end: vec4<f32>,
    firefly: vec4<f32>,
    resolution: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;
"#;

const MESH_VERTEX_WGSL: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = globals.view_proj * vec4<f32>(input.position, 1.0);
    out.uv = input.uv;
    return out;
}
"#;

const BAKED_WGSL: &str = r#"
@group(1) @binding(0)
var baked_texture: texture_2d<f32>;
@group(1) @binding(1)
var baked_sampler: sampler;

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(textureSample(baked_texture, baked_sampler, input.uv).rgb, 1.0);
}
"#;

const NOISE_WGSL: &str = r#"
fn hash3(p: vec3<f32>) -> vec3<f32> {
    let q = vec3<f32>(
        dot(p, vec3<f32>(127.1, 311.7, 74.7)),
        dot(p, vec3<f32>(269.5, 183.3, 246.1)),
        dot(p, vec3<f32>(113.5, 271.9, 124.6))
    );
    return -1.0 + 2.0 * fract(sin(q) * 43758.5453123);
}

fn corner(i: vec3<f32>, f: vec3<f32>, o: vec3<f32>) -> f32 {
    return dot(hash3(i + o), f - o);
}

fn gradient_noise(p: vec3<f32>) -> f32 {
    let i = floor(p);
    let f = fract(p);
    let u = f * f * (3.0 - 2.0 * f);
    let x00 = mix(
        corner(i, f, vec3<f32>(0.0, 0.0, 0.0)),
        corner(i, f, vec3<f32>(1.0, 0.0, 0.0)),
        u.x
    );
    let x10 = mix(
        corner(i, f, vec3<f32>(0.0, 1.0, 0.0)),
        corner(i, f, vec3<f32>(1.0, 1.0, 0.0)),
        u.x
    );
    let x01 = mix(
        corner(i, f, vec3<f32>(0.0, 0.0, 1.0)),
        corner(i, f, vec3<f32>(1.0, 0.0, 1.0)),
        u.x
    );
    let x11 = mix(
        corner(i, f, vec3<f32>(0.0, 1.0, 1.0)),
        corner(i, f, vec3<f32>(1.0, 1.0, 1.0)),
        u.x
    );
    return mix(mix(x00, x10, u.y), mix(x01, x11, u.y), u.z);
}
"#;

const SURFACE_WGSL: &str = r#"
struct ObjectUniform {
    color: vec4<f32>,
    params: vec4<f32>,
}

@group(1) @binding(0)
var<uniform> object: ObjectUniform;

fn portal_color(uv: vec2<f32>) -> vec3<f32> {
    let time = globals.portal_color_start.w;
    let displaced = uv + gradient_noise(vec3<f32>(uv * 5.0, time * 0.1));
    var strength = gradient_noise(vec3<f32>(displaced * 5.0, time * 0.2));
    strength += distance(uv, vec2<f32>(0.5, 0.5)) * 5.0 - 1.4;
    strength += step(-0.2, strength) * 0.8;
    strength = clamp(strength, 0.0, 1.0);
    return mix(globals.portal_color_start.rgb, globals.portal_color_end.rgb, strength);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    if object.params.x > 0.5 {
        return vec4<f32>(portal_color(input.uv), 1.0);
    }
    return object.color;
}
"#;

const FIREFLY_WGSL: &str = r#"
struct FireflyOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    @location(0) position: vec3<f32>,
    @location(1) scale: f32,
) -> FireflyOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(-1.0, 1.0),
    );
    let time = globals.firefly.x;
    let pixel_ratio = globals.firefly.y;
    let base_size = globals.firefly.z;

    var world = vec4<f32>(position, 1.0);
    world.y += sin(time + world.x * 100.0) * scale * 0.2;
    let view_position = globals.view * world;
    let clip = globals.projection * view_position;

    let size = base_size * scale * pixel_ratio / max(-view_position.z, 0.0001);
    let corner = corners[vertex_index];
    let offset = corner * size / globals.resolution.xy;

    var out: FireflyOutput;
    out.position = vec4<f32>(clip.xy + offset * clip.w, clip.zw);
    out.uv = corner * 0.5 + vec2<f32>(0.5, 0.5);
    return out;
}

@fragment
fn fs_main(input: FireflyOutput) -> @location(0) vec4<f32> {
    let distance_to_center = distance(input.uv, vec2<f32>(0.5, 0.5));
    let strength = clamp(0.05 / distance_to_center - 0.1, 0.0, 1.0);
    return vec4<f32>(1.0, 1.0, 1.0, strength);
}
"#;

const BLIT_WGSL: &str = r#"
struct BlitOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@group(0) @binding(0)
var frame_texture: texture_2d<f32>;
@group(0) @binding(1)
var frame_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> BlitOutput {
    let uv = vec2<f32>(f32((vertex_index << 1u) & 2u), f32(vertex_index & 2u));
    var out: BlitOutput;
    out.position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(input: BlitOutput) -> @location(0) vec4<f32> {
    return textureSample(frame_texture, frame_sampler, input.uv);
}
"#;
