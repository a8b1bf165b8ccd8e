// wgpu raster target
// Uploads packed BGRA frames to a texture and blits them with pixel zoom

use super::{PixelZoom, RasterTarget, RendererError, SurfaceSize};
use crate::buffer::{BYTES_PER_PIXEL, FrameDimensions};
use bytemuck::{Pod, Zeroable};
use std::sync::Arc;
use winit::window::{CursorIcon, Window};

/// WGSL shader placing the frame quad at the top-left anchor
const BLIT_SHADER: &str = r#"
struct Blit {
    zoom: vec2<f32>,
    frame_size: vec2<f32>,
    viewport: vec2<f32>,
    _pad: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
}

@group(0) @binding(0) var frame_texture: texture_2d<f32>;
@group(0) @binding(1) var frame_sampler: sampler;
@group(0) @binding(2) var<uniform> blit: Blit;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(0.0, 0.0),
        vec2<f32>(1.0, 1.0),
        vec2<f32>(0.0, 1.0),
    );
    let uv = corners[vertex_index];

    // Row 0 of the frame lands on the top edge; negative zoom.y walks down
    let extent = 2.0 * blit.frame_size * blit.zoom / blit.viewport;
    let ndc = vec2<f32>(-1.0 + uv.x * extent.x, 1.0 + uv.y * extent.y);

    var output: VertexOutput;
    output.position = vec4<f32>(ndc, 0.0, 1.0);
    output.tex_coord = uv;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(frame_texture, frame_sampler, input.tex_coord);
}
"#;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct BlitUniform {
    zoom: [f32; 2],
    frame_size: [f32; 2],
    viewport: [f32; 2],
    _pad: [f32; 2],
}

impl BlitUniform {
    fn new(zoom: PixelZoom, frame: FrameDimensions, viewport: SurfaceSize) -> Self {
        Self {
            zoom: [zoom.x, zoom.y],
            frame_size: [frame.width as f32, frame.height as f32],
            viewport: [viewport.width as f32, viewport.height as f32],
            _pad: [0.0; 2],
        }
    }
}

struct GpuResources {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    texture: wgpu::Texture,
    uniform_buffer: wgpu::Buffer,
    uniform: BlitUniform,
}

/// Raster target drawing into a winit window through wgpu
pub struct WgpuRasterTarget {
    window: Arc<Window>,
    frame: FrameDimensions,
    gpu: Option<GpuResources>,
}

impl WgpuRasterTarget {
    pub async fn new(
        window: Arc<Window>,
        size: SurfaceSize,
        frame: FrameDimensions,
    ) -> Result<Self, RendererError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| RendererError::InitError(format!("Failed to create surface: {}", e)))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RendererError::GpuNotAvailable(format!("Failed to request adapter: {}", e)))?;

        log::info!("Using GPU adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default())
            .await
            .map_err(|e| RendererError::InitError(format!("Failed to create device: {}", e)))?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| capabilities.formats.first())
            .copied()
            .ok_or_else(|| RendererError::InitError("Surface reports no formats".to_string()))?;

        // The render loop paces itself, so avoid blocking on vsync where possible
        let present_mode = if capabilities.present_modes.contains(&wgpu::PresentMode::Mailbox) {
            wgpu::PresentMode::Mailbox
        } else if capabilities.present_modes.contains(&wgpu::PresentMode::Immediate) {
            wgpu::PresentMode::Immediate
        } else {
            wgpu::PresentMode::Fifo
        };
        log::info!("wgpu present mode: {:?} (available: {:?})", present_mode, capabilities.present_modes);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Frame Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        // Texture is fixed to the decode resolution for the whole session
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("BGRA Frame Texture"),
            size: wgpu::Extent3d {
                width: frame.width,
                height: frame.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Bgra8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let uniform = BlitUniform::new(PixelZoom::for_viewport(size, frame), frame, size);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Blit Uniform"),
            size: std::mem::size_of::<BlitUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Blit Bind Group Layout"),
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
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Blit Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
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
            multiview_mask: None,
            cache: None,
        });

        log::info!(
            "wgpu raster target initialized: {}x{} frame, {}x{} surface",
            frame.width,
            frame.height,
            size.width,
            size.height
        );

        Ok(Self {
            window,
            frame,
            gpu: Some(GpuResources {
                device,
                queue,
                surface,
                surface_config,
                pipeline,
                bind_group,
                texture,
                uniform_buffer,
                uniform,
            }),
        })
    }
}

impl GpuResources {
    /// Reconfigure the swapchain if the viewport changed since the last tick
    fn fit_viewport(&mut self, viewport: SurfaceSize) {
        let (width, height) = (viewport.width.max(1), viewport.height.max(1));
        if self.surface_config.width != width || self.surface_config.height != height {
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
            log::debug!("Surface resized to {}x{}", width, height);
        }
    }

    fn upload(&self, frame: &[u8], dims: FrameDimensions) -> Result<(), RendererError> {
        let expected = dims.byte_len().unwrap_or(0);
        if frame.len() != expected {
            return Err(RendererError::RenderError(format!(
                "Frame is {} bytes, texture expects {}",
                frame.len(),
                expected
            )));
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            frame,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(dims.width * BYTES_PER_PIXEL as u32),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: dims.width,
                height: dims.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn draw(&mut self) -> Result<(), RendererError> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(e) if acquire_failure_is_transient(&e) => {
                // Drop this tick; the next one draws into the fresh swapchain
                log::debug!("Skipping present: {}", e);
                if !matches!(e, wgpu::SurfaceError::Timeout) {
                    self.surface.configure(&self.device, &self.surface_config);
                }
                return Ok(());
            }
            Err(e) => {
                return Err(RendererError::RenderError(format!(
                    "Failed to get surface texture: {}",
                    e
                )));
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Blit Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blit Pass"),
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
                multiview_mask: None,
            });

            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.draw(0..6, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

impl RasterTarget for WgpuRasterTarget {
    fn present(
        &mut self,
        frame: &[u8],
        viewport: SurfaceSize,
        zoom: PixelZoom,
        fresh: bool,
    ) -> Result<(), RendererError> {
        let dims = self.frame;
        let gpu = self
            .gpu
            .as_mut()
            .ok_or_else(|| RendererError::InvalidState("Raster target released".to_string()))?;

        gpu.fit_viewport(viewport);

        let uniform = BlitUniform::new(zoom, dims, viewport);
        if uniform != gpu.uniform {
            gpu.queue
                .write_buffer(&gpu.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
            gpu.uniform = uniform;
        }

        // Swapchain images are not preserved, so the quad is redrawn every tick
        if fresh {
            gpu.upload(frame, dims)?;
        }
        gpu.draw()
    }

    fn set_cursor(&mut self, cursor: CursorIcon) {
        self.window.set_cursor(cursor);
    }

    fn release(&mut self) {
        if self.gpu.take().is_some() {
            log::info!("wgpu raster target released");
        }
    }
}

/// Swapchain acquire failures that cost one tick instead of the session
fn acquire_failure_is_transient(e: &wgpu::SurfaceError) -> bool {
    matches!(
        e,
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_timeout_is_transient() {
        assert!(acquire_failure_is_transient(&wgpu::SurfaceError::Timeout));
        assert!(acquire_failure_is_transient(&wgpu::SurfaceError::Lost));
        assert!(acquire_failure_is_transient(&wgpu::SurfaceError::Outdated));
        assert!(!acquire_failure_is_transient(&wgpu::SurfaceError::OutOfMemory));
    }

    #[test]
    fn test_uniform_layout_matches_shader() {
        assert_eq!(std::mem::size_of::<BlitUniform>(), 32);
    }

    #[test]
    fn test_uniform_extent_at_native_size() {
        let frame = FrameDimensions::new(1280, 720);
        let viewport = SurfaceSize::new(1280, 720);
        let uniform = BlitUniform::new(PixelZoom::for_viewport(viewport, frame), frame, viewport);

        // Same computation the vertex stage does: the quad spans the full NDC range
        let extent_x = 2.0 * uniform.frame_size[0] * uniform.zoom[0] / uniform.viewport[0];
        let extent_y = 2.0 * uniform.frame_size[1] * uniform.zoom[1] / uniform.viewport[1];
        assert_eq!((extent_x, extent_y), (2.0, -2.0));
    }

    #[test]
    fn test_uniform_extent_in_wider_viewport() {
        // Zoom is derived from the viewport, so a stale zoom under-fills it
        let frame = FrameDimensions::new(1280, 720);
        let viewport = SurfaceSize::new(1920, 1080);
        let uniform = BlitUniform::new(PixelZoom { x: 1.0, y: -1.0 }, frame, viewport);
        let extent_x = 2.0 * uniform.frame_size[0] * uniform.zoom[0] / uniform.viewport[0];
        assert!((extent_x - 4.0 / 3.0).abs() < 1e-6);
    }
}
