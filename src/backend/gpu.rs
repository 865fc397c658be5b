use super::{Backend, BufferUsage, Dispatch, DrawCall, DrawSource, MeshBinding};
use crate::{CameraUniform, FrameUniforms, NBodyUniforms, SimError};
use std::borrow::Cow;
use std::sync::mpsc;
use wgpu::{util::DeviceExt, PipelineCompilationOptions};

struct DrawPipelines {
  generic: wgpu::RenderPipeline,
  nbody: wgpu::RenderPipeline,
}

pub struct GpuBackend {
  device: wgpu::Device,
  queue: wgpu::Queue,
  nbody_pipeline: wgpu::ComputePipeline,
  nbody_bind_group_layout: wgpu::BindGroupLayout,
  scene_pipeline: wgpu::ComputePipeline,
  scene_bind_group_layout: wgpu::BindGroupLayout,
  draw: Option<DrawPipelines>,
  draw_generic_layout: wgpu::BindGroupLayout,
  draw_nbody_layout: wgpu::BindGroupLayout,
  camera_buffer: wgpu::Buffer,
  camera_bind_group: wgpu::BindGroup,
  nbody_params: wgpu::Buffer,
  frame_params: wgpu::Buffer,
  draw_params: wgpu::Buffer,
  empty_mesh: [wgpu::Buffer; 2],
  encoder: Option<wgpu::CommandEncoder>,
  target: Option<wgpu::TextureView>,
  cleared: bool,
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
  wgpu::BindGroupLayoutEntry {
    binding,
    visibility,
    ty: wgpu::BindingType::Buffer {
      ty: wgpu::BufferBindingType::Uniform,
      has_dynamic_offset: false,
      min_binding_size: None,
    },
    count: None,
  }
}

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
  wgpu::BindGroupLayoutEntry {
    binding,
    visibility,
    ty: wgpu::BindingType::Buffer {
      ty: wgpu::BufferBindingType::Storage { read_only },
      has_dynamic_offset: false,
      min_binding_size: None,
    },
    count: None,
  }
}

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
  color: wgpu::BlendComponent {
    src_factor: wgpu::BlendFactor::One,
    dst_factor: wgpu::BlendFactor::One,
    operation: wgpu::BlendOperation::Add,
  },
  alpha: wgpu::BlendComponent {
    src_factor: wgpu::BlendFactor::One,
    dst_factor: wgpu::BlendFactor::One,
    operation: wgpu::BlendOperation::Add,
  },
};

impl GpuBackend {
  /// Builds the compute pipelines, and the draw pipelines when a
  /// `target_format` is given. Without one, draws are skipped.
  #[must_use]
  pub fn new(device: wgpu::Device, queue: wgpu::Queue, target_format: Option<wgpu::TextureFormat>) -> Self {
    let nbody_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("nbody"),
      source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("../shaders/nbody.wgsl"))),
    });
    let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("scene"),
      source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("../shaders/scene.wgsl"))),
    });
    let draw_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("draw"),
      source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(include_str!("../shaders/draw.wgsl"))),
    });

    // ========================================================================
    // compute pipeline stuff
    // ========================================================================

    let compute = wgpu::ShaderStages::COMPUTE;
    let nbody_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("nbody_bind_group_layout"),
      entries: &[
        uniform_entry(0, compute),
        storage_entry(1, compute, true),
        storage_entry(2, compute, false),
        storage_entry(3, compute, false),
      ],
    });
    let scene_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("scene_bind_group_layout"),
      entries: &[
        uniform_entry(0, compute),
        storage_entry(1, compute, false),
        storage_entry(2, compute, true),
        storage_entry(3, compute, true),
      ],
    });

    let nbody_pipeline = compute_pipeline(&device, "nbody", &nbody_bind_group_layout, &nbody_shader);
    let scene_pipeline = compute_pipeline(&device, "scene", &scene_bind_group_layout, &scene_shader);

    // ========================================================================
    // render pipeline stuff
    // ========================================================================

    let vertex = wgpu::ShaderStages::VERTEX;
    let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("camera_bind_group_layout"),
      entries: &[uniform_entry(0, vertex)],
    });
    let draw_generic_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("draw_generic_bind_group_layout"),
      entries: &[uniform_entry(0, vertex), storage_entry(1, vertex, true)],
    });
    let draw_nbody_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      label: Some("draw_nbody_bind_group_layout"),
      entries: &[uniform_entry(0, vertex)],
    });

    let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Camera Buffer"),
      contents: bytemuck::bytes_of(&CameraUniform {
        view: cgmath_identity(),
        proj: cgmath_identity(),
      }),
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      layout: &camera_layout,
      entries: &[wgpu::BindGroupEntry {
        binding: 0,
        resource: camera_buffer.as_entire_binding(),
      }],
      label: Some("camera_bind_group"),
    });

    let draw = target_format.map(|format| {
      let generic_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("draw generic"),
        bind_group_layouts: &[&camera_layout, &draw_generic_layout],
        push_constant_ranges: &[],
      });
      let nbody_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("draw nbody"),
        bind_group_layouts: &[&camera_layout, &draw_nbody_layout],
        push_constant_ranges: &[],
      });
      let nbody_buffers = [
        wgpu::VertexBufferLayout {
          array_stride: 4 * 4,
          step_mode: wgpu::VertexStepMode::Instance,
          attributes: &wgpu::vertex_attr_array![0 => Float32x4],
        },
        wgpu::VertexBufferLayout {
          array_stride: 4 * 4,
          step_mode: wgpu::VertexStepMode::Instance,
          attributes: &wgpu::vertex_attr_array![1 => Float32x4],
        },
      ];
      DrawPipelines {
        generic: render_pipeline(&device, "generic", &generic_layout, &draw_shader, "vs_generic", &[], format),
        nbody: render_pipeline(&device, "nbody", &nbody_layout, &draw_shader, "vs_nbody", &nbody_buffers, format),
      }
    });

    let uniform_buffer = |label: &str, size: usize| {
      device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
      })
    };
    let nbody_params = uniform_buffer("N-Body Parameter Buffer", std::mem::size_of::<NBodyUniforms>());
    let frame_params = uniform_buffer("Frame Parameter Buffer", std::mem::size_of::<FrameUniforms>());
    let draw_params = uniform_buffer("Draw Parameter Buffer", std::mem::size_of::<FrameUniforms>());

    let empty_mesh = [0, 1].map(|i| {
      device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("Empty Mesh Buffer {i}")),
        size: 16,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
      })
    });

    Self {
      device,
      queue,
      nbody_pipeline,
      nbody_bind_group_layout,
      scene_pipeline,
      scene_bind_group_layout,
      draw,
      draw_generic_layout,
      draw_nbody_layout,
      camera_buffer,
      camera_bind_group,
      nbody_params,
      frame_params,
      draw_params,
      empty_mesh,
      encoder: None,
      target: None,
      cleared: false,
    }
  }

  pub fn device(&self) -> &wgpu::Device {
    &self.device
  }

  pub fn set_camera(&mut self, camera: &CameraUniform) {
    self.flush();
    self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(camera));
  }

  /// Draws until [`Self::end_frame`] go to `view`.
  pub fn begin_frame(&mut self, view: wgpu::TextureView) {
    self.target = Some(view);
    self.cleared = false;
  }

  /// Submits the frame's work. A frame with no draw still clears the target.
  pub fn end_frame(&mut self) {
    if !self.cleared {
      if let Some(view) = self.target.take() {
        let encoder = self.encoder();
        let _ = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
          label: Some("clear"),
          color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &view,
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
      }
    }
    self.target = None;
    self.flush();
  }

  fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
    let device = &self.device;
    self
      .encoder
      .get_or_insert_with(|| device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None }))
  }

  /// Submits recorded work so later queue writes cannot overtake it.
  fn flush(&mut self) {
    if let Some(encoder) = self.encoder.take() {
      self.queue.submit(Some(encoder.finish()));
    }
  }

  /// Submits pending work first so it still sees the previous contents.
  fn write_uniforms(&mut self, buffer: UniformSlot, contents: &[u8]) {
    self.flush();
    let buffer = match buffer {
      UniformSlot::NBody => &self.nbody_params,
      UniformSlot::Frame => &self.frame_params,
      UniformSlot::Draw => &self.draw_params,
    };
    self.queue.write_buffer(buffer, 0, contents);
  }

  fn mesh_buffers<'a>(&'a self, mesh: Option<MeshBinding<'a, wgpu::Buffer>>) -> (&'a wgpu::Buffer, &'a wgpu::Buffer) {
    match mesh {
      Some(m) => (m.positions, m.indices),
      None => (&self.empty_mesh[0], &self.empty_mesh[1]),
    }
  }
}

#[derive(Copy, Clone)]
enum UniformSlot {
  NBody,
  Frame,
  Draw,
}

fn cgmath_identity() -> [[f32; 4]; 4] {
  use cgmath::SquareMatrix;
  cgmath::Matrix4::<f32>::identity().into()
}

fn compute_pipeline(
  device: &wgpu::Device,
  label: &str,
  bind_group_layout: &wgpu::BindGroupLayout,
  module: &wgpu::ShaderModule,
) -> wgpu::ComputePipeline {
  let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
    label: Some(label),
    bind_group_layouts: &[bind_group_layout],
    push_constant_ranges: &[],
  });
  device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
    label: Some(label),
    layout: Some(&layout),
    module,
    entry_point: "main",
    compilation_options: PipelineCompilationOptions::default(),
    cache: None,
  })
}

fn render_pipeline(
  device: &wgpu::Device,
  label: &str,
  layout: &wgpu::PipelineLayout,
  module: &wgpu::ShaderModule,
  vertex_entry: &str,
  buffers: &[wgpu::VertexBufferLayout<'_>],
  format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
  device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
    label: Some(label),
    layout: Some(layout),
    vertex: wgpu::VertexState {
      module,
      entry_point: vertex_entry,
      compilation_options: PipelineCompilationOptions::default(),
      buffers,
    },
    fragment: Some(wgpu::FragmentState {
      module,
      entry_point: "fs_main",
      compilation_options: PipelineCompilationOptions::default(),
      targets: &[Some(wgpu::ColorTargetState {
        format,
        blend: Some(ADDITIVE),
        write_mask: wgpu::ColorWrites::ALL,
      })],
    }),
    primitive: wgpu::PrimitiveState::default(),
    depth_stencil: None,
    multisample: wgpu::MultisampleState::default(),
    multiview: None,
    cache: None,
  })
}

impl Backend for GpuBackend {
  type Buffer = wgpu::Buffer;

  fn max_buffer_size(&self) -> u64 {
    let limits = self.device.limits();
    limits.max_buffer_size.min(u64::from(limits.max_storage_buffer_binding_size))
  }

  fn create_buffer(&mut self, label: &str, size: u64, usage: BufferUsage) -> wgpu::Buffer {
    let usage = wgpu::BufferUsages::COPY_DST
      | wgpu::BufferUsages::COPY_SRC
      | match usage {
        BufferUsage::Storage => wgpu::BufferUsages::STORAGE,
        BufferUsage::StorageVertex => wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX,
        BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
      };
    self.device.create_buffer(&wgpu::BufferDescriptor {
      label: Some(label),
      // zero-sized buffers cannot be bound
      size: size.max(16),
      usage,
      mapped_at_creation: false,
    })
  }

  fn release_buffer(&mut self, buffer: wgpu::Buffer) {
    self.flush();
    drop(buffer);
  }

  fn write_buffer(&mut self, buffer: &wgpu::Buffer, offset: u64, data: &[u8]) {
    if data.is_empty() {
      return;
    }
    self.flush();
    self.queue.write_buffer(buffer, offset, data);
  }

  fn read_buffer(&mut self, buffer: &wgpu::Buffer, offset: u64, len: u64) -> Result<Vec<u8>, SimError> {
    if len == 0 {
      return Ok(Vec::new());
    }
    let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
      label: Some("Read-back Buffer"),
      size: len,
      usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
      mapped_at_creation: false,
    });
    self.encoder().copy_buffer_to_buffer(buffer, offset, &staging, 0, len);
    self.flush();

    let slice = staging.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
      let _ = sender.send(result);
    });
    let _ = self.device.poll(wgpu::Maintain::Wait);
    receiver.recv().unwrap_or(Err(wgpu::BufferAsyncError))?;

    let bytes = slice.get_mapped_range().to_vec();
    staging.unmap();
    Ok(bytes)
  }

  fn dispatch(&mut self, dispatch: Dispatch<'_, wgpu::Buffer>) {
    let (bind_group, groups, nbody) = match dispatch {
      Dispatch::NBody {
        input,
        output,
        velocities,
        uniforms,
        groups,
      } => {
        self.write_uniforms(UniformSlot::NBody, bytemuck::bytes_of::<NBodyUniforms>(&uniforms));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
          layout: &self.nbody_bind_group_layout,
          entries: &[
            wgpu::BindGroupEntry {
              binding: 0,
              resource: self.nbody_params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
              binding: 1,
              resource: input.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
              binding: 2,
              resource: output.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
              binding: 3,
              resource: velocities.as_entire_binding(),
            },
          ],
          label: None,
        });
        (bind_group, groups, true)
      }
      Dispatch::Scene {
        particles,
        mesh,
        uniforms,
        groups,
      } => {
        self.write_uniforms(UniformSlot::Frame, bytemuck::bytes_of::<FrameUniforms>(&uniforms));
        let (mesh_positions, mesh_indices) = self.mesh_buffers(mesh);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
          layout: &self.scene_bind_group_layout,
          entries: &[
            wgpu::BindGroupEntry {
              binding: 0,
              resource: self.frame_params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
              binding: 1,
              resource: particles.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
              binding: 2,
              resource: mesh_positions.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
              binding: 3,
              resource: mesh_indices.as_entire_binding(),
            },
          ],
          label: None,
        });
        (bind_group, groups, false)
      }
    };

    let pipeline = if nbody {
      &self.nbody_pipeline
    } else {
      &self.scene_pipeline
    };
    let encoder = self
      .encoder
      .get_or_insert_with(|| self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None }));
    let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
      label: None,
      timestamp_writes: None,
    });
    cpass.set_pipeline(pipeline);
    cpass.set_bind_group(0, &bind_group, &[]);
    cpass.dispatch_workgroups(groups[0], groups[1], groups[2]);
  }

  fn memory_barrier(&mut self) {
    // Every dispatch and draw is recorded in its own pass; wgpu orders
    // storage writes before later reads at pass boundaries.
  }

  fn wait_idle(&mut self) {
    self.flush();
    let _ = self.device.poll(wgpu::Maintain::Wait);
  }

  fn draw(&mut self, draw: DrawCall<'_, wgpu::Buffer>) {
    if self.draw.is_none() || self.target.is_none() {
      log::trace!("no render target, skipping draw of {} particles", draw.count);
      return;
    }
    self.write_uniforms(UniformSlot::Draw, bytemuck::bytes_of(&draw.uniforms));
    let (Some(pipelines), Some(view)) = (&self.draw, &self.target) else {
      return;
    };
    let params = &self.draw_params;
    let (pipeline, bind_group, vertex_buffers) = match draw.source {
      DrawSource::Generic { particles, .. } => {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
          layout: &self.draw_generic_layout,
          entries: &[
            wgpu::BindGroupEntry {
              binding: 0,
              resource: params.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
              binding: 1,
              resource: particles.as_entire_binding(),
            },
          ],
          label: None,
        });
        (&pipelines.generic, bind_group, None)
      }
      DrawSource::NBody { positions, colors } => {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
          layout: &self.draw_nbody_layout,
          entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: params.as_entire_binding(),
          }],
          label: None,
        });
        (&pipelines.nbody, bind_group, Some((positions, colors)))
      }
    };

    let load = if self.cleared {
      wgpu::LoadOp::Load
    } else {
      wgpu::LoadOp::Clear(wgpu::Color::BLACK)
    };
    let color_attachments = [Some(wgpu::RenderPassColorAttachment {
      view,
      resolve_target: None,
      ops: wgpu::Operations {
        load,
        store: wgpu::StoreOp::Store,
      },
    })];
    let render_pass_descriptor = wgpu::RenderPassDescriptor {
      label: None,
      color_attachments: &color_attachments,
      depth_stencil_attachment: None,
      timestamp_writes: None,
      occlusion_query_set: None,
    };

    let encoder = self
      .encoder
      .get_or_insert_with(|| self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None }));
    {
      let mut rpass = encoder.begin_render_pass(&render_pass_descriptor);
      rpass.set_pipeline(pipeline);
      rpass.set_bind_group(0, &self.camera_bind_group, &[]);
      rpass.set_bind_group(1, &bind_group, &[]);
      if let Some((positions, colors)) = vertex_buffers {
        rpass.set_vertex_buffer(0, positions.slice(..));
        rpass.set_vertex_buffer(1, colors.slice(..));
      }
      rpass.draw(0..6, 0..draw.count);
    }
    self.cleared = true;
  }
}
