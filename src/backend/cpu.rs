use super::{Backend, BufferUsage, Dispatch, DrawCall, DrawSource};
use crate::kernels::{self, MeshView};
use crate::scene::Layout;
use crate::{FrameUniforms, Particle, SimError};
use bytemuck::Pod;

/// Host-memory stand-in for a device. Buffers grow lazily up to their
/// declared size, so a large capacity costs nothing until it is written.
pub struct CpuBackend {
  buffers: Vec<HostBuffer>,
  /// Released slots, reused by the next `create_buffer`.
  free: Vec<usize>,
  max_buffer_size: u64,
  draws: Vec<RecordedDraw>,
  dispatches: usize,
  last_groups: Option<[u32; 3]>,
  barriers: usize,
}

struct HostBuffer {
  label: String,
  size: u64,
  usage: BufferUsage,
  data: Vec<u8>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CpuBuffer(usize);

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDraw {
  pub layout: Layout,
  /// Particle buffer for generic draws, position generation for N-body.
  pub buffer: CpuBuffer,
  pub count: u32,
  pub uniforms: FrameUniforms,
}

impl CpuBackend {
  pub fn new() -> Self {
    Self::with_max_buffer_size(1 << 31)
  }

  pub fn with_max_buffer_size(max_buffer_size: u64) -> Self {
    Self {
      buffers: Vec::new(),
      free: Vec::new(),
      max_buffer_size,
      draws: Vec::new(),
      dispatches: 0,
      last_groups: None,
      barriers: 0,
    }
  }

  pub fn draws(&self) -> &[RecordedDraw] {
    &self.draws
  }

  /// Hands over the draws recorded so far.
  pub fn take_draws(&mut self) -> Vec<RecordedDraw> {
    std::mem::take(&mut self.draws)
  }

  pub fn dispatch_count(&self) -> usize {
    self.dispatches
  }

  /// Workgroup counts of the most recent dispatch.
  pub fn last_dispatch_groups(&self) -> Option<[u32; 3]> {
    self.last_groups
  }

  /// Buffers created and not yet released.
  pub fn live_buffer_count(&self) -> usize {
    self.buffers.len() - self.free.len()
  }

  pub fn barrier_count(&self) -> usize {
    self.barriers
  }

  pub fn buffer_label(&self, buffer: &CpuBuffer) -> &str {
    &self.buffers[buffer.0].label
  }

  pub fn buffer_usage(&self, buffer: &CpuBuffer) -> BufferUsage {
    self.buffers[buffer.0].usage
  }

  fn load<T: Pod>(&self, buffer: &CpuBuffer, count: usize) -> Vec<T> {
    let len = count * std::mem::size_of::<T>();
    let data = &self.buffers[buffer.0].data;
    let mut bytes = vec![0u8; len];
    let available = data.len().min(len);
    bytes[..available].copy_from_slice(&data[..available]);
    bytemuck::pod_collect_to_vec(&bytes)
  }

  fn store<T: Pod>(&mut self, buffer: &CpuBuffer, values: &[T]) {
    self.write_buffer(buffer, 0, bytemuck::cast_slice(values));
  }

  fn element_count<T>(&self, buffer: &CpuBuffer) -> usize {
    self.buffers[buffer.0].size as usize / std::mem::size_of::<T>()
  }
}

impl Default for CpuBackend {
  fn default() -> Self {
    Self::new()
  }
}

impl Backend for CpuBackend {
  type Buffer = CpuBuffer;

  fn max_buffer_size(&self) -> u64 {
    self.max_buffer_size
  }

  fn create_buffer(&mut self, label: &str, size: u64, usage: BufferUsage) -> CpuBuffer {
    assert!(size <= self.max_buffer_size, "{label}: {size} bytes over device limit");
    let buffer = HostBuffer {
      label: label.to_owned(),
      size,
      usage,
      data: Vec::new(),
    };
    match self.free.pop() {
      Some(slot) => {
        self.buffers[slot] = buffer;
        CpuBuffer(slot)
      }
      None => {
        self.buffers.push(buffer);
        CpuBuffer(self.buffers.len() - 1)
      }
    }
  }

  fn release_buffer(&mut self, buffer: CpuBuffer) {
    let slot = &mut self.buffers[buffer.0];
    slot.size = 0;
    slot.data = Vec::new();
    self.free.push(buffer.0);
  }

  fn write_buffer(&mut self, buffer: &CpuBuffer, offset: u64, data: &[u8]) {
    let target = &mut self.buffers[buffer.0];
    let start = offset as usize;
    let end = start + data.len();
    assert!(end as u64 <= target.size, "write past the end of {}", target.label);
    if target.data.len() < end {
      target.data.resize(end, 0);
    }
    target.data[start..end].copy_from_slice(data);
  }

  fn read_buffer(&mut self, buffer: &CpuBuffer, offset: u64, len: u64) -> Result<Vec<u8>, SimError> {
    let source = &self.buffers[buffer.0];
    let (start, end) = (offset as usize, (offset + len) as usize);
    assert!(end as u64 <= source.size, "read past the end of {}", source.label);
    let mut bytes = vec![0u8; end - start];
    if start < source.data.len() {
      let available = source.data.len().min(end);
      bytes[..available - start].copy_from_slice(&source.data[start..available]);
    }
    Ok(bytes)
  }

  fn dispatch(&mut self, dispatch: Dispatch<'_, CpuBuffer>) {
    self.dispatches += 1;
    self.last_groups = Some(match &dispatch {
      Dispatch::NBody { groups, .. } | Dispatch::Scene { groups, .. } => *groups,
    });
    match dispatch {
      Dispatch::NBody {
        input,
        output,
        velocities,
        uniforms,
        groups,
      } => {
        let n = (groups[0] * crate::WORKGROUP_WIDTH).min(uniforms.live_count) as usize;
        if n == 0 {
          return;
        }
        let read = self.load::<[f32; 4]>(input, n);
        let mut write = self.load::<[f32; 4]>(output, n);
        let mut vel = self.load::<[f32; 4]>(velocities, n);
        kernels::nbody_step(&read, &mut write, &mut vel, &uniforms);
        self.store(output, &write);
        self.store(velocities, &vel);
      }
      Dispatch::Scene {
        particles,
        mesh,
        uniforms,
        groups,
      } => {
        let n = (groups[0] * crate::SCENE_WORKGROUP_WIDTH).min(uniforms.live_count) as usize;
        if n == 0 {
          return;
        }
        let mut data = self.load::<Particle>(particles, n);
        let mesh_data = mesh.map(|m| {
          let positions = self.load::<[f32; 4]>(m.positions, self.element_count::<[f32; 4]>(m.positions));
          let indices = self.load::<u32>(m.indices, self.element_count::<u32>(m.indices));
          (positions, indices)
        });
        let view = mesh_data.as_ref().map(|(positions, indices)| MeshView { positions, indices });
        kernels::advance_scene(&mut data, view, &uniforms);
        self.store(particles, &data);
      }
    }
  }

  fn memory_barrier(&mut self) {
    self.barriers += 1;
  }

  fn wait_idle(&mut self) {}

  fn draw(&mut self, draw: DrawCall<'_, CpuBuffer>) {
    let (layout, buffer) = match draw.source {
      DrawSource::Generic { particles, .. } => (Layout::Generic, *particles),
      DrawSource::NBody { positions, .. } => (Layout::NBody, *positions),
    };
    self.draws.push(RecordedDraw {
      layout,
      buffer,
      count: draw.count,
      uniforms: draw.uniforms,
    });
  }
}
