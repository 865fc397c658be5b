use crate::backend::{Backend, BufferUsage};
use crate::initialize::hue_color;
use crate::ping_pong::Generation;
use crate::scene::Layout;
use crate::{Particle, SimError, WORKGROUP_WIDTH};
use log::{info, warn};

const PARTICLE_BYTES: u64 = std::mem::size_of::<Particle>() as u64;
const VEC4_BYTES: u64 = std::mem::size_of::<[f32; 4]>() as u64;

/// Host-side particle state, sized to capacity once and never reallocated.
/// Only the live prefix of each array is meaningful.
pub struct CpuArrays {
  pub particles: Vec<Particle>,
  /// The two N-body generations, index-aligned with `velocities`.
  pub positions: [Vec<[f32; 4]>; 2],
  pub velocities: Vec<[f32; 4]>,
  pub colors: Vec<[f32; 4]>,
}

struct DeviceBuffers<T> {
  particles: T,
  positions: [T; 2],
  velocities: T,
  colors: T,
}

/// Outcome of a [`ParticleStore::commit`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommitReport {
  pub requested: u32,
  pub live_count: u32,
  pub layout: Layout,
  /// The request exceeded capacity.
  pub clamped: bool,
  /// The count was rounded down to a workgroup multiple.
  pub rounded: bool,
  pub bytes_uploaded: u64,
}

pub struct ParticleStore<B: Backend> {
  capacity: u32,
  live_count: u32,
  layout: Layout,
  cpu: CpuArrays,
  gpu: DeviceBuffers<B::Buffer>,
}

impl<B: Backend> ParticleStore<B> {
  /// Reserves host and device storage for `capacity` particles in both
  /// layouts and uploads the N-body colors, which never change afterwards.
  pub fn allocate(backend: &mut B, capacity: u32) -> Result<Self, SimError> {
    if capacity == 0 {
      return Err(SimError::InvalidConfig("particle capacity must be non-zero".into()));
    }
    let cap = u64::from(capacity);
    let limit = backend.max_buffer_size();
    for (label, requested) in [
      ("particle buffer", cap * PARTICLE_BYTES),
      ("position buffer", cap * VEC4_BYTES),
    ] {
      if requested > limit {
        return Err(SimError::ResourceLimit {
          label: label.to_owned(),
          requested,
          limit,
        });
      }
    }

    let len = capacity as usize;
    let cpu = CpuArrays {
      particles: bytemuck::zeroed_vec(len),
      positions: [bytemuck::zeroed_vec(len), bytemuck::zeroed_vec(len)],
      velocities: bytemuck::zeroed_vec(len),
      colors: (0..len).map(hue_color).collect(),
    };

    let gpu = DeviceBuffers {
      particles: backend.create_buffer("Particle Buffer", cap * PARTICLE_BYTES, BufferUsage::Storage),
      positions: [
        backend.create_buffer("Position Buffer 0", cap * VEC4_BYTES, BufferUsage::StorageVertex),
        backend.create_buffer("Position Buffer 1", cap * VEC4_BYTES, BufferUsage::StorageVertex),
      ],
      velocities: backend.create_buffer("Velocity Buffer", cap * VEC4_BYTES, BufferUsage::Storage),
      colors: backend.create_buffer("Color Buffer", cap * VEC4_BYTES, BufferUsage::Vertex),
    };
    backend.write_buffer(&gpu.colors, 0, bytemuck::cast_slice(&cpu.colors));

    info!(
      "allocated {capacity} particles: {} bytes generic, {} bytes n-body",
      cap * PARTICLE_BYTES,
      cap * VEC4_BYTES * 4
    );

    Ok(Self {
      capacity,
      live_count: 0,
      layout: Layout::Generic,
      cpu,
      gpu,
    })
  }

  /// Live count `commit` would settle on, with the clamp and rounding flags.
  pub fn resolve_live_count(&self, requested: u32, layout: Layout) -> (u32, bool, bool) {
    let clamped = requested > self.capacity;
    let mut live = requested.min(self.capacity);
    let mut rounded = false;
    if layout == Layout::NBody && live % WORKGROUP_WIDTH != 0 {
      live -= live % WORKGROUP_WIDTH;
      rounded = true;
    }
    (live, clamped, rounded)
  }

  /// Sets the live count and re-uploads the live prefix of the layout's
  /// arrays. The other layout's device buffers are left alone.
  pub fn commit(&mut self, backend: &mut B, requested: u32, layout: Layout) -> CommitReport {
    let (live_count, clamped, rounded) = self.resolve_live_count(requested, layout);
    if clamped {
      warn!("requested {requested} particles, clamped to capacity {}", self.capacity);
    }
    if rounded {
      warn!("n-body particle count rounded down to {live_count} (workgroup width {WORKGROUP_WIDTH})");
    }

    let n = live_count as usize;
    let bytes_uploaded = match layout {
      Layout::Generic => {
        let bytes: &[u8] = bytemuck::cast_slice(&self.cpu.particles[..n]);
        backend.write_buffer(&self.gpu.particles, 0, bytes);
        bytes.len() as u64
      }
      Layout::NBody => {
        let mut total = 0;
        for (buffer, data) in [
          (&self.gpu.positions[0], &self.cpu.positions[0]),
          (&self.gpu.positions[1], &self.cpu.positions[1]),
          (&self.gpu.velocities, &self.cpu.velocities),
        ] {
          let bytes: &[u8] = bytemuck::cast_slice(&data[..n]);
          backend.write_buffer(buffer, 0, bytes);
          total += bytes.len() as u64;
        }
        total
      }
    };

    self.live_count = live_count;
    self.layout = layout;
    info!("particles committed: {live_count} live, {bytes_uploaded} bytes uploaded ({layout:?})");

    CommitReport {
      requested,
      live_count,
      layout,
      clamped,
      rounded,
      bytes_uploaded,
    }
  }

  pub fn capacity(&self) -> u32 {
    self.capacity
  }

  pub fn live_count(&self) -> u32 {
    self.live_count
  }

  /// Layout of the last commit; decides which buffers the renderer binds.
  pub fn current_layout(&self) -> Layout {
    self.layout
  }

  pub fn cpu(&self) -> &CpuArrays {
    &self.cpu
  }

  pub fn cpu_mut(&mut self) -> &mut CpuArrays {
    &mut self.cpu
  }

  pub fn particle_buffer(&self) -> &B::Buffer {
    &self.gpu.particles
  }

  pub fn position_buffer(&self, generation: Generation) -> &B::Buffer {
    &self.gpu.positions[generation.index()]
  }

  pub fn velocity_buffer(&self) -> &B::Buffer {
    &self.gpu.velocities
  }

  pub fn color_buffer(&self) -> &B::Buffer {
    &self.gpu.colors
  }

  pub fn read_back_particles(&self, backend: &mut B) -> Result<Vec<Particle>, SimError> {
    let len = u64::from(self.live_count) * PARTICLE_BYTES;
    let bytes = backend.read_buffer(&self.gpu.particles, 0, len)?;
    Ok(bytemuck::pod_collect_to_vec(&bytes))
  }

  pub fn read_back_positions(&self, backend: &mut B, generation: Generation) -> Result<Vec<[f32; 4]>, SimError> {
    self.read_back_vec4(backend, &self.gpu.positions[generation.index()])
  }

  pub fn read_back_velocities(&self, backend: &mut B) -> Result<Vec<[f32; 4]>, SimError> {
    self.read_back_vec4(backend, &self.gpu.velocities)
  }

  fn read_back_vec4(&self, backend: &mut B, buffer: &B::Buffer) -> Result<Vec<[f32; 4]>, SimError> {
    let len = u64::from(self.live_count) * VEC4_BYTES;
    let bytes = backend.read_buffer(buffer, 0, len)?;
    Ok(bytemuck::pod_collect_to_vec(&bytes))
  }
}
