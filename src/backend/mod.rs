//! The draw/dispatch/upload surface the core drives. `GpuBackend` talks to
//! wgpu; `CpuBackend` runs the same passes on the host and records draws.

mod cpu;
mod gpu;

pub use cpu::{CpuBackend, CpuBuffer, RecordedDraw};
pub use gpu::GpuBackend;

use crate::{FrameUniforms, NBodyUniforms, SimError};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferUsage {
  /// Read and written by compute passes.
  Storage,
  /// Storage that the draw pass also reads as a vertex stream.
  StorageVertex,
  /// Vertex stream only.
  Vertex,
}

pub struct MeshBinding<'a, B> {
  pub positions: &'a B,
  pub indices: &'a B,
}

pub enum Dispatch<'a, B> {
  NBody {
    input: &'a B,
    output: &'a B,
    velocities: &'a B,
    uniforms: NBodyUniforms,
    groups: [u32; 3],
  },
  Scene {
    particles: &'a B,
    mesh: Option<MeshBinding<'a, B>>,
    uniforms: FrameUniforms,
    groups: [u32; 3],
  },
}

pub enum DrawSource<'a, B> {
  Generic {
    particles: &'a B,
    mesh: Option<MeshBinding<'a, B>>,
  },
  NBody {
    positions: &'a B,
    colors: &'a B,
  },
}

/// One instanced draw: `count` particles, each expanded to a camera-facing
/// sprite by the draw shader.
pub struct DrawCall<'a, B> {
  pub source: DrawSource<'a, B>,
  pub uniforms: FrameUniforms,
  pub count: u32,
}

pub trait Backend {
  type Buffer;

  /// Largest single buffer the device accepts.
  fn max_buffer_size(&self) -> u64;

  fn create_buffer(&mut self, label: &str, size: u64, usage: BufferUsage) -> Self::Buffer;

  /// Frees a buffer no longer referenced by the caller.
  fn release_buffer(&mut self, buffer: Self::Buffer);

  /// Copies `data` into `buffer` at `offset`. Completes before any work
  /// recorded afterwards reads the buffer.
  fn write_buffer(&mut self, buffer: &Self::Buffer, offset: u64, data: &[u8]);

  fn read_buffer(&mut self, buffer: &Self::Buffer, offset: u64, len: u64) -> Result<Vec<u8>, SimError>;

  fn dispatch(&mut self, dispatch: Dispatch<'_, Self::Buffer>);

  /// Makes compute writes visible to every later dispatch and draw.
  fn memory_barrier(&mut self);

  /// Blocks until all submitted work has finished. Only needed for timing.
  fn wait_idle(&mut self);

  fn draw(&mut self, draw: DrawCall<'_, Self::Buffer>);
}
