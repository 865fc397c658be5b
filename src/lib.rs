pub mod backend;
pub mod camera;
pub mod config;
pub mod error;
pub mod initialize;
pub mod kernels;
pub mod mesh;
pub mod ping_pong;
pub mod render;
pub mod scene;
pub mod simulation;
pub mod state;
pub mod stepper;
pub mod store;

pub use error::SimError;

/// Particles processed per N-body compute workgroup. Must match
/// `@workgroup_size` in `shaders/nbody.wgsl`.
pub const WORKGROUP_WIDTH: u32 = 256;

/// Workgroup size of the generic scene update pass in `shaders/scene.wgsl`.
pub const SCENE_WORKGROUP_WIDTH: u32 = 256;

/// wgpu's `max_compute_workgroups_per_dimension` on every backend. Caps the
/// capacity at this many workgroups of either width.
pub const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65535;

/// Frame deltas (seconds) are multiplied by this before reaching a shader.
pub const TIME_SCALE: f32 = 0.1;

pub const MAX_ATTRACTORS: usize = 10;

/// One particle of the pulsating, attractor and surface-estimator scenes.
///
/// Matches the WGSL `Particle` struct: `vec3` members are padded to 16 bytes
/// so `lifetime` and `remaining` fill the tail of the preceding vector.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
  pub position: [f32; 4],
  pub velocity: [f32; 3],
  pub lifetime: f32,
  pub color: [f32; 3],
  pub remaining: f32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NBodyUniforms {
  pub delta_t: f32,
  pub live_count: u32,
  pub acceleration_factor: f32,
  pub distance_threshold: f32,
}

/// Per-frame parameters shared by the scene update pass and the draw pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
  pub time: f32,
  pub delta_t: f32,
  pub particle_size: f32,
  pub scene: u32,
  pub attractor_force: f32,
  pub attractor_used: u32,
  pub vertex_count: u32,
  pub index_count: u32,
  pub live_count: u32,
  pub _pad: [u32; 3],
  pub attractors: [[f32; 4]; MAX_ATTRACTORS],
}

impl Default for FrameUniforms {
  fn default() -> Self {
    bytemuck::Zeroable::zeroed()
  }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
  pub view: [[f32; 4]; 4],
  pub proj: [[f32; 4]; 4],
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gpu_struct_sizes_match_wgsl_layout() {
    assert_eq!(std::mem::size_of::<Particle>(), 48);
    assert_eq!(std::mem::size_of::<NBodyUniforms>(), 16);
    assert_eq!(std::mem::size_of::<FrameUniforms>(), 48 + 16 * MAX_ATTRACTORS);
    assert_eq!(std::mem::size_of::<CameraUniform>(), 128);
  }
}
