use crate::backend::{Backend, DrawCall, DrawSource, MeshBinding};
use crate::ping_pong::PingPong;
use crate::scene::{Layout, SceneConfig};
use crate::store::ParticleStore;
use crate::{FrameUniforms, MAX_ATTRACTORS, TIME_SCALE};

/// Time since startup and since the previous frame, in seconds.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameClock {
  pub time: f32,
  pub delta: f32,
}

/// Uniforms for the scene update and draw passes of one frame. Attractor
/// slots past the scene's active count stay zeroed.
pub fn frame_uniforms(scene: &SceneConfig, clock: FrameClock, live_count: u32, mesh_counts: (u32, u32)) -> FrameUniforms {
  let active = scene.attractors.active(scene.kind);
  let mut attractors = [[0.0; 4]; MAX_ATTRACTORS];
  for (slot, point) in attractors.iter_mut().zip(active) {
    *slot = [point[0], point[1], point[2], 1.0];
  }
  FrameUniforms {
    time: clock.time,
    delta_t: clock.delta * TIME_SCALE,
    particle_size: scene.particle_size,
    scene: scene.kind.shader_index(),
    attractor_force: scene.attractors.force,
    attractor_used: active.len() as u32,
    vertex_count: mesh_counts.0,
    index_count: mesh_counts.1,
    live_count,
    _pad: [0; 3],
    attractors,
  }
}

/// Issues the single particle draw of a frame from whichever buffer set is
/// current: the generic particle buffer, or the READ generation plus colors.
///
/// # Panics
///
/// When the scene's layout or the uniforms' live count disagree with the
/// store's last commit.
pub fn draw_particles<B: Backend>(
  backend: &mut B,
  store: &ParticleStore<B>,
  roles: &PingPong,
  scene: &SceneConfig,
  mesh: Option<MeshBinding<'_, B::Buffer>>,
  uniforms: FrameUniforms,
) {
  assert_eq!(store.current_layout(), scene.layout(), "draw with a stale layout commit");
  assert_eq!(uniforms.live_count, store.live_count(), "draw count differs from the last commit");

  let source = match store.current_layout() {
    Layout::Generic => DrawSource::Generic {
      particles: store.particle_buffer(),
      mesh,
    },
    Layout::NBody => DrawSource::NBody {
      positions: store.position_buffer(roles.read()),
      colors: store.color_buffer(),
    },
  };
  backend.draw(DrawCall {
    source,
    uniforms,
    count: store.live_count(),
  });
}
