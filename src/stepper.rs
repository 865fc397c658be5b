use crate::backend::{Backend, Dispatch, MeshBinding};
use crate::ping_pong::PingPong;
use crate::scene::{Layout, NBodySettings};
use crate::store::ParticleStore;
use crate::{
  FrameUniforms, NBodyUniforms, MAX_WORKGROUPS_PER_DIMENSION, SCENE_WORKGROUP_WIDTH, TIME_SCALE, WORKGROUP_WIDTH,
};
use log::debug;
use std::time::{Duration, Instant};

/// Advances the N-body state one step at a time and owns the READ/WRITE
/// assignment of the two position generations.
pub struct NBodyStepper {
  roles: PingPong,
  profile: bool,
  last_compute: Option<Duration>,
}

impl NBodyStepper {
  /// With `profile` set, every step blocks until the device is idle and
  /// records how long the compute pass took.
  pub fn new(profile: bool) -> Self {
    Self {
      roles: PingPong::new(),
      profile,
      last_compute: None,
    }
  }

  pub fn roles(&self) -> &PingPong {
    &self.roles
  }

  pub fn last_compute_time(&self) -> Option<Duration> {
    self.last_compute
  }

  pub fn profiling(&self) -> bool {
    self.profile
  }

  pub fn set_profile(&mut self, profile: bool) {
    self.profile = profile;
    if !profile {
      self.last_compute = None;
    }
  }

  /// Reads the READ generation, writes the WRITE generation and the
  /// velocities, then swaps the roles. The swap is the last thing a step
  /// does and happens even when nothing is live.
  ///
  /// # Panics
  ///
  /// If the store was last committed for another layout, or its live count
  /// is not a multiple of [`WORKGROUP_WIDTH`].
  pub fn step<B: Backend>(
    &mut self,
    backend: &mut B,
    store: &ParticleStore<B>,
    time_delta: f32,
    settings: &NBodySettings,
  ) {
    assert_eq!(store.current_layout(), Layout::NBody, "n-body step on a generic commit");
    let live_count = store.live_count();
    assert_eq!(live_count % WORKGROUP_WIDTH, 0, "live count {live_count} not a workgroup multiple");

    let uniforms = NBodyUniforms {
      delta_t: time_delta * TIME_SCALE,
      live_count,
      acceleration_factor: settings.acceleration_factor,
      distance_threshold: settings.distance_threshold,
    };

    let groups = live_count / WORKGROUP_WIDTH;
    assert!(groups <= MAX_WORKGROUPS_PER_DIMENSION, "{groups} n-body workgroups over the device limit");

    let started = Instant::now();
    backend.dispatch(Dispatch::NBody {
      input: store.position_buffer(self.roles.read()),
      output: store.position_buffer(self.roles.write()),
      velocities: store.velocity_buffer(),
      uniforms,
      groups: [groups, 1, 1],
    });
    backend.memory_barrier();

    if self.profile {
      backend.wait_idle();
      let elapsed = started.elapsed();
      debug!("n-body step over {live_count} particles took {elapsed:?}");
      self.last_compute = Some(elapsed);
    }

    self.roles.swap();
  }
}

/// Runs the per-frame update of a generic-layout scene in place.
pub fn advance_scene<B: Backend>(
  backend: &mut B,
  store: &ParticleStore<B>,
  mesh: Option<MeshBinding<'_, B::Buffer>>,
  uniforms: FrameUniforms,
) {
  assert_eq!(store.current_layout(), Layout::Generic, "scene advance on an n-body commit");
  assert_eq!(uniforms.live_count, store.live_count(), "uniforms out of date with the last commit");
  let groups = store.live_count().div_ceil(SCENE_WORKGROUP_WIDTH);
  assert!(groups <= MAX_WORKGROUPS_PER_DIMENSION, "{groups} scene workgroups over the device limit");

  backend.dispatch(Dispatch::Scene {
    particles: store.particle_buffer(),
    mesh,
    uniforms,
    groups: [groups, 1, 1],
  });
  backend.memory_barrier();
}
