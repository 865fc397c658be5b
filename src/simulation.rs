//! The particle sandbox core. Every user control (scene selector, count
//! ladder, sliders, reset key) lands on one of the methods here.

use crate::backend::{Backend, BufferUsage, MeshBinding};
use crate::config::SimConfig;
use crate::initialize::initialize;
use crate::mesh::{load_obj, Mesh};
use crate::render::{draw_particles, frame_uniforms, FrameClock};
use crate::scene::{step_ladder, Layout, SceneConfig, SceneKind};
use crate::stepper::{advance_scene, NBodyStepper};
use crate::store::{CommitReport, ParticleStore};
use crate::{FrameUniforms, SimError, MAX_ATTRACTORS};
use log::{error, info, warn};
use rand::{rngs::SmallRng, SeedableRng};
use std::path::PathBuf;

struct MeshBuffers<T> {
  positions: T,
  indices: T,
  vertex_count: u32,
  index_count: u32,
}

pub struct Simulation<B: Backend> {
  backend: B,
  store: ParticleStore<B>,
  stepper: NBodyStepper,
  scene: SceneConfig,
  rng: SmallRng,
  models: Vec<PathBuf>,
  mesh: Option<MeshBuffers<B::Buffer>>,
  clock: FrameClock,
}

impl<B: Backend> Simulation<B> {
  /// Allocates the store at full capacity, seeds the configured scene and
  /// loads the first model. A model that fails to load is logged and skipped.
  pub fn new(mut backend: B, config: &SimConfig) -> Result<Self, SimError> {
    config.validate()?;
    let store = ParticleStore::allocate(&mut backend, config.capacity)?;
    let rng = match config.seed {
      Some(seed) => SmallRng::seed_from_u64(seed),
      None => SmallRng::from_entropy(),
    };

    let mut sim = Self {
      backend,
      store,
      stepper: NBodyStepper::new(config.profile),
      scene: config.scene.clone(),
      rng,
      models: config.models.clone(),
      mesh: None,
      clock: FrameClock::default(),
    };
    sim.reset();
    if !sim.models.is_empty() && sim.select_model(sim.scene.model).is_err() {
      warn!("starting without a surface mesh");
    }
    Ok(sim)
  }

  /// Re-initializes the live particles of the current scene and commits them.
  pub fn reset(&mut self) -> CommitReport {
    let layout = self.scene.layout();
    let (live, _, _) = self.store.resolve_live_count(self.scene.requested_count, layout);
    initialize(&self.scene, live as usize, &mut self.rng, self.store.cpu_mut());
    self.store.commit(&mut self.backend, self.scene.requested_count, layout)
  }

  pub fn set_scene(&mut self, kind: SceneKind) -> CommitReport {
    info!("scene: {kind}");
    self.scene.kind = kind;
    self.reset()
  }

  pub fn set_particle_count(&mut self, requested: u32) -> CommitReport {
    self.scene.requested_count = requested;
    self.reset()
  }

  /// Moves one step along the power-of-two count ladder.
  pub fn step_particle_count(&mut self, up: bool) -> CommitReport {
    let next = step_ladder(self.store.live_count(), self.store.capacity(), up);
    self.set_particle_count(next)
  }

  pub fn set_particle_size(&mut self, size: f32) {
    self.scene.set_particle_size(size);
  }

  /// Returns the attractor count actually stored after clamping.
  pub fn set_attractor_count(&mut self, used: usize) -> usize {
    self.scene.attractors.set_used(used)
  }

  /// Moves attractor `index`. Returns false, leaving every point in place,
  /// when there is no such slot.
  pub fn set_attractor_point(&mut self, index: usize, point: [f32; 3]) -> bool {
    match self.scene.attractors.points.get_mut(index) {
      Some(slot) => {
        *slot = point;
        true
      }
      None => {
        warn!("attractor {index} out of range, only {MAX_ATTRACTORS} slots");
        false
      }
    }
  }

  pub fn set_attractor_force(&mut self, force: f32) {
    self.scene.attractors.set_force(force);
  }

  pub fn set_acceleration_factor(&mut self, value: f32) {
    self.scene.nbody.set_acceleration_factor(value);
  }

  pub fn set_distance_threshold(&mut self, value: f32) {
    self.scene.nbody.set_distance_threshold(value);
  }

  /// Loads model `index` into the surface-estimator mesh buffers. On failure
  /// the previous mesh stays bound and the error is logged and returned.
  pub fn select_model(&mut self, index: usize) -> Result<(), SimError> {
    let result = self.load_model(index);
    match &result {
      Ok(()) => self.scene.model = index,
      Err(e) => error!("{e}; keeping the previous mesh"),
    }
    result
  }

  pub fn next_model(&mut self) -> Result<(), SimError> {
    if self.models.is_empty() {
      return Err(SimError::InvalidConfig("no models configured".into()));
    }
    self.select_model((self.scene.model + 1) % self.models.len())
  }

  fn load_model(&mut self, index: usize) -> Result<(), SimError> {
    let path = self
      .models
      .get(index)
      .cloned()
      .ok_or_else(|| SimError::InvalidConfig(format!("no model at index {index}")))?;
    let mesh = load_obj(&path)?;
    self.upload_mesh(&mesh)?;
    info!(
      "model {}: {} vertices, {} indices, {} bytes",
      path.display(),
      mesh.vertex_count(),
      mesh.index_count(),
      mesh.byte_size()
    );
    Ok(())
  }

  /// Replaces the mesh buffers with `mesh`.
  pub fn upload_mesh(&mut self, mesh: &Mesh) -> Result<(), SimError> {
    let position_bytes: &[u8] = bytemuck::cast_slice(&mesh.positions);
    let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);
    let limit = self.backend.max_buffer_size();
    for (label, bytes) in [("mesh positions", position_bytes), ("mesh indices", index_bytes)] {
      if bytes.len() as u64 > limit {
        return Err(SimError::ResourceLimit {
          label: label.to_owned(),
          requested: bytes.len() as u64,
          limit,
        });
      }
    }

    let positions = self
      .backend
      .create_buffer("Mesh Position Buffer", position_bytes.len() as u64, BufferUsage::Storage);
    let indices = self
      .backend
      .create_buffer("Mesh Index Buffer", index_bytes.len() as u64, BufferUsage::Storage);
    self.backend.write_buffer(&positions, 0, position_bytes);
    self.backend.write_buffer(&indices, 0, index_bytes);
    let previous = self.mesh.replace(MeshBuffers {
      positions,
      indices,
      vertex_count: mesh.vertex_count(),
      index_count: mesh.index_count(),
    });
    if let Some(old) = previous {
      self.backend.release_buffer(old.positions);
      self.backend.release_buffer(old.indices);
    }
    Ok(())
  }

  /// Advances the clock and the active scene by `delta` seconds.
  pub fn update(&mut self, delta: f32) {
    self.clock.time += delta;
    self.clock.delta = delta;

    match self.scene.layout() {
      Layout::NBody => {
        self
          .stepper
          .step(&mut self.backend, &self.store, delta, &self.scene.nbody);
      }
      Layout::Generic => {
        let uniforms = self.frame_uniforms();
        let mesh = self.mesh.as_ref().map(|m| MeshBinding {
          positions: &m.positions,
          indices: &m.indices,
        });
        advance_scene(&mut self.backend, &self.store, mesh, uniforms);
      }
    }
  }

  /// Draws the current particle state.
  pub fn render(&mut self) {
    let uniforms = self.frame_uniforms();
    let mesh = self.mesh.as_ref().map(|m| MeshBinding {
      positions: &m.positions,
      indices: &m.indices,
    });
    draw_particles(
      &mut self.backend,
      &self.store,
      self.stepper.roles(),
      &self.scene,
      mesh,
      uniforms,
    );
  }

  pub fn frame_uniforms(&self) -> FrameUniforms {
    let counts = self
      .mesh
      .as_ref()
      .map_or((0, 0), |m| (m.vertex_count, m.index_count));
    frame_uniforms(&self.scene, self.clock, self.store.live_count(), counts)
  }

  pub fn scene(&self) -> &SceneConfig {
    &self.scene
  }

  pub fn store(&self) -> &ParticleStore<B> {
    &self.store
  }

  pub fn stepper(&self) -> &NBodyStepper {
    &self.stepper
  }

  pub fn stepper_mut(&mut self) -> &mut NBodyStepper {
    &mut self.stepper
  }

  pub fn backend(&self) -> &B {
    &self.backend
  }

  pub fn backend_mut(&mut self) -> &mut B {
    &mut self.backend
  }

  /// Mutable backend together with the store, for read-back.
  pub fn backend_and_store(&mut self) -> (&mut B, &ParticleStore<B>) {
    (&mut self.backend, &self.store)
  }

  pub fn has_mesh(&self) -> bool {
    self.mesh.is_some()
  }

  pub fn clock(&self) -> FrameClock {
    self.clock
  }
}
