use particle_sandbox::backend::{Backend, BufferUsage, CpuBackend};
use particle_sandbox::config::SimConfig;
use particle_sandbox::ping_pong::Generation;
use particle_sandbox::scene::{Layout, SceneKind};
use particle_sandbox::simulation::Simulation;
use particle_sandbox::store::ParticleStore;
use particle_sandbox::{SimError, WORKGROUP_WIDTH};

fn small_config(kind: SceneKind, capacity: u32) -> SimConfig {
  SimConfig {
    capacity,
    seed: Some(42),
    models: Vec::new(),
    ..SimConfig::default()
  }
  .with_scene(kind)
}

#[test]
fn test_default_capacity_starts_pulsating_at_origin() {
  let config = SimConfig {
    seed: Some(1),
    ..SimConfig::default()
  };
  let mut sim = Simulation::new(CpuBackend::new(), &config).unwrap();
  assert_eq!(sim.store().capacity(), 4_194_304);
  assert_eq!(sim.store().live_count(), 4096);
  assert_eq!(sim.store().current_layout(), Layout::Generic);

  let (backend, store) = sim.backend_and_store();
  let particles = store.read_back_particles(backend).unwrap();
  assert_eq!(particles.len(), 4096);
  for (i, p) in particles.iter().enumerate() {
    assert_eq!(&p.position[..3], &[0.0, 0.0, 0.0], "particle {i} should start at the origin");
    assert!((0.0..5.0).contains(&p.lifetime), "lifetime[{i}] = {}", p.lifetime);
    assert_eq!(p.remaining, p.lifetime, "remaining[{i}] should equal lifetime");
  }
}

#[test]
fn test_commit_clamps_to_capacity() {
  let mut sim = Simulation::new(CpuBackend::new(), &small_config(SceneKind::Pulsating, 1024)).unwrap();
  let report = sim.set_particle_count(5000);
  assert!(report.clamped);
  assert!(!report.rounded);
  assert_eq!(report.live_count, 1024);
  assert_eq!(sim.store().live_count(), 1024);
  assert_eq!(sim.frame_uniforms().live_count, 1024);
}

#[test]
fn test_nbody_commit_rounds_down_to_workgroup_multiple() {
  let mut sim = Simulation::new(CpuBackend::new(), &small_config(SceneKind::NBody, 2048)).unwrap();
  let report = sim.set_particle_count(1000);
  assert!(report.rounded);
  assert_eq!(report.live_count, 768);
  assert_eq!(report.live_count % WORKGROUP_WIDTH, 0);

  // the generic layout keeps odd counts
  let report = sim.set_scene(SceneKind::Pulsating);
  assert_eq!(report.live_count, 1000);
  assert!(!report.rounded);
}

#[test]
fn test_commit_uploads_only_the_active_layout() {
  let mut sim = Simulation::new(CpuBackend::new(), &small_config(SceneKind::Pulsating, 1024)).unwrap();
  let generic = sim.set_particle_count(512);
  assert_eq!(generic.bytes_uploaded, 512 * 48);

  let nbody = sim.set_scene(SceneKind::NBody);
  assert_eq!(nbody.layout, Layout::NBody);
  // two position generations plus velocities, colors stay put
  assert_eq!(nbody.bytes_uploaded, 3 * 512 * 16);
}

#[test]
fn test_commit_then_read_back_matches_host_arrays() {
  let mut sim = Simulation::new(CpuBackend::new(), &small_config(SceneKind::NBody, 1024)).unwrap();
  sim.set_particle_count(512);
  let (backend, store) = sim.backend_and_store();
  let a = store.read_back_positions(backend, Generation::A).unwrap();
  let b = store.read_back_positions(backend, Generation::B).unwrap();
  assert_eq!(a.len(), 512);
  assert_eq!(a, store.cpu().positions[0][..512].to_vec());
  assert_eq!(a, b);
}

#[test]
fn test_allocation_over_device_limit_is_a_resource_error() {
  let mut backend = CpuBackend::with_max_buffer_size(1024);
  let err = ParticleStore::allocate(&mut backend, 256).err().unwrap();
  match err {
    SimError::ResourceLimit { requested, limit, .. } => {
      assert_eq!(limit, 1024);
      assert_eq!(requested, 256 * 48);
    }
    other => panic!("expected a resource limit error, got {other}"),
  }
  assert_eq!(backend.max_buffer_size(), 1024);
}

#[test]
fn test_invalid_capacity_is_rejected() {
  let config = small_config(SceneKind::Pulsating, 1000);
  assert!(matches!(
    Simulation::new(CpuBackend::new(), &config),
    Err(SimError::InvalidConfig(_))
  ));
}

#[test]
fn test_count_ladder_stays_within_capacity() {
  let mut sim = Simulation::new(CpuBackend::new(), &small_config(SceneKind::Pulsating, 1024)).unwrap();
  sim.set_particle_count(256);
  for _ in 0..4 {
    sim.step_particle_count(true);
  }
  assert_eq!(sim.store().live_count(), 1024);
  sim.step_particle_count(false);
  assert_eq!(sim.store().live_count(), 512);
}

#[test]
fn test_position_generations_are_drawable_storage() {
  let mut backend = CpuBackend::new();
  let store = ParticleStore::allocate(&mut backend, 512).unwrap();
  for generation in [Generation::A, Generation::B] {
    let buffer = store.position_buffer(generation);
    assert_eq!(backend.buffer_usage(buffer), BufferUsage::StorageVertex);
  }
  assert_eq!(backend.buffer_label(store.color_buffer()), "Color Buffer");
  assert_eq!(backend.buffer_usage(store.velocity_buffer()), BufferUsage::Storage);
  assert_eq!(store.live_count(), 0);
}
