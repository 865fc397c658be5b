use particle_sandbox::backend::CpuBackend;
use particle_sandbox::config::SimConfig;
use particle_sandbox::initialize::{ATTRACTOR_SPAWN_RADIUS, SURFACE_SPAWN_RADIUS};
use particle_sandbox::scene::{Layout, SceneKind};
use particle_sandbox::simulation::Simulation;
use particle_sandbox::{Particle, MAX_ATTRACTORS, MAX_WORKGROUPS_PER_DIMENSION, SCENE_WORKGROUP_WIDTH, TIME_SCALE};
use std::path::PathBuf;

fn models_dir() -> PathBuf {
  PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets").join("models")
}

fn sim_for(kind: SceneKind, count: u32, models: Vec<PathBuf>) -> Simulation<CpuBackend> {
  let mut config = SimConfig {
    capacity: 4096,
    seed: Some(3),
    models,
    ..SimConfig::default()
  }
  .with_scene(kind);
  config.scene.requested_count = count;
  Simulation::new(CpuBackend::new(), &config).unwrap()
}

fn particles(sim: &mut Simulation<CpuBackend>) -> Vec<Particle> {
  let (backend, store) = sim.backend_and_store();
  store.read_back_particles(backend).unwrap()
}

fn radius(p: &Particle) -> f32 {
  (p.position[0] * p.position[0] + p.position[1] * p.position[1] + p.position[2] * p.position[2]).sqrt()
}

#[test]
fn test_attractor_particles_spawn_inside_their_sphere() {
  let mut sim = sim_for(SceneKind::SingleAttractor, 2048, Vec::new());
  let spawned = particles(&mut sim);
  assert_eq!(spawned.len(), 2048);
  for (i, p) in spawned.iter().enumerate() {
    assert!(radius(p) <= ATTRACTOR_SPAWN_RADIUS * 1.0001, "particle {i} at {}", radius(p));
    assert!(p.velocity.iter().all(|v| v.abs() <= 10.0));
    assert!((0.0..5.0).contains(&p.lifetime));
  }
}

#[test]
fn test_surface_particles_spawn_inside_their_sphere() {
  let mut sim = sim_for(SceneKind::SurfaceEstimator, 1000, Vec::new());
  let spawned = particles(&mut sim);
  assert_eq!(spawned.len(), 1000);
  assert!(spawned.iter().all(|p| radius(p) <= SURFACE_SPAWN_RADIUS * 1.0001));
}

#[test]
fn test_multi_attractor_draw_carries_active_attractors() {
  let mut sim = sim_for(SceneKind::MultiAttractor, 1024, Vec::new());
  assert_eq!(sim.scene().attractors.used(), 3);
  sim.update(1.0 / 60.0);
  sim.render();

  let draw = sim.backend().draws().last().cloned().unwrap();
  assert_eq!(draw.layout, Layout::Generic);
  assert_eq!(draw.count, 1024);
  assert_eq!(draw.uniforms.attractor_used, 3);
  assert!((draw.uniforms.attractor_force - 9.8).abs() < 1e-6);
  assert!(draw.uniforms.attractors[3..].iter().all(|a| *a == [0.0; 4]));

  assert_eq!(sim.set_attractor_count(11), MAX_ATTRACTORS);
  assert_eq!(sim.frame_uniforms().attractor_used, MAX_ATTRACTORS as u32);
  assert_eq!(sim.set_attractor_count(0), 1);
}

#[test]
fn test_single_attractor_uses_exactly_one_point() {
  let mut sim = sim_for(SceneKind::SingleAttractor, 256, Vec::new());
  sim.set_attractor_count(5);
  assert_eq!(sim.frame_uniforms().attractor_used, 1);
  sim.set_scene(SceneKind::Pulsating);
  assert_eq!(sim.frame_uniforms().attractor_used, 0);
}

#[test]
fn test_pulsating_update_counts_lifetimes_down() {
  let mut sim = sim_for(SceneKind::Pulsating, 512, Vec::new());
  let before = particles(&mut sim);
  sim.update(1.0);
  let after = particles(&mut sim);
  let dt = TIME_SCALE;
  for (b, a) in before.iter().zip(&after) {
    assert!(a.remaining >= 0.0 && a.remaining <= a.lifetime);
    if b.remaining > dt {
      assert!((a.remaining - (b.remaining - dt)).abs() < 1e-5);
    }
  }
}

#[test]
fn test_surface_estimator_pulls_toward_mesh_vertices() {
  let models = vec![models_dir().join("octahedron.obj")];
  let mut sim = sim_for(SceneKind::SurfaceEstimator, 512, models);
  assert!(sim.has_mesh());
  let vertices = [
    [10.0, 0.0, 0.0],
    [-10.0, 0.0, 0.0],
    [0.0, 10.0, 0.0],
    [0.0, -10.0, 0.0],
    [0.0, 0.0, 10.0],
    [0.0, 0.0, -10.0],
  ];
  let nearest = |p: &Particle| {
    vertices
      .iter()
      .map(|v: &[f32; 3]| {
        let d = [v[0] - p.position[0], v[1] - p.position[1], v[2] - p.position[2]];
        (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
      })
      .fold(f32::MAX, f32::min)
  };

  let before = particles(&mut sim);
  sim.update(1.0);
  let after = particles(&mut sim);
  for (b, a) in before.iter().zip(&after) {
    assert!(nearest(a) <= nearest(b) + 1e-4);
  }
}

#[test]
fn test_failed_model_load_keeps_previous_mesh() {
  let models = vec![models_dir().join("cube.obj"), models_dir().join("missing.obj")];
  let mut sim = sim_for(SceneKind::SurfaceEstimator, 256, models);
  assert!(sim.has_mesh());
  let counts = (sim.frame_uniforms().vertex_count, sim.frame_uniforms().index_count);
  assert_eq!(counts, (8, 36));

  assert!(sim.next_model().is_err());
  assert!(sim.has_mesh());
  assert_eq!(sim.scene().model, 0);
  assert_eq!(
    (sim.frame_uniforms().vertex_count, sim.frame_uniforms().index_count),
    counts
  );
}

#[test]
fn test_scene_switch_recommits_the_new_layout() {
  let mut sim = sim_for(SceneKind::Pulsating, 1024, Vec::new());
  for kind in SceneKind::ALL {
    let report = sim.set_scene(kind);
    assert_eq!(report.layout, kind.layout());
    assert_eq!(sim.store().current_layout(), kind.layout());
    sim.update(1.0 / 60.0);
    sim.render();
    assert_eq!(sim.backend().draws().last().unwrap().layout, kind.layout());
  }
}

#[test]
fn test_same_seed_spawns_same_particles() {
  let mut a = sim_for(SceneKind::MultiAttractor, 512, Vec::new());
  let mut b = sim_for(SceneKind::MultiAttractor, 512, Vec::new());
  assert_eq!(particles(&mut a), particles(&mut b));
}

#[test]
fn test_parameters_are_clamped_to_their_ranges() {
  let mut sim = sim_for(SceneKind::NBody, 256, Vec::new());
  sim.set_particle_size(100.0);
  sim.set_attractor_force(-1.0);
  sim.set_acceleration_factor(50.0);
  sim.set_distance_threshold(0.0);
  let scene = sim.scene();
  assert_eq!(scene.particle_size, 2.0);
  assert_eq!(scene.attractors.force, 0.1);
  assert_eq!(scene.nbody.acceleration_factor, 5.0);
  assert_eq!(scene.nbody.distance_threshold, 0.001);
}

#[test]
fn test_full_capacity_scene_pass_fits_one_dispatch_dimension() {
  let config = SimConfig {
    seed: Some(5),
    models: Vec::new(),
    ..SimConfig::default()
  };
  let mut sim = Simulation::new(CpuBackend::new(), &config).unwrap();
  let report = sim.set_particle_count(4_194_304);
  assert_eq!(report.live_count, 4_194_304);

  sim.update(1.0 / 60.0);
  let groups = sim.backend().last_dispatch_groups().unwrap();
  assert_eq!(groups, [4_194_304 / SCENE_WORKGROUP_WIDTH, 1, 1]);
  assert!(groups[0] <= MAX_WORKGROUPS_PER_DIMENSION, "{} workgroups", groups[0]);
}

#[test]
fn test_attractor_points_only_move_in_range() {
  let mut sim = sim_for(SceneKind::SingleAttractor, 256, Vec::new());
  assert!(sim.set_attractor_point(0, [1.0, 2.0, 3.0]));
  assert_eq!(sim.frame_uniforms().attractors[0], [1.0, 2.0, 3.0, 1.0]);

  let before = sim.scene().attractors.points;
  assert!(!sim.set_attractor_point(MAX_ATTRACTORS, [9.0, 9.0, 9.0]));
  assert_eq!(sim.scene().attractors.points, before);
}

#[test]
fn test_model_switches_release_replaced_mesh_buffers() {
  let models = vec![models_dir().join("octahedron.obj"), models_dir().join("cube.obj")];
  let mut sim = sim_for(SceneKind::SurfaceEstimator, 256, models);
  let buffers = sim.backend().live_buffer_count();
  for _ in 0..6 {
    sim.next_model().unwrap();
  }
  assert_eq!(sim.backend().live_buffer_count(), buffers);
  assert_eq!(sim.scene().model, 0);
  assert_eq!(sim.frame_uniforms().vertex_count, 6);
}
