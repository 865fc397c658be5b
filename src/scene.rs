//! Scene selection and the per-frame parameter snapshot handed to every core
//! operation.

use crate::MAX_ATTRACTORS;
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SceneKind {
  Pulsating,
  SingleAttractor,
  MultiAttractor,
  NBody,
  SurfaceEstimator,
}

impl SceneKind {
  pub const ALL: [SceneKind; 5] = [
    SceneKind::Pulsating,
    SceneKind::SingleAttractor,
    SceneKind::MultiAttractor,
    SceneKind::NBody,
    SceneKind::SurfaceEstimator,
  ];

  pub fn name(self) -> &'static str {
    match self {
      SceneKind::Pulsating => "Sphere Pulsating",
      SceneKind::SingleAttractor => "Single Attractor",
      SceneKind::MultiAttractor => "Multi Attractor",
      SceneKind::NBody => "N-Body",
      SceneKind::SurfaceEstimator => "Particle Surface Estimator",
    }
  }

  pub fn layout(self) -> Layout {
    match self {
      SceneKind::NBody => Layout::NBody,
      _ => Layout::Generic,
    }
  }

  /// Index used by the shaders to pick the scene branch.
  pub fn shader_index(self) -> u32 {
    match self {
      SceneKind::Pulsating => 0,
      SceneKind::SingleAttractor => 1,
      SceneKind::MultiAttractor => 2,
      SceneKind::NBody => 3,
      SceneKind::SurfaceEstimator => 4,
    }
  }
}

impl fmt::Display for SceneKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// Which buffer set a scene reads and the renderer binds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Layout {
  /// One interleaved [`crate::Particle`] array.
  Generic,
  /// Two position generations, one velocity array and one color array.
  NBody,
}

pub const PARTICLE_SIZE_RANGE: (f32, f32) = (0.1, 2.0);
pub const FORCE_RANGE: (f32, f32) = (0.1, 25.0);
pub const ACCELERATION_RANGE: (f32, f32) = (0.1, 5.0);
pub const THRESHOLD_RANGE: (f32, f32) = (0.001, 0.1);

/// Smallest entry of the particle-count ladder.
pub const MIN_LADDER_COUNT: u32 = 256;

#[derive(Clone, Debug, PartialEq)]
pub struct AttractorSettings {
  pub points: [[f32; 3]; MAX_ATTRACTORS],
  used: usize,
  pub force: f32,
}

impl AttractorSettings {
  pub fn used(&self) -> usize {
    self.used
  }

  /// Clamps `used` into `1..=MAX_ATTRACTORS`, returning the stored value.
  pub fn set_used(&mut self, used: usize) -> usize {
    let clamped = used.clamp(1, MAX_ATTRACTORS);
    if clamped != used {
      log::warn!("attractor count {used} clamped to {clamped}");
    }
    self.used = clamped;
    clamped
  }

  pub fn set_force(&mut self, force: f32) {
    self.force = clamp_logged("attractor force", force, FORCE_RANGE);
  }

  /// Attractors the given scene feeds to its shaders.
  pub fn active(&self, kind: SceneKind) -> &[[f32; 3]] {
    match kind {
      SceneKind::SingleAttractor => &self.points[..1],
      SceneKind::MultiAttractor => &self.points[..self.used],
      _ => &[],
    }
  }
}

impl Default for AttractorSettings {
  fn default() -> Self {
    let mut points = [[0.0; 3]; MAX_ATTRACTORS];
    // spread on a ring around the spawn sphere
    for (i, point) in points.iter_mut().enumerate() {
      let theta = std::f32::consts::TAU * i as f32 / MAX_ATTRACTORS as f32;
      *point = [theta.cos() * 20.0, 0.0, theta.sin() * 20.0];
    }
    Self {
      points,
      used: 3,
      force: 9.8,
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NBodySettings {
  pub acceleration_factor: f32,
  pub distance_threshold: f32,
}

impl NBodySettings {
  pub fn set_acceleration_factor(&mut self, value: f32) {
    self.acceleration_factor = clamp_logged("acceleration factor", value, ACCELERATION_RANGE);
  }

  pub fn set_distance_threshold(&mut self, value: f32) {
    self.distance_threshold = clamp_logged("distance threshold", value, THRESHOLD_RANGE);
  }
}

impl Default for NBodySettings {
  fn default() -> Self {
    Self {
      acceleration_factor: 0.2,
      distance_threshold: 0.01,
    }
  }
}

/// Immutable-per-frame snapshot of the active scene and its parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneConfig {
  pub kind: SceneKind,
  /// Count asked for by the user; the committed count lives in the store.
  pub requested_count: u32,
  pub particle_size: f32,
  pub attractors: AttractorSettings,
  pub nbody: NBodySettings,
  /// Index into the configured model list.
  pub model: usize,
}

impl SceneConfig {
  pub fn layout(&self) -> Layout {
    self.kind.layout()
  }

  pub fn set_particle_size(&mut self, size: f32) {
    self.particle_size = clamp_logged("particle size", size, PARTICLE_SIZE_RANGE);
  }
}

impl Default for SceneConfig {
  fn default() -> Self {
    Self {
      kind: SceneKind::Pulsating,
      requested_count: 4096,
      particle_size: 0.5,
      attractors: AttractorSettings::default(),
      nbody: NBodySettings::default(),
      model: 0,
    }
  }
}

fn clamp_logged(name: &str, value: f32, (lo, hi): (f32, f32)) -> f32 {
  let clamped = value.clamp(lo, hi);
  if clamped != value {
    log::warn!("{name} {value} clamped to {clamped}");
  }
  clamped
}

/// Powers of two from [`MIN_LADDER_COUNT`] up to `capacity`.
pub fn count_ladder(capacity: u32) -> Vec<u32> {
  std::iter::successors(Some(MIN_LADDER_COUNT), |n| n.checked_mul(2))
    .take_while(|&n| n <= capacity)
    .collect()
}

/// Next ladder step above (`up`) or below `current`, saturating at the ends.
pub fn step_ladder(current: u32, capacity: u32, up: bool) -> u32 {
  let ladder = count_ladder(capacity);
  let next = if up {
    ladder.iter().copied().find(|&n| n > current)
  } else {
    ladder.iter().rev().copied().find(|&n| n < current)
  };
  next.unwrap_or(current)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ladder_spans_256_to_capacity() {
    let ladder = count_ladder(4_194_304);
    assert_eq!(ladder.len(), 15);
    assert_eq!(ladder[0], 256);
    assert_eq!(*ladder.last().unwrap(), 4_194_304);
  }

  #[test]
  fn ladder_steps_saturate() {
    assert_eq!(step_ladder(256, 1024, false), 256);
    assert_eq!(step_ladder(256, 1024, true), 512);
    assert_eq!(step_ladder(1024, 1024, true), 1024);
    assert_eq!(step_ladder(1000, 4096, true), 1024);
  }

  #[test]
  fn attractor_count_is_clamped() {
    let mut attractors = AttractorSettings::default();
    assert_eq!(attractors.set_used(11), MAX_ATTRACTORS);
    assert_eq!(attractors.set_used(0), 1);
    assert_eq!(attractors.set_used(3), 3);
    assert_eq!(attractors.active(SceneKind::MultiAttractor).len(), 3);
    assert_eq!(attractors.active(SceneKind::SingleAttractor).len(), 1);
    assert!(attractors.active(SceneKind::NBody).is_empty());
  }
}
