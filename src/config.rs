use crate::scene::{SceneConfig, SceneKind};
use crate::{SimError, MAX_WORKGROUPS_PER_DIMENSION, WORKGROUP_WIDTH};
use std::path::PathBuf;

pub struct SimConfig {
  /// Particles reserved at startup; fixed for the process lifetime.
  pub capacity: u32,
  pub scene: SceneConfig,
  /// `None` seeds from OS entropy.
  pub seed: Option<u64>,
  pub models: Vec<PathBuf>,
  /// Block on the device after each compute step to time it.
  pub profile: bool,
}

impl Default for SimConfig {
  fn default() -> Self {
    Self {
      capacity: 4_194_304,
      scene: SceneConfig::default(),
      seed: None,
      models: default_models(),
      profile: false,
    }
  }
}

impl SimConfig {
  pub fn with_scene(mut self, kind: SceneKind) -> Self {
    self.scene.kind = kind;
    self
  }

  pub fn validate(&self) -> Result<(), SimError> {
    if self.capacity == 0 || self.capacity % WORKGROUP_WIDTH != 0 {
      return Err(SimError::InvalidConfig(format!(
        "capacity {} must be a non-zero multiple of {WORKGROUP_WIDTH}",
        self.capacity
      )));
    }
    let max_capacity = u64::from(MAX_WORKGROUPS_PER_DIMENSION) * u64::from(WORKGROUP_WIDTH);
    if u64::from(self.capacity) > max_capacity {
      return Err(SimError::InvalidConfig(format!(
        "capacity {} needs more than {MAX_WORKGROUPS_PER_DIMENSION} workgroups (at most {max_capacity})",
        self.capacity
      )));
    }
    let nbody = &self.scene.nbody;
    if !(nbody.distance_threshold > 0.0) || !nbody.acceleration_factor.is_finite() {
      return Err(SimError::InvalidConfig(
        "n-body distance threshold must be positive and acceleration finite".into(),
      ));
    }
    Ok(())
  }
}

fn default_models() -> Vec<PathBuf> {
  let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets").join("models");
  ["octahedron.obj", "cube.obj"].iter().map(|name| dir.join(name)).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_valid() {
    let config = SimConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.capacity, 4_194_304);
    assert_eq!(config.scene.requested_count, 4096);
  }

  #[test]
  fn capacity_must_be_a_workgroup_multiple() {
    let config = SimConfig {
      capacity: 1000,
      ..SimConfig::default()
    };
    assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
  }

  #[test]
  fn capacity_must_fit_one_dispatch_dimension() {
    let config = SimConfig {
      capacity: 65536 * WORKGROUP_WIDTH,
      ..SimConfig::default()
    };
    assert!(matches!(config.validate(), Err(SimError::InvalidConfig(_))));
    let config = SimConfig {
      capacity: MAX_WORKGROUPS_PER_DIMENSION * WORKGROUP_WIDTH,
      ..SimConfig::default()
    };
    assert!(config.validate().is_ok());
  }

  #[test]
  fn zero_threshold_is_rejected() {
    let mut config = SimConfig::default();
    config.scene.nbody.distance_threshold = 0.0;
    assert!(config.validate().is_err());
  }
}
