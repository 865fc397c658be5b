use crate::scene::{SceneConfig, SceneKind};
use crate::store::CpuArrays;
use crate::Particle;
use cgmath::{InnerSpace, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use std::f32::consts::PI;

/// Radius of the spawn sphere of the attractor scenes.
pub const ATTRACTOR_SPAWN_RADIUS: f32 = 50.0;
/// Radius of the spawn sphere of the surface estimator.
pub const SURFACE_SPAWN_RADIUS: f32 = 25.0;
/// Upper bound (exclusive) of particle lifetimes, in seconds.
pub const MAX_LIFETIME: f32 = 5.0;
/// Per-axis bound of the initial attractor-scene velocity.
pub const MAX_INITIAL_SPEED: f32 = 10.0;

/// Fills the first `live_count` entries of the arrays the scene reads.
///
/// Only the live prefix is touched. Fields a scene does not use are zeroed so
/// the uploaded range never carries state from a previous scene.
pub fn initialize<R: Rng + ?Sized>(
  scene: &SceneConfig,
  live_count: usize,
  rng: &mut R,
  arrays: &mut CpuArrays,
) {
  let lifetime = Uniform::new(0.0f32, MAX_LIFETIME);
  let speed = Uniform::new(-MAX_INITIAL_SPEED, MAX_INITIAL_SPEED);

  match scene.kind {
    SceneKind::Pulsating => {
      for (i, particle) in arrays.particles[..live_count].iter_mut().enumerate() {
        let life = lifetime.sample(rng);
        *particle = Particle {
          position: [0.0, 0.0, 0.0, 1.0],
          velocity: [0.0; 3],
          lifetime: life,
          color: rgb(hue_color(i)),
          remaining: life,
        };
      }
    }
    SceneKind::SingleAttractor | SceneKind::MultiAttractor => {
      for (i, particle) in arrays.particles[..live_count].iter_mut().enumerate() {
        let pos = random_inside_sphere(rng, ATTRACTOR_SPAWN_RADIUS);
        let life = lifetime.sample(rng);
        *particle = Particle {
          position: [pos.x, pos.y, pos.z, 1.0],
          velocity: [speed.sample(rng), speed.sample(rng), speed.sample(rng)],
          lifetime: life,
          color: rgb(hue_color(i)),
          remaining: life,
        };
      }
    }
    SceneKind::NBody => {
      let [gen_a, gen_b] = &mut arrays.positions;
      for i in 0..live_count {
        let point = random_on_sphere(rng);
        let pos = [point.x, point.y, point.z, 1.0];
        gen_a[i] = pos;
        gen_b[i] = pos;
        arrays.velocities[i] = [0.0; 4];
      }
    }
    SceneKind::SurfaceEstimator => {
      for particle in &mut arrays.particles[..live_count] {
        let pos = random_inside_sphere(rng, SURFACE_SPAWN_RADIUS);
        *particle = Particle {
          position: [pos.x, pos.y, pos.z, 1.0],
          ..Particle::default()
        };
      }
    }
  }
}

/// Point inside a solid sphere: a random cube direction, normalized, scaled by
/// the cube root of a uniform radius fraction.
pub fn random_inside_sphere<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vector3<f32> {
  let axis = Uniform::new(-1.0f32, 1.0);
  let fraction = Uniform::new(0.0f32, 1.0);
  let direction = Vector3::new(axis.sample(rng), axis.sample(rng), axis.sample(rng));
  let direction = if direction.magnitude2() > 0.0 {
    direction.normalize()
  } else {
    Vector3::unit_x()
  };
  direction * (fraction.sample(rng).cbrt() * radius)
}

/// Uniform point on the unit sphere from an azimuth and an arcsine altitude.
pub fn random_on_sphere<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f32> {
  let alpha = rng.gen::<f32>() * 2.0 * PI;
  let beta = Uniform::new(-1.0f32, 1.0).sample(rng).asin();
  Vector3::new(alpha.cos() * beta.cos(), alpha.sin() * beta.cos(), beta.sin())
}

/// Fully saturated color for particle `index`; hues advance by the golden
/// ratio so any prefix of indices covers the color wheel.
pub fn hue_color(index: usize) -> [f32; 4] {
  let hue = (index as f64 * 0.618_033_988_749_895).fract() as f32 * 360.0;
  let x = 1.0 - ((hue / 60.0) % 2.0 - 1.0).abs();
  let (r, g, b) = if hue < 60.0 {
    (1.0, x, 0.0)
  } else if hue < 120.0 {
    (x, 1.0, 0.0)
  } else if hue < 180.0 {
    (0.0, 1.0, x)
  } else if hue < 240.0 {
    (0.0, x, 1.0)
  } else if hue < 300.0 {
    (x, 0.0, 1.0)
  } else {
    (1.0, 0.0, x)
  };
  [r, g, b, 1.0]
}

fn rgb(color: [f32; 4]) -> [f32; 3] {
  [color[0], color[1], color[2]]
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::{rngs::SmallRng, SeedableRng};

  #[test]
  fn inside_sphere_stays_inside() {
    let mut rng = SmallRng::seed_from_u64(7);
    for _ in 0..10_000 {
      let p = random_inside_sphere(&mut rng, 50.0);
      assert!(p.magnitude() <= 50.0 * (1.0 + 1e-5));
    }
  }

  #[test]
  fn on_sphere_is_unit_length() {
    let mut rng = SmallRng::seed_from_u64(7);
    for _ in 0..10_000 {
      let p = random_on_sphere(&mut rng);
      assert!((p.magnitude() - 1.0).abs() < 1e-5);
    }
  }

  #[test]
  fn hue_colors_are_in_unit_range() {
    for i in 0..1000 {
      let c = hue_color(i);
      assert!(c.iter().all(|v| (0.0..=1.0).contains(v)));
      assert_eq!(c[3], 1.0);
    }
    assert_ne!(hue_color(0), hue_color(1));
  }
}
