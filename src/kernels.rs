//! CPU versions of the compute passes in `shaders/`. The CPU backend runs
//! these in place of a dispatch; they follow the WGSL line for line.

use crate::{FrameUniforms, NBodyUniforms, Particle, MAX_ATTRACTORS};
use cgmath::{InnerSpace, Vector3, Zero};

/// Fraction of the distance to the nearest mesh vertex a surface-estimator
/// particle covers per scaled second.
pub const SURFACE_PULL: f32 = 2.0;

/// Mesh data bound to the surface estimator pass.
#[derive(Copy, Clone, Debug)]
pub struct MeshView<'a> {
  pub positions: &'a [[f32; 4]],
  pub indices: &'a [u32],
}

/// One N-body step: reads `input`, writes `output`, updates `velocities` in
/// place. Entries at or past `live_count` are untouched.
pub fn nbody_step(
  input: &[[f32; 4]],
  output: &mut [[f32; 4]],
  velocities: &mut [[f32; 4]],
  uniforms: &NBodyUniforms,
) {
  let n = uniforms.live_count as usize;
  let threshold2 = uniforms.distance_threshold * uniforms.distance_threshold;

  for i in 0..n {
    let pos = xyz(input[i]);
    let mut acc = Vector3::zero();
    for (j, other) in input[..n].iter().enumerate() {
      if j == i {
        continue;
      }
      let d = xyz(*other) - pos;
      let dist2 = d.magnitude2();
      if dist2 > 0.0 {
        acc += d.normalize() * (uniforms.acceleration_factor / dist2.max(threshold2));
      }
    }

    let vel = xyz(velocities[i]) + acc * uniforms.delta_t;
    let new_pos = pos + vel * uniforms.delta_t;
    velocities[i] = [vel.x, vel.y, vel.z, velocities[i][3]];
    output[i] = [new_pos.x, new_pos.y, new_pos.z, input[i][3]];
  }
}

/// Per-frame update of the generic-layout scenes.
pub fn advance_scene(particles: &mut [Particle], mesh: Option<MeshView<'_>>, uniforms: &FrameUniforms) {
  let n = (uniforms.live_count as usize).min(particles.len());
  let dt = uniforms.delta_t;
  let used = (uniforms.attractor_used as usize).min(MAX_ATTRACTORS);

  for particle in &mut particles[..n] {
    match uniforms.scene {
      0 => count_down(particle, dt),
      1 | 2 => {
        let mut pos = Vector3::new(particle.position[0], particle.position[1], particle.position[2]);
        let mut vel = Vector3::from(particle.velocity);
        for attractor in &uniforms.attractors[..used] {
          let d = xyz(*attractor) - pos;
          if d.magnitude2() > 0.0 {
            vel += d.normalize() * (uniforms.attractor_force * dt);
          }
        }
        pos += vel * dt;
        particle.position = [pos.x, pos.y, pos.z, particle.position[3]];
        particle.velocity = vel.into();
        count_down(particle, dt);
      }
      4 => {
        if let Some(mesh) = mesh {
          pull_to_surface(particle, mesh, uniforms, dt);
        }
      }
      _ => {}
    }
  }
}

fn count_down(particle: &mut Particle, dt: f32) {
  particle.remaining -= dt;
  if particle.remaining <= 0.0 {
    particle.remaining = (particle.remaining + particle.lifetime).clamp(0.0, particle.lifetime);
  }
}

fn pull_to_surface(particle: &mut Particle, mesh: MeshView<'_>, uniforms: &FrameUniforms, dt: f32) {
  let pos = xyz(particle.position);
  let index_count = (uniforms.index_count as usize).min(mesh.indices.len());
  let vertex_count = (uniforms.vertex_count as usize).min(mesh.positions.len());

  let mut nearest = None;
  let mut best = f32::MAX;
  for &index in &mesh.indices[..index_count] {
    let Some(vertex) = mesh.positions[..vertex_count].get(index as usize) else {
      continue;
    };
    let dist2 = (xyz(*vertex) - pos).magnitude2();
    if dist2 < best {
      best = dist2;
      nearest = Some(xyz(*vertex));
    }
  }

  if let Some(target) = nearest {
    let step = (target - pos) * (SURFACE_PULL * dt).min(1.0);
    let new_pos = pos + step;
    particle.position = [new_pos.x, new_pos.y, new_pos.z, particle.position[3]];
    particle.velocity = step.into();
  }
}

fn xyz(v: [f32; 4]) -> Vector3<f32> {
  Vector3::new(v[0], v[1], v[2])
}

#[cfg(test)]
mod tests {
  use super::*;

  fn uniforms(n: u32, dt: f32) -> NBodyUniforms {
    NBodyUniforms {
      delta_t: dt,
      live_count: n,
      acceleration_factor: 0.2,
      distance_threshold: 0.01,
    }
  }

  #[test]
  fn two_bodies_attract() {
    let input = [[-1.0, 0.0, 0.0, 1.0], [1.0, 0.0, 0.0, 1.0]];
    let mut output = [[0.0; 4]; 2];
    let mut vel = [[0.0; 4]; 2];
    nbody_step(&input, &mut output, &mut vel, &uniforms(2, 0.1));
    assert!(vel[0][0] > 0.0 && vel[1][0] < 0.0);
    assert!(output[0][0] > -1.0 && output[1][0] < 1.0);
    assert_eq!(output[0][3], 1.0);
  }

  #[test]
  fn force_is_capped_by_threshold() {
    let close = [[0.0, 0.0, 0.0, 1.0], [1e-6, 0.0, 0.0, 1.0]];
    let mut output = [[0.0; 4]; 2];
    let mut vel = [[0.0; 4]; 2];
    let u = uniforms(2, 1.0);
    nbody_step(&close, &mut output, &mut vel, &u);
    let cap = u.acceleration_factor / (u.distance_threshold * u.distance_threshold);
    assert!((vel[0][0] - cap).abs() <= cap * 1e-4);
  }

  #[test]
  fn coincident_particles_stay_finite() {
    let input = [[0.5, 0.5, 0.5, 1.0]; 2];
    let mut output = [[0.0; 4]; 2];
    let mut vel = [[0.0; 4]; 2];
    nbody_step(&input, &mut output, &mut vel, &uniforms(2, 0.5));
    assert!(output.iter().flatten().all(|v| v.is_finite()));
    assert_eq!(output, input);
  }

  #[test]
  fn countdown_wraps_within_lifetime() {
    let mut particle = Particle {
      lifetime: 1.0,
      remaining: 0.25,
      ..Particle::default()
    };
    count_down(&mut particle, 0.5);
    assert!((particle.remaining - 0.75).abs() < 1e-6);
    assert!(particle.remaining <= particle.lifetime);

    let mut dead = Particle::default();
    count_down(&mut dead, 0.5);
    assert_eq!(dead.remaining, 0.0);
  }

  #[test]
  fn surface_particles_move_toward_nearest_vertex() {
    let positions = [[10.0, 0.0, 0.0, 1.0], [-10.0, 0.0, 0.0, 1.0], [0.0, 10.0, 0.0, 1.0]];
    let indices = [0, 1, 2];
    let mut particles = [Particle {
      position: [8.0, 0.0, 0.0, 1.0],
      ..Particle::default()
    }];
    let u = FrameUniforms {
      delta_t: 0.25,
      scene: 4,
      vertex_count: 3,
      index_count: 3,
      live_count: 1,
      ..FrameUniforms::default()
    };
    let mesh = MeshView {
      positions: &positions,
      indices: &indices,
    };
    advance_scene(&mut particles, Some(mesh), &u);
    assert!((particles[0].position[0] - 9.0).abs() < 1e-5);
  }
}
