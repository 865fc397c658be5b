use crate::scene::SceneKind;
use crate::CameraUniform;
use cgmath::{Deg, Point3, Rad, Vector3};
use winit::{
  event::{ElementState, KeyEvent, WindowEvent},
  keyboard::{KeyCode, PhysicalKey},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

const MAX_ELEVATION: f32 = 1.55;

/// Camera circling the origin at `distance`, placed by azimuth and elevation.
pub struct OrbitCamera {
  pub azimuth: f32,
  pub elevation: f32,
  pub distance: f32,
  pub aspect: f32,
  pub fovy: f32,
  pub znear: f32,
  pub zfar: f32,
}

impl OrbitCamera {
  pub fn new(aspect: f32) -> Self {
    Self {
      azimuth: Rad::from(Deg(-45.0f32)).0,
      elevation: Rad::from(Deg(20.0f32)).0,
      distance: 25.0,
      aspect,
      fovy: 45.0,
      znear: 0.01,
      zfar: 1000.0,
    }
  }

  pub fn eye(&self) -> Point3<f32> {
    let (sin_az, cos_az) = self.azimuth.sin_cos();
    let (sin_el, cos_el) = self.elevation.sin_cos();
    Point3::new(cos_el * sin_az, sin_el, cos_el * cos_az) * self.distance
  }

  /// Pulls the camera to a distance that fits the scene's spawn volume.
  pub fn frame_scene(&mut self, kind: SceneKind) {
    self.distance = match kind {
      SceneKind::Pulsating => 40.0,
      SceneKind::SingleAttractor | SceneKind::MultiAttractor => 150.0,
      SceneKind::NBody => 4.0,
      SceneKind::SurfaceEstimator => 70.0,
    };
  }

  pub fn uniform(&self) -> CameraUniform {
    let view = cgmath::Matrix4::look_at_rh(self.eye(), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y());
    let proj = OPENGL_TO_WGPU_MATRIX * cgmath::perspective(Deg(self.fovy), self.aspect, self.znear, self.zfar);
    CameraUniform {
      view: view.into(),
      proj: proj.into(),
    }
  }
}

pub struct CameraController {
  speed: f32,
  rotation_speed: f32,
  is_forward_pressed: bool,
  is_backward_pressed: bool,
  is_left_pressed: bool,
  is_right_pressed: bool,
  is_rotate_up_pressed: bool,
  is_rotate_down_pressed: bool,
}

impl CameraController {
  /// `speed` is the fraction of the distance covered per update when zooming.
  pub fn init(speed: f32, rotation_speed: f32) -> Self {
    Self {
      speed,
      rotation_speed,
      is_forward_pressed: false,
      is_backward_pressed: false,
      is_left_pressed: false,
      is_right_pressed: false,
      is_rotate_up_pressed: false,
      is_rotate_down_pressed: false,
    }
  }

  pub fn process_events(&mut self, event: &WindowEvent) -> bool {
    match event {
      WindowEvent::KeyboardInput {
        event:
          KeyEvent {
            state,
            physical_key: PhysicalKey::Code(keycode),
            ..
          },
        ..
      } => {
        let is_pressed = *state == ElementState::Pressed;
        match keycode {
          KeyCode::KeyW | KeyCode::ArrowUp => {
            self.is_forward_pressed = is_pressed;
            true
          }
          KeyCode::KeyA | KeyCode::ArrowLeft => {
            self.is_left_pressed = is_pressed;
            true
          }
          KeyCode::KeyS | KeyCode::ArrowDown => {
            self.is_backward_pressed = is_pressed;
            true
          }
          KeyCode::KeyD | KeyCode::ArrowRight => {
            self.is_right_pressed = is_pressed;
            true
          }
          KeyCode::KeyQ => {
            self.is_rotate_up_pressed = is_pressed;
            true
          }
          KeyCode::KeyE => {
            self.is_rotate_down_pressed = is_pressed;
            true
          }
          _ => false,
        }
      }
      _ => false,
    }
  }

  pub fn update_camera(&self, camera: &mut OrbitCamera) {
    if self.is_forward_pressed {
      camera.distance = (camera.distance * (1.0 - self.speed)).max(camera.znear * 10.0);
    }
    if self.is_backward_pressed {
      camera.distance = (camera.distance * (1.0 + self.speed)).min(camera.zfar * 0.5);
    }
    if self.is_right_pressed {
      camera.azimuth += self.rotation_speed;
    }
    if self.is_left_pressed {
      camera.azimuth -= self.rotation_speed;
    }
    if self.is_rotate_up_pressed {
      camera.elevation = (camera.elevation + self.rotation_speed).min(MAX_ELEVATION);
    }
    if self.is_rotate_down_pressed {
      camera.elevation = (camera.elevation - self.rotation_speed).max(-MAX_ELEVATION);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cgmath::{EuclideanSpace, InnerSpace};

  #[test]
  fn eye_sits_on_the_orbit() {
    let mut camera = OrbitCamera::new(1.5);
    camera.frame_scene(SceneKind::NBody);
    assert!((camera.eye().to_vec().magnitude() - 4.0).abs() < 1e-4);
  }
}
