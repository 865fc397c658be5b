use crate::backend::{CpuBackend, GpuBackend};
use crate::camera::{CameraController, OrbitCamera};
use crate::config::SimConfig;
use crate::scene::SceneKind;
use crate::simulation::Simulation;
use crate::SimError;
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::event::ElementState;
use winit::keyboard::*;
use winit::{
  dpi::PhysicalSize,
  event::{Event, KeyEvent, StartCause, WindowEvent},
  event_loop::{EventLoop, EventLoopWindowTarget},
  window::Window,
};

/// What the host drives once per event: the sandbox's lifecycle hooks.
pub trait Application {
  fn update(&mut self, delta: f32);
  fn render(&mut self, view: wgpu::TextureView);
  fn on_resize(&mut self, width: u32, height: u32);
  fn on_key_pressed(&mut self, key: KeyCode);
  /// Continuous input (held keys). Returns true when the event was consumed.
  fn input(&mut self, event: &WindowEvent) -> bool;
}

/// Fixed step of the headless runner.
const HEADLESS_DELTA: f32 = 1.0 / 60.0;
const STATS_INTERVAL: u64 = 120;

struct EventLoopWrapper {
  event_loop: EventLoop<()>,
  window: Arc<Window>,
}

impl EventLoopWrapper {
  pub fn new(title: &str) -> Result<Self, SimError> {
    let event_loop = EventLoop::new().map_err(|e| SimError::Window(e.to_string()))?;
    let mut builder = winit::window::WindowBuilder::new();
    builder = builder
      .with_title(title)
      .with_inner_size(PhysicalSize::new(1280, 720));
    let window = Arc::new(builder.build(&event_loop).map_err(|e| SimError::Window(e.to_string()))?);

    Ok(Self { event_loop, window })
  }
}

struct SurfaceWrapper {
  surface: wgpu::Surface<'static>,
  config: wgpu::SurfaceConfiguration,
}

impl SurfaceWrapper {
  fn new(context: &Context, surface: wgpu::Surface<'static>, size: PhysicalSize<u32>) -> Result<Self, SimError> {
    let mut config = surface
      .get_default_config(&context.adapter, size.width.max(1), size.height.max(1))
      .ok_or(SimError::NoAdapter)?;
    let view_format = config.format.add_srgb_suffix();
    config.view_formats.push(view_format);
    surface.configure(&context.device, &config);
    Ok(Self { surface, config })
  }

  fn resize(&mut self, device: &wgpu::Device, size: PhysicalSize<u32>) {
    self.config.width = size.width.max(1);
    self.config.height = size.height.max(1);
    self.surface.configure(device, &self.config);
  }

  fn acquire(&mut self, device: &wgpu::Device) -> Option<wgpu::SurfaceTexture> {
    match self.surface.get_current_texture() {
      Ok(frame) => Some(frame),
      Err(wgpu::SurfaceError::Timeout) => self.surface.get_current_texture().ok(),
      Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost | wgpu::SurfaceError::OutOfMemory) => {
        self.surface.configure(device, &self.config);
        self.surface.get_current_texture().ok()
      }
    }
  }

  fn view_format(&self) -> wgpu::TextureFormat {
    self.config.view_formats[0]
  }
}

struct Context {
  adapter: wgpu::Adapter,
  device: wgpu::Device,
  queue: wgpu::Queue,
}

impl Context {
  async fn init(instance: &wgpu::Instance, surface: &wgpu::Surface<'_>) -> Result<Self, SimError> {
    let adapter = instance
      .request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: Some(surface),
        force_fallback_adapter: false,
      })
      .await
      .ok_or(SimError::NoAdapter)?;
    info!("adapter: {:?}", adapter.get_info());

    // ask for everything the adapter offers so large capacities fit in one buffer
    let (device, queue) = adapter
      .request_device(
        &wgpu::DeviceDescriptor {
          label: None,
          required_features: wgpu::Features::empty(),
          required_limits: adapter.limits(),
          memory_hints: Default::default(),
        },
        None,
      )
      .await?;

    Ok(Self { adapter, device, queue })
  }
}

/// The windowed sandbox: the simulation core plus an orbit camera.
pub struct Sandbox {
  sim: Simulation<GpuBackend>,
  camera: OrbitCamera,
  camera_controller: CameraController,
  frames: u64,
  stats_since: Instant,
}

impl Sandbox {
  pub fn new(sim: Simulation<GpuBackend>, aspect: f32) -> Self {
    let mut camera = OrbitCamera::new(aspect);
    camera.frame_scene(sim.scene().kind);
    Self {
      sim,
      camera,
      camera_controller: CameraController::init(0.03, 0.02),
      frames: 0,
      stats_since: Instant::now(),
    }
  }

  pub fn device(&self) -> &wgpu::Device {
    self.sim.backend().device()
  }

  fn select_scene(&mut self, kind: SceneKind) {
    self.sim.set_scene(kind);
    self.camera.frame_scene(kind);
  }

  fn log_stats(&mut self) {
    self.frames += 1;
    if self.frames % STATS_INTERVAL != 0 {
      return;
    }
    let elapsed = self.stats_since.elapsed();
    self.stats_since = Instant::now();
    let fps = STATS_INTERVAL as f64 / elapsed.as_secs_f64().max(f64::EPSILON);
    match self.sim.stepper().last_compute_time() {
      Some(compute) => info!("{fps:.1} fps, n-body step {compute:?}"),
      None => info!("{fps:.1} fps, {} particles", self.sim.store().live_count()),
    }
  }
}

impl Application for Sandbox {
  fn update(&mut self, delta: f32) {
    self.camera_controller.update_camera(&mut self.camera);
    self.sim.update(delta);
  }

  fn render(&mut self, view: wgpu::TextureView) {
    let camera = self.camera.uniform();
    let backend = self.sim.backend_mut();
    backend.set_camera(&camera);
    backend.begin_frame(view);
    self.sim.render();
    self.sim.backend_mut().end_frame();
    self.log_stats();
  }

  fn on_resize(&mut self, width: u32, height: u32) {
    self.camera.aspect = width.max(1) as f32 / height.max(1) as f32;
  }

  fn on_key_pressed(&mut self, key: KeyCode) {
    let scene = self.sim.scene().clone();
    match key {
      KeyCode::Space => {
        self.sim.reset();
      }
      KeyCode::Digit1 => self.select_scene(SceneKind::Pulsating),
      KeyCode::Digit2 => self.select_scene(SceneKind::SingleAttractor),
      KeyCode::Digit3 => self.select_scene(SceneKind::MultiAttractor),
      KeyCode::Digit4 => self.select_scene(SceneKind::NBody),
      KeyCode::Digit5 => self.select_scene(SceneKind::SurfaceEstimator),
      KeyCode::Equal | KeyCode::NumpadAdd => {
        self.sim.step_particle_count(true);
      }
      KeyCode::Minus | KeyCode::NumpadSubtract => {
        self.sim.step_particle_count(false);
      }
      KeyCode::BracketRight => self.sim.set_particle_size(scene.particle_size + 0.1),
      KeyCode::BracketLeft => self.sim.set_particle_size(scene.particle_size - 0.1),
      KeyCode::KeyM => {
        // a failed load keeps the current mesh and is logged by the simulation
        self.sim.next_model().ok();
      }
      KeyCode::Period => {
        self.sim.set_attractor_count(scene.attractors.used() + 1);
      }
      KeyCode::Comma => {
        self.sim.set_attractor_count(scene.attractors.used().saturating_sub(1));
      }
      KeyCode::KeyG => self.sim.set_attractor_force(scene.attractors.force + 0.5),
      KeyCode::KeyF => self.sim.set_attractor_force(scene.attractors.force - 0.5),
      KeyCode::KeyX => self.sim.set_acceleration_factor(scene.nbody.acceleration_factor + 0.1),
      KeyCode::KeyZ => self.sim.set_acceleration_factor(scene.nbody.acceleration_factor - 0.1),
      KeyCode::KeyV => self.sim.set_distance_threshold(scene.nbody.distance_threshold * 1.25),
      KeyCode::KeyC => self.sim.set_distance_threshold(scene.nbody.distance_threshold / 1.25),
      KeyCode::KeyP => {
        let profile = !self.sim.stepper().profiling();
        self.sim.stepper_mut().set_profile(profile);
        info!("compute profiling {}", if profile { "on" } else { "off" });
      }
      _ => {}
    }
  }

  fn input(&mut self, event: &WindowEvent) -> bool {
    self.camera_controller.process_events(event)
  }
}

async fn start(config: SimConfig) -> Result<(), SimError> {
  let window_loop = EventLoopWrapper::new("Particle Sandbox")?;
  let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
    #[cfg(not(target_arch = "wasm32"))]
    backends: wgpu::Backends::PRIMARY,
    ..Default::default()
  });
  let surface = instance.create_surface(window_loop.window.clone())?;
  let context = Context::init(&instance, &surface).await?;
  let size = window_loop.window.inner_size();
  let mut surface = SurfaceWrapper::new(&context, surface, size)?;

  let Context { device, queue, .. } = context;
  let backend = GpuBackend::new(device, queue, Some(surface.view_format()));
  let sim = Simulation::new(backend, &config)?;
  let mut app = Sandbox::new(sim, size.width.max(1) as f32 / size.height.max(1) as f32);
  let mut last_frame = Instant::now();

  window_loop
    .event_loop
    .run(move |event, target: &EventLoopWindowTarget<()>| match event {
      Event::NewEvents(StartCause::Init) => {
        last_frame = Instant::now();
        window_loop.window.request_redraw();
      }
      Event::WindowEvent { event, window_id } if window_id == window_loop.window.id() => {
        if app.input(&event) {
          return;
        }
        match event {
          WindowEvent::CloseRequested
          | WindowEvent::KeyboardInput {
            event:
              KeyEvent {
                state: ElementState::Pressed,
                physical_key: PhysicalKey::Code(KeyCode::Escape),
                ..
              },
            ..
          } => target.exit(),
          WindowEvent::KeyboardInput {
            event:
              KeyEvent {
                state: ElementState::Pressed,
                physical_key: PhysicalKey::Code(key),
                repeat: false,
                ..
              },
            ..
          } => app.on_key_pressed(key),
          WindowEvent::Resized(new_size) => {
            surface.resize(app.device(), new_size);
            app.on_resize(new_size.width, new_size.height);
          }
          WindowEvent::RedrawRequested => {
            window_loop.window.request_redraw();
            let now = Instant::now();
            let delta = now.duration_since(last_frame).min(Duration::from_millis(100));
            last_frame = now;

            app.update(delta.as_secs_f32());
            if let Some(frame) = surface.acquire(app.device()) {
              let view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
                format: Some(surface.view_format()),
                ..wgpu::TextureViewDescriptor::default()
              });
              app.render(view);
              frame.present();
            }
          }
          _ => {}
        }
      }
      _ => {}
    })
    .map_err(|e| SimError::Window(e.to_string()))
}

pub fn run(config: SimConfig) -> Result<(), SimError> {
  pollster::block_on(start(config))
}

/// Steps the simulation on the CPU backend without a window, for `frames`
/// frames or until Ctrl-C.
pub fn run_headless(config: SimConfig, frames: u64) -> Result<(), SimError> {
  let running = Arc::new(AtomicBool::new(true));
  let handler_flag = running.clone();
  ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

  let mut sim = Simulation::new(CpuBackend::new(), &config)?;
  let started = Instant::now();
  let mut frame = 0;
  while frame < frames && running.load(Ordering::SeqCst) {
    sim.update(HEADLESS_DELTA);
    sim.render();
    let draws = sim.backend_mut().take_draws();
    frame += 1;
    if frame % STATS_INTERVAL == 0 {
      let count = draws.last().map_or(0, |d| d.count);
      info!("frame {frame}: drew {count} of {} particles", sim.store().capacity());
    }
  }

  info!(
    "headless run finished: {frame} frames of {} in {:?}, {} n-body swaps",
    sim.scene().kind,
    started.elapsed(),
    sim.stepper().roles().swaps()
  );
  Ok(())
}
