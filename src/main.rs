use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use particle_sandbox::config::SimConfig;
use particle_sandbox::scene::SceneKind;
use std::io;
use std::path::PathBuf;

/// Interactive GPU particle sandbox
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// Scene to start in
  #[arg(short, long, value_enum, default_value_t = SceneKind::Pulsating)]
  scene: SceneKind,
  /// Requested number of live particles
  #[arg(short, long, default_value_t = 4096)]
  particles: u32,
  /// Particles reserved at startup (multiple of 256)
  #[arg(long, default_value_t = 4_194_304)]
  capacity: u32,
  /// Seed for particle placement; random when omitted
  #[arg(long)]
  seed: Option<u64>,
  /// Rendered particle size
  #[arg(long, default_value_t = 0.5)]
  particle_size: f32,
  /// OBJ meshes for the surface estimator, replacing the bundled ones
  #[arg(short, long)]
  model: Vec<PathBuf>,
  /// Time every n-body compute step
  #[arg(long, default_value_t = false)]
  profile: bool,
  /// Run in headless mode (no window)
  #[arg(long, default_value_t = false)]
  headless: bool,
  /// Frames to run in headless mode
  #[arg(long, default_value_t = 600)]
  frames: u64,
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Generate shell completion scripts
  Completions {
    /// The shell to generate the script for
    #[arg(value_enum)]
    shell: Shell,
  },
}

impl Args {
  fn sim_config(&self) -> SimConfig {
    let mut config = SimConfig {
      capacity: self.capacity,
      seed: self.seed,
      profile: self.profile,
      ..SimConfig::default()
    }
    .with_scene(self.scene);
    config.scene.requested_count = self.particles;
    config.scene.set_particle_size(self.particle_size);
    if !self.model.is_empty() {
      config.models = self.model.clone();
    }
    config
  }
}

fn main() -> anyhow::Result<()> {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
  let args = Args::parse();

  if let Some(Commands::Completions { shell }) = args.command {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    return Ok(());
  }

  let config = args.sim_config();
  if args.headless {
    particle_sandbox::state::run_headless(config, args.frames)?;
  } else {
    particle_sandbox::state::run(config)?;
  }
  Ok(())
}
