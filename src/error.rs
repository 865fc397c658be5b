use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
  #[error("{label} needs {requested} bytes but the device allows at most {limit}")]
  ResourceLimit {
    label: String,
    requested: u64,
    limit: u64,
  },
  #[error("failed to load mesh {path}: {reason}")]
  MeshLoad { path: PathBuf, reason: String },
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("invalid configuration: {0}")]
  InvalidConfig(String),
  #[error("no suitable graphics adapter found")]
  NoAdapter,
  #[error(transparent)]
  RequestDevice(#[from] wgpu::RequestDeviceError),
  #[error(transparent)]
  CreateSurface(#[from] wgpu::CreateSurfaceError),
  #[error("buffer read-back failed: {0}")]
  BufferMap(#[from] wgpu::BufferAsyncError),
  #[error("window system error: {0}")]
  Window(String),
  #[error(transparent)]
  Signal(#[from] ctrlc::Error),
}
