//! Wavefront OBJ loading for the surface estimator, through `tobj`. Only
//! vertex positions and triangulated face indices are kept; every model in
//! the file is merged into one mesh.

use crate::SimError;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
  pub positions: Vec<[f32; 4]>,
  pub indices: Vec<u32>,
}

impl Mesh {
  pub fn vertex_count(&self) -> u32 {
    self.positions.len() as u32
  }

  pub fn index_count(&self) -> u32 {
    self.indices.len() as u32
  }

  pub fn byte_size(&self) -> u64 {
    (std::mem::size_of_val(self.positions.as_slice()) + std::mem::size_of_val(self.indices.as_slice())) as u64
  }
}

/// Position indices stay separate from normal and texcoord indices, so a
/// vertex shared by faces with different normals is kept once.
fn load_options() -> tobj::LoadOptions {
  tobj::LoadOptions {
    triangulate: true,
    single_index: false,
    ..Default::default()
  }
}

pub fn load_obj(path: &Path) -> Result<Mesh, SimError> {
  let (models, _materials) = tobj::load_obj(path, &load_options()).map_err(|e| fail(path, e.to_string()))?;
  merge_models(models).map_err(|reason| fail(path, reason))
}

fn fail(path: &Path, reason: String) -> SimError {
  SimError::MeshLoad {
    path: PathBuf::from(path),
    reason,
  }
}

fn merge_models(models: Vec<tobj::Model>) -> Result<Mesh, String> {
  let mut mesh = Mesh::default();
  for model in models {
    let base = mesh.vertex_count();
    mesh
      .positions
      .extend(model.mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2], 1.0]));
    mesh.indices.extend(model.mesh.indices.iter().map(|&i| base + i));
  }

  if mesh.positions.is_empty() || mesh.indices.is_empty() {
    return Err("mesh has no triangles".into());
  }
  Ok(mesh)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  fn load_source(source: &str) -> Result<Mesh, String> {
    let mut reader = Cursor::new(source.as_bytes());
    let (models, _) = tobj::load_obj_buf(&mut reader, &load_options(), |_| Err(tobj::LoadError::OpenFileFailed))
      .map_err(|e| e.to_string())?;
    merge_models(models)
  }

  #[test]
  fn quads_are_fanned_into_triangles() {
    let mesh = load_source("v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").unwrap();
    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.index_count(), 6);
    assert_eq!(mesh.positions[2], [1.0, 1.0, 0.0, 1.0]);
  }

  #[test]
  fn negative_indices_are_relative() {
    let mesh = load_source("v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
    assert_eq!(mesh.indices, vec![0, 1, 2]);
  }

  #[test]
  fn objects_are_merged_with_offset_indices() {
    let mesh = load_source("o a\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\no b\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 4 5 6\n").unwrap();
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.index_count(), 6);
    assert!(mesh.indices[3..].iter().all(|&i| i >= 3 && i < 6));
  }

  #[test]
  fn malformed_and_empty_meshes_are_rejected() {
    assert!(load_source("# nothing\n").is_err());
    assert!(load_source("v 0 zero 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").is_err());
  }

  #[test]
  fn missing_file_reports_path() {
    let err = load_obj(Path::new("does/not/exist.obj")).unwrap_err();
    assert!(matches!(err, SimError::MeshLoad { ref path, .. } if path.ends_with("exist.obj")));
  }

  #[test]
  fn bundled_cube_keeps_shared_corners() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/models/cube.obj");
    let mesh = load_obj(&path).unwrap();
    assert_eq!(mesh.vertex_count(), 8);
    assert_eq!(mesh.index_count(), 36);
  }
}
