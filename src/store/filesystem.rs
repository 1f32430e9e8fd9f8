/// Filesystem storage backend.
///
/// One compressed file per cube under `root/res{N}/`, one serialized key
/// set per annotation under `root/idx{N}/`.  This backend class has no
/// record locking: concurrent writers get last-writer-wins semantics,
/// which is a documented limitation rather than something this layer
/// papers over.  Sessions are accepted so callers can run against any
/// backend kind, but they scope nothing here.
use crate::codec::CubeCodec;
use crate::cube::{Cube, KeySet};
use crate::error::BackendError;
use crate::geometry::DatasetGeometry;
use crate::store::{Backend, CubeStore, IndexStore, StoreSession};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct FilesystemStore {
    root: PathBuf,
    geometry: Arc<DatasetGeometry>,
    codec: Box<dyn CubeCodec>,
}

impl FilesystemStore {
    pub fn new(
        root: PathBuf,
        geometry: Arc<DatasetGeometry>,
        codec: Box<dyn CubeCodec>,
    ) -> Result<FilesystemStore, BackendError> {
        fs::create_dir_all(&root)?;
        Ok(FilesystemStore {
            root,
            geometry,
            codec,
        })
    }

    fn cube_dim(&self, resolution: u8) -> Result<[u64; 3], BackendError> {
        self.geometry
            .cube_dim(resolution)
            .ok_or(BackendError::UnknownResolution(resolution))
    }

    fn cube_path(&self, key: u64, resolution: u8) -> PathBuf {
        self.root.join(format!("res{}", resolution)).join(key.to_string())
    }

    fn index_path(&self, id: u64, resolution: u8) -> PathBuf {
        self.root.join(format!("idx{}", resolution)).join(id.to_string())
    }

    /// Create the file, failing if a record is already present.
    fn insert_file(&self, path: &Path, blob: &[u8]) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        file.write_all(blob)
    }

    /// Overwrite the file.  A missing record is created: updating a
    /// nonexistent key on this backend behaves like an insert, which
    /// differs from the relational backend's no-op.
    fn update_file(&self, path: &Path, blob: &[u8]) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, blob)
    }
}

impl StoreSession for FilesystemStore {
    fn begin(&mut self, exclusive: bool) -> Result<(), BackendError> {
        if exclusive {
            tracing::warn!(
                root = %self.root.display(),
                "filesystem backend cannot lock records; writes are last-writer-wins"
            );
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

impl CubeStore for FilesystemStore {
    fn get_cube(
        &mut self,
        key: u64,
        resolution: u8,
        for_update: bool,
    ) -> Result<Cube, BackendError> {
        if for_update {
            tracing::warn!(key, resolution, "locked read unavailable on filesystem backend");
        }
        let dim = self.cube_dim(resolution)?;
        match fs::read(self.cube_path(key, resolution)) {
            Ok(blob) => {
                let payload = self.codec.decompress(&blob)?;
                Cube::from_payload(key, resolution, dim, payload)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Cube::zeros(key, resolution, dim)),
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    fn get_cubes(
        &mut self,
        keys: &[u64],
        resolution: u8,
    ) -> Result<Box<dyn Iterator<Item = (u64, Vec<u8>)> + Send>, BackendError> {
        let mut cubes = Vec::new();
        for &key in keys {
            match fs::read(self.cube_path(key, resolution)) {
                Ok(blob) => cubes.push((key, self.codec.decompress(&blob)?)),
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(BackendError::Io(e)),
            }
        }
        Ok(Box::new(cubes.into_iter()))
    }

    fn put_cube(&mut self, key: u64, resolution: u8, cube: &Cube) -> Result<(), BackendError> {
        let blob = self.codec.compress(&cube.payload())?;
        let path = self.cube_path(key, resolution);
        if cube.from_zeros() {
            self.insert_file(&path, &blob).map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    BackendError::DuplicateKey {
                        resolution,
                        key,
                        detail: e.to_string(),
                    }
                } else {
                    BackendError::Io(e)
                }
            })
        } else {
            self.update_file(&path, &blob).map_err(BackendError::Io)
        }
    }
}

impl IndexStore for FilesystemStore {
    fn get_index(
        &mut self,
        id: u64,
        resolution: u8,
        for_update: bool,
    ) -> Result<KeySet, BackendError> {
        if for_update {
            tracing::warn!(id, resolution, "locked read unavailable on filesystem backend");
        }
        match fs::read(self.index_path(id, resolution)) {
            Ok(blob) => {
                bincode::deserialize(&blob).map_err(|e| BackendError::Serialization(e.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(KeySet::new()),
            Err(e) => Err(BackendError::Io(e)),
        }
    }

    fn put_index(&mut self, id: u64, index: &KeySet, resolution: u8) -> Result<(), BackendError> {
        let blob =
            bincode::serialize(index).map_err(|e| BackendError::Serialization(e.to_string()))?;
        self.insert_file(&self.index_path(id, resolution), &blob)
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    BackendError::DuplicateIndex {
                        resolution,
                        id,
                        detail: e.to_string(),
                    }
                } else {
                    BackendError::Io(e)
                }
            })
    }

    fn update_index(
        &mut self,
        id: u64,
        index: &KeySet,
        resolution: u8,
    ) -> Result<(), BackendError> {
        let blob =
            bincode::serialize(index).map_err(|e| BackendError::Serialization(e.to_string()))?;
        self.update_file(&self.index_path(id, resolution), &blob)
            .map_err(BackendError::Io)
    }

    fn delete_index(&mut self, id: u64, resolution: u8) -> Result<(), BackendError> {
        match fs::remove_file(self.index_path(id, resolution)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BackendError::Io(e)),
        }
    }
}

impl Backend for FilesystemStore {
    fn provision_schema(&mut self, geometry: &DatasetGeometry) -> Result<(), BackendError> {
        for resolution in 0..geometry.num_levels() {
            fs::create_dir_all(self.root.join(format!("res{}", resolution)))?;
            fs::create_dir_all(self.root.join(format!("idx{}", resolution)))?;
        }
        Ok(())
    }
}
