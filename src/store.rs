/// Cube and index storage module.
///
/// The storage contract is a capability set implemented once per backend
/// kind and selected at project-load time.  Callers hold a `Box<dyn
/// Backend>` and never inspect the kind again.
///
/// Sessions are owned by the caller: a read-modify-write cycle is
/// `begin(true)` -> `get_cube(.., true)` -> mutate -> `put_cube` ->
/// `commit`, all on one store handle.  The store never opens or commits
/// a session on the caller's behalf.
pub mod filesystem;
pub mod relational;

#[cfg(test)]
pub mod tests;

use crate::config::Config;
use crate::cube::{Cube, KeySet};
use crate::db::ProjectConfig;
use crate::error::{BackendError, Result};
use crate::geometry::DatasetGeometry;
use filesystem::FilesystemStore;
use relational::RelationalStore;
use std::path::Path;

/// Storage backend kinds.  Parsed from the project row exactly once, at
/// load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// SQLite tables, one per resolution, with session-scoped locking.
    Relational,
    /// One file per cube.  Last-writer-wins; no locking.
    Filesystem,
}

impl BackendKind {
    pub fn parse(name: &str) -> std::result::Result<BackendKind, BackendError> {
        match name.to_lowercase().as_str() {
            "relational" | "sqlite" => Ok(BackendKind::Relational),
            "filesystem" | "file" => Ok(BackendKind::Filesystem),
            other => Err(BackendError::UnknownBackend(other.to_string())),
        }
    }
}

/// Caller-owned transaction scope over a store handle.
pub trait StoreSession {
    /// Open a session.  An exclusive session takes the backend's writer
    /// lock, held until commit or rollback.
    fn begin(&mut self, exclusive: bool) -> std::result::Result<(), BackendError>;

    fn commit(&mut self) -> std::result::Result<(), BackendError>;

    fn rollback(&mut self) -> std::result::Result<(), BackendError>;
}

/// Cube repository keyed by (resolution, spatial key).
pub trait CubeStore: StoreSession {
    /// Retrieve one cube.  A missing key yields a zero-filled cube of
    /// the level's shape, flagged as created from zeros.  `for_update`
    /// demands exclusivity scoped to the open session.
    fn get_cube(
        &mut self,
        key: u64,
        resolution: u8,
        for_update: bool,
    ) -> std::result::Result<Cube, BackendError>;

    /// Batch-fetch the stored cubes among `keys`.  Payloads are
    /// decompressed; order is backend-defined; missing keys are simply
    /// absent.  The iterator is finite and fresh per call.
    fn get_cubes(
        &mut self,
        keys: &[u64],
        resolution: u8,
    ) -> std::result::Result<Box<dyn Iterator<Item = (u64, Vec<u8>)> + Send>, BackendError>;

    /// Persist one cube.  A cube created from zeros is inserted and a
    /// pre-existing record at its key is a conflict, never a silent
    /// upsert.  A loaded cube is updated in place; updating a key with
    /// no record is backend-defined.
    fn put_cube(
        &mut self,
        key: u64,
        resolution: u8,
        cube: &Cube,
    ) -> std::result::Result<(), BackendError>;
}

/// Annotation index repository keyed by (resolution, annotation id).
pub trait IndexStore: StoreSession {
    /// Fetch the key set for an annotation.  An absent id yields an
    /// empty set.
    fn get_index(
        &mut self,
        id: u64,
        resolution: u8,
        for_update: bool,
    ) -> std::result::Result<KeySet, BackendError>;

    /// Insert a new index.  An existing id is a conflict; use
    /// `update_index` to overwrite.
    fn put_index(
        &mut self,
        id: u64,
        index: &KeySet,
        resolution: u8,
    ) -> std::result::Result<(), BackendError>;

    /// Overwrite an existing index wholesale.
    fn update_index(
        &mut self,
        id: u64,
        index: &KeySet,
        resolution: u8,
    ) -> std::result::Result<(), BackendError>;

    /// Delete an index.  Idempotent; an absent id is not an error.
    fn delete_index(&mut self, id: u64, resolution: u8)
        -> std::result::Result<(), BackendError>;
}

/// The full capability set a project's storage backend provides.
pub trait Backend: CubeStore + IndexStore {
    /// Create the per-resolution cube and index tables or directories
    /// for every level of the geometry.  Safe to repeat.
    fn provision_schema(
        &mut self,
        geometry: &DatasetGeometry,
    ) -> std::result::Result<(), BackendError>;
}

/// Open the storage backend for a project.  The backend kind was parsed
/// when the project row was loaded; this is the only place it is
/// consulted.
pub fn open_backend(project: &ProjectConfig, config: &Config) -> Result<Box<dyn Backend>> {
    let codec = crate::codec::codec_for(config.codec);
    let geometry = project.geometry.clone();
    match project.backend {
        BackendKind::Relational => {
            std::fs::create_dir_all(&config.data_root).map_err(BackendError::Io)?;
            let path = Path::new(&config.data_root).join(format!("{}.db", project.dbname));
            let url = path.to_string_lossy().to_string();
            tracing::info!(project = %project.token, url = %url, "opening relational backend");
            Ok(Box::new(RelationalStore::open(&url, geometry, codec)?))
        }
        BackendKind::Filesystem => {
            let root = Path::new(&config.data_root).join(&project.dbname);
            tracing::info!(project = %project.token, root = %root.display(), "opening filesystem backend");
            Ok(Box::new(FilesystemStore::new(root, geometry, codec)?))
        }
    }
}
