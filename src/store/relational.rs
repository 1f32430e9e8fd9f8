/// Relational storage backend.
///
/// One SQLite database per project, one `res{N}` cube table and one
/// `idx{N}` index table per resolution level.  Table names are derived
/// from the resolution and keys are integers, so statements are
/// assembled by formatting; payload blobs are always bound.
///
/// An exclusive session maps to an immediate transaction, which takes
/// the database writer lock and holds it until commit or rollback.  That
/// is the locking granularity SQLite offers; within it, a `for_update`
/// read is exclusive for the life of the session.
use crate::codec::CubeCodec;
use crate::cube::{Cube, KeySet};
use crate::error::BackendError;
use crate::geometry::DatasetGeometry;
use crate::store::{Backend, CubeStore, IndexStore, StoreSession};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{BigInt, Binary};
use std::sync::Arc;

fn cube_table(resolution: u8) -> String {
    format!("res{}", resolution)
}

fn index_table(resolution: u8) -> String {
    format!("idx{}", resolution)
}

#[derive(QueryableByName)]
struct KeyedBlobRow {
    #[diesel(sql_type = BigInt)]
    cube_key: i64,
    #[diesel(sql_type = Binary)]
    cube: Vec<u8>,
}

#[derive(QueryableByName)]
struct BlobRow {
    #[diesel(sql_type = Binary)]
    cube: Vec<u8>,
}

#[derive(QueryableByName)]
struct IndexBlobRow {
    #[diesel(sql_type = Binary)]
    key_set: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Shared,
    Exclusive,
}

pub struct RelationalStore {
    connection: SqliteConnection,
    geometry: Arc<DatasetGeometry>,
    codec: Box<dyn CubeCodec>,
    session: SessionState,
}

impl RelationalStore {
    pub fn open(
        db_url: &str,
        geometry: Arc<DatasetGeometry>,
        codec: Box<dyn CubeCodec>,
    ) -> Result<RelationalStore, BackendError> {
        let connection = SqliteConnection::establish(db_url).map_err(|e| {
            tracing::error!(url = %db_url, "failed to connect to cube database: {}", e);
            BackendError::Connection(e)
        })?;
        Ok(RelationalStore {
            connection,
            geometry,
            codec,
            session: SessionState::Idle,
        })
    }

    fn cube_dim(&self, resolution: u8) -> Result<[u64; 3], BackendError> {
        self.geometry
            .cube_dim(resolution)
            .ok_or(BackendError::UnknownResolution(resolution))
    }

    fn require_exclusive(&self) -> Result<(), BackendError> {
        if self.session != SessionState::Exclusive {
            return Err(BackendError::LockWithoutSession);
        }
        Ok(())
    }

    fn fetch_blob(&mut self, sql: String) -> Result<Option<Vec<u8>>, BackendError> {
        let row = diesel::sql_query(sql)
            .get_result::<BlobRow>(&mut self.connection)
            .optional()?;
        Ok(row.map(|r| r.cube))
    }
}

impl StoreSession for RelationalStore {
    fn begin(&mut self, exclusive: bool) -> Result<(), BackendError> {
        if self.session != SessionState::Idle {
            return Err(BackendError::SessionAlreadyOpen);
        }
        let sql = if exclusive { "BEGIN IMMEDIATE" } else { "BEGIN" };
        diesel::sql_query(sql).execute(&mut self.connection)?;
        self.session = if exclusive {
            SessionState::Exclusive
        } else {
            SessionState::Shared
        };
        Ok(())
    }

    fn commit(&mut self) -> Result<(), BackendError> {
        if self.session == SessionState::Idle {
            return Err(BackendError::NoSession);
        }
        diesel::sql_query("COMMIT").execute(&mut self.connection)?;
        self.session = SessionState::Idle;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), BackendError> {
        if self.session == SessionState::Idle {
            return Err(BackendError::NoSession);
        }
        diesel::sql_query("ROLLBACK").execute(&mut self.connection)?;
        self.session = SessionState::Idle;
        Ok(())
    }
}

impl CubeStore for RelationalStore {
    fn get_cube(
        &mut self,
        key: u64,
        resolution: u8,
        for_update: bool,
    ) -> Result<Cube, BackendError> {
        if for_update {
            self.require_exclusive()?;
        }
        let dim = self.cube_dim(resolution)?;
        let sql = format!(
            "SELECT cube FROM {} WHERE cube_key = {}",
            cube_table(resolution),
            key as i64
        );
        match self.fetch_blob(sql)? {
            // Not written yet; materialize the default
            None => Ok(Cube::zeros(key, resolution, dim)),
            Some(blob) => {
                let payload = self.codec.decompress(&blob)?;
                Cube::from_payload(key, resolution, dim, payload)
            }
        }
    }

    fn get_cubes(
        &mut self,
        keys: &[u64],
        resolution: u8,
    ) -> Result<Box<dyn Iterator<Item = (u64, Vec<u8>)> + Send>, BackendError> {
        if keys.is_empty() {
            return Ok(Box::new(std::iter::empty()));
        }
        let key_list = keys
            .iter()
            .map(|k| (*k as i64).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT cube_key, cube FROM {} WHERE cube_key IN ({})",
            cube_table(resolution),
            key_list
        );
        let rows = diesel::sql_query(sql).load::<KeyedBlobRow>(&mut self.connection)?;
        let mut cubes = Vec::with_capacity(rows.len());
        for row in rows {
            let payload = self.codec.decompress(&row.cube)?;
            cubes.push((row.cube_key as u64, payload));
        }
        Ok(Box::new(cubes.into_iter()))
    }

    fn put_cube(&mut self, key: u64, resolution: u8, cube: &Cube) -> Result<(), BackendError> {
        let payload = self.codec.compress(&cube.payload())?;

        if cube.from_zeros() {
            let sql = format!(
                "INSERT INTO {} (cube_key, cube) VALUES ({}, ?)",
                cube_table(resolution),
                key as i64
            );
            diesel::sql_query(sql)
                .bind::<Binary, _>(payload)
                .execute(&mut self.connection)
                .map_err(|e| match e {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                        BackendError::DuplicateKey {
                            resolution,
                            key,
                            detail: info.message().to_string(),
                        }
                    }
                    other => BackendError::Database(other),
                })?;
        } else {
            // An update that matches no row is a no-op here; other
            // backends behave differently and callers must not rely on
            // either.
            let sql = format!(
                "UPDATE {} SET cube = ? WHERE cube_key = {}",
                cube_table(resolution),
                key as i64
            );
            diesel::sql_query(sql)
                .bind::<Binary, _>(payload)
                .execute(&mut self.connection)?;
        }
        Ok(())
    }
}

impl IndexStore for RelationalStore {
    fn get_index(
        &mut self,
        id: u64,
        resolution: u8,
        for_update: bool,
    ) -> Result<KeySet, BackendError> {
        if for_update {
            self.require_exclusive()?;
        }
        let sql = format!(
            "SELECT key_set FROM {} WHERE annotation_id = {}",
            index_table(resolution),
            id as i64
        );
        let row = diesel::sql_query(sql)
            .get_result::<IndexBlobRow>(&mut self.connection)
            .optional()?;
        match row {
            None => Ok(KeySet::new()),
            Some(row) => bincode::deserialize(&row.key_set)
                .map_err(|e| BackendError::Serialization(e.to_string())),
        }
    }

    fn put_index(&mut self, id: u64, index: &KeySet, resolution: u8) -> Result<(), BackendError> {
        let blob =
            bincode::serialize(index).map_err(|e| BackendError::Serialization(e.to_string()))?;
        let sql = format!(
            "INSERT INTO {} (annotation_id, key_set) VALUES ({}, ?)",
            index_table(resolution),
            id as i64
        );
        diesel::sql_query(sql)
            .bind::<Binary, _>(blob)
            .execute(&mut self.connection)
            .map_err(|e| match e {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                    BackendError::DuplicateIndex {
                        resolution,
                        id,
                        detail: info.message().to_string(),
                    }
                }
                other => BackendError::Database(other),
            })?;
        Ok(())
    }

    fn update_index(
        &mut self,
        id: u64,
        index: &KeySet,
        resolution: u8,
    ) -> Result<(), BackendError> {
        let blob =
            bincode::serialize(index).map_err(|e| BackendError::Serialization(e.to_string()))?;
        let sql = format!(
            "UPDATE {} SET key_set = ? WHERE annotation_id = {}",
            index_table(resolution),
            id as i64
        );
        diesel::sql_query(sql)
            .bind::<Binary, _>(blob)
            .execute(&mut self.connection)?;
        Ok(())
    }

    fn delete_index(&mut self, id: u64, resolution: u8) -> Result<(), BackendError> {
        let sql = format!(
            "DELETE FROM {} WHERE annotation_id = {}",
            index_table(resolution),
            id as i64
        );
        diesel::sql_query(sql).execute(&mut self.connection)?;
        Ok(())
    }
}

impl Backend for RelationalStore {
    fn provision_schema(&mut self, geometry: &DatasetGeometry) -> Result<(), BackendError> {
        for resolution in 0..geometry.num_levels() {
            let cubes = format!(
                "CREATE TABLE IF NOT EXISTS {} (cube_key BIGINT PRIMARY KEY, cube BLOB NOT NULL)",
                cube_table(resolution)
            );
            diesel::sql_query(cubes).execute(&mut self.connection)?;
            let indexes = format!(
                "CREATE TABLE IF NOT EXISTS {} (annotation_id BIGINT PRIMARY KEY, key_set BLOB NOT NULL)",
                index_table(resolution)
            );
            diesel::sql_query(indexes).execute(&mut self.connection)?;
        }
        tracing::info!(dataset = %geometry.name(), levels = geometry.num_levels(), "provisioned cube schema");
        Ok(())
    }
}
