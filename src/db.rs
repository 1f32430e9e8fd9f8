/*

Copyright 2020 The Johns Hopkins University Applied Physics Laboratory

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.

*/

/// Project and dataset metadata module.
///
/// Resolves a client token to an immutable project description and the
/// geometry of its dataset.  Metadata lives in a SQLite database owned
/// by this process; reloading a changed row requires a restart, the
/// geometry cache is never invalidated in place.
pub mod models;
pub mod schema;

#[cfg(test)]
pub mod tests;

use crate::config::Config;
use crate::error::{BackendError, Error, Result};
use crate::geometry::{CubeDimOverride, DatasetGeometry, GeometryCache};
use crate::store::BackendKind;
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use models::{Dataset, NewDataset, NewProject, Project};
use std::sync::Arc;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Everything a request handler needs to know about a project.
/// Immutable after load.
#[derive(Clone)]
pub struct ProjectConfig {
    pub token: String,
    pub dbname: String,
    pub backend: BackendKind,
    pub readonly: bool,
    pub exceptions: bool,
    pub base_resolution: u8,
    pub dataset: String,
    pub geometry: Arc<DatasetGeometry>,
}

/// Repository for the `datasets` and `projects` metadata tables.
pub struct ProjectsDb {
    connection: SqliteConnection,
    geometries: GeometryCache,
}

impl ProjectsDb {
    pub fn new(db_url: &str, overrides: Vec<CubeDimOverride>) -> Result<ProjectsDb> {
        let mut connection = SqliteConnection::establish(db_url).map_err(|e| {
            tracing::error!(url = %db_url, "failed to connect to metadata database: {}", e);
            BackendError::Connection(e)
        })?;
        connection
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| BackendError::Migration(e.to_string()))?;
        Ok(ProjectsDb {
            connection,
            geometries: GeometryCache::new(overrides),
        })
    }

    pub fn from_config(config: &Config) -> Result<ProjectsDb> {
        ProjectsDb::new(&config.metadata_db_url, config.cube_dim_overrides.clone())
    }

    /// Load the project description for a token.  The backend kind is
    /// parsed here, once; an unknown token or dataset is a token error.
    pub fn load_project(&mut self, token: &str) -> Result<ProjectConfig> {
        use schema::projects::dsl;

        let row: Option<Project> = dsl::projects
            .filter(dsl::token.eq(token))
            .first(&mut self.connection)
            .optional()
            .map_err(BackendError::Database)?;
        let row = row.ok_or_else(|| {
            tracing::warn!(token, "project token not found");
            Error::Token(token.to_string())
        })?;

        let geometry = self.load_geometry(&row.dataset)?;
        let backend = BackendKind::parse(&row.backend)?;

        Ok(ProjectConfig {
            token: row.token,
            dbname: row.dbname,
            backend,
            readonly: row.readonly,
            exceptions: row.exceptions,
            base_resolution: row.resolution as u8,
            dataset: row.dataset,
            geometry,
        })
    }

    /// Load (or fetch the cached) geometry for a dataset name.
    pub fn load_geometry(&mut self, dataset: &str) -> Result<Arc<DatasetGeometry>> {
        use schema::datasets::dsl;

        if let Some(geometry) = self.geometries.get(dataset) {
            return Ok(geometry);
        }
        let row: Option<Dataset> = dsl::datasets
            .filter(dsl::name.eq(dataset))
            .first(&mut self.connection)
            .optional()
            .map_err(BackendError::Database)?;
        let row = row.ok_or_else(|| {
            tracing::warn!(dataset, "dataset not found");
            Error::Token(dataset.to_string())
        })?;
        Ok(self.geometries.get_or_build(&row.to_spec()))
    }

    /// Register a new dataset.
    pub fn new_dataset(&mut self, dataset: &NewDataset) -> Result<()> {
        use schema::datasets::dsl;

        diesel::insert_into(dsl::datasets)
            .values(dataset)
            .execute(&mut self.connection)
            .map_err(BackendError::Database)?;
        tracing::info!(dataset = %dataset.name, "created dataset");
        Ok(())
    }

    /// Register a new project.  Token uniqueness is enforced by the
    /// schema; a duplicate surfaces as a backend error.
    pub fn new_project(&mut self, project: &NewProject) -> Result<()> {
        use schema::projects::dsl;

        diesel::insert_into(dsl::projects)
            .values(project)
            .execute(&mut self.connection)
            .map_err(BackendError::Database)?;
        tracing::info!(token = %project.token, "created project");
        Ok(())
    }

    /// Remove a project's metadata row.  Idempotent; the project's cube
    /// data is torn down externally.
    pub fn delete_project(&mut self, token: &str) -> Result<()> {
        use schema::projects::dsl;

        diesel::delete(dsl::projects.filter(dsl::token.eq(token)))
            .execute(&mut self.connection)
            .map_err(BackendError::Database)?;
        Ok(())
    }
}
