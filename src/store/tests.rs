use crate::codec::{codec_for, CodecKind};
use crate::config::Config;
use crate::cube::Cube;
use crate::db::models::{NewDataset, NewProject};
use crate::db::ProjectsDb;
use crate::geometry::{DatasetGeometry, DatasetSpec};
use crate::store::relational::RelationalStore;
use crate::store::{open_backend, Backend};
use std::sync::Arc;
use tempfile::TempDir;

pub mod relational;

/// A small two-level geometry shared by the backend tests.
fn test_geometry() -> Arc<DatasetGeometry> {
    Arc::new(DatasetGeometry::build(
        &DatasetSpec {
            name: "test".to_string(),
            ximagesize: 512,
            yimagesize: 512,
            startslice: 0,
            endslice: 63,
            zoomlevels: 1,
            zscale: 1.0,
            startwindow: 0,
            endwindow: 0,
        },
        &[],
    ))
}

/// Open a provisioned relational store.
fn relational_store(db_url: &str) -> RelationalStore {
    let geometry = test_geometry();
    let mut store =
        RelationalStore::open(db_url, geometry.clone(), codec_for(CodecKind::Zlib)).unwrap();
    store.provision_schema(&geometry).unwrap();
    store
}

/// A cube with a recognizable payload, materialized the way callers do
/// it: fetched as zeros, then mutated in place.
fn patterned_cube(key: u64, resolution: u8) -> Cube {
    let geometry = test_geometry();
    let mut cube = Cube::zeros(key, resolution, geometry.cube_dim(resolution).unwrap());
    let corner: Vec<usize> = cube.data().shape().iter().map(|s| s - 1).collect();
    cube.data_mut()[[0, 0, 0]] = 17;
    cube.data_mut()[[1, 2, 3]] = 42;
    cube.data_mut()[[corner[0], corner[1], corner[2]]] = 255;
    cube
}

#[test]
fn test_registry_serves_every_backend_kind() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        metadata_db_url: ":memory:".to_string(),
        data_root: dir.path().join("data").to_string_lossy().to_string(),
        codec: CodecKind::Zlib,
        cube_dim_overrides: Vec::new(),
    };

    let mut db = ProjectsDb::from_config(&config).unwrap();
    db.new_dataset(&NewDataset {
        name: "cortex1".to_string(),
        ximagesize: 512,
        yimagesize: 512,
        startslice: 0,
        endslice: 63,
        zoomlevels: 1,
        zscale: 1.0,
        startwindow: 0,
        endwindow: 0,
    })
    .unwrap();

    for (token, backend) in [("rel", "relational"), ("file", "filesystem")] {
        db.new_project(&NewProject {
            token: token.to_string(),
            dbname: format!("{}db", token),
            backend: backend.to_string(),
            dataset: "cortex1".to_string(),
            readonly: false,
            exceptions: false,
            resolution: 0,
        })
        .unwrap();

        let project = db.load_project(token).unwrap();
        let mut store = open_backend(&project, &config).unwrap();
        store.provision_schema(&project.geometry).unwrap();

        let cube = store.get_cube(9, 0, false).unwrap();
        assert!(cube.from_zeros());
        store.put_cube(9, 0, &cube).unwrap();
        assert!(!store.get_cube(9, 0, false).unwrap().from_zeros());
    }
}
