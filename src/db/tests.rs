use super::models::{NewDataset, NewProject};
use super::ProjectsDb;
use crate::error::{BackendError, Error};
use crate::store::BackendKind;
use std::sync::Arc;

/// Set up an in-memory metadata DB with one dataset registered.
fn setup_db() -> ProjectsDb {
    let mut db = ProjectsDb::new(":memory:", Vec::new()).unwrap();
    db.new_dataset(&NewDataset {
        name: "cortex1".to_string(),
        ximagesize: 4096,
        yimagesize: 4096,
        startslice: 0,
        endslice: 99,
        zoomlevels: 3,
        zscale: 1.0,
        startwindow: 0,
        endwindow: 0,
    })
    .unwrap();
    db
}

fn project_row(token: &str, backend: &str) -> NewProject {
    NewProject {
        token: token.to_string(),
        dbname: format!("{}db", token),
        backend: backend.to_string(),
        dataset: "cortex1".to_string(),
        readonly: false,
        exceptions: true,
        resolution: 0,
    }
}

#[test]
fn test_load_project() {
    let mut db = setup_db();
    db.new_project(&project_row("cx1", "relational")).unwrap();

    let project = db.load_project("cx1").unwrap();
    assert_eq!("cx1", project.token);
    assert_eq!("cx1db", project.dbname);
    assert_eq!(BackendKind::Relational, project.backend);
    assert!(!project.readonly);
    assert!(project.exceptions);
    assert_eq!(0, project.base_resolution);
    assert_eq!("cortex1", project.dataset);
    assert_eq!(4, project.geometry.num_levels());
}

#[test]
fn test_unknown_token() {
    let mut db = setup_db();
    match db.load_project("nope") {
        Err(Error::Token(token)) => assert_eq!("nope", token),
        other => panic!("expected a token error, got {:?}", other.map(|p| p.token)),
    }
}

#[test]
fn test_unknown_dataset_is_a_token_error() {
    let mut db = setup_db();
    let mut row = project_row("cx2", "relational");
    row.dataset = "missing".to_string();
    db.new_project(&row).unwrap();
    assert!(matches!(db.load_project("cx2"), Err(Error::Token(_))));
}

#[test]
fn test_unknown_backend_kind() {
    let mut db = setup_db();
    db.new_project(&project_row("cx3", "riak")).unwrap();
    assert!(matches!(
        db.load_project("cx3"),
        Err(Error::Backend(BackendError::UnknownBackend(_)))
    ));
}

#[test]
fn test_duplicate_token_conflicts() {
    let mut db = setup_db();
    db.new_project(&project_row("cx4", "relational")).unwrap();
    assert!(db.new_project(&project_row("cx4", "relational")).is_err());
}

#[test]
fn test_delete_project_is_idempotent() {
    let mut db = setup_db();
    db.new_project(&project_row("cx5", "relational")).unwrap();
    db.delete_project("cx5").unwrap();
    assert!(matches!(db.load_project("cx5"), Err(Error::Token(_))));
    // a second delete is not an error
    db.delete_project("cx5").unwrap();
}

#[test]
fn test_geometry_is_shared_between_loads() {
    let mut db = setup_db();
    db.new_project(&project_row("cx6", "relational")).unwrap();
    db.new_project(&project_row("cx7", "filesystem")).unwrap();

    let first = db.load_project("cx6").unwrap();
    let second = db.load_project("cx7").unwrap();
    assert!(Arc::ptr_eq(&first.geometry, &second.geometry));
}
