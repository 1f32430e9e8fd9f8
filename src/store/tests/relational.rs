use super::{patterned_cube, relational_store, test_geometry};
use crate::cube::{Cube, KeySet};
use crate::error::BackendError;
use crate::store::relational::RelationalStore;
use crate::store::{CubeStore, IndexStore, StoreSession};
use tempfile::TempDir;

#[test]
fn test_missing_key_yields_zero_filled_cube() {
    let mut store = relational_store(":memory:");
    let cube = store.get_cube(1234, 1, false).unwrap();
    assert!(cube.from_zeros());
    assert_eq!(&[64, 64, 64], cube.data().shape());
    assert!(cube.payload().iter().all(|&v| v == 0));
}

#[test]
fn test_put_get_round_trip() {
    let mut store = relational_store(":memory:");
    let cube = patterned_cube(77, 0);
    store.put_cube(77, 0, &cube).unwrap();

    let loaded = store.get_cube(77, 0, false).unwrap();
    assert!(!loaded.from_zeros());
    assert_eq!(cube.payload(), loaded.payload());
}

#[test]
fn test_insert_conflict_is_surfaced() {
    let mut store = relational_store(":memory:");
    let cube = patterned_cube(5, 0);
    store.put_cube(5, 0, &cube).unwrap();
    match store.put_cube(5, 0, &cube) {
        Err(BackendError::DuplicateKey {
            resolution, key, ..
        }) => {
            assert_eq!(0, resolution);
            assert_eq!(5, key);
        }
        other => panic!("expected a duplicate-key error, got {:?}", other),
    }
}

#[test]
fn test_update_of_loaded_cube() {
    let mut store = relational_store(":memory:");
    store.put_cube(8, 0, &patterned_cube(8, 0)).unwrap();

    let mut loaded = store.get_cube(8, 0, false).unwrap();
    loaded.data_mut()[[0, 0, 0]] = 99;
    store.put_cube(8, 0, &loaded).unwrap();

    let again = store.get_cube(8, 0, false).unwrap();
    assert_eq!(99, again.data()[[0, 0, 0]]);
}

#[test]
fn test_update_of_missing_key_is_a_noop() {
    let mut store = relational_store(":memory:");
    let geometry = test_geometry();
    let dim = geometry.cube_dim(0).unwrap();
    let size = (dim[0] * dim[1] * dim[2]) as usize;
    // a cube that claims to be loaded, but was never stored
    let phantom = Cube::from_payload(3, 0, dim, vec![9u8; size]).unwrap();

    store.put_cube(3, 0, &phantom).unwrap();
    assert!(store.get_cube(3, 0, false).unwrap().from_zeros());
}

#[test]
fn test_get_cubes_returns_only_stored_keys() {
    let mut store = relational_store(":memory:");
    store.put_cube(1, 0, &patterned_cube(1, 0)).unwrap();
    store.put_cube(3, 0, &patterned_cube(3, 0)).unwrap();

    let mut found: Vec<u64> = store
        .get_cubes(&[1, 2, 3, 4], 0)
        .unwrap()
        .map(|(key, payload)| {
            assert_eq!(patterned_cube(key, 0).payload(), payload);
            key
        })
        .collect();
    found.sort_unstable();
    assert_eq!(vec![1, 3], found);

    assert_eq!(0, store.get_cubes(&[], 0).unwrap().count());
}

#[test]
fn test_index_round_trip() {
    let mut store = relational_store(":memory:");
    assert!(store.get_index(10, 0, false).unwrap().is_empty());

    let index: KeySet = [4, 8, 15].into_iter().collect();
    store.put_index(10, &index, 0).unwrap();
    assert_eq!(index, store.get_index(10, 0, false).unwrap());

    let replacement: KeySet = [16, 23, 42].into_iter().collect();
    store.update_index(10, &replacement, 0).unwrap();
    assert_eq!(replacement, store.get_index(10, 0, false).unwrap());
}

#[test]
fn test_put_index_conflict() {
    let mut store = relational_store(":memory:");
    let index: KeySet = [1].into_iter().collect();
    store.put_index(6, &index, 1).unwrap();
    assert!(matches!(
        store.put_index(6, &index, 1),
        Err(BackendError::DuplicateIndex { .. })
    ));
}

#[test]
fn test_delete_index_is_idempotent() {
    let mut store = relational_store(":memory:");
    let index: KeySet = [1, 2].into_iter().collect();
    store.put_index(20, &index, 0).unwrap();

    store.delete_index(20, 0).unwrap();
    assert!(store.get_index(20, 0, false).unwrap().is_empty());
    // deleting an id that was never written is not an error
    store.delete_index(20, 0).unwrap();
    store.delete_index(999, 0).unwrap();
}

#[test]
fn test_locked_read_requires_exclusive_session() {
    let mut store = relational_store(":memory:");
    assert!(matches!(
        store.get_cube(1, 0, true),
        Err(BackendError::LockWithoutSession)
    ));

    store.begin(false).unwrap();
    assert!(matches!(
        store.get_cube(1, 0, true),
        Err(BackendError::LockWithoutSession)
    ));
    store.rollback().unwrap();

    store.begin(true).unwrap();
    assert!(store.get_cube(1, 0, true).unwrap().from_zeros());
    assert!(store.get_index(1, 0, true).unwrap().is_empty());
    store.commit().unwrap();
}

#[test]
fn test_session_ownership_is_explicit() {
    let mut store = relational_store(":memory:");
    assert!(matches!(store.commit(), Err(BackendError::NoSession)));
    assert!(matches!(store.rollback(), Err(BackendError::NoSession)));

    store.begin(true).unwrap();
    assert!(matches!(
        store.begin(false),
        Err(BackendError::SessionAlreadyOpen)
    ));
    store.commit().unwrap();
}

#[test]
fn test_rollback_discards_writes() {
    let mut store = relational_store(":memory:");
    store.begin(true).unwrap();
    let cube = store.get_cube(11, 0, true).unwrap();
    store.put_cube(11, 0, &cube).unwrap();
    store.rollback().unwrap();

    assert!(store.get_cube(11, 0, false).unwrap().from_zeros());
}

#[test]
fn test_commit_makes_writes_visible_to_other_sessions() {
    let dir = TempDir::new().unwrap();
    let url = dir.path().join("cubes.db").to_string_lossy().to_string();

    let mut writer = relational_store(&url);
    let geometry = test_geometry();
    let mut reader =
        RelationalStore::open(&url, geometry, crate::codec::codec_for(crate::codec::CodecKind::Zlib))
            .unwrap();

    writer.begin(true).unwrap();
    let mut cube = writer.get_cube(7, 0, true).unwrap();
    cube.data_mut()[[0, 0, 0]] = 123;
    writer.put_cube(7, 0, &cube).unwrap();

    // uncommitted writes are invisible to the other session
    assert!(reader.get_cube(7, 0, false).unwrap().from_zeros());

    writer.commit().unwrap();
    let seen = reader.get_cube(7, 0, false).unwrap();
    assert!(!seen.from_zeros());
    assert_eq!(123, seen.data()[[0, 0, 0]]);
}

#[test]
fn test_unknown_resolution_level() {
    let mut store = relational_store(":memory:");
    assert!(matches!(
        store.get_cube(1, 9, false),
        Err(BackendError::UnknownResolution(9))
    ));
}
