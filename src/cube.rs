/// Cube and annotation index value types.
use crate::error::BackendError;
use ndarray::Array3;
use std::collections::BTreeSet;

/// The set of spatial keys an annotation occupies at one resolution.
/// Insertion order is irrelevant; a BTreeSet keeps the serialized form
/// stable.
pub type KeySet = BTreeSet<u64>;

/// A fixed-size voxel block at one resolution level.
///
/// The payload is a ZYX-ordered array so a flat slice walks x fastest,
/// matching the on-disk byte order.  A cube materialized for a key with
/// no stored record is zero-filled and carries `created_from_zero`, which
/// the stores use to decide between insert and update on the way back.
pub struct Cube {
    key: u64,
    resolution: u8,
    data: Array3<u8>,
    created_from_zero: bool,
}

impl Cube {
    /// Materialize the default cube for a key that has no stored record.
    pub fn zeros(key: u64, resolution: u8, cube_dim: [u64; 3]) -> Cube {
        Cube {
            key,
            resolution,
            data: Array3::zeros((
                cube_dim[2] as usize,
                cube_dim[1] as usize,
                cube_dim[0] as usize,
            )),
            created_from_zero: true,
        }
    }

    /// Wrap a decompressed payload loaded from storage.  The payload
    /// length must match the level's cube shape.
    pub fn from_payload(
        key: u64,
        resolution: u8,
        cube_dim: [u64; 3],
        payload: Vec<u8>,
    ) -> Result<Cube, BackendError> {
        let shape = (
            cube_dim[2] as usize,
            cube_dim[1] as usize,
            cube_dim[0] as usize,
        );
        let data = Array3::from_shape_vec(shape, payload).map_err(|e| {
            BackendError::Codec(format!(
                "cube payload does not fit shape {}x{}x{}: {}",
                cube_dim[0], cube_dim[1], cube_dim[2], e
            ))
        })?;
        Ok(Cube {
            key,
            resolution,
            data,
            created_from_zero: false,
        })
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// True if this cube was materialized from zeros rather than loaded.
    pub fn from_zeros(&self) -> bool {
        self.created_from_zero
    }

    pub fn data(&self) -> &Array3<u8> {
        &self.data
    }

    /// Callers mutate the voxel payload in place between get and put.
    pub fn data_mut(&mut self) -> &mut Array3<u8> {
        &mut self.data
    }

    /// The flat payload in storage byte order.
    pub fn payload(&self) -> Vec<u8> {
        self.data.clone().into_raw_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_shape_and_flag() {
        let cube = Cube::zeros(42, 1, [128, 128, 16]);
        assert!(cube.from_zeros());
        assert_eq!(&[16, 128, 128], cube.data().shape());
        assert!(cube.payload().iter().all(|&v| v == 0));
    }

    #[test]
    fn payload_round_trip() {
        let dim = [4, 2, 2];
        let bytes: Vec<u8> = (0..16).collect();
        let cube = Cube::from_payload(9, 0, dim, bytes.clone()).unwrap();
        assert!(!cube.from_zeros());
        assert_eq!(bytes, cube.payload());
        // x walks fastest in the flat payload
        assert_eq!(1, cube.data()[[0, 0, 1]]);
        assert_eq!(4, cube.data()[[0, 1, 0]]);
        assert_eq!(8, cube.data()[[1, 0, 0]]);
    }

    #[test]
    fn payload_shape_mismatch() {
        assert!(Cube::from_payload(9, 0, [4, 4, 4], vec![0u8; 63]).is_err());
    }
}
