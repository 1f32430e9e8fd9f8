//! Spatial cube and annotation-index storage for multi-resolution
//! volumetric datasets.
//!
//! Datasets are partitioned into fixed-size voxel cubes addressed by an
//! opaque spatial key.  This crate derives each dataset's resolution
//! pyramid, resolves REST coordinate arguments into validated local
//! cutouts, and stores cubes and annotation indexes behind a
//! backend-polymorphic repository.  HTTP dispatch, image encoding, and
//! spatial-key construction live outside this crate.

pub mod codec;
pub mod config;
pub mod coords;
pub mod cube;
pub mod db;
pub mod error;
pub mod geometry;
pub mod store;
