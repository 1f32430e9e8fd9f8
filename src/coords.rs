/// REST coordinate argument processing.
///
/// Parses and validates the coordinate tails of cutout and annotation
/// URLs against a dataset geometry, producing a normalized local cutout.
/// Every parse function takes the resolution explicitly; there is no
/// ambient parser state to forget to set.
///
/// Path tails handled here, after the resolution segment is stripped:
///
/// * `x1,x2/y1,y2/z1,z2/[GLOBAL/]` - full cutout
/// * `x1,x2/y1,y2/z/[GLOBAL/]`     - xy plane
/// * `x1,x2/y/z1,z2/[GLOBAL/]`     - xz plane
/// * `x/y1,y2/z1,z2/[GLOBAL/]`     - yz plane
/// * `x/y/z/`                      - single voxel
/// * leading `preserve|except|...` - write-conflict policy
use crate::error::{Error, Result};
use crate::geometry::DatasetGeometry;

/// A validated cutout in local coordinates.  The corner's z is relative
/// to the start of the dataset's slice range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutoutRequest {
    pub resolution: u8,
    pub corner: [u64; 3],
    pub dim: [u64; 3],
}

/// Which coordinate space the client supplied x and y in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSpace {
    Local,
    /// Coordinates are expressed at the project's base resolution and
    /// must be rescaled to the requested level.
    Global { base_resolution: u8 },
}

/// Write-conflict policy selected by the leading path segment of an
/// annotation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOption {
    Preserve,
    Exception,
    Overwrite,
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a bare scalar axis argument.
fn scalar(s: &str) -> Result<u64> {
    if !is_digits(s) {
        return Err(Error::BadArguments(format!(
            "non-numeric scalar argument: {:?}",
            s
        )));
    }
    s.parse::<u64>()
        .map_err(|_| Error::BadArguments(format!("scalar argument out of range: {:?}", s)))
}

/// Parse an `a,b` axis-pair argument.
fn extent(s: &str) -> Result<(u64, u64)> {
    let parts = s
        .split_once(',')
        .ok_or_else(|| Error::BadArguments(format!("non-numeric range argument: {:?}", s)))?;
    Ok((scalar(parts.0)?, scalar(parts.1)?))
}

/// Rescale a base-resolution coordinate to the requested level.  Float
/// division with a truncating conversion, so the behavior is symmetric
/// when the requested level is finer than the base.
fn rescale(value: u64, resolution: u8, base_resolution: u8) -> u64 {
    let factor = 2f64.powi(resolution as i32 - base_resolution as i32);
    (value as f64 / factor) as u64
}

fn range_error(geometry: &DatasetGeometry, resolution: u8) -> Error {
    match geometry.image_size(resolution) {
        Some((dims, slices)) => Error::Range(format!(
            "illegal range, image size: [{}, {}], slices: [{}, {}]",
            dims[0], dims[1], slices[0], slices[1]
        )),
        None => Error::Range(format!("resolution {} out of range", resolution)),
    }
}

/// Strip the leading resolution segment from an argument string and
/// return it with the remaining text.
pub fn resolution_arg(restargs: &str) -> Result<(u8, &str)> {
    let (head, rest) = restargs.split_once('/').unwrap_or((restargs, ""));
    if !is_digits(head) {
        return Err(Error::BadArguments(format!(
            "non-numeric resolution: {:?}",
            head
        )));
    }
    let resolution = head
        .parse::<u8>()
        .map_err(|_| Error::BadArguments(format!("resolution out of range: {:?}", head)))?;
    Ok((resolution, rest))
}

/// Process the three axis-pair arguments of a cutout request.
///
/// In global mode x and y are divided down to the requested level; z is
/// never rescaled because the pyramid never subsamples z.
pub fn cutout_args(
    xstr: &str,
    ystr: &str,
    zstr: &str,
    geometry: &DatasetGeometry,
    resolution: u8,
    space: CoordSpace,
) -> Result<CutoutRequest> {
    let (mut x1, mut x2) = extent(xstr)?;
    let (mut y1, mut y2) = extent(ystr)?;
    let (z1, z2) = extent(zstr)?;

    if let CoordSpace::Global { base_resolution } = space {
        x1 = rescale(x1, resolution, base_resolution);
        x2 = rescale(x2, resolution, base_resolution);
        y1 = rescale(y1, resolution, base_resolution);
        y2 = rescale(y2, resolution, base_resolution);
    }

    if !geometry.check_cube(resolution, x1, x2, y1, y2, z1, z2) {
        return Err(range_error(geometry, resolution));
    }

    let slice0 = geometry.slice_range()[0];
    Ok(CutoutRequest {
        resolution,
        corner: [x1, y1, z1 - slice0],
        dim: [x2 - x1, y2 - y1, z2 - z1],
    })
}

/// Split a coordinate path tail into its three axis segments and detect
/// the trailing global-coordinate literal.  The tail of a well-formed
/// URL ends in `/`, so a local request splits into four segments with an
/// empty last one and a global request into five.
fn split_axes(args: &str) -> Result<([&str; 3], bool)> {
    let segments: Vec<&str> = args.split('/').collect();
    match segments.len() {
        4 => Ok(([segments[0], segments[1], segments[2]], false)),
        5 => Ok(([segments[0], segments[1], segments[2]], true)),
        _ => Err(Error::BadArguments(format!(
            "incorrect number of coordinate arguments: {:?}",
            args
        ))),
    }
}

fn space_for(global: bool, base_resolution: u8) -> CoordSpace {
    if global {
        CoordSpace::Global { base_resolution }
    } else {
        CoordSpace::Local
    }
}

/// Process a full cutout path tail, `x1,x2/y1,y2/z1,z2/[GLOBAL/]`.
pub fn cutout_path(
    args: &str,
    geometry: &DatasetGeometry,
    resolution: u8,
    base_resolution: u8,
) -> Result<CutoutRequest> {
    let ([xstr, ystr, zstr], global) = split_axes(args)?;
    cutout_args(
        xstr,
        ystr,
        zstr,
        geometry,
        resolution,
        space_for(global, base_resolution),
    )
}

/// Validate a plane cutout once its scalar axis has been widened to a
/// one-voxel slab.
fn plane_cutout(
    geometry: &DatasetGeometry,
    resolution: u8,
    x: (u64, u64),
    y: (u64, u64),
    z: (u64, u64),
) -> Result<CutoutRequest> {
    if !geometry.check_cube(resolution, x.0, x.1, y.0, y.1, z.0, z.1) {
        return Err(range_error(geometry, resolution));
    }
    let slice0 = geometry.slice_range()[0];
    Ok(CutoutRequest {
        resolution,
        corner: [x.0, y.0, z.0 - slice0],
        dim: [x.1 - x.0, y.1 - y.0, z.1 - z.0],
    })
}

/// Process an xy plane path tail, `x1,x2/y1,y2/z/[GLOBAL/]`.
pub fn xy_path(
    args: &str,
    geometry: &DatasetGeometry,
    resolution: u8,
    base_resolution: u8,
) -> Result<CutoutRequest> {
    let ([xstr, ystr, zstr], global) = split_axes(args)?;
    let (mut x1, mut x2) = extent(xstr)?;
    let (mut y1, mut y2) = extent(ystr)?;
    let z = scalar(zstr)?;
    if global {
        x1 = rescale(x1, resolution, base_resolution);
        x2 = rescale(x2, resolution, base_resolution);
        y1 = rescale(y1, resolution, base_resolution);
        y2 = rescale(y2, resolution, base_resolution);
    }
    plane_cutout(geometry, resolution, (x1, x2), (y1, y2), (z, z + 1))
}

/// Process an xz plane path tail, `x1,x2/y/z1,z2/[GLOBAL/]`.
pub fn xz_path(
    args: &str,
    geometry: &DatasetGeometry,
    resolution: u8,
    base_resolution: u8,
) -> Result<CutoutRequest> {
    let ([xstr, ystr, zstr], global) = split_axes(args)?;
    let (mut x1, mut x2) = extent(xstr)?;
    let mut y = scalar(ystr)?;
    let (z1, z2) = extent(zstr)?;
    if global {
        x1 = rescale(x1, resolution, base_resolution);
        x2 = rescale(x2, resolution, base_resolution);
        y = rescale(y, resolution, base_resolution);
    }
    plane_cutout(geometry, resolution, (x1, x2), (y, y + 1), (z1, z2))
}

/// Process a yz plane path tail, `x/y1,y2/z1,z2/[GLOBAL/]`.
pub fn yz_path(
    args: &str,
    geometry: &DatasetGeometry,
    resolution: u8,
    base_resolution: u8,
) -> Result<CutoutRequest> {
    let ([xstr, ystr, zstr], global) = split_axes(args)?;
    let mut x = scalar(xstr)?;
    let (mut y1, mut y2) = extent(ystr)?;
    let (z1, z2) = extent(zstr)?;
    if global {
        x = rescale(x, resolution, base_resolution);
        y1 = rescale(y1, resolution, base_resolution);
        y2 = rescale(y2, resolution, base_resolution);
    }
    plane_cutout(geometry, resolution, (x, x + 1), (y1, y2), (z1, z2))
}

/// Process a single-voxel path tail, `x/y/z/`.  Returns the validated
/// position in global slice coordinates.
pub fn voxel(args: &str, geometry: &DatasetGeometry, resolution: u8) -> Result<[u64; 3]> {
    let segments: Vec<&str> = args.split('/').collect();
    if segments.len() != 4 {
        return Err(Error::BadArguments(format!(
            "incorrect number of voxel arguments: {:?}",
            args
        )));
    }
    let x = scalar(segments[0])?;
    let y = scalar(segments[1])?;
    let z = scalar(segments[2])?;

    if !geometry.check_cube(resolution, x, x + 1, y, y + 1, z, z + 1) {
        return Err(range_error(geometry, resolution));
    }
    Ok([x, y, z])
}

/// Parse the write-conflict policy from the leading path segment.
/// Anything other than the two named policies selects overwrite.
pub fn conflict_option(args: &str) -> ConflictOption {
    match args.split('/').next() {
        Some("preserve") => ConflictOption::Preserve,
        Some("except") => ConflictOption::Exception,
        _ => ConflictOption::Overwrite,
    }
}
