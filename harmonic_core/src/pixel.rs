//! HEALPix pixel primitives.
//!
//! Integer arithmetic for the equal-area ring scheme: pixel → angle, and the
//! ring ↔ nested permutation used when callers hand in nested-ordered maps.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{TransformError, TransformResult};

/// Largest resolution accepted unless the engine is configured otherwise.
pub const MAX_NSIDE: usize = 1 << 13;

// Face layout of the base-resolution pixels: ring index and longitude index
// of each face centre in units of nside.
const JRLL: [usize; 12] = [2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
const JPLL: [usize; 12] = [1, 3, 5, 7, 0, 2, 4, 6, 1, 3, 5, 7];

/// Pixel ordering of an input map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelOrdering {
    /// Ring-major ordering, north to south
    #[default]
    Ring,
    /// Hierarchical nested ordering
    Nested,
}

/// Total pixel count `12·N²`.
pub fn npix(nside: usize) -> usize {
    12 * nside * nside
}

/// Number of iso-latitude rings `4N − 1`.
pub fn nring(nside: usize) -> usize {
    4 * nside - 1
}

/// Band limit `3N − 1`.
pub fn lmax(nside: usize) -> usize {
    3 * nside - 1
}

/// Validates a ring-scheme resolution against `max_nside`.
pub fn check_nside(nside: usize, max_nside: usize) -> TransformResult<()> {
    if nside == 0 {
        return Err(TransformError::invalid_resolution(
            nside,
            "resolution must be positive",
        ));
    }
    if nside > max_nside {
        return Err(TransformError::invalid_resolution(
            nside,
            format!("resolution exceeds the supported maximum {}", max_nside),
        ));
    }
    Ok(())
}

/// Nested ordering is only defined for power-of-two resolutions.
pub fn check_nested_nside(nside: usize) -> TransformResult<()> {
    if !nside.is_power_of_two() {
        return Err(TransformError::invalid_resolution(
            nside,
            "nested ordering needs a power of two",
        ));
    }
    Ok(())
}

/// Recovers `N` from a map length, which must be exactly `12·N²`.
pub fn nside_from_npix(len: usize) -> TransformResult<usize> {
    let nside = isqrt(len as u64 / 12) as usize;
    if nside == 0 || npix(nside) != len {
        return Err(TransformError::shape_mismatch(
            npix(nside.max(1)),
            len,
            "map length (12·N² pixels)",
        ));
    }
    Ok(nside)
}

/// Colatitude and longitude of the centre of ring-scheme pixel `pix`.
pub fn pix2ang_ring(nside: usize, pix: usize) -> (f64, f64) {
    let loc = locate_ring_pixel(nside, pix);
    // atan2 keeps polar colatitudes accurate where acos(z) would not.
    (loc.sin_theta.atan2(loc.z), loc.phi)
}

/// Pixel centre expressed through `z = cos θ` and `sin θ` directly, which
/// keeps full precision close to the poles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelLocation {
    pub z: f64,
    pub sin_theta: f64,
    pub phi: f64,
    /// 1-based ring number counted from the north pole
    pub ring: usize,
}

pub fn locate_ring_pixel(nside: usize, pix: usize) -> PixelLocation {
    debug_assert!(pix < npix(nside));
    let n = nside as u64;
    let p = pix as u64;
    let npix = 12 * n * n;
    let ncap = 2 * n * (n - 1);
    let three_n2 = 3.0 * (n * n) as f64;

    if p < ncap {
        let iring = (1 + isqrt(1 + 2 * p)) / 2;
        let iphi = p + 1 - 2 * iring * (iring - 1);
        let tmp = (iring * iring) as f64 / three_n2;
        PixelLocation {
            z: 1.0 - tmp,
            sin_theta: (tmp * (2.0 - tmp)).sqrt(),
            phi: (iphi as f64 - 0.5) * PI / (2.0 * iring as f64),
            ring: iring as usize,
        }
    } else if p < npix - ncap {
        let ip = p - ncap;
        let iring = ip / (4 * n) + n;
        let iphi = ip % (4 * n) + 1;
        let fodd = if (iring + n) & 1 == 1 { 1.0 } else { 0.5 };
        let z = (2 * n) as f64 - iring as f64;
        let z = z * 2.0 / (3.0 * n as f64);
        PixelLocation {
            z,
            sin_theta: ((1.0 - z) * (1.0 + z)).sqrt(),
            phi: (iphi as f64 - fodd) * PI / (2.0 * n as f64),
            ring: iring as usize,
        }
    } else {
        let ip = npix - p;
        let iring = (1 + isqrt(2 * ip - 1)) / 2;
        let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
        let tmp = (iring * iring) as f64 / three_n2;
        PixelLocation {
            z: tmp - 1.0,
            sin_theta: (tmp * (2.0 - tmp)).sqrt(),
            phi: (iphi as f64 - 0.5) * PI / (2.0 * iring as f64),
            ring: (4 * n - iring) as usize,
        }
    }
}

/// Maps a nested-scheme pixel to its ring-scheme index.
pub fn nest2ring(nside: usize, pix: usize) -> TransformResult<usize> {
    check_nested_nside(nside)?;
    let total = npix(nside);
    if pix >= total {
        return Err(TransformError::invalid_parameter(
            "pix",
            pix.to_string(),
            format!("< {}", total),
        ));
    }

    let order = nside.trailing_zeros();
    let face = pix >> (2 * order);
    let ipf = pix & (nside * nside - 1);
    let ix = compress_bits(ipf);
    let iy = compress_bits(ipf >> 1);

    Ok(xyf2ring(nside, ix, iy, face))
}

/// Gather indices `idx` such that `ring_map[i] = nested_map[idx[i]]`.
pub fn ring_to_nest_indices(nside: usize) -> TransformResult<Vec<usize>> {
    check_nested_nside(nside)?;
    let total = npix(nside);
    let mut idx = vec![0usize; total];
    for nest in 0..total {
        idx[nest2ring(nside, nest)?] = nest;
    }
    Ok(idx)
}

/// Reorders a nested map into ring ordering.
pub fn nested_to_ring<T: Copy>(map: &[T]) -> TransformResult<Vec<T>> {
    let nside = nside_from_npix(map.len())?;
    let idx = ring_to_nest_indices(nside)?;
    Ok(idx.iter().map(|&i| map[i]).collect())
}

fn xyf2ring(nside: usize, ix: usize, iy: usize, face: usize) -> usize {
    let n = nside as i64;
    let nl4 = 4 * n;
    let jr = JRLL[face] as i64 * n - ix as i64 - iy as i64 - 1;

    let (nr, n_before, kshift) = if jr < n {
        (jr, 2 * jr * (jr - 1), 0)
    } else if jr > 3 * n {
        let nr = nl4 - jr;
        (nr, 12 * n * n - 2 * (nr + 1) * nr, 0)
    } else {
        (n, 2 * n * (n - 1) + (jr - n) * nl4, (jr - n) & 1)
    };

    let mut jp = (JPLL[face] as i64 * nr + ix as i64 - iy as i64 + 1 + kshift) / 2;
    if jp > nl4 {
        jp -= nl4;
    }
    if jp < 1 {
        jp += nl4;
    }
    (n_before + jp - 1) as usize
}

fn compress_bits(v: usize) -> usize {
    let mut out = 0usize;
    let mut bit = 0;
    let mut rest = v;
    while rest != 0 {
        out |= (rest & 1) << bit;
        rest >>= 2;
        bit += 1;
    }
    out
}

fn isqrt(v: u64) -> u64 {
    let mut r = (v as f64).sqrt() as u64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}
