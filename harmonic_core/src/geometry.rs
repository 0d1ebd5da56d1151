//! Iso-latitude ring layout of a HEALPix resolution.

use crate::error::TransformResult;
use crate::pixel::{self, locate_ring_pixel};

/// One iso-latitude ring of pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ring {
    /// Colatitude of the ring centre line
    pub mean_colatitude: f64,
    /// `cos θ`, exact from the pixel arithmetic
    pub cos_colatitude: f64,
    /// `sin θ`, exact from the pixel arithmetic
    pub sin_colatitude: f64,
    /// Longitude of the first pixel; the reference for phase alignment
    pub longitude_offset: f64,
    pub ring_length: usize,
    /// Index of the ring's first pixel in ring ordering
    pub start_pixel: usize,
}

/// All rings of one resolution, north to south.
#[derive(Debug, Clone)]
pub struct RingSet {
    nside: usize,
    rings: Vec<Ring>,
}

impl RingSet {
    /// Derives the `4N − 1` rings of resolution `nside`.
    ///
    /// Callers validate `nside` first; see [`pixel::check_nside`].
    pub fn build(nside: usize) -> TransformResult<Self> {
        pixel::check_nside(nside, usize::MAX)?;

        let lengths = ring_lengths(nside);
        let mut rings = Vec::with_capacity(lengths.len());
        let mut start = 0usize;
        for ring_length in lengths {
            let loc = locate_ring_pixel(nside, start);
            rings.push(Ring {
                mean_colatitude: loc.sin_theta.atan2(loc.z),
                cos_colatitude: loc.z,
                sin_colatitude: loc.sin_theta,
                longitude_offset: loc.phi,
                ring_length,
                start_pixel: start,
            });
            start += ring_length;
        }

        Ok(Self { nside, rings })
    }

    pub fn nside(&self) -> usize {
        self.nside
    }

    pub fn lmax(&self) -> usize {
        pixel::lmax(self.nside)
    }

    pub fn len(&self) -> usize {
        self.rings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ring> {
        self.rings.iter()
    }

    pub fn cos_colatitudes(&self) -> Vec<f64> {
        self.rings.iter().map(|r| r.cos_colatitude).collect()
    }

    pub fn sin_colatitudes(&self) -> Vec<f64> {
        self.rings.iter().map(|r| r.sin_colatitude).collect()
    }

    pub fn colatitudes(&self) -> Vec<f64> {
        self.rings.iter().map(|r| r.mean_colatitude).collect()
    }

    /// Solid angle of one pixel, `4π / 12N²`.
    pub fn pixel_area(&self) -> f64 {
        4.0 * std::f64::consts::PI / pixel::npix(self.nside) as f64
    }
}

/// Ring pixel counts: `4(k+1)` in the north cap, `4N` across the belt and
/// `4(N−1−k)` in the south cap.
pub fn ring_lengths(nside: usize) -> Vec<usize> {
    let north = (0..nside.saturating_sub(1)).map(|k| 4 * (k + 1));
    let belt = std::iter::repeat(4 * nside).take(2 * nside + 1);
    let south = (0..nside.saturating_sub(1)).map(move |k| 4 * (nside - 1 - k));
    north.chain(belt).chain(south).collect()
}
