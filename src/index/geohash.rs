//! Geohash cells: interleaved latitude/longitude bits at a given step.
//!
//! A cell at step `s` carries `2 * s` bits. Dropping the low `2 * k` bits
//! of a cell yields its enclosing cell at step `s - k`.

use crate::error::{Result, SegmergeError};

pub const GEO_STEP_MAX: usize = 26; // 52 bits
pub const GEO_LAT_MIN: f64 = -85.05112878;
pub const GEO_LAT_MAX: f64 = 85.05112878;
pub const GEO_LONG_MIN: f64 = -180.0;
pub const GEO_LONG_MAX: f64 = 180.0;

const B: [u64; 5] = [
    0x5555555555555555,
    0x3333333333333333,
    0x0F0F0F0F0F0F0F0F,
    0x00FF00FF00FF00FF,
    0x0000FFFF0000FFFF,
];

const S: [u32; 5] = [1, 2, 4, 8, 16];

/// Spread the bits of `x` and `y` so that `x` lands on even positions.
#[inline]
fn interleave64(xlo: u32, ylo: u32) -> u64 {
    let mut x = xlo as u64;
    let mut y = ylo as u64;

    for i in (0..S.len()).rev() {
        x = (x | (x << S[i])) & B[i];
        y = (y | (y << S[i])) & B[i];
    }

    x | (y << 1)
}

pub fn check_step(step: usize) -> Result<()> {
    if (1..=GEO_STEP_MAX).contains(&step) {
        Ok(())
    } else {
        Err(SegmergeError::config(format!(
            "geohash step {step} not in range 1..={GEO_STEP_MAX}"
        )))
    }
}

/// Cell containing a coordinate at `step`.
pub fn encode(longitude: f64, latitude: f64, step: usize) -> Result<u64> {
    check_step(step)?;
    if !(GEO_LONG_MIN..=GEO_LONG_MAX).contains(&longitude)
        || !(GEO_LAT_MIN..=GEO_LAT_MAX).contains(&latitude)
    {
        return Err(SegmergeError::config(format!(
            "coordinate ({longitude}, {latitude}) outside the geohash range"
        )));
    }

    let cells = (1u64 << step) as f64;
    let max_cell = (1u64 << step) - 1;
    let long_offset = (longitude - GEO_LONG_MIN) / (GEO_LONG_MAX - GEO_LONG_MIN);
    let lat_offset = (latitude - GEO_LAT_MIN) / (GEO_LAT_MAX - GEO_LAT_MIN);

    // The upper edge of the range belongs to the last cell.
    let long_cell = ((long_offset * cells) as u64).min(max_cell);
    let lat_cell = ((lat_offset * cells) as u64).min(max_cell);

    Ok(interleave64(lat_cell as u32, long_cell as u32))
}

/// Enclosing cell at the coarser (or equal) step `to`.
///
/// Refining to a finer step is impossible and reported as a configuration
/// error.
pub fn coarsen(cell: u64, from: usize, to: usize) -> Result<u64> {
    check_step(from)?;
    check_step(to)?;
    if to > from {
        return Err(SegmergeError::config(format!(
            "cannot refine geohash cells from step {from} to step {to}"
        )));
    }

    Ok(cell >> (2 * (from - to)))
}
