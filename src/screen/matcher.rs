//! Image matching
//!
//! Compares a live capture against a stored reference using a normalized
//! pixel-difference ratio. Pure and deterministic: the same inputs always
//! produce the same result.

use image::RgbaImage;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    /// The two images have different dimensions. Retrying without fixing
    /// the capture region is pointless, so this propagates instead of
    /// degrading into a boolean.
    #[error("image dimensions differ: reference {reference:?}, live {live:?}")]
    SizeMismatch {
        reference: (u32, u32),
        live: (u32, u32),
    },
}

/// Similarity of two equally-sized images in `0.0..=1.0`, where 1.0 is a
/// pixel-perfect match. Computed as one minus the mean absolute channel
/// difference over all RGBA bytes.
pub fn similarity(reference: &RgbaImage, live: &RgbaImage) -> Result<f64, MatchError> {
    if reference.dimensions() != live.dimensions() {
        return Err(MatchError::SizeMismatch {
            reference: reference.dimensions(),
            live: live.dimensions(),
        });
    }

    let a = reference.as_raw();
    let b = live.as_raw();
    if a.is_empty() {
        return Ok(1.0);
    }

    let total_diff: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();

    Ok(1.0 - total_diff as f64 / (255.0 * a.len() as f64))
}

/// Whether the live capture matches the reference at the given similarity
/// floor. Exact equality is not required.
pub fn matches(reference: &RgbaImage, live: &RgbaImage, threshold: f64) -> Result<bool, MatchError> {
    Ok(similarity(reference, live)? >= threshold)
}
