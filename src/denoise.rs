//! Edge-preserving bilateral filter for the distance channel.
//!
//! Applied by consumers after a frame is dequeued. Each valid pixel becomes a weighted
//! mean of its valid neighbours inside a `window x window` square, with each weight the
//! product of a spatial Gaussian and a range Gaussian on the distance difference.
//! Invalid pixels (`INVALID_DISTANCE`) are neither used as neighbours nor rewritten.

use crate::error::QueueError;
use crate::frame::{Frame, INVALID_DISTANCE};

const DEFAULT_WINDOW: usize = 5;
const DEFAULT_SIGMA_SPATIAL: f32 = 1.5;
const DEFAULT_SIGMA_RANGE: f32 = 30.0;

#[derive(Clone, Debug, PartialEq)]
pub struct DenoiseParams {
    /// Square window edge in pixels. Must be odd and at least 3.
    pub window: usize,
    pub sigma_spatial: f32,
    /// In distance units.
    pub sigma_range: f32,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            sigma_spatial: DEFAULT_SIGMA_SPATIAL,
            sigma_range: DEFAULT_SIGMA_RANGE,
        }
    }
}

impl DenoiseParams {
    pub fn validate(&self) -> Result<(), QueueError> {
        let window_ok = self.window >= 3 && self.window % 2 == 1;
        let sigmas_ok = self.sigma_spatial.is_finite()
            && self.sigma_spatial > 0.0
            && self.sigma_range.is_finite()
            && self.sigma_range > 0.0;
        if window_ok && sigmas_ok {
            Ok(())
        } else {
            Err(QueueError::InvalidParameter)
        }
    }

    fn spatial_kernel(&self) -> Vec<f32> {
        let radius = (self.window / 2) as i64;
        let denom = 2.0 * self.sigma_spatial * self.sigma_spatial;
        let mut kernel = Vec::with_capacity(self.window * self.window);
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let dist_sq = (dx * dx + dy * dy) as f32;
                kernel.push((-dist_sq / denom).exp());
            }
        }
        kernel
    }
}

/// Run the bilateral filter over `frame`'s distance channel in place.
///
/// The sealed checksum is left untouched: verify it before calling this, and call
/// `Frame::seal` afterwards if the frame is passed on.
pub fn apply_denoise(frame: &mut Frame, params: &DenoiseParams) -> Result<(), QueueError> {
    params.validate()?;
    let width = frame.width as usize;
    let height = frame.height as usize;
    if frame.distance().len() != width * height {
        return Err(QueueError::InvalidParameter);
    }

    let radius = (params.window / 2) as i64;
    let kernel = params.spatial_kernel();
    let range_denom = 2.0 * params.sigma_range * params.sigma_range;
    let source = frame.distance().to_vec();
    let output = frame.distance_mut();

    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let index = (y as usize) * width + x as usize;
            let center = source[index];
            if center == INVALID_DISTANCE {
                continue;
            }

            let mut weighted_sum = 0.0f32;
            let mut weight_total = 0.0f32;
            for dy in -radius..=radius {
                let ny = y + dy;
                if ny < 0 || ny >= height as i64 {
                    continue;
                }
                for dx in -radius..=radius {
                    let nx = x + dx;
                    if nx < 0 || nx >= width as i64 {
                        continue;
                    }
                    let neighbour = source[(ny as usize) * width + nx as usize];
                    if neighbour == INVALID_DISTANCE {
                        continue;
                    }
                    let diff = f32::from(neighbour) - f32::from(center);
                    let spatial =
                        kernel[((dy + radius) * params.window as i64 + (dx + radius)) as usize];
                    let weight = spatial * (-(diff * diff) / range_denom).exp();
                    weighted_sum += weight * f32::from(neighbour);
                    weight_total += weight;
                }
            }

            // The centre always contributes weight 1, so the total is never zero.
            output[index] = (weighted_sum / weight_total)
                .round()
                .clamp(1.0, f32::from(u16::MAX)) as u16;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_from(width: u32, height: u32, distance: Vec<u16>) -> Frame {
        let amplitude = vec![0; distance.len()];
        Frame::new(1, width, height, distance, amplitude).unwrap()
    }

    #[test]
    fn rejects_bad_windows() {
        let mut frame = frame_from(3, 3, vec![100; 9]);
        for window in [0, 1, 2, 4, 6] {
            let params = DenoiseParams {
                window,
                ..DenoiseParams::default()
            };
            assert_eq!(
                apply_denoise(&mut frame, &params),
                Err(QueueError::InvalidParameter)
            );
        }
        let params = DenoiseParams {
            sigma_range: 0.0,
            ..DenoiseParams::default()
        };
        assert!(apply_denoise(&mut frame, &params).is_err());
    }

    #[test]
    fn constant_image_unchanged() {
        let mut frame = frame_from(6, 4, vec![1234; 24]);
        apply_denoise(&mut frame, &DenoiseParams::default()).unwrap();
        assert!(frame.distance().iter().all(|&d| d == 1234));
        assert!(frame.verify_checksum());
    }

    #[test]
    fn preserves_sharp_edges() {
        let mut distance = Vec::new();
        for _ in 0..4 {
            distance.extend_from_slice(&[1000, 1000, 1000, 3000, 3000, 3000]);
        }
        let mut frame = frame_from(6, 4, distance.clone());
        let params = DenoiseParams {
            window: 3,
            sigma_spatial: 1.0,
            sigma_range: 10.0,
        };
        apply_denoise(&mut frame, &params).unwrap();
        assert_eq!(frame.distance(), distance.as_slice());
    }

    #[test]
    fn smooths_isolated_noise() {
        let mut distance = vec![1000u16; 25];
        distance[12] = 1020;
        let mut frame = frame_from(5, 5, distance);
        apply_denoise(&mut frame, &DenoiseParams::default()).unwrap();
        let centre = frame.distance()[12];
        assert!(centre < 1020 && centre >= 1000, "centre was {}", centre);
    }

    #[test]
    fn invalid_pixels_untouched_and_ignored() {
        let mut distance = vec![2000u16; 9];
        distance[4] = INVALID_DISTANCE;
        distance[0] = INVALID_DISTANCE;
        let mut frame = frame_from(3, 3, distance);
        apply_denoise(&mut frame, &DenoiseParams::default()).unwrap();
        assert_eq!(frame.distance()[4], INVALID_DISTANCE);
        assert_eq!(frame.distance()[0], INVALID_DISTANCE);
        assert_eq!(frame.distance()[8], 2000);
    }
}
