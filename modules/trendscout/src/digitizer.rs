//! Recover a 7-point trend curve from a rendered line-chart snapshot.
//!
//! The dashboard only exposes its popularity series as a `<canvas>` drawing.
//! The chart line is painted in a saturated red over a neutral background, so
//! sampling seven evenly spaced columns and locating the red pixels in each
//! gives an approximate, fixed-resolution reading of the curve.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{GenericImageView, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Number of points read from every chart.
pub const GRAPH_POINTS: usize = 7;

/// Colour test for "this pixel is part of the chart line". Tuned for the
/// dashboard's red theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalThresholds {
    /// Red channel must be strictly above this.
    pub red_min: u8,
    /// Green channel must be strictly below this.
    pub green_max: u8,
    /// Blue channel must be strictly below this.
    pub blue_max: u8,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            red_min: 150,
            green_max: 100,
            blue_max: 100,
        }
    }
}

impl SignalThresholds {
    pub fn is_signal(&self, pixel: Rgba<u8>) -> bool {
        let [r, g, b, _] = pixel.0;
        r > self.red_min && g < self.green_max && b < self.blue_max
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChartDigitizer {
    thresholds: SignalThresholds,
}

impl ChartDigitizer {
    pub fn new(thresholds: SignalThresholds) -> Self {
        Self { thresholds }
    }

    /// Read the curve from a decoded chart, oldest point first.
    ///
    /// Each value is `1 - y/height` for the middle signal pixel of its sample
    /// column, so higher on screen means larger. A column with no signal
    /// pixel reads as `0.0`. The chart draws newest-first from the left, so
    /// the columns are reversed before returning.
    pub fn digitize<I>(&self, image: &I) -> [f64; GRAPH_POINTS]
    where
        I: GenericImageView<Pixel = Rgba<u8>>,
    {
        let (width, height) = image.dimensions();
        let mut values = [0.0; GRAPH_POINTS];
        if width == 0 || height == 0 {
            return values;
        }

        for (i, value) in values.iter_mut().enumerate() {
            *value = self.column_value(image, sample_column(i, width), height);
        }

        values.reverse();
        values
    }

    /// Decode a canvas data URL and digitize it.
    pub fn digitize_data_url(&self, data_url: &str) -> Result<[f64; GRAPH_POINTS]> {
        let image = decode_data_url(data_url)?;
        Ok(self.digitize(&image))
    }

    fn column_value<I>(&self, image: &I, x: u32, height: u32) -> f64
    where
        I: GenericImageView<Pixel = Rgba<u8>>,
    {
        let rows: Vec<u32> = (0..height)
            .filter(|&y| self.thresholds.is_signal(image.get_pixel(x, y)))
            .collect();

        // Middle by position among the hits, not by value.
        match rows.get(rows.len() / 2) {
            Some(&y) => 1.0 - f64::from(y) / f64::from(height),
            None => 0.0,
        }
    }
}

/// x = floor(i * width / 6), clamped to the last column.
fn sample_column(i: usize, width: u32) -> u32 {
    let step = f64::from(width) / (GRAPH_POINTS - 1) as f64;
    let x = (i as f64 * step).floor() as u32;
    x.min(width - 1)
}

/// Decode a `data:image/png;base64,...` URL (or a bare base64 payload) into
/// an RGBA raster.
pub fn decode_data_url(data_url: &str) -> Result<RgbaImage> {
    let payload = match data_url.split_once(',') {
        Some((header, body)) if header.starts_with("data:") => body,
        _ => data_url,
    };
    let bytes = STANDARD.decode(payload.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([200, 50, 50, 255]);

    fn blank(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, WHITE)
    }

    #[test]
    fn single_red_pixel_reads_as_ninety_percent() {
        let mut img = blank(1, 100);
        img.put_pixel(0, 10, RED);

        let digitizer = ChartDigitizer::default();
        assert!((digitizer.column_value(&img, 0, 100) - 0.90).abs() < 1e-12);
    }

    #[test]
    fn one_pixel_wide_chart_samples_the_same_column() {
        let mut img = blank(1, 100);
        img.put_pixel(0, 10, RED);

        let values = ChartDigitizer::default().digitize(&img);
        for v in values {
            assert!((v - 0.90).abs() < 1e-12);
        }
    }

    #[test]
    fn empty_columns_read_as_zero() {
        let values = ChartDigitizer::default().digitize(&blank(60, 40));
        assert_eq!(values, [0.0; GRAPH_POINTS]);
    }

    #[test]
    fn middle_hit_is_chosen_by_position() {
        let mut img = blank(1, 100);
        for y in [10, 20, 90] {
            img.put_pixel(0, y, RED);
        }
        let d = ChartDigitizer::default();
        assert!((d.column_value(&img, 0, 100) - 0.80).abs() < 1e-12);

        // Even count: index len/2 picks the second hit.
        let mut img = blank(1, 100);
        img.put_pixel(0, 10, RED);
        img.put_pixel(0, 30, RED);
        assert!((d.column_value(&img, 0, 100) - 0.70).abs() < 1e-12);
    }

    #[test]
    fn columns_are_reversed_into_chronological_order() {
        // width 61 samples columns 0, 10, 20, 30, 40, 50 and 60 (clamped from 61)
        let mut img = blank(61, 100);
        img.put_pixel(0, 50, RED);
        img.put_pixel(60, 25, RED);

        let values = ChartDigitizer::default().digitize(&img);
        assert!((values[0] - 0.75).abs() < 1e-12);
        assert!((values[GRAPH_POINTS - 1] - 0.50).abs() < 1e-12);
        assert!(values[1..GRAPH_POINTS - 1].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn sample_columns_are_clamped() {
        assert_eq!(sample_column(6, 60), 59);
        assert_eq!(sample_column(3, 60), 30);
        assert_eq!(sample_column(6, 61), 60);
        assert_eq!(sample_column(1, 5), 0);
    }

    #[test]
    fn off_colour_pixels_are_not_signal() {
        let t = SignalThresholds::default();
        assert!(t.is_signal(Rgba([151, 99, 99, 255])));
        assert!(!t.is_signal(Rgba([150, 50, 50, 255])));
        assert!(!t.is_signal(Rgba([220, 100, 50, 255])));
        assert!(!t.is_signal(Rgba([220, 50, 100, 255])));
    }

    #[test]
    fn custom_thresholds_pick_other_themes() {
        let mut img = blank(1, 10);
        img.put_pixel(0, 5, Rgba([120, 30, 30, 255]));

        assert_eq!(ChartDigitizer::default().digitize(&img), [0.0; GRAPH_POINTS]);

        let loose = ChartDigitizer::new(SignalThresholds {
            red_min: 100,
            ..SignalThresholds::default()
        });
        assert!(loose.digitize(&img).iter().all(|&v| (v - 0.5).abs() < 1e-12));
    }

    #[test]
    fn values_stay_in_unit_range_and_are_deterministic() {
        let mut img = blank(70, 33);
        for x in 0..70 {
            img.put_pixel(x, (x * 7) % 33, RED);
        }
        let d = ChartDigitizer::default();
        let first = d.digitize(&img);
        assert_eq!(first, d.digitize(&img));
        assert!(first.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn data_url_round_trips_through_png() {
        let mut img = blank(1, 100);
        img.put_pixel(0, 10, RED);
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let url = format!("data:image/png;base64,{}", STANDARD.encode(&png));

        let d = ChartDigitizer::default();
        let values = d.digitize_data_url(&url).unwrap();
        assert!(values.iter().all(|v| (v - 0.90).abs() < 1e-12));

        // Bare payload without the data: header is accepted too.
        let bare = STANDARD.encode(&png);
        assert_eq!(d.digitize_data_url(&bare).unwrap(), values);
    }

    #[test]
    fn garbage_payload_is_an_error() {
        assert!(decode_data_url("data:image/png;base64,@@@").is_err());
        assert!(decode_data_url(&STANDARD.encode(b"not a png")).is_err());
    }
}
