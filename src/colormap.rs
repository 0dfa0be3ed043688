use image::{Rgba, RgbaImage};

use crate::grid::Grid;

/// Red-white-blue diverging scale for coordinate values in [0, 1].
/// 0.0 renders deep red, 0.5 near-white, 1.0 deep blue.
const RDBU_LOW: [f32; 3] = [178.0, 24.0, 43.0];
const RDBU_MID: [f32; 3] = [247.0, 247.0, 247.0];
const RDBU_HIGH: [f32; 3] = [33.0, 102.0, 172.0];

/// Cool-warm scale used for the difference map; blue below zero, warm red
/// above, neutral gray at zero.
const COOLWARM_LOW: [f32; 3] = [59.0, 76.0, 192.0];
const COOLWARM_MID: [f32; 3] = [221.0, 221.0, 221.0];
const COOLWARM_HIGH: [f32; 3] = [180.0, 4.0, 38.0];

fn lerp(a: [f32; 3], b: [f32; 3], t: f32) -> Rgba<u8> {
    let mix = |i: usize| (a[i] + (b[i] - a[i]) * t).round().clamp(0.0, 255.0) as u8;
    Rgba([mix(0), mix(1), mix(2), 255])
}

fn diverging(low: [f32; 3], mid: [f32; 3], high: [f32; 3], t: f32) -> Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        lerp(low, mid, t * 2.0)
    } else {
        lerp(mid, high, (t - 0.5) * 2.0)
    }
}

/// Maps a coordinate value in [0, 1] onto the landscape color scale.
pub fn coordinate_color(value: f32) -> Rgba<u8> {
    diverging(RDBU_LOW, RDBU_MID, RDBU_HIGH, value)
}

/// Maps a difference value onto a symmetric scale centered at zero with
/// range `±max_abs`. A zero range renders uniformly neutral.
pub fn difference_color(value: f32, max_abs: f32) -> Rgba<u8> {
    let t = if max_abs > 0.0 {
        0.5 + value / (2.0 * max_abs)
    } else {
        0.5
    };
    diverging(COOLWARM_LOW, COOLWARM_MID, COOLWARM_HIGH, t)
}

/// Rasterizes a grid into an image, one `pixels_per_cell` square block per
/// grid cell, colored by `color_of`.
pub fn rasterize<F>(grid: &Grid, pixels_per_cell: u32, color_of: F) -> RgbaImage
where
    F: Fn(f32) -> Rgba<u8>,
{
    let width = grid.cols() as u32 * pixels_per_cell;
    let height = grid.rows() as u32 * pixels_per_cell;
    let mut image = RgbaImage::new(width, height);

    for row in 0..grid.rows() {
        let color_row: Vec<Rgba<u8>> = (0..grid.cols())
            .map(|col| color_of(grid.get(row, col)))
            .collect();
        for dy in 0..pixels_per_cell {
            let y = row as u32 * pixels_per_cell + dy;
            for (col, &color) in color_row.iter().enumerate() {
                for dx in 0..pixels_per_cell {
                    let x = col as u32 * pixels_per_cell + dx;
                    image.put_pixel(x, y, color);
                }
            }
        }
    }

    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_scale_endpoints() {
        assert_eq!(coordinate_color(0.0), Rgba([178, 24, 43, 255]));
        assert_eq!(coordinate_color(1.0), Rgba([33, 102, 172, 255]));
        // Mid-scale is near-white
        let mid = coordinate_color(0.5);
        assert!(mid.0[..3].iter().all(|&c| c > 230));
    }

    #[test]
    fn coordinate_scale_clamps_out_of_range() {
        assert_eq!(coordinate_color(-3.0), coordinate_color(0.0));
        assert_eq!(coordinate_color(7.0), coordinate_color(1.0));
    }

    #[test]
    fn difference_scale_is_symmetric_around_zero() {
        assert_eq!(difference_color(0.0, 0.5), difference_color(0.0, 2.0));
        assert_eq!(difference_color(-0.5, 0.5), Rgba([59, 76, 192, 255]));
        assert_eq!(difference_color(0.5, 0.5), Rgba([180, 4, 38, 255]));
    }

    #[test]
    fn zero_range_difference_is_neutral() {
        let neutral = difference_color(0.0, 0.0);
        assert_eq!(neutral, difference_color(123.0, 0.0));
    }

    #[test]
    fn rasterize_scales_cells_to_blocks() {
        let grid = Grid::from_data(2, 3, vec![0.0, 0.5, 1.0, 1.0, 0.5, 0.0]);
        let image = rasterize(&grid, 4, coordinate_color);

        assert_eq!(image.dimensions(), (12, 8));
        assert_eq!(*image.get_pixel(0, 0), coordinate_color(0.0));
        assert_eq!(*image.get_pixel(3, 3), coordinate_color(0.0));
        assert_eq!(*image.get_pixel(11, 7), coordinate_color(0.0));
        assert_eq!(*image.get_pixel(4, 0), coordinate_color(0.5));
    }
}
