use std::collections::VecDeque;

use image::{ImageBuffer, Luma};
use imageproc::{
    distance_transform::Norm,
    morphology,
    region_labelling::{connected_components, Connectivity},
};

use crate::binary::BinaryMask;

/// Label image produced by 4-connected labelling; 0 is background.
pub type Labels = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Structuring-element radii above this saturate to it.
pub const MAX_RADIUS: u32 = u8::MAX as u32;

fn clamp_radius(radius: u32) -> u8 {
    radius.min(MAX_RADIUS) as u8
}

/// Binary closing with a disk of the given radius.
pub fn close_disk(mask: &BinaryMask, radius: u32) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    BinaryMask::from_luma(morphology::close(mask.as_luma(), Norm::L2, clamp_radius(radius)))
}

/// Binary dilation with a disk of the given radius. Radius 0 is the identity.
pub fn dilate_disk(mask: &BinaryMask, radius: u32) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    BinaryMask::from_luma(morphology::dilate(mask.as_luma(), Norm::L2, clamp_radius(radius)))
}

/// Fill background regions that cannot be reached from the image border
/// through 4-connected background pixels.
pub fn fill_holes(mask: &BinaryMask) -> BinaryMask {
    let (w, h) = mask.dimensions();
    let mut outside = BinaryMask::new(w, h);
    let mut queue = VecDeque::new();

    let seed = |x: u32, y: u32, outside: &mut BinaryMask, queue: &mut VecDeque<(u32, u32)>| {
        if !mask.get(x, y) && !outside.get(x, y) {
            outside.set(x, y, true);
            queue.push_back((x, y));
        }
    };
    for x in 0..w {
        seed(x, 0, &mut outside, &mut queue);
        seed(x, h - 1, &mut outside, &mut queue);
    }
    for y in 0..h {
        seed(0, y, &mut outside, &mut queue);
        seed(w - 1, y, &mut outside, &mut queue);
    }

    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbors4(x, y, w, h) {
            if !mask.get(nx, ny) && !outside.get(nx, ny) {
                outside.set(nx, ny, true);
                queue.push_back((nx, ny));
            }
        }
    }

    outside.invert()
}

/// Label 4-connected foreground regions. Returns the labels and the number of
/// regions; labels run from 1 to that count.
pub fn label_components(mask: &BinaryMask) -> (Labels, u32) {
    let labels = connected_components(mask.as_luma(), Connectivity::Four, Luma([0u8]));
    let count = labels.pixels().map(|p| p[0]).max().unwrap_or(0);
    (labels, count)
}

/// In-bounds 4-neighbours of `(x, y)`.
pub(crate) fn neighbors4(x: u32, y: u32, w: u32, h: u32) -> impl Iterator<Item = (u32, u32)> {
    let left = (x > 0).then(|| (x - 1, y));
    let right = (x + 1 < w).then(|| (x + 1, y));
    let up = (y > 0).then(|| (x, y - 1));
    let down = (y + 1 < h).then(|| (x, y + 1));
    [left, right, up, down].into_iter().flatten()
}

/// In-bounds 8-neighbours of `(x, y)`.
pub(crate) fn neighbors8(x: u32, y: u32, w: u32, h: u32) -> impl Iterator<Item = (u32, u32)> {
    (-1i64..=1)
        .flat_map(|dy| (-1i64..=1).map(move |dx| (dx, dy)))
        .filter(|&(dx, dy)| dx != 0 || dy != 0)
        .map(move |(dx, dy)| (x as i64 + dx, y as i64 + dy))
        .filter(move |&(nx, ny)| nx >= 0 && ny >= 0 && nx < w as i64 && ny < h as i64)
        .map(|(nx, ny)| (nx as u32, ny as u32))
}
