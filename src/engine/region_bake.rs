// Offline region bake: classified raster -> polygon rings.
//
// 1. Label 4-connected components of walkable and non-walkable pixels (BFS).
// 2. Trace each component's outer contour with Moore-neighbour tracing.
// 3. Drop contour points closer than `tolerance` to the last kept point.
// 4. Non-walkable components whose centroid falls inside a walkable ring
//    become obstacle rings. Components touching the raster edge are the
//    exterior and are never promoted.
//
// Runs once when region data is produced, never inside a frame.

use std::collections::VecDeque;

use glam::{IVec2, Vec2};

use super::navigation::{Boundary, PolygonRing, RegionData};

// ============================================================================
// RASTER MASK
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Walkable,
    Obstacle,
    Other,
}

impl PixelClass {
    fn is_walkable(self) -> bool {
        self == PixelClass::Walkable
    }
}

/// Classified raster. Pixel (x, y) maps to the world square starting at
/// `origin + (x, y) * pixel_size`.
#[derive(Debug, Clone)]
pub struct RasterMask {
    pub width: u32,
    pub height: u32,
    pub origin: Vec2,
    pub pixel_size: f32,
    pixels: Vec<PixelClass>,
}

impl RasterMask {
    pub fn from_fn(
        width: u32,
        height: u32,
        origin: Vec2,
        pixel_size: f32,
        mut classify: impl FnMut(u32, u32) -> PixelClass,
    ) -> Self {
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(classify(x, y));
            }
        }
        Self { width, height, origin, pixel_size, pixels }
    }

    pub fn get(&self, x: u32, y: u32) -> PixelClass {
        self.pixels[(y * self.width + x) as usize]
    }

    fn to_world(&self, p: IVec2) -> Vec2 {
        self.origin + (p.as_vec2() + Vec2::splat(0.5)) * self.pixel_size
    }

    fn bounds(&self) -> Boundary {
        Boundary {
            min_x: self.origin.x,
            max_x: self.origin.x + self.width as f32 * self.pixel_size,
            min_y: self.origin.y,
            max_y: self.origin.y + self.height as f32 * self.pixel_size,
        }
    }
}

// ============================================================================
// COMPONENT LABELLING
// ============================================================================

struct Component {
    label: u32,
    walkable: bool,
    /// First pixel in raster order; its west neighbour is outside.
    start: IVec2,
    pixel_sum: Vec2,
    pixel_count: u32,
    touches_edge: bool,
}

struct Labels {
    width: i32,
    height: i32,
    labels: Vec<u32>,
}

impl Labels {
    fn at(&self, p: IVec2) -> Option<u32> {
        if p.x < 0 || p.y < 0 || p.x >= self.width || p.y >= self.height {
            return None;
        }
        Some(self.labels[(p.y * self.width + p.x) as usize])
    }
}

fn label_components(mask: &RasterMask) -> (Labels, Vec<Component>) {
    let (w, h) = (mask.width as i32, mask.height as i32);
    let mut labels = Labels {
        width: w,
        height: h,
        labels: vec![u32::MAX; (mask.width * mask.height) as usize],
    };
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if labels.labels[idx] != u32::MAX {
                continue;
            }
            let label = components.len() as u32;
            let walkable = mask.get(x as u32, y as u32).is_walkable();
            let mut comp = Component {
                label,
                walkable,
                start: IVec2::new(x, y),
                pixel_sum: Vec2::ZERO,
                pixel_count: 0,
                touches_edge: false,
            };

            labels.labels[idx] = label;
            queue.push_back(IVec2::new(x, y));
            while let Some(p) = queue.pop_front() {
                comp.pixel_sum += p.as_vec2();
                comp.pixel_count += 1;
                if p.x == 0 || p.y == 0 || p.x == w - 1 || p.y == h - 1 {
                    comp.touches_edge = true;
                }
                for d in [IVec2::NEG_X, IVec2::X, IVec2::NEG_Y, IVec2::Y] {
                    let n = p + d;
                    if labels.at(n) != Some(u32::MAX) {
                        continue;
                    }
                    if mask.get(n.x as u32, n.y as u32).is_walkable() == walkable {
                        labels.labels[(n.y * w + n.x) as usize] = label;
                        queue.push_back(n);
                    }
                }
            }
            components.push(comp);
        }
    }
    (labels, components)
}

// ============================================================================
// MOORE-NEIGHBOUR TRACING
// ============================================================================

/// Clockwise (y down) starting from west.
const MOORE: [IVec2; 8] = [
    IVec2::new(-1, 0),
    IVec2::new(-1, -1),
    IVec2::new(0, -1),
    IVec2::new(1, -1),
    IVec2::new(1, 0),
    IVec2::new(1, 1),
    IVec2::new(0, 1),
    IVec2::new(-1, 1),
];

/// Outer contour of one component in pixel coordinates.
fn trace_contour(labels: &Labels, comp: &Component) -> Vec<IVec2> {
    let inside = |p: IVec2| labels.at(p) == Some(comp.label);
    let step = |current: IVec2, backtrack: IVec2| -> Option<(IVec2, IVec2)> {
        let from = MOORE.iter().position(|&d| current + d == backtrack)?;
        (1..=8).find_map(|k| {
            let idx = (from + k) % 8;
            let candidate = current + MOORE[idx];
            inside(candidate).then(|| (candidate, current + MOORE[(idx + 7) % 8]))
        })
    };

    let start = comp.start;
    let mut contour = vec![start];
    let Some((first, mut backtrack)) = step(start, start + IVec2::NEG_X) else {
        return contour;
    };
    let mut current = first;
    let limit = 4 * comp.pixel_count as usize + 8;

    // Stop when the first move (start -> first) is about to repeat.
    while contour.len() <= limit {
        let Some((next, next_backtrack)) = step(current, backtrack) else {
            break;
        };
        contour.push(current);
        if current == start && next == first {
            contour.pop();
            break;
        }
        current = next;
        backtrack = next_backtrack;
    }
    contour
}

/// Keep a point only if it is at least `tolerance` from the last kept one.
pub fn simplify_ring(points: &[Vec2], tolerance: f32) -> Vec<Vec2> {
    let mut kept: Vec<Vec2> = Vec::with_capacity(points.len());
    for &p in points {
        match kept.last() {
            Some(&last) if last.distance(p) < tolerance => {}
            _ => kept.push(p),
        }
    }
    // The ring closes on itself; the tail may sit on top of the head.
    while kept.len() > 1 && kept[kept.len() - 1].distance(kept[0]) < tolerance {
        kept.pop();
    }
    kept
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Bake a classified raster into region data. Rings that simplify to
/// fewer than three points are dropped.
pub fn bake_region(mask: &RasterMask, tolerance: f32) -> RegionData {
    let (labels, components) = label_components(mask);

    let ring_for = |comp: &Component| -> Option<PolygonRing> {
        let contour: Vec<Vec2> = trace_contour(&labels, comp)
            .into_iter()
            .map(|p| mask.to_world(p))
            .collect();
        let ring = PolygonRing::new(simplify_ring(&contour, tolerance));
        (!ring.is_degenerate()).then_some(ring)
    };

    let walkable: Vec<PolygonRing> = components
        .iter()
        .filter(|c| c.walkable)
        .filter_map(ring_for)
        .collect();

    let obstacles: Vec<PolygonRing> = components
        .iter()
        .filter(|c| !c.walkable && !c.touches_edge)
        .filter(|c| {
            let centroid = mask.to_world((c.pixel_sum / c.pixel_count as f32).round().as_ivec2());
            walkable.iter().any(|r| r.contains(centroid))
        })
        .filter_map(ring_for)
        .collect();

    log::info!(
        "baked {}x{} raster: {} component(s), {} walkable ring(s), {} hole(s)",
        mask.width,
        mask.height,
        components.len(),
        walkable.len(),
        obstacles.len()
    );

    RegionData {
        walkable,
        obstacles,
        boundary: Some(mask.bounds()),
    }
}
