// Walkable-region index.
//
// Layer 1: polygon rings (walkable areas + obstacle holes) inside a Boundary.
//          Every walkability query is answered from these.
// Layer 2: NavigationGrid, per-cell walkability of the cell centre, baked
//          once when the region loads. Advisory only: used to draw the
//          region and to pick spawn candidates, never for collision.

use glam::{UVec2, Vec2};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::ConfigError;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default side length of a grid-cache cell in world units.
pub const DEFAULT_CELL_SIZE: f32 = 32.0;
/// Candidates drawn from the grid cache before falling back to the bounds.
pub const GRID_SAMPLE_ATTEMPTS: u32 = 200;
/// Uniform candidates drawn inside the Boundary before giving up.
pub const UNIFORM_SAMPLE_ATTEMPTS: u32 = 500;
/// Upper bound on cache size; larger regions get a coarser cell.
const MAX_GRID_CELLS: u32 = 1 << 22;

// ============================================================================
// BOUNDARY
// ============================================================================

/// Axis-aligned rectangle. `min_* <= max_*` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Boundary {
    pub fn new(min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Result<Self, ConfigError> {
        let boundary = Self { min_x, max_x, min_y, max_y };
        boundary.validate()?;
        Ok(boundary)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [self.min_x, self.max_x, self.min_y, self.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.min_x > self.max_x || self.min_y > self.max_y {
            return Err(ConfigError::InvalidBoundary {
                min_x: self.min_x,
                max_x: self.max_x,
                min_y: self.min_y,
                max_y: self.max_y,
            });
        }
        Ok(())
    }

    /// Tightest boundary around a point set. `None` for an empty set.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Self {
            min_x: first.x,
            max_x: first.x,
            min_y: first.y,
            max_y: first.y,
        };
        for p in iter {
            b.min_x = b.min_x.min(p.x);
            b.max_x = b.max_x.max(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_y = b.max_y.max(p.y);
        }
        Some(b)
    }

    pub fn union(&self, other: &Boundary) -> Boundary {
        Boundary {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    /// Inclusive on all edges.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Inset by `margin` on every side. An axis narrower than twice the
    /// margin collapses onto its centre line instead of inverting.
    pub fn shrink(&self, margin: f32) -> Boundary {
        let m = margin.max(0.0);
        let c = self.center();
        let (min_x, max_x) = if self.width() >= 2.0 * m {
            (self.min_x + m, self.max_x - m)
        } else {
            (c.x, c.x)
        };
        let (min_y, max_y) = if self.height() >= 2.0 * m {
            (self.min_y + m, self.max_y - m)
        } else {
            (c.y, c.y)
        };
        Boundary { min_x, max_x, min_y, max_y }
    }

    pub fn clamp(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            p.x.clamp(self.min_x, self.max_x),
            p.y.clamp(self.min_y, self.max_y),
        )
    }
}

// ============================================================================
// POLYGON RING
// ============================================================================

/// Closed loop of points; the last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolygonRing {
    points: Vec<Vec2>,
}

impl PolygonRing {
    pub fn new(points: Vec<Vec2>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle as a four-point ring.
    pub fn rect(min: Vec2, max: Vec2) -> Self {
        Self::new(vec![
            Vec2::new(min.x, min.y),
            Vec2::new(max.x, min.y),
            Vec2::new(max.x, max.y),
            Vec2::new(min.x, max.y),
        ])
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Fewer than three points encloses nothing.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 3 || self.points.iter().any(|p| !p.is_finite())
    }

    /// Even-odd rule.
    pub fn contains(&self, p: Vec2) -> bool {
        let pts = &self.points;
        if pts.len() < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = pts.len() - 1;
        for i in 0..pts.len() {
            let (a, b) = (pts[i], pts[j]);
            if (a.y > p.y) != (b.y > p.y) {
                let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Signed shoelace area (positive for counter-clockwise in y-up space).
    pub fn signed_area(&self) -> f32 {
        let pts = &self.points;
        if pts.len() < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..pts.len() {
            let a = pts[i];
            let b = pts[(i + 1) % pts.len()];
            sum += a.x * b.y - b.x * a.y;
        }
        sum * 0.5
    }

    /// Area centroid, or the vertex mean when the ring has no area.
    pub fn centroid(&self) -> Vec2 {
        let pts = &self.points;
        if pts.is_empty() {
            return Vec2::ZERO;
        }
        let area = self.signed_area();
        if area.abs() < 1e-6 {
            return pts.iter().copied().sum::<Vec2>() / pts.len() as f32;
        }
        let mut c = Vec2::ZERO;
        for i in 0..pts.len() {
            let a = pts[i];
            let b = pts[(i + 1) % pts.len()];
            let cross = a.x * b.y - b.x * a.y;
            c += (a + b) * cross;
        }
        c / (6.0 * area)
    }

    pub fn bounds(&self) -> Option<Boundary> {
        Boundary::from_points(self.points.iter().copied())
    }
}

// ============================================================================
// REGION DATA
// ============================================================================

/// Region as supplied by the region source: authored directly or produced
/// by `region_bake::bake_region`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionData {
    pub walkable: Vec<PolygonRing>,
    pub obstacles: Vec<PolygonRing>,
    pub boundary: Option<Boundary>,
}

impl RegionData {
    /// A plain rectangle: walkable everywhere inside `boundary`.
    pub fn rectangle(boundary: Boundary) -> Self {
        Self {
            walkable: Vec::new(),
            obstacles: Vec::new(),
            boundary: Some(boundary),
        }
    }
}

// ============================================================================
// NAVIGATION GRID
// ============================================================================

/// Cached walkability per cell, sampled at the cell centre.
/// Cell (cx, cy) covers [origin + c * cell_size, origin + (c + 1) * cell_size).
#[derive(Debug, Clone)]
pub struct NavigationGrid {
    /// True if the centre of this cell is walkable.
    pub walkable: Vec<bool>,
    pub width: u32,
    pub height: u32,
    pub cell_size: f32,
    pub origin: Vec2,
    walkable_cells: Vec<UVec2>,
}

impl NavigationGrid {
    fn bake(boundary: &Boundary, cell_size: f32, is_walkable: impl Fn(Vec2) -> bool) -> Self {
        let mut cell_size = cell_size;
        let mut width = ((boundary.width() / cell_size).ceil() as u32).max(1);
        let mut height = ((boundary.height() / cell_size).ceil() as u32).max(1);
        if width.saturating_mul(height) > MAX_GRID_CELLS {
            let area = boundary.width() * boundary.height();
            cell_size = (area / MAX_GRID_CELLS as f32).sqrt().ceil();
            log::warn!(
                "grid cache of {}x{} cells is too large, coarsening cell size to {}",
                width,
                height,
                cell_size
            );
            width = ((boundary.width() / cell_size).ceil() as u32).max(1);
            height = ((boundary.height() / cell_size).ceil() as u32).max(1);
        }

        let mut grid = Self {
            walkable: vec![false; (width * height) as usize],
            width,
            height,
            cell_size,
            origin: Vec2::new(boundary.min_x, boundary.min_y),
            walkable_cells: Vec::new(),
        };
        for cy in 0..height {
            for cx in 0..width {
                let cell = UVec2::new(cx, cy);
                if is_walkable(grid.cell_center(cell)) {
                    let idx = grid.idx(cell);
                    grid.walkable[idx] = true;
                    grid.walkable_cells.push(cell);
                }
            }
        }
        grid
    }

    /// Grid cell containing a world position, or `None` outside the grid.
    pub fn world_to_cell(&self, pos: Vec2) -> Option<UVec2> {
        let x = (pos.x - self.origin.x) / self.cell_size;
        let y = (pos.y - self.origin.y) / self.cell_size;
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        let (cx, cy) = (x as u32, y as u32);
        if cx >= self.width || cy >= self.height {
            return None;
        }
        Some(UVec2::new(cx, cy))
    }

    /// World-space centre of a grid cell.
    pub fn cell_center(&self, cell: UVec2) -> Vec2 {
        self.origin + (cell.as_vec2() + Vec2::splat(0.5)) * self.cell_size
    }

    #[inline]
    fn idx(&self, cell: UVec2) -> usize {
        (cell.y * self.width + cell.x) as usize
    }

    pub fn is_walkable(&self, cell: UVec2) -> bool {
        self.walkable.get(self.idx(cell)).copied().unwrap_or(false)
    }

    pub fn walkable_cells(&self) -> &[UVec2] {
        &self.walkable_cells
    }

    pub fn walkable_fraction(&self) -> f32 {
        self.walkable_cells.len() as f32 / self.walkable.len().max(1) as f32
    }
}

// ============================================================================
// NAVIGABLE REGION
// ============================================================================

#[derive(Debug, Clone)]
struct PreparedRing {
    ring: PolygonRing,
    bounds: Boundary,
}

impl PreparedRing {
    fn prepare(ring: &PolygonRing) -> Option<Self> {
        if ring.is_degenerate() {
            return None;
        }
        Some(Self {
            bounds: ring.bounds()?,
            ring: ring.clone(),
        })
    }

    #[inline]
    fn contains(&self, p: Vec2) -> bool {
        self.bounds.contains(p) && self.ring.contains(p)
    }
}

/// Avoid returning points near `point`.
#[derive(Debug, Clone, Copy)]
pub struct Exclusion {
    pub point: Vec2,
    pub min_distance: f32,
}

impl Exclusion {
    pub fn rejects(&self, p: Vec2) -> bool {
        p.distance(self.point) < self.min_distance
    }
}

/// Where a single placement candidate is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStrategy {
    /// A random walkable grid-cache cell, jittered inside the cell.
    Grid,
    /// Uniform over the Boundary.
    Bounds,
}

/// Runtime walkability oracle. Immutable once built.
#[derive(Debug, Clone)]
pub struct NavigableRegion {
    walkable: Vec<PreparedRing>,
    obstacles: Vec<PreparedRing>,
    boundary: Boundary,
    grid: NavigationGrid,
}

impl NavigableRegion {
    /// Build the index and bake the grid cache.
    ///
    /// Rings with fewer than three points are skipped. If `data.boundary`
    /// is absent the boundary is the union of the walkable rings.
    pub fn build(data: &RegionData, cell_size: f32) -> Result<Self, ConfigError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(cell_size));
        }

        let walkable: Vec<PreparedRing> =
            data.walkable.iter().filter_map(PreparedRing::prepare).collect();
        let obstacles: Vec<PreparedRing> =
            data.obstacles.iter().filter_map(PreparedRing::prepare).collect();
        let ignored = data.walkable.len() + data.obstacles.len() - walkable.len() - obstacles.len();
        if ignored > 0 {
            log::warn!("ignoring {} degenerate region ring(s)", ignored);
        }

        let boundary = match data.boundary {
            Some(b) => {
                b.validate()?;
                b
            }
            None => walkable
                .iter()
                .map(|r| r.bounds)
                .reduce(|a, b| a.union(&b))
                .ok_or(ConfigError::EmptyRegion)?,
        };

        let mut region = Self {
            walkable,
            obstacles,
            boundary,
            grid: NavigationGrid {
                walkable: Vec::new(),
                width: 0,
                height: 0,
                cell_size,
                origin: Vec2::ZERO,
                walkable_cells: Vec::new(),
            },
        };
        region.grid = NavigationGrid::bake(&region.boundary, cell_size, |p| region.point_walkable(p));

        log::info!(
            "region built: {} walkable ring(s), {} obstacle ring(s), grid {}x{} ({:.0}% walkable)",
            region.walkable.len(),
            region.obstacles.len(),
            region.grid.width,
            region.grid.height,
            region.grid.walkable_fraction() * 100.0
        );
        Ok(region)
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn grid(&self) -> &NavigationGrid {
        &self.grid
    }

    pub fn walkable_ring_count(&self) -> usize {
        self.walkable.len()
    }

    pub fn obstacle_ring_count(&self) -> usize {
        self.obstacles.len()
    }

    fn point_walkable(&self, p: Vec2) -> bool {
        if !p.is_finite() || !self.boundary.contains(p) {
            return false;
        }
        if !self.walkable.is_empty() && !self.walkable.iter().any(|r| r.contains(p)) {
            return false;
        }
        !self.obstacles.iter().any(|r| r.contains(p))
    }

    /// With `buffer > 0` the point and its four axis neighbours at
    /// ±buffer must all be walkable.
    pub fn is_walkable(&self, point: Vec2, buffer: f32) -> bool {
        if !self.point_walkable(point) {
            return false;
        }
        if buffer > 0.0 {
            return [
                Vec2::new(buffer, 0.0),
                Vec2::new(-buffer, 0.0),
                Vec2::new(0.0, buffer),
                Vec2::new(0.0, -buffer),
            ]
            .into_iter()
            .all(|o| self.point_walkable(point + o));
        }
        true
    }

    /// Grid sampling for irregular regions, bounds sampling for plain
    /// rectangles (or when the cache found nothing walkable).
    pub fn preferred_strategy(&self) -> SampleStrategy {
        let plain = self.walkable.is_empty() && self.obstacles.is_empty();
        if plain || self.grid.walkable_cells.is_empty() {
            SampleStrategy::Bounds
        } else {
            SampleStrategy::Grid
        }
    }

    /// One unvalidated candidate inside the Boundary inset by `margin`.
    /// The caller still has to check walkability.
    pub fn sample_candidate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        strategy: SampleStrategy,
        margin: f32,
    ) -> Option<Vec2> {
        let inner = self.boundary.shrink(margin);
        match strategy {
            SampleStrategy::Grid => {
                let cells = &self.grid.walkable_cells;
                if cells.is_empty() {
                    return None;
                }
                let cell = cells[rng.gen_range(0..cells.len())];
                let half = self.grid.cell_size * 0.5;
                let jitter = Vec2::new(rng.gen_range(-half..=half), rng.gen_range(-half..=half));
                let p = self.grid.cell_center(cell) + jitter;
                inner.contains(p).then_some(p)
            }
            SampleStrategy::Bounds => Some(Vec2::new(
                rng.gen_range(inner.min_x..=inner.max_x),
                rng.gen_range(inner.min_y..=inner.max_y),
            )),
        }
    }

    /// Grid cache first, then uniform over the Boundary, then the Boundary
    /// centre. Never fails.
    pub fn random_walkable_point<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        margin: f32,
        exclude: Option<Exclusion>,
    ) -> Vec2 {
        let accept = |p: Vec2| self.is_walkable(p, 0.0) && !exclude.is_some_and(|e| e.rejects(p));

        if !self.grid.walkable_cells.is_empty() {
            for _ in 0..GRID_SAMPLE_ATTEMPTS {
                if let Some(p) = self.sample_candidate(rng, SampleStrategy::Grid, margin) {
                    if accept(p) {
                        return p;
                    }
                }
            }
        }
        for _ in 0..UNIFORM_SAMPLE_ATTEMPTS {
            if let Some(p) = self.sample_candidate(rng, SampleStrategy::Bounds, margin) {
                if accept(p) {
                    return p;
                }
            }
        }
        log::debug!("random_walkable_point exhausted its budget, using boundary centre");
        self.boundary.center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn square(min: f32, max: f32) -> PolygonRing {
        PolygonRing::rect(Vec2::splat(min), Vec2::splat(max))
    }

    fn donut() -> NavigableRegion {
        let data = RegionData {
            walkable: vec![square(0.0, 100.0)],
            obstacles: vec![square(40.0, 60.0)],
            boundary: Some(Boundary::new(0.0, 100.0, 0.0, 100.0).unwrap()),
        };
        NavigableRegion::build(&data, 10.0).unwrap()
    }

    #[test]
    fn walkable_respects_rings_holes_and_boundary() {
        let region = donut();
        assert!(region.is_walkable(Vec2::new(20.0, 20.0), 0.0));
        assert!(!region.is_walkable(Vec2::new(50.0, 50.0), 0.0), "inside the hole");
        assert!(!region.is_walkable(Vec2::new(150.0, 20.0), 0.0), "outside boundary");
        assert!(!region.is_walkable(Vec2::new(f32::NAN, 20.0), 0.0));
    }

    #[test]
    fn buffer_checks_axis_neighbours() {
        let region = donut();
        let near_hole = Vec2::new(37.0, 50.0);
        assert!(region.is_walkable(near_hole, 0.0));
        assert!(region.is_walkable(near_hole, 2.0));
        assert!(!region.is_walkable(near_hole, 5.0), "+x neighbour falls in the hole");
    }

    #[test]
    fn queries_are_stable() {
        let region = donut();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let p = Vec2::new(rng.gen_range(-10.0..110.0), rng.gen_range(-10.0..110.0));
            let first = region.is_walkable(p, 3.0);
            assert_eq!(first, region.is_walkable(p, 3.0));
        }
    }

    #[test]
    fn degenerate_rings_are_ignored() {
        let data = RegionData {
            walkable: vec![square(0.0, 100.0), PolygonRing::new(vec![Vec2::ZERO, Vec2::ONE])],
            obstacles: vec![PolygonRing::new(vec![Vec2::splat(50.0)])],
            boundary: None,
        };
        let region = NavigableRegion::build(&data, 10.0).unwrap();
        assert_eq!(region.walkable_ring_count(), 1);
        assert_eq!(region.obstacle_ring_count(), 0);
        assert!(region.is_walkable(Vec2::splat(50.0), 0.0));
    }

    #[test]
    fn empty_region_is_rejected() {
        let err = NavigableRegion::build(&RegionData::default(), 10.0).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyRegion));
        let err = NavigableRegion::build(&small_rectangle(), 0.0).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCellSize(_)));
    }

    fn small_rectangle() -> RegionData {
        RegionData::rectangle(Boundary::new(0.0, 10.0, 0.0, 10.0).unwrap())
    }

    #[test]
    fn inverted_boundary_is_rejected() {
        assert!(Boundary::new(10.0, 0.0, 0.0, 10.0).is_err());
        assert!(Boundary::new(0.0, f32::INFINITY, 0.0, 10.0).is_err());
    }

    #[test]
    fn grid_cache_marks_hole_cells() {
        let region = donut();
        let grid = region.grid();
        assert_eq!((grid.width, grid.height), (10, 10));
        assert!(grid.is_walkable(UVec2::new(1, 1)));
        assert!(!grid.is_walkable(UVec2::new(4, 4)));
        assert_eq!(grid.world_to_cell(Vec2::new(45.0, 45.0)), Some(UVec2::new(4, 4)));
        assert_eq!(grid.world_to_cell(Vec2::new(-1.0, 5.0)), None);
        assert_eq!(grid.walkable_cells().len(), 96);
    }

    #[test]
    fn random_point_is_walkable_and_excluded() {
        let region = donut();
        let mut rng = StdRng::seed_from_u64(11);
        let exclusion = Exclusion { point: Vec2::ZERO, min_distance: 40.0 };
        for _ in 0..200 {
            let p = region.random_walkable_point(&mut rng, 5.0, Some(exclusion));
            assert!(region.is_walkable(p, 0.0));
            assert!(p.distance(Vec2::ZERO) >= 40.0);
            assert!(region.boundary().shrink(5.0).contains(p));
        }
    }

    #[test]
    fn random_point_falls_back_to_centre() {
        let data = RegionData {
            walkable: vec![square(500.0, 600.0)],
            obstacles: Vec::new(),
            boundary: Some(Boundary::new(0.0, 100.0, 0.0, 100.0).unwrap()),
        };
        let region = NavigableRegion::build(&data, 10.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(region.preferred_strategy(), SampleStrategy::Bounds);
        assert_eq!(region.random_walkable_point(&mut rng, 0.0, None), Vec2::splat(50.0));
    }

    #[test]
    fn boundary_shrink_collapses_narrow_axes() {
        let b = Boundary::new(0.0, 10.0, 0.0, 100.0).unwrap();
        let s = b.shrink(20.0);
        assert_eq!((s.min_x, s.max_x), (5.0, 5.0));
        assert_eq!((s.min_y, s.max_y), (20.0, 80.0));
    }

    #[test]
    fn ring_centroid_of_square() {
        let c = square(0.0, 10.0).centroid();
        assert!((c - Vec2::splat(5.0)).length() < 1e-4);
    }
}
