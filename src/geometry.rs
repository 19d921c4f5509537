//! Clock hand geometry and its lazy cache.
//!
//! Hands are built as (rounded) rectangles pointing straight up from the
//! surface center. The compositor rotates them per frame; the polygons
//! themselves only change when the surface bounds change or the style
//! manager marks them dirty.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::style::{Configuration, HandDimensions};

// Points per rounded corner arc, endpoints included
const CORNER_SEGMENTS: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    // Clockwise on screen (y grows downwards).
    pub fn rotate_about(self, pivot: Vec2, degrees: f32) -> Vec2 {
        let rad = degrees.to_radians();
        let (sin, cos) = (libm::sinf(rad), libm::cosf(rad));
        let dx = self.x - pivot.x;
        let dy = self.y - pivot.y;
        Vec2::new(pivot.x + dx * cos - dy * sin, pivot.y + dx * sin + dy * cos)
    }
}

// Surface rectangle, (0,0) is top-left corner
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct DrawBounds {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl DrawBounds {
    pub const fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self { left, top, width, height }
    }

    pub const fn square(size: u32) -> Self {
        Self::new(0, 0, size, size)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.left as f32 + self.width as f32 / 2.0,
            self.top as f32 + self.height as f32 / 2.0,
        )
    }
}

pub type HandPath = Arc<[Vec2]>;

#[derive(Clone, Debug, PartialEq)]
pub struct HandGeometry {
    pub hour: HandPath,
    pub minute: HandPath,
    pub second: HandPath,
}

impl HandGeometry {
    pub fn build(bounds: &DrawBounds, config: &Configuration) -> Self {
        let gap = config.hand_gap_fraction;
        Self {
            hour: create_clock_hand(bounds, &config.hour_hand, gap),
            minute: create_clock_hand(bounds, &config.minute_hand, gap),
            second: create_clock_hand(bounds, &config.second_hand, gap),
        }
    }
}

/// Build one hand as a closed clockwise polygon in surface coordinates.
///
/// The rectangle spans `gap * width` to `(gap + length) * width` above the
/// center and is `thickness * width` wide. Corners are rounded only when one
/// of the radii is non-zero.
pub fn create_clock_hand(bounds: &DrawBounds, dims: &HandDimensions, gap: f32) -> HandPath {
    let width = bounds.width as f32;
    let center = bounds.center();
    let left = center.x - dims.width_fraction / 2.0 * width;
    let right = center.x + dims.width_fraction / 2.0 * width;
    let top = center.y - (gap + dims.length_fraction) * width;
    let bottom = center.y - gap * width;

    if dims.x_radius == 0.0 && dims.y_radius == 0.0 {
        return Arc::from(vec![
            Vec2::new(left, top),
            Vec2::new(right, top),
            Vec2::new(right, bottom),
            Vec2::new(left, bottom),
        ]);
    }

    let rx = dims.x_radius.min((right - left) / 2.0);
    let ry = dims.y_radius.min((bottom - top) / 2.0);
    // (corner center, start angle) in clockwise order starting top-left
    let corners = [
        (Vec2::new(left + rx, top + ry), 180.0_f32),
        (Vec2::new(right - rx, top + ry), 270.0),
        (Vec2::new(right - rx, bottom - ry), 0.0),
        (Vec2::new(left + rx, bottom - ry), 90.0),
    ];

    let mut points = Vec::with_capacity(corners.len() * (CORNER_SEGMENTS + 1));
    for (c, start) in corners {
        for step in 0..=CORNER_SEGMENTS {
            let angle = (start + 90.0 * step as f32 / CORNER_SEGMENTS as f32).to_radians();
            points.push(Vec2::new(c.x + rx * libm::cosf(angle), c.y + ry * libm::sinf(angle)));
        }
    }
    Arc::from(points)
}

// Shared "geometry is stale" marker, set by the style manager
#[derive(Clone, Debug, Default)]
pub struct DirtyFlag(Arc<AtomicBool>);

impl DirtyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

pub struct GeometryCache {
    last_bounds: Option<DrawBounds>,
    cached: Option<Arc<HandGeometry>>,
    dirty: DirtyFlag,
    recomputes: u64,
}

impl GeometryCache {
    pub fn new(dirty: DirtyFlag) -> Self {
        Self {
            last_bounds: None,
            cached: None,
            dirty,
            recomputes: 0,
        }
    }

    pub fn dirty_flag(&self) -> DirtyFlag {
        self.dirty.clone()
    }

    // Number of rebuilds so far, for diagnostics
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }

    pub fn compute(&mut self, bounds: DrawBounds, config: &Configuration) -> Arc<HandGeometry> {
        let dirty = self.dirty.take();
        match &self.cached {
            Some(cached) if !dirty && self.last_bounds == Some(bounds) => cached.clone(),
            _ => {
                debug!(?bounds, dirty, "recalculating clock hands");
                let geometry = Arc::new(HandGeometry::build(&bounds, config));
                self.last_bounds = Some(bounds);
                self.cached = Some(geometry.clone());
                self.recomputes += 1;
                geometry
            }
        }
    }
}
