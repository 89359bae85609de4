// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mutable axis-aligned bounds accumulator.

use kurbo::{Affine, Point, Rect};

/// A mutable axis-aligned bounding box builder.
///
/// A fresh `Bounds` is empty: its minimums are `+inf` and its maximums `-inf`, so the
/// first merge defines the box. All `add_*` operations only grow the box; merges that
/// take an [`Affine`] transform every corner of the incoming quad before re-deriving
/// the extent, so rotated content is never under-approximated.
///
/// Shrinking is only possible through the explicitly named [`Bounds::add_bounds_mask`],
/// [`Bounds::fit`], [`Bounds::set`], and [`Bounds::clear`].
///
/// Every mutation bumps [`Bounds::update_id`], which lets consumers that cache derived
/// rectangles detect staleness cheaply. Equality compares the edges only.
#[derive(Clone, Copy, Debug)]
pub struct Bounds {
    /// Minimum x (left).
    pub min_x: f64,
    /// Minimum y (top).
    pub min_y: f64,
    /// Maximum x (right).
    pub max_x: f64,
    /// Maximum y (bottom).
    pub max_y: f64,
    update_id: u32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds {
    /// The empty sentinel.
    pub const EMPTY: Self = Self {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
        update_id: 0,
    };

    /// The zero-area box at the origin, used when a query finds no content.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Create bounds from min/max corners.
    pub const fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            update_id: 0,
        }
    }

    /// Create bounds covering a [`Rect`].
    pub fn from_rect(rect: Rect) -> Self {
        let r = rect.abs();
        Self::new(r.x0, r.y0, r.x1, r.y1)
    }

    /// The monotonically increasing mutation counter.
    pub const fn update_id(&self) -> u32 {
        self.update_id
    }

    /// True if nothing has been added since the last [`Bounds::clear`].
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    /// True if the box has a strictly positive area.
    pub fn is_positive(&self) -> bool {
        self.max_x - self.min_x > 0.0 && self.max_y - self.min_y > 0.0
    }

    /// Width of the box, `0` when empty.
    pub fn width(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_x - self.min_x
        }
    }

    /// Height of the box, `0` when empty.
    pub fn height(&self) -> f64 {
        if self.is_empty() {
            0.0
        } else {
            self.max_y - self.min_y
        }
    }

    /// The box as a [`Rect`]; the zero rect when empty.
    pub fn rect(&self) -> Rect {
        if self.is_empty() {
            Rect::ZERO
        } else {
            Rect::new(self.min_x, self.min_y, self.max_x, self.max_y)
        }
    }

    /// Reset to the empty sentinel.
    pub fn clear(&mut self) -> &mut Self {
        self.min_x = f64::INFINITY;
        self.min_y = f64::INFINITY;
        self.max_x = f64::NEG_INFINITY;
        self.max_y = f64::NEG_INFINITY;
        self.touch()
    }

    /// Overwrite all four edges.
    pub fn set(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> &mut Self {
        self.min_x = min_x;
        self.min_y = min_y;
        self.max_x = max_x;
        self.max_y = max_y;
        self.touch()
    }

    /// Whether `point` lies inside the box (edges inclusive).
    pub fn contains_point(&self, point: Point) -> bool {
        self.min_x <= point.x
            && point.x <= self.max_x
            && self.min_y <= point.y
            && point.y <= self.max_y
    }

    /// Grow to include the axis-aligned frame `(x0, y0)..(x1, y1)`.
    pub fn add_frame(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) -> &mut Self {
        self.include(x0.min(x1), y0.min(y1));
        self.include(x0.max(x1), y0.max(y1));
        self.touch()
    }

    /// Grow to include the frame `(x0, y0)..(x1, y1)` after transforming its four corners.
    pub fn add_frame_transformed(
        &mut self,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        transform: Affine,
    ) -> &mut Self {
        let [a, b, c, d, e, f] = transform.as_coeffs();
        for (x, y) in [(x0, y0), (x1, y0), (x1, y1), (x0, y1)] {
            self.include(a * x + c * y + e, b * x + d * y + f);
        }
        self.touch()
    }

    /// Grow to include `rect`.
    pub fn add_rect(&mut self, rect: Rect) -> &mut Self {
        self.add_frame(rect.x0, rect.y0, rect.x1, rect.y1)
    }

    /// Grow to include `rect` transformed by `transform`.
    pub fn add_rect_transformed(&mut self, rect: Rect, transform: Affine) -> &mut Self {
        self.add_frame_transformed(rect.x0, rect.y0, rect.x1, rect.y1, transform)
    }

    /// Grow to include `other`. Merging an empty box is a no-op.
    pub fn add_bounds(&mut self, other: &Self) -> &mut Self {
        if other.is_empty() {
            return self;
        }
        self.add_frame(other.min_x, other.min_y, other.max_x, other.max_y)
    }

    /// Grow to include `other` transformed by `transform`. Merging an empty box is a no-op.
    pub fn add_bounds_transformed(&mut self, other: &Self, transform: Affine) -> &mut Self {
        if other.is_empty() {
            return self;
        }
        self.add_frame_transformed(other.min_x, other.min_y, other.max_x, other.max_y, transform)
    }

    /// Grow to include every point of `vertices`.
    pub fn add_vertices(&mut self, vertices: &[Point]) -> &mut Self {
        for p in vertices {
            self.include(p.x, p.y);
        }
        self.touch()
    }

    /// Grow to include every point of `vertices` after transforming it.
    pub fn add_vertices_transformed(&mut self, vertices: &[Point], transform: Affine) -> &mut Self {
        for p in vertices {
            let q = transform * *p;
            self.include(q.x, q.y);
        }
        self.touch()
    }

    /// Intersect with `mask`.
    ///
    /// Used to keep masked content within its mask. Intersecting with an empty or
    /// disjoint mask leaves the box empty.
    pub fn add_bounds_mask(&mut self, mask: &Self) -> &mut Self {
        self.min_x = self.min_x.max(mask.min_x);
        self.min_y = self.min_y.max(mask.min_y);
        self.max_x = self.max_x.min(mask.max_x);
        self.max_y = self.max_y.min(mask.max_y);
        self.touch()
    }

    /// Clamp to `rect`; the box never exceeds it afterwards.
    pub fn fit(&mut self, rect: Rect) -> &mut Self {
        self.add_bounds_mask(&Self::from_rect(rect))
    }

    /// Replace the box by the axis-aligned extent of its transformed corners.
    pub fn apply_matrix(&mut self, transform: Affine) -> &mut Self {
        if self.is_empty() {
            return self;
        }
        let Self {
            min_x,
            min_y,
            max_x,
            max_y,
            ..
        } = *self;
        self.min_x = f64::INFINITY;
        self.min_y = f64::INFINITY;
        self.max_x = f64::NEG_INFINITY;
        self.max_y = f64::NEG_INFINITY;
        self.add_frame_transformed(min_x, min_y, max_x, max_y, transform)
    }

    /// Pad outward by `x` horizontally and `y` vertically. Empty boxes stay empty.
    pub fn pad(&mut self, x: f64, y: f64) -> &mut Self {
        if self.is_empty() {
            return self;
        }
        self.min_x -= x;
        self.min_y -= y;
        self.max_x += x;
        self.max_y += y;
        self.touch()
    }

    /// Snap outward to whole units.
    pub fn ceil(&mut self) -> &mut Self {
        if self.is_empty() {
            return self;
        }
        // `Rect::expand` rounds away from the center without needing `std`.
        let r = Rect::new(self.min_x, self.min_y, self.max_x, self.max_y).expand();
        self.set(r.x0, r.y0, r.x1, r.y1)
    }

    /// Scale all edges about the origin.
    pub fn scale(&mut self, x: f64, y: f64) -> &mut Self {
        if self.is_empty() {
            return self;
        }
        self.apply_matrix(Affine::scale_non_uniform(x, y))
    }

    /// Normalize an empty box to [`Bounds::ZERO`], the convention for query results.
    pub(crate) fn or_zero(&mut self) -> &mut Self {
        if self.is_empty() {
            self.set(0.0, 0.0, 0.0, 0.0);
        }
        self
    }

    #[inline]
    fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    #[inline]
    fn touch(&mut self) -> &mut Self {
        self.update_id = self.update_id.wrapping_add(1);
        self
    }
}

impl PartialEq for Bounds {
    fn eq(&self, other: &Self) -> bool {
        self.min_x == other.min_x
            && self.min_y == other.min_y
            && self.max_x == other.max_x
            && self.max_y == other.max_y
    }
}

impl From<Rect> for Bounds {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::FRAC_PI_4;

    fn edges(b: &Bounds) -> [f64; 4] {
        [b.min_x, b.min_y, b.max_x, b.max_y]
    }

    #[test]
    fn starts_empty_and_reports_zero_size() {
        let b = Bounds::default();
        assert!(b.is_empty());
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.rect(), Rect::ZERO);
    }

    #[test]
    fn growth_is_monotonic() {
        let mut b = Bounds::EMPTY;
        let mut prev = edges(&b);
        let steps: [&dyn Fn(&mut Bounds); 5] = [
            &|b| {
                b.add_frame(10.0, 10.0, 20.0, 20.0);
            },
            &|b| {
                b.add_bounds(&Bounds::new(15.0, 0.0, 18.0, 5.0));
            },
            &|b| {
                b.add_vertices(&[Point::new(-3.0, 12.0), Point::new(12.0, 40.0)]);
            },
            &|b| {
                b.add_frame(11.0, 11.0, 12.0, 12.0);
            },
            &|b| {
                b.add_rect_transformed(Rect::new(0.0, 0.0, 1.0, 1.0), Affine::rotate(FRAC_PI_4));
            },
        ];
        for step in steps {
            step(&mut b);
            let now = edges(&b);
            assert!(now[0] <= prev[0] && now[1] <= prev[1], "mins must not increase");
            assert!(now[2] >= prev[2] && now[3] >= prev[3], "maxes must not decrease");
            prev = now;
        }
        assert_eq!(edges(&b)[..3], [-3.0, 0.0, 20.0]);
    }

    #[test]
    fn empty_merge_is_a_noop() {
        let mut b = Bounds::new(1.0, 2.0, 3.0, 4.0);
        b.add_bounds(&Bounds::EMPTY);
        b.add_bounds_transformed(&Bounds::EMPTY, Affine::rotate(1.0));
        assert_eq!(edges(&b), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn rotated_frame_transforms_all_corners() {
        let mut b = Bounds::EMPTY;
        b.add_frame_transformed(0.0, 0.0, 10.0, 10.0, Affine::rotate(FRAC_PI_4));
        let half_diag = 10.0 * core::f64::consts::FRAC_1_SQRT_2;
        assert!((b.min_x + half_diag).abs() < 1e-9);
        assert!((b.max_x - half_diag).abs() < 1e-9);
        assert!(b.min_y.abs() < 1e-9);
        assert!((b.max_y - 2.0 * half_diag).abs() < 1e-9);
    }

    #[test]
    fn mask_intersects_and_can_empty() {
        let mut b = Bounds::new(0.0, 0.0, 100.0, 100.0);
        b.add_bounds_mask(&Bounds::new(50.0, -10.0, 150.0, 40.0));
        assert_eq!(edges(&b), [50.0, 0.0, 100.0, 40.0]);
        b.add_bounds_mask(&Bounds::new(200.0, 200.0, 300.0, 300.0));
        assert!(b.is_empty());
    }

    #[test]
    fn pad_and_ceil() {
        let mut b = Bounds::new(0.5, 0.5, 9.2, 9.8);
        b.pad(1.0, 2.0).ceil();
        assert_eq!(edges(&b), [-1.0, -2.0, 11.0, 12.0]);
        let mut e = Bounds::EMPTY;
        e.pad(5.0, 5.0);
        assert!(e.is_empty(), "padding must not revive an empty box");
    }

    #[test]
    fn update_id_increases_on_mutation() {
        let mut b = Bounds::EMPTY;
        let start = b.update_id();
        b.add_frame(0.0, 0.0, 1.0, 1.0);
        b.clear();
        assert!(b.update_id() > start);
    }

    #[test]
    fn apply_matrix_and_scale() {
        let mut b = Bounds::new(0.0, 0.0, 10.0, 20.0);
        b.scale(2.0, 0.5);
        assert_eq!(edges(&b), [0.0, 0.0, 20.0, 10.0]);
        b.apply_matrix(Affine::translate((5.0, 5.0)));
        assert_eq!(b.rect(), Rect::new(5.0, 5.0, 25.0, 15.0));
        assert!(b.contains_point(Point::new(25.0, 15.0)));
        assert!(!b.contains_point(Point::new(26.0, 15.0)));
    }

    #[test]
    fn or_zero_normalizes_only_empty() {
        let mut e = Bounds::EMPTY;
        e.or_zero();
        assert_eq!(edges(&e), [0.0; 4]);
        let mut b = Bounds::new(1.0, 1.0, 2.0, 2.0);
        b.or_zero();
        assert_eq!(edges(&b), [1.0, 1.0, 2.0, 2.0]);
    }
}
