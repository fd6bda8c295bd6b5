//! Moon surface polyline
//!
//! Points are sorted by x and span the whole world width. Larger y is lower
//! on screen; `floor` is the bottom of the world.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dist_to_segment;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    points: Vec<Vec2>,
    floor: f32,
}

impl Terrain {
    /// A flat surface at height `y`
    pub fn flat(width: f32, y: f32, floor: f32) -> Self {
        let segments = ((width / 100.0).ceil() as usize).max(1);
        let points = (0..=segments)
            .map(|i| Vec2::new(width * i as f32 / segments as f32, y))
            .collect();
        Self { points, floor }
    }

    /// Rolling surface between mid-height and the floor.
    ///
    /// Runs of 800px alternate between smooth and jagged stretches.
    pub fn generate(width: f32, height: f32, rng: &mut impl Rng) -> Self {
        let mut points = Vec::new();
        let mid = height / 2.0;
        let mut x = 0.0f32;
        let mut smoothness = 0.5f32;
        let mut next_run = 0.0f32;
        // Two low-frequency waves stand in for noise
        let phase_a = rng.random_range(0.0..std::f32::consts::TAU);
        let phase_b = rng.random_range(0.0..std::f32::consts::TAU);

        while x < width {
            if x >= next_run {
                smoothness = rng.random_range(0.3..0.7);
                next_run += 800.0;
            }
            let y = if rng.random::<f32>() < smoothness {
                let n = 0.5
                    + 0.3 * (x * 0.005 + phase_a).sin()
                    + 0.2 * (x * 0.0013 + phase_b).sin();
                n.clamp(0.0, 1.0) * mid + mid
            } else {
                rng.random_range(mid..height)
            };
            points.push(Vec2::new(x, y.min(height)));
            x += rng.random_range(20.0..50.0);
        }
        points.push(Vec2::new(width, rng.random_range(mid..height - 50.0)));
        Self {
            points,
            floor: height,
        }
    }

    /// Build from raw points. Points are sorted by x.
    pub fn from_points(mut points: Vec<Vec2>, floor: f32) -> Self {
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self { points, floor }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn floor(&self) -> f32 {
        self.floor
    }

    /// Surface height at `x`, interpolated. The floor outside the polyline.
    pub fn surface_y(&self, x: f32) -> f32 {
        match self.segment_at(x) {
            Some(i) => {
                let (a, b) = (self.points[i], self.points[i + 1]);
                let span = b.x - a.x;
                if span <= 0.0 {
                    return a.y.min(b.y);
                }
                let t = (x - a.x) / span;
                a.y + (b.y - a.y) * t
            }
            None => self.floor,
        }
    }

    /// Does a circle of `radius` at `p` touch any surface segment?
    pub fn touches(&self, p: Vec2, radius: f32) -> bool {
        let start = self
            .points
            .partition_point(|q| q.x < p.x - radius)
            .saturating_sub(1);
        self.points[start..]
            .windows(2)
            .take_while(|w| w[0].x <= p.x + radius)
            .any(|w| dist_to_segment(p, w[0], w[1]) < radius)
    }

    /// Carve a crater centered on `impact_x`, returning the x-range touched
    pub fn carve_crater(&mut self, impact_x: f32, width: f32, depth: f32) -> (f32, f32) {
        let half = width / 2.0;
        let (left, right) = (impact_x - half, impact_x + half);
        let floor = self.floor;

        let mut touched = Vec::new();
        for (i, point) in self.points.iter_mut().enumerate() {
            if point.x >= left && point.x <= right {
                let t = (point.x - left) / width.max(f32::EPSILON);
                let dip = (t * std::f32::consts::PI).sin() * depth;
                point.y = (point.y + dip).min(floor);
                touched.push(i);
            }
        }

        // Soften the rim so the crater doesn't leave a spike
        if let (Some(&first), Some(&last)) = (touched.first(), touched.last()) {
            for i in [first.checked_sub(1), Some(last + 1)].into_iter().flatten() {
                if i > 0 && i + 1 < self.points.len() {
                    let avg = (self.points[i - 1].y + self.points[i + 1].y) / 2.0;
                    self.points[i].y = (self.points[i].y + avg) / 2.0;
                }
            }
        }

        (left, right)
    }

    /// Angle of the surface between `x` and `x + step`
    pub fn slope_angle(&self, x: f32, step: f32) -> f32 {
        let y0 = self.surface_y(x);
        let y1 = self.surface_y(x + step);
        (y1 - y0).atan2(step)
    }

    fn segment_at(&self, x: f32) -> Option<usize> {
        if self.points.len() < 2 {
            return None;
        }
        let i = self.points.partition_point(|p| p.x <= x);
        if i == 0 {
            return None;
        }
        if i == self.points.len() {
            // Exactly on the last point still counts
            return (x == self.points[i - 1].x).then_some(i - 2);
        }
        Some(i - 1)
    }
}
