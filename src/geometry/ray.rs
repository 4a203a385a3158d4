//! Lines of sight and their least-squares intersection.
//!
//! A triangulated particle position is the point minimizing the sum of
//! squared perpendicular distances to the contributing camera rays. For a
//! ray with unit direction `s` and anchor `c`, the perpendicular projector
//! is `I - s sᵀ`; accumulating `M = Σ (I - sᵢ sᵢᵀ)` and `P = Σ (I - sᵢ sᵢᵀ) cᵢ`
//! gives the closed-form solution `M⁻¹ P`.

use nalgebra::{Matrix3, Vector3};

/// A line of sight anchored at a camera's projective center.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vector3<f64>,
    /// Unit direction.
    pub dir: Vector3<f64>,
}

impl Ray {
    /// Build a ray from `origin` through `point`.
    pub fn through(origin: Vector3<f64>, point: Vector3<f64>) -> Self {
        let dir = (point - origin).normalize();
        Self { origin, dir }
    }

    /// Squared perpendicular distance from `p` to this ray.
    pub fn perp_dist2(&self, p: &Vector3<f64>) -> f64 {
        let d = p - self.origin;
        (d - self.dir * d.dot(&self.dir)).norm_squared()
    }
}

/// Result of intersecting a bundle of rays.
#[derive(Debug, Clone, Copy)]
pub struct RayIntersection {
    pub point: Vector3<f64>,
    /// Mean squared perpendicular distance from `point` to the rays.
    /// Infinite when the system is singular or the solution is non-finite,
    /// so the caller's tolerance test rejects it.
    pub residual: f64,
}

/// Intersect `rays` in a least-squares sense.
pub fn intersect_rays(rays: &[Ray]) -> RayIntersection {
    let mut m = Matrix3::<f64>::zeros();
    let mut p = Vector3::<f64>::zeros();

    for ray in rays {
        let proj = Matrix3::identity() - ray.dir * ray.dir.transpose();
        m += proj;
        p += proj * ray.origin;
    }

    let point = match m.try_inverse() {
        Some(minv) => minv * p,
        None => {
            return RayIntersection {
                point: Vector3::zeros(),
                residual: f64::INFINITY,
            };
        }
    };

    if !point.iter().all(|v| v.is_finite()) {
        return RayIntersection {
            point: Vector3::zeros(),
            residual: f64::INFINITY,
        };
    }

    let dist: f64 = rays.iter().map(|r| r.perp_dist2(&point)).sum();
    RayIntersection {
        point,
        residual: dist / rays.len() as f64,
    }
}
