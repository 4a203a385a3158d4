//! Geometry utilities: rays and least-squares ray intersection.

pub mod ray;

pub use ray::{intersect_rays, Ray, RayIntersection};
