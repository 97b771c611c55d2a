//! # Coordinate Reprojection
//!
//! Some backends report coordinates in a projected system instead of
//! degrees. [`Reprojector`] is the seam; [`RdNewToWgs84`] is the default and
//! approximates Dutch RD New (EPSG:28992) to WGS84 with the published
//! polynomial series, accurate to roughly a metre inside the Netherlands.

use crate::measurement::Geometry;

pub trait Reprojector: Send + Sync {
    /// Projected `(x, y)` to `(longitude, latitude)` in degrees.
    fn reproject(&self, x: f64, y: f64) -> (f64, f64);
}

/// True when `(x, y)` is not a plausible longitude/latitude pair.
pub fn needs_reprojection(x: f64, y: f64) -> bool {
    !((-180.0..=180.0).contains(&x) && (-90.0..=90.0).contains(&y))
}

/// Point geometry in degrees, reprojecting when the input is out of range.
pub fn point_in_degrees(x: f64, y: f64, reprojector: &dyn Reprojector) -> Geometry {
    if needs_reprojection(x, y) {
        let (lon, lat) = reprojector.reproject(x, y);
        Geometry::point(lon, lat)
    } else {
        Geometry::point(x, y)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RdNewToWgs84;

const X0: f64 = 155_000.0;
const Y0: f64 = 463_000.0;
const PHI0: f64 = 52.155_174_40;
const LAM0: f64 = 5.387_206_21;

// (power of dx, power of dy, coefficient in arc seconds)
const K: [(i32, i32, f64); 11] = [
    (0, 1, 3235.65389),
    (2, 0, -32.58297),
    (0, 2, -0.24750),
    (2, 1, -0.84978),
    (0, 3, -0.06550),
    (2, 2, -0.01709),
    (1, 0, -0.00738),
    (4, 0, 0.00530),
    (2, 3, -0.00039),
    (4, 1, 0.00033),
    (1, 1, -0.00012),
];

const L: [(i32, i32, f64); 12] = [
    (1, 0, 5260.52916),
    (1, 1, 105.94684),
    (1, 2, 2.45656),
    (3, 0, -0.81885),
    (1, 3, 0.05594),
    (3, 1, -0.05607),
    (0, 1, 0.01199),
    (3, 2, -0.00256),
    (1, 4, 0.00128),
    (0, 2, 0.00022),
    (2, 0, -0.00022),
    (5, 0, 0.00026),
];

fn series(terms: &[(i32, i32, f64)], dx: f64, dy: f64) -> f64 {
    terms
        .iter()
        .map(|(p, q, c)| c * dx.powi(*p) * dy.powi(*q))
        .sum()
}

impl Reprojector for RdNewToWgs84 {
    fn reproject(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = (x - X0) * 1e-5;
        let dy = (y - Y0) * 1e-5;
        let lat = PHI0 + series(&K, dx, dy) / 3600.0;
        let lon = LAM0 + series(&L, dx, dy) / 3600.0;
        (lon, lat)
    }
}
