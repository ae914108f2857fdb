//! Closed orbit path sampling in the orbit's parent frame

use std::f64::consts::TAU;

use bevy::math::DVec3;

use crate::orbital::elements::OsculatingElements;

/// Orthonormal in-plane basis `(u, v)`: `u` points at periapsis, `v` is 90
/// degrees ahead in the direction of motion. Composition Rz(raan) Rx(i) Rz(argp).
pub fn perifocal_basis(elements: &OsculatingElements) -> (DVec3, DVec3) {
    let (so, co) = elements.raan.sin_cos();
    let (sw, cw) = elements.arg_periapsis.sin_cos();
    let (si, ci) = elements.inclination.sin_cos();
    let u = DVec3::new(co * cw - so * sw * ci, so * cw + co * sw * ci, sw * si);
    let v = DVec3::new(-co * sw - so * cw * ci, -so * sw + co * cw * ci, cw * si);
    (u, v)
}

/// Point at true anomaly `theta`: `r(theta) = a(1 - e^2) / (1 + e cos theta)`.
pub fn point_at(elements: &OsculatingElements, u: DVec3, v: DVec3, theta: f64) -> DVec3 {
    let (s, c) = theta.sin_cos();
    let r = elements.semi_latus_rectum_km() / (1.0 + elements.eccentricity * c);
    r * c * u + r * s * v
}

/// `samples` points at `theta = 2 pi k / samples`, followed by a copy of the
/// first point so the sequence closes. Returns `samples + 1` vertices.
pub fn sample_orbit_path(elements: &OsculatingElements, samples: usize) -> Vec<DVec3> {
    let samples = samples.max(3);
    let (u, v) = perifocal_basis(elements);
    let mut vertices = Vec::with_capacity(samples + 1);
    for k in 0..samples {
        let theta = TAU * k as f64 / samples as f64;
        vertices.push(point_at(elements, u, v, theta));
    }
    vertices.push(vertices[0]);
    vertices
}
