//! Osculating classical elements from an inertial state vector

use std::f64::consts::TAU;

use bevy::math::DVec3;

use crate::orbital::propagation::StateVector;

/// Earth gravitational parameter, km^3/s^2 (WGS-84)
pub const MU_EARTH_KM3_S2: f64 = 398_600.4418;

/// Below this magnitude eccentricity and node vectors count as zero.
const SINGULAR_EPS: f64 = 1e-9;

/// Instantaneous ellipse tangent to the trajectory. Angles in radians.
///
/// For circular orbits the argument of periapsis is 0 and the anomaly is
/// measured from the ascending node; for equatorial orbits the node is 0
/// and periapsis is measured from +X.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OsculatingElements {
    pub semi_major_axis_km: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub raan: f64,
    pub arg_periapsis: f64,
    pub true_anomaly: f64,
}

impl OsculatingElements {
    /// Closed elliptical elements for `state`, or a diagnostic when the state
    /// is not a bound orbit.
    pub fn from_state(state: &StateVector, mu: f64) -> Result<Self, String> {
        let r = state.position;
        let v = state.velocity;
        if !state.is_finite() {
            return Err("non-finite state vector".into());
        }
        let r_mag = r.length();
        let v_mag = v.length();
        if r_mag <= 0.0 {
            return Err("zero position vector".into());
        }

        let h = r.cross(v);
        let h_mag = h.length();
        if h_mag <= SINGULAR_EPS {
            return Err("degenerate (rectilinear) trajectory".into());
        }

        let energy = v_mag * v_mag / 2.0 - mu / r_mag;
        let e_vec = ((v_mag * v_mag - mu / r_mag) * r - r.dot(v) * v) / mu;
        let e = e_vec.length();
        if e >= 1.0 || energy >= 0.0 {
            return Err(format!("unbound trajectory, eccentricity {:.6}", e));
        }
        let a = -mu / (2.0 * energy);

        let inclination = (h.z / h_mag).clamp(-1.0, 1.0).acos();
        let node = DVec3::new(-h.y, h.x, 0.0);
        let n_mag = node.length();
        let equatorial = n_mag <= SINGULAR_EPS * h_mag;
        let circular = e <= SINGULAR_EPS;
        let retrograde = h.z < 0.0;

        let raan = if equatorial {
            0.0
        } else {
            node.y.atan2(node.x).rem_euclid(TAU)
        };

        let arg_periapsis = match (circular, equatorial) {
            (true, _) => 0.0,
            (false, false) => angle_between(node, e_vec, e_vec.z < 0.0),
            (false, true) => {
                let lon = e_vec.y.atan2(e_vec.x).rem_euclid(TAU);
                if retrograde { (TAU - lon).rem_euclid(TAU) } else { lon }
            }
        };

        let true_anomaly = match (circular, equatorial) {
            (false, _) => angle_between(e_vec, r, r.dot(v) < 0.0),
            // Argument of latitude.
            (true, false) => angle_between(node, r, r.z < 0.0),
            // True longitude.
            (true, true) => {
                let lon = r.y.atan2(r.x).rem_euclid(TAU);
                if retrograde { (TAU - lon).rem_euclid(TAU) } else { lon }
            }
        };

        let elements = Self {
            semi_major_axis_km: a,
            eccentricity: e,
            inclination,
            raan,
            arg_periapsis,
            true_anomaly,
        };
        if !elements.is_finite() {
            return Err("non-finite osculating elements".into());
        }
        Ok(elements)
    }

    pub fn is_finite(&self) -> bool {
        [
            self.semi_major_axis_km,
            self.eccentricity,
            self.inclination,
            self.raan,
            self.arg_periapsis,
            self.true_anomaly,
        ]
        .iter()
        .all(|x| x.is_finite())
    }

    /// Semi-latus rectum `a(1 - e^2)`.
    pub fn semi_latus_rectum_km(&self) -> f64 {
        self.semi_major_axis_km * (1.0 - self.eccentricity * self.eccentricity)
    }

    pub fn period_secs(&self, mu: f64) -> f64 {
        TAU * (self.semi_major_axis_km.powi(3) / mu).sqrt()
    }
}

/// Angle from `from` to `to` in [0, 2pi), reflected when `flip` is set.
fn angle_between(from: DVec3, to: DVec3, flip: bool) -> f64 {
    let cos = (from.dot(to) / (from.length() * to.length())).clamp(-1.0, 1.0);
    let angle = cos.acos();
    if flip { TAU - angle } else { angle }
}
