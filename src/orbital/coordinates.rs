//! Earth rotation helpers

use std::f64::consts::TAU;

use bevy::math::{DQuat, DVec3};
use chrono::{DateTime, Utc};

/// Julian date of the J2000.0 epoch (2000-01-01 12:00 TT, taken as UTC here)
const J2000_JD: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Greenwich Mean Sidereal Time in radians, [0, 2pi)
///
/// IAU 1982 linear term only, which is plenty for placing the Earth frame.
pub fn gmst_rad(t: DateTime<Utc>) -> f64 {
    let secs = t.timestamp() as f64 + (t.timestamp_subsec_nanos() as f64) * 1e-9;
    let days_since_j2000 = secs / 86_400.0 + UNIX_EPOCH_JD - J2000_JD;
    let degrees = 280.460_618_37 + 360.985_647_366_29 * days_since_j2000;
    degrees.to_radians().rem_euclid(TAU)
}

/// Orientation of the Earth-fixed frame inside the inertial frame
pub fn earth_rotation(t: DateTime<Utc>) -> DQuat {
    DQuat::from_rotation_z(gmst_rad(t))
}

/// Rotate inertial (TEME) -> Earth-fixed about Z by GMST
pub fn eci_to_ecef_km(eci: DVec3, gmst: f64) -> DVec3 {
    let (s, c) = gmst.sin_cos();
    DVec3::new(c * eci.x + s * eci.y, -s * eci.x + c * eci.y, eci.z)
}

/// Inverse of [`eci_to_ecef_km`]
pub fn ecef_to_eci_km(ecef: DVec3, gmst: f64) -> DVec3 {
    let (s, c) = gmst.sin_cos();
    DVec3::new(c * ecef.x - s * ecef.y, s * ecef.x + c * ecef.y, ecef.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    #[test]
    fn test_gmst_at_j2000() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let gmst = gmst_rad(j2000);
        assert!((gmst.to_degrees() - 280.460_618_37).abs() < 1e-6);
    }

    #[test]
    fn test_gmst_advances_one_turn_per_sidereal_day() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let sidereal_day = TimeDelta::milliseconds(86_164_091);
        let diff = (gmst_rad(t0 + sidereal_day) - gmst_rad(t0)).rem_euclid(TAU);
        assert!(diff < 1e-5 || TAU - diff < 1e-5, "diff {}", diff);
    }

    #[test]
    fn test_eci_ecef_round_trip_and_direction() {
        let eci = DVec3::new(1000.0, 0.0, 0.0);
        let quarter = std::f64::consts::FRAC_PI_2;

        // The Earth has turned a quarter east, so inertial +X appears at -Y.
        let ecef = eci_to_ecef_km(eci, quarter);
        assert!(ecef.x.abs() < 1e-10);
        assert!((ecef.y + 1000.0).abs() < 1e-10);

        let back = ecef_to_eci_km(ecef, quarter);
        assert!((back - eci).length() < 1e-9);
    }

    #[test]
    fn test_earth_rotation_matches_ecef_to_eci() {
        let t = Utc.with_ymd_and_hms(2021, 9, 1, 6, 30, 0).unwrap();
        let ecef = DVec3::new(6378.0, 100.0, 50.0);
        let via_quat = earth_rotation(t) * ecef;
        let via_fn = ecef_to_eci_km(ecef, gmst_rad(t));
        assert!((via_quat - via_fn).length() < 1e-9);
    }
}
