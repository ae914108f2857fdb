//! Geodetic coordinates on the WGS84 ellipsoid
//!
//! Latitude, longitude and altitude for ground sites and satellite
//! subpoints, with conversions to and from Earth-fixed kilometres.

use bevy::math::DVec3;
use chrono::{DateTime, Utc};

use crate::error::CoordError;
use crate::orbital::coordinates::{eci_to_ecef_km, gmst_rad};

/// Equatorial radius
pub const WGS84_A_KM: f64 = 6378.137;
/// Flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
const WGS84_E2: f64 = WGS84_F * (2.0 - WGS84_F);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodetic {
    pub latitude_deg: f64,
    /// East positive, (-180, 180]
    pub longitude_deg: f64,
    /// Height above the ellipsoid
    pub altitude_km: f64,
}

impl Geodetic {
    pub fn from_degrees(latitude_deg: f64, longitude_deg: f64, altitude_km: f64) -> Result<Self, CoordError> {
        if !(-90.0..=90.0).contains(&latitude_deg) {
            return Err(CoordError::InvalidLatitude(latitude_deg));
        }
        if !(-180.0..=180.0).contains(&longitude_deg) {
            return Err(CoordError::InvalidLongitude(longitude_deg));
        }
        Ok(Self {
            latitude_deg,
            longitude_deg,
            altitude_km,
        })
    }

    /// Earth-fixed position, +Z through the north pole and +X through the
    /// prime meridian.
    pub fn to_ecef_km(&self) -> DVec3 {
        let (sin_lat, cos_lat) = self.latitude_deg.to_radians().sin_cos();
        let (sin_lon, cos_lon) = self.longitude_deg.to_radians().sin_cos();
        let n = prime_vertical_radius(sin_lat);
        let r = (n + self.altitude_km) * cos_lat;
        DVec3::new(
            r * cos_lon,
            r * sin_lon,
            (n * (1.0 - WGS84_E2) + self.altitude_km) * sin_lat,
        )
    }

    pub fn from_ecef_km(ecef: DVec3) -> Self {
        let p = ecef.x.hypot(ecef.y);
        // Fixed-point iteration on latitude; the error shrinks by ~e^2 per round.
        let mut lat = ecef.z.atan2(p * (1.0 - WGS84_E2));
        for _ in 0..8 {
            let sin_lat = lat.sin();
            lat = (ecef.z + WGS84_E2 * prime_vertical_radius(sin_lat) * sin_lat).atan2(p);
        }
        let (sin_lat, cos_lat) = lat.sin_cos();
        let n = prime_vertical_radius(sin_lat);
        Self {
            latitude_deg: lat.to_degrees(),
            longitude_deg: ecef.y.atan2(ecef.x).to_degrees(),
            altitude_km: p * cos_lat + (ecef.z + WGS84_E2 * n * sin_lat) * sin_lat - n,
        }
    }

    /// Point on the ellipsoid below an inertial position at `at`, with the
    /// position's height above it.
    pub fn subpoint(eci_km: DVec3, at: DateTime<Utc>) -> Self {
        Self::from_ecef_km(eci_to_ecef_km(eci_km, gmst_rad(at)))
    }
}

fn prime_vertical_radius(sin_lat: f64) -> f64 {
    WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{} vs {}", a, b);
    }

    #[test]
    fn test_reference_points() {
        let origin = Geodetic::from_degrees(0.0, 0.0, 0.0).unwrap().to_ecef_km();
        assert!((origin - DVec3::new(WGS84_A_KM, 0.0, 0.0)).length() < 1e-9);

        let east = Geodetic::from_degrees(0.0, 90.0, 100.0).unwrap().to_ecef_km();
        assert!((east - DVec3::new(0.0, WGS84_A_KM + 100.0, 0.0)).length() < 1e-9);

        let pole = Geodetic::from_degrees(90.0, 0.0, 0.0).unwrap().to_ecef_km();
        assert_close(pole.z, WGS84_A_KM * (1.0 - WGS84_F), 1e-9);
        assert!(pole.truncate().length() < 1e-9);
    }

    #[test]
    fn test_round_trip() {
        let sites = [
            (38.8895, -77.0353, 0.02),
            (-33.8688, 151.2093, 0.0),
            (51.6, 179.9, 420.0),
            (-89.5, -45.0, 10.0),
            (0.1, 75.0, 35_786.0),
        ];
        for (lat, lon, alt) in sites {
            let site = Geodetic::from_degrees(lat, lon, alt).unwrap();
            let back = Geodetic::from_ecef_km(site.to_ecef_km());
            assert_close(back.latitude_deg, lat, 1e-9);
            assert_close(back.longitude_deg, lon, 1e-9);
            assert_close(back.altitude_km, alt, 1e-6);
        }
    }

    #[test]
    fn test_pole_has_no_singularity() {
        let b = WGS84_A_KM * (1.0 - WGS84_F);
        let above = Geodetic::from_ecef_km(DVec3::new(0.0, 0.0, -(b + 500.0)));
        assert_close(above.latitude_deg, -90.0, 1e-12);
        assert_close(above.altitude_km, 500.0, 1e-6);
    }

    #[test]
    fn test_from_degrees_rejects_out_of_range() {
        assert_eq!(
            Geodetic::from_degrees(90.5, 0.0, 0.0),
            Err(CoordError::InvalidLatitude(90.5))
        );
        assert_eq!(
            Geodetic::from_degrees(0.0, -181.0, 0.0),
            Err(CoordError::InvalidLongitude(-181.0))
        );
        assert!(Geodetic::from_degrees(f64::NAN, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_subpoint_longitude_follows_gmst() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let sub = Geodetic::subpoint(DVec3::new(7000.0, 0.0, 0.0), j2000);
        // GMST at J2000 is 280.46 deg, so inertial +X sits at 360 - 280.46 east.
        assert_close(sub.longitude_deg, 360.0 - 280.460_618_37, 1e-6);
        assert_close(sub.latitude_deg, 0.0, 1e-12);
        assert_close(sub.altitude_km, 7000.0 - WGS84_A_KM, 1e-9);
    }
}
