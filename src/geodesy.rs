use crate::models::Vertex;

/// Sphere radius used by the survey traverse, in metres.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// One surveyed course: distance in metres along an initial bearing in
/// degrees clockwise from north.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraverseLeg {
    pub distance_m: f64,
    pub bearing_deg: f64,
}

impl TraverseLeg {
    pub fn new(distance_m: f64, bearing_deg: f64) -> Self {
        Self {
            distance_m,
            bearing_deg,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.distance_m.is_finite() && self.bearing_deg.is_finite()
    }
}

/// Spherical destination point from `start` after travelling `distance_m`
/// along the great circle with initial bearing `bearing_deg`.
pub fn destination(start: Vertex, distance_m: f64, bearing_deg: f64) -> Vertex {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = start.lat.to_radians();
    let lambda1 = start.lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    Vertex::new(lambda2.to_degrees(), phi2.to_degrees())
}

/// Chains legs from `start`; the result includes `start` itself.
pub fn traverse(start: Vertex, legs: &[TraverseLeg]) -> Vec<Vertex> {
    let mut chain = Vec::with_capacity(legs.len() + 1);
    chain.push(start);

    let mut current = start;
    for leg in legs {
        current = destination(current, leg.distance_m, leg.bearing_deg);
        chain.push(current);
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Distance, Haversine};

    const TOLERANCE_RAD: f64 = 1e-9;

    fn close(a: Vertex, b: Vertex) -> bool {
        (a.lat.to_radians() - b.lat.to_radians()).abs() < TOLERANCE_RAD
            && (a.lon.to_radians() - b.lon.to_radians()).abs() < TOLERANCE_RAD
    }

    #[test]
    fn due_north_one_degree() {
        let arc = EARTH_RADIUS_M * 1.0_f64.to_radians();
        let end = destination(Vertex::new(0.0, 0.0), arc, 0.0);
        assert!(close(end, Vertex::new(0.0, 1.0)), "{:?}", end);
    }

    #[test]
    fn due_east_on_equator() {
        let arc = EARTH_RADIUS_M * 2.5_f64.to_radians();
        let end = destination(Vertex::new(120.0, 0.0), arc, 90.0);
        assert!(close(end, Vertex::new(122.5, 0.0)), "{:?}", end);
    }

    #[test]
    fn zero_distance_stays_put() {
        let start = Vertex::new(121.0437, 14.6760);
        assert!(close(destination(start, 0.0, 137.0), start));
    }

    #[test]
    fn angular_distance_is_preserved() {
        // geo's haversine uses the mean radius; the angle travelled must match
        let start = Vertex::new(121.0437, 14.6760);
        let end = destination(start, 1_250.0, 63.5);

        let mean_radius = 6_371_008.8;
        let measured = Haversine.distance(
            geo_types::Point::from(start),
            geo_types::Point::from(end),
        );
        let expected = 1_250.0 / EARTH_RADIUS_M * mean_radius;
        assert!((measured - expected).abs() < 1e-3, "{} vs {}", measured, expected);
    }

    #[test]
    fn traverse_chains_from_each_new_point() {
        let start = Vertex::new(123.8854, 10.3157);
        let legs = [
            TraverseLeg::new(25.0, 45.0),
            TraverseLeg::new(40.0, 135.0),
            TraverseLeg::new(12.5, 270.0),
        ];
        let chain = traverse(start, &legs);

        assert_eq!(chain.len(), 4);
        assert_eq!(chain[0], start);
        for (i, leg) in legs.iter().enumerate() {
            let expected = destination(chain[i], leg.distance_m, leg.bearing_deg);
            assert!(close(chain[i + 1], expected));
        }
    }
}
