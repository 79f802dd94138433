//! Route resampling: polyline in, evenly spaced raw samples out.
//!
//! The walk carries the distance still to travel to the next sample boundary
//! across vertices, so spacing stays even through bends:
//!
//! ```text
//!  v0        v1                v2
//!  x----x----x--+----x----x----o
//!  0   20   40  50  60   80   (final vertex, always kept)
//!               |
//!               carry = 10 m into the next segment
//! ```
//!
//! The carry is stored as the distance left to the next boundary
//! (`spacing - leftover`), not as the leftover `d - spacing * segments`
//! itself. Both name the same boundary.
//!
//! A walk never emits more than `max_points + 2` samples, even when the leg
//! distances that sized the spacing understate the real path length.

use crate::error::HyperlapseError;
use crate::geometry::{distance_m, point_on_line};
use hyperlapse_env::{GeoPoint, Route};
use tracing::debug;

/// Samples closer than this to the final vertex are replaced by it (m).
const SAME_POINT_TOLERANCE_M: f64 = 0.01;

/// State of one resampling walk.
#[derive(Debug, Clone)]
pub struct RouteResampler {
    /// Spacing actually used, after the point budget is applied (m)
    spacing_m: f64,

    /// Distance left before the next sample boundary (m)
    carry_m: f64,

    /// Hard cap on emitted samples, final vertex included
    max_samples: usize,
}

impl RouteResampler {
    /// Creates a resampler for a route of `total_distance_m`.
    pub fn new(
        target_spacing_m: f64,
        max_points: usize,
        total_distance_m: f64,
    ) -> Result<Self, HyperlapseError> {
        if !(target_spacing_m > 0.0) {
            return Err(HyperlapseError::config("sample spacing must be positive"));
        }
        if max_points == 0 {
            return Err(HyperlapseError::config("max_points must be at least 1"));
        }

        Ok(Self {
            spacing_m: Self::effective_spacing(target_spacing_m, max_points, total_distance_m),
            carry_m: 0.0,
            max_samples: max_points + 2,
        })
    }

    /// `max(target, total / max_points)`: long routes get wider spacing so the
    /// sample count stays within budget.
    pub fn effective_spacing(
        target_spacing_m: f64,
        max_points: usize,
        total_distance_m: f64,
    ) -> f64 {
        let budget_spacing = total_distance_m / max_points as f64;
        if budget_spacing < target_spacing_m {
            target_spacing_m
        } else {
            budget_spacing
        }
    }

    pub fn spacing_m(&self) -> f64 {
        self.spacing_m
    }

    /// Walks `path` and returns the raw samples in driving order.
    pub fn resample_path(&mut self, path: &[GeoPoint]) -> Result<Vec<GeoPoint>, HyperlapseError> {
        if path.len() < 2 {
            return Err(HyperlapseError::EmptyRoute);
        }

        let spacing = self.spacing_m;
        // Last slot is reserved for the final vertex
        let cap = self.max_samples - 1;
        let mut samples = Vec::new();
        self.carry_m = 0.0;

        'walk: for (i, pair) in path.windows(2).enumerate() {
            let (mut a, b) = (pair[0], pair[1]);
            let mut d = distance_m(a, b);

            if self.carry_m > 0.0 {
                if self.carry_m < d {
                    if samples.len() >= cap {
                        break 'walk;
                    }
                    a = point_on_line(self.carry_m / d, a, b);
                    d = distance_m(a, b);
                    samples.push(a);
                    self.carry_m = 0.0;
                } else {
                    self.carry_m -= d;
                    if self.carry_m < SAME_POINT_TOLERANCE_M {
                        // Boundary falls on the vertex itself
                        if samples.len() >= cap {
                            break 'walk;
                        }
                        samples.push(b);
                        self.carry_m = 0.0;
                    }
                    continue;
                }
            }

            if i == 0 {
                samples.push(a);
            }

            let segments = (d / spacing).floor() as usize;
            let room = cap.saturating_sub(samples.len());
            for k in 1..=segments.min(room) {
                samples.push(point_on_line(k as f64 * spacing / d, a, b));
            }
            if segments > room {
                debug!("Sample budget of {} reached before the end of the path", self.max_samples);
                break 'walk;
            }

            self.carry_m = if segments > 0 {
                let leftover = d - spacing * segments as f64;
                if leftover > 0.0 {
                    spacing - leftover
                } else {
                    0.0
                }
            } else {
                spacing * (1.0 - d / spacing)
            };
        }

        let last = path[path.len() - 1];
        if let Some(previous) = samples.last() {
            if distance_m(*previous, last) < SAME_POINT_TOLERANCE_M {
                samples.pop();
            }
        }
        samples.push(last);

        Ok(samples)
    }
}

/// Resamples a whole route at `target_spacing_m`, capped at roughly
/// `max_points` samples.
pub fn resample(
    route: &Route,
    target_spacing_m: f64,
    max_points: usize,
) -> Result<Vec<GeoPoint>, HyperlapseError> {
    let path = route.overview_path();
    let total = route.total_distance_m();
    let mut resampler = RouteResampler::new(target_spacing_m, max_points, total)?;
    let samples = resampler.resample_path(&path)?;

    debug!(
        "Resampled {} vertices ({:.0}m) into {} samples at {:.1}m spacing",
        path.len(),
        total,
        samples.len(),
        resampler.spacing_m()
    );

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{offset_m, path_length_m};
    use approx::assert_relative_eq;
    use hyperlapse_env::RouteLeg;
    use proptest::prelude::*;

    const ORIGIN: GeoPoint = GeoPoint::new(45.0, 7.0);

    /// A route due north from ORIGIN with vertices at the given offsets (m).
    fn northbound(offsets: &[f64]) -> Route {
        let vertices: Vec<GeoPoint> = offsets.iter().map(|m| offset_m(ORIGIN, *m, 0.0)).collect();
        let legs = vertices
            .windows(2)
            .map(|pair| RouteLeg::new(pair.to_vec(), distance_m(pair[0], pair[1])))
            .collect();
        Route::new(legs)
    }

    fn offsets_of(samples: &[GeoPoint]) -> Vec<f64> {
        samples.iter().map(|p| distance_m(ORIGIN, *p)).collect()
    }

    #[test]
    fn test_effective_spacing() {
        assert_eq!(RouteResampler::effective_spacing(20.0, 100, 1_000.0), 20.0);
        assert_eq!(RouteResampler::effective_spacing(20.0, 100, 5_000.0), 50.0);
    }

    #[test]
    fn test_two_legs_carry_remainder() {
        // 50 m then 30 m at 20 m spacing
        let route = northbound(&[0.0, 50.0, 80.0]);
        let samples = resample(&route, 20.0, 100).unwrap();
        let offsets = offsets_of(&samples);

        assert_eq!(offsets.len(), 5);
        for (actual, expected) in offsets.iter().zip([0.0, 20.0, 40.0, 60.0, 80.0]) {
            assert_relative_eq!(*actual, expected, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_short_single_leg_yields_endpoints() {
        let route = northbound(&[0.0, 12.0]);
        let samples = resample(&route, 20.0, 100).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], route.legs[0].path[0]);
        assert_eq!(samples[1], route.legs[0].path[1]);
    }

    #[test]
    fn test_final_vertex_is_verbatim() {
        let route = northbound(&[0.0, 33.0, 71.0, 100.0]);
        let samples = resample(&route, 20.0, 100).unwrap();

        let last = *route.overview_path().last().unwrap();
        assert_eq!(*samples.last().unwrap(), last);
        // 0, 20, 40, 60, 80, 100 with the last one being the vertex itself
        assert_eq!(samples.len(), 6);
    }

    #[test]
    fn test_carry_skips_short_segments() {
        // Vertices every 7 m: most segments produce no sample of their own
        let offsets: Vec<f64> = (0..=10).map(|i| i as f64 * 7.0).collect();
        let samples = resample(&northbound(&offsets), 20.0, 100).unwrap();
        let got = offsets_of(&samples);

        let expected = [0.0, 20.0, 40.0, 60.0, 70.0];
        assert_eq!(got.len(), expected.len());
        for (actual, expected) in got.iter().zip(expected) {
            assert_relative_eq!(*actual, expected, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_budget_widens_spacing() {
        let route = northbound(&[0.0, 1_000.0]);
        let samples = resample(&route, 5.0, 10).unwrap();
        let got = offsets_of(&samples);

        assert_eq!(got.len(), 11);
        assert_relative_eq!(got[1], 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_understated_leg_distance_stays_within_budget() {
        // The leg claims 10 m, the geometry is 1 km long
        let end = offset_m(ORIGIN, 1_000.0, 0.0);
        let route = Route::new(vec![RouteLeg::new(vec![ORIGIN, end], 10.0)]);
        let samples = resample(&route, 1.0, 10).unwrap();

        assert_eq!(samples.len(), 12);
        assert_eq!(samples[0], ORIGIN);
        assert_eq!(*samples.last().unwrap(), end);
        assert_relative_eq!(distance_m(ORIGIN, samples[10]), 10.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rejects_degenerate_input() {
        let single = Route::new(vec![RouteLeg::new(vec![ORIGIN], 0.0)]);
        assert!(matches!(resample(&single, 20.0, 100), Err(HyperlapseError::EmptyRoute)));
        let unbudgeted = resample(&northbound(&[0.0, 10.0]), 20.0, 0);
        assert!(matches!(unbudgeted, Err(HyperlapseError::Config(_))));
    }

    proptest! {
        #[test]
        fn prop_sample_count_within_budget(
            steps in prop::collection::vec((1.0f64..400.0, -1.0f64..1.0), 1..25),
            spacing in 1.0f64..60.0,
            max_points in 1usize..150,
        ) {
            // Random walk heading roughly north-east
            let mut vertices = vec![ORIGIN];
            for (length, turn) in &steps {
                let last = *vertices.last().unwrap();
                vertices.push(offset_m(last, length * turn.cos(), length * turn.sin().abs()));
            }
            let legs = vec![RouteLeg::new(vertices.clone(), path_length_m(&vertices))];
            let samples = resample(&Route::new(legs), spacing, max_points).unwrap();

            prop_assert!(samples.len() <= max_points + 2);
            prop_assert_eq!(samples[0], vertices[0]);
            prop_assert_eq!(*samples.last().unwrap(), *vertices.last().unwrap());
        }
    }
}
