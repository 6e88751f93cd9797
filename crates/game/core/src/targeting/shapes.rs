//! Geometric containment predicates for the area shapes.
//!
//! All tests run in the XY plane against the candidate's bounding
//! circle, not its center point: a shape affects an entity when it
//! overlaps the entity's bounds. Height eligibility is handled by the
//! reach filter, not here.

use crate::def::TargetingShape;
use crate::math::{self, Vec3, to_radians};

/// Fully resolved geometry of one area footprint.
#[derive(Debug, Clone, Copy)]
pub struct ShapeParams {
    pub shape: TargetingShape,
    /// Shape origin: the aim point, or the user for user-centered areas.
    pub center: Vec3,
    pub radius: f32,
    /// Unit direction in the XY plane, orientation offset already
    /// applied. Beam sweeps pass the per-slice direction here.
    pub direction: Vec3,
    /// Full aperture in degrees for wedge/arc/sweep shapes. Beam sweeps
    /// pass the per-slice aperture here.
    pub angle_deg: f32,
    /// Capsule width or ring thickness.
    pub width: f32,
    /// Capsule length.
    pub length: f32,
}

/// Does the shape overlap a bounding circle at `position` with radius
/// `bounds_radius`?
pub fn contains(params: &ShapeParams, position: Vec3, bounds_radius: f32) -> bool {
    match params.shape {
        TargetingShape::CircleArea => in_circle(params, position, bounds_radius),
        TargetingShape::RingArea => in_ring(params, position, bounds_radius),
        TargetingShape::WedgeArea | TargetingShape::BeamSweep => {
            in_wedge(params, params.angle_deg, position, bounds_radius)
        }
        TargetingShape::ArcArea => {
            in_wedge(params, arc_aperture_deg(params.width, params.radius), position, bounds_radius)
        }
        TargetingShape::CapsuleArea => in_capsule(params, position, bounds_radius),
        // Single-target shapes have no footprint; the resolver handles
        // them before geometry is consulted.
        TargetingShape::SelfOnly
        | TargetingShape::SingleTarget
        | TargetingShape::SingleTargetRandom
        | TargetingShape::SingleTargetOwner => false,
    }
}

fn in_circle(params: &ShapeParams, position: Vec3, bounds_radius: f32) -> bool {
    let reach = params.radius + bounds_radius;
    params.center.distance_sq2d(position) <= reach * reach
}

fn in_ring(params: &ShapeParams, position: Vec3, bounds_radius: f32) -> bool {
    if !in_circle(params, position, bounds_radius) {
        return false;
    }
    let inner = params.radius - params.width;
    if inner <= 0.0 {
        return true;
    }
    // Inside the hole only if the whole bounding circle is.
    params.center.distance2d(position) + bounds_radius > inner
}

/// Aperture of an arc sized so its chord spans `width` at `radius`.
fn arc_aperture_deg(width: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    let half_chord = (width * 0.5 / radius).clamp(-1.0, 1.0);
    2.0 * math::asin(half_chord) * (180.0 / math::PI)
}

fn in_wedge(params: &ShapeParams, aperture_deg: f32, position: Vec3, bounds_radius: f32) -> bool {
    if !in_circle(params, position, bounds_radius) {
        return false;
    }
    let to_target = (position - params.center).flattened();
    if to_target.length_sq2d() <= bounds_radius * bounds_radius {
        // Shape origin is inside the bounds; any aperture hits.
        return true;
    }

    let half_angle = to_radians(aperture_deg * 0.5);
    if params.direction.angle2d(to_target) <= half_angle {
        return true;
    }

    // Center is outside the angular band: the bounds circle can still
    // clip one of the two wedge edges.
    let max_reach = params.radius + bounds_radius;
    edge_hits(params.direction.rotated2d(half_angle), to_target, bounds_radius, max_reach)
        || edge_hits(params.direction.rotated2d(-half_angle), to_target, bounds_radius, max_reach)
}

/// Distance from the target center to the edge ray, checked against the
/// bounds radius, with the projection limited to the wedge's reach.
fn edge_hits(edge: Vec3, to_target: Vec3, bounds_radius: f32, max_reach: f32) -> bool {
    let along = edge.dot2d(to_target);
    if along < 0.0 || along > max_reach {
        return false;
    }
    let lateral = math::abs(edge.perp2d().dot2d(to_target));
    lateral <= bounds_radius
}

fn in_capsule(params: &ShapeParams, position: Vec3, bounds_radius: f32) -> bool {
    let half_width = params.width * 0.5 + bounds_radius;
    let rel = (position - params.center).flattened();
    let along = params.direction.dot2d(rel);
    if along < -bounds_radius || along > params.length + bounds_radius {
        return false;
    }
    math::abs(params.direction.perp2d().dot2d(rel)) <= half_width
}

// ============================================================================
// Beam Sweep Slices
// ============================================================================

/// Number of slices a sweep of `total_ms` at `rate_ms` per slice
/// produces. The last slice may be partial.
pub fn beam_slice_count(total_ms: u64, rate_ms: u64) -> u32 {
    if rate_ms == 0 || total_ms == 0 {
        return 1;
    }
    (total_ms.div_ceil(rate_ms)) as u32
}

/// Direction offset (degrees from the aim direction) and aperture of
/// slice `index`. The sweep spans the full `angle_deg` across
/// `total_ms`; a counter-clockwise sweep starts at the clockwise edge
/// and vice versa.
pub fn beam_slice_geometry(
    angle_deg: f32,
    total_ms: u64,
    rate_ms: u64,
    index: u32,
    clockwise: bool,
) -> Option<(f32, f32)> {
    let count = beam_slice_count(total_ms, rate_ms);
    if index >= count {
        return None;
    }
    let total = total_ms.max(1) as f32;
    let covered_start = angle_deg * ((index as u64 * rate_ms).min(total_ms) as f32 / total);
    let covered_end = angle_deg * (((index as u64 + 1) * rate_ms).min(total_ms) as f32 / total);
    let aperture = covered_end - covered_start;
    let mid = covered_start + aperture * 0.5;
    // Offset measured from the starting edge toward the sweep direction.
    let from_center = mid - angle_deg * 0.5;
    let offset = if clockwise { -from_center } else { from_center };
    Some((offset, aperture))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle(radius: f32) -> ShapeParams {
        ShapeParams {
            shape: TargetingShape::CircleArea,
            center: Vec3::ZERO,
            radius,
            direction: Vec3::X_AXIS,
            angle_deg: 0.0,
            width: 0.0,
            length: 0.0,
        }
    }

    #[test]
    fn circle_counts_overlapping_bounds() {
        let params = circle(100.0);
        assert!(contains(&params, Vec3::new(109.0, 0.0, 0.0), 10.0));
        assert!(!contains(&params, Vec3::new(111.0, 0.0, 0.0), 10.0));
    }

    #[test]
    fn ring_excludes_the_hole() {
        let mut params = circle(100.0);
        params.shape = TargetingShape::RingArea;
        params.width = 30.0;
        // Deep inside the hole.
        assert!(!contains(&params, Vec3::new(20.0, 0.0, 0.0), 5.0));
        // In the band.
        assert!(contains(&params, Vec3::new(85.0, 0.0, 0.0), 5.0));
        // Bounds poke out of the hole into the band.
        assert!(contains(&params, Vec3::new(68.0, 0.0, 0.0), 5.0));
    }

    #[test]
    fn wedge_respects_the_aperture() {
        let mut params = circle(100.0);
        params.shape = TargetingShape::WedgeArea;
        params.angle_deg = 90.0;
        assert!(contains(&params, Vec3::new(50.0, 30.0, 0.0), 1.0));
        assert!(!contains(&params, Vec3::new(0.0, 50.0, 0.0), 1.0));
        // Directly behind is out regardless of bounds.
        assert!(!contains(&params, Vec3::new(-50.0, 0.0, 0.0), 5.0));
    }

    #[test]
    fn wedge_edge_clips_wide_bounds() {
        let mut params = circle(100.0);
        params.shape = TargetingShape::WedgeArea;
        params.angle_deg = 60.0;
        // Center ~36 degrees off-axis, outside the 30 degree half-angle,
        // but a fat bounds circle reaches the edge.
        let position = Vec3::new(40.0, 30.0, 0.0);
        assert!(!contains(&params, position, 1.0));
        assert!(contains(&params, position, 15.0));
    }

    #[test]
    fn capsule_is_a_rotated_rectangle() {
        let mut params = circle(0.0);
        params.shape = TargetingShape::CapsuleArea;
        params.direction = Vec3::new(0.0, 1.0, 0.0);
        params.length = 200.0;
        params.width = 40.0;
        assert!(contains(&params, Vec3::new(10.0, 150.0, 0.0), 1.0));
        assert!(!contains(&params, Vec3::new(40.0, 150.0, 0.0), 1.0));
        assert!(!contains(&params, Vec3::new(0.0, 230.0, 0.0), 1.0));
    }

    #[test]
    fn sweep_slices_tile_the_full_aperture() {
        let angle = 120.0;
        let count = beam_slice_count(1000, 100);
        assert_eq!(count, 10);

        let mut covered = 0.0;
        let mut prev_end = -angle / 2.0;
        for i in 0..count {
            let (offset, aperture) = beam_slice_geometry(angle, 1000, 100, i, false).unwrap();
            let start = offset - aperture / 2.0;
            let end = offset + aperture / 2.0;
            assert!((start - prev_end).abs() < 1e-3, "slice {i} leaves a gap");
            prev_end = end;
            covered += aperture;
        }
        assert!((covered - angle).abs() < 1e-3);
        assert!((prev_end - angle / 2.0).abs() < 1e-3);
    }

    #[test]
    fn final_partial_slice_is_narrower() {
        // 1050ms at 100ms per slice: 11 slices, the last covering half
        // the time of the others.
        let count = beam_slice_count(1050, 100);
        assert_eq!(count, 11);
        let (_, full) = beam_slice_geometry(90.0, 1050, 100, 0, false).unwrap();
        let (_, partial) = beam_slice_geometry(90.0, 1050, 100, 10, false).unwrap();
        assert!(partial < full);
        assert!(beam_slice_geometry(90.0, 1050, 100, 11, false).is_none());
    }

    #[test]
    fn clockwise_sweep_mirrors_counter_clockwise() {
        let (ccw, _) = beam_slice_geometry(90.0, 1000, 100, 2, false).unwrap();
        let (cw, _) = beam_slice_geometry(90.0, 1000, 100, 2, true).unwrap();
        assert!((ccw + cw).abs() < 1e-5);
    }
}
