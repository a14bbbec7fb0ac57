//! Hexagonal segment lattice.
//!
//! Segments are pointy-top hexagons: their flats face ±x, so neighbouring
//! segments sit along the x axis and at ±60° from it. Lattice sites are
//! addressed in axial coordinates `(q, r)` with
//! `x = pitch·(q + r/2)`, `y = pitch·(√3/2)·r`.

use nalgebra::Vector2;

/// Axial step to each of the six neighbours, walked in this order around a ring.
const AXIAL_DIRECTIONS: [(i64, i64); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

/// Number of segments in a hexagon with `rings` rings around the center.
pub fn segment_count(rings: usize) -> usize {
    1 + 3 * rings * (rings + 1)
}

/// Number of distinct baselines, counting `v` and `-v` once.
///
/// Pairwise differences of a radius-r hexagon fill a radius-2r hexagon; every
/// non-zero site of it paired with its mirror gives one baseline.
pub fn expected_baseline_count(rings: usize) -> usize {
    (segment_count(2 * rings) - 1) / 2
}

/// Axial coordinates of every segment in ring order.
///
/// Index 0 is the central segment. Each ring starts at its lower-left corner
/// and runs counter-clockwise.
pub fn ring_order_axial(rings: usize) -> Vec<(i64, i64)> {
    let mut sites = Vec::with_capacity(segment_count(rings));
    sites.push((0, 0));

    for ring in 1..=rings as i64 {
        let (dq, dr) = AXIAL_DIRECTIONS[4];
        let mut site = (dq * ring, dr * ring);
        for &(step_q, step_r) in AXIAL_DIRECTIONS.iter() {
            for _ in 0..ring {
                sites.push(site);
                site = (site.0 + step_q, site.1 + step_r);
            }
        }
    }
    sites
}

/// Segment centers in meters, ring order, aperture-centered.
pub fn lattice_positions(rings: usize, pitch: f64) -> Vec<Vector2<f64>> {
    let half_sqrt3 = 3.0f64.sqrt() / 2.0;
    ring_order_axial(rings)
        .into_iter()
        .map(|(q, r)| Vector2::new(pitch * (q as f64 + r as f64 / 2.0), pitch * half_sqrt3 * r as f64))
        .collect()
}

/// Circumradius (center to corner) of a hexagon with the given flat-to-flat width.
pub fn circumradius(flat_to_flat: f64) -> f64 {
    flat_to_flat / 3.0f64.sqrt()
}

/// Whether the offset `(dx, dy)` from a segment center falls inside it.
pub fn inside_hexagon(dx: f64, dy: f64, flat_to_flat: f64) -> bool {
    let half = flat_to_flat / 2.0;
    let ax = dx.abs();
    ax <= half && ax / 2.0 + dy.abs() * 3.0f64.sqrt() / 2.0 <= half
}
