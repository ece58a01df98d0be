//! Grid topology assembly.
//!
//! Candidates become nodes of a 4-connected graph: each corner links to its
//! best neighbor along each of the two global grid axes (estimated from
//! corner orientations), links must be mutual, and BFS assigns integer
//! coordinates. A frame is accepted only when exactly one connected
//! component forms a complete cols x rows lattice; anything else (missing
//! corner, coordinate conflict, two plausible boards) is a failure.

use std::collections::{HashMap, VecDeque};

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point2, Vector2};

use crate::response::CornerCandidate;

const K_NEIGHBORS: usize = 9;

// Slot layout: 0 = +u, 1 = -u, 2 = +v, 3 = -v.
const OPPOSITE: [usize; 4] = [1, 0, 3, 2];

/// Global grid-axis direction from corner orientations.
///
/// Orientations are defined modulo pi/2, so averaging happens at 4x the
/// angle where all four edge directions coincide.
fn dominant_axis(corners: &[CornerCandidate]) -> Option<f32> {
    let mut sum = Vector2::<f32>::zeros();
    let mut weight_sum = 0.0f32;

    for c in corners {
        let w = c.strength.max(0.0);
        if w <= 0.0 {
            continue;
        }
        let four_theta = 4.0 * c.orientation;
        sum += w * Vector2::new(four_theta.cos(), four_theta.sin());
        weight_sum += w;
    }

    if weight_sum <= 0.0 {
        return None;
    }
    let mean = sum / weight_sum;
    if mean.norm_squared() < 1e-6 {
        return None; // no dominant orientation
    }
    Some(0.25 * mean.y.atan2(mean.x))
}

/// Median nearest-neighbor distance, the base estimate for one grid step.
fn estimate_spacing(tree: &KdTree<f32, 2>, corners: &[CornerCandidate]) -> Option<f32> {
    let mut dists = Vec::with_capacity(corners.len());
    for c in corners {
        let query = [c.position.x, c.position.y];
        for nn in tree.nearest_n::<SquaredEuclidean>(&query, 2) {
            let d = nn.distance.sqrt();
            if d > 1e-3 {
                dists.push(d);
                break;
            }
        }
    }
    if dists.is_empty() {
        return None;
    }
    dists.sort_by(f32::total_cmp);
    Some(dists[dists.len() / 2])
}

fn best_links(
    corners: &[CornerCandidate],
    tree: &KdTree<f32, 2>,
    axis_u: Vector2<f32>,
    axis_v: Vector2<f32>,
    spacing: f32,
    cos_tol: f32,
) -> Vec<[Option<(usize, f32)>; 4]> {
    let d_min = 0.45 * spacing;
    let d_max = 1.9 * spacing;
    let mut links: Vec<[Option<(usize, f32)>; 4]> = vec![[None; 4]; corners.len()];

    for (i, corner) in corners.iter().enumerate() {
        let query = [corner.position.x, corner.position.y];
        for nn in tree.nearest_n::<SquaredEuclidean>(&query, K_NEIGHBORS) {
            let j = nn.item as usize;
            if j == i {
                continue;
            }
            let d = nn.distance.sqrt();
            if d < d_min || d > d_max {
                continue;
            }
            let e = (corners[j].position - corner.position) / d;
            let au = e.dot(&axis_u);
            let av = e.dot(&axis_v);
            let (slot, align) = if au.abs() >= av.abs() {
                (if au > 0.0 { 0 } else { 1 }, au.abs())
            } else {
                (if av > 0.0 { 2 } else { 3 }, av.abs())
            };
            if align < cos_tol {
                continue;
            }

            let score = (1.0 - align) + 0.3 * ((d - spacing) / spacing).abs();
            let slot_entry = &mut links[i][slot];
            let replace = match slot_entry {
                None => true,
                Some((_, best)) => score < *best,
            };
            if replace {
                *slot_entry = Some((j, score));
            }
        }
    }
    links
}

/// Drop links that are not reciprocated in the opposite direction.
fn enforce_mutual(links: &mut [[Option<(usize, f32)>; 4]]) {
    let snapshot: Vec<[Option<usize>; 4]> = links
        .iter()
        .map(|slots| {
            let mut out = [None; 4];
            for (s, entry) in slots.iter().enumerate() {
                out[s] = entry.map(|(j, _)| j);
            }
            out
        })
        .collect();

    for (i, slots) in links.iter_mut().enumerate() {
        for (s, entry) in slots.iter_mut().enumerate() {
            if let Some((j, _)) = *entry {
                if snapshot[j][OPPOSITE[s]] != Some(i) {
                    *entry = None;
                }
            }
        }
    }
}

struct Component {
    /// (corner index, i, j) with coordinates relative to the BFS seed.
    entries: Vec<(usize, i32, i32)>,
    valid: bool,
}

fn trace_components(links: &[[Option<(usize, f32)>; 4]]) -> Vec<Component> {
    const STEP: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

    let mut visited = vec![false; links.len()];
    let mut components = Vec::new();

    for start in 0..links.len() {
        if visited[start] {
            continue;
        }

        let mut entries = Vec::new();
        let mut valid = true;
        let mut assigned: HashMap<usize, (i32, i32)> = HashMap::new();
        let mut occupied: HashMap<(i32, i32), usize> = HashMap::new();
        let mut queue = VecDeque::new();

        assigned.insert(start, (0, 0));
        occupied.insert((0, 0), start);
        queue.push_back(start);
        visited[start] = true;

        while let Some(node) = queue.pop_front() {
            let (i, j) = assigned[&node];
            entries.push((node, i, j));

            for (s, entry) in links[node].iter().enumerate() {
                let Some((next, _)) = *entry else { continue };
                let coord = (i + STEP[s].0, j + STEP[s].1);

                if let Some(&prev) = assigned.get(&next) {
                    if prev != coord {
                        valid = false; // inconsistent loop closure
                    }
                    continue;
                }
                if let Some(&other) = occupied.get(&coord) {
                    if other != next {
                        valid = false; // two corners claim one cell
                    }
                    continue;
                }

                assigned.insert(next, coord);
                occupied.insert(coord, next);
                visited[next] = true;
                queue.push_back(next);
            }
        }

        components.push(Component { entries, valid });
    }
    components
}

/// Reduce a complete lattice to the canonical row-major ordering.
///
/// The grid's symmetries leave several valid labelings (180 degrees always,
/// quarter turns for square grids). Handedness is fixed first (row axis x
/// column axis positive in image space), then the labeling whose first
/// corner lies closest to the image origin wins, making the output
/// deterministic.
fn canonicalize(
    entries: &[(usize, i32, i32)],
    cols: usize,
    rows: usize,
    transpose: bool,
    positions: &[Point2<f32>],
) -> Option<Vec<usize>> {
    let min_i = entries.iter().map(|&(_, i, _)| i).min()?;
    let min_j = entries.iter().map(|&(_, _, j)| j).min()?;

    let mut grid: Vec<Option<usize>> = vec![None; cols * rows];
    for &(idx, raw_i, raw_j) in entries {
        let (mut i, mut j) = ((raw_i - min_i) as usize, (raw_j - min_j) as usize);
        if transpose {
            std::mem::swap(&mut i, &mut j);
        }
        let cell = &mut grid[j * cols + i];
        if cell.is_some() {
            return None;
        }
        *cell = Some(idx);
    }
    let mut grid: Vec<usize> = grid.into_iter().collect::<Option<_>>()?;

    // Fix handedness: the column axis must be a positive (counter-clockwise
    // in image coordinates) rotation of the row axis.
    let p00 = positions[grid[0]];
    let p10 = positions[grid[1]];
    let p01 = positions[grid[cols]];
    let ei = p10 - p00;
    let ej = p01 - p00;
    if ei.x * ej.y - ei.y * ej.x < 0.0 {
        let mut flipped = vec![0usize; cols * rows];
        for j in 0..rows {
            for i in 0..cols {
                flipped[(rows - 1 - j) * cols + i] = grid[j * cols + i];
            }
        }
        grid = flipped;
    }

    let rot180 = |g: &[usize]| -> Vec<usize> {
        let mut out = vec![0usize; cols * rows];
        for j in 0..rows {
            for i in 0..cols {
                out[(rows - 1 - j) * cols + (cols - 1 - i)] = g[j * cols + i];
            }
        }
        out
    };

    let mut labelings = vec![grid.clone(), rot180(&grid)];
    if cols == rows {
        // Quarter turns also preserve a square lattice (and handedness).
        let rot90 = |g: &[usize]| -> Vec<usize> {
            let n = cols;
            let mut out = vec![0usize; n * n];
            for j in 0..n {
                for i in 0..n {
                    out[(n - 1 - i) * n + j] = g[j * n + i];
                }
            }
            out
        };
        let q = rot90(&grid);
        labelings.push(rot180(&q));
        labelings.push(q);
    }

    labelings.into_iter().min_by(|a, b| {
        let pa = positions[a[0]];
        let pb = positions[b[0]];
        (pa.x + pa.y, pa.x).partial_cmp(&(pb.x + pb.y, pb.x)).unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Assemble corner candidates into the canonical row-major grid ordering.
///
/// Returns indices into `corners` such that entry `j*cols + i` is the
/// corner at grid position (i, j), or `None` when no unambiguous complete
/// board is present.
pub(crate) fn assemble_grid(
    corners: &[CornerCandidate],
    cols: usize,
    rows: usize,
    tolerance_deg: f32,
) -> Option<Vec<usize>> {
    let needed = cols * rows;
    if needed == 0 || corners.len() < needed {
        return None;
    }

    let theta = dominant_axis(corners)?;
    let axis_u = Vector2::new(theta.cos(), theta.sin());
    let axis_v = Vector2::new(-theta.sin(), theta.cos());

    let coords: Vec<[f32; 2]> = corners
        .iter()
        .map(|c| [c.position.x, c.position.y])
        .collect();
    let tree: KdTree<f32, 2> = (&coords).into();

    let spacing = estimate_spacing(&tree, corners)?;
    let cos_tol = tolerance_deg.to_radians().cos();

    let mut links = best_links(corners, &tree, axis_u, axis_v, spacing, cos_tol);
    enforce_mutual(&mut links);

    let positions: Vec<Point2<f32>> = corners.iter().map(|c| c.position).collect();
    let mut result = None;

    for component in trace_components(&links) {
        if !component.valid || component.entries.len() != needed {
            continue;
        }
        let (mut min_i, mut max_i, mut min_j, mut max_j) = (i32::MAX, i32::MIN, i32::MAX, i32::MIN);
        for &(_, i, j) in &component.entries {
            min_i = min_i.min(i);
            max_i = max_i.max(i);
            min_j = min_j.min(j);
            max_j = max_j.max(j);
        }
        let w = (max_i - min_i + 1) as usize;
        let h = (max_j - min_j + 1) as usize;

        let transpose = if (w, h) == (cols, rows) {
            false
        } else if (w, h) == (rows, cols) {
            true
        } else {
            continue;
        };

        let Some(order) = canonicalize(&component.entries, cols, rows, transpose, &positions)
        else {
            continue;
        };
        if result.is_some() {
            return None; // two complete boards: ambiguous
        }
        result = Some(order);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn lattice(cols: usize, rows: usize, spacing: f32, theta: f32) -> Vec<CornerCandidate> {
        let u = Vector2::new(theta.cos(), theta.sin());
        let v = Vector2::new(-theta.sin(), theta.cos());
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let p = Point2::new(100.0, 100.0)
                    + u * (i as f32 * spacing)
                    + v * (j as f32 * spacing);
                corners.push(CornerCandidate {
                    position: p,
                    strength: 1.0,
                    orientation: theta.rem_euclid(FRAC_PI_2),
                });
            }
        }
        corners
    }

    #[test]
    fn assembles_axis_aligned_lattice() {
        let cols = 5;
        let rows = 4;
        let corners = lattice(cols, rows, 20.0, 0.0);
        let order = assemble_grid(&corners, cols, rows, 25.0).expect("grid");
        assert_eq!(order.len(), cols * rows);

        // Canonical ordering is row-major with consistent spacing.
        let first_row_y = corners[order[0]].position.y;
        for i in 0..cols {
            assert!((corners[order[i]].position.y - first_row_y).abs() < 1e-3);
        }
        let step = corners[order[1]].position - corners[order[0]].position;
        assert!((step.norm() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn assembles_rotated_lattice() {
        let cols = 5;
        let rows = 4;
        let corners = lattice(cols, rows, 18.0, 0.4);
        let order = assemble_grid(&corners, cols, rows, 25.0).expect("grid");
        assert_eq!(order.len(), cols * rows);
    }

    #[test]
    fn rejects_incomplete_lattice() {
        let cols = 5;
        let rows = 4;
        let mut corners = lattice(cols, rows, 20.0, 0.0);
        corners.pop(); // one missing corner
        assert!(assemble_grid(&corners, cols, rows, 25.0).is_none());
    }

    #[test]
    fn rejects_wrong_dimensions() {
        let corners = lattice(5, 4, 20.0, 0.0);
        assert!(assemble_grid(&corners, 6, 4, 25.0).is_none());
    }

    #[test]
    fn accepts_transposed_board() {
        // A 4x5 arrangement of a 5x4 pattern (camera rolled 90 degrees).
        let corners = lattice(4, 5, 20.0, 0.0);
        let order = assemble_grid(&corners, 5, 4, 25.0).expect("grid");
        assert_eq!(order.len(), 20);
    }

    #[test]
    fn ordering_is_deterministic_for_square_grids() {
        let corners = lattice(4, 4, 20.0, 0.0);
        let a = assemble_grid(&corners, 4, 4, 25.0).expect("grid");
        let b = assemble_grid(&corners, 4, 4, 25.0).expect("grid");
        assert_eq!(a, b);
        // First corner is the one closest to the image origin.
        let p = corners[a[0]].position;
        assert!((p.x - 100.0).abs() < 1e-3 && (p.y - 100.0).abs() < 1e-3);
    }
}
