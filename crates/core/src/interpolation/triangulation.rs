use std::collections::HashMap;

use folje_fixtures::Point2D;

use crate::error::FollowError;

/// Tolerance used by the area-sum containment test.
const CONTAINMENT_TOLERANCE: f64 = 1e-9;

/// Relative tolerance for orientation and in-circle predicates.
const PREDICATE_TOLERANCE: f64 = 1e-12;

/// Delaunay triangulation over a deduplicated point set.
///
/// Points live in a single array and triangles are a flat list of index
/// triples into it, each in counter-clockwise order. The triangles partition
/// the convex hull of the points without overlap.
#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<Point2D>,
    source_indices: Vec<usize>,
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    pub fn new(input: &[Point2D]) -> Result<Self, FollowError> {
        if let Some(point) = input.iter().find(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(FollowError::TriangulationFailure(format!(
                "non-finite coordinate ({}, {})",
                point.x, point.y
            )));
        }

        let (points, source_indices) = dedup(input);
        if points.len() < 3 {
            return Err(FollowError::TriangulationFailure(format!(
                "at least 3 distinct points are required, got {}",
                points.len()
            )));
        }

        let tolerance = Tolerance::for_points(&points);

        let mut order: Vec<usize> = (0..points.len()).collect();
        order.sort_by(|a, b| {
            let (pa, pb) = (points[*a], points[*b]);
            pa.x.total_cmp(&pb.x).then(pa.y.total_cmp(&pb.y))
        });

        let mut triangles = sweep(&points, &order, &tolerance)?;
        legalize(&points, &mut triangles, &tolerance);

        Ok(Triangulation {
            points,
            source_indices,
            triangles,
        })
    }

    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    /// Index into the original input for each deduplicated point.
    pub fn source_indices(&self) -> &[usize] {
        &self.source_indices
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn vertices(&self, triangle: usize) -> [Point2D; 3] {
        let [a, b, c] = self.triangles[triangle];
        [self.points[a], self.points[b], self.points[c]]
    }

    /// Returns the first triangle, in registration order, that contains `point`.
    ///
    /// Linear in the number of triangles. Calibration sets are small, so there
    /// is no walk from the previously located triangle.
    pub fn locate(&self, point: Point2D) -> Option<usize> {
        (0..self.triangles.len()).find(|t| {
            let [a, b, c] = self.vertices(*t);
            contains(a, b, c, point)
        })
    }
}

struct Tolerance {
    orientation: f64,
    in_circle: f64,
}

impl Tolerance {
    fn for_points(points: &[Point2D]) -> Self {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let extent = (max_x - min_x).max(max_y - min_y);
        let area_scale = extent * extent;

        Tolerance {
            orientation: PREDICATE_TOLERANCE * area_scale,
            in_circle: PREDICATE_TOLERANCE * area_scale * area_scale,
        }
    }
}

fn dedup(input: &[Point2D]) -> (Vec<Point2D>, Vec<usize>) {
    let mut points: Vec<Point2D> = Vec::with_capacity(input.len());
    let mut source_indices = Vec::with_capacity(input.len());

    for (index, point) in input.iter().enumerate() {
        if points.iter().any(|p| p.x == point.x && p.y == point.y) {
            continue;
        }
        points.push(*point);
        source_indices.push(index);
    }

    (points, source_indices)
}

/// Twice the signed area of `abc`; positive when counter-clockwise.
fn orient(a: Point2D, b: Point2D, c: Point2D) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Positive when `d` lies inside the circumcircle of the counter-clockwise triangle `abc`.
fn in_circle(a: Point2D, b: Point2D, c: Point2D, d: Point2D) -> f64 {
    let (adx, ady) = (a.x - d.x, a.y - d.y);
    let (bdx, bdy) = (b.x - d.x, b.y - d.y);
    let (cdx, cdy) = (c.x - d.x, c.y - d.y);

    (adx * adx + ady * ady) * (bdx * cdy - cdx * bdy)
        - (bdx * bdx + bdy * bdy) * (adx * cdy - cdx * ady)
        + (cdx * cdx + cdy * cdy) * (adx * bdy - bdx * ady)
}

pub(crate) fn area(a: Point2D, b: Point2D, c: Point2D) -> f64 {
    ((a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y)) / 2.0).abs()
}

fn contains(a: Point2D, b: Point2D, c: Point2D, p: Point2D) -> bool {
    let whole = area(a, b, c);
    let parts = area(p, b, c) + area(a, p, c) + area(a, b, p);
    (whole - parts).abs() < CONTAINMENT_TOLERANCE
}

/// Sweep-hull construction: points are added in lexicographic order, each one
/// connected to every hull edge it can see. The result covers the convex hull
/// exactly but is not yet Delaunay.
fn sweep(
    points: &[Point2D],
    order: &[usize],
    tolerance: &Tolerance,
) -> Result<Vec<[usize; 3]>, FollowError> {
    let (first, second) = (points[order[0]], points[order[1]]);

    // Leading points on one line form a chain that the first off-line point fans onto.
    let apex_position = order[2..]
        .iter()
        .position(|i| orient(first, second, points[*i]).abs() > tolerance.orientation)
        .map(|offset| offset + 2)
        .ok_or_else(|| {
            FollowError::TriangulationFailure("all points are collinear".to_string())
        })?;

    let apex = order[apex_position];
    let chain = &order[..apex_position];
    let counter_clockwise = orient(first, second, points[apex]) > 0.0;

    let mut triangles = Vec::with_capacity(2 * points.len());
    for pair in chain.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if counter_clockwise {
            triangles.push([a, b, apex]);
        } else {
            triangles.push([b, a, apex]);
        }
    }

    let mut hull: Vec<usize> = chain.to_vec();
    hull.push(apex);
    if !counter_clockwise {
        hull.reverse();
    }

    for point in &order[apex_position + 1..] {
        extend_hull(points, &mut hull, &mut triangles, *point, tolerance);
    }

    Ok(triangles)
}

fn extend_hull(
    points: &[Point2D],
    hull: &mut Vec<usize>,
    triangles: &mut Vec<[usize; 3]>,
    point: usize,
    tolerance: &Tolerance,
) {
    let n = hull.len();
    let p = points[point];
    let visible: Vec<bool> = (0..n)
        .map(|i| orient(points[hull[i]], points[hull[(i + 1) % n]], p) < -tolerance.orientation)
        .collect();

    let Some(start) = (0..n).find(|i| visible[*i] && !visible[(*i + n - 1) % n]) else {
        log::debug!("point ({}, {}) sees no hull edge, skipping", p.x, p.y);
        return;
    };

    let mut count = 0;
    while count < n && visible[(start + count) % n] {
        let i = (start + count) % n;
        triangles.push([hull[(i + 1) % n], hull[i], point]);
        count += 1;
    }

    // Keep the hidden part of the hull and splice the new point over the visible chain.
    let mut next = Vec::with_capacity(n - count + 2);
    for j in 0..=(n - count) {
        next.push(hull[(start + count + j) % n]);
    }
    next.push(point);
    *hull = next;
}

/// Lawson edge flips until every interior edge is locally Delaunay.
fn legalize(points: &[Point2D], triangles: &mut [[usize; 3]], tolerance: &Tolerance) {
    let flip_limit = 4 * triangles.len() * triangles.len() + 16;

    for _ in 0..flip_limit {
        let Some(flip) = find_illegal_edge(points, triangles, tolerance) else {
            return;
        };
        let Flip { first, second, a, b, c, d } = flip;
        triangles[first] = [a, d, c];
        triangles[second] = [d, b, c];
    }

    log::debug!("edge flip limit reached, triangulation may not be Delaunay");
}

struct Flip {
    first: usize,
    second: usize,
    a: usize,
    b: usize,
    c: usize,
    d: usize,
}

fn find_illegal_edge(
    points: &[Point2D],
    triangles: &[[usize; 3]],
    tolerance: &Tolerance,
) -> Option<Flip> {
    // Directed edge -> (triangle, opposite vertex)
    let mut edges: HashMap<(usize, usize), (usize, usize)> = HashMap::with_capacity(triangles.len() * 3);
    for (t, tri) in triangles.iter().enumerate() {
        for k in 0..3 {
            edges.insert((tri[k], tri[(k + 1) % 3]), (t, tri[(k + 2) % 3]));
        }
    }

    for (first, tri) in triangles.iter().enumerate() {
        for k in 0..3 {
            let (a, b, c) = (tri[k], tri[(k + 1) % 3], tri[(k + 2) % 3]);
            let Some(&(second, d)) = edges.get(&(b, a)) else {
                continue;
            };
            if second < first {
                continue;
            }

            let (pa, pb, pc, pd) = (points[a], points[b], points[c], points[d]);
            if in_circle(pa, pb, pc, pd) <= tolerance.in_circle {
                continue;
            }
            // Only convex quadrilaterals can be flipped.
            if orient(pa, pd, pc) <= tolerance.orientation
                || orient(pd, pb, pc) <= tolerance.orientation
            {
                continue;
            }

            return Some(Flip { first, second, a, b, c, d });
        }
    }

    None
}
