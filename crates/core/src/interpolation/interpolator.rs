use folje_fixtures::Point2D;

use super::triangulation::Triangulation;
use crate::error::FollowError;

/// Piecewise-linear pan/tilt interpolation over a triangulated calibration set.
#[derive(Debug, Clone)]
pub struct Interpolator {
    triangulation: Triangulation,
    pan_values: Vec<f64>,
    tilt_values: Vec<f64>,
    fill_value: f64,
}

impl Interpolator {
    /// Triangulates `points` and binds one pan and one tilt value to each of them.
    ///
    /// When several input points share a position, the first one's values are kept.
    pub fn build(
        points: &[Point2D],
        pan_values: &[f64],
        tilt_values: &[f64],
        fill_value: f64,
    ) -> Result<Self, FollowError> {
        if points.is_empty() || points.len() != pan_values.len() || points.len() != tilt_values.len()
        {
            return Err(FollowError::InvalidInput(format!(
                "points and values must have the same non-zero length (points: {}, pan: {}, tilt: {})",
                points.len(),
                pan_values.len(),
                tilt_values.len()
            )));
        }

        let triangulation = Triangulation::new(points)?;
        let pan_values = triangulation
            .source_indices()
            .iter()
            .map(|i| pan_values[*i])
            .collect();
        let tilt_values = triangulation
            .source_indices()
            .iter()
            .map(|i| tilt_values[*i])
            .collect();

        Ok(Interpolator {
            triangulation,
            pan_values,
            tilt_values,
            fill_value,
        })
    }

    /// Interpolated `(pan, tilt)` at `position`.
    ///
    /// Positions outside the convex hull of the calibration points yield
    /// `(fill_value, fill_value)`. A degenerate enclosing triangle yields
    /// [`FollowError::CollinearTriangle`]; callers fall back to the fill value.
    pub fn interpolate(&self, position: Point2D) -> Result<(f64, f64), FollowError> {
        let Some(triangle) = self.triangulation.locate(position) else {
            return Ok((self.fill_value, self.fill_value));
        };

        let [a, b, c] = self.triangulation.vertices(triangle);
        let (l1, l2, l3) = barycentric(a, b, c, position)?;

        let [i1, i2, i3] = self.triangulation.triangles()[triangle];
        let pan = l1 * self.pan_values[i1] + l2 * self.pan_values[i2] + l3 * self.pan_values[i3];
        let tilt =
            l1 * self.tilt_values[i1] + l2 * self.tilt_values[i2] + l3 * self.tilt_values[i3];

        Ok((pan, tilt))
    }

    pub fn fill_value(&self) -> f64 {
        self.fill_value
    }

    pub fn triangulation(&self) -> &Triangulation {
        &self.triangulation
    }
}

/// Barycentric weights of `point` with respect to triangle `p1 p2 p3`.
pub fn barycentric(
    p1: Point2D,
    p2: Point2D,
    p3: Point2D,
    point: Point2D,
) -> Result<(f64, f64, f64), FollowError> {
    // Twice the signed area of the triangle.
    let denominator = (p2.x - p3.x) * (p1.y - p3.y) - (p2.y - p3.y) * (p1.x - p3.x);
    if denominator == 0.0 {
        return Err(FollowError::CollinearTriangle);
    }

    let l1 = ((p2.x - p3.x) * (point.y - p3.y) - (p2.y - p3.y) * (point.x - p3.x)) / denominator;
    let l2 = ((p3.x - p1.x) * (point.y - p3.y) - (p3.y - p1.y) * (point.x - p3.x)) / denominator;
    let l3 = 1.0 - l1 - l2;

    Ok((l1, l2, l3))
}
