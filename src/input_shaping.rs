//! Defines the non-linear shaping of operator stick input.
//!
//! Each stick axis is passed through an [InputCurve]: a monotone piecewise-cubic curve through a
//! set of control points on [0, 1]. The curve maps the stick magnitude onto the commanded
//! magnitude. Small magnitudes inside the deadband are dropped entirely and the sign of the
//! stick input is carried through unchanged.

use serde::{Deserialize, Serialize};

use crate::Error;

#[cfg(test)]
#[path = "input_shaping_tests.rs"]
mod input_shaping_tests;

/// Identifies the curve that is used to shape a stick axis.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum CurveId {
    /// The curve for the translational (throttle and strafe) axes.
    Throttle,
    /// The curve for the rotation axis.
    Turn,
}

/// The cubic polynomial that covers the interval [x, next x) of an [InputCurve].
#[derive(Clone, Copy, Debug, PartialEq)]
struct CurveSegment {
    x: f64,
    y: f64,
    c1: f64,
    c2: f64,
    c3: f64,
}

impl CurveSegment {
    fn evaluate(&self, x: f64) -> f64 {
        let t = x - self.x;
        self.y + t * (self.c1 + t * (self.c2 + t * self.c3))
    }
}

/// A monotone curve through an ordered set of control points.
///
/// The interpolant is a Fritsch-Carlson monotone cubic Hermite spline. The tangents are limited so
/// that the curve never overshoots between control points, which keeps the shaped output
/// non-decreasing whenever the control points are. The polynomial coefficients are calculated
/// once when the curve is created.
///
/// Inputs below the first control point evaluate to the first y-value and inputs above the last
/// control point evaluate to the last y-value.
#[derive(Clone, Debug, PartialEq)]
pub struct InputCurve {
    segments: Vec<CurveSegment>,
    last_x: f64,
    last_y: f64,
}

impl InputCurve {
    /// Evaluates the curve at the given input.
    pub fn evaluate(&self, x: f64) -> f64 {
        if x.is_nan() {
            return self.segments[0].y;
        }

        if x <= self.segments[0].x {
            return self.segments[0].y;
        }

        if x >= self.last_x {
            return self.last_y;
        }

        // The first segment that starts after x is one past the segment that contains x
        let index = self.segments.partition_point(|s| s.x <= x) - 1;
        self.segments[index].evaluate(x)
    }

    /// Returns the largest output of the curve.
    pub fn maximum_output(&self) -> f64 {
        self.last_y
    }

    /// Creates a new [InputCurve] through the given control points.
    ///
    /// ## Parameters
    ///
    /// * 'xs' - The x-coordinates of the control points. Strictly increasing and in [0, 1].
    /// * 'ys' - The y-coordinates of the control points. Non-decreasing.
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidInputCurve] - Returned when there are fewer than two control points, the
    ///   number of x- and y-values differ, or the points do not describe a non-decreasing curve
    ///   on [0, 1].
    ///
    /// ## Examples
    ///
    /// ```
    /// use swerve_drive_core::input_shaping::InputCurve;
    ///
    /// let curve = InputCurve::new(&[0.0, 0.5, 1.0], &[0.0, 1.975, 3.95]).unwrap();
    /// assert_eq!(1.975, curve.evaluate(0.5));
    /// ```
    pub fn new(xs: &[f64], ys: &[f64]) -> Result<Self, Error> {
        Self::validate_points(xs, ys)?;

        let n = xs.len();
        let widths: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let slopes: Vec<f64> = (0..n - 1)
            .map(|i| (ys[i + 1] - ys[i]) / widths[i])
            .collect();

        // Initial tangents: one-sided slopes at the ends, averaged slopes in the interior
        let mut tangents = vec![0.0; n];
        tangents[0] = slopes[0];
        tangents[n - 1] = slopes[n - 2];
        for i in 1..n - 1 {
            if slopes[i - 1] * slopes[i] > 0.0 {
                tangents[i] = 0.5 * (slopes[i - 1] + slopes[i]);
            }
        }

        // Limit the tangents so the cubic cannot overshoot within a segment
        for i in 0..n - 1 {
            if slopes[i] == 0.0 {
                tangents[i] = 0.0;
                tangents[i + 1] = 0.0;
                continue;
            }

            let alpha = tangents[i] / slopes[i];
            let beta = tangents[i + 1] / slopes[i];
            let length_squared = alpha * alpha + beta * beta;
            if length_squared > 9.0 {
                let tau = 3.0 / length_squared.sqrt();
                tangents[i] = tau * alpha * slopes[i];
                tangents[i + 1] = tau * beta * slopes[i];
            }
        }

        let segments = (0..n - 1)
            .map(|i| {
                let h = widths[i];
                CurveSegment {
                    x: xs[i],
                    y: ys[i],
                    c1: tangents[i],
                    c2: (3.0 * slopes[i] - 2.0 * tangents[i] - tangents[i + 1]) / h,
                    c3: (tangents[i] + tangents[i + 1] - 2.0 * slopes[i]) / (h * h),
                }
            })
            .collect();

        Ok(Self {
            segments,
            last_x: xs[n - 1],
            last_y: ys[n - 1],
        })
    }

    fn validate_points(xs: &[f64], ys: &[f64]) -> Result<(), Error> {
        if xs.len() != ys.len() {
            return Err(Error::InvalidInputCurve {
                reason: format!(
                    "found {} x-values and {} y-values",
                    xs.len(),
                    ys.len()
                ),
            });
        }

        if xs.len() < 2 {
            return Err(Error::InvalidInputCurve {
                reason: format!("needs at least 2 control points. Found {}", xs.len()),
            });
        }

        for (x, y) in xs.iter().zip(ys) {
            if !x.is_finite() || !y.is_finite() || !(0.0..=1.0).contains(x) {
                return Err(Error::InvalidInputCurve {
                    reason: format!("control point ({}, {}) is not a finite point with x in [0, 1]", x, y),
                });
            }
        }

        for i in 1..xs.len() {
            if xs[i] <= xs[i - 1] {
                return Err(Error::InvalidInputCurve {
                    reason: format!(
                        "x-values must be strictly increasing. Found {} after {}",
                        xs[i],
                        xs[i - 1]
                    ),
                });
            }

            if ys[i] < ys[i - 1] {
                return Err(Error::InvalidInputCurve {
                    reason: format!(
                        "y-values must not decrease. Found {} after {}",
                        ys[i],
                        ys[i - 1]
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Shapes raw stick values with one [InputCurve] per [CurveId] and a shared deadband.
#[derive(Clone, Debug, PartialEq)]
pub struct InputShaper {
    throttle: InputCurve,
    turn: InputCurve,
    deadband: f64,
}

impl InputShaper {
    /// Returns the curve that belongs to the given ID.
    pub fn curve(&self, curve_id: CurveId) -> &InputCurve {
        match curve_id {
            CurveId::Throttle => &self.throttle,
            CurveId::Turn => &self.turn,
        }
    }

    /// Returns the deadband.
    pub fn deadband(&self) -> f64 {
        self.deadband
    }

    /// Creates a new [InputShaper].
    ///
    /// ## Parameters
    ///
    /// * 'throttle' - The curve for the translational axes
    /// * 'turn' - The curve for the rotation axis
    /// * 'deadband' - Stick magnitudes below this value are shaped to zero. In [0, 1).
    ///
    /// ## Errors
    ///
    /// * [Error::InvalidConfiguration] - Returned when the deadband is outside [0, 1).
    pub fn new(throttle: InputCurve, turn: InputCurve, deadband: f64) -> Result<Self, Error> {
        if !(0.0..1.0).contains(&deadband) {
            return Err(Error::InvalidConfiguration {
                reason: format!("deadband must be in [0, 1). Found {}", deadband),
            });
        }

        Ok(Self {
            throttle,
            turn,
            deadband,
        })
    }

    /// Shapes a raw stick value.
    ///
    /// The raw value is clamped to [-1, 1]. Magnitudes below the deadband return exactly zero.
    /// Other magnitudes are passed through the curve and the sign of the raw value is restored.
    ///
    /// The range outside the deadband is not rescaled, so the output steps from zero straight to
    /// the curve value at the deadband edge, e.g. 0.395 m/s for the default throttle curve.
    ///
    /// ## Parameters
    ///
    /// * 'curve_id' - The curve to use
    /// * 'raw_value' - The stick value, nominally in [-1, 1]
    pub fn shape(&self, curve_id: CurveId, raw_value: f64) -> f64 {
        if raw_value.is_nan() {
            return 0.0;
        }

        let magnitude = raw_value.abs().min(1.0);
        if magnitude == 0.0 || magnitude < self.deadband {
            return 0.0;
        }

        let shaped = self.curve(curve_id).evaluate(magnitude);
        if raw_value < 0.0 {
            -shaped
        } else {
            shaped
        }
    }
}
