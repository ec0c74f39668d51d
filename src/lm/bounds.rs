//! Box constraints and the reflective step for bounded problems.
//!
//! Bounded iterations work in Coleman-Li scaled variables: each component is
//! scaled by the square root of its distance to the bound the gradient points
//! at. A component pressed against a bound gets a vanishing scaled gradient,
//! so it stops moving while the free components keep converging. A trial step
//! that leaves the box is either truncated at the boundary, reflected off it,
//! or replaced by a scaled steepest-descent step, whichever lowers the
//! quadratic model most.

use ndarray::{Array1, Array2, Axis};

/// Relative distance kept between the starting point and the bound it touches.
const INTERIOR_MARGIN: f64 = 1e-10;

/// Lower/upper box the iterates must stay in.
#[derive(Debug, Clone)]
pub struct BoxConstraints {
    lower: Array1<f64>,
    upper: Array1<f64>,
}

/// Coleman-Li scaling at a point.
#[derive(Debug, Clone)]
pub struct Scaling {
    /// Distance to the bound the descent direction points at, 1 when unbounded
    pub v: Array1<f64>,
    /// Sign of `dv/dx`: -1 toward an upper bound, 1 toward a lower one, else 0
    pub dv: Array1<f64>,
}

impl Scaling {
    /// Max-norm of `v * g`, zero exactly at a first-order constrained optimum.
    pub fn gradient_norm(&self, gradient: &Array1<f64>) -> f64 {
        (&self.v * gradient)
            .iter()
            .fold(0.0_f64, |acc, g| acc.max(g.abs()))
    }

    /// `sqrt(v)`, the diagonal mapping scaled steps back to parameter steps.
    pub fn diagonal(&self) -> Array1<f64> {
        self.v.mapv(f64::sqrt)
    }
}

/// Quadratic model `q(s) = g.s + 0.5 s.A.s` in scaled variables.
#[derive(Debug, Clone)]
pub struct ScaledModel {
    /// `J_h^T J_h + diag(g * dv)`
    pub hessian: Array2<f64>,
    /// `sqrt(v) * g`
    pub gradient: Array1<f64>,
}

impl ScaledModel {
    /// Build the scaled model from the Jacobian and gradient `J^T r`.
    pub fn new(jacobian: &Array2<f64>, gradient: &Array1<f64>, scaling: &Scaling) -> Self {
        let d = scaling.diagonal();
        let j_h = jacobian * &d.view().insert_axis(Axis(0));
        let mut hessian = j_h.t().dot(&j_h);
        for i in 0..hessian.nrows() {
            hessian[[i, i]] += gradient[i] * scaling.dv[i];
        }
        Self {
            hessian,
            gradient: &d * gradient,
        }
    }

    pub fn value(&self, s: &Array1<f64>) -> f64 {
        self.gradient.dot(s) + 0.5 * s.dot(&self.hessian.dot(s))
    }

    /// Coefficients `(a, b, c)` of `q(s0 + t s) = a t^2 + b t + c`.
    fn along(&self, s: &Array1<f64>, s0: &Array1<f64>) -> (f64, f64, f64) {
        let hs = self.hessian.dot(s);
        let a = 0.5 * s.dot(&hs);
        let b = self.gradient.dot(s) + s0.dot(&hs);
        (a, b, self.value(s0))
    }
}

/// Minimize `a t^2 + b t + c` over `[lo, hi]`, returning `(t, value)`.
fn minimize_quadratic_1d(a: f64, b: f64, lo: f64, hi: f64, c: f64) -> (f64, f64) {
    let mut candidates = vec![lo, hi];
    if a != 0.0 {
        let extremum = -0.5 * b / a;
        if lo < extremum && extremum < hi {
            candidates.push(extremum);
        }
    }
    candidates
        .into_iter()
        .map(|t| (t, a * t * t + b * t + c))
        .fold((lo, f64::INFINITY), |best, cand| if cand.1 < best.1 { cand } else { best })
}

/// Positive `t` with `‖x + t s‖ = radius`, for `‖x‖ <= radius`.
fn to_trust_radius(x: &Array1<f64>, s: &Array1<f64>, radius: f64) -> f64 {
    let a = s.dot(s);
    if a == 0.0 {
        return f64::INFINITY;
    }
    let b = 2.0 * x.dot(s);
    let c = x.dot(x) - radius * radius;
    let disc = (b * b - 4.0 * a * c).max(0.0).sqrt();
    (-b + disc) / (2.0 * a)
}

/// A bounded trial step in parameter space.
#[derive(Debug, Clone)]
pub struct ReflectiveStep {
    pub step: Array1<f64>,
    /// Predicted reduction of `‖r‖²`
    pub predicted_reduction: f64,
}

impl BoxConstraints {
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> Self {
        Self { lower, upper }
    }

    /// True when at least one bound is finite.
    pub fn is_active(&self) -> bool {
        self.lower
            .iter()
            .chain(self.upper.iter())
            .any(|b| b.is_finite())
    }

    /// Whether every component lies inside its bounds (inclusive).
    pub fn contains(&self, params: &Array1<f64>) -> bool {
        params
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(&p, (&lo, &hi))| p >= lo && p <= hi)
    }

    fn margin(lo: f64, hi: f64, value: f64) -> f64 {
        let width = hi - lo;
        if width.is_finite() {
            INTERIOR_MARGIN * width
        } else {
            INTERIOR_MARGIN * value.abs().max(1.0)
        }
    }

    /// Move components sitting on a bound slightly inside.
    pub fn to_interior(&self, params: &Array1<f64>) -> Array1<f64> {
        let mut out = params.clone();
        for (i, p) in out.iter_mut().enumerate() {
            let (lo, hi) = (self.lower[i], self.upper[i]);
            let margin = Self::margin(lo, hi, *p);
            if *p <= lo {
                *p = lo + margin;
            } else if *p >= hi {
                *p = hi - margin;
            }
        }
        out
    }

    /// Clip to the box, then lift components left on a bound off it by a
    /// few ulps.
    pub fn strictly_feasible(&self, params: &Array1<f64>) -> Array1<f64> {
        let mut out = params.clone();
        for (i, p) in out.iter_mut().enumerate() {
            let (lo, hi) = (self.lower[i], self.upper[i]);
            if *p <= lo {
                *p = lo + 4.0 * f64::EPSILON * lo.abs().max(1.0);
            } else if *p >= hi {
                *p = hi - 4.0 * f64::EPSILON * hi.abs().max(1.0);
            }
        }
        out
    }

    /// Coleman-Li scaling for `params` with gradient `J^T r`.
    pub fn scaling(&self, params: &Array1<f64>, gradient: &Array1<f64>) -> Scaling {
        let n = params.len();
        let mut v = Array1::ones(n);
        let mut dv = Array1::zeros(n);
        for i in 0..n {
            if gradient[i] < 0.0 && self.upper[i].is_finite() {
                v[i] = self.upper[i] - params[i];
                dv[i] = -1.0;
            } else if gradient[i] > 0.0 && self.lower[i].is_finite() {
                v[i] = params[i] - self.lower[i];
                dv[i] = 1.0;
            }
        }
        Scaling { v, dv }
    }

    /// Largest `t` keeping `params + t * step` in the box, and the
    /// components whose bound is hit first.
    pub fn step_to_bound(&self, params: &Array1<f64>, step: &Array1<f64>) -> (f64, Vec<bool>) {
        let steps: Vec<f64> = (0..params.len())
            .map(|i| {
                if step[i] == 0.0 {
                    f64::INFINITY
                } else {
                    let to_lower = (self.lower[i] - params[i]) / step[i];
                    let to_upper = (self.upper[i] - params[i]) / step[i];
                    to_lower.max(to_upper)
                }
            })
            .collect();
        let min_step = steps.iter().copied().fold(f64::INFINITY, f64::min);
        let hits = steps.iter().map(|&t| t == min_step && t.is_finite()).collect();
        (min_step, hits)
    }

    /// Turn the scaled damped step `p_h` into a step that keeps the iterate
    /// strictly inside the box.
    ///
    /// `theta` is the fraction of the distance to the boundary a truncated
    /// step may cover.
    pub fn select_step(
        &self,
        params: &Array1<f64>,
        model: &ScaledModel,
        scaling: &Scaling,
        p_h: &Array1<f64>,
        theta: f64,
    ) -> ReflectiveStep {
        let d = scaling.diagonal();
        let p = &d * p_h;
        let radius = p_h.dot(p_h).sqrt();

        if self.contains(&(params + &p)) {
            return ReflectiveStep {
                predicted_reduction: -2.0 * model.value(p_h),
                step: p,
            };
        }

        let (p_stride, hits) = self.step_to_bound(params, &p);

        // Flip the components that hit the boundary
        let mut r_h = p_h.clone();
        for (r, &hit) in r_h.iter_mut().zip(hits.iter()) {
            if hit {
                *r = -*r;
            }
        }
        let r = &d * &r_h;

        let p_h_bound = p_h * p_stride;
        let on_bound = params + &(&p * p_stride);

        let to_radius = to_trust_radius(&p_h_bound, &r_h, radius);
        let (to_bound, _) = self.step_to_bound(&on_bound, &r);
        let r_stride = to_bound.min(to_radius);
        let (r_lo, r_hi) = if r_stride > 0.0 {
            let lo = (1.0 - theta) * p_stride / r_stride;
            let hi = if r_stride == to_bound {
                theta * to_bound
            } else {
                to_radius
            };
            (lo, hi)
        } else {
            (0.0, -1.0)
        };

        let reflected = if r_lo <= r_hi {
            let (a, b, c) = model.along(&r_h, &p_h_bound);
            let (t, value) = minimize_quadratic_1d(a, b, r_lo, r_hi, c);
            let step_h = &p_h_bound + &(&r_h * t);
            Some((&d * &step_h, value))
        } else {
            None
        };

        // Truncated step, strictly inside
        let truncated_h = &p_h_bound * theta;
        let truncated_value = model.value(&truncated_h);
        let truncated = &d * &truncated_h;

        // Scaled steepest descent
        let ag_h = -&model.gradient;
        let ag = &d * &ag_h;
        let ag_norm = ag_h.dot(&ag_h).sqrt();
        let to_radius = if ag_norm > 0.0 { radius / ag_norm } else { 0.0 };
        let (to_bound, _) = self.step_to_bound(params, &ag);
        let ag_max = if to_bound < to_radius {
            theta * to_bound
        } else {
            to_radius
        };
        let (a, b, _) = model.along(&ag_h, &Array1::zeros(ag_h.len()));
        let (t, ag_value) = minimize_quadratic_1d(a, b, 0.0, ag_max, 0.0);
        let descent = &ag * t;

        let (step, value) = match reflected {
            Some((r_step, r_value)) if r_value < truncated_value && r_value < ag_value => {
                (r_step, r_value)
            }
            _ if truncated_value < ag_value => (truncated, truncated_value),
            _ => (descent, ag_value),
        };
        ReflectiveStep {
            step,
            predicted_reduction: -2.0 * value,
        }
    }
}
