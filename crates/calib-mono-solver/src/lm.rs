//! Dense Levenberg-Marquardt on a residual closure.
//!
//! Normal-equation form with multiplicative damping on the diagonal
//! (Marquardt scaling). The Jacobian is built by forward differences; the
//! problem sizes here (a handful of intrinsics plus six parameters per
//! frame) keep the dense factorization cheap. Damping escalates whenever
//! the damped system fails to factorize or a step does not reduce the
//! cost, which is what keeps near-singular configurations from diverging.

use nalgebra::{Cholesky, DMatrix, DVector};

use calib_mono_core::CalibrationObserver;

#[derive(Clone, Copy, Debug)]
pub struct LmOptions {
    pub max_iters: usize,
    /// Step-norm convergence threshold (relative to the parameter norm).
    pub xtol: f64,
    /// Relative cost-decrease convergence threshold.
    pub ftol: f64,
    pub init_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iters: 100,
            xtol: 1e-10,
            ftol: 1e-12,
            init_lambda: 1e-3,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LmReport {
    pub iterations: usize,
    /// Final sum of squared residuals.
    pub final_cost: f64,
    pub converged: bool,
}

const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 3.0;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e12;

fn forward_jacobian<F>(f: &F, x: &DVector<f64>, r0: &DVector<f64>) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let m = r0.len();
    let n = x.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let scale = f64::EPSILON.sqrt();

    let mut probe = x.clone();
    for j in 0..n {
        let h = scale * x[j].abs().max(1.0);
        probe[j] = x[j] + h;
        let r = f(&probe);
        probe[j] = x[j];
        for i in 0..m {
            jac[(i, j)] = (r[i] - r0[i]) / h;
        }
    }
    jac
}

/// Minimize `||f(x)||^2` from `x0`.
///
/// Never panics: a non-finite initial residual or an unconditionally
/// unproductive search simply reports `converged: false` and leaves the
/// caller to classify the failure.
pub fn minimize<F>(
    f: F,
    x0: DVector<f64>,
    opts: &LmOptions,
    observer: &mut dyn CalibrationObserver,
) -> (DVector<f64>, LmReport)
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut x = x0;
    let mut r = f(&x);
    let mut cost = r.norm_squared();
    let mut lambda = opts.init_lambda;
    let mut iterations = 0;
    let mut converged = false;

    if !cost.is_finite() {
        return (
            x,
            LmReport {
                iterations,
                final_cost: cost,
                converged,
            },
        );
    }

    let n = x.len();

    'outer: for iter in 0..opts.max_iters {
        iterations = iter + 1;

        let jac = forward_jacobian(&f, &x, &r);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &r;

        loop {
            if lambda > LAMBDA_MAX {
                // The damped system never produced a downhill step; treat a
                // vanished gradient as convergence, anything else as failure.
                converged = grad.amax() < 1e-8;
                break 'outer;
            }

            let mut damped = jtj.clone();
            for i in 0..n {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
            }

            let Some(chol) = Cholesky::new(damped) else {
                // Ill-conditioned normal equations: escalate damping.
                lambda *= LAMBDA_UP;
                continue;
            };
            let delta = chol.solve(&(-&grad));

            let x_new = &x + &delta;
            let r_new = f(&x_new);
            let cost_new = r_new.norm_squared();

            if cost_new.is_finite() && cost_new < cost {
                let step = delta.norm();
                let decrease = (cost - cost_new) / cost.max(f64::MIN_POSITIVE);
                x = x_new;
                r = r_new;
                cost = cost_new;
                lambda = (lambda / LAMBDA_DOWN).max(LAMBDA_MIN);
                observer.on_solver_iteration(iter, cost);

                if step < opts.xtol * (x.norm() + opts.xtol) || decrease < opts.ftol {
                    converged = true;
                    break 'outer;
                }
                break;
            }

            lambda *= LAMBDA_UP;
        }
    }

    (
        x,
        LmReport {
            iterations,
            final_cost: cost,
            converged,
        },
    )
}
