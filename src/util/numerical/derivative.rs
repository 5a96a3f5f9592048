/* ************************************************************************ **
** This file is part of cvgraph, and is licensed under EITHER the MIT       **
** license or the Apache 2.0 license, at your option.                       **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of cvgraph is provided under this permissive       **
** license, and that the project as a whole is licensed under the GPL 3.0.  **
** ************************************************************************ */

//! Numerical differentiation by central finite differences.

/// Approximation method for a numerical 1D derivative.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DerivativeKind {
    /// n-point stencil. Only implemented for `n = 3, 5, 7`.
    Stencil(u32),
}

impl Default for DerivativeKind {
    fn default() -> DerivativeKind { DerivativeKind::Stencil(5) }
}

enum Never {}

// (offset, coefficient) pairs and the denominator (in units of the step)
// http://www.holoborodko.com/pavel/numerical-methods/numerical-derivative/central-differences/
const STENCIL_3: (&[(f64, f64)], f64) = (&[(-1.0, -1.0), (1.0, 1.0)], 2.0);
const STENCIL_5: (&[(f64, f64)], f64) = (&[(-2.0, 1.0), (-1.0, -8.0), (1.0, 8.0), (2.0, -1.0)], 12.0);
const STENCIL_7: (&[(f64, f64)], f64) = (
    &[(-3.0, -1.0), (-2.0, 9.0), (-1.0, -45.0), (1.0, 45.0), (2.0, -9.0), (3.0, 1.0)],
    60.0,
);

/// Compute a numerical derivative using finite differences.
pub fn slope(
    step: f64,
    kind: Option<DerivativeKind>,
    point: f64,
    mut value_fn: impl FnMut(f64) -> f64,
) -> f64 {
    try_slope::<Never, _>(step, kind, point, |x| Ok(value_fn(x)))
        .unwrap_or_else(|e| match e {})
}

/// `slope` for functions that can fail.
pub fn try_slope<E, F>(
    step: f64,
    kind: Option<DerivativeKind>,
    point: f64,
    mut value_fn: F,
) -> Result<f64, E>
where
    F: FnMut(f64) -> Result<f64, E>,
{
    let (terms, denom) = match kind.unwrap_or_default() {
        DerivativeKind::Stencil(3) => STENCIL_3,
        DerivativeKind::Stencil(5) => STENCIL_5,
        DerivativeKind::Stencil(7) => STENCIL_7,
        DerivativeKind::Stencil(n) if n < 3 || n % 2 == 0 => panic!("{}-point stencil does not exist", n),
        DerivativeKind::Stencil(n) => panic!("{}-point stencil is not implemented", n),
    };

    let mut numer = 0.0;
    for &(offset, coeff) in terms {
        numer += coeff * value_fn(point + offset * step)?;
    }
    Ok(numer / (denom * step))
}

/// Numerically compute a gradient.
///
/// This performs an independent slope computation along each axis, so the
/// number of function calls is proportional to the input size.
pub fn gradient(
    step: f64,
    kind: Option<DerivativeKind>,
    point: &[f64],
    mut value_fn: impl FnMut(&[f64]) -> f64,
) -> Vec<f64> {
    try_gradient::<Never, _>(step, kind, point, |x| Ok(value_fn(x)))
        .unwrap_or_else(|e| match e {})
}

/// `gradient` for functions that can fail.
pub fn try_gradient<E, F>(
    step: f64,
    kind: Option<DerivativeKind>,
    point: &[f64],
    mut value_fn: F,
) -> Result<Vec<f64>, E>
where
    F: FnMut(&[f64]) -> Result<f64, E>,
{
    let mut work = point.to_vec();
    (0..point.len())
        .map(|i| {
            let out = try_slope(step, kind, point[i], |x| { work[i] = x; value_fn(&work) });
            work[i] = point[i];
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(lo: f64, hi: f64) -> f64 { lo + (hi - lo) * rand::random::<f64>() }

    // evaluates a polynomial and its derivative from coefficients in increasing order
    fn poly(coeffs: &[f64], x: f64) -> (f64, f64) {
        let value = coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c);
        let deriv = coeffs.iter().enumerate().skip(1).rev()
            .fold(0.0, |acc, (i, &c)| acc * x + i as f64 * c);
        (value, deriv)
    }

    #[test]
    fn exact_for_low_order_polynomials() {
        for &n in &[3, 5, 7] {
            for _ in 0..10 {
                // n-point stencil is exact for polynomials up to order n-1
                let coeffs: Vec<f64> = (0..n).map(|_| uniform(-2.0, 2.0)).collect();
                let x = uniform(-3.0, 3.0);

                let expected = poly(&coeffs, x).1;
                let actual = slope(1e-1, Some(DerivativeKind::Stencil(n)), x, |x| poly(&coeffs, x).0);
                assert_close!(abs=1e-8, rel=1e-8, expected, actual, "{}-point", n);
            }
        }
    }

    #[test]
    fn gradient_of_quadratic_form() {
        let point = [0.5, -1.0, 2.0];
        let grad = gradient(1e-3, None, &point, |x| x[0] * x[0] + 3.0 * x[0] * x[1] - x[2]);
        assert_close!(abs=1e-9, grad, vec![1.0 - 3.0, 1.5, -1.0]);
    }

    #[test]
    fn errors_propagate() {
        let result = try_slope(1e-3, None, 0.0, |x| if x > 0.0 { Err("positive") } else { Ok(x) });
        assert_eq!(result, Err("positive"));
    }
}
