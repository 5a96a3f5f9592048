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

//! Switching functions of a distance, going from 1 at short range to 0 at the cutoff.

use crate::FailResult;

use cvgraph_tasks_config::SwitchSettings;

#[derive(Debug, Clone, PartialEq)]
pub enum Switch {
    Rational(Rational),
    /// Quintic step, 1 at or below `start` and 0 at or beyond `end`.
    Poly5 { start: f64, end: f64 },
}

/// `(1 - x^nn) / (1 - x^mm)` with `x = (r - d0) / r0`, stretched so that it
/// reaches exactly zero at `d_max`.
#[derive(Debug, Clone, PartialEq)]
pub struct Rational {
    r0: f64,
    d0: f64,
    nn: i32,
    mm: i32,
    d_max: f64,
    stretch: f64,
    shift: f64,
}

impl Switch {
    pub fn from_settings(settings: &SwitchSettings) -> FailResult<Switch> {
        match *settings {
            SwitchSettings::Rational { r0, d0, nn, mm, d_max } => {
                let mm = match mm { 0 => 2 * nn, mm => mm };
                Ok(Switch::Rational(Rational::new(r0, d0, nn, mm, d_max)?))
            },
            SwitchSettings::Poly5 { start, end } => {
                ensure!(start < end, "poly5 switch needs start < end (got {} and {})", start, end);
                Ok(Switch::Poly5 { start, end })
            },
        }
    }

    /// Distance beyond which the function is zero.
    pub fn cutoff(&self) -> f64 {
        match *self {
            Switch::Rational(ref rational) => rational.d_max,
            Switch::Poly5 { end, .. } => end,
        }
    }

    /// Value and derivative at distance `r`.
    #[inline]
    pub fn eval(&self, r: f64) -> (f64, f64) {
        match *self {
            Switch::Rational(ref rational) => rational.eval(r),
            Switch::Poly5 { start, end } => poly5((end, start), r),
        }
    }
}

impl Rational {
    fn new(r0: f64, d0: f64, nn: i32, mm: i32, d_max: Option<f64>) -> FailResult<Rational> {
        ensure!(r0 > 0.0, "rational switch needs r0 > 0 (got {})", r0);
        ensure!(nn > 0, "rational switch needs nn > 0 (got {})", nn);
        ensure!(mm > nn, "rational switch needs mm > nn (got nn = {}, mm = {})", nn, mm);

        let d_max = d_max.unwrap_or_else(|| d0 + r0 * 1e-5_f64.powf(1.0 / f64::from(nn - mm)));
        ensure!(d_max > d0, "rational switch needs d-max > d0 (got {} and {})", d_max, d0);

        let mut out = Rational { r0, d0, nn, mm, d_max, stretch: 1.0, shift: 0.0 };
        let (at_max, _) = out.raw(d_max);
        out.stretch = 1.0 / (1.0 - at_max);
        out.shift = -at_max * out.stretch;
        Ok(out)
    }

    fn eval(&self, r: f64) -> (f64, f64) {
        if r >= self.d_max {
            return (0.0, 0.0);
        }
        let (s, ds) = self.raw(r);
        (s * self.stretch + self.shift, ds * self.stretch)
    }

    fn raw(&self, r: f64) -> (f64, f64) {
        if r <= self.d0 {
            return (1.0, 0.0);
        }
        let x = (r - self.d0) / self.r0;
        let (n, m) = (self.nn, self.mm);
        let (s, ds_dx) = match (x - 1.0).abs() < 1e-6 {
            // removable singularity
            true => {
                let (n, m) = (f64::from(n), f64::from(m));
                (n / m, 0.5 * n * (n - m) / m)
            },
            false => {
                let num = 1.0 - x.powi(n);
                let den = 1.0 - x.powi(m);
                let d_num = -f64::from(n) * x.powi(n - 1);
                let d_den = -f64::from(m) * x.powi(m - 1);
                (num / den, (d_num * den - num * d_den) / (den * den))
            },
        };
        (s, ds_dx / self.r0)
    }
}

/// Switches from 0 to 1 as x goes from `interval.0` to `interval.1`.
#[inline(always)]
pub(crate) fn switch(
    interpolate: impl FnOnce(f64) -> (f64, f64),
    interval: (f64, f64),
    x: f64,
) -> (f64, f64) {
    match IntervalSide::classify(interval, x) {
        IntervalSide::Left => (0.0, 0.0),
        IntervalSide::Inside => {
            let width = interval.1 - interval.0;
            let alpha = (x - interval.0) / width;
            let (value, d_alpha) = interpolate(alpha);
            (value, d_alpha / width)
        },
        IntervalSide::Right => (1.0, 0.0),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum IntervalSide { Left, Inside, Right }

impl IntervalSide {
    /// Position of a value relative to a directed interval.
    ///
    /// `interval.1 < interval.0` is allowed, and flips which side is which.
    pub(crate) fn classify(interval: (f64, f64), x: f64) -> Self {
        if interval.0 < interval.1 {
            match x {
                x if x <= interval.0 => IntervalSide::Left,
                x if interval.1 <= x => IntervalSide::Right,
                _ => IntervalSide::Inside,
            }
        } else {
            match x {
                x if interval.0 <= x => IntervalSide::Left,
                x if x <= interval.1 => IntervalSide::Right,
                _ => IntervalSide::Inside,
            }
        }
    }
}

pub(crate) fn poly5(interval: (f64, f64), x: f64) -> (f64, f64)
{ switch(raw_poly5, interval, x) }

// Solution to:  y[0] = 0;  y'[0] = y''[0] = 0;
//               y[1] = 1;  y'[1] = y''[1] = 0;
fn raw_poly5(x: f64) -> (f64, f64) {
    let value = (x*x*x)*(10.0 + x*(-15.0 + x*6.0));
    let d_x = (30.0*x*x)*(1.0 + x*(-2.0 + x));
    (value, d_x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvgraph_numerical as numerical;

    fn uniform(a: f64, b: f64) -> f64 { rand::random::<f64>() * (b - a) + a }

    fn rational(r0: f64, d0: f64, nn: i32, mm: i32) -> Switch {
        Switch::from_settings(&SwitchSettings::Rational { r0, d0, nn, mm, d_max: None }).unwrap()
    }

    #[test]
    fn poly5_direction() {
        let s = Switch::from_settings(&SwitchSettings::Poly5 { start: 1.5, end: 2.0 }).unwrap();
        assert_eq!(s.eval(1.0), (1.0, 0.0));
        assert_eq!(s.eval(2.5), (0.0, 0.0));
        assert_close!(s.eval(1.75).0, 0.5);
        assert_eq!(s.cutoff(), 2.0);

        assert_eq!(poly5((1.5, 2.0), 1.0).0, 0.0);
        assert_eq!(poly5((2.0, 1.5), 1.0).0, 1.0);
    }

    #[test]
    fn switch_endpoint() {
        for _ in 0..10 {
            let a = uniform(-10.0, 10.0);
            let b = uniform(-10.0, 10.0);
            assert_eq!(poly5((a, b), a).0, 0.0);
            assert_eq!(poly5((a, b), b).0, 1.0);
        }
    }

    #[test]
    fn rational_limits() {
        let s = rational(0.5, 0.1, 6, 12);
        assert_eq!(s.eval(0.05), (1.0, 0.0));
        assert_close!(abs=1e-12, s.eval(0.1).0, 1.0);
        assert_eq!(s.eval(s.cutoff()).0, 0.0);
        assert_eq!(s.eval(s.cutoff() + 1.0).0, 0.0);

        // stretching barely moves the midpoint
        assert_close!(rel=1e-4, s.eval(0.6).0, 0.5);
        assert!(s.eval(s.cutoff() - 1e-9).0.abs() < 1e-6);
    }

    #[test]
    fn rational_is_smooth_through_x_equals_one() {
        let s = rational(0.3, 0.0, 6, 12);
        let below = s.eval(0.3 - 1e-6);
        let above = s.eval(0.3 + 1e-6);
        let exact = s.eval(0.3);
        assert_close!(abs=1e-4, below.0, exact.0);
        assert_close!(abs=1e-4, above.0, exact.0);
        assert_close!(rel=1e-3, below.1, exact.1);
        assert_close!(rel=1e-3, above.1, exact.1);
    }

    #[test]
    fn num_deriv() {
        let switches = vec![
            rational(0.3, 0.0, 6, 12),
            rational(0.25, 0.05, 8, 12),
            Switch::from_settings(&SwitchSettings::Poly5 { start: -1.0, end: 2.0 }).unwrap(),
        ];
        for s in &switches {
            for _ in 0..20 {
                // stay clear of the kinks at d0 and the cutoff
                let r = uniform(0.1, 0.9 * s.cutoff());
                let (_, d_r) = s.eval(r);
                assert_close!(
                    rel=1e-7, abs=1e-8, d_r,
                    numerical::slope(1e-5, None, r, |r| s.eval(r).0),
                );
            }
        }
    }

    #[test]
    fn bad_settings() {
        assert!(Switch::from_settings(&SwitchSettings::Rational { r0: 0.3, d0: 0.0, nn: 6, mm: 4, d_max: None }).is_err());
        assert!(Switch::from_settings(&SwitchSettings::Rational { r0: -1.0, d0: 0.0, nn: 6, mm: 0, d_max: None }).is_err());
        assert!(Switch::from_settings(&SwitchSettings::Poly5 { start: 2.0, end: 1.0 }).is_err());
    }
}
