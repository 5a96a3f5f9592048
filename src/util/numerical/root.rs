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

//! Root finding by bisection on a sign change.

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BisectSettings {
    /// Stop once the bracket is narrower than this.
    pub tolerance: f64,
    /// Stop after this many halvings even if the bracket is still wide.
    pub max_iterations: u32,
}

impl Default for BisectSettings {
    fn default() -> Self {
        BisectSettings { tolerance: 1e-10, max_iterations: 200 }
    }
}

/// Find a zero of `func` in `[lo, hi]` by bisection.
///
/// `func(lo)` and `func(hi)` must have opposite signs (a zero at either
/// end is also accepted and returned immediately). Returns `None` if the
/// endpoints do not bracket a root.
pub fn bisect_sign_change<E, F>(
    (mut lo, mut hi): (f64, f64),
    settings: BisectSettings,
    mut func: F,
) -> Result<Option<f64>, E>
where
    F: FnMut(f64) -> Result<f64, E>,
{
    let mut f_lo = func(lo)?;
    if f_lo == 0.0 { return Ok(Some(lo)); }
    let f_hi = func(hi)?;
    if f_hi == 0.0 { return Ok(Some(hi)); }
    if f_lo * f_hi > 0.0 {
        return Ok(None);
    }

    for _ in 0..settings.max_iterations {
        let mid = 0.5 * (lo + hi);
        // bracket can no longer be split
        if !(lo.min(hi) < mid && mid < lo.max(hi)) {
            break;
        }
        if (hi - lo).abs() < settings.tolerance {
            break;
        }

        let f_mid = func(mid)?;
        if f_mid == 0.0 {
            return Ok(Some(mid));
        }
        match (f_mid < 0.0) == (f_lo < 0.0) {
            true => { lo = mid; f_lo = f_mid; },
            false => hi = mid,
        }
    }
    Ok(Some(0.5 * (lo + hi)))
}
