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

//! Per-task scratch record.

/// Whether a component may still gain new derivative indices.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UpdateState {
    Open,
    Complete,
}

/// Values and derivatives of every record component for the task in flight.
///
/// Derivatives are stored densely (`ncomponents * nderivs`) but only the
/// indices listed as active are ever read or zeroed, so clearing between
/// tasks costs as much as the previous task touched.
#[derive(Debug, Clone)]
pub struct MultiValue {
    nderivs: usize,
    values: Vec<f64>,
    derivs: Vec<f64>,
    hot: Vec<bool>,
    active: Vec<Vec<usize>>,
    state: Vec<UpdateState>,
    task_index: usize,
    second_task: usize,
}

impl MultiValue {
    pub fn new(ncomponents: usize, nderivs: usize) -> Self {
        MultiValue {
            nderivs,
            values: vec![0.0; ncomponents],
            derivs: vec![0.0; ncomponents * nderivs],
            hot: vec![false; ncomponents * nderivs],
            active: vec![vec![]; ncomponents],
            state: vec![UpdateState::Open; ncomponents],
            task_index: 0,
            second_task: 0,
        }
    }

    #[inline] pub fn ncomponents(&self) -> usize { self.values.len() }
    #[inline] pub fn nderivs(&self) -> usize { self.nderivs }

    #[inline] pub fn task_index(&self) -> usize { self.task_index }
    #[inline] pub fn second_task(&self) -> usize { self.second_task }
    #[inline] pub fn set_task_index(&mut self, task: usize) { self.task_index = task; }
    #[inline] pub fn set_second_task(&mut self, task: usize) { self.second_task = task; }

    pub fn clear_all(&mut self) {
        for c in 0..self.ncomponents() {
            self.clear_component(c);
        }
    }

    pub fn clear_component(&mut self, c: usize) {
        self.values[c] = 0.0;
        let base = c * self.nderivs;
        for &i in &self.active[c] {
            self.derivs[base + i] = 0.0;
            self.hot[base + i] = false;
        }
        self.active[c].clear();
        self.state[c] = UpdateState::Open;
    }

    #[inline]
    pub fn value(&self, c: usize) -> f64 { self.values[c] }

    #[inline]
    pub fn set_value(&mut self, c: usize, x: f64) { self.values[c] = x; }

    #[inline]
    pub fn add_value(&mut self, c: usize, x: f64) { self.values[c] += x; }

    #[inline]
    pub fn state(&self, c: usize) -> UpdateState { self.state[c] }

    /// Add to one derivative of a component.
    ///
    /// # Panics
    ///
    /// If the component is complete and the index is not already active.
    pub fn add_derivative(&mut self, c: usize, index: usize, d: f64) {
        assert!(index < self.nderivs, "(BUG) derivative index {} out of layout (size {})", index, self.nderivs);
        let k = c * self.nderivs + index;
        if !self.hot[k] {
            if self.state[c] == UpdateState::Complete {
                panic!("(BUG) new derivative index {} added to completed component {}", index, c);
            }
            self.hot[k] = true;
            self.active[c].push(index);
        }
        self.derivs[k] += d;
    }

    /// Freeze the sparsity pattern of a component.
    #[inline]
    pub fn complete_update(&mut self, c: usize) { self.state[c] = UpdateState::Complete; }

    #[inline]
    pub fn derivative(&self, c: usize, index: usize) -> f64
    { self.derivs[c * self.nderivs + index] }

    #[inline]
    pub fn active_indices(&self, c: usize) -> &[usize] { &self.active[c] }

    pub fn active_derivatives<'a>(&'a self, c: usize) -> impl Iterator<Item=(usize, f64)> + 'a {
        let base = c * self.nderivs;
        self.active[c].iter().map(move |&i| (i, self.derivs[base + i]))
    }

    /// `d(to) += factor * d(from)` over every active index of `from`.
    pub fn chain_rule(&mut self, from: usize, to: usize, factor: f64) {
        if factor == 0.0 {
            return;
        }
        for n in 0..self.active[from].len() {
            let i = self.active[from][n];
            let d = self.derivs[from * self.nderivs + i];
            self.add_derivative(to, i, factor * d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_accumulation_and_clear() {
        let mut mv = MultiValue::new(2, 10);
        mv.add_derivative(0, 3, 1.0);
        mv.add_derivative(0, 7, 2.0);
        mv.add_derivative(0, 3, 0.5);
        assert_eq!(mv.active_indices(0), &[3, 7]);
        assert_eq!(mv.derivative(0, 3), 1.5);

        mv.chain_rule(0, 1, 2.0);
        let got: Vec<_> = mv.active_derivatives(1).collect();
        assert_eq!(got, vec![(3, 3.0), (7, 4.0)]);

        mv.clear_all();
        assert!(mv.active_indices(0).is_empty());
        assert_eq!(mv.derivative(1, 7), 0.0);
        assert_eq!(mv.state(1), UpdateState::Open);
    }

    #[test]
    fn completed_component_accepts_known_indices() {
        let mut mv = MultiValue::new(1, 4);
        mv.add_derivative(0, 2, 1.0);
        mv.complete_update(0);
        mv.add_derivative(0, 2, 1.0);
        assert_eq!(mv.derivative(0, 2), 2.0);
    }

    #[test]
    #[should_panic(expected = "(BUG)")]
    fn completed_component_rejects_new_indices() {
        let mut mv = MultiValue::new(1, 4);
        mv.add_derivative(0, 2, 1.0);
        mv.complete_update(0);
        mv.add_derivative(0, 1, 1.0);
    }
}
