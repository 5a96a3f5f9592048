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

//! Matrices over pairs of atoms, evaluated row by row with link cells.

use crate::{FailResult, check_atoms};
use crate::switch::Switch;

use cvgraph_array_types::V3;
use cvgraph_engine::{Action, TaskSpace, TaskContext, StepContext, NodeBuilder, ValueId, ValueSpec, Shape, OutputMode};
use cvgraph_engine::numerical_error;
use cvgraph_structure::LinkCells;
use cvgraph_tasks_config::{ActionSettings, ContactMatrixOptions, DistanceMatrixOptions};

use rayon_cond::CondIterator;

/// The weight of a pair as a function of their separation vector.
pub trait PairWeight: Send + Sync {
    const NAME: &'static str;

    /// Pairs at or beyond this distance have zero weight.
    fn cutoff(&self) -> f64;

    /// Weight and its gradient with respect to the separation `r`.
    fn weight(&self, r: V3) -> (f64, V3);
}

/// A switching function of the pair distance.
pub struct ContactWeight(pub Switch);

impl PairWeight for ContactWeight {
    const NAME: &'static str = "CONTACT_MATRIX";

    fn cutoff(&self) -> f64 { self.0.cutoff() }

    fn weight(&self, r: V3) -> (f64, V3) {
        let d = r.norm();
        let (s, ds) = self.0.eval(d);
        (s, r * (ds / d))
    }
}

/// The distance itself, for pairs inside the cutoff.
pub struct DistanceWeight {
    pub cutoff: f64,
}

impl PairWeight for DistanceWeight {
    const NAME: &'static str = "DISTANCE_MATRIX";

    fn cutoff(&self) -> f64 { self.cutoff }

    fn weight(&self, r: V3) -> (f64, V3) {
        let d = r.norm();
        (d, r / d)
    }
}

/// A matrix with one row per atom of `rows` and one column per atom of `cols`.
///
/// Each step the neighbors of every row atom are found with link cells, and
/// only those columns are visited. With `dense`, every column is visited.
pub struct AdjacencyMatrix<W> {
    label: String,
    weight: W,
    rows: Vec<usize>,
    cols: Vec<usize>,
    dense: bool,
    out: ValueId,
    // column index of each atom, if it is a column atom
    col_of_atom: Vec<Option<usize>>,
    neighbors: Vec<Vec<usize>>,
}

pub(crate) fn build_contact_matrix(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ContactMatrixOptions { group, group_b, switch, dense } = settings.parse_options()?;
    let weight = ContactWeight(Switch::from_settings(&switch)?);
    Ok(Box::new(AdjacencyMatrix::new(nb, weight, group, group_b, dense)?))
}

pub(crate) fn build_distance_matrix(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let DistanceMatrixOptions { group, group_b, cutoff, dense } = settings.parse_options()?;
    if !(cutoff > 0.0) {
        return Err(nb.error(format!("cutoff must be positive (got {})", cutoff)));
    }
    Ok(Box::new(AdjacencyMatrix::new(nb, DistanceWeight { cutoff }, group, group_b, dense)?))
}

impl<W: PairWeight> AdjacencyMatrix<W> {
    pub fn new(
        nb: &mut NodeBuilder<'_>,
        weight: W,
        rows: Vec<usize>,
        cols: Option<Vec<usize>>,
        dense: bool,
    ) -> FailResult<Self> {
        let cols = cols.unwrap_or_else(|| rows.clone());
        if rows.is_empty() || cols.is_empty() {
            return Err(nb.error("matrix groups must not be empty"));
        }
        check_atoms(nb, rows.iter().chain(&cols))?;

        let mut col_of_atom = vec![None; nb.natoms()];
        for (c, &atom) in cols.iter().enumerate() {
            if col_of_atom[atom].is_some() {
                return Err(nb.error(format!("atom {} appears twice among the columns", atom)));
            }
            col_of_atom[atom] = Some(c);
        }

        let spec = ValueSpec::new(Shape::Matrix(rows.len(), cols.len()), OutputMode::MatrixElement);
        let out = nb.output(spec)?;
        Ok(AdjacencyMatrix {
            label: nb.label().to_string(),
            neighbors: vec![vec![]; rows.len()],
            weight, rows, cols, dense, out, col_of_atom,
        })
    }
}

impl<W: PairWeight> Action for AdjacencyMatrix<W> {
    fn kind(&self) -> &'static str { W::NAME }

    fn task_space(&self) -> TaskSpace {
        TaskSpace::Rows { rows: self.rows.len(), cols: self.cols.len() }
    }

    fn uses_atoms(&self) -> bool { true }

    fn prepare(&mut self, ctx: &StepContext<'_>) -> FailResult<()> {
        let cutoff = self.weight.cutoff();
        if let Err(e) = ctx.pbc().check_cutoff(cutoff) {
            return Err(numerical_error(&self.label, e));
        }
        if self.dense {
            return Ok(());
        }

        let positions = ctx.positions();
        let cells = LinkCells::new(ctx.pbc(), cutoff, positions)?;
        let AdjacencyMatrix { ref rows, ref col_of_atom, .. } = *self;
        self.neighbors = CondIterator::new(0..rows.len(), ctx.parallel())
            .map(|row| {
                cells.neighbors(rows[row], positions).into_iter()
                    .filter_map(|atom| col_of_atom[atom])
                    .collect()
            })
            .collect();

        trace!(
            "{}: {} nonzero elements out of {}",
            self.label,
            self.neighbors.iter().map(|n| n.len()).sum::<usize>(),
            self.rows.len() * self.cols.len(),
        );
        Ok(())
    }

    fn row_columns(&self, row: usize, out: &mut Vec<usize>) -> bool {
        if self.dense {
            return false;
        }
        out.extend_from_slice(&self.neighbors[row]);
        true
    }

    fn perform_element(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let (a, b) = (self.rows[ctx.row()], self.cols[ctx.col()]);
        if a == b {
            return Ok(());
        }
        let pos = ctx.positions();
        let r = ctx.pbc().distance(pos[a], pos[b]);
        let cutoff = self.weight.cutoff();
        if r.sqnorm() >= cutoff * cutoff {
            return Ok(());
        }

        let (w, g) = self.weight.weight(r);
        ctx.set_value(self.out, w);
        ctx.add_atom_derivative(self.out, a, -g);
        ctx.add_atom_derivative(self.out, b, g);
        ctx.add_box_derivative(self.out, &-r.outer(&g));
        Ok(())
    }
}
