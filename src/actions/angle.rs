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

use crate::{FailResult, check_atoms};
use crate::distance::per_task_shape;

use cvgraph_array_types::V3;
use cvgraph_engine::{Action, TaskSpace, TaskContext, NodeBuilder, ValueId, ValueSpec, OutputMode};
use cvgraph_tasks_config::{ActionSettings, AngleOptions};

/// Angle at the middle atom of each triple.
pub(crate) struct Angle {
    triples: Vec<[usize; 3]>,
    out: ValueId,
}

pub(crate) fn build_angle(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let AngleOptions { atoms } = settings.parse_options()?;
    if atoms.is_empty() {
        return Err(nb.error("no atom triples given"));
    }
    check_atoms(nb, atoms.iter().flat_map(|triple| triple.iter()))?;

    let out = nb.output(ValueSpec::new(per_task_shape(atoms.len()), OutputMode::PerTask))?;
    Ok(Box::new(Angle { triples: atoms, out }))
}

/// The angle between two vectors, and its gradients with respect to each.
///
/// Gradients are zero for (anti)parallel vectors, where they are undefined.
pub(crate) fn angle_and_gradients(u: V3, v: V3) -> (f64, V3, V3) {
    let (nu, nv) = (u.norm(), v.norm());
    let cos = (u.dot(&v) / (nu * nv)).min(1.0).max(-1.0);
    let theta = cos.acos();
    let sin = (1.0 - cos * cos).sqrt();
    if sin < 1e-12 {
        return (theta, V3::zero(), V3::zero());
    }
    // d(cos)/du, then chain through acos
    let dcos_du = v / (nu * nv) - u * (cos / (nu * nu));
    let dcos_dv = u / (nu * nv) - v * (cos / (nv * nv));
    (theta, dcos_du * (-1.0 / sin), dcos_dv * (-1.0 / sin))
}

impl Action for Angle {
    fn kind(&self) -> &'static str { "ANGLE" }

    fn task_space(&self) -> TaskSpace { TaskSpace::Elements(self.triples.len()) }

    fn uses_atoms(&self) -> bool { true }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let [a, b, c] = self.triples[ctx.task_index()];
        let pos = ctx.positions();
        let u = ctx.pbc().distance(pos[b], pos[a]);
        let v = ctx.pbc().distance(pos[b], pos[c]);
        let (theta, du, dv) = angle_and_gradients(u, v);

        ctx.set_value(self.out, theta);
        ctx.add_atom_derivative(self.out, a, du);
        ctx.add_atom_derivative(self.out, c, dv);
        ctx.add_atom_derivative(self.out, b, -(du + dv));
        ctx.add_box_derivative(self.out, &-(u.outer(&du) + v.outer(&dv)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvgraph_numerical as numerical;

    #[test]
    fn gradients() {
        for _ in 0..10 {
            let u = V3::from_fn(|_| rand::random::<f64>() - 0.5);
            let v = V3::from_fn(|_| rand::random::<f64>() - 0.5);
            let (_, du, dv) = angle_and_gradients(u, v);
            let num_du = numerical::gradient(1e-5, None, &u.0, |u| angle_and_gradients(V3([u[0], u[1], u[2]]), v).0);
            let num_dv = numerical::gradient(1e-5, None, &v.0, |v| angle_and_gradients(u, V3([v[0], v[1], v[2]])).0);
            assert_close!(rel=1e-6, abs=1e-7, du.0.to_vec(), num_du);
            assert_close!(rel=1e-6, abs=1e-7, dv.0.to_vec(), num_dv);
        }
    }

    #[test]
    fn right_angle() {
        let (theta, _, _) = angle_and_gradients(V3([1.0, 0.0, 0.0]), V3([0.0, 2.0, 0.0]));
        assert_close!(theta, std::f64::consts::FRAC_PI_2);
        let (theta, du, _) = angle_and_gradients(V3([1.0, 0.0, 0.0]), V3([-2.0, 0.0, 0.0]));
        assert_close!(theta, std::f64::consts::PI);
        assert_eq!(du, V3::zero());
    }
}
