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

//! Connected components of a contact matrix.

use crate::FailResult;

use cvgraph_engine::{Action, TaskSpace, TaskContext, StepContext, NodeBuilder, ValueId, ValueSpec, Shape, OutputMode};
use cvgraph_tasks_config::{ActionSettings, ClusteringOptions, ClusterWeightsOptions};

use petgraph::unionfind::UnionFind;

use std::collections::BTreeMap;

/// Labels each atom of a square matrix with the number of its cluster.
///
/// Two atoms are connected when their matrix element exceeds the threshold.
/// Clusters are numbered from 1, largest first; ties go to the cluster with
/// the lowest-numbered atom.
pub(crate) struct DfsClustering {
    arg: ValueId,
    n: usize,
    threshold: f64,
    out: ValueId,
}

pub(crate) fn build_dfs_clustering(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ClusteringOptions { arg, threshold } = settings.parse_options()?;
    let arg = nb.argument(arg.single(nb.label())?)?;
    let n = match arg.shape {
        Shape::Matrix(rows, cols) if rows == cols => rows,
        _ => return Err(nb.error(format!("'{}' is not a square matrix", arg.name))),
    };
    let spec = ValueSpec::new(Shape::Vector(n), OutputMode::Accumulated).without_derivatives();
    let out = nb.output(spec)?;
    Ok(Box::new(DfsClustering { arg: arg.id, n, threshold, out }))
}

/// Cluster number of each element, counting from 1 for the largest cluster.
pub(crate) fn cluster_numbers(n: usize, mut connected: impl FnMut(usize, usize) -> bool) -> Vec<usize> {
    let mut sets = UnionFind::<usize>::new(n);
    for i in 0..n {
        for j in i + 1..n {
            if connected(i, j) {
                sets.union(i, j);
            }
        }
    }

    let labels = sets.into_labeling();
    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &root) in labels.iter().enumerate() {
        members.entry(root).or_insert_with(Vec::new).push(i);
    }
    // (size, first member, root), largest first
    let mut order: Vec<_> = members.iter()
        .map(|(&root, members)| (members.len(), members[0], root))
        .collect();
    order.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    let mut number_of_root = vec![0; n];
    for (k, &(_, _, root)) in order.iter().enumerate() {
        number_of_root[root] = k + 1;
    }
    labels.iter().map(|&root| number_of_root[root]).collect()
}

impl Action for DfsClustering {
    fn kind(&self) -> &'static str { "DFS_CLUSTERING" }

    fn task_space(&self) -> TaskSpace { TaskSpace::Single }

    fn can_chain(&self) -> bool { false }

    fn needs_stored_arguments(&self) -> bool { true }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let n = self.n;
        let matrix = ctx.value(self.arg).data();
        let threshold = self.threshold;
        let numbers = cluster_numbers(n, |i, j| matrix[i * n + j] > threshold || matrix[j * n + i] > threshold);
        for (atom, &number) in numbers.iter().enumerate() {
            ctx.accumulate(self.out, atom, number as f64, &[]);
        }
        Ok(())
    }
}

/// 1 for the members of one cluster. Other tasks are not run.
pub(crate) struct ClusterWeights {
    arg: ValueId,
    n: usize,
    cluster: usize,
    out: ValueId,
}

pub(crate) fn build_cluster_weights(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>> {
    let ClusterWeightsOptions { arg, cluster } = settings.parse_options()?;
    if cluster == 0 {
        return Err(nb.error("clusters are numbered from 1"));
    }
    let arg = nb.argument(arg.single(nb.label())?)?;
    let n = arg.len();
    let spec = ValueSpec::new(Shape::Vector(n), OutputMode::PerTask).without_derivatives();
    let out = nb.output(spec)?;
    Ok(Box::new(ClusterWeights { arg: arg.id, n, cluster, out }))
}

impl Action for ClusterWeights {
    fn kind(&self) -> &'static str { "CLUSTER_WEIGHTS" }

    fn task_space(&self) -> TaskSpace { TaskSpace::Elements(self.n) }

    fn needs_stored_arguments(&self) -> bool { true }

    fn select_tasks(&self, ctx: &StepContext<'_>, flags: &mut [bool]) -> FailResult<bool> {
        let numbers = ctx.value(self.arg).data();
        for (flag, &number) in flags.iter_mut().zip(numbers) {
            if number == self.cluster as f64 {
                *flag = true;
            }
        }
        Ok(true)
    }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        ctx.set_value(self.out, 1.0);
        Ok(())
    }
}
