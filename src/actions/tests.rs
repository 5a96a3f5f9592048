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

//! Whole graphs of real actions, built from YAML the way the driver builds them.

use slice_of_array::prelude::*;

use cvgraph_array_types::{V3, M33, Unvee, v3_vec_from_flat};
use cvgraph_engine::{Engine, EngineOptions, GraphOptions, StepOutput, Threading, NumericalError};
use cvgraph_engine::build_graph;
use cvgraph_tasks_config::{ActionSettings, Settings, YamlRead};

use crate::{registry, SecondaryKind};

fn entries(yaml: &str) -> Vec<ActionSettings> {
    let settings = Settings::from_reader(yaml.as_bytes()).unwrap();
    settings.validate().unwrap().0.actions
}

fn try_engine(yaml: &str, natoms: usize, requested: &[&str], chaining: bool, threading: Threading) -> Result<Engine, failure::Error> {
    let requested: Vec<String> = requested.iter().map(|s| s.to_string()).collect();
    let graph = build_graph(&registry(), &entries(yaml), natoms, &requested, GraphOptions { chaining })?;
    Ok(Engine::new(graph, EngineOptions { threading }))
}

fn engine(yaml: &str, natoms: usize, requested: &[&str], chaining: bool) -> Engine {
    try_engine(yaml, natoms, requested, chaining, Threading::Serial).unwrap()
}

fn run(engine: &mut Engine, positions: &[V3], cell: &M33) -> StepOutput {
    engine.put_positions(positions).unwrap();
    engine.put_box(cell).unwrap();
    engine.calc().unwrap()
}

fn random_positions(natoms: usize, scale: f64) -> Vec<V3> {
    (0..natoms).map(|_| V3::from_fn(|_| scale * rand::random::<f64>())).collect()
}

/// Atoms on a jittered lattice, so that no two get too close.
fn spread_positions(per_side: usize, spacing: f64) -> Vec<V3> {
    let mut out = vec![];
    for i in 0..per_side {
        for j in 0..per_side {
            for k in 0..per_side {
                let site = V3([i as f64, j as f64, k as f64]) * spacing;
                out.push(site + V3::from_fn(|_| 0.3 * spacing * (rand::random::<f64>() - 0.5)));
            }
        }
    }
    out
}

/// Compare the forces of a graph with a bias against finite differences,
/// with and without chaining.
fn check_forces(yaml: &str, positions: &[V3], cell: &M33) {
    for &chaining in &[true, false] {
        let mut engine = engine(yaml, positions.len(), &[], chaining);
        let output = run(&mut engine, positions, cell);
        assert_ne!(output.bias, 0.0);

        let numerical = cvgraph_numerical::gradient(1e-5, None, positions.unvee_ref().flat(), |flat| {
            run(&mut engine, &v3_vec_from_flat(flat), cell).bias
        });
        let expected: Vec<V3> = v3_vec_from_flat(&numerical).into_iter().map(|g| -g).collect();
        assert_close!(rel=1e-5, abs=1e-7, output.forces, expected);
    }
}

/// Scaling positions and box together only changes quantities through the
/// box derivative, so the trace of the virial is `dE/ds` at `s = 1`.
fn check_virial(yaml: &str, positions: &[V3], cell: &M33) {
    let mut engine = engine(yaml, positions.len(), &[], true);
    let output = run(&mut engine, positions, cell);

    let slope = cvgraph_numerical::slope(1e-5, None, 1.0, |s| {
        let scaled: Vec<V3> = positions.iter().map(|&p| p * s).collect();
        run(&mut engine, &scaled, &(*cell * s)).bias
    });
    assert_close!(rel=1e-5, abs=1e-7, output.virial.trace(), slope);
    // the virial of a pairwise quantity is symmetric
    assert_close!(rel=1e-8, abs=1e-10, output.virial, output.virial.t());
}

const DISTANCE_LESS_THAN: &str = "
actions:
  - label: d
    action: DISTANCE
    atoms: [[0, 1], [1, 2], [2, 3], [3, 0]]
    less-than: {rational: {r0: 0.8, nn: 6, mm: 12}}
  - label: bias
    action: RESTRAINT
    arg: d_lessthan
    at: [1.0]
    kappa: [3.0]
    slope: [0.5]
";

const COORDINATION: &str = "
groups:
  everyone: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26]
actions:
  - label: cm
    action: CONTACT_MATRIX
    group: everyone
    switch: {poly5: {start: 0.8, end: 1.6}}
  - label: cn
    action: COORDINATION_NUMBER
    arg: cm
  - label: many
    action: MORE_THAN
    arg: cn
    switch: {rational: {r0: 1.0, d0: 1.0}}
  - label: total
    action: SUM
    arg: many
  - label: bias
    action: RESTRAINT
    arg: total
    at: [4.0]
    kappa: [0.7]
";

#[test]
fn distance_switch_forces() {
    let cell = M33::diag(&[3.0, 3.5, 4.0]);
    let positions = random_positions(4, 3.0);
    check_forces(DISTANCE_LESS_THAN, &positions, &cell);
    check_virial(DISTANCE_LESS_THAN, &positions, &cell);
}

#[test]
fn angle_combine_forces() {
    let yaml = "
actions:
  - label: a
    action: ANGLE
    atoms: [[0, 1, 2], [1, 2, 3]]
  - label: c
    action: COMBINE
    arg: a
    coefficients: [1.0]
    parameters: [1.5]
    powers: [2]
  - label: s
    action: MAX
    arg: c
    beta: 0.1
  - label: bias
    action: RESTRAINT
    arg: s
    at: [0.0]
    slope: [1.0]
";
    let positions = vec![
        V3([0.0, 0.0, 0.0]),
        V3([1.0, 0.1, 0.0]),
        V3([1.3, 1.2, 0.2]),
        V3([0.4, 1.9, 0.9]),
    ];
    check_forces(yaml, &positions, &M33::zero());
}

#[test]
fn sharp_max_of_long_distances() {
    let yaml = "
actions:
  - label: d
    action: DISTANCE
    atoms: [[0, 1], [0, 2]]
  - label: far
    action: MAX
    arg: d
    beta: 0.01
  - label: near
    action: MIN
    arg: d
    beta: 0.01
";
    let positions = vec![V3::zero(), V3([10.0, 0.0, 0.0]), V3([0.0, 12.0, 0.0])];
    for &chaining in &[true, false] {
        let mut engine = engine(yaml, 3, &["far", "near"], chaining);
        run(&mut engine, &positions, &M33::zero());
        assert_close!(abs=1e-9, engine.value("far").unwrap().scalar(), 12.0);
        assert_close!(abs=1e-9, engine.value("near").unwrap().scalar(), 10.0);
    }
}

#[test]
fn contact_matrix_forces() {
    let cell = M33::diag(&[3.6, 3.6, 3.6]);
    let positions = spread_positions(3, 1.2);
    check_forces(COORDINATION, &positions, &cell);
    check_virial(COORDINATION, &positions, &cell);
}

#[test]
fn histogram_forces() {
    let yaml = "
actions:
  - label: d
    action: DISTANCE
    atoms: [[0, 1], [0, 2], [1, 2], [2, 3]]
  - label: h
    action: HISTOGRAM
    arg: d
    grid: {min: [0.0], max: [4.0], bins: [40]}
    bandwidth: [0.3]
  - label: peak
    action: MAX
    arg: h
    beta: 0.2
  - label: bias
    action: RESTRAINT
    arg: peak
    at: [0.0]
    kappa: [1.0]
";
    let positions = vec![
        V3([0.0, 0.0, 0.0]),
        V3([1.13, 0.21, 0.07]),
        V3([0.37, 1.41, -0.29]),
        V3([1.52, 1.77, 0.63]),
    ];
    check_forces(yaml, &positions, &M33::zero());
}

#[test]
fn chained_matches_materialized() {
    let cell = M33::diag(&[3.6, 3.6, 3.6]);
    let positions = spread_positions(3, 1.2);

    let mut chained = engine(COORDINATION, positions.len(), &["cn"], true);
    let mut materialized = engine(COORDINATION, positions.len(), &["cn"], false);
    assert!(chained.graph().num_chains() < materialized.graph().num_chains());

    let a = run(&mut chained, &positions, &cell);
    let b = run(&mut materialized, &positions, &cell);
    assert_close!(a.bias, b.bias);
    assert_close!(abs=1e-12, a.forces, b.forces);
    assert_close!(abs=1e-12, a.virial, b.virial);
    assert_close!(
        abs=1e-12,
        chained.value("cn").unwrap().data().to_vec(),
        materialized.value("cn").unwrap().data().to_vec(),
    );
}

#[test]
fn dense_matches_link_cells() {
    let cell = M33::diag(&[3.6, 3.6, 3.6]);
    let positions = spread_positions(3, 1.2);
    let dense_yaml = COORDINATION.replace("switch: {poly5", "dense: true\n    switch: {poly5");

    let mut pruned = engine(COORDINATION, positions.len(), &["cn"], true);
    let mut dense = engine(&dense_yaml, positions.len(), &["cn"], true);
    let a = run(&mut pruned, &positions, &cell);
    let b = run(&mut dense, &positions, &cell);
    assert_close!(a.bias, b.bias);
    assert_close!(abs=1e-12, a.forces, b.forces);
    assert_close!(
        abs=1e-12,
        pruned.value("cn").unwrap().data().to_vec(),
        dense.value("cn").unwrap().data().to_vec(),
    );
}

#[test]
fn rayon_matches_serial() {
    let cell = M33::diag(&[3.6, 3.6, 3.6]);
    let positions = spread_positions(3, 1.2);

    let mut serial = try_engine(COORDINATION, positions.len(), &[], true, Threading::Serial).unwrap();
    let mut threaded = try_engine(COORDINATION, positions.len(), &[], true, Threading::Rayon).unwrap();
    let a = run(&mut serial, &positions, &cell);
    let b = run(&mut threaded, &positions, &cell);
    assert_close!(a.bias, b.bias);
    assert_close!(abs=1e-12, a.forces, b.forces);
}

#[test]
fn cutoff_longer_than_half_the_box() {
    let positions = spread_positions(3, 1.0);
    let mut engine = engine(COORDINATION, positions.len(), &[], true);
    engine.put_positions(&positions).unwrap();
    engine.put_box(&M33::diag(&[3.0, 3.0, 3.0])).unwrap();

    let err = engine.calc().unwrap_err();
    info!("expected error: {}", err);
    assert!(err.downcast_ref::<NumericalError>().is_some(), "{}", err);
}

#[test]
fn contour_of_a_constant_grid() {
    let yaml = "
actions:
  - label: f
    action: CONSTANT
    values: [0.2, 0.6, 0.3]
    grid: {min: [0.0], max: [2.0], bins: [2]}
  - label: c
    action: FIND_CONTOUR
    arg: f
    contour: 0.5
";
    let mut engine = engine(yaml, 1, &["c.x"], true);
    run(&mut engine, &[V3::zero()], &M33::zero());
    assert_close!(abs=1e-8, engine.value("c.x").unwrap().data().to_vec(), vec![0.75, 4.0 / 3.0]);
}

#[test]
fn contour_of_a_periodic_grid() {
    let yaml = "
actions:
  - label: f
    action: CONSTANT
    values: [0.2, 0.6, 0.3]
    grid: {min: [0.0], max: [3.0], bins: [3], periodic: [true]}
  - label: c
    action: FIND_CONTOUR
    arg: f
    contour: 0.5
";
    let mut engine = engine(yaml, 1, &["c.x"], true);
    run(&mut engine, &[V3::zero()], &M33::zero());

    // the wrapped edge from 0.3 back to 0.2 never crosses 0.5
    assert_eq!(engine.current_task_list("c").unwrap(), &[0, 1][..]);
    let points = engine.value("c.x").unwrap().data().to_vec();
    assert_eq!(points.len(), 2);
    assert!(0.0 < points[0] && points[0] < 1.0, "{:?}", points);
    assert_close!(abs=1e-8, points, vec![0.75, 4.0 / 3.0]);
}

#[test]
fn clusters_of_contacts() {
    let yaml = "
actions:
  - label: cm
    action: CONTACT_MATRIX
    group: [0, 1, 2, 3, 4, 5]
    switch: {poly5: {start: 0.6, end: 1.0}}
  - label: clusters
    action: DFS_CLUSTERING
    arg: cm
  - label: second
    action: CLUSTER_WEIGHTS
    arg: clusters
    cluster: 2
";
    let positions = vec![
        V3([0.0, 0.0, 0.0]),
        V3([0.5, 0.0, 0.0]),
        V3([1.0, 0.0, 0.0]),
        V3([5.0, 0.0, 0.0]),
        V3([5.0, 0.5, 0.0]),
        V3([9.0, 9.0, 9.0]),
    ];
    let mut engine = engine(yaml, positions.len(), &["second"], true);
    run(&mut engine, &positions, &M33::zero());
    assert_eq!(engine.value("clusters").unwrap().data(), &[1.0, 1.0, 1.0, 2.0, 2.0, 3.0][..]);
    assert_eq!(engine.value("second").unwrap().data(), &[0.0, 0.0, 0.0, 1.0, 1.0, 0.0][..]);
}

fn ideal(kind: SecondaryKind, index: usize) -> Vec<V3> {
    kind.ideal_references()[index].to_vec()
}

#[test]
fn ideal_helix_has_no_rmsd() {
    // rotated and moved, which neither alignment can see
    let rot = M33::from([[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
    let positions: Vec<V3> = ideal(SecondaryKind::Alpha, 0).into_iter()
        .map(|p| &rot * p + V3([1.0, 2.0, 3.0]))
        .collect();
    for kind in &["optimal", "drmsd"] {
        let yaml = format!("
actions:
  - label: helix
    action: ALPHARMSD
    type: {}
    backbone: [[{}]]
", kind, (0..30).map(|i| i.to_string()).collect::<Vec<_>>().join(", "));
        let mut engine = engine(&yaml, 30, &["helix"], true);
        run(&mut engine, &positions, &M33::zero());
        assert_close!(abs=1e-6, engine.value("helix").unwrap().scalar(), 0.0);
    }
}

#[test]
fn helix_forces() {
    let backbone = (0..40).map(|i| i.to_string()).collect::<Vec<_>>().join(", ");
    let mut positions = ideal(SecondaryKind::Alpha, 0);
    let extra: Vec<V3> = positions[20..].iter().map(|&p| p + V3([0.1, 0.2, 0.5])).collect();
    positions.extend(extra);
    let positions: Vec<V3> = positions.into_iter()
        .map(|p| p + V3::from_fn(|_| 0.05 * (rand::random::<f64>() - 0.5)))
        .collect();

    for kind in &["optimal", "simple", "drmsd"] {
        let yaml = format!("
actions:
  - label: helix
    action: ALPHARMSD
    type: {}
    backbone: [[{}]]
    less-than: {{rational: {{r0: 0.08, nn: 8, mm: 12}}}}
  - label: bias
    action: RESTRAINT
    arg: helix_lessthan
    at: [3.0]
    kappa: [1.0]
", kind, backbone);
        check_forces(&yaml, &positions, &M33::zero());
    }
}

#[test]
fn short_residue_chain() {
    let yaml = "
actions:
  - label: helix
    action: ALPHARMSD
    backbone: [[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24]]
";
    assert!(try_engine(yaml, 25, &[], true, Threading::Serial).is_err());
}

#[test]
fn strand_cutoff_selects_tasks() {
    let sheet = ideal(SecondaryKind::AntiBeta, 0);
    let mut positions = sheet.clone();
    positions.extend(sheet[..15].iter().map(|&p| p + V3([5.0, 0.0, 0.0])));

    let yaml = "
groups:
  a: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
  b: [15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29]
  c: [30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44]
actions:
  - label: sheet
    action: ANTIBETARMSD
    backbone: [a, b, c]
    style: inter
    strands-cutoff: 1.0
";
    let mut engine = engine(yaml, positions.len(), &["sheet"], true);
    run(&mut engine, &positions, &M33::zero());
    let first = engine.current_task_list("sheet").unwrap().to_vec();
    run(&mut engine, &positions, &M33::zero());
    assert_eq!(engine.current_task_list("sheet").unwrap(), &first[..]);
    assert_eq!(first, vec![0]);

    let values = engine.value("sheet").unwrap().data();
    assert_close!(abs=1e-6, values[0], 0.0);
    assert_eq!(&values[1..], &[0.0, 0.0][..]);
}

#[test]
fn skipped_strands_stay_skipped_without_chaining() {
    let sheet = ideal(SecondaryKind::AntiBeta, 0);
    let mut positions = sheet.clone();
    positions.extend(sheet[..15].iter().map(|&p| p + V3([5.0, 0.0, 0.0])));

    let yaml = "
groups:
  a: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14]
  b: [15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29]
  c: [30, 31, 32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44]
actions:
  - label: sheet
    action: ANTIBETARMSD
    backbone: [a, b, c]
    style: inter
    strands-cutoff: 1.0
    less-than: {rational: {r0: 0.08}}
";
    let mut counts = vec![];
    for &chaining in &[true, false] {
        let mut engine = engine(yaml, positions.len(), &["sheet_lessthan"], chaining);
        run(&mut engine, &positions, &M33::zero());
        counts.push(engine.value("sheet_lessthan").unwrap().scalar());
    }
    assert_close!(abs=1e-6, counts[0], 1.0);
    assert_close!(abs=1e-9, counts[0], counts[1]);
}

#[test]
fn parallel_sheets_have_two_components() {
    let sheet = ideal(SecondaryKind::ParaBeta, 1);
    let yaml = "
actions:
  - label: p
    action: PARABETARMSD
    backbone: [[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14], [15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29]]
    type: optimal
";
    let mut engine = engine(yaml, 30, &["p.struct-1", "p.struct-2"], true);
    run(&mut engine, &sheet, &M33::zero());
    assert!(engine.value("p.struct-1").unwrap().scalar() > 1e-3);
    assert_close!(abs=1e-6, engine.value("p.struct-2").unwrap().scalar(), 0.0);
}

#[test]
fn running_average_survives_a_checkpoint() {
    let yaml = "
actions:
  - label: d
    action: DISTANCE
    atoms: [[0, 1]]
  - label: avg
    action: AVERAGE
    arg: d
    stride: 2
";
    let at = |x: f64| vec![V3::zero(), V3([x, 0.0, 0.0])];

    let mut engine = engine(yaml, 2, &[], true);
    for (step, &x) in [1.0, 100.0, 2.0, 100.0, 6.0].iter().enumerate() {
        engine.set_step(step as u64);
        run(&mut engine, &at(x), &M33::zero());
    }
    assert_close!(engine.value("avg").unwrap().scalar(), 3.0);
    assert_eq!(engine.value("avg.count").unwrap().scalar(), 3.0);

    let mut bytes = vec![];
    engine.write_checkpoint(&mut bytes).unwrap();
    let mut restarted = self::engine(yaml, 2, &[], true);
    restarted.read_checkpoint(&bytes[..]).unwrap();
    restarted.set_step(6);
    run(&mut restarted, &at(7.0), &M33::zero());
    assert_close!(restarted.value("avg").unwrap().scalar(), 4.0);
    assert_eq!(restarted.value("avg.count").unwrap().scalar(), 4.0);
}

#[test]
fn unknown_actions_and_arguments() {
    let unknown = "
actions:
  - label: x
    action: TELEPORT
";
    let err = try_engine(unknown, 2, &[], true, Threading::Serial).err().unwrap();
    assert!(err.to_string().contains("TELEPORT"), "{}", err);

    let dangling = "
actions:
  - label: s
    action: SUM
    arg: nowhere
";
    assert!(try_engine(dangling, 2, &[], true, Threading::Serial).is_err());
}
