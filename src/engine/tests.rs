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

//! Whole-engine tests, using a handful of small actions.

use slice_of_array::prelude::*;

use cvgraph_array_types::{V3, M33, Unvee, v3_vec_from_flat};

use crate::*;

#[derive(Debug, Clone)]
struct Entry {
    label: String,
    action: String,
    args: Vec<String>,
    param: f64,
}

fn entry(label: &str, action: &str, args: &[&str], param: f64) -> Entry {
    Entry {
        label: label.to_string(),
        action: action.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        param,
    }
}

impl ActionEntry for Entry {
    fn label(&self) -> &str { &self.label }
    fn action_name(&self) -> &str { &self.action }
    fn argument_names(&self) -> Vec<String> { self.args.clone() }
}

/// Distances between consecutive atoms.
struct Dist { out: ValueId, pairs: Vec<(usize, usize)> }

impl Action for Dist {
    fn kind(&self) -> &'static str { "DIST" }
    fn task_space(&self) -> TaskSpace { TaskSpace::Elements(self.pairs.len()) }
    fn uses_atoms(&self) -> bool { true }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let (a, b) = self.pairs[ctx.task_index()];
        let pos = ctx.positions();
        let r = ctx.pbc().distance(pos[a], pos[b]);
        let d = r.norm();
        let g = r / d;
        ctx.set_value(self.out, d);
        ctx.add_atom_derivative(self.out, a, -g);
        ctx.add_atom_derivative(self.out, b, g);
        ctx.add_box_derivative(self.out, &-r.outer(&g));
        Ok(())
    }
}

/// Elementwise square; with `param == 2`, only even tasks are selected.
struct Square { arg: ValueId, out: ValueId, space: TaskSpace, even_only: bool }

impl Action for Square {
    fn kind(&self) -> &'static str { "SQUARE" }
    fn task_space(&self) -> TaskSpace { self.space }

    fn select_tasks(&self, _: &StepContext<'_>, flags: &mut [bool]) -> FailResult<bool> {
        if !self.even_only {
            return Ok(false);
        }
        for (i, flag) in flags.iter_mut().enumerate() {
            *flag |= i % 2 == 0;
        }
        Ok(true)
    }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let task = ctx.task_index();
        let x = ctx.argument_value(self.arg, task);
        ctx.set_value(self.out, x * x);
        ctx.add_argument_derivative(self.out, self.arg, task, 2.0 * x);
        Ok(())
    }
}

/// Sum, or mean when `param == 1`.
struct Sum { arg: ValueId, out: ValueId, space: TaskSpace, mean: bool }

impl Action for Sum {
    fn kind(&self) -> &'static str { "SUM" }
    fn task_space(&self) -> TaskSpace { self.space }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let task = ctx.task_index();
        let x = ctx.argument_value(self.arg, task);
        ctx.set_value(self.out, x);
        ctx.add_argument_derivative(self.out, self.arg, task, 1.0);
        Ok(())
    }

    fn transform_reduction(&self, _: ValueId, sum: f64) -> (f64, f64) {
        match self.mean {
            true => {
                let n = self.space.ntasks() as f64;
                (sum / n, 1.0 / n)
            },
            false => (sum, 1.0),
        }
    }
}

/// `k/2 (x - c)^2` with an optional constant center.
struct Restraint { arg: ValueId, center: Option<ValueId>, out: ValueId, k: f64 }

impl Action for Restraint {
    fn kind(&self) -> &'static str { "RESTRAINT" }
    fn task_space(&self) -> TaskSpace { TaskSpace::Single }
    fn is_bias(&self) -> bool { true }
    fn is_sink(&self) -> bool { true }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let x = ctx.argument_value(self.arg, 0);
        let c = self.center.map_or(0.0, |c| ctx.argument_value(c, 0));
        ctx.set_value(self.out, 0.5 * self.k * (x - c) * (x - c));
        ctx.add_argument_derivative(self.out, self.arg, 0, self.k * (x - c));
        if let Some(center) = self.center {
            ctx.add_argument_derivative(self.out, center, 0, -self.k * (x - c));
        }
        Ok(())
    }
}

struct Constant;

impl Action for Constant {
    fn kind(&self) -> &'static str { "CONST" }
    fn task_space(&self) -> TaskSpace { TaskSpace::None }
    fn is_constant(&self) -> bool { true }
}

/// Keeps a running total of its argument in a passive value.
struct Total { arg: ValueId, out: ValueId }

impl Action for Total {
    fn kind(&self) -> &'static str { "TOTAL" }
    fn task_space(&self) -> TaskSpace { TaskSpace::None }
    fn is_sink(&self) -> bool { true }
    fn needs_stored_arguments(&self) -> bool { true }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> FailResult<()> {
        let x = ctx.value(self.arg).scalar();
        ctx.data_mut(self.out)[0] += x;
        Ok(())
    }
}

fn registry() -> Registry<Entry> {
    let mut registry = Registry::new();
    registry.register("DIST", |nb: &mut NodeBuilder<'_>, _: &Entry| {
        let pairs: Vec<_> = (1..nb.natoms()).map(|i| (i - 1, i)).collect();
        let out = nb.output(ValueSpec::new(Shape::Vector(pairs.len()), OutputMode::PerTask))?;
        Ok(Box::new(Dist { out, pairs }) as Box<dyn Action>)
    });
    registry.register("SQUARE", |nb: &mut NodeBuilder<'_>, e: &Entry| {
        let arg = nb.argument(&e.args[0])?;
        let out = nb.output(ValueSpec::new(arg.shape.clone(), OutputMode::PerTask))?;
        let space = arg.elementwise_space();
        Ok(Box::new(Square { arg: arg.id, out, space, even_only: e.param == 2.0 }) as Box<dyn Action>)
    });
    registry.register("SUM", |nb: &mut NodeBuilder<'_>, e: &Entry| {
        let arg = nb.argument(&e.args[0])?;
        let out = nb.output(ValueSpec::new(Shape::Scalar, OutputMode::Reduced))?;
        let space = arg.elementwise_space();
        Ok(Box::new(Sum { arg: arg.id, out, space, mean: e.param == 1.0 }) as Box<dyn Action>)
    });
    registry.register("RESTRAINT", |nb: &mut NodeBuilder<'_>, e: &Entry| {
        let arg = nb.argument(&e.args[0])?.id;
        let center = match e.args.get(1) {
            Some(name) => Some(nb.argument(name)?.id),
            None => None,
        };
        let out = nb.output(ValueSpec::new(Shape::Scalar, OutputMode::Reduced))?;
        Ok(Box::new(Restraint { arg, center, out, k: e.param }) as Box<dyn Action>)
    });
    registry.register("CONST", |nb: &mut NodeBuilder<'_>, e: &Entry| {
        let out = nb.output(ValueSpec::new(Shape::Scalar, OutputMode::Passive))?;
        nb.set_constant(out, vec![e.param])?;
        Ok(Box::new(Constant) as Box<dyn Action>)
    });
    registry.register("TOTAL", |nb: &mut NodeBuilder<'_>, e: &Entry| {
        let arg = nb.argument(&e.args[0])?.id;
        let out = nb.output(ValueSpec::new(Shape::Scalar, OutputMode::Passive).without_derivatives())?;
        Ok(Box::new(Total { arg, out }) as Box<dyn Action>)
    });
    registry
}

fn chain_entries() -> Vec<Entry> {
    vec![
        entry("d", "DIST", &[], 0.0),
        entry("sq", "SQUARE", &["d"], 0.0),
        entry("s", "SUM", &["sq"], 0.0),
        entry("c", "CONST", &[], 1.5),
        entry("bias", "RESTRAINT", &["s", "c"], 0.7),
    ]
}

fn random_positions(natoms: usize, scale: f64) -> Vec<V3> {
    (0..natoms).map(|_| V3::from_fn(|_| scale * rand::random::<f64>())).collect()
}

fn engine_for(entries: &[Entry], natoms: usize, chaining: bool, threading: Threading) -> Engine {
    let graph = build_graph(&registry(), entries, natoms, &[], GraphOptions { chaining }).unwrap();
    Engine::new(graph, EngineOptions { threading })
}

fn run(engine: &mut Engine, positions: &[V3], cell: &M33) -> StepOutput {
    engine.put_positions(positions).unwrap();
    engine.put_box(cell).unwrap();
    engine.calc().unwrap()
}

#[test]
fn chains_are_formed() {
    let graph = build_graph(&registry(), &chain_entries(), 5, &[], GraphOptions::default()).unwrap();
    let chain = graph.chain_of("d").unwrap();
    assert_eq!(graph.chain_labels(chain), vec!["d", "sq", "s"]);
    assert_ne!(graph.chain_of("bias"), Some(chain));
    assert_eq!(graph.value("sq").unwrap().storage(), Storage::Streamed);
    assert_eq!(graph.value("s").unwrap().storage(), Storage::Stored);

    let graph = build_graph(&registry(), &chain_entries(), 5, &[], GraphOptions { chaining: false }).unwrap();
    assert_eq!(graph.num_chains(), 5);
    assert_eq!(graph.value("sq").unwrap().storage(), Storage::Stored);
}

#[test]
fn chained_matches_materialized() {
    let natoms = 6;
    let cell = M33::diag(&[4.0, 5.0, 6.0]);
    let positions = random_positions(natoms, 4.0);

    let mut chained = engine_for(&chain_entries(), natoms, true, Threading::Serial);
    let mut materialized = engine_for(&chain_entries(), natoms, false, Threading::Serial);
    let a = run(&mut chained, &positions, &cell);
    let b = run(&mut materialized, &positions, &cell);

    assert_close!(chained.value("s").unwrap().scalar(), materialized.value("s").unwrap().scalar());
    assert_close!(a.bias, b.bias);
    assert_close!(abs=1e-12, a.forces, b.forces);
    assert_close!(abs=1e-12, a.virial, b.virial);
}

#[test]
fn rayon_matches_serial() {
    let natoms = 40;
    let cell = M33::diag(&[7.0, 7.0, 7.0]);
    let positions = random_positions(natoms, 7.0);

    let mut serial = engine_for(&chain_entries(), natoms, true, Threading::Serial);
    let mut threaded = engine_for(&chain_entries(), natoms, true, Threading::Rayon);
    let a = run(&mut serial, &positions, &cell);
    let b = run(&mut threaded, &positions, &cell);
    assert_close!(a.bias, b.bias);
    assert_close!(abs=1e-12, a.forces, b.forces);
}

#[test]
fn forces_are_minus_the_gradient() {
    let natoms = 5;
    let cell = M33::zero();
    let positions = random_positions(natoms, 3.0);

    for &chaining in &[true, false] {
        let mut engine = engine_for(&chain_entries(), natoms, chaining, Threading::Serial);
        let output = run(&mut engine, &positions, &cell);

        let numerical = cvgraph_numerical::gradient(1e-4, None, positions.unvee_ref().flat(), |flat| {
            run(&mut engine, &v3_vec_from_flat(flat), &cell).bias
        });
        let expected: Vec<V3> = v3_vec_from_flat(&numerical).into_iter().map(|g| -g).collect();
        assert_close!(rel=1e-6, abs=1e-8, output.forces, expected);
    }
}

#[test]
fn mean_reduction_and_applied_force() {
    let natoms = 4;
    let entries = vec![
        entry("d", "DIST", &[], 0.0),
        entry("m", "SUM", &["d"], 1.0),
    ];
    let graph = build_graph(&registry(), &entries, natoms, &["m".to_string()], GraphOptions::default()).unwrap();
    let mut engine = Engine::new(graph, EngineOptions::default());

    let positions = vec![
        V3([0.0, 0.0, 0.0]),
        V3([1.0, 0.0, 0.0]),
        V3([1.0, 2.0, 0.0]),
        V3([1.0, 2.0, 3.0]),
    ];
    engine.put_positions(&positions).unwrap();
    engine.put_box(&M33::zero()).unwrap();
    engine.prepare_dependencies().unwrap();
    engine.just_calculate().unwrap();
    assert_close!(engine.value("m").unwrap().scalar(), 2.0);

    // a unit force on the mean pulls the last atom outward by 1/3
    engine.add_force("m", 0, 1.0).unwrap();
    let output = engine.backward_propagate().unwrap();
    assert_close!(abs=1e-12, output.forces[3], V3([0.0, 0.0, 1.0 / 3.0]));
    assert_close!(abs=1e-12, output.forces[0], V3([-1.0 / 3.0, 0.0, 0.0]));
    assert_eq!(output.bias, 0.0);
}

#[test]
fn virial_matches_box_scaling() {
    // scaling positions and box together changes every distance by the same
    // factor, so the trace of the virial is dE/d(ln s)
    let natoms = 5;
    let cell = M33::diag(&[5.0, 5.0, 5.0]);
    let positions = random_positions(natoms, 5.0);
    let mut engine = engine_for(&chain_entries(), natoms, true, Threading::Serial);
    let output = run(&mut engine, &positions, &cell);

    let energy_at = |engine: &mut Engine, s: f64| {
        let scaled: Vec<V3> = positions.iter().map(|&p| p * s).collect();
        run(engine, &scaled, &(cell * s)).bias
    };
    let slope = cvgraph_numerical::slope(1e-5, None, 1.0, |s| energy_at(&mut engine, s));
    assert_close!(rel=1e-6, abs=1e-8, output.virial.trace(), slope);
}

#[test]
fn task_filtering_is_stable() {
    let natoms = 7;
    let entries = vec![
        entry("d", "DIST", &[], 0.0),
        entry("sq", "SQUARE", &["d"], 2.0),
        entry("s", "SUM", &["sq"], 0.0),
    ];
    let graph = build_graph(&registry(), &entries, natoms, &["s".to_string()], GraphOptions::default()).unwrap();
    let mut engine = Engine::new(graph, EngineOptions::default());
    let positions: Vec<V3> = (0..natoms).map(|i| V3([i as f64, 0.0, 0.0])).collect();

    run(&mut engine, &positions, &M33::zero());
    let first = engine.current_task_list("s").unwrap().to_vec();
    run(&mut engine, &positions, &M33::zero());
    assert_eq!(engine.current_task_list("s").unwrap(), &first[..]);
    assert_eq!(first, vec![0, 2, 4]);
    // only selected tasks contribute
    assert_close!(engine.value("s").unwrap().scalar(), 3.0);
}

#[test]
fn task_filtering_reaches_unchained_consumers() {
    let natoms = 7;
    let entries = vec![
        entry("d", "DIST", &[], 0.0),
        entry("sq", "SQUARE", &["d"], 2.0),
        entry("s", "SUM", &["sq"], 0.0),
    ];
    let graph = build_graph(&registry(), &entries, natoms, &["s".to_string()], GraphOptions { chaining: false }).unwrap();
    let mut engine = Engine::new(graph, EngineOptions::default());
    let positions: Vec<V3> = (0..natoms).map(|i| V3([i as f64, 0.0, 0.0])).collect();

    run(&mut engine, &positions, &M33::zero());
    assert_eq!(engine.current_task_list("sq").unwrap(), &[0, 2, 4][..]);
    assert_eq!(engine.current_task_list("s").unwrap(), &[0, 2, 4][..]);
    // the producer of the distances selects nothing
    assert_eq!(engine.current_task_list("d").unwrap().len(), natoms - 1);
    assert_close!(engine.value("s").unwrap().scalar(), 3.0);
}

#[test]
fn inactive_branches_are_skipped() {
    let natoms = 3;
    let entries = vec![
        entry("d", "DIST", &[], 0.0),
        entry("s", "SUM", &["d"], 0.0),
        entry("unused", "SUM", &["d"], 0.0),
        entry("bias", "RESTRAINT", &["s"], 1.0),
    ];
    let mut engine = engine_for(&entries, natoms, false, Threading::Serial);
    let positions = vec![V3([0.0; 3]), V3([1.0, 0.0, 0.0]), V3([1.0, 1.0, 0.0])];
    run(&mut engine, &positions, &M33::zero());
    assert_close!(engine.value("s").unwrap().scalar(), 2.0);
    assert_eq!(engine.value("unused").unwrap().scalar(), 0.0);
}

#[test]
fn update_hooks_and_checkpoints() {
    let natoms = 3;
    let entries = vec![
        entry("d", "DIST", &[], 0.0),
        entry("s", "SUM", &["d"], 0.0),
        entry("total", "TOTAL", &["s"], 0.0),
    ];
    let positions = vec![V3([0.0; 3]), V3([1.0, 0.0, 0.0]), V3([1.0, 1.0, 0.0])];

    let mut engine = engine_for(&entries, natoms, true, Threading::Serial);
    for step in 0..3 {
        engine.set_step(step);
        run(&mut engine, &positions, &M33::zero());
    }
    assert_close!(engine.value("total").unwrap().scalar(), 6.0);

    let mut bytes = vec![];
    engine.write_checkpoint(&mut bytes).unwrap();

    let mut restarted = engine_for(&entries, natoms, true, Threading::Serial);
    restarted.read_checkpoint(&bytes[..]).unwrap();
    assert_close!(restarted.value("total").unwrap().scalar(), 6.0);
    run(&mut restarted, &positions, &M33::zero());
    assert_close!(restarted.value("total").unwrap().scalar(), 8.0);

    // a different graph refuses the checkpoint
    let mut other = engine_for(&chain_entries(), natoms, true, Threading::Serial);
    assert!(other.read_checkpoint(&bytes[..]).is_err());
    assert!(restarted.read_checkpoint(&bytes[..10]).is_err());
}

#[test]
fn missing_input_is_an_error() {
    let mut engine = engine_for(&chain_entries(), 3, true, Threading::Serial);
    assert!(engine.calc().is_err());
    engine.put_positions(&random_positions(3, 1.0)).unwrap();
    assert!(engine.calc().is_err());
    assert!(engine.put_positions(&random_positions(4, 1.0)).is_err());
}

#[test]
fn streamed_values_are_not_readable() {
    let mut engine = engine_for(&chain_entries(), 4, true, Threading::Serial);
    run(&mut engine, &random_positions(4, 1.0), &M33::zero());
    assert!(engine.value("sq").is_err());
    assert!(engine.add_force("sq", 0, 1.0).is_err());
    assert!(engine.value("s").is_ok());
}

fn config_error_label(entries: &[Entry]) -> String {
    match build_graph(&registry(), entries, 3, &[], GraphOptions::default()) {
        Ok(_) => panic!("expected an error"),
        Err(e) => match e.downcast::<ConfigError>() {
            Ok(e) => e.label,
            Err(e) => panic!("expected a config error, got {}", e),
        },
    }
}

#[test]
fn bad_graphs() {
    let cyclic = vec![
        entry("a", "SQUARE", &["b"], 0.0),
        entry("b", "SQUARE", &["a"], 0.0),
    ];
    let label = config_error_label(&cyclic);
    assert!(label == "a" || label == "b");

    let duplicate = vec![
        entry("d", "DIST", &[], 0.0),
        entry("d", "DIST", &[], 0.0),
    ];
    assert_eq!(config_error_label(&duplicate), "d");

    let unknown_arg = vec![entry("sq", "SQUARE", &["nope"], 0.0)];
    assert_eq!(config_error_label(&unknown_arg), "sq");

    let unknown_action = vec![entry("x", "FROBNICATE", &[], 0.0)];
    assert_eq!(config_error_label(&unknown_action), "x");
}

#[test]
fn constants_run_once() {
    let mut engine = engine_for(&chain_entries(), 4, true, Threading::Serial);
    let positions = random_positions(4, 1.0);
    run(&mut engine, &positions, &M33::zero());
    engine.prepare_dependencies().unwrap();
    let chain = engine.graph().chain_of("c").unwrap();
    assert!(!engine.active.as_ref().unwrap().contains(&chain));
    assert_eq!(engine.value("c").unwrap().scalar(), 1.5);
}
