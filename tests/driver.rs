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

//! Trajectories pushed through the public driver API, the way the binary does it.

#[macro_use] extern crate cvgraph_assert_close;
#[macro_use] extern crate pretty_assertions;

use cvgraph_array_types::V3;
use cvgraph_tasks::{Driver, DriverOptions, Frame, XyzReader};
use cvgraph_tasks_config::{Settings, ValidatedSettings, YamlRead};

type FailResult<T> = Result<T, failure::Error>;

fn init_logger() {
    let _ = env_logger::Builder::from_default_env().is_test(true).try_init();
}

fn settings(yaml: &str) -> ValidatedSettings {
    Settings::from_reader(yaml.as_bytes()).unwrap().validate().unwrap()
}

fn random_trajectory(natoms: usize, nframes: usize, scale: f64) -> Vec<u8> {
    let mut bytes = vec![];
    for i in 0..nframes {
        let frame = Frame {
            title: format!("frame={}", i),
            symbols: vec!["X".to_string(); natoms],
            carts: (0..natoms).map(|_| V3::from_fn(|_| scale * rand::random::<f64>())).collect(),
            cell: None,
            energy: None,
        };
        frame.to_writer(&mut bytes).unwrap();
    }
    bytes
}

fn read_frames(bytes: &[u8]) -> Vec<Frame> {
    XyzReader::new(bytes).collect::<FailResult<Vec<_>>>().unwrap()
}

const TRIANGLE: &str = "
actions:
  - {label: d, action: DISTANCE, atoms: [[0, 1], [1, 2], [2, 0]]}
  - {label: perimeter, action: SUM, arg: d}
  - {label: bias, action: RESTRAINT, arg: perimeter, at: [3.0], kappa: [2.0]}
print:
  args: [perimeter]
";

#[test]
fn isolated_systems_feel_no_net_force() {
    init_logger();
    let frames = read_frames(&random_trajectory(3, 5, 2.0));
    assert_eq!(frames.len(), 5);

    let mut driver = Driver::with_output(settings(TRIANGLE), 3, DriverOptions::default(), Box::new(vec![])).unwrap();
    for frame in &frames {
        let output = driver.frame(frame).unwrap();

        let p = &frame.carts;
        let perimeter = (p[1] - p[0]).norm() + (p[2] - p[1]).norm() + (p[0] - p[2]).norm();
        assert_close!(driver.engine().value("perimeter").unwrap().scalar(), perimeter);
        assert_close!(output.bias, (perimeter - 3.0).powi(2));

        let net = output.forces.iter().fold(V3::zero(), |a, &b| a + b);
        assert_close!(abs=1e-10, net, V3::zero());
        // the virial of a pairwise quantity is set by the forces alone
        let work: f64 = output.forces.iter().zip(p).map(|(f, r)| V3::dot(f, r)).sum();
        assert_close!(abs=1e-10, output.virial.trace(), -work);
    }
    driver.finish().unwrap();
}

#[test]
fn chaining_does_not_change_results() {
    init_logger();
    let yaml = "
groups:
  all: [0, 1, 2, 3, 4, 5, 6, 7]
actions:
  - {label: cm, action: CONTACT_MATRIX, group: all, switch: {rational: {r0: 0.5}}}
  - {label: cn, action: COORDINATION_NUMBER, arg: cm}
  - {label: crowded, action: MORE_THAN, arg: cn, switch: {rational: {r0: 1.5}}}
  - {label: total, action: SUM, arg: crowded}
  - {label: bias, action: RESTRAINT, arg: total, at: [2.0], kappa: [1.0]}
print:
  args: [cn, total]
";
    let frames = read_frames(&random_trajectory(8, 3, 1.5));
    let chained = settings(yaml);
    let materialized = settings(&format!("chaining: false\n{}", yaml));

    let mut a = Driver::with_output(chained, 8, DriverOptions::default(), Box::new(vec![])).unwrap();
    let mut b = Driver::with_output(materialized, 8, DriverOptions::default(), Box::new(vec![])).unwrap();
    for frame in &frames {
        let out_a = a.frame(frame).unwrap();
        let out_b = b.frame(frame).unwrap();
        assert_close!(out_a.bias, out_b.bias);
        assert_close!(abs=1e-12, out_a.forces, out_b.forces);
        assert_close!(abs=1e-12, out_a.virial, out_b.virial);
        for name in &["cn", "total"] {
            let value = |d: &Driver| d.engine().value(name).unwrap().data().to_vec();
            assert_close!(abs=1e-12, value(&a), value(&b));
        }
    }
}

#[test]
fn bad_configs_are_reported_before_any_frame() {
    init_logger();
    let err = |yaml: &str| Driver::with_output(settings(yaml), 3, DriverOptions::default(), Box::new(vec![]))
        .err()
        .map(|e| e.to_string());

    assert!(err("actions: [{label: s, action: SUM, arg: nope}]").is_some());
    assert!(err("actions: [{label: d, action: DISTANCE, atoms: [[0, 7]]}]").is_some());
    assert!(err("actions: [{label: x, action: NOT_AN_ACTION}]").is_some());
    assert_eq!(err("actions: [{label: d, action: DISTANCE, atoms: [[0, 1]]}]"), None);
}
