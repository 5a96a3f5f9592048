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

//! Colvar tables: one row per printed frame, one column per scalar.
//!
//! ```text
//! #! FIELDS step d.0 d.1 total
//!        0   1.00000000   1.41421356   2.41421356
//! ```

use crate::FailResult;

use std::io::Write;

use itertools::Itertools;
use cvgraph_engine::{Engine, OutputMode, Shape};

#[derive(Debug, Clone, PartialEq)]
struct Column {
    value: String,
    index: usize,
    title: String,
}

pub struct ColvarWriter<W: Write> {
    w: W,
    columns: Vec<Column>,
    stride: u64,
    frames: u64,
}

impl<W: Write> ColvarWriter<W> {
    /// Lay out columns for `args` and write the header.
    ///
    /// Every arg must be stored by the engine. Vectors and matrices get a
    /// column per element; values whose length changes between steps cannot
    /// be printed.
    pub fn new(mut w: W, engine: &Engine, args: &[String], stride: u64) -> FailResult<Self> {
        ensure!(stride > 0, "print stride must be positive");

        let mut columns = vec![];
        for name in args {
            let value = engine.value(name)?;
            ensure!(
                value.mode() != OutputMode::Compacted,
                "cannot print '{}': its length changes from step to step", name,
            );
            match value.shape() {
                Shape::Scalar => columns.push(Column {
                    value: name.clone(), index: 0, title: name.clone(),
                }),
                _ => columns.extend((0..value.len()).map(|index| Column {
                    value: name.clone(), index, title: format!("{}.{}", name, index),
                })),
            }
        }

        writeln!(w, "#! FIELDS step {}", columns.iter().map(|c| &c.title).join(" "))?;
        debug!("colvar has {} columns", columns.len());

        Ok(ColvarWriter { w, columns, stride, frames: 0 })
    }

    /// Called once per frame; writes a row on every `stride`-th call.
    pub fn frame(&mut self, engine: &Engine) -> FailResult<()> {
        let frame = self.frames;
        self.frames += 1;
        if frame % self.stride != 0 {
            return Ok(());
        }

        write!(self.w, "{:>8}", engine.step())?;
        for column in &self.columns {
            let data = engine.value(&column.value)?.data();
            write!(self.w, " {:>16.8}", data[column.index])?;
        }
        writeln!(self.w)?;
        Ok(())
    }

    pub fn into_inner(mut self) -> FailResult<W> {
        self.w.flush()?;
        Ok(self.w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use cvgraph_array_types::{V3, M33};
    use cvgraph_engine::{build_graph, EngineOptions, GraphOptions};
    use cvgraph_tasks_config::{Settings, YamlRead};

    fn engine(yaml: &str, natoms: usize, requested: &[&str]) -> Engine {
        let settings = Settings::from_reader(yaml.as_bytes()).unwrap().validate().unwrap();
        let requested: Vec<String> = requested.iter().map(|s| s.to_string()).collect();
        let registry = cvgraph_actions::registry();
        let graph = build_graph(&registry, &settings.actions, natoms, &requested, GraphOptions { chaining: true }).unwrap();
        Engine::new(graph, EngineOptions::default())
    }

    const YAML: &str = "
actions:
  - label: d
    action: DISTANCE
    atoms: [[0, 1], [0, 2]]
  - label: total
    action: SUM
    arg: d
";

    #[test]
    fn rows_follow_the_stride() {
        let args = vec!["d".to_string(), "total".to_string()];
        let mut engine = engine(YAML, 3, &["d", "total"]);
        let mut writer = ColvarWriter::new(vec![], &engine, &args, 2).unwrap();

        for step in 0..3 {
            let x = 1.0 + step as f64;
            engine.set_step(step);
            engine.put_positions(&[V3::zero(), V3([x, 0.0, 0.0]), V3([0.0, 1.0, 0.0])]).unwrap();
            engine.put_box(&M33::zero()).unwrap();
            engine.calc().unwrap();
            writer.frame(&engine).unwrap();
        }

        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "#! FIELDS step d.0 d.1 total");
        assert_eq!(lines.len(), 3);

        let row: Vec<f64> = lines[2].split_whitespace().map(|x| x.parse().unwrap()).collect();
        assert_close!(row, vec![2.0, 3.0, 1.0, 4.0]);
    }

    #[test]
    fn values_of_varying_length_are_rejected() {
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
        let engine = engine(yaml, 1, &["c.x"]);
        let err = ColvarWriter::new(vec![], &engine, &["c.x".to_string()], 1).err().unwrap();
        assert!(err.to_string().contains("changes from step to step"), "{}", err);
    }

    #[test]
    fn unknown_values_are_rejected() {
        let engine = engine(YAML, 3, &[]);
        assert!(ColvarWriter::new(vec![], &engine, &["nope".to_string()], 1).is_err());
    }
}
