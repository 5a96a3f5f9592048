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

//! The loop that feeds trajectory frames to the engine.

use crate::FailResult;
use crate::filetypes::{Frame, XyzReader, ColvarWriter};

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use cvgraph_array_types::M33;
use cvgraph_engine::{build_graph, Engine, EngineOptions, GraphOptions, StepOutput, Storage, Threading};
use cvgraph_tasks_config::{self as config, Settings, ValidatedSettings};

#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    /// Step number given to the first frame. Set this when resuming from a checkpoint.
    pub first_step: u64,
    /// Write every stored value as JSON here after the last frame.
    pub dump: Option<PathBuf>,
}

pub struct Driver {
    settings: ValidatedSettings,
    options: DriverOptions,
    engine: Engine,
    colvar: Option<ColvarWriter<Box<dyn Write>>>,
    frames: u64,
}

impl Driver {
    /// Colvar rows go to `print.file`, or stdout when it is absent.
    pub fn new(settings: ValidatedSettings, natoms: usize, options: DriverOptions) -> FailResult<Self> {
        let out: Box<dyn Write> = match &settings.print.file {
            Some(path) => Box::new(cvgraph_fs_util::create_text(path)?),
            None => Box::new(std::io::stdout()),
        };
        Driver::with_output(settings, natoms, options, out)
    }

    pub fn with_output(
        settings: ValidatedSettings,
        natoms: usize,
        options: DriverOptions,
        out: Box<dyn Write>,
    ) -> FailResult<Self> {
        if let Some(expected) = settings.natoms {
            ensure!(expected == natoms, "config says {} atoms, but the trajectory has {}", expected, natoms);
        }

        let registry = cvgraph_actions::registry();
        let graph = build_graph(
            &registry,
            &settings.actions,
            natoms,
            &settings.print.args,
            GraphOptions { chaining: settings.chaining },
        )?;
        info!("{} actions in {} chains, {} atoms", graph.num_nodes(), graph.num_chains(), natoms);

        let threading = match settings.threading {
            config::Threading::Serial => Threading::Serial,
            config::Threading::Rayon => Threading::Rayon,
        };
        let mut engine = Engine::new(graph, EngineOptions { threading });
        if let Some(masses) = &settings.masses {
            engine.put_masses(masses)?;
        }
        if let Some(charges) = &settings.charges {
            engine.put_charges(charges)?;
        }
        if let Some(path) = &settings.checkpoint.read {
            info!("restoring stored values from '{}'", path);
            engine.read_checkpoint(cvgraph_fs_util::open_text(path)?)?;
        }

        let colvar = match settings.print.args.is_empty() {
            true => None,
            false => Some(ColvarWriter::new(out, &engine, &settings.print.args, settings.print.stride)?),
        };
        Ok(Driver { settings, options, engine, colvar, frames: 0 })
    }

    pub fn engine(&self) -> &Engine { &self.engine }

    pub fn frame(&mut self, frame: &Frame) -> FailResult<StepOutput> {
        let natoms = self.engine.graph().natoms();
        ensure!(
            frame.natoms() == natoms,
            "frame {} has {} atoms, expected {}", self.frames, frame.natoms(), natoms,
        );

        // a box in the config beats one in the trajectory
        let cell = match (self.settings.cell, frame.cell) {
            (Some(cell), _) => M33::from(cell),
            (None, Some(cell)) => cell,
            (None, None) => M33::zero(),
        };

        self.engine.set_step(self.options.first_step + self.frames);
        self.engine.put_positions(&frame.carts)?;
        self.engine.put_box(&cell)?;
        self.engine.put_energy(frame.energy.unwrap_or(0.0));
        let output = self.engine.calc()?;
        trace!("step {}: bias {}", self.engine.step(), output.bias);

        if let Some(colvar) = &mut self.colvar {
            colvar.frame(&self.engine)?;
        }
        self.frames += 1;
        Ok(output)
    }

    /// Flush the table and write the checkpoint and dump, if configured.
    pub fn finish(self) -> FailResult<()> {
        if let Some(colvar) = self.colvar {
            colvar.into_inner()?;
        }
        if let Some(path) = &self.settings.checkpoint.write {
            let mut file = cvgraph_fs_util::create_text(path)?;
            self.engine.write_checkpoint(&mut file)?;
            file.flush()?;
            info!("wrote checkpoint '{}'", path);
        }
        if let Some(path) = &self.options.dump {
            let dump = ValueDump {
                frames: self.frames,
                last_step: self.engine.step(),
                settings: &self.settings.0,
                values: self.engine.graph().values()
                    .filter(|value| value.storage() == Storage::Stored)
                    .map(|value| (value.name(), value.data()))
                    .collect(),
            };
            let file = cvgraph_fs_util::create_text(path)?;
            serde_json::to_writer_pretty(file, &dump)?;
        }
        info!("processed {} frames", self.frames);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ValueDump<'a> {
    frames: u64,
    last_step: u64,
    settings: &'a Settings,
    values: BTreeMap<&'a str, &'a [f64]>,
}

/// Run every frame of a trajectory.
///
/// The number of atoms comes from the config, or else from the first frame.
pub fn run_trajectory<R: BufRead>(
    settings: ValidatedSettings,
    mut frames: XyzReader<R>,
    options: DriverOptions,
) -> FailResult<()> {
    let first = match frames.next() {
        Some(frame) => frame?,
        None => bail!("the trajectory has no frames"),
    };
    let natoms = settings.natoms.unwrap_or(first.natoms());

    let mut driver = Driver::new(settings, natoms, options)?;
    driver.frame(&first)?;
    for frame in frames {
        driver.frame(&frame?)?;
    }
    driver.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    use cvgraph_fs_util::TempDir;
    use cvgraph_tasks_config::YamlRead;

    fn settings(yaml: &str) -> ValidatedSettings {
        Settings::from_reader(yaml.as_bytes()).unwrap().validate().unwrap()
    }

    /// Two atoms moving apart along x, in a 10 nm box given by the comment line.
    fn trajectory(xs: &[f64]) -> String {
        let mut out = String::new();
        for x in xs {
            out += &format!("2\n10 10 10\n A 0 0 0\n A {} 0 0\n", x);
        }
        out
    }

    fn run(yaml: &str, xs: &[f64], options: DriverOptions) {
        let text = trajectory(xs);
        run_trajectory(settings(yaml), XyzReader::new(text.as_bytes()), options).unwrap();
    }

    fn table(path: &std::path::Path) -> Vec<Vec<f64>> {
        cvgraph_fs_util::read_to_string(path).unwrap()
            .lines()
            .filter(|line| !line.starts_with('#'))
            .map(|line| line.split_whitespace().map(|x| x.parse().unwrap()).collect())
            .collect()
    }

    #[test]
    fn colvar_of_a_trajectory() {
        let dir = TempDir::new("cvgraph-driver").unwrap();
        let colvar = dir.path().join("COLVAR");
        let yaml = format!("
actions:
  - {{label: d, action: DISTANCE, atoms: [[0, 1]]}}
print:
  args: [d]
  file: {}
", colvar.display());

        // 7 is wrapped to 3 by the box
        run(&yaml, &[1.0, 2.0, 7.0], DriverOptions { first_step: 10, dump: None });
        assert_close!(table(&colvar), vec![
            vec![10.0, 1.0],
            vec![11.0, 2.0],
            vec![12.0, 3.0],
        ]);
    }

    #[test]
    fn config_box_overrides_the_trajectory() {
        let yaml = "
box: [[0, 0, 0], [0, 0, 0], [0, 0, 0]]
actions:
  - {label: d, action: DISTANCE, atoms: [[0, 1]]}
print: {args: [d]}
";
        let mut driver = Driver::with_output(settings(yaml), 2, DriverOptions::default(), Box::new(vec![])).unwrap();
        let text = trajectory(&[7.0]);
        let frame = XyzReader::new(text.as_bytes()).next().unwrap().unwrap();
        driver.frame(&frame).unwrap();
        assert_close!(driver.engine().value("d").unwrap().scalar(), 7.0);
    }

    #[test]
    fn restart_from_a_checkpoint() {
        let dir = TempDir::new("cvgraph-driver").unwrap();
        let checkpoint = dir.path().join("state.ckpt");
        let dump = dir.path().join("values.json");
        let yaml = |key: &str| format!("
actions:
  - {{label: d, action: DISTANCE, atoms: [[0, 1]]}}
  - {{label: avg, action: AVERAGE, arg: d}}
checkpoint:
  {}: {}
", key, checkpoint.display());

        run(&yaml("write"), &[1.0, 2.0, 3.0], DriverOptions::default());
        run(&yaml("read"), &[4.0, 5.0], DriverOptions {
            first_step: 3,
            dump: Some(dump.clone()),
        });

        let dump: serde_json::Value = serde_json::from_str(&cvgraph_fs_util::read_to_string(&dump).unwrap()).unwrap();
        assert_eq!(dump["frames"], serde_json::json!(2));
        assert_eq!(dump["last-step"], serde_json::json!(4));
        assert_eq!(dump["values"]["avg.count"], serde_json::json!([5.0]));
        assert_close!(dump["values"]["avg"][0].as_f64().unwrap(), 3.0);
    }

    #[test]
    fn atom_counts_must_agree() {
        let yaml = "
natoms: 3
actions:
  - {label: d, action: DISTANCE, atoms: [[0, 1]]}
";
        let text = trajectory(&[1.0]);
        assert!(run_trajectory(settings(yaml), XyzReader::new(text.as_bytes()), DriverOptions::default()).is_err());

        let mut driver = Driver::with_output(settings("actions: []"), 3, DriverOptions::default(), Box::new(vec![])).unwrap();
        let frame = XyzReader::new(text.as_bytes()).next().unwrap().unwrap();
        assert!(driver.frame(&frame).is_err());
    }

    #[test]
    fn empty_trajectory() {
        let err = run_trajectory(settings("actions: []"), XyzReader::new(&b""[..]), DriverOptions::default());
        assert!(err.is_err());
    }
}
