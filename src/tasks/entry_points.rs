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

//! Entry points for the binaries. Each one is a thin shim in the root crate.

use crate::{FailResult, VersionInfo};
use crate::cmd::{run_trajectory, DriverOptions};
use crate::filetypes::XyzReader;
use crate::ui::cfg_merging::ConfigSources;
use crate::ui::cli_deserialize::{CliDeserialize, expect_value_of};
use crate::ui::logging::{init_global_logger, Verbosity};

use std::ffi::OsStr;
use std::path::PathBuf;

use clap::{App, AppSettings, Arg, SubCommand};

fn wrap_result_main<F>(main: F)
where F: FnOnce() -> FailResult<()>,
{
    main().unwrap_or_else(|e| {
        for cause in e.iter_chain() {
            error!("{}", cause);
        }

        if std::env::var_os("RUST_BACKTRACE") == Some(OsStr::new("1").to_owned()) {
            error!("{}", e.backtrace());
        } else {
            error!("\
                (If you found the above error message to be particularly lacking in \
                detail, try again with RUST_BACKTRACE=1)\
            ");
        }
        std::process::exit(1);
    });
}

struct LogArgs {
    verbosity: Verbosity,
    logfile: Option<PathBuf>,
}

impl CliDeserialize for LogArgs {
    fn _augment_clap_app<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        app.args(&[
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("log every chain of every step"),
            Arg::with_name("log")
                .long("log")
                .takes_value(true)
                .value_name("FILE")
                .help("also write the log to this file"),
        ])
    }

    fn _resolve_args(m: &clap::ArgMatches<'_>) -> FailResult<Self>
    { Ok(LogArgs {
        verbosity: Verbosity::from_occurrences(m.occurrences_of("verbose")),
        logfile: m.value_of("log").map(PathBuf::from),
    })}
}

struct RunArgs {
    sources: ConfigSources,
    trajectory: PathBuf,
    options: DriverOptions,
}

impl CliDeserialize for RunArgs {
    fn _augment_clap_app<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
        app.args(&[
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .required(true)
                .value_name("CONFIG")
                .help("\
                    config yaml, given as either a filepath or an embedded literal. \
                    When given multiple times, the configs are merged, preferring \
                    values from later arguments. \
                    \n\n\
                    Literals are written as '--config [NESTED_KEY]:VALID_YAML', \
                    where NESTED_KEY is an optional '.'-separated sequence of keys. \
                    (so `--config print.stride:10` is equivalent to \
                    `--config :{print: {stride: 10}}`) \
                    Anything containing a colon is taken to be a literal.\
                "),
            Arg::with_name("trajectory")
                .short("t")
                .long("trajectory")
                .takes_value(true)
                .required(true)
                .value_name("XYZ")
                .help("trajectory to analyze, as concatenated xyz frames"),
            Arg::with_name("first_step")
                .long("first-step")
                .takes_value(true)
                .value_name("N")
                .help("step number of the first frame [default: 0]"),
            Arg::with_name("dump")
                .long("dump")
                .takes_value(true)
                .value_name("JSON")
                .help("after the last frame, write every stored value to this file"),
        ])
    }

    fn _resolve_args(m: &clap::ArgMatches<'_>) -> FailResult<Self> {
        let configs: Vec<&str> = match m.values_of("config") {
            Some(values) => values.collect(),
            None => vec![],
        };
        let first_step = match m.value_of("first_step") {
            Some(s) => s.parse().map_err(|_| format_err!("--first-step: expected an integer, got '{}'", s))?,
            None => 0,
        };
        Ok(RunArgs {
            sources: ConfigSources::resolve_from_args(configs)?,
            trajectory: PathBuf::from(expect_value_of(m, "trajectory")?),
            options: DriverOptions {
                first_step,
                dump: m.value_of("dump").map(PathBuf::from),
            },
        })
    }
}

// %% CRATES: binary: cvgraph %%
pub fn cvgraph(version: VersionInfo) {
    wrap_result_main(|| {
        let long_version = format!("{} ({} {})", env!("CARGO_PKG_VERSION"), version.short_sha, version.commit_date);

        let (run, log_args) = LogArgs::augment_clap_app({
            SubCommand::with_name("run")
                .about("compute collective variables along a trajectory")
        });
        let (run, run_args) = RunArgs::augment_clap_app(run);

        let matches = App::new("cvgraph")
            .version(&long_version[..])
            .about("Collective variables as a dataflow graph")
            .setting(AppSettings::SubcommandRequiredElseHelp)
            .subcommand(run)
            .get_matches();

        let matches = match matches.subcommand() {
            ("run", Some(matches)) => matches,
            (other, _) => bail!("(BUG) unhandled subcommand '{}'", other),
        };

        let log = log_args.resolve_args(matches)?;
        init_global_logger(log.verbosity, log.logfile.as_ref().map(|path| path.as_path()))?;
        info!("cvgraph {}", long_version);

        let args = run_args.resolve_args(matches)?;
        debug!("config sources:\n{}", serde_yaml::to_string(&args.sources)?);

        let settings = args.sources.settings()?.validate()?;
        let frames = XyzReader::new(cvgraph_fs_util::open_text(&args.trajectory)?);
        run_trajectory(settings, frames, args.options)
    });
}
