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

use crate::FailResult;

use std::fmt;
use std::path::Path;
use std::time::Instant;

use ansi_term::Colour;
use log::{Level, LevelFilter};

/// How much the engine talks while looping.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity { Default, Loud }

impl Verbosity {
    /// Any count is accepted; the level saturates.
    pub fn from_occurrences(count: u64) -> Self {
        match count > 0 {
            true => Verbosity::Loud,
            false => Verbosity::Default,
        }
    }
}

/// Install the global logger.
///
/// Messages go to stderr, so that a colvar table on stdout stays clean,
/// and additionally to `logfile` if one is given.
pub fn init_global_logger(verbosity: Verbosity, logfile: Option<&Path>) -> FailResult<()>
{Ok({
    let start = Instant::now();
    let loop_level = match verbosity {
        Verbosity::Default => LevelFilter::Debug,
        Verbosity::Loud => LevelFilter::Trace,
    };

    let mut fern = fern::Dispatch::new()
        .format(move |out, message, record| {
            let t = start.elapsed();
            out.finish(format_args!("[{:>4}.{:03}s][{}][{}] {}",
                t.as_secs(),
                t.subsec_millis(),
                record.target(),
                ColorizedLevel(record.level()),
                message))
        })
        .level(LevelFilter::Info)
        .level_for("cvgraph_tasks", LevelFilter::Debug)
        .level_for("cvgraph_tasks_config", LevelFilter::Debug)
        .level_for("cvgraph_engine", loop_level)
        .level_for("cvgraph_actions", loop_level)
        .chain(std::io::stderr());

    if let Some(path) = logfile {
        fern = fern.chain(fern::log_file(path)?);
    }

    fern.apply()?;
})}

#[derive(Debug, Copy, Clone)]
pub struct ColorizedLevel(pub Level);
impl fmt::Display for ColorizedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let style = match self.0 {
            Level::Error => Colour::Red.bold(),
            Level::Warn  => Colour::Red.normal(),
            Level::Info  => Colour::Cyan.bold(),
            Level::Debug => Colour::Yellow.dimmed(),
            Level::Trace => Colour::Cyan.normal(),
        };
        write!(f, "{}", style.paint(self.0.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_saturates() {
        assert_eq!(Verbosity::from_occurrences(0), Verbosity::Default);
        assert_eq!(Verbosity::from_occurrences(1), Verbosity::Loud);
        assert_eq!(Verbosity::from_occurrences(7), Verbosity::Loud);
    }

    #[test]
    fn levels_keep_their_names() {
        let shown = ColorizedLevel(Level::Warn).to_string();
        assert!(shown.contains("WARN"), "{:?}", shown);
    }
}
