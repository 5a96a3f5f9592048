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

//! The driver side of cvgraph.
//!
//! This crate owns everything between the command line and the engine:
//! merging configs, reading trajectories, writing colvar tables,
//! checkpoints and logging.

#[macro_use] extern crate log;
#[macro_use] extern crate failure;
#[macro_use] extern crate serde_derive;
#[cfg(test)] #[macro_use] extern crate cvgraph_assert_close;
#[cfg(test)] #[macro_use] extern crate pretty_assertions;

pub type FailResult<T> = Result<T, failure::Error>;

mod ui {
    pub mod logging;
    pub mod cfg_merging;
    pub mod cli_deserialize;
}
mod filetypes;
mod cmd;

pub mod entry_points;

pub use crate::cmd::{Driver, DriverOptions};
pub use crate::filetypes::{Frame, XyzReader, ColvarWriter};
pub use crate::ui::cfg_merging::ConfigSources;

/// Build information, filled in by the binary crate.
#[derive(Debug, Copy, Clone)]
pub struct VersionInfo {
    pub short_sha: &'static str,
    pub commit_date: &'static str,
}
