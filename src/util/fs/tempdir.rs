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

pub use ::tempdir::TempDir as ActualTempDir;

use std::io::Result as IoResult;
use std::path::{Path, PathBuf};
use std::ffi::{OsStr, OsString};

/// Wrapper around `tempdir::TempDir` that does not destroy the directory on unwind.
///
/// Set `CVGRAPH_SAVETEMP` to a directory to have leaked directories moved there.
#[derive(Debug)]
pub struct TempDir(Option<ActualTempDir>);

impl From<ActualTempDir> for TempDir {
    fn from(tmp: ActualTempDir) -> Self { TempDir(Some(tmp)) }
}

impl TempDir {
    pub fn new(prefix: &str) -> IoResult<TempDir>
    { ActualTempDir::new(prefix).map(Self::from) }

    pub fn path(&self) -> &Path { self.inner().path() }
    pub fn into_path(mut self) -> PathBuf { self.take().into_path() }
    pub fn close(mut self) -> IoResult<()> { self.take().close() }

    fn inner(&self) -> &ActualTempDir {
        match &self.0 {
            Some(tmp) => tmp,
            None => panic!("(BUG) TempDir used after being taken"),
        }
    }

    fn take(&mut self) -> ActualTempDir {
        match self.0.take() {
            Some(tmp) => tmp,
            None => panic!("(BUG) TempDir taken twice"),
        }
    }
}

impl AsRef<Path> for TempDir {
    fn as_ref(&self) -> &Path { self.path() }
}

/// Leaks the inner TempDir if we are unwinding.
impl Drop for TempDir {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.recover();
        }
    }
}

impl TempDir {
    fn recover(&mut self) {
        let temp = match self.0.take() {
            Some(temp) => temp.into_path(),
            None => {
                error!("A TempDir was double-dropped during panic");
                return; // avoid double-panic
            },
        };

        let dest = match non_empty_env("CVGRAPH_SAVETEMP") {
            None => {
                info!("successfully leaked tempdir at {}", temp.display());
                return;
            },
            Some(dest) => PathBuf::from(dest),
        };
        let name = match temp.file_name() {
            None => return,
            Some(name) => name,
        };

        if let Err(e) = std::fs::create_dir(&dest) {
            if !dest.exists() {
                warn!("failed to create '{}' during panic: {}", dest.display(), e);
                return;
            }
        }

        let dest_file = dest.join(name);
        match std::fs::rename(&temp, &dest_file) {
            Err(e) => warn!("failed to move during panic: from '{}' to '{}': {}", temp.display(), dest_file.display(), e),
            Ok(()) => info!("recovered tempdir during panic: {}", dest_file.display()),
        }
    }
}

fn non_empty_env(key: impl AsRef<OsStr>) -> Option<OsString> {
    match std::env::var_os(key) {
        Some(ref s) if s.is_empty() => None,
        other => other,
    }
}
