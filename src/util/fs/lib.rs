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

use std::path::{Path, PathBuf};
use std::fs::File;
use std::io::{self, BufReader, BufWriter};

pub use crate::tempdir::{ActualTempDir, TempDir};
mod tempdir;

#[macro_use]
extern crate log;

/// An io error that remembers what was being done to which path.
#[derive(Debug, thiserror::Error)]
#[error("{action} '{}'", path.display())]
pub struct FsError {
    action: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
}

pub type Result<T> = std::result::Result<T, FsError>;

fn context<T>(action: &'static str, path: &Path, result: io::Result<T>) -> Result<T>
{ result.map_err(|source| FsError { action, path: path.to_owned(), source }) }

/// Wrapper around `File::open` that adds context.
pub fn open<P: AsRef<Path>>(path: P) -> Result<File>
{ context("while opening file:", path.as_ref(), File::open(path.as_ref())) }

/// Wrapper around `File::open` that adds context and makes a `BufReader`.
pub fn open_text<P: AsRef<Path>>(path: P) -> Result<BufReader<File>>
{ open(path).map(BufReader::new) }

/// Wrapper around `File::create` that adds context.
pub fn create<P: AsRef<Path>>(path: P) -> Result<File>
{ context("could not create file:", path.as_ref(), File::create(path.as_ref())) }

/// Wrapper around `File::create` that adds context and makes a `BufWriter`.
pub fn create_text<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>>
{ create(path).map(BufWriter::new) }

/// Wrapper around `std::fs::read_to_string` that adds context.
pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String>
{ context("could not read file:", path.as_ref(), std::fs::read_to_string(path.as_ref())) }

/// Wrapper around `std::fs::write` that adds context.
pub fn write<P: AsRef<Path>>(path: P, contents: impl AsRef<[u8]>) -> Result<()>
{ context("could not write file:", path.as_ref(), std::fs::write(path.as_ref(), contents)) }
