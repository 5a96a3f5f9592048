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

/// A problem with how the graph was described.
#[derive(Debug, Fail)]
#[fail(display = "{}: {}", label, message)]
pub struct ConfigError {
    pub label: String,
    pub message: String,
}

/// A value left its domain during a calculation.
#[derive(Debug, Fail)]
#[fail(display = "{}: {}", label, message)]
pub struct NumericalError {
    pub label: String,
    pub message: String,
}

pub fn config_error(label: &str, message: impl ToString) -> failure::Error
{ ConfigError { label: label.to_string(), message: message.to_string() }.into() }

pub fn numerical_error(label: &str, message: impl ToString) -> failure::Error
{ NumericalError { label: label.to_string(), message: message.to_string() }.into() }
