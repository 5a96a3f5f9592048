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

pub mod version {
    use cvgraph_tasks::VersionInfo;

    pub fn get() -> VersionInfo {
        VersionInfo {
            short_sha: env!("VERGEN_SHA_SHORT"),
            commit_date: env!("VERGEN_COMMIT_DATE"),
        }
    }
}
