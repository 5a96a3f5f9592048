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

/// A group of command line arguments that knows how to declare and read itself.
pub trait CliDeserialize: Sized {
    fn augment_clap_app<'a, 'b>(app: clap::App<'a, 'b>) -> (clap::App<'a, 'b>, ClapDeserializer<Self>)
    { (Self::_augment_clap_app(app), ClapDeserializer(Default::default())) }

    /// Call `augment_clap_app` instead.
    fn _augment_clap_app<'a, 'b>(app: clap::App<'a, 'b>) -> clap::App<'a, 'b>;
    /// Call `resolve_args` on the `ClapDeserializer` instead.
    fn _resolve_args(matches: &clap::ArgMatches<'_>) -> FailResult<Self>;
}

/// Token showing that an app was augmented with the arguments of `A`.
pub struct ClapDeserializer<A>(std::marker::PhantomData<A>);

impl<A: CliDeserialize> ClapDeserializer<A> {
    /// This may read files named by the arguments.
    pub fn resolve_args(self, matches: &clap::ArgMatches<'_>) -> FailResult<A>
    { A::_resolve_args(matches) }
}

/// Get an argument that clap has already checked for.
pub(crate) fn expect_value_of<'m>(matches: &'m clap::ArgMatches<'_>, name: &str) -> FailResult<&'m str> {
    match matches.value_of(name) {
        Some(value) => Ok(value),
        None => bail!("(BUG) missing required argument '{}'", name),
    }
}
