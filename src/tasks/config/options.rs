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

//! Options of the individual actions.
//!
//! Each type is parsed out of an `ActionSettings` by the action that uses it.

use crate::FailResult;

use std::fmt;

use serde::de;

/// Names of argument values, written either as one name or as a list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Args(pub Vec<String>);

impl Args {
    /// The only argument, for actions that take exactly one.
    pub fn single(&self, label: &str) -> FailResult<&str> {
        match &self.0[..] {
            [name] => Ok(&name[..]),
            names => bail!("'{}' takes one argument, got {}", label, names.len()),
        }
    }
}

impl serde::Serialize for Args {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error>
    { self.0.serialize(serializer) }
}

// Manual impl, because #[derive(Deserialize)] on untagged enums discards
// all error messages.
impl<'de> serde::Deserialize<'de> for Args {
    fn deserialize<D: de::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MyVisitor;

        impl<'de> de::Visitor<'de> for MyVisitor {
            type Value = Args;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(formatter, "a value name or a list of value names")
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut out = vec![];
                while let Some(name) = seq.next_element()? {
                    out.push(name);
                }
                Ok(Args(out))
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E>
            { Ok(Args(vec![s.to_string()])) }
        }

        deserializer.deserialize_any(MyVisitor)
    }
}

/// A function that goes from 1 to 0 as a distance grows.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchSettings {
    /// `(1 - x^nn) / (1 - x^mm)` with `x = (r - d0) / r0`.
    #[serde(rename_all = "kebab-case")]
    Rational {
        r0: f64,
        #[serde(default)]
        d0: f64,
        #[serde(default = "_rational__nn")]
        nn: i32,
        /// 0 means `2 * nn`.
        #[serde(default)]
        mm: i32,
        /// Distance where the function is truncated to zero.
        #[serde(default)]
        d_max: Option<f64>,
    },
    /// Smooth quintic step from 1 at `start` to 0 at `end`.
    Poly5 {
        start: f64,
        end: f64,
    },
}

fn _rational__nn() -> i32 { 6 }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct NoOptions {}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ArgOptions {
    pub arg: Args,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DistanceOptions {
    pub atoms: Vec<[usize; 2]>,
    /// Also output the `x`, `y` and `z` components.
    #[serde(default)]
    pub components: bool,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct AngleOptions {
    /// The angle is taken at the middle atom.
    pub atoms: Vec<[usize; 3]>,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ContactMatrixOptions {
    pub group: Vec<usize>,
    /// Column atoms. Defaults to `group`.
    #[serde(default)]
    pub group_b: Option<Vec<usize>>,
    pub switch: SwitchSettings,
    /// Visit every column instead of using link cells.
    #[serde(default)]
    pub dense: bool,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DistanceMatrixOptions {
    pub group: Vec<usize>,
    #[serde(default)]
    pub group_b: Option<Vec<usize>>,
    pub cutoff: f64,
    #[serde(default)]
    pub dense: bool,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SwitchOptions {
    pub arg: Args,
    pub switch: SwitchSettings,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct BetweenOptions {
    pub arg: Args,
    pub lower: f64,
    pub upper: f64,
    /// Width of the gaussian, as a fraction of `upper - lower`.
    #[serde(default = "_between__smear")]
    pub smear: f64,
}

fn _between__smear() -> f64 { 0.5 }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ExtremumOptions {
    pub arg: Args,
    pub beta: f64,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CombineOptions {
    pub arg: Args,
    /// Defaults to all ones.
    #[serde(default)]
    pub coefficients: Option<Vec<f64>>,
    /// Defaults to all zeros.
    #[serde(default)]
    pub parameters: Option<Vec<f64>>,
    /// Defaults to all ones.
    #[serde(default)]
    pub powers: Option<Vec<f64>>,
    /// Domain `[min, max]` of a periodic result.
    #[serde(default)]
    pub periodic: Option<[f64; 2]>,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RestraintOptions {
    pub arg: Args,
    pub at: Vec<f64>,
    /// Harmonic force constants. Empty means zero.
    #[serde(default)]
    pub kappa: Vec<f64>,
    /// Linear force constants. Empty means zero.
    #[serde(default)]
    pub slope: Vec<f64>,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ConstantOptions {
    pub values: Vec<f64>,
    /// Lay the values out on a grid.
    #[serde(default)]
    pub grid: Option<GridSettings>,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct GridSettings {
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub bins: Vec<usize>,
    /// Defaults to non-periodic along every dimension.
    #[serde(default)]
    pub periodic: Vec<bool>,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Normalization {
    /// Sum of kernels.
    None,
    /// Divide by the number of data points.
    Ndata,
}

impl Default for Normalization {
    fn default() -> Self { Normalization::Ndata }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct HistogramOptions {
    /// One argument per grid dimension, all of the same length.
    pub arg: Args,
    /// Weight of each data point.
    #[serde(default)]
    pub heights: Option<String>,
    pub grid: GridSettings,
    /// Gaussian widths, one per dimension.
    pub bandwidth: Vec<f64>,
    #[serde(default)]
    pub normalization: Normalization,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ContourOptions {
    pub arg: Args,
    pub contour: f64,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ClusteringOptions {
    pub arg: Args,
    /// Matrix elements above this connect two atoms.
    #[serde(default)]
    pub threshold: f64,
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterWeightsOptions {
    pub arg: Args,
    /// Which cluster, counting from 1 for the largest.
    #[serde(default = "_cluster_weights__cluster")]
    pub cluster: usize,
}

fn _cluster_weights__cluster() -> usize { 1 }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RmsdType {
    Optimal,
    Simple,
    Drmsd,
}

impl Default for RmsdType {
    fn default() -> Self { RmsdType::Drmsd }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StrandStyle {
    All,
    Inter,
    Intra,
}

impl Default for StrandStyle {
    fn default() -> Self { StrandStyle::All }
}

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SecondaryStructureOptions {
    /// One list per protein chain, with the atoms N, CA, CB, C and O of each residue.
    pub backbone: Vec<Vec<usize>>,
    #[serde(default, rename = "type")]
    pub kind: RmsdType,
    /// DRMSD ignores reference pairs at most this far apart.
    #[serde(default = "_secondary_structure__bond_length")]
    pub bond_length: f64,
    /// Only evaluate beta-sheet windows whose strand centers are closer than this.
    #[serde(default)]
    pub strands_cutoff: Option<f64>,
    /// Shift the second strand to the periodic image nearest the first.
    #[serde(default)]
    pub align_strands: bool,
    /// Which strand pairs a beta sheet may be formed from.
    #[serde(default)]
    pub style: StrandStyle,
    /// Replacement for the built-in ideal structure (30 positions).
    #[serde(default)]
    pub reference: Option<Vec<[f64; 3]>>,
    /// Replacement for the second built-in structure of parallel sheets.
    #[serde(default)]
    pub reference_2: Option<Vec<[f64; 3]>>,
}

fn _secondary_structure__bond_length() -> f64 { 0.17 }

#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct AverageOptions {
    pub arg: Args,
    /// Accumulate every this many steps.
    #[serde(default = "_average__stride")]
    pub stride: u64,
}

fn _average__stride() -> u64 { 1 }
