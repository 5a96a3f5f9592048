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

//! Distance of residue windows from ideal secondary structure elements.
//!
//! A protein chain is given as a list of backbone atoms, five per residue
//! (N, CA, CB, C, O). Each task compares one window of 30 atoms against an
//! ideal reference: six consecutive residues for helices, or two strands of
//! three residues for sheets.

use crate::FailResult;
use crate::check_atoms;
use crate::distance::per_task_shape;

use cvgraph_array_types::V3;
use cvgraph_engine::{Action, TaskSpace, StepContext, TaskContext, NodeBuilder, ValueId, ValueSpec, OutputMode};
use cvgraph_engine::numerical_error;
use cvgraph_structure::{Pbc, RmsdKind, RmsdReference};
use cvgraph_tasks_config::{ActionSettings, SecondaryStructureOptions, RmsdType, StrandStyle};

const ATOMS_PER_RESIDUE: usize = 5;
const WINDOW_ATOMS: usize = 30;
const HELIX_RESIDUES: usize = 6;
const STRAND_RESIDUES: usize = 3;
/// Residues that must separate two strands taken from the same chain.
const MIN_STRAND_GAP: usize = 2;
/// The central CA of each strand.
const STRAND_MARKERS: (usize, usize) = (6, 21);

// ideal alpha helix, in nm
const HELIX: [[f64; 3]; WINDOW_ATOMS] = [
    [0.0733, 0.0519, 0.5298], [0.1763, 0.0810, 0.4301], [0.3166, 0.0543, 0.4881],
    [0.1527, -0.0045, 0.3053], [0.1646, 0.0436, 0.1928],
    [0.1180, -0.1312, 0.3254], [0.0924, -0.2203, 0.2126], [0.0650, -0.3626, 0.2626],
    [-0.0239, -0.1711, 0.1261], [-0.0190, -0.1815, 0.0032],
    [-0.1280, -0.1172, 0.1891], [-0.2416, -0.0661, 0.1127], [-0.3548, -0.0217, 0.2056],
    [-0.1964, 0.0529, 0.0276], [-0.2364, 0.0610, -0.0892],
    [-0.1130, 0.1465, 0.0750], [-0.0647, 0.2654, 0.0025], [0.0000, 0.3640, 0.0997],
    [0.0330, 0.2285, -0.1080], [0.0280, 0.2872, -0.2160],
    [0.1240, 0.1370, -0.0773], [0.2243, 0.0969, -0.1729], [0.3378, 0.0100, -0.1186],
    [0.1577, 0.0151, -0.2838], [0.1800, 0.0378, -0.4031],
    [0.0773, -0.0863, -0.2496], [0.0091, -0.1644, -0.3529], [-0.0418, -0.2935, -0.2923],
    [-0.1051, -0.0828, -0.4081], [-0.1459, -0.1073, -0.5213],
];

// one extended strand of three residues, in nm
const STRAND: [[f64; 3]; WINDOW_ATOMS / 2] = [
    [0.2263, -0.3795, 0.1722], [0.2493, -0.2426, 0.2263], [0.3847, -0.1838, 0.1761],
    [0.1301, -0.1517, 0.1921], [0.0852, -0.1504, 0.0739],
    [0.0818, -0.0738, 0.2917], [-0.0299, 0.0243, 0.2748], [-0.1421, -0.0076, 0.3757],
    [0.0273, 0.1700, 0.2929], [0.0902, 0.1969, 0.3963],
    [0.0120, 0.2594, 0.1921], [0.0687, 0.3956, 0.2014], [-0.0362, 0.5002, 0.1608],
    [0.1981, 0.4181, 0.1264], [0.2096, 0.3807, 0.0097],
];

lazy_static! {
    static ref ALPHA: Vec<V3> = HELIX.iter().map(|&p| V3(p)).collect();
    // the partner strand runs the other way, 0.48 nm away
    static ref ANTIBETA: Vec<V3> = sheet(|p| V3([p[0], -p[1], 0.0696 - p[2]]));
    // two registers of a parallel partner
    static ref PARABETA: [Vec<V3>; 2] = [
        sheet(|p| V3([p[0], p[1], p[2] - 0.48])),
        sheet(|p| V3([p[0] + 0.05, p[1] + 0.12, p[2] - 0.48])),
    ];
}

fn sheet(partner: impl Fn(V3) -> V3) -> Vec<V3> {
    let first = STRAND.iter().map(|&p| V3(p));
    let second = STRAND.iter().map(|&p| partner(V3(p)));
    first.chain(second).collect()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SecondaryKind {
    Alpha,
    AntiBeta,
    ParaBeta,
}

impl SecondaryKind {
    pub fn action_name(self) -> &'static str {
        match self {
            SecondaryKind::Alpha => "ALPHARMSD",
            SecondaryKind::AntiBeta => "ANTIBETARMSD",
            SecondaryKind::ParaBeta => "PARABETARMSD",
        }
    }

    pub fn is_sheet(self) -> bool { self != SecondaryKind::Alpha }

    /// The built-in ideal structures.
    pub fn ideal_references(self) -> Vec<&'static [V3]> {
        match self {
            SecondaryKind::Alpha => vec![&ALPHA[..]],
            SecondaryKind::AntiBeta => vec![&ANTIBETA[..]],
            SecondaryKind::ParaBeta => vec![&PARABETA[0][..], &PARABETA[1][..]],
        }
    }
}

pub(crate) struct SecondaryStructure {
    label: String,
    kind: SecondaryKind,
    windows: Vec<Vec<usize>>,
    references: Vec<RmsdReference>,
    whole: Reconstruction,
    strands_cutoff_sq: Option<f64>,
    out: Vec<ValueId>,
}

/// How a window is made whole before it is compared against the reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Reconstruction {
    /// Pair distances use the minimum image anyway.
    None,
    /// Each atom is placed at the image nearest the one before it.
    Successive,
    /// The second strand is moved as a rigid body to sit near the first.
    ShiftStrand,
}

pub(crate) fn build_alpha(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>>
{ build(nb, settings, SecondaryKind::Alpha) }

pub(crate) fn build_antibeta(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>>
{ build(nb, settings, SecondaryKind::AntiBeta) }

pub(crate) fn build_parabeta(nb: &mut NodeBuilder<'_>, settings: &ActionSettings) -> FailResult<Box<dyn Action>>
{ build(nb, settings, SecondaryKind::ParaBeta) }

fn build(nb: &mut NodeBuilder<'_>, settings: &ActionSettings, kind: SecondaryKind) -> FailResult<Box<dyn Action>> {
    let SecondaryStructureOptions {
        backbone, kind: rmsd_type, bond_length, strands_cutoff,
        align_strands, style, reference, reference_2,
    } = settings.parse_options()?;

    check_atoms(nb, backbone.iter().flat_map(|chain| chain.iter()))?;
    let windows = windows(kind, &backbone, style).map_err(|e| nb.error(e))?;

    if !kind.is_sheet() && (strands_cutoff.is_some() || align_strands) {
        return Err(nb.error("strand options only apply to beta sheets"));
    }
    let strands_cutoff_sq = match strands_cutoff {
        Some(c) if c <= 0.0 => return Err(nb.error("strands-cutoff must be positive")),
        c => c.map(|c| c * c),
    };

    let rmsd_kind = match rmsd_type {
        RmsdType::Optimal => RmsdKind::Optimal,
        RmsdType::Simple => RmsdKind::Simple,
        RmsdType::Drmsd => RmsdKind::Drmsd,
    };
    let whole = match (rmsd_kind, align_strands) {
        (RmsdKind::Drmsd, _) => Reconstruction::None,
        (_, true) => Reconstruction::ShiftStrand,
        (_, false) => Reconstruction::Successive,
    };

    let mut structures: Vec<Vec<V3>> = kind.ideal_references().into_iter().map(|r| r.to_vec()).collect();
    let custom = vec![reference, reference_2];
    if custom[structures.len()..].iter().any(|r| r.is_some()) {
        return Err(nb.error(format!("{} takes a single reference structure", kind.action_name())));
    }
    for (slot, custom) in structures.iter_mut().zip(custom) {
        if let Some(custom) = custom {
            if custom.len() != WINDOW_ATOMS {
                return Err(nb.error(format!(
                    "reference structure has {} atoms, expected {}", custom.len(), WINDOW_ATOMS,
                )));
            }
            *slot = custom.into_iter().map(V3).collect();
        }
    }
    let references = structures.into_iter()
        .map(|s| RmsdReference::new(rmsd_kind, s, bond_length))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| nb.error(e))?;

    let spec = ValueSpec::new(per_task_shape(windows.len()), OutputMode::PerTask);
    let out = match references.len() {
        1 => vec![nb.output(spec)?],
        n => (1..=n)
            .map(|i| nb.component(&format!("struct-{}", i), spec.clone()))
            .collect::<FailResult<_>>()?,
    };

    info!(
        "{}: {} {} windows, compared by {:?}",
        nb.label(), windows.len(), kind.action_name(), rmsd_kind,
    );
    Ok(Box::new(SecondaryStructure {
        label: nb.label().to_string(),
        kind, windows, references, whole, strands_cutoff_sq, out,
    }))
}

/// The atoms of every window, in reference order.
pub(crate) fn windows(kind: SecondaryKind, chains: &[Vec<usize>], style: StrandStyle) -> FailResult<Vec<Vec<usize>>> {
    ensure!(!chains.is_empty(), "no backbone atoms given");
    let min_residues = match kind.is_sheet() {
        true => STRAND_RESIDUES,
        false => HELIX_RESIDUES,
    };
    let mut residues = vec![];
    for (i, chain) in chains.iter().enumerate() {
        ensure!(
            chain.len() % ATOMS_PER_RESIDUE == 0,
            "chain {} has {} backbone atoms, which is not a multiple of {}",
            i, chain.len(), ATOMS_PER_RESIDUE,
        );
        let nres = chain.len() / ATOMS_PER_RESIDUE;
        ensure!(
            nres >= min_residues,
            "chain {} has {} residues, but {} needs at least {}",
            i, nres, kind.action_name(), min_residues,
        );
        residues.push(nres);
    }

    let span = |chain: usize, start: usize, len: usize| {
        &chains[chain][start * ATOMS_PER_RESIDUE..(start + len) * ATOMS_PER_RESIDUE]
    };
    let mut out = vec![];
    if !kind.is_sheet() {
        for (c, &nres) in residues.iter().enumerate() {
            for start in 0..=nres - HELIX_RESIDUES {
                out.push(span(c, start, HELIX_RESIDUES).to_vec());
            }
        }
        return Ok(out);
    }

    let strand_pair = |c1, s1, c2, s2| {
        let mut atoms = span(c1, s1, STRAND_RESIDUES).to_vec();
        atoms.extend_from_slice(span(c2, s2, STRAND_RESIDUES));
        atoms
    };
    if style != StrandStyle::Inter {
        for (c, &nres) in residues.iter().enumerate() {
            for s1 in 0..=nres - STRAND_RESIDUES {
                for s2 in s1 + STRAND_RESIDUES + MIN_STRAND_GAP..=nres - STRAND_RESIDUES {
                    out.push(strand_pair(c, s1, c, s2));
                }
            }
        }
    }
    if style != StrandStyle::Intra {
        for (c1, &nres1) in residues.iter().enumerate() {
            for (c2, &nres2) in residues.iter().enumerate().skip(c1 + 1) {
                for s1 in 0..=nres1 - STRAND_RESIDUES {
                    for s2 in 0..=nres2 - STRAND_RESIDUES {
                        out.push(strand_pair(c1, s1, c2, s2));
                    }
                }
            }
        }
    }
    ensure!(!out.is_empty(), "the chains are too short to hold two strands");
    Ok(out)
}

/// Undo periodic wrapping within a window.
fn make_whole(pbc: &Pbc, how: Reconstruction, pos: &mut [V3]) {
    match how {
        Reconstruction::None => {},
        Reconstruction::Successive => {
            for i in 1..pos.len() {
                let next = pos[i - 1] + pbc.distance(pos[i - 1], pos[i]);
                pos[i] = next;
            }
        },
        Reconstruction::ShiftStrand => {
            let (a, b) = STRAND_MARKERS;
            let shift = pos[a] + pbc.distance(pos[a], pos[b]) - pos[b];
            for p in &mut pos[WINDOW_ATOMS / 2..] {
                *p += shift;
            }
        },
    }
}

impl Action for SecondaryStructure {
    fn kind(&self) -> &'static str { self.kind.action_name() }

    fn task_space(&self) -> TaskSpace { TaskSpace::Elements(self.windows.len()) }

    fn uses_atoms(&self) -> bool { true }

    fn select_tasks(&self, ctx: &StepContext<'_>, flags: &mut [bool]) -> FailResult<bool> {
        let cutoff_sq = match self.strands_cutoff_sq {
            Some(c) => c,
            None => return Ok(false),
        };
        let pos = ctx.positions();
        let (a, b) = STRAND_MARKERS;
        for (flag, window) in flags.iter_mut().zip(&self.windows) {
            if ctx.pbc().distance(pos[window[a]], pos[window[b]]).sqnorm() < cutoff_sq {
                *flag = true;
            }
        }
        Ok(true)
    }

    fn perform_task(&self, ctx: &mut TaskContext<'_>) -> FailResult<()> {
        let window = &self.windows[ctx.task_index()];
        let all = ctx.positions();
        let mut pos: Vec<V3> = window.iter().map(|&atom| all[atom]).collect();
        make_whole(ctx.pbc(), self.whole, &mut pos);

        for (reference, &out) in self.references.iter().zip(&self.out) {
            let rmsd = reference.calc(ctx.pbc(), &pos).map_err(|e| numerical_error(&self.label, e))?;
            ctx.set_value(out, rmsd.value);
            for (&atom, &d) in window.iter().zip(&rmsd.derivatives) {
                ctx.add_atom_derivative(out, atom, d);
            }
            ctx.add_box_derivative(out, &rmsd.box_derivative);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvgraph_array_types::M33;

    fn chain(first: usize, nres: usize) -> Vec<usize> {
        (first..first + nres * ATOMS_PER_RESIDUE).collect()
    }

    #[test]
    fn helix_windows_slide_by_one_residue() {
        let w = windows(SecondaryKind::Alpha, &[chain(0, 8)], StrandStyle::All).unwrap();
        assert_eq!(w.len(), 3);
        assert_eq!(w[1][0], 5);
        assert_eq!(w[2].len(), WINDOW_ATOMS);
        assert_eq!(w[2][WINDOW_ATOMS - 1], 39);
    }

    #[test]
    fn sheet_windows() {
        // in a chain of 10 residues, the second strand starts at least 5 after the first
        let intra = windows(SecondaryKind::AntiBeta, &[chain(0, 10)], StrandStyle::All).unwrap();
        assert_eq!(intra.len(), 3 + 2 + 1);
        assert_eq!(intra[0][15], 25);

        let chains = [chain(0, 3), chain(15, 4)];
        let inter = windows(SecondaryKind::ParaBeta, &chains, StrandStyle::Inter).unwrap();
        assert_eq!(inter.len(), 2);
        assert_eq!(inter[1][15], 20);
        assert!(windows(SecondaryKind::ParaBeta, &chains, StrandStyle::Intra).is_err());
    }

    #[test]
    fn short_chains_are_rejected() {
        assert!(windows(SecondaryKind::Alpha, &[chain(0, 5)], StrandStyle::All).is_err());
        assert!(windows(SecondaryKind::AntiBeta, &[chain(0, 2)], StrandStyle::All).is_err());
        assert!(windows(SecondaryKind::Alpha, &[vec![0, 1, 2]], StrandStyle::All).is_err());
    }

    #[test]
    fn ideal_structures_have_a_full_window() {
        for &kind in &[SecondaryKind::Alpha, SecondaryKind::AntiBeta, SecondaryKind::ParaBeta] {
            for reference in kind.ideal_references() {
                assert_eq!(reference.len(), WINDOW_ATOMS);
            }
        }
        let (a, b) = STRAND_MARKERS;
        assert_close!(abs=1e-3, (ANTIBETA[a] - ANTIBETA[b]).norm(), 0.4825);
        assert_close!(abs=1e-12, (PARABETA[0][a] - PARABETA[0][b]).norm(), 0.48);
    }

    #[test]
    fn wrapped_windows_are_made_whole() {
        let pbc = Pbc::new(&(M33::eye() * 2.0)).unwrap();
        let whole: Vec<V3> = ANTIBETA.iter().map(|&p| p + V3([0.9, 0.9, 0.9])).collect();
        let wrapped: Vec<V3> = whole.iter().map(|&p| p.map(|x| x % 2.0)).collect();

        let mut successive = wrapped.clone();
        make_whole(&pbc, Reconstruction::Successive, &mut successive);
        for (a, b) in successive.iter().zip(&whole) {
            assert_close!(abs=1e-12, *a - successive[0], *b - whole[0]);
        }

        // only the relative placement of the strands is fixed
        let mut shifted = whole.clone();
        for p in &mut shifted[15..] {
            *p += V3([2.0, 0.0, -2.0]);
        }
        make_whole(&pbc, Reconstruction::ShiftStrand, &mut shifted);
        assert_close!(abs=1e-12, shifted, whole);
    }
}
