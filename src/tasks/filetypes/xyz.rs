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

//! XYZ trajectories.
//!
//! A trajectory is a concatenation of frames:
//!
//! ```text
//! 3
//! Lattice="2.0 0 0 0 2.0 0 0 0 2.0" energy=-1.5
//!  O 0.0 0.0 0.0
//!  H 0.1 0.0 0.0
//!  H 0.0 0.1 0.0
//! ```
//!
//! The comment line may carry the box, either as an extended-XYZ `Lattice`
//! key (nine numbers, vectors as rows) or as a bare list of three or nine
//! numbers. An `energy` key is forwarded to the engine's energy slot.
//! Columns after the coordinates are ignored.

use crate::FailResult;

use std::io::{BufRead, Lines, Write};

use cvgraph_array_types::{V3, M33};

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub title: String,
    pub symbols: Vec<String>,
    pub carts: Vec<V3>,
    pub cell: Option<M33>,
    pub energy: Option<f64>,
}

impl Frame {
    pub fn natoms(&self) -> usize { self.carts.len() }

    /// Writes a frame. Calling this repeatedly on one writer makes a trajectory.
    pub fn to_writer(&self, mut w: impl Write) -> FailResult<()> {
        ensure!(!self.title.contains('\n') && !self.title.contains('\r'), "xyz title contains a line break");
        ensure!(self.symbols.len() == self.carts.len(), "(BUG) symbols and positions differ in length");

        writeln!(w, "{}", self.carts.len())?;
        writeln!(w, "{}", self.title)?;
        for (V3([x, y, z]), symbol) in self.carts.iter().zip(&self.symbols) {
            writeln!(w, " {:>2} {} {} {}", symbol, x, y, z)?;
        }
        Ok(())
    }
}

/// Reads frames one at a time.
pub struct XyzReader<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> XyzReader<R> {
    pub fn new(r: R) -> Self
    { XyzReader { lines: r.lines(), line_number: 0 } }

    fn next_line(&mut self) -> FailResult<Option<String>> {
        match self.lines.next() {
            None => Ok(None),
            Some(line) => {
                self.line_number += 1;
                Ok(Some(line?))
            },
        }
    }

    fn expect_line(&mut self, what: &str) -> FailResult<String> {
        match self.next_line()? {
            Some(line) => Ok(line),
            None => bail!("xyz: unexpected end of file while reading {}", what),
        }
    }

    fn read_frame(&mut self, count_line: &str) -> FailResult<Frame> {
        let natoms: usize = match count_line.trim().parse() {
            Ok(n) => n,
            Err(_) => bail!("xyz line {}: expected an atom count, got '{}'", self.line_number, count_line.trim()),
        };
        let title = self.expect_line("the comment line")?;
        let (cell, energy) = parse_title(&title)
            .map_err(|e| format_err!("xyz line {}: {}", self.line_number, e))?;

        let mut symbols = Vec::with_capacity(natoms);
        let mut carts = Vec::with_capacity(natoms);
        for _ in 0..natoms {
            let line = self.expect_line("atoms")?;
            let (symbol, cart) = parse_atom(&line)
                .map_err(|e| format_err!("xyz line {}: {}", self.line_number, e))?;
            symbols.push(symbol);
            carts.push(cart);
        }
        Ok(Frame { title, symbols, carts, cell, energy })
    }
}

impl<R: BufRead> Iterator for XyzReader<R> {
    type Item = FailResult<Frame>;

    fn next(&mut self) -> Option<FailResult<Frame>> {
        // blank lines between frames are tolerated
        loop {
            match self.next_line() {
                Err(e) => return Some(Err(e)),
                Ok(None) => return None,
                Ok(Some(ref line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => return Some(self.read_frame(&line)),
            }
        }
    }
}

fn parse_atom(line: &str) -> FailResult<(String, V3)> {
    let mut words = line.split_whitespace();
    let symbol = match words.next() {
        Some(symbol) => symbol.to_string(),
        None => bail!("expected an atom, got a blank line"),
    };
    let mut cart = V3::zero();
    for k in 0..3 {
        cart[k] = match words.next().map(str::parse::<f64>) {
            Some(Ok(x)) => x,
            _ => bail!("expected three coordinates after '{}'", symbol),
        };
    }
    Ok((symbol, cart))
}

fn parse_title(title: &str) -> FailResult<(Option<M33>, Option<f64>)> {
    let words = split_respecting_quotes(title);

    // a bare list of numbers
    let numbers: Vec<f64> = words.iter().filter_map(|w| w.parse().ok()).collect();
    if !words.is_empty() && numbers.len() == words.len() {
        let cell = match numbers.len() {
            3 => Some(M33::diag(&[numbers[0], numbers[1], numbers[2]])),
            9 => Some(M33::from_flat(&numbers)),
            _ => None,
        };
        return Ok((cell, None));
    }

    let mut cell = None;
    let mut energy = None;
    for word in &words {
        let eq = match word.find('=') {
            Some(eq) => eq,
            None => continue,
        };
        let (key, value) = (&word[..eq], word[eq + 1..].trim_matches('"'));
        match &key.to_lowercase()[..] {
            "lattice" => {
                let flat = value.split_whitespace()
                    .map(|x| x.parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| format_err!("could not parse Lattice=\"{}\"", value))?;
                ensure!(flat.len() == 9, "Lattice needs 9 numbers, got {}", flat.len());
                cell = Some(M33::from_flat(&flat));
            },
            "energy" => {
                energy = Some(value.parse::<f64>().map_err(|_| format_err!("could not parse energy={}", value))?);
            },
            _ => {},
        }
    }
    Ok((cell, energy))
}

/// Whitespace-separated words, where double quotes group words together.
fn split_respecting_quotes(s: &str) -> Vec<String> {
    let mut words = vec![];
    let mut current = String::new();
    let mut quoted = false;
    for c in s.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            },
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    words.push(std::mem::replace(&mut current, String::new()));
                }
            },
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
