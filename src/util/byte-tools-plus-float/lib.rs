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

//! byte-tools from crates.io, extended with little-endian float support and
//! a small cursor for reading length-prefixed binary records.

extern crate byte_tools;
pub use byte_tools::{read_u64_le, read_u64v_le, write_u64_le, write_u64v_le};

pub fn read_f64v_le(dst: &mut [f64], src: &[u8]) {
    let mut u64s = vec![0u64; dst.len()];
    read_u64v_le(&mut u64s, src);
    for (f, i) in dst.iter_mut().zip(u64s) {
        *f = f64::from_bits(i);
    }
}

pub fn write_f64v_le(dst: &mut [u8], src: &[f64]) {
    let u64s: Vec<u64> = src.iter().map(|f| f.to_bits()).collect();
    write_u64v_le(dst, &u64s);
}

/// Appends little-endian encoded data to a byte buffer.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    pub bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self { Self::default() }

    pub fn put_u64(&mut self, x: u64) {
        let start = self.grow(8);
        write_u64_le(&mut self.bytes[start..], x);
    }

    pub fn put_bytes(&mut self, data: &[u8])
    { self.bytes.extend_from_slice(data) }

    pub fn put_f64s(&mut self, data: &[f64]) {
        let start = self.grow(8 * data.len());
        write_f64v_le(&mut self.bytes[start..], data);
    }

    fn grow(&mut self, n: usize) -> usize {
        let start = self.bytes.len();
        self.bytes.resize(start + n, 0);
        start
    }
}

/// Reads little-endian encoded data from a byte slice.
///
/// Every method returns `None` when the input is too short.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    rest: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self { ByteReader { rest: bytes } }

    pub fn is_empty(&self) -> bool { self.rest.is_empty() }

    pub fn remaining(&self) -> usize { self.rest.len() }

    pub fn take_bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.rest.len() < n {
            return None;
        }
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        Some(head)
    }

    pub fn take_u64(&mut self) -> Option<u64>
    { self.take_bytes(8).map(read_u64_le) }

    pub fn take_f64s(&mut self, count: usize) -> Option<Vec<f64>> {
        let bytes = self.take_bytes(count.checked_mul(8)?)?;
        let mut out = vec![0.0; count];
        read_f64v_le(&mut out, bytes);
        Some(out)
    }
}
