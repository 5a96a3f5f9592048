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

//! Binary snapshots of stored values.
//!
//! Layout, all integers as little-endian `u64`:
//!
//! * the magic bytes `CVGCKPT1`
//! * the number of records
//! * per record: name length, UTF-8 name, element count, elements as `f64`
//!
//! Every stored value that is not fed by the host is written, in graph order.

use std::io::{Read, Write};

use cvgraph_byte_tools_plus_float::{ByteReader, ByteWriter};

use crate::FailResult;
use crate::graph::ActionGraph;
use crate::value::{OutputMode, Storage};

const MAGIC: &[u8; 8] = b"CVGCKPT1";

fn checkpointed(graph: &ActionGraph) -> impl Iterator<Item=crate::ValueId> + '_ {
    graph.values.indices()
        .filter(move |&id| !graph.is_put(id))
        .filter(move |&id| graph.values[id].storage == Storage::Stored)
}

pub fn write<W: Write>(mut w: W, graph: &ActionGraph) -> FailResult<()> {
    let ids: Vec<_> = checkpointed(graph).collect();

    let mut out = ByteWriter::new();
    out.put_bytes(MAGIC);
    out.put_u64(ids.len() as u64);
    for id in ids {
        let value = &graph.values[id];
        out.put_u64(value.name.len() as u64);
        out.put_bytes(value.name.as_bytes());
        out.put_u64(value.data.len() as u64);
        out.put_f64s(&value.data);
    }
    w.write_all(&out.bytes)?;
    Ok(())
}

pub fn read<R: Read>(mut r: R, graph: &mut ActionGraph) -> FailResult<()> {
    let mut bytes = vec![];
    r.read_to_end(&mut bytes)?;
    let mut input = ByteReader::new(&bytes);

    macro_rules! take {
        ($e:expr) => {
            match $e {
                Some(x) => x,
                None => bail!("checkpoint is truncated"),
            }
        };
    }

    ensure!(take!(input.take_bytes(MAGIC.len())) == &MAGIC[..], "not a checkpoint file");
    let ids: Vec<_> = checkpointed(graph).collect();
    let count = take!(input.take_u64()) as usize;
    ensure!(
        count == ids.len(),
        "checkpoint has {} values, but the graph stores {}", count, ids.len(),
    );

    for id in ids {
        let name_len = take!(input.take_u64()) as usize;
        let name = std::str::from_utf8(take!(input.take_bytes(name_len)))?;
        let len = take!(input.take_u64()) as usize;
        let data = take!(input.take_f64s(len));

        let value = &mut graph.values[id];
        ensure!(
            name == value.name,
            "checkpoint has '{}' where the graph expects '{}'", name, value.name,
        );
        match value.mode {
            OutputMode::Compacted => value.resize(len),
            _ => ensure!(
                len == value.len(),
                "checkpoint has {} elements for '{}', expected {}", len, name, value.len(),
            ),
        }
        value.data = data;
    }
    ensure!(input.is_empty(), "trailing data after checkpoint ({} bytes)", input.remaining());
    Ok(())
}
