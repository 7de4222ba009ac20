use super::Pack;
use crate::error::PackResult;
use crate::hash::{Oid, OID_SIZE};
use crate::io::ReadExt;
use crate::obj::ObjType;
use std::io::Write;

/// a copy range pointing (transitively) back at its own tree would otherwise
/// recurse forever; genuine source chains stay far below this
const MAX_COPY_DEPTH: usize = 64;

impl Pack {
    /// reconstructs the canonical binary form of the tree whose encoded payload
    /// begins at `offset`, into a buffer of exactly `size` bytes
    pub fn read_tree(&self, offset: u64, size: u64) -> PackResult<Vec<u8>> {
        trace!("read_tree(offset: {}, size: {})", offset, size);
        let size = size as usize;
        let mut out = Vec::with_capacity(size);
        let window = self.window(offset)?;
        let mut reader = window;
        let nb_entries = reader.read_varint()?;
        let offset = offset + (window.len() - reader.len()) as u64;
        self.decode_entries(&mut out, size, offset, 0, nb_entries, false, 0)?;
        ensure_eq!(
            out.len(),
            size,
            "reconstructed tree is {} bytes, expected exactly {}",
            out.len(),
            size
        );
        Ok(out)
    }

    /// re-emits the entries `[start, start + count)` of the tree whose records
    /// begin at `offset`
    ///
    /// `parse_header` is set on recursive calls only: the offset then points at
    /// a whole tree object whose header and entry-count framing must be skipped
    /// first. a nonzero `start` walks into the middle of that tree, consuming
    /// (but not emitting) records on the way
    fn decode_entries(
        &self,
        out: &mut Vec<u8>,
        capacity: usize,
        offset: u64,
        mut start: u64,
        mut count: u64,
        parse_header: bool,
        depth: usize,
    ) -> PackResult<()> {
        ensure!(depth <= MAX_COPY_DEPTH, "tree copy ranges nested deeper than {}", MAX_COPY_DEPTH);
        let mut offset = offset;
        let mut window = self.window(offset)?;
        let mut reader = window;

        if parse_header {
            // the header varint carries (size << 4) | type, the type tag living
            // in the low bits of its final byte
            let header = reader.read_varint()?;
            ensure_eq!(
                header & 0xf,
                ObjType::Tree as u64,
                "tree copy range points at a non-tree object"
            );
            let total = reader.read_varint()?;
            let wanted = start
                .checked_add(count)
                .ok_or_else(|| anyhow!("tree copy range length overflows"))?;
            ensure!(
                wanted <= total,
                "tree copy range [{}, {}) exceeds the source tree's {} entries",
                start,
                wanted,
                total
            );
        }

        // offset of the source object for copy ranges; set by a copy record
        // whose source-changed bit is set and reused by the ones that follow in
        // this frame
        let mut copy_source_offset: Option<u64> = None;

        while count > 0 {
            let what = reader.read_varint()?;
            if what & 1 == 0 {
                // inline entry: path-dictionary index plus hash reference
                // a skipped entry still has its hash reference traversed so the
                // cursor lands on the next record
                let oid = self.read_hashref(&mut reader)?;
                if start > 0 {
                    start -= 1;
                    continue;
                }
                let path = self.get_path(what >> 1)?;
                emit_entry(out, capacity, path, oid)?;
                count -= 1;
            } else {
                let copy_start = what >> 1;
                let copy_count_raw = reader.read_varint()?;
                ensure!(copy_count_raw != 0, "tree copy range of zero entries");
                if copy_count_raw & 1 != 0 {
                    // the source object changed: a varint object index, or a
                    // zero index followed by a literal hash to look up
                    let src_index = reader.read_varint()?;
                    let src_offset = if src_index == 0 {
                        let oid = reader.read_oid()?;
                        self.find_offset(oid)?
                    } else {
                        self.offset_of_index(src_index - 1)?
                    };
                    copy_source_offset = Some(src_offset);
                }
                let src_offset = copy_source_offset
                    .ok_or_else(|| anyhow!("tree copy range reuses a source object before any was set"))?;
                let copy_count = copy_count_raw >> 1;
                if start >= copy_count {
                    start -= copy_count;
                    continue;
                }
                let effective_count = (copy_count - start).min(count);
                let effective_start = copy_start
                    .checked_add(start)
                    .ok_or_else(|| anyhow!("tree copy range start overflows"))?;
                start = 0;
                count -= effective_count;
                // the recursion reads from another offset; rematerialize our
                // window at the current cursor afterwards instead of holding a
                // slice across the call
                let cursor = offset + (window.len() - reader.len()) as u64;
                self.decode_entries(
                    out,
                    capacity,
                    src_offset,
                    effective_start,
                    effective_count,
                    true,
                    depth + 1,
                )?;
                offset = cursor;
                window = self.window(offset)?;
                reader = window;
            }
        }
        Ok(())
    }
}

/// emits `<octal mode> <path>\0<20 raw hash bytes>` from a path-dictionary
/// record and a resolved hash
fn emit_entry(out: &mut Vec<u8>, capacity: usize, path: &[u8], oid: Oid) -> PackResult<()> {
    ensure!(path.len() >= 2, "path record of {} bytes has no mode", path.len());
    let mode = u16::from_be_bytes([path[0], path[1]]);
    write!(out, "{:o} ", mode)?;
    out.extend_from_slice(&path[2..]);
    out.push(0);
    out.extend_from_slice(oid.as_bytes());
    ensure!(
        out.len() <= capacity,
        "reconstructed tree overflows its declared size of {} bytes",
        capacity
    );
    Ok(())
}

/// iterator over the `(mode, path, oid)` records of a reconstructed tree buffer
pub struct TreeIter<'a> {
    bytes: &'a [u8],
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TreeEntry<'a> {
    pub mode: u32,
    pub path: &'a [u8],
    pub oid: Oid,
}

impl<'a> TreeIter<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn next_entry(&mut self) -> PackResult<TreeEntry<'a>> {
        let space = self
            .bytes
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| anyhow!("tree entry has no mode terminator"))?;
        let mode_str = std::str::from_utf8(&self.bytes[..space])?;
        let mode = u32::from_str_radix(mode_str, 8)?;
        let rest = &self.bytes[space + 1..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| anyhow!("tree entry has no path terminator"))?;
        let path = &rest[..nul];
        let rest = &rest[nul + 1..];
        ensure!(rest.len() >= OID_SIZE, "tree entry truncated before its hash");
        let mut oid_bytes = rest;
        let oid = oid_bytes.read_oid()?;
        self.bytes = &rest[OID_SIZE..];
        Ok(TreeEntry { mode, path, oid })
    }
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = PackResult<TreeEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes.is_empty() {
            return None;
        }
        match self.next_entry() {
            Ok(entry) => Some(Ok(entry)),
            Err(err) => {
                // don't loop forever on a corrupt buffer
                self.bytes = &[];
                Some(Err(err))
            }
        }
    }
}
