use super::Pack;
use crate::error::PackResult;
use crate::io::{self, ReadExt};
use std::io::Write;

impl Pack {
    /// reconstructs the canonical text of the commit whose encoded payload
    /// begins at `offset`, into a buffer of exactly `size` bytes
    pub fn read_commit(&self, offset: u64, size: u64) -> PackResult<Vec<u8>> {
        trace!("read_commit(offset: {}, size: {})", offset, size);
        let size = size as usize;
        let mut reader = self.window(offset)?;
        let mut out = Vec::with_capacity(size);

        let tree = self.read_hashref(&mut reader)?;
        writeln!(out, "tree {}", tree)?;

        let parents = reader.read_varint()?;
        for _ in 0..parents {
            let parent = self.read_hashref(&mut reader)?;
            writeln!(out, "parent {}", parent)?;
        }

        let commit_time = reader.read_varint()?;
        let (committer_tz, committer) = split_ident(self.get_ident(&mut reader)?)?;

        // the author time is stored relative to the commit time; the low bit
        // says on which side of it
        let delta = reader.read_varint()?;
        let author_time = if delta & 1 != 0 {
            commit_time.checked_add(delta >> 1)
        } else {
            commit_time.checked_sub(delta >> 1)
        }
        .ok_or_else(|| anyhow!("author time delta `{}` out of range", delta))?;
        let (author_tz, author) = split_ident(self.get_ident(&mut reader)?)?;

        write!(out, "author ")?;
        out.extend_from_slice(author);
        writeln!(out, " {} {:+05}", author_time, author_tz)?;
        write!(out, "committer ")?;
        out.extend_from_slice(committer);
        writeln!(out, " {} {:+05}", commit_time, committer_tz)?;

        // whatever room is left belongs to the deflated message
        ensure!(
            out.len() <= size,
            "reconstructed commit header of {} bytes overflows declared size {}",
            out.len(),
            size
        );
        let (message, _) = io::inflate_exact(reader, size - out.len())?;
        out.extend_from_slice(&message);
        Ok(out)
    }
}

/// splits an identity record into its big-endian signed timezone prefix and the
/// identity string
fn split_ident(record: &[u8]) -> PackResult<(i16, &[u8])> {
    ensure!(record.len() >= 2, "identity record of {} bytes has no timezone", record.len());
    let tz = i16::from_be_bytes([record[0], record[1]]);
    Ok((tz, &record[2..]))
}
