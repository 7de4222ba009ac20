use super::Pack;
use crate::error::{PackError, PackResult};
use crate::io::{self, ReadExt};

/// minimum byte size of a dictionary: one empty-string record (2 prefix bytes + NUL)
const MIN_DICT_SIZE: u64 = 3;

/// a shared string table: an inflated buffer of records, each 2 domain-specific
/// prefix bytes followed by a NUL-terminated string, plus an index of record starts
///
/// for identities the prefix is a big-endian signed timezone, for paths the
/// big-endian file mode
pub struct Dictionary {
    data: Box<[u8]>,
    /// byte offset into `data` at which the i-th record starts
    entries: Vec<u32>,
}

impl Dictionary {
    /// loads the dictionary framed at `*offset` (varint uncompressed size, then
    /// a zlib stream) and advances `*offset` past the compressed bytes, which is
    /// where the next dictionary begins
    pub(crate) fn load(pack: &Pack, offset: &mut u64) -> PackResult<Self> {
        let window = pack.window(*offset)?;
        let mut reader = window;
        let size = reader.read_varint()?;
        ensure!(size >= MIN_DICT_SIZE, "dictionary of {} bytes is too small", size);
        ensure!(size <= u32::MAX as u64, "dictionary of {} bytes is too large", size);
        let (data, consumed) = io::inflate_exact(reader, size as usize)?;
        *offset += (window.len() - reader.len() + consumed) as u64;
        let entries = Self::index_entries(&data)?;
        debug!("loaded dictionary of {} entries ({} bytes)", entries.len(), size);
        Ok(Self { data: data.into_boxed_slice(), entries })
    }

    /// walks the inflated buffer recording each record's start
    /// the records must tile the buffer exactly
    fn index_entries(data: &[u8]) -> PackResult<Vec<u32>> {
        let mut entries = vec![];
        let mut pos = 0;
        while pos < data.len() {
            entries.push(pos as u32);
            ensure!(data.len() - pos > 2, "truncated dictionary record at offset {}", pos);
            let len = data[pos + 2..]
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| anyhow!("unterminated dictionary record at offset {}", pos))?;
            pos += 2 + len + 1;
        }
        Ok(entries)
    }

    /// record view: the 2 prefix bytes and the string, without the NUL terminator
    pub fn entry(&self, index: u64) -> PackResult<&[u8]> {
        if index >= self.entries.len() as u64 {
            return Err(anyhow!(PackError::DictIndexOutOfBounds(
                index,
                self.entries.len() as u64
            )));
        }
        let start = self.entries[index as usize] as usize;
        let end = match self.entries.get(index as usize + 1) {
            Some(&next) => next as usize - 1,
            None => self.data.len() - 1,
        };
        Ok(&self.data[start..end])
    }
}
