use crate::error::PackResult;
use crate::hash::Oid;
use crate::io::{BufReadExt, BufReadExtSized, HashReader, ReadExt};
use crate::serialize::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

const PACK_IDX_MAGIC: u32 = 0xff744f63;
const FANOUT_ENTRYC: usize = 256;
/// maximum 31 bit number (the highest bit marks an offset stored in the
/// large-offset extension layer)
const MAX_OFFSET: u32 = 0x7fffffff;

/// the companion offset index of a pack: the sorted oid list and the pack
/// offset of each object, in oid order
#[derive(Debug)]
#[cfg_attr(test, derive(Clone, PartialEq))]
pub struct PackIndex {
    pub oids: Vec<Oid>,
    pub offsets: Vec<u64>,
    pub pack_hash: Oid,
}

impl PackIndex {
    pub fn open(path: impl AsRef<Path>) -> PackResult<Self> {
        Self::deserialize(&mut BufReader::new(File::open(path)?))
    }

    fn parse_header(mut reader: impl BufRead) -> PackResult<()> {
        let magic = reader.read_u32()?;
        ensure_eq!(magic, PACK_IDX_MAGIC, "invalid pack index signature");
        let version = reader.read_u32()?;
        ensure_eq!(version, 2);
        Ok(())
    }
}

impl Deserialize for PackIndex {
    fn deserialize(reader: &mut impl BufRead) -> PackResult<Self>
    where
        Self: Sized,
    {
        let mut r = HashReader::new_sha1(reader);
        Self::parse_header(&mut r)?;
        let mut fanout = [0u32; FANOUT_ENTRYC];
        for entry in fanout.iter_mut() {
            *entry = r.read_u32()?;
        }
        ensure!(fanout.windows(2).all(|w| w[0] <= w[1]), "pack index fanout is not monotonic");
        // the last value of the fanout table is the total number of oids as it is cumulative
        let n = fanout[FANOUT_ENTRYC - 1] as usize;
        let oids = r.read_vec::<Oid>(n)?;
        ensure!(oids.windows(2).all(|w| w[0] <= w[1]), "pack index oids are not sorted");

        // crc layer is present in the layout but nothing here consumes it
        let _crcs = r.read_vec::<u32>(n)?;

        let offsets32 = r.read_vec::<u32>(n)?;
        let ext_entryc = offsets32.iter().filter(|&&offset| offset > MAX_OFFSET).count();
        let mut ext_offsets = Vec::with_capacity(ext_entryc);
        for _ in 0..ext_entryc {
            ext_offsets.push(r.read_u64()?);
        }
        let offsets = offsets32
            .into_iter()
            .map(|offset| {
                if offset > MAX_OFFSET {
                    let ext_index = (offset & MAX_OFFSET) as usize;
                    ext_offsets
                        .get(ext_index)
                        .copied()
                        .ok_or_else(|| anyhow!("pack index extended offset `{}` is out of range", ext_index))
                } else {
                    Ok(offset as u64)
                }
            })
            .collect::<PackResult<Vec<u64>>>()?;

        let pack_hash = r.read_oid()?;
        let hash = r.finalize_sha1_hash();
        let idx_hash = r.read_oid()?;
        ensure_eq!(idx_hash, hash, "pack index checksum mismatch");
        ensure!(r.is_at_eof()?, "trailing bytes after pack index checksum");
        Ok(Self { oids, offsets, pack_hash })
    }
}
