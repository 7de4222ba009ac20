mod commit;
mod dict;
mod index;
mod tree;

pub use self::dict::Dictionary;
pub use self::index::PackIndex;
pub use self::tree::{TreeEntry, TreeIter};

use crate::error::{PackError, PackResult};
use crate::hash::{Oid, OID_SIZE};
use crate::io::{self, ReadExt};
use crate::obj::{ObjHeader, ObjType};
use filebuffer::FileBuffer;
use std::cmp::Ordering;
use std::io::Read;
use std::ops::Deref;
use std::path::Path;
use std::sync::OnceLock;

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 4;
/// 4 byte signature, 4 byte version, 4 byte object count
pub const PACK_HEADER_SIZE: u64 = 12;
pub const PACK_EXT: &str = "pack";
pub const PACK_IDX_EXT: &str = "idx";

enum PackBuf {
    Mapped(FileBuffer),
    Bytes(Vec<u8>),
}

impl Deref for PackBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            PackBuf::Mapped(buf) => buf,
            PackBuf::Bytes(bytes) => bytes,
        }
    }
}

/// the identity dictionary together with the offset one past its compressed
/// form, which is where the path dictionary begins
struct IdentDict {
    dict: Dictionary,
    end: u64,
}

pub struct Pack {
    data: PackBuf,
    num_objects: u32,
    /// byte offset of the i-th packed object, parallel to the sorted hash table
    offsets: Vec<u64>,
    ident_dict: OnceLock<Result<IdentDict, PackError>>,
    path_dict: OnceLock<Result<Dictionary, PackError>>,
}

impl Pack {
    pub fn open(pack: impl AsRef<Path>, idx: impl AsRef<Path>) -> PackResult<Self> {
        let index = PackIndex::open(idx)?;
        let this = Self::with_offsets(PackBuf::Mapped(FileBuffer::open(pack)?), index.offsets)?;
        // the index must describe this pack: its sorted oid list is exactly the in-pack hash table
        ensure_eq!(
            index.oids.len(),
            this.num_objects as usize,
            "pack index has {} entries, pack has {} objects",
            index.oids.len(),
            this.num_objects
        );
        for (i, &oid) in index.oids.iter().enumerate() {
            ensure_eq!(this.oid_at(i as u32)?, oid, "pack index does not match pack hash table");
        }
        Ok(this)
    }

    /// a pack handle over an in-memory pack image and an externally supplied offset table
    pub fn from_bytes(bytes: Vec<u8>, offsets: Vec<u64>) -> PackResult<Self> {
        Self::with_offsets(PackBuf::Bytes(bytes), offsets)
    }

    fn with_offsets(data: PackBuf, offsets: Vec<u64>) -> PackResult<Self> {
        let num_objects = Self::parse_header(&data)?;
        ensure!(
            PACK_HEADER_SIZE + num_objects as u64 * OID_SIZE as u64 <= data.len() as u64,
            "pack too short for a hash table of {} entries",
            num_objects
        );
        ensure_eq!(
            offsets.len(),
            num_objects as usize,
            "offset table has {} entries, pack has {} objects",
            offsets.len(),
            num_objects
        );
        let this = Self {
            data,
            num_objects,
            offsets,
            ident_dict: OnceLock::new(),
            path_dict: OnceLock::new(),
        };
        let table = this.hash_table();
        let mut pairs = table.chunks_exact(OID_SIZE).zip(table.chunks_exact(OID_SIZE).skip(1));
        ensure!(pairs.all(|(a, b)| a <= b), "pack hash table is not sorted");
        Ok(this)
    }

    fn parse_header(data: &[u8]) -> PackResult<u32> {
        ensure!(
            data.len() as u64 >= PACK_HEADER_SIZE,
            "pack shorter than its {} byte header",
            PACK_HEADER_SIZE
        );
        let mut reader = data;
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        ensure_eq!(&sig, PACK_SIGNATURE, "invalid pack signature");
        let version = reader.read_u32()?;
        ensure_eq!(version, PACK_VERSION, "unsupported pack version `{}`", version);
        Ok(reader.read_u32()?)
    }

    #[inline]
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    fn hash_table(&self) -> &[u8] {
        let start = PACK_HEADER_SIZE as usize;
        &self.data[start..start + self.num_objects as usize * OID_SIZE]
    }

    /// hash of the i-th (zero-based) entry of the sorted hash table
    pub fn oid_at(&self, index: u32) -> PackResult<Oid> {
        if index >= self.num_objects {
            return Err(anyhow!(PackError::InvalidObjectIndex(index as u64)));
        }
        let mut entry = &self.hash_table()[index as usize * OID_SIZE..];
        Ok(entry.read_oid()?)
    }

    /// pack offset of the object with hash `oid` (binary search of the sorted hash table)
    pub fn find_offset(&self, oid: Oid) -> PackResult<u64> {
        trace!("find_offset(oid: {})", oid);
        let table = self.hash_table();
        let (mut low, mut high) = (0usize, self.num_objects as usize);
        while low < high {
            let mid = low + (high - low) / 2;
            match table[mid * OID_SIZE..(mid + 1) * OID_SIZE].cmp(&oid.as_bytes()[..]) {
                Ordering::Less => low = mid + 1,
                Ordering::Equal => return self.offset_of_index(mid as u64),
                Ordering::Greater => high = mid,
            }
        }
        Err(anyhow!(PackError::ObjectNotFound(oid)))
    }

    /// pack offset of the i-th packed object
    pub fn offset_of_index(&self, index: u64) -> PackResult<u64> {
        if index >= self.offsets.len() as u64 {
            return Err(anyhow!(PackError::InvalidObjectIndex(index)));
        }
        Ok(self.offsets[index as usize])
    }

    /// readable window from `offset` to the end of the pack
    /// reads past the end of the returned slice are decode failures, not panics
    pub(crate) fn window(&self, offset: u64) -> PackResult<&[u8]> {
        ensure!(offset <= self.data.len() as u64, "offset `{}` lies outside the pack", offset);
        Ok(&self.data[offset as usize..])
    }

    /// reads a hash reference at the cursor: a zero tag byte followed by 20
    /// literal hash bytes, or a nonzero varint indexing the hash table (1-based)
    pub(crate) fn read_hashref(&self, reader: &mut &[u8]) -> PackResult<Oid> {
        if reader.first() == Some(&0) {
            *reader = &reader[1..];
            return Ok(reader.read_oid()?);
        }
        let index = reader.read_varint()?;
        if index < 1 || index > self.num_objects as u64 {
            return Err(anyhow!(PackError::InvalidHashIndex(index)));
        }
        self.oid_at((index - 1) as u32)
    }

    fn ident_dict_cell(&self) -> PackResult<&IdentDict> {
        let loaded = self.ident_dict.get_or_init(|| {
            let mut offset = PACK_HEADER_SIZE + self.num_objects as u64 * OID_SIZE as u64;
            trace!("loading identity dictionary at offset {}", offset);
            match Dictionary::load(self, &mut offset) {
                Ok(dict) => Ok(IdentDict { dict, end: offset }),
                Err(err) => {
                    warn!("failed to load identity dictionary: {}", err);
                    Err(PackError::CorruptDictionary(err.to_string()))
                }
            }
        });
        match loaded {
            Ok(ident) => Ok(ident),
            Err(err) => Err(anyhow!(err.clone())),
        }
    }

    fn ident_dict(&self) -> PackResult<&Dictionary> {
        self.ident_dict_cell().map(|ident| &ident.dict)
    }

    // the path dictionary is framed immediately after the identity dictionary,
    // so finding it requires the identity dictionary to be loaded first
    fn path_dict(&self) -> PackResult<&Dictionary> {
        let start = self.ident_dict_cell()?.end;
        let loaded = self.path_dict.get_or_init(|| {
            trace!("loading path dictionary at offset {}", start);
            let mut offset = start;
            Dictionary::load(self, &mut offset).map_err(|err| {
                warn!("failed to load path dictionary: {}", err);
                PackError::CorruptDictionary(err.to_string())
            })
        });
        match loaded {
            Ok(dict) => Ok(dict),
            Err(err) => Err(anyhow!(err.clone())),
        }
    }

    /// decodes a varint identity-dictionary index at the cursor and returns the
    /// record view: 2 timezone bytes followed by the identity string
    pub(crate) fn get_ident(&self, reader: &mut &[u8]) -> PackResult<&[u8]> {
        let index = reader.read_varint()?;
        self.ident_dict()?.entry(index)
    }

    /// path-dictionary record view (2 mode bytes followed by the path) for an
    /// index the caller already decoded
    pub(crate) fn get_path(&self, index: u64) -> PackResult<&[u8]> {
        self.path_dict()?.entry(index)
    }

    /// reads the object header at `offset`, returning it with its encoded length
    pub fn read_obj_header(&self, offset: u64) -> PackResult<(ObjHeader, u64)> {
        let window = self.window(offset)?;
        let mut reader = window;
        let value = reader.read_varint()?;
        let obj_type = ObjType::try_from_u8((value & 0xf) as u8)?;
        let size = value >> 4;
        Ok((ObjHeader { obj_type, size }, (window.len() - reader.len()) as u64))
    }

    /// reconstructs the object whose header begins at `offset`
    pub fn read_obj_at(&self, offset: u64) -> PackResult<(ObjType, Vec<u8>)> {
        trace!("read_obj_at(offset: {})", offset);
        let (header, header_len) = self.read_obj_header(offset)?;
        let payload = offset + header_len;
        let bytes = match header.obj_type {
            ObjType::Commit => self.read_commit(payload, header.size)?,
            ObjType::Tree => self.read_tree(payload, header.size)?,
            // blobs and tags carry their canonical form as a plain zlib stream
            ObjType::Blob | ObjType::Tag =>
                io::inflate_exact(self.window(payload)?, header.size as usize)?.0,
        };
        Ok((header.obj_type, bytes))
    }

    /// reconstructs the object with hash `oid`
    pub fn read_obj(&self, oid: Oid) -> PackResult<(ObjType, Vec<u8>)> {
        trace!("read_obj(oid: {})", oid);
        let offset = self.find_offset(oid)?;
        self.read_obj_at(offset)
    }
}
