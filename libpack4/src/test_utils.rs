use crate::error::PackResult;
use crate::hash::Oid;
use crate::obj::ObjType;
use crate::pack::Pack;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::io::Write;

pub fn oid(byte: u8) -> Oid {
    Oid::new([byte; 20])
}

/// inverse of the varint decoder: most significant 7 bit group first,
/// continuation bytes biased by one
pub fn encode_varint(mut n: u64) -> Vec<u8> {
    let mut buf = [0u8; 10];
    let mut pos = buf.len() - 1;
    buf[pos] = (n & 0x7f) as u8;
    n >>= 7;
    while n > 0 {
        n -= 1;
        pos -= 1;
        buf[pos] = 0x80 | (n & 0x7f) as u8;
        n >>= 7;
    }
    buf[pos..].to_vec()
}

pub fn zlib(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(vec![], Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

pub fn obj_header(obj_type: ObjType, size: u64) -> Vec<u8> {
    encode_varint(size << 4 | obj_type as u64)
}

pub fn hashref_inline(oid: Oid) -> Vec<u8> {
    let mut bytes = vec![0];
    bytes.extend_from_slice(oid.as_bytes());
    bytes
}

pub fn hashref_index(index: u64) -> Vec<u8> {
    encode_varint(index)
}

/// canonical emitted form of one tree entry
pub fn tree_entry_bytes(mode: u16, name: &str, oid: Oid) -> Vec<u8> {
    let mut bytes = format!("{:o} {}\0", mode, name).into_bytes();
    bytes.extend_from_slice(oid.as_bytes());
    bytes
}

fn encode_dict<'a>(entries: impl IntoIterator<Item = ([u8; 2], &'a str)>) -> Vec<u8> {
    let mut raw = vec![];
    for (prefix, s) in entries {
        raw.extend_from_slice(&prefix);
        raw.extend_from_slice(s.as_bytes());
        raw.push(0);
    }
    // a dictionary is never empty on disk; keep the chained framing loadable
    if raw.is_empty() {
        raw = vec![0, 0, 0];
    }
    let mut bytes = encode_varint(raw.len() as u64);
    bytes.extend_from_slice(&zlib(&raw));
    bytes
}

/// assembles an in-memory pack image: header, sorted hash table, identity and
/// path dictionaries, then the encoded objects in insertion order
#[derive(Default)]
pub struct PackBuilder {
    oids: Vec<Oid>,
    idents: Vec<(i16, String)>,
    paths: Vec<(u16, String)>,
    objects: Vec<Vec<u8>>,
}

impl PackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// registers an identity record, returning its dictionary index
    pub fn ident(&mut self, tz: i16, ident: &str) -> u64 {
        self.idents.push((tz, ident.to_owned()));
        self.idents.len() as u64 - 1
    }

    /// registers a path record, returning its dictionary index
    pub fn path(&mut self, mode: u16, path: &str) -> u64 {
        self.paths.push((mode, path.to_owned()));
        self.paths.len() as u64 - 1
    }

    /// appends an object (header plus already-encoded payload stream)
    /// objects must be added in sorted oid order, their position doubling as
    /// both hash table index and object index
    pub fn object(&mut self, oid: Oid, obj_type: ObjType, size: u64, payload: Vec<u8>) -> u64 {
        let mut bytes = obj_header(obj_type, size);
        bytes.extend_from_slice(&payload);
        self.oids.push(oid);
        self.objects.push(bytes);
        self.objects.len() as u64 - 1
    }

    pub fn build(self) -> PackResult<Pack> {
        let (bytes, offsets, _) = self.build_parts();
        Pack::from_bytes(bytes, offsets)
    }

    /// the raw pack image, offset table and oid list, for tests that go through files
    pub fn build_parts(self) -> (Vec<u8>, Vec<u64>, Vec<Oid>) {
        assert!(self.oids.windows(2).all(|w| w[0] < w[1]), "oids must be added in sorted order");
        let mut bytes = vec![];
        bytes.extend_from_slice(b"PACK");
        bytes.extend_from_slice(&4u32.to_be_bytes());
        bytes.extend_from_slice(&(self.oids.len() as u32).to_be_bytes());
        for oid in &self.oids {
            bytes.extend_from_slice(oid.as_bytes());
        }
        bytes.extend_from_slice(&encode_dict(
            self.idents.iter().map(|&(tz, ref s)| (tz.to_be_bytes(), s.as_str())),
        ));
        bytes.extend_from_slice(&encode_dict(
            self.paths.iter().map(|&(mode, ref s)| (mode.to_be_bytes(), s.as_str())),
        ));
        let mut offsets = Vec::with_capacity(self.objects.len());
        for obj in &self.objects {
            offsets.push(bytes.len() as u64);
            bytes.extend_from_slice(obj);
        }
        (bytes, offsets, self.oids)
    }
}

/// a v2 offset-index image over the given oids and offsets, checksummed
pub fn encode_index(oids: &[Oid], offsets: &[u64], pack_hash: Oid) -> Vec<u8> {
    let mut body = vec![];
    body.extend_from_slice(&0xff744f63u32.to_be_bytes());
    body.extend_from_slice(&2u32.to_be_bytes());
    let mut fanout = [0u32; 256];
    for oid in oids {
        fanout[oid.as_bytes()[0] as usize] += 1;
    }
    for i in 1..fanout.len() {
        fanout[i] += fanout[i - 1];
    }
    for entry in fanout {
        body.extend_from_slice(&entry.to_be_bytes());
    }
    for oid in oids {
        body.extend_from_slice(oid.as_bytes());
    }
    for _ in oids {
        body.extend_from_slice(&0u32.to_be_bytes());
    }
    for &offset in offsets {
        body.extend_from_slice(&(offset as u32).to_be_bytes());
    }
    body.extend_from_slice(pack_hash.as_bytes());
    let mut hasher = Sha1::new();
    hasher.update(&body);
    let checksum = Oid::from(hasher.finalize());
    body.extend_from_slice(checksum.as_bytes());
    body
}
