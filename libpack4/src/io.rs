use crate::error::PackResult;
use crate::hash::Oid;
use crate::serialize::Deserialize;
use flate2::{Decompress, FlushDecompress};
use sha1::Digest;
use std::io::{self, prelude::*};

// all big-endian
pub(crate) trait ReadExt: Read {
    #[inline]
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut i = 0u8;
        self.read_exact(std::slice::from_mut(&mut i))?;
        Ok(i)
    }

    /// the self-delimited integer encoding used pervasively in v4 packs:
    /// 7 bits per byte, most significant group first, the high bit set on all
    /// but the final byte; every continuation adds one to the accumulator
    /// before the next shift, so the code has no redundant encodings
    fn read_varint(&mut self) -> io::Result<u64> {
        let mut byte = self.read_u8()? as u64;
        let mut value = byte & 0x7f;
        while byte & 0x80 != 0 {
            if value > (u64::MAX >> 7) - 1 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "varint overflows a 64 bit integer",
                ));
            }
            value += 1;
            byte = self.read_u8()? as u64;
            value = (value << 7) | (byte & 0x7f);
        }
        Ok(value)
    }

    #[inline]
    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    #[inline]
    fn read_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    #[inline]
    fn read_oid(&mut self) -> io::Result<Oid> {
        let mut buf = [0u8; 20];
        self.read_exact(&mut buf)?;
        Ok(Oid::new(buf))
    }
}

impl<R: Read + ?Sized> ReadExt for R {
}

/// inflates the zlib stream at the start of `src` into exactly `size` bytes
/// returning the output and the number of compressed bytes consumed
/// the stream must terminate cleanly and must produce neither more nor fewer bytes
pub(crate) fn inflate_exact(src: &[u8], size: usize) -> PackResult<(Vec<u8>, usize)> {
    let mut decompress = Decompress::new(true);
    let mut out = Vec::with_capacity(size);
    loop {
        let in_before = decompress.total_in();
        let out_before = decompress.total_out();
        let status =
            decompress.decompress_vec(&src[in_before as usize..], &mut out, FlushDecompress::Finish)?;
        match status {
            flate2::Status::StreamEnd => break,
            flate2::Status::Ok | flate2::Status::BufError => ensure!(
                decompress.total_in() > in_before || decompress.total_out() > out_before,
                "zlib stream made no progress (truncated input or oversized output)"
            ),
        }
    }
    ensure_eq!(out.len(), size, "inflated to {} bytes, expected exactly {}", out.len(), size);
    Ok((out, decompress.total_in() as usize))
}

impl Deserialize for u32 {
    fn deserialize(reader: &mut impl BufRead) -> PackResult<Self>
    where
        Self: Sized,
    {
        Ok(reader.read_u32()?)
    }
}

impl Deserialize for Oid {
    fn deserialize(reader: &mut impl BufRead) -> PackResult<Self>
    where
        Self: Sized,
    {
        Ok(reader.read_oid()?)
    }
}

// this trait exists as passing `self` to `T::deserialize` which takes a `dyn mut BufRead`
// requires `Self: Sized`
pub(crate) trait BufReadExtSized: BufRead + Sized {
    fn read_vec<T: Deserialize>(&mut self, n: usize) -> PackResult<Vec<T>> {
        let mut vec = Vec::with_capacity(n);
        for _ in 0..n {
            vec.push(T::deserialize(&mut *self)?);
        }
        Ok(vec)
    }
}

impl<R: BufRead> BufReadExtSized for R {
}

pub(crate) trait BufReadExt: BufRead {
    fn is_at_eof(&mut self) -> io::Result<bool> {
        Ok(self.fill_buf()?.is_empty())
    }
}

impl<R: BufRead + ?Sized> BufReadExt for R {
}

/// hashes all the bytes read through the reader using `D`
pub(crate) struct HashReader<'a, D> {
    reader: &'a mut dyn BufRead,
    hasher: D,
}

impl<'a, D: Digest> BufRead for HashReader<'a, D> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl<'a, D: Digest> Read for HashReader<'a, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

impl<'a, D: Digest> HashReader<'a, D> {
    pub fn new(reader: &'a mut dyn BufRead) -> Self {
        Self { reader, hasher: D::new() }
    }
}

impl<'a> HashReader<'a, sha1::Sha1> {
    pub fn new_sha1(reader: &'a mut dyn BufRead) -> Self {
        Self::new(reader)
    }

    pub fn finalize_sha1_hash(&mut self) -> Oid {
        Oid::from(self.hasher.finalize_reset())
    }
}

#[cfg(test)]
mod tests;
