use super::*;
use crate::error::PackResult;
use crate::test_utils::{encode_varint, zlib};

#[test]
fn test_read_varint_vectors() -> PackResult<()> {
    let mut bytes = &[0x00][..];
    assert_eq!(bytes.read_varint()?, 0);
    assert!(bytes.is_empty());

    let mut bytes = &[0x7f][..];
    assert_eq!(bytes.read_varint()?, 127);
    assert!(bytes.is_empty());

    let mut bytes = &[0x80, 0x00][..];
    assert_eq!(bytes.read_varint()?, 128);
    assert!(bytes.is_empty());

    // ((0x7f + 1) << 7) | 0x7f
    let mut bytes = &[0xff, 0x7f][..];
    assert_eq!(bytes.read_varint()?, 16511);
    assert!(bytes.is_empty());
    Ok(())
}

#[test]
fn test_read_varint_consumes_only_its_bytes() -> PackResult<()> {
    let mut bytes = &[0x80, 0x00, 0xaa][..];
    assert_eq!(bytes.read_varint()?, 128);
    assert_eq!(bytes, [0xaa]);
    Ok(())
}

#[test]
fn test_read_varint_truncated() {
    let mut bytes = &[0x80][..];
    assert!(bytes.read_varint().is_err());
}

#[test]
fn test_read_varint_overflow() {
    // sixteen continuation bytes cannot fit in 64 bits
    let mut bytes = &[0xff; 16][..];
    assert!(bytes.read_varint().is_err());
}

#[quickcheck]
fn test_varint_roundtrip(n: u64) -> PackResult<()> {
    // any value below 2^63
    let n = n >> 1;
    let encoded = encode_varint(n);
    let mut reader = &encoded[..];
    assert_eq!(reader.read_varint()?, n);
    assert!(reader.is_empty(), "decoder must consume the entire encoding");
    Ok(())
}

#[test]
fn test_inflate_exact_rejects_wrong_size() {
    let compressed = zlib(b"hello world");
    assert!(inflate_exact(&compressed, 5).is_err());
    assert!(inflate_exact(&compressed, 64).is_err());
    assert_eq!(inflate_exact(&compressed, 11).unwrap().0, b"hello world");
}

#[test]
fn test_inflate_exact_rejects_truncated_stream() {
    let compressed = zlib(b"hello world");
    assert!(inflate_exact(&compressed[..compressed.len() - 4], 11).is_err());
}

#[test]
fn test_inflate_exact_reports_consumed_bytes() -> PackResult<()> {
    let mut bytes = zlib(b"abc");
    let compressed_len = bytes.len();
    bytes.extend_from_slice(b"trailing");
    let (out, consumed) = inflate_exact(&bytes, 3)?;
    assert_eq!(out, b"abc");
    assert_eq!(consumed, compressed_len);
    Ok(())
}
