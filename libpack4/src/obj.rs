use crate::error::PackGenericError;
use num_enum::TryFromPrimitive;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum ObjType {
    Commit = 1,
    Tree   = 2,
    Blob   = 3,
    Tag    = 4,
}

impl ObjType {
    pub fn try_from_u8(ty: u8) -> Result<Self, PackGenericError> {
        Self::try_from(ty).map_err(|_| anyhow!("invalid pack object type `{}`", ty))
    }
}

impl Display for ObjType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjType::Commit => "commit",
            ObjType::Tree => "tree",
            ObjType::Blob => "blob",
            ObjType::Tag => "tag",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ObjType {
    type Err = PackGenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(ObjType::Commit),
            "tree" => Ok(ObjType::Tree),
            "blob" => Ok(ObjType::Blob),
            "tag" => Ok(ObjType::Tag),
            _ => bail!("unknown object type `{}`", s),
        }
    }
}

/// type and size recorded in an object's on-disk header
/// the header itself is the varint of `(size << 4) | type`, which puts the
/// type tag in the low four bits of the final header byte
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ObjHeader {
    pub obj_type: ObjType,
    pub size: u64,
}
