use crate::hash::Oid;
use std::fmt::{self, Display, Formatter};

pub type PackResult<T> = Result<T, PackGenericError>;
pub type PackGenericError = anyhow::Error;

// most decode failures are just anyhow errors, but the cases callers actually
// match on get a "rust" representation we can test against
// `Clone` is required as dictionary load failures are memoized on the pack handle
#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub enum PackError {
    /// hash `{0}` does not appear in this pack's hash table
    ObjectNotFound(Oid),
    /// 1-based hash reference index outside `[1, num_objects]`
    InvalidHashIndex(u64),
    /// object index outside `[0, num_objects)`
    InvalidObjectIndex(u64),
    /// dictionary lookup index `{0}` with only `{1}` entries
    DictIndexOutOfBounds(u64, u64),
    /// the dictionary could not be built; every later lookup observes this
    CorruptDictionary(String),
}

pub trait PackErrorExt {
    fn try_into_pack_error(self) -> PackResult<PackError>;
}

impl PackErrorExt for PackGenericError {
    fn try_into_pack_error(self) -> PackResult<PackError> {
        self.downcast::<PackError>()
    }
}

pub trait PackResultExt {
    fn is_not_found_err(&self) -> bool;
}

macro_rules! error_ext_is_method {
    ($method:ident) => {
        fn $method(&self) -> bool {
            match self {
                Ok(..) => false,
                Err(err) => err.$method(),
            }
        }
    };
}

impl<T> PackResultExt for PackResult<T> {
    error_ext_is_method!(is_not_found_err);
}

impl PackResultExt for PackGenericError {
    fn is_not_found_err(&self) -> bool {
        matches!(self.downcast_ref::<PackError>(), Some(PackError::ObjectNotFound(..)))
    }
}

impl Display for PackError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PackError::ObjectNotFound(oid) =>
                write!(f, "object with hash `{}` not found in pack", oid),
            PackError::InvalidHashIndex(index) =>
                write!(f, "hash reference index `{}` is out of range", index),
            PackError::InvalidObjectIndex(index) =>
                write!(f, "packed object index `{}` is out of range", index),
            PackError::DictIndexOutOfBounds(index, n) =>
                write!(f, "dictionary index `{}` is out of range ({} entries)", index, n),
            PackError::CorruptDictionary(msg) => write!(f, "corrupt pack dictionary: {}", msg),
        }
    }
}
