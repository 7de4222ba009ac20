use crate::error::PackResult;
use std::io::{prelude::*, BufReader};

// we use an explicit `Self: Sized` bound on each function
// (instead of putting the bound on the trait) for object safety
pub trait Deserialize {
    fn deserialize(reader: &mut impl BufRead) -> PackResult<Self>
    where
        Self: Sized;

    fn deserialize_unbuffered(reader: impl Read) -> PackResult<Self>
    where
        Self: Sized,
    {
        Self::deserialize(&mut BufReader::new(reader))
    }
}
