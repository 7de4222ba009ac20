#![deny(rust_2018_idioms)]

#[macro_use]
extern crate anyhow;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

#[macro_use]
mod macros;

#[cfg(test)]
pub mod test_utils;

pub mod error;
pub mod hash;
pub mod obj;
pub mod pack;
pub mod serialize;

mod io;
