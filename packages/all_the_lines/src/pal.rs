//! Platform abstraction layer for timing and source file access.
//!
//! Collectors read ticks from a [`Clock`] and reports read source text through
//! [`SourceFiles`]. Both reach the platform through a facade so tests can substitute a
//! controllable clock or a mocked file system.

mod abstractions;
mod facade;
#[cfg(test)]
mod fake;
mod real;

pub(crate) use abstractions::*;
pub(crate) use facade::*;
#[cfg(test)]
pub(crate) use fake::*;
pub(crate) use real::*;
