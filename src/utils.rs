//! Numeric helpers shared by the geometry and projection code.

pub mod safe_cast;
