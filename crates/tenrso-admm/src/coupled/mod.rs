//! Coupled operators that act on the whole list of slice factors at once

pub mod parafac2;
pub mod temporal;

pub use parafac2::{Parafac2, Parafac2Aux, Parafac2Config, Parafac2Init};
pub use temporal::TemporalSmoothness;
