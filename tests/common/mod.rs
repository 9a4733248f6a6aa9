#![allow(dead_code)] // Each test binary uses a different subset

pub mod builders;
pub mod strategies;

pub use builders::*;
