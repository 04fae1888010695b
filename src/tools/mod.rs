//! Command line tools shipped with the crate.

pub mod cloudkms;
