//! Bundled platform definitions.

pub mod iosxr;
pub mod nxos;
