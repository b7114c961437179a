pub mod common;
pub mod psmdb;
pub mod pxc;
