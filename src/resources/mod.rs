pub mod common;
pub mod psmdb;
pub mod pxc;
pub mod secret;

pub use common::{INSTANCE_LABEL, MANAGED_BY_LABEL, standard_labels};
pub use secret::{PASSWORD_LENGTH, PasswordGenerator, TimeSeededGenerator};
