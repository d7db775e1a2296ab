//! Identity mapping from SVN usernames to Git author identities.
//!
//! The map is loaded once from a user-supplied file and is read-only for
//! the rest of the run. A username missing from the map is a hard error.

pub mod mapper;
pub mod mapping_file;

pub use mapper::{GitIdentity, IdentityMap};
