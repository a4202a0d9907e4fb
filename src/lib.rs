//! Automatically mount bookmarked network shares when the network comes up.
//!
//! The daemon listens for NetworkManager's "connected, global" state, reads
//! the GTK bookmarks, and runs the mount command for every watched share
//! whose credentials are stored in the Secret Service. Each share is handled
//! by its own task so a slow server never holds up the others.

pub mod bookmarks;
pub mod bus;
pub mod config;
pub mod daemon;
pub mod lock;
pub mod logging;
pub mod mount;
pub mod vault;
