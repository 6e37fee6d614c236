//! Package archive support: tar entries inside a gzip stream.
//!
//! Packing walks a source directory in deterministic order and roots every
//! entry under the package's logical name. Unpacking materializes a received
//! stream onto disk and refuses any entry that would resolve outside the
//! destination directory.

mod pack;
mod unpack;

pub use pack::pack_directory;
pub use unpack::unpack_archive;
