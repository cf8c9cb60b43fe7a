//! konfig Virtual File System
//!
//! Source loading goes through [`VirtualFileSystem`] so that inline code
//! (`k_code_list`) can shadow files on disk without touching them.
//!
//! - [`NativeFileSystem`]: `std::fs`, optionally rooted at a base directory
//! - [`MemoryFileSystem`]: in-memory map, shared between clones
//! - [`OverlayFileSystem`]: in-memory upper layer over any lower layer

mod error;
mod memory;
mod native;
mod overlay;
mod r#trait;

pub use error::{VfsError, VfsResult};
pub use memory::MemoryFileSystem;
pub use native::NativeFileSystem;
pub use overlay::OverlayFileSystem;
pub use r#trait::VirtualFileSystem;
