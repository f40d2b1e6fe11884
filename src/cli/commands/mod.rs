pub(crate) mod extract;
pub(crate) mod init;

pub use extract::{MANIFEST_FILE, STYLESHEET_FILE};
