mod tree;

pub use tree::{ClassFolder, DatasetTree, FileEntry, QUARANTINE_DIR};
