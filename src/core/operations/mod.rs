mod file_ops;
mod quarantine;

pub use file_ops::{move_file, FileOpError, FileOpResult};
pub use quarantine::{quarantine_destination, quarantine_files, QuarantineSummary};
