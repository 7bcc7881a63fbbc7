pub mod fs;
pub mod options;
