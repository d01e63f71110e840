pub mod registry;

pub use registry::{ProcessHandle, ProcessRegistry};
