mod recorder;

pub use recorder::{PatchOp, UpdateRecorder};
