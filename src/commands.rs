mod sync;

pub use sync::OutputFormat;
pub use sync::SyncSummary;
