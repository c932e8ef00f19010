mod outcome;
mod site;
mod summary;
mod table;

pub use outcome::{FailureKind, SiteOutcome, SiteReport};
pub use site::{PreCheckResult, SiteEntry};
pub use summary::{AggregateSummary, RunSummary, SkippedFile};
pub use table::{Cell, Record, Table};
