pub mod categories;
pub mod date;
pub mod duration;
pub mod error;
pub mod grammar;
pub mod metrics;
pub mod normalize;

pub use categories::CategoryEntry;
pub use error::{ParseFailure, ReportError};
pub use grammar::ReportGrammar;
pub use normalize::{MetricsRecord, Normalizer, RawReport};
