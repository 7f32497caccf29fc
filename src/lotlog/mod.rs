//! Parsing of AOI batch logs into lot and circuit records.
//!
//! A log is a flat list of `[Key]Value` headers followed by tab-indented
//! circuit lines, grouped per substrate by `[GS]` headers:
//!
//! ```text
//! [Machine]AOI-2
//! [ChargenNr]240117-2
//! [StartDate]04/24/2024
//! [StartTime]1:05 PM
//! [GS]1A
//! 	ES 7 FC 1001 Length 2.50 Breadth 1.20 Area 3.00
//! [GS]2A
//! 	No Failure
//! ```

mod assembler;
mod circuit;
mod error;
mod guard;
mod line;
mod lot_id;
#[cfg(test)]
mod tests;
mod time;

pub use assembler::{LotLogParser, ScanState};
pub use circuit::CircuitBuilder;
pub use error::LotLogError;
pub use guard::admit;
pub use line::{HeaderField, LineClassifier, LogLine};
pub use lot_id::resolve_lot_id;
pub use time::decode_time;
