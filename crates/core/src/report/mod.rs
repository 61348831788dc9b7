//! Printable performance reports: grouping, table layout, inline timelines and the export driver.

pub mod export;
pub mod group;
pub mod surface;
pub mod svg;
pub mod table;
pub mod timeline;

pub use export::{ExportError, ExportOptions, ExportedDocument, ExportedGroup, Exporter};
