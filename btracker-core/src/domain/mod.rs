//! Domain types for the bar table

pub mod bar;
pub mod table;

pub use bar::{Bar, RawBar, RawVolume};
pub use table::{FetchWindow, SortOrder, Table};
