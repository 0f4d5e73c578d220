//! PDF writing.
//!
//! ```text
//! PdfDocument (original bytes + xref)
//!     ↓
//! [IncrementalUpdate] (appends objects, xref section, trailer)
//!     ↓
//! [ObjectSerializer] (serializes PDF objects)
//!     ↓
//! PDF bytes
//! ```

mod incremental;
mod object_serializer;

pub use incremental::{IncrementalUpdate, WrittenUpdate};
pub use object_serializer::{escape_literal, format_real, hex_upper, ObjectSerializer};
