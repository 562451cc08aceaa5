/// Route module for handler files
///
/// Pure parsing of handler filenames and the HTTP method allow-list.
/// No I/O happens here.

pub mod filename;
pub mod method;

pub use filename::{parse_filename, ParsedFilename, INDEX_HANDLER};
pub use method::HttpMethod;
