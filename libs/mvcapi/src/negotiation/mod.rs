//! Content negotiation: `Accept` parsing, media types and output formatters.

pub mod accept;
pub mod formatter;
pub mod media_type;
pub mod xml;

pub use accept::{MediaTypeSegment, acceptable_media_types, parse_accept_header};
pub use formatter::{
    FormatError, FormatterRegistry, FormatterSelection, JsonFormatter, OutputFormatter,
    PlainTextFormatter, WriteContext, select_formatter, select_formatter_for_server_types,
};
pub use media_type::MediaType;
pub use xml::XmlFormatter;
