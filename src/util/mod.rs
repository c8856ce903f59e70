//! Utility modules for winglot.

mod duration_parser;

pub use duration_parser::{
    DurationParseError, deserialize_duration, format_duration, parse_duration,
};
