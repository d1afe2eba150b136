#![warn(rust_2018_idioms)]

//! Glyph synthesis and `GSUB` round-tripping for OpenType fonts with CFF outlines.
//!
//! A [FontSession](session::FontSession) holds one open font. Through it the Unicode `cmap` of
//! the font can be read, its `GSUB` table dumped to text and replaced from text, and new glyphs
//! added from outline descriptions. New glyphs are compiled to Type 2 charstrings and spliced
//! into the CFF CharStrings INDEX, charset and FDSelect, the glyph order and the metrics tables.
//!
//! Fonts are read from OpenType, TrueType collection and, with one of the `flate2` features,
//! WOFF files and always saved as a single OpenType font.

/// Reading and writing of binary data.
pub mod binary;
pub mod cff;
/// Checksum calculation routines.
pub mod checksum;
pub mod error;
pub mod font;
pub mod font_builder;
pub mod font_data;
pub mod gsub;
pub mod outline;
pub mod path;
pub mod post;
pub mod registrar;
pub mod session;
pub mod tables;
pub mod tag;
/// Reading of the WOFF format.
#[cfg(feature = "flate2")]
pub mod woff;

pub use pathfinder_geometry;
