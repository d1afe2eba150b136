//! An open font and the operations that can be carried out on it.
//!
//! ```no_run
//! use fontgraft::path::RawCommand;
//! use fontgraft::session::{FontSession, GlyphRequest, SessionOptions};
//! # fn main() -> Result<(), fontgraft::error::SessionError> {
//! # let data: Vec<u8> = Vec::new();
//! let mut session = FontSession::open(&data, SessionOptions::default())?;
//! let square = vec![
//!     RawCommand::new("M", vec![0., 0.]),
//!     RawCommand::new("L", vec![100., 0.]),
//!     RawCommand::new("L", vec![100., 100.]),
//!     RawCommand::new("Z", vec![]),
//! ];
//! let request = GlyphRequest {
//!     width: 600,
//!     height: 0,
//!     path: vec![square],
//! };
//! let added = session.add_glyphs(vec![(String::from("box"), request)])?;
//! let font = session.save()?;
//! session.close();
//! # Ok(())
//! # }
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::binary::read::ReadScope;
use crate::cff::charstring::CFFOutlines;
use crate::cff::compiler;
use crate::error::{OpenError, SessionError};
use crate::font::{CmapSnapshot, FontHandle};
use crate::font_data::FontData;
use crate::gsub::{text, GsubTable};
use crate::outline::{GlyphOutline, OutlineBuilder};
use crate::path::{self, RawCommand};
use crate::registrar;

/// Options for opening a font.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Index of the font to open within a collection, 0 for other fonts.
    pub font_index: usize,
    /// Raise `advanceWidthMax` in `hhea` (and `advanceHeightMax` in `vhea`) on save to cover
    /// added glyphs.
    pub recalc_metrics_maxima: bool,
}

/// The outline and metrics of a glyph to add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphRequest {
    /// Advance width in font units.
    pub width: u16,
    /// Advance height in font units, only used by fonts with vertical metrics.
    #[serde(default)]
    pub height: u16,
    /// Subpaths of drawing commands.
    pub path: Vec<Vec<RawCommand>>,
}

/// One open font.
///
/// All operations fail with `SessionError::SessionClosed` once the session has been closed.
pub struct FontSession {
    state: Option<OpenFont>,
    options: SessionOptions,
}

struct OpenFont {
    font: FontHandle,
    cmap: CmapSnapshot,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            font_index: 0,
            recalc_metrics_maxima: true,
        }
    }
}

impl FontSession {
    /// Open the font in `data`, which may be an OpenType or TrueType font, a collection or a
    /// WOFF file.
    pub fn open(data: &[u8], options: SessionOptions) -> Result<FontSession, SessionError> {
        let font_data = ReadScope::new(data)
            .read::<FontData<'_>>()
            .map_err(OpenError::from)?;
        let provider = font_data.table_provider(options.font_index)?;
        let font =
            FontHandle::load(&provider, provider.sfnt_version()).map_err(OpenError::from)?;
        let cmap = font.cmap_snapshot().map_err(OpenError::from)?;
        debug!(
            "opened font {} of {}: {} glyphs, {} cmap entries",
            options.font_index,
            font_data.num_fonts(),
            font.num_glyphs(),
            cmap.len()
        );

        Ok(FontSession {
            state: Some(OpenFont { font, cmap }),
            options,
        })
    }

    fn state(&self) -> Result<&OpenFont, SessionError> {
        self.state.as_ref().ok_or(SessionError::SessionClosed)
    }

    fn font_mut(&mut self) -> Result<&mut FontHandle, SessionError> {
        self.state
            .as_mut()
            .map(|state| &mut state.font)
            .ok_or(SessionError::SessionClosed)
    }

    /// The Unicode mapping of the font as it was when opened.
    pub fn cmap(&self) -> Result<&CmapSnapshot, SessionError> {
        Ok(&self.state()?.cmap)
    }

    pub fn units_per_em(&self) -> Result<u16, SessionError> {
        Ok(self.state()?.font.head.units_per_em)
    }

    /// `sTypoDescender` from the `OS/2` table, `None` if the font has no `OS/2` table.
    pub fn typo_descender(&self) -> Result<Option<i16>, SessionError> {
        let metrics = self.state()?.font.os2_typo_metrics()?;
        Ok(metrics.map(|metrics| metrics.s_typo_descender))
    }

    /// The names of all glyphs, in glyph id order, including added glyphs.
    pub fn glyph_names(&self) -> Result<&[String], SessionError> {
        Ok(self.state()?.font.glyph_order.names())
    }

    /// The outline of the glyph called `name`.
    ///
    /// Returns `None` if there is no such glyph or the font does not have CFF outlines.
    pub fn glyph_outline(&self, name: &str) -> Result<Option<GlyphOutline>, SessionError> {
        let font = &self.state()?.font;
        let (Some(cff), Some(glyph_id)) = (&font.cff, font.glyph_order.glyph_id(name)) else {
            return Ok(None);
        };
        let mut outline = GlyphOutline::new();
        CFFOutlines { table: cff }.visit(glyph_id, &mut outline)?;
        Ok(Some(outline))
    }

    /// The GSUB table of the font as text.
    ///
    /// A font without a GSUB table gives the text of an empty table.
    pub fn gsub_text(&self) -> Result<String, SessionError> {
        let font = &self.state()?.font;
        let gsub = match font.gsub_table()? {
            Some(gsub) => gsub,
            None => GsubTable::empty(),
        };
        Ok(text::to_text(&gsub, &font.glyph_order)?)
    }

    /// Replace the GSUB table of the font with the table described by `gsub_text`.
    ///
    /// The font is left unchanged if the text is invalid.
    pub fn set_gsub_text(&mut self, gsub_text: &str) -> Result<(), SessionError> {
        let font = self.font_mut()?;
        let gsub = text::from_text(gsub_text, &font.glyph_order)?;
        debug!("replacing GSUB with {} lookups", gsub.lookup_list.len());
        font.gsub = Some(gsub);
        Ok(())
    }

    /// Add a batch of glyphs, returning the identifier each key was added as.
    ///
    /// Every path is decoded and compiled before the font is changed, so malformed input leaves
    /// the font untouched. In name-keyed fonts keys become the glyph names. In CID-keyed fonts
    /// each glyph is given the next free CID and named `cid<N>`.
    pub fn add_glyphs(
        &mut self,
        requests: Vec<(String, GlyphRequest)>,
    ) -> Result<Vec<(String, String)>, SessionError> {
        let font = self.font_mut()?;

        let outlines = requests
            .iter()
            .map(|(_, request)| path::decode(&request.path))
            .collect::<Result<Vec<_>, _>>()?;
        let widths = registrar::width_context(font)?;
        let glyphs = requests
            .into_iter()
            .zip(outlines.iter())
            .map(|((key, request), outline)| {
                compiler::compile(outline, request.width, request.height, widths)
                    .map(|charstring| (key, charstring))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let keys = glyphs.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>();

        let records = registrar::register_all(font, glyphs)?;
        Ok(keys
            .into_iter()
            .zip(records)
            .map(|(key, record)| (key, record.name))
            .collect())
    }

    /// Write the font with all changes made so far.
    ///
    /// The result is always a single, uncompressed sfnt.
    pub fn save(&self) -> Result<Vec<u8>, SessionError> {
        let font = &self.state()?.font;
        let data = font.to_bytes(self.options.recalc_metrics_maxima)?;
        debug!("saved font, {} bytes", data.len());
        Ok(data)
    }

    /// Release the font. Later operations fail with `SessionError::SessionClosed`.
    pub fn close(&mut self) {
        if self.state.take().is_some() {
            debug!("closed font session");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MalformedPathError, PathErrorKind, RegistrationError};
    use crate::tests::writer;

    fn square() -> Vec<Vec<RawCommand>> {
        serde_json::from_str(
            r#"[[["M", 0, 0], ["L", 100, 0], ["L", 100, 100], ["L", 0, 100], ["Z"]]]"#,
        )
        .unwrap()
    }

    fn request(width: u16) -> GlyphRequest {
        GlyphRequest {
            width,
            height: 0,
            path: square(),
        }
    }

    #[test]
    fn test_request_from_json() {
        let request: GlyphRequest =
            serde_json::from_str(r#"{"width": 500, "path": [[["M", 0, 0], ["L", 1, 1]]]}"#)
                .unwrap();
        assert_eq!(request.width, 500);
        assert_eq!(request.height, 0);
        assert_eq!(request.path[0][1], RawCommand::new("L", vec![1., 1.]));
    }

    #[test]
    fn test_closed_session() {
        let data = writer::name_keyed_otf(&["A"]);
        let mut session = FontSession::open(&data, SessionOptions::default()).unwrap();
        assert!(!session.is_closed());
        session.close();
        assert!(session.is_closed());

        assert_eq!(session.cmap().err(), Some(SessionError::SessionClosed));
        assert_eq!(session.gsub_text().err(), Some(SessionError::SessionClosed));
        assert_eq!(session.save().err(), Some(SessionError::SessionClosed));
        assert_eq!(
            session
                .add_glyphs(vec![(String::from("box"), request(500))])
                .err(),
            Some(SessionError::SessionClosed)
        );
        // Closing twice is harmless
        session.close();
    }

    #[test]
    fn test_malformed_path_leaves_font_unchanged() {
        let data = writer::name_keyed_otf(&["A"]);
        let mut session = FontSession::open(&data, SessionOptions::default()).unwrap();
        let bad = GlyphRequest {
            width: 500,
            height: 0,
            path: vec![vec![
                RawCommand::new("L", vec![0., 0.]),
                RawCommand::new("L", vec![10., 0.]),
            ]],
        };
        let result = session.add_glyphs(vec![
            (String::from("good"), request(500)),
            (String::from("bad"), bad),
        ]);
        match result {
            Err(SessionError::MalformedPath(MalformedPathError { subpath, kind, .. })) => {
                assert_eq!(subpath, 0);
                assert_eq!(kind, PathErrorKind::MissingMoveTo);
            }
            other => panic!("expected malformed path, got {:?}", other),
        }
        assert_eq!(session.glyph_names().unwrap(), &[".notdef", "A"]);
    }

    #[test]
    fn test_degenerate_outline() {
        let data = writer::name_keyed_otf(&["A"]);
        let mut session = FontSession::open(&data, SessionOptions::default()).unwrap();
        let dot = GlyphRequest {
            width: 500,
            height: 0,
            path: vec![vec![RawCommand::new("M", vec![0., 0.])]],
        };
        assert!(matches!(
            session.add_glyphs(vec![(String::from("dot"), dot)]),
            Err(SessionError::Compilation(_))
        ));
    }

    #[test]
    fn test_registration_needs_cff() {
        let tables: Vec<(&[u8; 4], Vec<u8>)> = vec![
            (b"head", writer::head_table(2048)),
            (b"hhea", writer::hhea_table(1, 600)),
            (b"hmtx", writer::hmtx_table(&[(600, 0)])),
            (b"maxp", writer::maxp_table(1)),
        ];
        let data = writer::sfnt(crate::tables::TTF_MAGIC, &tables);
        let mut session = FontSession::open(&data, SessionOptions::default()).unwrap();
        assert_eq!(
            session
                .add_glyphs(vec![(String::from("box"), request(500))])
                .err(),
            Some(SessionError::Registration(RegistrationError::NotCff))
        );
        assert_eq!(session.units_per_em().unwrap(), 2048);
        assert_eq!(session.typo_descender().unwrap(), None);
        assert_eq!(session.glyph_outline(".notdef").unwrap(), None);
    }

    #[test]
    fn test_glyph_outline() {
        let data = writer::name_keyed_otf(&["A"]);
        let session = FontSession::open(&data, SessionOptions::default()).unwrap();
        let outline = session.glyph_outline("A").unwrap().unwrap();
        assert_eq!(outline.num_points(), 3);
        assert_eq!(session.glyph_outline("missing").unwrap(), None);
    }
}
