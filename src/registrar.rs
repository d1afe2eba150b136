//! Splicing compiled glyphs into a font's tables.
//!
//! A new glyph touches the CharStrings INDEX, the charset, the FDSelect of CID-keyed fonts, the
//! glyph order and the metrics tables. A batch of glyphs is checked against the font in full
//! before any of these are changed, so a rejected batch leaves the font as it was.

use std::convert::TryFrom;

use log::debug;
use rustc_hash::FxHashSet;

use crate::cff::compiler::{CompiledCharstring, WidthContext};
use crate::cff::{cid_glyph_name, CFFVariant, Charset, Operand, Operator, CFF};
use crate::error::{ParseError, RegistrationError};
use crate::font::FontHandle;
use crate::tables::LongHorMetric;

/// A glyph that has been added to a font.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphRecord {
    /// The glyph name, `cid<N>` for glyphs of a CID-keyed font.
    pub name: String,
    /// Glyph id, which is also the index of the charstring in the CharStrings INDEX.
    pub glyph_id: u16,
    /// The CID of the glyph in a CID-keyed font.
    pub cid: Option<u16>,
    pub advance_width: u16,
    pub advance_height: u16,
}

/// How the glyphs of a batch are keyed, worked out before the font is touched.
enum Plan {
    NameKeyed { names: Vec<String> },
    CidKeyed { first_cid: u16, fd_index: u8 },
}

/// The widths used to compile charstrings for glyphs added to `font`.
///
/// New glyphs use the Private DICT of the last glyph in the font, which for CID-keyed fonts is
/// the Private DICT of the Font DICT they will be assigned to.
pub fn width_context(font: &FontHandle) -> Result<WidthContext, RegistrationError> {
    let cff = font.cff.as_ref().ok_or(RegistrationError::NotCff)?;
    let last_glyph = last_glyph_id(cff)?;
    let (private_dict, _) = cff
        .font
        .private_dict(last_glyph)
        .ok_or(ParseError::BadIndex)?;
    Ok(WidthContext::from_private_dict(private_dict)?)
}

/// Add `glyphs` to `font` in order, keyed by the requested names.
///
/// The requested names are used as glyph names in name-keyed fonts. CID-keyed fonts ignore them:
/// each glyph gets the CID following the largest CID in the font and is named after it.
pub fn register_all(
    font: &mut FontHandle,
    glyphs: Vec<(String, CompiledCharstring)>,
) -> Result<Vec<GlyphRecord>, RegistrationError> {
    let plan = plan(font, &glyphs)?;
    let cff = font.cff.as_mut().ok_or(RegistrationError::NotCff)?;

    let mut records = Vec::with_capacity(glyphs.len());
    for (index, (_key, charstring)) in glyphs.into_iter().enumerate() {
        // Checked by plan, the glyph id and CID stay in range for the whole batch
        let offset = u16::try_from(index).map_err(|_| RegistrationError::TooManyGlyphs)?;
        let glyph_id = u16::try_from(cff.font.char_strings_index.len())
            .map_err(|_| RegistrationError::TooManyGlyphs)?;

        let (name, cid) = match &plan {
            Plan::NameKeyed { names } => {
                let name = names[index].clone();
                let sid = cff.add_string(&name)?;
                push_charset_id(cff, sid)?;
                (name, None)
            }
            Plan::CidKeyed {
                first_cid,
                fd_index,
            } => {
                let cid = first_cid + offset;
                push_charset_id(cff, cid)?;
                if let CFFVariant::CID(cid_data) = &mut cff.font.data {
                    cid_data.fd_select.push(*fd_index);
                }
                let cid_count = cff.font.cid_count()?;
                let cid_count = (cid_count + 1).max(i32::from(cid) + 1);
                cff.font
                    .top_dict
                    .set(Operator::CIDCount, vec![Operand::Integer(cid_count)]);
                (cid_glyph_name(cid), Some(cid))
            }
        };
        let charstring_index = cff.font.char_strings_index.push(charstring.data);
        debug_assert_eq!(charstring_index, usize::from(glyph_id));

        font.horizontal.table.upsert(
            glyph_id,
            LongHorMetric {
                advance_width: charstring.advance_width,
                lsb: 0,
            },
        );
        if let Some(vertical) = &mut font.vertical {
            vertical.table.upsert(
                glyph_id,
                LongHorMetric {
                    advance_width: charstring.advance_height,
                    lsb: 0,
                },
            );
        }
        if let Some(names) = font.post.as_mut().and_then(|post| post.glyph_names.as_mut()) {
            names.push(name.clone());
        }
        font.glyph_order.push(name.clone());
        font.maxp.num_glyphs = glyph_id + 1;
        font.glyphs_modified = true;

        debug!("registered glyph {} as '{}'", glyph_id, name);
        records.push(GlyphRecord {
            name,
            glyph_id,
            cid,
            advance_width: charstring.advance_width,
            advance_height: charstring.advance_height,
        });
    }

    Ok(records)
}

fn plan(
    font: &FontHandle,
    glyphs: &[(String, CompiledCharstring)],
) -> Result<Plan, RegistrationError> {
    let cff = font.cff.as_ref().ok_or(RegistrationError::NotCff)?;
    let num_glyphs = cff.font.num_glyphs();
    // Glyph ids stop at 65534 so the glyph count fits in maxp
    if num_glyphs + glyphs.len() > usize::from(u16::MAX) {
        return Err(RegistrationError::TooManyGlyphs);
    }
    if cff.font.charset.to_custom(num_glyphs).is_none() {
        return Err(RegistrationError::PredefinedCharset);
    }

    match &cff.font.data {
        CFFVariant::CID(cid_data) => {
            let max_cid = match &cff.font.charset {
                Charset::Custom(custom) if custom.len() > 1 => custom.max_id(),
                _ => return Err(RegistrationError::EmptyCharset),
            };
            let last_cid = u16::try_from(usize::from(max_cid) + glyphs.len())
                .map_err(|_| RegistrationError::TooManyGlyphs)?;
            debug!(
                "assigning CIDs {} to {}",
                max_cid + 1,
                last_cid
            );
            let fd_index = cid_data
                .fd_select
                .font_dict_index(last_glyph_id(cff)?)
                .ok_or(ParseError::BadIndex)?;
            Ok(Plan::CidKeyed {
                first_cid: max_cid + 1,
                fd_index,
            })
        }
        CFFVariant::Type1(_) => {
            let mut batch = FxHashSet::default();
            let mut names = Vec::with_capacity(glyphs.len());
            for (key, _) in glyphs {
                if font.glyph_order.glyph_id(key).is_some() || !batch.insert(key.as_str()) {
                    return Err(RegistrationError::DuplicateGlyphName(key.clone()));
                }
                names.push(key.clone());
            }
            Ok(Plan::NameKeyed { names })
        }
    }
}

fn push_charset_id(cff: &mut CFF, id: u16) -> Result<(), RegistrationError> {
    if !matches!(cff.font.charset, Charset::Custom(_)) {
        let custom = cff
            .font
            .charset
            .to_custom(cff.font.num_glyphs())
            .ok_or(RegistrationError::PredefinedCharset)?;
        cff.font.charset = Charset::Custom(custom);
    }
    if let Charset::Custom(custom) = &mut cff.font.charset {
        custom.push(id);
    }
    Ok(())
}

fn last_glyph_id(cff: &CFF) -> Result<u16, RegistrationError> {
    let num_glyphs = u16::try_from(cff.font.num_glyphs()).map_err(|_| ParseError::BadIndex)?;
    num_glyphs
        .checked_sub(1)
        .ok_or(RegistrationError::Parse(ParseError::MissingValue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::cff::compiler::compile;
    use crate::font_data::FontData;
    use crate::outline::GlyphOutline;
    use crate::path::{self, RawCommand};
    use crate::tests::writer;

    fn load(data: &[u8]) -> FontHandle {
        let font_data = ReadScope::new(data).read::<FontData<'_>>().unwrap();
        let provider = font_data.table_provider(0).unwrap();
        FontHandle::load(&provider, provider.sfnt_version()).unwrap()
    }

    fn square() -> GlyphOutline {
        let subpath = vec![
            RawCommand::new("M", vec![0., 0.]),
            RawCommand::new("L", vec![100., 0.]),
            RawCommand::new("L", vec![100., 100.]),
            RawCommand::new("L", vec![0., 100.]),
            RawCommand::new("Z", vec![]),
        ];
        path::decode(&[subpath]).unwrap()
    }

    fn glyph(font: &FontHandle, key: &str, width: u16, height: u16) -> (String, CompiledCharstring) {
        let widths = width_context(font).unwrap();
        (key.to_string(), compile(&square(), width, height, widths).unwrap())
    }

    #[test]
    fn test_register_name_keyed() {
        let mut font = load(&writer::name_keyed_otf(&["A", "B"]));
        let glyphs = vec![glyph(&font, "box", 600, 0), glyph(&font, "box.alt", 500, 0)];
        let records = register_all(&mut font, glyphs).unwrap();

        assert_eq!(
            records
                .iter()
                .map(|record| (record.name.as_str(), record.glyph_id, record.cid))
                .collect::<Vec<_>>(),
            vec![("box", 3, None), ("box.alt", 4, None)]
        );
        let cff = font.cff.as_ref().unwrap();
        assert_eq!(cff.font.num_glyphs(), 5);
        assert_eq!(
            cff.glyph_names().unwrap(),
            vec![".notdef", "A", "B", "box", "box.alt"]
        );
        assert_eq!(font.glyph_order.glyph_id("box.alt"), Some(4));
        assert_eq!(font.maxp.num_glyphs, 5);
        assert_eq!(
            font.horizontal.table.get(3),
            Some(LongHorMetric {
                advance_width: 600,
                lsb: 0
            })
        );
        assert_eq!(font.horizontal.table.get(4).unwrap().advance_width, 500);
        assert!(font.glyphs_modified);
    }

    #[test]
    fn test_duplicate_names_rejected_before_changes() {
        let mut font = load(&writer::name_keyed_otf(&["A", "B"]));
        let glyphs = vec![glyph(&font, "box", 600, 0), glyph(&font, "A", 600, 0)];
        assert_eq!(
            register_all(&mut font, glyphs),
            Err(RegistrationError::DuplicateGlyphName(String::from("A")))
        );
        let glyphs = vec![glyph(&font, "box", 600, 0), glyph(&font, "box", 600, 0)];
        assert_eq!(
            register_all(&mut font, glyphs),
            Err(RegistrationError::DuplicateGlyphName(String::from("box")))
        );

        assert_eq!(font.cff.as_ref().unwrap().font.num_glyphs(), 3);
        assert_eq!(font.glyph_order.len(), 3);
        assert!(!font.glyphs_modified);
    }

    #[test]
    fn test_register_cid_keyed() {
        let mut font = load(&writer::cid_keyed_otf(&[1, 2, 42], true));
        let cid_count = font.cff.as_ref().unwrap().font.cid_count().unwrap();
        let glyphs = vec![glyph(&font, "x", 1000, 900), glyph(&font, "y", 1000, 1000)];
        let records = register_all(&mut font, glyphs).unwrap();

        assert_eq!(
            records
                .iter()
                .map(|record| (record.name.as_str(), record.glyph_id, record.cid))
                .collect::<Vec<_>>(),
            vec![("cid43", 4, Some(43)), ("cid44", 5, Some(44))]
        );
        let cff = font.cff.as_ref().unwrap();
        assert_eq!(cff.font.cid_count().unwrap(), cid_count + 2);
        match &cff.font.data {
            CFFVariant::CID(cid_data) => {
                assert_eq!(cid_data.fd_select.len(), 6);
                assert_eq!(cid_data.fd_select.font_dict_index(4), Some(0));
            }
            CFFVariant::Type1(_) => panic!("expected CID-keyed font"),
        }
        let vertical = font.vertical.as_ref().unwrap();
        assert_eq!(
            vertical.table.get(4),
            Some(LongHorMetric {
                advance_width: 900,
                lsb: 0
            })
        );
        assert_eq!(font.glyph_order.name(5), Some("cid44"));
    }

    #[test]
    fn test_fd_select_follows_previous_glyph() {
        let data = writer::cid_keyed_otf_with_font_dicts(&[1, 2, 3], &[0, 0, 1, 1], false);
        let mut font = load(&data);
        let glyphs = vec![glyph(&font, "x", 1000, 0)];
        register_all(&mut font, glyphs).unwrap();

        match &font.cff.as_ref().unwrap().font.data {
            CFFVariant::CID(cid_data) => {
                assert_eq!(cid_data.fd_select.font_dict_index(4), Some(1))
            }
            CFFVariant::Type1(_) => panic!("expected CID-keyed font"),
        }
    }

    #[test]
    fn test_empty_cid_charset() {
        let mut font = load(&writer::cid_keyed_otf(&[], false));
        let glyphs = vec![glyph(&font, "x", 1000, 0)];
        assert_eq!(
            register_all(&mut font, glyphs),
            Err(RegistrationError::EmptyCharset)
        );
        assert_eq!(font.cff.as_ref().unwrap().font.num_glyphs(), 1);
    }

    #[test]
    fn test_width_context_from_private_dict() {
        let font = load(&writer::cid_keyed_otf(&[1], false));
        let widths = width_context(&font).unwrap();
        assert_eq!(widths.default_width_x, 1000.);
        assert_eq!(widths.nominal_width_x, 0.);
    }
}
