//! Reading of the `cmap` table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/cmap>

use std::convert::TryFrom;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::{I16Be, U16Be, U32Be, U8};
use crate::error::ParseError;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlatformId(pub u16);

impl PlatformId {
    pub const UNICODE: PlatformId = PlatformId(0);
    pub const MACINTOSH: PlatformId = PlatformId(1);
    pub const WINDOWS: PlatformId = PlatformId(3);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingId(pub u16);

impl EncodingId {
    pub const WINDOWS_UNICODE_BMP_UCS2: EncodingId = EncodingId(1);
    pub const WINDOWS_UNICODE_UCS4: EncodingId = EncodingId(10);
}

/// Subtables considered when building a Unicode mapping, most preferred first.
const UNICODE_SUBTABLE_PREFERENCE: [(PlatformId, EncodingId); 8] = [
    (PlatformId::WINDOWS, EncodingId::WINDOWS_UNICODE_UCS4),
    (PlatformId::UNICODE, EncodingId(6)),
    (PlatformId::UNICODE, EncodingId(4)),
    (PlatformId::WINDOWS, EncodingId::WINDOWS_UNICODE_BMP_UCS2),
    (PlatformId::UNICODE, EncodingId(3)),
    (PlatformId::UNICODE, EncodingId(2)),
    (PlatformId::UNICODE, EncodingId(1)),
    (PlatformId::UNICODE, EncodingId(0)),
];

pub struct Cmap<'a> {
    pub scope: ReadScope<'a>,
    encoding_records: ReadArray<'a, EncodingRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EncodingRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub offset: u32,
}

pub enum CmapSubtable<'a> {
    Format0 {
        glyph_id_array: ReadArray<'a, U8>,
    },
    Format4 {
        end_codes: ReadArray<'a, U16Be>,
        start_codes: ReadArray<'a, U16Be>,
        id_deltas: ReadArray<'a, I16Be>,
        id_range_offsets: ReadArray<'a, U16Be>,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format6 {
        first_code: u16,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format10 {
        start_char_code: u32,
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    Format12 {
        groups: ReadArray<'a, SequentialMapGroup>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SequentialMapGroup {
    pub start_char_code: u32,
    pub end_char_code: u32,
    pub start_glyph_id: u32,
}

impl ReadBinary for Cmap<'_> {
    type HostType<'a> = Cmap<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Cmap<'a>, ParseError> {
        let scope = ctxt.scope();
        let version = ctxt.read_u16be()?;
        ctxt.check(version == 0)?;
        let num_tables = usize::from(ctxt.read_u16be()?);
        let encoding_records = ctxt.read_array::<EncodingRecord>(num_tables)?;
        Ok(Cmap {
            scope,
            encoding_records,
        })
    }
}

impl ReadFrom for EncodingRecord {
    type ReadType = (U16Be, U16Be, U32Be);
    fn read_from((platform_id, encoding_id, offset): (u16, u16, u32)) -> Self {
        EncodingRecord {
            platform_id,
            encoding_id,
            offset,
        }
    }
}

impl ReadFrom for SequentialMapGroup {
    type ReadType = (U32Be, U32Be, U32Be);
    fn read_from((start_char_code, end_char_code, start_glyph_id): (u32, u32, u32)) -> Self {
        SequentialMapGroup {
            start_char_code,
            end_char_code,
            start_glyph_id,
        }
    }
}

impl ReadBinary for CmapSubtable<'_> {
    type HostType<'a> = CmapSubtable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<CmapSubtable<'a>, ParseError> {
        let subtable_format = ctxt.read_u16be()?;
        match subtable_format {
            0 => {
                let length = usize::from(ctxt.read_u16be()?);
                ctxt.check(length >= 3 * 2 + 256)?;
                let _language = ctxt.read_u16be()?;
                let glyph_id_array = ctxt.read_array::<U8>(256)?;
                Ok(CmapSubtable::Format0 { glyph_id_array })
            }
            4 => {
                let length = usize::from(ctxt.read_u16be()?);
                let _language = ctxt.read_u16be()?;
                let seg_count_x2 = usize::from(ctxt.read_u16be()?);
                ctxt.check((seg_count_x2 & 1) == 0)?;
                let seg_count = seg_count_x2 >> 1;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let end_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let _reserved_pad = ctxt.read_u16be()?;
                let start_codes = ctxt.read_array::<U16Be>(seg_count)?;
                let id_deltas = ctxt.read_array::<I16Be>(seg_count)?;
                let id_range_offsets = ctxt.read_array::<U16Be>(seg_count)?;
                let header_len = (8 + (4 * seg_count)) * 2;
                // Some fonts have a bogus length, only read the glyph ids that are present
                let num_indices = length.saturating_sub(header_len) / 2;
                let available = ctxt.scope().data().len() / 2;
                let glyph_id_array = ctxt.read_array::<U16Be>(num_indices.min(available))?;
                Ok(CmapSubtable::Format4 {
                    end_codes,
                    start_codes,
                    id_deltas,
                    id_range_offsets,
                    glyph_id_array,
                })
            }
            6 => {
                let _length = ctxt.read_u16be()?;
                let _language = ctxt.read_u16be()?;
                let first_code = ctxt.read_u16be()?;
                let entry_count = usize::from(ctxt.read_u16be()?);
                let glyph_id_array = ctxt.read_array::<U16Be>(entry_count)?;
                Ok(CmapSubtable::Format6 {
                    first_code,
                    glyph_id_array,
                })
            }
            10 => {
                let reserved = ctxt.read_u16be()?;
                ctxt.check(reserved == 0)?;
                let _length = ctxt.read_u32be()?;
                let _language = ctxt.read_u32be()?;
                let start_char_code = ctxt.read_u32be()?;
                let num_chars = usize::try_from(ctxt.read_u32be()?)?;
                let glyph_id_array = ctxt.read_array::<U16Be>(num_chars)?;
                Ok(CmapSubtable::Format10 {
                    start_char_code,
                    glyph_id_array,
                })
            }
            12 => {
                let reserved = ctxt.read_u16be()?;
                ctxt.check(reserved == 0)?;
                let _length = ctxt.read_u32be()?;
                let _language = ctxt.read_u32be()?;
                let num_groups = usize::try_from(ctxt.read_u32be()?)?;
                let groups = ctxt.read_array::<SequentialMapGroup>(num_groups)?;
                Ok(CmapSubtable::Format12 { groups })
            }
            _ => Err(ParseError::NotImplemented),
        }
    }
}

impl<'a> Cmap<'a> {
    /// Find the first encoding record for the given `platform_id` and `encoding_id`
    pub fn find_subtable(
        &self,
        platform_id: PlatformId,
        encoding_id: EncodingId,
    ) -> Option<EncodingRecord> {
        self.encoding_records.iter().find(|record| {
            record.platform_id == platform_id.0 && record.encoding_id == encoding_id.0
        })
    }

    pub fn read_subtable(&self, record: EncodingRecord) -> Result<CmapSubtable<'a>, ParseError> {
        let offset = usize::try_from(record.offset)?;
        self.scope.offset(offset).read::<CmapSubtable<'_>>()
    }

    /// Return the most preferred Unicode subtable present in this `cmap`.
    ///
    /// Subtables in a format this module does not read are passed over in favour of the next
    /// candidate.
    pub fn best_unicode_subtable(&self) -> Result<Option<CmapSubtable<'a>>, ParseError> {
        for (platform_id, encoding_id) in UNICODE_SUBTABLE_PREFERENCE {
            let Some(record) = self.find_subtable(platform_id, encoding_id) else {
                continue;
            };
            match self.read_subtable(record) {
                Ok(subtable) => return Ok(Some(subtable)),
                Err(ParseError::NotImplemented) => {
                    log::warn!(
                        "skipping cmap subtable ({}, {}) in an unsupported format",
                        platform_id.0,
                        encoding_id.0
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

impl<'a> CmapSubtable<'a> {
    pub fn map_glyph(&self, ch: u32) -> Result<Option<u16>, ParseError> {
        match self {
            CmapSubtable::Format0 { glyph_id_array } => {
                let index = usize::try_from(ch)?;
                Ok(glyph_id_array.get_item(index).map(u16::from))
            }
            CmapSubtable::Format4 {
                end_codes,
                start_codes,
                id_deltas,
                id_range_offsets,
                glyph_id_array,
            } => {
                let segment = end_codes
                    .iter()
                    .zip(start_codes.iter())
                    .position(|(end, start)| u32::from(start) <= ch && ch <= u32::from(end));
                match segment {
                    Some(i) => format4_glyph(
                        ch,
                        i,
                        start_codes,
                        id_deltas,
                        id_range_offsets,
                        glyph_id_array,
                    )
                    .map(Some),
                    None => Ok(None),
                }
            }
            CmapSubtable::Format6 {
                first_code,
                glyph_id_array,
            } => match ch.checked_sub(u32::from(*first_code)) {
                Some(index) => Ok(glyph_id_array.get_item(usize::try_from(index)?)),
                None => Ok(None),
            },
            CmapSubtable::Format10 {
                start_char_code,
                glyph_id_array,
            } => match ch.checked_sub(*start_char_code) {
                Some(index) => Ok(glyph_id_array.get_item(usize::try_from(index)?)),
                None => Ok(None),
            },
            CmapSubtable::Format12 { groups } => {
                for group in groups {
                    if group.start_char_code <= ch && ch <= group.end_char_code {
                        let glyph_id = group.start_glyph_id + (ch - group.start_char_code);
                        return Ok(Some(u16::try_from(glyph_id)?));
                    }
                }
                Ok(None)
            }
        }
    }

    /// Call `f` with every character and glyph id pair mapped by this subtable.
    ///
    /// Characters mapped to glyph 0 are skipped. When more than one segment covers a character
    /// only the first is reported.
    pub fn mappings_fn<F: FnMut(u32, u16)>(&self, mut f: F) -> Result<(), ParseError> {
        match self {
            CmapSubtable::Format0 { glyph_id_array } => {
                for (ch, glyph_id) in glyph_id_array.iter().enumerate() {
                    if glyph_id != 0 {
                        f(ch as u32, u16::from(glyph_id));
                    }
                }
            }
            CmapSubtable::Format4 {
                end_codes,
                start_codes,
                id_deltas,
                id_range_offsets,
                glyph_id_array,
            } => {
                let mut last_end: Option<u32> = None;
                for (i, (start, end)) in start_codes.iter().zip(end_codes.iter()).enumerate() {
                    let (start, end) = (u32::from(start), u32::from(end));
                    if start == 0xFFFF {
                        // Sentinel segment
                        continue;
                    }
                    let first = match last_end {
                        Some(last_end) => start.max(last_end + 1),
                        None => start,
                    };
                    for ch in first..=end {
                        let glyph_id = format4_glyph(
                            ch,
                            i,
                            start_codes,
                            id_deltas,
                            id_range_offsets,
                            glyph_id_array,
                        )?;
                        if glyph_id != 0 {
                            f(ch, glyph_id);
                        }
                    }
                    last_end = Some(last_end.map_or(end, |last| last.max(end)));
                }
            }
            CmapSubtable::Format6 {
                first_code,
                glyph_id_array,
            } => {
                let first_code = u32::from(*first_code);
                for (index, glyph_id) in glyph_id_array.iter().enumerate() {
                    if glyph_id != 0 {
                        f(first_code + index as u32, glyph_id);
                    }
                }
            }
            CmapSubtable::Format10 {
                start_char_code,
                glyph_id_array,
            } => {
                for (index, glyph_id) in glyph_id_array.iter().enumerate() {
                    if glyph_id != 0 {
                        f(start_char_code + index as u32, glyph_id);
                    }
                }
            }
            CmapSubtable::Format12 { groups } => {
                for group in groups {
                    if group.end_char_code < group.start_char_code
                        || group.end_char_code > 0x10FFFF
                    {
                        return Err(ParseError::BadValue);
                    }
                    for ch in group.start_char_code..=group.end_char_code {
                        let glyph_id = group.start_glyph_id + (ch - group.start_char_code);
                        let glyph_id = u16::try_from(glyph_id)?;
                        if glyph_id != 0 {
                            f(ch, glyph_id);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn format4_glyph(
    ch: u32,
    segment: usize,
    start_codes: &ReadArray<'_, U16Be>,
    id_deltas: &ReadArray<'_, I16Be>,
    id_range_offsets: &ReadArray<'_, U16Be>,
    glyph_id_array: &ReadArray<'_, U16Be>,
) -> Result<u16, ParseError> {
    let start_code = u32::from(start_codes.read_item(segment)?);
    let id_delta = i32::from(id_deltas.read_item(segment)?);
    let id_range_offset = usize::from(id_range_offsets.read_item(segment)?);
    if id_range_offset == 0 {
        // The idDelta arithmetic is modulo 65536.
        return Ok(((ch as i32 + id_delta) & 0xFFFF) as u16);
    }

    // idRangeOffset is relative to its own position in the idRangeOffset array
    let glyph_id_offset = id_range_offset + segment * 2 + ((ch - start_code) as usize) * 2;
    let seg_count = id_range_offsets.len();
    if glyph_id_offset < seg_count * 2 || (glyph_id_offset & 1) != 0 {
        return Err(ParseError::BadIndex);
    }
    let index = (glyph_id_offset >> 1) - seg_count;
    match glyph_id_array.read_item(index)? {
        0 => Ok(0),
        glyph_id => Ok(((i32::from(glyph_id) + id_delta) & 0xFFFF) as u16),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::writer;

    #[test]
    fn test_format4_mappings() {
        let data = writer::cmap_format4(&[(0x41, 1), (0x42, 2), (0x44, 3), (0xAC00, 4)]);
        let cmap = ReadScope::new(&data).read::<Cmap<'_>>().unwrap();
        let subtable = cmap.best_unicode_subtable().unwrap().unwrap();

        let mut mappings = Vec::new();
        subtable.mappings_fn(|ch, gid| mappings.push((ch, gid))).unwrap();
        assert_eq!(
            mappings,
            vec![(0x41, 1), (0x42, 2), (0x44, 3), (0xAC00, 4)]
        );
        assert_eq!(subtable.map_glyph(0x44).unwrap(), Some(3));
        assert_eq!(subtable.map_glyph(0x43).unwrap(), None);
    }

    #[test]
    fn test_prefers_ucs4_subtable() {
        let data = writer::cmap_with_format12(&[(0x41, 1)], &[(0x1F600, 7)]);
        let cmap = ReadScope::new(&data).read::<Cmap<'_>>().unwrap();
        let subtable = cmap.best_unicode_subtable().unwrap().unwrap();
        assert!(matches!(subtable, CmapSubtable::Format12 { .. }));
        assert_eq!(subtable.map_glyph(0x1F600).unwrap(), Some(7));
    }
}
