//! OpenType font table parsing and writing.

pub mod cmap;

use crate::binary::read::{CheckIndex, ReadArray, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::write::{Placeholder, WriteBinary, WriteContext};
use crate::binary::{I16Be, I32Be, I64Be, U16Be, U32Be};
use crate::error::{ParseError, WriteError};
use crate::tag;

use std::borrow::Cow;
use std::convert::TryFrom;

/// Magic value identifying a CFF font (`OTTO`)
pub const CFF_MAGIC: u32 = tag::OTTO;

/// Magic number identifying TrueType 1.0
///
/// The version number 1.0 as a 16.16 fixed-point value, indicating TrueType glyph data.
pub const TTF_MAGIC: u32 = 0x00010000;

/// Magic value used by some older Apple TrueType fonts (`true`)
pub const TRUE_MAGIC: u32 = 0x74727565;

/// Magic value identifying a TrueType font collection `ttcf`
pub const TTCF_MAGIC: u32 = tag::TTCF;

/// 32-bit signed fixed-point number (16.16)
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Fixed(i32);

/// Date represented in number of seconds since 12:00 midnight, January 1, 1904
type LongDateTime = i64;

/// Access to the raw tables of a single font.
pub trait FontTableProvider {
    /// Return data for the specified table if present
    fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError>;

    fn has_table(&self, tag: u32) -> bool;

    /// The tags of all tables in the font, in directory order.
    fn table_tags(&self) -> Vec<u32>;

    fn read_table_data(&self, tag: u32) -> Result<Cow<'_, [u8]>, ParseError> {
        self.table_data(tag)?.ok_or(ParseError::MissingTable(tag))
    }
}

/// The size of the offsets in the `loca` table
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexToLocFormat {
    /// Offsets are 16-bit. The actual local offset divided by 2 is stored.
    Short,
    /// Offsets are 32-bit. The actual local offset is stored.
    Long,
}

pub struct OpenTypeFont<'a> {
    pub scope: ReadScope<'a>,
    pub data: OpenTypeData<'a>,
}

/// An OpenTypeFont containing a single font or a collection of fonts
pub enum OpenTypeData<'a> {
    Single(OffsetTable<'a>),
    Collection(TTCHeader<'a>),
}

/// TrueType collection header
pub struct TTCHeader<'a> {
    pub major_version: u16,
    pub minor_version: u16,
    pub offset_tables: ReadArray<'a, U32Be>,
}

/// OpenType Offset Table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font>
#[derive(Clone)]
pub struct OffsetTable<'a> {
    pub sfnt_version: u32,
    pub table_records: ReadArray<'a, TableRecord>,
}

pub struct OffsetTableFontProvider<'a> {
    scope: ReadScope<'a>,
    offset_table: OffsetTable<'a>,
}

/// An entry in the Offset Table
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Hash)]
pub struct TableRecord {
    pub table_tag: u32,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

/// `head` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/head>
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash)]
pub struct HeadTable {
    pub major_version: u16,
    pub minor_version: u16,
    pub font_revision: Fixed,
    pub check_sum_adjustment: u32,
    pub magic_number: u32,
    pub flags: u16,
    pub units_per_em: u16,
    pub created: LongDateTime,
    pub modified: LongDateTime,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub mac_style: u16,
    pub lowest_rec_ppem: u16,
    pub font_direction_hint: i16,
    pub index_to_loc_format: IndexToLocFormat,
    pub glyph_data_format: i16,
}

/// `hhea` horizontal header table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/hhea>
///
/// This struct is also used for the `vhea` table, where the fields hold the vertical
/// counterparts (`advance_width_max` is `advanceHeightMax`, and so on).
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash)]
pub struct HheaTable {
    /// Minor version, `vhea` uses 1.1 (`0x1000`) as well as 1.0.
    pub minor_version: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub advance_width_max: u16,
    pub min_left_side_bearing: i16,
    pub min_right_side_bearing: i16,
    pub x_max_extent: i16,
    pub caret_slope_rise: i16,
    pub caret_slope_run: i16,
    pub caret_offset: i16,
    pub num_h_metrics: u16,
}

/// `hmtx` horizontal metrics table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/hmtx>
///
/// Metrics are held expanded, one entry per glyph. The trailing run of glyphs sharing the last
/// advance is compressed again when the table is written. This struct is also used for the
/// `vmtx` table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HmtxTable {
    pub metrics: Vec<LongHorMetric>,
}

/// A `longHorMetric` record in the `hmtx` table.
///
/// This struct is also used for LongVerMetric `vmtx` table.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub struct LongHorMetric {
    pub advance_width: u16,
    pub lsb: i16,
}

/// maxp - Maximum profile
///
/// Fonts with CFF data must use Version 0.5 of this table, specifying only the numGlyphs field.
/// Fonts with TrueType outlines must use Version 1.0 of this table, where all data is required.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/maxp>
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash)]
pub struct MaxpTable {
    pub num_glyphs: u16,
    /// The remaining fields of a version 1.0 table, kept verbatim.
    pub version1_sub_table: Option<[u16; 13]>,
}

/// The vertical metrics of the `OS/2` table this crate makes use of.
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/os2>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Os2TypoMetrics {
    pub version: u16,
    pub s_typo_ascender: i16,
    pub s_typo_descender: i16,
    pub s_typo_line_gap: i16,
}

impl<'a> OpenTypeFont<'a> {
    pub fn num_fonts(&self) -> usize {
        match &self.data {
            OpenTypeData::Single(_) => 1,
            OpenTypeData::Collection(ttc) => ttc.offset_tables.len(),
        }
    }

    pub fn table_provider(&self, index: usize) -> Result<OffsetTableFontProvider<'a>, ParseError> {
        match &self.data {
            OpenTypeData::Single(offset_table) => Ok(OffsetTableFontProvider {
                offset_table: offset_table.clone(),
                scope: self.scope,
            }),
            OpenTypeData::Collection(ttc) => {
                ttc.offset_tables.check_index(index)?;
                let offset = usize::try_from(ttc.offset_tables.read_item(index)?)?;
                let offset_table = self.scope.offset(offset).read::<OffsetTable<'_>>()?;
                Ok(OffsetTableFontProvider {
                    offset_table,
                    scope: self.scope,
                })
            }
        }
    }
}

impl ReadBinary for OpenTypeFont<'_> {
    type HostType<'a> = OpenTypeFont<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<OpenTypeFont<'a>, ParseError> {
        let scope = ctxt.scope();
        let mut peek = ctxt.clone();
        let magic = peek.read_u32be()?;
        match magic {
            TTF_MAGIC | TRUE_MAGIC | CFF_MAGIC => {
                let offset_table = ctxt.read::<OffsetTable<'_>>()?;
                let font = OpenTypeData::Single(offset_table);
                Ok(OpenTypeFont { scope, data: font })
            }
            TTCF_MAGIC => {
                let ttc_header = ctxt.read::<TTCHeader<'_>>()?;
                let font = OpenTypeData::Collection(ttc_header);
                Ok(OpenTypeFont { scope, data: font })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for TTCHeader<'_> {
    type HostType<'a> = TTCHeader<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<TTCHeader<'a>, ParseError> {
        let ttc_tag = ctxt.read_u32be()?;
        ctxt.check_version(ttc_tag == TTCF_MAGIC)?;
        let major_version = ctxt.read_u16be()?;
        let minor_version = ctxt.read_u16be()?;
        ctxt.check(major_version == 1 || major_version == 2)?;
        let num_fonts = usize::try_from(ctxt.read_u32be()?)?;
        let offset_tables = ctxt.read_array::<U32Be>(num_fonts)?;
        Ok(TTCHeader {
            major_version,
            minor_version,
            offset_tables,
        })
    }
}

impl ReadBinary for OffsetTable<'_> {
    type HostType<'a> = OffsetTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<OffsetTable<'a>, ParseError> {
        let sfnt_version = ctxt.read_u32be()?;
        match sfnt_version {
            TTF_MAGIC | TRUE_MAGIC | CFF_MAGIC => {
                let num_tables = ctxt.read_u16be()?;
                let _search_range = ctxt.read_u16be()?;
                let _entry_selector = ctxt.read_u16be()?;
                let _range_shift = ctxt.read_u16be()?;
                let table_records = ctxt.read_array::<TableRecord>(usize::from(num_tables))?;
                Ok(OffsetTable {
                    sfnt_version,
                    table_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<'a> OffsetTableFontProvider<'a> {
    pub fn sfnt_version(&self) -> u32 {
        self.offset_table.sfnt_version
    }
}

impl<'a> FontTableProvider for OffsetTableFontProvider<'a> {
    fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError> {
        self.offset_table
            .read_table(&self.scope, tag)
            .map(|scope| scope.map(|scope| Cow::Borrowed(scope.data())))
    }

    fn has_table(&self, tag: u32) -> bool {
        self.offset_table.find_table_record(tag).is_some()
    }

    fn table_tags(&self) -> Vec<u32> {
        self.offset_table
            .table_records
            .iter()
            .map(|record| record.table_tag)
            .collect()
    }
}

impl ReadFrom for TableRecord {
    type ReadType = ((U32Be, U32Be), (U32Be, U32Be));
    fn read_from(((table_tag, checksum), (offset, length)): ((u32, u32), (u32, u32))) -> Self {
        TableRecord {
            table_tag,
            checksum,
            offset,
            length,
        }
    }
}

impl WriteBinary<&Self> for TableRecord {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &TableRecord) -> Result<(), WriteError> {
        U32Be::write(ctxt, table.table_tag)?;
        U32Be::write(ctxt, table.checksum)?;
        U32Be::write(ctxt, table.offset)?;
        U32Be::write(ctxt, table.length)?;

        Ok(())
    }
}

impl<'a> OffsetTable<'a> {
    pub fn find_table_record(&self, tag: u32) -> Option<TableRecord> {
        self.table_records
            .iter()
            .find(|table_record| table_record.table_tag == tag)
    }

    pub fn read_table(
        &self,
        scope: &ReadScope<'a>,
        tag: u32,
    ) -> Result<Option<ReadScope<'a>>, ParseError> {
        match self.find_table_record(tag) {
            Some(table_record) => table_record.read_table(scope).map(Some),
            None => Ok(None),
        }
    }
}

impl TableRecord {
    pub const SIZE: usize = 4 * 4;

    pub fn read_table<'a>(&self, scope: &ReadScope<'a>) -> Result<ReadScope<'a>, ParseError> {
        let offset = usize::try_from(self.offset)?;
        let length = usize::try_from(self.length)?;
        scope.offset_length(offset, length)
    }
}

impl ReadBinary for HeadTable {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let major_version = ctxt.read::<U16Be>()?;
        let minor_version = ctxt.read::<U16Be>()?;
        let font_revision = ctxt.read::<Fixed>()?;
        let check_sum_adjustment = ctxt.read::<U32Be>()?;
        let magic_number = ctxt.read::<U32Be>()?;
        ctxt.check(magic_number == 0x5F0F3CF5)?;
        let flags = ctxt.read::<U16Be>()?;
        let units_per_em = ctxt.read::<U16Be>()?;
        let created = ctxt.read::<I64Be>()?;
        let modified = ctxt.read::<I64Be>()?;
        let x_min = ctxt.read::<I16Be>()?;
        let y_min = ctxt.read::<I16Be>()?;
        let x_max = ctxt.read::<I16Be>()?;
        let y_max = ctxt.read::<I16Be>()?;
        let mac_style = ctxt.read::<U16Be>()?;
        let lowest_rec_ppem = ctxt.read::<U16Be>()?;
        let font_direction_hint = ctxt.read::<I16Be>()?;
        let index_to_loc_format = ctxt.read::<IndexToLocFormat>()?;
        let glyph_data_format = ctxt.read::<I16Be>()?;

        Ok(HeadTable {
            major_version,
            minor_version,
            font_revision,
            check_sum_adjustment,
            magic_number,
            flags,
            units_per_em,
            created,
            modified,
            x_min,
            y_min,
            x_max,
            y_max,
            mac_style,
            lowest_rec_ppem,
            font_direction_hint,
            index_to_loc_format,
            glyph_data_format,
        })
    }
}

impl WriteBinary<&Self> for HeadTable {
    type Output = Placeholder<U32Be, u32>;

    /// Writes the table to the `WriteContext` and returns a placeholder to the
    /// `check_sum_adjustment` field.
    ///
    /// The `check_sum_adjustment` field can only be calculated once the whole font has been
    /// written. See: https://docs.microsoft.com/en-us/typography/opentype/spec/head
    fn write<C: WriteContext>(ctxt: &mut C, table: &HeadTable) -> Result<Self::Output, WriteError> {
        U16Be::write(ctxt, table.major_version)?;
        U16Be::write(ctxt, table.minor_version)?;
        Fixed::write(ctxt, table.font_revision)?;
        let check_sum_adjustment = ctxt.placeholder()?;
        U32Be::write(ctxt, table.magic_number)?;
        U16Be::write(ctxt, table.flags)?;
        U16Be::write(ctxt, table.units_per_em)?;
        I64Be::write(ctxt, table.created)?;
        I64Be::write(ctxt, table.modified)?;
        I16Be::write(ctxt, table.x_min)?;
        I16Be::write(ctxt, table.y_min)?;
        I16Be::write(ctxt, table.x_max)?;
        I16Be::write(ctxt, table.y_max)?;
        U16Be::write(ctxt, table.mac_style)?;
        U16Be::write(ctxt, table.lowest_rec_ppem)?;
        I16Be::write(ctxt, table.font_direction_hint)?;
        IndexToLocFormat::write(ctxt, table.index_to_loc_format)?;
        I16Be::write(ctxt, table.glyph_data_format)?;

        Ok(check_sum_adjustment)
    }
}

impl ReadBinary for HheaTable {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let major_version = ctxt.read_u16be()?;
        let minor_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let ascender = ctxt.read_i16be()?;
        let descender = ctxt.read_i16be()?;
        let line_gap = ctxt.read_i16be()?;
        let advance_width_max = ctxt.read_u16be()?;
        let min_left_side_bearing = ctxt.read_i16be()?;
        let min_right_side_bearing = ctxt.read_i16be()?;
        let x_max_extent = ctxt.read_i16be()?;
        let caret_slope_rise = ctxt.read_i16be()?;
        let caret_slope_run = ctxt.read_i16be()?;
        let caret_offset = ctxt.read_i16be()?;
        let _reserved = ctxt.read_slice(4 * 2)?;
        let metric_data_format = ctxt.read_i16be()?;
        ctxt.check(metric_data_format == 0)?;
        let num_h_metrics = ctxt.read_u16be()?;

        Ok(HheaTable {
            minor_version,
            ascender,
            descender,
            line_gap,
            advance_width_max,
            min_left_side_bearing,
            min_right_side_bearing,
            x_max_extent,
            caret_slope_rise,
            caret_slope_run,
            caret_offset,
            num_h_metrics,
        })
    }
}

impl WriteBinary<&Self> for HheaTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &HheaTable) -> Result<(), WriteError> {
        U16Be::write(ctxt, 1u16)?; // major_version
        U16Be::write(ctxt, table.minor_version)?;

        I16Be::write(ctxt, table.ascender)?;
        I16Be::write(ctxt, table.descender)?;
        I16Be::write(ctxt, table.line_gap)?;
        U16Be::write(ctxt, table.advance_width_max)?;
        I16Be::write(ctxt, table.min_left_side_bearing)?;
        I16Be::write(ctxt, table.min_right_side_bearing)?;
        I16Be::write(ctxt, table.x_max_extent)?;
        I16Be::write(ctxt, table.caret_slope_rise)?;
        I16Be::write(ctxt, table.caret_slope_run)?;
        I16Be::write(ctxt, table.caret_offset)?;
        ctxt.write_zeros(4 * 2)?; // reserved
        I16Be::write(ctxt, 0i16)?; // metric_data_format
        U16Be::write(ctxt, table.num_h_metrics)?;

        Ok(())
    }
}

impl ReadBinaryDep for HmtxTable {
    type Args<'a> = (usize, usize); // num_glyphs, num_h_metrics
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (num_glyphs, num_h_metrics): (usize, usize),
    ) -> Result<Self, ParseError> {
        ctxt.check(num_h_metrics > 0 || num_glyphs == 0)?;
        let num_h_metrics = num_h_metrics.min(num_glyphs);
        let h_metrics = ctxt.read_array::<LongHorMetric>(num_h_metrics)?;
        let left_side_bearings = ctxt.read_array::<I16Be>(num_glyphs - num_h_metrics)?;

        // The advance width of the last record applies to all remaining glyph IDs.
        let last_advance = h_metrics.last().map_or(0, |metric| metric.advance_width);
        let mut metrics = h_metrics.to_vec();
        metrics.extend(left_side_bearings.iter().map(|lsb| LongHorMetric {
            advance_width: last_advance,
            lsb,
        }));
        Ok(HmtxTable { metrics })
    }
}

impl WriteBinary<&Self> for HmtxTable {
    /// The number of long metrics written, for the `numberOfHMetrics` header field.
    type Output = u16;

    fn write<C: WriteContext>(ctxt: &mut C, table: &HmtxTable) -> Result<u16, WriteError> {
        let num_h_metrics = table.num_long_metrics();
        let (long, short) = table.metrics.split_at(num_h_metrics);
        ctxt.write_iter::<LongHorMetric, _>(long.iter().copied())?;
        ctxt.write_iter::<I16Be, _>(short.iter().map(|metric| metric.lsb))?;

        Ok(u16::try_from(num_h_metrics)?)
    }
}

impl HmtxTable {
    /// Number of records that need a full `longHorMetric` entry.
    ///
    /// Trailing glyphs that share the advance of the last long record are stored as side
    /// bearings only.
    pub fn num_long_metrics(&self) -> usize {
        let Some(last) = self.metrics.last() else {
            return 0;
        };
        let shared = self
            .metrics
            .iter()
            .rev()
            .take_while(|metric| metric.advance_width == last.advance_width)
            .count();
        self.metrics.len() - shared + 1
    }

    /// Set the metrics of `glyph_id`, growing the table if needed.
    ///
    /// Glyphs added to fill a gap get a zero advance and side bearing.
    pub fn upsert(&mut self, glyph_id: u16, metric: LongHorMetric) {
        let index = usize::from(glyph_id);
        if index >= self.metrics.len() {
            self.metrics.resize(index + 1, LongHorMetric::default());
        }
        self.metrics[index] = metric;
    }

    pub fn get(&self, glyph_id: u16) -> Option<LongHorMetric> {
        self.metrics.get(usize::from(glyph_id)).copied()
    }

    pub fn max_advance(&self) -> u16 {
        self.metrics
            .iter()
            .map(|metric| metric.advance_width)
            .max()
            .unwrap_or(0)
    }
}

impl ReadFrom for LongHorMetric {
    type ReadType = (U16Be, I16Be);
    fn read_from((advance_width, lsb): (u16, i16)) -> Self {
        LongHorMetric { advance_width, lsb }
    }
}

impl WriteBinary for LongHorMetric {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, metric: LongHorMetric) -> Result<(), WriteError> {
        U16Be::write(ctxt, metric.advance_width)?;
        I16Be::write(ctxt, metric.lsb)?;

        Ok(())
    }
}

impl ReadBinary for MaxpTable {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == 0x00005000 || version == 0x00010000)?;
        let num_glyphs = ctxt.read_u16be()?;
        let version1_sub_table = if version == 0x00010000 {
            let fields = ctxt.read_array::<U16Be>(13)?;
            let mut sub_table = [0; 13];
            sub_table
                .iter_mut()
                .zip(fields.iter())
                .for_each(|(dst, src)| *dst = src);
            Some(sub_table)
        } else {
            None
        };
        Ok(MaxpTable {
            num_glyphs,
            version1_sub_table,
        })
    }
}

impl WriteBinary<&Self> for MaxpTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &MaxpTable) -> Result<(), WriteError> {
        if let Some(sub_table) = &table.version1_sub_table {
            U32Be::write(ctxt, 0x00010000u32)?; // version 1.0
            U16Be::write(ctxt, table.num_glyphs)?;
            ctxt.write_iter::<U16Be, _>(sub_table.iter().copied())?;
        } else {
            U32Be::write(ctxt, 0x00005000u32)?; // version 0.5
            U16Be::write(ctxt, table.num_glyphs)?;
        }
        Ok(())
    }
}

impl ReadBinary for Os2TypoMetrics {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let version = ctxt.read_u16be()?;
        // xAvgCharWidth through usLastCharIndex
        let _skipped = ctxt.read_slice(66)?;
        // Legacy version 0 tables can end before the typographic metrics.
        let s_typo_ascender = ctxt.read_i16be()?;
        let s_typo_descender = ctxt.read_i16be()?;
        let s_typo_line_gap = ctxt.read_i16be()?;
        Ok(Os2TypoMetrics {
            version,
            s_typo_ascender,
            s_typo_descender,
            s_typo_line_gap,
        })
    }
}

impl ReadBinary for IndexToLocFormat {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let index_to_loc_format = ctxt.read_i16be()?;

        match index_to_loc_format {
            0 => Ok(IndexToLocFormat::Short),
            1 => Ok(IndexToLocFormat::Long),
            _ => Err(ParseError::BadValue),
        }
    }
}

impl WriteBinary for IndexToLocFormat {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, index_to_loc_format: Self) -> Result<(), WriteError> {
        match index_to_loc_format {
            IndexToLocFormat::Short => I16Be::write(ctxt, 0i16),
            IndexToLocFormat::Long => I16Be::write(ctxt, 1i16),
        }
    }
}

impl Fixed {
    pub fn new(value: i32) -> Fixed {
        Fixed(value)
    }
}

impl ReadFrom for Fixed {
    type ReadType = I32Be;

    fn read_from(value: i32) -> Self {
        Fixed(value)
    }
}

impl WriteBinary for Fixed {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, val: Self) -> Result<(), WriteError> {
        I32Be::write(ctxt, val.0)
    }
}

impl From<Fixed> for f32 {
    fn from(value: Fixed) -> f32 {
        (f64::from(value.0) / 65536.0) as f32
    }
}

impl<T: FontTableProvider> FontTableProvider for Box<T> {
    fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError> {
        self.as_ref().table_data(tag)
    }

    fn has_table(&self, tag: u32) -> bool {
        self.as_ref().has_table(tag)
    }

    fn table_tags(&self) -> Vec<u32> {
        self.as_ref().table_tags()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::WriteBuffer;
    use crate::tests::writer;

    #[test]
    fn test_write_head_table() {
        let head_data = writer::head_table(1000);
        let head = ReadScope::new(&head_data).read::<HeadTable>().unwrap();
        assert_eq!(head.units_per_em, 1000);

        let mut ctxt = WriteBuffer::new();
        let placeholder = HeadTable::write(&mut ctxt, &head).unwrap();
        ctxt.write_placeholder(placeholder, head.check_sum_adjustment)
            .unwrap();

        assert_eq!(ctxt.bytes(), &head_data[..]);
    }

    #[test]
    fn test_hmtx_expands_and_compresses() {
        // Two long metrics followed by two side bearings sharing the last advance
        let data = [
            0x01, 0xF4, 0x00, 0x00, // 500, 0
            0x03, 0xE8, 0x00, 0x0A, // 1000, 10
            0x00, 0x14, // 20
            0x00, 0x1E, // 30
        ];
        let hmtx = ReadScope::new(&data).read_dep::<HmtxTable>((4, 2)).unwrap();
        assert_eq!(hmtx.metrics.len(), 4);
        assert_eq!(
            hmtx.get(3),
            Some(LongHorMetric {
                advance_width: 1000,
                lsb: 30
            })
        );

        let mut ctxt = WriteBuffer::new();
        let num_h_metrics = HmtxTable::write(&mut ctxt, &hmtx).unwrap();
        assert_eq!(num_h_metrics, 2);
        assert_eq!(ctxt.bytes(), &data[..]);
    }

    #[test]
    fn test_hmtx_upsert_grows() {
        let mut hmtx = HmtxTable::default();
        hmtx.upsert(
            2,
            LongHorMetric {
                advance_width: 1000,
                lsb: 0,
            },
        );
        assert_eq!(hmtx.metrics.len(), 3);
        assert_eq!(hmtx.num_long_metrics(), 3);
        assert_eq!(hmtx.max_advance(), 1000);
    }

    #[test]
    fn test_maxp_round_trip() {
        let data = [0x00, 0x00, 0x50, 0x00, 0x01, 0x02];
        let maxp = ReadScope::new(&data).read::<MaxpTable>().unwrap();
        assert_eq!(maxp.num_glyphs, 0x102);

        let mut ctxt = WriteBuffer::new();
        MaxpTable::write(&mut ctxt, &maxp).unwrap();
        assert_eq!(ctxt.bytes(), &data[..]);
    }

    #[test]
    fn test_os2_typo_descender() {
        let data = writer::os2_table(800, -200);
        let os2 = ReadScope::new(&data).read::<Os2TypoMetrics>().unwrap();
        assert_eq!(os2.s_typo_descender, -200);
        assert_eq!(os2.s_typo_ascender, 800);
    }

    #[test]
    fn test_bad_magic() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF, 0, 0];
        assert_eq!(
            ReadScope::new(&data).read::<OpenTypeFont<'_>>().err(),
            Some(ParseError::BadVersion)
        );
    }

    #[test]
    fn f32_from_fixed() {
        assert_eq!(f32::from(Fixed(0x0001_0000)), 1.0);
        assert_eq!(f32::from(Fixed(0x7fff_0000)), 32767.);
    }
}
