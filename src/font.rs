//! The tables of one open font and the order of its glyphs.

use std::collections::{BTreeMap, HashSet};
use std::convert::TryFrom;

use log::{debug, warn};
use rustc_hash::FxHashMap;

use crate::binary::read::ReadScope;
use crate::cff::CFF;
use crate::error::{ParseError, ReadWriteError};
use crate::font_builder::{FontBuilder, FontBuilderWithHead};
use crate::gsub::GsubTable;
use crate::post::PostTable;
use crate::tables::cmap::Cmap;
use crate::tables::{
    FontTableProvider, HeadTable, HheaTable, HmtxTable, MaxpTable, Os2TypoMetrics,
};
use crate::tag;

/// Map from Unicode code point to glyph name.
pub type CmapSnapshot = BTreeMap<u32, String>;

/// The names of a font's glyphs, indexed by glyph id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlyphOrder {
    names: Vec<String>,
    ids: FxHashMap<String, u16>,
}

/// A metrics header and its table, `hhea`/`hmtx` or `vhea`/`vmtx`.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub header: HheaTable,
    pub table: HmtxTable,
}

/// The parsed tables of one font.
///
/// Tables this crate edits are held parsed; every other table is kept as the bytes it was read
/// from and written back unchanged.
pub struct FontHandle {
    pub sfnt_version: u32,
    tables: BTreeMap<u32, Vec<u8>>,
    pub head: HeadTable,
    pub maxp: MaxpTable,
    pub horizontal: Metrics,
    pub vertical: Option<Metrics>,
    pub post: Option<PostTable>,
    pub cff: Option<CFF>,
    /// The GSUB table, only present once it has been replaced.
    pub gsub: Option<GsubTable>,
    pub glyph_order: GlyphOrder,
    /// Set once glyphs have been added and the glyph tables need to be written out.
    pub glyphs_modified: bool,
}

impl GlyphOrder {
    /// Build a glyph order from `names`.
    ///
    /// A name that is already taken gets a `#<n>` suffix, the first free `n` counting from 1.
    pub fn new(names: Vec<String>) -> Self {
        let mut order = GlyphOrder {
            names: Vec::with_capacity(names.len()),
            ids: FxHashMap::default(),
        };
        let taken = names.iter().cloned().collect::<HashSet<_>>();
        for name in names {
            let name = if order.ids.contains_key(&name) {
                let unique = (1..)
                    .map(|n| format!("{}#{}", name, n))
                    .find(|candidate| {
                        !order.ids.contains_key(candidate) && !taken.contains(candidate)
                    })
                    .unwrap_or_default();
                warn!("duplicate glyph name '{}' renamed to '{}'", name, unique);
                unique
            } else {
                name
            };
            order.push(name);
        }
        order
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, glyph_id: u16) -> Option<&str> {
        self.names.get(usize::from(glyph_id)).map(String::as_str)
    }

    pub fn glyph_id(&self, name: &str) -> Option<u16> {
        self.ids.get(name).copied()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Append `name`, returning its glyph id.
    ///
    /// Returns `None` without adding the name if the order is already at the glyph id limit.
    pub fn push(&mut self, name: String) -> Option<u16> {
        let glyph_id = u16::try_from(self.names.len()).ok()?;
        self.ids.entry(name.clone()).or_insert(glyph_id);
        self.names.push(name);
        Some(glyph_id)
    }
}

impl FontHandle {
    /// Parse the tables of the font supplied by `provider`.
    pub fn load(
        provider: &impl FontTableProvider,
        sfnt_version: u32,
    ) -> Result<FontHandle, ParseError> {
        let mut tables = BTreeMap::new();
        for table_tag in provider.table_tags() {
            let data = provider.read_table_data(table_tag)?;
            tables.insert(table_tag, data.into_owned());
        }

        let head = required_table(&tables, tag::HEAD)?.read::<HeadTable>()?;
        let maxp = required_table(&tables, tag::MAXP)?.read::<MaxpTable>()?;
        let num_glyphs = usize::from(maxp.num_glyphs);
        let horizontal = read_metrics(&tables, tag::HHEA, tag::HMTX, num_glyphs)?
            .ok_or(ParseError::MissingTable(tag::HHEA))?;
        let vertical = match read_metrics(&tables, tag::VHEA, tag::VMTX, num_glyphs) {
            Ok(vertical) => vertical,
            Err(err) => {
                warn!("ignoring unreadable vertical metrics: {}", err);
                None
            }
        };
        let post = match tables.get(&tag::POST) {
            Some(data) => match ReadScope::new(data).read::<PostTable>() {
                Ok(post) => Some(post),
                Err(err) => {
                    warn!("post table kept verbatim, unable to read it: {}", err);
                    None
                }
            },
            None => None,
        };
        let cff = tables
            .get(&tag::CFF)
            .map(|data| ReadScope::new(data).read::<CFF>())
            .transpose()?;

        let names = match &cff {
            Some(cff) => {
                if cff.font.num_glyphs() != num_glyphs {
                    warn!(
                        "maxp has {} glyphs but CFF has {}, using the CFF count",
                        num_glyphs,
                        cff.font.num_glyphs()
                    );
                }
                cff.glyph_names()?
            }
            None => (0..maxp.num_glyphs)
                .map(|glyph_id| {
                    post.as_ref()
                        .and_then(|post| post.glyph_name(glyph_id))
                        .map(String::from)
                        .unwrap_or_else(|| numbered_glyph_name(glyph_id))
                })
                .collect(),
        };
        let glyph_order = GlyphOrder::new(names);

        debug!(
            "loaded font with {} tables and {} glyphs",
            tables.len(),
            glyph_order.len()
        );

        Ok(FontHandle {
            sfnt_version,
            tables,
            head,
            maxp,
            horizontal,
            vertical,
            post,
            cff,
            gsub: None,
            glyph_order,
            glyphs_modified: false,
        })
    }

    pub fn num_glyphs(&self) -> usize {
        self.glyph_order.len()
    }

    /// The raw data of the table `tag` as it was read.
    pub fn table_data(&self, tag: u32) -> Option<&[u8]> {
        self.tables.get(&tag).map(Vec::as_slice)
    }

    /// The typographic metrics of the `OS/2` table, if the font has one.
    pub fn os2_typo_metrics(&self) -> Result<Option<Os2TypoMetrics>, ParseError> {
        self.tables
            .get(&tag::OS_2)
            .map(|data| ReadScope::new(data).read::<Os2TypoMetrics>())
            .transpose()
    }

    /// The GSUB table of the font, the replacement if there is one.
    pub fn gsub_table(&self) -> Result<Option<GsubTable>, ParseError> {
        if let Some(gsub) = &self.gsub {
            return Ok(Some(gsub.clone()));
        }
        self.tables
            .get(&tag::GSUB)
            .map(|data| ReadScope::new(data).read::<GsubTable>())
            .transpose()
    }

    /// Map every Unicode code point in the best Unicode `cmap` subtable to a glyph name.
    ///
    /// Fonts without a `cmap` table, or without a Unicode subtable, give an empty map. Glyph ids
    /// beyond the end of the font are skipped.
    pub fn cmap_snapshot(&self) -> Result<CmapSnapshot, ParseError> {
        let mut snapshot = CmapSnapshot::new();
        let Some(data) = self.tables.get(&tag::CMAP) else {
            return Ok(snapshot);
        };
        let cmap = ReadScope::new(data).read::<Cmap<'_>>()?;
        let Some(subtable) = cmap.best_unicode_subtable()? else {
            warn!("cmap has no Unicode subtable");
            return Ok(snapshot);
        };
        subtable.mappings_fn(|ch, glyph_id| {
            if let Some(name) = self.glyph_order.name(glyph_id) {
                snapshot.insert(ch, name.to_owned());
            }
        })?;
        Ok(snapshot)
    }

    /// Serialise the font into a single sfnt.
    ///
    /// With `recalc_metrics_maxima` the `advanceWidthMax`/`advanceHeightMax` fields of the metrics
    /// headers are updated to cover added glyphs.
    pub fn to_bytes(&self, recalc_metrics_maxima: bool) -> Result<Vec<u8>, ReadWriteError> {
        let mut builder = FontBuilder::new(self.sfnt_version).add_head_table(&self.head)?;

        for (&table_tag, data) in &self.tables {
            if table_tag == tag::HEAD || self.is_rebuilt(table_tag) {
                continue;
            }
            builder.add_raw_table(table_tag, data)?;
        }

        if let Some(gsub) = &self.gsub {
            builder.add_table::<_, GsubTable>(tag::GSUB, gsub, ())?;
        }

        if self.glyphs_modified {
            if let Some(cff) = &self.cff {
                builder.add_table::<_, CFF>(tag::CFF, cff, ())?;
            }
            builder.add_table::<_, MaxpTable>(tag::MAXP, &self.maxp, ())?;
            if let Some(post) = &self.post {
                builder.add_table::<_, PostTable>(tag::POST, post, ())?;
            }
            write_metrics(
                &mut builder,
                &self.horizontal,
                (tag::HHEA, tag::HMTX),
                recalc_metrics_maxima,
            )?;
            if let Some(vertical) = &self.vertical {
                write_metrics(
                    &mut builder,
                    vertical,
                    (tag::VHEA, tag::VMTX),
                    recalc_metrics_maxima,
                )?;
            }
        }

        builder.data()
    }

    fn is_rebuilt(&self, table_tag: u32) -> bool {
        match table_tag {
            tag::GSUB => self.gsub.is_some(),
            tag::CFF => self.glyphs_modified && self.cff.is_some(),
            tag::POST => self.glyphs_modified && self.post.is_some(),
            tag::VHEA | tag::VMTX => self.glyphs_modified && self.vertical.is_some(),
            tag::MAXP | tag::HHEA | tag::HMTX => self.glyphs_modified,
            _ => false,
        }
    }
}

/// The name given to glyphs that have no name in the font.
pub fn numbered_glyph_name(glyph_id: u16) -> String {
    format!("glyph{}", glyph_id)
}

fn required_table(tables: &BTreeMap<u32, Vec<u8>>, table_tag: u32) -> Result<ReadScope<'_>, ParseError> {
    tables
        .get(&table_tag)
        .map(|data| ReadScope::new(data))
        .ok_or(ParseError::MissingTable(table_tag))
}

fn read_metrics(
    tables: &BTreeMap<u32, Vec<u8>>,
    header_tag: u32,
    table_tag: u32,
    num_glyphs: usize,
) -> Result<Option<Metrics>, ParseError> {
    let (Some(header_data), Some(table_data)) = (tables.get(&header_tag), tables.get(&table_tag))
    else {
        return Ok(None);
    };
    let header = ReadScope::new(header_data).read::<HheaTable>()?;
    let table = ReadScope::new(table_data)
        .read_dep::<HmtxTable>((num_glyphs, usize::from(header.num_h_metrics)))?;
    Ok(Some(Metrics { header, table }))
}

fn write_metrics(
    builder: &mut FontBuilderWithHead,
    metrics: &Metrics,
    (header_tag, table_tag): (u32, u32),
    recalc_metrics_maxima: bool,
) -> Result<(), ReadWriteError> {
    let num_metrics = builder.add_table::<_, HmtxTable>(table_tag, &metrics.table, ())?;
    let mut header = metrics.header.clone();
    header.num_h_metrics = num_metrics;
    if recalc_metrics_maxima {
        header.advance_width_max = header.advance_width_max.max(metrics.table.max_advance());
    }
    builder.add_table::<_, HheaTable>(header_tag, &header, ())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font_data::FontData;
    use crate::tables::CFF_MAGIC;
    use crate::tests::writer;

    fn load(data: &[u8]) -> FontHandle {
        let font_data = ReadScope::new(data).read::<FontData<'_>>().unwrap();
        let provider = font_data.table_provider(0).unwrap();
        FontHandle::load(&provider, provider.sfnt_version()).unwrap()
    }

    #[test]
    fn test_glyph_order_duplicates() {
        let order = GlyphOrder::new(
            ["a", "b", "a", "a#1", "a"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
        );
        assert_eq!(order.names(), &["a", "b", "a#2", "a#1", "a#3"]);
        assert_eq!(order.glyph_id("a#1"), Some(3));
        assert_eq!(order.glyph_id("a#3"), Some(4));
        assert_eq!(order.name(1), Some("b"));
        assert_eq!(order.name(5), None);
    }

    #[test]
    fn test_glyph_order_push() {
        let mut order = GlyphOrder::new(vec![String::from(".notdef")]);
        assert_eq!(order.push(String::from("box")), Some(1));
        assert_eq!(order.glyph_id("box"), Some(1));
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_load_name_keyed() {
        let font = load(&writer::name_keyed_otf(&["A", "B", "box"]));
        assert_eq!(font.num_glyphs(), 4);
        assert_eq!(font.glyph_order.names(), &[".notdef", "A", "B", "box"]);
        assert!(font.vertical.is_none());
        assert_eq!(font.head.units_per_em, 1000);
        assert_eq!(
            font.os2_typo_metrics().unwrap().map(|os2| os2.s_typo_descender),
            Some(-200)
        );

        let snapshot = font.cmap_snapshot().unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(&0x41).map(String::as_str), Some("A"));
        assert_eq!(snapshot.get(&0x42).map(String::as_str), Some("B"));
    }

    #[test]
    fn test_load_cid_keyed() {
        let font = load(&writer::cid_keyed_otf(&[1, 2, 42], true));
        assert_eq!(font.glyph_order.names(), &[".notdef", "cid1", "cid2", "cid42"]);
        assert!(font.vertical.is_some());
        let snapshot = font.cmap_snapshot().unwrap();
        assert_eq!(snapshot.get(&0x4E02).map(String::as_str), Some("cid42"));
    }

    #[test]
    fn test_load_without_cff_uses_post_names() {
        let tables: Vec<(&[u8; 4], Vec<u8>)> = vec![
            (b"head", writer::head_table(2048)),
            (b"hhea", writer::hhea_table(3, 600)),
            (b"hmtx", writer::hmtx_table(&[(600, 0), (600, 10), (600, 20)])),
            (b"maxp", writer::maxp_table(3)),
            (b"post", writer::post_table_v2(&[".notdef", "alpha", "beta"])),
        ];
        let font = load(&writer::sfnt(crate::tables::TTF_MAGIC, &tables));
        assert!(font.cff.is_none());
        assert_eq!(font.glyph_order.names(), &[".notdef", "alpha", "beta"]);
        assert_eq!(font.os2_typo_metrics().unwrap(), None);
        assert!(font.cmap_snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_unmodified_font_keeps_tables() {
        let data = writer::name_keyed_otf(&["A", "B"]);
        let font = load(&data);
        let saved = font.to_bytes(true).unwrap();
        let reloaded = load(&saved);

        for table_tag in [tag::CFF, tag::CMAP, tag::HMTX, tag::HHEA, tag::MAXP, tag::POST] {
            assert_eq!(
                reloaded.table_data(table_tag),
                font.table_data(table_tag),
                "{}",
                crate::tag::DisplayTag(table_tag)
            );
        }
        assert_eq!(reloaded.sfnt_version, CFF_MAGIC);
    }

    #[test]
    fn test_missing_head() {
        let data = writer::sfnt(CFF_MAGIC, &[(b"maxp", writer::maxp_table(1))]);
        let font_data = ReadScope::new(&data).read::<FontData<'_>>().unwrap();
        let provider = font_data.table_provider(0).unwrap();
        assert_eq!(
            FontHandle::load(&provider, CFF_MAGIC).err(),
            Some(ParseError::MissingTable(tag::HEAD))
        );
    }
}
