//! `GSUB` glyph substitution table.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/gsub>
//!
//! The table is held as an owned tree with every offset resolved. Subtables are stored in terms
//! of what they substitute rather than how they were encoded: coverage tables become glyph lists,
//! single substitutions become glyph pairs, rule sets are flattened into rule lists and so on.
//! Writing picks the encoding, so a table read and written again is equivalent to the original
//! but not necessarily byte for byte the same.
//!
//! The tree is generic over the glyph representation. Binary tables use glyph ids, while the
//! text form (see [text]) refers to glyphs by name.

use std::collections::BTreeMap;
use std::convert::TryFrom;

use log::warn;

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope};
use crate::binary::write::{Placeholder, WriteBinary, WriteBuffer, WriteContext};
use crate::binary::{I16Be, U16Be, U24Be, U32Be};
use crate::error::{ParseError, WriteError};
use crate::tag::{self, DisplayTag};

pub mod text;

pub type GlyphId = u16;

pub const VERSION_1_0: u32 = 0x00010000;
pub const VERSION_1_1: u32 = 0x00010001;

/// `LookupFlag` bit indicating that a mark filtering set follows the subtable offsets.
pub const USE_MARK_FILTERING_SET: u16 = 0x0010;

/// `ReqFeatureIndex` value used when a language system has no required feature.
pub const NO_REQUIRED_FEATURE: u16 = 0xFFFF;

pub(crate) const EXTENSION_SUBST: u16 = 7;

type Offset16 = Placeholder<U16Be, u16>;
type Offset32 = Placeholder<U32Be, u32>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsubTable<G = GlyphId> {
    pub version: u32,
    pub script_list: Vec<ScriptRecord>,
    pub feature_list: Vec<FeatureRecord>,
    pub lookup_list: Vec<Lookup<G>>,
    /// The `FeatureVariations` table of a version 1.1 table, kept as it was read.
    pub feature_variations: Option<RawTable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub script_tag: u32,
    pub script: Script,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub default_lang_sys: Option<LangSys>,
    pub lang_sys_records: Vec<LangSysRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangSysRecord {
    pub lang_sys_tag: u32,
    pub lang_sys: LangSys,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangSys {
    pub req_feature_index: u16,
    pub feature_indices: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureRecord {
    pub feature_tag: u32,
    pub feature: Feature,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub feature_params: Option<FeatureParams>,
    pub lookup_indices: Vec<u16>,
}

/// Feature parameters for the features that define them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureParams {
    Size(SizeParams),
    StylisticSet(StylisticSetParams),
    CharacterVariant(CharacterVariantParams),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeParams {
    pub design_size: u16,
    pub subfamily_id: u16,
    pub subfamily_name_id: u16,
    pub range_start: u16,
    pub range_end: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylisticSetParams {
    pub version: u16,
    pub ui_name_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterVariantParams {
    pub format: u16,
    pub feat_ui_label_name_id: u16,
    pub feat_ui_tooltip_text_name_id: u16,
    pub sample_text_name_id: u16,
    pub num_named_parameters: u16,
    pub first_param_ui_label_name_id: u16,
    /// Unicode code points the variants apply to.
    pub characters: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup<G> {
    pub lookup_flag: u16,
    pub mark_filtering_set: Option<u16>,
    pub sub_tables: SubstLookup<G>,
}

/// The subtables of a lookup, by lookup type.
///
/// Extension lookups (type 7) don't appear here, their subtables are unwrapped when read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubstLookup<G> {
    Single(Vec<SingleSubst<G>>),
    Multiple(Vec<MultipleSubst<G>>),
    Alternate(Vec<AlternateSubst<G>>),
    Ligature(Vec<LigatureSubst<G>>),
    Context(Vec<ContextSubst<G>>),
    ChainContext(Vec<ChainContextSubst<G>>),
    ReverseChainSingle(Vec<ReverseChainSingleSubst<G>>),
}

/// Lookup type 1, pairs of glyph and substitute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSubst<G> {
    pub mapping: Vec<(G, G)>,
}

/// Lookup type 2, each glyph is replaced by a sequence of glyphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleSubst<G> {
    pub sequences: Vec<(G, Vec<G>)>,
}

/// Lookup type 3, each glyph has a set of alternates to choose from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlternateSubst<G> {
    pub alternate_sets: Vec<(G, Vec<G>)>,
}

/// Lookup type 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LigatureSubst<G> {
    /// Ligatures in order of preference for each first component.
    pub ligatures: Vec<Ligature<G>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ligature<G> {
    /// All components, including the first.
    pub components: Vec<G>,
    pub glyph: G,
}

/// Lookup type 5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextSubst<G> {
    /// Format 1, rules matching glyph sequences.
    Glyphs(Vec<SequenceRule<G>>),
    /// Format 2, rules matching sequences of glyph classes.
    Classes(ClassContext<G>),
    /// Format 3, a single rule matching a sequence of coverage tables.
    Coverages(CoverageContext<G>),
}

/// Lookup type 6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainContextSubst<G> {
    Glyphs(Vec<ChainRule<G>>),
    Classes(ChainClassContext<G>),
    Coverages(ChainCoverageContext<G>),
}

/// Lookup type 8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseChainSingleSubst<G> {
    /// Backtrack coverages, nearest glyph first.
    pub backtrack: Vec<Vec<G>>,
    pub lookahead: Vec<Vec<G>>,
    pub mapping: Vec<(G, G)>,
}

/// A context rule. `T` is a glyph, or a class for class based rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRule<T> {
    /// The input sequence, including the first element.
    pub input: Vec<T>,
    pub lookup_records: Vec<SequenceLookupRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRule<T> {
    /// Backtrack sequence, nearest glyph first.
    pub backtrack: Vec<T>,
    /// The input sequence, including the first element.
    pub input: Vec<T>,
    pub lookahead: Vec<T>,
    pub lookup_records: Vec<SequenceLookupRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassContext<G> {
    pub coverage: Vec<G>,
    /// Glyphs and their classes, glyphs not listed are class 0.
    pub class_def: Vec<(G, u16)>,
    pub rules: Vec<SequenceRule<u16>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainClassContext<G> {
    pub coverage: Vec<G>,
    pub backtrack_class_def: Vec<(G, u16)>,
    pub input_class_def: Vec<(G, u16)>,
    pub lookahead_class_def: Vec<(G, u16)>,
    pub rules: Vec<ChainRule<u16>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageContext<G> {
    pub input: Vec<Vec<G>>,
    pub lookup_records: Vec<SequenceLookupRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCoverageContext<G> {
    pub backtrack: Vec<Vec<G>>,
    pub input: Vec<Vec<G>>,
    pub lookahead: Vec<Vec<G>>,
    pub lookup_records: Vec<SequenceLookupRecord>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SequenceLookupRecord {
    pub sequence_index: u16,
    pub lookup_list_index: u16,
}

/// Table data carried through without interpretation. Written as `hexdata` in the text form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable(pub Vec<u8>);

impl GsubTable<GlyphId> {
    /// The table used when a font has no `GSUB`: a `DFLT` script without features or lookups.
    pub fn empty() -> Self {
        GsubTable {
            version: VERSION_1_0,
            script_list: vec![ScriptRecord {
                script_tag: tag::DFLT,
                script: Script {
                    default_lang_sys: Some(LangSys {
                        req_feature_index: NO_REQUIRED_FEATURE,
                        feature_indices: Vec::new(),
                    }),
                    lang_sys_records: Vec::new(),
                },
            }],
            feature_list: Vec::new(),
            lookup_list: Vec::new(),
            feature_variations: None,
        }
    }
}

impl<G> GsubTable<G> {
    /// Convert every glyph in the table with `f`.
    ///
    /// On failure the error is returned with the index of the lookup and subtable it occurred
    /// in.
    pub fn map_glyphs<H, E, F>(&self, f: &mut F) -> Result<GsubTable<H>, (usize, usize, E)>
    where
        F: FnMut(&G) -> Result<H, E>,
    {
        let lookup_list = self
            .lookup_list
            .iter()
            .enumerate()
            .map(|(lookup_index, lookup)| {
                let sub_tables = lookup
                    .sub_tables
                    .map_glyphs(f)
                    .map_err(|(subtable_index, err)| (lookup_index, subtable_index, err))?;
                Ok(Lookup {
                    lookup_flag: lookup.lookup_flag,
                    mark_filtering_set: lookup.mark_filtering_set,
                    sub_tables,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GsubTable {
            version: self.version,
            script_list: self.script_list.clone(),
            feature_list: self.feature_list.clone(),
            lookup_list,
            feature_variations: self.feature_variations.clone(),
        })
    }
}

impl<G> SubstLookup<G> {
    pub fn lookup_type(&self) -> u16 {
        match self {
            SubstLookup::Single(_) => 1,
            SubstLookup::Multiple(_) => 2,
            SubstLookup::Alternate(_) => 3,
            SubstLookup::Ligature(_) => 4,
            SubstLookup::Context(_) => 5,
            SubstLookup::ChainContext(_) => 6,
            SubstLookup::ReverseChainSingle(_) => 8,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SubstLookup::Single(subtables) => subtables.len(),
            SubstLookup::Multiple(subtables) => subtables.len(),
            SubstLookup::Alternate(subtables) => subtables.len(),
            SubstLookup::Ligature(subtables) => subtables.len(),
            SubstLookup::Context(subtables) => subtables.len(),
            SubstLookup::ChainContext(subtables) => subtables.len(),
            SubstLookup::ReverseChainSingle(subtables) => subtables.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert every glyph with `f`, failing with the index of the offending subtable.
    fn map_glyphs<H, E, F>(&self, f: &mut F) -> Result<SubstLookup<H>, (usize, E)>
    where
        F: FnMut(&G) -> Result<H, E>,
    {
        fn each<T, U, E>(
            subtables: &[T],
            mut map: impl FnMut(&T) -> Result<U, E>,
        ) -> Result<Vec<U>, (usize, E)> {
            subtables
                .iter()
                .enumerate()
                .map(|(index, subtable)| map(subtable).map_err(|err| (index, err)))
                .collect()
        }

        Ok(match self {
            SubstLookup::Single(subtables) => SubstLookup::Single(each(subtables, |subst| {
                Ok(SingleSubst {
                    mapping: map_pairs(&subst.mapping, f)?,
                })
            })?),
            SubstLookup::Multiple(subtables) => SubstLookup::Multiple(each(subtables, |subst| {
                Ok(MultipleSubst {
                    sequences: map_sets(&subst.sequences, f)?,
                })
            })?),
            SubstLookup::Alternate(subtables) => {
                SubstLookup::Alternate(each(subtables, |subst| {
                    Ok(AlternateSubst {
                        alternate_sets: map_sets(&subst.alternate_sets, f)?,
                    })
                })?)
            }
            SubstLookup::Ligature(subtables) => SubstLookup::Ligature(each(subtables, |subst| {
                let ligatures = subst
                    .ligatures
                    .iter()
                    .map(|ligature| {
                        Ok(Ligature {
                            components: map_glyphs(&ligature.components, f)?,
                            glyph: f(&ligature.glyph)?,
                        })
                    })
                    .collect::<Result<_, E>>()?;
                Ok(LigatureSubst { ligatures })
            })?),
            SubstLookup::Context(subtables) => SubstLookup::Context(each(subtables, |subst| {
                Ok(match subst {
                    ContextSubst::Glyphs(rules) => ContextSubst::Glyphs(
                        rules
                            .iter()
                            .map(|rule| {
                                Ok(SequenceRule {
                                    input: map_glyphs(&rule.input, f)?,
                                    lookup_records: rule.lookup_records.clone(),
                                })
                            })
                            .collect::<Result<_, E>>()?,
                    ),
                    ContextSubst::Classes(context) => ContextSubst::Classes(ClassContext {
                        coverage: map_glyphs(&context.coverage, f)?,
                        class_def: map_class_def(&context.class_def, f)?,
                        rules: context.rules.clone(),
                    }),
                    ContextSubst::Coverages(context) => {
                        ContextSubst::Coverages(CoverageContext {
                            input: map_coverages(&context.input, f)?,
                            lookup_records: context.lookup_records.clone(),
                        })
                    }
                })
            })?),
            SubstLookup::ChainContext(subtables) => {
                SubstLookup::ChainContext(each(subtables, |subst| {
                    Ok(match subst {
                        ChainContextSubst::Glyphs(rules) => ChainContextSubst::Glyphs(
                            rules
                                .iter()
                                .map(|rule| {
                                    Ok(ChainRule {
                                        backtrack: map_glyphs(&rule.backtrack, f)?,
                                        input: map_glyphs(&rule.input, f)?,
                                        lookahead: map_glyphs(&rule.lookahead, f)?,
                                        lookup_records: rule.lookup_records.clone(),
                                    })
                                })
                                .collect::<Result<_, E>>()?,
                        ),
                        ChainContextSubst::Classes(context) => {
                            ChainContextSubst::Classes(ChainClassContext {
                                coverage: map_glyphs(&context.coverage, f)?,
                                backtrack_class_def: map_class_def(
                                    &context.backtrack_class_def,
                                    f,
                                )?,
                                input_class_def: map_class_def(&context.input_class_def, f)?,
                                lookahead_class_def: map_class_def(
                                    &context.lookahead_class_def,
                                    f,
                                )?,
                                rules: context.rules.clone(),
                            })
                        }
                        ChainContextSubst::Coverages(context) => {
                            ChainContextSubst::Coverages(ChainCoverageContext {
                                backtrack: map_coverages(&context.backtrack, f)?,
                                input: map_coverages(&context.input, f)?,
                                lookahead: map_coverages(&context.lookahead, f)?,
                                lookup_records: context.lookup_records.clone(),
                            })
                        }
                    })
                })?)
            }
            SubstLookup::ReverseChainSingle(subtables) => {
                SubstLookup::ReverseChainSingle(each(subtables, |subst| {
                    Ok(ReverseChainSingleSubst {
                        backtrack: map_coverages(&subst.backtrack, f)?,
                        lookahead: map_coverages(&subst.lookahead, f)?,
                        mapping: map_pairs(&subst.mapping, f)?,
                    })
                })?)
            }
        })
    }
}

fn map_glyphs<G, H, E, F>(glyphs: &[G], f: &mut F) -> Result<Vec<H>, E>
where
    F: FnMut(&G) -> Result<H, E>,
{
    glyphs.iter().map(|glyph| f(glyph)).collect()
}

fn map_pairs<G, H, E, F>(pairs: &[(G, G)], f: &mut F) -> Result<Vec<(H, H)>, E>
where
    F: FnMut(&G) -> Result<H, E>,
{
    pairs.iter().map(|(a, b)| Ok((f(a)?, f(b)?))).collect()
}

fn map_sets<G, H, E, F>(sets: &[(G, Vec<G>)], f: &mut F) -> Result<Vec<(H, Vec<H>)>, E>
where
    F: FnMut(&G) -> Result<H, E>,
{
    sets.iter()
        .map(|(glyph, set)| Ok((f(glyph)?, map_glyphs(set, f)?)))
        .collect()
}

fn map_class_def<G, H, E, F>(class_def: &[(G, u16)], f: &mut F) -> Result<Vec<(H, u16)>, E>
where
    F: FnMut(&G) -> Result<H, E>,
{
    class_def
        .iter()
        .map(|(glyph, class)| Ok((f(glyph)?, *class)))
        .collect()
}

fn map_coverages<G, H, E, F>(coverages: &[Vec<G>], f: &mut F) -> Result<Vec<Vec<H>>, E>
where
    F: FnMut(&G) -> Result<H, E>,
{
    coverages
        .iter()
        .map(|coverage| map_glyphs(coverage, f))
        .collect()
}

// Reading

/// A coverage table, read as the covered glyphs in coverage index order.
enum CoverageTable {}

/// A class definition table, read as glyphs with a class other than 0.
enum ClassDefTable {}

impl ReadBinary for GsubTable<GlyphId> {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let table = ctxt.scope();
        let version = ctxt.read_u32be()?;
        ctxt.check_version(version == VERSION_1_0 || version == VERSION_1_1)?;
        let script_list_offset = usize::from(ctxt.read_u16be()?);
        let feature_list_offset = usize::from(ctxt.read_u16be()?);
        let lookup_list_offset = usize::from(ctxt.read_u16be()?);
        let feature_variations_offset = if version == VERSION_1_1 {
            usize::try_from(ctxt.read_u32be()?)?
        } else {
            0
        };

        let script_list = match script_list_offset {
            0 => Vec::new(),
            offset => read_script_list(table.offset(offset))?,
        };
        let feature_list = match feature_list_offset {
            0 => Vec::new(),
            offset => read_feature_list(table.offset(offset))?,
        };
        let lookup_list = match lookup_list_offset {
            0 => Vec::new(),
            offset => read_lookup_list(table.offset(offset))?,
        };
        let feature_variations = match feature_variations_offset {
            0 => None,
            offset => {
                let scope = table.offset(offset);
                let length = feature_variations_length(scope)?;
                Some(RawTable(scope.offset_length(0, length)?.data().to_vec()))
            }
        };

        Ok(GsubTable {
            version,
            script_list,
            feature_list,
            lookup_list,
            feature_variations,
        })
    }
}

fn read_script_list(scope: ReadScope<'_>) -> Result<Vec<ScriptRecord>, ParseError> {
    let mut ctxt = scope.ctxt();
    let script_count = usize::from(ctxt.read_u16be()?);
    (0..script_count)
        .map(|_| {
            let script_tag = ctxt.read_u32be()?;
            let script_offset = usize::from(ctxt.read_u16be()?);
            let script = read_script(scope.offset(script_offset))?;
            Ok(ScriptRecord { script_tag, script })
        })
        .collect()
}

fn read_script(scope: ReadScope<'_>) -> Result<Script, ParseError> {
    let mut ctxt = scope.ctxt();
    let default_lang_sys = match usize::from(ctxt.read_u16be()?) {
        0 => None,
        offset => Some(scope.offset(offset).read::<LangSys>()?),
    };
    let lang_sys_count = usize::from(ctxt.read_u16be()?);
    let lang_sys_records = (0..lang_sys_count)
        .map(|_| {
            let lang_sys_tag = ctxt.read_u32be()?;
            let offset = usize::from(ctxt.read_u16be()?);
            let lang_sys = scope.offset(offset).read::<LangSys>()?;
            Ok(LangSysRecord {
                lang_sys_tag,
                lang_sys,
            })
        })
        .collect::<Result<_, ParseError>>()?;
    Ok(Script {
        default_lang_sys,
        lang_sys_records,
    })
}

impl ReadBinary for LangSys {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let _lookup_order = ctxt.read_u16be()?; // reserved
        let req_feature_index = ctxt.read_u16be()?;
        let feature_index_count = usize::from(ctxt.read_u16be()?);
        let feature_indices = ctxt.read_array::<U16Be>(feature_index_count)?.to_vec();
        Ok(LangSys {
            req_feature_index,
            feature_indices,
        })
    }
}

fn read_feature_list(scope: ReadScope<'_>) -> Result<Vec<FeatureRecord>, ParseError> {
    let mut ctxt = scope.ctxt();
    let feature_count = usize::from(ctxt.read_u16be()?);
    (0..feature_count)
        .map(|_| {
            let feature_tag = ctxt.read_u32be()?;
            let feature_offset = usize::from(ctxt.read_u16be()?);
            let feature = read_feature(scope.offset(feature_offset), feature_tag)?;
            Ok(FeatureRecord {
                feature_tag,
                feature,
            })
        })
        .collect()
}

fn read_feature(scope: ReadScope<'_>, feature_tag: u32) -> Result<Feature, ParseError> {
    let mut ctxt = scope.ctxt();
    let feature_params = match usize::from(ctxt.read_u16be()?) {
        0 => None,
        offset => read_feature_params(scope.offset(offset), feature_tag)?,
    };
    let lookup_index_count = usize::from(ctxt.read_u16be()?);
    let lookup_indices = ctxt.read_array::<U16Be>(lookup_index_count)?.to_vec();
    Ok(Feature {
        feature_params,
        lookup_indices,
    })
}

fn read_feature_params(
    scope: ReadScope<'_>,
    feature_tag: u32,
) -> Result<Option<FeatureParams>, ParseError> {
    let mut ctxt = scope.ctxt();
    let params = match feature_tag.to_be_bytes() {
        [b's', b'i', b'z', b'e'] => FeatureParams::Size(SizeParams {
            design_size: ctxt.read_u16be()?,
            subfamily_id: ctxt.read_u16be()?,
            subfamily_name_id: ctxt.read_u16be()?,
            range_start: ctxt.read_u16be()?,
            range_end: ctxt.read_u16be()?,
        }),
        [b's', b's', a, b] if a.is_ascii_digit() && b.is_ascii_digit() => {
            FeatureParams::StylisticSet(StylisticSetParams {
                version: ctxt.read_u16be()?,
                ui_name_id: ctxt.read_u16be()?,
            })
        }
        [b'c', b'v', a, b] if a.is_ascii_digit() && b.is_ascii_digit() => {
            let format = ctxt.read_u16be()?;
            let feat_ui_label_name_id = ctxt.read_u16be()?;
            let feat_ui_tooltip_text_name_id = ctxt.read_u16be()?;
            let sample_text_name_id = ctxt.read_u16be()?;
            let num_named_parameters = ctxt.read_u16be()?;
            let first_param_ui_label_name_id = ctxt.read_u16be()?;
            let char_count = usize::from(ctxt.read_u16be()?);
            let characters = ctxt.read_array::<U24Be>(char_count)?.to_vec();
            FeatureParams::CharacterVariant(CharacterVariantParams {
                format,
                feat_ui_label_name_id,
                feat_ui_tooltip_text_name_id,
                sample_text_name_id,
                num_named_parameters,
                first_param_ui_label_name_id,
                characters,
            })
        }
        _ => {
            warn!(
                "dropping feature parameters of unsupported feature '{}'",
                DisplayTag(feature_tag)
            );
            return Ok(None);
        }
    };
    Ok(Some(params))
}

/// The number of bytes spanned by a `FeatureVariations` table and the tables it references.
fn feature_variations_length(scope: ReadScope<'_>) -> Result<usize, ParseError> {
    let mut ctxt = scope.ctxt();
    let _version = ctxt.read_u32be()?;
    let record_count = usize::try_from(ctxt.read_u32be()?)?;
    let records = ctxt.read_array::<(U32Be, U32Be)>(record_count)?;
    let mut end = ctxt.position();

    for (condition_set_offset, substitution_offset) in &records {
        if condition_set_offset != 0 {
            let base = usize::try_from(condition_set_offset)?;
            let mut ctxt = scope.offset(base).ctxt();
            let condition_count = usize::from(ctxt.read_u16be()?);
            let conditions = ctxt.read_array::<U32Be>(condition_count)?;
            end = end.max(base + ctxt.position());
            for condition_offset in &conditions {
                // Format 1 conditions are the only ones defined, 8 bytes each
                let offset = base + usize::try_from(condition_offset)?;
                scope.offset_length(offset, 8)?;
                end = end.max(offset + 8);
            }
        }
        if substitution_offset != 0 {
            let base = usize::try_from(substitution_offset)?;
            let mut ctxt = scope.offset(base).ctxt();
            let _version = ctxt.read_u32be()?;
            let substitution_count = usize::from(ctxt.read_u16be()?);
            let substitutions = ctxt.read_array::<(U16Be, U32Be)>(substitution_count)?;
            end = end.max(base + ctxt.position());
            for (_feature_index, feature_offset) in &substitutions {
                let offset = base + usize::try_from(feature_offset)?;
                let mut ctxt = scope.offset(offset).ctxt();
                let _feature_params = ctxt.read_u16be()?;
                let lookup_index_count = usize::from(ctxt.read_u16be()?);
                ctxt.read_array::<U16Be>(lookup_index_count)?;
                end = end.max(offset + ctxt.position());
            }
        }
    }

    Ok(end)
}

fn read_lookup_list(scope: ReadScope<'_>) -> Result<Vec<Lookup<GlyphId>>, ParseError> {
    let mut ctxt = scope.ctxt();
    let lookup_count = usize::from(ctxt.read_u16be()?);
    let lookup_offsets = ctxt.read_array::<U16Be>(lookup_count)?;
    lookup_offsets
        .iter()
        .map(|offset| scope.offset(usize::from(offset)).read::<Lookup<GlyphId>>())
        .collect()
}

impl ReadBinary for Lookup<GlyphId> {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let lookup_type = ctxt.read_u16be()?;
        let lookup_flag = ctxt.read_u16be()?;
        let subtable_count = usize::from(ctxt.read_u16be()?);
        let subtable_offsets = ctxt.read_array::<U16Be>(subtable_count)?;
        let mark_filtering_set = if lookup_flag & USE_MARK_FILTERING_SET != 0 {
            Some(ctxt.read_u16be()?)
        } else {
            None
        };

        let (lookup_type, subtables) = if lookup_type == EXTENSION_SUBST {
            let mut extension_type = None;
            let mut subtables = Vec::with_capacity(subtable_count);
            for offset in &subtable_offsets {
                let extension = scope.offset(usize::from(offset));
                let mut ctxt = extension.ctxt();
                let format = ctxt.read_u16be()?;
                ctxt.check_version(format == 1)?;
                let subtable_type = ctxt.read_u16be()?;
                ctxt.check(subtable_type != EXTENSION_SUBST)?;
                ctxt.check(extension_type.map_or(true, |ty| ty == subtable_type))?;
                extension_type = Some(subtable_type);
                let offset = usize::try_from(ctxt.read_u32be()?)?;
                subtables.push(extension.offset(offset));
            }
            // An extension lookup without subtables substitutes nothing, whatever its type
            (extension_type.unwrap_or(1), subtables)
        } else {
            let subtables = subtable_offsets
                .iter()
                .map(|offset| scope.offset(usize::from(offset)))
                .collect::<Vec<_>>();
            (lookup_type, subtables)
        };

        let sub_tables = match lookup_type {
            1 => SubstLookup::Single(read_all(&subtables, |s| s.read::<SingleSubst<GlyphId>>())?),
            2 => SubstLookup::Multiple(read_all(&subtables, |s| {
                s.read::<MultipleSubst<GlyphId>>()
            })?),
            3 => SubstLookup::Alternate(read_all(&subtables, |s| {
                s.read::<AlternateSubst<GlyphId>>()
            })?),
            4 => SubstLookup::Ligature(read_all(&subtables, |s| {
                s.read::<LigatureSubst<GlyphId>>()
            })?),
            5 => SubstLookup::Context(read_all(&subtables, |s| {
                s.read::<ContextSubst<GlyphId>>()
            })?),
            6 => SubstLookup::ChainContext(read_all(&subtables, |s| {
                s.read::<ChainContextSubst<GlyphId>>()
            })?),
            8 => SubstLookup::ReverseChainSingle(read_all(&subtables, |s| {
                s.read::<ReverseChainSingleSubst<GlyphId>>()
            })?),
            _ => return Err(ParseError::BadValue),
        };

        Ok(Lookup {
            lookup_flag,
            mark_filtering_set,
            sub_tables,
        })
    }
}

fn read_all<'a, T>(
    scopes: &[ReadScope<'a>],
    read: impl Fn(&ReadScope<'a>) -> Result<T, ParseError>,
) -> Result<Vec<T>, ParseError> {
    scopes.iter().map(read).collect()
}

impl ReadBinary for CoverageTable {
    type HostType<'a> = Vec<GlyphId>;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Vec<GlyphId>, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                Ok(ctxt.read_array::<U16Be>(glyph_count)?.to_vec())
            }
            2 => {
                let range_count = usize::from(ctxt.read_u16be()?);
                let ranges = ctxt.read_array::<(U16Be, U16Be, U16Be)>(range_count)?;
                let mut glyphs = Vec::new();
                let mut next = 0;
                // Ranges must be in order, which also bounds the number of glyphs
                for (start_glyph, end_glyph, _start_coverage_index) in &ranges {
                    ctxt.check(start_glyph <= end_glyph && u32::from(start_glyph) >= next)?;
                    glyphs.extend(start_glyph..=end_glyph);
                    next = u32::from(end_glyph) + 1;
                }
                Ok(glyphs)
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for ClassDefTable {
    type HostType<'a> = Vec<(GlyphId, u16)>;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Vec<(GlyphId, u16)>, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let start_glyph = ctxt.read_u16be()?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let class_values = ctxt.read_array::<U16Be>(glyph_count)?;
                ctxt.check(usize::from(start_glyph) + glyph_count <= 0x10000)?;
                Ok((start_glyph..=u16::MAX)
                    .zip(class_values.iter())
                    .filter(|&(_, class)| class != 0)
                    .collect())
            }
            2 => {
                let range_count = usize::from(ctxt.read_u16be()?);
                let ranges = ctxt.read_array::<(U16Be, U16Be, U16Be)>(range_count)?;
                let mut classes = Vec::new();
                let mut next = 0;
                for (start_glyph, end_glyph, class) in &ranges {
                    ctxt.check(start_glyph <= end_glyph && u32::from(start_glyph) >= next)?;
                    if class != 0 {
                        classes.extend((start_glyph..=end_glyph).map(|glyph| (glyph, class)));
                    }
                    next = u32::from(end_glyph) + 1;
                }
                Ok(classes)
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

fn read_coverage_at(scope: &ReadScope<'_>, offset: u16) -> Result<Vec<GlyphId>, ParseError> {
    scope.offset(usize::from(offset)).read::<CoverageTable>()
}

fn read_class_def_at(
    scope: &ReadScope<'_>,
    offset: u16,
) -> Result<Vec<(GlyphId, u16)>, ParseError> {
    match offset {
        0 => Ok(Vec::new()),
        offset => scope.offset(usize::from(offset)).read::<ClassDefTable>(),
    }
}

fn read_coverages(
    scope: &ReadScope<'_>,
    ctxt: &mut ReadCtxt<'_>,
) -> Result<Vec<Vec<GlyphId>>, ParseError> {
    let count = usize::from(ctxt.read_u16be()?);
    let offsets = ctxt.read_array::<U16Be>(count)?;
    offsets
        .iter()
        .map(|offset| read_coverage_at(scope, offset))
        .collect()
}

fn read_lookup_records(
    ctxt: &mut ReadCtxt<'_>,
    count: usize,
) -> Result<Vec<SequenceLookupRecord>, ParseError> {
    let records = ctxt.read_array::<(U16Be, U16Be)>(count)?;
    Ok(records
        .iter()
        .map(|(sequence_index, lookup_list_index)| SequenceLookupRecord {
            sequence_index,
            lookup_list_index,
        })
        .collect())
}

/// Read an array of offsets to sets, each a count followed by glyph ids.
fn read_glyph_sets(
    scope: &ReadScope<'_>,
    ctxt: &mut ReadCtxt<'_>,
) -> Result<Vec<Vec<GlyphId>>, ParseError> {
    let count = usize::from(ctxt.read_u16be()?);
    let offsets = ctxt.read_array::<U16Be>(count)?;
    offsets
        .iter()
        .map(|offset| {
            let mut ctxt = scope.offset(usize::from(offset)).ctxt();
            let glyph_count = usize::from(ctxt.read_u16be()?);
            Ok(ctxt.read_array::<U16Be>(glyph_count)?.to_vec())
        })
        .collect()
}

impl ReadBinary for SingleSubst<GlyphId> {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
                let delta = ctxt.read_i16be()?;
                let mapping = coverage
                    .into_iter()
                    .map(|glyph| (glyph, glyph.wrapping_add(delta as u16)))
                    .collect();
                Ok(SingleSubst { mapping })
            }
            2 => {
                let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(glyph_count == coverage.len())?;
                let substitutes = ctxt.read_array::<U16Be>(glyph_count)?;
                let mapping = coverage.into_iter().zip(substitutes.iter()).collect();
                Ok(SingleSubst { mapping })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for MultipleSubst<GlyphId> {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        ctxt.check_version(format == 1)?;
        let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
        let sequences = read_glyph_sets(&scope, ctxt)?;
        ctxt.check(sequences.len() == coverage.len())?;
        Ok(MultipleSubst {
            sequences: coverage.into_iter().zip(sequences).collect(),
        })
    }
}

impl ReadBinary for AlternateSubst<GlyphId> {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        ctxt.check_version(format == 1)?;
        let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
        let alternate_sets = read_glyph_sets(&scope, ctxt)?;
        ctxt.check(alternate_sets.len() == coverage.len())?;
        Ok(AlternateSubst {
            alternate_sets: coverage.into_iter().zip(alternate_sets).collect(),
        })
    }
}

impl ReadBinary for LigatureSubst<GlyphId> {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        ctxt.check_version(format == 1)?;
        let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
        let set_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(set_count == coverage.len())?;
        let set_offsets = ctxt.read_array::<U16Be>(set_count)?;

        let mut ligatures = Vec::new();
        for (first, set_offset) in coverage.into_iter().zip(set_offsets.iter()) {
            let set = scope.offset(usize::from(set_offset));
            let mut ctxt = set.ctxt();
            let ligature_count = usize::from(ctxt.read_u16be()?);
            let ligature_offsets = ctxt.read_array::<U16Be>(ligature_count)?;
            for offset in &ligature_offsets {
                let mut ctxt = set.offset(usize::from(offset)).ctxt();
                let glyph = ctxt.read_u16be()?;
                let component_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(component_count > 0)?;
                let rest = ctxt.read_array::<U16Be>(component_count - 1)?;
                let components = std::iter::once(first).chain(rest.iter()).collect();
                ligatures.push(Ligature { components, glyph });
            }
        }

        Ok(LigatureSubst { ligatures })
    }
}

/// Read the rule sets of a format 1 or 2 context subtable.
///
/// Each rule set is paired with the glyph or class it is for and the rules returned with it
/// prepended to their input.
fn read_rule_sets<T: Copy, R>(
    scope: &ReadScope<'_>,
    ctxt: &mut ReadCtxt<'_>,
    firsts: impl Iterator<Item = T>,
    mut read_rule: impl FnMut(&mut ReadCtxt<'_>, T) -> Result<R, ParseError>,
) -> Result<Vec<R>, ParseError> {
    let set_count = usize::from(ctxt.read_u16be()?);
    let set_offsets = ctxt.read_array::<U16Be>(set_count)?;
    let mut rules = Vec::new();
    for (first, set_offset) in firsts.zip(set_offsets.iter()) {
        // A null offset is an empty rule set
        if set_offset == 0 {
            continue;
        }
        let set = scope.offset(usize::from(set_offset));
        let mut ctxt = set.ctxt();
        let rule_count = usize::from(ctxt.read_u16be()?);
        let rule_offsets = ctxt.read_array::<U16Be>(rule_count)?;
        for offset in &rule_offsets {
            let mut ctxt = set.offset(usize::from(offset)).ctxt();
            rules.push(read_rule(&mut ctxt, first)?);
        }
    }
    Ok(rules)
}

fn read_sequence_rule(ctxt: &mut ReadCtxt<'_>, first: u16) -> Result<SequenceRule<u16>, ParseError> {
    let glyph_count = usize::from(ctxt.read_u16be()?);
    ctxt.check(glyph_count > 0)?;
    let lookup_count = usize::from(ctxt.read_u16be()?);
    let rest = ctxt.read_array::<U16Be>(glyph_count - 1)?;
    let input = std::iter::once(first).chain(rest.iter()).collect();
    let lookup_records = read_lookup_records(ctxt, lookup_count)?;
    Ok(SequenceRule {
        input,
        lookup_records,
    })
}

fn read_chain_rule(ctxt: &mut ReadCtxt<'_>, first: u16) -> Result<ChainRule<u16>, ParseError> {
    let backtrack_count = usize::from(ctxt.read_u16be()?);
    let backtrack = ctxt.read_array::<U16Be>(backtrack_count)?.to_vec();
    let input_count = usize::from(ctxt.read_u16be()?);
    ctxt.check(input_count > 0)?;
    let rest = ctxt.read_array::<U16Be>(input_count - 1)?;
    let input = std::iter::once(first).chain(rest.iter()).collect();
    let lookahead_count = usize::from(ctxt.read_u16be()?);
    let lookahead = ctxt.read_array::<U16Be>(lookahead_count)?.to_vec();
    let lookup_count = usize::from(ctxt.read_u16be()?);
    let lookup_records = read_lookup_records(ctxt, lookup_count)?;
    Ok(ChainRule {
        backtrack,
        input,
        lookahead,
        lookup_records,
    })
}

impl ReadBinary for ContextSubst<GlyphId> {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
                let rules =
                    read_rule_sets(&scope, ctxt, coverage.into_iter(), read_sequence_rule)?;
                Ok(ContextSubst::Glyphs(rules))
            }
            2 => {
                let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
                let class_def = read_class_def_at(&scope, ctxt.read_u16be()?)?;
                let rules = read_rule_sets(&scope, ctxt, 0u16..=u16::MAX, read_sequence_rule)?;
                Ok(ContextSubst::Classes(ClassContext {
                    coverage,
                    class_def,
                    rules,
                }))
            }
            3 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let offsets = ctxt.read_array::<U16Be>(glyph_count)?;
                let input = offsets
                    .iter()
                    .map(|offset| read_coverage_at(&scope, offset))
                    .collect::<Result<_, _>>()?;
                let lookup_records = read_lookup_records(ctxt, lookup_count)?;
                Ok(ContextSubst::Coverages(CoverageContext {
                    input,
                    lookup_records,
                }))
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for ChainContextSubst<GlyphId> {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
                let rules = read_rule_sets(&scope, ctxt, coverage.into_iter(), read_chain_rule)?;
                Ok(ChainContextSubst::Glyphs(rules))
            }
            2 => {
                let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
                let backtrack_class_def = read_class_def_at(&scope, ctxt.read_u16be()?)?;
                let input_class_def = read_class_def_at(&scope, ctxt.read_u16be()?)?;
                let lookahead_class_def = read_class_def_at(&scope, ctxt.read_u16be()?)?;
                let rules = read_rule_sets(&scope, ctxt, 0u16..=u16::MAX, read_chain_rule)?;
                Ok(ChainContextSubst::Classes(ChainClassContext {
                    coverage,
                    backtrack_class_def,
                    input_class_def,
                    lookahead_class_def,
                    rules,
                }))
            }
            3 => {
                let backtrack = read_coverages(&scope, ctxt)?;
                let input = read_coverages(&scope, ctxt)?;
                let lookahead = read_coverages(&scope, ctxt)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let lookup_records = read_lookup_records(ctxt, lookup_count)?;
                Ok(ChainContextSubst::Coverages(ChainCoverageContext {
                    backtrack,
                    input,
                    lookahead,
                    lookup_records,
                }))
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadBinary for ReverseChainSingleSubst<GlyphId> {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let format = ctxt.read_u16be()?;
        ctxt.check_version(format == 1)?;
        let coverage = read_coverage_at(&scope, ctxt.read_u16be()?)?;
        let backtrack = read_coverages(&scope, ctxt)?;
        let lookahead = read_coverages(&scope, ctxt)?;
        let glyph_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(glyph_count == coverage.len())?;
        let substitutes = ctxt.read_array::<U16Be>(glyph_count)?;
        Ok(ReverseChainSingleSubst {
            backtrack,
            lookahead,
            mapping: coverage.into_iter().zip(substitutes.iter()).collect(),
        })
    }
}

// Writing

impl WriteBinary<&Self> for GsubTable<GlyphId> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &GsubTable<GlyphId>) -> Result<(), WriteError> {
        let base = ctxt.bytes_written();
        let version = if table.feature_variations.is_some() {
            VERSION_1_1
        } else {
            table.version
        };
        U32Be::write(ctxt, version)?;
        let script_list: Offset16 = ctxt.placeholder()?;
        let feature_list: Offset16 = ctxt.placeholder()?;
        let lookup_list: Offset16 = ctxt.placeholder()?;
        let feature_variations: Option<Offset32> = if version == VERSION_1_1 {
            Some(ctxt.placeholder()?)
        } else {
            None
        };

        write_offset16(ctxt, script_list, base)?;
        write_script_list(ctxt, &table.script_list)?;
        write_offset16(ctxt, feature_list, base)?;
        write_feature_list(ctxt, &table.feature_list)?;
        let lookups = lookup_list_data(&table.lookup_list)?;
        write_offset16(ctxt, lookup_list, base)?;
        ctxt.write_bytes(lookups.bytes())?;

        if let Some(placeholder) = feature_variations {
            match &table.feature_variations {
                Some(RawTable(data)) => {
                    let offset = u32::try_from(ctxt.bytes_written() - base)?;
                    ctxt.write_placeholder(placeholder, offset)?;
                    ctxt.write_bytes(data)?;
                }
                None => ctxt.write_placeholder(placeholder, 0u32)?,
            }
        }

        Ok(())
    }
}

/// Fill `placeholder` with the offset from `base` to the current position.
fn write_offset16<C: WriteContext>(
    ctxt: &mut C,
    placeholder: Offset16,
    base: usize,
) -> Result<(), WriteError> {
    let offset = u16::try_from(ctxt.bytes_written() - base)?;
    ctxt.write_placeholder(placeholder, offset)
}

fn write_count<C: WriteContext>(ctxt: &mut C, count: usize) -> Result<(), WriteError> {
    U16Be::write(ctxt, u16::try_from(count)?)
}

fn write_script_list<C: WriteContext>(
    ctxt: &mut C,
    scripts: &[ScriptRecord],
) -> Result<(), WriteError> {
    let base = ctxt.bytes_written();
    write_count(ctxt, scripts.len())?;
    let mut offsets = Vec::with_capacity(scripts.len());
    for record in scripts {
        U32Be::write(ctxt, record.script_tag)?;
        offsets.push(ctxt.placeholder::<U16Be, u16>()?);
    }
    for (record, offset) in scripts.iter().zip(offsets) {
        write_offset16(ctxt, offset, base)?;
        write_script(ctxt, &record.script)?;
    }
    Ok(())
}

fn write_script<C: WriteContext>(ctxt: &mut C, script: &Script) -> Result<(), WriteError> {
    let base = ctxt.bytes_written();
    let default_lang_sys = match script.default_lang_sys {
        Some(_) => Some(ctxt.placeholder::<U16Be, u16>()?),
        None => {
            U16Be::write(ctxt, 0u16)?;
            None
        }
    };
    write_count(ctxt, script.lang_sys_records.len())?;
    let mut offsets = Vec::with_capacity(script.lang_sys_records.len());
    for record in &script.lang_sys_records {
        U32Be::write(ctxt, record.lang_sys_tag)?;
        offsets.push(ctxt.placeholder::<U16Be, u16>()?);
    }
    if let (Some(placeholder), Some(lang_sys)) = (default_lang_sys, &script.default_lang_sys) {
        write_offset16(ctxt, placeholder, base)?;
        LangSys::write(ctxt, lang_sys)?;
    }
    for (record, offset) in script.lang_sys_records.iter().zip(offsets) {
        write_offset16(ctxt, offset, base)?;
        LangSys::write(ctxt, &record.lang_sys)?;
    }
    Ok(())
}

impl WriteBinary<&Self> for LangSys {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, lang_sys: &LangSys) -> Result<(), WriteError> {
        U16Be::write(ctxt, 0u16)?; // lookup_order
        U16Be::write(ctxt, lang_sys.req_feature_index)?;
        write_count(ctxt, lang_sys.feature_indices.len())?;
        ctxt.write_iter::<U16Be, _>(lang_sys.feature_indices.iter().copied())
    }
}

fn write_feature_list<C: WriteContext>(
    ctxt: &mut C,
    features: &[FeatureRecord],
) -> Result<(), WriteError> {
    let base = ctxt.bytes_written();
    write_count(ctxt, features.len())?;
    let mut offsets = Vec::with_capacity(features.len());
    for record in features {
        U32Be::write(ctxt, record.feature_tag)?;
        offsets.push(ctxt.placeholder::<U16Be, u16>()?);
    }
    for (record, offset) in features.iter().zip(offsets) {
        write_offset16(ctxt, offset, base)?;
        write_feature(ctxt, &record.feature)?;
    }
    Ok(())
}

fn write_feature<C: WriteContext>(ctxt: &mut C, feature: &Feature) -> Result<(), WriteError> {
    let base = ctxt.bytes_written();
    let params_offset = match feature.feature_params {
        Some(_) => Some(ctxt.placeholder::<U16Be, u16>()?),
        None => {
            U16Be::write(ctxt, 0u16)?;
            None
        }
    };
    write_count(ctxt, feature.lookup_indices.len())?;
    ctxt.write_iter::<U16Be, _>(feature.lookup_indices.iter().copied())?;

    if let (Some(placeholder), Some(params)) = (params_offset, &feature.feature_params) {
        write_offset16(ctxt, placeholder, base)?;
        match params {
            FeatureParams::Size(size) => {
                U16Be::write(ctxt, size.design_size)?;
                U16Be::write(ctxt, size.subfamily_id)?;
                U16Be::write(ctxt, size.subfamily_name_id)?;
                U16Be::write(ctxt, size.range_start)?;
                U16Be::write(ctxt, size.range_end)?;
            }
            FeatureParams::StylisticSet(set) => {
                U16Be::write(ctxt, set.version)?;
                U16Be::write(ctxt, set.ui_name_id)?;
            }
            FeatureParams::CharacterVariant(variant) => {
                U16Be::write(ctxt, variant.format)?;
                U16Be::write(ctxt, variant.feat_ui_label_name_id)?;
                U16Be::write(ctxt, variant.feat_ui_tooltip_text_name_id)?;
                U16Be::write(ctxt, variant.sample_text_name_id)?;
                U16Be::write(ctxt, variant.num_named_parameters)?;
                U16Be::write(ctxt, variant.first_param_ui_label_name_id)?;
                write_count(ctxt, variant.characters.len())?;
                ctxt.write_iter::<U24Be, _>(variant.characters.iter().copied())?;
            }
        }
    }
    Ok(())
}

/// Write the lookup list, switching to extension lookups if 16-bit offsets overflow.
fn lookup_list_data(lookups: &[Lookup<GlyphId>]) -> Result<WriteBuffer, WriteError> {
    let filtering_consistent = lookups.iter().all(|lookup| {
        (lookup.lookup_flag & USE_MARK_FILTERING_SET != 0) == lookup.mark_filtering_set.is_some()
    });
    if !filtering_consistent {
        return Err(WriteError::BadValue);
    }

    let subtables = lookups
        .iter()
        .map(|lookup| subtable_data(&lookup.sub_tables))
        .collect::<Result<Vec<_>, _>>()?;

    let mut buffer = WriteBuffer::new();
    match write_lookup_list(&mut buffer, lookups, &subtables) {
        Ok(()) => Ok(buffer),
        Err(_) => {
            warn!("GSUB lookups are too large for 16-bit offsets, writing extension lookups");
            let mut buffer = WriteBuffer::new();
            write_extension_lookup_list(&mut buffer, lookups, &subtables)?;
            Ok(buffer)
        }
    }
}

fn subtable_data(lookup: &SubstLookup<GlyphId>) -> Result<Vec<WriteBuffer>, WriteError> {
    fn each<T>(
        subtables: &[T],
        write: impl Fn(&mut WriteBuffer, &T) -> Result<(), WriteError>,
    ) -> Result<Vec<WriteBuffer>, WriteError> {
        subtables
            .iter()
            .map(|subtable| {
                let mut buffer = WriteBuffer::new();
                write(&mut buffer, subtable)?;
                Ok(buffer)
            })
            .collect()
    }

    match lookup {
        SubstLookup::Single(subtables) => each(subtables, |ctxt, s| SingleSubst::write(ctxt, s)),
        SubstLookup::Multiple(subtables) => {
            each(subtables, |ctxt, s| MultipleSubst::write(ctxt, s))
        }
        SubstLookup::Alternate(subtables) => {
            each(subtables, |ctxt, s| AlternateSubst::write(ctxt, s))
        }
        SubstLookup::Ligature(subtables) => {
            each(subtables, |ctxt, s| LigatureSubst::write(ctxt, s))
        }
        SubstLookup::Context(subtables) => {
            each(subtables, |ctxt, s| ContextSubst::write(ctxt, s))
        }
        SubstLookup::ChainContext(subtables) => {
            each(subtables, |ctxt, s| ChainContextSubst::write(ctxt, s))
        }
        SubstLookup::ReverseChainSingle(subtables) => {
            each(subtables, |ctxt, s| ReverseChainSingleSubst::write(ctxt, s))
        }
    }
}

/// Write the fields of a lookup table up to the subtable offsets.
fn write_lookup_header<C: WriteContext>(
    ctxt: &mut C,
    lookup_type: u16,
    lookup: &Lookup<GlyphId>,
    subtable_count: usize,
) -> Result<Vec<Offset16>, WriteError> {
    U16Be::write(ctxt, lookup_type)?;
    U16Be::write(ctxt, lookup.lookup_flag)?;
    write_count(ctxt, subtable_count)?;
    let offsets = ctxt.placeholder_array::<U16Be, u16>(subtable_count)?;
    if lookup.lookup_flag & USE_MARK_FILTERING_SET != 0 {
        let set = lookup.mark_filtering_set.ok_or(WriteError::BadValue)?;
        U16Be::write(ctxt, set)?;
    }
    Ok(offsets)
}

fn write_lookup_list<C: WriteContext>(
    ctxt: &mut C,
    lookups: &[Lookup<GlyphId>],
    subtables: &[Vec<WriteBuffer>],
) -> Result<(), WriteError> {
    let base = ctxt.bytes_written();
    write_count(ctxt, lookups.len())?;
    let lookup_offsets = ctxt.placeholder_array::<U16Be, u16>(lookups.len())?;
    for ((lookup, data), lookup_offset) in lookups.iter().zip(subtables).zip(lookup_offsets) {
        let lookup_base = ctxt.bytes_written();
        write_offset16(ctxt, lookup_offset, base)?;
        let lookup_type = lookup.sub_tables.lookup_type();
        let offsets = write_lookup_header(ctxt, lookup_type, lookup, data.len())?;
        for (subtable, offset) in data.iter().zip(offsets) {
            write_offset16(ctxt, offset, lookup_base)?;
            ctxt.write_bytes(subtable.bytes())?;
        }
    }
    Ok(())
}

/// Write every lookup as an extension lookup.
///
/// Lookup tables and their extension subtables come first, followed by all the real subtables
/// which are reached through 32-bit offsets.
fn write_extension_lookup_list<C: WriteContext>(
    ctxt: &mut C,
    lookups: &[Lookup<GlyphId>],
    subtables: &[Vec<WriteBuffer>],
) -> Result<(), WriteError> {
    let base = ctxt.bytes_written();
    write_count(ctxt, lookups.len())?;
    let lookup_offsets = ctxt.placeholder_array::<U16Be, u16>(lookups.len())?;

    let mut pending = Vec::new();
    for ((lookup, data), lookup_offset) in lookups.iter().zip(subtables).zip(lookup_offsets) {
        let lookup_base = ctxt.bytes_written();
        write_offset16(ctxt, lookup_offset, base)?;
        let offsets = write_lookup_header(ctxt, EXTENSION_SUBST, lookup, data.len())?;
        for (subtable, offset) in data.iter().zip(offsets) {
            let extension_base = ctxt.bytes_written();
            write_offset16(ctxt, offset, lookup_base)?;
            U16Be::write(ctxt, 1u16)?; // format
            U16Be::write(ctxt, lookup.sub_tables.lookup_type())?;
            let extension_offset: Offset32 = ctxt.placeholder()?;
            pending.push((extension_base, extension_offset, subtable));
        }
    }

    for (extension_base, extension_offset, subtable) in pending {
        let offset = u32::try_from(ctxt.bytes_written() - extension_base)?;
        ctxt.write_placeholder(extension_offset, offset)?;
        ctxt.write_bytes(subtable.bytes())?;
    }
    Ok(())
}

/// Sort `glyphs` and remove duplicates, as required of coverage tables.
fn sorted_glyphs(glyphs: impl IntoIterator<Item = GlyphId>) -> Vec<GlyphId> {
    let mut glyphs = glyphs.into_iter().collect::<Vec<_>>();
    glyphs.sort_unstable();
    glyphs.dedup();
    glyphs
}

/// Sort `entries` by glyph, keeping the first entry for each glyph.
fn sorted_by_glyph<T: Clone>(entries: &[(GlyphId, T)]) -> Vec<(GlyphId, T)> {
    let mut entries = entries.to_vec();
    entries.sort_by_key(|(glyph, _)| *glyph);
    entries.dedup_by_key(|(glyph, _)| *glyph);
    entries
}

/// Runs of consecutive glyphs with the same value, as `(start, end, value)`.
fn ranges<T: Copy, V: PartialEq + Copy>(
    entries: &[T],
    glyph: impl Fn(&T) -> GlyphId,
    value: impl Fn(&T) -> V,
) -> Vec<(GlyphId, GlyphId, V)> {
    let mut ranges: Vec<(GlyphId, GlyphId, V)> = Vec::new();
    for entry in entries {
        let (glyph, value) = (glyph(entry), value(entry));
        match ranges.last_mut() {
            Some((_, end, range_value))
                if u32::from(*end) + 1 == u32::from(glyph) && *range_value == value =>
            {
                *end = glyph
            }
            _ => ranges.push((glyph, glyph, value)),
        }
    }
    ranges
}

/// Write a coverage table for `glyphs`, which must be sorted and unique.
fn write_coverage<C: WriteContext>(ctxt: &mut C, glyphs: &[GlyphId]) -> Result<(), WriteError> {
    let ranges = ranges(glyphs, |&glyph| glyph, |_| ());
    if ranges.len() * 3 < glyphs.len() {
        U16Be::write(ctxt, 2u16)?;
        write_count(ctxt, ranges.len())?;
        let mut coverage_index = 0u32;
        for (start, end, ()) in ranges {
            U16Be::write(ctxt, start)?;
            U16Be::write(ctxt, end)?;
            U16Be::write(ctxt, u16::try_from(coverage_index)?)?;
            coverage_index += u32::from(end - start) + 1;
        }
    } else {
        U16Be::write(ctxt, 1u16)?;
        write_count(ctxt, glyphs.len())?;
        ctxt.write_iter::<U16Be, _>(glyphs.iter().copied())?;
    }
    Ok(())
}

fn write_class_def<C: WriteContext>(
    ctxt: &mut C,
    class_def: &[(GlyphId, u16)],
) -> Result<(), WriteError> {
    let mut classes = sorted_by_glyph(class_def);
    classes.retain(|&(_, class)| class != 0);

    let ranges = ranges(&classes, |&(glyph, _)| glyph, |&(_, class)| class);
    let format1_size = match (classes.first(), classes.last()) {
        (Some(&(first, _)), Some(&(last, _))) => 6 + 2 * (usize::from(last - first) + 1),
        _ => usize::MAX,
    };
    let format2_size = 4 + 6 * ranges.len();

    if format1_size < format2_size {
        let start = classes.first().map_or(0, |&(glyph, _)| glyph);
        let end = classes.last().map_or(0, |&(glyph, _)| glyph);
        let lookup = classes.iter().copied().collect::<BTreeMap<_, _>>();
        U16Be::write(ctxt, 1u16)?;
        U16Be::write(ctxt, start)?;
        write_count(ctxt, usize::from(end - start) + 1)?;
        ctxt.write_iter::<U16Be, _>(
            (start..=end).map(|glyph| lookup.get(&glyph).copied().unwrap_or(0)),
        )?;
    } else {
        U16Be::write(ctxt, 2u16)?;
        write_count(ctxt, ranges.len())?;
        for (start, end, class) in ranges {
            U16Be::write(ctxt, start)?;
            U16Be::write(ctxt, end)?;
            U16Be::write(ctxt, class)?;
        }
    }
    Ok(())
}

fn write_lookup_records<C: WriteContext>(
    ctxt: &mut C,
    records: &[SequenceLookupRecord],
) -> Result<(), WriteError> {
    for record in records {
        U16Be::write(ctxt, record.sequence_index)?;
        U16Be::write(ctxt, record.lookup_list_index)?;
    }
    Ok(())
}

/// Write an array of offsets to the coverage tables in `coverages`, with the tables themselves
/// written later through the returned placeholders.
fn write_coverage_offsets<C: WriteContext>(
    ctxt: &mut C,
    count_field: bool,
    coverages: &[Vec<GlyphId>],
) -> Result<Vec<Offset16>, WriteError> {
    if count_field {
        write_count(ctxt, coverages.len())?;
    }
    ctxt.placeholder_array::<U16Be, u16>(coverages.len())
}

fn write_coverages<C: WriteContext>(
    ctxt: &mut C,
    base: usize,
    coverages: &[Vec<GlyphId>],
    offsets: Vec<Offset16>,
) -> Result<(), WriteError> {
    for (coverage, offset) in coverages.iter().zip(offsets) {
        write_offset16(ctxt, offset, base)?;
        write_coverage(ctxt, &sorted_glyphs(coverage.iter().copied()))?;
    }
    Ok(())
}

/// Write an array of sets of glyphs, each reached through an offset, like the sequences of
/// a multiple substitution.
fn write_glyph_sets<C: WriteContext>(
    ctxt: &mut C,
    base: usize,
    sets: &[&Vec<GlyphId>],
) -> Result<(), WriteError> {
    write_count(ctxt, sets.len())?;
    let offsets = ctxt.placeholder_array::<U16Be, u16>(sets.len())?;
    for (set, offset) in sets.iter().zip(offsets) {
        write_offset16(ctxt, offset, base)?;
        write_count(ctxt, set.len())?;
        ctxt.write_iter::<U16Be, _>(set.iter().copied())?;
    }
    Ok(())
}

impl WriteBinary<&Self> for SingleSubst<GlyphId> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subst: &Self) -> Result<(), WriteError> {
        let base = ctxt.bytes_written();
        let mapping = sorted_by_glyph(&subst.mapping);
        let delta = mapping
            .first()
            .map_or(0, |&(glyph, substitute)| substitute.wrapping_sub(glyph));

        let coverage: Offset16;
        if mapping
            .iter()
            .all(|&(glyph, substitute)| substitute.wrapping_sub(glyph) == delta)
        {
            U16Be::write(ctxt, 1u16)?;
            coverage = ctxt.placeholder()?;
            I16Be::write(ctxt, delta as i16)?;
        } else {
            U16Be::write(ctxt, 2u16)?;
            coverage = ctxt.placeholder()?;
            write_count(ctxt, mapping.len())?;
            ctxt.write_iter::<U16Be, _>(mapping.iter().map(|&(_, substitute)| substitute))?;
        }

        write_offset16(ctxt, coverage, base)?;
        let glyphs = mapping.iter().map(|&(glyph, _)| glyph).collect::<Vec<_>>();
        write_coverage(ctxt, &glyphs)
    }
}

fn write_glyph_set_subst<C: WriteContext>(
    ctxt: &mut C,
    sets: &[(GlyphId, Vec<GlyphId>)],
) -> Result<(), WriteError> {
    let base = ctxt.bytes_written();
    let sets = sorted_by_glyph(sets);
    U16Be::write(ctxt, 1u16)?;
    let coverage: Offset16 = ctxt.placeholder()?;
    let glyph_sets = sets.iter().map(|(_, set)| set).collect::<Vec<_>>();
    write_glyph_sets(ctxt, base, &glyph_sets)?;
    write_offset16(ctxt, coverage, base)?;
    let glyphs = sets.iter().map(|&(glyph, _)| glyph).collect::<Vec<_>>();
    write_coverage(ctxt, &glyphs)
}

impl WriteBinary<&Self> for MultipleSubst<GlyphId> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subst: &Self) -> Result<(), WriteError> {
        write_glyph_set_subst(ctxt, &subst.sequences)
    }
}

impl WriteBinary<&Self> for AlternateSubst<GlyphId> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subst: &Self) -> Result<(), WriteError> {
        write_glyph_set_subst(ctxt, &subst.alternate_sets)
    }
}

/// Group `items` by their first glyph, keeping the order of the items within each group.
fn group_by_first<T>(
    items: &[T],
    first: impl Fn(&T) -> Option<u16>,
) -> Result<BTreeMap<u16, Vec<&T>>, WriteError> {
    let mut groups: BTreeMap<u16, Vec<&T>> = BTreeMap::new();
    for item in items {
        let key = first(item).ok_or(WriteError::BadValue)?;
        groups.entry(key).or_default().push(item);
    }
    Ok(groups)
}

impl WriteBinary<&Self> for LigatureSubst<GlyphId> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subst: &Self) -> Result<(), WriteError> {
        let base = ctxt.bytes_written();
        let sets = group_by_first(&subst.ligatures, |ligature| {
            ligature.components.first().copied()
        })?;
        U16Be::write(ctxt, 1u16)?;
        let coverage: Offset16 = ctxt.placeholder()?;
        write_count(ctxt, sets.len())?;
        let set_offsets = ctxt.placeholder_array::<U16Be, u16>(sets.len())?;

        for (ligatures, set_offset) in sets.values().zip(set_offsets) {
            let set_base = ctxt.bytes_written();
            write_offset16(ctxt, set_offset, base)?;
            write_count(ctxt, ligatures.len())?;
            let offsets = ctxt.placeholder_array::<U16Be, u16>(ligatures.len())?;
            for (ligature, offset) in ligatures.iter().zip(offsets) {
                write_offset16(ctxt, offset, set_base)?;
                U16Be::write(ctxt, ligature.glyph)?;
                write_count(ctxt, ligature.components.len())?;
                ctxt.write_iter::<U16Be, _>(ligature.components.iter().skip(1).copied())?;
            }
        }

        write_offset16(ctxt, coverage, base)?;
        write_coverage(ctxt, &sets.keys().copied().collect::<Vec<_>>())
    }
}

/// Write rule sets for the rules in `sets`, indexed from 0 to `set_count`.
fn write_rule_sets<C: WriteContext, R>(
    ctxt: &mut C,
    base: usize,
    set_count: usize,
    sets: &BTreeMap<u16, Vec<&R>>,
    write_rule: impl Fn(&mut C, &R) -> Result<(), WriteError>,
) -> Result<(), WriteError> {
    write_count(ctxt, set_count)?;
    let mut set_offsets = Vec::with_capacity(set_count);
    for index in 0..set_count {
        let has_rules = u16::try_from(index).map_or(false, |index| sets.contains_key(&index));
        if has_rules {
            set_offsets.push(Some(ctxt.placeholder::<U16Be, u16>()?));
        } else {
            U16Be::write(ctxt, 0u16)?;
            set_offsets.push(None);
        }
    }

    for (rules, set_offset) in sets.values().zip(set_offsets.into_iter().flatten()) {
        let set_base = ctxt.bytes_written();
        write_offset16(ctxt, set_offset, base)?;
        write_count(ctxt, rules.len())?;
        let offsets = ctxt.placeholder_array::<U16Be, u16>(rules.len())?;
        for (rule, offset) in rules.iter().zip(offsets) {
            write_offset16(ctxt, offset, set_base)?;
            write_rule(ctxt, *rule)?;
        }
    }
    Ok(())
}

fn write_sequence_rule<C: WriteContext>(
    ctxt: &mut C,
    rule: &SequenceRule<u16>,
) -> Result<(), WriteError> {
    write_count(ctxt, rule.input.len())?;
    write_count(ctxt, rule.lookup_records.len())?;
    ctxt.write_iter::<U16Be, _>(rule.input.iter().skip(1).copied())?;
    write_lookup_records(ctxt, &rule.lookup_records)
}

fn write_chain_rule<C: WriteContext>(
    ctxt: &mut C,
    rule: &ChainRule<u16>,
) -> Result<(), WriteError> {
    write_count(ctxt, rule.backtrack.len())?;
    ctxt.write_iter::<U16Be, _>(rule.backtrack.iter().copied())?;
    write_count(ctxt, rule.input.len())?;
    ctxt.write_iter::<U16Be, _>(rule.input.iter().skip(1).copied())?;
    write_count(ctxt, rule.lookahead.len())?;
    ctxt.write_iter::<U16Be, _>(rule.lookahead.iter().copied())?;
    write_count(ctxt, rule.lookup_records.len())?;
    write_lookup_records(ctxt, &rule.lookup_records)
}

/// The number of class rule sets needed to cover `class_defs` and `sets`.
fn class_set_count<R>(sets: &BTreeMap<u16, Vec<&R>>, class_def: &[(GlyphId, u16)]) -> usize {
    let max_rule_class = sets.keys().next_back().copied();
    let max_defined_class = class_def.iter().map(|&(_, class)| class).max();
    max_rule_class
        .max(max_defined_class)
        .map_or(0, |class| usize::from(class) + 1)
}

impl WriteBinary<&Self> for ContextSubst<GlyphId> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subst: &Self) -> Result<(), WriteError> {
        let base = ctxt.bytes_written();
        match subst {
            ContextSubst::Glyphs(rules) => {
                let sets = group_by_first(rules, |rule| rule.input.first().copied())?;
                U16Be::write(ctxt, 1u16)?;
                let coverage: Offset16 = ctxt.placeholder()?;
                // Glyph rule sets are in coverage order, so re-key them by coverage index
                let indexed = sets
                    .values()
                    .enumerate()
                    .map(|(index, rules)| Ok((u16::try_from(index)?, rules.clone())))
                    .collect::<Result<BTreeMap<_, _>, WriteError>>()?;
                write_rule_sets(ctxt, base, sets.len(), &indexed, write_sequence_rule)?;
                write_offset16(ctxt, coverage, base)?;
                write_coverage(ctxt, &sets.keys().copied().collect::<Vec<_>>())
            }
            ContextSubst::Classes(context) => {
                let sets = group_by_first(&context.rules, |rule| rule.input.first().copied())?;
                U16Be::write(ctxt, 2u16)?;
                let coverage: Offset16 = ctxt.placeholder()?;
                let class_def: Offset16 = ctxt.placeholder()?;
                let set_count = class_set_count(&sets, &context.class_def);
                write_rule_sets(ctxt, base, set_count, &sets, write_sequence_rule)?;
                write_offset16(ctxt, coverage, base)?;
                write_coverage(ctxt, &sorted_glyphs(context.coverage.iter().copied()))?;
                write_offset16(ctxt, class_def, base)?;
                write_class_def(ctxt, &context.class_def)
            }
            ContextSubst::Coverages(context) => {
                U16Be::write(ctxt, 3u16)?;
                write_count(ctxt, context.input.len())?;
                write_count(ctxt, context.lookup_records.len())?;
                let offsets = write_coverage_offsets(ctxt, false, &context.input)?;
                write_lookup_records(ctxt, &context.lookup_records)?;
                write_coverages(ctxt, base, &context.input, offsets)
            }
        }
    }
}

impl WriteBinary<&Self> for ChainContextSubst<GlyphId> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subst: &Self) -> Result<(), WriteError> {
        let base = ctxt.bytes_written();
        match subst {
            ChainContextSubst::Glyphs(rules) => {
                let sets = group_by_first(rules, |rule| rule.input.first().copied())?;
                U16Be::write(ctxt, 1u16)?;
                let coverage: Offset16 = ctxt.placeholder()?;
                let indexed = sets
                    .values()
                    .enumerate()
                    .map(|(index, rules)| Ok((u16::try_from(index)?, rules.clone())))
                    .collect::<Result<BTreeMap<_, _>, WriteError>>()?;
                write_rule_sets(ctxt, base, sets.len(), &indexed, write_chain_rule)?;
                write_offset16(ctxt, coverage, base)?;
                write_coverage(ctxt, &sets.keys().copied().collect::<Vec<_>>())
            }
            ChainContextSubst::Classes(context) => {
                let sets = group_by_first(&context.rules, |rule| rule.input.first().copied())?;
                U16Be::write(ctxt, 2u16)?;
                let coverage: Offset16 = ctxt.placeholder()?;
                let backtrack_class_def: Offset16 = ctxt.placeholder()?;
                let input_class_def: Offset16 = ctxt.placeholder()?;
                let lookahead_class_def: Offset16 = ctxt.placeholder()?;
                let set_count = class_set_count(&sets, &context.input_class_def);
                write_rule_sets(ctxt, base, set_count, &sets, write_chain_rule)?;
                write_offset16(ctxt, coverage, base)?;
                write_coverage(ctxt, &sorted_glyphs(context.coverage.iter().copied()))?;
                write_offset16(ctxt, backtrack_class_def, base)?;
                write_class_def(ctxt, &context.backtrack_class_def)?;
                write_offset16(ctxt, input_class_def, base)?;
                write_class_def(ctxt, &context.input_class_def)?;
                write_offset16(ctxt, lookahead_class_def, base)?;
                write_class_def(ctxt, &context.lookahead_class_def)
            }
            ChainContextSubst::Coverages(context) => {
                U16Be::write(ctxt, 3u16)?;
                let backtrack = write_coverage_offsets(ctxt, true, &context.backtrack)?;
                let input = write_coverage_offsets(ctxt, true, &context.input)?;
                let lookahead = write_coverage_offsets(ctxt, true, &context.lookahead)?;
                write_count(ctxt, context.lookup_records.len())?;
                write_lookup_records(ctxt, &context.lookup_records)?;
                write_coverages(ctxt, base, &context.backtrack, backtrack)?;
                write_coverages(ctxt, base, &context.input, input)?;
                write_coverages(ctxt, base, &context.lookahead, lookahead)
            }
        }
    }
}

impl WriteBinary<&Self> for ReverseChainSingleSubst<GlyphId> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, subst: &Self) -> Result<(), WriteError> {
        let base = ctxt.bytes_written();
        let mapping = sorted_by_glyph(&subst.mapping);
        U16Be::write(ctxt, 1u16)?;
        let coverage: Offset16 = ctxt.placeholder()?;
        let backtrack = write_coverage_offsets(ctxt, true, &subst.backtrack)?;
        let lookahead = write_coverage_offsets(ctxt, true, &subst.lookahead)?;
        write_count(ctxt, mapping.len())?;
        ctxt.write_iter::<U16Be, _>(mapping.iter().map(|&(_, substitute)| substitute))?;

        write_offset16(ctxt, coverage, base)?;
        let glyphs = mapping.iter().map(|&(glyph, _)| glyph).collect::<Vec<_>>();
        write_coverage(ctxt, &glyphs)?;
        write_coverages(ctxt, base, &subst.backtrack, backtrack)?;
        write_coverages(ctxt, base, &subst.lookahead, lookahead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_gsub(table: &GsubTable) -> Vec<u8> {
        let mut buffer = WriteBuffer::new();
        GsubTable::write(&mut buffer, table).unwrap();
        buffer.into_inner()
    }

    fn read_gsub(data: &[u8]) -> GsubTable {
        ReadScope::new(data).read::<GsubTable>().unwrap()
    }

    fn lookup(sub_tables: SubstLookup<GlyphId>) -> Lookup<GlyphId> {
        Lookup {
            lookup_flag: 0,
            mark_filtering_set: None,
            sub_tables,
        }
    }

    fn table_with_lookups(lookup_list: Vec<Lookup<GlyphId>>) -> GsubTable {
        let mut table = GsubTable::empty();
        table.feature_list.push(FeatureRecord {
            feature_tag: tag::from_string("liga").unwrap(),
            feature: Feature {
                feature_params: None,
                lookup_indices: (0..lookup_list.len() as u16).collect(),
            },
        });
        if let Some(lang_sys) = &mut table.script_list[0].script.default_lang_sys {
            lang_sys.feature_indices.push(0);
        }
        table.lookup_list = lookup_list;
        table
    }

    #[test]
    fn test_read_single_subst_format1() {
        #[rustfmt::skip]
        let data = [
            0x00, 0x01, 0x00, 0x00, // version 1.0
            0x00, 0x0A, // script list
            0x00, 0x0C, // feature list
            0x00, 0x0E, // lookup list
            0x00, 0x00, // script count
            0x00, 0x00, // feature count
            0x00, 0x01, 0x00, 0x04, // 1 lookup at 4
            0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x08, // type 1, flag 0, 1 subtable at 8
            0x00, 0x01, 0x00, 0x06, 0x00, 0x03, // format 1, coverage at 6, delta 3
            0x00, 0x01, 0x00, 0x02, 0x00, 0x05, 0x00, 0x07, // coverage format 1: 5, 7
        ];
        let gsub = read_gsub(&data);
        assert_eq!(
            gsub.lookup_list,
            vec![lookup(SubstLookup::Single(vec![SingleSubst {
                mapping: vec![(5, 8), (7, 10)]
            }]))]
        );
    }

    #[test]
    fn test_single_subst_format_choice() {
        let delta = SingleSubst {
            mapping: vec![(7, 17), (5, 15)],
        };
        let mut buffer = WriteBuffer::new();
        SingleSubst::write(&mut buffer, &delta).unwrap();
        assert_eq!(
            buffer.bytes(),
            &[0, 1, 0, 6, 0, 10, 0, 1, 0, 2, 0, 5, 0, 7]
        );

        let mixed = SingleSubst {
            mapping: vec![(5, 15), (7, 3)],
        };
        let mut buffer = WriteBuffer::new();
        SingleSubst::write(&mut buffer, &mixed).unwrap();
        assert_eq!(
            buffer.bytes(),
            &[0, 2, 0, 10, 0, 2, 0, 15, 0, 3, 0, 1, 0, 2, 0, 5, 0, 7]
        );
    }

    #[test]
    fn test_coverage_format_choice() {
        let mut buffer = WriteBuffer::new();
        write_coverage(&mut buffer, &(10..20).collect::<Vec<_>>()).unwrap();
        assert_eq!(buffer.bytes(), &[0, 2, 0, 1, 0, 10, 0, 19, 0, 0]);
        let read = ReadScope::new(buffer.bytes())
            .read::<CoverageTable>()
            .unwrap();
        assert_eq!(read, (10..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_coverage_ranges_out_of_order() {
        let data = [0, 2, 0, 2, 0, 10, 0, 19, 0, 0, 0, 5, 0, 6, 0, 10];
        assert_eq!(
            ReadScope::new(&data).read::<CoverageTable>(),
            Err(ParseError::BadValue)
        );
    }

    #[test]
    fn test_class_def_format_choice() {
        let mut buffer = WriteBuffer::new();
        write_class_def(&mut buffer, &[(3, 1), (4, 2), (5, 1), (0, 0)]).unwrap();
        assert_eq!(buffer.bytes(), &[0, 1, 0, 3, 0, 3, 0, 1, 0, 2, 0, 1]);

        let mut buffer = WriteBuffer::new();
        write_class_def(&mut buffer, &[(100, 1), (101, 1), (102, 1), (2, 3)]).unwrap();
        assert_eq!(
            buffer.bytes(),
            &[0, 2, 0, 2, 0, 2, 0, 2, 0, 3, 0, 100, 0, 102, 0, 1]
        );
        let read = ReadScope::new(buffer.bytes())
            .read::<ClassDefTable>()
            .unwrap();
        assert_eq!(read, vec![(2, 3), (100, 1), (101, 1), (102, 1)]);
    }

    #[test]
    fn test_empty_table() {
        let table = GsubTable::empty();
        let data = write_gsub(&table);
        assert_eq!(read_gsub(&data), table);
    }

    #[test]
    fn test_round_trip_all_lookup_types() {
        let records = vec![SequenceLookupRecord {
            sequence_index: 0,
            lookup_list_index: 0,
        }];
        let table = table_with_lookups(vec![
            lookup(SubstLookup::Single(vec![SingleSubst {
                mapping: vec![(1, 2), (3, 9)],
            }])),
            lookup(SubstLookup::Multiple(vec![MultipleSubst {
                sequences: vec![(4, vec![5, 6]), (7, vec![])],
            }])),
            lookup(SubstLookup::Alternate(vec![AlternateSubst {
                alternate_sets: vec![(4, vec![8, 9, 10])],
            }])),
            lookup(SubstLookup::Ligature(vec![LigatureSubst {
                ligatures: vec![
                    Ligature {
                        components: vec![2, 2],
                        glyph: 22,
                    },
                    Ligature {
                        components: vec![6, 7, 8],
                        glyph: 20,
                    },
                    Ligature {
                        components: vec![6, 7],
                        glyph: 21,
                    },
                ],
            }])),
            lookup(SubstLookup::Context(vec![
                ContextSubst::Glyphs(vec![SequenceRule {
                    input: vec![3, 4],
                    lookup_records: records.clone(),
                }]),
                ContextSubst::Classes(ClassContext {
                    coverage: vec![3, 4],
                    class_def: vec![(3, 1), (4, 2)],
                    rules: vec![SequenceRule {
                        input: vec![2, 1],
                        lookup_records: records.clone(),
                    }],
                }),
                ContextSubst::Coverages(CoverageContext {
                    input: vec![vec![1, 2], vec![3]],
                    lookup_records: records.clone(),
                }),
            ])),
            lookup(SubstLookup::ChainContext(vec![
                ChainContextSubst::Glyphs(vec![ChainRule {
                    backtrack: vec![1],
                    input: vec![2, 3],
                    lookahead: vec![4, 5],
                    lookup_records: records.clone(),
                }]),
                ChainContextSubst::Classes(ChainClassContext {
                    coverage: vec![2],
                    backtrack_class_def: vec![(1, 1)],
                    input_class_def: vec![(2, 1)],
                    lookahead_class_def: vec![],
                    rules: vec![ChainRule {
                        backtrack: vec![1],
                        input: vec![1],
                        lookahead: vec![0],
                        lookup_records: records.clone(),
                    }],
                }),
                ChainContextSubst::Coverages(ChainCoverageContext {
                    backtrack: vec![vec![1]],
                    input: vec![vec![2, 3]],
                    lookahead: vec![],
                    lookup_records: records,
                }),
            ])),
            lookup(SubstLookup::ReverseChainSingle(vec![ReverseChainSingleSubst {
                backtrack: vec![vec![1, 2]],
                lookahead: vec![vec![3]],
                mapping: vec![(5, 6), (7, 8)],
            }])),
        ]);

        let data = write_gsub(&table);
        assert_eq!(read_gsub(&data), table);
    }

    #[test]
    fn test_mark_filtering_set() {
        let mut table = table_with_lookups(vec![lookup(SubstLookup::Single(vec![]))]);
        table.lookup_list[0].lookup_flag = USE_MARK_FILTERING_SET | 0x0008;
        table.lookup_list[0].mark_filtering_set = Some(2);
        let data = write_gsub(&table);
        assert_eq!(read_gsub(&data), table);

        table.lookup_list[0].mark_filtering_set = None;
        let mut buffer = WriteBuffer::new();
        assert_eq!(
            GsubTable::write(&mut buffer, &table),
            Err(WriteError::BadValue)
        );
    }

    #[test]
    fn test_feature_params() {
        let mut table = GsubTable::empty();
        table.feature_list = vec![
            FeatureRecord {
                feature_tag: tag::from_string("ss01").unwrap(),
                feature: Feature {
                    feature_params: Some(FeatureParams::StylisticSet(StylisticSetParams {
                        version: 0,
                        ui_name_id: 256,
                    })),
                    lookup_indices: vec![],
                },
            },
            FeatureRecord {
                feature_tag: tag::from_string("cv01").unwrap(),
                feature: Feature {
                    feature_params: Some(FeatureParams::CharacterVariant(
                        CharacterVariantParams {
                            format: 0,
                            feat_ui_label_name_id: 257,
                            feat_ui_tooltip_text_name_id: 0,
                            sample_text_name_id: 0,
                            num_named_parameters: 0,
                            first_param_ui_label_name_id: 0,
                            characters: vec![0x61, 0x1F600],
                        },
                    )),
                    lookup_indices: vec![],
                },
            },
        ];
        let data = write_gsub(&table);
        assert_eq!(read_gsub(&data), table);
    }

    #[test]
    fn test_unknown_feature_params_dropped() {
        let mut table = GsubTable::empty();
        table.feature_list.push(FeatureRecord {
            feature_tag: tag::from_string("liga").unwrap(),
            feature: Feature {
                feature_params: Some(FeatureParams::StylisticSet(StylisticSetParams {
                    version: 0,
                    ui_name_id: 256,
                })),
                lookup_indices: vec![],
            },
        });
        let read = read_gsub(&write_gsub(&table));
        assert_eq!(read.feature_list[0].feature.feature_params, None);
    }

    #[test]
    fn test_feature_variations_kept() {
        #[rustfmt::skip]
        let feature_variations = vec![
            0x00, 0x01, 0x00, 0x00, // version
            0x00, 0x00, 0x00, 0x01, // 1 record
            0x00, 0x00, 0x00, 0x10, // condition set at 16
            0x00, 0x00, 0x00, 0x1E, // substitution at 30
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06, // 1 condition at 6
            0x00, 0x01, 0x00, 0x00, // format 1, axis 0
            0x40, 0x00, 0x40, 0x00, // min, max
            0x00, 0x01, 0x00, 0x00, // version
            0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, // feature 0 at 12
            0x00, 0x00, 0x00, 0x01, 0x00, 0x00, // feature: no params, lookup 0
        ];
        assert_eq!(
            feature_variations_length(ReadScope::new(&feature_variations)),
            Ok(feature_variations.len())
        );

        let mut table = GsubTable::empty();
        table.version = VERSION_1_1;
        table.feature_variations = Some(RawTable(feature_variations));
        let data = write_gsub(&table);
        assert_eq!(read_gsub(&data), table);
    }

    #[test]
    fn test_extension_lookups_when_offsets_overflow() {
        // Each subtable needs about 60KiB, so the third lookup can't be reached with 16 bits
        let big = |offset: u16| SingleSubst {
            mapping: (0..30000u16)
                .map(|glyph| (glyph, glyph.wrapping_mul(3).wrapping_add(offset)))
                .collect(),
        };
        let table = table_with_lookups(vec![
            lookup(SubstLookup::Single(vec![big(1)])),
            lookup(SubstLookup::Single(vec![big(2)])),
            lookup(SubstLookup::Single(vec![big(3)])),
        ]);

        let data = write_gsub(&table);
        assert!(data.len() > 0x10000);
        let read = read_gsub(&data);
        assert_eq!(read, table);

        // The lookups were written as extension lookups
        let lookup_list = usize::from(u16::from_be_bytes([data[8], data[9]]));
        let first_lookup =
            lookup_list + usize::from(u16::from_be_bytes([data[lookup_list + 2], data[lookup_list + 3]]));
        assert_eq!(&data[first_lookup..first_lookup + 2], &[0, 7]);
    }
}
