//! Text form of the `GSUB` table.
//!
//! The text is a TTX document: a `ttFont` element holding a single `GSUB` element, laid out the
//! way fontTools dumps and reads it, so a table can be dumped, edited by font tools and read
//! back. Glyphs are referred to by name through the font's glyph order. Glyph ids without a name
//! are written as `glyph<N>`, which is also accepted on input.
//!
//! Reading also accepts a bare `GSUB` root element, extension subtables (`ExtensionSubst`) and
//! the `Format` attribute older dumps put on every subtable. Element order within a list is
//! significant, `index` attributes are not. A `FeatureVariations` table is carried as
//! `hexdata`.

use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;

use itertools::Itertools;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use rustc_hash::FxHashMap;

use crate::error::TranscodeError;
use crate::font::{numbered_glyph_name, GlyphOrder};
use crate::tag::{self, DisplayTag};

use super::{
    AlternateSubst, ChainClassContext, ChainContextSubst, ChainCoverageContext, ChainRule,
    CharacterVariantParams, ClassContext, ContextSubst, CoverageContext, Feature, FeatureParams,
    FeatureRecord, GlyphId, GsubTable, LangSys, LangSysRecord, Ligature, LigatureSubst, Lookup,
    MultipleSubst, RawTable, ReverseChainSingleSubst, Script, ScriptRecord, SequenceLookupRecord,
    SequenceRule, SingleSubst, SizeParams, StylisticSetParams, SubstLookup, EXTENSION_SUBST,
    NO_REQUIRED_FEATURE, USE_MARK_FILTERING_SET, VERSION_1_0, VERSION_1_1,
};

/// Written in the `ttLibVersion` attribute of the root element.
const TTX_VERSION: &str = "4.56";

/// Subtable element names by lookup type.
const SUBTABLE_NAMES: [(u16, &str); 7] = [
    (1, "SingleSubst"),
    (2, "MultipleSubst"),
    (3, "AlternateSubst"),
    (4, "LigatureSubst"),
    (5, "ContextSubst"),
    (6, "ChainContextSubst"),
    (8, "ReverseChainSingleSubst"),
];

/// Dump `table` to text, naming glyphs with `glyph_order`.
pub fn to_text(table: &GsubTable, glyph_order: &GlyphOrder) -> Result<String, TranscodeError> {
    let named = table
        .map_glyphs(&mut |&glyph: &GlyphId| {
            Ok::<_, Infallible>(match glyph_order.name(glyph) {
                Some(name) => name.to_owned(),
                None => numbered_glyph_name(glyph),
            })
        })
        .map_err(|(_, _, never)| -> TranscodeError { match never {} })?;

    let mut ttx = TtxWriter::new();
    ttx.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    ttx.start(
        "ttFont",
        &[
            ("sfntVersion", String::from("OTTO")),
            ("ttLibVersion", String::from(TTX_VERSION)),
        ],
    )?;
    ttx.start("GSUB", &[])?;
    write_table(&mut ttx, &named)?;
    ttx.end("GSUB")?;
    ttx.end("ttFont")?;
    ttx.finish()
}

/// Parse a table from text, resolving glyph names with `glyph_order`.
///
/// The parsed table is checked for references that can't be resolved, such as feature indices
/// past the end of the feature list, so that what is returned can be written as a valid table.
pub fn from_text(text: &str, glyph_order: &GlyphOrder) -> Result<GsubTable, TranscodeError> {
    let document = parse_document(text)?;
    let gsub = match document.name.as_str() {
        "GSUB" => &document,
        "ttFont" => document
            .children
            .iter()
            .find(|child| child.name == "GSUB")
            .ok_or_else(|| document.missing("GSUB"))?,
        name => return Err(document.error(format!("unexpected root element <{}>", name))),
    };
    let named = read_table(gsub)?;
    let table = named
        .map_glyphs(&mut |name: &String| {
            glyph_order
                .glyph_id(name)
                .or_else(|| numbered_glyph(name))
                .ok_or_else(|| format!("unknown glyph '{}'", name))
        })
        .map_err(|(lookup_index, subtable_index, message)| {
            TranscodeError::field(
                format!("LookupList[{}].SubTables[{}]", lookup_index, subtable_index),
                message,
            )
        })?;
    validate(&table)?;
    Ok(table)
}

/// Parse a `glyph<N>` name.
fn numbered_glyph(name: &str) -> Option<GlyphId> {
    let digits = name.strip_prefix("glyph")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

// Writing

struct TtxWriter {
    writer: Writer<Vec<u8>>,
}

impl TtxWriter {
    fn new() -> Self {
        TtxWriter {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), TranscodeError> {
        self.writer
            .write_event(event)
            .map_err(|err| TranscodeError::message(err.to_string()))
    }

    fn start(&mut self, name: &str, attributes: &[(&str, String)]) -> Result<(), TranscodeError> {
        self.event(Event::Start(element(name, attributes)))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, String)]) -> Result<(), TranscodeError> {
        self.event(Event::Empty(element(name, attributes)))
    }

    fn end(&mut self, name: &str) -> Result<(), TranscodeError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn value(&mut self, name: &str, value: impl fmt::Display) -> Result<(), TranscodeError> {
        self.empty(name, &[("value", value.to_string())])
    }

    fn indexed(
        &mut self,
        name: &str,
        index: usize,
        value: impl fmt::Display,
    ) -> Result<(), TranscodeError> {
        self.empty(
            name,
            &[("index", index.to_string()), ("value", value.to_string())],
        )
    }

    /// The `<!-- Name=N -->` comment TTX puts before the elements of an array.
    fn count(&mut self, name: &str, count: usize) -> Result<(), TranscodeError> {
        let comment = format!(" {}={} ", name, count);
        self.event(Event::Comment(BytesText::from_escaped(comment)))
    }

    fn finish(self) -> Result<String, TranscodeError> {
        let mut text = String::from_utf8(self.writer.into_inner())
            .map_err(|err| TranscodeError::message(err.to_string()))?;
        text.push('\n');
        Ok(text)
    }
}

fn element<'a>(name: &'a str, attributes: &'a [(&'a str, String)]) -> BytesStart<'a> {
    BytesStart::new(name).with_attributes(
        attributes
            .iter()
            .map(|(key, value)| (*key, value.as_str())),
    )
}

fn index_attribute(index: usize) -> [(&'static str, String); 1] {
    [("index", index.to_string())]
}

/// Sizes in tenths of a point, written in points.
struct DeciPoints(u16);

impl fmt::Display for DeciPoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

fn write_table(ttx: &mut TtxWriter, table: &GsubTable<String>) -> Result<(), TranscodeError> {
    ttx.value("Version", format!("0x{:08X}", table.version))?;

    ttx.start("ScriptList", &[])?;
    ttx.count("ScriptCount", table.script_list.len())?;
    for (index, record) in table.script_list.iter().enumerate() {
        ttx.start("ScriptRecord", &index_attribute(index))?;
        ttx.value("ScriptTag", DisplayTag(record.script_tag))?;
        ttx.start("Script", &[])?;
        if let Some(lang_sys) = &record.script.default_lang_sys {
            write_lang_sys(ttx, "DefaultLangSys", lang_sys)?;
        }
        ttx.count("LangSysCount", record.script.lang_sys_records.len())?;
        for (index, lang_sys_record) in record.script.lang_sys_records.iter().enumerate() {
            ttx.start("LangSysRecord", &index_attribute(index))?;
            ttx.value("LangSysTag", DisplayTag(lang_sys_record.lang_sys_tag))?;
            write_lang_sys(ttx, "LangSys", &lang_sys_record.lang_sys)?;
            ttx.end("LangSysRecord")?;
        }
        ttx.end("Script")?;
        ttx.end("ScriptRecord")?;
    }
    ttx.end("ScriptList")?;

    ttx.start("FeatureList", &[])?;
    ttx.count("FeatureCount", table.feature_list.len())?;
    for (index, record) in table.feature_list.iter().enumerate() {
        ttx.start("FeatureRecord", &index_attribute(index))?;
        ttx.value("FeatureTag", DisplayTag(record.feature_tag))?;
        ttx.start("Feature", &[])?;
        if let Some(params) = &record.feature.feature_params {
            write_feature_params(ttx, params)?;
        }
        ttx.count("LookupCount", record.feature.lookup_indices.len())?;
        for (index, lookup_index) in record.feature.lookup_indices.iter().enumerate() {
            ttx.indexed("LookupListIndex", index, lookup_index)?;
        }
        ttx.end("Feature")?;
        ttx.end("FeatureRecord")?;
    }
    ttx.end("FeatureList")?;

    ttx.start("LookupList", &[])?;
    ttx.count("LookupCount", table.lookup_list.len())?;
    for (index, lookup) in table.lookup_list.iter().enumerate() {
        write_lookup(ttx, index, lookup)?;
    }
    ttx.end("LookupList")?;

    if let Some(RawTable(data)) = &table.feature_variations {
        let hex = data.iter().map(|byte| format!("{:02x}", byte)).join("");
        ttx.start("FeatureVariations", &[])?;
        ttx.start("hexdata", &[])?;
        ttx.event(Event::Text(BytesText::new(&hex)))?;
        ttx.end("hexdata")?;
        ttx.end("FeatureVariations")?;
    }

    Ok(())
}

fn write_lang_sys(ttx: &mut TtxWriter, name: &str, lang_sys: &LangSys) -> Result<(), TranscodeError> {
    ttx.start(name, &[])?;
    ttx.value("ReqFeatureIndex", lang_sys.req_feature_index)?;
    ttx.count("FeatureCount", lang_sys.feature_indices.len())?;
    for (index, feature_index) in lang_sys.feature_indices.iter().enumerate() {
        ttx.indexed("FeatureIndex", index, feature_index)?;
    }
    ttx.end(name)
}

fn write_feature_params(ttx: &mut TtxWriter, params: &FeatureParams) -> Result<(), TranscodeError> {
    match params {
        FeatureParams::Size(size) => {
            ttx.start("FeatureParamsSize", &[])?;
            ttx.value("DesignSize", DeciPoints(size.design_size))?;
            ttx.value("SubfamilyID", size.subfamily_id)?;
            ttx.value("SubfamilyNameID", size.subfamily_name_id)?;
            ttx.value("RangeStart", DeciPoints(size.range_start))?;
            ttx.value("RangeEnd", DeciPoints(size.range_end))?;
            ttx.end("FeatureParamsSize")
        }
        FeatureParams::StylisticSet(set) => {
            ttx.start("FeatureParamsStylisticSet", &[])?;
            ttx.value("Version", set.version)?;
            ttx.value("UINameID", set.ui_name_id)?;
            ttx.end("FeatureParamsStylisticSet")
        }
        FeatureParams::CharacterVariant(variant) => {
            ttx.start("FeatureParamsCharacterVariants", &[])?;
            ttx.value("Format", variant.format)?;
            ttx.value("FeatUILabelNameID", variant.feat_ui_label_name_id)?;
            ttx.value("FeatUITooltipTextNameID", variant.feat_ui_tooltip_text_name_id)?;
            ttx.value("SampleTextNameID", variant.sample_text_name_id)?;
            ttx.value("NumNamedParameters", variant.num_named_parameters)?;
            ttx.value("FirstParamUILabelNameID", variant.first_param_ui_label_name_id)?;
            ttx.count("CharCount", variant.characters.len())?;
            for (index, character) in variant.characters.iter().enumerate() {
                ttx.indexed("Character", index, character)?;
            }
            ttx.end("FeatureParamsCharacterVariants")
        }
    }
}

fn write_lookup(
    ttx: &mut TtxWriter,
    index: usize,
    lookup: &Lookup<String>,
) -> Result<(), TranscodeError> {
    ttx.start("Lookup", &index_attribute(index))?;
    ttx.value("LookupType", lookup.sub_tables.lookup_type())?;
    ttx.value("LookupFlag", lookup.lookup_flag)?;
    ttx.count("SubTableCount", lookup.sub_tables.len())?;
    match &lookup.sub_tables {
        SubstLookup::Single(subtables) => each(ttx, subtables, write_single)?,
        SubstLookup::Multiple(subtables) => each(ttx, subtables, write_multiple)?,
        SubstLookup::Alternate(subtables) => each(ttx, subtables, write_alternate)?,
        SubstLookup::Ligature(subtables) => each(ttx, subtables, write_ligature)?,
        SubstLookup::Context(subtables) => each(ttx, subtables, write_context)?,
        SubstLookup::ChainContext(subtables) => each(ttx, subtables, write_chain_context)?,
        SubstLookup::ReverseChainSingle(subtables) => each(ttx, subtables, write_reverse_chain)?,
    }
    if let Some(mark_filtering_set) = lookup.mark_filtering_set {
        ttx.value("MarkFilteringSet", mark_filtering_set)?;
    }
    ttx.end("Lookup")
}

fn each<T>(
    ttx: &mut TtxWriter,
    subtables: &[T],
    write: impl Fn(&mut TtxWriter, usize, &T) -> Result<(), TranscodeError>,
) -> Result<(), TranscodeError> {
    for (index, subtable) in subtables.iter().enumerate() {
        write(ttx, index, subtable)?;
    }
    Ok(())
}

fn start_subtable(
    ttx: &mut TtxWriter,
    name: &str,
    index: usize,
    format: Option<u16>,
) -> Result<(), TranscodeError> {
    let mut attributes = vec![("index", index.to_string())];
    if let Some(format) = format {
        attributes.push(("Format", format.to_string()));
    }
    ttx.start(name, &attributes)
}

fn write_single(
    ttx: &mut TtxWriter,
    index: usize,
    subst: &SingleSubst<String>,
) -> Result<(), TranscodeError> {
    start_subtable(ttx, "SingleSubst", index, None)?;
    for (glyph, substitute) in &subst.mapping {
        ttx.empty(
            "Substitution",
            &[("in", glyph.clone()), ("out", substitute.clone())],
        )?;
    }
    ttx.end("SingleSubst")
}

fn write_multiple(
    ttx: &mut TtxWriter,
    index: usize,
    subst: &MultipleSubst<String>,
) -> Result<(), TranscodeError> {
    start_subtable(ttx, "MultipleSubst", index, None)?;
    for (glyph, sequence) in &subst.sequences {
        ttx.empty(
            "Substitution",
            &[("in", glyph.clone()), ("out", sequence.join(","))],
        )?;
    }
    ttx.end("MultipleSubst")
}

fn write_alternate(
    ttx: &mut TtxWriter,
    index: usize,
    subst: &AlternateSubst<String>,
) -> Result<(), TranscodeError> {
    start_subtable(ttx, "AlternateSubst", index, None)?;
    for (glyph, alternates) in &subst.alternate_sets {
        ttx.start("AlternateSet", &[("glyph", glyph.clone())])?;
        for alternate in alternates {
            ttx.empty("Alternate", &[("glyph", alternate.clone())])?;
        }
        ttx.end("AlternateSet")?;
    }
    ttx.end("AlternateSubst")
}

fn write_ligature(
    ttx: &mut TtxWriter,
    index: usize,
    subst: &LigatureSubst<String>,
) -> Result<(), TranscodeError> {
    let sets = group_by(&subst.ligatures, |ligature| ligature.components.first())
        .ok_or_else(|| TranscodeError::message("ligature without components"))?;
    start_subtable(ttx, "LigatureSubst", index, None)?;
    for (first, ligatures) in sets {
        ttx.start("LigatureSet", &[("glyph", first.clone())])?;
        for ligature in ligatures {
            let components = ligature.components.iter().skip(1).join(",");
            ttx.empty(
                "Ligature",
                &[("components", components), ("glyph", ligature.glyph.clone())],
            )?;
        }
        ttx.end("LigatureSet")?;
    }
    ttx.end("LigatureSubst")
}

/// Group `items` by key, keeping keys in the order they first appear. `None` if an item has no
/// key.
fn group_by<'a, T, K: Hash + Eq + Copy>(
    items: &'a [T],
    key: impl Fn(&'a T) -> Option<K>,
) -> Option<Vec<(K, Vec<&'a T>)>> {
    let mut groups: Vec<(K, Vec<&'a T>)> = Vec::new();
    let mut positions = FxHashMap::default();
    for item in items {
        let key = key(item)?;
        let position = *positions.entry(key).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[position].1.push(item);
    }
    Some(groups)
}

/// Sort class based rules into sets indexed by the class of their first input element.
fn class_sets<R>(rules: &[R], first: impl Fn(&R) -> Option<u16>) -> Option<Vec<Vec<&R>>> {
    let mut sets: Vec<Vec<&R>> = Vec::new();
    for rule in rules {
        let class = usize::from(first(rule)?);
        if sets.len() <= class {
            sets.resize_with(class + 1, Vec::new);
        }
        sets[class].push(rule);
    }
    Some(sets)
}

fn empty_input() -> TranscodeError {
    TranscodeError::message("context rule with an empty input sequence")
}

fn write_context(
    ttx: &mut TtxWriter,
    index: usize,
    subst: &ContextSubst<String>,
) -> Result<(), TranscodeError> {
    match subst {
        ContextSubst::Glyphs(rules) => {
            let sets = group_by(rules, |rule| rule.input.first()).ok_or_else(empty_input)?;
            start_subtable(ttx, "ContextSubst", index, Some(1))?;
            write_coverage(ttx, "Coverage", None, sets.iter().map(|&(glyph, _)| glyph))?;
            ttx.count("SubRuleSetCount", sets.len())?;
            for (set_index, (_, rules)) in sets.iter().enumerate() {
                ttx.start("SubRuleSet", &index_attribute(set_index))?;
                ttx.count("SubRuleCount", rules.len())?;
                for (rule_index, &rule) in rules.iter().enumerate() {
                    write_sequence_rule(ttx, "SubRule", "Input", rule_index, rule)?;
                }
                ttx.end("SubRuleSet")?;
            }
        }
        ContextSubst::Classes(context) => {
            let sets = class_sets(&context.rules, |rule| rule.input.first().copied())
                .ok_or_else(empty_input)?;
            start_subtable(ttx, "ContextSubst", index, Some(2))?;
            write_coverage(ttx, "Coverage", None, context.coverage.iter())?;
            write_class_def(ttx, "ClassDef", &context.class_def)?;
            ttx.count("SubClassSetCount", sets.len())?;
            for (set_index, rules) in sets.iter().enumerate() {
                if rules.is_empty() {
                    ttx.empty(
                        "SubClassSet",
                        &[("index", set_index.to_string()), ("empty", String::from("1"))],
                    )?;
                    continue;
                }
                ttx.start("SubClassSet", &index_attribute(set_index))?;
                ttx.count("SubClassRuleCount", rules.len())?;
                for (rule_index, &rule) in rules.iter().enumerate() {
                    write_sequence_rule(ttx, "SubClassRule", "Class", rule_index, rule)?;
                }
                ttx.end("SubClassSet")?;
            }
        }
        ContextSubst::Coverages(context) => {
            start_subtable(ttx, "ContextSubst", index, Some(3))?;
            ttx.count("GlyphCount", context.input.len())?;
            ttx.count("SubstCount", context.lookup_records.len())?;
            for (index, coverage) in context.input.iter().enumerate() {
                write_coverage(ttx, "Coverage", Some(index), coverage.iter())?;
            }
            write_lookup_records(ttx, &context.lookup_records)?;
        }
    }
    ttx.end("ContextSubst")
}

fn write_chain_context(
    ttx: &mut TtxWriter,
    index: usize,
    subst: &ChainContextSubst<String>,
) -> Result<(), TranscodeError> {
    match subst {
        ChainContextSubst::Glyphs(rules) => {
            let sets = group_by(rules, |rule| rule.input.first()).ok_or_else(empty_input)?;
            start_subtable(ttx, "ChainContextSubst", index, Some(1))?;
            write_coverage(ttx, "Coverage", None, sets.iter().map(|&(glyph, _)| glyph))?;
            ttx.count("ChainSubRuleSetCount", sets.len())?;
            for (set_index, (_, rules)) in sets.iter().enumerate() {
                ttx.start("ChainSubRuleSet", &index_attribute(set_index))?;
                ttx.count("ChainSubRuleCount", rules.len())?;
                for (rule_index, &rule) in rules.iter().enumerate() {
                    write_chain_rule(ttx, "ChainSubRule", rule_index, rule)?;
                }
                ttx.end("ChainSubRuleSet")?;
            }
        }
        ChainContextSubst::Classes(context) => {
            let sets = class_sets(&context.rules, |rule| rule.input.first().copied())
                .ok_or_else(empty_input)?;
            start_subtable(ttx, "ChainContextSubst", index, Some(2))?;
            write_coverage(ttx, "Coverage", None, context.coverage.iter())?;
            for (name, class_def) in [
                ("BacktrackClassDef", &context.backtrack_class_def),
                ("InputClassDef", &context.input_class_def),
                ("LookAheadClassDef", &context.lookahead_class_def),
            ] {
                if !class_def.is_empty() {
                    write_class_def(ttx, name, class_def)?;
                }
            }
            ttx.count("ChainSubClassSetCount", sets.len())?;
            for (set_index, rules) in sets.iter().enumerate() {
                if rules.is_empty() {
                    ttx.empty(
                        "ChainSubClassSet",
                        &[("index", set_index.to_string()), ("empty", String::from("1"))],
                    )?;
                    continue;
                }
                ttx.start("ChainSubClassSet", &index_attribute(set_index))?;
                ttx.count("ChainSubClassRuleCount", rules.len())?;
                for (rule_index, &rule) in rules.iter().enumerate() {
                    write_chain_rule(ttx, "ChainSubClassRule", rule_index, rule)?;
                }
                ttx.end("ChainSubClassSet")?;
            }
        }
        ChainContextSubst::Coverages(context) => {
            start_subtable(ttx, "ChainContextSubst", index, Some(3))?;
            for (count_name, name, coverages) in [
                ("BacktrackGlyphCount", "BacktrackCoverage", &context.backtrack),
                ("InputGlyphCount", "InputCoverage", &context.input),
                ("LookAheadGlyphCount", "LookAheadCoverage", &context.lookahead),
            ] {
                ttx.count(count_name, coverages.len())?;
                for (index, coverage) in coverages.iter().enumerate() {
                    write_coverage(ttx, name, Some(index), coverage.iter())?;
                }
            }
            ttx.count("SubstCount", context.lookup_records.len())?;
            write_lookup_records(ttx, &context.lookup_records)?;
        }
    }
    ttx.end("ChainContextSubst")
}

fn write_reverse_chain(
    ttx: &mut TtxWriter,
    index: usize,
    subst: &ReverseChainSingleSubst<String>,
) -> Result<(), TranscodeError> {
    start_subtable(ttx, "ReverseChainSingleSubst", index, Some(1))?;
    write_coverage(
        ttx,
        "Coverage",
        None,
        subst.mapping.iter().map(|(glyph, _)| glyph),
    )?;
    for (count_name, name, coverages) in [
        ("BacktrackGlyphCount", "BacktrackCoverage", &subst.backtrack),
        ("LookAheadGlyphCount", "LookAheadCoverage", &subst.lookahead),
    ] {
        ttx.count(count_name, coverages.len())?;
        for (index, coverage) in coverages.iter().enumerate() {
            write_coverage(ttx, name, Some(index), coverage.iter())?;
        }
    }
    ttx.count("GlyphCount", subst.mapping.len())?;
    for (index, (_, substitute)) in subst.mapping.iter().enumerate() {
        ttx.indexed("Substitute", index, substitute)?;
    }
    ttx.end("ReverseChainSingleSubst")
}

fn write_sequence_rule<T: fmt::Display>(
    ttx: &mut TtxWriter,
    name: &str,
    item_name: &str,
    index: usize,
    rule: &SequenceRule<T>,
) -> Result<(), TranscodeError> {
    ttx.start(name, &index_attribute(index))?;
    ttx.count("GlyphCount", rule.input.len())?;
    ttx.count("SubstCount", rule.lookup_records.len())?;
    // The first element is implied by the rule set
    for (index, item) in rule.input.iter().skip(1).enumerate() {
        ttx.indexed(item_name, index, item)?;
    }
    write_lookup_records(ttx, &rule.lookup_records)?;
    ttx.end(name)
}

fn write_chain_rule<T: fmt::Display>(
    ttx: &mut TtxWriter,
    name: &str,
    index: usize,
    rule: &ChainRule<T>,
) -> Result<(), TranscodeError> {
    ttx.start(name, &index_attribute(index))?;
    ttx.count("BacktrackGlyphCount", rule.backtrack.len())?;
    for (index, item) in rule.backtrack.iter().enumerate() {
        ttx.indexed("Backtrack", index, item)?;
    }
    ttx.count("InputGlyphCount", rule.input.len())?;
    for (index, item) in rule.input.iter().skip(1).enumerate() {
        ttx.indexed("Input", index, item)?;
    }
    ttx.count("LookAheadGlyphCount", rule.lookahead.len())?;
    for (index, item) in rule.lookahead.iter().enumerate() {
        ttx.indexed("LookAhead", index, item)?;
    }
    ttx.count("SubstCount", rule.lookup_records.len())?;
    write_lookup_records(ttx, &rule.lookup_records)?;
    ttx.end(name)
}

fn write_coverage<'a>(
    ttx: &mut TtxWriter,
    name: &str,
    index: Option<usize>,
    glyphs: impl Iterator<Item = &'a String>,
) -> Result<(), TranscodeError> {
    match index {
        Some(index) => ttx.start(name, &index_attribute(index))?,
        None => ttx.start(name, &[])?,
    }
    for glyph in glyphs {
        ttx.value("Glyph", glyph)?;
    }
    ttx.end(name)
}

fn write_class_def(
    ttx: &mut TtxWriter,
    name: &str,
    class_def: &[(String, u16)],
) -> Result<(), TranscodeError> {
    ttx.start(name, &[])?;
    for (glyph, class) in class_def {
        ttx.empty(
            "ClassDef",
            &[("glyph", glyph.clone()), ("class", class.to_string())],
        )?;
    }
    ttx.end(name)
}

fn write_lookup_records(
    ttx: &mut TtxWriter,
    records: &[SequenceLookupRecord],
) -> Result<(), TranscodeError> {
    for (index, record) in records.iter().enumerate() {
        ttx.start("SubstLookupRecord", &index_attribute(index))?;
        ttx.value("SequenceIndex", record.sequence_index)?;
        ttx.value("LookupListIndex", record.lookup_list_index)?;
        ttx.end("SubstLookupRecord")?;
    }
    Ok(())
}

// Reading

/// An element of a parsed document.
#[derive(Debug)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    /// Character data, only used by `hexdata`.
    text: String,
    /// Line and column of the start tag.
    position: (usize, usize),
}

impl Element {
    fn new(start: &BytesStart<'_>, position: (usize, usize)) -> Result<Self, TranscodeError> {
        let attributes = start
            .attributes()
            .map(|attribute| {
                let attribute =
                    attribute.map_err(|err| TranscodeError::at(position, err.to_string()))?;
                let value = attribute
                    .unescape_value()
                    .map_err(|err| TranscodeError::at(position, err.to_string()))?;
                Ok((
                    String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                    value.into_owned(),
                ))
            })
            .collect::<Result<_, TranscodeError>>()?;
        Ok(Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            children: Vec::new(),
            text: String::new(),
            position,
        })
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, name: &str) -> Result<&str, TranscodeError> {
        self.attribute(name)
            .ok_or_else(|| self.error(format!("<{}> has no {} attribute", self.name, name)))
    }

    fn glyph(&self, attribute: &str) -> Result<String, TranscodeError> {
        self.required(attribute).map(str::to_owned)
    }

    fn number<T: TryFrom<u64>>(&self) -> Result<T, TranscodeError> {
        self.number_attribute("value")
    }

    fn number_attribute<T: TryFrom<u64>>(&self, attribute: &str) -> Result<T, TranscodeError> {
        let value = self.required(attribute)?;
        parse_number(value)
            .ok_or_else(|| self.error(format!("invalid number '{}' in <{}>", value, self.name)))
    }

    fn deci_points(&self) -> Result<u16, TranscodeError> {
        let value = self.required("value")?;
        parse_deci_points(value)
            .ok_or_else(|| self.error(format!("invalid size '{}' in <{}>", value, self.name)))
    }

    fn tag(&self) -> Result<u32, TranscodeError> {
        let value = self.required("value")?;
        tag::from_string(value).map_err(|_| self.error(format!("invalid tag '{}'", value)))
    }

    /// The children of a list element, which must all be named `name`.
    fn records(&self, name: &str) -> Result<&[Element], TranscodeError> {
        match self.children.iter().find(|child| child.name != name) {
            Some(child) => Err(child.unexpected(self)),
            None => Ok(&self.children),
        }
    }

    fn error(&self, message: impl Into<String>) -> TranscodeError {
        TranscodeError::at(self.position, message)
    }

    fn unexpected(&self, parent: &Element) -> TranscodeError {
        self.error(format!("unexpected <{}> in <{}>", self.name, parent.name))
    }

    fn missing(&self, child: &str) -> TranscodeError {
        self.error(format!("<{}> has no <{}>", self.name, child))
    }
}

/// Turns increasing byte offsets into line and column numbers.
struct LineCounter<'a> {
    text: &'a [u8],
    offset: usize,
    line: usize,
    line_start: usize,
}

impl<'a> LineCounter<'a> {
    fn new(text: &'a str) -> Self {
        LineCounter {
            text: text.as_bytes(),
            offset: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn position(&mut self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.text.len()).max(self.offset);
        for (index, &byte) in self.text[self.offset..offset].iter().enumerate() {
            if byte == b'\n' {
                self.line += 1;
                self.line_start = self.offset + index + 1;
            }
        }
        self.offset = offset;
        (self.line, offset - self.line_start + 1)
    }
}

fn parse_document(text: &str) -> Result<Element, TranscodeError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut lines = LineCounter::new(text);
    let mut open: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let offset = skip_whitespace(text, reader_offset(&reader));
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                let position = lines.position(reader_offset(&reader));
                return Err(TranscodeError::at(position, err.to_string()));
            }
        };
        match event {
            Event::Start(start) => open.push(Element::new(&start, lines.position(offset))?),
            Event::Empty(start) => {
                let element = Element::new(&start, lines.position(offset))?;
                add_element(&mut open, &mut root, element)?;
            }
            // End tags are checked against their start tags by the reader
            Event::End(_) => {
                if let Some(element) = open.pop() {
                    add_element(&mut open, &mut root, element)?;
                }
            }
            Event::Text(content) => {
                if let Some(element) = open.last_mut() {
                    element.text.push_str(&String::from_utf8_lossy(&content));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(element) = open.last() {
        return Err(element.error(format!("<{}> is not closed", element.name)));
    }
    root.ok_or_else(|| TranscodeError::at(lines.position(text.len()), "no root element"))
}

fn reader_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn skip_whitespace(text: &str, offset: usize) -> usize {
    text.as_bytes().get(offset..).map_or(offset, |rest| {
        offset + rest.iter().take_while(|b| b.is_ascii_whitespace()).count()
    })
}

fn add_element(
    open: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), TranscodeError> {
    match open.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(element.error("more than one root element")),
    }
    Ok(())
}

/// Parse a decimal or `0x` prefixed hexadecimal number.
fn parse_number<T: TryFrom<u64>>(text: &str) -> Option<T> {
    let text = text.trim();
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => text.parse::<u64>().ok()?,
    };
    T::try_from(value).ok()
}

fn parse_deci_points(text: &str) -> Option<u16> {
    let points = text.trim().parse::<f64>().ok()?;
    let value = (points * 10.).round();
    (0. ..=f64::from(u16::MAX))
        .contains(&value)
        .then(|| value as u16)
}

/// Split a comma separated list of glyph names.
fn glyph_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

fn read_table(gsub: &Element) -> Result<GsubTable<String>, TranscodeError> {
    let mut version = None;
    let mut script_list = Vec::new();
    let mut feature_list = Vec::new();
    let mut lookup_list = Vec::new();
    let mut feature_variations = None;
    for child in &gsub.children {
        match child.name.as_str() {
            "Version" => version = Some(child.number()?),
            "ScriptList" => script_list = read_script_list(child)?,
            "FeatureList" => feature_list = read_feature_list(child)?,
            "LookupList" => lookup_list = read_lookup_list(child)?,
            "FeatureVariations" => feature_variations = Some(read_hex_data(child)?),
            _ => return Err(child.unexpected(gsub)),
        }
    }
    Ok(GsubTable {
        version: version.ok_or_else(|| gsub.missing("Version"))?,
        script_list,
        feature_list,
        lookup_list,
        feature_variations,
    })
}

fn read_script_list(list: &Element) -> Result<Vec<ScriptRecord>, TranscodeError> {
    list.records("ScriptRecord")?
        .iter()
        .map(|record| {
            let mut script_tag = None;
            let mut script = None;
            for child in &record.children {
                match child.name.as_str() {
                    "ScriptTag" => script_tag = Some(child.tag()?),
                    "Script" => script = Some(read_script(child)?),
                    _ => return Err(child.unexpected(record)),
                }
            }
            Ok(ScriptRecord {
                script_tag: script_tag.ok_or_else(|| record.missing("ScriptTag"))?,
                script: script.ok_or_else(|| record.missing("Script"))?,
            })
        })
        .collect()
}

fn read_script(script: &Element) -> Result<Script, TranscodeError> {
    let mut default_lang_sys = None;
    let mut lang_sys_records = Vec::new();
    for child in &script.children {
        match child.name.as_str() {
            "DefaultLangSys" => default_lang_sys = Some(read_lang_sys(child)?),
            "LangSysRecord" => {
                let mut lang_sys_tag = None;
                let mut lang_sys = None;
                for field in &child.children {
                    match field.name.as_str() {
                        "LangSysTag" => lang_sys_tag = Some(field.tag()?),
                        "LangSys" => lang_sys = Some(read_lang_sys(field)?),
                        _ => return Err(field.unexpected(child)),
                    }
                }
                lang_sys_records.push(LangSysRecord {
                    lang_sys_tag: lang_sys_tag.ok_or_else(|| child.missing("LangSysTag"))?,
                    lang_sys: lang_sys.ok_or_else(|| child.missing("LangSys"))?,
                });
            }
            _ => return Err(child.unexpected(script)),
        }
    }
    Ok(Script {
        default_lang_sys,
        lang_sys_records,
    })
}

fn read_lang_sys(lang_sys: &Element) -> Result<LangSys, TranscodeError> {
    let mut req_feature_index = NO_REQUIRED_FEATURE;
    let mut feature_indices = Vec::new();
    for child in &lang_sys.children {
        match child.name.as_str() {
            "ReqFeatureIndex" => req_feature_index = child.number()?,
            "FeatureIndex" => feature_indices.push(child.number()?),
            _ => return Err(child.unexpected(lang_sys)),
        }
    }
    Ok(LangSys {
        req_feature_index,
        feature_indices,
    })
}

fn read_feature_list(list: &Element) -> Result<Vec<FeatureRecord>, TranscodeError> {
    list.records("FeatureRecord")?
        .iter()
        .map(|record| {
            let mut feature_tag = None;
            let mut feature = None;
            for child in &record.children {
                match child.name.as_str() {
                    "FeatureTag" => feature_tag = Some(child.tag()?),
                    "Feature" => feature = Some(read_feature(child)?),
                    _ => return Err(child.unexpected(record)),
                }
            }
            Ok(FeatureRecord {
                feature_tag: feature_tag.ok_or_else(|| record.missing("FeatureTag"))?,
                feature: feature.ok_or_else(|| record.missing("Feature"))?,
            })
        })
        .collect()
}

fn read_feature(feature: &Element) -> Result<Feature, TranscodeError> {
    let mut feature_params = None;
    let mut lookup_indices = Vec::new();
    for child in &feature.children {
        match child.name.as_str() {
            "FeatureParamsSize" => {
                feature_params = Some(FeatureParams::Size(read_size_params(child)?))
            }
            "FeatureParamsStylisticSet" => {
                let mut params = StylisticSetParams {
                    version: 0,
                    ui_name_id: 0,
                };
                for field in &child.children {
                    match field.name.as_str() {
                        "Version" => params.version = field.number()?,
                        "UINameID" => params.ui_name_id = field.number()?,
                        _ => return Err(field.unexpected(child)),
                    }
                }
                feature_params = Some(FeatureParams::StylisticSet(params));
            }
            "FeatureParamsCharacterVariants" => {
                feature_params = Some(FeatureParams::CharacterVariant(
                    read_character_variant_params(child)?,
                ))
            }
            "LookupListIndex" => lookup_indices.push(child.number()?),
            _ => return Err(child.unexpected(feature)),
        }
    }
    Ok(Feature {
        feature_params,
        lookup_indices,
    })
}

fn read_size_params(params: &Element) -> Result<SizeParams, TranscodeError> {
    let mut size = SizeParams {
        design_size: 0,
        subfamily_id: 0,
        subfamily_name_id: 0,
        range_start: 0,
        range_end: 0,
    };
    for field in &params.children {
        match field.name.as_str() {
            "DesignSize" => size.design_size = field.deci_points()?,
            "SubfamilyID" => size.subfamily_id = field.number()?,
            "SubfamilyNameID" => size.subfamily_name_id = field.number()?,
            "RangeStart" => size.range_start = field.deci_points()?,
            "RangeEnd" => size.range_end = field.deci_points()?,
            _ => return Err(field.unexpected(params)),
        }
    }
    Ok(size)
}

fn read_character_variant_params(
    params: &Element,
) -> Result<CharacterVariantParams, TranscodeError> {
    let mut variant = CharacterVariantParams {
        format: 0,
        feat_ui_label_name_id: 0,
        feat_ui_tooltip_text_name_id: 0,
        sample_text_name_id: 0,
        num_named_parameters: 0,
        first_param_ui_label_name_id: 0,
        characters: Vec::new(),
    };
    for field in &params.children {
        match field.name.as_str() {
            "Format" => variant.format = field.number()?,
            "FeatUILabelNameID" => variant.feat_ui_label_name_id = field.number()?,
            "FeatUITooltipTextNameID" => variant.feat_ui_tooltip_text_name_id = field.number()?,
            "SampleTextNameID" => variant.sample_text_name_id = field.number()?,
            "NumNamedParameters" => variant.num_named_parameters = field.number()?,
            "FirstParamUILabelNameID" => variant.first_param_ui_label_name_id = field.number()?,
            "Character" => {
                let character: u32 = field.number()?;
                if character > 0xFF_FFFF {
                    return Err(field.error(format!("character {} out of range", character)));
                }
                variant.characters.push(character);
            }
            _ => return Err(field.unexpected(params)),
        }
    }
    Ok(variant)
}

fn read_hex_data(feature_variations: &Element) -> Result<RawTable, TranscodeError> {
    let hexdata = match feature_variations.records("hexdata")? {
        [hexdata] => hexdata,
        _ => return Err(feature_variations.error("expected a single <hexdata>")),
    };
    let digits = hexdata
        .text
        .bytes()
        .filter(|byte| !byte.is_ascii_whitespace())
        .collect::<Vec<_>>();
    if digits.len() % 2 != 0 {
        return Err(hexdata.error("odd number of hex digits"));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|byte| u8::from_str_radix(byte, 16).ok())
                .ok_or_else(|| hexdata.error("invalid hex data"))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(RawTable)
}

fn read_lookup_list(list: &Element) -> Result<Vec<Lookup<String>>, TranscodeError> {
    list.records("Lookup")?.iter().map(read_lookup).collect()
}

fn subtable_type(name: &str) -> Option<u16> {
    SUBTABLE_NAMES
        .iter()
        .find(|&&(_, subtable_name)| subtable_name == name)
        .map(|&(lookup_type, _)| lookup_type)
}

fn read_lookup(lookup: &Element) -> Result<Lookup<String>, TranscodeError> {
    let mut declared_type = None;
    let mut lookup_flag = 0;
    let mut mark_filtering_set = None;
    let mut subtables = Vec::new();
    for child in &lookup.children {
        match child.name.as_str() {
            "LookupType" => declared_type = Some(child.number::<u16>()?),
            "LookupFlag" => lookup_flag = child.number()?,
            "MarkFilteringSet" => mark_filtering_set = Some(child.number()?),
            "ExtensionSubst" => subtables.push(read_extension(child)?),
            name => match subtable_type(name) {
                Some(subtable_type) => subtables.push((subtable_type, child)),
                None => return Err(child.unexpected(lookup)),
            },
        }
    }

    let declared_type = declared_type.ok_or_else(|| lookup.missing("LookupType"))?;
    // Extension lookups take the type of their subtables, and with none substitute nothing
    let lookup_type = match declared_type {
        EXTENSION_SUBST => subtables.first().map_or(1, |&(subtable_type, _)| subtable_type),
        lookup_type => lookup_type,
    };
    if let Some((_, subtable)) = subtables
        .iter()
        .find(|&&(subtable_type, _)| subtable_type != lookup_type)
    {
        return Err(subtable.error(format!(
            "<{}> in a lookup of type {}",
            subtable.name, declared_type
        )));
    }

    let elements = subtables
        .iter()
        .map(|&(_, subtable)| subtable)
        .collect::<Vec<_>>();
    let sub_tables = match lookup_type {
        1 => SubstLookup::Single(read_all(&elements, read_single)?),
        2 => SubstLookup::Multiple(read_all(&elements, read_multiple)?),
        3 => SubstLookup::Alternate(read_all(&elements, read_alternate)?),
        4 => SubstLookup::Ligature(read_all(&elements, read_ligature)?),
        5 => SubstLookup::Context(read_all(&elements, read_context)?),
        6 => SubstLookup::ChainContext(read_all(&elements, read_chain_context)?),
        8 => SubstLookup::ReverseChainSingle(read_all(&elements, read_reverse_chain)?),
        _ => {
            return Err(lookup.error(format!(
                "unsupported lookup type {}",
                declared_type
            )))
        }
    };

    Ok(Lookup {
        lookup_flag,
        mark_filtering_set,
        sub_tables,
    })
}

fn read_extension(extension: &Element) -> Result<(u16, &Element), TranscodeError> {
    let mut extension_type = None;
    let mut subtable = None;
    for child in &extension.children {
        match child.name.as_str() {
            "ExtensionLookupType" => extension_type = Some(child.number::<u16>()?),
            name => match subtable_type(name) {
                Some(subtable_type) if subtable.is_none() => {
                    subtable = Some((subtable_type, child))
                }
                _ => return Err(child.unexpected(extension)),
            },
        }
    }
    let (subtable_type, subtable) =
        subtable.ok_or_else(|| extension.error("<ExtensionSubst> has no subtable"))?;
    match extension_type {
        Some(extension_type) if extension_type != subtable_type => Err(subtable.error(format!(
            "<{}> in an extension of type {}",
            subtable.name, extension_type
        ))),
        _ => Ok((subtable_type, subtable)),
    }
}

fn read_all<T>(
    elements: &[&Element],
    read: impl Fn(&Element) -> Result<T, TranscodeError>,
) -> Result<Vec<T>, TranscodeError> {
    elements.iter().map(|element| read(element)).collect()
}

fn read_single(subtable: &Element) -> Result<SingleSubst<String>, TranscodeError> {
    let mapping = subtable
        .records("Substitution")?
        .iter()
        .map(|substitution| Ok((substitution.glyph("in")?, substitution.glyph("out")?)))
        .collect::<Result<_, TranscodeError>>()?;
    Ok(SingleSubst { mapping })
}

fn read_multiple(subtable: &Element) -> Result<MultipleSubst<String>, TranscodeError> {
    let sequences = subtable
        .records("Substitution")?
        .iter()
        .map(|substitution| {
            Ok((
                substitution.glyph("in")?,
                glyph_list(substitution.required("out")?),
            ))
        })
        .collect::<Result<_, TranscodeError>>()?;
    Ok(MultipleSubst { sequences })
}

fn read_alternate(subtable: &Element) -> Result<AlternateSubst<String>, TranscodeError> {
    let alternate_sets = subtable
        .records("AlternateSet")?
        .iter()
        .map(|set| {
            let alternates = set
                .records("Alternate")?
                .iter()
                .map(|alternate| alternate.glyph("glyph"))
                .collect::<Result<_, _>>()?;
            Ok((set.glyph("glyph")?, alternates))
        })
        .collect::<Result<_, TranscodeError>>()?;
    Ok(AlternateSubst { alternate_sets })
}

fn read_ligature(subtable: &Element) -> Result<LigatureSubst<String>, TranscodeError> {
    let mut ligatures = Vec::new();
    for set in subtable.records("LigatureSet")? {
        let first = set.glyph("glyph")?;
        for ligature in set.records("Ligature")? {
            let components = std::iter::once(first.clone())
                .chain(glyph_list(ligature.required("components")?))
                .collect();
            ligatures.push(Ligature {
                components,
                glyph: ligature.glyph("glyph")?,
            });
        }
    }
    Ok(LigatureSubst { ligatures })
}

fn single_coverage(
    subtable: &Element,
    coverages: Vec<Vec<String>>,
) -> Result<Vec<String>, TranscodeError> {
    let mut coverages = coverages.into_iter();
    match (coverages.next(), coverages.next()) {
        (Some(coverage), None) => Ok(coverage),
        _ => Err(subtable.error(format!(
            "<{}> needs exactly one <Coverage>",
            subtable.name
        ))),
    }
}

/// Read the rules of a format 1 or 2 context subtable.
///
/// Rule sets pair up with `firsts` in order, and the rules of each set get its first element
/// prepended to their input.
fn read_rule_sets<T: Clone, R>(
    subtable: &Element,
    sets: &[&Element],
    (set_name, rule_name): (&str, &str),
    firsts: impl IntoIterator<Item = T>,
    read_rule: impl Fn(&Element, T) -> Result<R, TranscodeError>,
) -> Result<Vec<R>, TranscodeError> {
    let mut firsts = firsts.into_iter();
    let mut rules = Vec::new();
    for set in sets {
        if set.name != set_name {
            return Err(set.unexpected(subtable));
        }
        let first = firsts
            .next()
            .ok_or_else(|| set.error(format!("more <{}> elements than coverage glyphs", set_name)))?;
        for rule in set.records(rule_name)? {
            rules.push(read_rule(rule, first.clone())?);
        }
    }
    Ok(rules)
}

fn read_sequence_rule<T>(
    rule: &Element,
    item_name: &str,
    first: T,
    read_item: impl Fn(&Element) -> Result<T, TranscodeError>,
) -> Result<SequenceRule<T>, TranscodeError> {
    let mut input = vec![first];
    let mut lookup_records = Vec::new();
    for child in &rule.children {
        match child.name.as_str() {
            "SubstLookupRecord" => lookup_records.push(read_lookup_record(child)?),
            name if name == item_name => input.push(read_item(child)?),
            _ => return Err(child.unexpected(rule)),
        }
    }
    Ok(SequenceRule {
        input,
        lookup_records,
    })
}

fn read_chain_rule<T>(
    rule: &Element,
    first: T,
    read_item: impl Fn(&Element) -> Result<T, TranscodeError>,
) -> Result<ChainRule<T>, TranscodeError> {
    let mut backtrack = Vec::new();
    let mut input = vec![first];
    let mut lookahead = Vec::new();
    let mut lookup_records = Vec::new();
    for child in &rule.children {
        match child.name.as_str() {
            "Backtrack" => backtrack.push(read_item(child)?),
            "Input" => input.push(read_item(child)?),
            "LookAhead" => lookahead.push(read_item(child)?),
            "SubstLookupRecord" => lookup_records.push(read_lookup_record(child)?),
            _ => return Err(child.unexpected(rule)),
        }
    }
    Ok(ChainRule {
        backtrack,
        input,
        lookahead,
        lookup_records,
    })
}

fn glyph_value(element: &Element) -> Result<String, TranscodeError> {
    element.glyph("value")
}

fn class_value(element: &Element) -> Result<u16, TranscodeError> {
    element.number()
}

fn read_context(subtable: &Element) -> Result<ContextSubst<String>, TranscodeError> {
    let mut coverages = Vec::new();
    let mut class_def = Vec::new();
    let mut sets = Vec::new();
    let mut lookup_records = Vec::new();
    for child in &subtable.children {
        match child.name.as_str() {
            "Coverage" => coverages.push(read_coverage(child)?),
            "ClassDef" => class_def = read_class_def(child)?,
            "SubRuleSet" | "SubClassSet" => sets.push(child),
            "SubstLookupRecord" => lookup_records.push(read_lookup_record(child)?),
            _ => return Err(child.unexpected(subtable)),
        }
    }

    match subtable.number_attribute::<u16>("Format")? {
        1 => {
            let coverage = single_coverage(subtable, coverages)?;
            let rules = read_rule_sets(
                subtable,
                &sets,
                ("SubRuleSet", "SubRule"),
                coverage,
                |rule, first| read_sequence_rule(rule, "Input", first, glyph_value),
            )?;
            Ok(ContextSubst::Glyphs(rules))
        }
        2 => {
            let coverage = single_coverage(subtable, coverages)?;
            let rules = read_rule_sets(
                subtable,
                &sets,
                ("SubClassSet", "SubClassRule"),
                0..=u16::MAX,
                |rule, first| read_sequence_rule(rule, "Class", first, class_value),
            )?;
            Ok(ContextSubst::Classes(ClassContext {
                coverage,
                class_def,
                rules,
            }))
        }
        3 => Ok(ContextSubst::Coverages(CoverageContext {
            input: coverages,
            lookup_records,
        })),
        format => Err(subtable.error(format!("unsupported ContextSubst format {}", format))),
    }
}

fn read_chain_context(subtable: &Element) -> Result<ChainContextSubst<String>, TranscodeError> {
    let mut coverages = Vec::new();
    let mut backtrack_class_def = Vec::new();
    let mut input_class_def = Vec::new();
    let mut lookahead_class_def = Vec::new();
    let mut backtrack = Vec::new();
    let mut input = Vec::new();
    let mut lookahead = Vec::new();
    let mut sets = Vec::new();
    let mut lookup_records = Vec::new();
    for child in &subtable.children {
        match child.name.as_str() {
            "Coverage" => coverages.push(read_coverage(child)?),
            "BacktrackClassDef" => backtrack_class_def = read_class_def(child)?,
            "InputClassDef" => input_class_def = read_class_def(child)?,
            "LookAheadClassDef" => lookahead_class_def = read_class_def(child)?,
            "BacktrackCoverage" => backtrack.push(read_coverage(child)?),
            "InputCoverage" => input.push(read_coverage(child)?),
            "LookAheadCoverage" => lookahead.push(read_coverage(child)?),
            "ChainSubRuleSet" | "ChainSubClassSet" => sets.push(child),
            "SubstLookupRecord" => lookup_records.push(read_lookup_record(child)?),
            _ => return Err(child.unexpected(subtable)),
        }
    }

    match subtable.number_attribute::<u16>("Format")? {
        1 => {
            let coverage = single_coverage(subtable, coverages)?;
            let rules = read_rule_sets(
                subtable,
                &sets,
                ("ChainSubRuleSet", "ChainSubRule"),
                coverage,
                |rule, first| read_chain_rule(rule, first, glyph_value),
            )?;
            Ok(ChainContextSubst::Glyphs(rules))
        }
        2 => {
            let coverage = single_coverage(subtable, coverages)?;
            let rules = read_rule_sets(
                subtable,
                &sets,
                ("ChainSubClassSet", "ChainSubClassRule"),
                0..=u16::MAX,
                |rule, first| read_chain_rule(rule, first, class_value),
            )?;
            Ok(ChainContextSubst::Classes(ChainClassContext {
                coverage,
                backtrack_class_def,
                input_class_def,
                lookahead_class_def,
                rules,
            }))
        }
        3 => Ok(ChainContextSubst::Coverages(ChainCoverageContext {
            backtrack,
            input,
            lookahead,
            lookup_records,
        })),
        format => Err(subtable.error(format!(
            "unsupported ChainContextSubst format {}",
            format
        ))),
    }
}

fn read_reverse_chain(
    subtable: &Element,
) -> Result<ReverseChainSingleSubst<String>, TranscodeError> {
    let mut coverages = Vec::new();
    let mut backtrack = Vec::new();
    let mut lookahead = Vec::new();
    let mut substitutes = Vec::new();
    for child in &subtable.children {
        match child.name.as_str() {
            "Coverage" => coverages.push(read_coverage(child)?),
            "BacktrackCoverage" => backtrack.push(read_coverage(child)?),
            "LookAheadCoverage" => lookahead.push(read_coverage(child)?),
            "Substitute" => substitutes.push(glyph_value(child)?),
            _ => return Err(child.unexpected(subtable)),
        }
    }
    let coverage = single_coverage(subtable, coverages)?;
    if coverage.len() != substitutes.len() {
        return Err(subtable.error(format!(
            "{} coverage glyphs but {} substitutes",
            coverage.len(),
            substitutes.len()
        )));
    }
    Ok(ReverseChainSingleSubst {
        backtrack,
        lookahead,
        mapping: coverage.into_iter().zip(substitutes).collect(),
    })
}

fn read_coverage(coverage: &Element) -> Result<Vec<String>, TranscodeError> {
    coverage
        .records("Glyph")?
        .iter()
        .map(glyph_value)
        .collect()
}

fn read_class_def(class_def: &Element) -> Result<Vec<(String, u16)>, TranscodeError> {
    class_def
        .records("ClassDef")?
        .iter()
        .map(|entry| Ok((entry.glyph("glyph")?, entry.number_attribute("class")?)))
        .collect()
}

fn read_lookup_record(record: &Element) -> Result<SequenceLookupRecord, TranscodeError> {
    let mut sequence_index = None;
    let mut lookup_list_index = None;
    for child in &record.children {
        match child.name.as_str() {
            "SequenceIndex" => sequence_index = Some(child.number()?),
            "LookupListIndex" => lookup_list_index = Some(child.number()?),
            _ => return Err(child.unexpected(record)),
        }
    }
    Ok(SequenceLookupRecord {
        sequence_index: sequence_index.ok_or_else(|| record.missing("SequenceIndex"))?,
        lookup_list_index: lookup_list_index.ok_or_else(|| record.missing("LookupListIndex"))?,
    })
}

// Validation

fn validate(table: &GsubTable) -> Result<(), TranscodeError> {
    match table.version {
        VERSION_1_0 if table.feature_variations.is_some() => {
            return Err(TranscodeError::field(
                "Version",
                "FeatureVariations requires version 0x00010001",
            ));
        }
        VERSION_1_0 | VERSION_1_1 => {}
        version => {
            return Err(TranscodeError::field(
                "Version",
                format!("unsupported version 0x{:08X}", version),
            ))
        }
    }

    let feature_count = table.feature_list.len();
    let lookup_count = table.lookup_list.len();

    for (script_index, record) in table.script_list.iter().enumerate() {
        let script = &record.script;
        if let Some(lang_sys) = &script.default_lang_sys {
            check_lang_sys(lang_sys, feature_count).map_err(|message| {
                TranscodeError::field(
                    format!("ScriptList[{}].Script.DefaultLangSys", script_index),
                    message,
                )
            })?;
        }
        for (lang_sys_index, lang_sys_record) in script.lang_sys_records.iter().enumerate() {
            check_lang_sys(&lang_sys_record.lang_sys, feature_count).map_err(|message| {
                TranscodeError::field(
                    format!(
                        "ScriptList[{}].Script.LangSysRecord[{}]",
                        script_index, lang_sys_index
                    ),
                    message,
                )
            })?;
        }
    }

    for (feature_index, record) in table.feature_list.iter().enumerate() {
        if let Some(&index) = record
            .feature
            .lookup_indices
            .iter()
            .find(|&&index| usize::from(index) >= lookup_count)
        {
            return Err(TranscodeError::field(
                format!("FeatureList[{}].Feature", feature_index),
                format!("lookup index {} out of range", index),
            ));
        }
    }

    for (lookup_index, lookup) in table.lookup_list.iter().enumerate() {
        let uses_filtering_set = lookup.lookup_flag & USE_MARK_FILTERING_SET != 0;
        if uses_filtering_set != lookup.mark_filtering_set.is_some() {
            return Err(TranscodeError::field(
                format!("LookupList[{}]", lookup_index),
                "MarkFilteringSet must be present exactly when LookupFlag has bit 0x0010 set",
            ));
        }
        check_lookup(lookup, lookup_count).map_err(|(subtable_index, message)| {
            TranscodeError::field(
                format!("LookupList[{}].SubTables[{}]", lookup_index, subtable_index),
                message,
            )
        })?;
    }

    Ok(())
}

fn check_lang_sys(lang_sys: &LangSys, feature_count: usize) -> Result<(), String> {
    let required = lang_sys.req_feature_index;
    if required != NO_REQUIRED_FEATURE && usize::from(required) >= feature_count {
        return Err(format!("required feature index {} out of range", required));
    }
    match lang_sys
        .feature_indices
        .iter()
        .find(|&&index| usize::from(index) >= feature_count)
    {
        Some(index) => Err(format!("feature index {} out of range", index)),
        None => Ok(()),
    }
}

fn check_records(
    records: &[SequenceLookupRecord],
    input_len: usize,
    lookup_count: usize,
) -> Result<(), String> {
    if input_len == 0 {
        return Err("input sequence is empty".to_string());
    }
    for record in records {
        if usize::from(record.sequence_index) >= input_len {
            return Err(format!(
                "sequence index {} is outside the input sequence",
                record.sequence_index
            ));
        }
        if usize::from(record.lookup_list_index) >= lookup_count {
            return Err(format!(
                "lookup index {} out of range",
                record.lookup_list_index
            ));
        }
    }
    Ok(())
}

fn check_lookup(lookup: &Lookup<GlyphId>, lookup_count: usize) -> Result<(), (usize, String)> {
    let at = |index: usize| move |message: String| (index, message);
    match &lookup.sub_tables {
        SubstLookup::Single(_) | SubstLookup::Multiple(_) | SubstLookup::Alternate(_) => {}
        SubstLookup::Ligature(subtables) => {
            for (index, subst) in subtables.iter().enumerate() {
                if subst.ligatures.iter().any(|lig| lig.components.is_empty()) {
                    return Err((index, "ligature without components".to_string()));
                }
            }
        }
        SubstLookup::Context(subtables) => {
            for (index, subst) in subtables.iter().enumerate() {
                match subst {
                    ContextSubst::Glyphs(rules) => rules.iter().try_for_each(|rule| {
                        check_records(&rule.lookup_records, rule.input.len(), lookup_count)
                    }),
                    ContextSubst::Classes(context) => context.rules.iter().try_for_each(|rule| {
                        check_records(&rule.lookup_records, rule.input.len(), lookup_count)
                    }),
                    ContextSubst::Coverages(context) => check_records(
                        &context.lookup_records,
                        context.input.len(),
                        lookup_count,
                    ),
                }
                .map_err(at(index))?;
            }
        }
        SubstLookup::ChainContext(subtables) => {
            for (index, subst) in subtables.iter().enumerate() {
                match subst {
                    ChainContextSubst::Glyphs(rules) => rules.iter().try_for_each(|rule| {
                        check_records(&rule.lookup_records, rule.input.len(), lookup_count)
                    }),
                    ChainContextSubst::Classes(context) => {
                        context.rules.iter().try_for_each(|rule| {
                            check_records(&rule.lookup_records, rule.input.len(), lookup_count)
                        })
                    }
                    ChainContextSubst::Coverages(context) => check_records(
                        &context.lookup_records,
                        context.input.len(),
                        lookup_count,
                    ),
                }
                .map_err(at(index))?;
            }
        }
        SubstLookup::ReverseChainSingle(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn glyph_order() -> GlyphOrder {
        GlyphOrder::new(
            [".notdef", "f", "i", "l", "f_i", "f_l", "a", "a.alt"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
        )
    }

    fn lookup(sub_tables: SubstLookup<GlyphId>) -> Lookup<GlyphId> {
        Lookup {
            lookup_flag: 0,
            mark_filtering_set: None,
            sub_tables,
        }
    }

    fn record(sequence_index: u16, lookup_list_index: u16) -> SequenceLookupRecord {
        SequenceLookupRecord {
            sequence_index,
            lookup_list_index,
        }
    }

    fn sample_table() -> GsubTable {
        let mut table = GsubTable::empty();
        table.feature_list.push(FeatureRecord {
            feature_tag: tag::from_string("liga").unwrap(),
            feature: Feature {
                feature_params: None,
                lookup_indices: vec![0, 1],
            },
        });
        if let Some(lang_sys) = &mut table.script_list[0].script.default_lang_sys {
            lang_sys.feature_indices = vec![0];
        }
        table.lookup_list = vec![
            lookup(SubstLookup::Ligature(vec![LigatureSubst {
                ligatures: vec![
                    Ligature {
                        components: vec![1, 2],
                        glyph: 4,
                    },
                    Ligature {
                        components: vec![1, 3],
                        glyph: 5,
                    },
                ],
            }])),
            lookup(SubstLookup::Single(vec![SingleSubst {
                mapping: vec![(6, 7), (20, 21)],
            }])),
        ];
        table
    }

    /// A table using every lookup type and subtable format.
    fn full_table() -> GsubTable {
        let mut table = sample_table();
        table.version = VERSION_1_1;
        table.feature_variations = Some(RawTable(vec![0x00, 0x01, 0x00, 0x00, 0xAB]));
        table.script_list[0].script.lang_sys_records.push(LangSysRecord {
            lang_sys_tag: tag::from_string("TRK").unwrap(),
            lang_sys: LangSys {
                req_feature_index: 1,
                feature_indices: vec![0, 1, 2, 3],
            },
        });
        table.feature_list.extend([
            FeatureRecord {
                feature_tag: tag::from_string("size").unwrap(),
                feature: Feature {
                    feature_params: Some(FeatureParams::Size(SizeParams {
                        design_size: 105,
                        subfamily_id: 1,
                        subfamily_name_id: 256,
                        range_start: 80,
                        range_end: 120,
                    })),
                    lookup_indices: Vec::new(),
                },
            },
            FeatureRecord {
                feature_tag: tag::from_string("ss01").unwrap(),
                feature: Feature {
                    feature_params: Some(FeatureParams::StylisticSet(StylisticSetParams {
                        version: 0,
                        ui_name_id: 257,
                    })),
                    lookup_indices: vec![2],
                },
            },
            FeatureRecord {
                feature_tag: tag::from_string("cv01").unwrap(),
                feature: Feature {
                    feature_params: Some(FeatureParams::CharacterVariant(
                        CharacterVariantParams {
                            format: 0,
                            feat_ui_label_name_id: 258,
                            feat_ui_tooltip_text_name_id: 0,
                            sample_text_name_id: 0,
                            num_named_parameters: 0,
                            first_param_ui_label_name_id: 0,
                            characters: vec![0x61, 0x1F600],
                        },
                    )),
                    lookup_indices: vec![3],
                },
            },
        ]);
        table.lookup_list.extend([
            Lookup {
                lookup_flag: 8 | USE_MARK_FILTERING_SET,
                mark_filtering_set: Some(2),
                sub_tables: SubstLookup::Multiple(vec![MultipleSubst {
                    sequences: vec![(4, vec![1, 2]), (5, vec![])],
                }]),
            },
            lookup(SubstLookup::Alternate(vec![AlternateSubst {
                alternate_sets: vec![(6, vec![7, 30])],
            }])),
            lookup(SubstLookup::Context(vec![
                ContextSubst::Glyphs(vec![
                    SequenceRule {
                        input: vec![1, 2],
                        lookup_records: vec![record(0, 0)],
                    },
                    SequenceRule {
                        input: vec![1, 3, 3],
                        lookup_records: vec![record(1, 1), record(2, 1)],
                    },
                    SequenceRule {
                        input: vec![6],
                        lookup_records: vec![],
                    },
                ]),
                ContextSubst::Classes(ClassContext {
                    coverage: vec![1, 6],
                    class_def: vec![(1, 1), (2, 2), (6, 3)],
                    rules: vec![
                        SequenceRule {
                            input: vec![1, 2],
                            lookup_records: vec![record(1, 1)],
                        },
                        SequenceRule {
                            input: vec![3, 0],
                            lookup_records: vec![record(0, 1)],
                        },
                    ],
                }),
                ContextSubst::Coverages(CoverageContext {
                    input: vec![vec![1, 6], vec![2]],
                    lookup_records: vec![record(1, 1)],
                }),
            ])),
            lookup(SubstLookup::ChainContext(vec![
                ChainContextSubst::Glyphs(vec![ChainRule {
                    backtrack: vec![3, 2],
                    input: vec![1, 2],
                    lookahead: vec![6],
                    lookup_records: vec![record(0, 0)],
                }]),
                ChainContextSubst::Classes(ChainClassContext {
                    coverage: vec![1],
                    backtrack_class_def: vec![(2, 1)],
                    input_class_def: vec![(1, 1)],
                    lookahead_class_def: vec![],
                    rules: vec![ChainRule {
                        backtrack: vec![1],
                        input: vec![1],
                        lookahead: vec![0],
                        lookup_records: vec![record(0, 1)],
                    }],
                }),
                ChainContextSubst::Coverages(ChainCoverageContext {
                    backtrack: vec![vec![2, 3]],
                    input: vec![vec![1]],
                    lookahead: vec![],
                    lookup_records: vec![record(0, 1)],
                }),
            ])),
            lookup(SubstLookup::ReverseChainSingle(vec![ReverseChainSingleSubst {
                backtrack: vec![vec![1]],
                lookahead: vec![vec![2], vec![3]],
                mapping: vec![(6, 7)],
            }])),
        ]);
        table
    }

    #[test]
    fn test_empty_table_text() {
        let text = to_text(&GsubTable::empty(), &glyph_order()).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));

        let document = parse_document(&text).unwrap();
        assert_eq!(document.name, "ttFont");
        assert_eq!(document.attribute("sfntVersion"), Some("OTTO"));
        let gsub = &document.children[0];
        let names = gsub
            .children
            .iter()
            .map(|child| child.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["Version", "ScriptList", "FeatureList", "LookupList"]);
        assert_eq!(gsub.children[0].attribute("value"), Some("0x00010000"));
        assert!(gsub.children[2].children.is_empty());
        assert!(gsub.children[3].children.is_empty());

        let script_record = &gsub.children[1].children[0];
        assert_eq!(script_record.children[0].attribute("value"), Some("DFLT"));
        let default_lang_sys = &script_record.children[1].children[0];
        assert_eq!(default_lang_sys.name, "DefaultLangSys");
        assert_eq!(default_lang_sys.children.len(), 1);
        assert_eq!(default_lang_sys.children[0].attribute("value"), Some("65535"));
    }

    #[test]
    fn test_glyph_names() {
        let text = to_text(&sample_table(), &glyph_order()).unwrap();
        assert!(text.contains("<LigatureSet glyph=\"f\">"));
        assert!(text.contains("<Ligature components=\"i\" glyph=\"f_i\"/>"));
        assert!(text.contains("<Substitution in=\"a\" out=\"a.alt\"/>"));
        // Glyph ids beyond the glyph order have no name
        assert!(text.contains("<Substitution in=\"glyph20\" out=\"glyph21\"/>"));
        assert!(text.contains("<FeatureTag value=\"liga\"/>"));
        assert!(text.contains("<!-- LookupCount=2 -->"));
    }

    #[test]
    fn test_round_trip() {
        let table = sample_table();
        let text = to_text(&table, &glyph_order()).unwrap();
        assert_eq!(from_text(&text, &glyph_order()).unwrap(), table);
    }

    #[test]
    fn test_round_trip_all_lookup_types() {
        let table = full_table();
        let text = to_text(&table, &glyph_order()).unwrap();
        assert!(text.contains("<DesignSize value=\"10.5\"/>"));
        assert!(text.contains("<SubClassSet index=\"0\" empty=\"1\"/>"));
        assert!(text.contains("<hexdata>00010000ab</hexdata>"));
        assert_eq!(from_text(&text, &glyph_order()).unwrap(), table);
    }

    #[test]
    fn test_extension_subtables_unwrapped() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<ttFont sfntVersion="OTTO" ttLibVersion="4.56">
  <GSUB>
    <Version value="0x00010000"/>
    <LookupList>
      <Lookup index="0">
        <LookupType value="7"/>
        <LookupFlag value="0"/>
        <ExtensionSubst index="0" Format="1">
          <ExtensionLookupType value="1"/>
          <SingleSubst Format="2">
            <Substitution in="a" out="a.alt"/>
          </SingleSubst>
        </ExtensionSubst>
      </Lookup>
    </LookupList>
  </GSUB>
</ttFont>
"#;
        let table = from_text(text, &glyph_order()).unwrap();
        assert!(table.script_list.is_empty());
        assert_eq!(
            table.lookup_list,
            vec![lookup(SubstLookup::Single(vec![SingleSubst {
                mapping: vec![(6, 7)]
            }]))]
        );

        let mismatched = text.replace(
            "<ExtensionLookupType value=\"1\"/>",
            "<ExtensionLookupType value=\"4\"/>",
        );
        let err = from_text(&mismatched, &glyph_order()).unwrap_err();
        assert_eq!(err.position.map(|(line, _)| line), Some(11));
    }

    #[test]
    fn test_bare_gsub_element() {
        let table = from_text("<GSUB><Version value=\"0x00010000\"/></GSUB>", &glyph_order())
            .unwrap();
        assert!(table.script_list.is_empty());
        assert!(table.feature_list.is_empty());
        assert!(table.lookup_list.is_empty());
    }

    #[test]
    fn test_unknown_glyph() {
        let text = to_text(&sample_table(), &glyph_order())
            .unwrap()
            .replace("out=\"a.alt\"", "out=\"a.missing\"");
        let err = from_text(&text, &glyph_order()).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("LookupList[1].SubTables[0]"));
        assert_eq!(err.message, "unknown glyph 'a.missing'");
    }

    #[test]
    fn test_malformed_xml_position() {
        let text = "<ttFont>\n  <GSUB>\n    <Version value=\"0x00010000\"/>\n  </GSUBX>\n</ttFont>\n";
        let err = from_text(text, &glyph_order()).unwrap_err();
        assert_eq!(err.position.map(|(line, _)| line), Some(4));

        let err = from_text("<ttFont>\n  <GSUB>\n", &glyph_order()).unwrap_err();
        assert_eq!(err.position, Some((2, 3)));
        assert_eq!(err.message, "<GSUB> is not closed");
    }

    #[test]
    fn test_unexpected_element_position() {
        let text = "<GSUB>\n  <Version value=\"0x00010000\"/>\n  <Bogus/>\n</GSUB>";
        let err = from_text(text, &glyph_order()).unwrap_err();
        assert_eq!(err.position, Some((3, 3)));
        assert_eq!(err.message, "unexpected <Bogus> in <GSUB>");
    }

    #[test]
    fn test_bad_tag() {
        let text = to_text(&sample_table(), &glyph_order())
            .unwrap()
            .replace("value=\"liga\"", "value=\"ligatures\"");
        let err = from_text(&text, &glyph_order()).unwrap_err();
        assert!(err.message.contains("invalid tag 'ligatures'"));
    }

    #[test]
    fn test_lookup_type_mismatch() {
        let text = to_text(&sample_table(), &glyph_order())
            .unwrap()
            .replace("<LookupType value=\"4\"/>", "<LookupType value=\"1\"/>");
        let err = from_text(&text, &glyph_order()).unwrap_err();
        assert_eq!(err.message, "<LigatureSubst> in a lookup of type 1");
    }

    #[test]
    fn test_feature_index_out_of_range() {
        let mut table = sample_table();
        if let Some(lang_sys) = &mut table.script_list[0].script.default_lang_sys {
            lang_sys.feature_indices = vec![0, 3];
        }
        let text = to_text(&table, &glyph_order()).unwrap();
        let err = from_text(&text, &glyph_order()).unwrap_err();
        assert_eq!(
            err.field.as_deref(),
            Some("ScriptList[0].Script.DefaultLangSys")
        );
    }

    #[test]
    fn test_lookup_index_out_of_range() {
        let mut table = sample_table();
        table.feature_list[0].feature.lookup_indices.push(2);
        let text = to_text(&table, &glyph_order()).unwrap();
        let err = from_text(&text, &glyph_order()).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("FeatureList[0].Feature"));
    }

    #[test]
    fn test_inconsistent_mark_filtering_set() {
        let mut table = sample_table();
        table.lookup_list[0].lookup_flag = USE_MARK_FILTERING_SET;
        let text = to_text(&table, &glyph_order()).unwrap();
        let err = from_text(&text, &glyph_order()).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("LookupList[0]"));
    }

    #[test]
    fn test_numbered_glyph() {
        assert_eq!(numbered_glyph("glyph12"), Some(12));
        assert_eq!(numbered_glyph("glyph"), None);
        assert_eq!(numbered_glyph("glyph+1"), None);
        assert_eq!(numbered_glyph("glyph70000"), None);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_number::<u16>("65535"), Some(65535));
        assert_eq!(parse_number::<u32>("0x00010001"), Some(0x00010001));
        assert_eq!(parse_number::<u16>("65536"), None);
        assert_eq!(parse_number::<u16>("-1"), None);
        assert_eq!(parse_deci_points("10.5"), Some(105));
        assert_eq!(parse_deci_points("12"), Some(120));
        assert_eq!(parse_deci_points("-0.5"), None);
    }
}
