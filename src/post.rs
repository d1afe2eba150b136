//! `post` table parsing and writing.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/post>

use std::convert::TryFrom;

use rustc_hash::FxHashMap;

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::{I16Be, I32Be, U16Be, U32Be, U8};
use crate::error::{ParseError, WriteError};

const VERSION_1: i32 = 0x00010000;
const VERSION_2: i32 = 0x00020000;
const VERSION_2_5: i32 = 0x00025000;
const VERSION_3: i32 = 0x00030000;

#[derive(Debug, Clone, PartialEq)]
pub struct PostTable {
    pub header: Header,
    /// Per-glyph names of a version 2 table.
    pub glyph_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub version: i32,
    pub italic_angle: i32,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub is_fixed_pitch: u32,
    pub min_mem_type_42: u32,
    pub max_mem_type_42: u32,
    pub min_mem_type_1: u32,
    pub max_mem_type_1: u32,
}

impl ReadBinary for Header {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let version = ctxt.read_i32be()?;
        let italic_angle = ctxt.read_i32be()?;
        let underline_position = ctxt.read_i16be()?;
        let underline_thickness = ctxt.read_i16be()?;
        let is_fixed_pitch = ctxt.read_u32be()?;
        let min_mem_type_42 = ctxt.read_u32be()?;
        let max_mem_type_42 = ctxt.read_u32be()?;
        let min_mem_type_1 = ctxt.read_u32be()?;
        let max_mem_type_1 = ctxt.read_u32be()?;

        Ok(Header {
            version,
            italic_angle,
            underline_position,
            underline_thickness,
            is_fixed_pitch,
            min_mem_type_42,
            max_mem_type_42,
            min_mem_type_1,
            max_mem_type_1,
        })
    }
}

impl WriteBinary<&Self> for Header {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &Header) -> Result<(), WriteError> {
        I32Be::write(ctxt, table.version)?;
        I32Be::write(ctxt, table.italic_angle)?;
        I16Be::write(ctxt, table.underline_position)?;
        I16Be::write(ctxt, table.underline_thickness)?;
        U32Be::write(ctxt, table.is_fixed_pitch)?;
        U32Be::write(ctxt, table.min_mem_type_42)?;
        U32Be::write(ctxt, table.max_mem_type_42)?;
        U32Be::write(ctxt, table.min_mem_type_1)?;
        U32Be::write(ctxt, table.max_mem_type_1)?;

        Ok(())
    }
}

impl ReadBinary for PostTable {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let header = ctxt.read::<Header>()?;
        let glyph_names = match header.version {
            VERSION_2 => {
                let num_glyphs = ctxt.read_u16be()?;
                let glyph_name_index = ctxt.read_array::<U16Be>(usize::from(num_glyphs))?;

                let mut custom_names = Vec::new();
                while ctxt.bytes_available() {
                    let length = ctxt.read_u8()?;
                    let bytes = ctxt.read_slice(usize::from(length))?;
                    custom_names.push(String::from_utf8_lossy(bytes).into_owned());
                }

                let names = glyph_name_index
                    .iter()
                    .map(|index| {
                        let index = usize::from(index);
                        match FORMAT_1_NAMES.get(index) {
                            Some(name) => Ok((*name).to_owned()),
                            None => custom_names
                                .get(index - FORMAT_1_NAMES.len())
                                .cloned()
                                .ok_or(ParseError::BadIndex),
                        }
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(names)
            }
            VERSION_1 | VERSION_2_5 | VERSION_3 => None,
            _ => return Err(ParseError::BadVersion),
        };

        Ok(PostTable {
            header,
            glyph_names,
        })
    }
}

impl WriteBinary<&Self> for PostTable {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, table: &PostTable) -> Result<(), WriteError> {
        match &table.glyph_names {
            Some(names) => {
                let header = Header {
                    version: VERSION_2,
                    ..table.header.clone()
                };
                Header::write(ctxt, &header)?;
                write_glyph_names(ctxt, names)
            }
            None if table.header.version == VERSION_2 => Err(WriteError::BadValue),
            None => Header::write(ctxt, &table.header),
        }
    }
}

fn write_glyph_names<C: WriteContext>(ctxt: &mut C, names: &[String]) -> Result<(), WriteError> {
    let standard: FxHashMap<&str, usize> = FORMAT_1_NAMES
        .iter()
        .enumerate()
        .map(|(index, name)| (*name, index))
        .collect();
    let mut custom: FxHashMap<&str, usize> = FxHashMap::default();
    let mut custom_order = Vec::new();

    U16Be::write(ctxt, u16::try_from(names.len())?)?;
    for name in names {
        let index = match standard.get(name.as_str()) {
            Some(&index) => index,
            None => *custom.entry(name.as_str()).or_insert_with(|| {
                custom_order.push(name.as_str());
                FORMAT_1_NAMES.len() + custom_order.len() - 1
            }),
        };
        U16Be::write(ctxt, u16::try_from(index)?)?;
    }

    for name in custom_order {
        let length = u8::try_from(name.len())?;
        U8::write(ctxt, length)?;
        ctxt.write_bytes(name.as_bytes())?;
    }

    Ok(())
}

impl PostTable {
    pub fn glyph_name(&self, glyph_index: u16) -> Option<&str> {
        let index = usize::from(glyph_index);
        match (&self.glyph_names, self.header.version) {
            (Some(names), _) => names.get(index).map(String::as_str),
            (None, VERSION_1) => FORMAT_1_NAMES.get(index).copied(),
            (None, _) => None,
        }
    }

    /// Whether this table stores a name for each glyph that must be kept in sync with the font.
    pub fn has_glyph_names(&self) -> bool {
        self.glyph_names.is_some()
    }
}

/// The standard Macintosh glyph names, in their `post` version 1 order.
static FORMAT_1_NAMES: [&str; 258] = [
    ".notdef", ".null", "nonmarkingreturn", "space", "exclam", "quotedbl", "numbersign",
    "dollar", "percent", "ampersand", "quotesingle", "parenleft", "parenright", "asterisk",
    "plus", "comma", "hyphen", "period", "slash", "zero", "one", "two", "three", "four", "five",
    "six", "seven", "eight", "nine", "colon", "semicolon", "less", "equal", "greater",
    "question", "at", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K", "L", "M", "N", "O",
    "P", "Q", "R", "S", "T", "U", "V", "W", "X", "Y", "Z", "bracketleft", "backslash",
    "bracketright", "asciicircum", "underscore", "grave", "a", "b", "c", "d", "e", "f", "g",
    "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y",
    "z", "braceleft", "bar", "braceright", "asciitilde", "Adieresis", "Aring", "Ccedilla",
    "Eacute", "Ntilde", "Odieresis", "Udieresis", "aacute", "agrave", "acircumflex",
    "adieresis", "atilde", "aring", "ccedilla", "eacute", "egrave", "ecircumflex", "edieresis",
    "iacute", "igrave", "icircumflex", "idieresis", "ntilde", "oacute", "ograve", "ocircumflex",
    "odieresis", "otilde", "uacute", "ugrave", "ucircumflex", "udieresis", "dagger", "degree",
    "cent", "sterling", "section", "bullet", "paragraph", "germandbls", "registered",
    "copyright", "trademark", "acute", "dieresis", "notequal", "AE", "Oslash", "infinity",
    "plusminus", "lessequal", "greaterequal", "yen", "mu", "partialdiff", "summation",
    "product", "pi", "integral", "ordfeminine", "ordmasculine", "Omega", "ae", "oslash",
    "questiondown", "exclamdown", "logicalnot", "radical", "florin", "approxequal", "Delta",
    "guillemotleft", "guillemotright", "ellipsis", "nonbreakingspace", "Agrave", "Atilde",
    "Otilde", "OE", "oe", "endash", "emdash", "quotedblleft", "quotedblright", "quoteleft",
    "quoteright", "divide", "lozenge", "ydieresis", "Ydieresis", "fraction", "currency",
    "guilsinglleft", "guilsinglright", "fi", "fl", "daggerdbl", "periodcentered",
    "quotesinglbase", "quotedblbase", "perthousand", "Acircumflex", "Ecircumflex", "Aacute",
    "Edieresis", "Egrave", "Iacute", "Icircumflex", "Idieresis", "Igrave", "Oacute",
    "Ocircumflex", "apple", "Ograve", "Uacute", "Ucircumflex", "Ugrave", "dotlessi",
    "circumflex", "tilde", "macron", "breve", "dotaccent", "ring", "cedilla", "hungarumlaut",
    "ogonek", "caron", "Lslash", "lslash", "Scaron", "scaron", "Zcaron", "zcaron", "brokenbar",
    "Eth", "eth", "Yacute", "yacute", "Thorn", "thorn", "minus", "multiply", "onesuperior",
    "twosuperior", "threesuperior", "onehalf", "onequarter", "threequarters", "franc", "Gbreve",
    "gbreve", "Idotaccent", "Scedilla", "scedilla", "Cacute", "cacute", "Ccaron", "ccaron",
    "dcroat",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::binary::write::WriteBuffer;

    fn header(version: i32) -> Header {
        Header {
            version,
            italic_angle: 0,
            underline_position: -100,
            underline_thickness: 50,
            is_fixed_pitch: 0,
            min_mem_type_42: 0,
            max_mem_type_42: 0,
            min_mem_type_1: 0,
            max_mem_type_1: 0,
        }
    }

    #[test]
    fn test_version2_round_trip() {
        let post = PostTable {
            header: header(VERSION_3),
            glyph_names: Some(vec![
                String::from(".notdef"),
                String::from("A"),
                String::from("uni1100.l1"),
                String::from("uni1100.l1"),
            ]),
        };

        let mut ctxt = WriteBuffer::new();
        PostTable::write(&mut ctxt, &post).unwrap();
        let read = ReadScope::new(ctxt.bytes()).read::<PostTable>().unwrap();

        assert_eq!(read.header.version, VERSION_2);
        assert_eq!(read.glyph_name(2), Some("uni1100.l1"));
        assert_eq!(read.glyph_name(3), Some("uni1100.l1"));
        assert_eq!(read.glyph_name(1), Some("A"));
        assert_eq!(read.glyph_name(4), None);
    }

    #[test]
    fn test_version1_names() {
        let post = PostTable {
            header: header(VERSION_1),
            glyph_names: None,
        };
        assert_eq!(post.glyph_name(3), Some("space"));
        assert_eq!(post.glyph_name(300), None);
    }

    #[test]
    fn test_version3_has_no_names() {
        let mut ctxt = WriteBuffer::new();
        Header::write(&mut ctxt, &header(VERSION_3)).unwrap();
        let post = ReadScope::new(ctxt.bytes()).read::<PostTable>().unwrap();
        assert!(!post.has_glyph_names());
        assert_eq!(post.glyph_name(0), None);
    }
}
