//! CFF font handling.
//!
//! Refer to [Technical Note #5176](http://wwwimages.adobe.com/content/dam/Adobe/en/devnet/font/pdfs/5176.CFF.pdf)
//! for more information.
//!
//! The table is held in an owned form so that glyphs can be appended to the CharStrings INDEX,
//! charset and FDSelect and the result written back out.

use std::convert::TryFrom;
use std::marker::PhantomData;

use itertools::Itertools;
use lazy_static::lazy_static;
use rustc_hash::FxHashMap;
use tinyvec::{tiny_vec, TinyVec};

use crate::binary::read::{ReadBinary, ReadBinaryDep, ReadCtxt, ReadFixed, ReadFrom, ReadScope};
use crate::binary::write::{WriteBinary, WriteBinaryDep, WriteBuffer, WriteContext, WriteCounter};
use crate::binary::{I16Be, I32Be, U16Be, U24Be, U32Be, U8};
use crate::error::{ParseError, WriteError};

pub mod charstring;
pub mod compiler;

// CFF Spec: An operator may be preceded by up to a maximum of 48 operands.
pub(crate) const MAX_OPERANDS: usize = 48;
const END_OF_FLOAT_FLAG: u8 = 0xf;

const OPERAND_ZERO: [Operand; 1] = [Operand::Integer(0)];
const OFFSET_ZERO: [Operand; 1] = [Operand::Offset(0)];
const DEFAULT_UNDERLINE_POSITION: [Operand; 1] = [Operand::Integer(-100)];
const DEFAULT_UNDERLINE_THICKNESS: [Operand; 1] = [Operand::Integer(50)];
const DEFAULT_CHARSTRING_TYPE: [Operand; 1] = [Operand::Integer(2)];
lazy_static! {
    static ref DEFAULT_FONT_MATRIX: [Operand; 6] = {
        let real_0_001 = Operand::Real(Real(tiny_vec![0x0a, 0x00, 0x1f])); // 0.001
        [
            real_0_001.clone(),
            Operand::Integer(0),
            Operand::Integer(0),
            real_0_001,
            Operand::Integer(0),
            Operand::Integer(0),
        ]
    };
}
const DEFAULT_BBOX: [Operand; 4] = [
    Operand::Integer(0),
    Operand::Integer(0),
    Operand::Integer(0),
    Operand::Integer(0),
];
/// CIDCount used when the Top DICT of a CID-keyed font does not specify one.
pub const DEFAULT_CID_COUNT: i32 = 8720;
const DEFAULT_CID_COUNT_OPERAND: [Operand; 1] = [Operand::Integer(DEFAULT_CID_COUNT)];
const DEFAULT_BLUE_SHIFT: [Operand; 1] = [Operand::Integer(7)];
const DEFAULT_BLUE_FUZZ: [Operand; 1] = [Operand::Integer(1)];
lazy_static! {
    static ref DEFAULT_BLUE_SCALE: [Operand; 1] =
        [Operand::Real(Real(tiny_vec![0x0a, 0x03, 0x96, 0x25, 0xff]))]; // 0.039625
    static ref DEFAULT_EXPANSION_FACTOR: [Operand; 1] =
        [Operand::Real(Real(tiny_vec![0x0a, 0x06, 0xff]))]; // 0.06
    static ref STANDARD_STRING_SIDS: FxHashMap<&'static str, SID> = STANDARD_STRINGS
        .iter()
        .enumerate()
        .filter_map(|(sid, name)| Some((*name, SID::try_from(sid).ok()?)))
        .collect();
}

const ISO_ADOBE_LAST_SID: u16 = 228;

/// A string id in the font
pub type SID = u16;

/// Top level representation of a CFF table.
///
/// CFF tables embedded in OpenType fonts always hold exactly one font, so unlike a bare CFF
/// FontSet there is a single `Font` here.
#[derive(Clone, Debug)]
pub struct CFF {
    pub header: Header,
    pub name_index: Index,
    pub string_index: Index,
    pub global_subr_index: Index,
    pub font: Font,
}

/// CFF Font Header described in Section 6 of Technical Note #5176
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    pub major: u8,
    pub minor: u8,
    pub hdr_size: u8,
    pub off_size: u8,
}

/// A CFF INDEX described in Section 5 of Technical Note #5176
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Index {
    data: Vec<Vec<u8>>,
}

/// The font within a CFF table
#[derive(Clone, Debug)]
pub struct Font {
    pub top_dict: TopDict,
    pub char_strings_index: Index,
    pub charset: Charset,
    pub data: CFFVariant,
}

#[derive(Clone, Debug)]
pub enum CFFVariant {
    CID(CIDData),
    Type1(Type1Data),
}

#[derive(Clone, Debug)]
pub struct CIDData {
    pub font_dicts: Vec<FontDict>,
    /// The Private DICT of each Font DICT.
    pub private_dicts: Vec<PrivateDict>,
    /// An optional local subroutine index per Private DICT.
    pub local_subr_indices: Vec<Option<Index>>,
    pub fd_select: FDSelect,
}

#[derive(Clone, Debug)]
pub struct Type1Data {
    pub encoding: Encoding,
    pub private_dict: PrivateDict,
    pub local_subr_index: Option<Index>,
}

// Encoding data is located via the offset operand to the Encoding operator in the Top DICT. Only
// one Encoding operator can be specified per font except for CIDFonts which specify no encoding.
#[derive(Clone, Debug, PartialEq)]
pub enum Encoding {
    Standard,
    Expert,
    Custom(CustomEncoding),
}

/// A custom encoding, kept as it was read.
///
/// Glyphs are only ever appended, so codes already assigned stay valid.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomEncoding {
    data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Charset {
    ISOAdobe,
    Expert,
    ExpertSubset,
    Custom(CustomCharset),
}

/// The SIDs (name-keyed fonts) or CIDs (CID-keyed fonts) of glyphs 1 onwards.
///
/// The `.notdef` glyph is omitted as it is implicitly glyph 0. The format the charset is written
/// in is chosen when writing.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CustomCharset {
    ids: Vec<u16>,
}

/// A Range from `first` to `first + n_left`
///
/// In FDSelect format 3 the same layout holds the first glyph of a range and the Font DICT index
/// of the range in `n_left`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Range<F, N> {
    pub first: F,
    pub n_left: N,
}

/// A CFF DICT described in Section 4 of Technical Note #5176
#[derive(Debug, PartialEq, Clone)]
pub struct Dict<T>
where
    T: DictDefault,
{
    dict: Vec<(Operator, Vec<Operand>)>,
    default: PhantomData<T>,
}

/// The default values of a DICT
pub trait DictDefault {
    /// Returns the default operand(s) if any for the supplied `op`.
    fn default(op: Operator) -> Option<&'static [Operand]>;
}

#[derive(Debug, PartialEq, Clone)]
pub struct TopDictDefault;

#[derive(Debug, PartialEq, Clone)]
pub struct FontDictDefault;

#[derive(Debug, PartialEq, Clone)]
pub struct PrivateDictDefault;

pub type TopDict = Dict<TopDictDefault>;

pub type FontDict = Dict<FontDictDefault>;

pub type PrivateDict = Dict<PrivateDictDefault>;

/// A collection of offset changes to a `Dict`
///
/// `DictDelta` only holds Operators with offsets as operands.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct DictDelta {
    dict: Vec<(Operator, Vec<Operand>)>,
}

/// Font DICT select as described in Section 19 of Technical Note #5176
///
/// Held expanded with one Font DICT index per glyph. Written as format 3 when that is smaller.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct FDSelect {
    glyph_font_dict_indices: Vec<u8>,
}

/// CFF DICT operator
#[derive(Debug, PartialEq)]
enum Op {
    Operator(Operator),
    Operand(Operand),
}

/// CFF operand to an operator
#[derive(Debug, PartialEq, Clone)]
pub enum Operand {
    Integer(i32),
    Offset(i32),
    Real(Real),
}

/// A real number
///
/// To parse the value into `f64` use the `TryFrom`/`TryInto` impl.
#[derive(Debug, PartialEq, Clone)]
pub struct Real(TinyVec<[u8; 7]>);

#[repr(u16)]
#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Operator {
    Version = 0,
    Notice = 1,
    FullName = 2,
    FamilyName = 3,
    Weight = 4,
    FontBBox = 5,
    BlueValues = 6,
    OtherBlues = 7,
    FamilyBlues = 8,
    FamilyOtherBlues = 9,
    StdHW = 10,
    StdVW = 11,
    UniqueID = 13,
    XUID = 14,
    Charset = 15,
    Encoding = 16,
    CharStrings = 17,
    Private = 18,
    Subrs = 19,
    DefaultWidthX = 20,
    NominalWidthX = 21,
    Copyright = op2(0),
    IsFixedPitch = op2(1),
    ItalicAngle = op2(2),
    UnderlinePosition = op2(3),
    UnderlineThickness = op2(4),
    PaintType = op2(5),
    CharstringType = op2(6),
    FontMatrix = op2(7),
    StrokeWidth = op2(8),
    BlueScale = op2(9),
    BlueShift = op2(10),
    BlueFuzz = op2(11),
    StemSnapH = op2(12),
    StemSnapV = op2(13),
    ForceBold = op2(14),
    LanguageGroup = op2(17),
    ExpansionFactor = op2(18),
    InitialRandomSeed = op2(19),
    SyntheticBase = op2(20),
    PostScript = op2(21),
    BaseFontName = op2(22),
    BaseFontBlend = op2(23),
    ROS = op2(30),
    CIDFontVersion = op2(31),
    CIDFontRevision = op2(32),
    CIDFontType = op2(33),
    CIDCount = op2(34),
    UIDBase = op2(35),
    FDArray = op2(36),
    FDSelect = op2(37),
    FontName = op2(38),
}

const fn op2(value: u8) -> u16 {
    (12 << 8) | (value as u16)
}

/// Offsets of the structures referenced from the Top DICT, collected while writing.
#[derive(Default)]
struct FontOffsets {
    char_strings: usize,
    charset: i32,
    encoding: Option<usize>,
    private_dict: Option<(usize, usize)>, // length, offset
    font_dict_index: usize,
    fd_select: usize,
}

impl ReadBinary for CFF {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        // Get a scope that starts at the beginning of the CFF data. This is needed for reading
        // data that is specified as an offset from the start of the data later.
        let scope = ctxt.scope();

        let header = ctxt.read::<Header>()?;
        let name_index = ctxt.read::<Index>()?;
        ctxt.check(name_index.len() == 1)?;
        let top_dict_index = ctxt.read::<Index>()?;
        let string_index = ctxt.read::<Index>()?;
        let global_subr_index = ctxt.read::<Index>()?;

        let top_dict_data = top_dict_index
            .read_object(0)
            .ok_or(ParseError::MissingValue)?;
        let top_dict = ReadScope::new(top_dict_data).read::<TopDict>()?;

        // CharStrings index
        let offset = top_dict
            .get_i32(Operator::CharStrings)
            .unwrap_or(Err(ParseError::MissingValue))?;
        let char_strings_index = scope.offset(usize::try_from(offset)?).read::<Index>()?;
        let n_glyphs = char_strings_index.len();
        ctxt.check(n_glyphs > 0)?;

        // A CIDFont is identified by the presence of the ROS operator in the Top DICT
        let data = if top_dict.get(Operator::ROS).is_some() {
            CFFVariant::CID(read_cid_data(&scope, &top_dict, n_glyphs)?)
        } else if top_dict.get(Operator::SyntheticBase).is_some() {
            return Err(ParseError::NotImplemented);
        } else {
            let (private_dict, private_dict_offset) = top_dict.read_private_dict(&scope)?;
            let local_subr_index =
                read_local_subr_index(&scope, &private_dict, private_dict_offset)?;
            let encoding = read_encoding(&scope, &top_dict)?;

            CFFVariant::Type1(Type1Data {
                encoding,
                private_dict,
                local_subr_index,
            })
        };

        let charset = read_charset(&scope, &top_dict, n_glyphs)?;

        Ok(CFF {
            header,
            name_index,
            string_index,
            global_subr_index,
            font: Font {
                top_dict,
                char_strings_index,
                charset,
                data,
            },
        })
    }
}

impl WriteBinary<&Self> for CFF {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, cff: &CFF) -> Result<(), WriteError> {
        let font = &cff.font;
        Header::write(ctxt, &cff.header)?;
        Index::write(ctxt, &cff.name_index)?;

        // Offsets in the Top DICT are always written with 5 bytes, so the size of the Top DICT
        // INDEX can be calculated before the offsets are known.
        let skeleton = font.top_dict_delta(&FontOffsets::default())?;
        let top_dict_length = TopDict::write_dep(&mut WriteCounter::new(), &font.top_dict, skeleton)?;
        let top_dict_index_length = Index::size_of(&[top_dict_length]);
        let top_dict_index_placeholder = ctxt.reserve::<Index, _>(top_dict_index_length)?;
        Index::write(ctxt, &cff.string_index)?;
        Index::write(ctxt, &cff.global_subr_index)?;

        let mut offsets = FontOffsets {
            char_strings: ctxt.bytes_written(),
            ..FontOffsets::default()
        };
        Index::write(ctxt, &font.char_strings_index)?;

        offsets.charset = match &font.charset {
            Charset::ISOAdobe => 0,
            Charset::Expert => 1,
            Charset::ExpertSubset => 2,
            Charset::Custom(custom) => {
                let offset = i32::try_from(ctxt.bytes_written())?;
                CustomCharset::write(ctxt, custom)?;
                offset
            }
        };

        match &font.data {
            CFFVariant::CID(cid_data) => {
                let (font_dict_index, fd_select) = CIDData::write(ctxt, cid_data)?;
                offsets.font_dict_index = font_dict_index;
                offsets.fd_select = fd_select;
            }
            CFFVariant::Type1(type1_data) => {
                let (private_dict, encoding) = Type1Data::write(ctxt, type1_data)?;
                offsets.private_dict = Some(private_dict);
                offsets.encoding = encoding;
            }
        }

        // Write out the Top DICT with the final offsets
        let mut top_dict_data = WriteBuffer::new();
        let written = TopDict::write_dep(
            &mut top_dict_data,
            &font.top_dict,
            font.top_dict_delta(&offsets)?,
        )?;
        if written != top_dict_length {
            return Err(WriteError::PlaceholderMismatch);
        }
        let top_dict_index = Index::from(vec![top_dict_data.into_inner()]);
        ctxt.write_placeholder(top_dict_index_placeholder, &top_dict_index)?;

        Ok(())
    }
}

impl CFF {
    /// Read a string with the given SID
    pub fn read_string(&self, sid: SID) -> Result<&str, ParseError> {
        read_string_index_string(&self.string_index, sid)
    }

    /// Look up the SID of `name`, searching the standard strings first.
    pub fn string_id(&self, name: &str) -> Option<SID> {
        if let Some(sid) = STANDARD_STRING_SIDS.get(name) {
            return Some(*sid);
        }
        self.string_index
            .iter()
            .position(|string| string == name.as_bytes())
            .and_then(|index| SID::try_from(STANDARD_STRINGS.len() + index).ok())
    }

    /// Return the SID of `name`, adding it to the String INDEX if necessary.
    pub fn add_string(&mut self, name: &str) -> Result<SID, WriteError> {
        if let Some(sid) = self.string_id(name) {
            return Ok(sid);
        }
        let sid = SID::try_from(STANDARD_STRINGS.len() + self.string_index.len())?;
        self.string_index.push(name.as_bytes().to_vec());
        Ok(sid)
    }

    /// The names of all glyphs in glyph id order.
    ///
    /// Name-keyed fonts use the names from the charset. CID-keyed fonts name glyphs `cid<N>` after
    /// their CID, except for `.notdef`.
    pub fn glyph_names(&self) -> Result<Vec<String>, ParseError> {
        (0..self.font.char_strings_index.len())
            .map(|glyph_id| {
                let glyph_id = u16::try_from(glyph_id)?;
                if glyph_id == 0 {
                    return Ok(String::from(".notdef"));
                }
                let id = self
                    .font
                    .charset
                    .id_for_glyph(glyph_id)
                    .ok_or(ParseError::BadIndex)?;
                if self.font.is_cid_keyed() {
                    Ok(cid_glyph_name(id))
                } else {
                    self.read_string(id).map(String::from)
                }
            })
            .collect()
    }
}

/// The glyph name used for `cid` in a CID-keyed font.
pub fn cid_glyph_name(cid: u16) -> String {
    format!("cid{}", cid)
}

/// Read a string with the given SID from the String INDEX
fn read_string_index_string(string_index: &Index, sid: SID) -> Result<&str, ParseError> {
    let sid = usize::from(sid);
    // When the client needs to determine the string that corresponds to a particular SID it
    // performs the following: test if SID is in standard range then fetch from internal table,
    // otherwise, fetch string from the String INDEX using a value of (SID – nStdStrings) as
    // the index
    if let Some(string) = STANDARD_STRINGS.get(sid) {
        Ok(string)
    } else {
        let bytes = string_index
            .read_object(sid - STANDARD_STRINGS.len())
            .ok_or(ParseError::BadIndex)?;

        std::str::from_utf8(bytes).map_err(|_utf8_err| ParseError::BadValue)
    }
}

impl ReadBinary for Header {
    type HostType<'b> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        // Only major version 1 is understood. Minor versions are extensions that can be ignored.
        let major = ctxt.read_u8()?;
        ctxt.check_version(major == 1)?;
        let minor = ctxt.read_u8()?;
        let hdr_size = ctxt.read_u8()?;
        let off_size = ctxt.read_u8()?;

        if hdr_size < 4 {
            return Err(ParseError::BadValue);
        }

        if !(1..=4).contains(&off_size) {
            return Err(ParseError::BadValue);
        }

        let _unknown = ctxt.read_slice(usize::from(hdr_size - 4))?;

        Ok(Header {
            major,
            minor,
            hdr_size,
            off_size,
        })
    }
}

impl WriteBinary<&Self> for Header {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, header: &Header) -> Result<(), WriteError> {
        U8::write(ctxt, header.major)?;
        U8::write(ctxt, header.minor)?;
        // Any data between the header and the Name INDEX will have been discarded.
        // So the size will always be 4 bytes.
        U8::write(ctxt, 4)?; // hdr_size
        U8::write(ctxt, header.off_size)?;

        Ok(())
    }
}

impl ReadBinary for Index {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let count = usize::from(ctxt.read_u16be()?);
        if count == 0 {
            return Ok(Index::default());
        }

        let off_size = ctxt.read_u8()?;
        if !(1..=4).contains(&off_size) {
            return Err(ParseError::BadValue);
        }
        let offsets = (0..=count)
            .map(|_| read_offset(ctxt, off_size))
            .collect::<Result<Vec<_>, _>>()?;
        // Offsets are relative to the byte that precedes the object data, so the first is 1
        ctxt.check(offsets[0] == 1)?;
        ctxt.check(offsets.iter().tuple_windows().all(|(start, end)| start <= end))?;

        let data_array = ctxt.read_slice(offsets[count] - 1)?;
        let data = offsets
            .iter()
            .tuple_windows()
            .map(|(start, end)| data_array[start - 1..end - 1].to_vec())
            .collect();

        Ok(Index { data })
    }
}

impl WriteBinary<&Self> for Index {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, index: &Index) -> Result<(), WriteError> {
        let count = u16::try_from(index.data.len())?;
        U16Be::write(ctxt, count)?;
        if count == 0 {
            return Ok(());
        }

        let (off_size, offset_array) = serialise_offset_array(index.offsets())?;
        U8::write(ctxt, off_size)?;
        ctxt.write_bytes(&offset_array)?;
        for data in &index.data {
            ctxt.write_bytes(data)?;
        }

        Ok(())
    }
}

impl From<Vec<Vec<u8>>> for Index {
    fn from(data: Vec<Vec<u8>>) -> Self {
        Index { data }
    }
}

impl Index {
    pub fn new() -> Self {
        Index::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn read_object(&self, index: usize) -> Option<&[u8]> {
        self.data.get(index).map(|data| data.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.data.iter().map(|data| data.as_slice())
    }

    /// Append an object, returning its index.
    pub fn push(&mut self, object: Vec<u8>) -> usize {
        self.data.push(object);
        self.data.len() - 1
    }

    /// The size in bytes of the object data.
    pub fn data_len(&self) -> usize {
        self.data.iter().map(|data| data.len()).sum()
    }

    /// The size of an INDEX holding objects of the supplied lengths.
    pub fn size_of(object_lengths: &[usize]) -> usize {
        if object_lengths.is_empty() {
            return 2;
        }
        let data_len: usize = object_lengths.iter().sum();
        let off_size = offset_size(data_len + 1).map_or(4, usize::from);
        2 + 1 + (object_lengths.len() + 1) * off_size + data_len
    }

    // INDEX offsets start at 1
    fn offsets(&self) -> Vec<usize> {
        let mut offset = 1;
        let mut offsets = Vec::with_capacity(self.data.len() + 1);
        offsets.push(offset);
        for data in &self.data {
            offset += data.len();
            offsets.push(offset);
        }
        offsets
    }
}

fn read_offset(ctxt: &mut ReadCtxt<'_>, off_size: u8) -> Result<usize, ParseError> {
    let offset = match off_size {
        1 => u32::from(ctxt.read_u8()?),
        2 => u32::from(ctxt.read_u16be()?),
        3 => ctxt.read_u24be()?,
        4 => ctxt.read_u32be()?,
        _ => return Err(ParseError::BadValue),
    };
    Ok(usize::try_from(offset)?)
}

impl<T> ReadBinary for Dict<T>
where
    T: DictDefault,
{
    type HostType<'b> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let mut dict = Vec::new();
        let mut operands = Vec::new();

        while ctxt.bytes_available() {
            match Op::read(ctxt)? {
                Op::Operator(operator) => {
                    integer_to_offset(operator, &mut operands);
                    dict.push((operator, std::mem::take(&mut operands)));
                }
                Op::Operand(operand) => {
                    operands.push(operand);
                    if operands.len() > MAX_OPERANDS {
                        return Err(ParseError::LimitExceeded);
                    }
                }
            }
        }

        Ok(Dict {
            dict,
            default: PhantomData,
        })
    }
}

fn offset_size(value: usize) -> Option<u8> {
    match value {
        0..=0xFF => Some(1),
        0x100..=0xFFFF => Some(2),
        0x1_0000..=0xFF_FFFF => Some(3),
        0x100_0000..=0xFFFF_FFFF => Some(4),
        _ => None,
    }
}

// Special case handling for operands that are offsets. This function swaps them from an
// Integer to an Offset. This is later used when writing operands.
fn integer_to_offset(operator: Operator, operands: &mut [Operand]) {
    match (operator, &operands) {
        // Encodings 0..=1 indicate predefined encodings and are not offsets
        (Operator::Encoding, [Operand::Integer(offset)]) if *offset > 1 => {
            operands[0] = Operand::Offset(*offset);
        }
        (Operator::Charset, [Operand::Integer(offset)])
        | (Operator::CharStrings, [Operand::Integer(offset)])
        | (Operator::Subrs, [Operand::Integer(offset)])
        | (Operator::FDArray, [Operand::Integer(offset)])
        | (Operator::FDSelect, [Operand::Integer(offset)]) => {
            operands[0] = Operand::Offset(*offset);
        }
        (Operator::Private, [Operand::Integer(length), Operand::Integer(offset)]) => {
            let (length, offset) = (*length, *offset);
            operands[0] = Operand::Offset(length);
            operands[1] = Operand::Offset(offset);
        }
        _ => {}
    }
}

impl<T> WriteBinaryDep<&Self> for Dict<T>
where
    T: DictDefault,
{
    type Args = DictDelta;
    type Output = usize; // The length of the written Dict

    /// Write the DICT, replacing operands with those in `delta`.
    ///
    /// Operators in `delta` that are not in the DICT are written after the existing ones.
    fn write_dep<C: WriteContext>(
        ctxt: &mut C,
        dict: &Dict<T>,
        delta: DictDelta,
    ) -> Result<Self::Output, WriteError> {
        let offset = ctxt.bytes_written();

        for (operator, operands) in dict.iter() {
            let mut operands = operands.as_slice();

            // Replace operands with delta operands if present otherwise skip if operands match
            // default. We never skip operands pulled from the delta DICT as these are offsets and
            // always need to be written in order to make the size of the DICT predictable.
            if let Some(delta_operands) = delta.get(*operator) {
                operands = delta_operands;
            } else if T::default(*operator).map_or(false, |defaults| defaults == operands) {
                continue;
            }

            write_operator(ctxt, *operator, operands)?;
        }
        for (operator, operands) in delta.iter() {
            if dict.get(*operator).is_none() {
                write_operator(ctxt, *operator, operands)?;
            }
        }

        Ok(ctxt.bytes_written() - offset)
    }
}

fn write_operator<C: WriteContext>(
    ctxt: &mut C,
    operator: Operator,
    operands: &[Operand],
) -> Result<(), WriteError> {
    for operand in operands {
        Operand::write(ctxt, operand)?;
    }
    Operator::write(ctxt, operator)
}

impl ReadBinary for Op {
    type HostType<'b> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let b0 = ctxt.read_u8()?;

        match b0 {
            0..=11 | 13..=21 => ok_operator(Operator::try_from(u16::from(b0))?),
            12 => ok_operator(Operator::try_from(op2(ctxt.read_u8()?))?),
            28 => {
                let num = ctxt.read_i16be()?;
                Ok(Op::Operand(Operand::Integer(i32::from(num))))
            }
            29 => ok_int(ctxt.read_i32be()?),
            30 => ok_real(ctxt.read_until_nibble(END_OF_FLOAT_FLAG)?),
            32..=246 => ok_int(i32::from(b0) - 139),
            247..=250 => {
                let b1 = ctxt.read_u8()?;
                ok_int((i32::from(b0) - 247) * 256 + i32::from(b1) + 108)
            }
            251..=254 => {
                let b1 = ctxt.read_u8()?;
                ok_int(-(i32::from(b0) - 251) * 256 - i32::from(b1) - 108)
            }
            22..=27 | 31 | 255 => Err(ParseError::BadValue), // reserved
        }
    }
}

impl WriteBinary<Self> for Operator {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, op: Operator) -> Result<(), WriteError> {
        let value = op as u16;
        match u8::try_from(value) {
            Ok(value) => U8::write(ctxt, value),
            Err(_) => U16Be::write(ctxt, value),
        }
    }
}

impl WriteBinary<&Self> for Operand {
    type Output = ();

    // Refer to Table 3 Operand Encoding in section 4 of Technical Note #5176 for details on the
    // integer encoding scheme.
    fn write<C: WriteContext>(ctxt: &mut C, op: &Operand) -> Result<(), WriteError> {
        match op {
            Operand::Integer(val) => match *val {
                // NOTE: Casts are safe due to patterns limiting range
                -107..=107 => {
                    U8::write(ctxt, (val + 139) as u8)?;
                }
                108..=1131 => {
                    let val = *val - 108;
                    U8::write(ctxt, ((val >> 8) + 247) as u8)?;
                    U8::write(ctxt, val as u8)?;
                }
                -1131..=-108 => {
                    let val = -*val - 108;
                    U8::write(ctxt, ((val >> 8) + 251) as u8)?;
                    U8::write(ctxt, val as u8)?;
                }
                -32768..=32767 => {
                    U8::write(ctxt, 28)?;
                    I16Be::write(ctxt, *val as i16)?
                }
                _ => {
                    U8::write(ctxt, 29)?;
                    I32Be::write(ctxt, *val)?
                }
            },
            Operand::Offset(val) => {
                U8::write(ctxt, 29)?;
                // Offsets are always encoded using the i32 representation to make their size
                // predictable.
                I32Be::write(ctxt, *val)?;
            }
            Operand::Real(Real(val)) => {
                U8::write(ctxt, 30)?;
                ctxt.write_bytes(val)?;
            }
        }

        Ok(())
    }
}

fn ok_operator(op: Operator) -> Result<Op, ParseError> {
    Ok(Op::Operator(op))
}

fn ok_int(num: i32) -> Result<Op, ParseError> {
    Ok(Op::Operand(Operand::Integer(num)))
}

fn ok_real(slice: &[u8]) -> Result<Op, ParseError> {
    Ok(Op::Operand(Operand::Real(Real(TinyVec::from(slice)))))
}

const FLOAT_BUF_LEN: usize = 64;

// Portions of this try_from impl derived from ttf-parser, licenced under Apache-2.0.
// https://github.com/RazrFalcon/ttf-parser/blob/ba2d9c8b9a207951b7b07e9481bc74688762bd21/src/tables/cff/dict.rs#L188
impl TryFrom<&Real> for f64 {
    type Error = ParseError;

    /// Try to parse this `Real` into an `f64`.
    fn try_from(real: &Real) -> Result<Self, Self::Error> {
        let mut buf = [0u8; FLOAT_BUF_LEN];
        let mut used = 0;

        for &byte in real.0.iter() {
            let nibble1 = byte >> 4;
            let nibble2 = byte & 0xF;

            if nibble1 == END_OF_FLOAT_FLAG {
                break;
            }
            parse_float_nibble(nibble1, &mut used, &mut buf)?;
            if nibble2 == END_OF_FLOAT_FLAG {
                break;
            }
            parse_float_nibble(nibble2, &mut used, &mut buf)?;
        }

        let s = std::str::from_utf8(&buf[..used]).map_err(|_| ParseError::BadValue)?;
        s.parse().map_err(|_| ParseError::BadValue)
    }
}

// Adobe Technical Note #5176, Table 5 Nibble Definitions
fn parse_float_nibble(nibble: u8, idx: &mut usize, data: &mut [u8]) -> Result<(), ParseError> {
    if *idx == FLOAT_BUF_LEN {
        return Err(ParseError::LimitExceeded);
    }

    match nibble {
        0..=9 => {
            data[*idx] = b'0' + nibble;
        }
        10 => {
            data[*idx] = b'.';
        }
        11 => {
            data[*idx] = b'E';
        }
        12 => {
            if *idx + 1 == FLOAT_BUF_LEN {
                return Err(ParseError::LimitExceeded);
            }

            data[*idx] = b'E';
            *idx += 1;
            data[*idx] = b'-';
        }
        13 => return Err(ParseError::BadValue),
        14 => {
            data[*idx] = b'-';
        }
        _ => return Err(ParseError::BadValue),
    }

    *idx += 1;
    Ok(())
}

impl ReadFrom for Range<SID, u8> {
    type ReadType = (U16Be, U8);
    fn read_from((first, n_left): (SID, u8)) -> Self {
        Range { first, n_left }
    }
}

impl WriteBinary for Range<SID, u8> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, range: Self) -> Result<(), WriteError> {
        U16Be::write(ctxt, range.first)?;
        U8::write(ctxt, range.n_left)?;

        Ok(())
    }
}

impl ReadFrom for Range<SID, u16> {
    type ReadType = (U16Be, U16Be);
    fn read_from((first, n_left): (SID, u16)) -> Self {
        Range { first, n_left }
    }
}

impl WriteBinary for Range<SID, u16> {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, range: Self) -> Result<(), WriteError> {
        U16Be::write(ctxt, range.first)?;
        U16Be::write(ctxt, range.n_left)?;

        Ok(())
    }
}

impl<F, N> Range<F, N>
where
    F: Copy,
    N: Copy,
    u16: From<N>,
    u16: From<F>,
{
    pub fn len(&self) -> usize {
        usize::from(u16::from(self.n_left)) + 1
    }

    /// The ids covered by this range.
    pub fn iter(&self) -> Result<impl Iterator<Item = u16>, ParseError> {
        let first = u16::from(self.first);
        let last = first
            .checked_add(u16::from(self.n_left))
            .ok_or(ParseError::BadValue)?;
        Ok(first..=last)
    }
}

impl ReadBinary for CustomEncoding {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let start = ctxt.position();
        let format = ctxt.read_u8()?;
        // First byte indicates the format of the encoding data
        match format & 0x7F {
            0 => {
                let ncodes = ctxt.read_u8()?;
                let _codes = ctxt.read_slice(usize::from(ncodes))?;
            }
            1 => {
                let nranges = ctxt.read_u8()?;
                let _ranges = ctxt.read_slice(usize::from(nranges) * 2)?;
            }
            _ => return Err(ParseError::BadValue),
        }
        // The high-order bit of the format indicates supplementary encodings for multiply
        // encoded glyphs follow
        if format & 0x80 == 0x80 {
            let nsups = ctxt.read_u8()?;
            let _supplements = ctxt.read_slice(usize::from(nsups) * 3)?;
        }
        let data = scope.offset_length(0, ctxt.position() - start)?;
        Ok(CustomEncoding {
            data: data.data().to_vec(),
        })
    }
}

impl WriteBinary<&Self> for CustomEncoding {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, encoding: &Self) -> Result<(), WriteError> {
        ctxt.write_bytes(&encoding.data)
    }
}

impl Charset {
    /// Returns the id of the SID (Type 1 font) or CID (CID keyed font) of the name of the supplied glyph
    pub fn id_for_glyph(&self, glyph_id: u16) -> Option<u16> {
        match self {
            // In ISOAdobe glyph ID maps to SID
            Charset::ISOAdobe => {
                if glyph_id <= ISO_ADOBE_LAST_SID {
                    Some(glyph_id)
                } else {
                    None
                }
            }
            Charset::Expert => EXPERT_CHARSET.get(usize::from(glyph_id)).copied(),
            Charset::ExpertSubset => EXPERT_SUBSET_CHARSET.get(usize::from(glyph_id)).copied(),
            Charset::Custom(custom) => custom.id_for_glyph(glyph_id),
        }
    }

    /// Returns the glyph id of the supplied string id.
    pub fn sid_to_gid(&self, sid: SID) -> Option<u16> {
        if sid == 0 {
            return Some(0);
        }

        match self {
            Charset::ISOAdobe => (sid <= ISO_ADOBE_LAST_SID).then_some(sid),
            Charset::Expert => position_u16(&EXPERT_CHARSET, sid),
            Charset::ExpertSubset => position_u16(&EXPERT_SUBSET_CHARSET, sid),
            Charset::Custom(custom) => custom.sid_to_gid(sid),
        }
    }

    /// Express this charset as a custom charset covering `n_glyphs` glyphs.
    ///
    /// Returns `None` if a predefined charset has fewer entries than `n_glyphs`.
    pub fn to_custom(&self, n_glyphs: usize) -> Option<CustomCharset> {
        match self {
            Charset::Custom(custom) => Some(custom.clone()),
            _ => {
                let ids = (1..n_glyphs)
                    .map(|glyph_id| self.id_for_glyph(u16::try_from(glyph_id).ok()?))
                    .collect::<Option<Vec<_>>>()?;
                Some(CustomCharset { ids })
            }
        }
    }
}

fn position_u16(ids: &[u16], id: u16) -> Option<u16> {
    ids.iter()
        .position(|&candidate| candidate == id)
        .and_then(|glyph_id| u16::try_from(glyph_id).ok())
}

impl ReadBinaryDep for CustomCharset {
    type Args<'a> = usize;
    type HostType<'a> = Self;

    fn read_dep(ctxt: &mut ReadCtxt<'_>, n_glyphs: usize) -> Result<Self, ParseError> {
        // (There is one less element in the charset than nGlyphs because the .notdef glyph name is omitted.)
        let n_glyphs = n_glyphs.checked_sub(1).ok_or(ParseError::BadValue)?;
        let ids = match ctxt.read_u8()? {
            0 => ctxt.read_array::<U16Be>(n_glyphs)?.to_vec(),
            1 => read_range_ids::<u8>(ctxt, n_glyphs)?,
            2 => read_range_ids::<u16>(ctxt, n_glyphs)?,
            _ => return Err(ParseError::BadValue),
        };
        Ok(CustomCharset { ids })
    }
}

fn read_range_ids<N>(ctxt: &mut ReadCtxt<'_>, n_glyphs: usize) -> Result<Vec<u16>, ParseError>
where
    N: Copy,
    u16: From<N>,
    Range<SID, N>: ReadFixed<HostType = Range<SID, N>>,
{
    let mut ids = Vec::with_capacity(n_glyphs);
    while ids.len() < n_glyphs {
        let range = ctxt.read::<Range<SID, N>>()?;
        ids.extend(range.iter()?);
    }
    // The last range may cover more glyphs than the font has
    ids.truncate(n_glyphs);
    Ok(ids)
}

impl WriteBinary<&Self> for CustomCharset {
    type Output = ();

    /// Write the charset in whichever of formats 0, 1 and 2 is smallest.
    fn write<C: WriteContext>(ctxt: &mut C, charset: &Self) -> Result<(), WriteError> {
        let format1 = charset.ranges(usize::from(u8::MAX));
        let format2 = charset.ranges(usize::from(u16::MAX));
        let sizes = [
            charset.ids.len() * 2,
            format1.len() * 3,
            format2.len() * 4,
        ];
        let format = sizes.iter().position_min().unwrap_or(0);

        match format {
            0 => {
                U8::write(ctxt, 0)?; // format
                ctxt.write_iter::<U16Be, _>(charset.ids.iter().copied())?;
            }
            1 => {
                U8::write(ctxt, 1)?; // format
                for (first, n_left) in format1 {
                    let n_left = u8::try_from(n_left)?;
                    Range::<SID, u8>::write(ctxt, Range { first, n_left })?;
                }
            }
            _ => {
                U8::write(ctxt, 2)?; // format
                for (first, n_left) in format2 {
                    let n_left = u16::try_from(n_left)?;
                    Range::<SID, u16>::write(ctxt, Range { first, n_left })?;
                }
            }
        }

        Ok(())
    }
}

impl CustomCharset {
    pub fn new(ids: Vec<u16>) -> Self {
        CustomCharset { ids }
    }

    /// Iterate the ids of all glyphs, including `.notdef`.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        std::iter::once(0).chain(self.ids.iter().copied())
    }

    pub fn id_for_glyph(&self, glyph_id: u16) -> Option<u16> {
        match glyph_id {
            // glyph id 0 is .notdef and is implicitly encoded
            0 => Some(0),
            _ => self.ids.get(usize::from(glyph_id) - 1).copied(),
        }
    }

    pub fn sid_to_gid(&self, sid: SID) -> Option<u16> {
        self.ids
            .iter()
            .position(|&id| id == sid)
            .and_then(|index| u16::try_from(index + 1).ok())
    }

    /// The largest id in the charset, 0 if only `.notdef` is present.
    pub fn max_id(&self) -> u16 {
        self.ids.iter().copied().max().unwrap_or(0)
    }

    /// Number of glyphs covered, including `.notdef`.
    pub fn len(&self) -> usize {
        self.ids.len() + 1
    }

    pub fn push(&mut self, id: u16) {
        self.ids.push(id);
    }

    /// Runs of consecutive ids as `(first, n_left)`, with `n_left` capped at `max_n_left`.
    fn ranges(&self, max_n_left: usize) -> Vec<(u16, usize)> {
        let mut ranges: Vec<(u16, usize)> = Vec::new();
        for &id in &self.ids {
            match ranges.last_mut() {
                Some((first, n_left))
                    if *n_left < max_n_left
                        && usize::from(*first) + *n_left + 1 == usize::from(id) =>
                {
                    *n_left += 1
                }
                _ => ranges.push((id, 0)),
            }
        }
        ranges
    }
}

impl ReadBinaryDep for FDSelect {
    type Args<'a> = usize;
    type HostType<'a> = Self;

    fn read_dep(ctxt: &mut ReadCtxt<'_>, n_glyphs: usize) -> Result<Self, ParseError> {
        match ctxt.read_u8()? {
            0 => {
                let glyph_font_dict_indices = ctxt.read_array::<U8>(n_glyphs)?.to_vec();
                Ok(FDSelect {
                    glyph_font_dict_indices,
                })
            }
            3 => {
                let nranges = usize::from(ctxt.read_u16be()?);
                let ranges = ctxt.read_array::<(U16Be, U8)>(nranges)?;
                let sentinel = ctxt.read_u16be()?;
                ctxt.check(usize::from(sentinel) >= n_glyphs)?;

                let mut glyph_font_dict_indices = Vec::with_capacity(n_glyphs);
                let starts = ranges
                    .iter()
                    .map(|(first, fd_index)| (first, Some(fd_index)))
                    .chain(std::iter::once((sentinel, None)));
                for ((first, fd_index), (next, _)) in starts.tuple_windows() {
                    // The first range must start at glyph 0 and ranges must be in order
                    ctxt.check(usize::from(first) == glyph_font_dict_indices.len())?;
                    ctxt.check(first < next)?;
                    let fd_index = fd_index.ok_or(ParseError::BadValue)?;
                    glyph_font_dict_indices.extend((first..next).map(|_| fd_index));
                }
                glyph_font_dict_indices.truncate(n_glyphs);
                ctxt.check(glyph_font_dict_indices.len() == n_glyphs)?;

                Ok(FDSelect {
                    glyph_font_dict_indices,
                })
            }
            // Formats 1 and 2 are not defined
            _ => Err(ParseError::BadValue),
        }
    }
}

impl WriteBinary<&Self> for FDSelect {
    type Output = ();

    /// Write the FDSelect as format 3 when that is smaller than format 0.
    fn write<C: WriteContext>(ctxt: &mut C, fd_select: &Self) -> Result<(), WriteError> {
        let ranges = fd_select.ranges();
        let format0_size = fd_select.glyph_font_dict_indices.len();
        let format3_size = 2 + ranges.len() * 3 + 2;

        if format3_size < format0_size {
            U8::write(ctxt, 3)?; // format
            U16Be::write(ctxt, u16::try_from(ranges.len())?)?;
            for (first, fd_index) in ranges {
                U16Be::write(ctxt, u16::try_from(first)?)?;
                U8::write(ctxt, fd_index)?;
            }
            U16Be::write(ctxt, u16::try_from(fd_select.len())?)?; // sentinel
        } else {
            U8::write(ctxt, 0)?; // format
            ctxt.write_bytes(&fd_select.glyph_font_dict_indices)?;
        }

        Ok(())
    }
}

impl FDSelect {
    pub fn new(glyph_font_dict_indices: Vec<u8>) -> Self {
        FDSelect {
            glyph_font_dict_indices,
        }
    }

    /// Returns the index of the Font DICT for the supplied `glyph_id`
    pub fn font_dict_index(&self, glyph_id: u16) -> Option<u8> {
        self.glyph_font_dict_indices
            .get(usize::from(glyph_id))
            .copied()
    }

    /// Number of glyphs covered.
    pub fn len(&self) -> usize {
        self.glyph_font_dict_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyph_font_dict_indices.is_empty()
    }

    pub fn push(&mut self, fd_index: u8) {
        self.glyph_font_dict_indices.push(fd_index);
    }

    // (first glyph, Font DICT index) of each run of glyphs sharing a Font DICT
    fn ranges(&self) -> Vec<(usize, u8)> {
        self.glyph_font_dict_indices
            .iter()
            .enumerate()
            .dedup_by(|(_, a), (_, b)| a == b)
            .map(|(first, &fd_index)| (first, fd_index))
            .collect()
    }
}

impl DictDefault for TopDictDefault {
    fn default(op: Operator) -> Option<&'static [Operand]> {
        match op {
            Operator::IsFixedPitch => Some(&OPERAND_ZERO),
            Operator::ItalicAngle => Some(&OPERAND_ZERO),
            Operator::UnderlinePosition => Some(&DEFAULT_UNDERLINE_POSITION),
            Operator::UnderlineThickness => Some(&DEFAULT_UNDERLINE_THICKNESS),
            Operator::PaintType => Some(&OPERAND_ZERO),
            Operator::CharstringType => Some(&DEFAULT_CHARSTRING_TYPE),
            Operator::FontMatrix => Some(DEFAULT_FONT_MATRIX.as_ref()),
            Operator::FontBBox => Some(&DEFAULT_BBOX),
            Operator::StrokeWidth => Some(&OPERAND_ZERO),
            Operator::Charset => Some(&OFFSET_ZERO),
            Operator::Encoding => Some(&OFFSET_ZERO),
            Operator::CIDFontVersion => Some(&OPERAND_ZERO),
            Operator::CIDFontRevision => Some(&OPERAND_ZERO),
            Operator::CIDFontType => Some(&OPERAND_ZERO),
            Operator::CIDCount => Some(&DEFAULT_CID_COUNT_OPERAND),
            _ => None,
        }
    }
}

impl DictDefault for FontDictDefault {
    fn default(_op: Operator) -> Option<&'static [Operand]> {
        None
    }
}

impl DictDefault for PrivateDictDefault {
    fn default(op: Operator) -> Option<&'static [Operand]> {
        match op {
            Operator::BlueScale => Some(DEFAULT_BLUE_SCALE.as_ref()),
            Operator::BlueShift => Some(&DEFAULT_BLUE_SHIFT),
            Operator::BlueFuzz => Some(&DEFAULT_BLUE_FUZZ),
            Operator::ForceBold => Some(&OPERAND_ZERO),
            Operator::LanguageGroup => Some(&OPERAND_ZERO),
            Operator::ExpansionFactor => Some(DEFAULT_EXPANSION_FACTOR.as_ref()),
            Operator::InitialRandomSeed => Some(&OPERAND_ZERO),
            Operator::StrokeWidth => Some(&OPERAND_ZERO),
            Operator::DefaultWidthX => Some(&OPERAND_ZERO),
            Operator::NominalWidthX => Some(&OPERAND_ZERO),
            _ => None,
        }
    }
}

impl<T> Default for Dict<T>
where
    T: DictDefault,
{
    fn default() -> Self {
        Dict {
            dict: Vec::new(),
            default: PhantomData,
        }
    }
}

impl<T> Dict<T>
where
    T: DictDefault,
{
    pub fn new() -> Self {
        Dict::default()
    }

    pub fn get_with_default(&self, key: Operator) -> Option<&[Operand]> {
        self.get(key).or_else(|| T::default(key))
    }

    pub fn get(&self, key: Operator) -> Option<&[Operand]> {
        self.dict.iter().find_map(|(op, args)| {
            if *op == key {
                Some(args.as_slice())
            } else {
                None
            }
        })
    }

    /// Returns the i32 value of this operator if the operands hold a single Integer.
    pub fn get_i32(&self, key: Operator) -> Option<Result<i32, ParseError>> {
        self.get_with_default(key).map(|operands| match operands {
            [Operand::Integer(number)] => Ok(*number),
            [Operand::Offset(number)] => Ok(*number),
            _ => Err(ParseError::BadValue),
        })
    }

    /// Returns the value of this operator if the operands hold a single number, real or integer.
    pub fn get_f64(&self, key: Operator) -> Option<Result<f64, ParseError>> {
        self.get_with_default(key).map(|operands| match operands {
            [Operand::Integer(number)] | [Operand::Offset(number)] => Ok(f64::from(*number)),
            [Operand::Real(real)] => f64::try_from(real),
            _ => Err(ParseError::BadValue),
        })
    }

    /// Set the operands of `key`, adding it to the end of the DICT if not already present.
    pub fn set(&mut self, key: Operator, operands: Vec<Operand>) {
        match self.dict.iter_mut().find(|(op, _)| *op == key) {
            Some((_, existing)) => *existing = operands,
            None => self.dict.push((key, operands)),
        }
    }

    pub fn remove(&mut self, operator: Operator) {
        self.dict.retain(|(op, _)| *op != operator);
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Operator, Vec<Operand>)> {
        self.dict.iter()
    }

    /// Read a PrivateDict from this Dict returning it and its offset within `scope` on success.
    ///
    /// A Private DICT is required, but may be specified as having a length of 0 if there are no
    /// non-default values to be stored.
    pub fn read_private_dict(
        &self,
        scope: &ReadScope<'_>,
    ) -> Result<(PrivateDict, usize), ParseError> {
        let (private_dict_offset, private_dict_length) =
            match self.get_with_default(Operator::Private) {
                Some([Operand::Offset(length), Operand::Offset(offset)]) => {
                    Ok((usize::try_from(*offset)?, usize::try_from(*length)?))
                }
                Some(_) => Err(ParseError::BadValue),
                None => Err(ParseError::MissingValue),
            }?;
        scope
            .offset_length(private_dict_offset, private_dict_length)?
            .read::<PrivateDict>()
            .map(|dict| (dict, private_dict_offset))
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }
}

impl DictDelta {
    pub fn new() -> Self {
        DictDelta::default()
    }

    pub fn get(&self, key: Operator) -> Option<&[Operand]> {
        self.dict
            .iter()
            .find(|(op, _)| *op == key)
            .map(|(_, args)| args.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Operator, Vec<Operand>)> {
        self.dict.iter()
    }

    /// Push `operator` on this Dict as an Offset Operand
    pub fn push_offset(&mut self, operator: Operator, offset: i32) {
        self.dict.push((operator, vec![Operand::Offset(offset)]))
    }

    /// Push the length and offset operands of the `Private` operator
    pub fn push_private(&mut self, length: usize, offset: usize) -> Result<(), WriteError> {
        self.dict.push((
            Operator::Private,
            vec![
                Operand::Offset(i32::try_from(length)?),
                Operand::Offset(i32::try_from(offset)?),
            ],
        ));
        Ok(())
    }
}

impl TryFrom<u16> for Operator {
    type Error = ParseError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (value & 0xFF00) == (12 << 8) {
            match value & 0xFF {
                0 => Ok(Operator::Copyright),
                1 => Ok(Operator::IsFixedPitch),
                2 => Ok(Operator::ItalicAngle),
                3 => Ok(Operator::UnderlinePosition),
                4 => Ok(Operator::UnderlineThickness),
                5 => Ok(Operator::PaintType),
                6 => Ok(Operator::CharstringType),
                7 => Ok(Operator::FontMatrix),
                8 => Ok(Operator::StrokeWidth),
                9 => Ok(Operator::BlueScale),
                10 => Ok(Operator::BlueShift),
                11 => Ok(Operator::BlueFuzz),
                12 => Ok(Operator::StemSnapH),
                13 => Ok(Operator::StemSnapV),
                14 => Ok(Operator::ForceBold),
                17 => Ok(Operator::LanguageGroup),
                18 => Ok(Operator::ExpansionFactor),
                19 => Ok(Operator::InitialRandomSeed),
                20 => Ok(Operator::SyntheticBase),
                21 => Ok(Operator::PostScript),
                22 => Ok(Operator::BaseFontName),
                23 => Ok(Operator::BaseFontBlend),
                30 => Ok(Operator::ROS),
                31 => Ok(Operator::CIDFontVersion),
                32 => Ok(Operator::CIDFontRevision),
                33 => Ok(Operator::CIDFontType),
                34 => Ok(Operator::CIDCount),
                35 => Ok(Operator::UIDBase),
                36 => Ok(Operator::FDArray),
                37 => Ok(Operator::FDSelect),
                38 => Ok(Operator::FontName),
                _ => Err(ParseError::BadValue),
            }
        } else {
            match value {
                0 => Ok(Operator::Version),
                1 => Ok(Operator::Notice),
                2 => Ok(Operator::FullName),
                3 => Ok(Operator::FamilyName),
                4 => Ok(Operator::Weight),
                5 => Ok(Operator::FontBBox),
                6 => Ok(Operator::BlueValues),
                7 => Ok(Operator::OtherBlues),
                8 => Ok(Operator::FamilyBlues),
                9 => Ok(Operator::FamilyOtherBlues),
                10 => Ok(Operator::StdHW),
                11 => Ok(Operator::StdVW),
                13 => Ok(Operator::UniqueID),
                14 => Ok(Operator::XUID),
                15 => Ok(Operator::Charset),
                16 => Ok(Operator::Encoding),
                17 => Ok(Operator::CharStrings),
                18 => Ok(Operator::Private),
                19 => Ok(Operator::Subrs),
                20 => Ok(Operator::DefaultWidthX),
                21 => Ok(Operator::NominalWidthX),
                _ => Err(ParseError::BadValue),
            }
        }
    }
}

impl Font {
    pub fn is_cid_keyed(&self) -> bool {
        match self.data {
            CFFVariant::CID(_) => true,
            CFFVariant::Type1(_) => false,
        }
    }

    pub fn num_glyphs(&self) -> usize {
        self.char_strings_index.len()
    }

    /// The Private DICT and local subroutines that apply to `glyph_id`.
    pub fn private_dict(&self, glyph_id: u16) -> Option<(&PrivateDict, Option<&Index>)> {
        match &self.data {
            CFFVariant::Type1(type1) => Some((&type1.private_dict, type1.local_subr_index.as_ref())),
            CFFVariant::CID(cid) => {
                let fd_index = usize::from(cid.fd_select.font_dict_index(glyph_id)?);
                let private_dict = cid.private_dicts.get(fd_index)?;
                let local_subr_index = cid.local_subr_indices.get(fd_index)?.as_ref();
                Some((private_dict, local_subr_index))
            }
        }
    }

    /// The CIDCount of a CID-keyed font.
    pub fn cid_count(&self) -> Result<i32, ParseError> {
        self.top_dict
            .get_i32(Operator::CIDCount)
            .unwrap_or(Ok(DEFAULT_CID_COUNT))
    }

    // The offsets written to the Top DICT. Which operators are present only depends on the
    // font, never on the offset values.
    fn top_dict_delta(&self, offsets: &FontOffsets) -> Result<DictDelta, WriteError> {
        let mut delta = DictDelta::new();
        delta.push_offset(Operator::CharStrings, i32::try_from(offsets.char_strings)?);
        delta.push_offset(Operator::Charset, offsets.charset);
        match &self.data {
            CFFVariant::CID(_) => {
                delta.push_offset(Operator::FDArray, i32::try_from(offsets.font_dict_index)?);
                delta.push_offset(Operator::FDSelect, i32::try_from(offsets.fd_select)?);
            }
            CFFVariant::Type1(type1) => {
                if let Encoding::Custom(_) = type1.encoding {
                    let offset = offsets.encoding.unwrap_or_default();
                    delta.push_offset(Operator::Encoding, i32::try_from(offset)?);
                }
                let (length, offset) = offsets.private_dict.unwrap_or_default();
                delta.push_private(length, offset)?;
            }
        }
        Ok(delta)
    }
}

fn read_cid_data(
    scope: &ReadScope<'_>,
    top_dict: &TopDict,
    n_glyphs: usize,
) -> Result<CIDData, ParseError> {
    // The Top DICT begins with ROS operator
    // which specifies the Registry-Ordering-Supplement for the font.
    // This will indicate to a CFF parser that special CID processing
    // should be applied to this font. Specifically:
    //
    // • The FDArray operator is expected to be present, with a single
    //   argument specifying an offset to the Font DICT INDEX. Each
    //   Font DICT in this array specifies information unique to a
    //   particular group of glyphs in the font.
    let offset = top_dict
        .get_i32(Operator::FDArray)
        .ok_or(ParseError::MissingValue)??;
    let font_dict_index = scope.offset(usize::try_from(offset)?).read::<Index>()?;

    let offset = top_dict
        .get_i32(Operator::FDSelect)
        .ok_or(ParseError::MissingValue)??;
    let fd_select = scope
        .offset(usize::try_from(offset)?)
        .read_dep::<FDSelect>(n_glyphs)?;

    let mut font_dicts = Vec::with_capacity(font_dict_index.len());
    let mut private_dicts = Vec::with_capacity(font_dict_index.len());
    let mut local_subr_indices = Vec::with_capacity(font_dict_index.len());
    for object in font_dict_index.iter() {
        let font_dict = ReadScope::new(object).read::<FontDict>()?;
        let (private_dict, private_dict_offset) = font_dict.read_private_dict(scope)?;
        let local_subr_index = read_local_subr_index(scope, &private_dict, private_dict_offset)?;

        font_dicts.push(font_dict);
        private_dicts.push(private_dict);
        local_subr_indices.push(local_subr_index);
    }

    // Every glyph must select an existing Font DICT
    let all_valid = fd_select
        .glyph_font_dict_indices
        .iter()
        .all(|&fd_index| usize::from(fd_index) < font_dicts.len());
    if !all_valid {
        return Err(ParseError::BadIndex);
    }

    Ok(CIDData {
        font_dicts,
        private_dicts,
        local_subr_indices,
        fd_select,
    })
}

impl WriteBinary<&Self> for CIDData {
    /// Offsets of the Font DICT INDEX and FDSelect
    type Output = (usize, usize);

    fn write<C: WriteContext>(ctxt: &mut C, data: &Self) -> Result<Self::Output, WriteError> {
        // Private DICTs and Local subroutines
        let mut private_dict_offset_lengths = Vec::with_capacity(data.private_dicts.len());
        for (private_dict, local_subr_index) in data
            .private_dicts
            .iter()
            .zip(data.local_subr_indices.iter())
        {
            let offset = ctxt.bytes_written();
            let written_length =
                write_private_dict_and_local_subr_index(ctxt, private_dict, local_subr_index)?;
            private_dict_offset_lengths.push((offset, written_length));
        }

        // Font DICT INDEX
        let mut font_dicts = Vec::with_capacity(data.font_dicts.len());
        for (font_dict, (offset, length)) in data
            .font_dicts
            .iter()
            .zip(private_dict_offset_lengths.into_iter())
        {
            let mut font_dict_delta = DictDelta::new();
            font_dict_delta.push_private(length, offset)?;

            let mut font_dict_data = WriteBuffer::new();
            FontDict::write_dep(&mut font_dict_data, font_dict, font_dict_delta)?;
            font_dicts.push(font_dict_data.into_inner());
        }
        let font_dict_index_offset = ctxt.bytes_written();
        Index::write(ctxt, &Index::from(font_dicts))?;

        let fd_select_offset = ctxt.bytes_written();
        FDSelect::write(ctxt, &data.fd_select)?;

        Ok((font_dict_index_offset, fd_select_offset))
    }
}

impl WriteBinary<&Self> for Type1Data {
    /// The (length, offset) of the Private DICT and the offset of the custom encoding if any
    type Output = ((usize, usize), Option<usize>);

    fn write<C: WriteContext>(ctxt: &mut C, data: &Self) -> Result<Self::Output, WriteError> {
        let private_dict_offset = ctxt.bytes_written();
        let private_dict_length = write_private_dict_and_local_subr_index(
            ctxt,
            &data.private_dict,
            &data.local_subr_index,
        )?;

        let custom_encoding = match &data.encoding {
            Encoding::Custom(custom_encoding) => {
                let offset = ctxt.bytes_written();
                CustomEncoding::write(ctxt, custom_encoding)?;
                Some(offset)
            }
            Encoding::Standard | Encoding::Expert => None,
        };

        Ok(((private_dict_length, private_dict_offset), custom_encoding))
    }
}

/// Write the Private DICT and local subrs if present, returns the length of the Private DICT
fn write_private_dict_and_local_subr_index<C: WriteContext>(
    ctxt: &mut C,
    private_dict: &PrivateDict,
    local_subr_index: &Option<Index>,
) -> Result<usize, WriteError> {
    let mut private_dict = private_dict.clone();
    private_dict.remove(Operator::Subrs);

    // Determine how big the Private DICT will be. The Subrs offset is always 5 bytes.
    let mut private_dict_delta = DictDelta::new();
    if local_subr_index.is_some() {
        private_dict_delta.push_offset(Operator::Subrs, 0);
    }
    let private_dict_length = PrivateDict::write_dep(
        &mut WriteCounter::new(),
        &private_dict,
        private_dict_delta,
    )?;

    // Write Private DICT with updated offset to Local subroutines if present
    let mut private_dict_delta = DictDelta::new();
    if local_subr_index.is_some() {
        // This offset is relative to the start of the Private DICT
        private_dict_delta.push_offset(Operator::Subrs, i32::try_from(private_dict_length)?);
    }
    let written_length = PrivateDict::write_dep(ctxt, &private_dict, private_dict_delta)?;
    if written_length != private_dict_length {
        return Err(WriteError::PlaceholderMismatch);
    }

    if let Some(local_subr_index) = local_subr_index {
        Index::write(ctxt, local_subr_index)?;
    }

    Ok(written_length)
}

fn read_encoding(scope: &ReadScope<'_>, top_dict: &TopDict) -> Result<Encoding, ParseError> {
    let offset = top_dict
        .get_i32(Operator::Encoding)
        .ok_or(ParseError::MissingValue)??;
    let encoding = match offset {
        0 => Encoding::Standard,
        1 => Encoding::Expert,
        _ => Encoding::Custom(
            scope
                .offset(usize::try_from(offset)?)
                .read::<CustomEncoding>()?,
        ),
    };

    Ok(encoding)
}

fn read_charset(
    scope: &ReadScope<'_>,
    top_dict: &TopDict,
    char_strings_count: usize,
) -> Result<Charset, ParseError> {
    let offset = top_dict
        .get_i32(Operator::Charset)
        .ok_or(ParseError::MissingValue)??;
    let charset = match offset {
        0 => Charset::ISOAdobe,
        1 => Charset::Expert,
        2 => Charset::ExpertSubset,
        _ => Charset::Custom(
            scope
                .offset(usize::try_from(offset)?)
                .read_dep::<CustomCharset>(char_strings_count)?,
        ),
    };

    Ok(charset)
}

fn read_local_subr_index(
    scope: &ReadScope<'_>,
    private_dict: &PrivateDict,
    private_dict_offset: usize,
) -> Result<Option<Index>, ParseError> {
    // Local subrs are stored in an INDEX structure which is located via the offset operand
    // of the Subrs operator in the Private DICT. A font without local subrs has no Subrs
    // operator in the Private DICT. The local subrs offset is relative to the beginning of
    // the Private DICT data.
    private_dict
        .get_i32(Operator::Subrs)
        .transpose()?
        .map(|offset| {
            let offset = usize::try_from(offset)?;
            scope.offset(private_dict_offset + offset).read::<Index>()
        })
        .transpose()
}

/// Serialise the offsets using an optimal `off_size`, returning that and the serialised data.
fn serialise_offset_array(offsets: Vec<usize>) -> Result<(u8, Vec<u8>), WriteError> {
    let Some(&last) = offsets.last() else {
        return Ok((1, Vec::new()));
    };

    let off_size = offset_size(last).ok_or(WriteError::BadValue)?;
    let mut offset_array = WriteBuffer::new();
    match off_size {
        1 => offset_array.write_iter::<U8, _>(
            offsets
                .into_iter()
                .map(u8::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        )?,
        2 => offset_array.write_iter::<U16Be, _>(
            offsets
                .into_iter()
                .map(u16::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        )?,
        3 | 4 => {
            let offsets = offsets
                .into_iter()
                .map(u32::try_from)
                .collect::<Result<Vec<_>, _>>()?;
            if off_size == 3 {
                offset_array.write_iter::<U24Be, _>(offsets)?
            } else {
                offset_array.write_iter::<U32Be, _>(offsets)?
            }
        }
        _ => return Err(WriteError::BadValue),
    }

    Ok((off_size, offset_array.into_inner()))
}

/// The 391 predefined strings, addressed by SID.
pub(crate) const STANDARD_STRINGS: [&str; 391] = [
    ".notdef", "space", "exclam", "quotedbl", "numbersign", "dollar", "percent", "ampersand",
    "quoteright", "parenleft", "parenright", "asterisk", "plus", "comma", "hyphen", "period",
    "slash", "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
    "colon", "semicolon", "less", "equal", "greater", "question", "at", "A", "B", "C", "D", "E",
    "F", "G", "H", "I", "J", "K", "L", "M", "N", "O", "P", "Q", "R", "S", "T", "U", "V", "W",
    "X", "Y", "Z", "bracketleft", "backslash", "bracketright", "asciicircum", "underscore",
    "quoteleft", "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p",
    "q", "r", "s", "t", "u", "v", "w", "x", "y", "z", "braceleft", "bar", "braceright",
    "asciitilde", "exclamdown", "cent", "sterling", "fraction", "yen", "florin", "section",
    "currency", "quotesingle", "quotedblleft", "guillemotleft", "guilsinglleft",
    "guilsinglright", "fi", "fl", "endash", "dagger", "daggerdbl", "periodcentered",
    "paragraph", "bullet", "quotesinglbase", "quotedblbase", "quotedblright", "guillemotright",
    "ellipsis", "perthousand", "questiondown", "grave", "acute", "circumflex", "tilde",
    "macron", "breve", "dotaccent", "dieresis", "ring", "cedilla", "hungarumlaut", "ogonek",
    "caron", "emdash", "AE", "ordfeminine", "Lslash", "Oslash", "OE", "ordmasculine", "ae",
    "dotlessi", "lslash", "oslash", "oe", "germandbls", "onesuperior", "logicalnot", "mu",
    "trademark", "Eth", "onehalf", "plusminus", "Thorn", "onequarter", "divide", "brokenbar",
    "degree", "thorn", "threequarters", "twosuperior", "registered", "minus", "eth", "multiply",
    "threesuperior", "copyright", "Aacute", "Acircumflex", "Adieresis", "Agrave", "Aring",
    "Atilde", "Ccedilla", "Eacute", "Ecircumflex", "Edieresis", "Egrave", "Iacute",
    "Icircumflex", "Idieresis", "Igrave", "Ntilde", "Oacute", "Ocircumflex", "Odieresis",
    "Ograve", "Otilde", "Scaron", "Uacute", "Ucircumflex", "Udieresis", "Ugrave", "Yacute",
    "Ydieresis", "Zcaron", "aacute", "acircumflex", "adieresis", "agrave", "aring", "atilde",
    "ccedilla", "eacute", "ecircumflex", "edieresis", "egrave", "iacute", "icircumflex",
    "idieresis", "igrave", "ntilde", "oacute", "ocircumflex", "odieresis", "ograve", "otilde",
    "scaron", "uacute", "ucircumflex", "udieresis", "ugrave", "yacute", "ydieresis", "zcaron",
    "exclamsmall", "Hungarumlautsmall", "dollaroldstyle", "dollarsuperior", "ampersandsmall",
    "Acutesmall", "parenleftsuperior", "parenrightsuperior", "twodotenleader", "onedotenleader",
    "zerooldstyle", "oneoldstyle", "twooldstyle", "threeoldstyle", "fouroldstyle",
    "fiveoldstyle", "sixoldstyle", "sevenoldstyle", "eightoldstyle", "nineoldstyle",
    "commasuperior", "threequartersemdash", "periodsuperior", "questionsmall", "asuperior",
    "bsuperior", "centsuperior", "dsuperior", "esuperior", "isuperior", "lsuperior",
    "msuperior", "nsuperior", "osuperior", "rsuperior", "ssuperior", "tsuperior", "ff", "ffi",
    "ffl", "parenleftinferior", "parenrightinferior", "Circumflexsmall", "hyphensuperior",
    "Gravesmall", "Asmall", "Bsmall", "Csmall", "Dsmall", "Esmall", "Fsmall", "Gsmall",
    "Hsmall", "Ismall", "Jsmall", "Ksmall", "Lsmall", "Msmall", "Nsmall", "Osmall", "Psmall",
    "Qsmall", "Rsmall", "Ssmall", "Tsmall", "Usmall", "Vsmall", "Wsmall", "Xsmall", "Ysmall",
    "Zsmall", "colonmonetary", "onefitted", "rupiah", "Tildesmall", "exclamdownsmall",
    "centoldstyle", "Lslashsmall", "Scaronsmall", "Zcaronsmall", "Dieresissmall", "Brevesmall",
    "Caronsmall", "Dotaccentsmall", "Macronsmall", "figuredash", "hypheninferior",
    "Ogoneksmall", "Ringsmall", "Cedillasmall", "questiondownsmall", "oneeighth",
    "threeeighths", "fiveeighths", "seveneighths", "onethird", "twothirds", "zerosuperior",
    "foursuperior", "fivesuperior", "sixsuperior", "sevensuperior", "eightsuperior",
    "ninesuperior", "zeroinferior", "oneinferior", "twoinferior", "threeinferior",
    "fourinferior", "fiveinferior", "sixinferior", "seveninferior", "eightinferior",
    "nineinferior", "centinferior", "dollarinferior", "periodinferior", "commainferior",
    "Agravesmall", "Aacutesmall", "Acircumflexsmall", "Atildesmall", "Adieresissmall",
    "Aringsmall", "AEsmall", "Ccedillasmall", "Egravesmall", "Eacutesmall", "Ecircumflexsmall",
    "Edieresissmall", "Igravesmall", "Iacutesmall", "Icircumflexsmall", "Idieresissmall",
    "Ethsmall", "Ntildesmall", "Ogravesmall", "Oacutesmall", "Ocircumflexsmall", "Otildesmall",
    "Odieresissmall", "OEsmall", "Oslashsmall", "Ugravesmall", "Uacutesmall",
    "Ucircumflexsmall", "Udieresissmall", "Yacutesmall", "Thornsmall", "Ydieresissmall",
    "001.000", "001.001", "001.002", "001.003", "Black", "Bold", "Book", "Light", "Medium",
    "Regular", "Roman", "Semibold",
];

/// SIDs of the predefined Expert charset, indexed by glyph id.
const EXPERT_CHARSET: [u16; 166] = [
    0, 1, 229, 230, 231, 232, 233, 234, 235, 236, 237, 238, 13, 14, 15, 99, 239, 240, 241, 242,
    243, 244, 245, 246, 247, 248, 27, 28, 249, 250, 251, 252, 253, 254, 255, 256, 257, 258, 259,
    260, 261, 262, 263, 264, 265, 266, 109, 110, 267, 268, 269, 270, 271, 272, 273, 274, 275,
    276, 277, 278, 279, 280, 281, 282, 283, 284, 285, 286, 287, 288, 289, 290, 291, 292, 293,
    294, 295, 296, 297, 298, 299, 300, 301, 302, 303, 304, 305, 306, 307, 308, 309, 310, 311,
    312, 313, 314, 315, 316, 317, 318, 158, 155, 163, 319, 320, 321, 322, 323, 324, 325, 326,
    150, 164, 169, 327, 328, 329, 330, 331, 332, 333, 334, 335, 336, 337, 338, 339, 340, 341,
    342, 343, 344, 345, 346, 347, 348, 349, 350, 351, 352, 353, 354, 355, 356, 357, 358, 359,
    360, 361, 362, 363, 364, 365, 366, 367, 368, 369, 370, 371, 372, 373, 374, 375, 376, 377,
    378,
];

/// SIDs of the predefined ExpertSubset charset, indexed by glyph id.
const EXPERT_SUBSET_CHARSET: [u16; 87] = [
    0, 1, 231, 232, 235, 236, 237, 238, 13, 14, 15, 99, 239, 240, 241, 242, 243, 244, 245, 246,
    247, 248, 27, 28, 249, 250, 251, 253, 254, 255, 256, 257, 258, 259, 260, 261, 262, 263, 264,
    265, 266, 109, 110, 267, 268, 269, 270, 272, 300, 301, 302, 305, 314, 315, 158, 155, 163,
    320, 321, 322, 323, 324, 325, 326, 150, 164, 169, 327, 328, 329, 330, 331, 332, 333, 334,
    335, 336, 337, 338, 339, 340, 341, 342, 343, 344, 345, 346,
];
