//! Reading of the WOFF font format.
//!
//! Only the font data is read. Extended metadata and private data blocks are not part of the
//! sfnt and are dropped when the font is saved.

use flate2::bufread::ZlibDecoder;
use log::debug;

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::U32Be;
use crate::error::ParseError;
use crate::tables::FontTableProvider;

use std::borrow::Cow;
use std::io::Read;

/// The magic number identifying a WOFF file: 'wOFF'
pub const MAGIC: u32 = 0x774F4646;

#[derive(Clone)]
pub struct WoffFont<'a> {
    scope: ReadScope<'a>,
    header: WoffHeader,
    table_directory: ReadArray<'a, TableDirectoryEntry>,
}

#[derive(Clone, Debug)]
struct WoffHeader {
    flavor: u32,
    num_tables: u16,
    has_metadata: bool,
    has_private_data: bool,
}

#[derive(Debug, Copy, Clone)]
struct TableDirectoryEntry {
    tag: u32,
    offset: u32,
    comp_length: u32,
    orig_length: u32,
}

impl<'a> WoffFont<'a> {
    /// The "sfnt version" of the wrapped font
    pub fn flavor(&self) -> u32 {
        self.header.flavor
    }

    fn find_table_directory_entry(&self, tag: u32) -> Option<TableDirectoryEntry> {
        self.table_directory
            .iter()
            .find(|table_entry| table_entry.tag == tag)
    }
}

impl<'b> ReadBinary for WoffFont<'b> {
    type HostType<'a> = WoffFont<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        let header = ctxt.read::<WoffHeader>()?;
        if header.has_metadata || header.has_private_data {
            debug!("WOFF metadata and private data are not carried over");
        }
        let table_directory =
            ctxt.read_array::<TableDirectoryEntry>(usize::from(header.num_tables))?;
        Ok(WoffFont {
            scope,
            header,
            table_directory,
        })
    }
}

impl<'a> FontTableProvider for WoffFont<'a> {
    fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError> {
        self.find_table_directory_entry(tag)
            .map(|table_entry| table_entry.read_table(&self.scope))
            .transpose()
    }

    fn has_table(&self, tag: u32) -> bool {
        self.find_table_directory_entry(tag).is_some()
    }

    fn table_tags(&self) -> Vec<u32> {
        self.table_directory.iter().map(|entry| entry.tag).collect()
    }
}

impl ReadBinary for WoffHeader {
    type HostType<'a> = Self;

    fn read(ctxt: &mut ReadCtxt<'_>) -> Result<Self, ParseError> {
        match ctxt.read_u32be()? {
            MAGIC => {
                let flavor = ctxt.read_u32be()?;
                let _length = ctxt.read_u32be()?;
                let num_tables = ctxt.read_u16be()?;
                // A file with a non-zero reserved field must be rejected
                let reserved = ctxt.read_u16be()?;
                ctxt.check(reserved == 0)?;
                let _total_sfnt_size = ctxt.read_u32be()?;
                let _version = ctxt.read_u32be()?;
                let _meta_offset = ctxt.read_u32be()?;
                let meta_length = ctxt.read_u32be()?;
                let _meta_orig_length = ctxt.read_u32be()?;
                let _priv_offset = ctxt.read_u32be()?;
                let priv_length = ctxt.read_u32be()?;

                Ok(WoffHeader {
                    flavor,
                    num_tables,
                    has_metadata: meta_length != 0,
                    has_private_data: priv_length != 0,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl ReadFrom for TableDirectoryEntry {
    type ReadType = ((U32Be, U32Be, U32Be), (U32Be, U32Be));
    fn read_from(
        ((tag, offset, comp_length), (orig_length, _orig_checksum)): ((u32, u32, u32), (u32, u32)),
    ) -> Self {
        TableDirectoryEntry {
            tag,
            offset,
            comp_length,
            orig_length,
        }
    }
}

impl TableDirectoryEntry {
    fn is_compressed(&self) -> bool {
        self.comp_length != self.orig_length
    }

    /// Read and uncompress the contents of a table entry
    fn read_table<'a>(&self, scope: &ReadScope<'a>) -> Result<Cow<'a, [u8]>, ParseError> {
        let offset = usize::try_from(self.offset)?;
        let length = usize::try_from(self.comp_length)?;
        let table_data = scope.offset_length(offset, length)?;

        if !self.is_compressed() {
            return Ok(Cow::Borrowed(table_data.data()));
        }

        let mut uncompressed = Vec::new();
        ZlibDecoder::new(table_data.data())
            .read_to_end(&mut uncompressed)
            .map_err(|_err| ParseError::CompressionError)?;
        if uncompressed.len() != usize::try_from(self.orig_length)? {
            return Err(ParseError::CompressionError);
        }
        Ok(Cow::Owned(uncompressed))
    }
}
