//! Assembly of a single sfnt font file from its tables.

use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::num::Wrapping;

use crate::binary::long_align;
use crate::binary::write::{Placeholder, WriteBinary, WriteBinaryDep, WriteBuffer, WriteContext};
use crate::binary::{U16Be, U32Be};
use crate::checksum;
use crate::error::{ReadWriteError, WriteError};
use crate::tables::{HeadTable, TableRecord};
use crate::tag;

/// The value `head.checkSumAdjustment` is subtracted from.
const CHECKSUM_MAGIC: u32 = 0xB1B0AFBA;

pub struct FontBuilder {
    sfnt_version: u32,
    tables: BTreeMap<u32, WriteBuffer>,
}

pub struct FontBuilderWithHead {
    inner: FontBuilder,
    check_sum_adjustment: Placeholder<U32Be, u32>,
}

struct TaggedBuffer {
    tag: u32,
    buffer: WriteBuffer,
}

struct OrderedTables {
    tables: Vec<TaggedBuffer>,
    checksum: Wrapping<u32>,
}

impl FontBuilder {
    pub fn new(sfnt_version: u32) -> Self {
        FontBuilder {
            sfnt_version,
            tables: BTreeMap::new(),
        }
    }

    /// Write `table` and add it to the font as `tag`, replacing any table added before.
    pub fn add_table<HostType, T: WriteBinaryDep<HostType>>(
        &mut self,
        tag: u32,
        table: HostType,
        args: T::Args,
    ) -> Result<T::Output, ReadWriteError> {
        if tag == tag::HEAD {
            // head must go through add_head_table so its checksum can be filled in
            return Err(ReadWriteError::Write(WriteError::BadValue));
        }

        self.add_table_inner::<HostType, T>(tag, table, args)
    }

    /// Add a table whose bytes are copied verbatim.
    pub fn add_raw_table(&mut self, tag: u32, data: &[u8]) -> Result<(), ReadWriteError> {
        if tag == tag::HEAD {
            return Err(ReadWriteError::Write(WriteError::BadValue));
        }

        let mut buffer = WriteBuffer::new();
        buffer.write_bytes(data)?;
        self.tables.insert(tag, buffer);
        Ok(())
    }

    fn add_table_inner<HostType, T: WriteBinaryDep<HostType>>(
        &mut self,
        tag: u32,
        table: HostType,
        args: T::Args,
    ) -> Result<T::Output, ReadWriteError> {
        let mut buffer = WriteBuffer::new();
        let output = T::write_dep(&mut buffer, table, args)?;
        self.tables.insert(tag, buffer);

        Ok(output)
    }

    pub fn add_head_table(
        mut self,
        table: &HeadTable,
    ) -> Result<FontBuilderWithHead, ReadWriteError> {
        let placeholder = self.add_table_inner::<_, HeadTable>(tag::HEAD, table, ())?;

        Ok(FontBuilderWithHead {
            inner: self,
            check_sum_adjustment: placeholder,
        })
    }
}

impl FontBuilderWithHead {
    /// Add a table to the font, see `FontBuilder::add_table`.
    pub fn add_table<HostType, T: WriteBinaryDep<HostType>>(
        &mut self,
        tag: u32,
        table: HostType,
        args: T::Args,
    ) -> Result<T::Output, ReadWriteError> {
        self.inner.add_table::<HostType, T>(tag, table, args)
    }

    pub fn add_raw_table(&mut self, tag: u32, data: &[u8]) -> Result<(), ReadWriteError> {
        self.inner.add_raw_table(tag, data)
    }

    /// Returns a `Vec<u8>` containing the built font
    pub fn data(mut self) -> Result<Vec<u8>, ReadWriteError> {
        let mut font = WriteBuffer::new();

        self.write_offset_table(&mut font)?;
        let table_offset =
            long_align(self.inner.tables.len() * TableRecord::SIZE + font.bytes_written());

        // Add tables in tag order
        let mut ordered_tables = self.write_table_directory(&mut font)?;

        let length = font.bytes_written();
        let padded_length = long_align(length);
        if padded_length != table_offset {
            return Err(ReadWriteError::Write(WriteError::BadValue));
        }
        font.write_zeros(padded_length - length)?;

        // Fill in check_sum_adjustment in the head table
        let headers_checksum = checksum::table_checksum(font.bytes());
        let check_sum_adjustment =
            Wrapping(CHECKSUM_MAGIC) - (headers_checksum + ordered_tables.checksum);

        let mut placeholder = Some(self.check_sum_adjustment);
        for TaggedBuffer { tag, buffer } in ordered_tables.tables.iter_mut() {
            if *tag == tag::HEAD {
                if let Some(placeholder) = placeholder.take() {
                    buffer.write_placeholder(placeholder, check_sum_adjustment.0)?;
                }
            }
            font.write_bytes(buffer.bytes())?;
        }

        Ok(font.into_inner())
    }

    fn write_offset_table(&self, font: &mut WriteBuffer) -> Result<(), WriteError> {
        let num_tables = u16::try_from(self.inner.tables.len())?;
        let n = max_power_of_2(num_tables);
        let search_range = (1 << n) * 16;
        let entry_selector = n;
        let range_shift = num_tables
            .checked_mul(16)
            .and_then(|size| size.checked_sub(search_range))
            .ok_or(WriteError::BadValue)?;

        U32Be::write(font, self.inner.sfnt_version)?;
        U16Be::write(font, num_tables)?;
        U16Be::write(font, search_range)?;
        U16Be::write(font, entry_selector)?;
        U16Be::write(font, range_shift)?;

        Ok(())
    }

    fn write_table_directory(
        &mut self,
        font: &mut WriteBuffer,
    ) -> Result<OrderedTables, ReadWriteError> {
        let mut tables = Vec::with_capacity(self.inner.tables.len());
        let mut checksum = Wrapping(0);
        let mut table_offset =
            long_align(self.inner.tables.len() * TableRecord::SIZE + font.bytes_written());

        let tables_by_tag = std::mem::take(&mut self.inner.tables);
        for (tag, mut table) in tables_by_tag {
            let length = table.len();
            let padded_length = long_align(length);
            table.write_zeros(padded_length - length)?;

            let table_checksum = checksum::table_checksum(table.bytes());
            checksum += table_checksum;

            let record = TableRecord {
                table_tag: tag,
                checksum: table_checksum.0,
                offset: u32::try_from(table_offset).map_err(WriteError::from)?,
                length: u32::try_from(length).map_err(WriteError::from)?,
            };

            table_offset += padded_length;
            TableRecord::write(font, &record)?;
            tables.push(TaggedBuffer { tag, buffer: table });
        }

        Ok(OrderedTables { tables, checksum })
    }
}

/// Calculate the maximum power of 2 that is <= num
fn max_power_of_2(num: u16) -> u16 {
    15u16.saturating_sub(num.leading_zeros() as u16)
}
