#![allow(missing_docs)]

//! Parse binary data
//!
//! Reading is split between a `ReadScope`, an immutable window onto a byte slice that remembers
//! its absolute position in the font, and a `ReadCtxt`, a cursor over a scope. Types describe how
//! they are decoded by implementing one of the `Read*` traits below.

use crate::binary::{I16Be, I32Be, I64Be, U16Be, U24Be, U32Be, U8};
use crate::error::ParseError;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Copy, Clone)]
pub struct ReadEof {}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReadScope<'a> {
    data: &'a [u8],
}

#[derive(Clone)]
pub struct ReadCtxt<'a> {
    scope: ReadScope<'a>,
    offset: usize,
}

pub trait ReadBinary {
    type HostType<'a>: Sized; // default = Self

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError>;
}

pub trait ReadBinaryDep {
    type Args<'a>: Copy;
    type HostType<'a>: Sized; // default = Self

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        args: Self::Args<'a>,
    ) -> Result<Self::HostType<'a>, ParseError>;
}

/// A value that always occupies `SIZE` bytes and can be decoded from any `SIZE` byte slice.
pub trait ReadFixed {
    type HostType: Copy;

    const SIZE: usize;

    /// Decode a value from `bytes`, which is exactly `SIZE` bytes long.
    fn decode(bytes: &[u8]) -> Self::HostType;
}

/// Implemented by types that are read as a `ReadFixed` value and then converted.
pub trait ReadFrom {
    type ReadType: ReadFixed;
    fn read_from(value: <Self::ReadType as ReadFixed>::HostType) -> Self;
}

impl<T> ReadFixed for T
where
    T: ReadFrom + Copy,
{
    type HostType = T;

    const SIZE: usize = T::ReadType::SIZE;

    fn decode(bytes: &[u8]) -> T {
        T::read_from(T::ReadType::decode(bytes))
    }
}

impl<T> ReadBinary for T
where
    T: ReadFixed,
{
    type HostType<'a> = T::HostType;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let bytes = ctxt.read_slice(T::SIZE)?;
        Ok(T::decode(bytes))
    }
}

impl<T> ReadBinaryDep for T
where
    T: ReadBinary,
{
    type Args<'a> = ();
    type HostType<'a> = T::HostType<'a>;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (): Self::Args<'_>,
    ) -> Result<Self::HostType<'a>, ParseError> {
        T::read(ctxt)
    }
}

pub trait CheckIndex {
    fn check_index(&self, index: usize) -> Result<(), ParseError>;
}

/// A lazily decoded array of fixed size records.
#[derive(Clone)]
pub struct ReadArray<'a, T: ReadFixed> {
    scope: ReadScope<'a>,
    length: usize,
    phantom: PhantomData<T>,
}

pub struct ReadArrayIter<'a, T: ReadFixed> {
    scope: ReadScope<'a>,
    index: usize,
    length: usize,
    phantom: PhantomData<T>,
}

impl<'a> ReadScope<'a> {
    pub fn new(data: &'a [u8]) -> ReadScope<'a> {
        ReadScope { data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn offset(&self, offset: usize) -> ReadScope<'a> {
        let data = self.data.get(offset..).unwrap_or(&[]);
        ReadScope { data }
    }

    pub fn offset_length(&self, offset: usize, length: usize) -> Result<ReadScope<'a>, ParseError> {
        if offset < self.data.len() || length == 0 {
            let data = self.data.get(offset..).unwrap_or(&[]);
            match data.get(..length) {
                Some(data) => Ok(ReadScope { data }),
                None => Err(ParseError::BadEof),
            }
        } else {
            Err(ParseError::BadOffset)
        }
    }

    pub fn ctxt(&self) -> ReadCtxt<'a> {
        ReadCtxt::new(*self)
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&self) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read::<T>()
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        self.ctxt().read_dep::<T>(args)
    }
}

impl<'a> ReadCtxt<'a> {
    /// ReadCtxt is constructed by calling `ReadScope::ctxt`.
    fn new(scope: ReadScope<'a>) -> ReadCtxt<'a> {
        ReadCtxt { scope, offset: 0 }
    }

    pub fn check(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadValue),
        }
    }

    /// Check a condition, returning `ParseError::BadIndex` if `false`.
    pub fn check_index(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadIndex),
        }
    }

    /// Check a condition, returning `ParseError::BadVersion` if `false`.
    ///
    /// ```
    /// use fontgraft::binary::read::ReadScope;
    /// use fontgraft::error::ParseError;
    ///
    /// let scope = ReadScope::new(&[0, 2]);
    /// let mut ctxt = scope.ctxt();
    /// let major_version = ctxt.read_u16be().expect("unable to read version");
    ///
    /// assert!(ctxt.check_version(major_version == 2).is_ok());
    /// assert_eq!(ctxt.check_version(major_version == 1), Err(ParseError::BadVersion));
    /// ```
    pub fn check_version(&self, cond: bool) -> Result<(), ParseError> {
        match cond {
            true => Ok(()),
            false => Err(ParseError::BadVersion),
        }
    }

    pub fn scope(&self) -> ReadScope<'a> {
        self.scope.offset(self.offset)
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn read<T: ReadBinaryDep<Args<'a> = ()>>(&mut self) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, ())
    }

    pub fn read_dep<T: ReadBinaryDep>(
        &mut self,
        args: T::Args<'a>,
    ) -> Result<T::HostType<'a>, ParseError> {
        T::read_dep(self, args)
    }

    pub fn bytes_available(&self) -> bool {
        self.offset < self.scope.data.len()
    }

    fn read_fixed<T: ReadFixed>(&mut self) -> Result<T::HostType, ReadEof> {
        let bytes = self.read_slice(T::SIZE)?;
        Ok(T::decode(bytes))
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadEof> {
        self.read_fixed::<U8>()
    }

    pub fn read_u16be(&mut self) -> Result<u16, ReadEof> {
        self.read_fixed::<U16Be>()
    }

    pub fn read_i16be(&mut self) -> Result<i16, ReadEof> {
        self.read_fixed::<I16Be>()
    }

    pub fn read_u24be(&mut self) -> Result<u32, ReadEof> {
        self.read_fixed::<U24Be>()
    }

    pub fn read_u32be(&mut self) -> Result<u32, ReadEof> {
        self.read_fixed::<U32Be>()
    }

    pub fn read_i32be(&mut self) -> Result<i32, ReadEof> {
        self.read_fixed::<I32Be>()
    }

    pub fn read_array<T: ReadFixed>(&mut self, length: usize) -> Result<ReadArray<'a, T>, ParseError> {
        let byte_len = length.checked_mul(T::SIZE).ok_or(ParseError::LimitExceeded)?;
        let scope = self.read_scope(byte_len)?;
        Ok(ReadArray {
            scope,
            length,
            phantom: PhantomData,
        })
    }

    /// Read up to and including the byte holding the supplied nibble.
    pub fn read_until_nibble(&mut self, nibble: u8) -> Result<&'a [u8], ReadEof> {
        let rest = self.scope.data.get(self.offset..).unwrap_or(&[]);
        let end = rest
            .iter()
            .position(|&b| (b >> 4) == nibble || (b & 0xF) == nibble)
            .ok_or(ReadEof {})?;
        self.read_slice(end + 1)
    }

    pub fn read_scope(&mut self, length: usize) -> Result<ReadScope<'a>, ReadEof> {
        if let Ok(scope) = self.scope.offset_length(self.offset, length) {
            self.offset += length;
            Ok(scope)
        } else {
            Err(ReadEof {})
        }
    }

    pub fn read_slice(&mut self, length: usize) -> Result<&'a [u8], ReadEof> {
        let scope = self.read_scope(length)?;
        Ok(scope.data)
    }
}

impl<'a, T: ReadFixed> ReadArray<'a, T> {
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn get_item(&self, index: usize) -> Option<T::HostType> {
        if index < self.length {
            let start = index * T::SIZE;
            let bytes = self.scope.data.get(start..start + T::SIZE)?;
            Some(T::decode(bytes))
        } else {
            None
        }
    }

    pub fn read_item(&self, index: usize) -> Result<T::HostType, ParseError> {
        self.get_item(index).ok_or(ParseError::BadIndex)
    }

    pub fn last(&self) -> Option<T::HostType> {
        let index = self.length.checked_sub(1)?;
        self.get_item(index)
    }

    pub fn to_vec(&self) -> Vec<T::HostType> {
        self.iter().collect()
    }

    pub fn iter(&self) -> ReadArrayIter<'a, T> {
        ReadArrayIter {
            scope: self.scope,
            index: 0,
            length: self.length,
            phantom: PhantomData,
        }
    }
}

impl<'a, T: ReadFixed> CheckIndex for ReadArray<'a, T> {
    fn check_index(&self, index: usize) -> Result<(), ParseError> {
        if index < self.len() {
            Ok(())
        } else {
            Err(ParseError::BadIndex)
        }
    }
}

impl<T> CheckIndex for Vec<T> {
    fn check_index(&self, index: usize) -> Result<(), ParseError> {
        if index < self.len() {
            Ok(())
        } else {
            Err(ParseError::BadIndex)
        }
    }
}

impl<'a, 'b, T: ReadFixed> IntoIterator for &'b ReadArray<'a, T> {
    type Item = T::HostType;
    type IntoIter = ReadArrayIter<'a, T>;
    fn into_iter(self) -> ReadArrayIter<'a, T> {
        self.iter()
    }
}

impl<'a, T: ReadFixed> Iterator for ReadArrayIter<'a, T> {
    type Item = T::HostType;

    fn next(&mut self) -> Option<T::HostType> {
        if self.index >= self.length {
            return None;
        }
        let start = self.index * T::SIZE;
        let bytes = self.scope.data.get(start..start + T::SIZE)?;
        self.index += 1;
        Some(T::decode(bytes))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.length - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a, T: ReadFixed> ExactSizeIterator for ReadArrayIter<'a, T> {}

fn be_bytes<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0; N];
    buf.copy_from_slice(&bytes[..N]);
    buf
}

impl ReadFixed for U8 {
    type HostType = u8;

    const SIZE: usize = 1;

    fn decode(bytes: &[u8]) -> u8 {
        bytes[0]
    }
}

impl ReadFixed for U16Be {
    type HostType = u16;

    const SIZE: usize = 2;

    fn decode(bytes: &[u8]) -> u16 {
        u16::from_be_bytes(be_bytes(bytes))
    }
}

impl ReadFixed for I16Be {
    type HostType = i16;

    const SIZE: usize = 2;

    fn decode(bytes: &[u8]) -> i16 {
        i16::from_be_bytes(be_bytes(bytes))
    }
}

impl ReadFixed for U24Be {
    type HostType = u32;

    const SIZE: usize = 3;

    fn decode(bytes: &[u8]) -> u32 {
        (u32::from(bytes[0]) << 16) | (u32::from(bytes[1]) << 8) | u32::from(bytes[2])
    }
}

impl ReadFixed for U32Be {
    type HostType = u32;

    const SIZE: usize = 4;

    fn decode(bytes: &[u8]) -> u32 {
        u32::from_be_bytes(be_bytes(bytes))
    }
}

impl ReadFixed for I32Be {
    type HostType = i32;

    const SIZE: usize = 4;

    fn decode(bytes: &[u8]) -> i32 {
        i32::from_be_bytes(be_bytes(bytes))
    }
}

impl ReadFixed for I64Be {
    type HostType = i64;

    const SIZE: usize = 8;

    fn decode(bytes: &[u8]) -> i64 {
        i64::from_be_bytes(be_bytes(bytes))
    }
}

impl<T1, T2> ReadFixed for (T1, T2)
where
    T1: ReadFixed,
    T2: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE;

    fn decode(bytes: &[u8]) -> Self::HostType {
        let (b1, b2) = bytes.split_at(T1::SIZE);
        (T1::decode(b1), T2::decode(b2))
    }
}

impl<T1, T2, T3> ReadFixed for (T1, T2, T3)
where
    T1: ReadFixed,
    T2: ReadFixed,
    T3: ReadFixed,
{
    type HostType = (T1::HostType, T2::HostType, T3::HostType);

    const SIZE: usize = T1::SIZE + T2::SIZE + T3::SIZE;

    fn decode(bytes: &[u8]) -> Self::HostType {
        let (b1, rest) = bytes.split_at(T1::SIZE);
        let (b2, b3) = rest.split_at(T2::SIZE);
        (T1::decode(b1), T2::decode(b2), T3::decode(b3))
    }
}

impl<'a, T> fmt::Debug for ReadArray<'a, T>
where
    T: ReadFixed,
    T::HostType: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u24be() {
        let scope = ReadScope::new(&[1, 2, 3]);
        assert_eq!(scope.read::<U24Be>().unwrap(), 0x10203);
    }

    // offset_length must not panic when length is 0 but offset is out-of-bounds
    #[test]
    fn test_offset_length_oob() {
        let scope = ReadScope::new(&[1, 2, 3]);
        assert!(scope.offset_length(99, 0).is_ok());
        assert_eq!(scope.offset_length(1, 5), Err(ParseError::BadEof));
    }

    #[test]
    fn test_read_array_of_tuples() {
        let data = [0, 1, 0xFF, 0, 2, 0x10];
        let array = ReadScope::new(&data)
            .ctxt()
            .read_array::<(U16Be, U8)>(2)
            .unwrap();
        assert_eq!(array.to_vec(), vec![(1, 0xFF), (2, 0x10)]);
        assert_eq!(array.last(), Some((2, 0x10)));
    }

    #[test]
    fn test_read_eof() {
        let mut ctxt = ReadScope::new(&[1]).ctxt();
        assert!(ctxt.read_u16be().is_err());
        assert_eq!(ctxt.read_u8().unwrap(), 1);
        assert!(!ctxt.bytes_available());
    }

    #[test]
    fn test_read_until_nibble() {
        let data = [0x1A, 0x2F, 0x33];
        let mut ctxt = ReadScope::new(&data).ctxt();
        assert_eq!(ctxt.read_until_nibble(0xF).unwrap(), &[0x1A, 0x2F]);
        assert_eq!(ctxt.position(), 2);
    }
}
