//! Top-level font file representation.

use std::borrow::Cow;

use crate::binary::read::{ReadBinary, ReadCtxt};
use crate::error::{OpenError, ParseError};
use crate::tables::{FontTableProvider, OpenTypeFont, CFF_MAGIC, TRUE_MAGIC, TTCF_MAGIC, TTF_MAGIC};
#[cfg(feature = "flate2")]
use crate::woff::{self, WoffFont};

/// Type that can represent any of the supported font formats.
pub enum FontData<'a> {
    OpenType(OpenTypeFont<'a>),
    #[cfg(feature = "flate2")]
    Woff(WoffFont<'a>),
}

/// Generic implementation of the `FontTableProvider` trait
pub struct DynamicFontTableProvider<'a> {
    sfnt_version: u32,
    provider: Box<dyn FontTableProvider + 'a>,
}

impl ReadBinary for FontData<'_> {
    type HostType<'a> = FontData<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<FontData<'a>, ParseError> {
        let mut peek = ctxt.clone();
        let magic = peek.read_u32be()?;
        match magic {
            TTF_MAGIC | TRUE_MAGIC | CFF_MAGIC | TTCF_MAGIC => {
                Ok(FontData::OpenType(ctxt.read::<OpenTypeFont<'_>>()?))
            }
            #[cfg(feature = "flate2")]
            woff::MAGIC => Ok(FontData::Woff(ctxt.read::<WoffFont<'_>>()?)),
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl FontTableProvider for DynamicFontTableProvider<'_> {
    fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError> {
        self.provider.table_data(tag)
    }

    fn has_table(&self, tag: u32) -> bool {
        self.provider.has_table(tag)
    }

    fn table_tags(&self) -> Vec<u32> {
        self.provider.table_tags()
    }
}

impl DynamicFontTableProvider<'_> {
    pub fn sfnt_version(&self) -> u32 {
        self.sfnt_version
    }
}

impl<'a> FontData<'a> {
    /// The number of fonts in the file, which is only ever more than one for a collection.
    pub fn num_fonts(&self) -> usize {
        match self {
            FontData::OpenType(font) => font.num_fonts(),
            #[cfg(feature = "flate2")]
            FontData::Woff(_) => 1,
        }
    }

    /// Obtain an implementation of `FontTableProvider` for the font at `index`.
    pub fn table_provider(&self, index: usize) -> Result<DynamicFontTableProvider<'a>, OpenError> {
        let num_fonts = self.num_fonts();
        if index >= num_fonts {
            return Err(OpenError::FontIndexOutOfRange { index, num_fonts });
        }

        match self {
            FontData::OpenType(font) => {
                let provider = font.table_provider(index)?;
                Ok(DynamicFontTableProvider {
                    sfnt_version: provider.sfnt_version(),
                    provider: Box::new(provider),
                })
            }
            #[cfg(feature = "flate2")]
            FontData::Woff(font) => {
                // This clone is relatively cheap as WoffFont is mostly holding borrowed data
                Ok(DynamicFontTableProvider {
                    sfnt_version: font.flavor(),
                    provider: Box::new(font.clone()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::tag;
    use crate::tests::writer;

    #[test]
    fn test_collection_index() {
        let data = writer::collection(&[
            (CFF_MAGIC, vec![(b"maxp", writer::maxp_table(2))]),
            (CFF_MAGIC, vec![(b"maxp", writer::maxp_table(7))]),
        ]);
        let font_data = ReadScope::new(&data).read::<FontData<'_>>().unwrap();
        assert_eq!(font_data.num_fonts(), 2);

        let provider = font_data.table_provider(1).unwrap();
        assert_eq!(provider.sfnt_version(), CFF_MAGIC);
        assert_eq!(
            provider.read_table_data(tag::MAXP).unwrap().as_ref(),
            &writer::maxp_table(7)[..]
        );

        match font_data.table_provider(2) {
            Err(OpenError::FontIndexOutOfRange { index, num_fonts }) => {
                assert_eq!((index, num_fonts), (2, 2))
            }
            _ => panic!("expected index error"),
        };
    }

    #[test]
    fn test_single_font_index() {
        let data = writer::sfnt(CFF_MAGIC, &[(b"maxp", writer::maxp_table(2))]);
        let font_data = ReadScope::new(&data).read::<FontData<'_>>().unwrap();
        assert!(font_data.table_provider(0).is_ok());
        assert!(font_data.table_provider(1).is_err());
    }

    #[test]
    fn test_unknown_format() {
        let data = b"wOF2\0\0\0\0";
        assert!(matches!(
            ReadScope::new(data).read::<FontData<'_>>(),
            Err(ParseError::BadVersion)
        ));
    }
}
