pub mod writer {
    //! Builders for the small fonts and tables used in tests.
    #![allow(dead_code)]

    // The writer module is derived from ttf-parser, licenced under Apache-2.0.
    // https://github.com/RazrFalcon/ttf-parser/blob/439aaaebd50eb8aed66302e3c1b51fae047f85b2/src/writer.rs

    #[allow(missing_debug_implementations)]
    #[derive(Clone, Copy)]
    pub enum TtfType {
        Raw(&'static [u8]),
        TrueTypeMagic,
        OpenTypeMagic,
        FontCollectionMagic,
        Int8(i8),
        UInt8(u8),
        Int16(i16),
        UInt16(u16),
        Int32(i32),
        UInt32(u32),
        /// A CFF DICT or charstring integer in its shortest encoding.
        CFFInt(i32),
        /// A CFF DICT integer in the 5-byte encoding, as used for offsets.
        CFFOffset(i32),
    }

    use TtfType::*;

    pub fn convert(values: &[TtfType]) -> Vec<u8> {
        let mut data = Vec::with_capacity(256);
        for v in values {
            convert_type(*v, &mut data);
        }

        data
    }

    pub fn convert_type(value: TtfType, data: &mut Vec<u8>) {
        match value {
            Raw(bytes) => {
                data.extend_from_slice(bytes);
            }
            TrueTypeMagic => {
                data.extend_from_slice(&[0x00, 0x01, 0x00, 0x00]);
            }
            OpenTypeMagic => {
                data.extend_from_slice(&[0x4F, 0x54, 0x54, 0x4F]);
            }
            FontCollectionMagic => {
                data.extend_from_slice(&[0x74, 0x74, 0x63, 0x66]);
            }
            Int8(n) => {
                data.extend_from_slice(&i8::to_be_bytes(n));
            }
            UInt8(n) => {
                data.extend_from_slice(&u8::to_be_bytes(n));
            }
            Int16(n) => {
                data.extend_from_slice(&i16::to_be_bytes(n));
            }
            UInt16(n) => {
                data.extend_from_slice(&u16::to_be_bytes(n));
            }
            Int32(n) => {
                data.extend_from_slice(&i32::to_be_bytes(n));
            }
            UInt32(n) => {
                data.extend_from_slice(&u32::to_be_bytes(n));
            }
            CFFInt(n) => match n {
                -107..=107 => {
                    data.push((n as i16 + 139) as u8);
                }
                108..=1131 => {
                    let n = n - 108;
                    data.push(((n >> 8) + 247) as u8);
                    data.push((n & 0xFF) as u8);
                }
                -1131..=-108 => {
                    let n = -n - 108;
                    data.push(((n >> 8) + 251) as u8);
                    data.push((n & 0xFF) as u8);
                }
                -32768..=32767 => {
                    data.push(28);
                    data.extend_from_slice(&i16::to_be_bytes(n as i16));
                }
                _ => {
                    data.push(29);
                    data.extend_from_slice(&i32::to_be_bytes(n));
                }
            },
            CFFOffset(n) => {
                data.push(29);
                data.extend_from_slice(&i32::to_be_bytes(n));
            }
        }
    }

    #[derive(Debug)]
    pub struct Writer {
        pub data: Vec<u8>,
    }

    impl Writer {
        pub fn new() -> Self {
            Writer {
                data: Vec::with_capacity(256),
            }
        }

        pub fn offset(&self) -> usize {
            self.data.len()
        }

        pub fn write(&mut self, value: TtfType) {
            convert_type(value, &mut self.data);
        }

        pub fn write_all(&mut self, values: &[TtfType]) {
            for value in values {
                self.write(*value);
            }
        }

        pub fn extend(&mut self, bytes: &[u8]) {
            self.data.extend_from_slice(bytes);
        }
    }

    // CFF

    /// `0 0 rmoveto 100 0 rlineto 0 100 rlineto endchar`
    pub const SAMPLE_CHARSTRING: [u8; 10] = [139, 139, 21, 239, 139, 5, 139, 239, 5, 14];

    const TOP_DICT_CHARSET: u8 = 15;
    const TOP_DICT_CHAR_STRINGS: u8 = 17;
    const TOP_DICT_PRIVATE: u8 = 18;
    const PRIVATE_DEFAULT_WIDTH_X: u8 = 20;
    const PRIVATE_NOMINAL_WIDTH_X: u8 = 21;
    const ESCAPE: u8 = 12;
    const ROS: u8 = 30;
    const FD_ARRAY: u8 = 36;
    const FD_SELECT: u8 = 37;

    const N_STANDARD_STRINGS: u16 = 391;

    /// A CFF INDEX using 4-byte offsets.
    pub fn cff_index(objects: &[Vec<u8>]) -> Vec<u8> {
        let mut w = Writer::new();
        w.write(UInt16(objects.len() as u16));
        if objects.is_empty() {
            return w.data;
        }
        w.write(UInt8(4));
        let mut offset = 1;
        w.write(UInt32(offset));
        for object in objects {
            offset += object.len() as u32;
            w.write(UInt32(offset));
        }
        for object in objects {
            w.extend(object);
        }
        w.data
    }

    /// The SID of the standard strings used in tests.
    fn standard_sid(name: &str) -> Option<u16> {
        match name.as_bytes() {
            b".notdef" => Some(0),
            b"space" => Some(1),
            &[c] if c.is_ascii_uppercase() => Some(34 + u16::from(c - b'A')),
            &[c] if c.is_ascii_lowercase() => Some(66 + u16::from(c - b'a')),
            _ => None,
        }
    }

    fn cff_header() -> Vec<u8> {
        vec![1, 0, 4, 4]
    }

    fn charset_format0(ids: &[u16]) -> Vec<u8> {
        let mut w = Writer::new();
        w.write(UInt8(0));
        for &id in ids {
            w.write(UInt16(id));
        }
        w.data
    }

    fn private_dict(default_width_x: i32, nominal_width_x: i32) -> Vec<u8> {
        let mut w = Writer::new();
        if default_width_x != 0 {
            w.write(CFFInt(default_width_x));
            w.write(UInt8(PRIVATE_DEFAULT_WIDTH_X));
        }
        if nominal_width_x != 0 {
            w.write(CFFInt(nominal_width_x));
            w.write(UInt8(PRIVATE_NOMINAL_WIDTH_X));
        }
        w.data
    }

    /// A name-keyed CFF table with glyphs named `names` after `.notdef`, each drawn with
    /// `SAMPLE_CHARSTRING`.
    pub fn name_keyed_cff(names: &[&str], default_width_x: i32, nominal_width_x: i32) -> Vec<u8> {
        let char_strings = std::iter::once(vec![14])
            .chain(names.iter().map(|_| SAMPLE_CHARSTRING.to_vec()))
            .collect();
        name_keyed_cff_with_charstrings(names, char_strings, default_width_x, nominal_width_x)
    }

    /// A name-keyed CFF table. `char_strings` includes the `.notdef` charstring at index 0.
    pub fn name_keyed_cff_with_charstrings(
        names: &[&str],
        char_strings: Vec<Vec<u8>>,
        default_width_x: i32,
        nominal_width_x: i32,
    ) -> Vec<u8> {
        let mut strings = Vec::new();
        let sids = names
            .iter()
            .map(|name| match standard_sid(name) {
                Some(sid) => sid,
                None => {
                    strings.push(name.as_bytes().to_vec());
                    N_STANDARD_STRINGS + strings.len() as u16 - 1
                }
            })
            .collect::<Vec<_>>();

        let name_index = cff_index(&[b"Test".to_vec()]);
        let string_index = cff_index(&strings);
        let global_subr_index = cff_index(&[]);
        let charset = charset_format0(&sids);
        let char_strings_index = cff_index(&char_strings);
        let private = private_dict(default_width_x, nominal_width_x);

        // Every Top DICT operand is an offset or length in the 5-byte form
        let top_dict_len = 6 + 6 + 11;
        let top_dict_index_len = 2 + 1 + 4 * 2 + top_dict_len;
        let charset_offset = cff_header().len()
            + name_index.len()
            + top_dict_index_len
            + string_index.len()
            + global_subr_index.len();
        let char_strings_offset = charset_offset + charset.len();
        let private_offset = char_strings_offset + char_strings_index.len();

        let mut top_dict = Writer::new();
        top_dict.write_all(&[
            CFFOffset(charset_offset as i32),
            UInt8(TOP_DICT_CHARSET),
            CFFOffset(char_strings_offset as i32),
            UInt8(TOP_DICT_CHAR_STRINGS),
            CFFOffset(private.len() as i32),
            CFFOffset(private_offset as i32),
            UInt8(TOP_DICT_PRIVATE),
        ]);
        assert_eq!(top_dict.data.len(), top_dict_len);

        let mut w = Writer { data: cff_header() };
        w.extend(&name_index);
        w.extend(&cff_index(&[top_dict.data]));
        w.extend(&string_index);
        w.extend(&global_subr_index);
        w.extend(&charset);
        w.extend(&char_strings_index);
        w.extend(&private);
        w.data
    }

    /// A CID-keyed CFF table with one Font DICT, whose Private DICT has a `defaultWidthX` of 1000.
    pub fn cid_keyed_cff(cids: &[u16]) -> Vec<u8> {
        let fd_indices = vec![0; cids.len() + 1];
        cid_keyed_cff_with_font_dicts(cids, &fd_indices, &[1000])
    }

    /// A CID-keyed CFF table.
    ///
    /// `fd_indices` selects the Font DICT of every glyph including `.notdef`, and
    /// `default_widths` holds the `defaultWidthX` of each Font DICT's Private DICT.
    pub fn cid_keyed_cff_with_font_dicts(
        cids: &[u16],
        fd_indices: &[u8],
        default_widths: &[i32],
    ) -> Vec<u8> {
        assert_eq!(fd_indices.len(), cids.len() + 1);

        let name_index = cff_index(&[b"TestCID".to_vec()]);
        let string_index = cff_index(&[b"Adobe".to_vec(), b"Identity".to_vec()]);
        let global_subr_index = cff_index(&[]);
        let charset = charset_format0(cids);
        let mut fd_select = vec![0];
        fd_select.extend_from_slice(fd_indices);
        let char_strings = std::iter::once(vec![14])
            .chain(cids.iter().map(|_| SAMPLE_CHARSTRING.to_vec()))
            .collect::<Vec<_>>();
        let char_strings_index = cff_index(&char_strings);
        let privates = default_widths
            .iter()
            .map(|&width| private_dict(width, 0))
            .collect::<Vec<_>>();

        // ROS is 7 bytes, the four offsets 6 or 7 bytes each
        let top_dict_len = 7 + 6 + 6 + 7 + 7;
        let top_dict_index_len = 2 + 1 + 4 * 2 + top_dict_len;
        let font_dict_len = 11;
        let font_dict_index_len =
            2 + 1 + 4 * (default_widths.len() + 1) + font_dict_len * default_widths.len();

        let charset_offset = cff_header().len()
            + name_index.len()
            + top_dict_index_len
            + string_index.len()
            + global_subr_index.len();
        let fd_select_offset = charset_offset + charset.len();
        let char_strings_offset = fd_select_offset + fd_select.len();
        let font_dict_index_offset = char_strings_offset + char_strings_index.len();
        let mut private_offset = font_dict_index_offset + font_dict_index_len;

        let mut font_dicts = Vec::new();
        for private in &privates {
            let mut w = Writer::new();
            w.write_all(&[
                CFFOffset(private.len() as i32),
                CFFOffset(private_offset as i32),
                UInt8(TOP_DICT_PRIVATE),
            ]);
            assert_eq!(w.data.len(), font_dict_len);
            font_dicts.push(w.data);
            private_offset += private.len();
        }

        let mut top_dict = Writer::new();
        top_dict.write_all(&[
            CFFInt(i32::from(N_STANDARD_STRINGS)),
            CFFInt(i32::from(N_STANDARD_STRINGS) + 1),
            CFFInt(0),
            UInt8(ESCAPE),
            UInt8(ROS),
            CFFOffset(charset_offset as i32),
            UInt8(TOP_DICT_CHARSET),
            CFFOffset(char_strings_offset as i32),
            UInt8(TOP_DICT_CHAR_STRINGS),
            CFFOffset(font_dict_index_offset as i32),
            UInt8(ESCAPE),
            UInt8(FD_ARRAY),
            CFFOffset(fd_select_offset as i32),
            UInt8(ESCAPE),
            UInt8(FD_SELECT),
        ]);
        assert_eq!(top_dict.data.len(), top_dict_len);

        let mut w = Writer { data: cff_header() };
        w.extend(&name_index);
        w.extend(&cff_index(&[top_dict.data]));
        w.extend(&string_index);
        w.extend(&global_subr_index);
        w.extend(&charset);
        w.extend(&fd_select);
        w.extend(&char_strings_index);
        w.extend(&cff_index(&font_dicts));
        for private in &privates {
            w.extend(private);
        }
        w.data
    }

    // Tables

    pub fn head_table(units_per_em: u16) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_all(&[
            UInt16(1),
            UInt16(0),
            UInt32(0x00010000), // fontRevision
            UInt32(0),          // checksumAdjustment
            UInt32(0x5F0F3CF5),
            UInt16(0), // flags
            UInt16(units_per_em),
            UInt32(0),
            UInt32(0), // created
            UInt32(0),
            UInt32(0), // modified
            Int16(0),
            Int16(-200),
            Int16(1000),
            Int16(800),
            UInt16(0), // macStyle
            UInt16(8), // lowestRecPPEM
            Int16(2),  // fontDirectionHint
            Int16(0),  // indexToLocFormat
            Int16(0),  // glyphDataFormat
        ]);
        w.data
    }

    /// An `hhea` or `vhea` table.
    pub fn hhea_table(num_metrics: u16, advance_max: u16) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_all(&[
            UInt16(1),
            UInt16(0),
            Int16(800),
            Int16(-200),
            Int16(0),
            UInt16(advance_max),
            Int16(0),
            Int16(0),
            Int16(0),
            Int16(1), // caretSlopeRise
            Int16(0),
            Int16(0),
            Int16(0),
            Int16(0),
            Int16(0),
            Int16(0),
            Int16(0), // metricDataFormat
            UInt16(num_metrics),
        ]);
        w.data
    }

    /// An `hmtx` or `vmtx` table with a long metric for every glyph.
    pub fn hmtx_table(metrics: &[(u16, i16)]) -> Vec<u8> {
        let mut w = Writer::new();
        for &(advance, side_bearing) in metrics {
            w.write(UInt16(advance));
            w.write(Int16(side_bearing));
        }
        w.data
    }

    pub fn maxp_table(num_glyphs: u16) -> Vec<u8> {
        convert(&[UInt32(0x00005000), UInt16(num_glyphs)])
    }

    pub fn post_table_v3() -> Vec<u8> {
        let mut w = Writer::new();
        w.write_all(&[UInt32(0x00030000), UInt32(0), Int16(-100), Int16(50)]);
        w.extend(&[0; 20]);
        w.data
    }

    /// A version 2 `post` table naming every glyph, `.notdef` through the standard name.
    pub fn post_table_v2(names: &[&str]) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_all(&[UInt32(0x00020000), UInt32(0), Int16(-100), Int16(50)]);
        w.extend(&[0; 20]);
        w.write(UInt16(names.len() as u16));
        let mut custom = Vec::new();
        for name in names {
            if *name == ".notdef" {
                w.write(UInt16(0));
            } else {
                w.write(UInt16(258 + custom.len() as u16));
                custom.push(*name);
            }
        }
        for name in custom {
            w.write(UInt8(name.len() as u8));
            w.extend(name.as_bytes());
        }
        w.data
    }

    /// A version 0 `OS/2` table with the given typographic ascender and descender.
    pub fn os2_table(typo_ascender: i16, typo_descender: i16) -> Vec<u8> {
        let mut w = Writer::new();
        w.write(UInt16(0));
        w.extend(&[0; 66]);
        w.write_all(&[
            Int16(typo_ascender),
            Int16(typo_descender),
            Int16(0),
            UInt16(typo_ascender as u16),
            UInt16(typo_descender.unsigned_abs()),
        ]);
        assert_eq!(w.data.len(), 78);
        w.data
    }

    fn cmap_format4_subtable(mappings: &[(u32, u16)]) -> Vec<u8> {
        // One segment per character plus the final 0xFFFF segment
        let seg_count = mappings.len() + 1;
        let mut ends = mappings.iter().map(|&(ch, _)| ch as u16).collect::<Vec<_>>();
        ends.push(0xFFFF);
        let deltas = mappings
            .iter()
            .map(|&(ch, glyph_id)| glyph_id.wrapping_sub(ch as u16))
            .chain(std::iter::once(1))
            .collect::<Vec<_>>();

        let mut w = Writer::new();
        w.write_all(&[
            UInt16(4),
            UInt16((16 + 8 * seg_count) as u16),
            UInt16(0),
            UInt16((seg_count * 2) as u16),
            UInt16(0), // searchRange, not used when reading
            UInt16(0),
            UInt16(0),
        ]);
        for &end in &ends {
            w.write(UInt16(end));
        }
        w.write(UInt16(0));
        for &start in &ends {
            w.write(UInt16(start));
        }
        for &delta in &deltas {
            w.write(UInt16(delta));
        }
        for _ in 0..seg_count {
            w.write(UInt16(0));
        }
        w.data
    }

    fn cmap_format12_subtable(mappings: &[(u32, u16)]) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_all(&[
            UInt16(12),
            UInt16(0),
            UInt32((16 + 12 * mappings.len()) as u32),
            UInt32(0),
            UInt32(mappings.len() as u32),
        ]);
        for &(ch, glyph_id) in mappings {
            w.write_all(&[UInt32(ch), UInt32(ch), UInt32(u32::from(glyph_id))]);
        }
        w.data
    }

    /// A `cmap` table with a single Windows Unicode BMP format 4 subtable.
    pub fn cmap_format4(mappings: &[(u32, u16)]) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_all(&[UInt16(0), UInt16(1), UInt16(3), UInt16(1), UInt32(12)]);
        w.extend(&cmap_format4_subtable(mappings));
        w.data
    }

    /// A `cmap` table with Windows Unicode BMP (format 4) and full repertoire (format 12)
    /// subtables.
    pub fn cmap_with_format12(bmp: &[(u32, u16)], full: &[(u32, u16)]) -> Vec<u8> {
        let format4 = cmap_format4_subtable(bmp);
        let mut w = Writer::new();
        w.write_all(&[UInt16(0), UInt16(2)]);
        w.write_all(&[UInt16(3), UInt16(1), UInt32(20)]);
        w.write_all(&[UInt16(3), UInt16(10), UInt32(20 + format4.len() as u32)]);
        w.extend(&format4);
        w.extend(&cmap_format12_subtable(full));
        w.data
    }

    // Font files

    fn checksum(data: &[u8]) -> u32 {
        data.chunks(4).fold(0u32, |sum, chunk| {
            let mut word = [0; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            sum.wrapping_add(u32::from_be_bytes(word))
        })
    }

    fn padded(data: &[u8]) -> Vec<u8> {
        let mut data = data.to_vec();
        data.resize((data.len() + 3) & !3, 0);
        data
    }

    fn sorted_tables(tables: &[(&[u8; 4], Vec<u8>)]) -> Vec<(u32, Vec<u8>)> {
        let mut tables = tables
            .iter()
            .map(|(tag, data)| (u32::from_be_bytes(**tag), data.clone()))
            .collect::<Vec<_>>();
        tables.sort_by_key(|(tag, _)| *tag);
        tables
    }

    /// An sfnt font file holding `tables`.
    pub fn sfnt(sfnt_version: u32, tables: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        sfnt_at(0, sfnt_version, tables)
    }

    /// An sfnt whose table offsets are relative to a file position of `base`.
    fn sfnt_at(base: usize, sfnt_version: u32, tables: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let tables = sorted_tables(tables);
        let num_tables = tables.len() as u16;
        let entry_selector = 15u16.saturating_sub(num_tables.leading_zeros() as u16);
        let search_range = (1u16 << entry_selector) * 16;

        let mut w = Writer::new();
        w.write_all(&[
            UInt32(sfnt_version),
            UInt16(num_tables),
            UInt16(search_range),
            UInt16(entry_selector),
            UInt16(num_tables * 16 - search_range),
        ]);
        let mut offset = base + 12 + 16 * tables.len();
        for (tag, data) in &tables {
            w.write_all(&[
                UInt32(*tag),
                UInt32(checksum(data)),
                UInt32(offset as u32),
                UInt32(data.len() as u32),
            ]);
            offset += padded(data).len();
        }
        for (_, data) in &tables {
            w.extend(&padded(data));
        }
        w.data
    }

    /// A TrueType collection holding one sfnt per entry of `fonts`.
    pub fn collection(fonts: &[(u32, Vec<(&[u8; 4], Vec<u8>)>)]) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_all(&[FontCollectionMagic, UInt16(1), UInt16(0), UInt32(fonts.len() as u32)]);
        let mut offset = 12 + 4 * fonts.len();
        let mut sfnts = Vec::new();
        for (sfnt_version, tables) in fonts {
            w.write(UInt32(offset as u32));
            let data = padded(&sfnt_at(offset, *sfnt_version, tables));
            offset += data.len();
            sfnts.push(data);
        }
        for data in sfnts {
            w.extend(&data);
        }
        w.data
    }

    /// A WOFF 1.0 file storing `tables` uncompressed.
    pub fn woff(flavor: u32, tables: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let tables = sorted_tables(tables);
        let header_len = 44 + 20 * tables.len();
        let total_sfnt_size = 12
            + 16 * tables.len()
            + tables.iter().map(|(_, data)| padded(data).len()).sum::<usize>();
        let length = header_len + tables.iter().map(|(_, data)| padded(data).len()).sum::<usize>();

        let mut w = Writer::new();
        w.write_all(&[
            Raw(b"wOFF"),
            UInt32(flavor),
            UInt32(length as u32),
            UInt16(tables.len() as u16),
            UInt16(0),
            UInt32(total_sfnt_size as u32),
            UInt16(1),
            UInt16(0),
            UInt32(0), // metadata
            UInt32(0),
            UInt32(0),
            UInt32(0), // private data
            UInt32(0),
        ]);
        let mut offset = header_len;
        for (tag, data) in &tables {
            w.write_all(&[
                UInt32(*tag),
                UInt32(offset as u32),
                UInt32(data.len() as u32), // compLength == origLength, stored uncompressed
                UInt32(data.len() as u32),
                UInt32(checksum(data)),
            ]);
            offset += padded(data).len();
        }
        for (_, data) in &tables {
            w.extend(&padded(data));
        }
        w.data
    }

    /// The tables of a name-keyed OpenType font with glyphs named `names` after `.notdef`.
    ///
    /// Every glyph is 500 units wide. Single letter names are mapped in `cmap`.
    pub fn name_keyed_otf_tables(names: &[&str]) -> Vec<(&'static [u8; 4], Vec<u8>)> {
        let num_glyphs = names.len() as u16 + 1;
        let mappings = names
            .iter()
            .enumerate()
            .filter_map(|(index, name)| match name.as_bytes() {
                &[c] if c.is_ascii_alphabetic() => Some((u32::from(c), index as u16 + 1)),
                _ => None,
            })
            .collect::<Vec<_>>();
        let metrics = vec![(500, 0); usize::from(num_glyphs)];

        vec![
            (b"CFF ", name_keyed_cff(names, 500, 0)),
            (b"OS/2", os2_table(800, -200)),
            (b"cmap", cmap_format4(&mappings)),
            (b"head", head_table(1000)),
            (b"hhea", hhea_table(num_glyphs, 500)),
            (b"hmtx", hmtx_table(&metrics)),
            (b"maxp", maxp_table(num_glyphs)),
            (b"post", post_table_v3()),
        ]
    }

    pub fn name_keyed_otf(names: &[&str]) -> Vec<u8> {
        sfnt(0x4F54544F, &name_keyed_otf_tables(names))
    }

    /// A CID-keyed OpenType font with glyphs for `cids` after `.notdef`, all in one Font DICT.
    ///
    /// Glyphs are 1000 units wide and, with `vertical`, 1000 units high. Glyph `n` is mapped from
    /// U+4E00 + n - 1.
    pub fn cid_keyed_otf(cids: &[u16], vertical: bool) -> Vec<u8> {
        let fd_indices = vec![0; cids.len() + 1];
        cid_keyed_otf_with_font_dicts(cids, &fd_indices, vertical)
    }

    pub fn cid_keyed_otf_with_font_dicts(cids: &[u16], fd_indices: &[u8], vertical: bool) -> Vec<u8> {
        let num_glyphs = cids.len() as u16 + 1;
        let mappings = (1..num_glyphs)
            .map(|glyph_id| (0x4E00 + u32::from(glyph_id) - 1, glyph_id))
            .collect::<Vec<_>>();
        let font_dict_count = usize::from(fd_indices.iter().copied().max().unwrap_or(0)) + 1;
        let default_widths = vec![1000; font_dict_count];

        let mut tables: Vec<(&[u8; 4], Vec<u8>)> = vec![
            (
                b"CFF ",
                cid_keyed_cff_with_font_dicts(cids, fd_indices, &default_widths),
            ),
            (b"OS/2", os2_table(880, -120)),
            (b"cmap", cmap_format4(&mappings)),
            (b"head", head_table(1000)),
            (b"hhea", hhea_table(num_glyphs, 1000)),
            (b"hmtx", hmtx_table(&vec![(1000, 0); usize::from(num_glyphs)])),
            (b"maxp", maxp_table(num_glyphs)),
            (b"post", post_table_v3()),
        ];
        if vertical {
            tables.push((b"vhea", hhea_table(num_glyphs, 1000)));
            tables.push((b"vmtx", hmtx_table(&vec![(1000, 880); usize::from(num_glyphs)])));
        }
        sfnt(0x4F54544F, &tables)
    }
}
