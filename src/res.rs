//! Binary layout of `.res` records: the Win32 `RESOURCEHEADER` format,
//! `RT_*` type identifiers, and memory-flag bits (spec.md §3 "Resource
//! record (emitted)", §6 "Output file format").
//!
//! Fixed-size chunks are `#[derive(Pread, Pwrite, SizeWith)]` structs
//! read/written with `scroll`, while the variable-length
//! ordinal-or-string fields (`NameOrOrdinal`) are handled by hand, since
//! their length depends on their own content.

use crate::error::{Error, Result};
use scroll::{Pread, Pwrite, SizeWith};

/// Windows `RT_*` resource type identifiers.
pub mod rt {
    pub const RT_CURSOR: u16 = 1;
    pub const RT_BITMAP: u16 = 2;
    pub const RT_ICON: u16 = 3;
    pub const RT_MENU: u16 = 4;
    pub const RT_DIALOG: u16 = 5;
    pub const RT_STRING: u16 = 6;
    pub const RT_FONTDIR: u16 = 7;
    pub const RT_FONT: u16 = 8;
    pub const RT_ACCELERATOR: u16 = 9;
    pub const RT_RCDATA: u16 = 10;
    pub const RT_MESSAGETABLE: u16 = 11;
    pub const RT_GROUP_CURSOR: u16 = 12;
    pub const RT_GROUP_ICON: u16 = 14;
    pub const RT_VERSION: u16 = 16;
    pub const RT_DLGINCLUDE: u16 = 17;
    pub const RT_PLUGPLAY: u16 = 19;
    pub const RT_VXD: u16 = 20;
    pub const RT_ANICURSOR: u16 = 21;
    pub const RT_ANIICON: u16 = 22;
    pub const RT_HTML: u16 = 23;
    pub const RT_MANIFEST: u16 = 24;
}

/// `RESOURCEHEADER.MemoryFlags` bits.
pub mod mem_flags {
    pub const MOVEABLE: u16 = 0x0010;
    pub const PURE: u16 = 0x0020;
    pub const PRELOAD: u16 = 0x0040;
    pub const DISCARDABLE: u16 = 0x1000;
}

/// `VS_VERSIONINFO`/`VS_FIXEDFILEINFO` constants, per the Win32
/// `VS_FIXEDFILEINFO` struct and its `dwSignature`/`dwStrucVersion` fields.
pub mod version {
    use scroll::{Pread, Pwrite, SizeWith};

    pub const VS_FFI_SIGNATURE: u32 = 0xFEEF04BD;
    pub const VS_FFI_STRUCVERSION: u32 = 0x0001_0000;
    pub const VS_FFI_FILEFLAGSMASK: u32 = 0x0000_003F;

    pub const VS_FF_DEBUG: u32 = 0x0000_0001;
    pub const VS_FF_PRERELEASE: u32 = 0x0000_0002;
    pub const VS_FF_PATCHED: u32 = 0x0000_0004;
    pub const VS_FF_PRIVATEBUILD: u32 = 0x0000_0008;
    pub const VS_FF_INFOINFERRED: u32 = 0x0000_0010;
    pub const VS_FF_SPECIALBUILD: u32 = 0x0000_0020;

    pub const VOS_UNKNOWN: u32 = 0x0000_0000;
    pub const VOS_DOS: u32 = 0x0001_0000;
    pub const VOS_OS216: u32 = 0x0002_0000;
    pub const VOS_OS232: u32 = 0x0003_0000;
    pub const VOS_NT: u32 = 0x0004_0000;
    pub const VOS__WINDOWS32: u32 = 0x0000_0004;
    pub const VOS_NT_WINDOWS32: u32 = 0x0004_0004;

    pub const VFT_UNKNOWN: u32 = 0x0000_0000;
    pub const VFT_APP: u32 = 0x0000_0001;
    pub const VFT_DLL: u32 = 0x0000_0002;
    pub const VFT_DRV: u32 = 0x0000_0003;
    pub const VFT_FONT: u32 = 0x0000_0004;
    pub const VFT_VXD: u32 = 0x0000_0005;
    pub const VFT_STATIC_LIB: u32 = 0x0000_0007;

    pub const VFT2_UNKNOWN: u32 = 0x0000_0000;
    pub const VFT2_FONT_RASTER: u32 = 0x0000_0001;
    pub const VFT2_FONT_VECTOR: u32 = 0x0000_0002;
    pub const VFT2_FONT_TRUETYPE: u32 = 0x0000_0003;

    /// `VS_VERSION_INFO`'s fixed-size `VS_FIXEDFILEINFO` block.
    #[repr(C)]
    #[derive(Debug, PartialEq, Copy, Clone, Default, Pread, Pwrite, SizeWith)]
    pub struct VsFixedFileInfo {
        pub signature: u32,
        pub struct_version: u32,
        pub file_version_ms: u32,
        pub file_version_ls: u32,
        pub product_version_ms: u32,
        pub product_version_ls: u32,
        pub file_flags_mask: u32,
        pub file_flags: u32,
        pub file_os: u32,
        pub file_type: u32,
        pub file_subtype: u32,
        pub file_date_ms: u32,
        pub file_date_ls: u32,
    }
}

/// Rounds `value` up to the next multiple of `align`, which must be a
/// power of two. `.res` records are 4-byte aligned throughout.
#[inline]
pub fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align != 0 && align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Either an ordinal (`0xFFFF`-prefixed `u16`) or a UTF-16LE
/// null-terminated string, used for both the `type` and `name` fields of a
/// resource header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameOrOrdinal {
    Ordinal(u16),
    Name(String),
}

impl NameOrOrdinal {
    pub fn size(&self) -> usize {
        match self {
            NameOrOrdinal::Ordinal(_) => 4,
            NameOrOrdinal::Name(s) => (s.encode_utf16().count() + 1) * 2,
        }
    }

    pub fn write(&self, buf: &mut Vec<u8>, offset: &mut usize) -> Result<()> {
        match self {
            NameOrOrdinal::Ordinal(id) => {
                buf.gwrite_with(0xFFFFu16, offset, scroll::LE)?;
                buf.gwrite_with(*id, offset, scroll::LE)?;
            }
            NameOrOrdinal::Name(s) => {
                for unit in s.encode_utf16() {
                    buf.gwrite_with(unit, offset, scroll::LE)?;
                }
                buf.gwrite_with(0u16, offset, scroll::LE)?;
            }
        }
        Ok(())
    }

    pub fn parse(bytes: &[u8], offset: &mut usize) -> Result<Self> {
        let marker: u16 = bytes.gread_with(offset, scroll::LE)?;
        if marker == 0xFFFF {
            let id: u16 = bytes.gread_with(offset, scroll::LE)?;
            Ok(NameOrOrdinal::Ordinal(id))
        } else {
            // marker was actually the first UTF-16 code unit of the name.
            let mut units = vec![marker];
            loop {
                let unit: u16 = bytes.gread_with(offset, scroll::LE)?;
                if unit == 0 {
                    break;
                }
                units.push(unit);
            }
            Ok(NameOrOrdinal::Name(String::from_utf16_lossy(&units)))
        }
    }
}

/// The fixed-size tail of a `RESOURCEHEADER`, following the variable-length
/// type/name fields.
#[repr(C)]
#[derive(Debug, PartialEq, Copy, Clone, Default, Pread, Pwrite, SizeWith)]
pub struct ResourceHeaderFixed {
    pub data_version: u32,
    pub memory_flags: u16,
    pub language_id: u16,
    pub version: u32,
    pub characteristics: u32,
}

/// One complete `.res` record: header plus data, ready to be written with
/// correct alignment, or as read back from a `.res` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub type_id: NameOrOrdinal,
    pub name_id: NameOrOrdinal,
    pub data_version: u32,
    pub memory_flags: u16,
    pub language_id: u16,
    pub version: u32,
    pub characteristics: u32,
    pub data: Vec<u8>,
}

impl ResourceRecord {
    /// The zero-sized sentinel record that every `.res` file begins with.
    pub fn sentinel() -> Self {
        ResourceRecord {
            type_id: NameOrOrdinal::Ordinal(0),
            name_id: NameOrOrdinal::Ordinal(0),
            data_version: 0,
            memory_flags: 0,
            language_id: 0,
            version: 0,
            characteristics: 0,
            data: Vec::new(),
        }
    }

    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        let record_start = buf.len();
        // Reserve space for DataSize/HeaderSize; patched in below once
        // both are known.
        buf.extend_from_slice(&[0u8; 8]);
        let mut offset = buf.len();

        self.type_id.write(buf, &mut offset)?;
        self.name_id.write(buf, &mut offset)?;

        let padded = align_up(offset, 4);
        buf.resize(buf.len() + (padded - offset), 0);
        offset = padded;

        let fixed = ResourceHeaderFixed {
            data_version: self.data_version,
            memory_flags: self.memory_flags,
            language_id: self.language_id,
            version: self.version,
            characteristics: self.characteristics,
        };
        buf.gwrite_with(fixed, &mut offset, scroll::LE)?;

        let header_size = offset - record_start;
        let data_size = self.data.len();

        buf.pwrite_with(data_size as u32, record_start, scroll::LE)?;
        buf.pwrite_with(header_size as u32, record_start + 4, scroll::LE)?;

        buf.extend_from_slice(&self.data);
        let end = buf.len();
        let padded_end = align_up(end, 4);
        buf.resize(padded_end, 0);

        Ok(())
    }

    pub fn parse(bytes: &[u8], offset: &mut usize) -> Result<Self> {
        let record_start = *offset;
        let data_size: u32 = bytes.gread_with(offset, scroll::LE)?;
        let header_size: u32 = bytes.gread_with(offset, scroll::LE)?;

        let type_id = NameOrOrdinal::parse(bytes, offset)?;
        let name_id = NameOrOrdinal::parse(bytes, offset)?;
        *offset = align_up(*offset, 4);

        let fixed: ResourceHeaderFixed = bytes.gread_with(offset, scroll::LE)?;

        let data_start = record_start + header_size as usize;
        if data_start + data_size as usize > bytes.len() {
            return Err(Error::Malformed(format!(
                "resource data ({:#x}..{:#x}) exceeds buffer length {:#x}",
                data_start,
                data_start + data_size as usize,
                bytes.len()
            )));
        }
        let data = bytes[data_start..data_start + data_size as usize].to_vec();
        *offset = align_up(data_start + data_size as usize, 4);

        Ok(ResourceRecord {
            type_id,
            name_id,
            data_version: fixed.data_version,
            memory_flags: fixed.memory_flags,
            language_id: fixed.language_id,
            version: fixed.version,
            characteristics: fixed.characteristics,
            data,
        })
    }
}

/// Writes a full `.res` file: the zero-sized sentinel record followed by
/// every record in `records`.
pub fn write_res_file(records: &[ResourceRecord]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ResourceRecord::sentinel().write(&mut buf)?;
    for record in records {
        record.write(&mut buf)?;
    }
    Ok(buf)
}

/// Reads back every record in a `.res` file (including the leading
/// sentinel), for round-trip testing.
pub fn read_res_file(bytes: &[u8]) -> Result<Vec<ResourceRecord>> {
    let mut offset = 0;
    let mut records = Vec::new();
    while offset < bytes.len() {
        records.push(ResourceRecord::parse(bytes, &mut offset)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_round_trips() {
        let buf = write_res_file(&[]).unwrap();
        let records = read_res_file(&buf).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].type_id, NameOrOrdinal::Ordinal(0));
        assert_eq!(records[0].data.len(), 0);
    }

    #[test]
    fn ordinal_name_round_trips() {
        let record = ResourceRecord {
            type_id: NameOrOrdinal::Ordinal(rt::RT_RCDATA),
            name_id: NameOrOrdinal::Name("A".to_string()),
            data_version: 0,
            memory_flags: mem_flags::MOVEABLE | mem_flags::PURE,
            language_id: 0,
            version: 0,
            characteristics: 0,
            data: vec![1, 0],
        };
        let buf = write_res_file(&[record.clone()]).unwrap();
        let records = read_res_file(&buf).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], record);
    }

    #[test]
    fn records_are_4_byte_aligned() {
        let record = ResourceRecord {
            type_id: NameOrOrdinal::Ordinal(1),
            name_id: NameOrOrdinal::Ordinal(2),
            data_version: 0,
            memory_flags: 0,
            language_id: 0,
            version: 0,
            characteristics: 0,
            data: vec![1, 2, 3], // odd length, forces padding
        };
        let buf = write_res_file(&[record]).unwrap();
        assert_eq!(buf.len() % 4, 0);
    }

    #[test]
    fn name_or_ordinal_string_round_trips() {
        let mut buf = Vec::new();
        let mut offset = 0;
        let noo = NameOrOrdinal::Name("HELLO".to_string());
        noo.write(&mut buf, &mut offset).unwrap();
        let mut read_offset = 0;
        let parsed = NameOrOrdinal::parse(&buf, &mut read_offset).unwrap();
        assert_eq!(parsed, noo);
        assert_eq!(read_offset, offset);
    }
}
