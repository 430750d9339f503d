//! Windows language/sub-language identifiers.
//!
//! A language id is a `u16` packed as `(sub_language << 10) | primary_language`
//! (spec.md §4.5). This module owns the packing/unpacking and a small table
//! mapping common BCP-47 tags (as accepted by the CLI's `/ln`) to language
//! ids.

/// A packed Windows LANGID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LanguageId {
    pub primary: u16,
    pub sub: u16,
}

impl LanguageId {
    pub const NEUTRAL: LanguageId = LanguageId { primary: 0, sub: 0 };

    pub fn pack(self) -> u16 {
        (self.sub << 10) | (self.primary & 0x3FF)
    }

    pub fn unpack(value: u16) -> Self {
        LanguageId {
            primary: value & 0x3FF,
            sub: value >> 10,
        }
    }
}

impl From<u16> for LanguageId {
    fn from(value: u16) -> Self {
        LanguageId::unpack(value)
    }
}

impl From<LanguageId> for u16 {
    fn from(lang: LanguageId) -> Self {
        lang.pack()
    }
}

// Primary language ids, a representative subset of winnt.h's LANG_* table.
pub const LANG_NEUTRAL: u16 = 0x00;
pub const LANG_ENGLISH: u16 = 0x09;
pub const LANG_FRENCH: u16 = 0x0C;
pub const LANG_GERMAN: u16 = 0x07;
pub const LANG_SPANISH: u16 = 0x0A;
pub const LANG_JAPANESE: u16 = 0x11;
pub const LANG_CHINESE: u16 = 0x04;
pub const LANG_RUSSIAN: u16 = 0x19;
pub const LANG_PORTUGUESE: u16 = 0x16;
pub const LANG_ITALIAN: u16 = 0x10;
pub const LANG_KOREAN: u16 = 0x12;

pub const SUBLANG_NEUTRAL: u16 = 0x00;
pub const SUBLANG_DEFAULT: u16 = 0x01;
pub const SUBLANG_ENGLISH_US: u16 = 0x01;
pub const SUBLANG_ENGLISH_UK: u16 = 0x02;
pub const SUBLANG_FRENCH: u16 = 0x01;
pub const SUBLANG_GERMAN: u16 = 0x01;
pub const SUBLANG_SPANISH: u16 = 0x01;
pub const SUBLANG_SPANISH_MEXICAN: u16 = 0x02;
pub const SUBLANG_PORTUGUESE_BRAZILIAN: u16 = 0x01;
pub const SUBLANG_PORTUGUESE: u16 = 0x02;
pub const SUBLANG_CHINESE_SIMPLIFIED: u16 = 0x02;
pub const SUBLANG_CHINESE_TRADITIONAL: u16 = 0x01;

/// Resolves a handful of common BCP-47 tags (case-insensitive) accepted by
/// `/ln` to a [`LanguageId`]. Returns `None` for anything not in the table,
/// which the CLI reports as `invalid language tag: <tag>`.
pub fn from_bcp47(tag: &str) -> Option<LanguageId> {
    let lower = tag.to_ascii_lowercase();
    let (primary, sub) = match lower.as_str() {
        "en" => (LANG_ENGLISH, SUBLANG_NEUTRAL),
        "en-us" => (LANG_ENGLISH, SUBLANG_ENGLISH_US),
        "en-gb" => (LANG_ENGLISH, SUBLANG_ENGLISH_UK),
        "fr" | "fr-fr" => (LANG_FRENCH, SUBLANG_FRENCH),
        "de" | "de-de" => (LANG_GERMAN, SUBLANG_GERMAN),
        "es" | "es-es" => (LANG_SPANISH, SUBLANG_SPANISH),
        "es-mx" => (LANG_SPANISH, SUBLANG_SPANISH_MEXICAN),
        "ja" | "ja-jp" => (LANG_JAPANESE, SUBLANG_DEFAULT),
        "ko" | "ko-kr" => (LANG_KOREAN, SUBLANG_DEFAULT),
        "ru" | "ru-ru" => (LANG_RUSSIAN, SUBLANG_DEFAULT),
        "it" | "it-it" => (LANG_ITALIAN, SUBLANG_DEFAULT),
        "pt-br" => (LANG_PORTUGUESE, SUBLANG_PORTUGUESE_BRAZILIAN),
        "pt" | "pt-pt" => (LANG_PORTUGUESE, SUBLANG_PORTUGUESE),
        "zh-cn" | "zh-hans" => (LANG_CHINESE, SUBLANG_CHINESE_SIMPLIFIED),
        "zh-tw" | "zh-hant" => (LANG_CHINESE, SUBLANG_CHINESE_TRADITIONAL),
        "neutral" => (LANG_NEUTRAL, SUBLANG_NEUTRAL),
        _ => return None,
    };
    Some(LanguageId { primary, sub })
}
