//! Typed AST produced by [`crate::parse`] and consumed by [`crate::compile`].

use crate::lang::LanguageId;

/// A resource name or type: either an ordinal (`u16`) or a string
/// identifier. Spec.md §4.4: "Some types require their id be an ordinal
/// u16".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceId {
    Ordinal(u16),
    Name(String),
}

impl ResourceId {
    pub fn as_ordinal(&self) -> Option<u16> {
        match self {
            ResourceId::Ordinal(n) => Some(*n),
            ResourceId::Name(_) => None,
        }
    }
}

/// The fixed set of standard resource types (the `Resource` enum referred
/// to in spec.md §4.4/§4.5), plus a catch-all for user-defined types which
/// use raw-data body rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Cursor,
    Bitmap,
    Icon,
    Menu,
    MenuEx,
    Dialog,
    DialogEx,
    StringTable,
    FontDir,
    Font,
    Accelerators,
    RcData,
    MessageTable,
    GroupCursor,
    GroupIcon,
    VersionInfo,
    DlgInclude,
    PlugPlay,
    Vxd,
    AniCursor,
    AniIcon,
    Html,
    Manifest,
    /// User-defined type, by ordinal or name; always uses raw-data rules.
    UserDefined(ResourceId),
}

impl ResourceType {
    /// True for the subset of standard types that forbid a raw-data body
    /// (spec.md §4.4 `resource_type_cant_use_raw_data`).
    pub fn forbids_raw_data(&self) -> bool {
        !matches!(self, ResourceType::UserDefined(_) | ResourceType::RcData)
    }

    /// True for types whose name/id must be an ordinal
    /// (`id_must_be_ordinal`).
    pub fn requires_ordinal_id(&self) -> bool {
        matches!(
            self,
            ResourceType::Cursor
                | ResourceType::Icon
                | ResourceType::GroupCursor
                | ResourceType::GroupIcon
        )
    }

    /// The numeric `RT_*` identifier for this type, if it is a standard
    /// type with a fixed numeric type id.
    pub fn numeric_type_id(&self) -> Option<u16> {
        use crate::res::rt;
        Some(match self {
            ResourceType::Cursor => rt::RT_CURSOR,
            ResourceType::Bitmap => rt::RT_BITMAP,
            ResourceType::Icon => rt::RT_ICON,
            ResourceType::Menu | ResourceType::MenuEx => rt::RT_MENU,
            ResourceType::Dialog | ResourceType::DialogEx => rt::RT_DIALOG,
            ResourceType::StringTable => rt::RT_STRING,
            ResourceType::FontDir => rt::RT_FONTDIR,
            ResourceType::Font => rt::RT_FONT,
            ResourceType::Accelerators => rt::RT_ACCELERATOR,
            ResourceType::RcData => rt::RT_RCDATA,
            ResourceType::MessageTable => rt::RT_MESSAGETABLE,
            ResourceType::GroupCursor => rt::RT_GROUP_CURSOR,
            ResourceType::GroupIcon => rt::RT_GROUP_ICON,
            ResourceType::VersionInfo => rt::RT_VERSION,
            ResourceType::DlgInclude => rt::RT_DLGINCLUDE,
            ResourceType::PlugPlay => rt::RT_PLUGPLAY,
            ResourceType::Vxd => rt::RT_VXD,
            ResourceType::AniCursor => rt::RT_ANICURSOR,
            ResourceType::AniIcon => rt::RT_ANIICON,
            ResourceType::Html => rt::RT_HTML,
            ResourceType::Manifest => rt::RT_MANIFEST,
            ResourceType::UserDefined(_) => return None,
        })
    }
}

/// Fields common to every resource definition, set by `CHARACTERISTICS N`
/// and `VERSION N` statements before the body, plus the memory-flag
/// toggles that various keywords (`PRELOAD`, `DISCARDABLE`, ...) set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonResourceOpts {
    pub characteristics: u32,
    pub version: u32,
    pub memory_flags: u16,
}

impl Default for CommonResourceOpts {
    fn default() -> Self {
        CommonResourceOpts {
            characteristics: 0,
            version: 0,
            memory_flags: crate::res::mem_flags::MOVEABLE | crate::res::mem_flags::PURE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDataItem {
    Number(u32),
    AsciiString(Vec<u8>),
    WideString(Vec<u16>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogControl {
    pub class: ControlClass,
    pub text: Option<String>,
    pub id: ResourceId,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub style: u32,
    pub ex_style: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlClass {
    PushButton,
    DefPushButton,
    CheckBox,
    AutoCheckBox,
    RadioButton,
    AutoRadioButton,
    Auto3State,
    State3,
    GroupBox,
    PushBox,
    EditText,
    LText,
    CText,
    RText,
    ListBox,
    ComboBox,
    ScrollBar,
    IconControl,
    /// `CONTROL "text", id, "CLASSNAME", style, x, y, w, h`.
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DialogBody {
    pub is_ex: bool,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub style: u32,
    pub ex_style: u32,
    pub help_id: u32,
    pub caption: Option<String>,
    pub class: Option<ResourceId>,
    pub menu: Option<ResourceId>,
    pub font: Option<(u16, String)>,
    pub controls: Vec<DialogControl>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuItemNode {
    Item {
        text: String,
        id: u16,
        flags: u16,
    },
    Popup {
        text: String,
        flags: u16,
        children: Vec<MenuItemNode>,
    },
    Separator,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MenuBody {
    pub is_ex: bool,
    pub items: Vec<MenuItemNode>,
}

/// `FACCEL` bits for [`AcceleratorEntry::flags`].
pub mod accel_flags {
    pub const FVIRTKEY: u16 = 0x01;
    pub const FNOINVERT: u16 = 0x02;
    pub const FSHIFT: u16 = 0x04;
    pub const FCONTROL: u16 = 0x08;
    pub const FALT: u16 = 0x10;
    /// End-marker bit the compiler sets on the last entry of a table
    /// (spec.md §4.5: "the last carries `FVIRTKEY | 0x80` end-marker
    /// semantics" — `0x80` here is the historical "last entry" bit).
    pub const FLAST: u16 = 0x80;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelEvent {
    Ascii(u8),
    VirtKey(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceleratorEntry {
    pub event: AccelEvent,
    pub id: u16,
    pub flags: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionInfoBody {
    pub file_version: (u16, u16, u16, u16),
    pub product_version: (u16, u16, u16, u16),
    pub file_flags_mask: u32,
    pub file_flags: u32,
    pub file_os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
    /// `StringFileInfo` blocks: `(lang_charset_hex_key, [(key, value), ..])`.
    pub string_file_info: Vec<(String, Vec<(String, String)>)>,
    /// `VarFileInfo` blocks: `(name, [(lang, codepage), ..])`.
    pub var_file_info: Vec<(String, Vec<(u16, u16)>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceBody {
    RawData(Vec<RawDataItem>),
    /// Resource content taken verbatim from an external file (ICON,
    /// BITMAP, CURSOR, FONT, and similar "load from disk" resources).
    File(String),
    StringTable(Vec<(u16, String)>),
    Dialog(DialogBody),
    Menu(MenuBody),
    Accelerators(Vec<AcceleratorEntry>),
    VersionInfo(VersionInfoBody),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDef {
    pub name: ResourceId,
    pub res_type: ResourceType,
    pub common: CommonResourceOpts,
    pub language: Option<LanguageId>,
    pub body: ResourceBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopLevelItem {
    Resource(ResourceDef),
    LanguageStmt(LanguageId),
    VersionStmt(u32),
    CharacteristicsStmt(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct File {
    pub items: Vec<TopLevelItem>,
}
