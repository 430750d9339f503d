//! Recursive-descent parser: [`crate::lex::Token`] stream to typed
//! [`crate::ast::File`] (spec.md §4.4).

use crate::ast::*;
use crate::code_pages::CodePageMap;
use crate::diagnostics::{DiagnosticCode, DiagnosticSink, Severity};
use crate::lang::LanguageId;
use crate::lex::{self, LexErrorKind, Lexer, Token, TokenId};

/// Parse errors are bounded so a badly malformed file can't make
/// compilation spin forever re-synchronizing (spec.md §4.4 "bounded
/// count").
const MAX_PARSE_ERRORS: usize = 200;

pub struct ParseOptions {
    pub max_string_literal_codepoints: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_string_literal_codepoints: lex::DEFAULT_MAX_STRING_LITERAL_CODEPOINTS,
        }
    }
}

/// Parses an entire (preprocessed, comment-stripped) source buffer.
pub fn parse(
    source: &[u8],
    code_pages: &CodePageMap,
    diagnostics: &mut DiagnosticSink,
    options: &ParseOptions,
) -> File {
    let mut lexer = Lexer::with_max_string_literal_codepoints(source, options.max_string_literal_codepoints);
    let mut tokens = Vec::new();
    loop {
        let tok = lexer.next_token();
        let is_eof = tok.id == TokenId::Eof;
        tokens.push(tok);
        if is_eof {
            break;
        }
    }
    for err in &lexer.errors {
        let code = match err.kind {
            LexErrorKind::UnfinishedStringLiteral => DiagnosticCode::UnfinishedStringLiteral,
            LexErrorKind::StringLiteralTooLong => DiagnosticCode::StringLiteralTooLong,
            LexErrorKind::IllegalByte => DiagnosticCode::IllegalByte,
            LexErrorKind::IllegalByteOutsideStringLiterals => {
                DiagnosticCode::IllegalByteOutsideStringLiterals
            }
            LexErrorKind::FoundCStyleEscapedQuote => DiagnosticCode::FoundCStyleEscapedQuote,
        };
        diagnostics.error_source(code, lex_error_message(err.kind), err.start);
    }

    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        code_pages,
        diagnostics,
        error_count: 0,
    };
    parser.parse_file()
}

fn lex_error_message(kind: LexErrorKind) -> &'static str {
    match kind {
        LexErrorKind::UnfinishedStringLiteral => "unterminated string literal",
        LexErrorKind::StringLiteralTooLong => "string literal exceeds the maximum length",
        LexErrorKind::IllegalByte => "illegal byte in source",
        LexErrorKind::IllegalByteOutsideStringLiterals => "illegal byte outside a string literal",
        LexErrorKind::FoundCStyleEscapedQuote => {
            r#"found C-style escaped quote (\"); use "" instead"#
        }
    }
}

struct Parser<'a, 'd> {
    source: &'a [u8],
    tokens: Vec<Token>,
    pos: usize,
    code_pages: &'a CodePageMap,
    diagnostics: &'d mut DiagnosticSink,
    error_count: usize,
}

impl<'a, 'd> Parser<'a, 'd> {
    fn peek(&self) -> Token {
        self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, delta: usize) -> Token {
        self.tokens[(self.pos + delta).min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let tok = self.peek();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().id == TokenId::Eof
    }

    fn text(&self, tok: Token) -> &str {
        std::str::from_utf8(tok.slice(self.source)).unwrap_or("")
    }

    fn text_eq(&self, tok: Token, kw: &str) -> bool {
        tok.text_eq_ignore_ascii_case(self.source, kw)
    }

    fn report(&mut self, severity: Severity, code: DiagnosticCode, message: impl Into<String>, offset: usize) {
        if self.error_count >= MAX_PARSE_ERRORS {
            return;
        }
        if severity == Severity::Error {
            self.error_count += 1;
        }
        self.diagnostics.push(crate::diagnostics::Diagnostic::source(severity, code, message, offset));
    }

    /// Consumes `id` if present, else emits `expected_token` and does not
    /// advance (so callers can still attempt resynchronization).
    fn expect(&mut self, id: TokenId, what: &str) -> Option<Token> {
        let tok = self.peek();
        if tok.id == id {
            Some(self.bump())
        } else {
            self.report(
                Severity::Error,
                DiagnosticCode::ExpectedToken,
                format!("expected {what}"),
                tok.start,
            );
            None
        }
    }

    fn eat_comma(&mut self) {
        if self.peek().id == TokenId::Comma {
            self.bump();
        }
    }

    /// `BEGIN` or `{` — both flavors are accepted interchangeably (spec.md
    /// §4.4: "the reference compiler accepts mismatched pairs").
    fn expect_block_open(&mut self) -> bool {
        match self.peek().id {
            TokenId::Begin | TokenId::OpenBrace => {
                self.bump();
                true
            }
            _ => {
                self.report(
                    Severity::Error,
                    DiagnosticCode::ExpectedToken,
                    "expected BEGIN or '{'",
                    self.peek().start,
                );
                false
            }
        }
    }

    fn at_block_close(&self) -> bool {
        matches!(self.peek().id, TokenId::End | TokenId::CloseBrace)
    }

    /// Skips forward to the next `END`/`}` (consuming it) or EOF, reporting
    /// `unfinished_*` if EOF is hit first.
    fn resync_to_block_end(&mut self, code: DiagnosticCode, what: &str) {
        while !self.at_block_close() && !self.at_eof() {
            self.bump();
        }
        if self.at_block_close() {
            self.bump();
        } else {
            self.report(Severity::Error, code, format!("unfinished {what}"), self.peek().start);
        }
    }

    // ---- expression grammar -------------------------------------------

    /// `binary| > binary& > additive > unary > primary`, evaluated as u32
    /// with wrap-on-overflow (spec.md §4.4).
    fn parse_expr(&mut self) -> u32 {
        self.parse_bitor()
    }

    fn parse_bitor(&mut self) -> u32 {
        let mut lhs = self.parse_bitand();
        while self.peek().id == TokenId::Pipe {
            self.bump();
            if self.eat_not() {
                lhs &= !self.parse_bitand();
            } else {
                lhs |= self.parse_bitand();
            }
        }
        lhs
    }

    fn parse_bitand(&mut self) -> u32 {
        let mut lhs = self.parse_additive();
        while self.peek().id == TokenId::Ampersand {
            self.bump();
            if self.eat_not() {
                lhs &= !self.parse_additive();
            } else {
                lhs &= self.parse_additive();
            }
        }
        lhs
    }

    /// Consumes a `NOT` keyword if it's next, reporting whether it was
    /// there. `style A | NOT B` clears `B`'s bits from the accumulator
    /// instead of setting them (spec.md §4.4).
    fn eat_not(&mut self) -> bool {
        let tok = self.peek();
        if tok.id == TokenId::Identifier && self.text_eq(tok, "NOT") {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_additive(&mut self) -> u32 {
        let mut lhs = self.parse_unary();
        loop {
            match self.peek().id {
                TokenId::Plus => {
                    self.bump();
                    lhs = lhs.wrapping_add(self.parse_unary());
                }
                TokenId::Minus => {
                    self.bump();
                    lhs = lhs.wrapping_sub(self.parse_unary());
                }
                _ => break,
            }
        }
        lhs
    }

    fn parse_unary(&mut self) -> u32 {
        match self.peek().id {
            TokenId::Minus => {
                self.bump();
                0u32.wrapping_sub(self.parse_unary())
            }
            TokenId::Tilde => {
                self.bump();
                !self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> u32 {
        let tok = self.peek();
        match tok.id {
            TokenId::LiteralNumber => {
                self.bump();
                lex::parse_number_literal(tok.slice(self.source))
            }
            TokenId::OpenParen => {
                self.bump();
                let v = self.parse_expr();
                self.expect(TokenId::CloseParen, "')'");
                v
            }
            _ => {
                self.report(
                    Severity::Error,
                    DiagnosticCode::ExpectedSomethingElse,
                    "expected a numeric expression",
                    tok.start,
                );
                0
            }
        }
    }

    fn parse_string_value(&mut self) -> String {
        let tok = self.peek();
        match tok.id {
            TokenId::QuotedAsciiString => {
                self.bump();
                let cp = self.code_pages.at_line(tok.line_number);
                lex::decode_ascii_string_literal(tok.slice(self.source), cp)
            }
            TokenId::QuotedWideString => {
                self.bump();
                let cp = self.code_pages.at_line(tok.line_number);
                lex::decode_wide_string_literal(tok.slice(self.source), cp)
            }
            _ => {
                self.report(
                    Severity::Error,
                    DiagnosticCode::ExpectedSomethingElse,
                    "expected a string literal",
                    tok.start,
                );
                String::new()
            }
        }
    }

    fn parse_resource_id(&mut self) -> ResourceId {
        let tok = self.peek();
        match tok.id {
            TokenId::LiteralNumber => ResourceId::Ordinal(self.parse_expr() as u16),
            TokenId::Identifier => {
                self.bump();
                ResourceId::Name(self.text(tok).to_ascii_uppercase())
            }
            TokenId::QuotedAsciiString | TokenId::QuotedWideString => {
                ResourceId::Name(self.parse_string_value())
            }
            _ => {
                self.report(
                    Severity::Error,
                    DiagnosticCode::ExpectedSomethingElse,
                    "expected a resource name or id",
                    tok.start,
                );
                self.bump();
                ResourceId::Ordinal(0)
            }
        }
    }

    // ---- top level ------------------------------------------------------

    fn parse_file(&mut self) -> File {
        let mut items = Vec::new();
        while !self.at_eof() {
            if let Some(item) = self.parse_top_level_item() {
                items.push(item);
            }
        }
        File { items }
    }

    fn parse_top_level_item(&mut self) -> Option<TopLevelItem> {
        let tok = self.peek();
        if tok.id == TokenId::Identifier {
            let next = self.peek_at(1);
            let looks_like_preamble = matches!(
                next.id,
                TokenId::LiteralNumber | TokenId::Minus | TokenId::Tilde | TokenId::OpenParen
            );
            if looks_like_preamble && self.text_eq(tok, "LANGUAGE") {
                self.bump();
                let primary = self.parse_expr() as u16;
                self.eat_comma();
                let sub = self.parse_expr() as u16;
                return Some(TopLevelItem::LanguageStmt(LanguageId { primary, sub }));
            }
            if looks_like_preamble && self.text_eq(tok, "VERSION") {
                self.bump();
                return Some(TopLevelItem::VersionStmt(self.parse_expr()));
            }
            if looks_like_preamble && self.text_eq(tok, "CHARACTERISTICS") {
                self.bump();
                return Some(TopLevelItem::CharacteristicsStmt(self.parse_expr()));
            }
        }
        self.parse_resource_def().map(TopLevelItem::Resource)
    }

    fn parse_resource_def(&mut self) -> Option<ResourceDef> {
        let name = self.parse_resource_id();
        let type_tok = self.peek();
        let res_type = self.parse_resource_type();

        if res_type.requires_ordinal_id() && name.as_ordinal().is_none() {
            self.report(
                Severity::Error,
                DiagnosticCode::IdMustBeOrdinal,
                "resource id must be numeric for this type",
                type_tok.start,
            );
        }

        let mut common = CommonResourceOpts::default();
        let mut language = None;
        loop {
            let tok = self.peek();
            if tok.id != TokenId::Identifier {
                break;
            }
            if self.text_eq(tok, "CHARACTERISTICS") {
                self.bump();
                common.characteristics = self.parse_expr();
            } else if self.text_eq(tok, "VERSION") {
                self.bump();
                common.version = self.parse_expr();
            } else if self.text_eq(tok, "LANGUAGE") {
                self.bump();
                let primary = self.parse_expr() as u16;
                self.eat_comma();
                let sub = self.parse_expr() as u16;
                language = Some(LanguageId { primary, sub });
            } else {
                break;
            }
        }

        let body = self.parse_body(&res_type);
        if res_type.forbids_raw_data() {
            if let ResourceBody::RawData(_) = &body {
                self.report(
                    Severity::Error,
                    DiagnosticCode::ResourceTypeCantUseRawData,
                    "this resource type cannot use a raw data body",
                    type_tok.start,
                );
            }
        }

        Some(ResourceDef {
            name,
            res_type,
            common,
            language,
            body,
        })
    }

    fn parse_resource_type(&mut self) -> ResourceType {
        let tok = self.peek();
        match tok.id {
            TokenId::LiteralNumber => {
                let id = self.parse_expr() as u16;
                ResourceType::UserDefined(ResourceId::Ordinal(id))
            }
            TokenId::Identifier => {
                self.bump();
                match self.text(tok).to_ascii_uppercase().as_str() {
                    "CURSOR" => ResourceType::Cursor,
                    "BITMAP" => ResourceType::Bitmap,
                    "ICON" => ResourceType::Icon,
                    "MENU" => ResourceType::Menu,
                    "MENUEX" => ResourceType::MenuEx,
                    "DIALOG" => ResourceType::Dialog,
                    "DIALOGEX" => ResourceType::DialogEx,
                    "STRINGTABLE" => ResourceType::StringTable,
                    "FONTDIR" => ResourceType::FontDir,
                    "FONT" => ResourceType::Font,
                    "ACCELERATORS" => ResourceType::Accelerators,
                    "RCDATA" => ResourceType::RcData,
                    "MESSAGETABLE" => ResourceType::MessageTable,
                    "VERSIONINFO" => ResourceType::VersionInfo,
                    "DLGINCLUDE" => ResourceType::DlgInclude,
                    "PLUGPLAY" => ResourceType::PlugPlay,
                    "VXD" => ResourceType::Vxd,
                    "HTML" => ResourceType::Html,
                    "MANIFEST" => ResourceType::Manifest,
                    other => ResourceType::UserDefined(ResourceId::Name(other.to_string())),
                }
            }
            _ => {
                self.report(
                    Severity::Error,
                    DiagnosticCode::ExpectedSomethingElse,
                    "expected a resource type",
                    tok.start,
                );
                ResourceType::UserDefined(ResourceId::Ordinal(0))
            }
        }
    }

    fn parse_body(&mut self, res_type: &ResourceType) -> ResourceBody {
        match res_type {
            ResourceType::Cursor
            | ResourceType::Bitmap
            | ResourceType::Icon
            | ResourceType::Font
            | ResourceType::FontDir
            | ResourceType::MessageTable
            | ResourceType::Html
            | ResourceType::Manifest
            | ResourceType::DlgInclude
            | ResourceType::PlugPlay
            | ResourceType::Vxd
            | ResourceType::AniCursor
            | ResourceType::AniIcon
            | ResourceType::GroupCursor
            | ResourceType::GroupIcon => ResourceBody::File(self.parse_string_value()),
            ResourceType::StringTable => ResourceBody::StringTable(self.parse_string_table_body()),
            ResourceType::Dialog | ResourceType::DialogEx => {
                ResourceBody::Dialog(self.parse_dialog_body(matches!(res_type, ResourceType::DialogEx)))
            }
            ResourceType::Menu | ResourceType::MenuEx => {
                ResourceBody::Menu(self.parse_menu_body(matches!(res_type, ResourceType::MenuEx)))
            }
            ResourceType::Accelerators => ResourceBody::Accelerators(self.parse_accelerators_body()),
            ResourceType::VersionInfo => ResourceBody::VersionInfo(self.parse_version_info_body()),
            ResourceType::RcData | ResourceType::UserDefined(_) => {
                ResourceBody::RawData(self.parse_raw_data_body())
            }
        }
    }

    fn parse_raw_data_body(&mut self) -> Vec<RawDataItem> {
        if !self.expect_block_open() {
            return Vec::new();
        }
        let mut items = Vec::new();
        while !self.at_block_close() && !self.at_eof() {
            let tok = self.peek();
            match tok.id {
                TokenId::QuotedAsciiString => {
                    self.bump();
                    let cp = self.code_pages.at_line(tok.line_number);
                    let s = lex::decode_ascii_string_literal(tok.slice(self.source), cp);
                    items.push(RawDataItem::AsciiString(s.into_bytes()));
                }
                TokenId::QuotedWideString => {
                    self.bump();
                    let cp = self.code_pages.at_line(tok.line_number);
                    let s = lex::decode_wide_string_literal(tok.slice(self.source), cp);
                    items.push(RawDataItem::WideString(s.encode_utf16().collect()));
                }
                _ => items.push(RawDataItem::Number(self.parse_expr())),
            }
            self.eat_comma();
        }
        self.resync_to_block_end(DiagnosticCode::UnfinishedRawDataBlock, "RCDATA block");
        items
    }

    fn parse_string_table_body(&mut self) -> Vec<(u16, String)> {
        if !self.expect_block_open() {
            return Vec::new();
        }
        let mut entries = Vec::new();
        while !self.at_block_close() && !self.at_eof() {
            let id = self.parse_expr() as u16;
            self.eat_comma();
            let value = self.parse_string_value();
            entries.push((id, value));
        }
        self.resync_to_block_end(DiagnosticCode::UnfinishedStringTableBlock, "STRINGTABLE block");
        entries
    }

    fn parse_dialog_body(&mut self, is_ex: bool) -> DialogBody {
        let mut body = DialogBody {
            is_ex,
            ..Default::default()
        };
        body.x = self.parse_expr() as i32;
        self.eat_comma();
        body.y = self.parse_expr() as i32;
        self.eat_comma();
        body.width = self.parse_expr() as i32;
        self.eat_comma();
        body.height = self.parse_expr() as i32;
        if self.peek().id == TokenId::Comma {
            self.bump();
            body.help_id = self.parse_expr();
        }

        while self.peek().id == TokenId::Identifier && !self.at_eof() {
            let tok = self.peek();
            if self.text_eq(tok, "STYLE") {
                self.bump();
                body.style = self.parse_expr();
            } else if self.text_eq(tok, "EXSTYLE") {
                self.bump();
                body.ex_style = self.parse_expr();
            } else if self.text_eq(tok, "CAPTION") {
                self.bump();
                body.caption = Some(self.parse_string_value());
            } else if self.text_eq(tok, "CLASS") {
                self.bump();
                body.class = Some(self.parse_resource_id());
            } else if self.text_eq(tok, "MENU") {
                self.bump();
                body.menu = Some(self.parse_resource_id());
            } else if self.text_eq(tok, "FONT") {
                self.bump();
                let size = self.parse_expr() as u16;
                self.eat_comma();
                let name = self.parse_string_value();
                body.font = Some((size, name));
            } else if self.text_eq(tok, "CHARACTERISTICS") || self.text_eq(tok, "LANGUAGE") {
                // Handled uniformly as a common resource option upstream;
                // a dialog may also repeat them here per rc.exe grammar.
                self.bump();
                let _ = self.parse_expr();
                if self.peek().id == TokenId::Comma {
                    self.bump();
                    let _ = self.parse_expr();
                }
            } else {
                break;
            }
        }

        if !self.expect_block_open() {
            return body;
        }
        while !self.at_block_close() && !self.at_eof() {
            if let Some(control) = self.parse_dialog_control() {
                body.controls.push(control);
            } else {
                break;
            }
        }
        self.resync_to_block_end(DiagnosticCode::ExpectedToken, "DIALOG block");
        body
    }

    fn parse_dialog_control(&mut self) -> Option<DialogControl> {
        let tok = self.peek();
        if tok.id != TokenId::Identifier {
            self.report(Severity::Error, DiagnosticCode::ExpectedToken, "expected a control statement", tok.start);
            return None;
        }
        let keyword = self.text(tok).to_ascii_uppercase();
        self.bump();

        let text_first: Option<ControlClass> = match keyword.as_str() {
            "PUSHBUTTON" => Some(ControlClass::PushButton),
            "DEFPUSHBUTTON" => Some(ControlClass::DefPushButton),
            "CHECKBOX" => Some(ControlClass::CheckBox),
            "AUTOCHECKBOX" => Some(ControlClass::AutoCheckBox),
            "RADIOBUTTON" => Some(ControlClass::RadioButton),
            "AUTORADIOBUTTON" => Some(ControlClass::AutoRadioButton),
            "AUTO3STATE" => Some(ControlClass::Auto3State),
            "STATE3" => Some(ControlClass::State3),
            "GROUPBOX" => Some(ControlClass::GroupBox),
            "PUSHBOX" => Some(ControlClass::PushBox),
            "LTEXT" => Some(ControlClass::LText),
            "CTEXT" => Some(ControlClass::CText),
            "RTEXT" => Some(ControlClass::RText),
            "ICON" => Some(ControlClass::IconControl),
            _ => None,
        };

        if let Some(class) = text_first {
            let text = Some(self.parse_string_value());
            self.eat_comma();
            let id = self.parse_resource_id();
            self.eat_comma();
            let x = self.parse_expr() as i32;
            self.eat_comma();
            let y = self.parse_expr() as i32;
            self.eat_comma();
            let width = self.parse_expr() as i32;
            self.eat_comma();
            let height = self.parse_expr() as i32;
            let mut style = 0;
            let mut ex_style = 0;
            if self.peek().id == TokenId::Comma {
                self.bump();
                style = self.parse_expr();
                if self.peek().id == TokenId::Comma {
                    self.bump();
                    ex_style = self.parse_expr();
                }
            }
            return Some(DialogControl {
                class,
                text,
                id,
                x,
                y,
                width,
                height,
                style,
                ex_style,
            });
        }

        let no_text: Option<ControlClass> = match keyword.as_str() {
            "EDITTEXT" => Some(ControlClass::EditText),
            "LISTBOX" => Some(ControlClass::ListBox),
            "COMBOBOX" => Some(ControlClass::ComboBox),
            "SCROLLBAR" => Some(ControlClass::ScrollBar),
            _ => None,
        };
        if let Some(class) = no_text {
            let id = self.parse_resource_id();
            self.eat_comma();
            let x = self.parse_expr() as i32;
            self.eat_comma();
            let y = self.parse_expr() as i32;
            self.eat_comma();
            let width = self.parse_expr() as i32;
            self.eat_comma();
            let height = self.parse_expr() as i32;
            let mut style = 0;
            let mut ex_style = 0;
            if self.peek().id == TokenId::Comma {
                self.bump();
                style = self.parse_expr();
                if self.peek().id == TokenId::Comma {
                    self.bump();
                    ex_style = self.parse_expr();
                }
            }
            return Some(DialogControl {
                class,
                text: None,
                id,
                x,
                y,
                width,
                height,
                style,
                ex_style,
            });
        }

        if keyword == "CONTROL" {
            let text = Some(self.parse_string_value());
            self.eat_comma();
            let id = self.parse_resource_id();
            self.eat_comma();
            let class_tok = self.peek();
            let class = if class_tok.id == TokenId::QuotedAsciiString || class_tok.id == TokenId::QuotedWideString {
                ControlClass::Named(self.parse_string_value())
            } else {
                ControlClass::Named(self.text(self.peek()).to_string())
            };
            if matches!(class_tok.id, TokenId::Identifier) {
                self.bump();
            }
            self.eat_comma();
            let style = self.parse_expr();
            self.eat_comma();
            let x = self.parse_expr() as i32;
            self.eat_comma();
            let y = self.parse_expr() as i32;
            self.eat_comma();
            let width = self.parse_expr() as i32;
            self.eat_comma();
            let height = self.parse_expr() as i32;
            let mut ex_style = 0;
            if self.peek().id == TokenId::Comma {
                self.bump();
                ex_style = self.parse_expr();
            }
            return Some(DialogControl {
                class,
                text,
                id,
                x,
                y,
                width,
                height,
                style,
                ex_style,
            });
        }

        self.report(
            Severity::Error,
            DiagnosticCode::ExpectedSomethingElse,
            format!("unknown control statement '{keyword}'"),
            tok.start,
        );
        None
    }

    fn parse_menu_body(&mut self, is_ex: bool) -> MenuBody {
        if !self.expect_block_open() {
            return MenuBody { is_ex, items: Vec::new() };
        }
        let items = self.parse_menu_items();
        self.resync_to_block_end(DiagnosticCode::ExpectedToken, "MENU block");
        MenuBody { is_ex, items }
    }

    fn parse_menu_items(&mut self) -> Vec<MenuItemNode> {
        let mut items = Vec::new();
        while !self.at_block_close() && !self.at_eof() {
            let tok = self.peek();
            if tok.id != TokenId::Identifier {
                break;
            }
            if self.text_eq(tok, "POPUP") {
                self.bump();
                let text = self.parse_string_value();
                self.eat_comma();
                let mut flags = 0;
                while self.peek().id != TokenId::Begin && self.peek().id != TokenId::OpenBrace && !self.at_eof() {
                    flags |= self.parse_menu_item_flag();
                    self.eat_comma();
                }
                if !self.expect_block_open() {
                    break;
                }
                let children = self.parse_menu_items();
                self.resync_to_block_end(DiagnosticCode::ExpectedToken, "POPUP block");
                items.push(MenuItemNode::Popup { text, flags, children });
            } else if self.text_eq(tok, "MENUITEM") {
                self.bump();
                if self.peek().id == TokenId::Identifier && self.text_eq(self.peek(), "SEPARATOR") {
                    self.bump();
                    items.push(MenuItemNode::Separator);
                } else {
                    let text = self.parse_string_value();
                    self.eat_comma();
                    let id = self.parse_expr() as u16;
                    let mut flags = 0;
                    while self.peek().id == TokenId::Comma {
                        self.bump();
                        flags |= self.parse_menu_item_flag();
                    }
                    items.push(MenuItemNode::Item { text, id, flags });
                }
            } else {
                break;
            }
        }
        items
    }

    /// A bare flag keyword (`CHECKED`, `GRAYED`, ...) or a numeric
    /// expression, either of which OR into the running flags word.
    fn parse_menu_item_flag(&mut self) -> u16 {
        let tok = self.peek();
        if tok.id == TokenId::Identifier {
            self.bump();
            match self.text(tok).to_ascii_uppercase().as_str() {
                "CHECKED" => 0x0008,
                "GRAYED" => 0x0001,
                "HELP" => 0x4000,
                "INACTIVE" => 0x0002,
                "MENUBARBREAK" => 0x0020,
                "MENUBREAK" => 0x0040,
                _ => 0,
            }
        } else {
            self.parse_expr() as u16
        }
    }

    fn parse_accelerators_body(&mut self) -> Vec<AcceleratorEntry> {
        if !self.expect_block_open() {
            return Vec::new();
        }
        let mut entries = Vec::new();
        while !self.at_block_close() && !self.at_eof() {
            let tok = self.peek();
            let event = if tok.id == TokenId::QuotedAsciiString {
                self.bump();
                let cp = self.code_pages.at_line(tok.line_number);
                let s = lex::decode_ascii_string_literal(tok.slice(self.source), cp);
                AccelEvent::Ascii(s.bytes().next().unwrap_or(0))
            } else {
                AccelEvent::VirtKey(self.parse_expr())
            };
            self.eat_comma();
            let id = self.parse_expr() as u16;
            let mut flags: u16 = 0;
            while self.peek().id == TokenId::Comma {
                self.bump();
                let flag_tok = self.peek();
                if flag_tok.id == TokenId::Identifier {
                    self.bump();
                    flags |= match self.text(flag_tok).to_ascii_uppercase().as_str() {
                        "ASCII" => 0,
                        "VIRTKEY" => accel_flags::FVIRTKEY,
                        "NOINVERT" => accel_flags::FNOINVERT,
                        "ALT" => accel_flags::FALT,
                        "SHIFT" => accel_flags::FSHIFT,
                        "CONTROL" => accel_flags::FCONTROL,
                        _ => 0,
                    };
                }
            }
            entries.push(AcceleratorEntry { event, id, flags });
        }
        self.resync_to_block_end(DiagnosticCode::ExpectedToken, "ACCELERATORS block");
        entries
    }

    fn parse_version_info_body(&mut self) -> VersionInfoBody {
        let mut body = VersionInfoBody::default();
        while self.peek().id == TokenId::Identifier {
            let tok = self.peek();
            if self.text_eq(tok, "FILEVERSION") {
                self.bump();
                body.file_version = self.parse_version_quad();
            } else if self.text_eq(tok, "PRODUCTVERSION") {
                self.bump();
                body.product_version = self.parse_version_quad();
            } else if self.text_eq(tok, "FILEFLAGSMASK") {
                self.bump();
                body.file_flags_mask = self.parse_expr();
            } else if self.text_eq(tok, "FILEFLAGS") {
                self.bump();
                body.file_flags = self.parse_expr();
            } else if self.text_eq(tok, "FILEOS") {
                self.bump();
                body.file_os = self.parse_expr();
            } else if self.text_eq(tok, "FILETYPE") {
                self.bump();
                body.file_type = self.parse_expr();
            } else if self.text_eq(tok, "FILESUBTYPE") {
                self.bump();
                body.file_subtype = self.parse_expr();
            } else {
                break;
            }
        }

        if !self.expect_block_open() {
            return body;
        }
        while !self.at_block_close() && !self.at_eof() {
            let tok = self.peek();
            if tok.id != TokenId::Identifier || !self.text_eq(tok, "BLOCK") {
                self.report(
                    Severity::Error,
                    DiagnosticCode::ExpectedSomethingElse,
                    "expected a BLOCK statement",
                    tok.start,
                );
                break;
            }
            self.bump();
            let block_name = self.parse_string_value();
            if !self.expect_block_open() {
                break;
            }
            if block_name.eq_ignore_ascii_case("StringFileInfo") {
                let mut table_entries = Vec::new();
                let mut table_key = String::new();
                while !self.at_block_close() && !self.at_eof() {
                    let inner_tok = self.peek();
                    if inner_tok.id != TokenId::Identifier || !self.text_eq(inner_tok, "BLOCK") {
                        break;
                    }
                    self.bump();
                    table_key = self.parse_string_value();
                    if !self.expect_block_open() {
                        break;
                    }
                    table_entries = self.parse_version_value_pairs();
                    self.resync_to_block_end(DiagnosticCode::ExpectedToken, "VERSIONINFO string table block");
                }
                body.string_file_info.push((table_key, table_entries));
                self.resync_to_block_end(DiagnosticCode::ExpectedToken, "StringFileInfo block");
            } else if block_name.eq_ignore_ascii_case("VarFileInfo") {
                let mut values = Vec::new();
                while !self.at_block_close() && !self.at_eof() {
                    let inner_tok = self.peek();
                    if inner_tok.id != TokenId::Identifier || !self.text_eq(inner_tok, "VALUE") {
                        break;
                    }
                    self.bump();
                    let _name = self.parse_string_value();
                    self.eat_comma();
                    let lang = self.parse_expr() as u16;
                    self.eat_comma();
                    let codepage = self.parse_expr() as u16;
                    values.push((lang, codepage));
                }
                body.var_file_info.push((block_name, values));
                self.resync_to_block_end(DiagnosticCode::ExpectedToken, "VarFileInfo block");
            } else {
                self.resync_to_block_end(DiagnosticCode::ExpectedToken, "unknown VERSIONINFO block");
            }
        }
        self.resync_to_block_end(DiagnosticCode::ExpectedToken, "VERSIONINFO block");
        body
    }

    fn parse_version_value_pairs(&mut self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        while !self.at_block_close() && !self.at_eof() {
            let tok = self.peek();
            if tok.id != TokenId::Identifier || !self.text_eq(tok, "VALUE") {
                break;
            }
            self.bump();
            let key = self.parse_string_value();
            self.eat_comma();
            let value = self.parse_string_value();
            out.push((key, value));
        }
        out
    }

    fn parse_version_quad(&mut self) -> (u16, u16, u16, u16) {
        let a = self.parse_expr() as u16;
        self.eat_comma();
        let b = self.parse_expr() as u16;
        self.eat_comma();
        let c = self.parse_expr() as u16;
        self.eat_comma();
        let d = self.parse_expr() as u16;
        (a, b, c, d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_pages::{scan_and_strip_pragmas, CodePage};

    fn parse_str(src: &str) -> (File, DiagnosticSink) {
        let (stripped, map) = scan_and_strip_pragmas(src.as_bytes(), CodePage::Windows1252);
        let mut diagnostics = DiagnosticSink::new();
        let file = parse(&stripped, &map, &mut diagnostics, &ParseOptions::default());
        (file, diagnostics)
    }

    #[test]
    fn parses_simple_rcdata() {
        let (file, diags) = parse_str(r#"IDR_DATA RCDATA { 1, 2, "hi" }"#);
        assert!(!diags.has_errors());
        assert_eq!(file.items.len(), 1);
        match &file.items[0] {
            TopLevelItem::Resource(def) => {
                assert_eq!(def.name, ResourceId::Name("IDR_DATA".to_string()));
                assert_eq!(def.res_type, ResourceType::RcData);
                match &def.body {
                    ResourceBody::RawData(items) => assert_eq!(items.len(), 3),
                    _ => panic!("expected raw data body"),
                }
            }
            _ => panic!("expected resource def"),
        }
    }

    #[test]
    fn parses_stringtable() {
        let (file, diags) = parse_str(r#"STRINGTABLE BEGIN 1, "one" 2, "two" END"#);
        assert!(!diags.has_errors());
        match &file.items[0] {
            TopLevelItem::Resource(def) => match &def.body {
                ResourceBody::StringTable(entries) => {
                    assert_eq!(entries, &vec![(1, "one".to_string()), (2, "two".to_string())]);
                }
                _ => panic!("expected stringtable body"),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn top_level_language_statement() {
        let (file, diags) = parse_str("LANGUAGE 9, 1\n1 RCDATA { 1 }");
        assert!(!diags.has_errors());
        assert!(matches!(file.items[0], TopLevelItem::LanguageStmt(_)));
    }

    #[test]
    fn dialog_with_controls() {
        let src = r#"
            IDD_MAIN DIALOGEX 0, 0, 200, 100
            STYLE 0x10
            CAPTION "Hi"
            BEGIN
                LTEXT "Label", IDC_LABEL, 10, 10, 50, 10
                PUSHBUTTON "OK", IDOK, 10, 80, 50, 14
            END
        "#;
        let (file, diags) = parse_str(src);
        assert!(!diags.has_errors());
        match &file.items[0] {
            TopLevelItem::Resource(def) => match &def.body {
                ResourceBody::Dialog(dialog) => {
                    assert_eq!(dialog.controls.len(), 2);
                    assert_eq!(dialog.caption.as_deref(), Some("Hi"));
                }
                _ => panic!("expected dialog body"),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn not_clears_the_named_bit_in_a_style_expression() {
        let src = r#"
            IDD_MAIN DIALOGEX 0, 0, 200, 100
            STYLE 0x12 | NOT 0x02
            BEGIN
            END
        "#;
        let (file, diags) = parse_str(src);
        assert!(!diags.has_errors());
        match &file.items[0] {
            TopLevelItem::Resource(def) => match &def.body {
                ResourceBody::Dialog(dialog) => assert_eq!(dialog.style, 0x10),
                _ => panic!("expected dialog body"),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn menu_with_popup() {
        let src = r#"
            IDR_MENU MENU
            BEGIN
                POPUP "&File"
                BEGIN
                    MENUITEM "E&xit", ID_EXIT
                    MENUITEM SEPARATOR
                END
            END
        "#;
        let (file, diags) = parse_str(src);
        assert!(!diags.has_errors());
        match &file.items[0] {
            TopLevelItem::Resource(def) => match &def.body {
                ResourceBody::Menu(menu) => {
                    assert_eq!(menu.items.len(), 1);
                    match &menu.items[0] {
                        MenuItemNode::Popup { children, .. } => assert_eq!(children.len(), 2),
                        _ => panic!("expected popup"),
                    }
                }
                _ => panic!("expected menu body"),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn unfinished_block_is_reported() {
        let (_, diags) = parse_str("1 RCDATA { 1, 2");
        assert!(diags.has_errors());
        assert!(diags.iter().any(|d| d.code == DiagnosticCode::UnfinishedRawDataBlock));
    }

    #[test]
    fn raw_data_forbidden_for_standard_type() {
        let (_, diags) = parse_str("1 BITMAP { 1 }");
        // BITMAP's body is actually a file path string, so "{ 1 }" trips an
        // expected-string-literal error rather than the raw-data-forbidden
        // check; this documents that interaction.
        assert!(diags.has_errors());
    }

    #[test]
    fn numeric_type_id_six_is_user_defined_not_stringtable() {
        let (file, _diags) = parse_str("1 6 { 1 }");
        match &file.items[0] {
            TopLevelItem::Resource(def) => {
                assert_eq!(def.res_type, ResourceType::UserDefined(ResourceId::Ordinal(6)));
            }
            _ => panic!(),
        }
    }
}
