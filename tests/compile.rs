use rcc::code_pages::CodePage;
use rcc::diagnostics::DiagnosticSink;
use rcc::res::{rt, NameOrOrdinal};
use rcc::{compile_to_res, CompileSettings};

fn settings() -> CompileSettings {
    CompileSettings {
        default_code_page: CodePage::Windows1252,
        parse: rcc::parse::ParseOptions::default(),
        compile: rcc::compile::CompileOptions::default(),
    }
}

fn compile(source: &str) -> (Vec<u8>, DiagnosticSink) {
    let mut diagnostics = DiagnosticSink::new();
    let bytes = compile_to_res(source.as_bytes(), &settings(), &mut diagnostics).unwrap();
    (bytes, diagnostics)
}

#[test]
fn rcdata_resource_emits_one_record_after_the_sentinel() {
    let (bytes, diags) = compile(r#"IDR_BLOB RCDATA { 1, 2, 3, "hi" }"#);
    assert!(!diags.has_errors());
    let records = rcc::res::read_res_file(&bytes).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].type_id, NameOrOrdinal::Ordinal(rt::RT_RCDATA));
}

#[test]
fn stringtable_bundles_entries_sharing_id_shr_4() {
    let source = r#"
        STRINGTABLE
        BEGIN
            0, "zero"
            1, "one"
            16, "sixteen"
        END
    "#;
    let (bytes, diags) = compile(source);
    assert!(!diags.has_errors());
    let records = rcc::res::read_res_file(&bytes).unwrap();
    // sentinel + bundle 0 (ids 0-15) + bundle 1 (id 16)
    assert_eq!(records.len(), 3);
    assert!(records[1..]
        .iter()
        .all(|r| r.type_id == NameOrOrdinal::Ordinal(rt::RT_STRING)));
}

#[test]
fn stringtable_blocks_merge_bundles_across_definitions() {
    let source = r#"
        STRINGTABLE { 0, "a" }
        STRINGTABLE { 1, "b" }
    "#;
    let (bytes, diags) = compile(source);
    assert!(!diags.has_errors());
    let records = rcc::res::read_res_file(&bytes).unwrap();
    // Both ids fall in bundle 0; they must merge into a single record.
    assert_eq!(records.len(), 2);
}

#[test]
fn duplicate_string_id_across_blocks_is_reported() {
    let source = r#"
        STRINGTABLE { 5, "first" }
        STRINGTABLE { 5, "second" }
    "#;
    let (_bytes, diags) = compile(source);
    assert!(diags.has_errors());
}

#[test]
fn dialog_compiles_with_its_controls() {
    let source = r#"
        IDD_MAIN DIALOGEX 0, 0, 200, 100
        CAPTION "Hello"
        BEGIN
            PUSHBUTTON "OK", IDOK, 10, 10, 50, 14
            LTEXT "Some text", -1, 10, 30, 100, 8
        END
    "#;
    let (bytes, diags) = compile(source);
    assert!(!diags.has_errors());
    let records = rcc::res::read_res_file(&bytes).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].type_id, NameOrOrdinal::Ordinal(rt::RT_DIALOG));
}

#[test]
fn menu_with_nested_popup_compiles() {
    let source = r#"
        IDR_MENU MENU
        BEGIN
            POPUP "&File"
            BEGIN
                MENUITEM "&Open", 101
                MENUITEM SEPARATOR
                MENUITEM "E&xit", 102
            END
        END
    "#;
    let (bytes, diags) = compile(source);
    assert!(!diags.has_errors());
    let records = rcc::res::read_res_file(&bytes).unwrap();
    assert_eq!(records[1].type_id, NameOrOrdinal::Ordinal(rt::RT_MENU));
}

#[test]
fn accelerators_table_compiles() {
    let source = r#"
        IDR_ACCEL ACCELERATORS
        BEGIN
            "^C", 1, ASCII
            0x70, 2, VIRTKEY
        END
    "#;
    let (bytes, diags) = compile(source);
    assert!(!diags.has_errors());
    let records = rcc::res::read_res_file(&bytes).unwrap();
    assert_eq!(records[1].type_id, NameOrOrdinal::Ordinal(rt::RT_ACCELERATOR));
}

#[test]
fn versioninfo_resource_compiles() {
    let source = r#"
        VS_VERSION_INFO VERSIONINFO
        FILEVERSION 1,0,0,1
        PRODUCTVERSION 1,0,0,1
        BEGIN
            BLOCK "StringFileInfo"
            BEGIN
                BLOCK "040904B0"
                BEGIN
                    VALUE "CompanyName", "Example Corp"
                END
            END
            BLOCK "VarFileInfo"
            BEGIN
                VALUE "Translation", 0x0409, 1200
            END
        END
    "#;
    let (bytes, diags) = compile(source);
    assert!(!diags.has_errors());
    let records = rcc::res::read_res_file(&bytes).unwrap();
    assert_eq!(records[1].type_id, NameOrOrdinal::Ordinal(rt::RT_VERSION));
}

#[test]
fn resource_type_six_as_a_numeric_tag_is_rejected() {
    let (_bytes, diags) = compile("IDR_X 6 { 1 }");
    assert!(diags.has_errors());
}

#[test]
fn raw_data_is_forbidden_on_a_standard_type() {
    let (_bytes, diags) = compile("IDC_CUR CURSOR { 1, 2 }");
    assert!(diags.has_errors());
}

#[test]
fn comments_are_stripped_before_parsing() {
    let source = "IDR_X RCDATA { 1 /* trailing */ } // whole-line comment";
    let (_bytes, diags) = compile(source);
    assert!(!diags.has_errors());
}

#[test]
fn unterminated_block_is_a_diagnostic_not_a_panic() {
    let (_bytes, diags) = compile("IDR_X RCDATA { 1, 2");
    assert!(diags.has_errors());
}
