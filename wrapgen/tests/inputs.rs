//! Fatal-input behavior: malformed documents abort the run, they are never
//! degraded into partial output.

use std::fs;

use wrapgen::parse;
use wrapgen::symbols::SymbolTable;

#[test]
fn malformed_xml_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.xml");
    fs::write(&path, "<api parser_version=\"3\"><namespace>").unwrap();

    let mut table = SymbolTable::with_builtins();
    let err = parse::parse_file(&path, &[], &mut table).unwrap_err();
    assert!(err.to_string().contains("malformed XML"), "{err:#}");
}

#[test]
fn unresolvable_include_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("api.xml");
    fs::write(
        &path,
        "<api parser_version=\"3\"><include xml=\"nowhere.xml\"/></api>",
    )
    .unwrap();

    let mut table = SymbolTable::with_builtins();
    let err = parse::parse_file(&path, &[], &mut table).unwrap_err();
    assert!(
        format!("{err:#}").contains("unresolvable include"),
        "{err:#}"
    );
}

#[test]
fn unparseable_parser_version_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("api.xml");
    fs::write(&path, "<api parser_version=\"banana\"></api>").unwrap();

    let mut table = SymbolTable::with_builtins();
    let err = parse::parse_file(&path, &[], &mut table).unwrap_err();
    assert!(
        format!("{err:#}").contains("unparseable parser_version"),
        "{err:#}"
    );
}

#[test]
fn include_resolves_through_include_dirs() {
    let dir = tempfile::tempdir().unwrap();
    let shared = dir.path().join("shared");
    fs::create_dir_all(&shared).unwrap();
    fs::write(
        shared.join("types.xml"),
        "<api parser_version=\"3\"><namespace name=\"Shared\" library=\"libshared.so\">\
         <alias cname=\"shared_id\" type=\"guint\"/>\
         </namespace></api>",
    )
    .unwrap();

    let main = dir.path().join("nested").join("api.xml");
    fs::create_dir_all(main.parent().unwrap()).unwrap();
    fs::write(
        &main,
        "<api parser_version=\"3\"><include xml=\"types.xml\"/></api>",
    )
    .unwrap();

    let mut table = SymbolTable::with_builtins();
    parse::parse_file(&main, &[shared], &mut table).expect("include should resolve");
    table.freeze();
    assert_eq!(table.managed_name("shared_id"), Some("uint"));
}

#[test]
fn later_document_redefines_included_type() {
    let dir = tempfile::tempdir().unwrap();
    let included = dir.path().join("base.xml");
    fs::write(
        &included,
        "<api parser_version=\"3\"><namespace name=\"A\" library=\"liba.so\">\
         <alias cname=\"shared_t\" type=\"gint\"/>\
         </namespace></api>",
    )
    .unwrap();
    let main = dir.path().join("api.xml");
    fs::write(
        &main,
        "<api parser_version=\"3\"><include xml=\"base.xml\"/>\
         <namespace name=\"B\" library=\"libb.so\">\
         <alias cname=\"shared_t\" type=\"guint\"/>\
         </namespace></api>",
    )
    .unwrap();

    let mut table = SymbolTable::with_builtins();
    parse::parse_file(&main, &[], &mut table).expect("parse");
    table.freeze();
    // The including document's registration wins.
    assert_eq!(table.managed_name("shared_t"), Some("uint"));
}
