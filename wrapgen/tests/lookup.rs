//! Recursive member lookup and name-collision behavior across an
//! inheritance chain with an implemented interface.

use std::fs;
use std::sync::LazyLock;

use wrapgen::members::{self, Validated};
use wrapgen::stats::Statistics;
use wrapgen::symbols::SymbolTable;
use wrapgen::parse;

const API: &str = r#"<api parser_version="3">
  <namespace name="Demo" library="libdemo.so">
    <interface name="Scrollable" cname="DemoScrollable">
      <method name="ScrollTo" cname="demo_scrollable_scroll_to">
        <return-type type="void"/>
        <parameters>
          <parameter type="gint" name="position"/>
        </parameters>
      </method>
    </interface>
    <object name="Base" cname="DemoBase">
      <method name="Refresh" cname="demo_base_refresh">
        <return-type type="void"/>
      </method>
      <signal name="Destroyed" cname="destroyed">
        <return-type type="void"/>
      </signal>
    </object>
    <object name="Panel" cname="DemoPanel" parent="DemoBase">
      <implements>
        <interface cname="DemoScrollable"/>
      </implements>
      <method name="Draw" cname="demo_panel_draw">
        <return-type type="void"/>
      </method>
      <method name="Draw" cname="demo_panel_draw_full">
        <return-type type="void"/>
      </method>
    </object>
    <object name="SubPanel" cname="DemoSubPanel" parent="DemoPanel"/>
  </namespace>
</api>
"#;

static VALIDATED: LazyLock<Validated> = LazyLock::new(|| {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lookup-api.xml");
    fs::write(&path, API).unwrap();

    let mut table = SymbolTable::with_builtins();
    let api = parse::parse_file(&path, &[], &mut table).expect("parse lookup fixture");
    table.freeze();
    let mut stats = Statistics::default();
    members::validate(api, &table, &mut stats)
});

#[test]
fn colliding_names_mangle_instead_of_overwriting() {
    let panel = VALIDATED.index.get("DemoPanel").expect("DemoPanel");
    assert!(panel.methods.contains_key("Draw"));
    assert!(panel.methods.contains_key("Drawmangled"));
    assert_eq!(panel.methods["Draw"].def.native_name, "demo_panel_draw");
    assert_eq!(
        panel.methods["Drawmangled"].def.native_name,
        "demo_panel_draw_full"
    );
}

#[test]
fn method_lookup_walks_the_parent_chain() {
    let found = VALIDATED
        .index
        .method_recursively("DemoPanel", "Refresh")
        .expect("Refresh via parent");
    assert_eq!(found.def.native_name, "demo_base_refresh");
}

#[test]
fn interface_members_are_reachable_from_a_subtype_only() {
    // From a subtype, the parent's implemented interfaces are searched.
    let found = VALIDATED
        .index
        .method_recursively("DemoSubPanel", "ScrollTo")
        .expect("ScrollTo via DemoPanel's interface");
    assert_eq!(found.def.native_name, "demo_scrollable_scroll_to");

    // The root-level call stops after the parent chain; the declaring
    // type's own interfaces are not consulted.
    assert!(VALIDATED
        .index
        .method_recursively("DemoPanel", "ScrollTo")
        .is_none());
}

#[test]
fn signal_lookup_walks_the_parent_chain() {
    let found = VALIDATED
        .index
        .signal_recursively("DemoPanel", "Destroyed")
        .expect("Destroyed via parent");
    assert_eq!(found.def.native_name, "destroyed");
}

#[test]
fn unknown_interface_drops_the_class() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad-iface.xml");
    fs::write(
        &path,
        r#"<api parser_version="3">
          <namespace name="Demo" library="libdemo.so">
            <object name="Orphan" cname="DemoOrphan">
              <implements><interface cname="NoSuchInterface"/></implements>
            </object>
          </namespace>
        </api>"#,
    )
    .unwrap();

    let mut table = SymbolTable::with_builtins();
    let api = parse::parse_file(&path, &[], &mut table).unwrap();
    table.freeze();
    let mut stats = Statistics::default();
    let validated = members::validate(api, &table, &mut stats);
    assert!(validated.index.get("DemoOrphan").is_none());
    assert_eq!(stats.throttled_count("classes"), 1);
}
