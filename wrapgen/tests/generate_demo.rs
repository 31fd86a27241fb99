//! End-to-end test: parse demo-api.xml → generate wrapper units → inspect
//! the rendered decisions.

use std::path::Path;
use std::sync::LazyLock;

use wrapgen::emit::Output;

static DEMO: LazyLock<Output> = LazyLock::new(|| {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/demo.toml");
    wrapgen::generate(&path).expect("generate demo wrappers")
});

fn unit(name: &str) -> &'static str {
    DEMO.units
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, text)| text.as_str())
        .unwrap_or_else(|| {
            let names: Vec<&String> = DEMO.units.iter().map(|(n, _)| n).collect();
            panic!("unit {name} missing. Found: {names:?}")
        })
}

#[test]
fn units_present() {
    let names: Vec<&String> = DEMO.units.iter().map(|(n, _)| n).collect();
    for expected in [
        "Demo.Widget",
        "Demo.Rect",
        "Demo.RectPair",
        "Demo.Mystery",
        "Demo.Event",
        "Demo.Color",
        "Demo.CompareFunc",
    ] {
        assert!(
            names.iter().any(|n| *n == expected),
            "{expected} missing. Found: {names:?}"
        );
    }
}

#[test]
fn included_types_resolve_but_do_not_generate() {
    // glue-extra.xml feeds the symbol table only.
    assert!(!DEMO.units.iter().any(|(n, _)| n == "Glue.Pair"));
    // ...but its alias is usable from the including document.
    let widget = unit("Demo.Widget");
    assert!(
        widget.contains("public int IndexOf("),
        "DemoIndex alias should resolve to int:\n{widget}"
    );
}

#[test]
fn accessor_pair_fuses_into_property() {
    let widget = unit("Demo.Widget");
    assert!(widget.contains("public string Name {"), "{widget}");
    assert!(
        widget.contains("get { return Marshaller.utf8_ptr_to_string(demo_widget_get_name(handle)); }"),
        "{widget}"
    );
    assert!(
        widget.contains("set { demo_widget_set_name(handle, Marshaller.string_to_utf8_ptr(value)); }"),
        "{widget}"
    );
    // Neither accessor surfaces as a plain method.
    assert!(!widget.contains("public string GetName("), "{widget}");
    assert!(!widget.contains("public void SetName("), "{widget}");
}

#[test]
fn owned_return_requests_ownership_transfer() {
    let widget = unit("Demo.Widget");
    assert!(
        widget.contains("return new Demo.Widget(raw_ret, true);"),
        "owned return must use the ownership-taking constructor:\n{widget}"
    );
}

#[test]
fn array_count_pair_hides_count_and_computes_it() {
    let widget = unit("Demo.Widget");

    // Declared order array-then-count.
    assert!(
        widget.contains("import void demo_widget_append_values(ptr raw, u32[] values, i32 n_values);"),
        "{widget}"
    );
    assert!(
        widget.contains(
            "demo_widget_append_values(handle, values, (int) (values == null ? 0 : values.length));"
        ),
        "{widget}"
    );

    // Inverted order count-then-array.
    assert!(
        widget.contains("import void demo_widget_set_values(ptr raw, i32 n_values, u32[] values);"),
        "{widget}"
    );
    assert!(
        widget.contains(
            "demo_widget_set_values(handle, (int) (values == null ? 0 : values.length), values);"
        ),
        "{widget}"
    );

    // The public signatures expose only the array.
    assert!(widget.contains("public void AppendValues(uint[] values)"), "{widget}");
    assert!(widget.contains("public void SetValues(uint[] values)"), "{widget}");
}

#[test]
fn ellipsis_method_is_excluded_entirely() {
    let widget = unit("Demo.Widget");
    assert!(
        !widget.contains("demo_widget_format"),
        "variadic method must not emit any signature:\n{widget}"
    );
}

#[test]
fn throwing_method_hides_error_slot_and_checks_it() {
    let widget = unit("Demo.Widget");
    assert!(
        widget.contains("import bool demo_widget_load(ptr raw, ptr path, out ptr error);"),
        "{widget}"
    );
    assert!(widget.contains("public bool Load(string path)"), "{widget}");
    assert!(widget.contains("ptr error = nullptr;"), "{widget}");
    assert!(widget.contains("Marshaller.throw_on_error(error);"), "{widget}");
}

#[test]
fn const_string_release_runs_in_cleanup_region() {
    let widget = unit("Demo.Widget");
    assert!(
        widget.contains("ptr native_path = Marshaller.string_to_utf8_ptr(path);"),
        "{widget}"
    );
    let finally_idx = widget.find("} finally {").expect("cleanup region");
    let release_idx = widget
        .find("Marshaller.free_native(native_path);")
        .expect("release statement");
    assert!(
        release_idx > finally_idx,
        "release must live in the guaranteed-cleanup region:\n{widget}"
    );
}

#[test]
fn struct_param_stages_through_native_buffer() {
    let widget = unit("Demo.Widget");
    assert!(
        widget.contains("ptr native_area = Marshaller.struct_to_ptr_alloc(area);"),
        "{widget}"
    );
    assert!(widget.contains("Marshaller.free_native(native_area);"), "{widget}");
}

#[test]
fn declared_property_suppresses_accessor_methods() {
    let widget = unit("Demo.Widget");
    assert!(widget.contains("public double Opacity { get; set; }"), "{widget}");
}

#[test]
fn constructor_clash_demotes_exactly_one() {
    let widget = unit("Demo.Widget");
    // The first string-taking constructor stays an instance constructor.
    assert!(widget.contains("public Widget(string label)"), "{widget}");
    // The second is demoted to a deterministic static factory.
    assert!(
        widget.contains("public static Widget NewFromFile(string filename)"),
        "{widget}"
    );
    assert!(!widget.contains("public Widget(string filename)"), "{widget}");
}

#[test]
fn plain_struct_generates_fields_and_abi() {
    let rect = unit("Demo.Rect");
    for field in ["public int X;", "public int Y;", "public int Width;", "public int Height;"] {
        assert!(rect.contains(field), "{rect}");
    }
    // Equality and hashing include every field by value.
    assert!(rect.contains("equality (Height, Width, X, Y);"), "{rect}");
    assert!(rect.contains("abi DemoRect {"), "{rect}");
    assert!(
        rect.contains("field x prev=- next=y size=sizeof(int) align=offsetof(DemoRect_xAlign, x) bits=0;"),
        "{rect}"
    );
    assert!(rect.contains("field height prev=width next=- "), "{rect}");
}

#[test]
fn fieldless_child_inherits_parent_abi() {
    let pair = unit("Demo.RectPair");
    assert!(
        pair.contains("abi DemoRectPair = inherit DemoRect;"),
        "{pair}"
    );
}

#[test]
fn abi_invalid_struct_still_generates_plain_wrapper() {
    let mystery = unit("Demo.Mystery");
    assert!(
        !mystery.contains("abi DemoMystery"),
        "invalid ABI must withhold the entire description:\n{mystery}"
    );
    // The managed wrapper itself still exists.
    assert!(mystery.contains("struct Mystery {"), "{mystery}");
}

#[test]
fn union_layout_defers_max_size_to_groups() {
    let event = unit("Demo.Event");
    assert!(event.contains("field data.index "), "{event}");
    assert!(event.contains("field data.Point.px "), "{event}");
    assert!(event.contains("field data.Point.py "), "{event}");
    assert!(
        event.contains("size=max-of-groups[data.index | data.Point.px,data.Point.py]"),
        "{event}"
    );
}

#[test]
fn registration_lists_objects_only() {
    let registration = DEMO.registration.as_deref().expect("registration map");
    assert!(registration.contains("DemoWidget Demo.Widget"));
    assert!(!registration.contains("DemoRect"));
}

#[test]
fn abi_check_pair_prints_matching_keys() {
    let native = DEMO.abi_check_native.as_deref().expect("native abi check");
    let managed = DEMO.abi_check_managed.as_deref().expect("managed abi check");
    assert!(native.contains("sizeof(DemoRect)"));
    assert!(managed.contains("sizeof(DemoRect)"));
    assert!(native.contains("offsetof(DemoRect, width)"));
    assert!(managed.contains("DemoRect.width"));
    // The invalid struct appears in neither side.
    assert!(!native.contains("DemoMystery"));
    assert!(!managed.contains("DemoMystery"));
}

#[test]
fn glue_output_present() {
    let glue = DEMO.glue.as_deref().expect("glue source");
    assert!(glue.contains("demorect_abi_dump"));
}
