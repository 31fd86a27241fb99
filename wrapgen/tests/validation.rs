//! Validation-phase behavior: throttling, hidden-slot detection, ownership
//! propagation, and determinism of constructor demotion.

use std::path::Path;

use wrapgen::emit::render_expr;
use wrapgen::ir::{Expr, PassDir};
use wrapgen::members;
use wrapgen::model::{ParamDef, ParserVersion, RetDef};
use wrapgen::params::{ParamKind, Parameters, ReturnPlan};
use wrapgen::stats::Statistics;
use wrapgen::strategy::{DeclaredKind, Strategy, StrategyBase};
use wrapgen::symbols::SymbolTable;
use wrapgen::{parse, strategy};

fn demo_validated() -> (members::Validated, Statistics) {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let mut table = SymbolTable::with_builtins();
    let api = parse::parse_file(&fixtures.join("demo-api.xml"), &[], &mut table)
        .expect("parse demo-api.xml");
    table.freeze();
    let mut stats = Statistics::default();
    (members::validate(api, &table, &mut stats), stats)
}

fn param(name: &str, ty: &str) -> ParamDef {
    ParamDef {
        name: name.to_string(),
        native_type: ty.to_string(),
        ..ParamDef::default()
    }
}

fn table_with_declared() -> SymbolTable {
    let mut table = SymbolTable::with_builtins();
    table.register(Strategy::Declared {
        base: StrategyBase::new("TestObject", "Test.Object", Expr::Null),
        kind: DeclaredKind::Object,
    });
    table.register(Strategy::Declared {
        base: StrategyBase::new("TestFunc", "Test.Func", Expr::Null),
        kind: DeclaredKind::Callback,
    });
    table.freeze();
    table
}

#[test]
fn throttled_members_show_up_in_the_summary() {
    let (_, stats) = demo_validated();
    // demo_widget_format has an ellipsis parameter.
    assert_eq!(stats.throttled_count("methods"), 1);
    // DemoMystery has an unresolvable field, once for the plain field and
    // once for the struct ABI.
    assert_eq!(stats.throttled_count("fields"), 1);
    assert_eq!(stats.throttled_count("abi"), 1);
    assert_eq!(stats.throttled_count("demoted_constructors"), 1);
}

#[test]
fn demotion_is_deterministic_for_unpreferred_clash() {
    let (validated, _) = demo_validated();
    let widget = validated.index.get("DemoWidget").expect("DemoWidget");
    let demoted: Vec<&members::CtorGen> = widget
        .constructors
        .iter()
        .filter(|c| c.is_static)
        .collect();
    assert_eq!(demoted.len(), 1, "exactly one of the clashing pair demotes");
    assert_eq!(demoted[0].def.native_name, "demo_widget_new_from_file");
    assert_eq!(demoted[0].static_name(), "NewFromFile");
}

#[test]
fn ellipsis_parameter_rejects_the_member() {
    let table = table_with_declared();
    let defs = vec![param("fmt", "const-gchar*"), ParamDef {
        name: "args".to_string(),
        ellipsis: true,
        ..ParamDef::default()
    }];
    assert!(Parameters::classify("m", &defs, false, ParserVersion::V3, &table).is_none());
}

#[test]
fn unknown_parameter_type_rejects_the_member() {
    let table = table_with_declared();
    let defs = vec![param("x", "NotDeclaredAnywhere")];
    assert!(Parameters::classify("m", &defs, false, ParserVersion::V3, &table).is_none());
}

#[test]
fn array_count_fusion_is_symmetric() {
    let table = table_with_declared();

    // array, count
    let defs = vec![
        {
            let mut p = param("values", "guint*");
            p.is_array = true;
            p
        },
        param("n_values", "int"),
    ];
    let params = Parameters::classify("m", &defs, false, ParserVersion::V3, &table).unwrap();
    assert_eq!(params.len(), 1, "pair fuses into one unit");
    let fused = params.iter().next().unwrap();
    let ParamKind::ArrayCountPair { inverted, .. } = &fused.kind else {
        panic!("expected fused pair, got {:?}", fused.kind);
    };
    assert!(!*inverted);
    let slots = params.native_slots();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].name, "values");
    assert_eq!(slots[1].name, "n_values");

    // count, array — inverted
    let defs = vec![
        param("n_values", "int"),
        {
            let mut p = param("values", "guint*");
            p.is_array = true;
            p
        },
    ];
    let params = Parameters::classify("m", &defs, false, ParserVersion::V3, &table).unwrap();
    let fused = params.iter().next().unwrap();
    let ParamKind::ArrayCountPair { inverted, .. } = &fused.kind else {
        panic!("expected fused pair, got {:?}", fused.kind);
    };
    assert!(*inverted);
    let slots = params.native_slots();
    assert_eq!(slots[0].name, "n_values");
    assert_eq!(slots[1].name, "values");

    // Either way the count expression handles the null array.
    let plan = params.plan();
    let count_arg = render_expr(&plan.call_args[0]);
    assert_eq!(count_arg, "(int) (values == null ? 0 : values.length)");
}

#[test]
fn ownership_flag_propagates_to_the_conversion() {
    let table = table_with_declared();

    let owned = RetDef {
        native_type: "TestObject*".to_string(),
        owned: true,
        ..RetDef::default()
    };
    let plan = ReturnPlan::classify("m", &owned, &table).unwrap();
    assert_eq!(
        render_expr(plan.from_native()),
        "new Test.Object(raw_ret, true)"
    );

    let borrowed = RetDef {
        native_type: "TestObject*".to_string(),
        owned: false,
        ..RetDef::default()
    };
    let plan = ReturnPlan::classify("m", &borrowed, &table).unwrap();
    assert_eq!(
        render_expr(plan.from_native()),
        "new Test.Object(raw_ret, false)"
    );
}

#[test]
fn pointer_to_simple_type_infers_out_direction() {
    let table = table_with_declared();
    let defs = vec![param("width", "gint*")];
    let params = Parameters::classify("m", &defs, false, ParserVersion::V3, &table).unwrap();
    assert_eq!(params.iter().next().unwrap().pass, PassDir::Out);
}

#[test]
fn legacy_trailing_user_data_is_hidden() {
    let table = table_with_declared();
    let defs = vec![
        param("func", "TestFunc"),
        param("user_data", "gpointer"),
    ];
    let params = Parameters::classify("m", &defs, false, ParserVersion::V1, &table).unwrap();
    assert!(params.has_callback);
    assert_eq!(params.visible_count(), 1, "user_data slot must be hidden");
    assert_eq!(params.visible().next().unwrap().name(), "func");
}

#[test]
fn legacy_callback_triple_gets_notified_scope() {
    let table = table_with_declared();
    let defs = vec![
        param("func", "TestFunc"),
        param("user_data", "gpointer"),
        param("notify", "GDestroyNotify"),
    ];
    let params = Parameters::classify("m", &defs, false, ParserVersion::V2, &table).unwrap();
    let func = params.iter().next().unwrap();
    assert_eq!(func.def.scope.as_deref(), Some("notified"));
    assert_eq!(params.visible_count(), 1, "user_data and notify slots are hidden");
}

#[test]
fn explicit_closure_indices_hide_their_slots() {
    let table = table_with_declared();
    let mut func = param("func", "TestFunc");
    func.closure = Some(1);
    func.destroy = Some(2);
    let defs = vec![
        func,
        param("payload", "gpointer"),
        param("notify", "GDestroyNotify"),
    ];
    let params = Parameters::classify("m", &defs, false, ParserVersion::V3, &table).unwrap();
    assert_eq!(params.visible_count(), 1);
    assert_eq!(params.visible().next().unwrap().name(), "func");
}

#[test]
fn length_after_string_is_hidden() {
    let table = table_with_declared();
    let defs = vec![param("text", "const-gchar*"), param("text_len", "int")];
    let params = Parameters::classify("m", &defs, false, ParserVersion::V3, &table).unwrap();
    assert_eq!(params.visible_count(), 1);
}

#[test]
fn builtin_strategies_cover_the_word_size_family() {
    let table = SymbolTable::with_builtins();
    for native in ["long", "glong", "gssize", "off_t"] {
        let s = table.resolve(native).unwrap();
        assert!(matches!(s, Strategy::WordInt { signed: true, .. }), "{native}");
    }
    for native in ["gulong", "size_t", "gsize", "guintptr"] {
        let s = table.resolve(native).unwrap();
        assert!(matches!(s, Strategy::WordInt { signed: false, .. }), "{native}");
    }
    // Sanity: the builtin seed is the full table, not a sample.
    assert!(strategy::builtins().len() > 60);
}
