//! Emitter — validated declarations + IR → wrapper text units.
//!
//! Everything above this module is target-language-agnostic; this is the
//! single place concrete syntax exists, and it is deliberately plain so a
//! different renderer can replace it without touching the decision engine.

use std::fmt::Write as _;

use tracing::debug;

use crate::ir::{AbiField, AbiLayout, AlignExpr, Expr, MarshalTy, PassDir, SizeExpr, Stmt};
use crate::members::{ClassGen, CtorGen, MethodGen, Validated};
use crate::strategy::DeclaredKind;

/// The complete rendered output of one run.
#[derive(Debug, Default)]
pub struct Output {
    /// (type name, wrapper source) units, one per generated type.
    pub units: Vec<(String, String)>,
    /// Native-side glue helper source.
    pub glue: Option<String>,
    /// ABI self-check pair: native program and managed program that print
    /// matching size/offset tables.
    pub abi_check_native: Option<String>,
    pub abi_check_managed: Option<String>,
    /// Object-registration mapping (native name → managed name).
    pub registration: Option<String>,
}

/// Render everything that survived validation.
pub fn emit(validated: &Validated) -> Output {
    let mut output = Output::default();
    let mut glue = String::new();
    let mut abi_native = String::new();
    let mut abi_managed = String::new();
    let mut registration = String::new();

    for ns in &validated.namespaces {
        for native in &ns.classes {
            let Some(class) = validated.index.get(native) else {
                continue;
            };
            let unit = emit_class(class, validated);
            debug!(name = %class.qualified_name(), "emitted type");
            output.units.push((class.qualified_name(), unit));

            if class.kind == DeclaredKind::Object {
                let _ = writeln!(
                    registration,
                    "{} {}",
                    class.native_name(),
                    class.qualified_name()
                );
            }
            emit_abi_checks(class, &mut glue, &mut abi_native, &mut abi_managed);
        }

        for en in &ns.enums {
            let name = format!("{}.{}", en.decl.namespace, en.decl.name);
            output.units.push((name, emit_enum(en)));
        }
        for cb in &ns.callbacks {
            let name = format!("{}.{}", cb.decl.namespace, cb.decl.name);
            output.units.push((name, emit_callback(cb)));
        }
    }

    if !glue.is_empty() {
        output.glue = Some(glue);
    }
    if !abi_native.is_empty() {
        output.abi_check_native = Some(abi_native);
        output.abi_check_managed = Some(abi_managed);
    }
    if !registration.is_empty() {
        output.registration = Some(registration);
    }
    output
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

fn emit_class(class: &ClassGen, validated: &Validated) -> String {
    let mut out = String::new();
    let decl = &class.decl;

    let keyword = match class.kind {
        DeclaredKind::Interface => "interface",
        DeclaredKind::Struct | DeclaredKind::NativeStruct | DeclaredKind::Union => "struct",
        _ => "class",
    };
    let mut heritage = Vec::new();
    if let Some(parent) = &decl.parent {
        heritage.push(parent.clone());
    }
    heritage.extend(decl.interfaces.iter().cloned());
    let heritage = if heritage.is_empty() {
        String::new()
    } else {
        format!(" : {}", heritage.join(", "))
    };

    let _ = writeln!(out, "// {} — wrapper for {}", class.qualified_name(), decl.native_name);
    let _ = writeln!(out, "{keyword} {}{heritage} {{", decl.name);

    for constant in &class.constants {
        let _ = writeln!(
            out,
            "    const {} {} = {};",
            constant.managed_ty, constant.name, constant.value
        );
    }

    for field in class.fields.values() {
        let _ = writeln!(out, "    public {} {};", field.managed_ty, field.name);
    }
    // Value types compare and hash by field value.
    if matches!(
        class.kind,
        DeclaredKind::Struct | DeclaredKind::NativeStruct | DeclaredKind::Boxed | DeclaredKind::Union
    ) && !class.fields.is_empty()
    {
        let names: Vec<&str> = class.fields.values().map(|f| f.name.as_str()).collect();
        let _ = writeln!(out, "    equality ({});", names.join(", "));
    }

    for ctor in &class.constructors {
        emit_ctor(&mut out, class, ctor);
    }

    emit_methods(&mut out, class, validated);

    for (name, prop) in &class.properties {
        let mut accessors = String::new();
        if prop.def.readable {
            accessors.push_str(" get;");
        }
        if prop.def.writeable {
            accessors.push_str(" set;");
        }
        let _ = writeln!(out, "    public {} {name} {{{accessors} }}", prop.managed_ty);
    }

    for signal in class.signals.values() {
        let sig = signal
            .params
            .managed_signature()
            .into_iter()
            .map(|(name, ty, _)| format!("{ty} {name}"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "    public event {} {}({sig});",
            signal.ret.managed_ty, signal.name
        );
    }

    for vm in &class.virtual_methods {
        let sig = vm
            .params
            .managed_signature()
            .into_iter()
            .map(|(name, ty, _)| format!("{ty} {name}"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "    virtual {} {}({sig});", vm.ret.managed_ty, vm.name);
    }

    emit_abi_section(&mut out, class);

    out.push_str("}\n");
    out
}

fn emit_enum(en: &crate::members::EnumGen) -> String {
    let mut out = String::new();
    let kind = if en.decl.flags { "flags" } else { "enum" };
    let _ = writeln!(out, "// {}.{} — wrapper for {}", en.decl.namespace, en.decl.name, en.decl.native_name);
    let _ = writeln!(out, "{kind} {} {{", en.decl.name);
    for member in &en.decl.members {
        match &member.value {
            Some(value) => {
                let _ = writeln!(out, "    {} = {},", member.name, value);
            }
            None => {
                let _ = writeln!(out, "    {},", member.name);
            }
        }
    }
    out.push_str("}\n");
    out
}

fn emit_callback(cb: &crate::members::CallbackGen) -> String {
    let sig = cb
        .params
        .managed_signature()
        .into_iter()
        .map(|(name, ty, _)| format!("{ty} {name}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "// {}.{} — wrapper for {}\ndelegate {} {}({sig});\n// default result on unhandled failure: {}\n",
        cb.decl.namespace,
        cb.decl.name,
        cb.decl.native_name,
        cb.ret.managed_ty,
        cb.decl.name,
        render_expr(&cb.ret.default),
    )
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

fn native_import(out: &mut String, native_name: &str, params: &crate::params::Parameters, ret: &MarshalTy, instance: Option<&str>) {
    let mut slots = Vec::new();
    if let Some(raw) = instance {
        slots.push(format!("ptr {raw}"));
    }
    for slot in params.native_slots() {
        let dir = match slot.dir {
            PassDir::In => "",
            PassDir::Out => "out ",
            PassDir::Ref => "ref ",
        };
        slots.push(format!("{dir}{} {}", render_marshal_ty(&slot.ty), slot.name));
    }
    let _ = writeln!(
        out,
        "    import {} {}({});",
        render_marshal_ty(ret),
        native_name,
        slots.join(", ")
    );
}

fn emit_body(out: &mut String, call: String, plan: &crate::ir::ParamPlan, epilogue: &[String]) {
    for stmt in &plan.prepare {
        render_stmt(out, stmt, 2);
    }
    let guarded = !plan.cleanup.is_empty();
    let indent = if guarded { 3 } else { 2 };
    if guarded {
        let _ = writeln!(out, "        try {{");
    }
    let _ = writeln!(out, "{}{call};", "    ".repeat(indent));
    for stmt in &plan.finish {
        render_stmt(out, stmt, indent);
    }
    for line in epilogue {
        let _ = writeln!(out, "{}{line}", "    ".repeat(indent));
    }
    if guarded {
        // Release brackets run on every exit path.
        let _ = writeln!(out, "        }} finally {{");
        for stmt in &plan.cleanup {
            render_stmt(out, stmt, 3);
        }
        let _ = writeln!(out, "        }}");
    }
}

fn emit_ctor(out: &mut String, class: &ClassGen, ctor: &CtorGen) {
    let plan = ctor.params.plan();
    native_import(out, &ctor.def.native_name, &ctor.params, &MarshalTy::Ptr, None);

    let sig = ctor
        .params
        .managed_signature()
        .into_iter()
        .map(|(name, ty, _)| format!("{ty} {name}"))
        .collect::<Vec<_>>()
        .join(", ");
    let args = plan
        .call_args
        .iter()
        .map(render_expr)
        .collect::<Vec<_>>()
        .join(", ");

    if ctor.is_static {
        let shadow = if ctor.shadows_parent { "new " } else { "" };
        let _ = writeln!(
            out,
            "    public static {shadow}{} {}({sig}) {{",
            class.decl.name,
            ctor.static_name()
        );
        emit_body(
            out,
            format!(
                "{name} result = new {name}({native}({args}))",
                name = class.decl.name,
                native = ctor.def.native_name
            ),
            &plan,
            &["return result;".to_string()],
        );
    } else {
        let _ = writeln!(out, "    public {}({sig}) {{", class.decl.name);
        emit_body(
            out,
            format!("handle = {}({args})", ctor.def.native_name),
            &plan,
            &[],
        );
    }
    out.push_str("    }\n");
}

fn emit_methods(out: &mut String, class: &ClassGen, validated: &Validated) {
    for method in class.methods.values() {
        // Accessor fusion: a getter emits the accessor; its matching
        // setter is folded in when the types agree, otherwise the setter
        // stays a plain method.
        if method.is_getter {
            // A declared property with the same name wins over the
            // accessor pair.
            if validated
                .index
                .property_recursively(class.native_name(), method.accessor_name())
                .is_some()
            {
                continue;
            }
            let setter = complement(class, method);
            emit_accessor(out, method, setter);
            continue;
        }
        if method.is_setter {
            if let Some(getter) = getter_complement(class, method) {
                let same = getter.accessor_ty() == method.accessor_ty();
                if same {
                    continue; // folded into the getter's accessor
                }
            } else if validated
                .index
                .property_recursively(class.native_name(), method.accessor_name())
                .is_some()
            {
                continue; // declared property already covers it
            }
        }
        emit_method(out, method);
    }
}

/// The `SetX` counterpart of a getter, when it fuses.
fn complement<'a>(class: &'a ClassGen, getter: &MethodGen) -> Option<&'a MethodGen> {
    let setter = class.methods.get(&format!("Set{}", getter.accessor_name()))?;
    if !setter.is_setter {
        return None;
    }
    (setter.accessor_ty() == getter.accessor_ty()).then_some(setter)
}

fn getter_complement<'a>(class: &'a ClassGen, setter: &MethodGen) -> Option<&'a MethodGen> {
    for prefix in ["Get", "Has"] {
        if let Some(getter) = class.methods.get(&format!("{prefix}{}", setter.accessor_name()))
            && getter.is_getter
        {
            return Some(getter);
        }
    }
    None
}

fn emit_accessor(out: &mut String, getter: &MethodGen, setter: Option<&MethodGen>) {
    let ty = getter
        .accessor_ty()
        .unwrap_or_else(|| getter.ret.managed_ty.clone());
    let instance = (!getter.def.shared).then_some("raw");
    native_import(out, &getter.def.native_name, &getter.params, &getter.ret.marshal_ty, instance);
    if let Some(setter) = setter {
        native_import(out, &setter.def.native_name, &setter.params, &MarshalTy::Void, instance);
    }
    let _ = writeln!(out, "    public {ty} {} {{", getter.accessor_name());
    let _ = writeln!(
        out,
        "        get {{ return {}; }}",
        render_expr(getter.ret.from_native())
            .replace("raw_ret", &format!("{}(handle)", getter.def.native_name))
    );
    if let Some(setter) = setter {
        // The fused setter receives the accessor's incoming value.
        let arg = setter
            .params
            .accessor_param()
            .map(|p| render_expr(&p.strategy.to_native(Expr::var("value"))))
            .unwrap_or_else(|| "value".to_string());
        let _ = writeln!(
            out,
            "        set {{ {}(handle, {arg}); }}",
            setter.def.native_name
        );
    }
    let _ = writeln!(out, "    }}");
}

fn emit_method(out: &mut String, method: &MethodGen) {
    let plan = method.params.plan();
    let instance = (!method.def.shared).then_some("raw");
    native_import(out, &method.def.native_name, &method.params, &method.ret.marshal_ty, instance);

    let stat = if method.def.shared { "static " } else { "" };
    let sig = method
        .params
        .managed_signature()
        .into_iter()
        .map(|(name, ty, dir)| {
            let dir = match dir {
                PassDir::In => "",
                PassDir::Out => "out ",
                PassDir::Ref => "ref ",
            };
            format!("{dir}{ty} {name}")
        })
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(
        out,
        "    public {stat}{} {}({sig}) {{",
        method.ret.managed_ty, method.name
    );

    let mut args: Vec<String> = Vec::new();
    if !method.def.shared {
        args.push("handle".to_string());
    }
    args.extend(plan.call_args.iter().map(render_expr));
    let call = if method.ret.is_void {
        format!("{}({})", method.def.native_name, args.join(", "))
    } else {
        format!(
            "{} raw_ret = {}({})",
            render_marshal_ty(&method.ret.marshal_ty),
            method.def.native_name,
            args.join(", ")
        )
    };
    let epilogue = if method.ret.is_void {
        Vec::new()
    } else {
        vec![format!(
            "return {};",
            render_expr(method.ret.from_native())
        )]
    };
    emit_body(out, call, &plan, &epilogue);
    let _ = writeln!(out, "    }}");
}

// ---------------------------------------------------------------------------
// ABI sections and self-checks
// ---------------------------------------------------------------------------

fn emit_abi_section(out: &mut String, class: &ClassGen) {
    if !class.abi.valid {
        return;
    }
    match class.abi.layout.as_ref() {
        Some(AbiLayout::Fields(fields)) => {
            let _ = writeln!(out, "    // Internal representation of the wrapped structure ABI.");
            let _ = writeln!(out, "    abi {} {{", class.decl.native_name);
            for field in fields {
                render_abi_field(out, field);
            }
            let _ = writeln!(out, "    }}");
        }
        Some(AbiLayout::InheritParent { parent }) => {
            let _ = writeln!(out, "    // ABI reuses the parent's complete field list.");
            let _ = writeln!(out, "    abi {} = inherit {};", class.decl.native_name, parent);
        }
        Some(AbiLayout::Empty) => {
            let _ = writeln!(out, "    abi {} {{ }}", class.decl.native_name);
        }
        None => {}
    }
}

fn render_abi_field(out: &mut String, field: &AbiField) {
    let prev = field.prev.as_deref().unwrap_or("-");
    let next = field.next.as_deref().unwrap_or("-");
    let _ = writeln!(
        out,
        "        field {} prev={prev} next={next} size={} align={} bits={};",
        field.name,
        render_size(&field.size),
        render_align(&field.align),
        field.bits,
    );
}

fn render_size(size: &SizeExpr) -> String {
    match size {
        SizeExpr::SizeOf(ty) => format!("sizeof({ty})"),
        SizeExpr::PointerSize => "sizeof(ptr)".to_string(),
        SizeExpr::EnumUnderlying(ty) => format!("sizeof(underlying({ty}))"),
        SizeExpr::AbiOf(ty) => format!("abi({ty}).size"),
        SizeExpr::Scaled(inner, len) => format!("{} * {len}", render_size(inner)),
        SizeExpr::UnionGroups(groups) => {
            let rendered: Vec<String> = groups.iter().map(|g| g.join(",")).collect();
            format!("max-of-groups[{}]", rendered.join(" | "))
        }
    }
}

fn render_align(align: &AlignExpr) -> String {
    match align {
        AlignExpr::SizeOf(ty) => format!("sizeof({ty})"),
        AlignExpr::PointerSize => "sizeof(ptr)".to_string(),
        AlignExpr::One => "1".to_string(),
        AlignExpr::Probe {
            probe_struct,
            field,
        } => format!("offsetof({probe_struct}, {field})"),
    }
}

/// Append the native/managed self-check lines for one class. The two
/// programs print identical key/value lines; comparing their outputs at
/// build time validates the computed layout.
fn emit_abi_checks(class: &ClassGen, glue: &mut String, native: &mut String, managed: &mut String) {
    if !class.abi.valid {
        return;
    }
    let Some(AbiLayout::Fields(fields)) = class.abi.layout.as_ref() else {
        return;
    };
    let cname = &class.decl.native_name;
    let _ = writeln!(
        native,
        "    printf(\"\\\"sizeof({cname})\\\": \\\"%zu\\\"\\n\", sizeof({cname}));"
    );
    let _ = writeln!(
        managed,
        "    print(\"\\\"sizeof({cname})\\\": \" + {}.abi_info.size);",
        class.qualified_name()
    );
    for field in fields {
        // Union slots, union members and bitfields have no one-line native
        // offsetof counterpart.
        if matches!(field.size, SizeExpr::UnionGroups(_))
            || field.bits > 0
            || field.name.contains('.')
        {
            continue;
        }
        let _ = writeln!(
            native,
            "    printf(\"\\\"{cname}.{field}\\\": \\\"%zu\\\"\\n\", offsetof({cname}, {field}));",
            field = field.name
        );
        let _ = writeln!(
            managed,
            "    print(\"\\\"{cname}.{field}\\\": \" + {}.abi_info.offset_of(\"{field}\"));",
            class.qualified_name(),
            field = field.name
        );
    }
    let _ = writeln!(
        glue,
        "void {}_abi_dump(void); /* offset table for {} */",
        cname.to_lowercase(),
        cname
    );
}

// ---------------------------------------------------------------------------
// IR rendering
// ---------------------------------------------------------------------------

pub fn render_marshal_ty(ty: &MarshalTy) -> String {
    ty.to_string()
}

pub fn render_expr(expr: &Expr) -> String {
    match expr {
        Expr::Var(name) => name.clone(),
        Expr::Null => "null".to_string(),
        Expr::NullPtr => "nullptr".to_string(),
        Expr::Bool(true) => "true".to_string(),
        Expr::Bool(false) => "false".to_string(),
        Expr::Int(value) => value.to_string(),
        Expr::Float(value) => format!("{value:?}"),
        Expr::Len(inner) => format!("{}.length", render_expr(inner)),
        Expr::Add(lhs, rhs) => format!("{} + {}", render_expr(lhs), render_expr(rhs)),
        Expr::Cast { ty, expr } => format!("({ty}) {}", render_expr(expr)),
        Expr::IsNull(inner) => format!("{} == null", render_expr(inner)),
        Expr::Select {
            cond,
            if_true,
            if_false,
        } => format!(
            "({} ? {} : {})",
            render_expr(cond),
            render_expr(if_true),
            render_expr(if_false)
        ),
        Expr::Index { base, index } => format!("{}[{}]", render_expr(base), render_expr(index)),
        Expr::Member { base, member } => format!("{}.{member}", render_expr(base)),
        Expr::Helper { name, args } => {
            let args: Vec<String> = args.iter().map(render_expr).collect();
            format!("Marshaller.{name}({})", args.join(", "))
        }
        Expr::Wrap {
            managed,
            native,
            owned,
        } => match owned {
            Some(owned) => format!("new {managed}({}, {owned})", render_expr(native)),
            None => format!("new {managed}({})", render_expr(native)),
        },
        Expr::Unwrap(inner) => {
            let rendered = render_expr(inner);
            format!("({rendered} == null ? nullptr : {rendered}.handle)")
        }
        Expr::Verbatim(text) => text.clone(),
    }
}

pub fn render_stmt(out: &mut String, stmt: &Stmt, depth: usize) {
    let indent = "    ".repeat(depth);
    match stmt {
        Stmt::DeclareNative { name, ty, init } => match init {
            Some(init) => {
                let _ = writeln!(
                    out,
                    "{indent}{} {name} = {};",
                    render_marshal_ty(ty),
                    render_expr(init)
                );
            }
            None => {
                let _ = writeln!(out, "{indent}{} {name};", render_marshal_ty(ty));
            }
        },
        Stmt::Declare { name, ty, init } => match init {
            Some(init) => {
                let _ = writeln!(out, "{indent}{ty} {name} = {};", render_expr(init));
            }
            None => {
                let _ = writeln!(out, "{indent}{ty} {name};");
            }
        },
        Stmt::Assign { target, value } => {
            let _ = writeln!(out, "{indent}{} = {};", render_expr(target), render_expr(value));
        }
        Stmt::Eval(expr) => {
            let _ = writeln!(out, "{indent}{};", render_expr(expr));
        }
        Stmt::ForRange { index, count, body } => {
            let _ = writeln!(
                out,
                "{indent}for (int {index} = 0; {index} < {}; {index}++) {{",
                render_expr(count)
            );
            for inner in body {
                render_stmt(out, inner, depth + 1);
            }
            let _ = writeln!(out, "{indent}}}");
        }
    }
}
