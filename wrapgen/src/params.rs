//! Parameter classification and marshal planning.
//!
//! Each parameter is classified exactly once, when its owning member is
//! validated: direction, shape (scalar / fixed array / null-terminated
//! array / count-paired array), and hidden roles (length, count, user-data,
//! destroy-notify, trailing error slot). The classified list then produces
//! the native signature and the prepare/call/finish/cleanup bracket as IR.

use tracing::warn;

use crate::ir::{Expr, MarshalTy, NativeSlot, ParamPlan, PassDir, Stmt};
use crate::model::{ParamDef, ParserVersion, RetDef};
use crate::strategy::{DeclaredKind, Strategy};
use crate::symbols::{mangle_name, SymbolTable};

/// Shape of an array parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySpec {
    pub null_terminated: bool,
    pub fixed_len: Option<u32>,
}

/// Count parameter fused into an array parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct CountInfo {
    pub name: String,
    pub strategy: Strategy,
}

/// Specialized parameter kind, chosen once at validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Plain,
    /// Struct-like value staged through a native buffer.
    Struct,
    /// Trailing error out-slot of a throwing member.
    Error,
    Array(ArraySpec),
    /// Array fused with its count sibling. `inverted` when the count
    /// precedes the array in the native signature.
    ArrayCountPair {
        spec: ArraySpec,
        count: CountInfo,
        inverted: bool,
    },
}

/// One classified parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub def: ParamDef,
    pub kind: ParamKind,
    pub strategy: Strategy,
    pub pass: PassDir,
    hidden: bool,
}

impl Parameter {
    pub fn name(&self) -> &str {
        mangle_name(&self.def.name)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Managed type as it appears in the public signature.
    pub fn managed_ty(&self) -> String {
        let base = match self.strategy.managed_name() {
            "void" => "Pointer".to_string(),
            other => other.to_string(),
        };
        if self.is_array_kind() {
            format!("{base}[]")
        } else {
            base
        }
    }

    /// Transport type contributed to the native signature.
    pub fn marshal_ty(&self) -> MarshalTy {
        match &self.kind {
            ParamKind::Struct | ParamKind::Error => MarshalTy::Ptr,
            ParamKind::Array(_) | ParamKind::ArrayCountPair { .. } => {
                MarshalTy::array_of(self.element_marshal_ty())
            }
            ParamKind::Plain => {
                if self.strategy.manual_marshal().is_some() {
                    MarshalTy::Ptr
                } else {
                    match self.strategy.marshal_ty() {
                        MarshalTy::Void => MarshalTy::Ptr,
                        ty => ty,
                    }
                }
            }
        }
    }

    fn element_marshal_ty(&self) -> MarshalTy {
        if self.strategy.manual_marshal().is_some() {
            MarshalTy::Ptr
        } else {
            match self.strategy.marshal_ty() {
                MarshalTy::Void => MarshalTy::Ptr,
                ty => ty,
            }
        }
    }

    fn is_array_kind(&self) -> bool {
        matches!(
            self.kind,
            ParamKind::Array(_) | ParamKind::ArrayCountPair { .. }
        )
    }

    /// Whether array elements need per-element conversion (as opposed to a
    /// transport array that matches the managed one).
    fn needs_element_staging(&self) -> bool {
        self.strategy.manual_marshal().is_some()
            || !matches!(self.strategy, Strategy::Simple { .. })
    }

    fn staging_name(&self) -> String {
        format!("native_{}", self.name())
    }
}

fn integral_managed(name: &str) -> bool {
    matches!(name, "int" | "uint" | "long" | "ulong" | "short" | "ushort")
}

fn is_count_def(def: &ParamDef, table: &SymbolTable) -> bool {
    def.name.starts_with("n_")
        && table
            .managed_name(&def.native_type)
            .is_some_and(integral_managed)
}

fn is_length_def(def: &ParamDef, table: &SymbolTable) -> bool {
    (def.name.ends_with("len") || def.name.ends_with("length"))
        && table
            .managed_name(&def.native_type)
            .is_some_and(integral_managed)
}

fn is_string_def(def: &ParamDef, table: &SymbolTable) -> bool {
    table.managed_name(&def.native_type) == Some("string")
}

fn is_user_data_def(def: &ParamDef, table: &SymbolTable) -> bool {
    table.managed_name(&def.native_type) == Some("Pointer")
        && (def.name.ends_with("data") || def.name.ends_with("data_or_owner"))
}

fn is_destroy_notify_def(def: &ParamDef) -> bool {
    def.native_type == "GDestroyNotify"
}

/// The classified parameter list of one method-like construct.
#[derive(Debug, Clone)]
pub struct Parameters {
    params: Vec<Parameter>,
    pub throws: bool,
    pub has_callback: bool,
    pub version: ParserVersion,
}

impl Parameters {
    /// Classify a raw parameter list. Returns `None` — member excluded —
    /// on an ellipsis parameter or any unresolvable type; both are logged
    /// by the caller's context via the member name passed in.
    pub fn classify(
        member: &str,
        defs: &[ParamDef],
        throws: bool,
        version: ParserVersion,
        table: &SymbolTable,
    ) -> Option<Parameters> {
        let mut params: Vec<Parameter> = Vec::new();
        let mut has_callback = false;

        let mut i = 0;
        while i < defs.len() {
            let def = &defs[i];

            if def.ellipsis {
                warn!(
                    member,
                    "ellipsis parameter: hide and bind manually if no alternative exists"
                );
                return None;
            }

            let Some(strategy) = table.resolve(&def.native_type).cloned() else {
                warn!(member, name = %def.name, ty = %def.native_type, "unknown parameter type");
                return None;
            };
            if def.name.is_empty() {
                warn!(member, ty = %def.native_type, "parameter without a name");
                return None;
            }

            let pass = pass_dir(def, &strategy);
            let is_array = def.is_array || def.null_term_array;

            let (kind, consumed_next) = if is_array {
                let spec = ArraySpec {
                    null_terminated: def.null_term_array,
                    fixed_len: def.array_len,
                };
                match defs.get(i + 1) {
                    Some(next) if is_count_def(next, table) => {
                        // is_count_def already proved the type resolves.
                        let count = CountInfo {
                            name: mangle_name(&next.name).to_string(),
                            strategy: table.resolve(&next.native_type)?.clone(),
                        };
                        (
                            ParamKind::ArrayCountPair {
                                spec,
                                count,
                                inverted: false,
                            },
                            true,
                        )
                    }
                    _ => (ParamKind::Array(spec), false),
                }
            } else if is_count_def(def, table) {
                // A count followed by its array: fuse in inverted order.
                match defs.get(i + 1) {
                    Some(next) if next.is_array || next.null_term_array => {
                        let count = CountInfo {
                            name: mangle_name(&def.name).to_string(),
                            strategy: strategy.clone(),
                        };
                        let array_def = next.clone();
                        let Some(array_strategy) = table.resolve(&array_def.native_type).cloned()
                        else {
                            warn!(member, name = %array_def.name, ty = %array_def.native_type, "unknown parameter type");
                            return None;
                        };
                        let spec = ArraySpec {
                            null_terminated: array_def.null_term_array,
                            fixed_len: array_def.array_len,
                        };
                        let array_pass = pass_dir(&array_def, &array_strategy);
                        params.push(Parameter {
                            def: array_def,
                            kind: ParamKind::ArrayCountPair {
                                spec,
                                count,
                                inverted: true,
                            },
                            strategy: array_strategy,
                            pass: array_pass,
                            hidden: false,
                        });
                        i += 2;
                        continue;
                    }
                    _ => (ParamKind::Plain, false),
                }
            } else if def.native_type == "GError**" && throws {
                (ParamKind::Error, false)
            } else {
                match &strategy {
                    Strategy::ByRef { .. } => (ParamKind::Struct, false),
                    Strategy::Declared { kind, .. } if kind.is_struct_like() => {
                        (ParamKind::Struct, false)
                    }
                    Strategy::Declared {
                        kind: DeclaredKind::Callback,
                        ..
                    } => {
                        has_callback = true;
                        (ParamKind::Plain, false)
                    }
                    _ => (ParamKind::Plain, false),
                }
            };

            let pass = if matches!(kind, ParamKind::Error) {
                PassDir::Out
            } else {
                pass
            };

            params.push(Parameter {
                def: def.clone(),
                kind,
                strategy,
                pass,
                hidden: false,
            });
            i += if consumed_next { 2 } else { 1 };
        }

        let mut parameters = Parameters {
            params,
            throws,
            has_callback,
            version,
        };
        parameters.compute_hidden(table);
        parameters.mark_notified_scope(table);
        Some(parameters)
    }

    /// Hidden-slot detection. Hidden parameters stay in the native call
    /// with a synthesized value but vanish from the public signature.
    fn compute_hidden(&mut self, table: &SymbolTable) {
        let count = self.params.len();
        let mut hidden = vec![false; count];

        for idx in 0..count {
            let param = &self.params[idx];

            if param.def.hidden {
                hidden[idx] = true;
                continue;
            }
            if idx > 0
                && is_length_def(&param.def, table)
                && param.pass == PassDir::In
                && is_string_def(&self.params[idx - 1].def, table)
            {
                hidden[idx] = true;
                continue;
            }
            if param.def.native_type == "GError**" && self.throws {
                hidden[idx] = true;
                continue;
            }

            if !self.has_callback {
                continue;
            }

            if self.version.explicit_closures() {
                // Explicit closure/destroy indices point at the hidden slots.
                if self
                    .params
                    .iter()
                    .any(|p| p.def.closure == Some(idx) || p.def.destroy == Some(idx))
                {
                    hidden[idx] = true;
                }
            } else {
                let is_user_data = is_user_data_def(&param.def, table);
                let last = count - 1;
                if is_user_data && idx == last {
                    hidden[idx] = true;
                } else if is_user_data
                    && count >= 2
                    && idx == count - 2
                    && matches!(self.params[last].kind, ParamKind::Error)
                {
                    hidden[idx] = true;
                } else if is_user_data
                    && idx > 0
                    && table.is_callback(&self.params[idx - 1].def.native_type)
                {
                    hidden[idx] = true;
                } else if is_destroy_notify_def(&param.def)
                    && idx == last
                    && idx > 0
                    && is_user_data_def(&self.params[idx - 1].def, table)
                {
                    hidden[idx] = true;
                }
            }
        }

        for (param, hide) in self.params.iter_mut().zip(hidden) {
            param.hidden = hide;
        }
    }

    /// Pre-version-3 inputs carry no scope attribute; a trailing
    /// (callback, user_data, destroy) triple implies notified scope.
    fn mark_notified_scope(&mut self, table: &SymbolTable) {
        if self.version.explicit_closures() || !self.has_callback {
            return;
        }
        let n = self.params.len();
        if n < 3 {
            return;
        }
        let triple = table.is_callback(&self.params[n - 3].def.native_type)
            && is_user_data_def(&self.params[n - 2].def, table)
            && is_destroy_notify_def(&self.params[n - 1].def);
        if triple && self.params[n - 3].def.scope.is_none() {
            self.params[n - 3].def.scope = Some("notified".to_string());
        }
    }

    /// Hide the parameter that carries the element count of an array
    /// return value.
    pub fn hide_count_param(&mut self, name: &str) -> bool {
        for param in &mut self.params {
            if param.def.name == name {
                param.hidden = true;
                return true;
            }
        }
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.hidden)
    }

    pub fn visible_count(&self) -> usize {
        self.visible().count()
    }

    pub fn has_out_param(&self) -> bool {
        self.params.iter().any(|p| p.pass == PassDir::Out)
    }

    /// A one-visible-out-parameter list makes its member an accessor.
    pub fn is_accessor(&self) -> bool {
        self.visible_count() == 1
            && self
                .accessor_param()
                .is_some_and(|p| p.pass == PassDir::Out)
    }

    pub fn accessor_param(&self) -> Option<&Parameter> {
        self.visible().next()
    }

    /// The complete native import signature, hidden slots included.
    pub fn native_slots(&self) -> Vec<NativeSlot> {
        let mut slots = Vec::new();
        for param in &self.params {
            slots.extend(param.plan().native_slots);
        }
        slots
    }

    /// Signature of visible managed parameters: (name, type, direction).
    pub fn managed_signature(&self) -> Vec<(String, String, PassDir)> {
        self.visible()
            .map(|p| (p.name().to_string(), p.managed_ty(), p.pass))
            .collect()
    }

    /// The fused marshal plan across all parameters, in declaration order.
    pub fn plan(&self) -> ParamPlan {
        let mut plan = ParamPlan::default();
        for param in &self.params {
            let p = param.plan();
            plan.native_slots.extend(p.native_slots);
            plan.prepare.extend(p.prepare);
            plan.call_args.extend(p.call_args);
            plan.finish.extend(p.finish);
            plan.cleanup.extend(p.cleanup);
        }
        if self.throws && self.params.iter().any(|p| matches!(p.kind, ParamKind::Error)) {
            plan.finish
                .push(Stmt::Eval(Expr::helper("throw_on_error", vec![Expr::var("error")])));
        }
        plan
    }
}

fn pass_dir(def: &ParamDef, strategy: &Strategy) -> PassDir {
    if let Some(explicit) = def.pass_as.as_deref() {
        return match explicit {
            "out" => PassDir::Out,
            "ref" => PassDir::Ref,
            _ => PassDir::In,
        };
    }
    if def.is_array || def.null_term_array || strategy.managed_name().ends_with("Pointer") {
        return PassDir::In;
    }
    // Pointer to a simple or enum type is an inferred out-parameter.
    let simple_like = matches!(
        strategy,
        Strategy::Simple { .. } | Strategy::WordInt { .. }
    ) || strategy.declared_kind() == Some(DeclaredKind::Enum);
    if def.native_type.ends_with('*') && simple_like {
        PassDir::Out
    } else {
        PassDir::In
    }
}

// ---------------------------------------------------------------------------
// Per-parameter marshal plans
// ---------------------------------------------------------------------------

impl Parameter {
    /// The marshaling decision for this parameter alone.
    pub fn plan(&self) -> ParamPlan {
        match &self.kind {
            ParamKind::Plain => self.plan_plain(),
            ParamKind::Struct => self.plan_struct(),
            ParamKind::Error => self.plan_error(),
            ParamKind::Array(spec) => self.plan_array(spec, None, false),
            ParamKind::ArrayCountPair {
                spec,
                count,
                inverted,
            } => self.plan_array(spec, Some(count), *inverted),
        }
    }

    fn plan_plain(&self) -> ParamPlan {
        let name = self.name().to_string();
        let var = Expr::var(name.clone());
        let mut plan = ParamPlan::default();
        let marshal = self.marshal_ty();
        plan.native_slots.push(NativeSlot {
            name: name.clone(),
            ty: marshal.clone(),
            dir: self.pass,
        });

        if let Some(manual) = self.strategy.manual_marshal() {
            // Allocate-before / release-after bracket.
            let staged = self.staging_name();
            let init = if self.pass == PassDir::Out {
                None
            } else {
                Some(manual.alloc_native(var.clone()))
            };
            plan.prepare.push(Stmt::DeclareNative {
                name: staged.clone(),
                ty: MarshalTy::Ptr,
                init,
            });
            plan.call_args.push(Expr::var(staged.clone()));
            if self.pass != PassDir::In {
                plan.finish.push(Stmt::Assign {
                    target: var,
                    value: self.strategy.from_native(Expr::var(staged.clone())),
                });
            }
            if self.pass != PassDir::Out {
                plan.cleanup
                    .push(Stmt::Eval(manual.release_native(Expr::var(staged))));
            }
            return plan;
        }

        let managed = self.managed_ty();
        let marshal_matches = matches!(&marshal, MarshalTy::Named(n) if *n == managed)
            || matches!(self.strategy, Strategy::Simple { .. });

        match self.pass {
            PassDir::Out if !marshal_matches => {
                let staged = self.staging_name();
                plan.prepare.push(Stmt::DeclareNative {
                    name: staged.clone(),
                    ty: marshal,
                    init: None,
                });
                plan.call_args.push(Expr::var(staged.clone()));
                plan.finish.push(Stmt::Assign {
                    target: var,
                    value: self
                        .strategy
                        .from_native_owned(Expr::var(staged), self.def.owned),
                });
            }
            PassDir::Ref if !marshal_matches => {
                let staged = self.staging_name();
                plan.prepare.push(Stmt::DeclareNative {
                    name: staged.clone(),
                    ty: marshal,
                    init: Some(self.strategy.to_native(var.clone())),
                });
                plan.call_args.push(Expr::var(staged.clone()));
                plan.finish.push(Stmt::Assign {
                    target: var,
                    value: self
                        .strategy
                        .from_native_owned(Expr::var(staged), self.def.owned),
                });
            }
            _ => {
                // Handing an owned opaque into native transfers the
                // resource: the wrapper must stop releasing it.
                if self.strategy.declared_kind() == Some(DeclaredKind::Opaque) && self.def.owned {
                    plan.prepare.push(Stmt::Assign {
                        target: var.clone().member("owned"),
                        value: Expr::Bool(false),
                    });
                }
                let arg = if self.strategy.declared_kind() == Some(DeclaredKind::Callback) {
                    Expr::var(format!("{name}_wrapper"))
                } else {
                    self.strategy.to_native(var)
                };
                plan.call_args.push(arg);
            }
        }
        plan
    }

    fn plan_struct(&self) -> ParamPlan {
        let name = self.name().to_string();
        let var = Expr::var(name.clone());
        let staged = self.staging_name();
        let mut plan = ParamPlan::default();
        plan.native_slots.push(NativeSlot {
            name: name.clone(),
            ty: MarshalTy::Ptr,
            dir: PassDir::In,
        });

        let init = if self.pass == PassDir::Out {
            Expr::helper(
                "alloc_native",
                vec![Expr::Verbatim(self.strategy.managed_name().to_string())],
            )
        } else {
            Expr::helper("struct_to_ptr_alloc", vec![var.clone()])
        };
        plan.prepare.push(Stmt::DeclareNative {
            name: staged.clone(),
            ty: MarshalTy::Ptr,
            init: Some(init),
        });
        plan.call_args.push(Expr::var(staged.clone()));
        if self.pass != PassDir::In {
            plan.finish.push(Stmt::Assign {
                target: var,
                value: self.strategy.from_native(Expr::var(staged.clone())),
            });
        }
        plan.cleanup
            .push(Stmt::Eval(Expr::helper("free_native", vec![Expr::var(staged)])));
        plan
    }

    fn plan_error(&self) -> ParamPlan {
        let mut plan = ParamPlan::default();
        plan.native_slots.push(NativeSlot {
            name: "error".to_string(),
            ty: MarshalTy::Ptr,
            dir: PassDir::Out,
        });
        plan.prepare.push(Stmt::DeclareNative {
            name: "error".to_string(),
            ty: MarshalTy::Ptr,
            init: Some(Expr::NullPtr),
        });
        plan.call_args.push(Expr::var("error"));
        plan
    }

    fn plan_array(&self, spec: &ArraySpec, count: Option<&CountInfo>, inverted: bool) -> ParamPlan {
        let name = self.name().to_string();
        let var = Expr::var(name.clone());
        let mut plan = ParamPlan::default();

        let elem_marshal = self.element_marshal_ty();
        let array_slot = NativeSlot {
            name: name.clone(),
            ty: MarshalTy::array_of(elem_marshal.clone()),
            dir: PassDir::In,
        };

        // Count expression: zero for a null array, the element count
        // otherwise, cast to the count parameter's native width.
        let (count_slot, count_arg) = match count {
            Some(info) => {
                let counted = Expr::select(
                    var.clone().is_null(),
                    Expr::Int(0),
                    var.clone().len(),
                );
                let cast = counted.cast(info.strategy.managed_name().to_string());
                (
                    Some(NativeSlot {
                        name: info.name.clone(),
                        ty: info.strategy.marshal_ty(),
                        dir: PassDir::In,
                    }),
                    Some(info.strategy.to_native(cast)),
                )
            }
            None => (None, None),
        };

        let staged = self.needs_element_staging();
        let array_arg = if staged {
            Expr::var(self.staging_name())
        } else {
            var.clone()
        };

        if let Some(len) = spec.fixed_len {
            // Fixed-size arrays ignore the managed length entirely.
            plan.prepare.push(Stmt::Assign {
                target: var.clone(),
                value: Expr::helper(
                    "new_array",
                    vec![
                        Expr::Verbatim(elem_marshal.to_string()),
                        Expr::Int(len as i64),
                    ],
                ),
            });
        } else if staged {
            let cnt = format!("cnt_{name}");
            let native = self.staging_name();
            plan.prepare.push(Stmt::Declare {
                name: cnt.clone(),
                ty: "int".to_string(),
                init: Some(Expr::select(
                    var.clone().is_null(),
                    Expr::Int(0),
                    var.clone().len(),
                )),
            });
            let alloc_len = if spec.null_terminated {
                Expr::Add(Box::new(Expr::var(cnt.clone())), Box::new(Expr::Int(1)))
            } else {
                Expr::var(cnt.clone())
            };
            plan.prepare.push(Stmt::DeclareNative {
                name: native.clone(),
                ty: MarshalTy::array_of(elem_marshal.clone()),
                init: Some(Expr::helper(
                    "new_array",
                    vec![Expr::Verbatim(elem_marshal.to_string()), alloc_len],
                )),
            });
            let element = var.clone().index(Expr::var("i"));
            let converted = match self.strategy.manual_marshal() {
                Some(manual) => manual.alloc_native(element),
                None => self.strategy.to_native(element),
            };
            plan.prepare.push(Stmt::ForRange {
                index: "i".to_string(),
                count: Expr::var(cnt.clone()),
                body: vec![Stmt::Assign {
                    target: Expr::var(native.clone()).index(Expr::var("i")),
                    value: converted,
                }],
            });
            if spec.null_terminated {
                plan.prepare.push(Stmt::Assign {
                    target: Expr::var(native.clone()).index(Expr::var(cnt.clone())),
                    value: Expr::NullPtr,
                });
            }
            // Manually marshaled elements read back and release after the
            // call; release belongs to the guaranteed-cleanup region.
            if let Some(manual) = self.strategy.manual_marshal() {
                let native_elem = Expr::var(native.clone()).index(Expr::var("i"));
                plan.finish.push(Stmt::ForRange {
                    index: "i".to_string(),
                    count: Expr::var(cnt.clone()),
                    body: vec![Stmt::Assign {
                        target: var.clone().index(Expr::var("i")),
                        value: self.strategy.from_native(native_elem.clone()),
                    }],
                });
                plan.cleanup.push(Stmt::ForRange {
                    index: "i".to_string(),
                    count: Expr::var(cnt),
                    body: vec![Stmt::Eval(manual.release_native(native_elem))],
                });
            }
        }

        if let (Some(slot), Some(arg)) = (count_slot, count_arg) {
            if inverted {
                plan.native_slots.push(slot);
                plan.native_slots.push(array_slot);
                plan.call_args.push(arg);
                plan.call_args.push(array_arg);
            } else {
                plan.native_slots.push(array_slot);
                plan.native_slots.push(slot);
                plan.call_args.push(array_arg);
                plan.call_args.push(arg);
            }
        } else {
            plan.native_slots.push(array_slot);
            plan.call_args.push(array_arg);
        }

        plan
    }
}

// ---------------------------------------------------------------------------
// Return values
// ---------------------------------------------------------------------------

/// The marshaling decision for a return value.
#[derive(Debug, Clone)]
pub struct ReturnPlan {
    pub marshal_ty: MarshalTy,
    pub managed_ty: String,
    pub is_void: bool,
    convert: Expr,
    pub default: Expr,
}

impl ReturnPlan {
    /// Classify a return value; `None` excludes the member.
    pub fn classify(member: &str, ret: &RetDef, table: &SymbolTable) -> Option<ReturnPlan> {
        let Some(strategy) = table.resolve(&ret.native_type) else {
            warn!(member, ty = %ret.native_type, "unknown return type");
            return None;
        };

        let is_array = ret.is_array || ret.null_term_array;
        let raw = Expr::var("raw_ret");

        // Element-typed containers convert through a list helper that
        // honors both container and element ownership.
        if let Some(element_ty) = &ret.element_type {
            let Some(element) = table.resolve(element_ty) else {
                warn!(member, ty = %element_ty, "unknown return element type");
                return None;
            };
            let managed = format!("{}[]", element.managed_name());
            let convert = Expr::helper(
                "list_ptr_to_array",
                vec![
                    raw,
                    Expr::Verbatim(element.managed_name().to_string()),
                    Expr::Bool(ret.owned),
                    Expr::Bool(ret.elements_owned),
                ],
            );
            return Some(ReturnPlan {
                marshal_ty: MarshalTy::Ptr,
                managed_ty: managed,
                is_void: false,
                convert,
                default: Expr::Null,
            });
        }

        let managed_base = strategy.managed_name().to_string();
        let is_void = !is_array && managed_base == "void";

        let marshal_ty = if is_array {
            MarshalTy::Ptr
        } else {
            strategy.marshal_ty()
        };
        let managed_ty = if is_array {
            format!("{managed_base}[]")
        } else {
            managed_base
        };

        let convert = if is_array {
            Expr::helper(
                "array_ptr_to_array",
                vec![
                    raw,
                    Expr::Verbatim(strategy.managed_name().to_string()),
                    Expr::Bool(ret.owned),
                    Expr::Bool(ret.elements_owned),
                    Expr::Bool(ret.null_term_array),
                ],
            )
        } else {
            strategy.from_native_owned(raw, ret.owned)
        };

        let default = match &ret.default_value {
            Some(value) => Expr::Verbatim(value.clone()),
            None => strategy.default_value(),
        };

        Some(ReturnPlan {
            marshal_ty,
            managed_ty,
            is_void,
            convert,
            default,
        })
    }

    /// Conversion of the raw native return into the managed value. The
    /// input expression replaces the `raw_ret` placeholder.
    pub fn from_native(&self) -> &Expr {
        &self.convert
    }
}
