//! Class/member model — validated declarations ready for emission.
//!
//! Phase 2 of the pipeline: every declared member is checked against the
//! frozen symbol table. Failures remove just the failing member from its
//! container, never the container itself; the statistics record each
//! exclusion. Collections are keyed by name with a mangling fallback so a
//! collision never silently overwrites.

use std::collections::{BTreeMap, HashSet};

use tracing::warn;

use crate::abi::{AbiInfo, LayoutEngine};
use crate::model::*;
use crate::params::{Parameters, ReturnPlan};
use crate::stats::Statistics;
use crate::strategy::DeclaredKind;
use crate::symbols::SymbolTable;

/// A validated method (or virtual method).
#[derive(Debug, Clone)]
pub struct MethodGen {
    pub name: String,
    pub def: MethodDef,
    pub params: Parameters,
    pub ret: ReturnPlan,
    pub is_getter: bool,
    pub is_setter: bool,
}

impl MethodGen {
    /// Property name implied by an accessor method (`GetFoo` → `Foo`).
    /// `Is` accessors keep their full name; stripping their two-letter
    /// prefix would collide with unrelated members.
    pub fn accessor_name(&self) -> &str {
        let three_letter = self.name.starts_with("Get")
            || self.name.starts_with("Has")
            || self.name.starts_with("Set");
        if three_letter && self.name.len() > 3 {
            &self.name[3..]
        } else {
            &self.name
        }
    }

    /// The managed type an accessor reads or writes.
    pub fn accessor_ty(&self) -> Option<String> {
        if self.is_getter {
            if self.params.is_accessor() {
                self.params.accessor_param().map(|p| p.managed_ty())
            } else {
                Some(self.ret.managed_ty.clone())
            }
        } else if self.is_setter {
            self.params.accessor_param().map(|p| p.managed_ty())
        } else {
            None
        }
    }
}

/// A validated constructor, possibly demoted to a static factory.
#[derive(Debug, Clone)]
pub struct CtorGen {
    pub def: CtorDef,
    pub params: Parameters,
    pub is_static: bool,
    /// `new ` shadowing marker when a parent factory has the same name.
    pub shadows_parent: bool,
}

impl CtorGen {
    /// Factory name when demoted: the explicit name, or the studly-cased
    /// `new…` suffix of the native name.
    pub fn static_name(&self) -> String {
        if let Some(name) = &self.def.name {
            return name.clone();
        }
        let native = &self.def.native_name;
        let tail = match native.find("new") {
            Some(idx) => &native[idx..],
            None => native.as_str(),
        };
        tail.split('_')
            .filter(|tok| !tok.trim().is_empty())
            .map(|tok| {
                let mut chars = tok.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    }

    /// Colon-joined visible managed parameter types; the collision key.
    fn signature_types(&self) -> String {
        self.params
            .visible()
            .map(|p| p.managed_ty())
            .collect::<Vec<_>>()
            .join(":")
    }
}

#[derive(Debug, Clone)]
pub struct SignalGen {
    pub name: String,
    pub def: SignalDef,
    pub params: Parameters,
    pub ret: ReturnPlan,
}

#[derive(Debug, Clone)]
pub struct FieldGen {
    pub name: String,
    pub def: FieldDef,
    pub managed_ty: String,
}

#[derive(Debug, Clone)]
pub struct PropertyGen {
    pub def: PropertyDef,
    pub managed_ty: String,
}

#[derive(Debug, Clone)]
pub struct ConstantGen {
    pub name: String,
    pub managed_ty: String,
    pub value: String,
}

/// A validated class-like declaration with its member collections.
#[derive(Debug)]
pub struct ClassGen {
    pub decl: ClassDecl,
    pub kind: DeclaredKind,
    pub methods: BTreeMap<String, MethodGen>,
    pub properties: BTreeMap<String, PropertyGen>,
    pub fields: BTreeMap<String, FieldGen>,
    pub signals: BTreeMap<String, SignalGen>,
    pub virtual_methods: Vec<MethodGen>,
    pub constructors: Vec<CtorGen>,
    pub constants: Vec<ConstantGen>,
    pub abi: AbiInfo,
}

impl ClassGen {
    pub fn native_name(&self) -> &str {
        &self.decl.native_name
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.decl.namespace, self.decl.name)
    }
}

/// A validated enum passes through unchanged.
#[derive(Debug)]
pub struct EnumGen {
    pub decl: EnumDecl,
}

#[derive(Debug)]
pub struct CallbackGen {
    pub decl: CallbackDecl,
    pub params: Parameters,
    pub ret: ReturnPlan,
}

/// One validated namespace.
#[derive(Debug)]
pub struct NamespaceGen {
    pub name: String,
    pub library: String,
    pub classes: Vec<String>,
    pub enums: Vec<EnumGen>,
    pub callbacks: Vec<CallbackGen>,
}

/// All validated classes, keyed by native name — the structure the
/// recursive lookups walk.
#[derive(Debug, Default)]
pub struct ClassIndex {
    classes: BTreeMap<String, ClassGen>,
}

impl ClassIndex {
    pub fn get(&self, native: &str) -> Option<&ClassGen> {
        self.classes.get(native)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassGen> {
        self.classes.values()
    }

    /// Recursive method lookup: parent chain first, then (below the root
    /// only) each implemented interface, depth-first, first match wins.
    pub fn method_recursively(&self, native: &str, name: &str) -> Option<&MethodGen> {
        self.method_rec(native, name, false)
    }

    fn method_rec(&self, native: &str, name: &str, self_check: bool) -> Option<&MethodGen> {
        let class = self.get(native)?;
        if self_check
            && let Some(found) = class.methods.get(name)
        {
            return Some(found);
        }
        if let Some(parent) = &class.decl.parent
            && let Some(found) = self.method_rec(parent, name, true)
        {
            return Some(found);
        }
        if !self_check {
            return None;
        }
        class
            .decl
            .interfaces
            .iter()
            .find_map(|iface| self.method_rec(iface, name, true))
    }

    /// Recursive property lookup: self, parent chain, then interfaces.
    pub fn property_recursively(&self, native: &str, name: &str) -> Option<&PropertyGen> {
        let mut current = Some(native.to_string());
        while let Some(cname) = current {
            let Some(class) = self.get(&cname) else { break };
            if let Some(found) = class.properties.get(name) {
                return Some(found);
            }
            current = class.decl.parent.clone();
        }
        let class = self.get(native)?;
        class
            .decl
            .interfaces
            .iter()
            .find_map(|iface| self.property_recursively(iface, name))
    }

    /// Recursive signal lookup, same shape as method lookup.
    pub fn signal_recursively(&self, native: &str, name: &str) -> Option<&SignalGen> {
        self.signal_rec(native, name, false)
    }

    fn signal_rec(&self, native: &str, name: &str, self_check: bool) -> Option<&SignalGen> {
        let class = self.get(native)?;
        if self_check
            && let Some(found) = class.signals.get(name)
        {
            return Some(found);
        }
        if let Some(parent) = &class.decl.parent
            && let Some(found) = self.signal_rec(parent, name, true)
        {
            return Some(found);
        }
        if !self_check {
            return None;
        }
        class
            .decl
            .interfaces
            .iter()
            .find_map(|iface| self.signal_rec(iface, name, true))
    }

    fn has_static_constructor(&self, native: &str, name: &str) -> bool {
        let mut current = Some(native.to_string());
        while let Some(cname) = current {
            let Some(class) = self.get(&cname) else {
                return false;
            };
            if class
                .constructors
                .iter()
                .any(|c| c.is_static && c.static_name() == name)
            {
                return true;
            }
            current = class.decl.parent.clone();
        }
        false
    }
}

/// The full validated output of phase 2.
#[derive(Debug)]
pub struct Validated {
    pub namespaces: Vec<NamespaceGen>,
    pub index: ClassIndex,
}

/// Validate everything declared by one parsed document set.
pub fn validate(api: Api, table: &SymbolTable, stats: &mut Statistics) -> Validated {
    let version = api.version;
    let mut index = ClassIndex::default();
    let mut namespaces = Vec::new();

    // ABI layouts see all class declarations, including ones whose member
    // validation later fails: binary shape and wrapper surface are
    // independent concerns.
    let all_classes: Vec<&ClassDecl> = api
        .namespaces
        .iter()
        .flat_map(|ns| ns.types.iter())
        .filter_map(|t| match t {
            TypeDecl::Object(c)
            | TypeDecl::Interface(c)
            | TypeDecl::Struct(c)
            | TypeDecl::NativeStruct(c)
            | TypeDecl::Boxed(c)
            | TypeDecl::Union(c)
            | TypeDecl::Opaque(c) => Some(c),
            _ => None,
        })
        .collect();
    let mut layouts = LayoutEngine::new(table, all_classes);
    let mut abi_by_name: BTreeMap<String, AbiInfo> = BTreeMap::new();
    for ns in &api.namespaces {
        for decl in &ns.types {
            if matches!(
                decl,
                TypeDecl::Object(_)
                    | TypeDecl::Interface(_)
                    | TypeDecl::Struct(_)
                    | TypeDecl::NativeStruct(_)
                    | TypeDecl::Boxed(_)
                    | TypeDecl::Union(_)
                    | TypeDecl::Opaque(_)
            ) {
                let native = decl.native_name().to_string();
                let info = layouts.info(&native);
                if !info.valid {
                    stats.throttle("abi");
                }
                abi_by_name.insert(native, info);
            }
        }
    }
    drop(layouts);

    for ns in api.namespaces {
        let mut r#gen = NamespaceGen {
            name: ns.name.clone(),
            library: ns.library.clone(),
            classes: Vec::new(),
            enums: Vec::new(),
            callbacks: Vec::new(),
        };

        for decl in ns.types {
            match decl {
                TypeDecl::Object(c) => validate_class(
                    c,
                    DeclaredKind::Object,
                    version,
                    table,
                    &abi_by_name,
                    stats,
                    &mut index,
                    &mut r#gen,
                ),
                TypeDecl::Interface(c) => validate_class(
                    c,
                    DeclaredKind::Interface,
                    version,
                    table,
                    &abi_by_name,
                    stats,
                    &mut index,
                    &mut r#gen,
                ),
                TypeDecl::Struct(c) => validate_class(
                    c,
                    DeclaredKind::Struct,
                    version,
                    table,
                    &abi_by_name,
                    stats,
                    &mut index,
                    &mut r#gen,
                ),
                TypeDecl::NativeStruct(c) => validate_class(
                    c,
                    DeclaredKind::NativeStruct,
                    version,
                    table,
                    &abi_by_name,
                    stats,
                    &mut index,
                    &mut r#gen,
                ),
                TypeDecl::Boxed(c) => validate_class(
                    c,
                    DeclaredKind::Boxed,
                    version,
                    table,
                    &abi_by_name,
                    stats,
                    &mut index,
                    &mut r#gen,
                ),
                TypeDecl::Union(c) => validate_class(
                    c,
                    DeclaredKind::Union,
                    version,
                    table,
                    &abi_by_name,
                    stats,
                    &mut index,
                    &mut r#gen,
                ),
                TypeDecl::Opaque(c) => validate_class(
                    c,
                    DeclaredKind::Opaque,
                    version,
                    table,
                    &abi_by_name,
                    stats,
                    &mut index,
                    &mut r#gen,
                ),
                TypeDecl::Enum(decl) => {
                    stats.enums += 1;
                    r#gen.enums.push(EnumGen { decl });
                }
                TypeDecl::Callback(decl) => {
                    let member = format!("{}.{}", decl.namespace, decl.name);
                    let Some(params) =
                        Parameters::classify(&member, &decl.params, decl.throws, version, table)
                    else {
                        stats.throttle("callbacks");
                        continue;
                    };
                    let Some(ret) = ReturnPlan::classify(&member, &decl.ret, table) else {
                        stats.throttle("callbacks");
                        continue;
                    };
                    stats.callbacks += 1;
                    r#gen.callbacks.push(CallbackGen { decl, params, ret });
                }
                TypeDecl::Alias(_) => {}
            }
        }

        namespaces.push(r#gen);
    }

    resolve_constructor_clashes(&mut index, stats);

    Validated { namespaces, index }
}

#[allow(clippy::too_many_arguments)]
fn validate_class(
    decl: ClassDecl,
    kind: DeclaredKind,
    version: ParserVersion,
    table: &SymbolTable,
    abi_by_name: &BTreeMap<String, AbiInfo>,
    stats: &mut Statistics,
    index: &mut ClassIndex,
    ns: &mut NamespaceGen,
) {
    let qualified = format!("{}.{}", decl.namespace, decl.name);

    // An unknown or invalid implemented interface fails the whole class.
    for iface in &decl.interfaces {
        if !table.is_interface(iface) {
            warn!(class = %qualified, interface = %iface, "implements unknown interface");
            stats.throttle("classes");
            return;
        }
    }

    let abi = abi_by_name
        .get(&decl.native_name)
        .cloned()
        .unwrap_or(AbiInfo {
            layout: None,
            valid: false,
        });

    let mut class = ClassGen {
        kind,
        methods: BTreeMap::new(),
        properties: BTreeMap::new(),
        fields: BTreeMap::new(),
        signals: BTreeMap::new(),
        virtual_methods: Vec::new(),
        constructors: Vec::new(),
        constants: Vec::new(),
        abi,
        decl,
    };

    for field in class.decl.fields.clone() {
        match validate_field(&qualified, &field, kind, table) {
            Some(r#gen) => {
                let key = unique_key(&class.fields, &r#gen.name);
                stats.fields += 1;
                class.fields.insert(key, r#gen);
            }
            None => stats.throttle("fields"),
        }
    }

    for def in class.decl.methods.clone() {
        match validate_method(&qualified, def, version, table) {
            Some(r#gen) => {
                let key = unique_key(&class.methods, &r#gen.name);
                stats.methods += 1;
                class.methods.insert(key, r#gen);
            }
            None => stats.throttle("methods"),
        }
    }

    for def in class.decl.properties.clone() {
        let Some(managed_ty) = table.managed_name(&def.native_type).map(str::to_string) else {
            warn!(class = %qualified, property = %def.name, ty = %def.native_type, "unknown property type");
            stats.throttle("properties");
            continue;
        };
        let key = unique_key(&class.properties, &def.name);
        stats.properties += 1;
        class.properties.insert(key, PropertyGen { def, managed_ty });
    }

    for def in class.decl.signals.clone() {
        let member = format!("{}.{}", qualified, def.name);
        let Some(params) = Parameters::classify(&member, &def.params, def.throws, version, table)
        else {
            stats.throttle("signals");
            continue;
        };
        let Some(ret) = ReturnPlan::classify(&member, &def.ret, table) else {
            stats.throttle("signals");
            continue;
        };
        let key = unique_key(&class.signals, &def.name);
        stats.signals += 1;
        class.signals.insert(
            key,
            SignalGen {
                name: def.name.clone(),
                def,
                params,
                ret,
            },
        );
    }

    for def in class.decl.virtual_methods.clone() {
        let Some(r#gen) = validate_method(&qualified, def, version, table) else {
            stats.throttle("virtual_methods");
            continue;
        };
        // Interface virtual methods need a matching target method to
        // forward to; without one (and no fixup redirect) they can't be
        // generated.
        if kind == DeclaredKind::Interface && !class.methods.contains_key(&r#gen.name) {
            warn!(class = %qualified, method = %r#gen.name, "interface virtual method has no matching target");
            stats.throttle("virtual_methods");
            continue;
        }
        stats.virtual_methods += 1;
        class.virtual_methods.push(r#gen);
    }

    for def in class.decl.constructors.clone() {
        let member = format!("{}.{}", qualified, def.native_name);
        let Some(params) =
            Parameters::classify(&member, &def.params, def.throws, version, table)
        else {
            stats.throttle("constructors");
            continue;
        };
        stats.constructors += 1;
        class.constructors.push(CtorGen {
            is_static: false,
            def,
            params,
            shadows_parent: false,
        });
    }

    for def in class.decl.constants.clone() {
        let Some(managed_ty) = table.managed_name(&def.native_type).map(str::to_string) else {
            warn!(class = %qualified, constant = %def.name, ty = %def.native_type, "unknown constant type");
            stats.throttle("constants");
            continue;
        };
        class.constants.push(ConstantGen {
            name: def.name,
            managed_ty,
            value: def.value,
        });
    }

    match kind {
        DeclaredKind::Object => stats.objects += 1,
        DeclaredKind::Interface => stats.interfaces += 1,
        DeclaredKind::Struct | DeclaredKind::NativeStruct | DeclaredKind::Union => {
            stats.structs += 1
        }
        DeclaredKind::Boxed => stats.boxed += 1,
        DeclaredKind::Opaque => stats.opaques += 1,
        _ => {}
    }

    ns.classes.push(class.decl.native_name.clone());
    index
        .classes
        .insert(class.decl.native_name.clone(), class);
}

fn validate_field(
    class: &str,
    field: &FieldDef,
    kind: DeclaredKind,
    table: &SymbolTable,
) -> Option<FieldGen> {
    // Bitfields are representable in plain struct layouts but not on
    // class-embedded fields.
    if field.is_bitfield() && matches!(kind, DeclaredKind::Object | DeclaredKind::Interface) {
        warn!(class, field = %field.name, "bitfields are unsupported on class fields");
        return None;
    }

    let pointer = field.native_type.ends_with('*') || field.native_type.ends_with("pointer");
    let managed = match table.managed_name(&field.native_type) {
        Some(name) => name.to_string(),
        None if pointer => "Pointer".to_string(),
        None => {
            warn!(class, field = %field.name, ty = %field.native_type, "unknown field type");
            return None;
        }
    };

    let managed_ty = if field.is_array {
        format!("{managed}[]")
    } else if (pointer || table.is_opaque(&field.native_type)) && managed != "string" {
        "Pointer".to_string()
    } else {
        managed
    };

    Some(FieldGen {
        name: field.name.clone(),
        def: field.clone(),
        managed_ty,
    })
}

fn validate_method(
    class: &str,
    mut def: MethodDef,
    version: ParserVersion,
    table: &SymbolTable,
) -> Option<MethodGen> {
    let member = format!("{}.{}", class, def.name);

    if def.name.is_empty() || def.native_name.is_empty() {
        warn!(member = %member, "method has no name or cname");
        return None;
    }
    // The unmangled name would collide with the runtime type accessor.
    if def.name == "GetType" {
        def.name = "GetGType".to_string();
    }

    let mut params = Parameters::classify(&member, &def.params, def.throws, version, table)?;
    let ret = ReturnPlan::classify(&member, &def.ret, table)?;

    if let Some(count_param) = &def.ret.array_length_param
        && !params.hide_count_param(count_param)
    {
        warn!(member = %member, count = %count_param, "array return references a missing count parameter");
        return None;
    }

    let name = def.name.clone();
    let is_getter = (params.is_accessor() && ret.is_void
        || params.is_empty() && !ret.is_void)
        && has_getter_name(&name);
    let is_setter =
        (params.is_accessor() || params.visible_count() == 1 && ret.is_void) && has_setter_name(&name);

    Some(MethodGen {
        name,
        def,
        params,
        ret,
        is_getter,
        is_setter,
    })
}

fn has_getter_name(name: &str) -> bool {
    if name.len() <= 3 {
        return false;
    }
    if name.starts_with("Get") || name.starts_with("Has") {
        return name.chars().nth(3).is_some_and(char::is_uppercase);
    }
    name.starts_with("Is") && name.chars().nth(2).is_some_and(char::is_uppercase)
}

fn has_setter_name(name: &str) -> bool {
    name.len() > 3 && name.starts_with("Set") && name.chars().nth(3).is_some_and(char::is_uppercase)
}

/// Insert-with-mangling: on collision append a marker and retry.
fn unique_key<V>(map: &BTreeMap<String, V>, name: &str) -> String {
    let mut key = name.to_string();
    while map.contains_key(&key) {
        key.push_str("mangled");
    }
    key
}

/// Constructor overload disambiguation: within each class, constructors
/// with identical visible signatures clash; all but one (the preferred one
/// when marked) are demoted to static named factories. Parents resolve
/// before children so factory-name shadowing is detectable.
fn resolve_constructor_clashes(index: &mut ClassIndex, stats: &mut Statistics) {
    let names: Vec<String> = index.classes.keys().cloned().collect();
    let mut done: HashSet<String> = HashSet::new();
    for name in names {
        resolve_clashes_for(index, &name, &mut done, stats);
    }
}

fn resolve_clashes_for(
    index: &mut ClassIndex,
    native: &str,
    done: &mut HashSet<String>,
    stats: &mut Statistics,
) {
    if done.contains(native) {
        return;
    }
    done.insert(native.to_string());

    let parent = index
        .get(native)
        .and_then(|c| c.decl.parent.clone());
    if let Some(parent) = parent {
        resolve_clashes_for(index, &parent, done, stats);
    }

    let Some(class) = index.classes.get(native) else {
        return;
    };

    // First pass, read-only: decide which constructors get demoted.
    let mut clash_map: BTreeMap<String, usize> = BTreeMap::new();
    let mut demote: Vec<usize> = Vec::new();
    for (i, ctor) in class.constructors.iter().enumerate() {
        let key = ctor.signature_types();
        match clash_map.get(&key).copied() {
            Some(existing) => {
                // The non-preferred one of the pair turns into a factory.
                let loser = if ctor.def.preferred { existing } else { i };
                demote.push(loser);
                if ctor.def.preferred {
                    clash_map.insert(key, i);
                }
            }
            None => {
                clash_map.insert(key, i);
            }
        }
    }

    let shadow_checks: Vec<(usize, String)> = demote
        .iter()
        .map(|&i| (i, class.constructors[i].static_name()))
        .collect();
    let parent_native = class.decl.parent.clone();
    let shadowed: Vec<(usize, bool)> = shadow_checks
        .into_iter()
        .map(|(i, factory)| {
            let shadows = parent_native
                .as_deref()
                .is_some_and(|p| index.has_static_constructor(p, &factory));
            (i, shadows)
        })
        .collect();

    let class = index
        .classes
        .get_mut(native)
        .expect("class disappeared during clash resolution");
    for (i, shadows) in shadowed {
        let ctor = &mut class.constructors[i];
        if !ctor.is_static {
            warn!(
                class = %class.decl.native_name,
                ctor = %ctor.def.native_name,
                "constructor signature clash; demoting to static factory"
            );
            ctor.is_static = true;
            stats.throttle("demoted_constructors");
        }
        ctor.shadows_parent = shadows;
    }
}
