//! ABI struct layout — binary-compatible field descriptions.
//!
//! The engine emits no numeric offsets. Each field yields a
//! (prev, next, size, align, bits) descriptor from which a classic C layout
//! pass derives offsets at codegen/run time: every field aligned to its
//! natural alignment, total size rounded up to the max alignment. Types
//! without declared alignment fall back to the offsetof probe.
//!
//! Validity is all-or-nothing per struct: one bad field and the whole
//! description is withheld, and every subtype that would have reused these
//! fields is withheld with it.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::ir::{AbiField, AbiLayout, AlignExpr, SizeExpr};
use crate::model::{AbiChild, ClassDecl, FieldDef, UnionDef};
use crate::strategy::{DeclaredKind, Strategy};
use crate::symbols::SymbolTable;

/// Computed ABI capability of one declared type.
#[derive(Debug, Clone)]
pub struct AbiInfo {
    /// Present only when `valid`; never a partial list.
    pub layout: Option<AbiLayout>,
    pub valid: bool,
}

impl AbiInfo {
    fn invalid() -> AbiInfo {
        AbiInfo {
            layout: None,
            valid: false,
        }
    }
}

/// Resolves layouts across the whole declaration set, following parent
/// chains with memoization.
pub struct LayoutEngine<'a> {
    table: &'a SymbolTable,
    classes: HashMap<String, &'a ClassDecl>,
    cache: HashMap<String, AbiInfo>,
    in_progress: HashSet<String>,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(table: &'a SymbolTable, classes: impl IntoIterator<Item = &'a ClassDecl>) -> Self {
        let classes = classes
            .into_iter()
            .map(|c| (c.native_name.clone(), c))
            .collect();
        LayoutEngine {
            table,
            classes,
            cache: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    /// ABI info for a native type name, computing and caching on demand.
    pub fn info(&mut self, native: &str) -> AbiInfo {
        if let Some(cached) = self.cache.get(native) {
            return cached.clone();
        }
        if !self.in_progress.insert(native.to_string()) {
            warn!(name = native, "parent cycle in struct declarations");
            return AbiInfo::invalid();
        }
        let info = match self.classes.get(native).copied() {
            Some(class) => self.compute(class),
            None => AbiInfo::invalid(),
        };
        self.in_progress.remove(native);
        self.cache.insert(native.to_string(), info.clone());
        info
    }

    fn compute(&mut self, class: &ClassDecl) -> AbiInfo {
        // Parent validity gates ours regardless of our own fields. Only a
        // parent declared in this run participates; a hand-wrapped parent
        // type owns its own layout.
        let parent_info = match &class.parent {
            Some(parent) if self.classes.contains_key(parent) => {
                let info = self.info(parent);
                if !info.valid {
                    warn!(
                        name = %class.native_name,
                        parent = %parent,
                        "parent ABI is invalid; withholding struct ABI"
                    );
                    return AbiInfo::invalid();
                }
                Some((parent.clone(), info))
            }
            _ => None,
        };

        if class.abi_children.is_empty() {
            // No own fields: with a parent this is "reuse the parent's
            // complete list", which emits differently from an empty list.
            return match parent_info {
                Some((parent, _)) => AbiInfo {
                    layout: Some(AbiLayout::InheritParent { parent }),
                    valid: true,
                },
                None => AbiInfo {
                    layout: Some(AbiLayout::Empty),
                    valid: true,
                },
            };
        }

        let mut fields = Vec::new();
        let names = child_names(&class.abi_children);
        for (idx, child) in class.abi_children.iter().enumerate() {
            let prev = if idx > 0 { Some(names[idx - 1].clone()) } else { None };
            let next = names.get(idx + 1).cloned();
            let generated = match child {
                AbiChild::Field(field) => self
                    .field_descriptor(field, &class.native_name, prev, next)
                    .map(|f| vec![f]),
                AbiChild::Union(union) => {
                    self.union_descriptors(union, &class.native_name, prev, next)
                }
            };
            match generated {
                Some(mut descriptors) => fields.append(&mut descriptors),
                None => {
                    warn!(
                        name = %class.native_name,
                        "can't generate ABI compatible struct"
                    );
                    return AbiInfo::invalid();
                }
            }
        }

        AbiInfo {
            layout: Some(AbiLayout::Fields(fields)),
            valid: true,
        }
    }

    /// Descriptor for a plain field; `None` invalidates the struct.
    fn field_descriptor(
        &self,
        field: &FieldDef,
        container: &str,
        prev: Option<String>,
        next: Option<String>,
    ) -> Option<AbiField> {
        let strategy = self.table.resolve(&field.native_type);
        let pointer = is_c_pointer(field, strategy);

        if strategy.is_none() && !pointer && !field.is_callback {
            warn!(
                field = %field.native_name,
                container,
                ty = %field.native_type,
                "field has no managed type, can't generate ABI field"
            );
            return None;
        }

        let base_size = if pointer {
            SizeExpr::PointerSize
        } else {
            let strategy = strategy?;
            match strategy.size_of() {
                Some(size) => size,
                None => SizeExpr::SizeOf(strategy.managed_name().to_string()),
            }
        };
        let size = match field.array_len {
            Some(len) if field.is_fixed_array() => SizeExpr::Scaled(Box::new(base_size), len),
            _ => base_size,
        };

        let align = if field.is_bitfield() {
            AlignExpr::One
        } else if pointer {
            AlignExpr::PointerSize
        } else {
            match strategy.and_then(Strategy::align_of) {
                Some(align) => align,
                // Unknown alignment: the offsetof trick. The probe struct
                // is `{ i8 pad; T field; }`; the field's offset inside it
                // is the natural alignment.
                None => AlignExpr::Probe {
                    probe_struct: probe_name(container, &field.native_name),
                    field: field.native_name.replace('.', "_"),
                },
            }
        };

        Some(AbiField {
            name: field.native_name.clone(),
            prev,
            next,
            size,
            align,
            bits: field.bits,
        })
    }

    /// Union descriptors: every alternative's fields at offset zero
    /// (dotted names), then the union slot itself whose size defers to the
    /// max across the name groups.
    fn union_descriptors(
        &self,
        union: &UnionDef,
        container: &str,
        prev: Option<String>,
        next: Option<String>,
    ) -> Option<Vec<AbiField>> {
        if !union.well_formed {
            warn!(union = %union.native_name, "can't generate ABI compatible union");
            return None;
        }

        let mut fields = Vec::new();
        let mut groups = Vec::new();

        for alt in &union.alts {
            let mut group = Vec::new();
            let qualified: Vec<String> = alt
                .fields
                .iter()
                .map(|f| {
                    if alt.bare {
                        format!("{}.{}", union.native_name, f.native_name)
                    } else {
                        format!("{}.{}.{}", union.native_name, alt.name, f.native_name)
                    }
                })
                .collect();

            let mut alt_prev = prev.clone();
            for (idx, field) in alt.fields.iter().enumerate() {
                let alt_next = qualified.get(idx + 1).cloned().or_else(|| next.clone());
                let mut descriptor =
                    self.field_descriptor(field, container, alt_prev.clone(), alt_next)?;
                descriptor.name = qualified[idx].clone();
                group.push(descriptor.name.clone());
                alt_prev = Some(descriptor.name.clone());
                fields.push(descriptor);
            }
            groups.push(group);
        }

        fields.push(AbiField {
            name: union.native_name.clone(),
            prev,
            next,
            size: SizeExpr::UnionGroups(groups),
            align: AlignExpr::PointerSize,
            bits: 0,
        });

        Some(fields)
    }
}

fn child_names(children: &[AbiChild]) -> Vec<String> {
    children
        .iter()
        .map(|c| match c {
            AbiChild::Field(f) => f.native_name.clone(),
            AbiChild::Union(u) => u.native_name.clone(),
        })
        .collect()
}

fn probe_name(container: &str, field: &str) -> String {
    format!(
        "{}_{}Align",
        container.replace('.', "_"),
        field.replace('.', "_")
    )
}

/// Whether this field's storage is pointer-shaped regardless of its
/// declared type.
fn is_c_pointer(field: &FieldDef, strategy: Option<&Strategy>) -> bool {
    field.native_type.ends_with('*')
        || field.native_type.ends_with("pointer")
        || field.is_callback
        || strategy.is_some_and(|s| {
            s.declared_kind() == Some(DeclaredKind::Callback) || s.managed_name() == "string"
        })
        || (field.native_type == "guint8" && field.is_array && field.null_term_array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Access, UnionAlt};

    fn field(native_name: &str, ty: &str) -> FieldDef {
        FieldDef {
            native_name: native_name.to_string(),
            name: native_name.to_string(),
            native_type: ty.to_string(),
            readable: true,
            writeable: true,
            access: Access::Public,
            ..FieldDef::default()
        }
    }

    fn class(native: &str, parent: Option<&str>, children: Vec<AbiChild>) -> ClassDecl {
        ClassDecl {
            native_name: native.to_string(),
            name: native.trim_start_matches("Test").to_string(),
            namespace: "Test".to_string(),
            parent: parent.map(str::to_string),
            abi_children: children,
            ..ClassDecl::default()
        }
    }

    #[test]
    fn sequential_fields_link_prev_and_next() {
        let table = SymbolTable::with_builtins();
        let c = class(
            "TestRect",
            None,
            vec![
                AbiChild::Field(field("x", "gint")),
                AbiChild::Field(field("y", "gint")),
                AbiChild::Field(field("name", "gchar*")),
            ],
        );
        let mut engine = LayoutEngine::new(&table, [&c]);
        let info = engine.info("TestRect");
        assert!(info.valid);
        let AbiLayout::Fields(fields) = info.layout.unwrap() else {
            panic!("expected own field list");
        };
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].prev, None);
        assert_eq!(fields[0].next.as_deref(), Some("y"));
        assert_eq!(fields[1].prev.as_deref(), Some("x"));
        assert_eq!(fields[2].next, None);
        // A string pointer field is pointer-sized.
        assert_eq!(fields[2].size, SizeExpr::PointerSize);
    }

    #[test]
    fn unknown_field_type_invalidates_whole_struct() {
        let table = SymbolTable::with_builtins();
        let c = class(
            "TestBad",
            None,
            vec![
                AbiChild::Field(field("ok", "gint")),
                AbiChild::Field(field("mystery", "NoSuchType")),
            ],
        );
        let mut engine = LayoutEngine::new(&table, [&c]);
        let info = engine.info("TestBad");
        assert!(!info.valid);
        assert!(info.layout.is_none());
    }

    #[test]
    fn invalid_parent_poisons_subtype() {
        let mut table = SymbolTable::with_builtins();
        let bad = class(
            "TestBase",
            None,
            vec![AbiChild::Field(field("mystery", "NoSuchType"))],
        );
        let child = class("TestChild", Some("TestBase"), vec![]);
        for c in [&bad, &child] {
            table.register(Strategy::Declared {
                base: crate::strategy::StrategyBase::new(
                    &c.native_name,
                    &format!("Test.{}", c.name),
                    crate::ir::Expr::Null,
                ),
                kind: DeclaredKind::Struct,
            });
        }
        let mut engine = LayoutEngine::new(&table, [&bad, &child]);
        assert!(!engine.info("TestBase").valid);
        assert!(!engine.info("TestChild").valid);
    }

    #[test]
    fn parentless_empty_struct_is_empty_not_inherited() {
        let table = SymbolTable::with_builtins();
        let c = class("TestNothing", None, vec![]);
        let mut engine = LayoutEngine::new(&table, [&c]);
        let info = engine.info("TestNothing");
        assert!(info.valid);
        assert_eq!(info.layout, Some(AbiLayout::Empty));
    }

    #[test]
    fn fieldless_child_reuses_parent_fields() {
        let mut table = SymbolTable::with_builtins();
        let parent = class("TestBase", None, vec![AbiChild::Field(field("n", "gint"))]);
        let child = class("TestChild", Some("TestBase"), vec![]);
        for c in [&parent, &child] {
            table.register(Strategy::Declared {
                base: crate::strategy::StrategyBase::new(
                    &c.native_name,
                    &format!("Test.{}", c.name),
                    crate::ir::Expr::Null,
                ),
                kind: DeclaredKind::Struct,
            });
        }
        let mut engine = LayoutEngine::new(&table, [&parent, &child]);
        assert!(engine.info("TestBase").valid);
        let info = engine.info("TestChild");
        assert!(info.valid);
        assert_eq!(
            info.layout,
            Some(AbiLayout::InheritParent {
                parent: "TestBase".to_string()
            })
        );
    }

    #[test]
    fn bitfields_probe_with_alignment_one() {
        let table = SymbolTable::with_builtins();
        let mut bf = field("flags", "guint");
        bf.bits = 3;
        let c = class("TestBits", None, vec![AbiChild::Field(bf)]);
        let mut engine = LayoutEngine::new(&table, [&c]);
        let AbiLayout::Fields(fields) = engine.info("TestBits").layout.unwrap() else {
            panic!();
        };
        assert_eq!(fields[0].align, AlignExpr::One);
        assert_eq!(fields[0].bits, 3);
    }

    #[test]
    fn union_members_sit_at_offset_zero_groups() {
        let table = SymbolTable::with_builtins();
        let union = UnionDef {
            name: "value".to_string(),
            native_name: "value".to_string(),
            well_formed: true,
            alts: vec![
                UnionAlt {
                    name: "i".to_string(),
                    fields: vec![field("v_int", "gint")],
                    bare: true,
                },
                UnionAlt {
                    name: "point".to_string(),
                    fields: vec![field("x", "gdouble"), field("y", "gdouble")],
                    bare: false,
                },
            ],
        };
        let c = class("TestValue", None, vec![AbiChild::Union(union)]);
        let mut engine = LayoutEngine::new(&table, [&c]);
        let info = engine.info("TestValue");
        assert!(info.valid);
        let AbiLayout::Fields(fields) = info.layout.unwrap() else {
            panic!();
        };
        // Two alt groups (1 + 2 fields) plus the union slot itself.
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].name, "value.v_int");
        assert_eq!(fields[1].name, "value.point.x");
        assert_eq!(fields[2].name, "value.point.y");
        let union_slot = &fields[3];
        assert_eq!(
            union_slot.size,
            SizeExpr::UnionGroups(vec![
                vec!["value.v_int".to_string()],
                vec!["value.point.x".to_string(), "value.point.y".to_string()],
            ])
        );
    }

    #[test]
    fn fixed_array_scales_element_size() {
        let table = SymbolTable::with_builtins();
        let mut arr = field("data", "guint8");
        arr.is_array = true;
        arr.array_len = Some(16);
        let c = class("TestArr", None, vec![AbiChild::Field(arr)]);
        let mut engine = LayoutEngine::new(&table, [&c]);
        let AbiLayout::Fields(fields) = engine.info("TestArr").layout.unwrap() else {
            panic!();
        };
        assert_eq!(
            fields[0].size,
            SizeExpr::Scaled(Box::new(SizeExpr::SizeOf("byte".to_string())), 16)
        );
    }
}
