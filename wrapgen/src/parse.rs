//! XML ingestion — api.xml documents → declaration model + symbol table.
//!
//! Malformed XML, unresolvable includes and unparseable version attributes
//! abort the run; everything recoverable is a warn-and-skip at validation
//! time, not here.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use roxmltree::{Document, Node};
use tracing::{debug, info, warn};

use crate::ir::{Expr, MarshalTy};
use crate::model::*;
use crate::strategy::{ConvFmt, DeclaredKind, Strategy, StrategyBase};
use crate::symbols::SymbolTable;

const CURRENT_PARSER_VERSION: u32 = 3;

/// Parse one input document: fold its `<include>` references into the
/// symbol table, register its own declarations, and return them for
/// generation. Included files contribute types to the table only — they are
/// not generated.
pub fn parse_file(path: &Path, include_dirs: &[PathBuf], table: &mut SymbolTable) -> Result<Api> {
    parse_file_inner(path, include_dirs, table, true)
}

fn parse_file_inner(
    path: &Path,
    include_dirs: &[PathBuf],
    table: &mut SymbolTable,
    primary: bool,
) -> Result<Api> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading input {}", path.display()))?;
    let doc = Document::parse(&text)
        .with_context(|| format!("malformed XML in {}", path.display()))?;

    let root = doc.root_element();
    if root.tag_name().name() != "api" {
        bail!(
            "unexpected root element <{}> in {}",
            root.tag_name().name(),
            path.display()
        );
    }

    let version = parse_version(&root, path)?;

    let mut namespaces = Vec::new();
    for child in root.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "include" => {
                let target = child.attribute("xml").unwrap_or_default();
                let resolved = resolve_include(target, path, include_dirs)
                    .with_context(|| format!("unresolvable include \"{target}\""))?;
                debug!(path = %resolved.display(), "folding include");
                parse_file_inner(&resolved, include_dirs, table, false)?;
            }
            "namespace" => namespaces.push(parse_namespace(&child, version, table)?),
            "symbol" => parse_symbol(&child, table),
            other => warn!(element = other, "unexpected root child node"),
        }
    }

    if primary {
        info!(
            path = %path.display(),
            version = ?version,
            namespaces = namespaces.len(),
            "parsed input document"
        );
    }

    Ok(Api {
        version,
        namespaces,
    })
}

fn parse_version(root: &Node, path: &Path) -> Result<ParserVersion> {
    let Some(raw) = root.attribute("parser_version") else {
        return Ok(ParserVersion::V1);
    };
    let number: u32 = raw.parse().with_context(|| {
        format!(
            "unparseable parser_version \"{raw}\" in {}",
            path.display()
        )
    })?;
    if number > CURRENT_PARSER_VERSION {
        warn!(
            version = number,
            path = %path.display(),
            "input produced by a newer parser; consider updating the generator"
        );
    }
    Ok(ParserVersion::from_number(number))
}

fn resolve_include(target: &str, including: &Path, include_dirs: &[PathBuf]) -> Result<PathBuf> {
    if target.is_empty() {
        bail!("include element without xml attribute");
    }
    let target_path = Path::new(target);
    if target_path.is_absolute() && target_path.exists() {
        return Ok(target_path.to_path_buf());
    }
    if let Some(parent) = including.parent() {
        let candidate = parent.join(target_path);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    for dir in include_dirs {
        let candidate = dir.join(target_path);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    if target_path.exists() {
        return Ok(target_path.to_path_buf());
    }
    bail!("not found in any include directory");
}

// ---------------------------------------------------------------------------
// Namespace-level declarations
// ---------------------------------------------------------------------------

fn parse_namespace(
    node: &Node,
    version: ParserVersion,
    table: &mut SymbolTable,
) -> Result<NamespaceDef> {
    let name = node.attribute("name").unwrap_or_default().to_string();
    let library = node.attribute("library").unwrap_or_default().to_string();

    let mut types = Vec::new();
    for child in node.children().filter(Node::is_element) {
        if attr_bool(&child, "hidden") {
            continue;
        }
        let opaque = attr_bool(&child, "opaque");
        let decl = match child.tag_name().name() {
            "alias" => {
                let native = child.attribute("cname").unwrap_or_default();
                let target = child.attribute("type").unwrap_or_default();
                if native.is_empty() || target.is_empty() {
                    continue;
                }
                Some(TypeDecl::Alias(AliasDecl {
                    native_name: native.to_string(),
                    target: target.to_string(),
                }))
            }
            "boxed" => Some(if opaque {
                TypeDecl::Opaque(parse_class(&child, &name, &library, version))
            } else {
                TypeDecl::Boxed(parse_class(&child, &name, &library, version))
            }),
            "struct" => Some(if opaque {
                TypeDecl::Opaque(parse_class(&child, &name, &library, version))
            } else if attr_bool(&child, "native") {
                TypeDecl::NativeStruct(parse_class(&child, &name, &library, version))
            } else {
                TypeDecl::Struct(parse_class(&child, &name, &library, version))
            }),
            "union" => Some(TypeDecl::Union(parse_class(&child, &name, &library, version))),
            "object" | "class" => {
                Some(TypeDecl::Object(parse_class(&child, &name, &library, version)))
            }
            "interface" => {
                Some(TypeDecl::Interface(parse_class(&child, &name, &library, version)))
            }
            "enum" | "enumeration" => Some(TypeDecl::Enum(parse_enum(&child, &name))),
            "callback" => Some(TypeDecl::Callback(parse_callback(&child, &name, version))),
            other => {
                warn!(element = other, namespace = %name, "unexpected namespace child");
                None
            }
        };
        if let Some(decl) = decl {
            register_declaration(&decl, table);
            types.push(decl);
        }
    }

    Ok(NamespaceDef {
        name,
        library,
        types,
    })
}

/// Enter a declaration into the symbol table so later classification can
/// resolve references to it.
fn register_declaration(decl: &TypeDecl, table: &mut SymbolTable) {
    let declared = |c: &ClassDecl, kind: DeclaredKind| Strategy::Declared {
        base: StrategyBase::new(
            &c.native_name,
            &format!("{}.{}", c.namespace, c.name),
            Expr::Null,
        ),
        kind,
    };
    let strategy = match decl {
        TypeDecl::Object(c) => declared(c, DeclaredKind::Object),
        TypeDecl::Interface(c) => declared(c, DeclaredKind::Interface),
        TypeDecl::Struct(c) => declared(c, DeclaredKind::Struct),
        TypeDecl::NativeStruct(c) => declared(c, DeclaredKind::NativeStruct),
        TypeDecl::Boxed(c) => declared(c, DeclaredKind::Boxed),
        TypeDecl::Union(c) => declared(c, DeclaredKind::Union),
        TypeDecl::Opaque(c) => declared(c, DeclaredKind::Opaque),
        TypeDecl::Enum(e) => Strategy::Declared {
            base: StrategyBase::new(
                &e.native_name,
                &format!("{}.{}", e.namespace, e.name),
                Expr::Int(0),
            ),
            kind: DeclaredKind::Enum,
        },
        TypeDecl::Callback(cb) => Strategy::Declared {
            base: StrategyBase::new(
                &cb.native_name,
                &format!("{}.{}", cb.namespace, cb.name),
                Expr::Null,
            ),
            kind: DeclaredKind::Callback,
        },
        TypeDecl::Alias(a) => Strategy::Alias {
            native: a.native_name.clone(),
            target: a.target.clone(),
        },
    };
    table.register(strategy);
}

/// `<symbol>` — user-declared strategies registered straight into the table.
fn parse_symbol(node: &Node, table: &mut SymbolTable) {
    let kind = node.attribute("type").unwrap_or_default();
    let native = node.attribute("cname").unwrap_or_default();
    let name = node.attribute("name").unwrap_or_default();
    if native.is_empty() {
        warn!("symbol element without cname");
        return;
    }

    let strategy = match kind {
        "simple" => {
            let default = match node.attribute("default_value") {
                Some(value) => Expr::Verbatim(value.to_string()),
                None => {
                    warn!(cname = native, "simple symbol has no default value");
                    Expr::Null
                }
            };
            Strategy::Simple {
                base: StrategyBase::new(native, name, default),
                ty: MarshalTy::Named(name.to_string()),
                size: None,
                align: None,
            }
        }
        "manual" => Strategy::Handle {
            base: StrategyBase::new(native, name, Expr::Null),
            from_native: ConvFmt::Wrap,
            abi_type: None,
        },
        "ownable" => Strategy::Ownable {
            base: StrategyBase::new(native, name, Expr::Null),
        },
        "alias" => Strategy::Alias {
            native: native.to_string(),
            target: name.to_string(),
        },
        "marshal" => {
            let marshal = marshal_ty_from_name(node.attribute("marshal_type").unwrap_or("IntPtr"));
            let call_fmt = node.attribute("call_fmt").unwrap_or("{0}").to_string();
            let from_fmt = node.attribute("from_fmt").unwrap_or("{0}").to_string();
            Strategy::Convert {
                base: StrategyBase::new(native, name, Expr::Null),
                marshal,
                to_native: ConvFmt::Template(call_fmt),
                from_native: ConvFmt::Template(from_fmt),
            }
        }
        "struct" => Strategy::ByRef {
            base: StrategyBase::new(native, name, Expr::Null),
        },
        other => {
            warn!(cname = native, kind = other, "unexpected symbol type");
            return;
        }
    };
    table.register(strategy);
}

fn marshal_ty_from_name(name: &str) -> MarshalTy {
    match name {
        "IntPtr" | "ptr" | "pointer" => MarshalTy::Ptr,
        "bool" => MarshalTy::Bool,
        "sbyte" => MarshalTy::I8,
        "byte" => MarshalTy::U8,
        "short" => MarshalTy::I16,
        "ushort" => MarshalTy::U16,
        "int" => MarshalTy::I32,
        "uint" => MarshalTy::U32,
        "long" => MarshalTy::I64,
        "ulong" => MarshalTy::U64,
        "float" => MarshalTy::F32,
        "double" => MarshalTy::F64,
        other => MarshalTy::Named(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Class-like declarations
// ---------------------------------------------------------------------------

fn parse_class(node: &Node, namespace: &str, library: &str, version: ParserVersion) -> ClassDecl {
    let mut class = ClassDecl {
        native_name: node.attribute("cname").unwrap_or_default().to_string(),
        name: node.attribute("name").unwrap_or_default().to_string(),
        namespace: namespace.to_string(),
        library: library.to_string(),
        parent: node
            .attribute("parent")
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        deprecated: attr_bool(node, "deprecated"),
        abstract_: attr_bool(node, "abstract"),
        ..ClassDecl::default()
    };

    let mut abi_field_count = 0usize;
    for member in node.children().filter(Node::is_element) {
        match member.tag_name().name() {
            "field" => {
                let field = parse_field(&member);
                abi_field_count += 1;
                // Skip the instance parent struct when it leads the field
                // list; its storage is the parent's, not ours. The pointer
                // strip tolerates inputs that mark it as a pointer.
                let is_instance_parent = abi_field_count == 1
                    && class
                        .parent
                        .as_deref()
                        .is_some_and(|p| field.native_type.trim_end_matches('*') == p);
                if !is_instance_parent {
                    class.abi_children.push(AbiChild::Field(field.clone()));
                }
                if !field.hidden && !field.is_callback {
                    class.fields.push(field);
                }
            }
            "union" => {
                class.abi_children.push(AbiChild::Union(parse_union(&member)));
            }
            "method" => {
                if !attr_bool(&member, "hidden") {
                    class.methods.push(parse_method(&member, version));
                }
            }
            "virtual_method" => {
                if !attr_bool(&member, "hidden") {
                    class.virtual_methods.push(parse_method(&member, version));
                }
            }
            "constructor" => {
                if !attr_bool(&member, "hidden") {
                    class.constructors.push(parse_ctor(&member, version));
                }
            }
            "property" => {
                if !attr_bool(&member, "hidden") {
                    class.properties.push(parse_property(&member));
                }
            }
            "signal" => {
                if !attr_bool(&member, "hidden") {
                    class.signals.push(parse_signal(&member, version));
                }
            }
            "implements" => {
                for iface in member.children().filter(Node::is_element) {
                    if iface.tag_name().name() != "interface" || attr_bool(&iface, "hidden") {
                        continue;
                    }
                    if let Some(cname) = iface.attribute("cname") {
                        class.interfaces.push(cname.to_string());
                    }
                }
            }
            "constant" => class.constants.push(ConstantDef {
                name: member.attribute("name").unwrap_or_default().to_string(),
                native_type: member.attribute("ctype").unwrap_or("gint").to_string(),
                value: member.attribute("value").unwrap_or_default().to_string(),
            }),
            "disable_default_constructor" => {}
            other => {
                debug!(element = other, class = %class.native_name, "unhandled class child")
            }
        }
    }

    class
}

fn parse_field(node: &Node) -> FieldDef {
    let native_name = node.attribute("cname").unwrap_or_default().to_string();
    let name = node
        .attribute("name")
        .map(str::to_string)
        .unwrap_or_else(|| native_name.clone());
    let access = match node.attribute("access") {
        Some("private") => Access::Private,
        _ => Access::Public,
    };
    let array_len = node
        .attribute("array_len")
        .and_then(|raw| match raw.parse() {
            Ok(len) => Some(len),
            Err(_) => {
                warn!(field = %native_name, raw, "non-numeric array_len");
                None
            }
        });
    let is_padding = attr_bool(node, "is-padding")
        || (access == Access::Private
            && (native_name.starts_with("dummy") || native_name.starts_with("padding")));

    FieldDef {
        is_array: attr_bool(node, "array") || node.attribute("array_len").is_some(),
        null_term_array: attr_bool(node, "null_term_array"),
        native_type: node.attribute("type").unwrap_or_default().to_string(),
        bits: node
            .attribute("bits")
            .and_then(|b| b.parse().ok())
            .unwrap_or(0),
        hidden: attr_bool(node, "hidden"),
        is_callback: attr_bool(node, "is_callback"),
        readable: node.attribute("readable") != Some("false"),
        writeable: node.attribute("writeable") != Some("false"),
        access,
        is_padding,
        native_name,
        name,
        array_len,
    }
}

fn parse_union(node: &Node) -> UnionDef {
    let mut alts = Vec::new();
    let mut well_formed = true;
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "struct" => {
                let mut fields = Vec::new();
                for f in child.children().filter(Node::is_element) {
                    if f.tag_name().name() == "field" {
                        fields.push(parse_field(&f));
                    } else {
                        well_formed = false;
                    }
                }
                alts.push(UnionAlt {
                    name: child.attribute("name").unwrap_or_default().to_string(),
                    fields,
                    bare: false,
                });
            }
            "field" => alts.push(UnionAlt {
                name: child.attribute("name").unwrap_or_default().to_string(),
                fields: vec![parse_field(&child)],
                bare: true,
            }),
            other => {
                warn!(element = other, "unexpected union child");
                well_formed = false;
            }
        }
    }
    UnionDef {
        name: node.attribute("name").unwrap_or_default().to_string(),
        native_name: node.attribute("cname").unwrap_or_default().to_string(),
        alts,
        well_formed,
    }
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

fn parse_method(node: &Node, version: ParserVersion) -> MethodDef {
    let (params, throws) = parse_parameters(node, version);
    MethodDef {
        name: node.attribute("name").unwrap_or_default().to_string(),
        native_name: node.attribute("cname").unwrap_or_default().to_string(),
        shared: node.attribute("shared") == Some("true"),
        deprecated: attr_bool(node, "deprecated"),
        new_flag: attr_bool(node, "new_flag"),
        accessibility: node.attribute("accessibility").map(str::to_string),
        library: node.attribute("library").map(str::to_string),
        throws,
        params,
        ret: parse_return(node),
    }
}

fn parse_ctor(node: &Node, version: ParserVersion) -> CtorDef {
    let (params, throws) = parse_parameters(node, version);
    CtorDef {
        native_name: node.attribute("cname").unwrap_or_default().to_string(),
        name: node
            .attribute("name")
            .filter(|n| !n.is_empty())
            .map(str::to_string),
        preferred: attr_bool(node, "preferred"),
        throws,
        params,
    }
}

fn parse_property(node: &Node) -> PropertyDef {
    PropertyDef {
        name: node.attribute("name").unwrap_or_default().to_string(),
        native_name: node.attribute("cname").unwrap_or_default().to_string(),
        native_type: node.attribute("type").unwrap_or_default().to_string(),
        readable: attr_bool(node, "readable"),
        writeable: attr_bool(node, "writeable"),
        construct_only: attr_bool(node, "construct-only"),
    }
}

fn parse_signal(node: &Node, version: ParserVersion) -> SignalDef {
    let (params, throws) = parse_parameters(node, version);
    SignalDef {
        name: node.attribute("name").unwrap_or_default().to_string(),
        native_name: node.attribute("cname").unwrap_or_default().to_string(),
        when: node.attribute("when").map(str::to_string),
        throws,
        params,
        ret: parse_return(node),
    }
}

/// Parse the `<parameters>` child. The throws flag is explicit in version 3
/// and implied (for trailing `GError**`) in earlier versions.
fn parse_parameters(node: &Node, version: ParserVersion) -> (Vec<ParamDef>, bool) {
    let Some(list) = node
        .children()
        .filter(Node::is_element)
        .find(|c| c.tag_name().name() == "parameters")
    else {
        return (Vec::new(), version.implicit_throws());
    };

    let throws = version.implicit_throws() || attr_bool(&list, "throws");

    let params = list
        .children()
        .filter(Node::is_element)
        .filter(|p| p.tag_name().name() == "parameter")
        .map(|p| ParamDef {
            name: p.attribute("name").unwrap_or_default().to_string(),
            native_type: p.attribute("type").unwrap_or_default().to_string(),
            pass_as: p.attribute("pass_as").map(str::to_string),
            owned: p.attribute("owned") == Some("true"),
            is_array: attr_bool(&p, "array"),
            null_term_array: attr_bool(&p, "null_term_array"),
            array_len: p.attribute("array_len").and_then(|l| l.parse().ok()),
            allow_none: attr_bool(&p, "allow-none"),
            hidden: attr_bool(&p, "hidden"),
            ellipsis: attr_bool(&p, "ellipsis"),
            is_params: p.has_attribute("params"),
            scope: p.attribute("scope").map(str::to_string),
            closure: p.attribute("closure").and_then(|c| c.parse().ok()),
            destroy: p.attribute("destroy").and_then(|d| d.parse().ok()),
            property_name: p.attribute("property_name").map(str::to_string),
        })
        .collect();

    (params, throws)
}

fn parse_return(node: &Node) -> RetDef {
    let Some(ret) = node
        .children()
        .filter(Node::is_element)
        .find(|c| c.tag_name().name() == "return-type")
    else {
        return RetDef {
            native_type: "void".to_string(),
            ..RetDef::default()
        };
    };
    RetDef {
        native_type: ret.attribute("type").unwrap_or("void").to_string(),
        owned: ret.attribute("owned") == Some("true"),
        elements_owned: attr_bool(&ret, "elements_owned"),
        is_array: attr_bool(&ret, "array") || ret.has_attribute("array_length_param"),
        null_term_array: attr_bool(&ret, "null_term_array"),
        element_type: ret
            .attribute("element_type")
            .filter(|e| !e.is_empty())
            .map(str::to_string),
        array_length_param: ret
            .attribute("array_length_param")
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        default_value: ret.attribute("default_value").map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Enums and callbacks
// ---------------------------------------------------------------------------

fn parse_enum(node: &Node, namespace: &str) -> EnumDecl {
    let members = node
        .children()
        .filter(Node::is_element)
        .filter(|m| m.tag_name().name() == "member")
        .map(|m| EnumMember {
            name: m.attribute("name").unwrap_or_default().to_string(),
            native_name: m.attribute("cname").unwrap_or_default().to_string(),
            value: m.attribute("value").map(str::to_string),
        })
        .collect();
    EnumDecl {
        native_name: node.attribute("cname").unwrap_or_default().to_string(),
        name: node.attribute("name").unwrap_or_default().to_string(),
        namespace: namespace.to_string(),
        flags: node.attribute("type") == Some("flags"),
        members,
    }
}

fn parse_callback(node: &Node, namespace: &str, version: ParserVersion) -> CallbackDecl {
    let (params, throws) = parse_parameters(node, version);
    CallbackDecl {
        native_name: node.attribute("cname").unwrap_or_default().to_string(),
        name: node.attribute("name").unwrap_or_default().to_string(),
        namespace: namespace.to_string(),
        throws,
        params,
        ret: parse_return(node),
    }
}

fn attr_bool(node: &Node, name: &str) -> bool {
    matches!(node.attribute(name), Some("1") | Some("true"))
}
