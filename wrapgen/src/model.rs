//! Parsed declaration model — the bridge between XML ingestion and the
//! validation/emission phases.
//!
//! These types are XML-independent: the parser builds them, everything
//! downstream reads them. Attribute semantics (hidden, owned, array-ness)
//! are carried verbatim here and interpreted by the classification code.

/// Structural generation of the input document, selected by the root's
/// `parser_version` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ParserVersion {
    V1,
    V2,
    V3,
}

impl ParserVersion {
    pub fn from_number(n: u32) -> ParserVersion {
        match n {
            0 | 1 => ParserVersion::V1,
            2 => ParserVersion::V2,
            _ => ParserVersion::V3,
        }
    }

    /// Versions 1 and 2 treat every trailing `GError**` parameter as a
    /// throwing error slot; version 3 requires the explicit attribute.
    pub fn implicit_throws(self) -> bool {
        self <= ParserVersion::V2
    }

    /// Version 3 carries explicit closure/destroy indices on callback
    /// parameters; earlier versions rely on positional heuristics.
    pub fn explicit_closures(self) -> bool {
        self >= ParserVersion::V3
    }
}

/// A fully parsed input document set.
#[derive(Debug)]
pub struct Api {
    pub version: ParserVersion,
    pub namespaces: Vec<NamespaceDef>,
}

/// One `<namespace>` block.
#[derive(Debug)]
pub struct NamespaceDef {
    pub name: String,
    pub library: String,
    pub types: Vec<TypeDecl>,
}

/// A type declaration inside a namespace.
#[derive(Debug)]
pub enum TypeDecl {
    Object(ClassDecl),
    Interface(ClassDecl),
    Struct(ClassDecl),
    /// Blittable struct passed by value.
    NativeStruct(ClassDecl),
    Boxed(ClassDecl),
    Union(ClassDecl),
    Opaque(ClassDecl),
    Enum(EnumDecl),
    Callback(CallbackDecl),
    Alias(AliasDecl),
}

impl TypeDecl {
    pub fn native_name(&self) -> &str {
        match self {
            TypeDecl::Object(c)
            | TypeDecl::Interface(c)
            | TypeDecl::Struct(c)
            | TypeDecl::NativeStruct(c)
            | TypeDecl::Boxed(c)
            | TypeDecl::Union(c)
            | TypeDecl::Opaque(c) => &c.native_name,
            TypeDecl::Enum(e) => &e.native_name,
            TypeDecl::Callback(cb) => &cb.native_name,
            TypeDecl::Alias(a) => &a.native_name,
        }
    }

    pub fn managed_name(&self) -> &str {
        match self {
            TypeDecl::Object(c)
            | TypeDecl::Interface(c)
            | TypeDecl::Struct(c)
            | TypeDecl::NativeStruct(c)
            | TypeDecl::Boxed(c)
            | TypeDecl::Union(c)
            | TypeDecl::Opaque(c) => &c.name,
            TypeDecl::Enum(e) => &e.name,
            TypeDecl::Callback(cb) => &cb.name,
            TypeDecl::Alias(a) => &a.target,
        }
    }
}

/// Common declaration body for object/interface/struct/boxed/union/opaque.
#[derive(Debug, Default)]
pub struct ClassDecl {
    pub native_name: String,
    pub name: String,
    pub namespace: String,
    pub library: String,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub deprecated: bool,
    pub abstract_: bool,
    /// Every `<field>`/`<union>` child in declaration order, hidden ones
    /// included — the ABI layout must see all of them.
    pub abi_children: Vec<AbiChild>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
    pub constructors: Vec<CtorDef>,
    pub properties: Vec<PropertyDef>,
    pub signals: Vec<SignalDef>,
    pub virtual_methods: Vec<MethodDef>,
    pub constants: Vec<ConstantDef>,
}

/// A child contributing to the binary layout of a class-like declaration.
#[derive(Debug)]
pub enum AbiChild {
    Field(FieldDef),
    Union(UnionDef),
}

/// A `<union>` member: named overlapping alternatives.
#[derive(Debug)]
pub struct UnionDef {
    pub name: String,
    pub native_name: String,
    pub alts: Vec<UnionAlt>,
    /// False when an alternative contained something other than fields;
    /// such a union poisons the whole enclosing layout.
    pub well_formed: bool,
}

/// One alternative of a union: either a nested `<struct>` of fields, or a
/// single bare `<field>` (which layout treats as a one-field group).
#[derive(Debug)]
pub struct UnionAlt {
    pub name: String,
    pub fields: Vec<FieldDef>,
    /// True for the bare-field form; affects name qualification.
    pub bare: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FieldDef {
    pub native_name: String,
    pub name: String,
    pub native_type: String,
    pub bits: u32,
    pub array_len: Option<u32>,
    pub null_term_array: bool,
    pub is_array: bool,
    pub access: Access,
    pub hidden: bool,
    pub is_callback: bool,
    pub is_padding: bool,
    pub readable: bool,
    pub writeable: bool,
}

impl FieldDef {
    pub fn is_bitfield(&self) -> bool {
        self.bits > 0
    }

    /// Fixed-size arrays have a declared length and no terminator.
    pub fn is_fixed_array(&self) -> bool {
        self.is_array && !self.null_term_array && self.array_len.unwrap_or(0) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Public,
    Private,
}

/// One formal parameter as parsed; classification happens later.
#[derive(Debug, Clone, Default)]
pub struct ParamDef {
    pub name: String,
    pub native_type: String,
    pub pass_as: Option<String>,
    pub owned: bool,
    pub is_array: bool,
    pub null_term_array: bool,
    pub array_len: Option<u32>,
    pub allow_none: bool,
    pub hidden: bool,
    pub ellipsis: bool,
    pub is_params: bool,
    pub scope: Option<String>,
    /// Index of the user-data parameter for a callback (version ≥ 3).
    pub closure: Option<usize>,
    /// Index of the destroy-notify parameter for a callback (version ≥ 3).
    pub destroy: Option<usize>,
    pub property_name: Option<String>,
}

/// Return-value description of a method-like construct.
#[derive(Debug, Clone, Default)]
pub struct RetDef {
    pub native_type: String,
    pub owned: bool,
    pub elements_owned: bool,
    pub is_array: bool,
    pub null_term_array: bool,
    pub element_type: Option<String>,
    pub array_length_param: Option<String>,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MethodDef {
    pub name: String,
    pub native_name: String,
    pub shared: bool,
    pub deprecated: bool,
    pub new_flag: bool,
    pub accessibility: Option<String>,
    pub library: Option<String>,
    pub throws: bool,
    pub params: Vec<ParamDef>,
    pub ret: RetDef,
}

#[derive(Debug, Clone, Default)]
pub struct CtorDef {
    pub native_name: String,
    /// Explicit static-factory name, when given.
    pub name: Option<String>,
    pub preferred: bool,
    pub throws: bool,
    pub params: Vec<ParamDef>,
}

#[derive(Debug, Clone, Default)]
pub struct PropertyDef {
    pub name: String,
    pub native_name: String,
    pub native_type: String,
    pub readable: bool,
    pub writeable: bool,
    pub construct_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SignalDef {
    pub name: String,
    pub native_name: String,
    pub when: Option<String>,
    pub throws: bool,
    pub params: Vec<ParamDef>,
    pub ret: RetDef,
}

#[derive(Debug, Clone, Default)]
pub struct ConstantDef {
    pub name: String,
    pub native_type: String,
    pub value: String,
}

#[derive(Debug)]
pub struct EnumDecl {
    pub native_name: String,
    pub name: String,
    pub namespace: String,
    pub flags: bool,
    pub members: Vec<EnumMember>,
}

#[derive(Debug)]
pub struct EnumMember {
    pub name: String,
    pub native_name: String,
    pub value: Option<String>,
}

#[derive(Debug)]
pub struct CallbackDecl {
    pub native_name: String,
    pub name: String,
    pub namespace: String,
    pub throws: bool,
    pub params: Vec<ParamDef>,
    pub ret: RetDef,
}

#[derive(Debug)]
pub struct AliasDecl {
    pub native_name: String,
    pub target: String,
}
