//! Intermediate representation — the bridge between marshaling decisions and
//! text emission.
//!
//! The decision engine (symbols, strategies, parameter classification, ABI
//! layout) produces these types; `emit` renders them. Nothing in here knows
//! about the target language's concrete syntax, which keeps both sides easy
//! to test in isolation.

/// ABI transport type of a marshaled value — what actually crosses the
/// native call boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalTy {
    Void,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Generic untyped pointer. Strings, handles and staged struct buffers
    /// all travel as this.
    Ptr,
    /// Pointer-sized integer (C `long`/`size_t` family on LP64).
    WordInt { signed: bool },
    /// A managed type passed through unchanged (simple value types whose
    /// managed and transport representations coincide).
    Named(String),
    /// Flat array of an element transport type.
    Array(Box<MarshalTy>),
}

impl MarshalTy {
    pub fn array_of(elem: MarshalTy) -> MarshalTy {
        MarshalTy::Array(Box::new(elem))
    }

    /// Element type if this is an array transport, otherwise self.
    pub fn element(&self) -> &MarshalTy {
        match self {
            MarshalTy::Array(inner) => inner,
            other => other,
        }
    }
}

impl std::fmt::Display for MarshalTy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarshalTy::Void => f.write_str("void"),
            MarshalTy::Bool => f.write_str("bool"),
            MarshalTy::I8 => f.write_str("i8"),
            MarshalTy::U8 => f.write_str("u8"),
            MarshalTy::I16 => f.write_str("i16"),
            MarshalTy::U16 => f.write_str("u16"),
            MarshalTy::I32 => f.write_str("i32"),
            MarshalTy::U32 => f.write_str("u32"),
            MarshalTy::I64 => f.write_str("i64"),
            MarshalTy::U64 => f.write_str("u64"),
            MarshalTy::F32 => f.write_str("f32"),
            MarshalTy::F64 => f.write_str("f64"),
            MarshalTy::Ptr => f.write_str("ptr"),
            MarshalTy::WordInt { signed: true } => f.write_str("word_int"),
            MarshalTy::WordInt { signed: false } => f.write_str("word_uint"),
            MarshalTy::Named(name) => f.write_str(name),
            MarshalTy::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

/// Pass direction of a native call slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassDir {
    #[default]
    In,
    Out,
    Ref,
}

/// A pure expression in the generated wrapper.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A named local or parameter.
    Var(String),
    /// Managed null/none.
    Null,
    /// The native null pointer.
    NullPtr,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Element count of a managed array: `expr.length`.
    Len(Box<Expr>),
    /// `lhs + rhs`.
    Add(Box<Expr>, Box<Expr>),
    /// Cast to a named managed type: `(ty) expr`.
    Cast { ty: String, expr: Box<Expr> },
    /// `expr == null`.
    IsNull(Box<Expr>),
    /// `cond ? if_true : if_false`.
    Select {
        cond: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// `base[index]`.
    Index { base: Box<Expr>, index: Box<Expr> },
    /// Member access: `base.member`.
    Member { base: Box<Expr>, member: String },
    /// Invocation of a named runtime marshaling helper.
    Helper { name: String, args: Vec<Expr> },
    /// Construction of a managed wrapper type from a native value. When
    /// `owned` is set the constructor form that takes lifetime
    /// responsibility (or declines it) is selected.
    Wrap {
        managed: String,
        native: Box<Expr>,
        owned: Option<bool>,
    },
    /// Null-safe extraction of the native handle from a managed wrapper:
    /// `expr == null ? nullptr : expr.handle`.
    Unwrap(Box<Expr>),
    /// A fragment supplied verbatim by the input XML (symbol conversion
    /// formats, default-value overrides). Opaque to the engine.
    Verbatim(String),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn len(self) -> Expr {
        Expr::Len(Box::new(self))
    }

    pub fn cast(self, ty: impl Into<String>) -> Expr {
        Expr::Cast {
            ty: ty.into(),
            expr: Box::new(self),
        }
    }

    pub fn is_null(self) -> Expr {
        Expr::IsNull(Box::new(self))
    }

    pub fn select(cond: Expr, if_true: Expr, if_false: Expr) -> Expr {
        Expr::Select {
            cond: Box::new(cond),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    pub fn index(self, index: Expr) -> Expr {
        Expr::Index {
            base: Box::new(self),
            index: Box::new(index),
        }
    }

    pub fn member(self, member: impl Into<String>) -> Expr {
        Expr::Member {
            base: Box::new(self),
            member: member.into(),
        }
    }

    pub fn helper(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Helper {
            name: name.into(),
            args,
        }
    }

    pub fn wrap(managed: impl Into<String>, native: Expr) -> Expr {
        Expr::Wrap {
            managed: managed.into(),
            native: Box::new(native),
            owned: None,
        }
    }

    pub fn wrap_owned(managed: impl Into<String>, native: Expr, owned: bool) -> Expr {
        Expr::Wrap {
            managed: managed.into(),
            native: Box::new(native),
            owned: Some(owned),
        }
    }

    pub fn unwrap_handle(self) -> Expr {
        Expr::Unwrap(Box::new(self))
    }
}

/// A statement in the generated wrapper body.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Declare a native staging variable.
    DeclareNative {
        name: String,
        ty: MarshalTy,
        init: Option<Expr>,
    },
    /// Declare a managed variable.
    Declare {
        name: String,
        ty: String,
        init: Option<Expr>,
    },
    Assign { target: Expr, value: Expr },
    /// Evaluate for effect (release helpers and the like).
    Eval(Expr),
    /// `for index in 0..count { body }`.
    ForRange {
        index: String,
        count: Expr,
        body: Vec<Stmt>,
    },
}

/// One slot in the native import signature.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeSlot {
    pub name: String,
    pub ty: MarshalTy,
    pub dir: PassDir,
}

/// The complete marshaling decision for one parameter: what it contributes
/// to the native signature, and the statement bracket around the call.
///
/// `cleanup` must be rendered into a region that executes on every exit
/// path, including the exception path — release brackets live there, never
/// in `finish`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamPlan {
    pub native_slots: Vec<NativeSlot>,
    pub prepare: Vec<Stmt>,
    pub call_args: Vec<Expr>,
    pub finish: Vec<Stmt>,
    pub cleanup: Vec<Stmt>,
}

// ---------------------------------------------------------------------------
// ABI layout descriptors
// ---------------------------------------------------------------------------

/// Size of one ABI field, deferred to layout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeExpr {
    /// `sizeof` of a named managed transport type.
    SizeOf(String),
    /// `sizeof` of the platform pointer.
    PointerSize,
    /// `sizeof` of the underlying integer of a named enum.
    EnumUnderlying(String),
    /// Size taken from another type's computed ABI description.
    AbiOf(String),
    /// Fixed-size array: element size times the declared length.
    Scaled(Box<SizeExpr>, u32),
    /// Union field: one field-name group per overlapping alternative; the
    /// max across groups is computed at layout time, not here.
    UnionGroups(Vec<Vec<String>>),
}

/// Alignment of one ABI field, deferred to layout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignExpr {
    SizeOf(String),
    PointerSize,
    /// Bitfields always probe with alignment one.
    One,
    /// The offsetof trick: a probe struct `{ i8 pad; T field; }` whose
    /// field offset within the probe yields the natural alignment.
    Probe { probe_struct: String, field: String },
}

/// One field of a binary-compatible struct description. Offsets are not
/// computed here; the (prev, next, size, align, bits) tuple is enough for
/// the layout algorithm downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct AbiField {
    /// Field name; dotted for union substruct members (`u.sub.field`).
    pub name: String,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub size: SizeExpr,
    pub align: AlignExpr,
    /// Bit width, 0 when not a bitfield.
    pub bits: u32,
}

/// The ABI field list of one struct/class-vtable.
#[derive(Debug, Clone, PartialEq)]
pub enum AbiLayout {
    /// Ordered descriptors for the type's own fields.
    Fields(Vec<AbiField>),
    /// No own fields, but a registered parent: the layout is defined as a
    /// reuse of the parent's complete field list. Distinct from `Empty`
    /// because the two emit structurally different initialization.
    InheritParent { parent: String },
    /// Genuinely empty.
    Empty,
}
