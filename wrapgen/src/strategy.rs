//! Type strategies — per native type, how a value crosses the boundary.
//!
//! A strategy answers the same small set of questions for every native type:
//! what transport type it uses, how a managed value converts to it, how a
//! native value converts back, and what the fallback default is. The set of
//! variants is closed; dispatch is a lookup in the symbol table followed by
//! a match, nothing reflective.

use crate::ir::{AlignExpr, Expr, MarshalTy, SizeExpr};

/// Attributes shared by every concrete strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyBase {
    /// The native spelling this strategy is registered under.
    pub native: String,
    /// Namespace-qualified managed type name.
    pub managed: String,
    /// Value returned by callbacks interrupted before producing a result.
    pub default: Expr,
}

impl StrategyBase {
    pub fn new(native: &str, managed: &str, default: Expr) -> StrategyBase {
        StrategyBase {
            native: native.to_string(),
            managed: managed.to_string(),
            default,
        }
    }

    /// Short (unqualified) managed name.
    pub fn short_name(&self) -> &str {
        self.managed.rsplit('.').next().unwrap_or(&self.managed)
    }
}

/// A single managed↔native conversion shape. Pure expression generators;
/// statement ordering is the parameter planner's concern.
#[derive(Debug, Clone, PartialEq)]
pub enum ConvFmt {
    /// Value passes through unchanged.
    Identity,
    /// Wrap in a named runtime marshaling helper.
    Helper(String),
    /// Construct the managed wrapper: `Managed(x)`.
    Wrap,
    /// Cast to a named type.
    Cast(String),
    /// Project a member: `x.member`.
    Member(String),
    /// `{0}`-style format supplied by a `<symbol type="marshal">` element.
    Template(String),
}

impl ConvFmt {
    fn apply(&self, managed: &str, expr: Expr) -> Expr {
        match self {
            ConvFmt::Identity => expr,
            ConvFmt::Helper(name) => Expr::helper(name.clone(), vec![expr]),
            ConvFmt::Wrap => Expr::wrap(managed, expr),
            ConvFmt::Cast(ty) => expr.cast(ty.clone()),
            ConvFmt::Member(member) => expr.member(member.clone()),
            ConvFmt::Template(fmt) => Expr::Verbatim(expand_template(fmt, &expr)),
        }
    }
}

/// Substitute `{0}` with a rendered placeholder for the variable. Template
/// conversions only ever receive simple variable operands, so rendering the
/// operand here does not leak emission concerns into the engine.
fn expand_template(fmt: &str, expr: &Expr) -> String {
    let operand = match expr {
        Expr::Var(name) => name.clone(),
        Expr::Verbatim(text) => text.clone(),
        other => format!("{:?}", other),
    };
    fmt.replace("{0}", &operand)
}

/// Kind of a type declared in the XML input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredKind {
    Enum,
    Object,
    Interface,
    Boxed,
    Struct,
    /// Blittable struct passed by value.
    NativeStruct,
    Union,
    Opaque,
    Callback,
}

impl DeclaredKind {
    /// Struct-like kinds are staged through a native buffer when passed as
    /// parameters.
    pub fn is_struct_like(self) -> bool {
        matches!(
            self,
            DeclaredKind::Struct | DeclaredKind::NativeStruct | DeclaredKind::Boxed | DeclaredKind::Union
        )
    }

    /// Kinds whose from-native conversion honors ownership transfer.
    pub fn is_ownable(self) -> bool {
        matches!(
            self,
            DeclaredKind::Object | DeclaredKind::Interface | DeclaredKind::Boxed | DeclaredKind::Opaque
        )
    }
}

/// The marshaling strategy for one native type.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Primitive 1:1 mapping; managed and transport representations
    /// coincide. `size`/`align` are set for the few built-ins with a known
    /// ABI footprint (function pointers used as padding, etc.).
    Simple {
        base: StrategyBase,
        ty: MarshalTy,
        size: Option<SizeExpr>,
        align: Option<AlignExpr>,
    },
    /// Platform word-width integer (`long`, `size_t` family).
    WordInt { base: StrategyBase, signed: bool },
    /// Constant string pointer: borrowed out of native memory, duplicated
    /// into it. `filename` selects filesystem encoding helpers.
    ConstString { base: StrategyBase, filename: bool },
    /// Both directions expressed as conversion formats over a transport
    /// type (`gchar`, `time_t`, `GType`, ...).
    Convert {
        base: StrategyBase,
        marshal: MarshalTy,
        to_native: ConvFmt,
        from_native: ConvFmt,
    },
    /// Opaque handle wrapped by a hand-written managed class (`GObject`,
    /// `GList`, ...). `abi_type` names the managed ABI mirror when the
    /// handle can be embedded in a struct.
    Handle {
        base: StrategyBase,
        from_native: ConvFmt,
        abi_type: Option<String>,
    },
    /// Handle whose from-native conversion carries the ownership flag.
    Ownable { base: StrategyBase },
    /// Value type staged through an allocated native buffer on every call.
    ByRef { base: StrategyBase },
    /// Transparent redirect to another entry; collapsed by the symbol
    /// table, never observed by classification code.
    Alias { native: String, target: String },
    /// A type declared by the XML input.
    Declared { base: StrategyBase, kind: DeclaredKind },
}

impl Strategy {
    pub fn native_name(&self) -> &str {
        match self {
            Strategy::Simple { base, .. }
            | Strategy::WordInt { base, .. }
            | Strategy::ConstString { base, .. }
            | Strategy::Convert { base, .. }
            | Strategy::Handle { base, .. }
            | Strategy::Ownable { base }
            | Strategy::ByRef { base }
            | Strategy::Declared { base, .. } => &base.native,
            Strategy::Alias { native, .. } => native,
        }
    }

    /// Namespace-qualified managed name. Aliases have none of their own.
    pub fn managed_name(&self) -> &str {
        match self {
            Strategy::Simple { base, .. }
            | Strategy::WordInt { base, .. }
            | Strategy::ConstString { base, .. }
            | Strategy::Convert { base, .. }
            | Strategy::Handle { base, .. }
            | Strategy::Ownable { base }
            | Strategy::ByRef { base }
            | Strategy::Declared { base, .. } => &base.managed,
            Strategy::Alias { target, .. } => target,
        }
    }

    pub fn declared_kind(&self) -> Option<DeclaredKind> {
        match self {
            Strategy::Declared { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The ABI transport type.
    pub fn marshal_ty(&self) -> MarshalTy {
        match self {
            Strategy::Simple { ty, .. } => ty.clone(),
            Strategy::WordInt { signed, .. } => MarshalTy::WordInt { signed: *signed },
            Strategy::ConstString { .. }
            | Strategy::Handle { .. }
            | Strategy::Ownable { .. }
            | Strategy::ByRef { .. } => MarshalTy::Ptr,
            Strategy::Convert { marshal, .. } => marshal.clone(),
            Strategy::Alias { .. } => MarshalTy::Ptr,
            Strategy::Declared { base, kind } => match kind {
                DeclaredKind::Enum => MarshalTy::I32,
                DeclaredKind::Callback => MarshalTy::Ptr,
                DeclaredKind::NativeStruct => MarshalTy::Named(base.managed.clone()),
                _ => MarshalTy::Ptr,
            },
        }
    }

    /// The default value a callback returns after an unhandled failure.
    pub fn default_value(&self) -> Expr {
        match self {
            Strategy::Simple { base, .. }
            | Strategy::Convert { base, .. }
            | Strategy::ConstString { base, .. }
            | Strategy::Handle { base, .. }
            | Strategy::Ownable { base }
            | Strategy::ByRef { base } => base.default.clone(),
            Strategy::WordInt { .. } => Expr::Int(0),
            Strategy::Alias { .. } => Expr::Null,
            Strategy::Declared { base, kind } => match kind {
                DeclaredKind::Enum => Expr::Cast {
                    ty: base.managed.clone(),
                    expr: Box::new(Expr::Int(0)),
                },
                _ => Expr::Null,
            },
        }
    }

    /// Expression converting a managed value to its transport form.
    pub fn to_native(&self, expr: Expr) -> Expr {
        match self {
            Strategy::Simple { .. } => expr,
            Strategy::WordInt { signed, .. } => Expr::helper(
                if *signed { "to_word_int" } else { "to_word_uint" },
                vec![expr],
            ),
            // Const strings allocate through the manual-marshal bracket;
            // the bare conversion duplicates into native memory.
            Strategy::ConstString { filename, .. } => Expr::helper(
                if *filename {
                    "string_to_filename_ptr"
                } else {
                    "string_to_utf8_ptr"
                },
                vec![expr],
            ),
            Strategy::Convert {
                base, to_native, ..
            } => to_native.apply(&base.managed, expr),
            Strategy::Handle { .. } | Strategy::Ownable { .. } => expr.unwrap_handle(),
            // By-ref values reference their staging buffer; the planner
            // names that buffer, so the bare conversion is the identity.
            Strategy::ByRef { .. } => expr,
            Strategy::Alias { .. } => expr,
            Strategy::Declared { base, kind } => match kind {
                DeclaredKind::Enum => expr.cast("int"),
                DeclaredKind::Callback => expr,
                _ => expr.unwrap_handle(),
            },
        }
    }

    /// Expression converting a transport value back to managed form.
    pub fn from_native(&self, expr: Expr) -> Expr {
        match self {
            Strategy::Simple { .. } => expr,
            Strategy::WordInt { signed, .. } => Expr::helper(
                if *signed { "from_word_int" } else { "from_word_uint" },
                vec![expr],
            ),
            Strategy::ConstString { filename, .. } => Expr::helper(
                if *filename {
                    "filename_ptr_to_string"
                } else {
                    "utf8_ptr_to_string"
                },
                vec![expr],
            ),
            Strategy::Convert {
                base, from_native, ..
            } => from_native.apply(&base.managed, expr),
            Strategy::Handle {
                base, from_native, ..
            } => from_native.apply(&base.managed, expr),
            Strategy::Ownable { base } => Expr::wrap(base.managed.clone(), expr),
            Strategy::ByRef { base } => Expr::helper(
                "ptr_to_struct",
                vec![expr, Expr::Verbatim(base.managed.clone())],
            ),
            Strategy::Alias { .. } => expr,
            Strategy::Declared { base, kind } => match kind {
                DeclaredKind::Enum => expr.cast(base.managed.clone()),
                DeclaredKind::Callback => expr,
                _ => Expr::wrap(base.managed.clone(), expr),
            },
        }
    }

    /// Ownership-aware variant of [`from_native`](Self::from_native). The
    /// flag must reach here from the XML attribute untouched; silently
    /// defaulting it is how generated code double-frees.
    pub fn from_native_owned(&self, expr: Expr, owned: bool) -> Expr {
        match self {
            Strategy::Ownable { base } => Expr::wrap_owned(base.managed.clone(), expr, owned),
            Strategy::Declared { base, kind } if kind.is_ownable() => {
                Expr::wrap_owned(base.managed.clone(), expr, owned)
            }
            other => other.from_native(expr),
        }
    }

    /// True when conversions from native must branch on ownership.
    pub fn is_ownable(&self) -> bool {
        match self {
            Strategy::Ownable { .. } => true,
            Strategy::Declared { kind, .. } => kind.is_ownable(),
            _ => false,
        }
    }

    /// The allocate-before / release-after bracket, for strategies that
    /// cannot be expressed as a single conversion expression.
    pub fn manual_marshal(&self) -> Option<ManualMarshal<'_>> {
        match self {
            Strategy::ConstString { .. } | Strategy::ByRef { .. } => {
                Some(ManualMarshal { strategy: self })
            }
            _ => None,
        }
    }

    /// Size of the type when embedded in an ABI struct. `None` means "not
    /// ABI-representable here"; the layout engine falls back to a sizeof
    /// over the transport type or fails the struct.
    pub fn size_of(&self) -> Option<SizeExpr> {
        match self {
            Strategy::Simple { size, .. } => size.clone(),
            Strategy::WordInt { .. } => Some(SizeExpr::PointerSize),
            Strategy::Handle { abi_type, .. } => {
                abi_type.as_ref().map(|ty| SizeExpr::AbiOf(ty.clone()))
            }
            Strategy::Declared { base, kind } => match kind {
                DeclaredKind::Enum => Some(SizeExpr::EnumUnderlying(base.managed.clone())),
                DeclaredKind::Struct | DeclaredKind::NativeStruct | DeclaredKind::Boxed => {
                    Some(SizeExpr::AbiOf(base.managed.clone()))
                }
                DeclaredKind::Callback => Some(SizeExpr::PointerSize),
                _ => None,
            },
            _ => None,
        }
    }

    /// Alignment when embedded in an ABI struct. `None` triggers the
    /// offsetof probe in the layout engine.
    pub fn align_of(&self) -> Option<AlignExpr> {
        match self {
            Strategy::Simple { align, .. } => align.clone(),
            Strategy::WordInt { .. } => Some(AlignExpr::PointerSize),
            Strategy::ConstString { .. } | Strategy::Handle { .. } | Strategy::Ownable { .. } => {
                Some(AlignExpr::PointerSize)
            }
            Strategy::Declared { kind, .. } => match kind {
                DeclaredKind::Callback => Some(AlignExpr::PointerSize),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Allocate/release expression pair for manual marshalers.
pub struct ManualMarshal<'a> {
    strategy: &'a Strategy,
}

impl ManualMarshal<'_> {
    /// Expression allocating the native staging value from a managed one.
    pub fn alloc_native(&self, expr: Expr) -> Expr {
        match self.strategy {
            Strategy::ConstString { filename, .. } => Expr::helper(
                if *filename {
                    "string_to_filename_ptr"
                } else {
                    "string_to_utf8_ptr"
                },
                vec![expr],
            ),
            Strategy::ByRef { .. } => Expr::helper("struct_to_ptr_alloc", vec![expr]),
            _ => unreachable!("manual_marshal() gated the variant"),
        }
    }

    /// Expression releasing the native staging value.
    pub fn release_native(&self, expr: Expr) -> Expr {
        match self.strategy {
            Strategy::ConstString { .. } => Expr::helper("free_native", vec![expr]),
            Strategy::ByRef { .. } => Expr::helper("free_native", vec![expr]),
            _ => unreachable!("manual_marshal() gated the variant"),
        }
    }
}

// ---------------------------------------------------------------------------
// Built-in strategies
// ---------------------------------------------------------------------------

fn simple(native: &str, managed: &str, default: Expr, ty: MarshalTy) -> Strategy {
    Strategy::Simple {
        base: StrategyBase::new(native, managed, default),
        ty,
        size: None,
        align: None,
    }
}

fn simple_ptr(native: &str) -> Strategy {
    Strategy::Simple {
        base: StrategyBase::new(native, "Pointer", Expr::NullPtr),
        ty: MarshalTy::Ptr,
        size: None,
        align: Some(AlignExpr::PointerSize),
    }
}

fn word_int(native: &str, signed: bool) -> Strategy {
    Strategy::WordInt {
        base: StrategyBase::new(native, if signed { "long" } else { "ulong" }, Expr::Int(0)),
        signed,
    }
}

fn const_string(native: &str, filename: bool) -> Strategy {
    Strategy::ConstString {
        base: StrategyBase::new(native, "string", Expr::Null),
        filename,
    }
}

fn handle(native: &str, managed: &str) -> Strategy {
    Strategy::Handle {
        base: StrategyBase::new(native, managed, Expr::Null),
        from_native: ConvFmt::Wrap,
        abi_type: None,
    }
}

fn handle_abi(native: &str, managed: &str, abi_type: &str) -> Strategy {
    Strategy::Handle {
        base: StrategyBase::new(native, managed, Expr::Null),
        from_native: ConvFmt::Wrap,
        abi_type: Some(abi_type.to_string()),
    }
}

fn convert(native: &str, managed: &str, marshal: MarshalTy, to: ConvFmt, from: ConvFmt) -> Strategy {
    Strategy::Convert {
        base: StrategyBase::new(native, managed, Expr::Null),
        marshal,
        to_native: to,
        from_native: from,
    }
}

/// The seed strategy set registered before any input is parsed.
pub fn builtins() -> Vec<Strategy> {
    use MarshalTy::*;

    let mut types = vec![
        // Simple one-to-one mappings.
        simple("void", "void", Expr::Null, Void),
        simple_ptr("gpointer"),
        simple_ptr("gconstpointer"),
        simple("gboolean", "bool", Expr::Bool(false), Bool),
        simple("gint", "int", Expr::Int(0), I32),
        simple("guint", "uint", Expr::Int(0), U32),
        simple("int", "int", Expr::Int(0), I32),
        simple("unsigned", "uint", Expr::Int(0), U32),
        simple("unsigned int", "uint", Expr::Int(0), U32),
        simple("unsigned-int", "uint", Expr::Int(0), U32),
        simple("gshort", "short", Expr::Int(0), I16),
        simple("gushort", "ushort", Expr::Int(0), U16),
        simple("short", "short", Expr::Int(0), I16),
        simple("guchar", "byte", Expr::Int(0), U8),
        simple("unsigned char", "byte", Expr::Int(0), U8),
        simple("unsigned-char", "byte", Expr::Int(0), U8),
        simple("guint1", "bool", Expr::Bool(false), Bool),
        simple("uint1", "bool", Expr::Bool(false), Bool),
        simple("gint8", "sbyte", Expr::Int(0), I8),
        simple("guint8", "byte", Expr::Int(0), U8),
        simple("gint16", "short", Expr::Int(0), I16),
        simple("guint16", "ushort", Expr::Int(0), U16),
        simple("gint32", "int", Expr::Int(0), I32),
        simple("guint32", "uint", Expr::Int(0), U32),
        simple("gint64", "long", Expr::Int(0), I64),
        simple("guint64", "ulong", Expr::Int(0), U64),
        simple("long long", "long", Expr::Int(0), I64),
        simple("unsigned long long", "ulong", Expr::Int(0), U64),
        simple("gfloat", "float", Expr::Float(0.0), F32),
        simple("float", "float", Expr::Float(0.0), F32),
        simple("gdouble", "double", Expr::Float(0.0), F64),
        simple("double", "double", Expr::Float(0.0), F64),
        simple("goffset", "long", Expr::Int(0), I64),
        simple("GQuark", "int", Expr::Int(0), I32),
        // Platform word-width integers.
        word_int("long", true),
        word_int("glong", true),
        word_int("gintptr", true),
        word_int("ssize_t", true),
        word_int("gssize", true),
        word_int("off_t", true),
        word_int("ulong", false),
        word_int("gulong", false),
        word_int("unsigned long", false),
        word_int("guintptr", false),
        word_int("size_t", false),
        word_int("gsize", false),
        // String constants — preserved verbatim through const trimming.
        const_string("const-gchar", false),
        const_string("const-char", false),
        const_string("const-xmlChar", false),
        const_string("const-gfilename", true),
        // Format-converted types.
        convert(
            "gfilename",
            "string",
            Ptr,
            ConvFmt::Helper("string_to_filename_ptr".into()),
            ConvFmt::Helper("filename_ptr_to_string_free".into()),
        ),
        convert(
            "gchar",
            "string",
            Ptr,
            ConvFmt::Helper("string_to_utf8_ptr".into()),
            ConvFmt::Helper("utf8_ptr_to_string_free".into()),
        ),
        convert(
            "char",
            "string",
            Ptr,
            ConvFmt::Helper("string_to_utf8_ptr".into()),
            ConvFmt::Helper("utf8_ptr_to_string_free".into()),
        ),
        convert(
            "gunichar",
            "char",
            U32,
            ConvFmt::Helper("char_to_unichar".into()),
            ConvFmt::Helper("unichar_to_char".into()),
        ),
        convert(
            "time_t",
            "DateTime",
            Ptr,
            ConvFmt::Helper("datetime_to_time_t".into()),
            ConvFmt::Helper("time_t_to_datetime".into()),
        ),
        convert(
            "GString",
            "string",
            Ptr,
            ConvFmt::Helper("string_to_gstring_ptr".into()),
            ConvFmt::Helper("gstring_ptr_to_string".into()),
        ),
        convert(
            "GType",
            "Glue.NativeType",
            Ptr,
            ConvFmt::Member("val".into()),
            ConvFmt::Wrap,
        ),
        simple("GStrv", "string[]", Expr::Null, Ptr),
        // Manually wrapped handle types. The object roots take the
        // ownership flag through every from-native conversion.
        Strategy::Ownable {
            base: StrategyBase::new("GInitiallyUnowned", "Glue.InitiallyUnowned", Expr::Null),
        },
        Strategy::Ownable {
            base: StrategyBase::new("GObject", "Glue.Object", Expr::Null),
        },
        handle("GList", "Glue.List"),
        handle("GPtrArray", "Glue.PtrArray"),
        handle("GSList", "Glue.SList"),
        handle("GVariant", "Glue.Variant"),
        handle("GVariantType", "Glue.VariantType"),
        handle("GValueArray", "Glue.ValueArray"),
        handle_abi("GMutex", "Glue.Mutex", "Glue.Mutex.Abi"),
        handle_abi("GRecMutex", "Glue.RecMutex", "Glue.RecMutex.Abi"),
        handle_abi("GCond", "Glue.Cond", "Glue.Cond.Abi"),
        handle("GDateTime", "Glue.DateTime"),
        handle("GDate", "Glue.Date"),
        handle("GSource", "Glue.Source"),
        handle("GMainContext", "Glue.MainContext"),
        handle("GBytes", "Glue.Bytes"),
        // By-reference value type.
        Strategy::ByRef {
            base: StrategyBase::new("GValue", "Glue.Value", Expr::Verbatim("Glue.Value.Empty".into())),
        },
        // Destroy notifier travels as a bare function pointer.
        Strategy::Simple {
            base: StrategyBase::new("GDestroyNotify", "Glue.DestroyNotify", Expr::Null),
            ty: Ptr,
            size: Some(SizeExpr::PointerSize),
            align: Some(AlignExpr::PointerSize),
        },
        simple("GThread", "Glue.Thread", Expr::Null, Ptr),
        simple("GPollFD", "Glue.PollFD", Expr::Null, Named("Glue.PollFD".into())),
    ];

    // Not yet wrapped properly; travel as generic pointers.
    for native in [
        "GError",
        "GHashTable",
        "GArray",
        "GByteArray",
        "GData",
        "GIOChannel",
        "GTimeVal",
        "GClosure",
        "GMemChunk",
        "GParamSpec",
        "va_list",
        "GBoxedCopyFunc",
        "GBoxedFreeFunc",
        "GHookFinalizeFunc",
    ] {
        types.push(simple_ptr(native));
    }

    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_conversions_are_identity() {
        let s = simple("gint", "int", Expr::Int(0), MarshalTy::I32);
        let v = Expr::var("x");
        assert_eq!(s.to_native(v.clone()), v);
        assert_eq!(s.from_native(v.clone()), v);
        assert_eq!(s.marshal_ty(), MarshalTy::I32);
    }

    #[test]
    fn handle_unwraps_and_wraps() {
        let s = handle("GObject", "Glue.Object");
        assert_eq!(s.to_native(Expr::var("obj")), Expr::var("obj").unwrap_handle());
        assert_eq!(
            s.from_native(Expr::var("raw")),
            Expr::wrap("Glue.Object", Expr::var("raw"))
        );
        assert_eq!(s.marshal_ty(), MarshalTy::Ptr);
    }

    #[test]
    fn ownable_branches_on_ownership() {
        let s = Strategy::Ownable {
            base: StrategyBase::new("GdkEvent", "Gdk.Event", Expr::Null),
        };
        assert_eq!(
            s.from_native_owned(Expr::var("raw"), true),
            Expr::wrap_owned("Gdk.Event", Expr::var("raw"), true)
        );
        assert_eq!(
            s.from_native_owned(Expr::var("raw"), false),
            Expr::wrap_owned("Gdk.Event", Expr::var("raw"), false)
        );
    }

    #[test]
    fn only_manual_marshalers_expose_the_bracket() {
        let s = const_string("const-gchar", false);
        assert!(s.manual_marshal().is_some());
        let byref = Strategy::ByRef {
            base: StrategyBase::new("GValue", "Glue.Value", Expr::Null),
        };
        assert!(byref.manual_marshal().is_some());
        assert!(handle("GObject", "Glue.Object").manual_marshal().is_none());
        assert!(simple("gint", "int", Expr::Int(0), MarshalTy::I32)
            .manual_marshal()
            .is_none());
    }

    #[test]
    fn template_conversion_substitutes_the_operand() {
        let c = ConvFmt::Template("custom_to_native({0})".into());
        assert_eq!(
            c.apply("X", Expr::var("value")),
            Expr::Verbatim("custom_to_native(value)".into())
        );
    }
}
