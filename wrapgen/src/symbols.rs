//! Symbol table — native type name → marshaling strategy.
//!
//! Built during parsing (built-ins first, then every declaration), frozen
//! before generation begins. Lookups never fail hard: an unknown name
//! resolves to `None` and the member that needed it is excluded, not the
//! run.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::strategy::{builtins, DeclaredKind, Strategy};

#[derive(Debug, Default)]
pub struct SymbolTable {
    types: HashMap<String, Strategy>,
    frozen: bool,
}

impl SymbolTable {
    /// A table seeded with the built-in strategies.
    pub fn with_builtins() -> SymbolTable {
        let mut table = SymbolTable::default();
        for strategy in builtins() {
            table.register(strategy);
        }
        table
    }

    /// Insert or overwrite. Later registration wins, which is what lets an
    /// including document re-define a type from an included one.
    pub fn register(&mut self, strategy: Strategy) {
        debug_assert!(!self.frozen, "registration after freeze");
        trace!(native = strategy.native_name(), "registering type");
        self.types
            .insert(strategy.native_name().to_string(), strategy);
    }

    pub fn register_all(&mut self, strategies: Vec<Strategy>) {
        for strategy in strategies {
            self.register(strategy);
        }
    }

    /// End the load phase: collapse every alias chain so that subsequent
    /// lookups land on the concrete strategy directly, then mark the table
    /// read-only. Chains are followed transitively; a dangling target just
    /// leaves the alias in place (it will resolve to `None` later, and the
    /// member that referenced it gets excluded).
    pub fn freeze(&mut self) {
        let alias_names: Vec<String> = self
            .types
            .iter()
            .filter(|(_, s)| matches!(s, Strategy::Alias { .. }))
            .map(|(name, _)| name.clone())
            .collect();

        for name in alias_names {
            if let Some(concrete) = self.chase_alias(&name) {
                debug!(alias = %name, target = concrete.native_name(), "collapsed alias");
                self.types.insert(name, concrete);
            }
        }
        self.frozen = true;
    }

    fn chase_alias(&self, name: &str) -> Option<Strategy> {
        let mut current = name;
        // Bounded walk; input alias chains are shallow and cycle-free, but
        // a malformed cycle must not hang the run.
        for _ in 0..32 {
            match self.types.get(current) {
                Some(Strategy::Alias { target, .. }) => current = target,
                Some(concrete) => return Some(concrete.clone()),
                None => return None,
            }
        }
        None
    }

    /// Resolve a native type spelling to its strategy, applying the fixed
    /// trim rules first and following alias chains to the concrete entry.
    pub fn resolve(&self, native: &str) -> Option<&Strategy> {
        let trimmed = trim_native(native);
        let mut current = trimmed;
        for _ in 0..32 {
            match self.types.get(current) {
                Some(Strategy::Alias { target, .. }) => current = target,
                Some(concrete) => return Some(concrete),
                None => return None,
            }
        }
        None
    }

    /// Managed qualified name for a native spelling, or `None`.
    pub fn managed_name(&self, native: &str) -> Option<&str> {
        self.resolve(native).map(|s| s.managed_name())
    }

    pub fn is_opaque(&self, native: &str) -> bool {
        self.declared_kind(native) == Some(DeclaredKind::Opaque)
    }

    pub fn is_boxed(&self, native: &str) -> bool {
        self.declared_kind(native) == Some(DeclaredKind::Boxed)
    }

    pub fn is_enum(&self, native: &str) -> bool {
        self.declared_kind(native) == Some(DeclaredKind::Enum)
    }

    pub fn is_interface(&self, native: &str) -> bool {
        self.declared_kind(native) == Some(DeclaredKind::Interface)
    }

    pub fn is_object(&self, native: &str) -> bool {
        self.declared_kind(native) == Some(DeclaredKind::Object)
    }

    pub fn is_callback(&self, native: &str) -> bool {
        self.declared_kind(native) == Some(DeclaredKind::Callback)
    }

    fn declared_kind(&self, native: &str) -> Option<DeclaredKind> {
        self.resolve(native).and_then(|s| s.declared_kind())
    }
}

/// Strip pointer/const decorations per the fixed rules. `void*` in both
/// spellings maps to the generic pointer type — there is no other way to
/// express that in the table.
pub fn trim_native(native: &str) -> &str {
    if native == "void*" || native == "const-void*" {
        return "gpointer";
    }

    let trimmed = native.trim_end_matches('*');

    if is_string_constant(trimmed) {
        return trimmed;
    }

    trimmed.strip_prefix("const-").unwrap_or(trimmed)
}

/// String-constant spellings keep their `const-` prefix: the const and
/// non-const strategies differ in ownership of the returned pointer.
fn is_string_constant(native: &str) -> bool {
    matches!(
        native,
        "const-gchar" | "const-char" | "const-xmlChar" | "const-gfilename"
    )
}

/// Rewrite identifiers that collide with reserved words of the managed
/// language. The replacement set is fixed; anything else passes through.
pub fn mangle_name(name: &str) -> &str {
    match name {
        "string" => "str1ng",
        "event" => "evnt",
        "null" => "is_null",
        "object" => "objekt",
        "params" => "parms",
        "ref" => "reference",
        "in" => "in_param",
        "out" => "out_param",
        "fixed" => "mfixed",
        "byte" => "_byte",
        "new" => "_new",
        "base" => "_base",
        "lock" => "_lock",
        "callback" => "cb",
        "readonly" => "read_only",
        "interface" => "iface",
        "internal" => "_internal",
        "where" => "wh3r3",
        "foreach" => "for_each",
        "remove" => "_remove",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyBase;
    use crate::ir::Expr;

    fn alias(native: &str, target: &str) -> Strategy {
        Strategy::Alias {
            native: native.to_string(),
            target: target.to_string(),
        }
    }

    #[test]
    fn trim_strips_pointers_and_const() {
        assert_eq!(trim_native("GObject*"), "GObject");
        assert_eq!(trim_native("GObject**"), "GObject");
        assert_eq!(trim_native("const-GList*"), "GList");
        assert_eq!(trim_native("gint"), "gint");
    }

    #[test]
    fn trim_preserves_string_constants() {
        assert_eq!(trim_native("const-gchar*"), "const-gchar");
        assert_eq!(trim_native("const-char*"), "const-char");
        assert_eq!(trim_native("const-gfilename"), "const-gfilename");
    }

    #[test]
    fn void_pointer_special_case() {
        assert_eq!(trim_native("void*"), "gpointer");
        assert_eq!(trim_native("const-void*"), "gpointer");
    }

    #[test]
    fn builtin_lookup() {
        let table = SymbolTable::with_builtins();
        assert_eq!(table.managed_name("gint"), Some("int"));
        assert_eq!(table.managed_name("guint8"), Some("byte"));
        assert_eq!(table.managed_name("const-gchar*"), Some("string"));
        assert_eq!(table.managed_name("void*"), Some("Pointer"));
        assert!(table.resolve("NotAType").is_none());
    }

    #[test]
    fn alias_chain_resolves_to_concrete() {
        let mut table = SymbolTable::with_builtins();
        table.register(alias("A", "B"));
        table.register(alias("B", "C"));
        table.register(alias("C", "D"));
        table.register(alias("D", "E"));
        table.register(Strategy::Simple {
            base: StrategyBase::new("E", "int", Expr::Int(0)),
            ty: crate::ir::MarshalTy::I32,
            size: None,
            align: None,
        });

        // Resolvable before the collapse...
        assert_eq!(table.resolve("A").unwrap().native_name(), "E");

        table.freeze();

        // ...and after, where repeated lookups hit the collapsed entry.
        let first = table.resolve("A").unwrap();
        assert_eq!(first.native_name(), "E");
        let second = table.resolve("A").unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(!matches!(table.types.get("A"), Some(Strategy::Alias { .. })));
    }

    #[test]
    fn dangling_alias_resolves_to_none() {
        let mut table = SymbolTable::with_builtins();
        table.register(alias("Lost", "Nowhere"));
        table.freeze();
        assert!(table.resolve("Lost").is_none());
    }

    #[test]
    fn later_registration_wins() {
        let mut table = SymbolTable::default();
        table.register(Strategy::Simple {
            base: StrategyBase::new("T", "int", Expr::Int(0)),
            ty: crate::ir::MarshalTy::I32,
            size: None,
            align: None,
        });
        table.register(Strategy::Simple {
            base: StrategyBase::new("T", "uint", Expr::Int(0)),
            ty: crate::ir::MarshalTy::U32,
            size: None,
            align: None,
        });
        assert_eq!(table.managed_name("T"), Some("uint"));
    }

    #[test]
    fn mangling_rewrites_reserved_words() {
        assert_eq!(mangle_name("object"), "objekt");
        assert_eq!(mangle_name("widget"), "widget");
    }
}
