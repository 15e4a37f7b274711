//! Symbols and types.
//!
//! Symbols live in a dense arena owned by the program model; a
//! [`SymbolRef`] is an index into it. Ids are monotonic and never
//! reused. Index 0 is the "no symbol" sentinel, index 1 is the root
//! scope, and the builtin classes occupy fixed slots after it so that
//! every model agrees on them.

use std::collections::HashMap;

use crate::core::Loc;
use crate::model::interner::NameRef;
use crate::model::ProgramModel;

/// Index into the symbol arena. Id 0 means "no symbol".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SymbolRef(pub u32);

impl SymbolRef {
    pub const NONE: SymbolRef = SymbolRef(0);
    pub const ROOT: SymbolRef = SymbolRef(1);
    pub const BASIC_OBJECT: SymbolRef = SymbolRef(2);
    pub const OBJECT: SymbolRef = SymbolRef(3);
    pub const INTEGER: SymbolRef = SymbolRef(4);
    pub const FLOAT: SymbolRef = SymbolRef(5);
    pub const STRING: SymbolRef = SymbolRef(6);
    pub const SYMBOL: SymbolRef = SymbolRef(7);
    pub const NIL_CLASS: SymbolRef = SymbolRef(8);
    pub const TRUE_CLASS: SymbolRef = SymbolRef(9);
    pub const FALSE_CLASS: SymbolRef = SymbolRef(10);

    pub fn id(self) -> usize {
        self.0 as usize
    }

    pub fn exists(self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Class,
    Module,
    Method,
    Field,
    StaticField,
    MethodArgument,
    TypeMember,
    TypeArgument,
}

/// A named entity in the program: class, module, method, field,
/// static field or method argument.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: NameRef,
    pub kind: SymbolKind,
    pub owner: SymbolRef,
    pub definition_loc: Loc,
    pub result_type: Type,
    /// Resolved superclass; classes only, `NONE` elsewhere.
    pub superclass: SymbolRef,
    /// Textual superclass name as written, before resolution. Part of
    /// the structural fingerprint so re-parenting is visible even when
    /// the parent only resolves in the full model.
    pub superclass_name: Option<String>,
    /// Argument symbols in declaration order; methods only.
    pub arguments: Vec<SymbolRef>,
    /// Named members keyed by simple name: constants and methods under
    /// classes and modules, argument symbols under methods.
    pub members: HashMap<String, SymbolRef>,
}

impl Symbol {
    pub fn new(name: NameRef, kind: SymbolKind, owner: SymbolRef) -> Self {
        Self {
            name,
            kind,
            owner,
            definition_loc: Loc::NONE,
            result_type: Type::Untyped,
            superclass: SymbolRef::NONE,
            superclass_name: None,
            arguments: Vec::new(),
            members: HashMap::new(),
        }
    }

    pub fn is_method(&self) -> bool {
        self.kind == SymbolKind::Method
    }

    pub fn is_class(&self) -> bool {
        self.kind == SymbolKind::Class
    }

    pub fn is_module(&self) -> bool {
        self.kind == SymbolKind::Module
    }
}

/// The types the checker works with.
///
/// `Untyped` is the gradual top/bottom: it flows through every
/// operation without complaint. `Nil` is shorthand for an instance of
/// the seeded NilClass; `Boolean` is the union of the two boolean
/// classes and is what comparisons return. `ClassOf` is the type of a
/// constant reference (the class object itself, what `new` dispatches
/// on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Type {
    #[default]
    Untyped,
    Nil,
    Boolean,
    Instance(SymbolRef),
    ClassOf(SymbolRef),
}

impl Type {
    pub fn is_untyped(&self) -> bool {
        matches!(self, Type::Untyped)
    }

    /// Render for hovers and argument-mismatch messages. Everything
    /// except `untyped` resolves through the symbol table.
    pub fn show(&self, pm: &ProgramModel) -> String {
        match self {
            Type::Untyped => "untyped".to_string(),
            Type::Nil => pm.full_name(SymbolRef::NIL_CLASS),
            Type::Boolean => format!(
                "{} | {}",
                pm.full_name(SymbolRef::TRUE_CLASS),
                pm.full_name(SymbolRef::FALSE_CLASS)
            ),
            Type::Instance(sym) => pm.full_name(*sym),
            // Rendered with angle brackets so clients show it verbatim
            // inside a markdown code fence.
            Type::ClassOf(sym) => format!("<Class:{}>", pm.full_name(*sym)),
        }
    }
}
