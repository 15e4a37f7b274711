//! The program model: file table, name table, symbol arena, indexed
//! trees and the freeze machinery.
//!
//! Two models coexist in a running server: an *initial* model holding
//! indexed (parsed + named) trees, and a *final* model that answers
//! queries, produced as a deep copy after resolve + typecheck. The
//! slow path replaces the final model wholesale; the fast path mutates
//! it in place.

pub mod file;
pub mod interner;
pub mod symbol;
pub mod unfreeze;

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::Loc;
use crate::errors::queue::ErrorQueue;
use crate::syntax::ast::IndexedTree;

use self::file::{FileRef, SourceFile, SourceKind};
use self::interner::NameTable;
use self::symbol::{Symbol, SymbolKind, SymbolRef, Type};
use self::unfreeze::{TableSet, UnfreezeGuard};

pub struct ProgramModel {
    files: Vec<Arc<SourceFile>>,
    files_by_path: HashMap<String, FileRef>,
    symbols: Vec<Symbol>,
    names: NameTable,
    trees: Vec<Option<IndexedTree>>,
    /// Shared with the server loop; scratch models own a private queue.
    pub errors: Arc<ErrorQueue>,
    /// Set on scratch models so their output is discarded, never
    /// published.
    pub silence_errors: bool,
    /// When set, the typechecker emits query responses for expressions
    /// covering this location.
    pub lsp_query_loc: Option<Loc>,
    files_frozen: bool,
    symbols_frozen: bool,
    names_frozen: bool,
}

impl ProgramModel {
    /// A bare model: sentinel file at id 0, no-symbol at id 0, all
    /// tables unfrozen. Call [`init_empty`](Self::init_empty) before
    /// use.
    pub fn new(errors: Arc<ErrorQueue>) -> Self {
        let mut names = NameTable::new();
        let none_name = names.intern("<none>");
        Self {
            files: vec![Arc::new(SourceFile::sentinel())],
            files_by_path: HashMap::new(),
            symbols: vec![Symbol::new(none_name, SymbolKind::Module, SymbolRef::NONE)],
            names,
            trees: vec![None],
            errors,
            silence_errors: false,
            lsp_query_loc: None,
            files_frozen: false,
            symbols_frozen: false,
            names_frozen: false,
        }
    }

    /// Seed the root scope and the builtin classes with their operator
    /// methods, then freeze all three tables. Every model is seeded
    /// identically so structural hashes share a baseline.
    pub fn init_empty(&mut self) {
        debug_assert_eq!(self.symbols.len(), 1, "init_empty on a non-empty model");

        let root = self.push_symbol("<root>", SymbolKind::Module, SymbolRef::NONE);
        debug_assert_eq!(root, SymbolRef::ROOT);

        let basic_object = self.enter_symbol(root, "BasicObject", SymbolKind::Class);
        let object = self.enter_symbol(root, "Object", SymbolKind::Class);
        self.symbols[object.id()].superclass = basic_object;
        let integer = self.enter_symbol(root, "Integer", SymbolKind::Class);
        let float = self.enter_symbol(root, "Float", SymbolKind::Class);
        let string = self.enter_symbol(root, "String", SymbolKind::Class);
        let symbol = self.enter_symbol(root, "Symbol", SymbolKind::Class);
        let nil_class = self.enter_symbol(root, "NilClass", SymbolKind::Class);
        let true_class = self.enter_symbol(root, "TrueClass", SymbolKind::Class);
        let false_class = self.enter_symbol(root, "FalseClass", SymbolKind::Class);
        for class in [integer, float, string, symbol, nil_class, true_class, false_class] {
            self.symbols[class.id()].superclass = object;
        }
        debug_assert_eq!(basic_object, SymbolRef::BASIC_OBJECT);
        debug_assert_eq!(object, SymbolRef::OBJECT);
        debug_assert_eq!(integer, SymbolRef::INTEGER);
        debug_assert_eq!(float, SymbolRef::FLOAT);
        debug_assert_eq!(string, SymbolRef::STRING);
        debug_assert_eq!(symbol, SymbolRef::SYMBOL);
        debug_assert_eq!(nil_class, SymbolRef::NIL_CLASS);
        debug_assert_eq!(true_class, SymbolRef::TRUE_CLASS);
        debug_assert_eq!(false_class, SymbolRef::FALSE_CLASS);

        let int_ty = Type::Instance(integer);
        let float_ty = Type::Instance(float);
        let string_ty = Type::Instance(string);
        for op in ["+", "-", "*", "/"] {
            self.enter_builtin_method(integer, op, &[("other", int_ty)], int_ty);
            self.enter_builtin_method(float, op, &[("other", float_ty)], float_ty);
        }
        for op in ["<", ">", "<=", ">="] {
            self.enter_builtin_method(integer, op, &[("other", int_ty)], Type::Boolean);
            self.enter_builtin_method(float, op, &[("other", float_ty)], Type::Boolean);
        }
        self.enter_builtin_method(string, "+", &[("other", string_ty)], string_ty);
        // The runtime accepts any operand for the boolean operators and
        // answers with its truthiness.
        for class in [nil_class, true_class, false_class] {
            for op in ["&", "|", "^"] {
                self.enter_builtin_method(class, op, &[("other", Type::Untyped)], Type::Boolean);
            }
        }
        self.enter_builtin_method(object, "nil?", &[], Type::Boolean);
        self.enter_builtin_method(symbol, "to_s", &[], string_ty);
        self.enter_builtin_method(nil_class, "to_s", &[], string_ty);

        self.set_freeze_state(true, true, true);
    }

    fn enter_builtin_method(
        &mut self,
        owner: SymbolRef,
        name: &str,
        params: &[(&str, Type)],
        ret: Type,
    ) {
        let method = self.enter_symbol(owner, name, SymbolKind::Method);
        self.symbols[method.id()].result_type = ret;
        for (param_name, param_ty) in params {
            let arg = self.enter_symbol(method, param_name, SymbolKind::MethodArgument);
            self.symbols[arg.id()].result_type = *param_ty;
            self.symbols[method.id()].arguments.push(arg);
        }
    }

    // ------------------------------------------------------------
    // File table
    // ------------------------------------------------------------

    pub fn find_file_by_path(&self, path: &str) -> FileRef {
        self.files_by_path
            .get(path)
            .copied()
            .unwrap_or(FileRef::NONE)
    }

    /// Admit a new file. The path must not collide with a live entry;
    /// use [`replace_file`](Self::replace_file) for known paths.
    pub fn enter_file(&mut self, file: Arc<SourceFile>) -> FileRef {
        self.assert_unfrozen(!self.files_frozen, "file");
        debug_assert!(
            !self.find_file_by_path(file.path()).exists(),
            "enter_file: path {} already live",
            file.path()
        );
        let fref = FileRef(self.files.len() as u32);
        self.files_by_path.insert(file.path().to_string(), fref);
        self.files.push(file);
        self.trees.push(None);
        fref
    }

    /// Install a new content snapshot under an existing id. The id set
    /// is unchanged, so this is permitted on a frozen file table.
    pub fn replace_file(&mut self, fref: FileRef, file: Arc<SourceFile>) {
        debug_assert!(fref.exists() && fref.id() < self.files.len());
        debug_assert_eq!(
            self.files[fref.id()].path(),
            file.path(),
            "replace_file changes the path"
        );
        self.files[fref.id()] = file;
    }

    /// Mark an id inert. The id stays reserved forever; the path can
    /// be admitted again under a fresh id.
    pub fn tombstone_file(&mut self, fref: FileRef) {
        debug_assert!(fref.exists() && fref.id() < self.files.len());
        let path = self.files[fref.id()].path().to_string();
        self.files_by_path.remove(&path);
        self.files[fref.id()] = Arc::new(SourceFile::new(path, "", SourceKind::TombStone));
        self.trees[fref.id()] = None;
    }

    pub fn file(&self, fref: FileRef) -> &Arc<SourceFile> {
        &self.files[fref.id()]
    }

    /// Total file-table size, sentinel included.
    pub fn files_used(&self) -> usize {
        self.files.len()
    }

    /// The full file table as fingerprint input: the sentinel and
    /// tombstones contribute empty entries.
    pub fn all_files(&self) -> Vec<Option<Arc<SourceFile>>> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, f)| {
                if i == 0 || f.kind() == SourceKind::TombStone {
                    None
                } else {
                    Some(Arc::clone(f))
                }
            })
            .collect()
    }

    // ------------------------------------------------------------
    // Symbol table
    // ------------------------------------------------------------

    fn push_symbol(&mut self, name: &str, kind: SymbolKind, owner: SymbolRef) -> SymbolRef {
        self.assert_unfrozen(!self.symbols_frozen, "symbol");
        self.assert_unfrozen(!self.names_frozen, "name");
        let name = self.names.intern(name);
        let sym = SymbolRef(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(name, kind, owner));
        sym
    }

    /// Look up `name` among `owner`'s members, entering a fresh symbol
    /// if absent. Idempotent: re-entering an existing (owner, name)
    /// returns the existing ref regardless of kind; the namer decides
    /// what a kind or arity mismatch means.
    pub fn enter_symbol(&mut self, owner: SymbolRef, name: &str, kind: SymbolKind) -> SymbolRef {
        if let Some(&existing) = self.symbols[owner.id()].members.get(name) {
            return existing;
        }
        let sym = self.push_symbol(name, kind, owner);
        self.symbols[owner.id()].members.insert(name.to_string(), sym);
        sym
    }

    pub fn symbol(&self, sym: SymbolRef) -> &Symbol {
        &self.symbols[sym.id()]
    }

    pub fn symbol_mut(&mut self, sym: SymbolRef) -> &mut Symbol {
        self.assert_unfrozen(!self.symbols_frozen, "symbol");
        &mut self.symbols[sym.id()]
    }

    pub fn symbols_used(&self) -> usize {
        self.symbols.len()
    }

    /// Direct member lookup, no ancestor walk.
    pub fn lookup_member(&self, owner: SymbolRef, name: &str) -> SymbolRef {
        self.symbols[owner.id()]
            .members
            .get(name)
            .copied()
            .unwrap_or(SymbolRef::NONE)
    }

    /// Method lookup walking the superclass chain.
    pub fn resolve_method(&self, class: SymbolRef, name: &str) -> SymbolRef {
        let mut current = class;
        while current.exists() {
            let found = self.lookup_member(current, name);
            if found.exists() && self.symbols[found.id()].is_method() {
                return found;
            }
            current = self.symbols[current.id()].superclass;
        }
        SymbolRef::NONE
    }

    /// Owner-chain-qualified name, root elided: `A::B::foo`.
    pub fn full_name(&self, sym: SymbolRef) -> String {
        if !sym.exists() {
            return String::new();
        }
        let mut parts = Vec::new();
        let mut current = sym;
        while current.exists() && current != SymbolRef::ROOT {
            parts.push(self.symbols[current.id()].name.to_string());
            current = self.symbols[current.id()].owner;
        }
        parts.reverse();
        parts.join("::")
    }

    // ------------------------------------------------------------
    // Indexed trees
    // ------------------------------------------------------------

    pub fn tree(&self, fref: FileRef) -> Option<&IndexedTree> {
        self.trees.get(fref.id()).and_then(|t| t.as_ref())
    }

    pub fn set_tree(&mut self, fref: FileRef, tree: IndexedTree) {
        debug_assert!(fref.id() < self.trees.len());
        self.trees[fref.id()] = Some(tree);
    }

    /// Temporarily remove a tree so a pass can mutate it alongside the
    /// model; pair with [`set_tree`](Self::set_tree).
    pub fn take_tree(&mut self, fref: FileRef) -> Option<IndexedTree> {
        self.trees.get_mut(fref.id()).and_then(|t| t.take())
    }

    /// Ids of every file that currently has an indexed tree.
    pub fn tree_refs(&self) -> Vec<FileRef> {
        self.trees
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_some())
            .map(|(i, _)| FileRef(i as u32))
            .collect()
    }

    // ------------------------------------------------------------
    // Snapshots and fingerprints
    // ------------------------------------------------------------

    /// Independent clone. With `freeze` set, the clone's tables reject
    /// mutation until a scoped unfreeze. The error queue is shared:
    /// both snapshots feed the same consumer.
    pub fn deep_copy(&self, freeze: bool) -> ProgramModel {
        ProgramModel {
            files: self.files.clone(),
            files_by_path: self.files_by_path.clone(),
            symbols: self.symbols.clone(),
            names: self.names.clone(),
            trees: self.trees.clone(),
            errors: Arc::clone(&self.errors),
            silence_errors: self.silence_errors,
            lsp_query_loc: self.lsp_query_loc,
            files_frozen: freeze,
            symbols_frozen: freeze,
            names_frozen: freeze,
        }
    }

    /// Fingerprint of the symbol table's shape: names, kinds, owners,
    /// superclasses and arities. Method bodies, result types and
    /// locations stay out. Equal post-resolve shapes hash equal; 0 is
    /// reserved for "unknown", so the result is never 0.
    pub fn structural_hash(&self) -> u32 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        for sym in &self.symbols {
            sym.name.as_ref().hash(&mut hasher);
            sym.kind.hash(&mut hasher);
            sym.owner.0.hash(&mut hasher);
            sym.superclass.0.hash(&mut hasher);
            sym.superclass_name.hash(&mut hasher);
            (sym.arguments.len() as u32).hash(&mut hasher);
        }
        let h = hasher.finish() as u32;
        if h == 0 {
            1
        } else {
            h
        }
    }

    // ------------------------------------------------------------
    // Freezing
    // ------------------------------------------------------------

    pub fn unfreeze(&mut self, tables: TableSet) -> UnfreezeGuard<'_> {
        UnfreezeGuard::new(self, tables)
    }

    pub(crate) fn freeze_state(&self) -> (bool, bool, bool) {
        (self.files_frozen, self.symbols_frozen, self.names_frozen)
    }

    pub(crate) fn set_freeze_state(&mut self, files: bool, symbols: bool, names: bool) {
        self.files_frozen = files;
        self.symbols_frozen = symbols;
        self.names_frozen = names;
    }

    #[track_caller]
    fn assert_unfrozen(&self, ok: bool, table: &str) {
        debug_assert!(ok, "mutating a frozen {table} table");
        if !ok {
            tracing::error!("mutating a frozen {table} table");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> ProgramModel {
        let mut pm = ProgramModel::new(Arc::new(ErrorQueue::new()));
        pm.init_empty();
        pm
    }

    fn normal_file(path: &str, content: &str) -> Arc<SourceFile> {
        Arc::new(SourceFile::new(path, content, SourceKind::Normal))
    }

    #[test]
    fn test_enter_and_find_file() {
        let mut pm = model();
        let fref = {
            let mut pm = pm.unfreeze(TableSet::FILES);
            pm.enter_file(normal_file("a.rb", "class A; end"))
        };
        assert!(fref.exists());
        assert_eq!(pm.find_file_by_path("a.rb"), fref);
        assert_eq!(pm.find_file_by_path("b.rb"), FileRef::NONE);
        assert_eq!(pm.files_used(), 2);
    }

    #[test]
    fn test_replace_keeps_id() {
        let mut pm = model();
        let fref = {
            let mut pm = pm.unfreeze(TableSet::FILES);
            pm.enter_file(normal_file("a.rb", "class A; end"))
        };
        pm.replace_file(fref, normal_file("a.rb", "class A; def foo; end; end"));
        assert_eq!(pm.find_file_by_path("a.rb"), fref);
        assert_eq!(pm.files_used(), 2);
        assert!(pm.file(fref).content().contains("foo"));
    }

    #[test]
    fn test_tombstone_is_inert() {
        let mut pm = model();
        let fref = {
            let mut pm = pm.unfreeze(TableSet::FILES);
            pm.enter_file(normal_file("a.rb", ""))
        };
        pm.tombstone_file(fref);
        assert_eq!(pm.file(fref).kind(), SourceKind::TombStone);
        assert_eq!(pm.find_file_by_path("a.rb"), FileRef::NONE);
        // The id stays reserved.
        assert_eq!(pm.files_used(), 2);
    }

    #[test]
    fn test_enter_symbol_idempotent() {
        let mut pm = model();
        let (a, again) = {
            let mut pm = pm.unfreeze(TableSet::SYMBOLS.union(TableSet::NAMES));
            let a = pm.enter_symbol(SymbolRef::ROOT, "A", SymbolKind::Class);
            let again = pm.enter_symbol(SymbolRef::ROOT, "A", SymbolKind::Class);
            (a, again)
        };
        assert_eq!(a, again);
        assert_eq!(pm.full_name(a), "A");
    }

    #[test]
    fn test_resolve_method_walks_ancestors() {
        let pm = model();
        let plus = pm.resolve_method(SymbolRef::INTEGER, "+");
        assert!(plus.exists());
        // Object's `nil?` resolves from every seeded class through the
        // superclass chain.
        assert!(pm.resolve_method(SymbolRef::INTEGER, "nil?").exists());
        assert!(pm.resolve_method(SymbolRef::NIL_CLASS, "nil?").exists());
        assert_eq!(pm.resolve_method(SymbolRef::INTEGER, "nope"), SymbolRef::NONE);
    }

    #[test]
    fn test_builtin_classes_are_seeded() {
        let pm = model();
        for (name, sym) in [
            ("BasicObject", SymbolRef::BASIC_OBJECT),
            ("Object", SymbolRef::OBJECT),
            ("Integer", SymbolRef::INTEGER),
            ("Float", SymbolRef::FLOAT),
            ("String", SymbolRef::STRING),
            ("Symbol", SymbolRef::SYMBOL),
            ("NilClass", SymbolRef::NIL_CLASS),
            ("TrueClass", SymbolRef::TRUE_CLASS),
            ("FalseClass", SymbolRef::FALSE_CLASS),
        ] {
            assert_eq!(pm.lookup_member(SymbolRef::ROOT, name), sym);
            assert!(pm.symbol(sym).is_class());
        }
        for class in [
            SymbolRef::NIL_CLASS,
            SymbolRef::TRUE_CLASS,
            SymbolRef::FALSE_CLASS,
        ] {
            for op in ["&", "|", "^"] {
                assert!(pm.resolve_method(class, op).exists(), "{op} missing");
            }
        }
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let mut pm = model();
        let copy = pm.deep_copy(true);
        assert_eq!(copy.freeze_state(), (true, true, true));
        {
            let mut pm = pm.unfreeze(TableSet::ALL);
            pm.enter_file(normal_file("a.rb", ""));
            pm.enter_symbol(SymbolRef::ROOT, "A", SymbolKind::Class);
        }
        assert_eq!(pm.files_used(), 2);
        assert_eq!(copy.files_used(), 1);
        assert!(pm.symbols_used() > copy.symbols_used());
    }

    #[test]
    fn test_structural_hash_ignores_locations() {
        let mut a = model();
        let mut b = model();
        {
            let mut a = a.unfreeze(TableSet::SYMBOLS.union(TableSet::NAMES));
            let sym = a.enter_symbol(SymbolRef::ROOT, "A", SymbolKind::Class);
            a.symbol_mut(sym).definition_loc = Loc::new(FileRef(1), 0, 12);
        }
        {
            let mut b = b.unfreeze(TableSet::SYMBOLS.union(TableSet::NAMES));
            let sym = b.enter_symbol(SymbolRef::ROOT, "A", SymbolKind::Class);
            b.symbol_mut(sym).definition_loc = Loc::new(FileRef(1), 4, 20);
        }
        assert_eq!(a.structural_hash(), b.structural_hash());
    }

    #[test]
    fn test_structural_hash_sees_new_symbols() {
        let mut a = model();
        let baseline = a.structural_hash();
        {
            let mut a = a.unfreeze(TableSet::SYMBOLS.union(TableSet::NAMES));
            pm_enter_class(&mut a);
        }
        assert_ne!(a.structural_hash(), baseline);
    }

    fn pm_enter_class(pm: &mut ProgramModel) {
        pm.enter_symbol(SymbolRef::ROOT, "A", SymbolKind::Class);
    }

    #[test]
    fn test_hash_never_zero() {
        let pm = model();
        assert_ne!(pm.structural_hash(), 0);
    }
}
