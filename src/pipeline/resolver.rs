//! The resolver: binds constant references to symbols.
//!
//! Walks a named tree with a lexical scope stack; superclass
//! references additionally install the resolved parent on the class
//! symbol. Re-parenting raises the parent-redefinition class (the
//! server silences it).

use crate::errors::{codes, BasicError, Diagnostic, ErrorLine, ErrorSection};
use crate::model::symbol::SymbolRef;
use crate::model::ProgramModel;
use crate::syntax::ast::{Expr, IndexedTree};

pub(crate) fn resolve_tree(pm: &mut ProgramModel, tree: &mut IndexedTree) {
    let mut scopes = vec![SymbolRef::ROOT];
    for expr in &mut tree.defs {
        resolve_expr(pm, &mut scopes, expr);
    }
}

/// Innermost-first lookup through the lexical scope stack.
fn resolve_constant(pm: &ProgramModel, scopes: &[SymbolRef], name: &str) -> SymbolRef {
    for &scope in scopes.iter().rev() {
        let found = pm.lookup_member(scope, name);
        if found.exists() {
            let sym = pm.symbol(found);
            if sym.is_class() || sym.is_module() {
                return found;
            }
        }
    }
    SymbolRef::NONE
}

fn resolve_const_ref(pm: &mut ProgramModel, scopes: &[SymbolRef], expr: &mut Expr) -> SymbolRef {
    let Expr::ConstRef { name, loc, resolved } = expr else {
        return SymbolRef::NONE;
    };
    let found = resolve_constant(pm, scopes, name);
    if found.exists() {
        *resolved = found;
    } else {
        pm.errors.push_diagnostic(Diagnostic::Basic(BasicError {
            loc: *loc,
            what: codes::resolver::UNRESOLVED_CONSTANT,
            message: format!("Unable to resolve constant `{name}`"),
        }));
    }
    found
}

fn resolve_expr(pm: &mut ProgramModel, scopes: &mut Vec<SymbolRef>, expr: &mut Expr) {
    match expr {
        Expr::ClassDef {
            superclass,
            body,
            symbol,
            ..
        } => {
            let class = *symbol;
            if let Some(sup) = superclass.as_deref_mut() {
                let sup_loc = sup.loc();
                let parent = resolve_const_ref(pm, scopes, sup);
                if parent.exists() {
                    let current = pm.symbol(class).superclass;
                    if current.exists() && current != parent {
                        let previous = pm.symbol(class).definition_loc;
                        pm.errors.push_diagnostic(Diagnostic::Complex(
                            BasicError {
                                loc: sup_loc,
                                what: codes::resolver::PARENT_REDEFINED,
                                message: format!(
                                    "Parent of `{}` redefined from `{}` to `{}`",
                                    pm.full_name(class),
                                    pm.full_name(current),
                                    pm.full_name(parent)
                                ),
                            },
                            vec![ErrorSection {
                                header: "Definition".to_string(),
                                messages: vec![ErrorLine {
                                    loc: previous,
                                    message: String::new(),
                                }],
                            }],
                        ));
                    } else {
                        pm.symbol_mut(class).superclass = parent;
                    }
                }
            }
            scopes.push(class);
            for child in body {
                resolve_expr(pm, scopes, child);
            }
            scopes.pop();
        }
        Expr::ModuleDef { body, symbol, .. } => {
            scopes.push(*symbol);
            for child in body {
                resolve_expr(pm, scopes, child);
            }
            scopes.pop();
        }
        Expr::MethodDef { body, .. } => {
            for child in body {
                resolve_expr(pm, scopes, child);
            }
        }
        Expr::ConstRef { .. } => {
            resolve_const_ref(pm, scopes, expr);
        }
        Expr::Send { recv, args, .. } => {
            if let Some(recv) = recv {
                resolve_expr(pm, scopes, recv);
            }
            for arg in args {
                resolve_expr(pm, scopes, arg);
            }
        }
        Expr::Assign { target, value, .. } => {
            resolve_expr(pm, scopes, target);
            resolve_expr(pm, scopes, value);
        }
        Expr::Local { .. }
        | Expr::IvarRef { .. }
        | Expr::CvarRef { .. }
        | Expr::SelfRef { .. }
        | Expr::Literal { .. } => {}
    }
}
