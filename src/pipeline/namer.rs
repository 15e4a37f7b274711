//! The namer: enters symbols for a parsed tree.
//!
//! Idempotent per (owner, name) so a file can be re-indexed in place:
//! re-entering an existing symbol updates its definition location. A
//! method re-entered with a different arity raises the
//! method-redefinition class (the server silences it).

use std::collections::HashSet;

use crate::errors::{codes, BasicError, Diagnostic, ErrorLine, ErrorSection};
use crate::model::symbol::{SymbolKind, SymbolRef};
use crate::model::ProgramModel;
use crate::syntax::ast::{Expr, IndexedTree};

pub(crate) fn name_tree(pm: &mut ProgramModel, tree: &mut IndexedTree) {
    for expr in &mut tree.defs {
        name_expr(pm, SymbolRef::ROOT, None, expr);
    }
}

fn name_expr(
    pm: &mut ProgramModel,
    owner: SymbolRef,
    enclosing_class: Option<SymbolRef>,
    expr: &mut Expr,
) {
    match expr {
        Expr::ClassDef {
            name,
            decl_loc,
            superclass,
            body,
            symbol,
            ..
        } => {
            let sym = pm.enter_symbol(owner, name, SymbolKind::Class);
            pm.symbol_mut(sym).definition_loc = *decl_loc;
            pm.symbol_mut(sym).superclass_name = superclass.as_deref().and_then(|s| match s {
                Expr::ConstRef { name, .. } => Some(name.clone()),
                _ => None,
            });
            *symbol = sym;
            for child in body {
                name_expr(pm, sym, Some(sym), child);
            }
        }
        Expr::ModuleDef {
            name,
            decl_loc,
            body,
            symbol,
            ..
        } => {
            let sym = pm.enter_symbol(owner, name, SymbolKind::Module);
            pm.symbol_mut(sym).definition_loc = *decl_loc;
            *symbol = sym;
            for child in body {
                name_expr(pm, sym, Some(sym), child);
            }
        }
        Expr::MethodDef {
            name,
            decl_loc,
            args,
            body,
            symbol,
            ..
        } => {
            // Top-level defs land on Object, like the runtime would.
            let method_owner = enclosing_class.unwrap_or(SymbolRef::OBJECT);
            let existing = pm.lookup_member(method_owner, name);
            let sym = pm.enter_symbol(method_owner, name, SymbolKind::Method);
            if existing.exists() && pm.symbol(sym).arguments.len() != args.len() {
                let previous = pm.symbol(sym).definition_loc;
                pm.errors.push_diagnostic(Diagnostic::Complex(
                    BasicError {
                        loc: *decl_loc,
                        what: codes::namer::METHOD_REDEFINED,
                        message: format!(
                            "Method `{}` redefined with {} arguments",
                            pm.full_name(sym),
                            args.len()
                        ),
                    },
                    vec![ErrorSection {
                        header: "Previous definition".to_string(),
                        messages: vec![ErrorLine {
                            loc: previous,
                            message: String::new(),
                        }],
                    }],
                ));
            }
            pm.symbol_mut(sym).definition_loc = *decl_loc;
            pm.symbol_mut(sym).arguments.clear();
            let mut seen = HashSet::new();
            for arg in args.iter_mut() {
                if !seen.insert(arg.name.clone()) {
                    pm.errors.push_diagnostic(Diagnostic::Basic(BasicError {
                        loc: arg.loc,
                        what: codes::namer::DUPLICATE_VARIABLE,
                        message: format!("Duplicate variable `{}`", arg.name),
                    }));
                }
                let arg_sym = pm.enter_symbol(sym, &arg.name, SymbolKind::MethodArgument);
                pm.symbol_mut(arg_sym).definition_loc = arg.loc;
                arg.symbol = arg_sym;
                pm.symbol_mut(sym).arguments.push(arg_sym);
            }
            *symbol = sym;
            for child in body {
                name_expr(pm, sym, enclosing_class, child);
            }
        }
        Expr::IvarRef { name, loc } => {
            if let Some(class) = enclosing_class {
                let sym = pm.enter_symbol(class, name, SymbolKind::Field);
                if !pm.symbol(sym).definition_loc.exists() {
                    pm.symbol_mut(sym).definition_loc = *loc;
                }
            }
        }
        Expr::CvarRef { name, loc } => {
            if let Some(class) = enclosing_class {
                let sym = pm.enter_symbol(class, name, SymbolKind::StaticField);
                if !pm.symbol(sym).definition_loc.exists() {
                    pm.symbol_mut(sym).definition_loc = *loc;
                }
            }
        }
        Expr::Send { recv, args, .. } => {
            if let Some(recv) = recv {
                name_expr(pm, owner, enclosing_class, recv);
            }
            for arg in args {
                name_expr(pm, owner, enclosing_class, arg);
            }
        }
        Expr::Assign { target, value, .. } => {
            name_expr(pm, owner, enclosing_class, target);
            name_expr(pm, owner, enclosing_class, value);
        }
        Expr::ConstRef { .. }
        | Expr::Local { .. }
        | Expr::SelfRef { .. }
        | Expr::Literal { .. } => {}
    }
}
