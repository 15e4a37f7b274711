//! The typechecker.
//!
//! Two sweeps per update: a silent one that records method result
//! types (last-expression inference, `nil` for empty bodies), and a
//! checking one that emits diagnostics plus, when the model carries a
//! query location, query responses for the expressions covering it,
//! innermost first.

use std::collections::HashMap;

use crate::core::Loc;
use crate::errors::{
    codes, BasicError, Diagnostic, DispatchComponent, QueryResponse, TypeAndOrigins,
};
use crate::model::symbol::{SymbolRef, Type};
use crate::model::ProgramModel;
use crate::syntax::ast::{Expr, IndexedTree, LiteralValue};

/// Sweep one: record method result types. Needs an unfrozen symbol
/// table; emits nothing.
pub(crate) fn infer_result_types(pm: &mut ProgramModel, tree: &IndexedTree) {
    let mut infer = Infer {
        pm,
        fref: tree.fref,
        emit: false,
        write_result_types: true,
    };
    infer.run(&tree.defs, SymbolRef::OBJECT);
}

/// Sweep two: diagnostics and query responses.
pub(crate) fn check_tree(pm: &mut ProgramModel, tree: &IndexedTree) {
    let mut infer = Infer {
        pm,
        fref: tree.fref,
        emit: true,
        write_result_types: false,
    };
    infer.run(&tree.defs, SymbolRef::OBJECT);
}

/// Local variable environment: name → (type, binding location).
type Env = HashMap<String, (Type, Loc)>;

struct Infer<'pm> {
    pm: &'pm mut ProgramModel,
    fref: crate::model::file::FileRef,
    emit: bool,
    write_result_types: bool,
}

impl Infer<'_> {
    fn run(&mut self, defs: &[Expr], self_class: SymbolRef) {
        let mut env = Env::new();
        for expr in defs {
            self.infer_stmt(expr, &mut env, self_class);
        }
    }

    fn infer_stmt(&mut self, expr: &Expr, env: &mut Env, self_class: SymbolRef) -> Type {
        match expr {
            Expr::ClassDef { body, symbol, .. } | Expr::ModuleDef { body, symbol, .. } => {
                let mut body_env = Env::new();
                for child in body {
                    self.infer_stmt(child, &mut body_env, *symbol);
                }
                Type::Untyped
            }
            Expr::MethodDef {
                args,
                body,
                symbol,
                ..
            } => {
                let mut method_env = Env::new();
                for arg in args {
                    let ty = if arg.symbol.exists() {
                        self.pm.symbol(arg.symbol).result_type
                    } else {
                        Type::Untyped
                    };
                    method_env.insert(arg.name.clone(), (ty, arg.loc));
                }
                let mut result = Type::Nil;
                for child in body {
                    result = self.infer_stmt(child, &mut method_env, self_class);
                }
                if self.write_result_types && symbol.exists() {
                    self.pm.symbol_mut(*symbol).result_type = result;
                }
                Type::Untyped
            }
            other => self.infer_expr(other, env, self_class),
        }
    }

    fn infer_expr(&mut self, expr: &Expr, env: &mut Env, self_class: SymbolRef) -> Type {
        match expr {
            Expr::Literal { value, loc } => {
                let ty = match value {
                    LiteralValue::Int(_) => Type::Instance(SymbolRef::INTEGER),
                    LiteralValue::Float(_) => Type::Instance(SymbolRef::FLOAT),
                    LiteralValue::Str(_) => Type::Instance(SymbolRef::STRING),
                    LiteralValue::True => Type::Instance(SymbolRef::TRUE_CLASS),
                    LiteralValue::False => Type::Instance(SymbolRef::FALSE_CLASS),
                    LiteralValue::Nil => Type::Nil,
                };
                self.maybe_emit(*loc, || QueryResponse::Literal {
                    ret: TypeAndOrigins {
                        ty,
                        origins: vec![*loc],
                    },
                });
                ty
            }
            Expr::SelfRef { loc } => {
                let ty = Type::Instance(self_class);
                self.maybe_emit(*loc, || QueryResponse::Ident {
                    ret: TypeAndOrigins {
                        ty,
                        origins: Vec::new(),
                    },
                });
                ty
            }
            Expr::ConstRef { loc, resolved, .. } => {
                if resolved.exists() {
                    let ty = Type::ClassOf(*resolved);
                    let def_loc = self.pm.symbol(*resolved).definition_loc;
                    let target = *resolved;
                    self.maybe_emit(*loc, || QueryResponse::Constant {
                        components: vec![DispatchComponent {
                            receiver: Type::Untyped,
                            method: target,
                        }],
                        ret: TypeAndOrigins {
                            ty,
                            origins: vec![def_loc],
                        },
                    });
                    ty
                } else {
                    // The resolver already reported it.
                    Type::Untyped
                }
            }
            Expr::IvarRef { name, loc } | Expr::CvarRef { name, loc } => {
                let field = self.pm.lookup_member(self_class, name);
                let origins = if field.exists() {
                    vec![self.pm.symbol(field).definition_loc]
                } else {
                    Vec::new()
                };
                self.maybe_emit(*loc, || QueryResponse::Ident {
                    ret: TypeAndOrigins {
                        ty: Type::Untyped,
                        origins,
                    },
                });
                Type::Untyped
            }
            Expr::Local { name, loc } => {
                if let Some(&(ty, def_loc)) = env.get(name) {
                    self.maybe_emit(*loc, || QueryResponse::Ident {
                        ret: TypeAndOrigins {
                            ty,
                            origins: vec![def_loc],
                        },
                    });
                    ty
                } else {
                    // A bare identifier with no binding is a send to self.
                    let self_ty = Type::Instance(self_class);
                    self.dispatch_send(self_ty, name, *loc, *loc, &[], &[])
                }
            }
            Expr::Assign { target, value, .. } => {
                let ty = self.infer_expr(value, env, self_class);
                match target.as_ref() {
                    Expr::Local { name, loc } => {
                        env.insert(name.clone(), (ty, *loc));
                        self.maybe_emit(*loc, || QueryResponse::Ident {
                            ret: TypeAndOrigins {
                                ty,
                                origins: vec![*loc],
                            },
                        });
                    }
                    Expr::IvarRef { .. } | Expr::CvarRef { .. } => {
                        self.infer_expr(target, env, self_class);
                    }
                    _ => {}
                }
                ty
            }
            Expr::Send {
                recv,
                method,
                method_loc,
                args,
                loc,
            } => {
                let recv_ty = match recv {
                    Some(recv) => self.infer_expr(recv, env, self_class),
                    None => Type::Instance(self_class),
                };
                let mut arg_tys = Vec::with_capacity(args.len());
                for arg in args {
                    arg_tys.push(self.infer_expr(arg, env, self_class));
                }
                self.dispatch_send(recv_ty, method, *loc, *method_loc, &arg_tys, args)
            }
            Expr::ClassDef { .. } | Expr::ModuleDef { .. } | Expr::MethodDef { .. } => {
                // Definitions nested in expression position.
                let mut nested_env = Env::new();
                self.infer_stmt(expr, &mut nested_env, self_class)
            }
        }
    }

    /// Dispatch a send: find the method, check the call, emit the
    /// query response. Returns the result type.
    fn dispatch_send(
        &mut self,
        recv_ty: Type,
        method: &str,
        loc: Loc,
        method_loc: Loc,
        arg_tys: &[Type],
        args: &[Expr],
    ) -> Type {
        // Equality is universal and never checked further.
        if method == "==" || method == "!=" {
            self.emit_send(loc, Vec::new(), Type::Boolean);
            return Type::Boolean;
        }

        let (ret, components) = match recv_ty {
            Type::Untyped => (Type::Untyped, Vec::new()),
            Type::ClassOf(class) if method == "new" => {
                let init = self.pm.resolve_method(class, "initialize");
                let components = if init.exists() {
                    vec![DispatchComponent {
                        receiver: recv_ty,
                        method: init,
                    }]
                } else {
                    Vec::new()
                };
                (Type::Instance(class), components)
            }
            Type::Instance(_) | Type::Nil | Type::Boolean => {
                // Nil and the boolean union dispatch like instances of
                // their seeded classes; TrueClass and FalseClass carry
                // the same operator set.
                let class = match recv_ty {
                    Type::Instance(class) => class,
                    Type::Nil => SymbolRef::NIL_CLASS,
                    _ => SymbolRef::TRUE_CLASS,
                };
                let found = self.pm.resolve_method(class, method);
                if !found.exists() {
                    self.report(Diagnostic::Basic(BasicError {
                        loc: method_loc,
                        what: codes::infer::UNKNOWN_METHOD,
                        message: format!(
                            "Method `{}` does not exist on `{}`",
                            method,
                            recv_ty.show(self.pm)
                        ),
                    }));
                    (Type::Untyped, Vec::new())
                } else {
                    self.check_call(found, loc, arg_tys, args);
                    (
                        self.pm.symbol(found).result_type,
                        vec![DispatchComponent {
                            receiver: recv_ty,
                            method: found,
                        }],
                    )
                }
            }
            Type::ClassOf(_) => {
                self.report(Diagnostic::Basic(BasicError {
                    loc: method_loc,
                    what: codes::infer::UNKNOWN_METHOD,
                    message: format!(
                        "Method `{}` does not exist on `{}`",
                        method,
                        recv_ty.show(self.pm)
                    ),
                }));
                (Type::Untyped, Vec::new())
            }
        };
        self.emit_send(loc, components, ret);
        ret
    }

    fn check_call(&mut self, method: SymbolRef, loc: Loc, arg_tys: &[Type], args: &[Expr]) {
        let params = self.pm.symbol(method).arguments.clone();
        if params.len() != arg_tys.len() {
            let name = self.pm.full_name(method);
            self.report(Diagnostic::Basic(BasicError {
                loc,
                what: codes::infer::WRONG_ARG_COUNT,
                message: format!(
                    "Wrong number of arguments for `{}`: expected {}, got {}",
                    name,
                    params.len(),
                    arg_tys.len()
                ),
            }));
            return;
        }
        for (i, (&param, &arg_ty)) in params.iter().zip(arg_tys.iter()).enumerate() {
            let param_ty = self.pm.symbol(param).result_type;
            if !self.type_matches(arg_ty, param_ty) {
                let arg_loc = args.get(i).map(|a| a.loc()).unwrap_or(loc);
                self.report(Diagnostic::Basic(BasicError {
                    // The whole send, so the range covers both operands
                    // of a desugared operator.
                    loc: loc.join(arg_loc),
                    what: codes::infer::ARGUMENT_MISMATCH,
                    message: format!(
                        "`{}` does not match expected type `{}` for argument `{}` of `{}`",
                        arg_ty.show(self.pm),
                        param_ty.show(self.pm),
                        self.pm.symbol(param).name,
                        self.pm.full_name(method)
                    ),
                }));
            }
        }
    }

    fn type_matches(&self, arg: Type, param: Type) -> bool {
        match (arg, param) {
            (Type::Untyped, _) | (_, Type::Untyped) => true,
            (Type::Instance(a), Type::Instance(b)) => self.is_subclass(a, b),
            (a, b) => a == b,
        }
    }

    fn is_subclass(&self, sub: SymbolRef, sup: SymbolRef) -> bool {
        let mut current = sub;
        while current.exists() {
            if current == sup {
                return true;
            }
            current = self.pm.symbol(current).superclass;
        }
        false
    }

    fn emit_send(&mut self, loc: Loc, components: Vec<DispatchComponent>, ret: Type) {
        self.maybe_emit(loc, || QueryResponse::Send {
            components,
            ret: TypeAndOrigins {
                ty: ret,
                origins: vec![loc],
            },
        });
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        if self.emit {
            self.pm.errors.push_diagnostic(diagnostic);
        }
    }

    fn maybe_emit(&mut self, loc: Loc, response: impl FnOnce() -> QueryResponse) {
        if !self.emit {
            return;
        }
        let Some(query) = self.pm.lsp_query_loc else {
            return;
        };
        if query.file == self.fref && loc.contains_offset(query.begin) {
            self.pm.errors.push_query_response(response());
        }
    }
}
