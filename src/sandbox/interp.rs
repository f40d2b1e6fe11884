//! Tree-walking evaluator for statements and expressions.

use std::collections::HashMap;
use std::rc::Rc;

use swc_ecma_ast::*;

use super::env::{Scope, Slot};
use super::error::EvalError;
use super::module::ModuleRuntime;
use super::ops;
use super::value::{Closure, Function as FunctionValue, Object, ObjectClass, Value};
use crate::core::build::Bundle;
use crate::core::parsers::binding_idents;

pub type EvalResult<T = Value> = Result<T, EvalError>;

/// How a statement finished.
pub enum Completion {
    Normal,
    Return(Value),
    Break(Option<String>),
    Continue(Option<String>),
}

/// How a pattern introduces its names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindMode {
    Let,
    Const,
    Var,
    Param,
    /// Plain assignment to existing bindings or members.
    Assign,
}

impl BindMode {
    fn of(kind: VarDeclKind) -> Self {
        match kind {
            VarDeclKind::Var => BindMode::Var,
            VarDeclKind::Let => BindMode::Let,
            VarDeclKind::Const => BindMode::Const,
        }
    }
}

#[derive(Clone, Copy)]
pub enum Code<'b> {
    Function(&'b Function),
    Arrow(&'b ArrowExpr),
}

pub struct Interpreter<'b> {
    pub(super) bundle: &'b Bundle,
    pub(super) globals: Rc<Scope>,
    pub(super) modules: Vec<ModuleRuntime<'b>>,
    code: Vec<Code<'b>>,
    code_ids: HashMap<(bool, usize), usize>,
    steps: u64,
    max_steps: Option<u64>,
    depth: usize,
    max_depth: usize,
}

impl<'b> Interpreter<'b> {
    pub fn new(bundle: &'b Bundle, globals: Rc<Scope>, max_steps: Option<u64>, max_depth: usize) -> Self {
        Self {
            bundle,
            globals,
            modules: Vec::new(),
            code: Vec::new(),
            code_ids: HashMap::new(),
            steps: 0,
            max_steps,
            depth: 0,
            max_depth,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(super) fn step(&mut self) -> EvalResult<()> {
        self.charge(1)
    }

    /// Spend `units` steps at once, for native work proportional to its input.
    pub(super) fn charge(&mut self, units: u64) -> EvalResult<()> {
        self.steps = self.steps.saturating_add(units);
        match self.max_steps {
            Some(limit) if self.steps > limit => Err(EvalError::StepLimit(limit)),
            _ => Ok(()),
        }
    }

    /// Append the items of an iterable.
    fn spread_into(&mut self, out: &mut Vec<Value>, value: &Value) -> EvalResult<()> {
        let items = ops::iterate(value)?;
        ops::check_array_length(out.len() + items.len())?;
        self.charge(items.len() as u64)?;
        out.extend(items);
        Ok(())
    }

    /// `object[key] = value`, charging for any growth.
    fn set_member(&mut self, object: &Value, key: &str, value: Value) -> EvalResult<()> {
        let before = ops::size_of(object);
        ops::set_property(object, key, value)?;
        self.charge(ops::size_of(object).saturating_sub(before))
    }

    pub(super) fn enter(&mut self) -> EvalResult<()> {
        if self.depth >= self.max_depth {
            return Err(EvalError::Range("maximum call stack size exceeded".to_string()));
        }
        self.depth += 1;
        Ok(())
    }

    pub(super) fn leave(&mut self) {
        self.depth -= 1;
    }

    // ============================================================
    // Functions
    // ============================================================

    fn code_id(&mut self, code: Code<'b>) -> usize {
        let key = match code {
            Code::Function(f) => (false, f as *const Function as usize),
            Code::Arrow(a) => (true, a as *const ArrowExpr as usize),
        };
        if let Some(&id) = self.code_ids.get(&key) {
            return id;
        }
        let id = self.code.len();
        self.code.push(code);
        self.code_ids.insert(key, id);
        id
    }

    pub(super) fn closure(&mut self, code: Code<'b>, env: &Rc<Scope>, name: &str) -> Value {
        let code = self.code_id(code);
        Value::function(FunctionValue::Closure(Closure {
            code,
            env: env.clone(),
            name: Rc::from(name),
        }))
    }

    pub fn call_function(&mut self, function: &Rc<FunctionValue>, this: Value, args: Vec<Value>) -> EvalResult {
        self.step()?;
        match &**function {
            FunctionValue::Native(native) => {
                let result = (native.call)(&args)?;
                self.charge(ops::size_of(&result))?;
                Ok(result)
            }
            FunctionValue::Bound { target, this } => self.call_function(target, this.clone(), args),
            FunctionValue::Closure(closure) => {
                self.enter()?;
                let result = self.call_closure(closure, this, args);
                self.leave();
                result
            }
        }
    }

    fn call_closure(&mut self, closure: &Closure, this: Value, args: Vec<Value>) -> EvalResult {
        let scope = Scope::child(&closure.env);
        let code = self.code[closure.code];
        match code {
            Code::Function(function) => {
                if function.is_async || function.is_generator {
                    return Err(EvalError::unsupported("async and generator functions"));
                }
                scope.declare("this", Slot::Value(this), false);
                let patterns: Vec<&'b Pat> = function.params.iter().map(|param| &param.pat).collect();
                self.bind_params(&patterns, args, &scope)?;
                let Some(body) = &function.body else {
                    return Ok(Value::Undefined);
                };
                self.hoist_vars(&body.stmts, &scope);
                match self.exec_block_in(&body.stmts, &scope)? {
                    Completion::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
            Code::Arrow(arrow) => {
                if arrow.is_async || arrow.is_generator {
                    return Err(EvalError::unsupported("async arrow functions"));
                }
                let patterns: Vec<&'b Pat> = arrow.params.iter().collect();
                self.bind_params(&patterns, args, &scope)?;
                match &*arrow.body {
                    BlockStmtOrExpr::Expr(expr) => self.eval(expr, &scope),
                    BlockStmtOrExpr::BlockStmt(block) => {
                        self.hoist_vars(&block.stmts, &scope);
                        match self.exec_block_in(&block.stmts, &scope)? {
                            Completion::Return(value) => Ok(value),
                            _ => Ok(Value::Undefined),
                        }
                    }
                }
            }
        }
    }

    fn bind_params(&mut self, params: &[&'b Pat], args: Vec<Value>, scope: &Rc<Scope>) -> EvalResult<()> {
        let mut args = args.into_iter();
        for &pat in params {
            if let Pat::Rest(rest) = pat {
                let remaining: Vec<Value> = args.by_ref().collect();
                self.bind_pattern(&rest.arg, Value::array(remaining), scope, BindMode::Param)?;
                break;
            }
            let value = args.next().unwrap_or_default();
            self.bind_pattern(pat, value, scope, BindMode::Param)?;
        }
        Ok(())
    }

    fn construct(&mut self, callee: Value, args: Vec<Value>) -> EvalResult {
        let Value::Function(function) = &callee else {
            return Err(EvalError::Type(format!("{} is not a constructor", callee.describe())));
        };
        match &**function {
            FunctionValue::Native(native) if native.constructor => (native.call)(&args),
            FunctionValue::Closure(closure) if matches!(self.code[closure.code], Code::Function(_)) => {
                let this = Value::object(Object::new(ObjectClass::Plain));
                let result = self.call_function(function, this.clone(), args)?;
                Ok(match result {
                    Value::Object(_) | Value::Array(_) => result,
                    _ => this,
                })
            }
            _ => Err(EvalError::Type(format!("{} is not a constructor", function.name()))),
        }
    }

    // ============================================================
    // Declarations and hoisting
    // ============================================================

    /// Declare `var` names (and nested ones) of a function or module body.
    pub(super) fn hoist_vars(&mut self, stmts: &'b [Stmt], scope: &Rc<Scope>) {
        let mut names = Vec::new();
        for stmt in stmts {
            collect_var_names(stmt, &mut names);
        }
        for name in names {
            if !scope.has_own(&name) {
                scope.declare(&name, Slot::Value(Value::Undefined), true);
            }
        }
    }

    /// Declare the block-scoped names and functions of `decl`.
    pub(super) fn hoist_decl(&mut self, decl: &'b Decl, scope: &Rc<Scope>) {
        match decl {
            Decl::Fn(f) => {
                let closure = self.closure(Code::Function(&f.function), scope, f.ident.sym.as_str());
                scope.declare(f.ident.sym.as_str(), Slot::Value(closure), true);
            }
            Decl::Var(var) if var.kind != VarDeclKind::Var => {
                for declarator in &var.decls {
                    for ident in binding_idents(&declarator.name) {
                        scope.declare(ident.sym.as_str(), Slot::Uninit, var.kind == VarDeclKind::Let);
                    }
                }
            }
            Decl::Class(c) => scope.declare(c.ident.sym.as_str(), Slot::Uninit, true),
            Decl::TsEnum(e) => {
                if !scope.has_own(e.id.sym.as_str()) {
                    scope.declare(e.id.sym.as_str(), Slot::Value(Value::Undefined), true);
                }
            }
            _ => {}
        }
    }

    fn hoist_block(&mut self, stmts: &'b [Stmt], scope: &Rc<Scope>) {
        for stmt in stmts {
            if let Stmt::Decl(decl) = stmt {
                self.hoist_decl(decl, scope);
            }
        }
    }

    pub(super) fn exec_decl(&mut self, decl: &'b Decl, scope: &Rc<Scope>) -> EvalResult<()> {
        match decl {
            Decl::Var(var) => self.exec_var(var, scope),
            Decl::Fn(_) => Ok(()),
            Decl::Class(_) => Err(EvalError::unsupported("classes")),
            Decl::TsEnum(e) => {
                let value = self.eval_enum(e, scope)?;
                scope.assign(e.id.sym.as_str(), value)
            }
            Decl::TsInterface(_) | Decl::TsTypeAlias(_) => Ok(()),
            Decl::TsModule(_) => Err(EvalError::unsupported("namespaces")),
            Decl::Using(_) => Err(EvalError::unsupported("`using` declarations")),
        }
    }

    fn exec_var(&mut self, var: &'b VarDecl, scope: &Rc<Scope>) -> EvalResult<()> {
        let mode = BindMode::of(var.kind);
        for declarator in &var.decls {
            let value = match &declarator.init {
                Some(init) => self.eval(init, scope)?,
                // `var x;` keeps whatever x already holds.
                None if mode == BindMode::Var => continue,
                None => Value::Undefined,
            };
            self.bind_pattern(&declarator.name, value, scope, mode)?;
        }
        Ok(())
    }

    fn eval_enum(&mut self, decl: &'b TsEnumDecl, scope: &Rc<Scope>) -> EvalResult {
        let mut object = Object::new(ObjectClass::Plain);
        let mut next = 0.0;
        for member in &decl.members {
            let name = match &member.id {
                TsEnumMemberId::Ident(ident) => ident.sym.to_string(),
                TsEnumMemberId::Str(s) => s.value.as_str().unwrap_or_default().to_string(),
            };
            let value = match &member.init {
                Some(init) => self.eval(init, scope)?,
                None => Value::Number(next),
            };
            if let Value::Number(n) = value {
                next = n + 1.0;
                object.set(&super::value::format_number(n), Value::string(&name));
            }
            object.set(&name, value);
        }
        Ok(Value::object(object))
    }

    // ============================================================
    // Patterns
    // ============================================================

    fn bind_name(&mut self, name: &str, value: Value, scope: &Rc<Scope>, mode: BindMode) -> EvalResult<()> {
        match mode {
            BindMode::Let | BindMode::Param => {
                scope.declare(name, Slot::Value(value), true);
                Ok(())
            }
            BindMode::Const => {
                scope.declare(name, Slot::Value(value), false);
                Ok(())
            }
            BindMode::Var => {
                if scope.lookup(name).is_none() {
                    scope.declare(name, Slot::Value(Value::Undefined), true);
                }
                scope.assign(name, value)
            }
            BindMode::Assign => scope.assign(name, value),
        }
    }

    pub(super) fn bind_pattern(&mut self, pat: &'b Pat, value: Value, scope: &Rc<Scope>, mode: BindMode) -> EvalResult<()> {
        match pat {
            Pat::Ident(binding) => self.bind_name(binding.id.sym.as_str(), value, scope, mode),
            Pat::Array(array) => self.bind_array(array, value, scope, mode),
            Pat::Object(object) => self.bind_object(object, value, scope, mode),
            Pat::Assign(assign) => {
                let value = match value {
                    Value::Undefined => self.eval(&assign.right, scope)?,
                    value => value,
                };
                self.bind_pattern(&assign.left, value, scope, mode)
            }
            Pat::Rest(rest) => self.bind_pattern(&rest.arg, value, scope, mode),
            Pat::Expr(expr) if mode == BindMode::Assign => self.assign_to_expr(expr, value, scope),
            Pat::Expr(_) | Pat::Invalid(_) => Err(EvalError::unsupported("this binding pattern")),
        }
    }

    fn bind_array(&mut self, array: &'b ArrayPat, value: Value, scope: &Rc<Scope>, mode: BindMode) -> EvalResult<()> {
        let items = ops::iterate(&value)?;
        for (i, elem) in array.elems.iter().enumerate() {
            match elem {
                None => {}
                Some(Pat::Rest(rest)) => {
                    let remaining = items.get(i..).map(<[Value]>::to_vec).unwrap_or_default();
                    self.bind_pattern(&rest.arg, Value::array(remaining), scope, mode)?;
                    break;
                }
                Some(pat) => {
                    let item = items.get(i).cloned().unwrap_or_default();
                    self.bind_pattern(pat, item, scope, mode)?;
                }
            }
        }
        Ok(())
    }

    fn bind_object(&mut self, object: &'b ObjectPat, value: Value, scope: &Rc<Scope>, mode: BindMode) -> EvalResult<()> {
        if value.is_nullish() {
            return Err(EvalError::Type(format!("cannot destructure {}", value.describe())));
        }
        let mut taken: Vec<Rc<str>> = Vec::new();
        for prop in &object.props {
            match prop {
                ObjectPatProp::KeyValue(kv) => {
                    let key = self.prop_key(&kv.key, scope)?;
                    let item = ops::get_property(&value, &key)?;
                    taken.push(key);
                    self.bind_pattern(&kv.value, item, scope, mode)?;
                }
                ObjectPatProp::Assign(assign) => {
                    let key: Rc<str> = Rc::from(assign.key.id.sym.as_str());
                    let mut item = ops::get_property(&value, &key)?;
                    if let (Value::Undefined, Some(default)) = (&item, &assign.value) {
                        item = self.eval(default, scope)?;
                    }
                    taken.push(key);
                    self.bind_name(assign.key.id.sym.as_str(), item, scope, mode)?;
                }
                ObjectPatProp::Rest(rest) => {
                    let remaining = ops::own_entries(&value)
                        .into_iter()
                        .filter(|(key, _)| !taken.contains(key))
                        .map(|(key, value)| (key.to_string(), value));
                    self.bind_pattern(&rest.arg, Value::plain_object(remaining), scope, mode)?;
                }
            }
        }
        Ok(())
    }

    fn prop_key(&mut self, key: &'b PropName, scope: &Rc<Scope>) -> EvalResult<Rc<str>> {
        Ok(match key {
            PropName::Ident(ident) => Rc::from(ident.sym.as_str()),
            PropName::Str(s) => Rc::from(s.value.as_str().unwrap_or_default()),
            PropName::Num(n) => Rc::from(super::value::format_number(n.value)),
            PropName::Computed(computed) => self.eval(&computed.expr, scope)?.to_key(),
            PropName::BigInt(_) => return Err(EvalError::unsupported("bigint keys")),
        })
    }

    fn assign_to_expr(&mut self, expr: &'b Expr, value: Value, scope: &Rc<Scope>) -> EvalResult<()> {
        match expr {
            Expr::Ident(ident) => scope.assign(ident.sym.as_str(), value),
            Expr::Member(member) => {
                let object = self.eval(&member.obj, scope)?;
                let key = self.member_key(&member.prop, scope)?;
                self.set_member(&object, &key, value)
            }
            Expr::Paren(paren) => self.assign_to_expr(&paren.expr, value, scope),
            _ => Err(EvalError::unsupported("this assignment target")),
        }
    }

    fn assign_target(&mut self, target: &'b AssignTarget, value: Value, scope: &Rc<Scope>) -> EvalResult<()> {
        match target {
            AssignTarget::Simple(simple) => match simple {
                SimpleAssignTarget::Ident(binding) => scope.assign(binding.id.sym.as_str(), value),
                SimpleAssignTarget::Member(member) => {
                    let object = self.eval(&member.obj, scope)?;
                    let key = self.member_key(&member.prop, scope)?;
                    self.set_member(&object, &key, value)
                }
                SimpleAssignTarget::Paren(paren) => self.assign_to_expr(&paren.expr, value, scope),
                SimpleAssignTarget::TsAs(e) => self.assign_to_expr(&e.expr, value, scope),
                SimpleAssignTarget::TsSatisfies(e) => self.assign_to_expr(&e.expr, value, scope),
                SimpleAssignTarget::TsNonNull(e) => self.assign_to_expr(&e.expr, value, scope),
                SimpleAssignTarget::TsTypeAssertion(e) => self.assign_to_expr(&e.expr, value, scope),
                _ => Err(EvalError::unsupported("this assignment target")),
            },
            AssignTarget::Pat(pat) => match pat {
                AssignTargetPat::Array(array) => self.bind_array(array, value, scope, BindMode::Assign),
                AssignTargetPat::Object(object) => self.bind_object(object, value, scope, BindMode::Assign),
                AssignTargetPat::Invalid(_) => Err(EvalError::unsupported("this assignment target")),
            },
        }
    }

    fn read_target(&mut self, target: &'b AssignTarget, scope: &Rc<Scope>) -> EvalResult {
        match target {
            AssignTarget::Simple(SimpleAssignTarget::Ident(binding)) => self.read_ident(&binding.id, scope),
            AssignTarget::Simple(SimpleAssignTarget::Member(member)) => self.eval_member(member, scope),
            AssignTarget::Simple(SimpleAssignTarget::Paren(paren)) => self.eval(&paren.expr, scope),
            _ => Err(EvalError::unsupported("compound assignment to this target")),
        }
    }

    // ============================================================
    // Statements
    // ============================================================

    /// Run `stmts` in `scope`, after declaring their block-scoped names.
    pub(super) fn exec_block_in(&mut self, stmts: &'b [Stmt], scope: &Rc<Scope>) -> EvalResult<Completion> {
        self.hoist_block(stmts, scope);
        for stmt in stmts {
            match self.exec_stmt(stmt, scope)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_block(&mut self, stmts: &'b [Stmt], scope: &Rc<Scope>) -> EvalResult<Completion> {
        let inner = Scope::child(scope);
        self.exec_block_in(stmts, &inner)
    }

    pub(super) fn exec_stmt(&mut self, stmt: &'b Stmt, scope: &Rc<Scope>) -> EvalResult<Completion> {
        self.step()?;
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(&expr.expr, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::Decl(decl) => {
                self.exec_decl(decl, scope)?;
                Ok(Completion::Normal)
            }
            Stmt::Block(block) => self.exec_block(&block.stmts, scope),
            Stmt::Empty(_) | Stmt::Debugger(_) => Ok(Completion::Normal),
            Stmt::Return(ret) => {
                let value = match &ret.arg {
                    Some(arg) => self.eval(arg, scope)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::If(stmt) => {
                if self.eval(&stmt.test, scope)?.truthy() {
                    self.exec_stmt(&stmt.cons, scope)
                } else if let Some(alt) = &stmt.alt {
                    self.exec_stmt(alt, scope)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::Throw(throw) => Err(EvalError::Throw(self.eval(&throw.arg, scope)?)),
            Stmt::Try(stmt) => self.exec_try(stmt, scope),
            Stmt::Break(stmt) => Ok(Completion::Break(stmt.label.as_ref().map(|l| l.sym.to_string()))),
            Stmt::Continue(stmt) => Ok(Completion::Continue(stmt.label.as_ref().map(|l| l.sym.to_string()))),
            Stmt::Labeled(labeled) => {
                let label = labeled.label.sym.to_string();
                let completion = match &*labeled.body {
                    Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) | Stmt::ForIn(_) | Stmt::ForOf(_) => {
                        self.exec_loop(&labeled.body, scope, Some(&label))?
                    }
                    body => self.exec_stmt(body, scope)?,
                };
                Ok(match completion {
                    Completion::Break(Some(l)) if l == label => Completion::Normal,
                    other => other,
                })
            }
            Stmt::While(_) | Stmt::DoWhile(_) | Stmt::For(_) | Stmt::ForIn(_) | Stmt::ForOf(_) => {
                self.exec_loop(stmt, scope, None)
            }
            Stmt::Switch(stmt) => self.exec_switch(stmt, scope),
            Stmt::With(_) => Err(EvalError::unsupported("`with` statements")),
        }
    }

    fn exec_try(&mut self, stmt: &'b TryStmt, scope: &Rc<Scope>) -> EvalResult<Completion> {
        let mut result = self.exec_block(&stmt.block.stmts, scope);
        if let (Err(error), Some(handler)) = (&result, &stmt.handler)
            && error.is_catchable()
        {
            let error = error.clone();
            let inner = Scope::child(scope);
            result = match &handler.param {
                Some(param) => self
                    .bind_pattern(param, error.into_value(), &inner, BindMode::Let)
                    .and_then(|()| self.exec_block(&handler.body.stmts, &inner)),
                None => self.exec_block(&handler.body.stmts, &inner),
            };
        }
        if let Some(finalizer) = &stmt.finalizer {
            if let Err(error) = &result
                && !error.is_catchable()
            {
                return result;
            }
            match self.exec_block(&finalizer.stmts, scope)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    fn exec_switch(&mut self, stmt: &'b SwitchStmt, scope: &Rc<Scope>) -> EvalResult<Completion> {
        let discriminant = self.eval(&stmt.discriminant, scope)?;
        let inner = Scope::child(scope);
        for case in &stmt.cases {
            self.hoist_block(&case.cons, &inner);
        }

        let mut start = None;
        for (i, case) in stmt.cases.iter().enumerate() {
            if let Some(test) = &case.test
                && self.eval(test, &inner)?.strict_equals(&discriminant)
            {
                start = Some(i);
                break;
            }
        }
        let start = start.or_else(|| stmt.cases.iter().position(|case| case.test.is_none()));
        let Some(start) = start else {
            return Ok(Completion::Normal);
        };

        for case in &stmt.cases[start..] {
            for stmt in &case.cons {
                match self.exec_stmt(stmt, &inner)? {
                    Completion::Normal => {}
                    Completion::Break(None) => return Ok(Completion::Normal),
                    abrupt => return Ok(abrupt),
                }
            }
        }
        Ok(Completion::Normal)
    }

    /// Run a loop statement. `label` is the loop's own label, if any.
    fn exec_loop(&mut self, stmt: &'b Stmt, scope: &Rc<Scope>, label: Option<&str>) -> EvalResult<Completion> {
        // Whether `completion` ends the loop, and with what.
        let control = |completion: Completion| -> Option<Completion> {
            match completion {
                Completion::Normal => None,
                Completion::Continue(None) => None,
                Completion::Continue(Some(l)) if Some(l.as_str()) == label => None,
                Completion::Break(None) => Some(Completion::Normal),
                Completion::Break(Some(l)) if Some(l.as_str()) == label => Some(Completion::Normal),
                other => Some(other),
            }
        };

        match stmt {
            Stmt::While(stmt) => {
                while self.eval(&stmt.test, scope)?.truthy() {
                    if let Some(done) = control(self.exec_stmt(&stmt.body, scope)?) {
                        return Ok(done);
                    }
                }
            }
            Stmt::DoWhile(stmt) => loop {
                if let Some(done) = control(self.exec_stmt(&stmt.body, scope)?) {
                    return Ok(done);
                }
                if !self.eval(&stmt.test, scope)?.truthy() {
                    break;
                }
            },
            Stmt::For(stmt) => {
                let inner = Scope::child(scope);
                match &stmt.init {
                    Some(VarDeclOrExpr::VarDecl(var)) => self.exec_var(var, &inner)?,
                    Some(VarDeclOrExpr::Expr(expr)) => {
                        self.eval(expr, &inner)?;
                    }
                    None => {}
                }
                loop {
                    if let Some(test) = &stmt.test
                        && !self.eval(test, &inner)?.truthy()
                    {
                        break;
                    }
                    if let Some(done) = control(self.exec_stmt(&stmt.body, &inner)?) {
                        return Ok(done);
                    }
                    if let Some(update) = &stmt.update {
                        self.eval(update, &inner)?;
                    }
                }
            }
            Stmt::ForOf(stmt) => {
                if stmt.is_await {
                    return Err(EvalError::unsupported("`for await`"));
                }
                let items = ops::iterate(&self.eval(&stmt.right, scope)?)?;
                for item in items {
                    let inner = Scope::child(scope);
                    self.bind_head(&stmt.left, item, &inner)?;
                    if let Some(done) = control(self.exec_stmt(&stmt.body, &inner)?) {
                        return Ok(done);
                    }
                }
            }
            Stmt::ForIn(stmt) => {
                let object = self.eval(&stmt.right, scope)?;
                for key in ops::own_keys(&object) {
                    let inner = Scope::child(scope);
                    self.bind_head(&stmt.left, Value::String(key), &inner)?;
                    if let Some(done) = control(self.exec_stmt(&stmt.body, &inner)?) {
                        return Ok(done);
                    }
                }
            }
            _ => return self.exec_stmt(stmt, scope),
        }
        Ok(Completion::Normal)
    }

    fn bind_head(&mut self, head: &'b ForHead, value: Value, scope: &Rc<Scope>) -> EvalResult<()> {
        match head {
            ForHead::VarDecl(var) => match var.decls.first() {
                Some(declarator) => self.bind_pattern(&declarator.name, value, scope, BindMode::of(var.kind)),
                None => Ok(()),
            },
            ForHead::Pat(pat) => self.bind_pattern(pat, value, scope, BindMode::Assign),
            ForHead::UsingDecl(_) => Err(EvalError::unsupported("`using` declarations")),
        }
    }

    // ============================================================
    // Expressions
    // ============================================================

    pub fn eval(&mut self, expr: &'b Expr, scope: &Rc<Scope>) -> EvalResult {
        self.step()?;
        match expr {
            Expr::Lit(lit) => eval_lit(lit),
            Expr::Ident(ident) => self.read_ident(ident, scope),
            Expr::This(_) => Ok(match scope.lookup("this").map(|binding| binding.slot) {
                Some(Slot::Value(value)) => value,
                _ => Value::Undefined,
            }),
            Expr::Paren(paren) => self.eval(&paren.expr, scope),
            Expr::TsAs(e) => self.eval(&e.expr, scope),
            Expr::TsSatisfies(e) => self.eval(&e.expr, scope),
            Expr::TsNonNull(e) => self.eval(&e.expr, scope),
            Expr::TsConstAssertion(e) => self.eval(&e.expr, scope),
            Expr::TsTypeAssertion(e) => self.eval(&e.expr, scope),
            Expr::TsInstantiation(e) => self.eval(&e.expr, scope),
            Expr::Tpl(tpl) => self.eval_tpl(tpl, scope),
            Expr::Array(array) => {
                let mut items = Vec::with_capacity(array.elems.len());
                for elem in &array.elems {
                    match elem {
                        None => items.push(Value::Undefined),
                        Some(elem) => {
                            let value = self.eval(&elem.expr, scope)?;
                            if elem.spread.is_some() {
                                self.spread_into(&mut items, &value)?;
                            } else {
                                items.push(value);
                            }
                        }
                    }
                }
                Ok(Value::array(items))
            }
            Expr::Object(object) => self.eval_object(object, scope),
            Expr::Fn(f) => {
                let name = f.ident.as_ref().map(|i| i.sym.as_str()).unwrap_or_default();
                match &f.ident {
                    Some(ident) => {
                        let inner = Scope::child(scope);
                        let closure = self.closure(Code::Function(&f.function), &inner, name);
                        inner.declare(ident.sym.as_str(), Slot::Value(closure.clone()), false);
                        Ok(closure)
                    }
                    None => Ok(self.closure(Code::Function(&f.function), scope, name)),
                }
            }
            Expr::Arrow(arrow) => Ok(self.closure(Code::Arrow(arrow), scope, "")),
            Expr::Unary(unary) => self.eval_unary(unary, scope),
            Expr::Update(update) => {
                let old = self.eval(&update.arg, scope)?.to_number();
                let new = match update.op {
                    UpdateOp::PlusPlus => old + 1.0,
                    UpdateOp::MinusMinus => old - 1.0,
                };
                self.assign_to_expr(&update.arg, Value::Number(new), scope)?;
                Ok(Value::Number(if update.prefix { new } else { old }))
            }
            Expr::Bin(bin) => self.eval_bin(bin, scope),
            Expr::Assign(assign) => self.eval_assign(assign, scope),
            Expr::Member(member) => self.eval_member(member, scope),
            Expr::Cond(cond) => {
                if self.eval(&cond.test, scope)?.truthy() {
                    self.eval(&cond.cons, scope)
                } else {
                    self.eval(&cond.alt, scope)
                }
            }
            Expr::Call(call) => self.eval_call(call, scope),
            Expr::New(new) => {
                let callee = self.eval(&new.callee, scope)?;
                let args = match &new.args {
                    Some(args) => self.eval_args(args, scope)?,
                    None => Vec::new(),
                };
                self.construct(callee, args)
            }
            Expr::Seq(seq) => {
                let mut last = Value::Undefined;
                for expr in &seq.exprs {
                    last = self.eval(expr, scope)?;
                }
                Ok(last)
            }
            Expr::OptChain(_) => Ok(self.eval_chain(expr, scope)?.unwrap_or_default()),
            Expr::Class(_) => Err(EvalError::unsupported("classes")),
            Expr::TaggedTpl(_) => Err(EvalError::unsupported("tagged templates")),
            Expr::Await(_) | Expr::Yield(_) => Err(EvalError::unsupported("`await` and `yield`")),
            Expr::JSXElement(_)
            | Expr::JSXFragment(_)
            | Expr::JSXMember(_)
            | Expr::JSXNamespacedName(_)
            | Expr::JSXEmpty(_) => Err(EvalError::unsupported("JSX")),
            Expr::SuperProp(_) | Expr::MetaProp(_) | Expr::PrivateName(_) | Expr::Invalid(_) => {
                Err(EvalError::unsupported("this expression"))
            }
        }
    }

    pub(super) fn read_ident(&mut self, ident: &Ident, scope: &Rc<Scope>) -> EvalResult {
        let name = ident.sym.as_str();
        match scope.lookup(name) {
            Some(binding) => self.read_slot(name, binding.slot),
            None => Err(EvalError::Reference(format!("`{name}` is not defined"))),
        }
    }

    pub(super) fn read_slot(&mut self, name: &str, slot: Slot) -> EvalResult {
        match slot {
            Slot::Value(value) => Ok(value),
            Slot::Uninit => Err(EvalError::Reference(format!("cannot access `{name}` before initialization"))),
            Slot::Import { module, name } => self.read_export(module, &name),
            Slot::Namespace(module) => Ok(self.namespace_object(module)),
            Slot::External(specifier) => Err(EvalError::Reference(format!(
                "`{name}` is imported from `{specifier}`, which is not part of the bundle"
            ))),
        }
    }

    fn eval_tpl(&mut self, tpl: &'b Tpl, scope: &Rc<Scope>) -> EvalResult {
        let mut out = String::new();
        for (i, quasi) in tpl.quasis.iter().enumerate() {
            match quasi.cooked.as_ref().and_then(|cooked| cooked.as_str()) {
                Some(text) => out.push_str(text),
                None => out.push_str(quasi.raw.as_str()),
            }
            if let Some(expr) = tpl.exprs.get(i) {
                out.push_str(&self.eval(expr, scope)?.to_js_string());
                ops::check_string_length(out.len())?;
            }
        }
        Ok(Value::string(out))
    }

    fn eval_object(&mut self, object: &'b ObjectLit, scope: &Rc<Scope>) -> EvalResult {
        let mut out = Object::new(ObjectClass::Plain);
        for prop in &object.props {
            match prop {
                PropOrSpread::Spread(spread) => {
                    let value = self.eval(&spread.expr, scope)?;
                    for (key, value) in ops::own_entries(&value) {
                        out.set(&key, value);
                    }
                }
                PropOrSpread::Prop(prop) => match &**prop {
                    Prop::Shorthand(ident) => {
                        let value = self.read_ident(ident, scope)?;
                        out.set(ident.sym.as_str(), value);
                    }
                    Prop::KeyValue(kv) => {
                        let key = self.prop_key(&kv.key, scope)?;
                        let value = self.eval(&kv.value, scope)?;
                        out.set(&key, value);
                    }
                    Prop::Method(method) => {
                        let key = self.prop_key(&method.key, scope)?;
                        let closure = self.closure(Code::Function(&method.function), scope, &key);
                        out.set(&key, closure);
                    }
                    Prop::Getter(_) | Prop::Setter(_) => return Err(EvalError::unsupported("accessors")),
                    Prop::Assign(_) => return Err(EvalError::unsupported("this property")),
                },
            }
        }
        Ok(Value::object(out))
    }

    fn eval_unary(&mut self, unary: &'b UnaryExpr, scope: &Rc<Scope>) -> EvalResult {
        match unary.op {
            UnaryOp::TypeOf => {
                // `typeof undeclared` is not an error.
                if let Expr::Ident(ident) = &*unary.arg
                    && scope.lookup(ident.sym.as_str()).is_none()
                {
                    return Ok(Value::string("undefined"));
                }
                Ok(Value::string(self.eval(&unary.arg, scope)?.type_of()))
            }
            UnaryOp::Delete => match &*unary.arg {
                Expr::Member(member) => {
                    let object = self.eval(&member.obj, scope)?;
                    let key = self.member_key(&member.prop, scope)?;
                    Ok(Value::Bool(ops::delete_property(&object, &key)?))
                }
                _ => Ok(Value::Bool(true)),
            },
            op => {
                let value = self.eval(&unary.arg, scope)?;
                Ok(match op {
                    UnaryOp::Minus => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::Bang => Value::Bool(!value.truthy()),
                    UnaryOp::Tilde => Value::Number(f64::from(!ops::to_int32(value.to_number()))),
                    _ => Value::Undefined,
                })
            }
        }
    }

    fn eval_bin(&mut self, bin: &'b BinExpr, scope: &Rc<Scope>) -> EvalResult {
        let left = self.eval(&bin.left, scope)?;
        match bin.op {
            BinaryOp::LogicalAnd if !left.truthy() => return Ok(left),
            BinaryOp::LogicalOr if left.truthy() => return Ok(left),
            BinaryOp::NullishCoalescing if !left.is_nullish() => return Ok(left),
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr | BinaryOp::NullishCoalescing => {
                return self.eval(&bin.right, scope);
            }
            _ => {}
        }
        let right = self.eval(&bin.right, scope)?;
        ops::binary(bin.op, &left, &right)
    }

    fn eval_assign(&mut self, assign: &'b AssignExpr, scope: &Rc<Scope>) -> EvalResult {
        let value = match assign.op {
            AssignOp::Assign => self.eval(&assign.right, scope)?,
            AssignOp::AndAssign | AssignOp::OrAssign | AssignOp::NullishAssign => {
                let current = self.read_target(&assign.left, scope)?;
                let keep = match assign.op {
                    AssignOp::AndAssign => !current.truthy(),
                    AssignOp::OrAssign => current.truthy(),
                    _ => !current.is_nullish(),
                };
                if keep {
                    return Ok(current);
                }
                self.eval(&assign.right, scope)?
            }
            op => {
                let current = self.read_target(&assign.left, scope)?;
                let right = self.eval(&assign.right, scope)?;
                let op = ops::compound_op(op).ok_or_else(|| EvalError::unsupported("this assignment operator"))?;
                ops::binary(op, &current, &right)?
            }
        };
        self.assign_target(&assign.left, value.clone(), scope)?;
        Ok(value)
    }

    fn member_key(&mut self, prop: &'b MemberProp, scope: &Rc<Scope>) -> EvalResult<Rc<str>> {
        match prop {
            MemberProp::Ident(ident) => Ok(Rc::from(ident.sym.as_str())),
            MemberProp::Computed(computed) => Ok(self.eval(&computed.expr, scope)?.to_key()),
            MemberProp::PrivateName(_) => Err(EvalError::unsupported("private names")),
        }
    }

    fn eval_member(&mut self, member: &'b MemberExpr, scope: &Rc<Scope>) -> EvalResult {
        let object = self.eval(&member.obj, scope)?;
        let key = self.member_key(&member.prop, scope)?;
        ops::get_property(&object, &key)
    }

    /// Evaluate inside an optional chain. `None` means the chain short-circuited.
    fn eval_chain(&mut self, expr: &'b Expr, scope: &Rc<Scope>) -> EvalResult<Option<Value>> {
        match expr {
            Expr::OptChain(chain) => match &*chain.base {
                OptChainBase::Member(member) => {
                    let Some(object) = self.eval_chain(&member.obj, scope)? else {
                        return Ok(None);
                    };
                    if chain.optional && object.is_nullish() {
                        return Ok(None);
                    }
                    let key = self.member_key(&member.prop, scope)?;
                    ops::get_property(&object, &key).map(Some)
                }
                OptChainBase::Call(call) => {
                    let Some((this, callee)) = self.eval_callee_chain(&call.callee, scope)? else {
                        return Ok(None);
                    };
                    if chain.optional && callee.is_nullish() {
                        return Ok(None);
                    }
                    let args = self.eval_args(&call.args, scope)?;
                    self.invoke(callee, this, args).map(Some)
                }
            },
            Expr::Member(member) => {
                let Some(object) = self.eval_chain(&member.obj, scope)? else {
                    return Ok(None);
                };
                let key = self.member_key(&member.prop, scope)?;
                ops::get_property(&object, &key).map(Some)
            }
            Expr::Call(call) => {
                let Callee::Expr(callee) = &call.callee else {
                    return self.eval(expr, scope).map(Some);
                };
                let Some((this, callee)) = self.eval_callee_chain(callee, scope)? else {
                    return Ok(None);
                };
                let args = self.eval_args(&call.args, scope)?;
                self.invoke(callee, this, args).map(Some)
            }
            Expr::Paren(paren) => self.eval_chain(&paren.expr, scope),
            _ => self.eval(expr, scope).map(Some),
        }
    }

    /// A callee and its receiver, following optional links.
    fn eval_callee_chain(&mut self, callee: &'b Expr, scope: &Rc<Scope>) -> EvalResult<Option<(Value, Callable)>> {
        let (member, optional) = match callee {
            Expr::Member(member) => (member, false),
            Expr::OptChain(chain) => match &*chain.base {
                OptChainBase::Member(member) => (member, chain.optional),
                OptChainBase::Call(_) => {
                    return Ok(self.eval_chain(callee, scope)?.map(|f| (Value::Undefined, Callable::Value(f))));
                }
            },
            _ => return Ok(self.eval_chain(callee, scope)?.map(|f| (Value::Undefined, Callable::Value(f)))),
        };
        let Some(object) = self.eval_chain(&member.obj, scope)? else {
            return Ok(None);
        };
        if optional && object.is_nullish() {
            return Ok(None);
        }
        let key = self.member_key(&member.prop, scope)?;
        let function = self.method(&object, &key)?;
        Ok(Some((object, function)))
    }

    fn eval_args(&mut self, args: &'b [ExprOrSpread], scope: &Rc<Scope>) -> EvalResult<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let value = self.eval(&arg.expr, scope)?;
            if arg.spread.is_some() {
                self.spread_into(&mut out, &value)?;
            } else {
                out.push(value);
            }
        }
        Ok(out)
    }

    fn eval_call(&mut self, call: &'b CallExpr, scope: &Rc<Scope>) -> EvalResult {
        let callee = match &call.callee {
            Callee::Expr(callee) => callee,
            Callee::Super(_) | Callee::Import(_) => return Err(EvalError::unsupported("this call")),
        };
        let (this, function) = match &**callee {
            Expr::Member(member) => {
                let object = self.eval(&member.obj, scope)?;
                let key = self.member_key(&member.prop, scope)?;
                let function = self.method(&object, &key)?;
                (object, function)
            }
            other => (Value::Undefined, Callable::Value(self.eval(other, scope)?)),
        };
        let args = self.eval_args(&call.args, scope)?;
        self.invoke(function, this, args)
    }

    fn invoke(&mut self, callee: Callable, this: Value, args: Vec<Value>) -> EvalResult {
        match callee {
            Callable::Value(Value::Function(function)) => self.call_function(&function, this, args),
            Callable::Value(other) => Err(EvalError::Type(format!("{} is not a function", other.describe()))),
            Callable::Builtin(name) => self.call_builtin_method(&this, &name, args),
        }
    }

    /// What `object[key](...)` calls: an own function property, or a builtin
    /// method of arrays, strings and numbers.
    fn method(&mut self, object: &Value, key: &str) -> EvalResult<Callable> {
        let own = ops::get_property(object, key)?;
        if !matches!(own, Value::Function(_)) && ops::has_builtin_method(object, key) {
            return Ok(Callable::Builtin(Rc::from(key)));
        }
        Ok(Callable::Value(own))
    }
}

/// The target of a call expression.
enum Callable {
    Value(Value),
    Builtin(Rc<str>),
}

impl Callable {
    fn is_nullish(&self) -> bool {
        matches!(self, Callable::Value(value) if value.is_nullish())
    }
}

fn eval_lit(lit: &Lit) -> EvalResult {
    Ok(match lit {
        Lit::Str(s) => Value::string(s.value.as_str().unwrap_or_default()),
        Lit::Bool(b) => Value::Bool(b.value),
        Lit::Null(_) => Value::Null,
        Lit::Num(n) => Value::Number(n.value),
        Lit::BigInt(_) => return Err(EvalError::unsupported("bigint literals")),
        Lit::Regex(_) => return Err(EvalError::unsupported("regular expressions")),
        Lit::JSXText(_) => return Err(EvalError::unsupported("JSX")),
    })
}

/// `var` names declared anywhere in `stmt`, outside nested functions.
pub(super) fn collect_var_names(stmt: &Stmt, out: &mut Vec<String>) {
    let from_var = |var: &VarDecl, out: &mut Vec<String>| {
        if var.kind == VarDeclKind::Var {
            for declarator in &var.decls {
                out.extend(binding_idents(&declarator.name).iter().map(|i| i.sym.to_string()));
            }
        }
    };
    match stmt {
        Stmt::Decl(Decl::Var(var)) => from_var(var, out),
        Stmt::Block(block) => block.stmts.iter().for_each(|s| collect_var_names(s, out)),
        Stmt::If(stmt) => {
            collect_var_names(&stmt.cons, out);
            if let Some(alt) = &stmt.alt {
                collect_var_names(alt, out);
            }
        }
        Stmt::For(stmt) => {
            if let Some(VarDeclOrExpr::VarDecl(var)) = &stmt.init {
                from_var(var, out);
            }
            collect_var_names(&stmt.body, out);
        }
        Stmt::ForIn(ForInStmt { left, body, .. }) | Stmt::ForOf(ForOfStmt { left, body, .. }) => {
            if let ForHead::VarDecl(var) = left {
                from_var(var, out);
            }
            collect_var_names(body, out);
        }
        Stmt::While(stmt) => collect_var_names(&stmt.body, out),
        Stmt::DoWhile(stmt) => collect_var_names(&stmt.body, out),
        Stmt::Labeled(stmt) => collect_var_names(&stmt.body, out),
        Stmt::Try(stmt) => {
            stmt.block.stmts.iter().for_each(|s| collect_var_names(s, out));
            if let Some(handler) = &stmt.handler {
                handler.body.stmts.iter().for_each(|s| collect_var_names(s, out));
            }
            if let Some(finalizer) = &stmt.finalizer {
                finalizer.stmts.iter().for_each(|s| collect_var_names(s, out));
            }
        }
        Stmt::Switch(stmt) => stmt
            .cases
            .iter()
            .flat_map(|case| &case.cons)
            .for_each(|s| collect_var_names(s, out)),
        _ => {}
    }
}
