//! Variable resolution: gives every declared variable a globally unique
//! symbol and rewrites all references to use it.
//!
//! The scope is a map from source names to bindings, cloned on entry to a
//! nested block with each entry's current-block flag cleared; shadowing is
//! re-declaration in the inner copy. Unique names live in a dotted
//! namespace (`var.<name>.renamed.<n>`) no source identifier can collide
//! with, so uniqueness holds across the whole program by construction.

use crate::ast::{Block, BlockItem, Declaration, Expr, ExprKind, ForInit, Program, Statement, StmtKind};
use crate::error::{CompileError, CompileResult};
use std::collections::HashMap;

/// Rewrite the whole program. Counters span functions, keeping renamed
/// symbols distinct program-wide.
pub fn resolve(program: &mut Program) -> CompileResult<()> {
  let mut resolver = Resolver { counter: 0 };
  for function in &mut program.functions {
    let mut scope = Scope::new();
    resolver.resolve_block(&mut function.body, &mut scope)?;
  }
  Ok(())
}

#[derive(Clone)]
struct Binding {
  unique: String,
  from_current_block: bool,
}

/// One lexical scope: source name to binding.
#[derive(Clone)]
struct Scope {
  entries: HashMap<String, Binding>,
}

impl Scope {
  fn new() -> Self {
    Self {
      entries: HashMap::new(),
    }
  }

  /// Copy for a nested block. Every inherited entry may be shadowed, so all
  /// current-block flags start cleared.
  fn nested(&self) -> Self {
    let entries = self
      .entries
      .iter()
      .map(|(name, binding)| {
        (
          name.clone(),
          Binding {
            unique: binding.unique.clone(),
            from_current_block: false,
          },
        )
      })
      .collect();
    Self { entries }
  }

  fn declared_in_current_block(&self, name: &str) -> bool {
    self
      .entries
      .get(name)
      .is_some_and(|binding| binding.from_current_block)
  }

  fn bind(&mut self, name: String, unique: String) {
    self.entries.insert(
      name,
      Binding {
        unique,
        from_current_block: true,
      },
    );
  }

  fn lookup(&self, name: &str) -> Option<&str> {
    self.entries.get(name).map(|binding| binding.unique.as_str())
  }
}

struct Resolver {
  counter: usize,
}

impl Resolver {
  fn fresh_name(&mut self, source: &str) -> String {
    let n = self.counter;
    self.counter += 1;
    format!("var.{source}.renamed.{n}")
  }

  fn resolve_block(&mut self, block: &mut Block, scope: &mut Scope) -> CompileResult<()> {
    for item in &mut block.items {
      match item {
        BlockItem::Decl(decl) => self.resolve_declaration(decl, scope)?,
        BlockItem::Stmt(stmt) => self.resolve_statement(stmt, scope)?,
      }
    }
    Ok(())
  }

  fn resolve_declaration(&mut self, decl: &mut Declaration, scope: &mut Scope) -> CompileResult<()> {
    if scope.declared_in_current_block(&decl.name) {
      return Err(CompileError::resolution(
        decl.line,
        format!("duplicate declaration of '{}'", decl.name),
      ));
    }
    let unique = self.fresh_name(&decl.name);
    scope.bind(decl.name.clone(), unique.clone());
    decl.name = unique;
    // The binding is recorded first, so an initializer may refer to the
    // variable it initializes. The C standard leaves that undefined; it is
    // accepted here and resolves to the new symbol.
    if let Some(init) = &mut decl.init {
      self.resolve_expr(init, scope)?;
    }
    Ok(())
  }

  fn resolve_statement(&mut self, stmt: &mut Statement, scope: &mut Scope) -> CompileResult<()> {
    match &mut stmt.kind {
      StmtKind::Return(expr) | StmtKind::Expression(expr) => self.resolve_expr(expr, scope),
      StmtKind::If {
        cond,
        then_branch,
        else_branch,
      } => {
        self.resolve_expr(cond, scope)?;
        self.resolve_statement(then_branch, scope)?;
        if let Some(else_branch) = else_branch {
          self.resolve_statement(else_branch, scope)?;
        }
        Ok(())
      }
      StmtKind::Compound(block) => {
        let mut inner = scope.nested();
        self.resolve_block(block, &mut inner)
      }
      StmtKind::While { cond, body, .. } => {
        self.resolve_expr(cond, scope)?;
        self.resolve_statement(body, scope)
      }
      StmtKind::DoWhile { body, cond, .. } => {
        self.resolve_statement(body, scope)?;
        self.resolve_expr(cond, scope)
      }
      // The whole for header and the body share one nested scope: a
      // declaration in the init clause is visible to cond, post, and body,
      // and shadows any outer binding of the same name.
      StmtKind::For {
        init,
        cond,
        post,
        body,
        ..
      } => {
        let mut header = scope.nested();
        match init {
          ForInit::Decl(decl) => self.resolve_declaration(decl, &mut header)?,
          ForInit::Expr(expr) => self.resolve_expr(expr, &mut header)?,
          ForInit::Empty => {}
        }
        if let Some(cond) = cond {
          self.resolve_expr(cond, &mut header)?;
        }
        if let Some(post) = post {
          self.resolve_expr(post, &mut header)?;
        }
        self.resolve_statement(body, &mut header)
      }
      StmtKind::Break { .. } | StmtKind::Continue { .. } | StmtKind::Null => Ok(()),
    }
  }

  fn resolve_expr(&mut self, expr: &mut Expr, scope: &Scope) -> CompileResult<()> {
    match &mut expr.kind {
      ExprKind::Constant(_) => Ok(()),
      ExprKind::Var(name) => match scope.lookup(name) {
        Some(unique) => {
          *name = unique.to_string();
          Ok(())
        }
        None => Err(CompileError::resolution(
          expr.line,
          format!("use of undeclared variable '{name}'"),
        )),
      },
      ExprKind::Unary { operand, .. } => self.resolve_expr(operand, scope),
      ExprKind::Binary { left, right, .. } => {
        self.resolve_expr(left, scope)?;
        self.resolve_expr(right, scope)
      }
      ExprKind::Assignment { lvalue, rvalue } => {
        if !matches!(lvalue.kind, ExprKind::Var(_)) {
          return Err(CompileError::resolution(
            lvalue.line,
            "invalid lvalue on left side of assignment",
          ));
        }
        self.resolve_expr(lvalue, scope)?;
        self.resolve_expr(rvalue, scope)
      }
      ExprKind::Conditional {
        cond,
        then_expr,
        else_expr,
      } => {
        self.resolve_expr(cond, scope)?;
        self.resolve_expr(then_expr, scope)?;
        self.resolve_expr(else_expr, scope)
      }
    }
  }
}
