//! Tree-walking evaluation.
//!
//! Every node renders against an explicit [`ScopeStack`]. Conditional
//! bodies, loop iterations and macro calls each run in their own frame, so
//! bindings made inside them disappear when they finish, error or not.
//!
//! Macros are dynamically scoped: a macro body sees its parameters plus
//! whatever is bound at the *call site*, not what was visible where the
//! macro was defined.

use std::io::BufRead;
use std::rc::Rc;

use log::{debug, trace};

use crate::ast::*;
use crate::error::{Result, SemanticError, TemplateError};
use crate::model::Model;
use crate::parser::Parser;
use crate::reader::Position;
use crate::scope::{Frame, ScopeStack};
use crate::value::Value;

/// Upper bound on nested frames, reached in practice only by runaway
/// macro recursion.
pub const MAX_FRAMES: usize = 128;

pub struct Evaluator {
    scopes: ScopeStack,
}

impl Evaluator {
    pub fn new(globals: Frame) -> Self {
        Self {
            scopes: ScopeStack::new(globals),
        }
    }

    pub fn render(&mut self, template: &Template) -> Result<String> {
        let mut output = String::new();
        render_nodes(&template.nodes, &mut self.scopes, &mut output)?;
        Ok(output)
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// Global bindings, including everything added by top-level `set` and
    /// macro definitions.
    pub fn into_globals(self) -> Frame {
        self.scopes.into_globals()
    }
}

impl Template {
    pub fn parse<R: BufRead>(source: R) -> Result<Self> {
        Parser::new(source)?.parse()
    }

    pub fn render(&self, model: Option<Model>) -> Result<String> {
        let globals = model.unwrap_or_default();
        debug!("rendering template with {} global bindings", globals.len());
        Evaluator::new(globals).render(self)
    }
}

pub fn render_nodes(nodes: &[Node], scope: &mut ScopeStack, out: &mut String) -> Result<()> {
    for node in nodes {
        node.render(scope, out)?;
    }
    Ok(())
}

impl Node {
    /// Appends this node's output to `out`.
    pub fn render(&self, scope: &mut ScopeStack, out: &mut String) -> Result<()> {
        match self {
            Node::Text(s) => out.push_str(s),
            Node::Comment(_) => {}
            Node::Print(expr) => {
                let value = expr.eval(scope)?;
                out.push_str(&value.to_string());
            }
            Node::If(node) => node.render(scope, out)?,
            Node::For {
                target,
                iterable,
                body,
                ..
            } => {
                let items = iterable
                    .eval(scope)?
                    .iter_items()
                    .map_err(|kind| TemplateError::semantic(kind, iterable.pos))?;
                for item in items {
                    scope.scoped(|scope| {
                        scope.bind(target.as_str(), item);
                        render_nodes(body, scope, out)
                    })?;
                }
            }
            Node::Set { name, value, .. } => {
                let value = value.eval(scope)?;
                scope.bind(name.as_str(), value);
            }
            Node::Macro(def) => {
                scope.bind(def.name.as_str(), Value::Macro(Rc::clone(def)));
            }
        }
        Ok(())
    }
}

impl IfNode {
    pub fn render(&self, scope: &mut ScopeStack, out: &mut String) -> Result<()> {
        if self.condition.eval(scope)?.is_truthy() {
            return scope.scoped(|scope| render_nodes(&self.body, scope, out));
        }
        match &self.else_branch {
            Some(ElseBranch::Else(body)) => scope.scoped(|scope| render_nodes(body, scope, out)),
            Some(ElseBranch::Elif(node)) => node.render(scope, out),
            None => Ok(()),
        }
    }
}

impl Expr {
    pub fn eval(&self, scope: &mut ScopeStack) -> Result<Value> {
        let pos = self.pos;
        let at = move |kind: SemanticError| TemplateError::semantic(kind, pos);

        match &self.kind {
            ExprKind::Const(value) => Ok(value.clone()),
            ExprKind::Var(name) => scope
                .lookup(name)
                .cloned()
                .ok_or_else(|| at(SemanticError::UnknownIdentifier(name.clone()))),
            ExprKind::Index(target, index) => {
                let target = target.eval(scope)?;
                let index = index.eval(scope)?;
                target.index(&index).map_err(at)
            }
            ExprKind::Attribute(target, name) => target.eval(scope)?.attribute(name).map_err(at),
            ExprKind::Unary(op, operand) => {
                let value = operand.eval(scope)?;
                match op {
                    UnaryOp::Neg => value.neg().map_err(at),
                    UnaryOp::Plus => value.pos().map_err(at),
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }
            // `and`/`or` short-circuit and yield the deciding operand.
            ExprKind::Binary(lhs, BinOp::And, rhs) => {
                let left = lhs.eval(scope)?;
                if left.is_truthy() {
                    rhs.eval(scope)
                } else {
                    Ok(left)
                }
            }
            ExprKind::Binary(lhs, BinOp::Or, rhs) => {
                let left = lhs.eval(scope)?;
                if left.is_truthy() {
                    Ok(left)
                } else {
                    rhs.eval(scope)
                }
            }
            ExprKind::Binary(lhs, op, rhs) => {
                let left = lhs.eval(scope)?;
                let right = rhs.eval(scope)?;
                binary(&left, *op, &right).map_err(at)
            }
            ExprKind::Call { name, args } => call_macro(name, args, scope, pos),
        }
    }
}

fn binary(left: &Value, op: BinOp, right: &Value) -> std::result::Result<Value, SemanticError> {
    match op {
        BinOp::Add => left.add(right),
        BinOp::Sub => left.sub(right),
        BinOp::Mul => left.mul(right),
        BinOp::Div => left.div(right),
        BinOp::Mod => left.rem(right),
        BinOp::In => right.contains(left).map(Value::Bool),
        _ => left.compare(op, right).map(Value::Bool),
    }
}

fn call_macro(name: &str, args: &[Expr], scope: &mut ScopeStack, pos: Position) -> Result<Value> {
    let at = move |kind: SemanticError| TemplateError::semantic(kind, pos);

    let def = match scope.lookup(name) {
        Some(Value::Macro(def)) => Rc::clone(def),
        Some(_) => return Err(at(SemanticError::NotCallable(name.to_string()))),
        None => return Err(at(SemanticError::UnknownIdentifier(name.to_string()))),
    };
    if args.len() != def.params.len() {
        return Err(at(SemanticError::ArgumentCount {
            name: def.name.clone(),
            expected: def.params.len(),
            found: args.len(),
        }));
    }
    if scope.depth() >= MAX_FRAMES {
        return Err(at(SemanticError::RecursionLimit(MAX_FRAMES)));
    }

    let values = args
        .iter()
        .map(|arg| arg.eval(scope))
        .collect::<Result<Vec<_>>>()?;

    trace!("calling macro '{}' at frame depth {}", def.name, scope.depth());
    let mut output = String::new();
    scope.scoped(|scope| {
        for (param, value) in def.params.iter().zip(values) {
            scope.bind(param.as_str(), value);
        }
        render_nodes(&def.body, scope, &mut output)
    })?;
    Ok(Value::String(output))
}
