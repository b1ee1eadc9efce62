use std::io::BufRead;
use std::rc::Rc;

use log::{debug, trace};

use crate::ast::*;
use crate::error::{Result, TemplateError};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::reader::Position;
use crate::value::Value;

const IF_CLOSERS: &[TokenKind] = &[TokenKind::Elif, TokenKind::Else, TokenKind::EndIf];
const ELSE_CLOSERS: &[TokenKind] = &[TokenKind::EndIf];
const FOR_CLOSERS: &[TokenKind] = &[TokenKind::EndFor];
const MACRO_CLOSERS: &[TokenKind] = &[TokenKind::EndMacro];

/// Recursive-descent parser pulling tokens from the lexer one at a time.
///
/// Binary operators are parsed with a recursive right operand, so chains
/// of the same precedence group to the right: `a - b - c` is
/// `a - (b - c)` and `a < b < c` is `a < (b < c)`.
pub struct Parser<R> {
    lexer: Lexer<R>,
    current: Token,
}

impl<'a> Parser<&'a [u8]> {
    pub fn from_text(input: &'a str) -> Result<Self> {
        Parser::new(input.as_bytes())
    }
}

impl<R: BufRead> Parser<R> {
    pub fn new(input: R) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token(true)?;
        Ok(Self { lexer, current })
    }

    /// Parses the whole document into its root node.
    pub fn parse(mut self) -> Result<Template> {
        let mut nodes = Vec::new();
        while let Some(node) = self.next_node()? {
            nodes.push(node);
        }
        debug!("parsed template with {} top-level nodes", nodes.len());
        Ok(Template { nodes })
    }

    /// Next top-level node, or `None` at end of input.
    pub fn next_node(&mut self) -> Result<Option<Node>> {
        if self.current.kind == TokenKind::Eof {
            return Ok(None);
        }
        let node = self.node()?;
        trace!("parsed top-level node {node:?}");
        Ok(Some(node))
    }

    fn advance(&mut self) -> Result<Token> {
        let next = self.lexer.next_token(true)?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn accept(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(&kind) {
            self.advance()
        } else {
            Err(self.expected(&kind.to_string()))
        }
    }

    fn expected(&self, what: &str) -> TemplateError {
        TemplateError::syntax(
            format!("expected {what}, found {}", self.current.kind),
            self.current.pos,
        )
    }

    fn unexpected(&self) -> TemplateError {
        TemplateError::syntax(format!("unexpected {}", self.current.kind), self.current.pos)
    }

    fn ident(&mut self) -> Result<String> {
        match &self.current.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance()?;
                Ok(name)
            }
            _ => Err(self.expected("identifier")),
        }
    }

    fn node(&mut self) -> Result<Node> {
        match &self.current.kind {
            TokenKind::Text(s) => {
                let node = Node::Text(s.clone());
                self.advance()?;
                Ok(node)
            }
            TokenKind::VarStart => {
                self.advance()?; // {{
                let expr = self.expression()?;
                self.accept(TokenKind::VarEnd)?;
                Ok(Node::Print(expr))
            }
            TokenKind::CommentStart => self.comment(),
            TokenKind::BlockStart => {
                self.advance()?; // {%
                self.statement()
            }
            _ => Err(self.unexpected()),
        }
    }

    fn comment(&mut self) -> Result<Node> {
        self.accept(TokenKind::CommentStart)?;
        let content = match &self.current.kind {
            TokenKind::Comment(c) => {
                let c = c.clone();
                self.advance()?;
                c
            }
            _ => String::new(),
        };
        // An unterminated comment swallows the rest of the input.
        if !self.check(&TokenKind::Eof) {
            self.accept(TokenKind::CommentEnd)?;
        }
        Ok(Node::Comment(content))
    }

    /// Nodes up to the next `{%` whose keyword is one of `closers`. The `{%`
    /// is consumed and the closing keyword is left as the current token.
    fn block(&mut self, closers: &[TokenKind]) -> Result<(Vec<Node>, TokenKind)> {
        let mut nodes = Vec::new();
        loop {
            match &self.current.kind {
                TokenKind::Eof => return Err(self.expected(&describe(closers))),
                TokenKind::BlockStart => {
                    self.advance()?;
                    if closers.contains(&self.current.kind) {
                        return Ok((nodes, self.current.kind.clone()));
                    }
                    nodes.push(self.statement()?);
                }
                _ => nodes.push(self.node()?),
            }
        }
    }

    /// Consumes a closing keyword and the `%}` after it.
    fn end_tag(&mut self) -> Result<()> {
        self.advance()?;
        self.accept(TokenKind::BlockEnd)?;
        Ok(())
    }

    // Called with the `{%` already consumed.
    fn statement(&mut self) -> Result<Node> {
        match &self.current.kind {
            TokenKind::If => Ok(Node::If(self.if_statement()?)),
            TokenKind::For => self.for_statement(),
            TokenKind::Set => self.set_statement(),
            TokenKind::Macro => self.macro_definition(),
            TokenKind::Elif
            | TokenKind::Else
            | TokenKind::EndIf
            | TokenKind::EndFor
            | TokenKind::EndMacro => Err(self.unexpected()),
            _ => Err(self.expected("statement")),
        }
    }

    // Entered on `if` or `elif`; an `elif` becomes a nested if in the
    // else branch.
    fn if_statement(&mut self) -> Result<IfNode> {
        let pos = self.advance()?.pos;
        let condition = self.expression()?;
        self.accept(TokenKind::BlockEnd)?;

        let (body, closer) = self.block(IF_CLOSERS)?;
        let else_branch = match closer {
            TokenKind::Elif => Some(ElseBranch::Elif(Box::new(self.if_statement()?))),
            TokenKind::Else => {
                self.end_tag()?;
                let (else_body, _) = self.block(ELSE_CLOSERS)?;
                self.end_tag()?;
                Some(ElseBranch::Else(else_body))
            }
            _ => {
                self.end_tag()?;
                None
            }
        };

        Ok(IfNode {
            condition,
            body,
            else_branch,
            pos,
        })
    }

    fn for_statement(&mut self) -> Result<Node> {
        let pos = self.accept(TokenKind::For)?.pos;
        let target = self.ident()?;
        self.accept(TokenKind::In)?;
        let iterable = self.expression()?;
        self.accept(TokenKind::BlockEnd)?;

        let (body, _) = self.block(FOR_CLOSERS)?;
        self.end_tag()?;

        Ok(Node::For {
            target,
            iterable,
            body,
            pos,
        })
    }

    fn set_statement(&mut self) -> Result<Node> {
        let pos = self.accept(TokenKind::Set)?.pos;
        let name = self.ident()?;
        self.accept(TokenKind::Assign)?;
        let value = self.expression()?;
        self.accept(TokenKind::BlockEnd)?;
        Ok(Node::Set { name, value, pos })
    }

    fn macro_definition(&mut self) -> Result<Node> {
        let pos = self.accept(TokenKind::Macro)?.pos;
        let name = self.ident()?;

        self.accept(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.ident()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance()?;
            }
        }
        self.accept(TokenKind::RParen)?;
        self.accept(TokenKind::BlockEnd)?;

        let (body, _) = self.block(MACRO_CLOSERS)?;
        self.end_tag()?;

        Ok(Node::Macro(Rc::new(MacroDef {
            name,
            params,
            body,
            pos,
        })))
    }

    fn expression(&mut self) -> Result<Expr> {
        self.or_expr()
    }

    fn binary(lhs: Expr, op: BinOp, rhs: Expr, op_token: Token) -> Expr {
        Expr::new(
            ExprKind::Binary(Box::new(lhs), op, Box::new(rhs)),
            op_token.pos,
        )
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let lhs = self.and_expr()?;
        if self.check(&TokenKind::Or) {
            let op = self.advance()?;
            let rhs = self.or_expr()?;
            return Ok(Self::binary(lhs, BinOp::Or, rhs, op));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let lhs = self.not_expr()?;
        if self.check(&TokenKind::And) {
            let op = self.advance()?;
            let rhs = self.and_expr()?;
            return Ok(Self::binary(lhs, BinOp::And, rhs, op));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.check(&TokenKind::Not) {
            let pos = self.advance()?.pos;
            let operand = self.not_expr()?;
            return Ok(Expr::new(
                ExprKind::Unary(UnaryOp::Not, Box::new(operand)),
                pos,
            ));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.additive()?;
        let op = match self.current.kind {
            TokenKind::In => {
                let op = self.advance()?;
                let rhs = self.additive()?;
                return Ok(Self::binary(lhs, BinOp::In, rhs, op));
            }
            TokenKind::Lt => BinOp::Lt,
            TokenKind::Gt => BinOp::Gt,
            TokenKind::Le => BinOp::Le,
            TokenKind::Ge => BinOp::Ge,
            TokenKind::EqEq => BinOp::Eq,
            TokenKind::NotEq => BinOp::NotEq,
            _ => return Ok(lhs),
        };
        let op_token = self.advance()?;
        let rhs = self.comparison()?;
        Ok(Self::binary(lhs, op, rhs, op_token))
    }

    fn additive(&mut self) -> Result<Expr> {
        let lhs = self.multiplicative()?;
        let op = match self.current.kind {
            TokenKind::Plus => BinOp::Add,
            TokenKind::Minus => BinOp::Sub,
            _ => return Ok(lhs),
        };
        let op_token = self.advance()?;
        let rhs = self.additive()?;
        Ok(Self::binary(lhs, op, rhs, op_token))
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        let lhs = self.unary()?;
        let op = match self.current.kind {
            TokenKind::Star => BinOp::Mul,
            TokenKind::Slash => BinOp::Div,
            TokenKind::Percent => BinOp::Mod,
            _ => return Ok(lhs),
        };
        let op_token = self.advance()?;
        let rhs = self.multiplicative()?;
        Ok(Self::binary(lhs, op, rhs, op_token))
    }

    fn unary(&mut self) -> Result<Expr> {
        let op = match self.current.kind {
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.primary(),
        };
        let pos = self.advance()?.pos;
        let operand = self.unary()?;
        Ok(Expr::new(ExprKind::Unary(op, Box::new(operand)), pos))
    }

    fn primary(&mut self) -> Result<Expr> {
        let pos = self.current.pos;
        let mut expr = match &self.current.kind {
            TokenKind::LParen => {
                self.advance()?;
                let e = self.expression()?;
                self.accept(TokenKind::RParen)?;
                e
            }
            TokenKind::Ident(_) => {
                let name = self.ident()?;
                if self.check(&TokenKind::LParen) {
                    let args = self.call_arguments()?;
                    Expr::new(ExprKind::Call { name, args }, pos)
                } else {
                    Expr::new(ExprKind::Var(name), pos)
                }
            }
            TokenKind::Int(n) => {
                let value = Value::Int(*n);
                self.constant(value, pos)?
            }
            TokenKind::Float(f) => {
                let value = Value::Float(*f);
                self.constant(value, pos)?
            }
            TokenKind::Str(s) => {
                let value = Value::String(s.clone());
                self.constant(value, pos)?
            }
            TokenKind::True => self.constant(Value::Bool(true), pos)?,
            TokenKind::False => self.constant(Value::Bool(false), pos)?,
            _ => return Err(self.expected("expression")),
        };

        // Suffixes: [index], .attr
        loop {
            match self.current.kind {
                TokenKind::LBracket => {
                    let pos = self.advance()?.pos;
                    let index = self.expression()?;
                    self.accept(TokenKind::RBracket)?;
                    expr = Expr::new(ExprKind::Index(Box::new(expr), Box::new(index)), pos);
                }
                TokenKind::Dot => {
                    let pos = self.advance()?.pos;
                    let attr = self.ident()?;
                    expr = Expr::new(ExprKind::Attribute(Box::new(expr), attr), pos);
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    fn constant(&mut self, value: Value, pos: Position) -> Result<Expr> {
        self.advance()?;
        Ok(Expr::new(ExprKind::Const(value), pos))
    }

    fn call_arguments(&mut self) -> Result<Vec<Expr>> {
        self.accept(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.check(&TokenKind::Comma) {
                    break;
                }
                self.advance()?;
            }
        }
        self.accept(TokenKind::RParen)?;
        Ok(args)
    }
}

impl<R: BufRead> Iterator for Parser<R> {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_node().transpose()
    }
}

fn describe(kinds: &[TokenKind]) -> String {
    let names: Vec<String> = kinds.iter().map(ToString::to_string).collect();
    names.join(" or ")
}
