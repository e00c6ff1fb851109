// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Abstract Syntax Tree (AST) definitions for ES3 JavaScript.
//!
//! These structures are designed to be ESTree-compatible where possible and
//! round-trip through serde so that an external parser can hand programs to
//! the compiler as JSON.
//!
//! Statements and function expressions are reference counted: the compiler
//! hands whole subtrees to the tree-walking interpreter when it cannot lower
//! them, so those nodes must outlive any single borrow of the program.

pub mod build;

use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Shared handle to a statement node.
pub type StatementRef = Rc<Statement>;

/// Shared handle to a function expression node.
pub type FunctionRef = Rc<FunctionExpression>;

/// A complete JavaScript program.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    /// The statements in the program
    pub body: Vec<StatementRef>,
}

/// An identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// The name of the identifier
    pub name: String,
}

impl Identifier {
    /// Creates an identifier from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A JavaScript statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// Variable declaration (var)
    VariableDeclaration(VariableDeclaration),
    /// Expression statement
    Expression(ExpressionStatement),
    /// Block statement { ... }
    Block(BlockStatement),
    /// If statement
    If(IfStatement),
    /// Switch statement
    Switch(SwitchStatement),
    /// While statement
    While(WhileStatement),
    /// Do-while statement
    DoWhile(DoWhileStatement),
    /// For statement
    For(ForStatement),
    /// For-in statement
    ForIn(ForInStatement),
    /// Return statement
    Return(ReturnStatement),
    /// Break statement (with optional label)
    Break(BranchStatement),
    /// Continue statement (with optional label)
    Continue(BranchStatement),
    /// Throw statement
    Throw(ThrowStatement),
    /// Try statement
    Try(TryStatement),
    /// With statement
    With(WithStatement),
    /// Labeled statement
    Labeled(LabeledStatement),
    /// Empty statement (;)
    Empty,
}

impl Statement {
    /// Short human-readable name of the statement kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Statement::VariableDeclaration(_) => "var",
            Statement::Expression(_) => "expression",
            Statement::Block(_) => "block",
            Statement::If(_) => "if",
            Statement::Switch(_) => "switch",
            Statement::While(_) => "while",
            Statement::DoWhile(_) => "do-while",
            Statement::For(_) => "for",
            Statement::ForIn(_) => "for-in",
            Statement::Return(_) => "return",
            Statement::Break(_) => "break",
            Statement::Continue(_) => "continue",
            Statement::Throw(_) => "throw",
            Statement::Try(_) => "try",
            Statement::With(_) => "with",
            Statement::Labeled(_) => "labeled",
            Statement::Empty => "empty",
        }
    }
}

/// Variable declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    /// The declarators
    pub declarations: Vec<VariableDeclarator>,
}

/// A single variable declarator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclarator {
    /// The variable name
    pub id: Identifier,
    /// The initializer
    pub init: Option<Expression>,
}

/// Expression statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpressionStatement {
    /// The expression
    pub expression: Expression,
}

/// Block statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlockStatement {
    /// The statements in the block
    pub body: Vec<StatementRef>,
}

/// If statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStatement {
    /// The test condition
    pub test: Expression,
    /// The consequent
    pub consequent: StatementRef,
    /// The alternate (else)
    pub alternate: Option<StatementRef>,
}

/// Switch statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchStatement {
    /// The discriminant
    pub discriminant: Expression,
    /// The cases, in source order
    pub cases: Vec<SwitchCase>,
}

/// Switch case.
///
/// Consecutive labels with no statements of their own (`case 1: case 2: x;`)
/// are represented by clauses with an empty `consequent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    /// The test (None for default)
    pub test: Option<Expression>,
    /// The consequent statements
    pub consequent: Vec<StatementRef>,
}

/// While statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStatement {
    /// The test condition
    pub test: Expression,
    /// The body
    pub body: StatementRef,
}

/// Do-while statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoWhileStatement {
    /// The body
    pub body: StatementRef,
    /// The test condition
    pub test: Expression,
}

/// For statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStatement {
    /// The initializer
    pub init: Option<ForInit>,
    /// The test condition
    pub test: Option<Expression>,
    /// The update expression
    pub update: Option<Expression>,
    /// The body
    pub body: StatementRef,
}

/// For loop initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForInit {
    /// Variable declaration
    Declaration(VariableDeclaration),
    /// Expression
    Expression(Expression),
}

/// For-in statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForInStatement {
    /// The left side (variable or expression)
    pub left: ForInLeft,
    /// The object being iterated
    pub right: Expression,
    /// The body
    pub body: StatementRef,
}

/// Left side of for-in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ForInLeft {
    /// `for (var x in ...)`, optionally with an initializer
    Declaration(VariableDeclarator),
    /// `for (expr in ...)`
    Expression(Expression),
}

/// Return statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStatement {
    /// The return value
    pub argument: Option<Expression>,
}

/// Break or continue statement.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BranchStatement {
    /// Target label, if any
    pub label: Option<Identifier>,
}

/// Throw statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrowStatement {
    /// The thrown value
    pub argument: Expression,
}

/// Try statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryStatement {
    /// The protected body
    pub block: StatementRef,
    /// The catch clause
    pub handler: Option<CatchClause>,
    /// The finally body
    pub finalizer: Option<StatementRef>,
}

/// Catch clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchClause {
    /// The name bound to the caught value
    pub param: Identifier,
    /// The body
    pub body: StatementRef,
}

/// With statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithStatement {
    /// The object
    pub object: Expression,
    /// The body
    pub body: StatementRef,
}

/// Labeled statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledStatement {
    /// The label
    pub label: Identifier,
    /// The body
    pub body: StatementRef,
}

/// A JavaScript expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Literal value
    Literal(Literal),
    /// Identifier reference
    Identifier(Identifier),
    /// this
    This,
    /// Array literal [...]
    Array(ArrayExpression),
    /// Object literal {...}
    Object(ObjectExpression),
    /// Function expression
    Function(FunctionRef),
    /// Unary operation
    Unary(UnaryExpression),
    /// Update expression (++, --)
    Update(UpdateExpression),
    /// Binary operation
    Binary(BinaryExpression),
    /// Assignment
    Assignment(AssignmentExpression),
    /// Conditional (ternary)
    Conditional(ConditionalExpression),
    /// Function call
    Call(CallExpression),
    /// new expression
    New(NewExpression),
    /// Member access
    Member(MemberExpression),
    /// Sequence (comma)
    Sequence(SequenceExpression),
}

impl Expression {
    /// Views this expression as an assignable reference, if it is one.
    ///
    /// Only identifiers and member accesses denote storage locations.
    pub fn as_reference(&self) -> Option<Reference<'_>> {
        match self {
            Expression::Identifier(id) => Some(Reference::Identifier(id)),
            Expression::Member(member) => Some(Reference::Member(member)),
            _ => None,
        }
    }
}

/// An expression that denotes a storage location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reference<'a> {
    /// A plain name
    Identifier(&'a Identifier),
    /// A property of an object
    Member(&'a MemberExpression),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Integer literal that fits in 32 bits
    Integer(i32),
    /// Any other numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// null
    Null,
    /// Regular expression literal
    RegExp {
        /// The pattern source
        pattern: String,
        /// The flags, e.g. "gi"
        flags: String,
    },
}

/// Array literal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayExpression {
    /// The elements, `None` for holes
    pub elements: Vec<Option<Expression>>,
}

/// Object literal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectExpression {
    /// The properties
    pub properties: Vec<Property>,
}

/// Object property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// The key
    pub key: PropertyKey,
    /// The value
    pub value: Expression,
}

/// Property key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyKey {
    /// Bare identifier key
    Identifier(Identifier),
    /// String literal key
    String(String),
    /// Integer literal key
    Integer(i32),
    /// Other numeric literal key
    Number(f64),
}

/// Function expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionExpression {
    /// Optional name
    pub id: Option<Identifier>,
    /// Parameters
    pub params: Vec<Identifier>,
    /// Body statements
    pub body: Vec<StatementRef>,
}

/// Unary expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpression {
    /// The operator
    pub operator: UnaryOperator,
    /// The argument
    pub argument: Box<Expression>,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// -
    Minus,
    /// +
    Plus,
    /// !
    LogicalNot,
    /// ~
    BitwiseNot,
    /// typeof
    Typeof,
    /// void
    Void,
    /// delete
    Delete,
}

/// Update expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateExpression {
    /// The operator
    pub operator: UpdateOperator,
    /// Whether prefix (++x) or postfix (x++)
    pub prefix: bool,
    /// The argument
    pub argument: Box<Expression>,
}

/// Update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOperator {
    /// ++
    Increment,
    /// --
    Decrement,
}

/// Binary expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpression {
    /// The operator
    pub operator: BinaryOperator,
    /// Left operand
    pub left: Box<Expression>,
    /// Right operand
    pub right: Box<Expression>,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    // Arithmetic
    /// +
    Add,
    /// -
    Subtract,
    /// *
    Multiply,
    /// /
    Divide,
    /// %
    Modulo,

    // Comparison
    /// ==
    Equal,
    /// !=
    NotEqual,
    /// ===
    StrictEqual,
    /// !==
    StrictNotEqual,
    /// <
    LessThan,
    /// <=
    LessThanEqual,
    /// >
    GreaterThan,
    /// >=
    GreaterThanEqual,

    // Bitwise
    /// &
    BitwiseAnd,
    /// |
    BitwiseOr,
    /// ^
    BitwiseXor,
    /// <<
    LeftShift,
    /// >>
    RightShift,
    /// >>>
    UnsignedRightShift,

    // Logical
    /// &&
    LogicalAnd,
    /// ||
    LogicalOr,

    // Other
    /// in
    In,
    /// instanceof
    Instanceof,
}

/// Assignment expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentExpression {
    /// The operator
    pub operator: AssignmentOperator,
    /// Left side (target)
    pub left: Box<Expression>,
    /// Right side (value)
    pub right: Box<Expression>,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentOperator {
    /// =
    Assign,
    /// +=
    AddAssign,
    /// -=
    SubtractAssign,
    /// *=
    MultiplyAssign,
    /// /=
    DivideAssign,
    /// %=
    ModuloAssign,
    /// <<=
    LeftShiftAssign,
    /// >>=
    RightShiftAssign,
    /// >>>=
    UnsignedRightShiftAssign,
    /// &=
    BitwiseAndAssign,
    /// |=
    BitwiseOrAssign,
    /// ^=
    BitwiseXorAssign,
}

impl AssignmentOperator {
    /// The binary operator a compound assignment applies, `None` for plain `=`.
    pub fn binary(self) -> Option<BinaryOperator> {
        match self {
            AssignmentOperator::Assign => None,
            AssignmentOperator::AddAssign => Some(BinaryOperator::Add),
            AssignmentOperator::SubtractAssign => Some(BinaryOperator::Subtract),
            AssignmentOperator::MultiplyAssign => Some(BinaryOperator::Multiply),
            AssignmentOperator::DivideAssign => Some(BinaryOperator::Divide),
            AssignmentOperator::ModuloAssign => Some(BinaryOperator::Modulo),
            AssignmentOperator::LeftShiftAssign => Some(BinaryOperator::LeftShift),
            AssignmentOperator::RightShiftAssign => Some(BinaryOperator::RightShift),
            AssignmentOperator::UnsignedRightShiftAssign => {
                Some(BinaryOperator::UnsignedRightShift)
            }
            AssignmentOperator::BitwiseAndAssign => Some(BinaryOperator::BitwiseAnd),
            AssignmentOperator::BitwiseOrAssign => Some(BinaryOperator::BitwiseOr),
            AssignmentOperator::BitwiseXorAssign => Some(BinaryOperator::BitwiseXor),
        }
    }
}

/// Conditional (ternary) expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalExpression {
    /// The test
    pub test: Box<Expression>,
    /// The consequent
    pub consequent: Box<Expression>,
    /// The alternate
    pub alternate: Box<Expression>,
}

/// Function call expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpression {
    /// The callee
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Expression>,
}

/// new expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpression {
    /// The constructor
    pub callee: Box<Expression>,
    /// The arguments
    pub arguments: Vec<Expression>,
}

/// Member expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpression {
    /// The object
    pub object: Box<Expression>,
    /// The property
    pub property: MemberProperty,
}

/// Member property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberProperty {
    /// Dotted access: `obj.name`
    Identifier(Identifier),
    /// Computed access: `obj[expr]`
    Expression(Box<Expression>),
}

/// Sequence expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceExpression {
    /// The expressions
    pub expressions: Vec<Expression>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_views() {
        let id = Expression::Identifier(Identifier::new("x"));
        assert!(matches!(id.as_reference(), Some(Reference::Identifier(_))));

        let this = Expression::This;
        assert!(this.as_reference().is_none());
    }

    #[test]
    fn test_compound_assignment_operator() {
        assert_eq!(AssignmentOperator::Assign.binary(), None);
        assert_eq!(
            AssignmentOperator::UnsignedRightShiftAssign.binary(),
            Some(BinaryOperator::UnsignedRightShift)
        );
    }

    #[test]
    fn test_program_json_roundtrip() {
        let program = Program {
            body: vec![Rc::new(Statement::Expression(ExpressionStatement {
                expression: Expression::Literal(Literal::Integer(1)),
            }))],
        };
        let json = serde_json::to_string(&program).unwrap();
        let parsed: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, program);
    }
}
