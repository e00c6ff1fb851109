// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Terse constructors for building ASTs by hand.
//!
//! Used by tests, benchmarks and embedders that synthesize code without a
//! parser.

use std::rc::Rc;

use super::*;

/// `name`
pub fn ident(name: &str) -> Expression {
    Expression::Identifier(Identifier::new(name))
}

/// Integer literal.
pub fn int(value: i32) -> Expression {
    Expression::Literal(Literal::Integer(value))
}

/// Floating point literal.
pub fn num(value: f64) -> Expression {
    Expression::Literal(Literal::Number(value))
}

/// String literal.
pub fn string(value: &str) -> Expression {
    Expression::Literal(Literal::String(value.to_string()))
}

/// Boolean literal.
pub fn boolean(value: bool) -> Expression {
    Expression::Literal(Literal::Boolean(value))
}

/// `null`
pub fn null() -> Expression {
    Expression::Literal(Literal::Null)
}

/// `/pattern/flags`
pub fn regexp(pattern: &str, flags: &str) -> Expression {
    Expression::Literal(Literal::RegExp {
        pattern: pattern.to_string(),
        flags: flags.to_string(),
    })
}

/// `object.name`
pub fn member(object: Expression, name: &str) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Identifier(Identifier::new(name)),
    })
}

/// `object[key]`
pub fn index(object: Expression, key: Expression) -> Expression {
    Expression::Member(MemberExpression {
        object: Box::new(object),
        property: MemberProperty::Expression(Box::new(key)),
    })
}

/// `callee(arguments...)`
pub fn call(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::Call(CallExpression {
        callee: Box::new(callee),
        arguments,
    })
}

/// `new callee(arguments...)`
pub fn new(callee: Expression, arguments: Vec<Expression>) -> Expression {
    Expression::New(NewExpression {
        callee: Box::new(callee),
        arguments,
    })
}

/// `left op right`
pub fn binary(operator: BinaryOperator, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// `op argument`
pub fn unary(operator: UnaryOperator, argument: Expression) -> Expression {
    Expression::Unary(UnaryExpression {
        operator,
        argument: Box::new(argument),
    })
}

/// `++argument`, `argument--` and friends.
pub fn update(operator: UpdateOperator, prefix: bool, argument: Expression) -> Expression {
    Expression::Update(UpdateExpression {
        operator,
        prefix,
        argument: Box::new(argument),
    })
}

/// `left = right`
pub fn assign(left: Expression, right: Expression) -> Expression {
    compound_assign(AssignmentOperator::Assign, left, right)
}

/// `left op= right`
pub fn compound_assign(
    operator: AssignmentOperator,
    left: Expression,
    right: Expression,
) -> Expression {
    Expression::Assignment(AssignmentExpression {
        operator,
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// `test ? consequent : alternate`
pub fn conditional(test: Expression, consequent: Expression, alternate: Expression) -> Expression {
    Expression::Conditional(ConditionalExpression {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    })
}

/// `a, b, c`
pub fn sequence(expressions: Vec<Expression>) -> Expression {
    Expression::Sequence(SequenceExpression { expressions })
}

/// `[elements...]`, `None` for holes.
pub fn array(elements: Vec<Option<Expression>>) -> Expression {
    Expression::Array(ArrayExpression { elements })
}

/// `{key: value, ...}`
pub fn object(properties: Vec<(PropertyKey, Expression)>) -> Expression {
    Expression::Object(ObjectExpression {
        properties: properties
            .into_iter()
            .map(|(key, value)| Property { key, value })
            .collect(),
    })
}

/// `function name(params) { body }`
pub fn function(name: Option<&str>, params: &[&str], body: Vec<StatementRef>) -> Expression {
    Expression::Function(Rc::new(FunctionExpression {
        id: name.map(Identifier::new),
        params: params.iter().copied().map(Identifier::new).collect(),
        body,
    }))
}

/// `expression;`
pub fn expr_stmt(expression: Expression) -> StatementRef {
    Rc::new(Statement::Expression(ExpressionStatement { expression }))
}

/// `{ body }`
pub fn block(body: Vec<StatementRef>) -> StatementRef {
    Rc::new(Statement::Block(BlockStatement { body }))
}

/// `;`
pub fn empty() -> StatementRef {
    Rc::new(Statement::Empty)
}

/// `var name = init, ...;`
pub fn var(declarations: Vec<(&str, Option<Expression>)>) -> StatementRef {
    Rc::new(Statement::VariableDeclaration(VariableDeclaration {
        declarations: declarations
            .into_iter()
            .map(|(name, init)| VariableDeclarator {
                id: Identifier::new(name),
                init,
            })
            .collect(),
    }))
}

/// `if (test) consequent else alternate`
pub fn if_(test: Expression, consequent: StatementRef, alternate: Option<StatementRef>) -> StatementRef {
    Rc::new(Statement::If(IfStatement {
        test,
        consequent,
        alternate,
    }))
}

/// `while (test) body`
pub fn while_(test: Expression, body: StatementRef) -> StatementRef {
    Rc::new(Statement::While(WhileStatement { test, body }))
}

/// `do body while (test)`
pub fn do_while(body: StatementRef, test: Expression) -> StatementRef {
    Rc::new(Statement::DoWhile(DoWhileStatement { body, test }))
}

/// `for (init; test; update) body`
pub fn for_(
    init: Option<ForInit>,
    test: Option<Expression>,
    update: Option<Expression>,
    body: StatementRef,
) -> StatementRef {
    Rc::new(Statement::For(ForStatement {
        init,
        test,
        update,
        body,
    }))
}

/// `for (left in right) body`
pub fn for_in(left: ForInLeft, right: Expression, body: StatementRef) -> StatementRef {
    Rc::new(Statement::ForIn(ForInStatement { left, right, body }))
}

/// `switch (discriminant) { cases }`
pub fn switch(discriminant: Expression, cases: Vec<SwitchCase>) -> StatementRef {
    Rc::new(Statement::Switch(SwitchStatement {
        discriminant,
        cases,
    }))
}

/// `case test: consequent` or `default: consequent` when `test` is `None`.
pub fn case(test: Option<Expression>, consequent: Vec<StatementRef>) -> SwitchCase {
    SwitchCase { test, consequent }
}

/// `break;` or `break label;`
pub fn break_(label: Option<&str>) -> StatementRef {
    Rc::new(Statement::Break(BranchStatement {
        label: label.map(Identifier::new),
    }))
}

/// `continue;` or `continue label;`
pub fn continue_(label: Option<&str>) -> StatementRef {
    Rc::new(Statement::Continue(BranchStatement {
        label: label.map(Identifier::new),
    }))
}

/// `return argument;`
pub fn return_(argument: Option<Expression>) -> StatementRef {
    Rc::new(Statement::Return(ReturnStatement { argument }))
}

/// `throw argument;`
pub fn throw(argument: Expression) -> StatementRef {
    Rc::new(Statement::Throw(ThrowStatement { argument }))
}

/// `try block catch (param) body finally finalizer`
pub fn try_(
    block: StatementRef,
    handler: Option<(&str, StatementRef)>,
    finalizer: Option<StatementRef>,
) -> StatementRef {
    Rc::new(Statement::Try(TryStatement {
        block,
        handler: handler.map(|(param, body)| CatchClause {
            param: Identifier::new(param),
            body,
        }),
        finalizer,
    }))
}

/// `with (object) body`
pub fn with(object: Expression, body: StatementRef) -> StatementRef {
    Rc::new(Statement::With(WithStatement { object, body }))
}

/// `label: body`
pub fn labeled(label: &str, body: StatementRef) -> StatementRef {
    Rc::new(Statement::Labeled(LabeledStatement {
        label: Identifier::new(label),
        body,
    }))
}

/// A program made of `body`.
pub fn program(body: Vec<StatementRef>) -> Program {
    Program { body }
}
