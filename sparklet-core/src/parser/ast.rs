use std::fmt;
use std::rc::Rc;

// ============================================================================
// Program and Statement AST
// ============================================================================

/// A program is a sequence of statements (an action or helper body)
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    pub fn new() -> Self {
        Program {
            statements: Vec::new(),
        }
    }

    pub fn push(&mut self, stmt: Statement) {
        self.statements.push(stmt);
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// If the program is a single function expression (e.g. an author wrote
    /// `(state, params) => {...}` instead of a bare body), return it.
    pub fn as_function(&self) -> Option<Rc<FunctionDef>> {
        match self.statements.as_slice() {
            [Statement::Expression(Expression::Function(def))] => Some(Rc::clone(def)),
            [Statement::Function(def)] => Some(Rc::clone(def)),
            _ => None,
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

/// `let`, `const` or `var`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
}

impl DeclarationKind {
    pub fn is_mutable(self) -> bool {
        !matches!(self, DeclarationKind::Const)
    }
}

/// Binding target of a declaration, parameter or loop variable
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `x`
    Identifier(String),
    /// `{ a, b: renamed, c = 1 }`
    Object(Vec<ObjectPatternProperty>),
    /// `[first, , third]`
    Array(Vec<Option<Binding>>),
}

/// One property of an object destructuring pattern
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPatternProperty {
    pub key: String,
    pub binding: Binding,
}

/// A pattern with an optional default value
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub pattern: Pattern,
    pub default: Option<Expression>,
}

impl Binding {
    pub fn identifier(name: impl Into<String>) -> Self {
        Binding {
            pattern: Pattern::Identifier(name.into()),
            default: None,
        }
    }
}

/// A function literal (arrow function, function expression or declaration)
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<Binding>,
    pub body: FunctionBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// `x => x + 1`
    Expression(Box<Expression>),
    /// `x => { return x + 1 }`
    Block(Vec<Statement>),
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `const a = 1, b = 2`
    Declaration {
        kind: DeclarationKind,
        declarations: Vec<(Pattern, Option<Expression>)>,
    },

    /// `function name(a, b) { ... }`
    Function(Rc<FunctionDef>),

    /// Expression statement
    Expression(Expression),

    /// `if (test) consequent else alternate`
    If {
        test: Expression,
        consequent: Box<Statement>,
        alternate: Option<Box<Statement>>,
    },

    /// `while (test) body`
    While { test: Expression, body: Box<Statement> },

    /// `for (init; test; update) body`
    For {
        init: Option<Box<Statement>>,
        test: Option<Expression>,
        update: Option<Expression>,
        body: Box<Statement>,
    },

    /// `for (const item of items) body`
    ForOf {
        kind: DeclarationKind,
        pattern: Pattern,
        iterable: Expression,
        body: Box<Statement>,
    },

    /// `for (const key in object) body`
    ForIn {
        kind: DeclarationKind,
        pattern: Pattern,
        object: Expression,
        body: Box<Statement>,
    },

    Return(Option<Expression>),
    Break,
    Continue,

    /// `{ statements }`
    Block(Vec<Statement>),

    /// A lone `;`
    Empty,
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
    Typeof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Power,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

/// Element of an array literal or argument list
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayItem {
    Item(Expression),
    Spread(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyKey {
    Static(String),
    Computed(Expression),
}

/// Entry of an object literal
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectProperty {
    KeyValue(PropertyKey, Expression),
    Spread(Expression),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    Literal(String),
    Expression(Expression),
}

/// Represents different types of expressions in the Sparklet script language
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
    Undefined,

    /// `` `text ${expr}` ``
    Template(Vec<TemplatePart>),

    /// Variable reference
    Identifier(String),

    /// `[a, ...rest]`
    Array(Vec<ArrayItem>),

    /// `{ a: 1, [key]: 2, ...other }`
    Object(Vec<ObjectProperty>),

    /// `object.property` / `object?.property`
    Member {
        object: Box<Expression>,
        property: String,
        optional: bool,
    },

    /// `object[index]` / `object?.[index]`
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
        optional: bool,
    },

    /// `callee(args)` / `callee?.(args)`
    Call {
        callee: Box<Expression>,
        args: Vec<ArrayItem>,
        optional: bool,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },

    /// `++x`, `x--`
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expression>,
    },

    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// Short-circuiting `&&`, `||`, `??`
    Logical {
        op: LogicalOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },

    /// `test ? consequent : alternate`
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },

    /// `target = value`, `target += value`, ...
    Assign {
        op: AssignOp,
        target: Box<Expression>,
        value: Box<Expression>,
    },

    /// Arrow function or function expression
    Function(Rc<FunctionDef>),
}

impl Expression {
    /// Helper constructor for binary expressions
    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Helper constructor for logical expressions
    pub fn logical(op: LogicalOp, left: Expression, right: Expression) -> Self {
        Expression::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Helper constructor for member access
    pub fn member(object: Expression, property: impl Into<String>, optional: bool) -> Self {
        Expression::Member {
            object: Box::new(object),
            property: property.into(),
            optional,
        }
    }

    /// Whether this expression can be assigned to
    pub fn is_place(&self) -> bool {
        match self {
            Expression::Identifier(_) => true,
            Expression::Member {
                object, optional, ..
            }
            | Expression::Index {
                object, optional, ..
            } => !optional && object.is_place(),
            _ => false,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Power => "**",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::StrictEqual => "===",
            BinaryOp::StrictNotEqual => "!==",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::In => "in",
        };
        write!(f, "{}", symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_place() {
        let ident = Expression::Identifier("board".to_string());
        assert!(ident.is_place());

        let member = Expression::member(ident.clone(), "length", false);
        assert!(member.is_place());

        let optional = Expression::member(ident, "length", true);
        assert!(!optional.is_place());

        assert!(!Expression::Number(1.0).is_place());
    }

    #[test]
    fn test_program_as_function() {
        let def = Rc::new(FunctionDef {
            name: None,
            params: vec![Binding::identifier("state")],
            body: FunctionBody::Block(vec![]),
        });
        let mut program = Program::new();
        program.push(Statement::Expression(Expression::Function(Rc::clone(&def))));

        assert_eq!(program.as_function(), Some(def));
        assert!(Program::new().as_function().is_none());
    }
}
