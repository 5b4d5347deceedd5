use super::Value;
use std::collections::BTreeSet;
use std::fmt;

/// The expression tree shared by transition guards and opaque action bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    // Arithmetic
    Sum(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Negate(Box<Expression>),

    // Logical
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),

    // Comparison
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    SmallerThan(Box<Expression>, Box<Expression>),
    SmallerThanOrEqual(Box<Expression>, Box<Expression>),

    // Leaf nodes
    Literal(Value),
    Variable(String),
}

/// A single `name = expression;` statement of an opaque action body.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: String,
    pub value: Expression,
}

impl Expression {
    /// Collects every variable the expression reads.
    pub fn collect_variables(&self, variables: &mut BTreeSet<String>) {
        match self {
            Expression::Variable(name) => {
                variables.insert(name.clone());
            }
            Expression::Sum(l, r)
            | Expression::Subtract(l, r)
            | Expression::Multiply(l, r)
            | Expression::Divide(l, r)
            | Expression::And(l, r)
            | Expression::Or(l, r)
            | Expression::Equal(l, r)
            | Expression::NotEqual(l, r)
            | Expression::GreaterThan(l, r)
            | Expression::GreaterThanOrEqual(l, r)
            | Expression::SmallerThan(l, r)
            | Expression::SmallerThanOrEqual(l, r) => {
                l.collect_variables(variables);
                r.collect_variables(variables);
            }
            Expression::Negate(v) | Expression::Not(v) => v.collect_variables(variables),
            Expression::Literal(_) => {}
        }
    }

    /// Rewrites every variable name, leaving the tree shape untouched.
    pub fn map_variables(self, f: &dyn Fn(&str) -> String) -> Expression {
        let map = |e: Box<Expression>| Box::new(e.map_variables(f));
        match self {
            Expression::Variable(name) => Expression::Variable(f(&name)),
            Expression::Literal(v) => Expression::Literal(v),
            Expression::Negate(v) => Expression::Negate(map(v)),
            Expression::Not(v) => Expression::Not(map(v)),
            Expression::Sum(l, r) => Expression::Sum(map(l), map(r)),
            Expression::Subtract(l, r) => Expression::Subtract(map(l), map(r)),
            Expression::Multiply(l, r) => Expression::Multiply(map(l), map(r)),
            Expression::Divide(l, r) => Expression::Divide(map(l), map(r)),
            Expression::And(l, r) => Expression::And(map(l), map(r)),
            Expression::Or(l, r) => Expression::Or(map(l), map(r)),
            Expression::Equal(l, r) => Expression::Equal(map(l), map(r)),
            Expression::NotEqual(l, r) => Expression::NotEqual(map(l), map(r)),
            Expression::GreaterThan(l, r) => Expression::GreaterThan(map(l), map(r)),
            Expression::GreaterThanOrEqual(l, r) => Expression::GreaterThanOrEqual(map(l), map(r)),
            Expression::SmallerThan(l, r) => Expression::SmallerThan(map(l), map(r)),
            Expression::SmallerThanOrEqual(l, r) => Expression::SmallerThanOrEqual(map(l), map(r)),
        }
    }

    /// Whether the expression yields a boolean at its root.
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            Expression::Not(_)
                | Expression::And(..)
                | Expression::Or(..)
                | Expression::Equal(..)
                | Expression::NotEqual(..)
                | Expression::GreaterThan(..)
                | Expression::GreaterThanOrEqual(..)
                | Expression::SmallerThan(..)
                | Expression::SmallerThanOrEqual(..)
                | Expression::Literal(Value::Bool(_))
        )
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::Or(..) => 1,
            Expression::And(..) => 2,
            Expression::Equal(..) | Expression::NotEqual(..) => 4,
            Expression::GreaterThan(..)
            | Expression::GreaterThanOrEqual(..)
            | Expression::SmallerThan(..)
            | Expression::SmallerThanOrEqual(..) => 5,
            Expression::Sum(..) | Expression::Subtract(..) => 6,
            Expression::Multiply(..) | Expression::Divide(..) => 7,
            Expression::Negate(_) | Expression::Not(_) => 8,
            Expression::Literal(_) | Expression::Variable(_) => 9,
        }
    }

    /// Renders the expression in C-family infix syntax, adding parentheses only where
    /// precedence requires them. `variable` maps each variable name to its target spelling.
    pub fn render(&self, variable: &dyn Fn(&str) -> String) -> String {
        self.render_recursive(variable, 0, false)
    }

    fn render_recursive(
        &self,
        variable: &dyn Fn(&str) -> String,
        parent_precedence: u8,
        right_operand: bool,
    ) -> String {
        let current = self.precedence();
        // Right operands of left-associative operators need parens at equal precedence.
        let needs_parens =
            current < parent_precedence || (right_operand && current == parent_precedence);

        let body = match self {
            Expression::Literal(Value::Number(n)) => format_number(*n),
            Expression::Literal(Value::Bool(b)) => b.to_string(),
            Expression::Variable(name) => variable(name),
            Expression::Negate(v) => format!("-{}", v.render_recursive(variable, current, false)),
            Expression::Not(v) => format!("!{}", v.render_recursive(variable, current, false)),
            Expression::Sum(l, r) => self.render_binary(variable, l, "+", r),
            Expression::Subtract(l, r) => self.render_binary(variable, l, "-", r),
            Expression::Multiply(l, r) => self.render_binary(variable, l, "*", r),
            Expression::Divide(l, r) => self.render_binary(variable, l, "/", r),
            Expression::And(l, r) => self.render_binary(variable, l, "&&", r),
            Expression::Or(l, r) => self.render_binary(variable, l, "||", r),
            Expression::Equal(l, r) => self.render_binary(variable, l, "==", r),
            Expression::NotEqual(l, r) => self.render_binary(variable, l, "!=", r),
            Expression::GreaterThan(l, r) => self.render_binary(variable, l, ">", r),
            Expression::GreaterThanOrEqual(l, r) => self.render_binary(variable, l, ">=", r),
            Expression::SmallerThan(l, r) => self.render_binary(variable, l, "<", r),
            Expression::SmallerThanOrEqual(l, r) => self.render_binary(variable, l, "<=", r),
        };

        if needs_parens {
            format!("({})", body)
        } else {
            body
        }
    }

    fn render_binary(
        &self,
        variable: &dyn Fn(&str) -> String,
        l: &Expression,
        op: &str,
        r: &Expression,
    ) -> String {
        let precedence = self.precedence();
        format!(
            "{} {} {}",
            l.render_recursive(variable, precedence, false),
            op,
            r.render_recursive(variable, precedence, true)
        )
    }
}

/// Formats a floating-point literal so that it always reads as a double in the target.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{:.1}", n)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(&|name| name.to_string()))
    }
}
