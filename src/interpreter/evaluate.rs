use crate::ast::{Expression, Value};
use crate::error::InterpretError;

// This macro generates a match arm for a binary operation.
macro_rules! eval_op {
    ($self:ident, $l:ident, $r:ident, $op_str:expr, $op_fn:expr, number) => {
        $self.eval_binary($l, $r, $op_str, $op_fn)
    };
    ($self:ident, $l:ident, $r:ident, $op_str:expr, $op_fn:expr, bool) => {
        $self.eval_comparison($l, $r, $op_str, $op_fn)
    };
}

/// Evaluates an expression, resolving variables through `lookup`.
pub fn evaluate(
    expression: &Expression,
    lookup: &dyn Fn(&str) -> Option<Value>,
) -> Result<Value, InterpretError> {
    ExpressionEngine { lookup }.evaluate(expression)
}

struct ExpressionEngine<'a> {
    lookup: &'a dyn Fn(&str) -> Option<Value>,
}

impl ExpressionEngine<'_> {
    fn evaluate(&self, expr: &Expression) -> Result<Value, InterpretError> {
        match expr {
            Expression::Sum(l, r) => eval_op!(self, l, r, "+", |a, b| a + b, number),
            Expression::Subtract(l, r) => eval_op!(self, l, r, "-", |a, b| a - b, number),
            Expression::Multiply(l, r) => eval_op!(self, l, r, "*", |a, b| a * b, number),
            Expression::Divide(l, r) => eval_op!(self, l, r, "/", |a, b| a / b, number),
            Expression::Negate(v) => match self.evaluate(v)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                other => Err(type_mismatch("-", "Number", other)),
            },

            Expression::GreaterThan(l, r) => eval_op!(self, l, r, ">", |a, b| a > b, bool),
            Expression::SmallerThan(l, r) => eval_op!(self, l, r, "<", |a, b| a < b, bool),
            Expression::GreaterThanOrEqual(l, r) => eval_op!(self, l, r, ">=", |a, b| a >= b, bool),
            Expression::SmallerThanOrEqual(l, r) => eval_op!(self, l, r, "<=", |a, b| a <= b, bool),
            Expression::Equal(l, r) => Ok(Value::Bool(self.evaluate(l)? == self.evaluate(r)?)),
            Expression::NotEqual(l, r) => Ok(Value::Bool(self.evaluate(l)? != self.evaluate(r)?)),

            // Short-circuiting, as in the emitted code.
            Expression::And(l, r) => match self.evaluate(l)? {
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => self.expect_bool("&&", r),
                other => Err(type_mismatch("&&", "Bool", other)),
            },
            Expression::Or(l, r) => match self.evaluate(l)? {
                Value::Bool(true) => Ok(Value::Bool(true)),
                Value::Bool(false) => self.expect_bool("||", r),
                other => Err(type_mismatch("||", "Bool", other)),
            },
            Expression::Not(v) => match self.evaluate(v)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(type_mismatch("!", "Bool", other)),
            },

            Expression::Literal(value) => Ok(*value),
            Expression::Variable(name) => {
                (self.lookup)(name).ok_or_else(|| InterpretError::UnboundVariable(name.clone()))
            }
        }
    }

    fn expect_bool(&self, op: &str, expr: &Expression) -> Result<Value, InterpretError> {
        match self.evaluate(expr)? {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(type_mismatch(op, "Bool", other)),
        }
    }

    fn eval_binary<F>(
        &self,
        l: &Expression,
        r: &Expression,
        op: &'static str,
        f: F,
    ) -> Result<Value, InterpretError>
    where
        F: Fn(f64, f64) -> f64,
    {
        match (self.evaluate(l)?, self.evaluate(r)?) {
            (Value::Number(lv), Value::Number(rv)) => Ok(Value::Number(f(lv, rv))),
            (Value::Number(_), other) | (other, _) => Err(type_mismatch(op, "Number", other)),
        }
    }

    fn eval_comparison<F>(
        &self,
        l: &Expression,
        r: &Expression,
        op: &'static str,
        f: F,
    ) -> Result<Value, InterpretError>
    where
        F: Fn(f64, f64) -> bool,
    {
        match (self.evaluate(l)?, self.evaluate(r)?) {
            (Value::Number(lv), Value::Number(rv)) => Ok(Value::Bool(f(lv, rv))),
            (Value::Number(_), other) | (other, _) => Err(type_mismatch(op, "Number", other)),
        }
    }
}

fn type_mismatch(op: &str, expected: &str, found: Value) -> InterpretError {
    InterpretError::TypeMismatch {
        operation: op.to_string(),
        expected: expected.to_string(),
        found,
    }
}
