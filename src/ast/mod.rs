pub mod expression;
pub mod parser;
pub mod value;

pub use expression::*;
pub use parser::{parse_expression, parse_statements};
pub use value::*;
