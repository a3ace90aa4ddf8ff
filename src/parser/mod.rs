// Derived-column expression parsing for aesthetic mappings

pub mod expr;

pub use expr::{parse_expr, Expr};
