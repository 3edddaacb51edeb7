//! Runtime errors travel as values through the evaluator, not as panics.
//!
//! `&&`, `||` and `?:` decide case by case whether to absorb them; every
//! other operator propagates the left-most error. A terminal error value is
//! surfaced as the failure outcome of the evaluation.

use std::{error::Error, fmt::Display};

use crate::ast::ExprId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Parse,
    TypeCheck,
    UnknownIdent,
    OverloadNotFound,
    AttributeNotFound,
    InvalidArgument,
    BadFormat,
    NumericOverflow,
    DivideByZero,
    NoSuchKey,
    NoSuchField,
    IterationBudgetExceeded,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Parse => "PARSE",
            ErrorKind::TypeCheck => "TYPE_CHECK",
            ErrorKind::UnknownIdent => "UNKNOWN_IDENT",
            ErrorKind::OverloadNotFound => "OVERLOAD_NOT_FOUND",
            ErrorKind::AttributeNotFound => "ATTRIBUTE_NOT_FOUND",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::BadFormat => "BAD_FORMAT",
            ErrorKind::NumericOverflow => "NUMERIC_OVERFLOW",
            ErrorKind::DivideByZero => "DIVIDE_BY_ZERO",
            ErrorKind::NoSuchKey => "NO_SUCH_KEY",
            ErrorKind::NoSuchField => "NO_SUCH_FIELD",
            ErrorKind::IterationBudgetExceeded => "ITERATION_BUDGET_EXCEEDED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EvalError {
    pub kind: ErrorKind,
    pub message: String,
    /// Id of the node responsible for the failure; 0 until attributed.
    pub expr_id: ExprId,
}

impl EvalError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> EvalError {
        EvalError {
            kind,
            message: message.into(),
            expr_id: 0,
        }
    }

    /// Attribute the error to a node unless it already carries one.
    pub fn at(mut self, expr_id: ExprId) -> EvalError {
        if self.expr_id == 0 {
            self.expr_id = expr_id;
        }
        self
    }

    pub fn numeric_overflow() -> EvalError {
        EvalError::new(ErrorKind::NumericOverflow, "numeric overflow")
    }

    pub fn divide_by_zero() -> EvalError {
        EvalError::new(ErrorKind::DivideByZero, "divide by zero")
    }

    pub fn modulus_by_zero() -> EvalError {
        EvalError::new(ErrorKind::DivideByZero, "modulus by zero")
    }

    pub fn no_such_key(key: impl Display) -> EvalError {
        EvalError::new(ErrorKind::NoSuchKey, format!("no such key: {key}"))
    }

    pub fn no_such_field(field: &str) -> EvalError {
        EvalError::new(ErrorKind::NoSuchField, format!("no such field: {field}"))
    }

    pub fn unknown_ident(name: &str) -> EvalError {
        EvalError::new(
            ErrorKind::UnknownIdent,
            format!("undeclared reference to '{name}'"),
        )
    }

    pub fn overload_not_found(function: &str) -> EvalError {
        EvalError::new(
            ErrorKind::OverloadNotFound,
            format!("found no matching overload for '{function}'"),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> EvalError {
        EvalError::new(ErrorKind::InvalidArgument, message)
    }

    pub fn bad_format(message: impl Into<String>) -> EvalError {
        EvalError::new(ErrorKind::BadFormat, message)
    }

    pub fn iteration_budget() -> EvalError {
        EvalError::new(
            ErrorKind::IterationBudgetExceeded,
            "comprehension iteration budget exceeded",
        )
    }
}

impl Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl Error for EvalError {}

pub type EvalResult<T> = Result<T, EvalError>;
