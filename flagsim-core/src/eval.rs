//! Expression evaluation for scene files
//!
//! Expressions are folded to concrete values before the simulation is built;
//! nothing is re-evaluated per frame.

use crate::ast::{BinaryOp, Expr, FuncName, LetDecl, VecExpr};
use crate::diagnostics::Diagnostic;
use glam::Vec3;
use std::collections::HashMap;
use thiserror::Error;

/// Values of let-bindings after evaluation
#[derive(Debug, Default)]
pub struct EvalContext<'a> {
    pub values: HashMap<&'a str, f32>,
}

impl<'a> EvalContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }
}

#[derive(Debug, Clone, Error)]
pub enum EvalError {
    #[error("unknown variable '{0}'")]
    UnknownVar(String),
    #[error("division by zero")]
    DivByZero,
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("'{name}' evaluates to non-finite value {value}")]
    NonFinite { name: String, value: f32 },
}

/// Evaluate all let-bindings in order; later bindings may use earlier ones.
/// Bindings that fail are reported and left undefined.
pub fn evaluate_lets(lets: &[LetDecl]) -> (EvalContext<'_>, Vec<Diagnostic>) {
    let mut ctx = EvalContext::new();
    let mut diagnostics = Vec::new();

    for let_decl in lets {
        match eval_expr(&let_decl.expr, &ctx) {
            Ok(value) if value.is_finite() => {
                ctx.values.insert(&let_decl.name, value);
            }
            Ok(value) => diagnostics.push(Diagnostic::error(
                format!("let binding '{}' evaluates to {}", let_decl.name, value),
                let_decl.span,
            )),
            Err(e) => diagnostics.push(Diagnostic::error(
                format!("error evaluating let binding '{}': {}", let_decl.name, e),
                let_decl.span,
            )),
        }
    }

    (ctx, diagnostics)
}

/// Evaluate an expression to a f32 value
pub fn eval_expr(expr: &Expr, ctx: &EvalContext<'_>) -> Result<f32, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(*v),

        Expr::Var(name) => ctx
            .lookup(name)
            .ok_or_else(|| EvalError::UnknownVar(name.clone())),

        Expr::UnaryMinus(e) => Ok(-eval_expr(e, ctx)?),

        Expr::Binary { op, left, right } => {
            let left_val = eval_expr(left, ctx)?;
            let right_val = eval_expr(right, ctx)?;

            match op {
                BinaryOp::Add => Ok(left_val + right_val),
                BinaryOp::Sub => Ok(left_val - right_val),
                BinaryOp::Mul => Ok(left_val * right_val),
                BinaryOp::Div => {
                    if right_val == 0.0 {
                        return Err(EvalError::DivByZero);
                    }
                    Ok(left_val / right_val)
                }
            }
        }

        Expr::Call { func, args } => {
            let args = args
                .iter()
                .map(|arg| eval_expr(arg, ctx))
                .collect::<Result<Vec<f32>, EvalError>>()?;
            call_builtin(*func, &args)
        }
    }
}

fn expect_args(name: &str, args: &[f32], n: usize) -> Result<(), EvalError> {
    if args.len() != n {
        return Err(EvalError::InvalidArgs(format!(
            "{} expects {} argument(s), got {}",
            name,
            n,
            args.len()
        )));
    }
    Ok(())
}

fn call_builtin(func: FuncName, args: &[f32]) -> Result<f32, EvalError> {
    match func {
        FuncName::Sin => {
            expect_args("sin", args, 1)?;
            Ok(args[0].sin())
        }
        FuncName::Cos => {
            expect_args("cos", args, 1)?;
            Ok(args[0].cos())
        }
        FuncName::Sqrt => {
            expect_args("sqrt", args, 1)?;
            if args[0] < 0.0 {
                return Err(EvalError::InvalidArgs(format!(
                    "sqrt of negative number: {}",
                    args[0]
                )));
            }
            Ok(args[0].sqrt())
        }
        FuncName::Clamp => {
            expect_args("clamp", args, 3)?;
            // Allow min > max, just clamp in given order
            Ok(args[0].max(args[1]).min(args[2]))
        }
    }
}

/// Evaluate and require a finite result; `name` labels the error
pub fn eval_finite(expr: &Expr, ctx: &EvalContext<'_>, name: &str) -> Result<f32, EvalError> {
    let value = eval_expr(expr, ctx)?;
    if !value.is_finite() {
        return Err(EvalError::NonFinite {
            name: name.to_string(),
            value,
        });
    }
    Ok(value)
}

pub fn eval_vec3(v: &VecExpr, ctx: &EvalContext<'_>, name: &str) -> Result<Vec3, EvalError> {
    Ok(Vec3::new(
        eval_finite(&v.x, ctx, name)?,
        eval_finite(&v.y, ctx, name)?,
        eval_finite(&v.z, ctx, name)?,
    ))
}
