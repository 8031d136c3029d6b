//! The expression emitter.

use inkwell::values::BasicValueEnum;

use crate::ast::{BinOp, Expr, ExprKind};
use crate::error::CompileError;

use super::context::CodegenContext;

impl<'ctx, 'a> CodegenContext<'ctx, 'a> {
    /// Lower a value-producing expression to an IR value.
    ///
    /// `var` yields the binding's storage slot (an address); `ltor` is the
    /// node that turns an address into its current value.
    pub fn emit_expr(&mut self, expr: &Expr) -> Result<BasicValueEnum<'ctx>, CompileError> {
        match &expr.kind {
            ExprKind::Var { definition } => match self.locals.get(definition) {
                Some(slot) => Ok((*slot).into()),
                // Storage must be materialized before any read; a miss here
                // is an ordering defect in the producer, not bad input data.
                None => Err(CompileError::UnboundVariable { node: expr.node }),
            },
            ExprKind::Load { place } => {
                let address = self.emit_expr(place)?;
                match address {
                    BasicValueEnum::PointerValue(ptr) => {
                        Ok(self.builder.build_load(ptr, "load")?)
                    }
                    _ => Err(CompileError::type_error(
                        expr.node,
                        "operand of a load is not addressable",
                    )),
                }
            }
            ExprKind::BinOp { ty, op, lhs, rhs } => {
                let resolved = self.resolver.resolve(ty)?;
                match op {
                    BinOp::Add => {
                        if !resolved.is_float() {
                            return Err(CompileError::unsupported(
                                expr.node,
                                "operator `+` on a non-floating-point type",
                            ));
                        }
                        // Operands are emitted strictly left to right.
                        let lhs = self.emit_expr(lhs)?;
                        let rhs = self.emit_expr(rhs)?;
                        match (lhs, rhs) {
                            (
                                BasicValueEnum::FloatValue(lhs),
                                BasicValueEnum::FloatValue(rhs),
                            ) => Ok(self.builder.build_float_add(lhs, rhs, "add")?.into()),
                            _ => Err(CompileError::type_error(
                                expr.node,
                                "operands of `+` are not floating-point values",
                            )),
                        }
                    }
                }
            }
        }
    }
}
