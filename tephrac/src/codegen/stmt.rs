//! The statement emitter.

use crate::ast::{Stmt, StmtKind};
use crate::error::CompileError;

use super::context::CodegenContext;

impl<'ctx, 'a> CodegenContext<'ctx, 'a> {
    /// Lower a statement subtree into the current block.
    pub fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Block { stmts } => {
                for stmt in stmts {
                    self.emit_stmt(stmt)?;
                }
                Ok(())
            }
            StmtKind::DefVar { vars, inits } => {
                // Evaluate-then-bind: every initializer is computed before
                // any variable's storage exists, so an initializer can never
                // observe a sibling's not-yet-created slot.
                let mut values = Vec::with_capacity(inits.len());
                for init in inits {
                    values.push(self.emit_expr(init)?);
                }
                for (var, value) in vars.iter().zip(values) {
                    let slot = self.materialize(var)?;
                    self.builder.build_store(slot, value)?;
                }
                Ok(())
            }
            StmtKind::Return { value: None } => {
                self.builder.build_return(None)?;
                Ok(())
            }
            StmtKind::Return { value: Some(expr) } => {
                let value = self.emit_expr(expr)?;
                self.builder.build_return(Some(&value))?;
                Ok(())
            }
        }
    }
}
