//! The code generation context.

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{FunctionValue, PointerValue};

use crate::ast::VarBinding;
use crate::error::CompileError;
use crate::tree::NodeId;
use crate::types::TypeResolver;

/// Per-function emission state.
///
/// `locals` is the storage side table: variable-definition node identity to
/// allocated stack slot. A definition must appear here before any `var`
/// expression reads it; the emitters enforce that ordering.
pub struct CodegenContext<'ctx, 'a> {
    pub context: &'ctx Context,
    pub builder: &'a Builder<'ctx>,
    pub resolver: &'a mut TypeResolver<'ctx>,
    /// The function being compiled.
    pub function: FunctionValue<'ctx>,
    /// The function's entry block. All allocas go here.
    pub entry: BasicBlock<'ctx>,
    /// Storage slots, keyed by variable-definition node identity.
    pub locals: HashMap<NodeId, PointerValue<'ctx>>,
}

impl<'ctx, 'a> CodegenContext<'ctx, 'a> {
    pub fn new(
        context: &'ctx Context,
        builder: &'a Builder<'ctx>,
        resolver: &'a mut TypeResolver<'ctx>,
        function: FunctionValue<'ctx>,
        entry: BasicBlock<'ctx>,
    ) -> Self {
        CodegenContext {
            context,
            builder,
            resolver,
            function,
            entry,
            locals: HashMap::new(),
        }
    }

    /// Allocate a stack slot at the top of the entry block.
    ///
    /// Slots must sit ahead of every other instruction to stay eligible for
    /// promotion to registers by the mem2reg pass, so this uses a throwaway
    /// builder positioned at the block start rather than the main builder.
    pub fn entry_block_alloca(
        &self,
        name: &str,
        ty: BasicTypeEnum<'ctx>,
    ) -> Result<PointerValue<'ctx>, CompileError> {
        let alloca_builder = self.context.create_builder();
        match self.entry.get_first_instruction() {
            Some(first) => alloca_builder.position_before(&first),
            None => alloca_builder.position_at_end(self.entry),
        }
        Ok(alloca_builder.build_alloca(ty, name)?)
    }

    /// Allocate a slot for `binding` and record it in the storage table.
    pub fn materialize(&mut self, binding: &VarBinding) -> Result<PointerValue<'ctx>, CompileError> {
        let resolved = self.resolver.resolve(&binding.ty)?;
        let ty = resolved.basic().ok_or_else(|| {
            CompileError::type_error(binding.ty.node, "binding type is not a value type")
        })?;
        let slot = self.entry_block_alloca(&binding.name, ty)?;
        self.locals.insert(binding.node, slot);
        Ok(slot)
    }

    /// Spill each incoming argument into its parameter's slot, in order.
    pub fn bind_parameters(&mut self, params: &[VarBinding]) -> Result<(), CompileError> {
        for (index, param) in params.iter().enumerate() {
            let slot = self.materialize(param)?;
            let arg = self.function.get_nth_param(index as u32).ok_or_else(|| {
                CompileError::Backend(format!(
                    "function `{}` has no argument {index}",
                    param.name
                ))
            })?;
            self.builder.build_store(slot, arg)?;
        }
        Ok(())
    }
}
