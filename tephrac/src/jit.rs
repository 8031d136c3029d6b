//! The JIT session and compile driver.
//!
//! A [`JitSession`] owns the backend state for one logical unit of work (a
//! run, a test, a host process): the native target, the materialized code,
//! the memoized type resolver, and the symbol bookkeeping. Constructing one
//! probes the execution engine up front, so an unusable backend fails fatally
//! at session start rather than on the first compile.
//!
//! `compile` drives one function start to finish:
//!
//! 1. anchor the definition for the request's duration,
//! 2. decode the dynamic tree into the closed AST,
//! 3. resolve the definition's function type,
//! 4. create the function (external linkage) and its entry block,
//! 5. spill each parameter into an entry-block stack slot, in order,
//! 6. emit the body,
//! 7. verify, then run the fixed function-pass pipeline,
//! 8. materialize native code and record the entry pointer,
//! 9. publish `fptr` on the definition record,
//! 10. release the anchor and check the table balanced.
//!
//! Every failure between decode and verification discards the partially
//! built function wholesale, so a bad input never leaves the session in a
//! corrupt state.

use std::collections::HashMap;

use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::{Linkage, Module};
use inkwell::passes::PassManager;
use inkwell::targets::{InitializationConfig, Target};
use inkwell::values::{AnyValue, FunctionValue};
use inkwell::OptimizationLevel;
use tracing::debug;

use crate::codegen::CodegenContext;
use crate::decode;
use crate::error::{BackendError, CompileError};
use crate::tree::{NodeId, Tree, Value};
use crate::types::TypeResolver;

/// Code emission aggressiveness for the execution engine.
///
/// The function-pass pipeline run before emission is fixed and is not a
/// tuning surface; this only selects how hard instruction selection tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OptLevel {
    None,
    Less,
    #[default]
    Default,
    Aggressive,
}

impl From<OptLevel> for OptimizationLevel {
    fn from(level: OptLevel) -> Self {
        match level {
            OptLevel::None => OptimizationLevel::None,
            OptLevel::Less => OptimizationLevel::Less,
            OptLevel::Default => OptimizationLevel::Default,
            OptLevel::Aggressive => OptimizationLevel::Aggressive,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub opt_level: OptLevel,
    /// Log each function's IR (before and after optimization) at debug level.
    pub dump_ir: bool,
}

/// A directly callable native entry pointer.
///
/// The caller is responsible for invoking it with the calling convention and
/// argument types of the resolved function signature; no shim is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    addr: usize,
}

impl EntryPoint {
    pub fn address(self) -> usize {
        self.addr
    }
}

/// One compilation session: owns everything the process-lifetime of its
/// compiled code depends on.
pub struct JitSession<'ctx> {
    context: &'ctx Context,
    config: SessionConfig,
    resolver: TypeResolver<'ctx>,
    /// Materialized code lives in these engines; entry pointers stay valid
    /// for as long as the session holds them. One module/engine pair per
    /// compiled function: the engine finalizes a module once, so sharing one
    /// module across compilations would invalidate it for later requests.
    engines: Vec<ExecutionEngine<'ctx>>,
    modules: Vec<Module<'ctx>>,
    /// The session's logical symbol space. Function names are unique for the
    /// session's lifetime; recompiling a name is an error, not a rename.
    symbols: HashMap<String, NodeId>,
    /// Entry pointers, keyed by definition-node identity.
    entry_points: HashMap<NodeId, EntryPoint>,
}

impl<'ctx> JitSession<'ctx> {
    /// Bring up the backend. Failure here is fatal: nothing can be compiled
    /// without a native target and a working execution engine.
    pub fn new(context: &'ctx Context, config: SessionConfig) -> Result<Self, BackendError> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(BackendError::Target)?;

        // Probe engine construction now so an unusable backend surfaces at
        // session start, not on the first compile.
        let probe = context.create_module("session");
        let engine = probe
            .create_jit_execution_engine(config.opt_level.into())
            .map_err(|err| BackendError::Engine(err.to_string()))?;

        Ok(JitSession {
            context,
            config,
            resolver: TypeResolver::new(context),
            engines: vec![engine],
            modules: vec![probe],
            symbols: HashMap::new(),
            entry_points: HashMap::new(),
        })
    }

    /// The entry pointer previously compiled for `def`, if any.
    pub fn entry_point(&self, def: NodeId) -> Option<EntryPoint> {
        self.entry_points.get(&def).copied()
    }

    /// Compile one function definition to native code.
    ///
    /// On success the definition record carries an `fptr` handle and the
    /// entry pointer is returned. On failure the session remains valid and
    /// previously compiled functions are untouched. Either way the anchor
    /// table's occupancy returns to its pre-call size.
    pub fn compile(&mut self, tree: &mut Tree, def: NodeId) -> Result<EntryPoint, CompileError> {
        let before = tree.anchors().occupancy();
        let slot = tree.anchors_mut().anchor(def);
        let result = self.compile_rooted(tree, def);
        tree.anchors_mut().release(slot);
        // A leak here corrupts the host's bookkeeping; it is a defect in the
        // backend and must never pass silently.
        assert_eq!(
            tree.anchors().occupancy(),
            before,
            "anchor table left unbalanced by compilation"
        );
        result
    }

    fn compile_rooted(&mut self, tree: &mut Tree, def: NodeId) -> Result<EntryPoint, CompileError> {
        let func = decode::function(tree, def)?;
        debug!(name = %func.name, node = %def, "compiling function");

        if self.symbols.contains_key(&func.name) {
            return Err(CompileError::DuplicateDefinition {
                name: func.name,
                node: def,
            });
        }

        let resolved = self.resolver.resolve(&func.ty)?;
        let fn_ty = resolved.function().ok_or_else(|| {
            CompileError::type_error(func.ty.node, "definition type is not a function type")
        })?;

        // The module is attached to an engine only after the function passes
        // verification; dropping it on any earlier error is the whole
        // cleanup story.
        let module = self.context.create_module(&func.name);
        let function = module.add_function(&func.name, fn_ty, Some(Linkage::External));
        let builder = self.context.create_builder();
        let entry = self.context.append_basic_block(function, "entry");
        builder.position_at_end(entry);

        let mut codegen =
            CodegenContext::new(self.context, &builder, &mut self.resolver, function, entry);
        codegen.bind_parameters(&func.params)?;
        codegen.emit_stmt(&func.body)?;

        if self.config.dump_ir {
            debug!(name = %func.name, ir = %function.print_to_string(), "generated IR");
        }

        if !function.verify(false) {
            return Err(CompileError::Verification { name: func.name });
        }
        self.run_function_passes(&module, function);

        if self.config.dump_ir {
            debug!(name = %func.name, ir = %function.print_to_string(), "optimized IR");
        }

        let engine = module
            .create_jit_execution_engine(self.config.opt_level.into())
            .map_err(|err| CompileError::Backend(err.to_string()))?;
        let addr = engine
            .get_function_address(&func.name)
            .map_err(|err| CompileError::Backend(err.to_string()))?;
        let entry_point = EntryPoint { addr };
        debug!(name = %func.name, "function materialized at {addr:#x}");

        self.engines.push(engine);
        self.modules.push(module);
        self.entry_points.insert(def, entry_point);
        self.symbols.insert(func.name, def);

        // The output contract: the host reads the pointer off the record it
        // handed us.
        tree.set_field(def, "fptr", Value::Handle(addr));
        Ok(entry_point)
    }

    /// The fixed per-function optimization sequence.
    fn run_function_passes(&self, module: &Module<'ctx>, function: FunctionValue<'ctx>) {
        let fpm: PassManager<FunctionValue> = PassManager::create(module);
        fpm.add_basic_alias_analysis_pass();
        fpm.add_promote_memory_to_register_pass();
        fpm.add_instruction_combining_pass();
        fpm.add_reassociate_pass();
        fpm.add_gvn_pass();
        fpm.add_cfg_simplification_pass();
        fpm.initialize();
        fpm.run_on(&function);
    }
}
