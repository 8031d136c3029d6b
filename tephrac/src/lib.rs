//! # Tephra JIT backend
//!
//! Tephra programs are written inside a dynamically-typed host runtime. The
//! host's front-end parses and type-checks a function and hands this crate an
//! already-typed tree; the backend lowers it to LLVM IR, optimizes it, and
//! hands back a directly callable native entry pointer.
//!
//! # Architecture
//!
//! ```text
//! host tree -> decode -> typed AST -> CodegenContext -> LLVM IR -> native code
//!                 |            |
//!            Tree accessor  TypeResolver (memoized)
//! ```
//!
//! The pieces:
//!
//! - [`tree`] - arena for the host-owned, dynamically shaped tree, plus the
//!   anchor table that roots nodes for the duration of a compilation request.
//! - [`decode`] - decodes the dynamic tree once into closed sum types
//!   ([`ast`]), rejecting unknown node kinds up front.
//! - [`types`] - resolves type descriptors into backend-representable types,
//!   memoized per descriptor node.
//! - [`codegen`] - recursive statement and expression emitters.
//! - [`jit`] - the [`JitSession`] driver: create function, emit, verify,
//!   optimize, materialize, publish the entry pointer.
//!
//! Compilation is synchronous and single-threaded: one [`JitSession::compile`]
//! call lowers exactly one function to completion. Errors abort only the
//! current compilation; the session stays usable for the next request.
//!
//! # Quick start
//!
//! ```no_run
//! use inkwell::context::Context;
//! use tephrac::{JitSession, SessionConfig, Tree};
//!
//! let context = Context::create();
//! let mut session = JitSession::new(&context, SessionConfig::default())
//!     .expect("backend initialization is fatal");
//!
//! let mut tree = Tree::new();
//! // ... the host front-end fills `tree` with a function definition ...
//! # let def = tree.add_node();
//! match session.compile(&mut tree, def) {
//!     Ok(entry) => println!("compiled to {:#x}", entry.address()),
//!     Err(err) => eprintln!("compilation failed: {err}"),
//! }
//! ```

pub mod ast;
pub mod codegen;
pub mod decode;
pub mod error;
pub mod jit;
pub mod tree;
pub mod types;

pub use codegen::CodegenContext;
pub use error::{BackendError, CompileError};
pub use jit::{EntryPoint, JitSession, OptLevel, SessionConfig};
pub use tree::{AnchorSlot, AnchorTable, NodeId, Tree, Value};
pub use types::{ResolvedType, TypeResolver};
