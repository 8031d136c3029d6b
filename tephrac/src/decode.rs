//! Decode the dynamic host tree into the closed AST.
//!
//! This runs once per compilation, before any IR is emitted. Unknown
//! discriminators, arity mismatches, and shape defects are all rejected
//! here, carrying the offending node's identity - so the emitters downstream
//! only ever see well-formed, exhaustively matchable input.

use crate::ast::{
    BinOp, BuiltinKind, Expr, ExprKind, FuncDef, Stmt, StmtKind, TypeDesc, TypeDescKind,
    VarBinding,
};
use crate::error::CompileError;
use crate::tree::{NodeId, Tree};

/// Decode a function-definition record:
/// `{name, typedtree: {type, parameters, body}}`.
pub fn function(tree: &Tree, def: NodeId) -> Result<FuncDef, CompileError> {
    let name = tree.str_field(def, "name")?.to_string();
    let typedtree = tree.node_field(def, "typedtree")?;

    let ty = type_desc(tree, tree.node_field(typedtree, "type")?)?;

    let param_list = tree.node_field(typedtree, "parameters")?;
    let mut params = Vec::with_capacity(tree.size(param_list));
    for index in 0..tree.size(param_list) {
        params.push(binding(tree, tree.node_elem(param_list, index)?)?);
    }

    let body = stmt(tree, tree.node_field(typedtree, "body")?)?;

    Ok(FuncDef {
        node: def,
        name,
        ty,
        params,
        body,
    })
}

/// Decode a type descriptor. Unrecognized discriminators at either level are
/// type errors, per the descriptor contract.
pub fn type_desc(tree: &Tree, node: NodeId) -> Result<TypeDesc, CompileError> {
    let kind = match tree.str_field(node, "kind")? {
        "builtin" => {
            let subkind = match tree.str_field(node, "type")? {
                "float" => BuiltinKind::Float,
                "integer" => BuiltinKind::Integer,
                "logical" => BuiltinKind::Logical,
                other => {
                    return Err(CompileError::type_error(
                        node,
                        format!("unknown builtin type `{other}`"),
                    ))
                }
            };
            let bytes = tree.int_field(node, "bytes")?;
            let bytes = u32::try_from(bytes).map_err(|_| {
                CompileError::type_error(node, format!("byte width {bytes} is out of range"))
            })?;
            // Signedness is only declared for integers.
            let signed = match subkind {
                BuiltinKind::Integer => tree.bool_field(node, "signed")?,
                BuiltinKind::Float | BuiltinKind::Logical => false,
            };
            TypeDescKind::Builtin {
                bytes,
                subkind,
                signed,
            }
        }
        "pointer" => TypeDescKind::Pointer {
            base: Box::new(type_desc(tree, tree.node_field(node, "type")?)?),
        },
        "functype" => TypeDescKind::FuncType {
            params: desc_list(tree, tree.node_field(node, "parameters")?)?,
            returns: desc_list(tree, tree.node_field(node, "returns")?)?,
        },
        other => {
            return Err(CompileError::type_error(
                node,
                format!("unknown type descriptor kind `{other}`"),
            ))
        }
    };
    Ok(TypeDesc { node, kind })
}

fn desc_list(tree: &Tree, list: NodeId) -> Result<Vec<TypeDesc>, CompileError> {
    let mut descs = Vec::with_capacity(tree.size(list));
    for index in 0..tree.size(list) {
        descs.push(type_desc(tree, tree.node_elem(list, index)?)?);
    }
    Ok(descs)
}

fn binding(tree: &Tree, node: NodeId) -> Result<VarBinding, CompileError> {
    Ok(VarBinding {
        node,
        name: tree.str_field(node, "name")?.to_string(),
        ty: type_desc(tree, tree.node_field(node, "type")?)?,
    })
}

/// Decode a statement node.
pub fn stmt(tree: &Tree, node: NodeId) -> Result<Stmt, CompileError> {
    let kind = match tree.str_field(node, "kind")? {
        "block" => {
            let list = tree.node_field(node, "statements")?;
            let mut stmts = Vec::with_capacity(tree.size(list));
            for index in 0..tree.size(list) {
                stmts.push(stmt(tree, tree.node_elem(list, index)?)?);
            }
            StmtKind::Block { stmts }
        }
        "defvar" => {
            let var_list = tree.node_field(node, "variables")?;
            let mut vars = Vec::with_capacity(tree.size(var_list));
            for index in 0..tree.size(var_list) {
                vars.push(binding(tree, tree.node_elem(var_list, index)?)?);
            }

            let init_list = tree.node_field(node, "initializers")?;
            let mut inits = Vec::with_capacity(tree.size(init_list));
            for index in 0..tree.size(init_list) {
                inits.push(expr(tree, tree.node_elem(init_list, index)?)?);
            }

            if vars.len() != inits.len() {
                return Err(CompileError::arity(
                    node,
                    format!(
                        "defvar declares {} variables but has {} initializers",
                        vars.len(),
                        inits.len()
                    ),
                ));
            }
            StmtKind::DefVar { vars, inits }
        }
        "return" => {
            let list = tree.node_field(node, "expressions")?;
            match tree.size(list) {
                0 => StmtKind::Return { value: None },
                1 => StmtKind::Return {
                    value: Some(expr(tree, tree.node_elem(list, 0)?)?),
                },
                n => {
                    return Err(CompileError::arity(
                        node,
                        format!("{n} return values are not supported"),
                    ))
                }
            }
        }
        other => {
            return Err(CompileError::unsupported(
                node,
                format!("statement kind `{other}`"),
            ))
        }
    };
    Ok(Stmt { node, kind })
}

/// Decode an expression node.
pub fn expr(tree: &Tree, node: NodeId) -> Result<Expr, CompileError> {
    let kind = match tree.str_field(node, "kind")? {
        "var" => ExprKind::Var {
            definition: tree.node_field(node, "definition")?,
        },
        "ltor" => ExprKind::Load {
            place: Box::new(expr(tree, tree.node_field(node, "expression")?)?),
        },
        "operator" => {
            let op = match tree.str_field(node, "operator")? {
                "+" => BinOp::Add,
                other => {
                    return Err(CompileError::unsupported(
                        node,
                        format!("operator `{other}`"),
                    ))
                }
            };
            // Operators carry their result type; the emitter needs it to
            // pick the operation shape.
            let ty = type_desc(tree, tree.node_field(node, "type")?)?;

            let operands = tree.node_field(node, "operands")?;
            let count = tree.size(operands);
            if count != 2 {
                return Err(CompileError::arity(
                    node,
                    format!("operator `+` expects 2 operands, found {count}"),
                ));
            }
            ExprKind::BinOp {
                ty,
                op,
                lhs: Box::new(expr(tree, tree.node_elem(operands, 0)?)?),
                rhs: Box::new(expr(tree, tree.node_elem(operands, 1)?)?),
            }
        }
        other => {
            return Err(CompileError::unsupported(
                node,
                format!("expression kind `{other}`"),
            ))
        }
    };
    Ok(Expr { node, kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Value;

    fn float_desc(tree: &mut Tree, bytes: i64) -> NodeId {
        let n = tree.add_node();
        tree.set_field(n, "kind", "builtin");
        tree.set_field(n, "type", "float");
        tree.set_field(n, "bytes", bytes);
        n
    }

    #[test]
    fn decodes_builtin_and_pointer() {
        let mut tree = Tree::new();
        let f32_node = float_desc(&mut tree, 4);
        let ptr = tree.add_node();
        tree.set_field(ptr, "kind", "pointer");
        tree.set_field(ptr, "type", f32_node);

        let desc = type_desc(&tree, ptr).unwrap();
        assert_eq!(desc.node, ptr);
        match desc.kind {
            TypeDescKind::Pointer { base } => {
                assert_eq!(base.node, f32_node);
                assert!(matches!(
                    base.kind,
                    TypeDescKind::Builtin {
                        bytes: 4,
                        subkind: BuiltinKind::Float,
                        signed: false,
                    }
                ));
            }
            other => panic!("expected pointer, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_discriminator_is_a_type_error() {
        let mut tree = Tree::new();
        let n = tree.add_node();
        tree.set_field(n, "kind", "union");
        assert!(matches!(
            type_desc(&tree, n),
            Err(CompileError::Type { node, .. }) if node == n
        ));
    }

    #[test]
    fn unknown_statement_kind_is_unsupported() {
        let mut tree = Tree::new();
        let n = tree.add_node();
        tree.set_field(n, "kind", "while");
        assert!(matches!(
            stmt(&tree, n),
            Err(CompileError::Unsupported { node, .. }) if node == n
        ));
    }

    #[test]
    fn unknown_operator_is_unsupported() {
        let mut tree = Tree::new();
        let n = tree.add_node();
        tree.set_field(n, "kind", "operator");
        tree.set_field(n, "operator", "*");
        assert!(matches!(
            expr(&tree, n),
            Err(CompileError::Unsupported { node, .. }) if node == n
        ));
    }

    #[test]
    fn operator_operand_count_is_checked() {
        let mut tree = Tree::new();
        let f32_node = float_desc(&mut tree, 4);

        let var_def = tree.add_node();
        let var = tree.add_node();
        tree.set_field(var, "kind", "var");
        tree.set_field(var, "definition", var_def);

        let operands = tree.add_node();
        tree.push(operands, var);

        let op = tree.add_node();
        tree.set_field(op, "kind", "operator");
        tree.set_field(op, "operator", "+");
        tree.set_field(op, "type", f32_node);
        tree.set_field(op, "operands", operands);

        assert!(matches!(
            expr(&tree, op),
            Err(CompileError::Arity { node, .. }) if node == op
        ));
    }

    #[test]
    fn defvar_count_mismatch_is_an_arity_error() {
        let mut tree = Tree::new();
        let f32_node = float_desc(&mut tree, 4);

        let v = tree.add_node();
        tree.set_field(v, "name", "x");
        tree.set_field(v, "type", f32_node);
        let vars = tree.add_node();
        tree.push(vars, v);

        let inits = tree.add_node();

        let defvar = tree.add_node();
        tree.set_field(defvar, "kind", "defvar");
        tree.set_field(defvar, "variables", vars);
        tree.set_field(defvar, "initializers", inits);

        assert!(matches!(
            stmt(&tree, defvar),
            Err(CompileError::Arity { node, .. }) if node == defvar
        ));
    }

    #[test]
    fn multiple_returns_are_an_arity_error() {
        let mut tree = Tree::new();
        let def = tree.add_node();
        let mk_var = |tree: &mut Tree| {
            let n = tree.add_node();
            tree.set_field(n, "kind", "var");
            tree.set_field(n, "definition", def);
            n
        };
        let a = mk_var(&mut tree);
        let b = mk_var(&mut tree);

        let exprs = tree.add_node();
        tree.push(exprs, a);
        tree.push(exprs, b);

        let ret = tree.add_node();
        tree.set_field(ret, "kind", "return");
        tree.set_field(ret, "expressions", exprs);

        assert!(matches!(
            stmt(&tree, ret),
            Err(CompileError::Arity { node, .. }) if node == ret
        ));
    }

    #[test]
    fn missing_discriminator_is_malformed() {
        let mut tree = Tree::new();
        let n = tree.add_node();
        tree.set_field(n, "statements", Value::Int(0));
        assert!(matches!(
            stmt(&tree, n),
            Err(CompileError::MissingField { field: "kind", .. })
        ));
    }
}
