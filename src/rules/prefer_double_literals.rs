//! Prefer double literals where the context expects a `double`.
//!
//! Only fires when the expected type is resolved: unresolved or dynamic
//! contexts never produce a finding.

use crate::context::LintContext;
use crate::diagnostic::{DiagnosticKind, Severity};
use crate::rule::{Rule, RuleDescriptor, RuleError, RuleResult};
use crate::syntax::{int_lexeme_magnitude, NodeData, NodeKind, NodeRef};
use crate::types::{Builtin, ResolvedType, TypeQuery};

pub const PREFER_DOUBLE_LITERALS: DiagnosticKind = DiagnosticKind::new(
    "prefer_double_literals",
    "Use a double literal rather than an int literal.",
    Severity::Info,
)
.with_correction("Try adding '.0' to the literal.");

pub const DESCRIPTOR: RuleDescriptor = RuleDescriptor::new(
    "prefer_double_literals",
    "Prefer double literals where a double is expected.",
    &[&PREFER_DOUBLE_LITERALS],
)
.with_details(
    "An integer literal passed, returned, stored or listed where the static \
     context is exactly `double` reads better written as a double literal.",
);

pub fn rule() -> Rule {
    Rule::new(DESCRIPTOR).on(NodeKind::IntegerLiteral, check_integer_literal)
}

/// `true` if `magnitude` converts to `f64` and back without loss
fn is_exact_double(magnitude: u64) -> bool {
    (magnitude as f64) as u128 == magnitude as u128
}

fn check_integer_literal(ctx: &mut LintContext<'_>, node: NodeRef<'_>) -> RuleResult {
    let NodeData::IntegerLiteral { lexeme, value } = node.data() else {
        return Err(RuleError::UnexpectedNode {
            expected: "integer literal",
            found: node.kind(),
        });
    };

    // Out of the integer range: the resolver already reports it.
    let Some(value) = value else {
        return Ok(());
    };
    // Hex literals above i64::MAX arrive wrapped; check the written value.
    let magnitude = int_lexeme_magnitude(lexeme).unwrap_or_else(|| value.unsigned_abs());
    if !is_exact_double(magnitude) {
        return Ok(());
    }

    let types = ctx.types();
    let (expression, negated) = match node.parent().map(|p| (p, p.data())) {
        Some((parent, NodeData::PrefixExpression { operator, .. })) => {
            if operator != "-" {
                return Ok(());
            }
            (parent, true)
        }
        _ => (node, false),
    };

    let Some(expected) = contextual_type(types, expression) else {
        return Ok(());
    };
    let wants_double = types.classify_exactly(Some(expected), Builtin::Double);
    let reportable = if negated {
        wants_double.unknown_as(false) || types.is_exactly(Some(expected), Builtin::Int)
    } else {
        wants_double.unknown_as(false)
    };

    if reportable {
        ctx.report(node, &PREFER_DOUBLE_LITERALS, &[]);
    }
    Ok(())
}

/// Type the surrounding syntax expects `expression` to have
fn contextual_type<'t>(types: &TypeQuery<'_>, expression: NodeRef<'t>) -> Option<&'t ResolvedType> {
    let parent = expression.parent()?;
    match parent.data() {
        NodeData::ArgumentList { .. } | NodeData::NamedExpression { .. } => {
            types.parameter_type_at_call_site(expression)
        }
        NodeData::ListLiteral { type_arguments, .. } => match type_arguments.as_slice() {
            [element] => Some(element),
            _ => None,
        },
        NodeData::VariableDeclaration {
            declared_type,
            initializer: Some(initializer),
            ..
        } if *initializer == expression.id() => declared_type.as_ref(),
        NodeData::ReturnStatement { .. } => enclosing_return_type(parent),
        NodeData::ExpressionFunctionBody { .. } => enclosing_return_type(parent),
        _ => None,
    }
}

/// Declared return type of the function or method containing `node`.
///
/// Closures have no declared return type here, so `None`.
fn enclosing_return_type<'t>(node: NodeRef<'t>) -> Option<&'t ResolvedType> {
    node.ancestors().find_map(|ancestor| match ancestor.data() {
        NodeData::FunctionDeclaration { return_type, .. }
        | NodeData::MethodDeclaration { return_type, .. } => Some(return_type.as_ref()),
        NodeData::FunctionExpression { .. } => Some(None),
        _ => None,
    })?
}
