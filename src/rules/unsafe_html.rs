//! Flags HTML APIs that accept markup or URLs without sanitization.
//!
//! Unresolved receivers count as unsafe: if the type cannot be proven to be
//! outside the unsafe set, the use is reported.

use crate::context::LintContext;
use crate::diagnostic::{DiagnosticKind, Severity};
use crate::rule::{Rule, RuleCategory, RuleDescriptor, RuleError, RuleResult};
use crate::syntax::{NodeData, NodeKind, NodeRef};
use crate::types::{ResolvedType, TypeQuery};

/// Library that declares the HTML classes
pub const HTML_LIBRARY: &str = "dart:html";

pub const UNSAFE_ATTRIBUTE: DiagnosticKind = DiagnosticKind::new(
    "unsafe_html_attribute",
    "Assigning to the attribute '{0}' is unsafe.",
    Severity::Warning,
)
.with_correction("Try finding a different way to implement the page.");

pub const UNSAFE_CONSTRUCTOR: DiagnosticKind = DiagnosticKind::new(
    "unsafe_html_constructor",
    "Invoking the constructor '{1}.{0}' is unsafe.",
    Severity::Warning,
)
.with_correction("Try finding a different way to implement the page.");

pub const UNSAFE_METHOD: DiagnosticKind = DiagnosticKind::new(
    "unsafe_html_method",
    "Invoking the method '{1}.{0}' is unsafe.",
    Severity::Warning,
)
.with_correction("Try finding a different way to implement the page.");

pub const DESCRIPTOR: RuleDescriptor = RuleDescriptor::new(
    "unsafe_html",
    "Avoid unsafe HTML APIs.",
    &[&UNSAFE_ATTRIBUTE, &UNSAFE_CONSTRUCTOR, &UNSAFE_METHOD],
)
.with_category(RuleCategory::Suspicious)
.with_details(
    "Assigning to `href`, `src` or `srcdoc` on the elements that load them, \
     constructing a `DocumentFragment` or `Element` from markup, and calling \
     `createFragment`, `setInnerHtml` or `Window.open` bypass the browser's \
     sanitization and can lead to cross-site scripting.",
);

/// Classes on which assigning each attribute is unsafe
fn unsafe_attribute_classes(attribute: &str) -> Option<&'static [&'static str]> {
    match attribute {
        "href" => Some(&["AnchorElement"]),
        "src" => Some(&[
            "EmbedElement",
            "IFrameElement",
            "ImageElement",
            "ScriptElement",
        ]),
        "srcdoc" => Some(&["IFrameElement"]),
        _ => None,
    }
}

/// Class on which calling each method is unsafe
fn unsafe_method_class(method: &str) -> Option<&'static str> {
    match method {
        "createFragment" | "setInnerHtml" => Some("Element"),
        "open" => Some("Window"),
        _ => None,
    }
}

pub fn rule() -> Rule {
    Rule::new(DESCRIPTOR)
        .on(NodeKind::AssignmentExpression, check_assignment)
        .on(NodeKind::InstanceCreationExpression, check_construction)
        .on(NodeKind::MethodInvocation, check_method_invocation)
}

/// Unsafe unless the type is known and outside every class in `classes`
fn is_unsafe_receiver(
    types: &TypeQuery<'_>,
    ty: Option<&ResolvedType>,
    classes: &[&str],
) -> bool {
    classes
        .iter()
        .any(|class| types.classify_extends(ty, class, HTML_LIBRARY).unknown_as(true))
}

/// Assigned property name and the type declaring it.
///
/// Returns `None` when the target is not a class member (a local variable,
/// an index expression), and `Some((name, None))` when the member's owner
/// could not be resolved.
fn assigned_member<'t>(
    types: &TypeQuery<'_>,
    target: NodeRef<'t>,
) -> Option<(&'t str, Option<ResolvedType>)> {
    match target.data() {
        NodeData::SimpleIdentifier { name, element } => match element {
            None => Some((name.as_str(), None)),
            Some(element) => {
                let owner = types.element_enclosing_type(element)?;
                Some((name.as_str(), Some(owner)))
            }
        },
        NodeData::PrefixedIdentifier { prefix, identifier } => {
            let name = target.child(*identifier).identifier_name()?;
            let owner = types.static_type_of(target.child(*prefix)).cloned();
            Some((name, owner))
        }
        NodeData::PropertyAccess { property, .. } => {
            let name = target.child(*property).identifier_name()?;
            let owner = types
                .real_target(target)
                .and_then(|receiver| types.static_type_of(receiver))
                .cloned();
            Some((name, owner))
        }
        _ => None,
    }
}

fn check_assignment(ctx: &mut LintContext<'_>, node: NodeRef<'_>) -> RuleResult {
    let NodeData::AssignmentExpression { left, .. } = node.data() else {
        return Err(RuleError::UnexpectedNode {
            expected: "assignment",
            found: node.kind(),
        });
    };

    let types = ctx.types();
    let Some((attribute, owner)) = assigned_member(types, node.child(*left)) else {
        return Ok(());
    };
    let Some(classes) = unsafe_attribute_classes(attribute) else {
        return Ok(());
    };

    if is_unsafe_receiver(types, owner.as_ref(), classes) {
        ctx.report(node, &UNSAFE_ATTRIBUTE, &[attribute]);
    }
    Ok(())
}

fn check_construction(ctx: &mut LintContext<'_>, node: NodeRef<'_>) -> RuleResult {
    let NodeData::InstanceCreationExpression {
        type_name,
        constructor_name,
        ..
    } = node.data()
    else {
        return Err(RuleError::UnexpectedNode {
            expected: "instance creation",
            found: node.kind(),
        });
    };
    if constructor_name.as_deref() != Some("html") {
        return Ok(());
    }

    let types = ctx.types();
    let constructed = types.static_type_of(node);
    let class = if types.is_dynamic_or_unresolved(constructed) {
        type_name.as_str()
    } else if types.extends_class(constructed, "DocumentFragment", HTML_LIBRARY) {
        "DocumentFragment"
    } else if types.extends_class(constructed, "Element", HTML_LIBRARY) {
        "Element"
    } else {
        return Ok(());
    };

    ctx.report(node, &UNSAFE_CONSTRUCTOR, &["html", class]);
    Ok(())
}

fn check_method_invocation(ctx: &mut LintContext<'_>, node: NodeRef<'_>) -> RuleResult {
    let NodeData::MethodInvocation { method_name, .. } = node.data() else {
        return Err(RuleError::UnexpectedNode {
            expected: "method invocation",
            found: node.kind(),
        });
    };
    let Some(class) = unsafe_method_class(method_name) else {
        return Ok(());
    };

    let types = ctx.types();
    let receiver = match types.real_target(node) {
        Some(target) => types.static_type_of(target).cloned(),
        None => {
            // Implicit `this`; a bare call outside any class is a function call.
            if !node
                .ancestors()
                .any(|a| a.kind() == NodeKind::ClassDeclaration)
            {
                return Ok(());
            }
            types.enclosing_class_type(node)
        }
    };

    if is_unsafe_receiver(types, receiver.as_ref(), &[class]) {
        ctx.report(node, &UNSAFE_METHOD, &[method_name.as_str(), class]);
    }
    Ok(())
}
