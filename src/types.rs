//! Resolved type model and the type query facade
//!
//! The resolver hands over a class table ([`TypeModel`]) and annotates tree
//! nodes with [`ResolvedType`]s. Rules never walk the hierarchy themselves;
//! they ask a [`TypeQuery`], which answers from the model and never fails:
//! anything it cannot resolve comes back as "unknown" (`None`, `false` or
//! [`Classification::Unknown`]). Each rule decides what unknown means for it.

use crate::syntax::{Element, NodeData, NodeKind, NodeRef};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// Library that declares the built-in types
pub const CORE_LIBRARY: &str = "dart:core";

/// Index of a class in the [`TypeModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u32);

/// Static type as computed by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedType {
    /// Top type; nothing is known statically
    Dynamic,
    Void,
    Interface {
        class: ClassId,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        type_arguments: Vec<ResolvedType>,
    },
}

impl ResolvedType {
    pub fn interface(class: ClassId) -> Self {
        ResolvedType::Interface {
            class,
            type_arguments: Vec::new(),
        }
    }

    pub fn generic(class: ClassId, type_arguments: Vec<ResolvedType>) -> Self {
        ResolvedType::Interface {
            class,
            type_arguments,
        }
    }

    pub fn class(&self) -> Option<ClassId> {
        match self {
            ResolvedType::Interface { class, .. } => Some(*class),
            _ => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ResolvedType::Dynamic)
    }
}

/// Built-in classes from the core library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Object,
    Num,
    Int,
    Double,
    String,
    Bool,
    List,
}

impl Builtin {
    pub const ALL: [Builtin; 7] = [
        Builtin::Object,
        Builtin::Num,
        Builtin::Int,
        Builtin::Double,
        Builtin::String,
        Builtin::Bool,
        Builtin::List,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Object => "Object",
            Builtin::Num => "num",
            Builtin::Int => "int",
            Builtin::Double => "double",
            Builtin::String => "String",
            Builtin::Bool => "bool",
            Builtin::List => "List",
        }
    }
}

/// A class declaration in the resolved model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub library: String,
    #[serde(default)]
    pub supertype: Option<ResolvedType>,
    #[serde(default)]
    pub interfaces: Vec<ResolvedType>,
    #[serde(default)]
    pub mixins: Vec<ResolvedType>,
}

impl ClassDecl {
    pub fn new(name: &str, library: &str) -> Self {
        Self {
            name: name.to_string(),
            library: library.to_string(),
            supertype: None,
            interfaces: Vec::new(),
            mixins: Vec::new(),
        }
    }

    pub fn extends(mut self, supertype: ClassId) -> Self {
        self.supertype = Some(ResolvedType::interface(supertype));
        self
    }

    pub fn implements(mut self, interface: ClassId) -> Self {
        self.interfaces.push(ResolvedType::interface(interface));
        self
    }

    pub fn with_mixin(mut self, mixin: ClassId) -> Self {
        self.mixins.push(ResolvedType::interface(mixin));
        self
    }

    fn direct_supertypes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.supertype
            .iter()
            .chain(&self.mixins)
            .chain(&self.interfaces)
            .filter_map(ResolvedType::class)
    }
}

/// Class table produced by the resolver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ClassDecl>", into = "Vec<ClassDecl>")]
pub struct TypeModel {
    classes: Vec<ClassDecl>,
    index: HashMap<(String, String), ClassId>,
}

impl From<Vec<ClassDecl>> for TypeModel {
    fn from(classes: Vec<ClassDecl>) -> Self {
        let mut model = TypeModel::new();
        for class in classes {
            model.add_class(class);
        }
        model
    }
}

impl From<TypeModel> for Vec<ClassDecl> {
    fn from(model: TypeModel) -> Self {
        model.classes
    }
}

impl TypeModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model pre-populated with the core library classes
    pub fn with_core() -> Self {
        let mut model = Self::new();
        let object = model.add_class(ClassDecl::new("Object", CORE_LIBRARY));
        let num = model.add_class(ClassDecl::new("num", CORE_LIBRARY).extends(object));
        model.add_class(ClassDecl::new("int", CORE_LIBRARY).extends(num));
        model.add_class(ClassDecl::new("double", CORE_LIBRARY).extends(num));
        model.add_class(ClassDecl::new("String", CORE_LIBRARY).extends(object));
        model.add_class(ClassDecl::new("bool", CORE_LIBRARY).extends(object));
        model.add_class(ClassDecl::new("List", CORE_LIBRARY).extends(object));
        model
    }

    /// Add a class. A later class with the same library and name shadows
    /// the earlier one for lookups.
    pub fn add_class(&mut self, class: ClassDecl) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.index
            .insert((class.library.clone(), class.name.clone()), id);
        self.classes.push(class);
        id
    }

    pub fn class(&self, id: ClassId) -> Option<&ClassDecl> {
        self.classes.get(id.0 as usize)
    }

    pub fn lookup(&self, library: &str, name: &str) -> Option<ClassId> {
        self.index
            .get(&(library.to_string(), name.to_string()))
            .copied()
    }

    pub fn builtin(&self, builtin: Builtin) -> Option<ClassId> {
        self.lookup(CORE_LIBRARY, builtin.name())
    }

    /// Interface type of a built-in class, if the model declares it
    pub fn builtin_type(&self, builtin: Builtin) -> Option<ResolvedType> {
        self.builtin(builtin).map(ResolvedType::interface)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Three-valued answer of a classification query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Match,
    NoMatch,
    /// The type could not be resolved
    Unknown,
}

impl Classification {
    pub fn is_match(self) -> bool {
        self == Classification::Match
    }

    /// Collapse to a boolean, treating `Unknown` as `unknown_is_match`
    pub fn unknown_as(self, unknown_is_match: bool) -> bool {
        match self {
            Classification::Match => true,
            Classification::NoMatch => false,
            Classification::Unknown => unknown_is_match,
        }
    }
}

impl From<bool> for Classification {
    fn from(matched: bool) -> Self {
        if matched {
            Classification::Match
        } else {
            Classification::NoMatch
        }
    }
}

/// Read-only queries over a [`TypeModel`] and resolved tree nodes.
///
/// Supertype closures are memoized per instance; create one facade per file.
pub struct TypeQuery<'m> {
    model: &'m TypeModel,
    closures: RefCell<HashMap<ClassId, Rc<HashSet<ClassId>>>>,
}

impl<'m> TypeQuery<'m> {
    pub fn new(model: &'m TypeModel) -> Self {
        Self {
            model,
            closures: RefCell::new(HashMap::new()),
        }
    }

    pub fn model(&self) -> &'m TypeModel {
        self.model
    }

    /// `true` for a missing type or the dynamic type
    pub fn is_dynamic_or_unresolved(&self, ty: Option<&ResolvedType>) -> bool {
        ty.is_none_or(ResolvedType::is_dynamic)
    }

    /// Class and every class it transitively extends, mixes in or implements
    fn supertype_closure(&self, class: ClassId) -> Rc<HashSet<ClassId>> {
        if let Some(cached) = self.closures.borrow().get(&class) {
            return Rc::clone(cached);
        }

        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([class]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(decl) = self.model.class(current) {
                queue.extend(decl.direct_supertypes().filter(|id| !seen.contains(id)));
            }
        }

        let closure = Rc::new(seen);
        self.closures
            .borrow_mut()
            .insert(class, Rc::clone(&closure));
        closure
    }

    /// `true` iff `ty` is, or transitively extends or implements, the class
    /// `class_name` declared in `library`.
    ///
    /// Unresolved and dynamic types are never a match here; callers that want
    /// a different policy check [`Self::is_dynamic_or_unresolved`] first.
    pub fn extends_class(&self, ty: Option<&ResolvedType>, class_name: &str, library: &str) -> bool {
        let Some(class) = ty.and_then(ResolvedType::class) else {
            return false;
        };
        self.supertype_closure(class)
            .iter()
            .filter_map(|id| self.model.class(*id))
            .any(|decl| decl.name == class_name && decl.library == library)
    }

    /// `true` iff `ty` is exactly the given built-in (not a subtype, not dynamic)
    pub fn is_exactly(&self, ty: Option<&ResolvedType>, builtin: Builtin) -> bool {
        ty.and_then(ResolvedType::class)
            .and_then(|id| self.model.class(id))
            .is_some_and(|decl| decl.name == builtin.name() && decl.library == CORE_LIBRARY)
    }

    /// Three-valued [`Self::extends_class`]
    pub fn classify_extends(
        &self,
        ty: Option<&ResolvedType>,
        class_name: &str,
        library: &str,
    ) -> Classification {
        if self.is_dynamic_or_unresolved(ty) {
            return Classification::Unknown;
        }
        self.extends_class(ty, class_name, library).into()
    }

    /// Three-valued [`Self::is_exactly`]
    pub fn classify_exactly(&self, ty: Option<&ResolvedType>, builtin: Builtin) -> Classification {
        if self.is_dynamic_or_unresolved(ty) {
            return Classification::Unknown;
        }
        self.is_exactly(ty, builtin).into()
    }

    /// Name of the class of an interface type
    pub fn class_name(&self, ty: Option<&ResolvedType>) -> Option<&'m str> {
        ty.and_then(ResolvedType::class)
            .and_then(|id| self.model.class(id))
            .map(|decl| decl.name.as_str())
    }

    /// Best-known static type of an expression
    pub fn static_type_of<'t>(&self, expr: NodeRef<'t>) -> Option<&'t ResolvedType> {
        if let Some(ty) = expr.static_type() {
            return Some(ty);
        }
        match expr.data() {
            NodeData::ParenthesizedExpression { expression } => {
                self.static_type_of(expr.child(*expression))
            }
            _ => None,
        }
    }

    /// Declared type of the parameter an argument expression is bound to.
    ///
    /// Named arguments (`name: expr`) are matched by name; positional ones by
    /// their position among the positional arguments of the call.
    pub fn parameter_type_at_call_site<'t>(&self, arg: NodeRef<'t>) -> Option<&'t ResolvedType> {
        let parent = arg.parent()?;
        let (list, name) = match parent.data() {
            NodeData::NamedExpression { name, .. } => (parent.parent()?, Some(name.as_str())),
            NodeData::ArgumentList { .. } => (parent, None),
            _ => return None,
        };

        let NodeData::ArgumentList {
            arguments,
            parameters,
        } = list.data()
        else {
            return None;
        };
        let parameters = parameters.as_ref()?;

        let parameter = match name {
            Some(name) => parameters.iter().find(|p| p.named && p.name == name),
            None => {
                let position = arguments
                    .iter()
                    .filter(|id| list.child(**id).kind() != NodeKind::NamedExpression)
                    .position(|id| *id == arg.id())?;
                parameters.iter().filter(|p| !p.named).nth(position)
            }
        }?;

        parameter.ty.as_ref()
    }

    /// Interface type of the class declaration enclosing `node`
    pub fn enclosing_class_type(&self, node: NodeRef<'_>) -> Option<ResolvedType> {
        node.ancestors().find_map(|ancestor| match ancestor.data() {
            NodeData::ClassDeclaration { class, .. } => Some(class.map(ResolvedType::interface)),
            _ => None,
        })?
    }

    /// Interface type of the class that declares `element`
    pub fn element_enclosing_type(&self, element: &Element) -> Option<ResolvedType> {
        element.enclosing_class.map(ResolvedType::interface)
    }

    /// Receiver expression of a property access or method invocation.
    ///
    /// Inside a cascade section the receiver is the cascade target.
    pub fn real_target<'t>(&self, node: NodeRef<'t>) -> Option<NodeRef<'t>> {
        let target = match node.data() {
            NodeData::PropertyAccess { target, .. } | NodeData::MethodInvocation { target, .. } => {
                *target
            }
            _ => return None,
        };
        if let Some(target) = target {
            return Some(node.child(target));
        }

        // Climb the section's receiver chain (`..a.b = x`) up to the cascade.
        let mut current = node;
        while let Some(parent) = current.parent() {
            match parent.data() {
                NodeData::CascadeExpression { target, .. } => {
                    return Some(parent.child(*target));
                }
                NodeData::PropertyAccess {
                    target: Some(target),
                    ..
                }
                | NodeData::MethodInvocation {
                    target: Some(target),
                    ..
                } if *target == current.id() => current = parent,
                NodeData::AssignmentExpression { left, .. } if *left == current.id() => {
                    current = parent
                }
                _ => return None,
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{ElementKind, NodeData, ParameterInfo, Span, TreeBuilder};
    use pretty_assertions::assert_eq;

    const HTML: &str = "dart:html";

    fn html_model() -> (TypeModel, ClassId, ClassId, ClassId) {
        let mut model = TypeModel::with_core();
        let object = model.builtin(Builtin::Object).unwrap();
        let node = model.add_class(ClassDecl::new("Node", HTML).extends(object));
        let element = model.add_class(ClassDecl::new("Element", HTML).extends(node));
        let html_element = model.add_class(ClassDecl::new("HtmlElement", HTML).extends(element));
        let anchor = model.add_class(ClassDecl::new("AnchorElement", HTML).extends(html_element));
        let plain = model.add_class(ClassDecl::new("Widget", "package:app/widget.dart").extends(object));
        (model, element, anchor, plain)
    }

    #[test]
    fn test_extends_class_transitive() {
        let (model, element, anchor, plain) = html_model();
        let query = TypeQuery::new(&model);

        let anchor_ty = ResolvedType::interface(anchor);
        assert!(query.extends_class(Some(&anchor_ty), "Element", HTML));
        assert!(query.extends_class(Some(&anchor_ty), "AnchorElement", HTML));
        assert!(query.extends_class(Some(&anchor_ty), "Object", CORE_LIBRARY));
        assert!(!query.extends_class(Some(&anchor_ty), "Element", "package:other"));

        let element_ty = ResolvedType::interface(element);
        assert!(!query.extends_class(Some(&element_ty), "AnchorElement", HTML));

        let plain_ty = ResolvedType::interface(plain);
        assert!(!query.extends_class(Some(&plain_ty), "Element", HTML));
    }

    #[test]
    fn test_unknown_is_not_a_match_for_extends() {
        let (model, ..) = html_model();
        let query = TypeQuery::new(&model);

        assert!(!query.extends_class(None, "Element", HTML));
        assert!(!query.extends_class(Some(&ResolvedType::Dynamic), "Element", HTML));
        assert!(query.is_dynamic_or_unresolved(None));
        assert!(query.is_dynamic_or_unresolved(Some(&ResolvedType::Dynamic)));
        assert_eq!(
            query.classify_extends(Some(&ResolvedType::Dynamic), "Element", HTML),
            Classification::Unknown
        );
    }

    #[test]
    fn test_interfaces_and_mixins_count() {
        let mut model = TypeModel::with_core();
        let iface = model.add_class(ClassDecl::new("Closeable", "lib"));
        let mixin = model.add_class(ClassDecl::new("Logging", "lib"));
        let class = model.add_class(
            ClassDecl::new("Conn", "lib")
                .implements(iface)
                .with_mixin(mixin),
        );
        let query = TypeQuery::new(&model);
        let ty = ResolvedType::interface(class);
        assert!(query.extends_class(Some(&ty), "Closeable", "lib"));
        assert!(query.extends_class(Some(&ty), "Logging", "lib"));
    }

    #[test]
    fn test_cyclic_hierarchy_terminates() {
        let mut model = TypeModel::new();
        let a = model.add_class(ClassDecl::new("A", "lib").extends(ClassId(1)));
        model.add_class(ClassDecl::new("B", "lib").extends(a));
        let query = TypeQuery::new(&model);
        let ty = ResolvedType::interface(a);
        assert!(query.extends_class(Some(&ty), "B", "lib"));
        assert!(!query.extends_class(Some(&ty), "C", "lib"));
    }

    #[test]
    fn test_is_exactly() {
        let model = TypeModel::with_core();
        let query = TypeQuery::new(&model);
        let double = model.builtin_type(Builtin::Double);
        let num = model.builtin_type(Builtin::Num);

        assert!(query.is_exactly(double.as_ref(), Builtin::Double));
        assert!(!query.is_exactly(num.as_ref(), Builtin::Double));
        assert!(!query.is_exactly(Some(&ResolvedType::Dynamic), Builtin::Double));
        assert_eq!(
            query.classify_exactly(num.as_ref(), Builtin::Double),
            Classification::NoMatch
        );
        assert_eq!(
            query.classify_exactly(None, Builtin::Double),
            Classification::Unknown
        );
    }

    #[test]
    fn test_parameter_type_at_call_site() {
        let model = TypeModel::with_core();
        let query = TypeQuery::new(&model);
        let int = model.builtin_type(Builtin::Int).unwrap();
        let double = model.builtin_type(Builtin::Double).unwrap();

        // f(1, scale: 2, 3)
        let mut b = TreeBuilder::new();
        let one = b.int_literal("1", Span::new(2, 3));
        let two = b.int_literal("2", Span::new(12, 13));
        let named = b.push(
            NodeData::NamedExpression {
                name: "scale".to_string(),
                expression: two,
            },
            Span::new(5, 13),
        );
        let three = b.int_literal("3", Span::new(15, 16));
        let args = b.push(
            NodeData::ArgumentList {
                arguments: vec![one, named, three],
                parameters: Some(vec![
                    ParameterInfo::positional("a", Some(int.clone())),
                    ParameterInfo::named("scale", Some(double.clone())),
                    ParameterInfo::positional("b", Some(double.clone())),
                ]),
            },
            Span::new(1, 17),
        );
        let call = b.push(
            NodeData::MethodInvocation {
                target: None,
                method_name: "f".to_string(),
                arguments: args,
            },
            Span::new(0, 17),
        );
        let tree = b.finish(call).unwrap();

        let node = |id| tree.get(id).unwrap();
        assert_eq!(query.parameter_type_at_call_site(node(one)), Some(&int));
        assert_eq!(query.parameter_type_at_call_site(node(two)), Some(&double));
        assert_eq!(query.parameter_type_at_call_site(node(three)), Some(&double));
        assert_eq!(query.parameter_type_at_call_site(node(args)), None);
    }

    #[test]
    fn test_parameter_type_unresolved_callee() {
        let model = TypeModel::with_core();
        let query = TypeQuery::new(&model);

        let mut b = TreeBuilder::new();
        let six = b.int_literal("6", Span::new(7, 8));
        let args = b.push(
            NodeData::ArgumentList {
                arguments: vec![six],
                parameters: None,
            },
            Span::new(6, 9),
        );
        let tree = b.finish(args).unwrap();
        assert_eq!(query.parameter_type_at_call_site(tree.get(six).unwrap()), None);
    }

    #[test]
    fn test_enclosing_class_and_real_target() {
        let (model, element, ..) = html_model();
        let query = TypeQuery::new(&model);

        // class E { m() => this..href = x; }
        let mut b = TreeBuilder::new();
        let recv = b.push_typed(
            NodeData::Other { children: vec![] },
            Span::new(20, 24),
            ResolvedType::interface(element),
        );
        let prop = b.identifier(
            "href",
            Some(Element::new("href", ElementKind::Accessor).member_of(element)),
            Span::new(26, 30),
        );
        let access = b.push(
            NodeData::PropertyAccess {
                target: None,
                property: prop,
            },
            Span::new(24, 30),
        );
        let cascade = b.push(
            NodeData::CascadeExpression {
                target: recv,
                sections: vec![access],
            },
            Span::new(20, 34),
        );
        let body = b.push(
            NodeData::ExpressionFunctionBody { expression: cascade },
            Span::new(17, 35),
        );
        let method = b.push(
            NodeData::MethodDeclaration {
                name: "m".to_string(),
                return_type: None,
                body,
            },
            Span::new(10, 35),
        );
        let class = b.push(
            NodeData::ClassDeclaration {
                name: "E".to_string(),
                class: Some(element),
                members: vec![method],
            },
            Span::new(0, 37),
        );
        let tree = b.finish(class).unwrap();

        let access = tree.get(access).unwrap();
        let target = query.real_target(access).unwrap();
        assert_eq!(target.id(), recv);
        assert_eq!(
            query.static_type_of(target),
            Some(&ResolvedType::interface(element))
        );
        assert_eq!(
            query.enclosing_class_type(access),
            Some(ResolvedType::interface(element))
        );
        assert_eq!(query.class_name(query.static_type_of(target)), Some("Element"));
    }

    #[test]
    fn test_type_model_json() {
        let model = TypeModel::with_core();
        let json = serde_json::to_string(&model).unwrap();
        let loaded: TypeModel = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.len(), model.len());
        assert_eq!(loaded.builtin(Builtin::Double), model.builtin(Builtin::Double));
    }
}
