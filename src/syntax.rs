//! Resolved syntax tree
//!
//! The tree is produced by an external parser and resolver. This module only
//! defines its shape: an arena of [`Node`]s addressed by [`NodeId`], each with
//! a kind-specific payload ([`NodeData`]), a byte [`Span`], a parent
//! back-reference and the resolver's static type.
//!
//! Trees are validated on construction (every child id in range, every node
//! owned by at most one parent, the root owned by none), so a [`NodeRef`]
//! handed out by a tree always points at a live node.

use crate::types::{ClassId, ResolvedType};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Index of a node inside its [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Byte range in the source file (end exclusive)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kind tag of a syntax node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    CompilationUnit,
    ClassDeclaration,
    FunctionDeclaration,
    MethodDeclaration,
    FunctionExpression,
    ExpressionFunctionBody,
    BlockFunctionBody,
    Block,
    ReturnStatement,
    ExpressionStatement,
    VariableDeclarationList,
    VariableDeclaration,
    AssignmentExpression,
    MethodInvocation,
    InstanceCreationExpression,
    IntegerLiteral,
    DoubleLiteral,
    StringLiteral,
    BooleanLiteral,
    ListLiteral,
    PrefixExpression,
    PrefixedIdentifier,
    PropertyAccess,
    SimpleIdentifier,
    NamedExpression,
    ArgumentList,
    CascadeExpression,
    ParenthesizedExpression,
    Other,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a resolved identifier refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Class,
    Field,
    Accessor,
    Method,
    Function,
    Variable,
    Parameter,
}

/// Declaring element of an identifier, as computed by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    pub kind: ElementKind,
    /// Class that declares this element, if it is a class member
    #[serde(default)]
    pub enclosing_class: Option<ClassId>,
}

impl Element {
    pub fn new(name: &str, kind: ElementKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            enclosing_class: None,
        }
    }

    pub fn member_of(mut self, class: ClassId) -> Self {
        self.enclosing_class = Some(class);
        self
    }
}

/// A parameter of the executable invoked at a call site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    /// Declared type (`None` when the resolver could not compute it)
    #[serde(default)]
    pub ty: Option<ResolvedType>,
    /// Named parameters are matched by name, positional ones by position
    #[serde(default)]
    pub named: bool,
}

impl ParameterInfo {
    pub fn positional(name: &str, ty: Option<ResolvedType>) -> Self {
        Self {
            name: name.to_string(),
            ty,
            named: false,
        }
    }

    pub fn named(name: &str, ty: Option<ResolvedType>) -> Self {
        Self {
            name: name.to_string(),
            ty,
            named: true,
        }
    }
}

/// Kind-specific payload of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeData {
    CompilationUnit {
        declarations: Vec<NodeId>,
    },
    ClassDeclaration {
        name: String,
        #[serde(default)]
        class: Option<ClassId>,
        members: Vec<NodeId>,
    },
    FunctionDeclaration {
        name: String,
        #[serde(default)]
        return_type: Option<ResolvedType>,
        body: NodeId,
    },
    MethodDeclaration {
        name: String,
        #[serde(default)]
        return_type: Option<ResolvedType>,
        body: NodeId,
    },
    FunctionExpression {
        body: NodeId,
    },
    ExpressionFunctionBody {
        expression: NodeId,
    },
    BlockFunctionBody {
        block: NodeId,
    },
    Block {
        statements: Vec<NodeId>,
    },
    ReturnStatement {
        #[serde(default)]
        expression: Option<NodeId>,
    },
    ExpressionStatement {
        expression: NodeId,
    },
    VariableDeclarationList {
        #[serde(default)]
        is_const: bool,
        #[serde(default)]
        is_final: bool,
        variables: Vec<NodeId>,
    },
    VariableDeclaration {
        name: String,
        /// Declared or inferred type of the variable
        #[serde(default)]
        declared_type: Option<ResolvedType>,
        #[serde(default)]
        initializer: Option<NodeId>,
    },
    AssignmentExpression {
        operator: String,
        left: NodeId,
        right: NodeId,
    },
    MethodInvocation {
        /// Explicit receiver; `None` for implicit `this` and cascade sections
        #[serde(default)]
        target: Option<NodeId>,
        method_name: String,
        arguments: NodeId,
    },
    InstanceCreationExpression {
        type_name: String,
        #[serde(default)]
        constructor_name: Option<String>,
        arguments: NodeId,
    },
    IntegerLiteral {
        lexeme: String,
        /// `None` when the literal does not fit the integer range
        #[serde(default)]
        value: Option<i64>,
    },
    DoubleLiteral {
        lexeme: String,
        value: f64,
    },
    StringLiteral {
        value: String,
    },
    BooleanLiteral {
        value: bool,
    },
    ListLiteral {
        #[serde(default)]
        type_arguments: Vec<ResolvedType>,
        elements: Vec<NodeId>,
    },
    PrefixExpression {
        operator: String,
        operand: NodeId,
    },
    PrefixedIdentifier {
        prefix: NodeId,
        identifier: NodeId,
    },
    PropertyAccess {
        /// Explicit target; `None` inside a cascade section
        #[serde(default)]
        target: Option<NodeId>,
        property: NodeId,
    },
    SimpleIdentifier {
        name: String,
        #[serde(default)]
        element: Option<Element>,
    },
    NamedExpression {
        name: String,
        expression: NodeId,
    },
    ArgumentList {
        arguments: Vec<NodeId>,
        /// Parameters of the invoked executable; `None` when unresolved
        #[serde(default)]
        parameters: Option<Vec<ParameterInfo>>,
    },
    CascadeExpression {
        target: NodeId,
        sections: Vec<NodeId>,
    },
    ParenthesizedExpression {
        expression: NodeId,
    },
    Other {
        #[serde(default)]
        children: Vec<NodeId>,
    },
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::CompilationUnit { .. } => NodeKind::CompilationUnit,
            NodeData::ClassDeclaration { .. } => NodeKind::ClassDeclaration,
            NodeData::FunctionDeclaration { .. } => NodeKind::FunctionDeclaration,
            NodeData::MethodDeclaration { .. } => NodeKind::MethodDeclaration,
            NodeData::FunctionExpression { .. } => NodeKind::FunctionExpression,
            NodeData::ExpressionFunctionBody { .. } => NodeKind::ExpressionFunctionBody,
            NodeData::BlockFunctionBody { .. } => NodeKind::BlockFunctionBody,
            NodeData::Block { .. } => NodeKind::Block,
            NodeData::ReturnStatement { .. } => NodeKind::ReturnStatement,
            NodeData::ExpressionStatement { .. } => NodeKind::ExpressionStatement,
            NodeData::VariableDeclarationList { .. } => NodeKind::VariableDeclarationList,
            NodeData::VariableDeclaration { .. } => NodeKind::VariableDeclaration,
            NodeData::AssignmentExpression { .. } => NodeKind::AssignmentExpression,
            NodeData::MethodInvocation { .. } => NodeKind::MethodInvocation,
            NodeData::InstanceCreationExpression { .. } => NodeKind::InstanceCreationExpression,
            NodeData::IntegerLiteral { .. } => NodeKind::IntegerLiteral,
            NodeData::DoubleLiteral { .. } => NodeKind::DoubleLiteral,
            NodeData::StringLiteral { .. } => NodeKind::StringLiteral,
            NodeData::BooleanLiteral { .. } => NodeKind::BooleanLiteral,
            NodeData::ListLiteral { .. } => NodeKind::ListLiteral,
            NodeData::PrefixExpression { .. } => NodeKind::PrefixExpression,
            NodeData::PrefixedIdentifier { .. } => NodeKind::PrefixedIdentifier,
            NodeData::PropertyAccess { .. } => NodeKind::PropertyAccess,
            NodeData::SimpleIdentifier { .. } => NodeKind::SimpleIdentifier,
            NodeData::NamedExpression { .. } => NodeKind::NamedExpression,
            NodeData::ArgumentList { .. } => NodeKind::ArgumentList,
            NodeData::CascadeExpression { .. } => NodeKind::CascadeExpression,
            NodeData::ParenthesizedExpression { .. } => NodeKind::ParenthesizedExpression,
            NodeData::Other { .. } => NodeKind::Other,
        }
    }

    /// Child ids in source order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            NodeData::CompilationUnit { declarations } => declarations.clone(),
            NodeData::ClassDeclaration { members, .. } => members.clone(),
            NodeData::FunctionDeclaration { body, .. }
            | NodeData::MethodDeclaration { body, .. }
            | NodeData::FunctionExpression { body } => vec![*body],
            NodeData::ExpressionFunctionBody { expression }
            | NodeData::ExpressionStatement { expression }
            | NodeData::ParenthesizedExpression { expression }
            | NodeData::NamedExpression { expression, .. } => vec![*expression],
            NodeData::BlockFunctionBody { block } => vec![*block],
            NodeData::Block { statements } => statements.clone(),
            NodeData::ReturnStatement { expression } => expression.iter().copied().collect(),
            NodeData::VariableDeclarationList { variables, .. } => variables.clone(),
            NodeData::VariableDeclaration { initializer, .. } => {
                initializer.iter().copied().collect()
            }
            NodeData::AssignmentExpression { left, right, .. } => vec![*left, *right],
            NodeData::MethodInvocation {
                target, arguments, ..
            } => target.iter().copied().chain([*arguments]).collect(),
            NodeData::InstanceCreationExpression { arguments, .. } => vec![*arguments],
            NodeData::IntegerLiteral { .. }
            | NodeData::DoubleLiteral { .. }
            | NodeData::StringLiteral { .. }
            | NodeData::BooleanLiteral { .. }
            | NodeData::SimpleIdentifier { .. } => Vec::new(),
            NodeData::ListLiteral { elements, .. } => elements.clone(),
            NodeData::PrefixExpression { operand, .. } => vec![*operand],
            NodeData::PrefixedIdentifier { prefix, identifier } => vec![*prefix, *identifier],
            NodeData::PropertyAccess { target, property } => {
                target.iter().copied().chain([*property]).collect()
            }
            NodeData::ArgumentList { arguments, .. } => arguments.clone(),
            NodeData::CascadeExpression { target, sections } => {
                std::iter::once(*target).chain(sections.iter().copied()).collect()
            }
            NodeData::Other { children } => children.clone(),
        }
    }
}

/// A node in the arena
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub data: NodeData,
    pub span: Span,
    /// Static type computed by the resolver for expression nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_type: Option<ResolvedType>,
    #[serde(skip)]
    parent: Option<NodeId>,
}

impl Node {
    pub fn new(data: NodeData, span: Span) -> Self {
        Self {
            data,
            span,
            static_type: None,
            parent: None,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// Error building or loading a tree
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("tree has no nodes")]
    Empty,

    #[error("node {node} refers to missing child {child}")]
    DanglingChild { node: u32, child: u32 },

    #[error("node {child} has more than one parent ({first} and {second})")]
    SharedChild { child: u32, first: u32, second: u32 },

    #[error("root {0} is missing or owned by another node")]
    BadRoot(u32),

    #[error("node {0} is not reachable from the root")]
    Unreachable(u32),
}

#[derive(Deserialize)]
struct TreeRepr {
    nodes: Vec<Node>,
    root: NodeId,
    #[serde(default)]
    source: Option<String>,
}

/// A validated, parent-linked syntax tree for one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TreeRepr")]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip)]
    line_starts: Vec<u32>,
}

impl TryFrom<TreeRepr> for Tree {
    type Error = TreeError;

    fn try_from(repr: TreeRepr) -> Result<Self, Self::Error> {
        Tree::from_parts(repr.nodes, repr.root, repr.source)
    }
}

impl Tree {
    /// Link parents and validate ownership
    pub fn from_parts(
        mut nodes: Vec<Node>,
        root: NodeId,
        source: Option<String>,
    ) -> Result<Self, TreeError> {
        if nodes.is_empty() {
            return Err(TreeError::Empty);
        }
        if root.index() >= nodes.len() {
            return Err(TreeError::BadRoot(root.0));
        }

        for node in &mut nodes {
            node.parent = None;
        }

        for index in 0..nodes.len() {
            for child in nodes[index].data.children() {
                if child.index() >= nodes.len() {
                    return Err(TreeError::DanglingChild {
                        node: index as u32,
                        child: child.0,
                    });
                }
                if let Some(first) = nodes[child.index()].parent {
                    return Err(TreeError::SharedChild {
                        child: child.0,
                        first: first.0,
                        second: index as u32,
                    });
                }
                nodes[child.index()].parent = Some(NodeId(index as u32));
            }
        }

        if nodes[root.index()].parent.is_some() {
            return Err(TreeError::BadRoot(root.0));
        }

        // Every node has at most one parent, so this walk cannot loop.
        let mut reached = vec![false; nodes.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            reached[id.index()] = true;
            stack.extend(nodes[id.index()].data.children());
        }
        if let Some(index) = reached.iter().position(|r| !r) {
            return Err(TreeError::Unreachable(index as u32));
        }

        let line_starts = source.as_deref().map(line_starts).unwrap_or_default();

        Ok(Self {
            nodes,
            root,
            source,
            line_starts,
        })
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef {
            tree: self,
            id: self.root,
        }
    }

    /// Get a node handle, if the id belongs to this tree
    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.index() < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Every node reachable from the root, each exactly once, in pre-order
    pub fn preorder(&self) -> Preorder<'_> {
        Preorder {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// 1-based (line, column) of a byte offset. Columns count characters.
    ///
    /// Without source text every offset is reported on line 1 and the
    /// column is the byte offset.
    pub fn line_col(&self, offset: u32) -> (usize, usize) {
        let Some(source) = self.source.as_deref() else {
            return (1, offset as usize + 1);
        };
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        };
        let start = self.line_starts[line] as usize;
        let column = match source.get(start..offset as usize) {
            Some(prefix) => prefix.chars().count(),
            None => offset as usize - start,
        };
        (line + 1, column + 1)
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }
}

fn line_starts(source: &str) -> Vec<u32> {
    std::iter::once(0)
        .chain(
            source
                .char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i as u32 + 1),
        )
        .collect()
}

/// Pre-order iterator over a tree
pub struct Preorder<'t> {
    tree: &'t Tree,
    stack: Vec<NodeId>,
}

impl<'t> Iterator for Preorder<'t> {
    type Item = NodeRef<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);
        self.stack.extend(node.data.children().into_iter().rev());
        Some(NodeRef {
            tree: self.tree,
            id,
        })
    }
}

/// Borrowed handle to a node inside its tree
#[derive(Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t Tree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t Tree {
        self.tree
    }

    pub fn kind(&self) -> NodeKind {
        self.tree.node(self.id).kind()
    }

    pub fn data(&self) -> &'t NodeData {
        &self.tree.node(self.id).data
    }

    pub fn span(&self) -> Span {
        self.tree.node(self.id).span
    }

    pub fn static_type(&self) -> Option<&'t ResolvedType> {
        self.tree.node(self.id).static_type.as_ref()
    }

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        self.tree
            .node(self.id)
            .parent
            .map(|id| NodeRef { tree: self.tree, id })
    }

    /// Resolve a child id stored in this node's payload
    pub fn child(&self, id: NodeId) -> NodeRef<'t> {
        NodeRef {
            tree: self.tree,
            id,
        }
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'t>> + 't {
        let tree = self.tree;
        self.data()
            .children()
            .into_iter()
            .map(move |id| NodeRef { tree, id })
    }

    /// Parent, grandparent, ... up to the root
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'t>> + 't {
        std::iter::successors(self.parent(), |node| node.parent())
    }

    /// Identifier name, for simple identifiers
    pub fn identifier_name(&self) -> Option<&'t str> {
        match self.data() {
            NodeData::SimpleIdentifier { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{:?}", self.kind(), self.id.0, self.span())
    }
}

/// Parse an integer literal lexeme the way the resolver does.
///
/// Decimal literals must fit `i64`; hexadecimal literals may use the full
/// 64-bit pattern. Digit separators (`_`) are ignored. Returns `None` when the
/// literal is out of range.
pub fn parse_int_lexeme(lexeme: &str) -> Option<i64> {
    let magnitude = int_lexeme_magnitude(lexeme)?;
    if is_hex(lexeme) {
        // Bit pattern: 0xFFFFFFFFFFFFFFFF is -1.
        return Some(magnitude as i64);
    }
    i64::try_from(magnitude).ok()
}

/// Unsigned value written by an integer literal lexeme, before any
/// wrap into the signed 64-bit range.
pub fn int_lexeme_magnitude(lexeme: &str) -> Option<u64> {
    let cleaned: String = lexeme.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).ok();
    }
    cleaned.parse::<u64>().ok()
}

fn is_hex(lexeme: &str) -> bool {
    lexeme.starts_with("0x") || lexeme.starts_with("0X")
}

/// Incremental tree construction for front-ends and tests
#[derive(Debug, Default)]
pub struct TreeBuilder {
    nodes: Vec<Node>,
    source: Option<String>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach source text (enables line/column locations)
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Append a node and return its id
    pub fn push(&mut self, data: NodeData, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data, span));
        id
    }

    /// Append a node with a resolved static type
    pub fn push_typed(&mut self, data: NodeData, span: Span, ty: ResolvedType) -> NodeId {
        let id = self.push(data, span);
        self.set_type(id, ty);
        id
    }

    pub fn set_type(&mut self, id: NodeId, ty: ResolvedType) {
        if let Some(node) = self.nodes.get_mut(id.index()) {
            node.static_type = Some(ty);
        }
    }

    /// Integer literal whose value is computed from its lexeme
    pub fn int_literal(&mut self, lexeme: &str, span: Span) -> NodeId {
        self.push(
            NodeData::IntegerLiteral {
                lexeme: lexeme.to_string(),
                value: parse_int_lexeme(lexeme),
            },
            span,
        )
    }

    pub fn identifier(&mut self, name: &str, element: Option<Element>, span: Span) -> NodeId {
        self.push(
            NodeData::SimpleIdentifier {
                name: name.to_string(),
                element,
            },
            span,
        )
    }

    pub fn finish(self, root: NodeId) -> Result<Tree, TreeError> {
        Tree::from_parts(self.nodes, root, self.source)
    }
}
