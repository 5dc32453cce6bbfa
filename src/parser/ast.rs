/// Stable handle of a node inside a [`Tree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The parsed source unit. Nodes live in an arena and refer to their
/// children by [`NodeId`]; the tree is never mutated once built.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

/// One syntax node: its kind plus the 1-based line where it starts
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub line: usize,
}

/// Whether a name-like expression is read, bound or deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprContext {
    Load,
    Store,
    Del,
}

/// An `import x as y` clause
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

impl Alias {
    /// The name this clause binds in the importing scope
    pub fn bound_name(&self) -> &str {
        match &self.asname {
            Some(asname) => asname,
            None => self.name.split('.').next().unwrap_or(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    PositionalOnly,
    Positional,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

/// A parameter of a `def` or `lambda`
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub kind: ParameterKind,
    pub annotation: Option<NodeId>,
    pub default: Option<NodeId>,
    pub line: usize,
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(u128),
    /// Integer too wide for `Int`, kept as written
    BigInt(String),
    Float(f64),
    Imaginary(String),
    Str(String),
    Bytes(String),
    Bool(bool),
    None,
    Ellipsis,
}

impl Literal {
    pub fn is_number(&self) -> bool {
        matches!(self, Literal::Int(_) | Literal::BigInt(_) | Literal::Float(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    MatrixMultiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,
    LeftShift,
    RightShift,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Positive,
    Negative,
    Not,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComprehensionKind {
    List,
    Set,
    Dict,
    Generator,
}

/// Every node kind of the tree, statements and expressions alike
#[derive(Debug, Clone)]
pub enum NodeKind {
    Module {
        body: Vec<NodeId>,
    },

    // Statements
    /// Starts at the first decorator; `keyword_line` is the `def` line
    FunctionDefinition {
        name: String,
        keyword_line: usize,
        is_async: bool,
        decorators: Vec<NodeId>,
        parameters: Vec<Parameter>,
        returns: Option<NodeId>,
        body: Vec<NodeId>,
    },
    ClassDefinition {
        name: String,
        keyword_line: usize,
        decorators: Vec<NodeId>,
        bases: Vec<NodeId>,
        keywords: Vec<NodeId>,
        body: Vec<NodeId>,
    },
    Return {
        value: Option<NodeId>,
    },
    Delete {
        targets: Vec<NodeId>,
    },
    Assignment {
        targets: Vec<NodeId>,
        value: NodeId,
    },
    AugmentedAssignment {
        target: NodeId,
        operator: BinaryOperator,
        value: NodeId,
    },
    AnnotatedAssignment {
        target: NodeId,
        annotation: NodeId,
        value: Option<NodeId>,
    },
    For {
        is_async: bool,
        target: NodeId,
        iter: NodeId,
        body: Vec<NodeId>,
        orelse: Vec<NodeId>,
    },
    While {
        test: NodeId,
        body: Vec<NodeId>,
        orelse: Vec<NodeId>,
    },
    If {
        test: NodeId,
        body: Vec<NodeId>,
        orelse: Vec<NodeId>,
    },
    With {
        is_async: bool,
        items: Vec<NodeId>,
        body: Vec<NodeId>,
    },
    WithItem {
        context: NodeId,
        target: Option<NodeId>,
    },
    Raise {
        exception: Option<NodeId>,
        cause: Option<NodeId>,
    },
    Try {
        body: Vec<NodeId>,
        handlers: Vec<NodeId>,
        orelse: Vec<NodeId>,
        finalbody: Vec<NodeId>,
    },
    ExceptHandler {
        exception_type: Option<NodeId>,
        name: Option<String>,
        body: Vec<NodeId>,
    },
    Assert {
        test: NodeId,
        message: Option<NodeId>,
    },
    Import {
        names: Vec<Alias>,
    },
    ImportFrom {
        module: Option<String>,
        names: Vec<Alias>,
        level: usize,
    },
    Global {
        names: Vec<String>,
    },
    Nonlocal {
        names: Vec<String>,
    },
    ExpressionStatement {
        value: NodeId,
    },
    Pass,
    Break,
    Continue,

    // Expressions
    BoolOp {
        operator: BoolOperator,
        values: Vec<NodeId>,
    },
    NamedExpression {
        target: NodeId,
        value: NodeId,
    },
    BinaryOp {
        left: NodeId,
        operator: BinaryOperator,
        right: NodeId,
    },
    UnaryOp {
        operator: UnaryOperator,
        operand: NodeId,
    },
    Lambda {
        parameters: Vec<Parameter>,
        body: NodeId,
    },
    IfExpression {
        test: NodeId,
        body: NodeId,
        orelse: NodeId,
    },
    /// `keys[i]` is `None` for a `**mapping` entry
    Dict {
        keys: Vec<Option<NodeId>>,
        values: Vec<NodeId>,
    },
    Set {
        elements: Vec<NodeId>,
    },
    List {
        elements: Vec<NodeId>,
        context: ExprContext,
    },
    Tuple {
        elements: Vec<NodeId>,
        context: ExprContext,
    },
    /// List/set/dict comprehension or generator expression; `value` is only
    /// set for dict comprehensions, where `element` is the key
    Comprehension {
        kind: ComprehensionKind,
        element: NodeId,
        value: Option<NodeId>,
        generators: Vec<NodeId>,
    },
    ComprehensionClause {
        is_async: bool,
        target: NodeId,
        iter: NodeId,
        conditions: Vec<NodeId>,
    },
    Await {
        value: NodeId,
    },
    Yield {
        value: Option<NodeId>,
    },
    YieldFrom {
        value: NodeId,
    },
    Compare {
        left: NodeId,
        operators: Vec<CompareOperator>,
        comparators: Vec<NodeId>,
    },
    Call {
        function: NodeId,
        arguments: Vec<NodeId>,
        keywords: Vec<NodeId>,
    },
    /// `name=value` argument, or `**value` when `name` is `None`
    Keyword {
        name: Option<String>,
        value: NodeId,
    },
    /// f-string; only the embedded expressions are kept
    FormattedString {
        values: Vec<NodeId>,
    },
    Literal(Literal),
    Attribute {
        value: NodeId,
        attribute: String,
        context: ExprContext,
    },
    Subscript {
        value: NodeId,
        slice: NodeId,
        context: ExprContext,
    },
    Starred {
        value: NodeId,
        context: ExprContext,
    },
    NameReference {
        id: String,
        context: ExprContext,
    },
    Slice {
        lower: Option<NodeId>,
        upper: Option<NodeId>,
        step: Option<NodeId>,
    },
}

fn push_parameters(out: &mut Vec<NodeId>, parameters: &[Parameter]) {
    for parameter in parameters {
        out.extend(parameter.annotation);
        out.extend(parameter.default);
    }
}

impl NodeKind {
    /// Direct children in source order
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        match self {
            NodeKind::Module { body } => out.extend(body),
            NodeKind::FunctionDefinition {
                decorators,
                parameters,
                returns,
                body,
                ..
            } => {
                out.extend(decorators);
                push_parameters(&mut out, parameters);
                out.extend(returns);
                out.extend(body);
            }
            NodeKind::ClassDefinition {
                decorators,
                bases,
                keywords,
                body,
                ..
            } => {
                out.extend(decorators);
                out.extend(bases);
                out.extend(keywords);
                out.extend(body);
            }
            NodeKind::Return { value } => out.extend(value),
            NodeKind::Delete { targets } => out.extend(targets),
            NodeKind::Assignment { targets, value } => {
                out.extend(targets);
                out.push(*value);
            }
            NodeKind::AugmentedAssignment { target, value, .. } => {
                out.push(*target);
                out.push(*value);
            }
            NodeKind::AnnotatedAssignment {
                target,
                annotation,
                value,
            } => {
                out.push(*target);
                out.push(*annotation);
                out.extend(value);
            }
            NodeKind::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                out.push(*target);
                out.push(*iter);
                out.extend(body);
                out.extend(orelse);
            }
            NodeKind::While { test, body, orelse } | NodeKind::If { test, body, orelse } => {
                out.push(*test);
                out.extend(body);
                out.extend(orelse);
            }
            NodeKind::With { items, body, .. } => {
                out.extend(items);
                out.extend(body);
            }
            NodeKind::WithItem { context, target } => {
                out.push(*context);
                out.extend(target);
            }
            NodeKind::Raise { exception, cause } => {
                out.extend(exception);
                out.extend(cause);
            }
            NodeKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            } => {
                out.extend(body);
                out.extend(handlers);
                out.extend(orelse);
                out.extend(finalbody);
            }
            NodeKind::ExceptHandler {
                exception_type,
                body,
                ..
            } => {
                out.extend(exception_type);
                out.extend(body);
            }
            NodeKind::Assert { test, message } => {
                out.push(*test);
                out.extend(message);
            }
            NodeKind::ExpressionStatement { value } => out.push(*value),
            NodeKind::Import { .. }
            | NodeKind::ImportFrom { .. }
            | NodeKind::Global { .. }
            | NodeKind::Nonlocal { .. }
            | NodeKind::Pass
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Literal(_)
            | NodeKind::NameReference { .. } => {}
            NodeKind::BoolOp { values, .. } => out.extend(values),
            NodeKind::NamedExpression { target, value } => {
                out.push(*target);
                out.push(*value);
            }
            NodeKind::BinaryOp { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            NodeKind::UnaryOp { operand, .. } => out.push(*operand),
            NodeKind::Lambda { parameters, body } => {
                push_parameters(&mut out, parameters);
                out.push(*body);
            }
            NodeKind::IfExpression { test, body, orelse } => {
                out.push(*body);
                out.push(*test);
                out.push(*orelse);
            }
            NodeKind::Dict { keys, values } => {
                for (key, value) in keys.iter().zip(values) {
                    out.extend(key);
                    out.push(*value);
                }
            }
            NodeKind::Set { elements }
            | NodeKind::List { elements, .. }
            | NodeKind::Tuple { elements, .. } => out.extend(elements),
            NodeKind::Comprehension {
                element,
                value,
                generators,
                ..
            } => {
                out.push(*element);
                out.extend(value);
                out.extend(generators);
            }
            NodeKind::ComprehensionClause {
                target,
                iter,
                conditions,
                ..
            } => {
                out.push(*target);
                out.push(*iter);
                out.extend(conditions);
            }
            NodeKind::Await { value }
            | NodeKind::YieldFrom { value }
            | NodeKind::Keyword { value, .. }
            | NodeKind::Starred { value, .. }
            | NodeKind::Attribute { value, .. } => out.push(*value),
            NodeKind::Yield { value } => out.extend(value),
            NodeKind::Compare {
                left, comparators, ..
            } => {
                out.push(*left);
                out.extend(comparators);
            }
            NodeKind::Call {
                function,
                arguments,
                keywords,
            } => {
                out.push(*function);
                out.extend(arguments);
                out.extend(keywords);
            }
            NodeKind::FormattedString { values } => out.extend(values),
            NodeKind::Subscript { value, slice, .. } => {
                out.push(*value);
                out.push(*slice);
            }
            NodeKind::Slice { lower, upper, step } => {
                out.extend(lower);
                out.extend(upper);
                out.extend(step);
            }
        }
        out
    }

    /// The statement sequences this node owns, in source order
    pub fn statement_blocks(&self) -> Vec<&[NodeId]> {
        match self {
            NodeKind::Module { body }
            | NodeKind::FunctionDefinition { body, .. }
            | NodeKind::ClassDefinition { body, .. }
            | NodeKind::With { body, .. }
            | NodeKind::ExceptHandler { body, .. } => vec![body],
            NodeKind::For { body, orelse, .. }
            | NodeKind::While { body, orelse, .. }
            | NodeKind::If { body, orelse, .. } => vec![body, orelse],
            NodeKind::Try {
                body,
                orelse,
                finalbody,
                ..
            } => vec![body, orelse, finalbody],
            _ => Vec::new(),
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, NodeKind::For { .. } | NodeKind::While { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, NodeKind::FunctionDefinition { .. })
    }

    /// Constructs counted as branches by the complexity rules
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            NodeKind::If { .. } | NodeKind::For { .. } | NodeKind::While { .. } | NodeKind::Try { .. }
        )
    }

    /// List, dict and set displays; comprehensions are not literals
    pub fn is_mutable_literal(&self) -> bool {
        matches!(
            self,
            NodeKind::List { .. } | NodeKind::Dict { .. } | NodeKind::Set { .. }
        )
    }
}

impl Tree {
    pub(crate) fn from_parts(nodes: Vec<Node>, root: NodeId) -> Self {
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn line(&self, id: NodeId) -> usize {
        self.nodes[id.0].line
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.kind(id).children()
    }

    /// Pre-order walk over the whole tree, root first
    pub fn walk(&self) -> Descendants<'_> {
        self.descendants(self.root)
    }

    /// Pre-order walk over `id` and everything below it
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Text of the docstring opening `body`, if any
    pub fn docstring(&self, body: &[NodeId]) -> Option<&str> {
        let first = body.first()?;
        let NodeKind::ExpressionStatement { value } = self.kind(*first) else {
            return None;
        };
        match self.kind(*value) {
            NodeKind::Literal(Literal::Str(text)) => Some(text),
            _ => None,
        }
    }
}

pub struct Descendants<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let mut children = self.tree.children(id);
        children.reverse();
        self.stack.extend(children);
        Some(id)
    }
}

/// Mutable arena used while parsing; frozen into a [`Tree`] at the end
#[derive(Debug, Default)]
pub(crate) struct TreeBuilder {
    nodes: Vec<Node>,
}

impl TreeBuilder {
    pub fn push(&mut self, kind: NodeKind, line: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { kind, line });
        id
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn line(&self, id: NodeId) -> usize {
        self.nodes[id.0].line
    }

    pub fn finish(self, root: NodeId) -> Tree {
        Tree::from_parts(self.nodes, root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> Tree {
        // x = f(1)
        let mut builder = TreeBuilder::default();
        let target = builder.push(
            NodeKind::NameReference {
                id: "x".into(),
                context: ExprContext::Store,
            },
            1,
        );
        let function = builder.push(
            NodeKind::NameReference {
                id: "f".into(),
                context: ExprContext::Load,
            },
            1,
        );
        let argument = builder.push(NodeKind::Literal(Literal::Int(1)), 1);
        let call = builder.push(
            NodeKind::Call {
                function,
                arguments: vec![argument],
                keywords: Vec::new(),
            },
            1,
        );
        let assign = builder.push(
            NodeKind::Assignment {
                targets: vec![target],
                value: call,
            },
            1,
        );
        let root = builder.push(NodeKind::Module { body: vec![assign] }, 1);
        builder.finish(root)
    }

    #[test]
    fn test_walk_is_preorder() {
        let tree = small_tree();
        let kinds: Vec<&str> = tree
            .walk()
            .map(|id| match tree.kind(id) {
                NodeKind::Module { .. } => "module",
                NodeKind::Assignment { .. } => "assign",
                NodeKind::NameReference { id, .. } => id.as_str(),
                NodeKind::Call { .. } => "call",
                NodeKind::Literal(_) => "literal",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["module", "assign", "x", "call", "f", "literal"]);
    }

    #[test]
    fn test_walk_visits_every_node_once() {
        let tree = small_tree();
        let mut seen: Vec<NodeId> = tree.walk().collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), tree.len());
    }

    #[test]
    fn test_alias_bound_name() {
        let plain = Alias {
            name: "os.path".into(),
            asname: None,
        };
        let renamed = Alias {
            name: "numpy".into(),
            asname: Some("np".into()),
        };
        assert_eq!(plain.bound_name(), "os");
        assert_eq!(renamed.bound_name(), "np");
    }
}
