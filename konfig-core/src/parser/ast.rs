//! 语法树定义
//!
//! 所有节点都可序列化，`parse_file` 以 JSON 形式返回整棵树。

use crate::lexer::Coordinate;
use serde::Serialize;

/// 单个源文件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Module {
    pub filename: String,
    pub body: Vec<Stmt>,
}

impl Module {
    pub fn imports(&self) -> impl Iterator<Item = (&ImportStmt, Coordinate)> {
        self.body.iter().filter_map(|stmt| match &stmt.kind {
            StmtKind::Import(import) => Some((import, stmt.pos)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StmtKind {
    Import(ImportStmt),
    Schema(SchemaStmt),
    Assign(AssignStmt),
    Assert(AssertStmt),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportStmt {
    /// 点分路径，如 `a.b`
    pub path: String,
    pub alias: Option<String>,
}

impl ImportStmt {
    /// 作用域中使用的名字：别名，或路径的最后一段
    pub fn name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('.').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaStmt {
    pub name: String,
    pub attrs: Vec<SchemaAttr>,
    pub index_signature: Option<IndexSignature>,
    pub checks: Vec<CheckExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaAttr {
    pub name: String,
    pub optional: bool,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
    pub pos: Coordinate,
}

/// `[str]: T` 或 `[key: str]: T`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSignature {
    pub key_name: Option<String>,
    pub key_ty: TypeExpr,
    pub value_ty: TypeExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckExpr {
    pub test: Expr,
    pub msg: Option<Expr>,
    pub pos: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignStmt {
    pub target: String,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertStmt {
    pub test: Expr,
    pub msg: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value")]
pub enum TypeExpr {
    Any,
    None,
    Bool,
    Int,
    Float,
    Str,
    List(Box<TypeExpr>),
    Dict(Box<TypeExpr>, Box<TypeExpr>),
    Union(Vec<TypeExpr>),
    /// 用户类型名，可带包前缀（`pkg.Config`）
    Named { pkg: Option<String>, name: String },
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeExpr::Any => write!(f, "any"),
            TypeExpr::None => write!(f, "None"),
            TypeExpr::Bool => write!(f, "bool"),
            TypeExpr::Int => write!(f, "int"),
            TypeExpr::Float => write!(f, "float"),
            TypeExpr::Str => write!(f, "str"),
            TypeExpr::List(item) => write!(f, "[{item}]"),
            TypeExpr::Dict(key, value) => write!(f, "{{{key}:{value}}}"),
            TypeExpr::Union(types) => {
                for (i, ty) in types.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{ty}")?;
                }
                Ok(())
            }
            TypeExpr::Named { pkg: Some(pkg), name } => write!(f, "{pkg}.{name}"),
            TypeExpr::Named { pkg: None, name } => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Coordinate,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Coordinate) -> Self {
        Self { kind, pos }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "expr")]
pub enum ExprKind {
    None,
    Bool { value: bool },
    Int { value: i64 },
    Float { value: f64 },
    Str { value: String },
    Name { name: String },
    List { items: Vec<Expr> },
    Config { entries: Vec<ConfigEntry> },
    /// `Name { ... }` / `pkg.Name { ... }`
    SchemaExpr {
        pkg: Option<String>,
        name: String,
        entries: Vec<ConfigEntry>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<Keyword>,
    },
    Member { value: Box<Expr>, attr: String },
    Index { value: Box<Expr>, index: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        orelse: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Keyword {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: Expr,
    pub pos: Coordinate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    And,
    Or,
    In,
    NotIn,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtE => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtE => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
        }
    }
}
