//! 中间表示（IR）
//!
//! 名字在降级阶段全部解析完毕：全局绑定变成 `(包, 下标)`，
//! 调用目标变成 `Callee`。IR 是构建产物的代码段内容，因此所有类型都可
//! 经 bincode 序列化（不使用 serde 的 tag 属性）。

mod lower;

pub use lower::lower;

use crate::parser::ast::{BinaryOp, UnaryOp};
use serde::{Deserialize, Serialize};

pub type PackageId = usize;
pub type SchemaId = usize;

/// 入口包的路径
pub const MAIN_PACKAGE: &str = "__main__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub packages: Vec<PackageIr>,
    pub schemas: Vec<SchemaIr>,
    pub entry: PackageId,
    /// 在入口包之前执行顶层语句的包（依赖在前）
    pub init_order: Vec<PackageId>,
}

impl Program {
    pub fn entry_package(&self) -> &PackageIr {
        &self.packages[self.entry]
    }

    /// 检查所有下标都在范围内；解码产物后调用
    pub fn validate(&self) -> Result<(), String> {
        if self.entry >= self.packages.len() {
            return Err(format!("entry package {} out of range", self.entry));
        }
        if let Some(pkg) = self.init_order.iter().find(|&&p| p >= self.packages.len()) {
            return Err(format!("init package {} out of range", pkg));
        }

        let mut problem = None;
        let mut check = |expr: &ExprIr| {
            expr.walk(&mut |e| {
                if problem.is_some() {
                    return;
                }
                match e {
                    ExprIr::Global { pkg, index }
                        if self
                            .packages
                            .get(*pkg)
                            .map_or(true, |p| *index >= p.bindings.len()) =>
                    {
                        problem = Some(format!("binding {}:{} out of range", pkg, index));
                    }
                    ExprIr::Schema { schema, .. } if *schema >= self.schemas.len() => {
                        problem = Some(format!("schema {} out of range", schema));
                    }
                    _ => {}
                }
            })
        };
        for package in &self.packages {
            for binding in &package.bindings {
                check(&binding.value);
            }
            for item in &package.items {
                match item {
                    ItemIr::Binding(index) if *index >= package.bindings.len() => {
                        return Err(format!("item binding {} out of range", index));
                    }
                    ItemIr::Binding(_) => {}
                    ItemIr::Assert { test, msg, .. } => {
                        check(test);
                        if let Some(msg) = msg {
                            check(msg);
                        }
                    }
                    ItemIr::Expr { value, .. } => check(value),
                }
            }
        }
        for schema in &self.schemas {
            for attr in &schema.attrs {
                if let Some(default) = &attr.default {
                    check(default);
                }
            }
            for c in &schema.checks {
                check(&c.test);
                if let Some(msg) = &c.msg {
                    check(msg);
                }
            }
        }
        drop(check);
        problem.map_or(Ok(()), Err)
    }

    /// 程序中声明的所有 `option(...)`，按出现顺序，同名只保留第一个
    pub fn options(&self) -> Vec<&OptionIr> {
        fn collect<'a>(expr: &'a ExprIr, found: &mut Vec<&'a OptionIr>) {
            expr.walk(&mut |e| {
                if let ExprIr::Option(option) = e {
                    found.push(option);
                }
            })
        }

        let mut found: Vec<&OptionIr> = Vec::new();
        for package in &self.packages {
            for binding in &package.bindings {
                collect(&binding.value, &mut found);
            }
            for item in &package.items {
                match item {
                    ItemIr::Binding(_) => {}
                    ItemIr::Assert { test, msg, .. } => {
                        collect(test, &mut found);
                        if let Some(msg) = msg {
                            collect(msg, &mut found);
                        }
                    }
                    ItemIr::Expr { value, .. } => collect(value, &mut found),
                }
            }
        }
        for schema in &self.schemas {
            for attr in &schema.attrs {
                if let Some(default) = &attr.default {
                    collect(default, &mut found);
                }
            }
            for check in &schema.checks {
                collect(&check.test, &mut found);
            }
        }

        let mut seen = std::collections::HashSet::new();
        found.retain(|option| seen.insert(option.name.clone()));
        found
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageIr {
    pub path: String,
    pub bindings: Vec<BindingIr>,
    /// 顶层语句（绑定、断言、表达式）的声明顺序
    pub items: Vec<ItemIr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingIr {
    pub name: String,
    /// 是否出现在结果中（非 `_` 开头）
    pub public: bool,
    pub ty: Option<TypeIr>,
    pub value: ExprIr,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ItemIr {
    Binding(usize),
    Assert {
        test: ExprIr,
        msg: Option<ExprIr>,
        pos: Pos,
    },
    Expr {
        value: ExprIr,
        pos: Pos,
    },
}

/// 源码位置；`file` 是调试信息段中文件表的下标
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub file: u32,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaIr {
    pub name: String,
    pub pkg: String,
    pub attrs: Vec<AttrIr>,
    pub index_signature: Option<IndexSignatureIr>,
    pub checks: Vec<CheckIr>,
}

impl SchemaIr {
    pub fn attr(&self, name: &str) -> Option<&AttrIr> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrIr {
    pub name: String,
    pub optional: bool,
    pub ty: TypeIr,
    pub default: Option<ExprIr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSignatureIr {
    pub key: TypeIr,
    pub value: TypeIr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIr {
    pub test: ExprIr,
    pub msg: Option<ExprIr>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeIr {
    Any,
    None,
    Bool,
    Int,
    Float,
    Str,
    List(Box<TypeIr>),
    Dict(Box<TypeIr>, Box<TypeIr>),
    Union(Vec<TypeIr>),
    Schema(SchemaId),
}

impl TypeIr {
    /// `type="int"` 这类关键字参数使用的类型名
    pub fn from_name(name: &str) -> Option<TypeIr> {
        let ty = match name {
            "any" => TypeIr::Any,
            "bool" => TypeIr::Bool,
            "int" => TypeIr::Int,
            "float" => TypeIr::Float,
            "str" => TypeIr::Str,
            "list" => TypeIr::List(Box::new(TypeIr::Any)),
            "dict" => TypeIr::Dict(Box::new(TypeIr::Any), Box::new(TypeIr::Any)),
            _ => return None,
        };
        Some(ty)
    }

    pub fn display(&self, schemas: &[SchemaIr]) -> String {
        match self {
            TypeIr::Any => "any".to_string(),
            TypeIr::None => "None".to_string(),
            TypeIr::Bool => "bool".to_string(),
            TypeIr::Int => "int".to_string(),
            TypeIr::Float => "float".to_string(),
            TypeIr::Str => "str".to_string(),
            TypeIr::List(item) => format!("[{}]", item.display(schemas)),
            TypeIr::Dict(key, value) => {
                format!("{{{}:{}}}", key.display(schemas), value.display(schemas))
            }
            TypeIr::Union(types) => types
                .iter()
                .map(|t| t.display(schemas))
                .collect::<Vec<_>>()
                .join(" | "),
            TypeIr::Schema(id) => schemas
                .get(*id)
                .map(|s| s.name.clone())
                .unwrap_or_else(|| format!("schema#{id}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstIr {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprIr {
    Const(ConstIr),
    List(Vec<ExprIr>),
    Dict(Vec<(String, ExprIr)>),
    /// 顶层绑定
    Global {
        pkg: PackageId,
        index: usize,
    },
    /// schema 体内的属性
    Local(String),
    Schema {
        schema: SchemaId,
        entries: Vec<(String, ExprIr)>,
        pos: Pos,
    },
    Option(Box<OptionIr>),
    Call {
        callee: Callee,
        args: Vec<ExprIr>,
        kwargs: Vec<(String, ExprIr)>,
    },
    /// 值上的方法调用（字符串方法）
    Method {
        receiver: Box<ExprIr>,
        name: String,
        args: Vec<ExprIr>,
        kwargs: Vec<(String, ExprIr)>,
    },
    Member {
        value: Box<ExprIr>,
        attr: String,
    },
    Index {
        value: Box<ExprIr>,
        index: Box<ExprIr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<ExprIr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<ExprIr>,
        right: Box<ExprIr>,
    },
    IfElse {
        cond: Box<ExprIr>,
        then: Box<ExprIr>,
        orelse: Box<ExprIr>,
    },
}

impl ExprIr {
    /// 先序遍历
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a ExprIr)) {
        f(self);
        match self {
            ExprIr::Const(_) | ExprIr::Global { .. } | ExprIr::Local(_) => {}
            ExprIr::List(items) => items.iter().for_each(|e| e.walk(f)),
            ExprIr::Dict(entries) | ExprIr::Schema { entries, .. } => {
                entries.iter().for_each(|(_, e)| e.walk(f))
            }
            ExprIr::Option(option) => {
                if let Some(default) = &option.default {
                    default.walk(f);
                }
            }
            ExprIr::Call { args, kwargs, .. } => {
                args.iter().for_each(|e| e.walk(f));
                kwargs.iter().for_each(|(_, e)| e.walk(f));
            }
            ExprIr::Method {
                receiver,
                args,
                kwargs,
                ..
            } => {
                receiver.walk(f);
                args.iter().for_each(|e| e.walk(f));
                kwargs.iter().for_each(|(_, e)| e.walk(f));
            }
            ExprIr::Member { value, .. } => value.walk(f),
            ExprIr::Index { value, index } => {
                value.walk(f);
                index.walk(f);
            }
            ExprIr::Unary { operand, .. } => operand.walk(f),
            ExprIr::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            ExprIr::IfElse { cond, then, orelse } => {
                cond.walk(f);
                then.walk(f);
                orelse.walk(f);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionIr {
    pub name: String,
    /// 参数字符串要转换成的类型
    pub ty: Option<TypeIr>,
    pub default: Option<ExprIr>,
    pub required: bool,
    pub help: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Callee {
    Builtin(Builtin),
    System { module: SystemModule, func: String },
    /// 插件函数在运行时从注册表中查找
    Plugin { plugin: String, func: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Builtin {
    Print,
    Len,
    Str,
    Int,
    Float,
    Bool,
    Typeof,
    Abs,
    Max,
    Min,
    Sum,
    Sorted,
    Range,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Builtin> {
        let builtin = match name {
            "print" => Builtin::Print,
            "len" => Builtin::Len,
            "str" => Builtin::Str,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "bool" => Builtin::Bool,
            "typeof" => Builtin::Typeof,
            "abs" => Builtin::Abs,
            "max" => Builtin::Max,
            "min" => Builtin::Min,
            "sum" => Builtin::Sum,
            "sorted" => Builtin::Sorted,
            "range" => Builtin::Range,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Str => "str",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Bool => "bool",
            Builtin::Typeof => "typeof",
            Builtin::Abs => "abs",
            Builtin::Max => "max",
            Builtin::Min => "min",
            Builtin::Sum => "sum",
            Builtin::Sorted => "sorted",
            Builtin::Range => "range",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemModule {
    Regex,
    Math,
}

impl SystemModule {
    pub fn from_path(path: &str) -> Option<SystemModule> {
        match path {
            "regex" => Some(SystemModule::Regex),
            "math" => Some(SystemModule::Math),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemModule::Regex => "regex",
            SystemModule::Math => "math",
        }
    }

    /// 模块导出的函数名
    pub fn functions(&self) -> &'static [&'static str] {
        match self {
            SystemModule::Regex => &["match", "search", "replace", "findall", "split"],
            SystemModule::Math => &["ceil", "floor", "sqrt", "pow", "log"],
        }
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions().contains(&name)
    }
}

/// 插件导入前缀：`import konfig_plugin.hello`
pub const PLUGIN_PREFIX: &str = "konfig_plugin.";
