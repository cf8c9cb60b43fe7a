//! 插件注册表
//!
//! `import konfig_plugin.hello` 在运行时按名字查找插件模块。注册表是进程级
//! 共享状态，读多写少，用 `RwLock` 保护；查找返回 `Arc`，调用期间不持锁。

use super::value::{Dict, Value};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// 插件函数：位置参数与关键字参数
pub type PluginFn = Arc<dyn Fn(&[Value], &[(String, Value)]) -> Result<Value, String> + Send + Sync>;

pub struct PluginModule {
    name: String,
    functions: HashMap<String, PluginFn>,
}

impl PluginModule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: HashMap::new(),
        }
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[Value], &[(String, Value)]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(func));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn function(&self, name: &str) -> Option<&PluginFn> {
        self.functions.get(name)
    }
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("PluginModule")
            .field("name", &self.name)
            .field("functions", &names)
            .finish()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    modules: RwLock<HashMap<String, Arc<PluginModule>>>,
}

impl PluginRegistry {
    /// 空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置 `hello` 插件的注册表
    pub fn with_builtin_plugins() -> Self {
        let registry = Self::new();
        registry.register(hello_plugin());
        registry
    }

    /// 注册插件；同名插件被替换
    pub fn register(&self, module: PluginModule) {
        self.modules
            .write()
            .insert(module.name.clone(), Arc::new(module));
    }

    pub fn get(&self, name: &str) -> Option<Arc<PluginModule>> {
        self.modules.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn call(
        &self,
        plugin: &str,
        func: &str,
        args: &[Value],
        kwargs: &[(String, Value)],
    ) -> Result<Value, String> {
        let module = self
            .get(plugin)
            .ok_or_else(|| format!("plugin '{}' is not registered", plugin))?;
        let function = module
            .function(func)
            .ok_or_else(|| format!("plugin '{}' has no function '{}'", plugin, func))?;
        function(args, kwargs)
    }
}

static GLOBAL_PLUGINS: Lazy<PluginRegistry> = Lazy::new(PluginRegistry::with_builtin_plugins);

/// 进程级插件注册表
pub fn global_plugins() -> &'static PluginRegistry {
    &GLOBAL_PLUGINS
}

/// 注册到进程级注册表
pub fn register_plugin(module: PluginModule) {
    GLOBAL_PLUGINS.register(module);
}

fn arg<'a>(func: &str, args: &'a [Value], index: usize) -> Result<&'a Value, String> {
    args.get(index)
        .ok_or_else(|| format!("hello.{}() missing argument {}", func, index + 1))
}

/// 示例插件
fn hello_plugin() -> PluginModule {
    PluginModule::new("hello")
        .with_function("add", |args, _| {
            match (arg("add", args, 0)?, arg("add", args, 1)?) {
                (Value::Int(a), Value::Int(b)) => a
                    .checked_add(*b)
                    .map(Value::Int)
                    .ok_or_else(|| "integer overflow".to_string()),
                (a, b) => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => Ok(Value::Float(x + y)),
                    _ => Err(format!(
                        "hello.add() expects numbers, got '{}' and '{}'",
                        a.type_name(),
                        b.type_name()
                    )),
                },
            }
        })
        .with_function("tolower", |args, _| match arg("tolower", args, 0)? {
            Value::Str(s) => Ok(Value::Str(s.to_lowercase())),
            other => Err(format!("hello.tolower() expects str, got '{}'", other.type_name())),
        })
        .with_function("update_dict", |args, _| {
            let mut dict: Dict = match arg("update_dict", args, 0)? {
                Value::Dict(dict) => dict.clone(),
                other => {
                    return Err(format!(
                        "hello.update_dict() expects dict, got '{}'",
                        other.type_name()
                    ))
                }
            };
            let key = match arg("update_dict", args, 1)? {
                Value::Str(key) => key.clone(),
                other => return Err(format!("dict key must be str, got '{}'", other.type_name())),
            };
            dict.insert(key, arg("update_dict", args, 2)?.clone());
            Ok(Value::Dict(dict))
        })
        .with_function("list_append", |args, _| {
            let mut items = match arg("list_append", args, 0)? {
                Value::List(items) => items.clone(),
                other => {
                    return Err(format!(
                        "hello.list_append() expects list, got '{}'",
                        other.type_name()
                    ))
                }
            };
            items.extend(args[1..].iter().cloned());
            Ok(Value::List(items))
        })
}
