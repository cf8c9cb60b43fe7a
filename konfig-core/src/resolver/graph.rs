//! 模块依赖图
//!
//! 节点按导入路径索引，状态只能沿以下方向迁移：
//!
//! ```text
//! Unresolved ──► Resolving ──► Resolved
//!      │
//!      └──────► Skipped
//! ```

use crate::error::Error;
use crate::ir::SystemModule;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// 模块解析状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Unresolved,
    Resolving,
    Resolved,
    Skipped,
}

impl ModuleState {
    fn can_transition_to(self, next: ModuleState) -> bool {
        matches!(
            (self, next),
            (ModuleState::Unresolved, ModuleState::Resolving)
                | (ModuleState::Resolving, ModuleState::Resolved)
                | (ModuleState::Unresolved, ModuleState::Skipped)
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModuleState::Unresolved => "unresolved",
            ModuleState::Resolving => "resolving",
            ModuleState::Resolved => "resolved",
            ModuleState::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// 模块来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    /// 入口文件组成的主包
    Main,
    /// 用户模块；`location` 是 `.k` 文件或包含 `.k` 文件的目录
    User { location: Option<PathBuf> },
    System(SystemModule),
    Plugin(String),
}

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub path: String,
    pub kind: ModuleKind,
    pub state: ModuleState,
}

/// 导入图
#[derive(Debug, Default)]
pub struct ModuleGraph {
    nodes: BTreeMap<String, ModuleNode>,
    /// 被实际引用的导入边
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加节点，已存在时返回原节点
    pub fn ensure(&mut self, path: &str, kind: ModuleKind) -> &mut ModuleNode {
        self.nodes
            .entry(path.to_string())
            .or_insert_with(|| ModuleNode {
                path: path.to_string(),
                kind,
                state: ModuleState::Unresolved,
            })
    }

    pub fn get(&self, path: &str) -> Option<&ModuleNode> {
        self.nodes.get(path)
    }

    pub fn state(&self, path: &str) -> Option<ModuleState> {
        self.nodes.get(path).map(|n| n.state)
    }

    /// 状态迁移；非法迁移属于内部错误
    pub fn transition(&mut self, path: &str, next: ModuleState) -> Result<(), Error> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| Error::Internal(format!("module '{path}' is not in the graph")))?;
        if !node.state.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "illegal state transition for module '{}': {} -> {}",
                path, node.state, next
            )));
        }
        node.state = next;
        Ok(())
    }

    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn edges_from(&self, from: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(from)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values()
    }

    /// 从 `start` 出发查找环，返回环上的路径（首尾相同）
    pub fn find_cycle(&self, start: &str) -> Option<Vec<String>> {
        let mut stack = Vec::new();
        let mut done = BTreeSet::new();
        self.cycle_dfs(start, &mut stack, &mut done)
    }

    fn cycle_dfs(
        &self,
        node: &str,
        stack: &mut Vec<String>,
        done: &mut BTreeSet<String>,
    ) -> Option<Vec<String>> {
        if let Some(index) = stack.iter().position(|n| n == node) {
            let mut cycle = stack[index..].to_vec();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if done.contains(node) {
            return None;
        }
        stack.push(node.to_string());
        for next in self.edges_from(node) {
            if let Some(cycle) = self.cycle_dfs(next, stack, done) {
                return Some(cycle);
            }
        }
        stack.pop();
        done.insert(node.to_string());
        None
    }

    /// 后序遍历：依赖排在依赖者之前，不含 `start` 本身
    pub fn dependency_order(&self, start: &str) -> Vec<String> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        seen.insert(start.to_string());
        for next in self.edges_from(start) {
            self.post_order(next, &mut seen, &mut order);
        }
        order
    }

    fn post_order(&self, node: &str, seen: &mut BTreeSet<String>, order: &mut Vec<String>) {
        if !seen.insert(node.to_string()) {
            return;
        }
        for next in self.edges_from(node) {
            self.post_order(next, seen, order);
        }
        order.push(node.to_string());
    }
}
