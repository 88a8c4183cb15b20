//! 关键词树节点：位置编码 id、层级与变体列表

use std::collections::HashSet;

use crate::model::data_core::AppError;

/// 默认最大层级（领域常量，可通过配置覆盖）
pub const DEFAULT_MAX_LEVEL: u32 = 4;

/// 关键词树中的一个节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// 以 `-` 连接的 1 起始兄弟序号路径，如 `2-1-3`
    pub id: String,
    /// 显示名称
    pub name: String,
    /// 深度，根为 1
    pub level: u32,
    /// 领域标记，核心逻辑不解释
    pub is_global: bool,
    /// 变体列表，保持插入顺序
    pub variants: Vec<String>,
    /// `None` 为纯叶子；`Some(vec![])` 为可展开但暂无子节点的容器
    pub children: Option<Vec<Node>>,
}

/// 整个文档：有序根节点列表
pub type Forest = Vec<Node>;

impl Node {
    pub fn new_leaf(id: impl Into<String>, name: impl Into<String>, level: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level,
            is_global: false,
            variants: Vec::new(),
            children: None,
        }
    }

    /// 是否显示展开控件（子节点列表存在即可，即使为空）
    pub fn is_expandable(&self) -> bool {
        self.children.is_some()
    }

    /// 是否真正拥有子节点
    pub fn has_children(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }

    pub fn children_slice(&self) -> &[Node] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// 树结构配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// 最大层级；处于该层级的节点不能再拥有子节点
    pub max_level: u32,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { max_level: DEFAULT_MAX_LEVEL }
    }
}

/// 父节点 id（去掉最后一段）；根节点返回 None
pub fn parent_id(id: &str) -> Option<&str> {
    id.rsplit_once('-').map(|(prefix, _)| prefix)
}

/// 最后一段的数字序号；非数字返回 None
pub fn last_segment(id: &str) -> Option<u32> {
    id.rsplit('-').next().and_then(|seg| seg.parse().ok())
}

/// 拼接子节点 id
pub fn child_id(parent: Option<&str>, n: u32) -> String {
    match parent {
        Some(p) => format!("{}-{}", p, n),
        None => n.to_string(),
    }
}

/// 校验森林的结构不变量
pub fn validate_forest(forest: &[Node], config: &TreeConfig) -> Result<(), AppError> {
    fn walk(
        nodes: &[Node],
        parent: Option<&Node>,
        config: &TreeConfig,
        seen: &mut HashSet<String>,
    ) -> Result<(), AppError> {
        for node in nodes {
            if !seen.insert(node.id.clone()) {
                return Err(AppError::Invariant(format!("节点 id 重复: {}", node.id)));
            }
            if node.name.trim().is_empty() {
                return Err(AppError::Invariant(format!("节点名称为空: {}", node.id)));
            }
            let expected_level = parent.map_or(1, |p| p.level + 1);
            if node.level != expected_level {
                return Err(AppError::Invariant(format!(
                    "节点 {} 层级为 {}，应为 {}",
                    node.id, node.level, expected_level
                )));
            }
            if node.level > config.max_level {
                return Err(AppError::Invariant(format!(
                    "节点 {} 超出最大层级 {}",
                    node.id, config.max_level
                )));
            }
            if parent_id(&node.id) != parent.map(|p| p.id.as_str()) {
                return Err(AppError::Invariant(format!("节点 {} 的 id 前缀与父节点不符", node.id)));
            }
            walk(node.children_slice(), Some(node), config, seen)?;
        }
        Ok(())
    }

    walk(forest, None, config, &mut HashSet::new())
}
