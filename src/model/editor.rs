//! 属性编辑器草稿：名称、全局标记与变体列表

use crate::model::data_core::AppError;
use crate::model::node::Node;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyDraft {
    pub name: String,
    pub is_global: bool,
    pub variants: Vec<String>,
}

impl PropertyDraft {
    pub fn from_node(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            is_global: node.is_global,
            variants: node.variants.clone(),
        }
    }

    /// 添加变体（去除首尾空白）；空串或重复时忽略并返回 false
    pub fn add_variant(&mut self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.variants.iter().any(|v| v == trimmed) {
            return false;
        }
        self.variants.push(trimmed.to_string());
        true
    }

    /// 按下标删除变体；越界时忽略
    pub fn remove_variant(&mut self, index: usize) -> Option<String> {
        (index < self.variants.len()).then(|| self.variants.remove(index))
    }

    /// 生成整体替换后的节点（id、层级与子节点保持不变）
    pub fn commit(&self, base: &Node) -> Result<Node, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidName(base.id.clone()));
        }
        Ok(Node {
            name: name.to_string(),
            is_global: self.is_global,
            variants: self.variants.clone(),
            ..base.clone()
        })
    }
}
