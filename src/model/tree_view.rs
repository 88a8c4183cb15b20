//! 树视图：展开状态与可见行扁平化（与 UI 展示解耦）

use std::collections::BTreeSet;

use crate::model::node::Node;
use crate::model::tree_store::expandable_ids;

/// 已展开节点 id 集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandState {
    ids: BTreeSet<String>,
}

impl ExpandState {
    pub fn from_ids<I: IntoIterator<Item = String>>(ids: I) -> Self {
        Self { ids: ids.into_iter().collect() }
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// 切换展开状态，返回切换后是否展开
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn expand_all(&mut self, forest: &[Node]) {
        self.ids = expandable_ids(forest).into_iter().collect();
    }

    pub fn collapse_all(&mut self) {
        self.ids.clear();
    }

    /// 展开给定祖先，使目标节点可见
    pub fn reveal<I: IntoIterator<Item = String>>(&mut self, ancestors: I) {
        self.ids.extend(ancestors);
    }

    /// 移除已删除节点的 id
    pub fn prune(&mut self, removed: &[String]) {
        for id in removed {
            self.ids.remove(id);
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.ids.iter()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// 一行可见的树节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub id: String,
    pub name: String,
    /// 缩进深度，根为 0
    pub depth: u32,
    /// 是否显示展开控件
    pub expandable: bool,
    pub expanded: bool,
    pub selected: bool,
    pub is_global: bool,
    pub variant_count: usize,
    /// 是否处于行内重命名
    pub renaming: bool,
}

/// 先序扁平化，只进入已展开的节点
pub fn visible_rows(
    forest: &[Node],
    expand: &ExpandState,
    selection: Option<&str>,
    renaming: Option<&str>,
) -> Vec<TreeRow> {
    let mut out = Vec::with_capacity(forest.len() * 4);
    fn walk(
        out: &mut Vec<TreeRow>,
        nodes: &[Node],
        expand: &ExpandState,
        selection: Option<&str>,
        renaming: Option<&str>,
    ) {
        for node in nodes {
            let expanded = node.is_expandable() && expand.is_expanded(&node.id);
            out.push(TreeRow {
                id: node.id.clone(),
                name: node.name.clone(),
                depth: node.level.saturating_sub(1),
                expandable: node.is_expandable(),
                expanded,
                selected: selection == Some(node.id.as_str()),
                is_global: node.is_global,
                variant_count: node.variants.len(),
                renaming: renaming == Some(node.id.as_str()),
            });
            if expanded {
                walk(out, node.children_slice(), expand, selection, renaming);
            }
        }
    }
    walk(&mut out, forest, expand, selection, renaming);
    out
}
