//! 树存储：按 id 寻址的纯函数操作
//!
//! 所有操作都基于旧快照返回新的森林，输入不被修改。
//! 本层对不存在的 id 静默不处理：`replace`/`remove` 返回等价森林，插入操作返回 `None`。

use crate::model::node::{child_id, last_segment, Forest, Node, TreeConfig};

/// 深度优先先序查找
pub fn find<'a>(forest: &'a [Node], id: &str) -> Option<&'a Node> {
    for node in forest {
        if node.id == id {
            return Some(node);
        }
        if let Some(found) = find(node.children_slice(), id) {
            return Some(found);
        }
    }
    None
}

/// 整体替换指定 id 的节点
pub fn replace(forest: &[Node], id: &str, new_node: &Node) -> Forest {
    forest
        .iter()
        .map(|node| {
            if node.id == id {
                new_node.clone()
            } else {
                let mut copy = node.clone();
                if let Some(children) = &node.children {
                    copy.children = Some(replace(children, id, new_node));
                }
                copy
            }
        })
        .collect()
}

/// 删除指定 id 的节点及其整棵子树
pub fn remove(forest: &[Node], id: &str) -> Forest {
    forest
        .iter()
        .filter(|node| node.id != id)
        .map(|node| {
            let mut copy = node.clone();
            if let Some(children) = &node.children {
                copy.children = Some(remove(children, id));
            }
            copy
        })
        .collect()
}

/// 兄弟列表中最大数字后缀 + 1（无兄弟时为 1）
fn next_suffix(siblings: &[Node]) -> u32 {
    siblings
        .iter()
        .filter_map(|n| last_segment(&n.id))
        .max()
        .unwrap_or(0)
        + 1
}

/// 对指定父节点的子列表执行修改；父节点不存在时返回 None
fn edit_children_of(
    forest: &[Node],
    parent: &str,
    edit: &mut dyn FnMut(&mut Vec<Node>),
) -> Option<Forest> {
    let mut hit = false;
    fn walk(nodes: &[Node], parent: &str, edit: &mut dyn FnMut(&mut Vec<Node>), hit: &mut bool) -> Forest {
        nodes
            .iter()
            .map(|node| {
                let mut copy = node.clone();
                if !*hit && node.id == parent {
                    let mut children = node.children.clone().unwrap_or_default();
                    edit(&mut children);
                    copy.children = Some(children);
                    *hit = true;
                } else if let Some(children) = &node.children {
                    copy.children = Some(walk(children, parent, edit, hit));
                }
                copy
            })
            .collect()
    }
    let rebuilt = walk(forest, parent, edit, &mut hit);
    hit.then_some(rebuilt)
}

/// 追加为父节点的最后一个子节点；`parent` 为 None 时追加新的根节点
pub fn insert_child(forest: &[Node], parent: Option<&str>, name: &str) -> (Forest, Option<String>) {
    let Some(parent_id) = parent else {
        let id = child_id(None, next_suffix(forest));
        let mut next = forest.to_vec();
        next.push(Node::new_leaf(id.clone(), name, 1));
        return (next, Some(id));
    };

    let Some(parent_node) = find(forest, parent_id) else {
        return (forest.to_vec(), None);
    };
    let id = child_id(Some(parent_id), next_suffix(parent_node.children_slice()));
    let child = Node::new_leaf(id.clone(), name, parent_node.level + 1);

    let mut pending = Some(child);
    match edit_children_of(forest, parent_id, &mut |children: &mut Vec<Node>| {
        if let Some(child) = pending.take() {
            children.push(child);
        }
    }) {
        Some(next) => (next, Some(id)),
        None => (forest.to_vec(), None),
    }
}

/// 定位节点：返回 (父节点, 在兄弟列表中的下标)
fn locate<'a>(forest: &'a [Node], id: &str) -> Option<(Option<&'a Node>, usize)> {
    fn walk<'a>(nodes: &'a [Node], parent: Option<&'a Node>, id: &str) -> Option<(Option<&'a Node>, usize)> {
        for (idx, node) in nodes.iter().enumerate() {
            if node.id == id {
                return Some((parent, idx));
            }
            if let Some(hit) = walk(node.children_slice(), Some(node), id) {
                return Some(hit);
            }
        }
        None
    }
    walk(forest, None, id)
}

/// 在目标节点之后插入同级叶子（用于最大层级的节点）
pub fn insert_after_as_sibling(forest: &[Node], after_id: &str, name: &str) -> (Forest, Option<String>) {
    let Some((parent, index)) = locate(forest, after_id) else {
        return (forest.to_vec(), None);
    };
    let Some(target) = find(forest, after_id) else {
        return (forest.to_vec(), None);
    };
    let level = target.level;

    match parent {
        None => {
            let id = child_id(None, next_suffix(forest));
            let mut next = forest.to_vec();
            next.insert(index + 1, Node::new_leaf(id.clone(), name, level));
            (next, Some(id))
        }
        Some(parent) => {
            let id = child_id(Some(&parent.id), next_suffix(parent.children_slice()));
            let mut pending = Some(Node::new_leaf(id.clone(), name, level));
            match edit_children_of(forest, &parent.id, &mut |children: &mut Vec<Node>| {
                if let Some(sibling) = pending.take() {
                    children.insert(index + 1, sibling);
                }
            }) {
                Some(next) => (next, Some(id)),
                None => (forest.to_vec(), None),
            }
        }
    }
}

/// "添加" 策略：无目标时新建根；目标低于最大层级时追加子节点；否则插入同级
pub fn insert_node(
    forest: &[Node],
    target: Option<&str>,
    name: &str,
    config: &TreeConfig,
) -> (Forest, Option<String>) {
    let Some(target_id) = target else {
        return insert_child(forest, None, name);
    };
    match find(forest, target_id) {
        Some(node) if node.level >= config.max_level => insert_after_as_sibling(forest, target_id, name),
        Some(_) => insert_child(forest, Some(target_id), name),
        None => (forest.to_vec(), None),
    }
}

/// 行内重命名
pub fn rename(forest: &[Node], id: &str, name: &str) -> Forest {
    match find(forest, id) {
        Some(node) => {
            let mut renamed = node.clone();
            renamed.name = name.to_string();
            replace(forest, id, &renamed)
        }
        None => forest.to_vec(),
    }
}

/// 从根到节点（不含自身）的祖先 id 列表
pub fn ancestor_ids(forest: &[Node], id: &str) -> Option<Vec<String>> {
    fn walk(nodes: &[Node], id: &str, path: &mut Vec<String>) -> bool {
        for node in nodes {
            if node.id == id {
                return true;
            }
            path.push(node.id.clone());
            if walk(node.children_slice(), id, path) {
                return true;
            }
            path.pop();
        }
        false
    }
    let mut path = Vec::new();
    walk(forest, id, &mut path).then_some(path)
}

/// 所有拥有非空子节点的节点 id
pub fn expandable_ids(forest: &[Node]) -> Vec<String> {
    let mut out = Vec::new();
    fn walk(nodes: &[Node], out: &mut Vec<String>) {
        for node in nodes {
            if node.has_children() {
                out.push(node.id.clone());
                walk(node.children_slice(), out);
            }
        }
    }
    walk(forest, &mut out);
    out
}

/// 节点自身及全部后代的 id
pub fn subtree_ids(node: &Node) -> Vec<String> {
    let mut out = vec![node.id.clone()];
    for child in node.children_slice() {
        out.extend(subtree_ids(child));
    }
    out
}

pub fn count_nodes(forest: &[Node]) -> usize {
    forest.iter().map(|n| 1 + count_nodes(n.children_slice())).sum()
}
