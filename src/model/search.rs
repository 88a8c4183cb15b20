//! 名称搜索：全树线性扫描，按先序发现顺序返回带路径的结果

use crate::model::node::Node;

/// 一条搜索命中
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub id: String,
    /// 从根到命中节点的名称路径
    pub path: Vec<String>,
}

impl SearchHit {
    pub fn path_text(&self) -> String {
        self.path.join(" > ")
    }
}

/// 不区分大小写的子串匹配；空白查询返回空结果
pub fn search(forest: &[Node], query: &str) -> Vec<SearchHit> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    let mut hits = Vec::new();

    fn walk(nodes: &[Node], needle: &str, path: &mut Vec<String>, hits: &mut Vec<SearchHit>) {
        for node in nodes {
            path.push(node.name.clone());
            if node.name.to_lowercase().contains(needle) {
                hits.push(SearchHit { id: node.id.clone(), path: path.clone() });
            }
            walk(node.children_slice(), needle, path, hits);
            path.pop();
        }
    }

    walk(forest, &needle, &mut Vec::new(), &mut hits);
    tracing::debug!("搜索 {:?}: {} 条结果", query, hits.len());
    hits
}
