//! 格式转换：持久化的 `{word, glob, vars, cat?, subcat?}` 递归数组 ⇄ 内部节点森林
//!
//! 嵌套键由层级决定：1 级使用 `cat`，2 级使用 `subcat`，3 级及以下没有嵌套键。

use serde::{Deserialize, Serialize};

use crate::model::data_core::AppError;
use crate::model::node::{child_id, Forest, Node};

/// 文件格式能表示的最深层级（3 级记录没有嵌套键）
pub const MAX_FILE_LEVEL: u32 = 3;

/// 外部文件中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRecord {
    pub word: String,
    #[serde(default)]
    pub glob: bool,
    #[serde(default)]
    pub vars: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat: Option<Vec<KeywordRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcat: Option<Vec<KeywordRecord>>,
}

/// 每个层级允许的嵌套键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestingKey {
    Cat,
    Subcat,
    Leaf,
}

impl NestingKey {
    pub fn for_level(level: u32) -> Self {
        match level {
            1 => NestingKey::Cat,
            2 => NestingKey::Subcat,
            _ => NestingKey::Leaf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NestingKey::Cat => "cat",
            NestingKey::Subcat => "subcat",
            NestingKey::Leaf => "-",
        }
    }
}

/// 外部记录 → 内部森林
pub fn to_internal(records: &[KeywordRecord]) -> Result<Forest, AppError> {
    fn convert(records: &[KeywordRecord], parent: Option<&str>, level: u32) -> Result<Forest, AppError> {
        records
            .iter()
            .enumerate()
            .map(|(idx, record)| {
                let id = child_id(parent, idx as u32 + 1);
                let nested = match (NestingKey::for_level(level), &record.cat, &record.subcat) {
                    (_, Some(_), Some(_)) => {
                        return Err(AppError::Shape(format!(
                            "记录 {} ({}) 同时包含 cat 与 subcat",
                            id, record.word
                        )));
                    }
                    (NestingKey::Cat, cat, None) => cat.as_ref(),
                    (NestingKey::Subcat, None, subcat) => subcat.as_ref(),
                    (NestingKey::Leaf, None, None) => None,
                    (expected, _, _) => {
                        return Err(AppError::Shape(format!(
                            "记录 {} ({}) 位于第 {} 层，只允许嵌套键 {}",
                            id,
                            record.word,
                            level,
                            expected.as_str()
                        )));
                    }
                };

                let children = match nested {
                    Some(items) if !items.is_empty() => Some(convert(items, Some(id.as_str()), level + 1)?),
                    _ => None,
                };

                Ok(Node {
                    name: record.word.clone(),
                    level,
                    is_global: record.glob,
                    variants: record.vars.clone(),
                    children,
                    id,
                })
            })
            .collect()
    }

    convert(records, None, 1)
}

/// 内部森林 → 外部记录
///
/// 3 级及以下的节点若持有子节点，格式无法表示，返回 [`AppError::Invariant`] 而不是静默丢弃。
pub fn to_external(forest: &[Node]) -> Result<Vec<KeywordRecord>, AppError> {
    forest
        .iter()
        .map(|node| {
            let mut record = KeywordRecord {
                word: node.name.clone(),
                glob: node.is_global,
                vars: node.variants.clone(),
                cat: None,
                subcat: None,
            };
            if node.has_children() {
                let children = to_external(node.children_slice())?;
                match NestingKey::for_level(node.level) {
                    NestingKey::Cat => record.cat = Some(children),
                    NestingKey::Subcat => record.subcat = Some(children),
                    NestingKey::Leaf => {
                        return Err(AppError::Invariant(format!(
                            "第 {} 层节点 {} ({}) 含有子节点，保存格式无法表示",
                            node.level, node.id, node.name
                        )));
                    }
                }
            }
            Ok(record)
        })
        .collect()
}

/// 解析文档文本
pub fn parse_document(text: &str) -> Result<Forest, AppError> {
    let records: Vec<KeywordRecord> = serde_json::from_str(text)?;
    to_internal(&records)
}

/// 渲染为格式化的文档文本
pub fn render_document(forest: &[Node]) -> Result<String, AppError> {
    let records = to_external(forest)?;
    Ok(serde_json::to_string_pretty(&records)?)
}
