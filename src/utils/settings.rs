//! 应用配置与持久化 UI 状态（配置目录下的 JSON 文件）

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::data_core::AppError;
use crate::model::node::{TreeConfig, DEFAULT_MAX_LEVEL};
use crate::model::tree_view::ExpandState;
use crate::utils::fs::{read_json_file, write_json_file};

/// 展开状态的固定存储键
pub const EXPANDED_STORAGE_KEY: &str = "keyword-tree.expanded";

const SETTINGS_FILE: &str = "settings.json";
const UI_STATE_FILE: &str = "ui-state.json";

/// 配置目录；无法确定时使用当前目录
pub fn config_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "KeywordTree", "keyword_tree")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 树的最大层级
    pub max_level: u32,
    /// 另存为时的默认文件名
    pub default_file_name: String,
    /// 日志级别：trace / debug / info / warn / error
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_level: DEFAULT_MAX_LEVEL,
            default_file_name: "keywords.json".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&config_dir().join(SETTINGS_FILE))
    }

    /// 读取失败或内容损坏时回退为默认值
    pub fn load_from(path: &Path) -> Self {
        read_json_file(path)
            .ok()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_json_file(path, &serde_json::to_value(self)?)
    }

    pub fn tree_config(&self) -> TreeConfig {
        TreeConfig { max_level: self.max_level.max(1) }
    }

    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

/// 键值形式的 UI 状态存储
#[derive(Debug, Clone)]
pub struct UiStateStore {
    path: PathBuf,
}

impl Default for UiStateStore {
    fn default() -> Self {
        Self::at(config_dir().join(UI_STATE_FILE))
    }
}

impl UiStateStore {
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_map(&self) -> BTreeMap<String, Value> {
        read_json_file(&self.path)
            .ok()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// 读取展开状态；文件缺失、损坏或形状不符都视为没有展开项
    pub fn load_expanded(&self) -> ExpandState {
        let ids = self
            .read_map()
            .remove(EXPANDED_STORAGE_KEY)
            .and_then(|v| serde_json::from_value::<Vec<String>>(v).ok());
        match ids {
            Some(ids) => ExpandState::from_ids(ids),
            None => {
                tracing::debug!("未找到有效的展开状态，使用空集合: {}", self.path.display());
                ExpandState::default()
            }
        }
    }

    pub fn save_expanded(&self, expand: &ExpandState) -> Result<(), AppError> {
        let mut map = self.read_map();
        let ids: Vec<&String> = expand.ids().collect();
        map.insert(EXPANDED_STORAGE_KEY.to_string(), serde_json::to_value(ids)?);
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_json_file(&self.path, &serde_json::to_value(&map)?)
    }
}
