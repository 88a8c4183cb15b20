//! AppState：应用核心状态与用户命令的归约处理

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::model::converter::{parse_document, render_document, to_internal, KeywordRecord, MAX_FILE_LEVEL};
use crate::model::editor::PropertyDraft;
use crate::model::node::{validate_forest, Forest, Node, TreeConfig};
use crate::model::tree_store;
use crate::model::tree_view::{visible_rows, ExpandState, TreeRow};
use crate::utils::fs::{ensure_json_extension, read_json_file, write_text_file};

/// 启动时的示例文档
pub const SAMPLE_DOCUMENT: &str = include_str!("../../assets/sample.json");

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON解析失败: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("文件结构不符: {0}")]
    Shape(String),
    #[error("数据不变量被破坏: {0}")]
    Invariant(String),
    #[error("未找到节点: {0}")]
    NotFound(String),
    #[error("节点名称不能为空: {0}")]
    InvalidName(String),
    #[error("状态错误: {0}")]
    State(String),
}

/// 一次命令执行后调用方需要跟进的副作用
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// 展开集合发生变化，需要持久化
    pub expand_changed: bool,
}

/// 属性面板模式
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    Viewing,
    Editing(PropertyDraft),
}

/// 行内重命名状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameState {
    pub id: String,
    pub original: String,
}

/// 用户命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Select(String),
    Deselect,
    /// 目标为空时新建根节点
    Add { target: Option<String>, name: String },
    Delete(String),
    ToggleExpand(String),
    ToggleExpandAll,
    BeginEdit,
    DraftName(String),
    DraftGlobal(bool),
    AddVariant(String),
    RemoveVariant(usize),
    SaveChanges,
    CancelEdit,
    BeginRename(String),
    CommitRename(String),
    CancelRename,
    /// 选中搜索结果：展开全部祖先并选中
    RevealSearchHit(String),
}

#[derive(Debug, Default)]
pub struct AppState {
    pub forest: Forest,
    pub config: TreeConfig,
    pub source_path: Option<PathBuf>,
    pub selection: Option<String>,
    pub mode: EditMode,
    pub rename: Option<RenameState>,
    pub expand: ExpandState,
    pub expanded_all: bool,
    /// 自上次加载/保存以来是否有修改
    pub dirty: bool,
}

impl AppState {
    pub fn with_config(config: TreeConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// 当前选中的节点
    pub fn selected_node(&self) -> Option<&Node> {
        self.selection
            .as_deref()
            .and_then(|id| tree_store::find(&self.forest, id))
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.mode, EditMode::Editing(_))
    }

    pub fn draft(&self) -> Option<&PropertyDraft> {
        match &self.mode {
            EditMode::Editing(draft) => Some(draft),
            EditMode::Viewing => None,
        }
    }

    pub fn rows(&self) -> Vec<TreeRow> {
        visible_rows(
            &self.forest,
            &self.expand,
            self.selection.as_deref(),
            self.rename.as_ref().map(|r| r.id.as_str()),
        )
    }

    /// 用新文档替换当前森林，重置选择与编辑状态
    fn replace_document(&mut self, forest: Forest, source: Option<PathBuf>) {
        self.forest = forest;
        self.source_path = source;
        self.selection = None;
        self.mode = EditMode::Viewing;
        self.rename = None;
        self.expanded_all = false;
        self.dirty = false;
    }

    /// 加载文档文本；失败时状态不变
    pub fn load_str(&mut self, text: &str) -> Result<(), AppError> {
        let forest = parse_document(text)?;
        validate_forest(&forest, &self.config)?;
        self.replace_document(forest, None);
        Ok(())
    }

    /// 加载文件；失败时状态不变
    pub fn load_file(&mut self, p: &Path) -> Result<(), AppError> {
        let value = read_json_file(p)?;
        let records: Vec<KeywordRecord> = serde_json::from_value(value)?;
        let forest = to_internal(&records)?;
        validate_forest(&forest, &self.config)?;
        tracing::info!("文件加载成功: {}，共 {} 个节点", p.display(), tree_store::count_nodes(&forest));
        self.replace_document(forest, Some(p.to_path_buf()));
        Ok(())
    }

    /// 加载内置示例
    pub fn load_sample(&mut self) -> Result<(), AppError> {
        self.load_str(SAMPLE_DOCUMENT)
    }

    /// 保存到指定路径；会补全 `.json` 后缀，返回实际写入的路径
    pub fn save_as(&mut self, path: &Path) -> Result<PathBuf, AppError> {
        let path = ensure_json_extension(path);
        let text = render_document(&self.forest)?;
        write_text_file(&path, &text)?;
        tracing::info!("文件已保存到: {}", path.display());
        self.source_path = Some(path.clone());
        self.dirty = false;
        Ok(path)
    }

    /// 保存到当前文件
    pub fn save(&mut self) -> Result<PathBuf, AppError> {
        let path = self
            .source_path
            .clone()
            .ok_or_else(|| AppError::State("当前文档尚未关联文件".into()))?;
        self.save_as(&path)
    }

    /// 归约一个用户命令；出错时状态保持不变
    pub fn apply(&mut self, action: Action) -> Result<ApplyOutcome, AppError> {
        tracing::debug!("处理命令: {:?}", action);
        let expand_before = self.expand.clone();
        self.reduce(action)?;
        Ok(ApplyOutcome { expand_changed: self.expand != expand_before })
    }

    fn reduce(&mut self, action: Action) -> Result<(), AppError> {
        match action {
            Action::Select(id) => self.select(id),
            Action::Deselect => {
                self.cancel_edit_if_any();
                self.selection = None;
                Ok(())
            }
            Action::Add { target, name } => self.add(target, &name),
            Action::Delete(id) => self.delete(&id),
            Action::ToggleExpand(id) => {
                self.require(&id)?;
                let expanded = self.expand.toggle(&id);
                tracing::info!("节点{}: {}", if expanded { "展开" } else { "折叠" }, id);
                Ok(())
            }
            Action::ToggleExpandAll => {
                self.expanded_all = !self.expanded_all;
                if self.expanded_all {
                    self.expand.expand_all(&self.forest);
                } else {
                    self.expand.collapse_all();
                }
                Ok(())
            }
            Action::BeginEdit => {
                if let Some(rename) = &self.rename {
                    return Err(AppError::State(format!("节点 {} 正在重命名，请先完成重命名", rename.id)));
                }
                let node = self
                    .selected_node()
                    .ok_or_else(|| AppError::State("编辑需要先选中节点".into()))?;
                self.mode = EditMode::Editing(PropertyDraft::from_node(node));
                Ok(())
            }
            Action::DraftName(name) => {
                self.draft_mut()?.name = name;
                Ok(())
            }
            Action::DraftGlobal(flag) => {
                self.draft_mut()?.is_global = flag;
                Ok(())
            }
            Action::AddVariant(text) => {
                if !self.draft_mut()?.add_variant(&text) {
                    tracing::debug!("忽略空白或重复的变体: {:?}", text);
                }
                Ok(())
            }
            Action::RemoveVariant(index) => {
                self.draft_mut()?.remove_variant(index);
                Ok(())
            }
            Action::SaveChanges => self.save_changes(),
            Action::CancelEdit => {
                self.mode = EditMode::Viewing;
                Ok(())
            }
            Action::BeginRename(id) => {
                if self.is_editing() {
                    return Err(AppError::State("编辑中不能重命名".into()));
                }
                let node = self.require(&id)?;
                self.rename = Some(RenameState { id: id.clone(), original: node.name.clone() });
                Ok(())
            }
            Action::CommitRename(name) => self.commit_rename(&name),
            Action::CancelRename => {
                self.rename = None;
                Ok(())
            }
            Action::RevealSearchHit(id) => {
                let ancestors = tree_store::ancestor_ids(&self.forest, &id)
                    .ok_or_else(|| AppError::NotFound(id.clone()))?;
                self.expand.reveal(ancestors);
                self.select(id)
            }
        }
    }

    fn require(&self, id: &str) -> Result<&Node, AppError> {
        tree_store::find(&self.forest, id).ok_or_else(|| AppError::NotFound(id.to_string()))
    }

    fn draft_mut(&mut self) -> Result<&mut PropertyDraft, AppError> {
        match &mut self.mode {
            EditMode::Editing(draft) => Ok(draft),
            EditMode::Viewing => Err(AppError::State("当前不在编辑模式".into())),
        }
    }

    fn cancel_edit_if_any(&mut self) {
        if self.is_editing() {
            tracing::info!("选择变化，放弃未保存的编辑");
            self.mode = EditMode::Viewing;
        }
    }

    fn select(&mut self, id: String) -> Result<(), AppError> {
        self.require(&id)?;
        if self.selection.as_deref() != Some(id.as_str()) {
            self.cancel_edit_if_any();
        }
        self.selection = Some(id);
        Ok(())
    }

    fn add(&mut self, target: Option<String>, name: &str) -> Result<(), AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidName(target.unwrap_or_default()));
        }
        let (forest, new_id) = tree_store::insert_node(&self.forest, target.as_deref(), name, &self.config);
        let new_id = new_id.ok_or_else(|| AppError::NotFound(target.clone().unwrap_or_default()))?;

        self.forest = forest;
        self.dirty = true;
        if let Some(ancestors) = tree_store::ancestor_ids(&self.forest, &new_id) {
            self.expand.reveal(ancestors);
        }
        tracing::info!("新增节点: {} ({})", new_id, name);
        if let Some(node) = tree_store::find(&self.forest, &new_id).filter(|n| n.level > MAX_FILE_LEVEL) {
            tracing::warn!("节点 {} 位于第 {} 层，文件格式无法保存该层级", new_id, node.level);
        }
        self.select(new_id)
    }

    fn delete(&mut self, id: &str) -> Result<(), AppError> {
        let removed = tree_store::subtree_ids(self.require(id)?);
        self.forest = tree_store::remove(&self.forest, id);
        self.dirty = true;
        self.expand.prune(&removed);

        let hit = |slot: Option<&str>| slot.is_some_and(|s| removed.iter().any(|r| r == s));
        if hit(self.selection.as_deref()) {
            self.selection = None;
            self.mode = EditMode::Viewing;
        }
        if hit(self.rename.as_ref().map(|r| r.id.as_str())) {
            self.rename = None;
        }
        tracing::info!("删除节点 {}，共移除 {} 个节点", id, removed.len());
        Ok(())
    }

    fn save_changes(&mut self) -> Result<(), AppError> {
        let draft = self
            .draft()
            .cloned()
            .ok_or_else(|| AppError::State("当前不在编辑模式".into()))?;
        let id = self
            .selection
            .clone()
            .ok_or_else(|| AppError::State("没有选中的节点".into()))?;
        let updated = draft.commit(self.require(&id)?)?;

        self.forest = tree_store::replace(&self.forest, &id, &updated);
        self.mode = EditMode::Viewing;
        self.dirty = true;
        tracing::info!("已保存节点修改: {}", id);
        Ok(())
    }

    fn commit_rename(&mut self, name: &str) -> Result<(), AppError> {
        let rename = self
            .rename
            .clone()
            .ok_or_else(|| AppError::State("当前没有进行重命名".into()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidName(rename.id));
        }
        self.require(&rename.id)?;
        if name != rename.original {
            self.forest = tree_store::rename(&self.forest, &rename.id, name);
            self.dirty = true;
            tracing::info!("重命名 {}: {} -> {}", rename.id, rename.original, name);
        }
        self.rename = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SCENARIO: &str =
        r#"[{"word":"A","glob":false,"vars":[],"cat":[{"word":"B","glob":true,"vars":["x","y"]}]}]"#;

    /// 创建临时JSON文件用于测试
    fn create_test_json_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("创建临时文件失败");
        file.write_all(content.as_bytes()).expect("写入临时文件失败");
        file
    }

    fn scenario_state() -> AppState {
        let mut state = AppState::default();
        state.load_str(SCENARIO).expect("加载失败");
        state
    }

    #[test]
    fn test_load_file_and_failed_load_keeps_state() {
        let good = create_test_json_file(SCENARIO);
        let mut state = AppState::default();
        state.load_file(good.path()).expect("加载失败");
        assert_eq!(state.forest.len(), 1);
        assert_eq!(state.source_path.as_deref(), Some(good.path()));

        state.apply(Action::Select("1-1".into())).expect("选择失败");
        let bad = create_test_json_file("{ broken");
        assert!(matches!(state.load_file(bad.path()), Err(AppError::Parse(_))));
        let wrong_shape = create_test_json_file(r#"[{"word":"A","subcat":[{"word":"B"}]}]"#);
        assert!(matches!(state.load_file(wrong_shape.path()), Err(AppError::Shape(_))));

        assert_eq!(state.forest.len(), 1);
        assert_eq!(state.selection.as_deref(), Some("1-1"));
        assert_eq!(state.source_path.as_deref(), Some(good.path()));
    }

    #[test]
    fn test_sample_document_is_valid() {
        let mut state = AppState::default();
        state.load_sample().expect("示例加载失败");
        assert_eq!(state.forest.len(), 4);
        assert!(crate::model::node::validate_forest(&state.forest, &state.config).is_ok());
        assert!(render_document(&state.forest).is_ok());
    }

    #[test]
    fn test_add_root_child_and_sibling() {
        let mut state = AppState::default();
        state
            .apply(Action::Add { target: None, name: "first".into() })
            .expect("添加失败");
        assert_eq!(state.selection.as_deref(), Some("1"));
        assert!(state.dirty);

        state.apply(Action::Add { target: Some("1".into()), name: "c".into() }).expect("添加失败");
        state.apply(Action::Add { target: Some("1-1".into()), name: "s".into() }).expect("添加失败");
        state.apply(Action::Add { target: Some("1-1-1".into()), name: "l".into() }).expect("添加失败");
        assert_eq!(state.selection.as_deref(), Some("1-1-1-1"));
        assert!(state.expand.is_expanded("1-1-1"));

        // 第 4 层为最大层级，添加变为插入同级
        state
            .apply(Action::Add { target: Some("1-1-1-1".into()), name: "l2".into() })
            .expect("添加失败");
        assert_eq!(state.selection.as_deref(), Some("1-1-1-2"));
        assert_eq!(tree_store::find(&state.forest, "1-1-1-2").map(|n| n.level), Some(4));
    }

    #[test]
    fn test_add_errors_leave_state() {
        let mut state = scenario_state();
        let before = state.forest.clone();
        assert!(matches!(
            state.apply(Action::Add { target: Some("9".into()), name: "x".into() }),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            state.apply(Action::Add { target: None, name: "  ".into() }),
            Err(AppError::InvalidName(_))
        ));
        assert_eq!(state.forest, before);
        assert!(!state.dirty);
    }

    #[test]
    fn test_delete_clears_selection_and_expand() {
        let mut state = scenario_state();
        state.apply(Action::ToggleExpand("1".into())).expect("展开失败");
        state.apply(Action::Select("1-1".into())).expect("选择失败");
        state.apply(Action::BeginEdit).expect("编辑失败");

        state.apply(Action::Delete("1".into())).expect("删除失败");
        assert!(state.forest.is_empty());
        assert!(state.selection.is_none());
        assert!(!state.is_editing());
        assert!(state.expand.is_empty());

        assert!(matches!(state.apply(Action::Delete("1".into())), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_edit_state_machine() {
        let mut state = scenario_state();
        assert!(matches!(state.apply(Action::BeginEdit), Err(AppError::State(_))));

        state.apply(Action::Select("1-1".into())).expect("选择失败");
        state.apply(Action::BeginEdit).expect("编辑失败");
        state.apply(Action::DraftName("Beta".into())).expect("修改失败");
        state.apply(Action::DraftGlobal(false)).expect("修改失败");
        state.apply(Action::AddVariant("z".into())).expect("添加变体失败");
        state.apply(Action::AddVariant("x".into())).expect("重复变体应被忽略");
        state.apply(Action::RemoveVariant(0)).expect("删除变体失败");
        state.apply(Action::SaveChanges).expect("保存失败");

        assert!(!state.is_editing());
        let node = state.selected_node().expect("选中节点存在");
        assert_eq!(node.name, "Beta");
        assert!(!node.is_global);
        assert_eq!(node.variants, vec!["y", "z"]);
        assert!(state.dirty);
    }

    #[test]
    fn test_cancel_edit_and_switch_selection() {
        let mut state = scenario_state();
        state.apply(Action::Select("1-1".into())).expect("选择失败");
        state.apply(Action::BeginEdit).expect("编辑失败");
        state.apply(Action::DraftName("changed".into())).expect("修改失败");
        state.apply(Action::CancelEdit).expect("取消失败");
        assert_eq!(state.selected_node().map(|n| n.name.as_str()), Some("B"));

        state.apply(Action::BeginEdit).expect("编辑失败");
        state.apply(Action::Select("1".into())).expect("选择失败");
        assert!(!state.is_editing(), "切换选择应放弃编辑");
        assert!(matches!(state.apply(Action::SaveChanges), Err(AppError::State(_))));
        assert!(!state.dirty);
    }

    #[test]
    fn test_save_changes_rejects_blank_name() {
        let mut state = scenario_state();
        state.apply(Action::Select("1".into())).expect("选择失败");
        state.apply(Action::BeginEdit).expect("编辑失败");
        state.apply(Action::DraftName(" ".into())).expect("修改失败");
        assert!(matches!(state.apply(Action::SaveChanges), Err(AppError::InvalidName(_))));
        assert!(state.is_editing());
        assert_eq!(state.forest[0].name, "A");
    }

    #[test]
    fn test_inline_rename() {
        let mut state = scenario_state();
        state.apply(Action::BeginRename("1-1".into())).expect("重命名失败");
        assert_eq!(state.rename.as_ref().map(|r| r.original.as_str()), Some("B"));
        assert!(matches!(state.apply(Action::CommitRename("".into())), Err(AppError::InvalidName(_))));
        state.apply(Action::CommitRename("Bee".into())).expect("重命名失败");
        assert!(state.rename.is_none());
        assert_eq!(tree_store::find(&state.forest, "1-1").map(|n| n.name.as_str()), Some("Bee"));

        state.apply(Action::BeginRename("1".into())).expect("重命名失败");
        state.apply(Action::CancelRename).expect("取消失败");
        assert_eq!(state.forest[0].name, "A");
        assert!(matches!(state.apply(Action::CommitRename("x".into())), Err(AppError::State(_))));
    }

    #[test]
    fn test_rename_and_edit_are_exclusive() {
        let mut state = scenario_state();
        state.apply(Action::Select("1-1".into())).expect("选择失败");
        state.apply(Action::BeginRename("1-1".into())).expect("重命名失败");
        assert!(matches!(state.apply(Action::BeginEdit), Err(AppError::State(_))));
        assert!(!state.is_editing());

        state.apply(Action::CommitRename("Bee".into())).expect("重命名失败");
        state.apply(Action::BeginEdit).expect("编辑失败");
        assert_eq!(state.draft().map(|d| d.name.as_str()), Some("Bee"));
        assert!(matches!(state.apply(Action::BeginRename("1-1".into())), Err(AppError::State(_))));
        assert!(state.rename.is_none());

        state.apply(Action::AddVariant("z".into())).expect("添加变体失败");
        state.apply(Action::SaveChanges).expect("保存失败");
        let node = tree_store::find(&state.forest, "1-1").expect("节点存在");
        assert_eq!(node.name, "Bee");
        assert_eq!(node.variants, vec!["x", "y", "z"]);
    }

    #[test]
    fn test_load_rejects_levels_beyond_config() {
        let deep = r#"[{"word":"A","cat":[{"word":"B","subcat":[{"word":"C"}]}]}]"#;
        let mut state = AppState::with_config(TreeConfig { max_level: 2 });
        state.load_str(SCENARIO).expect("加载失败");
        let before = state.forest.clone();

        assert!(matches!(state.load_str(deep), Err(AppError::Invariant(_))));
        let file = create_test_json_file(deep);
        assert!(matches!(state.load_file(file.path()), Err(AppError::Invariant(_))));
        assert_eq!(state.forest, before);
        assert!(state.source_path.is_none());
    }

    #[test]
    fn test_outcome_reports_expand_changes() {
        let mut state = scenario_state();
        let changed = |outcome: Result<ApplyOutcome, AppError>| outcome.expect("命令失败").expand_changed;

        assert!(!changed(state.apply(Action::Select("1".into()))));
        assert!(changed(state.apply(Action::ToggleExpandAll)));
        assert!(changed(state.apply(Action::ToggleExpandAll)));
        assert!(changed(state.apply(Action::ToggleExpand("1".into()))));
        assert!(changed(state.apply(Action::ToggleExpand("1".into()))));
        assert!(changed(state.apply(Action::RevealSearchHit("1-1".into()))));
        assert!(!changed(state.apply(Action::RevealSearchHit("1-1".into()))));

        // 新增到未展开的父节点下会展开父节点
        assert!(changed(state.apply(Action::Add { target: Some("1-1".into()), name: "c".into() })));
        assert!(changed(state.apply(Action::Delete("1-1".into()))));
        assert!(!changed(state.apply(Action::Add { target: None, name: "r".into() })));
    }

    #[test]
    fn test_reveal_search_hit() {
        let mut state = scenario_state();
        state.apply(Action::RevealSearchHit("1-1".into())).expect("定位失败");
        assert!(state.expand.is_expanded("1"));
        assert_eq!(state.selection.as_deref(), Some("1-1"));
        let ids: Vec<String> = state.rows().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["1", "1-1"]);
        assert!(matches!(state.apply(Action::RevealSearchHit("3".into())), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_toggle_expand_all() {
        let mut state = AppState::default();
        state.load_sample().expect("示例加载失败");
        state.apply(Action::ToggleExpandAll).expect("展开失败");
        assert!(state.expanded_all);
        assert_eq!(state.rows().len(), tree_store::count_nodes(&state.forest));
        state.apply(Action::ToggleExpandAll).expect("折叠失败");
        assert_eq!(state.rows().len(), state.forest.len());
    }

    #[test]
    fn test_save_as_and_reload_is_idempotent() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let mut state = AppState::default();
        state.load_sample().expect("示例加载失败");
        assert!(matches!(state.save(), Err(AppError::State(_))));

        let written = state.save_as(&dir.path().join("out")).expect("保存失败");
        assert_eq!(written, dir.path().join("out.json"));
        assert_eq!(state.source_path.as_deref(), Some(written.as_path()));

        let mut reloaded = AppState::default();
        reloaded.load_file(&written).expect("重新加载失败");
        assert_eq!(reloaded.forest, state.forest);

        let first = std::fs::read_to_string(&written).expect("读取失败");
        reloaded.save().expect("保存失败");
        let second = std::fs::read_to_string(&written).expect("读取失败");
        assert_eq!(first, second);
    }

    #[test]
    fn test_save_refuses_unrepresentable_depth() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let mut state = scenario_state();
        state.apply(Action::Add { target: Some("1-1".into()), name: "c".into() }).expect("添加失败");
        state.apply(Action::Add { target: Some("1-1-1".into()), name: "d".into() }).expect("添加失败");
        let target = dir.path().join("deep.json");
        assert!(matches!(state.save_as(&target), Err(AppError::Invariant(_))));
        assert!(!target.exists());
        assert!(state.dirty);
    }
}
