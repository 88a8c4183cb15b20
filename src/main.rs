//! 程序入口：初始化日志与配置、加载 Slint UI，并完成 VM 绑定

use std::{cell::RefCell, path::PathBuf, rc::Rc};
use tracing_subscriber::fmt::SubscriberBuilder;
use slint::{ComponentHandle, Model, ModelRc, SharedString, VecModel};

slint::include_modules!();

use keyword_tree::model::tree_store;
use keyword_tree::utils::settings::{Settings, UiStateStore};
use keyword_tree::vm::bridge::*;
use keyword_tree::{search, Action, AppState, ApplyOutcome, SearchHit, TreeRow};

// TreeNodeData转换实现
impl From<&TreeRow> for TreeNodeData {
    /// 将树行转换为Slint可用的数据结构
    fn from(row: &TreeRow) -> Self {
        Self {
            id: row.id.clone().into(),
            label: row_label(row).into(),
            name: row.name.clone().into(),
            depth: row.depth as i32,
            expandable: row.expandable,
            expanded: row.expanded,
            selected: row.selected,
            is_global: row.is_global,
            renaming: row.renaming,
        }
    }
}

// SearchItemData 转换实现（用于查找结果列表）
impl From<&SearchHit> for SearchItemData {
    fn from(hit: &SearchHit) -> Self {
        Self {
            id: hit.id.clone().into(),
            path_text: hit.path_text().into(),
        }
    }
}

/// VM桥接器：管理UI与数据层的交互
struct ViewModelBridge {
    app_state: Rc<RefCell<AppState>>,
    ui_store: Rc<UiStateStore>,
    settings: Rc<Settings>,
    // 等待确认删除的节点
    pending_delete: Rc<RefCell<Option<String>>>,
}

impl ViewModelBridge {
    /// 创建新的VM桥接器并绑定所有回调
    fn new(app_window: &AppWindow, app_state: Rc<RefCell<AppState>>, ui_store: UiStateStore, settings: Settings) -> Self {
        let bridge = Self {
            app_state,
            ui_store: Rc::new(ui_store),
            settings: Rc::new(settings),
            pending_delete: Rc::new(RefCell::new(None)),
        };

        // 绑定所有UI回调
        bridge.setup_callbacks(app_window);
        bridge
    }

    /// 设置所有UI回调函数
    fn setup_callbacks(&self, app_window: &AppWindow) {
        let app_state = self.app_state.clone();

        // === 文件操作回调 ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_open_file(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_open_file(&app_window, &app_state);
                }
            });
        }
        {
            let app_state = app_state.clone();
            let settings = self.settings.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_save_file(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_save_file(&app_window, &app_state, &settings);
                }
            });
        }
        {
            let app_state = app_state.clone();
            let settings = self.settings.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_save_as_file(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_save_as_file(&app_window, &app_state, &settings);
                }
            });
        }

        // === 添加 / 删除回调 ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_add_pressed(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_add_pressed(&app_window, &app_state);
                }
            });
        }
        {
            let app_state = app_state.clone();
            let ui_store = self.ui_store.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_add_confirmed(move |name| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_add_confirmed(&app_window, &app_state, &ui_store, name.as_str());
                }
            });
        }
        {
            let app_state = app_state.clone();
            let pending_delete = self.pending_delete.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_delete_pressed(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_delete_pressed(&app_window, &app_state, &pending_delete);
                }
            });
        }
        {
            let app_state = app_state.clone();
            let ui_store = self.ui_store.clone();
            let pending_delete = self.pending_delete.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_delete_confirmed(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    app_window.set_confirm_dialog_visible(false);
                    let Some(id) = pending_delete.borrow_mut().take() else {
                        return;
                    };
                    if let Some(outcome) = Self::dispatch(&app_window, &app_state, Action::Delete(id.clone())) {
                        Self::persist_expand(&app_state, &ui_store, outcome);
                        app_window.set_status_message(format!("已删除: {}", id).into());
                    }
                }
            });
        }

        // === 展开 / 折叠回调 ===
        {
            let app_state = app_state.clone();
            let ui_store = self.ui_store.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_toggle_expand_all(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    if let Some(outcome) = Self::dispatch(&app_window, &app_state, Action::ToggleExpandAll) {
                        Self::persist_expand(&app_state, &ui_store, outcome);
                    }
                }
            });
        }
        {
            let app_state = app_state.clone();
            let ui_store = self.ui_store.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_toggle_node_expanded(move |id| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    if let Some(outcome) = Self::dispatch(&app_window, &app_state, Action::ToggleExpand(id.to_string())) {
                        Self::persist_expand(&app_state, &ui_store, outcome);
                    }
                }
            });
        }

        // === 选择与行内重命名回调 ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_node_selected(move |id| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::dispatch(&app_window, &app_state, Action::Select(id.to_string()));
                }
            });
        }
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_deselect(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::dispatch(&app_window, &app_state, Action::Deselect);
                }
            });
        }
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_begin_rename(move |id| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::dispatch(&app_window, &app_state, Action::BeginRename(id.to_string()));
                }
            });
        }
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_commit_rename(move |name| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    if Self::dispatch(&app_window, &app_state, Action::CommitRename(name.to_string())).is_some() {
                        app_window.set_status_message(format!("已重命名为: {}", name).into());
                    }
                }
            });
        }
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_cancel_rename(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::dispatch(&app_window, &app_state, Action::CancelRename);
                }
            });
        }

        // === 属性编辑回调 ===
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_edit_pressed(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    if Self::dispatch(&app_window, &app_state, Action::BeginEdit).is_some() {
                        app_window.set_status_message(STATUS_EDITING.into());
                    }
                }
            });
        }
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_save_changes(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    if Self::dispatch(&app_window, &app_state, Action::SaveChanges).is_some() {
                        app_window.set_status_message(STATUS_CHANGES_SAVED.into());
                    }
                }
            });
        }
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_cancel_edit(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    if Self::dispatch(&app_window, &app_state, Action::CancelEdit).is_some() {
                        app_window.set_status_message(STATUS_EDIT_CANCELLED.into());
                    }
                }
            });
        }
        {
            // 草稿字段变化不重建视图，避免打断输入
            let app_state = app_state.clone();
            app_window.on_draft_name_edited(move |name| {
                if let Err(e) = app_state.borrow_mut().apply(Action::DraftName(name.to_string())) {
                    tracing::warn!("更新草稿名称失败: {}", e);
                }
            });
        }
        {
            let app_state = app_state.clone();
            app_window.on_draft_global_toggled(move |flag| {
                if let Err(e) = app_state.borrow_mut().apply(Action::DraftGlobal(flag)) {
                    tracing::warn!("更新全局标记失败: {}", e);
                }
            });
        }
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_add_variant(move |text| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    if Self::apply_quiet(&app_window, &app_state, Action::AddVariant(text.to_string())).is_some() {
                        app_window.set_new_variant("".into());
                        Self::refresh_variants(&app_window, &app_state);
                    }
                }
            });
        }
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_remove_variant(move |index| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    let Ok(index) = usize::try_from(index) else {
                        return;
                    };
                    if Self::apply_quiet(&app_window, &app_state, Action::RemoveVariant(index)).is_some() {
                        Self::refresh_variants(&app_window, &app_state);
                    }
                }
            });
        }

        // === 查找回调 ===
        {
            let app_window_weak = app_window.as_weak();
            app_window.on_find_pressed(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    app_window.set_search_query("".into());
                    app_window.set_search_results(ModelRc::new(VecModel::<SearchItemData>::default()));
                    app_window.set_search_selected_index(0);
                    app_window.set_search_visible(true);
                }
            });
        }
        {
            let app_state = app_state.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_search_changed(move |query| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_search_changed(&app_window, &app_state, query.as_str());
                }
            });
        }
        {
            let app_state = app_state.clone();
            let ui_store = self.ui_store.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_search_accepted(move |id| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    if !id.is_empty() {
                        Self::handle_search_item_selected(&app_window, &app_state, &ui_store, id.as_str());
                    }
                }
            });
        }
        {
            let app_window_weak = app_window.as_weak();
            app_window.on_search_move(move |down| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    let len = app_window.get_search_results().row_count();
                    let next = step_search_selection(app_window.get_search_selected_index(), len, down);
                    app_window.set_search_selected_index(next);
                }
            });
        }
        {
            let app_state = app_state.clone();
            let ui_store = self.ui_store.clone();
            let app_window_weak = app_window.as_weak();
            app_window.on_search_item_selected(move |id| {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::handle_search_item_selected(&app_window, &app_state, &ui_store, id.as_str());
                }
            });
        }
        {
            let app_window_weak = app_window.as_weak();
            app_window.on_close_search(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    app_window.set_search_visible(false);
                }
            });
        }

        // === 消息对话框回调 ===
        {
            let app_window_weak = app_window.as_weak();
            app_window.on_help_pressed(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    Self::show_message(&app_window, "帮助", HELP_TEXT);
                }
            });
        }
        {
            let app_window_weak = app_window.as_weak();
            app_window.on_close_message_dialog(move || {
                if let Some(app_window) = app_window_weak.upgrade() {
                    app_window.set_message_dialog_visible(false);
                }
            });
        }
    }

    /// 初始化UI状态
    fn initialize_ui(&self, app_window: &AppWindow, status: &str) {
        app_window.set_status_message(status.into());
        Self::refresh(app_window, &self.app_state);
    }

    /// 执行命令并刷新视图；失败时写入状态栏
    fn dispatch(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>, action: Action) -> Option<ApplyOutcome> {
        let outcome = Self::apply_quiet(app_window, app_state, action);
        Self::refresh(app_window, app_state);
        outcome
    }

    /// 执行命令但不重建视图
    fn apply_quiet(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>, action: Action) -> Option<ApplyOutcome> {
        let result = app_state.borrow_mut().apply(action);
        match result {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                app_window.set_status_message(error_status(&e).into());
                tracing::warn!("命令执行失败: {}", e);
                None
            }
        }
    }

    /// 从当前快照重建树、属性面板与标题
    fn refresh(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>) {
        let state = app_state.borrow();

        let rows: Vec<TreeNodeData> = state.rows().iter().map(TreeNodeData::from).collect();
        app_window.set_tree_model(ModelRc::new(VecModel::from(rows)));
        app_window.set_has_selection(state.selected_node().is_some());
        app_window.set_is_editing(state.is_editing());
        app_window.set_expanded_all(state.expanded_all);
        app_window.set_window_title(window_title(&state).into());
        app_window.set_current_path(
            state
                .source_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
                .into(),
        );

        match state.selected_node() {
            Some(node) => {
                app_window.set_item_id(node.id.clone().into());
                app_window.set_item_level(node.level.to_string().into());
                let (name, global) = match state.draft() {
                    Some(draft) => (draft.name.clone(), draft.is_global),
                    None => (node.name.clone(), node.is_global),
                };
                app_window.set_item_name(name.into());
                app_window.set_item_global(global);
            }
            None => {
                app_window.set_item_id("".into());
                app_window.set_item_level("".into());
                app_window.set_item_name("".into());
                app_window.set_item_global(false);
            }
        }
        drop(state);
        Self::refresh_variants(app_window, app_state);
    }

    /// 只刷新变体列表（编辑中显示草稿）
    fn refresh_variants(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>) {
        let state = app_state.borrow();
        let variants: Vec<SharedString> = match (state.draft(), state.selected_node()) {
            (Some(draft), _) => draft.variants.iter().map(SharedString::from).collect(),
            (None, Some(node)) => node.variants.iter().map(SharedString::from).collect(),
            (None, None) => Vec::new(),
        };
        app_window.set_item_variants(ModelRc::new(VecModel::from(variants)));
    }

    /// 展开集合变化时持久化（失败只记录日志）
    fn persist_expand(app_state: &Rc<RefCell<AppState>>, ui_store: &UiStateStore, outcome: ApplyOutcome) {
        if !outcome.expand_changed {
            return;
        }
        if let Err(e) = ui_store.save_expanded(&app_state.borrow().expand) {
            tracing::warn!("保存展开状态失败: {}", e);
        }
    }

    fn show_message(app_window: &AppWindow, title: &str, text: &str) {
        app_window.set_message_dialog_title(title.into());
        app_window.set_message_dialog_text(text.into());
        app_window.set_message_dialog_visible(true);
    }

    /// 显示文件选择对话框
    fn show_open_dialog() -> Option<PathBuf> {
        use rfd::FileDialog;

        let file_path = FileDialog::new()
            .add_filter("JSON文件", &["json"])
            .add_filter("所有文件", &["*"])
            .set_title("选择关键词文件")
            .pick_file();

        match file_path {
            Some(path) => {
                tracing::info!("用户选择了文件: {}", path.display());
                Some(path)
            }
            None => {
                tracing::info!("用户取消了文件选择");
                None
            }
        }
    }

    /// 显示另存为对话框
    fn show_save_dialog(default_name: &str) -> Option<PathBuf> {
        use rfd::FileDialog;

        FileDialog::new()
            .add_filter("JSON文件", &["json"])
            .set_title("保存关键词文件")
            .set_file_name(default_name)
            .save_file()
    }

    /// 处理打开文件
    fn handle_open_file(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>) {
        let Some(file_path) = Self::show_open_dialog() else {
            app_window.set_status_message("未选择文件".into());
            return;
        };

        let load_result = app_state.borrow_mut().load_file(&file_path);
        match load_result {
            Ok(()) => {
                app_window.set_status_message(STATUS_LOADED.into());
            }
            Err(e) => {
                app_window.set_status_message(error_status(&e).into());
                Self::show_message(app_window, "加载失败", &e.to_string());
                tracing::error!("文件加载失败: {}", e);
            }
        }
        Self::refresh(app_window, app_state);
    }

    /// 处理保存；未关联文件时转为另存为
    fn handle_save_file(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>, settings: &Settings) {
        if app_state.borrow().source_path.is_none() {
            Self::handle_save_as_file(app_window, app_state, settings);
            return;
        }
        let result = app_state.borrow_mut().save();
        Self::report_save(app_window, app_state, result);
    }

    /// 处理另存为
    fn handle_save_as_file(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>, settings: &Settings) {
        let default_name = app_state
            .borrow()
            .source_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| settings.default_file_name.clone());
        let Some(path) = Self::show_save_dialog(&default_name) else {
            app_window.set_status_message("已取消保存".into());
            return;
        };
        let result = app_state.borrow_mut().save_as(&path);
        Self::report_save(app_window, app_state, result);
    }

    fn report_save(
        app_window: &AppWindow,
        app_state: &Rc<RefCell<AppState>>,
        result: Result<PathBuf, keyword_tree::AppError>,
    ) {
        match result {
            Ok(path) => {
                app_window.set_status_message(format!("{}: {}", STATUS_SAVED, path.display()).into());
            }
            Err(e) => {
                app_window.set_status_message(error_status(&e).into());
                Self::show_message(app_window, "保存失败", &e.to_string());
                tracing::error!("文件保存失败: {}", e);
            }
        }
        Self::refresh(app_window, app_state);
    }

    /// 打开添加对话框，根据选中节点说明添加位置
    fn handle_add_pressed(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>) {
        app_window.set_add_hint(add_hint(&app_state.borrow()).into());
        app_window.set_add_name("".into());
        app_window.set_add_dialog_visible(true);
    }

    fn handle_add_confirmed(
        app_window: &AppWindow,
        app_state: &Rc<RefCell<AppState>>,
        ui_store: &UiStateStore,
        name: &str,
    ) {
        let target = app_state.borrow().selection.clone();
        if let Some(outcome) = Self::dispatch(app_window, app_state, Action::Add { target, name: name.to_string() }) {
            app_window.set_add_dialog_visible(false);
            Self::persist_expand(app_state, ui_store, outcome);
            let new_id = app_state.borrow().selection.clone().unwrap_or_default();
            app_window.set_status_message(format!("已添加: {} ({})", name.trim(), new_id).into());
        }
    }

    /// 请求删除确认
    fn handle_delete_pressed(
        app_window: &AppWindow,
        app_state: &Rc<RefCell<AppState>>,
        pending_delete: &Rc<RefCell<Option<String>>>,
    ) {
        let state = app_state.borrow();
        let Some(node) = state.selected_node() else {
            app_window.set_status_message("错误: 没有选中的节点".into());
            return;
        };
        let descendants = tree_store::subtree_ids(node).len() - 1;
        let text = if descendants > 0 {
            format!("确定删除 “{}” 及其 {} 个子节点吗？", node.name, descendants)
        } else {
            format!("确定删除 “{}” 吗？", node.name)
        };
        *pending_delete.borrow_mut() = Some(node.id.clone());
        app_window.set_confirm_text(text.into());
        app_window.set_confirm_dialog_visible(true);
    }

    /// 处理查找输入变化
    fn handle_search_changed(app_window: &AppWindow, app_state: &Rc<RefCell<AppState>>, query: &str) {
        let items: Vec<SearchItemData> = search(&app_state.borrow().forest, query)
            .iter()
            .map(SearchItemData::from)
            .collect();
        if !query.trim().is_empty() {
            app_window.set_status_message(format!("查找: {} ({} 个结果)", query, items.len()).into());
        }
        app_window.set_search_results(ModelRc::new(VecModel::from(items)));
        app_window.set_search_selected_index(0);
    }

    /// 选中查找结果：展开祖先并选中节点
    fn handle_search_item_selected(
        app_window: &AppWindow,
        app_state: &Rc<RefCell<AppState>>,
        ui_store: &UiStateStore,
        id: &str,
    ) {
        app_window.set_search_visible(false);
        if let Some(outcome) = Self::dispatch(app_window, app_state, Action::RevealSearchHit(id.to_string())) {
            Self::persist_expand(app_state, ui_store, outcome);
        }
    }
}

/// 示例与当前层级配置不符时以空文档启动
fn load_sample_or_empty(state: &mut AppState) {
    if let Err(e) = state.load_sample() {
        tracing::warn!("示例文档加载失败，使用空文档: {}", e);
    }
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::load();

    // 初始化日志输出
    let _ = SubscriberBuilder::default()
        .with_max_level(settings.tracing_level())
        .try_init();

    let app = AppWindow::new()?;
    let ui_store = UiStateStore::default();

    let mut state = AppState::with_config(settings.tree_config());
    state.expand = ui_store.load_expanded();

    // 命令行参数指定文件时直接打开，否则加载内置示例
    let status = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => match state.load_file(&path) {
            Ok(()) => STATUS_LOADED.to_string(),
            Err(e) => {
                tracing::error!("启动时加载 {} 失败: {}", path.display(), e);
                load_sample_or_empty(&mut state);
                error_status(&e)
            }
        },
        None => {
            load_sample_or_empty(&mut state);
            STATUS_READY.to_string()
        }
    };

    let state = Rc::new(RefCell::new(state));

    // 创建VM桥接器并绑定UI回调
    let bridge = ViewModelBridge::new(&app, state, ui_store, settings);
    bridge.initialize_ui(&app, &status);

    tracing::info!("应用启动成功，UI已初始化");
    app.run()?;
    Ok(())
}
