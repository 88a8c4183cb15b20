//! VM桥接层：连接Slint UI与AppState数据模型
//!
//! 注意：回调绑定在main.rs中实现，因为依赖于Slint生成的类型
//! 这里提供状态文案常量与不依赖Slint的展示辅助函数

use crate::model::converter::MAX_FILE_LEVEL;
use crate::model::data_core::AppState;
use crate::model::tree_view::TreeRow;

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_LOADED: &str = "文件加载完成";
pub const STATUS_SAVED: &str = "保存成功";
pub const STATUS_EDITING: &str = "编辑中";
pub const STATUS_CHANGES_SAVED: &str = "修改已保存";
pub const STATUS_EDIT_CANCELLED: &str = "已取消编辑";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";

pub const HELP_TEXT: &str = "- 左侧树用于浏览关键词\n\
- 选中节点后在右侧查看属性\n\
- 点击“编辑”修改属性，编辑模式下可增删变体\n\
- 双击节点进行行内重命名\n\
- 使用工具栏进行打开、保存、添加、删除与查找\n\
- 查找窗口中 ↑/↓ 选择结果，Enter 打开，Esc 关闭";

/// 树行的显示标签（含变体数量提示）
pub fn row_label(row: &TreeRow) -> String {
    if row.variant_count > 0 {
        format!("{} ({})", row.name, row.variant_count)
    } else {
        row.name.clone()
    }
}

/// 窗口标题：文件名 + 未保存标记
pub fn window_title(state: &AppState) -> String {
    let file = state
        .source_path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "未命名".to_string());
    let marker = if state.dirty { " *" } else { "" };
    format!("关键词树编辑器 - {}{}", file, marker)
}

/// 添加对话框的位置说明；新节点超出文件可保存层级时附加警告
pub fn add_hint(state: &AppState) -> String {
    let Some(node) = state.selected_node() else {
        return "新建根节点".to_string();
    };
    if node.level >= state.config.max_level {
        return format!("在 “{}” 之后添加同级节点", node.name);
    }
    let hint = format!("在 “{}” 下添加子节点", node.name);
    if node.level + 1 > MAX_FILE_LEVEL {
        format!("{}（第 {} 层无法保存到文件）", hint, node.level + 1)
    } else {
        hint
    }
}

/// 查找结果的键盘上下移动，结果为空时停在 0
pub fn step_search_selection(current: i32, len: usize, down: bool) -> i32 {
    let last = i32::try_from(len).unwrap_or(i32::MAX) - 1;
    if last < 0 {
        return 0;
    }
    let next = if down { current + 1 } else { current - 1 };
    next.clamp(0, last)
}

/// 格式化错误状态文案
pub fn error_status(e: &impl std::fmt::Display) -> String {
    format!("{}{}", STATUS_ERROR_PREFIX, e)
}
