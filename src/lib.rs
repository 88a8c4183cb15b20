//! 关键词树编辑器库
//!
//! 提供关键词树的按 id 寻址修改、持久化格式转换、名称搜索与展开状态管理
//! 遵循MVVM架构模式，UI 只通过 [`Action`] 驱动状态变化

pub mod model;
pub mod utils;
pub mod vm;

// 重新导出主要类型
pub use model::data_core::{Action, AppError, AppState, ApplyOutcome, EditMode};
pub use model::node::{Forest, Node, TreeConfig};
pub use model::search::{search, SearchHit};
pub use model::tree_view::{ExpandState, TreeRow};
