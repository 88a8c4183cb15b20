//! 构建脚本：编译 Slint 界面定义

fn main() {
    slint_build::compile("ui/app.slint").expect("Slint UI 编译失败");
}
