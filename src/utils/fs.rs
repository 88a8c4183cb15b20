//! IO helper: safe file read/write for keyword documents

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde_json::Value;
use crate::model::data_core::AppError;

/// 从文件读取JSON数据
pub fn read_json_file(p: &Path) -> Result<Value, AppError> {
    let f = File::open(p)?;
    let rdr = BufReader::new(f);
    let v: Value = serde_json::from_reader(rdr)?;
    Ok(v)
}

/// 将文本写入文件（整体覆盖）
pub fn write_text_file(p: &Path, text: &str) -> Result<(), AppError> {
    let f = File::create(p)?;
    let mut w = BufWriter::new(f);
    w.write_all(text.as_bytes())?;
    w.flush()?;
    Ok(())
}

/// 将JSON数据保存到文件（格式化输出）
pub fn write_json_file(p: &Path, value: &Value) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)?;
    write_text_file(p, &text)
}

/// 缺少 `.json` 后缀时补上
pub fn ensure_json_extension(p: &Path) -> PathBuf {
    let has_json = p
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if has_json {
        p.to_path_buf()
    } else {
        let mut name = p.as_os_str().to_owned();
        name.push(".json");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ensure_json_extension() {
        assert_eq!(ensure_json_extension(Path::new("keywords")), PathBuf::from("keywords.json"));
        assert_eq!(ensure_json_extension(Path::new("a/b.JSON")), PathBuf::from("a/b.JSON"));
        assert_eq!(ensure_json_extension(Path::new("v1.2")), PathBuf::from("v1.2.json"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let path = dir.path().join("doc.json");
        let value = json!([{"word": "A", "glob": false, "vars": []}]);
        write_json_file(&path, &value).expect("写入失败");
        assert_eq!(read_json_file(&path).expect("读取失败"), value);
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("创建临时目录失败");
        let result = read_json_file(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
