//! Remote path processing utility functions / 远端路径处理工具函数

use crate::error::{Error, Result};

/// Characters the storage service refuses in object names / 对象名禁止字符
/// Backslashes are not listed: they are normalized to `/` / 反斜杠会被规范化为 /
const ILLEGAL_CHARS: &[char] = &['?', '*', ':', '|', '<', '>', '"'];

/// Clean and normalize path / 清理和规范化路径
/// 1. Replace backslashes with forward slashes / 将反斜杠替换为正斜杠
/// 2. Ensure path starts with / / 确保路径以 / 开头
/// 3. Clean . and .. in path / 清理路径中的 . 和 ..
///
/// The trailing separator is dropped; callers that care about it check the raw input.
pub fn fix_and_clean_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = if path.starts_with('/') {
        path
    } else {
        format!("/{}", path)
    };

    clean_path(&path)
}

/// Clean path, handle ., .. and duplicate / / 清理路径，处理 . 和 .. 和重复的 /
fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Whether the path denotes a directory (ends with the separator) / 是否为目录路径
pub fn is_dir_path(path: &str) -> bool {
    path.ends_with('/')
}

fn check_name_chars(path: &str) -> bool {
    !path.contains(ILLEGAL_CHARS)
}

/// Validate a destination file path and return its normalized form / 校验文件路径
///
/// Fails with [`Error::InvalidFilePath`] when the path is empty, denotes a
/// directory, normalizes to the root, or carries characters the service rejects.
pub fn validate_file_path(path: &str) -> Result<String> {
    if path.trim().is_empty() || is_dir_path(path) || !check_name_chars(path) {
        return Err(Error::InvalidFilePath(path.to_string()));
    }
    let cleaned = fix_and_clean_path(path);
    if cleaned == "/" {
        return Err(Error::InvalidFilePath(path.to_string()));
    }
    Ok(cleaned)
}

/// Validate a folder path, returning it normalized with a trailing `/` / 校验目录路径
pub fn validate_folder_path(path: &str) -> Result<String> {
    if !is_dir_path(path) || !check_name_chars(path) {
        return Err(Error::InvalidFolderPath(path.to_string()));
    }
    let cleaned = fix_and_clean_path(path);
    if cleaned == "/" {
        Ok(cleaned)
    } else {
        Ok(format!("{}/", cleaned))
    }
}

/// Percent-encode every segment while keeping `/` / 逐段 URL 编码
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Get file name from path / 获取文件名
pub fn file_name(path: &str) -> &str {
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}
