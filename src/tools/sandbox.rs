//! 工作区沙箱：所有路径先做词法规范化（折叠 . 与 ..），再校验必须等于根目录或位于其下；
//! 最后一段以 '.' 开头的路径一律拒绝（.env、.git 等）。
//!
//! 文件大小上限不在这里检查，由 filesystem 中的读写操作负责。

use std::fmt;
use std::path::{Component, Path, PathBuf};

use crate::core::ToolError;

/// 已证明位于工作区内的绝对路径，只能由 WorkspaceSandbox 构造
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath(PathBuf);

impl ResolvedPath {
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// 沙箱：绑定根目录，启动后不再修改
#[derive(Debug, Clone)]
pub struct WorkspaceSandbox {
    root: PathBuf,
}

impl WorkspaceSandbox {
    /// root 为相对路径时相对当前目录；已存在时取 canonicalize 结果（消除符号链接前缀）
    pub fn new(root: impl AsRef<Path>) -> Result<Self, ToolError> {
        let root = root.as_ref();
        let absolute = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        let root = absolute
            .canonicalize()
            .unwrap_or_else(|_| normalize(&absolute));
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 解析基准目录：None 为根目录；绝对路径直接规范化；相对路径拼到根下
    pub fn resolve_base(&self, base: Option<&str>) -> Result<ResolvedPath, ToolError> {
        let Some(base) = base else {
            return Ok(ResolvedPath(self.root.clone()));
        };
        let candidate = self.join_normalized(&self.root, base);
        if !self.contains(&candidate) {
            return Err(ToolError::PathEscape(base.to_string()));
        }
        Ok(ResolvedPath(candidate))
    }

    /// 将 input 相对 base 解析为安全路径；逃逸返回 PathEscape，隐藏文件返回 HiddenFileRejected
    pub fn to_safe_path(&self, input: &str, base: Option<&str>) -> Result<ResolvedPath, ToolError> {
        let base = self.resolve_base(base)?;
        let candidate = self.join_normalized(base.as_path(), input);
        if !self.contains(&candidate) {
            return Err(ToolError::PathEscape(input.to_string()));
        }
        let hidden = candidate
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(false);
        if hidden {
            return Err(ToolError::HiddenFileRejected(input.to_string()));
        }
        Ok(ResolvedPath(candidate))
    }

    fn join_normalized(&self, base: &Path, input: &str) -> PathBuf {
        let input = Path::new(input);
        if input.is_absolute() {
            normalize(input)
        } else {
            normalize(&base.join(input))
        }
    }

    /// 按路径组件比较，/ws2 不会被当成 /ws 的子目录
    fn contains(&self, path: &Path) -> bool {
        path == self.root || path.starts_with(&self.root)
    }
}

/// 纯词法规范化：去掉 '.'，'..' 弹出上一段（在根处停住），不访问文件系统
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(seg) => out.push(seg),
        }
    }
    out
}
