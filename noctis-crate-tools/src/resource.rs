use std::path::{Path, PathBuf};

/// 统一路径管理
///
/// 所有路径基于工作区根目录（通过 `CARGO_MANIFEST_DIR` 推导）。
///
/// # 使用示例
/// ```ignore
/// let config = NoctisPath::config_path("noctis.toml"); // config/noctis.toml
/// ```
pub struct NoctisPath {}
// 核心路径
impl NoctisPath {
    /// 获取工作区根目录
    ///
    /// 本 crate 位于工作区根目录下，因此 manifest 目录的上一级即为工作区。
    pub fn workspace_path() -> PathBuf {
        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        manifest_dir.parent().unwrap_or(manifest_dir).to_path_buf()
    }

    pub fn target_path() -> PathBuf {
        Self::workspace_path().join("target")
    }
}
// 根目录下
impl NoctisPath {
    pub fn engine_path() -> PathBuf {
        Self::workspace_path().join("engine")
    }

    /// 获取 `config/` 目录下的文件路径
    pub fn config_path(filename: &str) -> PathBuf {
        Self::workspace_path().join("config").join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_under_workspace() {
        let path = NoctisPath::config_path("noctis.toml");
        assert!(path.starts_with(NoctisPath::workspace_path()));
        assert!(path.ends_with("config/noctis.toml"));
    }
}
