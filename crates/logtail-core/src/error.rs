//! 错误类型（对外暴露）
//!
//! 只有“打开文件失败”与读取过程中的 I/O 错误会让一次扫描整体失败；
//! 无法解析的行、非法的排除/搜索表达式、超时等都通过结果字段报告。
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// 日志文件无法打开（缺失或无权限），本次轮询整体失败
    #[error("cannot open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 打开之后的读取/定位失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 记录正则或块起始标记无法编译
    #[error("invalid pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("unknown timezone: {0}")]
    Timezone(String),

    /// 配置文件条目不合法
    #[error("profile error: {0}")]
    Profile(String),
}

pub type Result<T> = std::result::Result<T, Error>;
