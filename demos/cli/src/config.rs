use std::fs;
use std::path::Path;

use anyhow::Context;
use log::{debug, info};
use scanlog_core::ProcessorConfig;

/// Đọc cấu hình TOML; không có đường dẫn thì dùng mặc định.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ProcessorConfig> {
    let Some(path) = path else {
        debug!("Không có file cấu hình, dùng cấu hình mặc định");
        return Ok(ProcessorConfig::default());
    };

    info!(path = path.display().to_string(); "Đọc cấu hình");
    let content = fs::read_to_string(path)
        .with_context(|| format!("Không đọc được file cấu hình {path:?}"))?;
    let config: ProcessorConfig = toml::from_str(&content)
        .with_context(|| format!("Cấu hình TOML không hợp lệ: {path:?}"))?;
    config.validate()?;
    Ok(config)
}
