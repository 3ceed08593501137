//! YAML 配置加载

use super::types::AppConfig;
use std::path::Path;
use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    /// YAML 解析失败
    #[error("配置文件格式错误: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// 从 YAML 文件加载配置
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_config(&content)
}

/// 从 YAML 字符串解析配置
///
/// 空文档返回默认配置。
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let yaml = r#"
processor:
  filter_tags: ["secret"]
logging:
  level: debug
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.processor.filter_tags, vec!["secret".to_string()]);
        assert_eq!(config.processor.asset_base_url, "https://assets.grok.com");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = parse_config("processor: [1, 2");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "processor:\n  empty_hint: nothing here").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.processor.empty_hint, "nothing here");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
