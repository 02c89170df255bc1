use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 应用配置管理模块
/// 集中管理所有配置项，提供默认值和配置验证

/// 主配置结构
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub detector: DetectorConfig,
    pub export: ExportConfig,
    pub channels: ChannelConfig,
}

/// 会话 / 滑动窗口配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// 传感器采样间隔 (ms)
    pub sample_interval_millis: u32,
    /// 计算窗口长度 (ms)
    pub window_size_millis: u32,
    /// PCA 初始化所需的样本数
    pub pca_initial_size: usize,
    /// 每隔多少个读数重新计算一次步频/速度/距离
    pub window_step: usize,
    /// 每隔多少个读数刷新一次可视化数据
    pub visualisation_update_step: usize,
    /// 可视化量程 (g)，映射 [-range, +range] 到 [0, 255]
    pub visualisation_range_g: f64,
}

/// 步伐检测阈值（经验值，不同版本调过多次）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// 相邻峰值的最小间隔（样本数）
    pub min_peak_distance: usize,
    /// 峰值高度阈值 (m/s²)，必须严格大于此值
    pub min_peak_height: f64,
}

/// 导出配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub directory: String,
    pub creator: String,
    /// 导出失败时是否仍然清空内存中的会话数据
    pub clear_on_failure: bool,
    /// 导出前用整段录制数据重新计算所有 element
    pub recalculate_before_export: bool,
}

/// 通道配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub event_channel_capacity: usize,
    pub frame_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_interval_millis: 10,
            window_size_millis: 10000,
            pca_initial_size: 50,
            window_step: 100,
            visualisation_update_step: 10,
            visualisation_range_g: 16.0,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_peak_distance: 20,
            min_peak_height: 50.0,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: "data_export".to_string(),
            creator: "StrideHub".to_string(),
            clear_on_failure: false,
            recalculate_before_export: false,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 1000,
            frame_channel_capacity: 5000,
        }
    }
}

impl SessionConfig {
    /// 窗口内读数个数
    pub fn window_size(&self) -> usize {
        if self.sample_interval_millis == 0 {
            return 0;
        }
        (self.window_size_millis / self.sample_interval_millis) as usize
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::IoError)?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::SerializeError)?;

        std::fs::write(path, content).map_err(ConfigError::IoError)?;

        Ok(())
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        let session = &self.session;

        if session.sample_interval_millis == 0 || session.window_size_millis == 0 {
            return Err(ConfigError::ValidationError(
                "Sample interval and window size must be positive".to_string(),
            ));
        }

        if session.pca_initial_size < 2 {
            return Err(ConfigError::ValidationError(
                "PCA initial size must be at least 2".to_string(),
            ));
        }

        if session.window_size() < session.pca_initial_size {
            return Err(ConfigError::ValidationError(format!(
                "Window of {} readings cannot hold {} PCA seed readings",
                session.window_size(),
                session.pca_initial_size
            )));
        }

        if session.window_step == 0 || session.visualisation_update_step == 0 {
            return Err(ConfigError::ValidationError(
                "Update steps must be positive".to_string(),
            ));
        }

        if !(session.visualisation_range_g.is_finite() && session.visualisation_range_g > 0.0) {
            return Err(ConfigError::ValidationError(
                "Visualisation range must be positive".to_string(),
            ));
        }

        if !self.detector.min_peak_height.is_finite() {
            return Err(ConfigError::ValidationError(
                "Peak height threshold must be finite".to_string(),
            ));
        }

        if self.channels.event_channel_capacity == 0 || self.channels.frame_channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "Channel capacities must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// 获取导出目录路径
    pub fn get_export_directory(&self) -> PathBuf {
        PathBuf::from(&self.export.directory)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(toml::de::Error),
    #[error("Serialize error: {0}")]
    SerializeError(toml::ser::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// 配置管理器
pub struct ConfigManager {
    config: AppConfig,
}

impl ConfigManager {
    /// 创建配置管理器
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let config = AppConfig::load_from_file(path)?;
        Ok(Self { config })
    }

    /// 获取当前配置
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// 获取可变配置
    pub fn get_config_mut(&mut self) -> &mut AppConfig {
        &mut self.config
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
