use crate::core::teacher::TeacherConfig;
use crate::core::ConfigProvider;
use crate::utils::error::{CurriculumError, Result};
use crate::utils::validation::{validate_env_substituted, validate_non_empty_string, validate_path, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "auto-curriculum.toml";

/// Project settings: where models live and how the external programs are started.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub storage: StorageConfig,
    pub runner: RunnerConfig,
    pub teacher: TeacherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "storage".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Interpreter used for the `-m <module>` entry points.
    pub python: String,
    /// Package holding `train_rl`, `train_addition`, `evaluate_*` and `visualize_rl`.
    pub module_prefix: String,
    /// Training-metrics dashboard executable.
    pub dashboard: String,
    pub working_dir: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            module_prefix: "scripts".to_string(),
            dashboard: "tensorboard".to_string(),
            working_dir: None,
        }
    }
}

impl ProjectConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CurriculumError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);
        Ok(toml::from_str(&processed_content)?)
    }

    /// Explicit file, else `auto-curriculum.toml` when present, else defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

}

/// 替換環境變數 (例如 ${STORAGE_ROOT})，未設定的變數保持原樣
pub(crate) fn substitute_env_vars(content: &str) -> String {
    use regex::Regex;
    use std::sync::OnceLock;

    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"));

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    })
    .to_string()
}

impl ConfigProvider for ProjectConfig {
    fn storage_root(&self) -> &str {
        &self.storage.root
    }
}

impl Validate for ProjectConfig {
    fn validate(&self) -> Result<()> {
        validate_path("storage.root", &self.storage.root)?;
        validate_env_substituted("storage.root", &self.storage.root)?;
        let runner_fields = [
            ("runner.python", &self.runner.python),
            ("runner.module_prefix", &self.runner.module_prefix),
            ("runner.dashboard", &self.runner.dashboard),
        ];
        for (field, value) in runner_fields {
            validate_non_empty_string(field, value)?;
            validate_env_substituted(field, value)?;
        }
        if let Some(dir) = &self.runner.working_dir {
            validate_path("runner.working_dir", dir)?;
            validate_env_substituted("runner.working_dir", dir)?;
        }
        self.teacher.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dist::DistKind;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_project_config() {
        let config = ProjectConfig::from_toml_str(
            r#"
[storage]
root = "/data/curriculum"

[runner]
python = "python3.7"

[teacher]
dist_cr = "Boltzmann"
tau = 0.5
"#,
        )
        .unwrap();

        assert_eq!(config.storage.root, "/data/curriculum");
        assert_eq!(config.runner.python, "python3.7");
        assert_eq!(config.runner.module_prefix, "scripts");
        assert_eq!(config.teacher.dist_cr, DistKind::Boltzmann);
        assert_eq!(
            config.model_dir("KC"),
            PathBuf::from("/data/curriculum/models/KC")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("AUTO_CURRICULUM_TEST_ROOT", "/tmp/curriculum-root");
        let config = ProjectConfig::from_toml_str(
            r#"
[storage]
root = "${AUTO_CURRICULUM_TEST_ROOT}"
"#,
        )
        .unwrap();
        assert_eq!(config.storage.root, "/tmp/curriculum-root");
        std::env::remove_var("AUTO_CURRICULUM_TEST_ROOT");
    }

    #[test]
    fn test_unset_variable_fails_validation() {
        let config = ProjectConfig::from_toml_str(
            r#"
[storage]
root = "${AUTO_CURRICULUM_UNSET_ROOT}"
"#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("AUTO_CURRICULUM_UNSET_ROOT"));
    }

    #[test]
    fn test_defaults_and_validation() {
        let config = ProjectConfig::from_toml_str("").unwrap();
        assert_eq!(config.stats_dir(), PathBuf::from("storage/stats"));
        assert!(config.validate().is_ok());

        let config = ProjectConfig::from_toml_str("[runner]\npython = \" \"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[storage]\nroot = \"./runs\"\n")
            .unwrap();
        let config = ProjectConfig::load(temp_file.path().to_str()).unwrap();
        assert_eq!(config.storage.root, "./runs");
    }
}
