//! Configuração do dashboard carregada a partir de `dashboard.toml`.
//!
//! A struct [`DashboardConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `AUTOMATION_API_BASE` tem precedência sobre o arquivo.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::sync::{StatusClass, StatusTable};

/// Nome do arquivo procurado no diretório atual.
pub const CONFIG_FILE: &str = "dashboard.toml";

/// Variável de ambiente com a URL base da API.
pub const API_BASE_ENV: &str = "AUTOMATION_API_BASE";

/// Configuração de nível superior carregada de `dashboard.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// URL base do backend. Vazio significa a origem padrão.
    #[serde(default)]
    pub api_base: String,

    /// Intervalo entre consultas da lista de jobs, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Arquivo onde o último job criado é lembrado.
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Mapeamentos extras de status do servidor para classes de exibição.
    #[serde(default)]
    pub status_classes: HashMap<String, String>,
}

// Valor padrão do intervalo de polling: 3000ms.
fn default_poll_interval_ms() -> u64 {
    3000
}

// Valor padrão do arquivo de estado.
fn default_state_file() -> PathBuf {
    PathBuf::from(".automation-dashboard.json")
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            poll_interval_ms: default_poll_interval_ms(),
            state_file: default_state_file(),
            status_classes: HashMap::new(),
        }
    }
}

impl DashboardConfig {
    /// Carrega a configuração de `dashboard.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a partir de um caminho explícito; arquivo ausente usa defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<DashboardConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a URL base.
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                config.api_base = base;
            }
        }

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Tabela de status padrão estendida com `[status_classes]`.
    pub fn status_table(&self) -> Result<StatusTable> {
        let mut table = StatusTable::default();
        for (token, class) in &self.status_classes {
            let class: StatusClass = class
                .parse()
                .map_err(|e| anyhow!("status_classes.{token}: {e}"))?;
            table.insert(token, class);
        }
        Ok(table)
    }
}
