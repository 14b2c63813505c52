//! Configuração do docbatch carregada a partir de `docbatch.toml`.
//!
//! A struct [`BatchConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `DOCBATCH_BASE_URL` tem precedência sobre o arquivo.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BatchError;

/// Nome do arquivo procurado no diretório atual.
pub const CONFIG_FILE: &str = "docbatch.toml";

/// Variável de ambiente que sobrescreve `base_url`.
pub const BASE_URL_ENV: &str = "DOCBATCH_BASE_URL";

/// Configuração de nível superior carregada de `docbatch.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// URL base dos serviços remotos (metadata, document, cloud, archive, approval).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Número de workers que executam pipelines.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Capacidade da fila do pool; submissões além dela são recusadas.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Máximo de documentos em processamento simultâneo no pipeline completo.
    #[serde(default = "default_full_fan_out")]
    pub full_fan_out: usize,

    /// Máximo de documentos em arquivamento simultâneo após a aprovação.
    #[serde(default = "default_archive_fan_out")]
    pub archive_fan_out: usize,

    /// Aborta os documentos irmãos em andamento quando um deles falha.
    #[serde(default)]
    pub abort_siblings_on_failure: bool,

    /// Timeout de conexão HTTP em segundos.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout total de cada requisição HTTP em segundos.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Intervalo de atualização do progresso na CLI, em milissegundos.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

// Valor padrão da URL base: o serviço local na porta 8081.
fn default_base_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_workers() -> usize {
    5
}

fn default_queue_capacity() -> usize {
    100
}

fn default_full_fan_out() -> usize {
    10
}

fn default_archive_fan_out() -> usize {
    20
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_poll_interval_ms() -> u64 {
    200
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            full_fan_out: default_full_fan_out(),
            archive_fan_out: default_archive_fan_out(),
            abort_siblings_on_failure: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl BatchConfig {
    /// Carrega a configuração de `docbatch.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, BatchError> {
        let path = Path::new(CONFIG_FILE);
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        Ok(config.with_env_overrides())
    }

    /// Carrega a configuração de um arquivo explícito, que precisa existir.
    pub fn load_from(path: &Path) -> Result<Self, BatchError> {
        Ok(Self::from_file(path)?.with_env_overrides())
    }

    fn from_file(path: &Path) -> Result<Self, BatchError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<BatchConfig>(&contents)?)
    }

    // Variável de ambiente tem precedência sobre o arquivo para a URL base.
    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        self
    }

    /// Rejeita combinações que deixariam o pool ou o fan-out sem capacidade.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.base_url.trim().is_empty() {
            return Err(BatchError::Config("base_url must not be empty".into()));
        }
        let limits = [
            ("workers", self.workers),
            ("queue_capacity", self.queue_capacity),
            ("full_fan_out", self.full_fan_out),
            ("archive_fan_out", self.archive_fan_out),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(BatchError::Config(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }
}
