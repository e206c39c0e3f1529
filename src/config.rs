//! Configuração do comment-relay carregada a partir de `comment-relay.toml`.
//!
//! A struct [`RelayConfig`] contém todos os parâmetros configuráveis, agrupados
//! por seção. Valores não presentes no arquivo usam defaults sensíveis.
//! Variáveis de ambiente têm precedência sobre o arquivo para as credenciais
//! (`REGS_GOV_API_KEY`, `ATTACHMENT_ACCESS_KEY_ID`, `ATTACHMENT_SECRET_ACCESS_KEY`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::task::RetryConfig;

/// Nome do arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "comment-relay.toml";

/// Configuração de nível superior carregada de `comment-relay.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub intake: IntakeConfig,
    pub storage: StorageConfig,
    pub attachments: AttachmentLimits,
    pub renderer: RendererConfig,
    pub retry: RetryConfig,
    pub workers: WorkerConfig,
    pub lookup_cache: LookupCacheConfig,
    pub logging: LoggingConfig,
}

/// Endpoints da API de recebimento (regulations.gov).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// URL para onde o comentário final é enviado (POST multipart).
    pub url: String,
    /// URL da API de consulta de valores (agências etc.).
    pub lookup_url: String,
    /// Chave enviada no header `X-Api-Key`.
    pub api_key: String,
    /// Identificador do documento comentado (`comment_on`).
    pub document_id: String,
    /// Timeout por chamada HTTP, em segundos.
    pub request_timeout_secs: u64,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            url: "https://api.data.gov/regulations/v3/comment".to_string(),
            lookup_url: "https://api.data.gov/regulations/v3/lookup".to_string(),
            api_key: String::new(),
            document_id: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl IntakeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Armazenamento de objetos compatível com S3.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Endpoint base; o bucket é adicionado ao caminho (path-style).
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Prefixo das chaves usadas para pré-visualizações de PDF.
    pub preview_prefix: String,
    /// Validade dos links de pré-visualização, em segundos.
    pub preview_expiration_secs: u64,
    /// Validade padrão das demais URLs pré-assinadas, em segundos.
    pub url_expiration_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://s3.amazonaws.com".to_string(),
            region: "us-east-1".to_string(),
            bucket: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            preview_prefix: "preview".to_string(),
            preview_expiration_secs: 60 * 60 * 24 * 90,
            url_expiration_secs: 60 * 60,
        }
    }
}

/// Limites aplicados aos anexos antes de qualquer enfileiramento.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AttachmentLimits {
    /// Número máximo de arquivos por envio, contando o PDF do próprio comentário.
    pub max_count: usize,
    /// Tamanho máximo de um anexo, em bytes.
    pub max_size: u64,
    /// Extensões aceitas (sem ponto, minúsculas).
    pub valid_extensions: Vec<String>,
}

impl Default for AttachmentLimits {
    fn default() -> Self {
        Self {
            max_count: 10,
            max_size: 10 * 1024 * 1024,
            valid_extensions: [
                "bmp", "doc", "docx", "gif", "jpg", "jpeg", "pdf", "png", "pptx", "rtf", "sgml",
                "tif", "tiff", "txt", "wpd", "xlsx", "xml",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
        }
    }
}

/// Processo externo de conversão HTML → PDF.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub converter_path: PathBuf,
    /// Argumentos passados antes dos caminhos de entrada e saída.
    pub converter_args: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            converter_path: PathBuf::from("wkhtmltopdf"),
            converter_args: Vec::new(),
            timeout_secs: 60,
        }
    }
}

impl RendererConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Quantas tarefas de envio podem rodar ao mesmo tempo.
    pub concurrency: usize,
    /// Onde os diretórios temporários de cada tentativa são criados.
    /// `None` usa o diretório temporário do sistema.
    pub staging_root: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            staging_root: None,
        }
    }
}

/// Cache de respostas da API de consulta.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupCacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for LookupCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Diretiva padrão do filtro (`RUST_LOG` tem precedência).
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl RelayConfig {
    /// Carrega a configuração de um caminho explícito; ausente significa defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<RelayConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    // Variáveis de ambiente têm precedência sobre o arquivo para as credenciais.
    fn apply_env_overrides(&mut self) {
        if let Some(key) = non_empty_env("REGS_GOV_API_KEY") {
            self.intake.api_key = key;
        }
        if let Some(key) = non_empty_env("ATTACHMENT_ACCESS_KEY_ID") {
            self.storage.access_key_id = key;
        }
        if let Some(secret) = non_empty_env("ATTACHMENT_SECRET_ACCESS_KEY") {
            self.storage.secret_access_key = secret;
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
