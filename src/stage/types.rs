//! Os estágios remotos do pipeline e os caminhos HTTP de cada um.
//!
//! Cada documento percorre `metadata → generate → upload → archive`;
//! `approval` é chamado uma única vez por job quando ele exige aprovação.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Um estágio remoto do pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Busca os metadados de um documento a partir do seu índice.
    Metadata,
    /// Gera o documento a partir dos metadados.
    Generate,
    /// Envia o documento gerado para o armazenamento em nuvem.
    Upload,
    /// Arquiva o documento.
    Archive,
    /// Solicita aprovação humana para o job.
    Approval,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Metadata,
        Stage::Generate,
        Stage::Upload,
        Stage::Archive,
        Stage::Approval,
    ];

    /// Caminho do endpoint relativo à URL base do serviço remoto.
    pub fn path(self) -> &'static str {
        match self {
            Stage::Metadata => "/api/v1/metadata",
            Stage::Generate => "/api/v1/document",
            Stage::Upload => "/api/v1/cloud",
            Stage::Archive => "/api/v1/archive",
            Stage::Approval => "/api/v1/approval",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Metadata => write!(f, "metadata"),
            Stage::Generate => write!(f, "generate"),
            Stage::Upload => write!(f, "upload"),
            Stage::Archive => write!(f, "archive"),
            Stage::Approval => write!(f, "approval"),
        }
    }
}
