//! Tipos de erro para as chamadas aos estágios remotos.
//!
//! Define [`StageError`] com variantes para respostas não-2xx e falhas de
//! rede. Usa `thiserror` para derivar `Display` e `Error` a partir dos
//! atributos `#[error(...)]`. Não há retentativa: o erro sobe até o pipeline.

use thiserror::Error;

use super::types::Stage;

/// Erros que podem ocorrer ao chamar um estágio remoto.
///
/// - [`Rejected`](StageError::Rejected): o serviço respondeu com status fora de 2xx
/// - [`Network`](StageError::Network): falha na camada de rede
#[derive(Debug, Error)]
pub enum StageError {
    /// O serviço respondeu, mas com status de erro (ex.: 404, 500).
    /// Contém o código HTTP e o corpo da resposta.
    #[error("{stage} stage returned status {status}: {message}")]
    Rejected {
        stage: Stage,
        status: u16,
        message: String,
    },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout do cliente).
    #[error("{stage} stage request failed: {source}")]
    Network {
        stage: Stage,
        #[source]
        source: reqwest::Error,
    },
}

impl StageError {
    /// O estágio que falhou.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Rejected { stage, .. } | StageError::Network { stage, .. } => *stage,
        }
    }
}
