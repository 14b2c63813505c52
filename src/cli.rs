//! Interface de linha de comando do docbatch baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, config)
//! e flags globais (--config, --base-url, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// docbatch: orquestrador de jobs de documentos em lote com aprovação.
#[derive(Debug, Parser)]
#[command(name = "docbatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho para um arquivo de configuração TOML (padrão: ./docbatch.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// URL base dos serviços remotos; sobrescreve arquivo e ambiente.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Decisão aplicada automaticamente quando o job chega a `PENDING_APPROVAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecisionArg {
    /// Aprova o job e agenda o arquivamento.
    Approve,
    /// Rejeita o job sem chamadas remotas.
    Reject,
}

impl DecisionArg {
    pub fn approved(self) -> bool {
        self == DecisionArg::Approve
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submete um lote e acompanha o job até ele assentar.
    Run {
        /// Número de documentos do lote.
        #[arg(short = 'n', long = "documents")]
        documents: usize,

        /// Exige aprovação humana antes do arquivamento.
        #[arg(long)]
        needs_approval: bool,

        /// Decisão a aplicar quando o job aguardar aprovação.
        #[arg(long, value_enum)]
        decision: Option<DecisionArg>,
    },

    /// Mostra a configuração efetiva em TOML.
    Config,
}
