//! Interface de terminal do docbatch: spinner de progresso e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner e `console` para estilização
//! com cores. O [`JobProgress`] acompanha visualmente um job no terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state_machine::{JobSnapshot, JobStatus};

/// Indicador visual de progresso para um job no terminal.
///
/// Exibe um spinner enquanto o job roda e mensagens coloridas para
/// conclusão (verde), falha ou rejeição (vermelho) e espera por aprovação (amarelo).
pub struct JobProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner para o job e retorna a instância de progresso.
    pub fn start(snapshot: &JobSnapshot) -> Self {
        let pb = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        pb.set_style(style);
        pb.enable_steady_tick(Duration::from_millis(100));

        let progress = Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        };
        progress.update(snapshot);
        progress
    }

    /// Atualiza a mensagem do spinner com o status e a contagem atual.
    pub fn update(&self, snapshot: &JobSnapshot) {
        self.pb.set_message(status_line(snapshot));
    }

    /// Registra uma linha acima do spinner sem interrompê-lo.
    pub fn note(&self, message: &str) {
        self.pb.println(format!("  {} {message}", self.yellow.apply_to("•")));
    }

    /// Finaliza o spinner e exibe o status em que o job assentou.
    pub fn complete(&self, snapshot: &JobSnapshot) {
        self.pb.finish_and_clear();
        match snapshot.status {
            JobStatus::Completed => println!(
                "  {} Job {} completed ({} documents archived)",
                self.green.apply_to("✓"),
                snapshot.id,
                snapshot.finished_documents
            ),
            JobStatus::PendingApproval => println!(
                "  {} Job {} is waiting for approval ({} documents staged)",
                self.yellow.apply_to("⏸"),
                snapshot.id,
                snapshot.staged_documents
            ),
            status => println!(
                "  {} Job {} ended {status}",
                self.red.apply_to("✗"),
                snapshot.id
            ),
        }
    }

    /// Imprime o snapshot formatado em JSON com estilo colorido.
    pub fn print_snapshot(&self, snapshot: &JobSnapshot) {
        let style = match snapshot.status {
            JobStatus::Completed => &self.green,
            JobStatus::Failed | JobStatus::Rejected => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", style.apply_to("─── Job Snapshot ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(snapshot).unwrap_or_default()
        );
    }
}

fn status_line(snapshot: &JobSnapshot) -> String {
    format!(
        "{}: job {} ({}/{} archived, {} staged)",
        snapshot.status,
        snapshot.id,
        snapshot.finished_documents,
        snapshot.number_of_documents,
        snapshot.staged_documents
    )
}
