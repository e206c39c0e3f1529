//! Interface de terminal do comment-relay: spinner e saída colorida.
//!
//! Usa `indicatif` para o spinner enquanto o pipeline roda e `console` para
//! as cores. O [`SubmissionProgress`] acompanha um envio no terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::task::{TaskReport, TaskStatus};

/// Indicador visual de progresso para um envio no terminal.
pub struct SubmissionProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl SubmissionProgress {
    /// Inicia o spinner com a mensagem informada.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        // Template fixo e válido; em caso de erro fica o estilo padrão.
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    pub fn set_message(&self, message: &str) {
        self.pb.set_message(message.to_string());
    }

    /// Imprime uma linha acima do spinner sem interrompê-lo.
    pub fn note(&self, message: &str) {
        self.pb.println(format!("  {} {message}", self.yellow.apply_to("•")));
    }

    /// Finaliza o spinner e exibe o resultado do envio.
    pub fn complete(&self, report: &TaskReport) {
        self.pb.finish_and_clear();
        match (&report.status, &report.tracking_number) {
            (TaskStatus::Completed, Some(tracking_number)) => println!(
                "  {} Comment accepted, tracking number {tracking_number}",
                self.green.apply_to("✓")
            ),
            (TaskStatus::Completed, None) => {
                println!("  {} Comment accepted", self.green.apply_to("✓"))
            }
            _ => match &report.failure {
                Some(kind) => println!("  {} Submission failed: {kind}", self.red.apply_to("✗")),
                None => println!("  {} Submission failed", self.red.apply_to("✗")),
            },
        }
    }

    /// Remove o spinner sem imprimir nada.
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }

    /// Encerra o spinner após um erro que impediu o envio.
    pub fn abort(&self, reason: &str) {
        self.pb.finish_and_clear();
        println!("  {} {reason}", self.red.apply_to("✗"));
    }

    /// Imprime o relatório da tarefa em JSON, colorido pelo status.
    pub fn print_report(&self, report: &TaskReport) {
        let status_style = match report.status {
            TaskStatus::Completed => &self.green,
            TaskStatus::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Task Report ───"));
        print_json(report);
    }
}

/// Imprime qualquer valor serializável como JSON indentado.
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}
