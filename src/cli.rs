//! Interface de linha de comando do comment-relay baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (submit, preview,
//! upload-url, lookup) e flags globais (--config, --max-retries, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// comment-relay: envia comentários públicos, com anexos, à API de recebimento.
#[derive(Debug, Parser)]
#[command(name = "comment-relay", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração TOML.
    #[arg(long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Número máximo de retentativas por etapa em caso de falha.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Valida e envia um comentário (arquivo JSON) e acompanha o pipeline.
    Submit {
        /// Caminho do corpo do comentário em JSON.
        file: PathBuf,
    },

    /// Gera o PDF do comentário e imprime um link temporário para ele.
    Preview {
        /// Caminho do corpo do comentário em JSON.
        file: PathBuf,
    },

    /// Emite o par de URLs (PUT/GET) para o upload de um anexo.
    UploadUrl {
        /// Nome de exibição do arquivo.
        #[arg(long)]
        name: String,

        /// Tamanho do arquivo em bytes.
        #[arg(long, allow_negative_numbers = true)]
        size: i64,

        /// Tipo MIME enviado no PUT.
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Consulta uma das listas de valores da API.
    Lookup {
        #[arg(value_enum)]
        list: LookupList,
    },
}

/// Listas de consulta disponíveis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LookupList {
    /// Agências federais.
    FederalAgencies,
    /// Tipos de agência.
    AgencyTypes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_submit_subcommand() {
        let cli = Cli::parse_from(["comment-relay", "submit", "comment.json"]);
        match cli.command {
            Command::Submit { file } => assert_eq!(file, PathBuf::from("comment.json")),
            _ => panic!("expected Submit command"),
        }
        assert_eq!(cli.config, PathBuf::from("comment-relay.toml"));
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "comment-relay",
            "--config",
            "/etc/relay.toml",
            "--max-retries",
            "5",
            "--verbose",
            "preview",
            "c.json",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.max_retries, Some(5));
        assert_eq!(cli.config, PathBuf::from("/etc/relay.toml"));
        assert!(matches!(cli.command, Command::Preview { .. }));
    }

    #[test]
    fn cli_parses_upload_url() {
        let cli = Cli::parse_from([
            "comment-relay",
            "upload-url",
            "--name",
            "exhibit.pdf",
            "--size",
            "2048",
        ]);
        match cli.command {
            Command::UploadUrl {
                name,
                size,
                content_type,
            } => {
                assert_eq!(name, "exhibit.pdf");
                assert_eq!(size, 2048);
                assert!(content_type.is_none());
            }
            _ => panic!("expected UploadUrl command"),
        }
    }

    #[test]
    fn cli_parses_lookup_lists() {
        let cli = Cli::parse_from(["comment-relay", "lookup", "federal-agencies"]);
        assert!(matches!(
            cli.command,
            Command::Lookup {
                list: LookupList::FederalAgencies
            }
        ));
        assert!(Cli::try_parse_from(["comment-relay", "lookup", "states"]).is_err());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
