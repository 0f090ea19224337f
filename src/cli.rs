//! Interface de linha de comando do dashboard baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (upload, jobs,
//! select, artifacts, download, generate, execute, report, status) e flags
//! globais (--api-base, --config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Dashboard de terminal para o pipeline de automação de testes.
#[derive(Debug, Parser)]
#[command(name = "automation-dashboard", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// URL base do backend (sobrepõe AUTOMATION_API_BASE e o arquivo).
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Caminho de um arquivo de configuração TOML.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia uma planilha (.xlsx ou .csv) e cria um job.
    Upload {
        /// Arquivo de requisitos.
        file: PathBuf,
    },

    /// Lista os jobs e seus status.
    Jobs {
        /// Continua consultando e redesenhando até Ctrl-C.
        #[arg(long, short)]
        watch: bool,
    },

    /// Torna um job existente o padrão dos próximos comandos.
    Select {
        /// ID do job, como listado por `jobs`.
        job: String,
    },

    /// Lista os artefatos de um job.
    Artifacts {
        /// Job alvo; padrão é o último job criado.
        #[arg(long)]
        job: Option<String>,
    },

    /// Baixa um artefato para o disco.
    Download {
        /// Nome do artefato, como listado por `artifacts`.
        name: String,

        #[arg(long)]
        job: Option<String>,

        /// Diretório de destino.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Dispara a etapa de geração de testes.
    Generate {
        #[arg(long)]
        job: Option<String>,
    },

    /// Dispara a execução dos testes gerados.
    Execute {
        #[arg(long)]
        job: Option<String>,
    },

    /// Mostra a URL do relatório HTML de um job.
    Report {
        #[arg(long)]
        job: Option<String>,
    },

    /// Mostra a configuração efetiva e o último job.
    Status,
}
