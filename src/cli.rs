use clap::ValueHint;

use std::path::PathBuf;

use crate::config::Config;

#[derive(clap::Parser, Debug, Clone)]
#[command(
    name = "newsmux",
    version,
    about = "Serves trending stories and RSS/Atom subscriptions as one combined feed"
)]
pub struct Args {
    /// Path to the TOML config file. Defaults are used if it does not exist.
    #[arg(
        short,
        long = "config",
        env = "NEWSMUX_CONFIG",
        default_value = "newsmux.toml",
        value_hint(ValueHint::FilePath)
    )]
    pub config_path: PathBuf,

    /// Address to bind the HTTP server to.
    #[arg(long, env = "NEWSMUX_BIND_ADDR")]
    pub bind_addr: Option<String>,

    /// Path to the SQLite database file.
    #[arg(long, env = "NEWSMUX_DB", value_hint(ValueHint::FilePath))]
    pub db_path: Option<PathBuf>,
}

impl Args {
    pub fn parse() -> Self {
        clap::Parser::parse()
    }

    /// Command-line values take precedence over the config file.
    pub fn apply(self, cfg: &mut Config) {
        if let Some(bind_addr) = self.bind_addr {
            cfg.bind_addr = bind_addr;
        }
        if let Some(db_path) = self.db_path {
            cfg.database_path = db_path.to_string_lossy().into_owned();
        }
    }
}
