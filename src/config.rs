//! Command-line options for the `sparks` host

use clap::Parser;
use sparklet_core::EngineConfig;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "sparks")]
#[command(about = "Run, edit and publish Sparklet mini-apps from the terminal", long_about = None)]
pub struct Cli {
    /// Sparklet definition file (JSON) or library id to open on start
    pub definition: Option<String>,

    /// Directory holding the local library and spark data
    #[arg(long, env = "SPARKS_DATA_DIR", default_value = ".sparks")]
    pub data_dir: PathBuf,

    /// Identity used as owner for library operations
    #[arg(long, env = "SPARKS_IDENTITY", default_value = "local")]
    pub identity: String,

    /// Script steps allowed per dispatch
    #[arg(long)]
    pub step_budget: Option<u64>,

    /// Reload the opened definition file whenever it changes
    #[arg(short, long)]
    pub watch: bool,

    /// Endpoint of the sparklet generator service
    #[arg(long, env = "SPARKS_GENERATOR_URL")]
    pub generator_url: Option<String>,
}

impl Cli {
    pub fn engine_config(&self) -> EngineConfig {
        match self.step_budget {
            Some(budget) => EngineConfig::default().with_step_budget(budget),
            None => EngineConfig::default(),
        }
    }

    pub fn library_dir(&self) -> PathBuf {
        self.data_dir.join("library")
    }

    pub fn spark_dir(&self) -> PathBuf {
        self.data_dir.join("spark")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["sparks"]).unwrap();
        assert!(cli.definition.is_none());
        assert!(!cli.watch);
        assert_eq!(cli.library_dir(), PathBuf::from(".sparks").join("library"));
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "sparks",
            "counter.json",
            "--watch",
            "--step-budget",
            "5000",
            "--identity",
            "ada",
        ])
        .unwrap();
        assert_eq!(cli.definition.as_deref(), Some("counter.json"));
        assert!(cli.watch);
        assert_eq!(cli.identity, "ada");
        assert_eq!(cli.engine_config().step_budget, 5000);
    }
}
