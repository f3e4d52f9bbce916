use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "mcqgen",
    version,
    about = "Generate, parse, deduplicate and export multiple-choice questions"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Generate(GenerateArgs),
    Import(ImportArgs),
    InitDb(StoreArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, env = "MCQGEN_DB_PATH", default_value = ".cache/mcqgen/mcq.sqlite")]
    pub db_path: PathBuf,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OnStoreUnavailable {
    Abort,
    TreatAsUnique,
}

impl OnStoreUnavailable {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::TreatAsUnique => "treat-as-unique",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    #[arg(long, default_value = ".cache/mcqgen/out")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "questions")]
    pub output_stem: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    #[arg(long, default_value_t = false)]
    pub dedupe_within_batch: bool,

    #[arg(long, value_enum, default_value_t = OnStoreUnavailable::TreatAsUnique)]
    pub on_store_unavailable: OnStoreUnavailable,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[arg(long)]
    pub input: PathBuf,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum BackoffMode {
    Fixed,
    Linear,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub run: RunArgs,

    #[arg(long)]
    pub topic: String,

    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub count: u32,

    #[arg(long, default_value = "Medium")]
    pub difficulty: String,

    #[arg(long, env = "MCQGEN_LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub llm_base_url: String,

    #[arg(long, env = "MCQGEN_LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    #[arg(long, env = "MCQGEN_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    #[arg(long, default_value_t = 0.4)]
    pub temperature: f32,

    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    #[arg(long, default_value_t = 2000)]
    pub retry_delay_ms: u64,

    #[arg(long, value_enum, default_value_t = BackoffMode::Fixed)]
    pub backoff: BackoffMode,

    #[arg(long)]
    pub prompt_template: Option<PathBuf>,
}
