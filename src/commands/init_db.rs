use anyhow::{Context, Result};
use tracing::info;

use super::run::open_store;
use crate::cli::StoreArgs;
use crate::store::QuestionStore;

pub fn run(args: StoreArgs) -> Result<()> {
    let store = open_store(&args)?;
    store
        .ensure_schema()
        .with_context(|| format!("failed to initialize {}", args.db_path.display()))?;

    let questions = store.count()?;
    info!(path = %store.db_path().display(), questions, "question store ready");

    Ok(())
}
