use std::path::Path;
use std::sync::Arc;

use ferrule_core::{FerruleConfig, FerrulePaths, ProjectRoot};
use ferrule_handlers::BridgeContext;
use ferrule_host::FsHost;
use ferrule_serve::ServeConfig;
use tokio_util::sync::CancellationToken;

/// Values given on the command line; `None` falls back to the config file.
pub struct Overrides {
    pub ide: Option<String>,
    pub wait_for_completion: Option<bool>,
    pub timeout_ms: Option<u64>,
}

pub fn execute(root: &Path, overrides: Overrides) -> anyhow::Result<()> {
    let paths = FerrulePaths::discover(root);
    paths.ensure_layout()?;
    let config = apply(FerruleConfig::load(&paths), overrides);

    let project = ProjectRoot::new(root)?;
    let ctx = Arc::new(BridgeContext::new(
        project,
        Arc::new(FsHost::new()),
        config.operation_timeout(),
    ));

    let cancel = CancellationToken::new();
    ctrlc_cancel(cancel.clone());

    let serve_config = ServeConfig {
        ide: config.ide.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        wait_for_completion: config.wait_for_completion,
        body_limit_bytes: config.body_limit_bytes(),
    };
    tokio::runtime::Runtime::new()?.block_on(ferrule_serve::serve(ctx, &paths, serve_config, cancel))
}

fn apply(mut config: FerruleConfig, overrides: Overrides) -> FerruleConfig {
    if let Some(ide) = overrides.ide {
        config.ide = ide;
    }
    if let Some(wait) = overrides.wait_for_completion {
        config.wait_for_completion = wait;
    }
    if let Some(ms) = overrides.timeout_ms {
        config.operation_timeout_ms = ms;
    }
    config
}

fn ctrlc_cancel(cancel: CancellationToken) {
    if let Err(e) = ctrlc::set_handler(move || {
        cancel.cancel();
    }) {
        tracing::warn!("could not install Ctrl-C handler: {e}");
    }
}
