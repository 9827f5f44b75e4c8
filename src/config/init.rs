use anyhow::{Context, Result};
use atomic_write_file::AtomicWriteFile;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::get_config_path;

/// Config written by `lead-score init`.
pub const STARTER_CONFIG: &str = r#"# lead-score configuration
#
# Each rule applies to one module (lead, opportunity, account, contact).
# Criteria are evaluated in ascending `order`. A matching criterion adds or
# subtracts its points; conditions are joined left to right with
# `logical_operator` (and/or, default and). A criterion without conditions
# always matches.
rules:
  - name: Inbound interest
    module: lead
    active: true
    description: Leads that found us on their own
    criteria:
      - order: 1
        points: 10
        operation_type: add
        conditions:
          - field: source
            operator: in
            value: ["website", "referral"]
      - order: 2
        points: 5
        operation_type: add
        conditions:
          - field: created_at
            operator: within
            value: 7d
      - order: 3
        points: 3
        operation_type: sub
        conditions:
          - field: email
            operator: is_empty

  - name: Company fit
    module: lead
    criteria:
      - order: 1
        points: 8
        operation_type: add
        conditions:
          - field: employees
            operator: greater_than_equal
            value: 200
          - field: industry
            operator: equals
            value: software
            logical_operator: or
      - order: 2
        points: 4
        operation_type: sub
        conditions:
          - field: email
            operator: matches
            value: "*@gmail.*"

  - name: Deal momentum
    module: opportunity
    active: false
    criteria:
      - order: 1
        points: 15
        operation_type: add
        conditions:
          - field: stage
            operator: equals
            value: proposal
"#;

/// Write the starter config to `path` (or the default location).
///
/// Refuses to replace an existing file unless `force` is set. The write is
/// atomic, so an interrupted run never leaves a half-written config behind.
pub fn write_starter_config(path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
    let config_path = path.unwrap_or_else(get_config_path);

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}. Use --force to overwrite",
            config_path.display()
        );
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let mut file = AtomicWriteFile::open(&config_path)
        .with_context(|| format!("Failed to open atomic write file at {}", config_path.display()))?;
    file.write_all(STARTER_CONFIG.as_bytes())
        .context("Failed to write starter config")?;
    file.commit()
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    tracing::info!(path = %config_path.display(), "wrote starter config");
    Ok(config_path)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create config directory at {}", dir.display()))?;
    }
    Ok(())
}
