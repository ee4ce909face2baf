//! Run results and the files they are written to.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use linkdrop_keys::{LinkdropKeypair, ED25519_PREFIX};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const VIEWS_FILE: &str = "views.json";
pub const LINKS_FILE: &str = "links.json";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// View method name to returned value. Failed views have no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ViewSnapshot(BTreeMap<String, Value>);

impl ViewSnapshot {
    pub fn insert(&mut self, method: &str, value: Value) {
        self.0.insert(method.to_string(), value);
    }

    pub fn get(&self, method: &str) -> Option<&Value> {
        self.0.get(method)
    }

    pub fn contains(&self, method: &str) -> bool {
        self.0.contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Public key to redemption URL.
pub type RedemptionLinkMap = BTreeMap<String, String>;

/// Build one redemption link per keypair.
///
/// Links have the form `<wallet>/linkdrop/<contract>/<secret>`, with the
/// secret key in bare base58 as wallets expect it.
pub fn build_redemption_links(
    wallet_url: &str,
    contract_id: &str,
    keys: &[LinkdropKeypair],
) -> RedemptionLinkMap {
    let base = wallet_url.trim_end_matches('/');
    keys.iter()
        .map(|key| {
            let secret = key
                .secret_key
                .strip_prefix(ED25519_PREFIX)
                .unwrap_or(&key.secret_key);
            (
                key.public_key.clone(),
                format!("{}/linkdrop/{}/{}", base, contract_id, secret),
            )
        })
        .collect()
}

/// Write the snapshot and the links into `dir`, replacing existing files.
///
/// Both files are attempted even if the first write fails; the first error
/// is returned.
pub fn write_results(
    dir: &Path,
    snapshot: &ViewSnapshot,
    links: &RedemptionLinkMap,
) -> Result<(), OutputError> {
    std::fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let views = write_json(&dir.join(VIEWS_FILE), snapshot);
    let links = write_json(&dir.join(LINKS_FILE), links);
    views.and(links)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(value).map_err(|source| OutputError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Wrote {}", path.display());
    Ok(())
}
