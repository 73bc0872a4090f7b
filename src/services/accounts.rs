//! Account discovery and filtering.
//!
//! Accounts live under `<account root>/userdata/<accountID>`. Discovery goes through the
//! [`AccountProvider`] contract; [`filter_user_accounts`] then applies a configuration's
//! allow-list and optional directory check.

use crate::models::UserAccount;
use crate::services::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use camino::Utf8Path;
use std::io::ErrorKind;

/// Source of the accounts available under an account root directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountProvider: Send + Sync {
    async fn available_logins(
        &self,
        directory: &str,
        use_credentials: bool,
    ) -> PipelineResult<Vec<UserAccount>>;
}

/// Lists the numeric directories under `<directory>/userdata` as accounts.
///
/// Credential stores are not consulted, so `use_credentials` has no effect and account names
/// equal their ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserdataAccountProvider;

#[async_trait]
impl AccountProvider for UserdataAccountProvider {
    async fn available_logins(
        &self,
        directory: &str,
        use_credentials: bool,
    ) -> PipelineResult<Vec<UserAccount>> {
        let userdata = Utf8Path::new(directory).join("userdata");
        if use_credentials {
            tracing::debug!("Credential lookup not available, listing {}", userdata);
        }

        let mut entries = match tokio::fs::read_dir(&userdata).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Account directory not found: {}", userdata);
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(PipelineError::Io {
                    path: userdata.to_string(),
                    source,
                });
            }
        };

        let mut accounts = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(source) => {
                    return Err(PipelineError::Io {
                        path: userdata.to_string(),
                        source,
                    });
                }
            };

            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if is_dir && !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
                accounts.push(UserAccount::new(name.clone(), name));
            }
        }

        accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        tracing::debug!("Found {} account(s) in {}", accounts.len(), userdata);
        Ok(accounts)
    }
}

/// Accounts split by an allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredAccounts {
    pub found: Vec<UserAccount>,
    /// Requested names with no matching account.
    pub missing: Vec<String>,
}

/// Apply an allow-list of account names to the discovered accounts.
///
/// An empty `name_filter` selects every discovered account. Names are processed in the order
/// given. With `skip_with_missing_dirs`, a found account whose
/// `<account_root>/userdata/<accountID>` directory does not exist is dropped from both lists.
pub async fn filter_user_accounts(
    accounts: &[UserAccount],
    name_filter: &[String],
    account_root: &str,
    skip_with_missing_dirs: bool,
) -> FilteredAccounts {
    let all_names: Vec<String>;
    let names: &[String] = if name_filter.is_empty() {
        all_names = accounts.iter().map(|a| a.name.clone()).collect();
        &all_names
    } else {
        name_filter
    };

    let mut filtered = FilteredAccounts::default();
    for name in names {
        let Some(account) = accounts.iter().find(|a| &a.name == name) else {
            filtered.missing.push(name.clone());
            continue;
        };

        if skip_with_missing_dirs {
            let account_dir = Utf8Path::new(account_root)
                .join("userdata")
                .join(&account.account_id);
            if !is_directory(&account_dir).await {
                tracing::debug!(
                    "Skipping account {} without data directory {}",
                    account.name,
                    account_dir
                );
                continue;
            }
        }

        filtered.found.push(account.clone());
    }

    filtered
}

/// Any file-system error counts as "not a directory".
async fn is_directory(path: &Utf8Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
