//! rcv-store: Supabase persistence for normalized purchase records.
//!
//! Thin PostgREST client. Credentials are injected from the environment
//! (optionally via `.env`), never compiled in. Duplicate-key conflicts are
//! expected — imports re-run over overlapping date ranges — and are reported
//! as an outcome, not an error.

use anyhow::{bail, Context, Result};
use rcv_core::PurchaseRecord;
use reqwest::StatusCode;

/// Remote table holding purchase records.
pub const TABLE: &str = "compras_sii";

/// Upsert conflict target, matching the table's unique constraint.
pub const CONFLICT_COLUMNS: &str = "tipo_dte,folio,rut_emisor";

/// What happened to one record at the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Conflict on (tipo_dte, folio, rut_emisor); silently skipped.
    Duplicate,
}

/// Validated connection settings.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub url: String,
    pub key: String,
}

impl Credentials {
    /// Check the raw env values for the classic paste accidents: embedded
    /// whitespace, or the key pasted twice back-to-back.
    pub fn new(url: &str, key: &str) -> Result<Credentials> {
        let url = url.trim();
        let key = key.trim();
        if url.is_empty() {
            bail!("SUPABASE_URL is empty");
        }
        if key.is_empty() {
            bail!("SUPABASE_KEY is empty");
        }
        if url.contains(char::is_whitespace) {
            bail!("SUPABASE_URL contains whitespace");
        }
        if key.contains(char::is_whitespace) {
            bail!("SUPABASE_KEY contains whitespace");
        }
        if key.matches("eyJ").count() > 1 {
            bail!("SUPABASE_KEY looks pasted twice (repeated JWT header)");
        }
        Ok(Credentials {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    /// Load from `SUPABASE_URL` / `SUPABASE_KEY`, reading a `.env` file when
    /// present.
    pub fn from_env() -> Result<Credentials> {
        dotenvy::dotenv().ok();
        let url = std::env::var("SUPABASE_URL").context("SUPABASE_URL not set")?;
        let key = std::env::var("SUPABASE_KEY").context("SUPABASE_KEY not set")?;
        Credentials::new(&url, &key)
    }

    fn rest_endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }
}

/// Async PostgREST client scoped to one batch; acquire once, drop after.
pub struct SupabaseStore {
    creds: Credentials,
    client: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(creds: Credentials) -> SupabaseStore {
        SupabaseStore {
            creds,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<SupabaseStore> {
        Ok(SupabaseStore::new(Credentials::from_env()?))
    }

    /// Cheap probe before a batch: one-row select against the table.
    pub async fn check_connection(&self) -> Result<()> {
        let url = format!(
            "{}?select=folio&limit=1",
            self.creds.rest_endpoint(TABLE)
        );
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.creds.key)
            .bearer_auth(&self.creds.key)
            .send()
            .await
            .context("connecting to Supabase")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("Supabase connection check failed: {status}: {body}");
        }
        Ok(())
    }

    /// Insert one record, tolerating duplicate-key conflicts.
    ///
    /// `Prefer: resolution=ignore-duplicates` with `return=representation`
    /// makes PostgREST answer with the inserted rows; an empty array means
    /// the conflict target already held the record.
    pub async fn insert(&self, record: &PurchaseRecord) -> Result<UpsertOutcome> {
        let url = format!(
            "{}?on_conflict={}",
            self.creds.rest_endpoint(TABLE),
            CONFLICT_COLUMNS
        );
        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.creds.key)
            .bearer_auth(&self.creds.key)
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(record)
            .send()
            .await
            .with_context(|| format!("inserting folio {}", record.folio))?;

        let status = resp.status();
        if status.is_success() {
            let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
            let inserted = body.as_array().map(|a| !a.is_empty()).unwrap_or(true);
            return Ok(if inserted {
                UpsertOutcome::Inserted
            } else {
                UpsertOutcome::Duplicate
            });
        }

        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT || body.contains("duplicate key") {
            return Ok(UpsertOutcome::Duplicate);
        }
        bail!(
            "insert failed for folio {} ({}): {status}: {body}",
            record.folio,
            record.rut_emisor
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_trim_and_strip_trailing_slash() {
        let c = Credentials::new(" https://x.supabase.co/ ", " eyJabc ").unwrap();
        assert_eq!(c.url, "https://x.supabase.co");
        assert_eq!(c.key, "eyJabc");
        assert_eq!(
            c.rest_endpoint(TABLE),
            "https://x.supabase.co/rest/v1/compras_sii"
        );
    }

    #[test]
    fn test_credentials_reject_inner_whitespace() {
        assert!(Credentials::new("https://x y.supabase.co", "eyJabc").is_err());
        assert!(Credentials::new("https://x.supabase.co", "eyJ abc").is_err());
    }

    #[test]
    fn test_credentials_reject_doubled_key() {
        let err = Credentials::new("https://x.supabase.co", "eyJaaaeyJbbb").unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_credentials_reject_empty() {
        assert!(Credentials::new("", "eyJabc").is_err());
        assert!(Credentials::new("https://x.supabase.co", "").is_err());
    }
}
