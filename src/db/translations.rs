use std::collections::BTreeMap;

use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::models::StoredTranslation;

use super::Repository;

impl Repository {
    /// One row per (store, language); a second call replaces the text.
    pub async fn upsert_translation(&self, store_id: i64, lang_code: &str, text: &str) -> Result<()> {
        let lang_code = lang_code.to_string();
        let text = text.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO store_translations (store_id, language_code, translated_summary)
                       VALUES (?1, ?2, ?3)
                       ON CONFLICT(store_id, language_code) DO UPDATE SET
                           translated_summary = excluded.translated_summary"#,
                    params![store_id, lang_code, text],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_translation(&self, store_id: i64, lang_code: &str) -> Result<Option<String>> {
        let lang_code = lang_code.to_string();
        let text = self
            .conn
            .call(move |conn| {
                let text = conn
                    .query_row(
                        "SELECT translated_summary FROM store_translations WHERE store_id = ?1 AND language_code = ?2",
                        params![store_id, lang_code],
                        |row| row.get::<_, Option<String>>(0),
                    )
                    .optional()?;
                Ok(text.flatten())
            })
            .await?;
        Ok(text)
    }

    /// Every translation of a store keyed by language code. Codes missing from
    /// the `languages` table are left out.
    pub async fn get_all_translations(&self, store_id: i64) -> Result<BTreeMap<String, StoredTranslation>> {
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT st.language_code, COALESCE(st.translated_summary, ''), l.lang_name
                       FROM store_translations st
                       JOIN languages l ON st.language_code = l.lang_code
                       WHERE st.store_id = ?1"#,
                )?;
                let rows = stmt
                    .query_map(params![store_id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            StoredTranslation {
                                text: row.get(1)?,
                                lang_name: row.get(2)?,
                            },
                        ))
                    })?
                    .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
                Ok(rows)
            })
            .await?;
        tracing::debug!("Loaded {} translations for store {}", rows.len(), store_id);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_replaces_existing_text() {
        let repo = Repository::open_in_memory().await.unwrap();
        let id = repo.insert_store("Cafe", "p", true).await.unwrap();

        repo.upsert_translation(id, "en", "first").await.unwrap();
        repo.upsert_translation(id, "en", "second").await.unwrap();

        assert_eq!(repo.count_rows("store_translations").await.unwrap(), 1);
        assert_eq!(
            repo.get_translation(id, "en").await.unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(repo.get_translation(id, "ja").await.unwrap(), None);
    }

    #[tokio::test]
    async fn get_all_joins_language_names() {
        let repo = Repository::open_in_memory().await.unwrap();
        let id = repo.insert_store("Cafe", "p", true).await.unwrap();
        repo.seed_languages(&[("en", "English"), ("ja", "日本語")]).await.unwrap();

        repo.upsert_translation(id, "en", "hello").await.unwrap();
        repo.upsert_translation(id, "ja", "こんにちは").await.unwrap();
        repo.upsert_translation(id, "xx", "unknown language").await.unwrap();

        let all = repo.get_all_translations(id).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["ja"].lang_name, "日本語");
        assert_eq!(all["en"].text, "hello");
    }
}
