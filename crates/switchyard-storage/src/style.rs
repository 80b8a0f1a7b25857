//! Hop colors and formats.

use sqlx::SqlitePool;
use switchyard_core::{HopColor, HopFormat};

use crate::error::{StorageError, StorageResult};

#[derive(sqlx::FromRow)]
struct ColorRow {
    id: i64,
    hop: String,
    #[sqlx(rename = "where")]
    scope: Option<String>,
    tag_color: Option<String>,
    text_color: Option<String>,
}

impl From<ColorRow> for HopColor {
    fn from(r: ColorRow) -> Self {
        Self {
            id: r.id,
            hop: r.hop,
            scope: r.scope,
            tag_color: r.tag_color,
            text_color: r.text_color,
        }
    }
}

#[derive(sqlx::FromRow)]
struct FormatRow {
    id: i64,
    hop: String,
    format: String,
    render: bool,
}

impl From<FormatRow> for HopFormat {
    fn from(r: FormatRow) -> Self {
        Self {
            id: r.id,
            hop: r.hop,
            format: r.format,
            render: r.render,
        }
    }
}

/// SQLite-backed hop style store.
#[derive(Debug, Clone)]
pub struct HopStyleRepository {
    pool: SqlitePool,
}

impl HopStyleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Colors, most specific first: longer hop patterns, then longer scopes.
    pub async fn colors(&self) -> StorageResult<Vec<HopColor>> {
        let rows = sqlx::query_as::<_, ColorRow>(
            r#"SELECT id, hop, "where", tag_color, text_color FROM route_hop_color
               ORDER BY LENGTH(hop) DESC, LENGTH(COALESCE("where", '')) DESC, id"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Formats, longer hop patterns first.
    pub async fn formats(&self) -> StorageResult<Vec<HopFormat>> {
        let rows = sqlx::query_as::<_, FormatRow>(
            "SELECT id, hop, format, render FROM route_hop_format ORDER BY LENGTH(hop) DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn add_color(&self, color: &HopColor) -> StorageResult<HopColor> {
        let id = sqlx::query(
            r#"INSERT INTO route_hop_color (hop, "where", tag_color, text_color)
               VALUES (?, ?, ?, ?)"#,
        )
        .bind(&color.hop)
        .bind(&color.scope)
        .bind(&color.tag_color)
        .bind(&color.text_color)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(HopColor { id, ..color.clone() })
    }

    pub async fn add_format(&self, format: &HopFormat) -> StorageResult<HopFormat> {
        let id = sqlx::query("INSERT INTO route_hop_format (hop, format, render) VALUES (?, ?, ?)")
            .bind(&format.hop)
            .bind(&format.format)
            .bind(format.render)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(HopFormat { id, ..format.clone() })
    }

    pub async fn delete_color(&self, id: i64) -> StorageResult<()> {
        let affected = sqlx::query("DELETE FROM route_hop_color WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(StorageError::NotFound { entity: "hop color", id });
        }
        Ok(())
    }

    pub async fn delete_format(&self, id: i64) -> StorageResult<()> {
        let affected = sqlx::query("DELETE FROM route_hop_format WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(StorageError::NotFound { entity: "hop format", id });
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[tokio::test]
    async fn colors_are_ordered_by_specificity() {
        let repo = HopStyleRepository::new(schema::memory().await.unwrap());
        repo.add_color(&HopColor::tag("system", "AAAAAA")).await.unwrap();
        repo.add_color(&HopColor::tag("system(tower-attack)", "F06AED"))
            .await
            .unwrap();
        repo.add_color(&HopColor::tag("system", "BBBBBB").scoped("aopriv"))
            .await
            .unwrap();

        let colors = repo.colors().await.unwrap();
        let tags: Vec<_> = colors.iter().filter_map(|c| c.tag_color.as_deref()).collect();
        assert_eq!(tags, ["F06AED", "BBBBBB", "AAAAAA"]);
    }

    #[tokio::test]
    async fn formats_keep_render_flag() {
        let repo = HopStyleRepository::new(schema::memory().await.unwrap());
        let hidden = repo.add_format(&HopFormat::hidden("aotell")).await.unwrap();
        repo.add_format(&HopFormat::new("relay(*)", "R:%s")).await.unwrap();

        let formats = repo.formats().await.unwrap();
        assert_eq!(formats[0].hop, "relay(*)");
        assert!(!formats[1].render);

        repo.delete_format(hidden.id).await.unwrap();
        assert!(matches!(
            repo.delete_format(hidden.id).await,
            Err(StorageError::NotFound { .. })
        ));
        assert_eq!(repo.formats().await.unwrap().len(), 1);
    }
}
