//! Request template catalog

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::core::error::{AppError, AppResult};
use crate::core::models::{NewTemplate, Template, TemplatePatch};
use crate::core::types::{Category, Priority};
use crate::intake::traits::TemplateCatalog;
use crate::storage::db::{get_connection, DbPool};

const TEMPLATE_COLUMNS: &str = "id, name, description, category, priority, estimated_time_hours, is_active, created_at";

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<Template> {
    Ok(Template {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        priority: row.get(4)?,
        estimated_time_hours: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn get_template(conn: &Connection, id: i64) -> AppResult<Option<Template>> {
    let sql = format!("SELECT {} FROM ticket_templates WHERE id = ?1", TEMPLATE_COLUMNS);
    Ok(conn.query_row(&sql, params![id], template_from_row).optional()?)
}

pub fn list_templates(conn: &Connection, active_only: bool) -> AppResult<Vec<Template>> {
    let sql = format!(
        "SELECT {} FROM ticket_templates WHERE (?1 = 0 OR is_active = 1) ORDER BY name, id",
        TEMPLATE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![active_only], template_from_row)?;

    let mut templates = Vec::new();
    for row in rows {
        templates.push(row?);
    }
    Ok(templates)
}

pub fn create_template(conn: &Connection, template: &NewTemplate) -> AppResult<Template> {
    let name = template.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("template name must not be empty".to_string()));
    }

    conn.execute(
        "INSERT INTO ticket_templates (name, description, category, priority, estimated_time_hours, is_active, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        params![
            name,
            template.description,
            template.category,
            template.priority,
            template.estimated_time_hours,
            Utc::now(),
        ],
    )?;

    let id = conn.last_insert_rowid();
    get_template(conn, id)?.ok_or(AppError::Database(rusqlite::Error::QueryReturnedNoRows))
}

/// Partial update. `Ok(None)` when the template does not exist.
pub fn update_template(conn: &Connection, id: i64, patch: &TemplatePatch) -> AppResult<Option<Template>> {
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("template name must not be empty".to_string()));
        }
    }

    let changed = conn.execute(
        "UPDATE ticket_templates SET \
             name = COALESCE(?1, name), \
             description = COALESCE(?2, description), \
             category = COALESCE(?3, category), \
             priority = COALESCE(?4, priority), \
             estimated_time_hours = COALESCE(?5, estimated_time_hours), \
             is_active = COALESCE(?6, is_active) \
         WHERE id = ?7",
        params![
            patch.name.as_deref().map(str::trim),
            patch.description,
            patch.category,
            patch.priority,
            patch.estimated_time_hours,
            patch.is_active,
            id,
        ],
    )?;

    if changed == 0 {
        return Ok(None);
    }
    get_template(conn, id)
}

/// Soft delete. Returns whether an active template was deactivated.
pub fn deactivate_template(conn: &Connection, id: i64) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE ticket_templates SET is_active = 0 WHERE id = ?1 AND is_active = 1",
        params![id],
    )?;
    Ok(changed > 0)
}

/// Templates created by `seed-templates` on an empty catalog.
pub fn default_templates() -> Vec<NewTemplate> {
    let template = |name: &str, description: &str, category, priority, hours| NewTemplate {
        name: name.to_string(),
        description: Some(description.to_string()),
        category,
        priority,
        estimated_time_hours: Some(hours),
    };

    vec![
        template(
            "Expense reimbursement",
            "Reimbursement of out-of-pocket business expenses",
            Category::Expense,
            Priority::Medium,
            48,
        ),
        template(
            "Supplier invoice payment",
            "Payment of a received supplier invoice",
            Category::Invoice,
            Priority::High,
            24,
        ),
        template(
            "Bank transfer",
            "One-off outgoing payment",
            Category::Payment,
            Priority::High,
            8,
        ),
        template(
            "Budget approval",
            "Approval of a new or extended budget line",
            Category::Budget,
            Priority::Medium,
            72,
        ),
        template(
            "Other finance request",
            "Anything that does not fit the other templates",
            Category::Other,
            Priority::Low,
            48,
        ),
    ]
}

/// Inserts [`default_templates`] when the catalog is empty. Returns how many were added.
pub fn seed_default_templates(conn: &Connection) -> AppResult<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM ticket_templates", [], |row| row.get(0))?;
    if existing > 0 {
        log::info!("Template catalog already has {} entries, skipping seed", existing);
        return Ok(0);
    }

    let defaults = default_templates();
    for template in &defaults {
        create_template(conn, template)?;
    }
    log::info!("Seeded {} default templates", defaults.len());
    Ok(defaults.len())
}

/// [`TemplateCatalog`] over the shared SQLite pool, plus the admin operations
/// used by the dashboard API.
#[derive(Clone)]
pub struct SqliteTemplateCatalog {
    pool: DbPool,
}

impl SqliteTemplateCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn all_templates(&self) -> AppResult<Vec<Template>> {
        let conn = get_connection(&self.pool)?;
        list_templates(&conn, false)
    }

    pub fn create_template(&self, template: &NewTemplate) -> AppResult<Template> {
        let conn = get_connection(&self.pool)?;
        create_template(&conn, template)
    }

    pub fn update_template(&self, id: i64, patch: &TemplatePatch) -> AppResult<Option<Template>> {
        let conn = get_connection(&self.pool)?;
        update_template(&conn, id, patch)
    }

    pub fn deactivate_template(&self, id: i64) -> AppResult<bool> {
        let conn = get_connection(&self.pool)?;
        deactivate_template(&conn, id)
    }

    pub fn seed_default_templates(&self) -> AppResult<usize> {
        let conn = get_connection(&self.pool)?;
        seed_default_templates(&conn)
    }
}

impl TemplateCatalog for SqliteTemplateCatalog {
    fn active_templates(&self) -> AppResult<Vec<Template>> {
        let conn = get_connection(&self.pool)?;
        list_templates(&conn, true)
    }

    fn get(&self, id: i64) -> AppResult<Option<Template>> {
        let conn = get_connection(&self.pool)?;
        get_template(&conn, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::create_pool;
    use tempfile::NamedTempFile;

    fn catalog() -> (NamedTempFile, SqliteTemplateCatalog) {
        let file = NamedTempFile::new().unwrap();
        let pool = create_pool(file.path().to_str().unwrap()).unwrap();
        (file, SqliteTemplateCatalog::new(pool))
    }

    #[test]
    fn test_seed_only_fills_empty_catalog() {
        let (_file, catalog) = catalog();
        assert_eq!(catalog.seed_default_templates().unwrap(), default_templates().len());
        assert_eq!(catalog.seed_default_templates().unwrap(), 0);

        let names: Vec<String> = catalog.active_templates().unwrap().into_iter().map(|t| t.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_deactivated_template_is_hidden_but_readable() {
        let (_file, catalog) = catalog();
        let template = catalog
            .create_template(&NewTemplate {
                name: "Petty cash".to_string(),
                description: None,
                category: Category::Expense,
                priority: Priority::Low,
                estimated_time_hours: None,
            })
            .unwrap();
        assert!(template.is_active);

        assert!(catalog.deactivate_template(template.id).unwrap());
        assert!(!catalog.deactivate_template(template.id).unwrap());
        assert!(catalog.active_templates().unwrap().is_empty());
        assert_eq!(catalog.all_templates().unwrap().len(), 1);

        let stored = TemplateCatalog::get(&catalog, template.id).unwrap().unwrap();
        assert!(!stored.is_active);
    }

    #[test]
    fn test_update_template_partial() {
        let (_file, catalog) = catalog();
        let template = catalog.create_template(&default_templates()[0]).unwrap();

        let updated = catalog
            .update_template(
                template.id,
                &TemplatePatch {
                    priority: Some(Priority::Urgent),
                    ..TemplatePatch::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.priority, Priority::Urgent);
        assert_eq!(updated.name, template.name);
        assert_eq!(updated.category, template.category);

        assert_eq!(catalog.update_template(999, &TemplatePatch::default()).unwrap(), None);
    }

    #[test]
    fn test_blank_name_rejected() {
        let (_file, catalog) = catalog();
        let mut template = default_templates().remove(0);
        template.name = "  ".to_string();
        assert!(matches!(catalog.create_template(&template), Err(AppError::Validation(_))));
    }
}
