//! Typed partial-update statement builder.
//!
//! Repositories enumerate their updatable columns as static names and bind
//! values positionally; SQL text is assembled only from those static names,
//! so the merge-update path stays injection-proof. A field left out of the
//! update keeps its stored value.

use libsql::Value;

/// Builder for `UPDATE <table> SET ... WHERE id = ?` statements.
pub struct UpdateBuilder {
    table: &'static str,
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl UpdateBuilder {
    /// Start an update against `table`.
    #[must_use]
    pub const fn new(table: &'static str) -> Self {
        Self {
            table,
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Overwrite `column` with `value`.
    pub fn set(&mut self, column: &'static str, value: impl Into<Value>) -> &mut Self {
        self.columns.push(column);
        self.values.push(value.into());
        self
    }

    /// Overwrite `column` only when the caller supplied a value.
    pub fn set_if(&mut self, column: &'static str, value: Option<impl Into<Value>>) -> &mut Self {
        if let Some(value) = value {
            self.set(column, value);
        }
        self
    }

    /// Whether any caller-supplied column has been set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Render the statement and its positional parameters, keyed by row id.
    #[must_use]
    pub fn build(mut self, id: &str) -> (String, Vec<Value>) {
        let assignments = self
            .columns
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, assignments);
        self.values.push(Value::from(id.to_string()));
        (sql, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_statement_from_static_columns() {
        let mut builder = UpdateBuilder::new("vitals");
        builder.set("weight_kg", 72.5).set("updated_at", "ts");
        let (sql, values) = builder.build("abc");

        assert_eq!(sql, "UPDATE vitals SET weight_kg = ?, updated_at = ? WHERE id = ?");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn set_if_skips_absent_fields() {
        let mut builder = UpdateBuilder::new("vitals");
        builder
            .set_if("weight_kg", Some(72.5))
            .set_if("notes", None::<String>);
        assert!(!builder.is_empty());

        let (sql, _) = builder.build("abc");
        assert!(!sql.contains("notes"));
    }

    #[test]
    fn empty_builder_reports_empty() {
        assert!(UpdateBuilder::new("vitals").is_empty());
    }
}
