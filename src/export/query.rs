/// Quote an identifier with Access/Jet brackets, doubling any closing bracket.
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// A full-table select with an optional ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub table: String,
    pub order_by: Vec<String>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>, order_by: Vec<String>) -> Self {
        Self {
            table: table.into(),
            order_by,
        }
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("SELECT * FROM {}", quote_identifier(&self.table));
        if !self.order_by.is_empty() {
            let columns: Vec<String> = self.order_by.iter().map(|c| quote_identifier(c)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&columns.join(", "));
        }
        sql
    }
}
