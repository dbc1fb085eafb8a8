//! Current table shapes, shared by table creation and table rebuilds.

use sea_query::{
    Alias, ColumnDef, Expr, ForeignKey, ForeignKeyAction, Index, IndexCreateStatement, Table,
    TableCreateStatement,
};

use crate::migration::CopyColumn;

pub const CREDENTIALS: &str = "credentials";
pub const STOCK_LOTS: &str = "stock_lots";
pub const DIMENSIONS: &str = "dimensions";
pub const SALES: &str = "sales";

fn id_column() -> ColumnDef {
    ColumnDef::new(Alias::new("id"))
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn timestamp_column(name: &str) -> ColumnDef {
    ColumnDef::new(Alias::new(name))
        .custom(Alias::new("DATETIME"))
        .default(Expr::current_timestamp())
        .to_owned()
}

fn text(name: &str) -> ColumnDef {
    ColumnDef::new(Alias::new(name)).text().to_owned()
}

fn required_text(name: &str) -> ColumnDef {
    ColumnDef::new(Alias::new(name)).text().not_null().to_owned()
}

fn flag(name: &str) -> ColumnDef {
    ColumnDef::new(Alias::new(name)).boolean().not_null().default(false).to_owned()
}

fn parent_key(table: &str) -> sea_query::ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(format!("fk_{table}_stock_lot"))
        .from(Alias::new(table), Alias::new("stock_lot_id"))
        .to(Alias::new(STOCK_LOTS), Alias::new("id"))
        .on_delete(ForeignKeyAction::Cascade)
        .to_owned()
}

pub fn credentials_table() -> TableCreateStatement {
    Table::create()
        .table(Alias::new(CREDENTIALS))
        .if_not_exists()
        .col(id_column())
        .col(ColumnDef::new(Alias::new("code_hash")).text().not_null().unique_key())
        .col(timestamp_column("created_at"))
        .to_owned()
}

/// Sensitive columns are TEXT so ciphertext and plaintext numbers both store verbatim.
pub fn stock_lots_table(name: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(name))
        .if_not_exists()
        .col(id_column())
        .col(ColumnDef::new(Alias::new("entry_date")).custom(Alias::new("DATE")).not_null())
        .col(required_text("serial_number"))
        .col(required_text("type"))
        .col(required_text("weight"))
        .col(required_text("lot_code"))
        .col(required_text("quality"))
        .col(text("customer_name"))
        .col(flag("completed"))
        .col(flag("at_dc"))
        .col(text("coating"))
        .col(text("specifications"))
        .col(text("form"))
        .col(timestamp_column("created_at"))
        .col(timestamp_column("updated_at"))
        .to_owned()
}

pub fn dimensions_table(name: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(name))
        .if_not_exists()
        .col(id_column())
        .col(ColumnDef::new(Alias::new("stock_lot_id")).integer().not_null())
        .col(ColumnDef::new(Alias::new("thickness")).custom(Alias::new("REAL")).not_null())
        .col(ColumnDef::new(Alias::new("width")).integer().not_null())
        .col(timestamp_column("created_at"))
        .foreign_key(&mut parent_key(name))
        .to_owned()
}

pub fn sales_table(name: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(name))
        .if_not_exists()
        .col(id_column())
        .col(ColumnDef::new(Alias::new("stock_lot_id")).integer().not_null())
        .col(required_text("customer_name"))
        .col(required_text("quantity_sold"))
        .col(text("form"))
        .col(ColumnDef::new(Alias::new("sale_date")).custom(Alias::new("DATE")).not_null())
        .col(text("dimensions_snapshot"))
        .col(timestamp_column("created_at"))
        .col(timestamp_column("updated_at"))
        .foreign_key(&mut parent_key(name))
        .to_owned()
}

pub fn dimensions_index() -> IndexCreateStatement {
    Index::create()
        .if_not_exists()
        .name("idx_dimensions_stock_lot_id")
        .table(Alias::new(DIMENSIONS))
        .col(Alias::new("stock_lot_id"))
        .to_owned()
}

pub fn sales_index() -> IndexCreateStatement {
    Index::create()
        .if_not_exists()
        .name("idx_sales_stock_lot_id_sale_date")
        .table(Alias::new(SALES))
        .col(Alias::new("stock_lot_id"))
        .col(Alias::new("sale_date"))
        .to_owned()
}

pub const STOCK_LOT_COPY: &[CopyColumn] = &[
    CopyColumn::keep("id", "NULL"),
    CopyColumn::keep("entry_date", "date('now')"),
    CopyColumn::keep("serial_number", "''"),
    CopyColumn::keep("type", "''"),
    CopyColumn::keep("weight", "'0'"),
    CopyColumn::keep("lot_code", "''"),
    CopyColumn::keep("quality", "''"),
    CopyColumn::keep("customer_name", "NULL"),
    CopyColumn::keep("completed", "0"),
    CopyColumn::keep("at_dc", "0"),
    CopyColumn::keep("coating", "NULL"),
    CopyColumn::keep("specifications", "NULL"),
    CopyColumn::keep("form", "NULL"),
    CopyColumn::keep("created_at", "CURRENT_TIMESTAMP"),
    CopyColumn::keep("updated_at", "CURRENT_TIMESTAMP"),
];

pub const SALE_COPY: &[CopyColumn] = &[
    CopyColumn::keep("id", "NULL"),
    CopyColumn::keep("stock_lot_id", "0"),
    CopyColumn::keep("customer_name", "''"),
    CopyColumn::keep("quantity_sold", "'0'"),
    CopyColumn::keep("form", "NULL"),
    CopyColumn::keep("sale_date", "date('now')"),
    CopyColumn::keep("dimensions_snapshot", "NULL"),
    CopyColumn::keep("created_at", "CURRENT_TIMESTAMP"),
    CopyColumn::keep("updated_at", "CURRENT_TIMESTAMP"),
];

/// Thickness keeps two places; width becomes a whole number.
pub const DIMENSION_COPY: &[CopyColumn] = &[
    CopyColumn::keep("id", "NULL"),
    CopyColumn::keep("stock_lot_id", "0"),
    CopyColumn::transformed("thickness", "0", "ROUND({}, 2)"),
    CopyColumn::transformed("width", "0", "CAST(ROUND({}) AS INTEGER)"),
    CopyColumn::keep("created_at", "CURRENT_TIMESTAMP"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use sea_query::SqliteQueryBuilder;

    #[test]
    fn test_sensitive_columns_are_text() {
        let sql = stock_lots_table(STOCK_LOTS).build(SqliteQueryBuilder).to_lowercase();
        assert!(sql.contains("\"weight\" text"));
        assert!(!sql.contains("check"));
        let sql = sales_table(SALES).build(SqliteQueryBuilder).to_lowercase();
        assert!(sql.contains("\"quantity_sold\" text"));
        assert!(sql.contains("on delete cascade"));
    }

    #[test]
    fn test_copy_lists_cover_every_column() {
        let sql = stock_lots_table(STOCK_LOTS).build(SqliteQueryBuilder);
        for column in STOCK_LOT_COPY {
            assert!(sql.contains(&format!("\"{}\"", column.name)), "{}", column.name);
        }
        let sql = dimensions_table(DIMENSIONS).build(SqliteQueryBuilder);
        for column in DIMENSION_COPY {
            assert!(sql.contains(&format!("\"{}\"", column.name)), "{}", column.name);
        }
    }
}
