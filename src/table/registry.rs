//! Table registry: binds table file names to schemas.

use crate::error::ApiError;
use crate::table::schema::TableSchema;
use std::collections::HashMap;
use std::sync::Arc;

pub const MOLDS: &str = "molds.csv";
pub const CUTTERS: &str = "cutters.csv";
pub const SHIP_LOG: &str = "shiplog.csv";
pub const LOCATION_LOG: &str = "locationlog.csv";
pub const USER_COMMENTS: &str = "usercomments.csv";

const BUILTIN_TABLES: &[(&str, &[&str], &str)] = &[
    (
        MOLDS,
        &[
            "MoldID",
            "MoldCode",
            "MoldName",
            "CustomerID",
            "RackLayerID",
            "StorageCompany",
            "MoldStatus",
            "MoldNotes",
            "LastUpdated",
        ],
        "M",
    ),
    (
        CUTTERS,
        &[
            "CutterID",
            "CutterNo",
            "CutterName",
            "CutterType",
            "RackLayerID",
            "StorageCompany",
            "CutterStatus",
            "CutterNotes",
            "LastUpdated",
        ],
        "C",
    ),
    (
        SHIP_LOG,
        &[
            "ShipID",
            "MoldID",
            "CutterID",
            "FromCompany",
            "ToCompany",
            "ShipDate",
            "Handler",
            "ShipNotes",
            "DateEntry",
        ],
        "SHIP",
    ),
    (
        LOCATION_LOG,
        &[
            "LocationLogID",
            "MoldID",
            "CutterID",
            "OldRackLayer",
            "NewRackLayer",
            "Employee",
            "LocationNotes",
            "DateEntry",
        ],
        "LOC",
    ),
    (
        USER_COMMENTS,
        &[
            "UserCommentID",
            "ItemID",
            "ItemType",
            "CommentText",
            "EmployeeID",
            "CommentState",
            "DateEntry",
        ],
        "UC",
    ),
];

/// Registry of known tables, keyed by file name
#[derive(Debug, Clone, Default)]
pub struct TableRegistry {
    tables: HashMap<String, Arc<TableSchema>>,
}

impl TableRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the five inventory tables
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (name, columns, prefix) in BUILTIN_TABLES {
            // Built-in column lists are static and valid
            if let Ok(schema) = TableSchema::new(*name, columns, *prefix) {
                registry.register(schema);
            }
        }
        registry
    }

    /// Register (or replace) a table schema
    pub fn register(&mut self, schema: TableSchema) {
        self.tables.insert(schema.name.clone(), Arc::new(schema));
    }

    /// Look up a table by file name
    pub fn get(&self, name: &str) -> Result<Arc<TableSchema>, ApiError> {
        self.tables
            .get(name.trim())
            .cloned()
            .ok_or_else(|| ApiError::UnsupportedTable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name.trim())
    }

    /// All registered schemas, sorted by name
    pub fn list(&self) -> Vec<Arc<TableSchema>> {
        let mut tables: Vec<_> = self.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }
}
