use crate::domain::models::table::Cell;

/// SQL Server column types the loader knows how to create or fill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    BigInt,
    Int,
    SmallInt,
    TinyInt,
    Float,
    Real,
    Bit,
    /// `DECIMAL` / `NUMERIC`; values are sent at exactly this scale.
    Decimal { precision: u8, scale: u8 },
    DateTime2,
    DateTime,
    SmallDateTime,
    Date,
    /// Character columns the bulk path can fill with strings.
    Text,
    /// Anything else found on an existing table (`money`, `uniqueidentifier`,
    /// `ntext`, ...). Values are sent as text parameters and converted by the server.
    Other(String),
}

impl SqlType {
    /// Narrowest type that holds every non-null cell of a column.
    pub fn infer<'a>(cells: impl Iterator<Item = &'a Cell>) -> SqlType {
        let (mut ints, mut floats, mut bools, mut dates, mut texts) = (0, 0, 0, 0, 0);
        for cell in cells {
            match cell {
                Cell::Null => {}
                Cell::Int(_) => ints += 1,
                Cell::Float(_) => floats += 1,
                Cell::Bool(_) => bools += 1,
                Cell::DateTime(_) => dates += 1,
                Cell::Text(_) => texts += 1,
            }
        }
        let numeric = ints + floats;
        let total = numeric + bools + dates + texts;
        if total == 0 || texts > 0 {
            SqlType::Text
        } else if numeric == total {
            if floats == 0 {
                SqlType::BigInt
            } else {
                SqlType::Float
            }
        } else if bools == total {
            SqlType::Bit
        } else if dates == total {
            SqlType::DateTime2
        } else {
            SqlType::Text
        }
    }

    /// Maps an `INFORMATION_SCHEMA.COLUMNS` row onto a loader type.
    pub fn from_data_type(data_type: &str, precision: Option<u8>, scale: Option<u8>) -> SqlType {
        match data_type.to_lowercase().as_str() {
            "bigint" => SqlType::BigInt,
            "int" => SqlType::Int,
            "smallint" => SqlType::SmallInt,
            "tinyint" => SqlType::TinyInt,
            "float" => SqlType::Float,
            "real" => SqlType::Real,
            "bit" => SqlType::Bit,
            "decimal" | "numeric" => SqlType::Decimal {
                precision: precision.unwrap_or(18),
                scale: scale.unwrap_or(0),
            },
            "datetime2" => SqlType::DateTime2,
            "datetime" => SqlType::DateTime,
            "smalldatetime" => SqlType::SmallDateTime,
            "date" => SqlType::Date,
            "nvarchar" | "varchar" | "nchar" | "char" => SqlType::Text,
            other => SqlType::Other(other.to_string()),
        }
    }

    /// Whether TDS bulk load can carry values of this type.
    pub fn bulk_loadable(&self) -> bool {
        !matches!(self, SqlType::Other(_))
    }

    /// Column type used when the loader creates the table itself.
    pub fn ddl(&self) -> String {
        match self {
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Int => "INT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::TinyInt => "TINYINT".to_string(),
            SqlType::Float => "FLOAT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Bit => "BIT".to_string(),
            SqlType::DateTime2 => "DATETIME2(7)".to_string(),
            SqlType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::SmallDateTime => "SMALLDATETIME".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Text => "NVARCHAR(MAX)".to_string(),
            SqlType::Other(name) => name.to_uppercase(),
        }
    }
}
