use std::str::FromStr;

use sea_orm::{
    ColumnType, EntityTrait, Value,
    sea_query::{Alias, Expr, SimpleExpr},
};

use super::query_key::{Modifier, QueryKey};
use crate::core::plan::QueryPlan;
use crate::errors::ApiError;
use crate::metadata::{ColumnInfo, FieldIndex, FieldKind};
use crate::models::QueryValue;

/// SQL comparison applied by one filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

impl FilterOperator {
    /// Operator for a modifier; without one, a list of values means `IN`
    #[must_use]
    pub fn select(modification: Option<Modifier>, value: &QueryValue) -> Self {
        match modification {
            None if value.is_many() => Self::In,
            None => Self::Eq,
            Some(Modifier::Not) => Self::Neq,
            Some(Modifier::Gt) => Self::Gt,
            Some(Modifier::Gte) => Self::Gte,
            Some(Modifier::Lt) => Self::Lt,
            Some(Modifier::Lte) => Self::Lte,
            Some(Modifier::In) => Self::In,
            Some(Modifier::NotIn) => Self::NotIn,
        }
    }

    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        }
    }

    const fn takes_list(self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

/// Resolve one filter key against the entity and narrow the plan with it.
///
/// Relation keys add (or reuse) a join; the comparison then runs on the joined alias.
///
/// # Errors
///
/// Returns `InvalidQueryKey` when the key names no field, addresses a column the related entity
/// lacks, follows more than one relation, or carries a value the column cannot hold.
pub fn apply_filter<E: EntityTrait>(
    plan: &mut QueryPlan<E>,
    fields: &FieldIndex<E>,
    key: &QueryKey,
) -> Result<(), ApiError> {
    let invalid = |reason: &str| ApiError::invalid_query_key(&key.raw, reason);

    let kind = fields
        .resolve(&key.base)
        .ok_or_else(|| invalid("unknown field"))?;

    let (table, column) = match kind {
        FieldKind::Plain(field) => {
            if key.has_path() {
                return Err(invalid("plain fields have no nested fields"));
            }
            (fields.table().to_string(), field.info.clone())
        }
        FieldKind::OneToOne(relation)
        | FieldKind::OneToMany(relation)
        | FieldKind::ManyToOne(relation)
        | FieldKind::ManyToMany(relation) => {
            if key.path.len() > 1 {
                return Err(invalid("only one relation can be followed"));
            }
            let name = key
                .path
                .first()
                .map_or(relation.target.primary_key.as_str(), String::as_str);
            let column = relation
                .target
                .column(name)
                .cloned()
                .ok_or_else(|| invalid("unknown field on related entity"))?;
            (plan.join(relation), column)
        }
    };

    let predicate = build_predicate(&table, &column, key.modification, &key.value)
        .map_err(|reason| invalid(&reason))?;
    plan.filter(predicate);
    Ok(())
}

/// `table.column <op> value`, with every value bound as a parameter.
///
/// # Errors
///
/// Returns the reason when the value does not fit the operator or the column type.
pub fn build_predicate(
    table: &str,
    column: &ColumnInfo,
    modification: Option<Modifier>,
    value: &QueryValue,
) -> Result<SimpleExpr, String> {
    let operator = FilterOperator::select(modification, value);
    let target = Expr::col((Alias::new(table), Alias::new(&column.name)));

    match (operator.takes_list(), value) {
        (true, QueryValue::Many(values)) => {
            let values = values
                .iter()
                .map(|raw| coerce(&column.column_type, raw))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(if operator == FilterOperator::In {
                target.is_in(values)
            } else {
                target.clone().is_null().or(target.is_not_in(values))
            })
        }
        (true, QueryValue::Single(raw)) => {
            let value = coerce(&column.column_type, raw)?;
            Ok(if operator == FilterOperator::In {
                target.is_in([value])
            } else {
                target.clone().is_null().or(target.is_not_in([value]))
            })
        }
        (false, QueryValue::Many(_)) => {
            Err(format!("'{}' takes a single value", operator.sql()))
        }
        (false, QueryValue::Single(raw)) => {
            let value = coerce(&column.column_type, raw)?;
            Ok(match operator {
                // NULL never compares unequal, and `f=v` / `f__not=v` must cover every row.
                // The comparison goes on the right so sea-query parenthesizes the OR.
                FilterOperator::Neq => target.clone().is_null().or(target.ne(value)),
                FilterOperator::Gt => target.gt(value),
                FilterOperator::Gte => target.gte(value),
                FilterOperator::Lt => target.lt(value),
                FilterOperator::Lte => target.lte(value),
                _ => target.eq(value),
            })
        }
    }
}

/// Convert a raw query-string value into a value of the column's type.
///
/// Column types without a dedicated parser (text, dates, uuids, ...) are compared as strings.
///
/// # Errors
///
/// Returns the reason when the value cannot be parsed as the column's type.
pub fn coerce(column_type: &ColumnType, raw: &str) -> Result<Value, String> {
    let raw = raw.trim();
    let value: Value = match column_type {
        ColumnType::TinyInteger => parse_as::<i8>(raw, "integer")?.into(),
        ColumnType::SmallInteger => parse_as::<i16>(raw, "integer")?.into(),
        ColumnType::Integer => parse_as::<i32>(raw, "integer")?.into(),
        ColumnType::BigInteger => parse_as::<i64>(raw, "integer")?.into(),
        ColumnType::TinyUnsigned => parse_as::<u8>(raw, "integer")?.into(),
        ColumnType::SmallUnsigned => parse_as::<u16>(raw, "integer")?.into(),
        ColumnType::Unsigned => parse_as::<u32>(raw, "integer")?.into(),
        ColumnType::BigUnsigned => parse_as::<u64>(raw, "integer")?.into(),
        ColumnType::Float => parse_as::<f32>(raw, "number")?.into(),
        ColumnType::Double | ColumnType::Decimal(_) => parse_as::<f64>(raw, "number")?.into(),
        ColumnType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => true.into(),
            "false" | "0" => false.into(),
            _ => return Err(format!("'{raw}' is not a valid boolean")),
        },
        _ => raw.to_string().into(),
    };
    Ok(value)
}

fn parse_as<T: FromStr>(raw: &str, kind: &str) -> Result<T, String> {
    raw.parse::<T>()
        .map_err(|_| format!("'{raw}' is not a valid {kind}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::{Query, SqliteQueryBuilder};

    fn column(name: &str, column_type: ColumnType) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            column_type,
        }
    }

    fn render(predicate: SimpleExpr) -> String {
        Query::select()
            .expr(Expr::val(1))
            .from(Alias::new("posts"))
            .and_where(predicate)
            .to_string(SqliteQueryBuilder)
    }

    #[test]
    fn test_operator_selection() {
        let single = QueryValue::Single("1".into());
        let many = QueryValue::Many(vec!["1".into(), "2".into()]);
        assert_eq!(FilterOperator::select(None, &single), FilterOperator::Eq);
        assert_eq!(FilterOperator::select(None, &many), FilterOperator::In);
        assert_eq!(
            FilterOperator::select(Some(Modifier::Not), &single),
            FilterOperator::Neq
        );
        assert_eq!(
            FilterOperator::select(Some(Modifier::NotIn), &many),
            FilterOperator::NotIn
        );
        assert_eq!(FilterOperator::Neq.sql(), "<>");
    }

    #[test]
    fn test_integer_column_binds_typed_value() {
        let views = column("views", ColumnType::Integer);
        let predicate = build_predicate(
            "posts",
            &views,
            Some(Modifier::Gte),
            &QueryValue::Single("10".into()),
        )
        .unwrap();
        let sql = render(predicate);
        assert!(sql.contains(r#""posts"."views" >= 10"#), "{sql}");
    }

    #[test]
    fn test_negations_keep_null_rows() {
        let author_id = column("author_id", ColumnType::Integer);
        let sql = render(
            build_predicate(
                "posts",
                &author_id,
                Some(Modifier::Not),
                &QueryValue::Single("1".into()),
            )
            .unwrap(),
        );
        assert!(
            sql.contains(r#""posts"."author_id" IS NULL OR "posts"."author_id" <> 1"#),
            "{sql}"
        );

        let sql = render(
            build_predicate(
                "posts",
                &author_id,
                Some(Modifier::NotIn),
                &QueryValue::Many(vec!["1".into(), "2".into()]),
            )
            .unwrap(),
        );
        assert!(
            sql.contains(r#""posts"."author_id" IS NULL OR "posts"."author_id" NOT IN (1, 2)"#),
            "{sql}"
        );
    }

    #[test]
    fn test_negation_stays_grouped_next_to_other_filters() {
        let author_id = column("author_id", ColumnType::Integer);
        let negated = build_predicate(
            "posts",
            &author_id,
            Some(Modifier::Not),
            &QueryValue::Single("1".into()),
        )
        .unwrap();
        let sql = Query::select()
            .expr(Expr::val(1))
            .from(Alias::new("posts"))
            .and_where(Expr::col((Alias::new("posts"), Alias::new("views"))).gt(3))
            .and_where(negated)
            .to_string(SqliteQueryBuilder);
        assert!(
            sql.ends_with(r#"> 3 AND ("posts"."author_id" IS NULL OR "posts"."author_id" <> 1)"#),
            "{sql}"
        );
    }

    #[test]
    fn test_repeated_values_become_in() {
        let id = column("id", ColumnType::Integer);
        let predicate = build_predicate(
            "posts",
            &id,
            None,
            &QueryValue::Many(vec!["1".into(), "2".into()]),
        )
        .unwrap();
        assert!(render(predicate).contains(r#""posts"."id" IN (1, 2)"#));
    }

    #[test]
    fn test_string_values_are_quoted_not_spliced() {
        let title = column("title", ColumnType::Text);
        let predicate = build_predicate(
            "posts",
            &title,
            None,
            &QueryValue::Single("x' OR '1'='1".into()),
        )
        .unwrap();
        let sql = render(predicate);
        assert!(sql.contains(r#""posts"."title" = 'x"#), "{sql}");
        assert!(!sql.contains("OR '1'='1'"), "{sql}");
    }

    #[test]
    fn test_scalar_operator_rejects_lists() {
        let views = column("views", ColumnType::Integer);
        let result = build_predicate(
            "posts",
            &views,
            Some(Modifier::Gt),
            &QueryValue::Many(vec!["1".into(), "2".into()]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_coerce_rejects_mismatched_types() {
        assert!(coerce(&ColumnType::Integer, "abc").is_err());
        assert!(coerce(&ColumnType::Boolean, "maybe").is_err());
        assert_eq!(coerce(&ColumnType::Boolean, "TRUE"), Ok(Value::from(true)));
        assert_eq!(coerce(&ColumnType::BigInteger, " 7 "), Ok(Value::from(7_i64)));
        assert_eq!(
            coerce(&ColumnType::Text, "hello"),
            Ok(Value::from("hello".to_string()))
        );
    }
}
