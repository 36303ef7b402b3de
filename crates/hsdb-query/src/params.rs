//! The flat key/value parameter grammar.
//!
//! Condition keys are `field` (equality) or `field__op` with op one of
//! `eq`, `gt`, `gte`, `lt`, `lte`, `contains`. Control keys are `sort`
//! (`-field` for descending), `order`, `page`, `page_size`, `limit`,
//! `offset`, `include_relations`, `expand_relations`, `fields` and
//! `ids_only`. Literals are parsed according to the field's declared type.

use hsdb_index::IndexDatabase;
use hsdb_record::RelationMode;
use hsdb_types::{FieldType, TypeError, Value};

use crate::condition::Operator;
use crate::error::{QueryError, QueryResult};
use crate::query::{Paging, Query, SortOrder, DEFAULT_PAGE_SIZE};

#[derive(Default)]
struct Controls {
    sort: Option<(String, Option<SortOrder>)>,
    order: Option<SortOrder>,
    page: Option<i64>,
    page_size: Option<usize>,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl<'db> Query<'db> {
    /// Build a query from ordered key/value parameters.
    pub fn from_params<I, K, V>(db: &'db IndexDatabase, model: &str, params: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Query::new(db, model)?;
        let mut controls = Controls::default();
        let mut shape = query.response_shape().clone();

        for (key, raw) in params {
            let (key, raw) = (key.as_ref(), raw.as_ref());
            match key {
                "sort" => {
                    controls.sort = Some(match raw.strip_prefix('-') {
                        Some(field) => (field.to_string(), Some(SortOrder::Descending)),
                        None => (raw.to_string(), None),
                    })
                }
                "order" => controls.order = Some(parse_order(key, raw)?),
                "page" => controls.page = Some(parse_num(key, raw)?),
                "page_size" => controls.page_size = Some(parse_num(key, raw)?),
                "limit" => controls.limit = Some(parse_num(key, raw)?),
                "offset" => controls.offset = Some(parse_num(key, raw)?),
                "include_relations" => {
                    if !parse_flag(key, raw)? {
                        shape.relations = RelationMode::Omit;
                    }
                }
                "expand_relations" => {
                    if parse_flag(key, raw)? {
                        shape.relations = RelationMode::Expand;
                    }
                }
                "fields" => {
                    shape.fields = Some(
                        raw.split(',')
                            .map(str::trim)
                            .filter(|f| !f.is_empty())
                            .map(str::to_string)
                            .collect(),
                    )
                }
                "ids_only" => shape.ids_only = parse_flag(key, raw)?,
                _ => {
                    let (field, op) = split_key(key);
                    let value = query.parse_literal(key, field, op, raw)?;
                    query = query.condition(field, op, value)?;
                }
            }
        }

        if let Some((field, order)) = controls.sort {
            query = query.sort_by(&field)?;
            if let Some(order) = order.or(controls.order) {
                query = query.order(order);
            }
        } else if let Some(order) = controls.order {
            query = query.order(order);
        }

        if let Some(page) = controls.page {
            let size = controls.page_size.or(controls.limit).unwrap_or(DEFAULT_PAGE_SIZE);
            query = query.page(page, size)?;
        } else if controls.offset.is_some() || controls.limit.is_some() {
            query = query.offset(controls.offset.unwrap_or(0), controls.limit);
        }

        Ok(query.with_shape(shape))
    }

    /// Serialize conditions and controls back to the parameter grammar.
    ///
    /// `contains` lists are joined with commas and not escaped, so a string
    /// item holding a comma reads back as two items.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .conditions()
            .iter()
            .map(|c| (c.param_key(), c.value.to_param()))
            .collect();
        if let Some((field, order)) = self.sorting() {
            let value = match order {
                SortOrder::Ascending => field.to_string(),
                SortOrder::Descending => format!("-{field}"),
            };
            params.push(("sort".into(), value));
        }
        match self.paging() {
            Some(Paging::Page { page, size }) => {
                params.push(("page".into(), page.to_string()));
                params.push(("page_size".into(), size.to_string()));
            }
            Some(Paging::Offset { offset, limit }) => {
                params.push(("offset".into(), offset.to_string()));
                if let Some(limit) = limit {
                    params.push(("limit".into(), limit.to_string()));
                }
            }
            None => {}
        }
        let shape = self.response_shape();
        match shape.relations {
            RelationMode::Omit => params.push(("include_relations".into(), "false".into())),
            RelationMode::Expand => params.push(("expand_relations".into(), "true".into())),
            RelationMode::Ids => {}
        }
        if let Some(fields) = &shape.fields {
            params.push(("fields".into(), fields.join(",")));
        }
        if shape.ids_only {
            params.push(("ids_only".into(), "true".into()));
        }
        params
    }

    fn parse_literal(&self, key: &str, field: &str, op: Operator, raw: &str) -> QueryResult<Value> {
        let field_type = self.field_type(field)?;
        let invalid = |e: TypeError| QueryError::InvalidParam {
            key: key.to_string(),
            reason: e.to_string(),
        };
        match (op, field_type) {
            (Operator::Contains, FieldType::List) => FieldType::Any.parse_param(raw).map_err(invalid),
            (Operator::Contains, ty) => raw
                .split(',')
                .map(|part| ty.parse_param(part))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
                .map_err(invalid),
            (_, ty) => ty.parse_param(raw).map_err(invalid),
        }
    }
}

fn split_key(key: &str) -> (&str, Operator) {
    key.rsplit_once("__")
        .and_then(|(field, suffix)| Operator::from_suffix(suffix).map(|op| (field, op)))
        .unwrap_or((key, Operator::Equals))
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> QueryResult<T> {
    raw.trim().parse().map_err(|_| QueryError::InvalidParam {
        key: key.to_string(),
        reason: format!("not a number: {raw}"),
    })
}

fn parse_flag(key: &str, raw: &str) -> QueryResult<bool> {
    match raw.trim() {
        "true" | "1" | "yes" | "" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(QueryError::InvalidParam {
            key: key.to_string(),
            reason: format!("not a boolean: {raw}"),
        }),
    }
}

fn parse_order(key: &str, raw: &str) -> QueryResult<SortOrder> {
    match raw.trim() {
        "asc" | "ascending" => Ok(SortOrder::Ascending),
        "desc" | "descending" => Ok(SortOrder::Descending),
        _ => Err(QueryError::InvalidParam {
            key: key.to_string(),
            reason: format!("expected asc or desc, got {raw}"),
        }),
    }
}
