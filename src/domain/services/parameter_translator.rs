//! Parameter Translator
//!
//! Rewrites SQL written with `:name` placeholders into `$1..$n`
//! positional markers and lines the bound values up with them.
//! Pure: no I/O, no shared state.

use crate::domain::errors::RouterError;
use crate::domain::value_objects::{ParamSet, Params, Value};
use std::fmt::Write;

/// Values lined up with the positional markers of a [`NamedQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum PositionalParams {
    /// One value per marker
    Single(Vec<Value>),
    /// One value list per batch row
    Batch(Vec<Vec<Value>>),
}

impl PositionalParams {
    pub fn as_single(&self) -> Option<&[Value]> {
        match self {
            Self::Single(values) => Some(values),
            Self::Batch(_) => None,
        }
    }

    pub fn as_batch(&self) -> Option<&[Vec<Value>]> {
        match self {
            Self::Single(_) => None,
            Self::Batch(rows) => Some(rows),
        }
    }
}

/// A query translated from named to positional placeholders.
///
/// Every occurrence of `:name` takes its own marker, so a name used twice
/// binds the same value at two positions:
///
/// ```
/// use query_router::domain::services::NamedQuery;
/// use query_router::domain::value_objects::{params, Value};
///
/// let q = NamedQuery::new(
///     "SELECT * FROM t WHERE a = :x OR b = :x",
///     params([("x", 7)]),
/// ).unwrap();
///
/// assert_eq!(q.positional_query(), "SELECT * FROM t WHERE a = $1 OR b = $2");
/// assert_eq!(q.positional_params().as_single(), Some(&[Value::Int(7), Value::Int(7)][..]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NamedQuery {
    query: String,
    positional_query: String,
    param_names: Vec<String>,
    positional_params: PositionalParams,
}

impl NamedQuery {
    /// Translate `query` and resolve `params` against its placeholders.
    pub fn new(query: impl Into<String>, params: impl Into<ParamSet>) -> Result<Self, RouterError> {
        let query = query.into();
        let (positional_query, param_names) = rewrite_placeholders(&query);

        let positional_params = match params.into() {
            ParamSet::Single(map) => PositionalParams::Single(resolve(&param_names, &map)?),
            ParamSet::Batch(maps) => PositionalParams::Batch(
                maps.iter()
                    .map(|map| resolve(&param_names, map))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };

        Ok(Self {
            query,
            positional_query,
            param_names,
            positional_params,
        })
    }

    /// Translate with parameters coming from untyped JSON.
    ///
    /// Fails with `InvalidParameterShape` unless `params` is an object or
    /// an array of objects.
    pub fn from_json(query: impl Into<String>, params: serde_json::Value) -> Result<Self, RouterError> {
        Self::new(query, ParamSet::try_from(params)?)
    }

    /// The query as written by the caller.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn positional_query(&self) -> &str {
        &self.positional_query
    }

    pub fn positional_params(&self) -> &PositionalParams {
        &self.positional_params
    }

    /// Placeholder names in occurrence order, repeats included.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }
}

/// Replace each `:word` token with `$k` and collect the names.
fn rewrite_placeholders(query: &str) -> (String, Vec<String>) {
    let mut rewritten = String::with_capacity(query.len());
    let mut names = Vec::new();
    let mut chars = query.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c == ':' {
            let start = pos + c.len_utf8();
            let mut end = start;
            while let Some(&(next_pos, next)) = chars.peek() {
                if !is_word_char(next) {
                    break;
                }
                end = next_pos + next.len_utf8();
                chars.next();
            }

            if end > start {
                names.push(query[start..end].to_string());
                let _ = write!(rewritten, "${}", names.len());
                continue;
            }
        }
        rewritten.push(c);
    }

    (rewritten, names)
}

fn is_word_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn resolve(names: &[String], params: &Params) -> Result<Vec<Value>, RouterError> {
    names
        .iter()
        .map(|name| {
            params
                .get(name)
                .cloned()
                .ok_or_else(|| RouterError::MissingParameter(name.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::params;
    use serde_json::json;

    fn single(q: &NamedQuery) -> Vec<Value> {
        q.positional_params().as_single().unwrap().to_vec()
    }

    #[test]
    fn test_simple_query() {
        let q = NamedQuery::new(
            "SELECT * FROM fruits WHERE name = :name;",
            params([("name", "apple")]),
        )
        .unwrap();

        assert_eq!(q.positional_query(), "SELECT * FROM fruits WHERE name = $1;");
        assert_eq!(single(&q), vec![Value::from("apple")]);
    }

    #[test]
    fn test_multiple_named_params() {
        let q = NamedQuery::new(
            "SELECT * FROM fruits WHERE name = :name AND id = :id;",
            params([("name", Value::from("apple")), ("id", Value::from(1))]),
        )
        .unwrap();

        assert_eq!(q.positional_query(), "SELECT * FROM fruits WHERE name = $1 AND id = $2;");
        assert_eq!(single(&q), vec![Value::from("apple"), Value::Int(1)]);
    }

    #[test]
    fn test_identifier_styles() {
        let tests = vec![
            ("first_name", "SELECT * FROM fruits WHERE first_name = :first_name AND id = :id;"),
            ("firstName", "SELECT * FROM fruits WHERE firstName = :firstName AND id = :id;"),
            ("name1", "SELECT * FROM fruits WHERE name = :name1 AND id = :id;"),
        ];

        for (name, sql) in tests {
            let q = NamedQuery::new(sql, params([(name, Value::from("apple")), ("id", Value::from(1))]))
                .unwrap();
            assert!(q.positional_query().ends_with("= $1 AND id = $2;"), "Failed for: {}", name);
            assert_eq!(q.param_names(), &[name.to_string(), "id".to_string()]);
            assert_eq!(single(&q), vec![Value::from("apple"), Value::Int(1)]);
        }
    }

    #[test]
    fn test_numeric_param_names() {
        let q = NamedQuery::new(
            "SELECT * FROM fruits WHERE name = :1 AND id = :2;",
            params([("1", Value::from("apple")), ("2", Value::from(1))]),
        )
        .unwrap();

        assert_eq!(q.positional_query(), "SELECT * FROM fruits WHERE name = $1 AND id = $2;");
        assert_eq!(single(&q), vec![Value::from("apple"), Value::Int(1)]);
    }

    #[test]
    fn test_repeated_name_takes_new_slot() {
        let q = NamedQuery::new(
            "SELECT * FROM t WHERE a = :v AND b = :w AND c = :v",
            params([("v", 1), ("w", 2)]),
        )
        .unwrap();

        assert_eq!(q.positional_query(), "SELECT * FROM t WHERE a = $1 AND b = $2 AND c = $3");
        assert_eq!(single(&q), vec![Value::Int(1), Value::Int(2), Value::Int(1)]);
    }

    #[test]
    fn test_no_placeholders_leaves_query_untouched() {
        let sql = "SELECT 1 AS id;";
        let q = NamedQuery::new(sql, Params::new()).unwrap();

        assert_eq!(q.positional_query(), sql);
        assert_eq!(q.query(), sql);
        assert!(single(&q).is_empty());
    }

    #[test]
    fn test_unused_params_are_ignored() {
        let q = NamedQuery::new("SELECT :a", params([("a", 1), ("b", 2)])).unwrap();
        assert_eq!(single(&q), vec![Value::Int(1)]);
    }

    #[test]
    fn test_lone_colon_is_not_a_placeholder() {
        let q = NamedQuery::new("SELECT ':' || :x, ': '", params([("x", 1)])).unwrap();
        assert_eq!(q.positional_query(), "SELECT ':' || $1, ': '");
    }

    #[test]
    fn test_double_colon_matches_trailing_word() {
        let q = NamedQuery::new("SELECT x::text", params([("text", "t")])).unwrap();
        assert_eq!(q.positional_query(), "SELECT x:$1");
    }

    #[test]
    fn test_unicode_name() {
        let q = NamedQuery::new("SELECT :naïve, :b", params([("naïve", 1), ("b", 2)])).unwrap();
        assert_eq!(q.positional_query(), "SELECT $1, $2");
        assert_eq!(q.param_names()[0], "naïve");
    }

    #[test]
    fn test_missing_param() {
        let err = NamedQuery::new(
            "SELECT * FROM fruits WHERE name = :name AND id = :id;",
            params([("name", "apple")]),
        )
        .unwrap_err();

        assert!(matches!(err, RouterError::MissingParameter(ref n) if n == "id"));
        assert!(err.to_string().contains("Missing parameter: id"));
    }

    #[test]
    fn test_invalid_param_type() {
        let err = NamedQuery::from_json(
            "SELECT * FROM fruits WHERE name = :name AND id = :id;",
            json!("apple"),
        )
        .unwrap_err();

        assert!(err
            .to_string()
            .contains("params must be a map or a list of maps, not string"));
    }

    #[test]
    fn test_list_of_maps() {
        let q = NamedQuery::new(
            "INSERT INTO fruits (id, name) (:id, :name);",
            vec![
                params([("id", Value::from(1)), ("name", Value::from("apple"))]),
                params([("id", Value::from(2)), ("name", Value::from("banana"))]),
            ],
        )
        .unwrap();

        assert_eq!(q.positional_query(), "INSERT INTO fruits (id, name) ($1, $2);");
        assert_eq!(
            q.positional_params(),
            &PositionalParams::Batch(vec![
                vec![Value::Int(1), Value::from("apple")],
                vec![Value::Int(2), Value::from("banana")],
            ])
        );
        assert!(q.positional_params().as_single().is_none());
    }

    #[test]
    fn test_batch_validates_every_row() {
        let err = NamedQuery::new(
            "INSERT INTO fruits (id, name) VALUES (:id, :name)",
            vec![
                params([("id", Value::from(1)), ("name", Value::from("apple"))]),
                params([("id", Value::from(2))]),
            ],
        )
        .unwrap_err();

        assert!(matches!(err, RouterError::MissingParameter(ref n) if n == "name"));
    }

    #[test]
    fn test_empty_batch() {
        let q = NamedQuery::new("INSERT INTO t VALUES (:a)", Vec::<Params>::new()).unwrap();
        assert_eq!(q.positional_params().as_batch(), Some(&[][..]));
    }

    #[test]
    fn test_from_json_batch() {
        let q = NamedQuery::from_json(
            "INSERT INTO t VALUES (:a)",
            json!([{"a": 1}, {"a": "two"}]),
        )
        .unwrap();

        assert_eq!(
            q.positional_params().as_batch().unwrap(),
            &[vec![Value::Int(1)], vec![Value::from("two")]]
        );
    }
}
