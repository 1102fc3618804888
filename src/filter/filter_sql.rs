use serde_json::{json, Value};

use super::collation::Collation;
use super::types::{FilterCondition, FilterExpr, Predicate, SqlResult};

/// Translates the parts of a filter that Postgres can evaluate exactly into
/// `jsonb_path_exists` predicates over the `body` column.
///
/// Anything without a faithful translation (regexes, string ranges, geo) is
/// left out, so the generated clause selects a superset of the matching
/// rows. Callers re-apply the full filter in process.
pub struct FilterSql<'c> {
    param_values: Vec<Value>,
    param_index: usize,
    collation: &'c Collation,
}

/// One translated predicate. `exact` is false when parts of the source were
/// dropped, which makes the clause unsafe to negate.
struct Pushdown {
    sql: String,
    exact: bool,
}

impl<'c> FilterSql<'c> {
    pub fn new(starting_param_index: usize, collation: &'c Collation) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
            collation,
        }
    }

    pub fn generate(expr: &FilterExpr, starting_param_index: usize, collation: &Collation) -> SqlResult {
        let mut filter_sql = FilterSql::new(starting_param_index, collation);
        let query = match filter_sql.build(expr) {
            Some(pushdown) => pushdown.sql,
            None => "TRUE".to_string(),
        };
        SqlResult { query, params: filter_sql.param_values }
    }

    /// Builds one expression. When nothing is pushed down, parameters bound
    /// while trying are released so numbering stays contiguous.
    fn build(&mut self, expr: &FilterExpr) -> Option<Pushdown> {
        let (bound, index) = (self.param_values.len(), self.param_index);
        let pushdown = self.build_expr(expr);
        if pushdown.is_none() {
            self.param_values.truncate(bound);
            self.param_index = index;
        }
        pushdown
    }

    fn build_expr(&mut self, expr: &FilterExpr) -> Option<Pushdown> {
        match expr {
            FilterExpr::And(parts) => {
                let mut exact = true;
                let mut sql_parts = Vec::new();
                for part in parts {
                    match self.build(part) {
                        Some(p) => {
                            exact &= p.exact;
                            sql_parts.push(p.sql);
                        }
                        None => exact = false,
                    }
                }
                if sql_parts.is_empty() {
                    return None;
                }
                Some(Pushdown { sql: wrap(&sql_parts, " AND "), exact })
            }
            FilterExpr::Or(parts) => {
                let mut exact = true;
                let mut sql_parts = Vec::new();
                for part in parts {
                    // An untranslatable branch could match any row
                    let p = self.build(part)?;
                    exact &= p.exact;
                    sql_parts.push(p.sql);
                }
                Some(Pushdown { sql: wrap(&sql_parts, " OR "), exact })
            }
            FilterExpr::Nor(parts) => {
                let mut sql_parts = Vec::new();
                for part in parts {
                    let p = self.build(part).filter(|p| p.exact)?;
                    sql_parts.push(p.sql);
                }
                Some(Pushdown { sql: format!("NOT {}", wrap(&sql_parts, " OR ")), exact: true })
            }
            FilterExpr::Condition(condition) => self.build_condition(condition).map(|sql| Pushdown { sql, exact: true }),
        }
    }

    fn build_condition(&mut self, condition: &FilterCondition) -> Option<String> {
        let path = json_path(&condition.path)?;
        match &condition.predicate {
            Predicate::Eq(v) => self.equality(&path, v),
            Predicate::In(values) => {
                let parts = values
                    .iter()
                    .map(|v| self.equality(&path, v))
                    .collect::<Option<Vec<_>>>()?;
                if parts.is_empty() {
                    return Some("FALSE".to_string());
                }
                Some(wrap(&parts, " OR "))
            }
            // Negations only for values without collation concerns
            Predicate::Ne(v) if is_untextual_scalar(v) => {
                Some(format!("NOT {}", self.path_exists(&path, Some(("==", v)))))
            }
            Predicate::NIn(values) if !values.is_empty() && values.iter().all(is_untextual_scalar) => {
                let parts: Vec<String> = values.iter().map(|v| self.path_exists(&path, Some(("==", v)))).collect();
                Some(format!("NOT {}", wrap(&parts, " OR ")))
            }
            Predicate::Gt(v) if v.is_number() => Some(self.path_exists(&path, Some((">", v)))),
            Predicate::Gte(v) if v.is_number() => Some(self.path_exists(&path, Some((">=", v)))),
            Predicate::Lt(v) if v.is_number() => Some(self.path_exists(&path, Some(("<", v)))),
            Predicate::Lte(v) if v.is_number() => Some(self.path_exists(&path, Some(("<=", v)))),
            Predicate::Exists(true) => Some(self.path_exists(&path, None)),
            Predicate::Exists(false) => Some(format!("NOT {}", self.path_exists(&path, None))),
            _ => None,
        }
    }

    fn equality(&mut self, path: &str, value: &Value) -> Option<String> {
        match value {
            Value::String(s) if self.collation.is_case_insensitive() => {
                // like_regex patterns are literals in jsonpath, not variables
                let pattern = format!("^{}$", regex::escape(s));
                let jsonpath = format!("{} ? (@ like_regex {} flag \"i\")", path, quote(&pattern));
                Some(format!("jsonb_path_exists(body, {}::jsonpath)", self.param(Value::String(jsonpath))))
            }
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Some(self.path_exists(path, Some(("==", value)))),
            _ => None,
        }
    }

    fn path_exists(&mut self, path: &str, comparison: Option<(&str, &Value)>) -> String {
        match comparison {
            None => format!("jsonb_path_exists(body, {}::jsonpath)", self.param(Value::String(path.to_string()))),
            Some((op, value)) => {
                let jsonpath = format!("{} ? (@ {} $v)", path, op);
                let path_param = self.param(Value::String(jsonpath));
                let vars_param = self.param(json!({ "v": value }));
                format!("jsonb_path_exists(body, {}::jsonpath, {}::jsonb)", path_param, vars_param)
            }
        }
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

fn wrap(parts: &[String], joiner: &str) -> String {
    format!("({})", parts.join(joiner))
}

fn is_untextual_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_))
}

/// `a.b` becomes `$."a"."b"`; lax mode unwraps arrays at each step the way
/// the in-memory matcher fans out. Numeric segments are positional.
fn json_path(path: &str) -> Option<String> {
    let mut out = String::from("$");
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        if let Ok(index) = segment.parse::<usize>() {
            out.push_str(&format!("[{}]", index));
        } else {
            out.push('.');
            out.push_str(&quote(segment));
        }
    }
    Some(out)
}

fn quote(raw: &str) -> String {
    format!("\"{}\"", raw.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_where::FilterWhere;

    fn generate(filter: Value, collation: &Collation) -> SqlResult {
        let expr = FilterWhere::parse(&filter).unwrap();
        FilterSql::generate(&expr, 1, collation)
    }

    #[test]
    fn case_insensitive_string_equality_uses_like_regex() {
        let result = generate(json!({"status": "Accepted"}), &Collation::default());
        assert_eq!(result.query, "jsonb_path_exists(body, $2::jsonpath)");
        assert_eq!(result.params, vec![json!("$.\"status\" ? (@ like_regex \"^Accepted$\" flag \"i\")")]);
    }

    #[test]
    fn binary_collation_binds_variables() {
        let result = generate(json!({"status": "Accepted"}), &Collation::simple());
        assert_eq!(result.query, "jsonb_path_exists(body, $2::jsonpath, $3::jsonb)");
        assert_eq!(result.params[0], json!("$.\"status\" ? (@ == $v)"));
        assert_eq!(result.params[1], json!({"v": "Accepted"}));
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        let result = generate(json!({"name": "a.b \"c\""}), &Collation::default());
        let path = result.params[0].as_str().unwrap();
        assert!(path.contains(r#"^a\\.b \"c\"$"#), "unexpected path: {}", path);
    }

    #[test]
    fn untranslatable_conditions_are_dropped_from_and() {
        let result = generate(
            json!({"name": {"$regex": "^sk"}, "isDeleted": {"$ne": true}}),
            &Collation::default(),
        );
        assert_eq!(result.query, "(NOT jsonb_path_exists(body, $2::jsonpath, $3::jsonb))");
    }

    #[test]
    fn or_with_untranslatable_branch_pushes_nothing() {
        let result = generate(json!({"$or": [{"a": 1}, {"b": {"$regex": "x"}}]}), &Collation::default());
        assert_eq!(result.query, "TRUE");
        assert!(result.params.is_empty());
    }

    #[test]
    fn dropped_or_releases_its_parameters() {
        let result = generate(
            json!({"$or": [{"a": 1}, {"b": {"$regex": "x"}}], "name": "x"}),
            &Collation::default(),
        );
        assert_eq!(result.query, "(jsonb_path_exists(body, $2::jsonpath))");
        assert_eq!(result.params.len(), 1);
    }

    #[test]
    fn in_with_null_pushes_nothing() {
        let result = generate(json!({"status": {"$in": ["x", null]}}), &Collation::default());
        assert_eq!(result.query, "TRUE");
        assert!(result.params.is_empty());
    }

    #[test]
    fn inexact_nor_branch_releases_its_parameters() {
        let result = generate(
            json!({"$nor": [{"a": 1, "b": {"$regex": "x"}}], "c": 2}),
            &Collation::default(),
        );
        assert_eq!(result.query, "(jsonb_path_exists(body, $2::jsonpath, $3::jsonb))");
        assert_eq!(result.params, vec![json!("$.\"c\" ? (@ == $v)"), json!({"v": 2})]);
    }

    #[test]
    fn string_negation_is_not_pushed_down() {
        let result = generate(json!({"status": {"$ne": "closed"}}), &Collation::default());
        assert_eq!(result.query, "TRUE");
    }

    #[test]
    fn numeric_ranges_and_nested_paths() {
        let result = generate(json!({"client.areaHectares": {"$gte": 5}}), &Collation::default());
        assert_eq!(result.query, "jsonb_path_exists(body, $2::jsonpath, $3::jsonb)");
        assert_eq!(result.params[0], json!("$.\"client\".\"areaHectares\" ? (@ >= $v)"));
    }

    #[test]
    fn empty_in_matches_nothing() {
        let result = generate(json!({"_id": {"$in": []}}), &Collation::default());
        assert_eq!(result.query, "FALSE");
    }
}
