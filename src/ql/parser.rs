//! Compiler for the siftql query language
//!
//! Turns `SELECT <fields> FROM <resource> [...]` text into a Query.
//! Compilation is all-or-nothing: any malformed clause fails the whole
//! compile, no partial query is ever returned.
//!
//! The trailing clause body is flattened before tokenization: every
//! parenthesized group, nested ones included, is cut out and replaced by a
//! positional `$i` placeholder, innermost groups first, so outer groups keep
//! referencing their children by index. The WHERE resolver later recurses
//! through the placeholders.

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::core::config;
use crate::core::errors::{QueryError, Result};
use crate::core::value::Value;
use crate::ql::ast::{Join, JoinType, Query};
use crate::ql::evaluator::{EvaluatorCollection, EvaluatorNode, FieldEvaluator, Operator};

lazy_static! {
    static ref QUERY_PATTERN: Regex =
        Regex::new(r"(?is)^\s*select\s+(?P<select>.+?)\s+from\s+(?P<resource>\S+)(?P<body>.*)$")
            .expect("top-level query pattern");
    static ref KEYWORD_PATTERN: Regex = Regex::new(
        r"(?i)\b(inner\s+join|left\s+join|right\s+join|join|where|order\s+by|group\s+by|desc|limit)\b"
    )
    .expect("clause keyword pattern");
    static ref JOIN_PATTERN: Regex =
        Regex::new(r"(?is)^\s*(?P<resource>\S+)\s+on\s+(?P<left>[^=\s]+)\s*=\s*(?P<right>[^=\s]+)\s*$")
            .expect("join clause pattern");
    static ref CONNECTOR_PATTERN: Regex =
        Regex::new(r"(?i)\b(and|or)\b").expect("connector pattern");
    static ref PLACEHOLDER_PATTERN: Regex =
        Regex::new(r"^\$(\d+)$").expect("placeholder pattern");
}

/// AND/OR connector between WHERE segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    And,
    Or,
}

/// Compile query text into a Query
pub fn compile(text: &str) -> Result<Query> {
    let caps = QUERY_PATTERN.captures(text).ok_or_else(|| {
        QueryError::Compile(format!(
            "expected 'SELECT <fields> FROM <resource> [...]', got '{}'",
            text.trim()
        ))
    })?;

    let return_fields = parse_return_fields(&caps["select"])?;
    let resource = caps["resource"].trim().to_string();
    let body = &caps["body"];

    let mut groups = extract_groups(body)?;
    // the last entry is the fully flattened body
    let flat = groups.pop().unwrap_or_default();

    let mut evaluators = EvaluatorCollection::new();
    let mut joins = Vec::new();
    let mut order_fields = Vec::new();
    let mut desc = false;
    let mut limit = None;

    for (keyword, argument) in tokenize(&flat)? {
        match keyword.as_str() {
            "join" => joins.push(parse_join(&argument, JoinType::Join)?),
            "inner join" => joins.push(parse_join(&argument, JoinType::Inner)?),
            "left join" => joins.push(parse_join(&argument, JoinType::Left)?),
            "right join" => joins.push(parse_join(&argument, JoinType::Right)?),
            "where" => parse_where(&argument, &groups, &mut evaluators)?,
            "order by" => order_fields = parse_field_list(&argument)?,
            "group by" => warn!("GROUP BY clause ignored: {}", argument.trim()),
            "desc" => {
                if !argument.trim().is_empty() {
                    return Err(QueryError::Compile(format!(
                        "unexpected text after DESC: '{}'",
                        argument.trim()
                    )));
                }
                desc = true;
            }
            "limit" => {
                let parsed = argument.trim().parse::<usize>().map_err(|_| {
                    QueryError::Compile(format!("invalid LIMIT value '{}'", argument.trim()))
                })?;
                limit = Some(parsed);
            }
            other => {
                return Err(QueryError::Compile(format!("unknown keyword '{}'", other)));
            }
        }
    }

    let query = Query::from_parts(
        resource,
        limit.unwrap_or(config::CONFIG.default_limit),
        None,
        desc,
        order_fields,
        return_fields,
        joins,
        evaluators,
    );
    debug!("compiled query {}: {}", query.id(), query);
    Ok(query)
}

fn parse_return_fields(select: &str) -> Result<Vec<String>> {
    let fields = parse_field_list(select)?;
    if fields.len() == 1 && fields[0] == "*" {
        Ok(Vec::new())
    } else {
        Ok(fields)
    }
}

fn parse_field_list(text: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    for piece in text.split(',') {
        let field = piece.trim();
        if field.is_empty() {
            return Err(QueryError::Compile(format!(
                "empty field in list '{}'",
                text.trim()
            )));
        }
        fields.push(field.to_string());
    }
    Ok(fields)
}

/// Extract every parenthesized group, innermost first.
///
/// The first `)` always closes the innermost open group, so it pairs with
/// the nearest preceding `(`. Each extracted group is replaced in-place by
/// `$i`; the returned list's final entry is the flattened remainder.
fn extract_groups(body: &str) -> Result<Vec<String>> {
    let mut text = body.to_string();
    let mut groups = Vec::new();
    while let Some(close) = text.find(')') {
        let open = text[..close]
            .rfind('(')
            .ok_or_else(|| QueryError::Compile("unbalanced parentheses".to_string()))?;
        let inner = text[open + 1..close].trim().to_string();
        text.replace_range(open..=close, &format!("${}", groups.len()));
        groups.push(inner);
    }
    if text.contains('(') {
        return Err(QueryError::Compile("unbalanced parentheses".to_string()));
    }
    groups.push(text);
    Ok(groups)
}

/// Split the flattened body into (keyword, argument) pairs in encounter
/// order; each keyword owns the text up to the next keyword.
fn tokenize(flat: &str) -> Result<Vec<(String, String)>> {
    let matches: Vec<_> = KEYWORD_PATTERN.find_iter(flat).collect();
    let leading = match matches.first() {
        Some(first) => &flat[..first.start()],
        None => flat,
    };
    if !leading.trim().is_empty() {
        return Err(QueryError::Compile(format!(
            "unexpected text before first clause: '{}'",
            leading.trim()
        )));
    }

    let mut clauses = Vec::with_capacity(matches.len());
    for (i, m) in matches.iter().enumerate() {
        let keyword = m
            .as_str()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let end = matches.get(i + 1).map(|n| n.start()).unwrap_or(flat.len());
        clauses.push((keyword, flat[m.end()..end].to_string()));
    }
    Ok(clauses)
}

fn parse_join(argument: &str, kind: JoinType) -> Result<Join> {
    let caps = JOIN_PATTERN.captures(argument).ok_or_else(|| {
        QueryError::Compile(format!(
            "expected '<resource> ON <leftField> = <rightField>', got '{}'",
            argument.trim()
        ))
    })?;
    Ok(Join::new(
        caps["resource"].to_string(),
        unqualify(&caps["left"]),
        unqualify(&caps["right"]),
        kind,
    ))
}

/// Rows are flat named maps, so `a.id` refers to field `id`
fn unqualify(field: &str) -> String {
    field
        .rsplit('.')
        .next()
        .unwrap_or(field)
        .to_string()
}

fn parse_where(
    argument: &str,
    groups: &[String],
    root: &mut EvaluatorCollection,
) -> Result<()> {
    if argument.trim().is_empty() {
        // nothing to filter on; every row matches
        return Ok(());
    }
    let (segments, connectors) = split_connectors(argument)?;
    match connectors.first() {
        Some(Connector::Or) => {
            // the whole clause is a disjunction under the implicit And root
            let mut nested = EvaluatorCollection::new();
            fill_collection(&segments, &connectors, Connector::Or, &mut nested, groups)?;
            root.add(EvaluatorNode::Or(nested));
        }
        _ => fill_collection(&segments, &connectors, Connector::And, root, groups)?,
    }
    Ok(())
}

/// Split a clause on AND/OR tokens. A missing segment around a connector is
/// a dangling AND/OR, which is a compile error.
fn split_connectors(text: &str) -> Result<(Vec<String>, Vec<Connector>)> {
    let mut segments = Vec::new();
    let mut connectors = Vec::new();
    let mut cursor = 0;
    for m in CONNECTOR_PATTERN.find_iter(text) {
        segments.push(text[cursor..m.start()].trim().to_string());
        connectors.push(if m.as_str().eq_ignore_ascii_case("and") {
            Connector::And
        } else {
            Connector::Or
        });
        cursor = m.end();
    }
    segments.push(text[cursor..].trim().to_string());
    if segments.iter().any(|s| s.is_empty()) {
        return Err(QueryError::Compile(format!(
            "dangling AND/OR in '{}'",
            text.trim()
        )));
    }
    Ok((segments, connectors))
}

/// Add segments to `collection` while the pending connector matches `kind`;
/// the first connector of the other kind opens one nested collection under
/// the currently open one, which absorbs the remaining segments.
fn fill_collection(
    segments: &[String],
    connectors: &[Connector],
    kind: Connector,
    collection: &mut EvaluatorCollection,
    groups: &[String],
) -> Result<()> {
    for (i, segment) in segments.iter().enumerate() {
        collection.add(parse_segment(segment, groups)?);
        if i == segments.len() - 1 {
            break;
        }
        if connectors[i] != kind {
            let other = connectors[i];
            let mut nested = EvaluatorCollection::new();
            fill_collection(
                &segments[i + 1..],
                &connectors[i + 1..],
                other,
                &mut nested,
                groups,
            )?;
            collection.add(match other {
                Connector::And => EvaluatorNode::And(nested),
                Connector::Or => EvaluatorNode::Or(nested),
            });
            break;
        }
    }
    Ok(())
}

/// One WHERE segment: a lone placeholder recurses into its group as a nested
/// collection, anything else must be `<field> <op> <literal>` (four tokens
/// only for NOT IN).
fn parse_segment(segment: &str, groups: &[String]) -> Result<EvaluatorNode> {
    if let Some(caps) = PLACEHOLDER_PATTERN.captures(segment) {
        let group = resolve_group(&caps[1], groups)?;
        return parse_group(group, groups);
    }

    let tokens: Vec<&str> = segment.split_whitespace().collect();
    match tokens.as_slice() {
        [field, op, literal] => {
            let operator = Operator::from_symbol(op).ok_or_else(|| {
                QueryError::Compile(format!("unknown operator '{}' in '{}'", op, segment))
            })?;
            let value = parse_literal(literal, groups)?;
            Ok(EvaluatorNode::Leaf(FieldEvaluator::new(
                *field, operator, value,
            )))
        }
        [field, not, in_kw, literal]
            if not.eq_ignore_ascii_case("not") && in_kw.eq_ignore_ascii_case("in") =>
        {
            let value = parse_literal(literal, groups)?;
            Ok(EvaluatorNode::Leaf(FieldEvaluator::new(
                *field,
                Operator::NotIn,
                value,
            )))
        }
        _ => Err(QueryError::Compile(format!(
            "expected '<field> <operator> <literal>', got '{}'",
            segment
        ))),
    }
}

/// A parenthesized group used as a boolean clause. Its collection kind is
/// the group's first connector, And when it holds a single segment.
fn parse_group(text: &str, groups: &[String]) -> Result<EvaluatorNode> {
    if text.trim().is_empty() {
        return Err(QueryError::Compile("empty parenthesized group".to_string()));
    }
    let (segments, connectors) = split_connectors(text)?;
    let kind = connectors.first().copied().unwrap_or(Connector::And);
    let mut collection = EvaluatorCollection::new();
    fill_collection(&segments, &connectors, kind, &mut collection, groups)?;
    Ok(match kind {
        Connector::And => EvaluatorNode::And(collection),
        Connector::Or => EvaluatorNode::Or(collection),
    })
}

fn resolve_group<'a>(index: &str, groups: &'a [String]) -> Result<&'a str> {
    let idx = index
        .parse::<usize>()
        .map_err(|_| QueryError::Compile(format!("invalid group reference '${}'", index)))?;
    groups
        .get(idx)
        .map(|g| g.as_str())
        .ok_or_else(|| QueryError::Compile(format!("unresolved group reference '${}'", index)))
}

/// Parse a literal token. A placeholder in literal position is an IN list:
/// the referenced group text comma-splits into an Array.
fn parse_literal(token: &str, groups: &[String]) -> Result<Value> {
    if let Some(caps) = PLACEHOLDER_PATTERN.captures(token) {
        let group = resolve_group(&caps[1], groups)?;
        if group.trim().is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        let items = group
            .split(',')
            .map(|piece| parse_literal(piece.trim(), groups))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Value::Array(items));
    }

    let quoted = (token.starts_with('\'') && token.ends_with('\'') && token.len() >= 2)
        || (token.starts_with('"') && token.ends_with('"') && token.len() >= 2);
    if quoted {
        return Ok(Value::String(token[1..token.len() - 1].to_string()));
    }
    if token.eq_ignore_ascii_case("true") {
        return Ok(Value::Boolean(true));
    }
    if token.eq_ignore_ascii_case("false") {
        return Ok(Value::Boolean(false));
    }
    if token.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }
    if let Ok(i) = token.parse::<i64>() {
        return Ok(Value::Integer(i));
    }
    if let Ok(f) = token.parse::<f64>() {
        return Ok(Value::Float(f));
    }
    Ok(Value::String(token.to_string()))
}
