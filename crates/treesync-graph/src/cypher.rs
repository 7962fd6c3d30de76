//! Cypher rendering for mutation operations.
//!
//! Labels, property names and relationship types are interpolated through
//! [`quote_identifier`]; every value travels as a bound parameter.

use neo4rs::{BoltBoolean, BoltFloat, BoltInteger, BoltMap, BoltNull, BoltString, BoltType, Query};
use treesync_core::{MutationOp, PropertyValue};

/// Backtick-quote an identifier, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Cypher text of an operation. Parameters: `$pk` and `$props` for nodes,
/// `$from_pk` and `$to_pk` for edges.
pub fn render(op: &MutationOp) -> String {
    match op {
        MutationOp::MergeNode {
            label,
            extra_labels,
            pk_property,
            ..
        } => {
            let mut text = format!(
                "MERGE (n:{} {{{}: $pk}}) SET n += $props",
                quote_identifier(label),
                quote_identifier(pk_property)
            );
            for extra in extra_labels {
                text.push_str(" SET n:");
                text.push_str(&quote_identifier(extra));
            }
            text
        }
        MutationOp::MergeEdge {
            from_label,
            from_pk_property,
            to_label,
            to_pk_property,
            rel_type,
            ..
        } => format!(
            "MERGE (a:{} {{{}: $from_pk}}) MERGE (b:{} {{{}: $to_pk}}) MERGE (a)-[:{}]->(b)",
            quote_identifier(from_label),
            quote_identifier(from_pk_property),
            quote_identifier(to_label),
            quote_identifier(to_pk_property),
            quote_identifier(rel_type)
        ),
    }
}

/// Bolt form of a normalized property value.
pub fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Null => BoltType::Null(BoltNull),
        PropertyValue::Bool(b) => BoltType::Boolean(BoltBoolean::new(*b)),
        PropertyValue::Integer(i) => BoltType::Integer(BoltInteger::new(*i)),
        PropertyValue::Float(f) => BoltType::Float(BoltFloat::new(*f)),
        PropertyValue::String(s) => BoltType::String(BoltString::new(s)),
    }
}

/// Parameterized query for an operation.
pub fn to_query(op: &MutationOp) -> Query {
    let query = Query::new(render(op));
    match op {
        MutationOp::MergeNode {
            pk_value,
            properties,
            ..
        } => {
            let mut props = BoltMap::new();
            for (name, value) in properties {
                props.put(BoltString::new(name), to_bolt(value));
            }
            query
                .param("pk", pk_value.as_str())
                .param("props", BoltType::Map(props))
        }
        MutationOp::MergeEdge {
            from_pk_value,
            to_pk_value,
            ..
        } => query
            .param("from_pk", from_pk_value.as_str())
            .param("to_pk", to_pk_value.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_statement_quotes_every_identifier() {
        let op = MutationOp::MergeNode {
            label: "Device".into(),
            extra_labels: vec!["Heat Pump".into()],
            pk_property: "deviceCode".into(),
            pk_value: "D1".into(),
            properties: vec![("name".into(), PropertyValue::String("x".into()))],
        };
        assert_eq!(
            render(&op),
            "MERGE (n:`Device` {`deviceCode`: $pk}) SET n += $props SET n:`Heat Pump`"
        );
    }

    #[test]
    fn test_edge_statement_merges_endpoints() {
        let op = MutationOp::MergeEdge {
            from_label: "Device".into(),
            from_pk_property: "deviceCode".into(),
            from_pk_value: "D1".into(),
            to_label: "Device".into(),
            to_pk_property: "deviceCode".into(),
            to_pk_value: "D1a".into(),
            rel_type: "CHILD".into(),
        };
        assert_eq!(
            render(&op),
            "MERGE (a:`Device` {`deviceCode`: $from_pk}) MERGE (b:`Device` {`deviceCode`: $to_pk}) MERGE (a)-[:`CHILD`]->(b)"
        );
    }

    #[test]
    fn test_quote_identifier_escapes_backticks() {
        assert_eq!(quote_identifier("a`b"), "`a``b`");
        assert_eq!(quote_identifier("Unit"), "`Unit`");
    }

    #[test]
    fn test_to_bolt_keeps_types() {
        assert!(matches!(to_bolt(&PropertyValue::Null), BoltType::Null(_)));
        assert!(matches!(to_bolt(&PropertyValue::Integer(4)), BoltType::Integer(_)));
        assert!(matches!(to_bolt(&PropertyValue::Float(1.5)), BoltType::Float(_)));
        assert!(matches!(to_bolt(&PropertyValue::Bool(true)), BoltType::Boolean(_)));
        assert!(matches!(
            to_bolt(&PropertyValue::String("s".into())),
            BoltType::String(_)
        ));
    }
}
