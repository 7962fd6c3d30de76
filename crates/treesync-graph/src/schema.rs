//! Uniqueness constraints for the mapped node types.

use tracing::info;
use treesync_core::SyncPlan;

use crate::cypher::quote_identifier;
use crate::error::GraphResult;
use crate::writer::GraphWriter;

/// `CREATE CONSTRAINT ... IF NOT EXISTS` for one `(label, property)` pair.
pub fn constraint_statement(label: &str, property: &str) -> String {
    let name: String = format!("treesync_{}_{}", label, property)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!(
        "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
        quote_identifier(&name),
        quote_identifier(label),
        quote_identifier(property)
    )
}

/// `(label, primary key)` pairs of the node types a run writes.
pub fn constraint_keys(plan: &SyncPlan) -> Vec<(String, String)> {
    let mut keys = vec![(plan.unit.label.clone(), plan.unit.primary_key.clone())];
    let device = (plan.device.label.clone(), plan.device.primary_key.clone());
    if !keys.contains(&device) {
        keys.push(device);
    }
    keys
}

/// Create the constraints before the first batch.
///
/// Safe to run on every sync, the statements use IF NOT EXISTS.
pub async fn initialize_schema(writer: &dyn GraphWriter, plan: &SyncPlan) -> GraphResult<()> {
    let keys = constraint_keys(plan);
    for (label, property) in &keys {
        writer.ensure_constraint(label, property).await?;
    }
    info!(constraints = keys.len(), "Graph schema initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_statement() {
        assert_eq!(
            constraint_statement("Device", "deviceCode"),
            "CREATE CONSTRAINT `treesync_Device_deviceCode` IF NOT EXISTS FOR (n:`Device`) REQUIRE n.`deviceCode` IS UNIQUE"
        );
        assert!(constraint_statement("Heat Pump", "id").starts_with("CREATE CONSTRAINT `treesync_Heat_Pump_id`"));
    }

    #[test]
    fn test_constraint_keys_skip_duplicates() {
        let spec = treesync_core::mapping::parse(treesync_core::DEFAULT_MAPPING).unwrap();
        let mut plan = spec.plan().unwrap();
        assert_eq!(constraint_keys(&plan).len(), 2);

        plan.device.label = plan.unit.label.clone();
        plan.device.primary_key = plan.unit.primary_key.clone();
        assert_eq!(constraint_keys(&plan).len(), 1);
    }
}
