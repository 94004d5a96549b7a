//! Mirror display formatting
//!
//! Formats the application / model / field mirrors as an indented tree.

use crate::models::{ApplicationId, MirrorSet};

/// Heading for models whose application could not be determined
const UNATTRIBUTED: &str = "(no application)";

/// Format all mirrors, grouped by application and model
pub fn format_mirror_tree(mirrors: &MirrorSet) -> String {
    if mirrors.is_empty() {
        return "No mirrors recorded.\n".to_string();
    }

    let mut applications: Vec<_> = mirrors.applications.iter().collect();
    applications.sort_by(|a, b| a.name.cmp(&b.name));

    let mut output = String::new();
    for application in applications {
        output.push_str(&format!("{}\n", application.name));
        push_models(&mut output, mirrors, Some(application.id));
    }

    if mirrors.models.iter().any(|m| m.application.is_none()) {
        output.push_str(&format!("{}\n", UNATTRIBUTED));
        push_models(&mut output, mirrors, None);
    }

    output.push_str(&format!(
        "\n{} applications, {} models, {} fields\n",
        mirrors.applications.len(),
        mirrors.models.len(),
        mirrors.fields.len()
    ));

    output
}

fn push_models(output: &mut String, mirrors: &MirrorSet, application: Option<ApplicationId>) {
    let mut models: Vec<_> = mirrors
        .models
        .iter()
        .filter(|m| m.application == application)
        .collect();
    models.sort_by(|a, b| a.name.cmp(&b.name));

    for model in models {
        output.push_str(&format!("  {}\n", model.name));

        let mut fields: Vec<_> = mirrors
            .fields
            .iter()
            .filter(|f| f.model == model.id)
            .collect();
        fields.sort_by(|a, b| a.name.cmp(&b.name));

        let name_width = fields.iter().map(|f| f.name.len()).max().unwrap_or(0);
        for field in fields {
            output.push_str(&format!(
                "    {:<name_width$}  {}\n",
                field.name,
                field.type_repr,
                name_width = name_width
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MirrorRegistry;

    #[test]
    fn test_empty_tree() {
        assert!(format_mirror_tree(&MirrorSet::default()).contains("No mirrors"));
    }

    #[test]
    fn test_tree_grouping() {
        let registry = MirrorRegistry::new();
        let order = registry.model(Some("shop"), "Order").unwrap();
        registry.field(order, "status", "CharField").unwrap();
        registry.field(order, "tags", "relationship<Tag>").unwrap();
        registry.model(Some("billing"), "Invoice").unwrap();

        let formatted = format_mirror_tree(&registry.snapshot().unwrap());
        let billing = formatted.find("billing").unwrap();
        let shop = formatted.find("shop").unwrap();
        assert!(billing < shop);
        assert!(formatted.contains("    status  CharField"));
        assert!(formatted.contains("relationship<Tag>"));
        assert!(formatted.contains("2 applications, 2 models, 2 fields"));
    }

    #[test]
    fn test_unattributed_models_listed_last() {
        let registry = MirrorRegistry::new();
        registry.model(Some("shop"), "Order").unwrap();
        registry.model(None, "Orphan").unwrap();

        let formatted = format_mirror_tree(&registry.snapshot().unwrap());
        let heading = formatted.find("(no application)").unwrap();
        assert!(formatted.find("Order").unwrap() < heading);
        assert!(formatted.find("Orphan").unwrap() > heading);
        assert!(formatted.contains("1 applications, 2 models, 0 fields"));
    }
}
