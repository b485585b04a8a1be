use crate::api::Entity;

/// Renders the TypeScript type listing for an entity snapshot: an
/// `EntityId` string union (one variant per entity, with the friendly name
/// as a JSDoc comment) plus the `HAEntity` interface the dashboard
/// components consume.
pub fn render_entity_types(entities: &[Entity]) -> String {
    let variants: Vec<String> = entities
        .iter()
        .map(|entity| {
            let friendly = entity
                .attributes
                .friendly_name
                .as_deref()
                .unwrap_or(&entity.entity_id);
            format!(
                "  /**\n   * {}\n   */\n  | \"{}\"",
                friendly, entity.entity_id
            )
        })
        .collect();

    format!(
        "// AUTO-GENERATED FILE - DO NOT EDIT\n\
         export type EntityId =\n\
         {};\n\
         \n\
         export interface HAEntity {{\n\
         \x20 entity_id: EntityId;\n\
         \x20 friendly_name?: string;\n\
         }}\n",
        variants.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EntityAttributes;

    fn entity(id: &str, friendly: Option<&str>) -> Entity {
        Entity {
            entity_id: id.to_string(),
            attributes: EntityAttributes {
                friendly_name: friendly.map(|s| s.to_string()),
            },
        }
    }

    #[test]
    fn renders_union_with_friendly_name_comments() {
        let rendered = render_entity_types(&[
            entity("light.kitchen", Some("Kitchen Light")),
            entity("switch.garage", Some("Garage Door")),
        ]);

        assert!(rendered.starts_with("// AUTO-GENERATED FILE - DO NOT EDIT\n"));
        assert!(rendered.contains("export type EntityId ="));
        assert!(rendered.contains("   * Kitchen Light\n"));
        assert!(rendered.contains("  | \"light.kitchen\""));
        assert!(rendered.contains("  | \"switch.garage\";"));
        assert!(rendered.contains("export interface HAEntity {"));
        assert!(rendered.contains("entity_id: EntityId;"));
    }

    #[test]
    fn falls_back_to_entity_id_when_no_friendly_name() {
        let rendered = render_entity_types(&[entity("sensor.bare", None)]);
        assert!(rendered.contains("   * sensor.bare\n"));
        assert!(rendered.contains("  | \"sensor.bare\";"));
    }
}
