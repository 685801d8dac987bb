const NPC_PROPERTY_INTERACTION_TYPE: &str = "interactionType";
const NPC_PROPERTY_DIALOGUE: &str = "dialogue";
const NPC_PROPERTY_SPRITE_KEY: &str = "spriteKey";
const NPC_PROPERTY_TEACHES: &str = "teaches";
const NPC_PROPERTY_FACING: &str = "facing";
const NPC_PROPERTY_ALLOW_LIST: [&str; 5] = [
    NPC_PROPERTY_INTERACTION_TYPE,
    NPC_PROPERTY_DIALOGUE,
    NPC_PROPERTY_SPRITE_KEY,
    NPC_PROPERTY_TEACHES,
    NPC_PROPERTY_FACING,
];

fn npc_profile_from_descriptor(descriptor: &ObjectDescriptor, catalog: &SpriteCatalog) -> NpcProfile {
    let text_property = |key: &str| {
        descriptor
            .property(key)
            .map(ToString::to_string)
            .filter(|value| !value.trim().is_empty())
    };

    let kind = InteractionKind::resolve(
        descriptor.string_property(NPC_PROPERTY_INTERACTION_TYPE),
        text_property(NPC_PROPERTY_DIALOGUE),
        text_property(NPC_PROPERTY_TEACHES),
    );
    let sprite_key = catalog.resolve_or_default(
        [
            descriptor.string_property(NPC_PROPERTY_SPRITE_KEY),
            Some(descriptor.name.as_str()),
        ],
        DEFAULT_NPC_SPRITE_KEY,
    );
    let initial_facing = descriptor
        .string_property(NPC_PROPERTY_FACING)
        .and_then(Facing::parse)
        .unwrap_or_default();
    let custom_properties = descriptor
        .properties
        .iter()
        .filter(|(key, _)| {
            key.as_str() != NPC_TYPE_PROPERTY && !NPC_PROPERTY_ALLOW_LIST.contains(&key.as_str())
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    NpcProfile {
        npc_name: descriptor.name.clone(),
        kind,
        sprite_key,
        initial_facing,
        custom_properties,
    }
}

fn sprite_footprint(scale: f32) -> Footprint {
    Footprint {
        width: SPRITE_FRAME_WIDTH_PX * scale,
        height: SPRITE_FRAME_HEIGHT_PX * scale,
    }
}

/// Spawns every well-formed NPC of the map and applies their initial facing.
/// Pending spawns are flushed so the records point at live entities.
fn spawn_npcs(world: &mut SceneWorld, map: &WorldMap, catalog: &SpriteCatalog) -> Vec<NpcRecord> {
    let scale = NPC_SCALE_PER_FIT * map.fit().scale_factor;
    let mut records = Vec::new();
    for descriptor in map.npc_descriptors() {
        let profile = npc_profile_from_descriptor(&descriptor, catalog);
        let entity_id = world.spawn(
            Transform {
                position: map.spawn_position(&descriptor),
            },
            sprite_footprint(scale),
            RenderableDesc {
                kind: RenderableKind::SpriteSheet(profile.sprite_key.clone()),
                scale,
                depth: 0,
                debug_name: profile.npc_name.clone(),
            },
        );
        if !profile.custom_properties.is_empty() {
            debug!(
                npc = %profile.npc_name,
                keys = ?profile.custom_properties.keys().collect::<Vec<_>>(),
                "npc_custom_properties_kept"
            );
        }
        records.push(NpcRecord { entity_id, profile });
    }

    world.apply_pending();
    for record in &records {
        if let Some(entity) = world.find_entity_mut(record.entity_id) {
            entity.facing = record.profile.initial_facing;
        }
    }
    records
}

fn spawn_player(world: &mut SceneWorld, map: &WorldMap) -> EntityId {
    let player_id = world.spawn(
        Transform {
            position: map.player_spawn(),
        },
        sprite_footprint(PLAYER_SCALE),
        RenderableDesc {
            kind: RenderableKind::SpriteSheet(PLAYER_SPRITE_KEY.to_string()),
            scale: PLAYER_SCALE,
            depth: 0,
            debug_name: "player".to_string(),
        },
    );
    world.apply_pending();
    player_id
}
