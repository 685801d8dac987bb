/// Applies the tick's intent to the player's velocity, facing and animation.
/// Position is left to `integrate_player_position`.
fn movement_system(
    world: &mut SceneWorld,
    state: &WorldState,
    intent: DirectionalIntent,
    fixed_dt_seconds: f32,
) {
    let Some(player_id) = state.player_id else {
        return;
    };
    let Some(player) = world.find_entity_mut(player_id) else {
        return;
    };

    if !state.gate.is_enabled() || intent.is_idle() {
        player.velocity = Vec2::ZERO;
        player.freeze_animation();
        return;
    }

    player.velocity = intent
        .as_vec2()
        .normalized_or_zero()
        .scaled(PLAYER_SPEED_UNITS_PER_SECOND);
    player.facing = facing_for_intent(intent);
    player.moving = true;
    player.animation_elapsed += fixed_dt_seconds;
}

/// Horizontal wins when moving diagonally.
fn facing_for_intent(intent: DirectionalIntent) -> Facing {
    match (intent.horizontal, intent.vertical) {
        (h, _) if h < 0 => Facing::Left,
        (h, _) if h > 0 => Facing::Right,
        (_, v) if v < 0 => Facing::Up,
        _ => Facing::Down,
    }
}

/// Moves the player by `velocity * dt`, one axis at a time. An axis step is
/// rejected when it would newly overlap a map collider or an NPC.
fn integrate_player_position(world: &mut SceneWorld, state: &WorldState, fixed_dt_seconds: f32) {
    let Some(player_id) = state.player_id else {
        return;
    };
    let mut blockers: Vec<Rect> = world
        .entities()
        .iter()
        .filter(|entity| entity.id != player_id)
        .map(|entity| entity.bounds())
        .collect();
    if let Some(map) = world.map() {
        blockers.extend_from_slice(map.collision_rects());
    }

    let Some(player) = world.find_entity_mut(player_id) else {
        return;
    };
    let delta = player.velocity.scaled(fixed_dt_seconds);
    if delta == Vec2::ZERO {
        return;
    }

    for step in [Vec2::new(delta.x, 0.0), Vec2::new(0.0, delta.y)] {
        if step == Vec2::ZERO {
            continue;
        }
        let current = player.bounds();
        let candidate = Rect::from_center(player.transform.position + step, player.footprint);
        if step_blocked(&current, &candidate, &blockers) {
            continue;
        }
        player.transform.position = player.transform.position + step;
    }
}

/// Colliders already overlapping the current bounds are ignored so an actor
/// spawned inside one can walk out.
fn step_blocked(current: &Rect, candidate: &Rect, blockers: &[Rect]) -> bool {
    blockers
        .iter()
        .any(|blocker| blocker.intersects(candidate) && !blocker.intersects(current))
}

fn resolve_proximity(world: &SceneWorld, state: &WorldState) -> ProximityReport {
    let Some(player_position) = state
        .player_id
        .and_then(|id| world.find_entity(id))
        .map(|player| player.transform.position)
    else {
        return ProximityReport::none();
    };

    let mut report = ProximityReport::none();
    for record in &state.npcs {
        let Some(npc) = world.find_entity(record.entity_id) else {
            continue;
        };
        let distance = player_position.distance_to(npc.transform.position);
        if distance < report.distance {
            report = ProximityReport {
                nearest: Some(record.entity_id),
                distance,
            };
        }
    }
    report
}

/// Facing for an NPC at `npc` looking at `player`.
fn facing_toward(npc: Vec2, player: Vec2) -> Facing {
    let dx = player.x - npc.x;
    let dy = player.y - npc.y;
    if dx.abs() > dy.abs() {
        if dx < 0.0 {
            Facing::Left
        } else {
            Facing::Right
        }
    } else if dy < 0.0 {
        Facing::Up
    } else {
        Facing::Down
    }
}

/// Runs one interact press against the current proximity report.
fn dispatch_interaction(
    world: &mut SceneWorld,
    state: &mut WorldState,
    dialogue: &mut dyn DialogueFlow,
    player_identity: &str,
) -> DispatchOutcome {
    let Some(npc_id) = state.proximity.in_range(INTERACTION_THRESHOLD_UNITS) else {
        info!(distance = state.proximity.distance, "interaction_no_npc_in_range");
        state.phase = InteractionPhase::Idle;
        return DispatchOutcome::NothingInRange;
    };
    let Some(record) = state.npc(npc_id).cloned() else {
        state.phase = InteractionPhase::Idle;
        return DispatchOutcome::NothingInRange;
    };

    let player_position = state
        .player_id
        .and_then(|id| world.find_entity(id))
        .map(|player| player.transform.position);
    if let Some(player_position) = player_position {
        if let Some(npc) = world.find_entity_mut(npc_id) {
            npc.facing = facing_toward(npc.transform.position, player_position);
            npc.freeze_animation();
            state.phase = InteractionPhase::FacingNpc;
        }
    }

    let npc_name = record.profile.npc_name.as_str();
    info!(
        npc = npc_name,
        kind = record.profile.kind.label(),
        distance = state.proximity.distance,
        "interaction_dispatched"
    );
    match &record.profile.kind {
        InteractionKind::Talk { dialogue: text } => {
            let text = text.as_deref().unwrap_or(DEFAULT_DIALOGUE);
            dialogue.show(npc_name, text, &mut state.gate);
            state.phase = InteractionPhase::Dialogue;
            DispatchOutcome::DialogueOpened
        }
        InteractionKind::Quest { teaches } => {
            state.phase = InteractionPhase::QuestLaunching;
            DispatchOutcome::LaunchQuest(LaunchContext {
                player_identity: player_identity.to_string(),
                initiator: npc_name.to_string(),
                skill: teaches.clone(),
            })
        }
        InteractionKind::Unknown(raw) => {
            warn!(npc = npc_name, interaction_type = %raw, "interaction_type_unknown");
            state.phase = InteractionPhase::Idle;
            DispatchOutcome::Ignored
        }
    }
}
