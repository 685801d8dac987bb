/// The explorable map: player, NPCs and the interaction flow. Owns the codex
/// so learning survives quest round trips.
struct WorldScene {
    settings: GameSettings,
    document: MapDocument,
    sprite_catalog: SpriteCatalog,
    state: WorldState,
    dialogue: DialogueBox,
    codex: Codex,
    last_tick_order: Vec<GameplaySystemId>,
}

impl WorldScene {
    fn new(settings: GameSettings, document: MapDocument, sprite_catalog: SpriteCatalog) -> Self {
        Self {
            settings,
            document,
            sprite_catalog,
            state: WorldState::default(),
            dialogue: DialogueBox::default(),
            codex: Codex::default(),
            last_tick_order: Vec::with_capacity(GAMEPLAY_SYSTEM_ORDER.len()),
        }
    }

    fn apply_learn_hotkey(&mut self, hotkey: Option<LearnHotkey>) {
        let Some(hotkey) = hotkey else {
            return;
        };
        if !self.settings.debug_learn_keys {
            debug!(hotkey = ?hotkey, "learn_hotkey_disabled");
            return;
        }
        self.codex.mark_learned(hotkey.algorithm().display_name());
    }

    /// A press while a dialogue is open belongs to the dialogue. Returns true
    /// when the press was consumed.
    fn route_press_to_dialogue(&mut self, interact_pressed: bool) -> bool {
        if !interact_pressed || !self.dialogue.is_open() {
            return false;
        }
        self.dialogue.advance(&mut self.state.gate);
        if !self.dialogue.is_open() {
            self.state.phase = InteractionPhase::Idle;
        }
        true
    }

    fn sync_panel(&self, world: &mut SceneWorld) {
        match self.dialogue.panel() {
            Some(panel) => world.set_panel(panel),
            None => world.clear_panel(),
        }
    }
}

impl Scene for WorldScene {
    fn load(&mut self, world: &mut SceneWorld) {
        self.state.reset();
        self.dialogue = DialogueBox::default();
        self.last_tick_order.clear();

        let map = WorldMap::new(self.document.clone(), world.viewport());
        let npcs = spawn_npcs(world, &map, &self.sprite_catalog);
        let player_id = spawn_player(world, &map);
        world.set_map(map);

        self.state.npcs = npcs;
        self.state.player_id = Some(player_id);
        info!(
            scene = "world",
            npc_count = self.state.npcs.len(),
            entity_count = world.entity_count(),
            sys = GAMEPLAY_SYSTEM_ORDER_TEXT,
            "scene_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        self.last_tick_order.clear();
        let mut input_state = InputState::default();
        let mut command = SceneCommand::None;

        for system_id in GAMEPLAY_SYSTEM_ORDER {
            self.last_tick_order.push(system_id);
            match system_id {
                GameplaySystemId::InputIntent => {
                    input_state = InputState::sample(input);
                    self.apply_learn_hotkey(input_state.learn_hotkey);
                    if self.route_press_to_dialogue(input_state.interact_pressed) {
                        input_state.interact_pressed = false;
                    }
                }
                GameplaySystemId::Movement => {
                    movement_system(world, &self.state, input_state.intent, fixed_dt_seconds);
                    integrate_player_position(world, &self.state, fixed_dt_seconds);
                }
                GameplaySystemId::Proximity => {
                    self.state.proximity = resolve_proximity(world, &self.state);
                }
                GameplaySystemId::Interaction => {
                    if !input_state.interact_pressed {
                        continue;
                    }
                    let outcome = dispatch_interaction(
                        world,
                        &mut self.state,
                        &mut self.dialogue,
                        &self.settings.player_identity,
                    );
                    if let DispatchOutcome::LaunchQuest(context) = outcome {
                        command = SceneCommand::Launch {
                            scene: SceneKey::Quest,
                            context,
                        };
                    }
                }
            }
        }

        self.sync_panel(world);
        command
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.state.reset();
        self.dialogue = DialogueBox::default();
        info!(scene = "world", "scene_unloaded");
    }

    fn on_resume(&mut self, outcome: &SceneOutcome, _world: &mut SceneWorld) {
        if outcome.completed {
            for skill in &outcome.learned {
                self.codex.mark_learned(skill);
            }
        }
        self.state.gate.enable();
        self.state.phase = InteractionPhase::Idle;
        info!(
            completed = outcome.completed,
            learned = ?outcome.learned,
            codex_learned = self.codex.learned_count(),
            "world_resumed"
        );
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        Some(format!(
            "Algorealm | {} | {} | codex {}/{}",
            self.settings.player_identity,
            self.state.phase,
            self.codex.learned_count(),
            Algorithm::ALL.len()
        ))
    }
}

/// Placeholder quest: shows the trial and completes on the next interact
/// press, reporting the taught skill as learned.
#[derive(Debug, Default)]
struct QuestScene {
    context: Option<LaunchContext>,
}

impl QuestScene {
    fn panel_for(context: &LaunchContext) -> TextPanel {
        let algorithm = context.skill.as_deref().and_then(Algorithm::from_name);
        let title = match (algorithm, context.skill.as_deref()) {
            (Some(algorithm), _) => format!("Quest: {}", algorithm.display_name()),
            (None, Some(skill)) => format!("Quest: {skill}"),
            (None, None) => "Quest".to_string(),
        };
        let lesson = algorithm.map(Algorithm::summary).unwrap_or_default();
        let body = format!(
            "{} has a trial for {}. {} Press E to finish.",
            context.initiator, context.player_identity, lesson
        );
        TextPanel::new(title, body.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

impl Scene for QuestScene {
    fn load(&mut self, _world: &mut SceneWorld) {
        self.context = None;
    }

    fn update(
        &mut self,
        _fixed_dt_seconds: f32,
        input: &InputSnapshot,
        _world: &mut SceneWorld,
    ) -> SceneCommand {
        if !input.was_pressed(InputAction::Interact) {
            return SceneCommand::None;
        }
        let learned: Vec<String> = self
            .context
            .as_ref()
            .and_then(|context| context.skill.clone())
            .into_iter()
            .collect();
        info!(learned = ?learned, "quest_completed");
        SceneCommand::Finish(SceneOutcome {
            completed: true,
            learned,
        })
    }

    fn unload(&mut self, _world: &mut SceneWorld) {
        self.context = None;
    }

    fn on_launch(&mut self, context: &LaunchContext, world: &mut SceneWorld) {
        world.set_panel(Self::panel_for(context));
        self.context = Some(context.clone());
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        self.context
            .as_ref()
            .map(|context| format!("Algorealm | quest from {}", context.initiator))
    }
}
