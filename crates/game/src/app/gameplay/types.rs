/// Resolved direction for one tick: each axis is -1, 0 or 1. Screen axes, so
/// `vertical == -1` is up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DirectionalIntent {
    horizontal: i8,
    vertical: i8,
}

impl DirectionalIntent {
    /// Left beats right and up beats down when both keys of an axis are held.
    fn from_snapshot(input: &InputSnapshot) -> Self {
        let horizontal = if input.is_down(InputAction::MoveLeft) {
            -1
        } else if input.is_down(InputAction::MoveRight) {
            1
        } else {
            0
        };
        let vertical = if input.is_down(InputAction::MoveUp) {
            -1
        } else if input.is_down(InputAction::MoveDown) {
            1
        } else {
            0
        };
        Self {
            horizontal,
            vertical,
        }
    }

    fn is_idle(self) -> bool {
        self.horizontal == 0 && self.vertical == 0
    }

    fn as_vec2(self) -> Vec2 {
        Vec2::new(f32::from(self.horizontal), f32::from(self.vertical))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LearnHotkey {
    BinarySearch,
    BubbleSort,
    Dfs,
}

impl LearnHotkey {
    fn algorithm(self) -> Algorithm {
        match self {
            Self::BinarySearch => Algorithm::BinarySearch,
            Self::BubbleSort => Algorithm::BubbleSort,
            Self::Dfs => Algorithm::Dfs,
        }
    }
}

/// Per-tick input, fresh every tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct InputState {
    intent: DirectionalIntent,
    interact_pressed: bool,
    learn_hotkey: Option<LearnHotkey>,
}

impl InputState {
    fn sample(input: &InputSnapshot) -> Self {
        let learn_hotkey = if input.was_pressed(InputAction::Hotkey1) {
            Some(LearnHotkey::BinarySearch)
        } else if input.was_pressed(InputAction::Hotkey2) {
            Some(LearnHotkey::BubbleSort)
        } else if input.was_pressed(InputAction::Hotkey3) {
            Some(LearnHotkey::Dfs)
        } else {
            None
        };
        Self {
            intent: DirectionalIntent::from_snapshot(input),
            interact_pressed: input.was_pressed(InputAction::Interact),
            learn_hotkey,
        }
    }
}

/// Global switch for player input response. Sub-flows that own focus turn it
/// off and hand it back when they close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MovementGate {
    enabled: bool,
}

impl Default for MovementGate {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl MovementGate {
    fn is_enabled(self) -> bool {
        self.enabled
    }

    fn enable(&mut self) {
        self.enabled = true;
    }

    fn disable(&mut self) {
        self.enabled = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum InteractionKind {
    Talk { dialogue: Option<String> },
    Quest { teaches: Option<String> },
    Unknown(String),
}

impl InteractionKind {
    /// Absent or blank type means talk.
    fn resolve(raw: Option<&str>, dialogue: Option<String>, teaches: Option<String>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some("talk") => Self::Talk { dialogue },
            Some("quest") => Self::Quest { teaches },
            Some(other) => Self::Unknown(other.to_string()),
        }
    }

    fn label(&self) -> &str {
        match self {
            Self::Talk { .. } => "talk",
            Self::Quest { .. } => "quest",
            Self::Unknown(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct NpcProfile {
    npc_name: String,
    kind: InteractionKind,
    sprite_key: String,
    initial_facing: Facing,
    /// Designer keys outside the allow-list. Kept for inspection only.
    custom_properties: PropertyMap,
}

#[derive(Debug, Clone, PartialEq)]
struct NpcRecord {
    entity_id: EntityId,
    profile: NpcProfile,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ProximityReport {
    nearest: Option<EntityId>,
    distance: f32,
}

impl Default for ProximityReport {
    fn default() -> Self {
        Self::none()
    }
}

impl ProximityReport {
    fn none() -> Self {
        Self {
            nearest: None,
            distance: f32::INFINITY,
        }
    }

    /// The nearest NPC, if it is strictly closer than `threshold`.
    fn in_range(&self, threshold: f32) -> Option<EntityId> {
        self.nearest.filter(|_| self.distance < threshold)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum InteractionPhase {
    #[default]
    Idle,
    FacingNpc,
    Dialogue,
    QuestLaunching,
}

impl fmt::Display for InteractionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::FacingNpc => "facing-npc",
            Self::Dialogue => "dialogue",
            Self::QuestLaunching => "quest",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DispatchOutcome {
    NothingInRange,
    DialogueOpened,
    LaunchQuest(LaunchContext),
    Ignored,
}

/// Everything the world scene owns between ticks, passed by reference into
/// each system.
#[derive(Debug, Default)]
struct WorldState {
    player_id: Option<EntityId>,
    gate: MovementGate,
    npcs: Vec<NpcRecord>,
    proximity: ProximityReport,
    phase: InteractionPhase,
}

impl WorldState {
    fn npc(&self, entity_id: EntityId) -> Option<&NpcRecord> {
        self.npcs.iter().find(|record| record.entity_id == entity_id)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameplaySystemId {
    InputIntent,
    Movement,
    Proximity,
    Interaction,
}

const GAMEPLAY_SYSTEM_ORDER: [GameplaySystemId; 4] = [
    GameplaySystemId::InputIntent,
    GameplaySystemId::Movement,
    GameplaySystemId::Proximity,
    GameplaySystemId::Interaction,
];
