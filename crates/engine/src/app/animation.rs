pub const ANIMATION_FRAMES_PER_SECOND: f32 = 8.0;
const FRAMES_PER_ROW: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Facing {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Facing {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// Sheet row: walk-down, walk-left, walk-right, walk-up.
    const fn sheet_row(self) -> usize {
        match self {
            Self::Down => 0,
            Self::Left => 1,
            Self::Right => 2,
            Self::Up => 3,
        }
    }
}

pub fn animation_key_for(facing: Facing, moving: bool) -> &'static str {
    match (moving, facing) {
        (true, Facing::Up) => "walk-up",
        (true, Facing::Down) => "walk-down",
        (true, Facing::Left) => "walk-left",
        (true, Facing::Right) => "walk-right",
        (false, Facing::Up) => "idle-up",
        (false, Facing::Down) => "idle-down",
        (false, Facing::Left) => "idle-left",
        (false, Facing::Right) => "idle-right",
    }
}

/// Idle uses the first frame of the facing row; walking cycles the row.
pub fn sheet_frame_index(facing: Facing, moving: bool, elapsed_seconds: f32) -> usize {
    let row_start = facing.sheet_row() * FRAMES_PER_ROW;
    if !moving || !elapsed_seconds.is_finite() || elapsed_seconds <= 0.0 {
        return row_start;
    }
    let step = (elapsed_seconds * ANIMATION_FRAMES_PER_SECOND).floor() as usize;
    row_start + step % FRAMES_PER_ROW
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn animation_key_tracks_facing_and_motion() {
        assert_eq!(animation_key_for(Facing::Left, true), "walk-left");
        assert_eq!(animation_key_for(Facing::Left, false), "idle-left");
        assert_eq!(animation_key_for(Facing::default(), false), "idle-down");
    }

    #[test]
    fn idle_frames_match_row_starts() {
        assert_eq!(sheet_frame_index(Facing::Down, false, 3.0), 0);
        assert_eq!(sheet_frame_index(Facing::Left, false, 3.0), 4);
        assert_eq!(sheet_frame_index(Facing::Right, false, 3.0), 8);
        assert_eq!(sheet_frame_index(Facing::Up, false, 3.0), 12);
    }

    #[test]
    fn walk_cycle_wraps_within_row() {
        assert_eq!(sheet_frame_index(Facing::Right, true, 0.0), 8);
        assert_eq!(sheet_frame_index(Facing::Right, true, 0.13), 9);
        assert_eq!(sheet_frame_index(Facing::Right, true, 0.38), 11);
        assert_eq!(sheet_frame_index(Facing::Right, true, 0.5), 8);
    }

    #[test]
    fn parse_round_trips_names() {
        for facing in [Facing::Up, Facing::Down, Facing::Left, Facing::Right] {
            assert_eq!(Facing::parse(facing.as_str()), Some(facing));
        }
        assert_eq!(Facing::parse("north"), None);
    }
}
