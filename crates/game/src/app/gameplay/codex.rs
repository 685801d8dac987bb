#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Algorithm {
    BinarySearch,
    BubbleSort,
    Dfs,
}

impl Algorithm {
    const ALL: [Algorithm; 3] = [Self::BinarySearch, Self::BubbleSort, Self::Dfs];

    fn display_name(self) -> &'static str {
        match self {
            Self::BinarySearch => "Binary Search",
            Self::BubbleSort => "Bubble Sort",
            Self::Dfs => "DFS",
        }
    }

    fn summary(self) -> &'static str {
        match self {
            Self::BinarySearch => {
                "Binary Search is an efficient algorithm for finding an item from a sorted list."
            }
            Self::BubbleSort => {
                "Bubble Sort is a simple sorting algorithm that repeatedly steps through the list."
            }
            Self::Dfs => {
                "Depth-First Search explores as far as possible along each branch before backtracking."
            }
        }
    }

    /// Matches display names case-insensitively, so map authors can write
    /// `dfs` or `binary search`.
    fn from_name(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.display_name().eq_ignore_ascii_case(trimmed))
    }
}

/// The progress collaborator the runtime reports learning to.
trait ProgressTracker {
    /// Returns true when the skill was newly learned.
    fn mark_learned(&mut self, skill_name: &str) -> bool;
    fn is_learned(&self, skill_name: &str) -> bool;
}

#[derive(Debug, Serialize)]
struct CodexSnapshot {
    learned: BTreeMap<&'static str, bool>,
}

/// In-memory record of learned algorithms.
#[derive(Debug, Default)]
struct Codex {
    learned: BTreeMap<Algorithm, bool>,
}

impl Codex {
    fn learned_count(&self) -> usize {
        self.learned.values().filter(|learned| **learned).count()
    }

    fn snapshot(&self) -> CodexSnapshot {
        CodexSnapshot {
            learned: Algorithm::ALL
                .into_iter()
                .map(|algorithm| {
                    let learned = self.learned.get(&algorithm).copied().unwrap_or(false);
                    (algorithm.display_name(), learned)
                })
                .collect(),
        }
    }

    fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }
}

impl ProgressTracker for Codex {
    fn mark_learned(&mut self, skill_name: &str) -> bool {
        let Some(algorithm) = Algorithm::from_name(skill_name) else {
            warn!(skill = skill_name, "codex_unknown_skill");
            return false;
        };
        let newly_learned = !self.learned.insert(algorithm, true).unwrap_or(false);
        match self.snapshot_json() {
            Ok(codex) => info!(
                skill = algorithm.display_name(),
                newly_learned,
                summary = algorithm.summary(),
                codex = %codex,
                "algorithm_learned"
            ),
            Err(error) => warn!(error = %error, "codex_snapshot_failed"),
        }
        newly_learned
    }

    fn is_learned(&self, skill_name: &str) -> bool {
        Algorithm::from_name(skill_name)
            .and_then(|algorithm| self.learned.get(&algorithm).copied())
            .unwrap_or(false)
    }
}
