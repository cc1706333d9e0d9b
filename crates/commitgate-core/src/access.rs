// ---------------------------------------------------------------------------
// AccessPolicy
// ---------------------------------------------------------------------------

/// The administrator set, loaded once by the caller and passed to the engine
/// at construction time. Membership is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admins: Vec<String>,
}

impl AccessPolicy {
    pub fn new<I, S>(admins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            admins: admins
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_admin(&self, author: &str) -> bool {
        let author = author.trim().to_lowercase();
        self.admins.iter().any(|a| *a == author)
    }

    pub fn is_empty(&self) -> bool {
        self.admins.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
