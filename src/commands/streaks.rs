use dashmap::DashMap;
use rand::seq::SliceRandom;

use crate::common::{errors::Denial, types::UserId};

const INSULTS: &[&str] = &[
    "banana",
    "bafoon",
    "dingus",
    "horse",
    "fool",
    "crook",
    "fiend",
    "doofus",
    "goose",
    "oaf",
    "big stinky banana that evidently is the big banana and cannot type beep \
     boop bop on his/her keyboard like omg what's up with this guy lol xD",
];

/// How a denial is shown in chat: `"{reason}, you {insult}."`.
pub fn scold(denial: &Denial) -> String {
    let insult = INSULTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or("banana");
    format!("{}, you {}.", denial, insult)
}

/// Consecutive failed commands per author.
#[derive(Default)]
pub struct ErrorStreaks {
    counts: DashMap<UserId, u32>,
}

impl ErrorStreaks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a failure; returns extra commentary at certain streak lengths.
    pub fn record_failure(&self, user: UserId) -> Option<String> {
        let count = {
            let mut count = self.counts.entry(user).or_insert(0);
            *count += 1;
            *count
        };

        match count {
            3 => Some("That's the third command in a row you messed up.".to_string()),
            6 => Some("You really aren't good at this.".to_string()),
            n if n >= 9 && n % 3 == 0 => Some(format!(
                "Are you doing this on purpose, {}? What are you trying to gain, huh?",
                user.mention()
            )),
            _ => None,
        }
    }

    /// Resets the streak; announces the recovery of a serious offender.
    pub fn record_success(&self, user: UserId) -> Option<String> {
        let (_, count) = self.counts.remove(&user)?;
        (count >= 9).then(|| {
            format!(
                "Attention Server: {} FINALLY knows how to act like a normal human being!",
                user.mention()
            )
        })
    }

    pub fn streak(&self, user: UserId) -> u32 {
        self.counts.get(&user).map(|c| *c).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scold_keeps_the_reason() {
        let text = scold(&Denial::NotPlaying);
        assert!(text.starts_with("I'm not playing anything, you "));
        assert!(text.ends_with('.'));
    }

    #[test]
    fn commentary_at_milestones() {
        let streaks = ErrorStreaks::new();
        let user = UserId(9);
        let said: Vec<Option<String>> = (0..12).map(|_| streaks.record_failure(user)).collect();

        assert!(said[0].is_none() && said[1].is_none());
        assert_eq!(
            said[2].as_deref(),
            Some("That's the third command in a row you messed up.")
        );
        assert_eq!(said[5].as_deref(), Some("You really aren't good at this."));
        assert!(said[8].as_deref().is_some_and(|s| s.contains("<@9>")));
        assert!(said[9].is_none());
        assert!(said[11].is_some());
    }

    #[test]
    fn success_resets_and_only_celebrates_long_streaks() {
        let streaks = ErrorStreaks::new();
        let user = UserId(1);

        streaks.record_failure(user);
        assert!(streaks.record_success(user).is_none());
        assert_eq!(streaks.streak(user), 0);

        for _ in 0..9 {
            streaks.record_failure(user);
        }
        assert!(streaks.record_success(user).is_some());
        assert!(streaks.record_success(user).is_none());
    }
}
