use credcache_clock::{Clock, DurationSecs, System, UnixTime};

use crate::{AccessToken, AccessTokenRef, TokenType, TokenTypeRef};

/// An immutable record of the cached token and the window in which it is valid
///
/// A snapshot is either _present_, holding a non-empty access token and token type,
/// or _absent_, holding neither. Snapshots are never modified once built; a refresh
/// produces a new snapshot that replaces the old one wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSnapshot {
    access_token: AccessToken,
    token_type: TokenType,
    issued: UnixTime,
    lifetime: DurationSecs,
}

impl Default for TokenSnapshot {
    fn default() -> Self {
        Self::absent()
    }
}

impl TokenSnapshot {
    /// The absent snapshot, used before the first token arrives and after invalidation
    pub fn absent() -> Self {
        Self {
            access_token: AccessToken::from_static(""),
            token_type: TokenType::from_static(""),
            issued: UnixTime(0),
            lifetime: DurationSecs(0),
        }
    }

    /// Constructs a snapshot for a token issued at `issued` that remains valid for `lifetime`
    ///
    /// If either the access token or the token type is empty, the result is the
    /// absent snapshot.
    pub fn new(
        access_token: AccessToken,
        token_type: TokenType,
        issued: UnixTime,
        lifetime: DurationSecs,
    ) -> Self {
        if access_token.as_str().is_empty() || token_type.as_str().is_empty() {
            return Self::absent();
        }

        Self {
            access_token,
            token_type,
            issued,
            lifetime,
        }
    }

    /// Constructs a snapshot using the current time of `clock` as the issue time
    pub fn issued_now<C: Clock>(
        access_token: AccessToken,
        token_type: TokenType,
        lifetime: DurationSecs,
        clock: &C,
    ) -> Self {
        Self::new(access_token, token_type, clock.now(), lifetime)
    }

    /// Gets the access token, which is empty if the snapshot is absent
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the token type, which is empty if the snapshot is absent
    #[inline]
    pub fn token_type(&self) -> &TokenTypeRef {
        &self.token_type
    }

    /// Gets the time that the token was issued
    #[inline]
    pub fn issued(&self) -> UnixTime {
        self.issued
    }

    /// Gets the number of seconds the token is valid for after issue
    #[inline]
    pub fn lifetime(&self) -> DurationSecs {
        self.lifetime
    }

    /// Gets the last instant at which the token is still valid
    #[inline]
    pub fn expiry(&self) -> UnixTime {
        self.issued + self.lifetime
    }

    /// Whether the snapshot holds a token at all
    #[inline]
    pub fn is_present(&self) -> bool {
        !self.access_token.as_str().is_empty() && !self.token_type.as_str().is_empty()
    }

    /// Whether the snapshot holds a token that is still valid at `now`
    ///
    /// A token stays valid through the final second of its lifetime. A `now`
    /// earlier than the issue time counts as no time having elapsed.
    #[inline]
    pub fn is_valid_at(&self, now: UnixTime) -> bool {
        self.is_present() && now.saturating_since(self.issued) <= self.lifetime
    }

    /// Whether the snapshot is valid according to the provided clock
    #[inline]
    pub fn is_valid_with_clock<C: Clock>(&self, clock: &C) -> bool {
        self.is_valid_at(clock.now())
    }

    /// Whether the snapshot is valid according to the system clock
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.is_valid_with_clock(&System)
    }

    /// Gets a duration for how much longer the token would be valid as of the
    /// provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        if self.is_present() {
            self.expiry() - time
        } else {
            DurationSecs(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(token: &'static str, token_type: &'static str, lifetime: u64) -> TokenSnapshot {
        TokenSnapshot::new(
            AccessToken::from_static(token),
            TokenType::from_static(token_type),
            UnixTime(1_000),
            DurationSecs(lifetime),
        )
    }

    #[test]
    fn absent_is_never_valid() {
        let absent = TokenSnapshot::absent();
        assert!(!absent.is_present());
        assert!(!absent.is_valid_at(UnixTime(0)));
        assert_eq!(absent, TokenSnapshot::default());
    }

    #[test]
    fn valid_through_the_final_second() {
        let s = snapshot("abc", "bearer", 3600);

        assert!(s.is_valid_at(UnixTime(1_000)));
        assert!(s.is_valid_at(UnixTime(4_600)));
        assert!(!s.is_valid_at(UnixTime(4_601)));
        assert_eq!(s.expiry(), UnixTime(4_600));
    }

    #[test]
    fn clock_behind_issue_time_is_valid() {
        let s = snapshot("abc", "bearer", 10);
        assert!(s.is_valid_at(UnixTime(900)));
    }

    #[test]
    fn zero_lifetime_is_valid_only_at_issue() {
        let s = snapshot("abc", "bearer", 0);
        assert!(s.is_valid_at(UnixTime(1_000)));
        assert!(!s.is_valid_at(UnixTime(1_001)));
    }

    #[test]
    fn partial_tokens_collapse_to_absent() {
        assert_eq!(snapshot("", "bearer", 60), TokenSnapshot::absent());
        assert_eq!(snapshot("abc", "", 60), TokenSnapshot::absent());
    }

    #[test]
    fn validity_matches_definition() {
        let cases = [("abc", "bearer"), ("", "bearer"), ("abc", ""), ("", "")];
        for (token, token_type) in cases {
            for lifetime in [0, 1, 59, 60, 61] {
                let s = snapshot(token, token_type, lifetime);
                for elapsed in [0, 1, 60, 61, 120] {
                    let now = UnixTime(1_000 + elapsed);
                    let expected = !token.is_empty() && !token_type.is_empty() && elapsed <= lifetime;
                    assert_eq!(s.is_valid_at(now), expected, "{token:?} {token_type:?} {lifetime} {elapsed}");
                }
            }
        }
    }

    #[test]
    fn until_expired_counts_down() {
        let s = snapshot("abc", "bearer", 60);
        assert_eq!(s.until_expired_at(UnixTime(1_010)), DurationSecs(50));
        assert_eq!(s.until_expired_at(UnixTime(2_000)), DurationSecs(0));
        assert_eq!(
            TokenSnapshot::absent().until_expired_at(UnixTime(0)),
            DurationSecs(0)
        );
    }

    #[test]
    fn issued_now_uses_clock() {
        let clock = credcache_clock::TestClock::new(UnixTime(42));
        let s = TokenSnapshot::issued_now(
            AccessToken::from_static("abc"),
            TokenType::from_static("bearer"),
            DurationSecs(5),
            &clock,
        );
        assert_eq!(s.issued(), UnixTime(42));
        assert!(s.is_valid_with_clock(&clock));
    }
}
