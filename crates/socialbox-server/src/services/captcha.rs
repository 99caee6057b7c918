// ============================================
// File: crates/socialbox-server/src/services/captcha.rs
// ============================================
//! # Captcha Service
//!
//! One captcha per peer. Creating a new one replaces the answer and resets
//! it to unsolved. An answer is accepted once, strictly before five minutes
//! have passed since creation, and only if it matches exactly.
//!
//! Drawing the challenge is left to a [`CaptchaRenderer`]. The default
//! [`GlyphRenderer`] draws the answer as noisy block letters.
//!
//! Answers and re-creations for the same peer are serialized, so two
//! concurrent correct answers solve the captcha once.

use std::sync::Arc;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use socialbox_common::{Clock, PeerId, Timestamp};
use socialbox_core::protocol::CaptchaChallenge;

use crate::error::Result;
use crate::storage::{CaptchaRecord, CaptchaStatus, Storage};

/// Seconds a captcha can be answered after creation.
pub const CAPTCHA_LIFETIME_SECS: i64 = 300;

/// Length of a generated answer.
pub const CAPTCHA_ANSWER_LENGTH: usize = 6;

const CAPTCHA_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Turns an answer into challenge content.
pub trait CaptchaRenderer: Send + Sync {
    /// Renders `answer`.
    fn render(&self, answer: &str) -> String;
}

// ============================================
// GlyphRenderer
// ============================================

/// Rows of a glyph, top to bottom; bit 4 is the leftmost column.
type Glyph = [u8; GLYPH_HEIGHT];

const GLYPH_HEIGHT: usize = 5;
const GLYPH_WIDTH: usize = 5;

/// Characters drawn for set pixels.
const INK: &[u8] = b"#@%&";

/// Characters scattered over unset pixels.
const NOISE: &[u8] = b".:',`";

/// One in `NOISE_RATE` unset pixels gets a noise character.
const NOISE_RATE: u32 = 4;

/// Draws the answer as 5x5 block letters in randomly chosen ink over
/// background noise.
///
/// Each row is `GLYPH_WIDTH` columns per character with one column between
/// characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlyphRenderer;

impl CaptchaRenderer for GlyphRenderer {
    fn render(&self, answer: &str) -> String {
        let mut rng = rand::thread_rng();
        let glyphs: Vec<Glyph> = answer.bytes().map(glyph).collect();

        let mut rows = Vec::with_capacity(GLYPH_HEIGHT);
        for row in 0..GLYPH_HEIGHT {
            let mut line = String::new();
            for (i, g) in glyphs.iter().enumerate() {
                if i > 0 {
                    line.push(' ');
                }
                for col in 0..GLYPH_WIDTH {
                    let set = (g[row] >> (GLYPH_WIDTH - 1 - col)) & 1 == 1;
                    let c = if set {
                        INK.choose(&mut rng).copied().unwrap_or(b'#')
                    } else if rng.gen_ratio(1, NOISE_RATE) {
                        NOISE.choose(&mut rng).copied().unwrap_or(b'.')
                    } else {
                        b' '
                    };
                    line.push(char::from(c));
                }
            }
            rows.push(line);
        }
        rows.join("\n")
    }
}

/// Returns the block letter for an alphabet character; anything else is a
/// filled box.
const fn glyph(c: u8) -> Glyph {
    match c {
        b'A' => [0b01110, 0b10001, 0b11111, 0b10001, 0b10001],
        b'B' => [0b11110, 0b10001, 0b11110, 0b10001, 0b11110],
        b'C' => [0b01111, 0b10000, 0b10000, 0b10000, 0b01111],
        b'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b11110],
        b'E' => [0b11111, 0b10000, 0b11110, 0b10000, 0b11111],
        b'F' => [0b11111, 0b10000, 0b11110, 0b10000, 0b10000],
        b'G' => [0b01111, 0b10000, 0b10011, 0b10001, 0b01111],
        b'H' => [0b10001, 0b10001, 0b11111, 0b10001, 0b10001],
        b'I' => [0b11111, 0b00100, 0b00100, 0b00100, 0b11111],
        b'J' => [0b00111, 0b00010, 0b00010, 0b10010, 0b01100],
        b'K' => [0b10010, 0b10100, 0b11000, 0b10100, 0b10010],
        b'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        b'M' => [0b10001, 0b11011, 0b10101, 0b10001, 0b10001],
        b'N' => [0b10001, 0b11001, 0b10101, 0b10011, 0b10001],
        b'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b01110],
        b'P' => [0b11110, 0b10001, 0b11110, 0b10000, 0b10000],
        b'Q' => [0b01110, 0b10001, 0b10101, 0b10010, 0b01101],
        b'R' => [0b11110, 0b10001, 0b11110, 0b10100, 0b10010],
        b'S' => [0b01111, 0b10000, 0b01110, 0b00001, 0b11110],
        b'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100],
        b'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        b'V' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        b'W' => [0b10001, 0b10001, 0b10101, 0b11011, 0b10001],
        b'X' => [0b10001, 0b01010, 0b00100, 0b01010, 0b10001],
        b'Y' => [0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        b'Z' => [0b11111, 0b00010, 0b00100, 0b01000, 0b11111],
        b'0' => [0b01110, 0b10011, 0b10101, 0b11001, 0b01110],
        b'1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b01110],
        b'2' => [0b01110, 0b10001, 0b00110, 0b01000, 0b11111],
        b'3' => [0b11110, 0b00001, 0b00110, 0b00001, 0b11110],
        b'4' => [0b10010, 0b10010, 0b11111, 0b00010, 0b00010],
        b'5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b11110],
        b'6' => [0b01110, 0b10000, 0b11110, 0b10001, 0b01110],
        b'7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b00100],
        b'8' => [0b01110, 0b10001, 0b01110, 0b10001, 0b01110],
        b'9' => [0b01110, 0b10001, 0b01111, 0b00001, 0b01110],
        _ => [0b11111; GLYPH_HEIGHT],
    }
}

// ============================================
// CaptchaService
// ============================================

/// Result of answering a captcha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// Correct; the captcha is now solved.
    Solved,
    /// Wrong answer.
    Wrong,
    /// No captcha exists for the peer.
    Missing,
    /// Already solved.
    AlreadySolved,
    /// Older than the lifetime.
    Expired,
}

/// Captcha lifecycle on top of the persistence port.
pub struct CaptchaService {
    storage: Arc<dyn Storage>,
    renderer: Arc<dyn CaptchaRenderer>,
    clock: Arc<dyn Clock>,
    peer_locks: DashMap<PeerId, Arc<Mutex<()>>>,
}

impl CaptchaService {
    /// Creates a service with the [`GlyphRenderer`].
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            renderer: Arc::new(GlyphRenderer),
            clock,
            peer_locks: DashMap::new(),
        }
    }

    /// Replaces the renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn CaptchaRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Creates or replaces the captcha of `peer_id`.
    ///
    /// # Errors
    /// Returns `Storage` if the record cannot be saved.
    pub async fn create(&self, peer_id: PeerId) -> Result<CaptchaChallenge> {
        let lock = self.peer_lock(peer_id);
        let result = {
            let _guard = lock.lock().await;
            self.create_locked(peer_id).await
        };
        self.release(peer_id, lock);
        result
    }

    async fn create_locked(&self, peer_id: PeerId) -> Result<CaptchaChallenge> {
        let created = self.clock.now();
        let answer = generate_answer();
        let record = CaptchaRecord {
            peer_id,
            answer,
            status: CaptchaStatus::Unsolved,
            created,
            answered: None,
        };
        self.storage.save_captcha_record(&record).await?;
        debug!(peer_id = %peer_id, "Captcha created");

        Ok(CaptchaChallenge {
            expires: expires_at(created),
            content: self.renderer.render(&record.answer),
        })
    }

    /// Checks `answer` and marks the captcha solved if it matches.
    ///
    /// # Errors
    /// Returns `Storage` if the lookup or the update fails.
    pub async fn answer(&self, peer_id: PeerId, answer: &str) -> Result<AnswerOutcome> {
        let lock = self.peer_lock(peer_id);
        let result = {
            let _guard = lock.lock().await;
            self.answer_locked(peer_id, answer).await
        };
        self.release(peer_id, lock);
        result
    }

    async fn answer_locked(&self, peer_id: PeerId, answer: &str) -> Result<AnswerOutcome> {
        let Some(mut record) = self.storage.load_captcha_record(peer_id).await? else {
            warn!(peer_id = %peer_id, "No captcha to answer");
            return Ok(AnswerOutcome::Missing);
        };

        if record.status == CaptchaStatus::Solved {
            warn!(peer_id = %peer_id, "Captcha already solved");
            return Ok(AnswerOutcome::AlreadySolved);
        }

        let now = self.clock.now();
        if is_expired(&record, now) {
            warn!(peer_id = %peer_id, "Captcha expired");
            return Ok(AnswerOutcome::Expired);
        }

        let matches: bool = record.answer.as_bytes().ct_eq(answer.as_bytes()).into();
        if !matches {
            warn!(peer_id = %peer_id, "Captcha answer incorrect");
            return Ok(AnswerOutcome::Wrong);
        }

        record.status = CaptchaStatus::Solved;
        record.answered = Some(now);
        self.storage.save_captcha_record(&record).await?;
        debug!(peer_id = %peer_id, "Captcha solved");
        Ok(AnswerOutcome::Solved)
    }

    fn peer_lock(&self, peer_id: PeerId) -> Arc<Mutex<()>> {
        Arc::clone(self.peer_locks.entry(peer_id).or_default().value())
    }

    /// Drops the peer's lock entry once no other caller holds it.
    fn release(&self, peer_id: PeerId, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.peer_locks
            .remove_if(&peer_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl std::fmt::Debug for CaptchaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptchaService").finish_non_exhaustive()
    }
}

const fn expires_at(created: Timestamp) -> Timestamp {
    created.plus_secs(CAPTCHA_LIFETIME_SECS)
}

/// A captcha is dead from its expiry instant on.
fn is_expired(record: &CaptchaRecord, now: Timestamp) -> bool {
    now >= expires_at(record.created)
}

fn generate_answer() -> String {
    let mut rng = rand::thread_rng();
    (0..CAPTCHA_ANSWER_LENGTH)
        .map(|_| char::from(CAPTCHA_ALPHABET[rng.gen_range(0..CAPTCHA_ALPHABET.len())]))
        .collect()
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use socialbox_common::{ManualClock, SessionId};
    use socialbox_core::{FlagSet, PeerAddress};

    use crate::storage::{MemoryStorage, PeerRecord, SessionRecord, StorageResult};

    fn service() -> (CaptchaService, Arc<MemoryStorage>, Arc<ManualClock>) {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(10_000));
        let service = CaptchaService::new(storage.clone(), clock.clone());
        (service, storage, clock)
    }

    async fn stored_answer(storage: &MemoryStorage, peer: PeerId) -> String {
        storage.load_captcha_record(peer).await.unwrap().unwrap().answer
    }

    /// Maps rendered content back to pixels: ink is set, anything else unset.
    fn pixels(content: &str) -> Vec<Vec<bool>> {
        content
            .lines()
            .map(|line| line.bytes().map(|b| INK.contains(&b)).collect())
            .collect()
    }

    #[test]
    fn test_answer_alphabet() {
        for _ in 0..32 {
            let answer = generate_answer();
            assert_eq!(answer.len(), CAPTCHA_ANSWER_LENGTH);
            assert!(answer
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_glyph_renderer_draws_block_letters() {
        let content = GlyphRenderer.render("H1");
        assert!(!content.contains("H1"));

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), GLYPH_HEIGHT);
        assert!(lines.iter().all(|l| l.len() == 2 * GLYPH_WIDTH + 1));

        let expected = [
            "#...#...#..",
            "#...#..##..",
            "#####...#..",
            "#...#...#..",
            "#...#..###.",
        ];
        for (row, want) in pixels(&content).iter().zip(expected) {
            let want: Vec<bool> = want.bytes().map(|b| b == b'#').collect();
            assert_eq!(row, &want);
        }
    }

    #[test]
    fn test_every_alphabet_glyph_is_distinct() {
        let glyphs: Vec<Glyph> = CAPTCHA_ALPHABET.iter().map(|&c| glyph(c)).collect();
        for (i, a) in glyphs.iter().enumerate() {
            assert_ne!(a, &glyph(b'?'), "{} has no glyph", char::from(CAPTCHA_ALPHABET[i]));
            for b in &glyphs[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[tokio::test]
    async fn test_solves_exactly_once() {
        let (service, storage, _) = service();
        let peer = PeerId::generate();
        let challenge = service.create(peer).await.unwrap();
        assert_eq!(challenge.expires, Timestamp::from_secs(10_300));
        let answer = stored_answer(&storage, peer).await;
        assert!(!challenge.content.contains(&answer));

        assert_eq!(service.answer(peer, &answer).await.unwrap(), AnswerOutcome::Solved);
        assert_eq!(
            service.answer(peer, &answer).await.unwrap(),
            AnswerOutcome::AlreadySolved
        );
    }

    #[tokio::test]
    async fn test_wrong_and_case_sensitive() {
        let (service, storage, _) = service();
        let peer = PeerId::generate();
        service.create(peer).await.unwrap();
        let answer = stored_answer(&storage, peer).await;

        let lower = answer.to_lowercase();
        if lower != answer {
            assert_eq!(service.answer(peer, &lower).await.unwrap(), AnswerOutcome::Wrong);
        }
        assert_eq!(service.answer(peer, "").await.unwrap(), AnswerOutcome::Wrong);

        let record = storage.load_captcha_record(peer).await.unwrap().unwrap();
        assert_eq!(record.status, CaptchaStatus::Unsolved);
        assert!(record.answered.is_none());
    }

    #[tokio::test]
    async fn test_expiry() {
        let (service, storage, clock) = service();
        let peer = PeerId::generate();
        service.create(peer).await.unwrap();
        let answer = stored_answer(&storage, peer).await;

        clock.advance(CAPTCHA_LIFETIME_SECS - 1);
        assert_eq!(service.answer(peer, "wrong!").await.unwrap(), AnswerOutcome::Wrong);

        // the expiry instant itself is already too late
        clock.advance(1);
        assert_eq!(service.answer(peer, &answer).await.unwrap(), AnswerOutcome::Expired);

        let record = storage.load_captcha_record(peer).await.unwrap().unwrap();
        assert_eq!(record.status, CaptchaStatus::Unsolved);
    }

    #[tokio::test]
    async fn test_answer_just_before_expiry() {
        let (service, storage, clock) = service();
        let peer = PeerId::generate();
        service.create(peer).await.unwrap();
        let answer = stored_answer(&storage, peer).await;

        clock.advance(CAPTCHA_LIFETIME_SECS - 1);
        assert_eq!(service.answer(peer, &answer).await.unwrap(), AnswerOutcome::Solved);
    }

    #[tokio::test]
    async fn test_recreate_resets() {
        let (service, storage, clock) = service();
        let peer = PeerId::generate();
        service.create(peer).await.unwrap();
        let first = stored_answer(&storage, peer).await;
        service.answer(peer, &first).await.unwrap();

        clock.advance(10);
        service.create(peer).await.unwrap();
        let record = storage.load_captcha_record(peer).await.unwrap().unwrap();
        assert_eq!(record.status, CaptchaStatus::Unsolved);
        assert_eq!(record.created, Timestamp::from_secs(10_010));
        assert_eq!(
            service.answer(peer, &record.answer).await.unwrap(),
            AnswerOutcome::Solved
        );
    }

    #[tokio::test]
    async fn test_missing() {
        let (service, _, _) = service();
        let peer = PeerId::generate();
        assert_eq!(service.answer(peer, "ABC123").await.unwrap(), AnswerOutcome::Missing);
    }

    /// Memory storage whose captcha lookups take a while, so concurrent
    /// answers overlap between load and save.
    struct SlowCaptchaStorage {
        inner: MemoryStorage,
    }

    #[async_trait]
    impl Storage for SlowCaptchaStorage {
        async fn load_session(&self, id: SessionId) -> StorageResult<Option<SessionRecord>> {
            self.inner.load_session(id).await
        }

        async fn save_session(&self, record: &SessionRecord) -> StorageResult<()> {
            self.inner.save_session(record).await
        }

        async fn save_session_flags(&self, id: SessionId, flags: &FlagSet) -> StorageResult<()> {
            self.inner.save_session_flags(id, flags).await
        }

        async fn save_authenticated(&self, id: SessionId, authenticated: bool) -> StorageResult<()> {
            self.inner.save_authenticated(id, authenticated).await
        }

        async fn delete_session(&self, id: SessionId) -> StorageResult<()> {
            self.inner.delete_session(id).await
        }

        async fn load_peer_record(&self, address: &PeerAddress) -> StorageResult<Option<PeerRecord>> {
            self.inner.load_peer_record(address).await
        }

        async fn load_peer_by_id(&self, id: PeerId) -> StorageResult<Option<PeerRecord>> {
            self.inner.load_peer_by_id(id).await
        }

        async fn save_peer_record(&self, record: &PeerRecord) -> StorageResult<()> {
            self.inner.save_peer_record(record).await
        }

        async fn load_captcha_record(&self, peer_id: PeerId) -> StorageResult<Option<CaptchaRecord>> {
            let record = self.inner.load_captcha_record(peer_id).await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            record
        }

        async fn save_captcha_record(&self, record: &CaptchaRecord) -> StorageResult<()> {
            self.inner.save_captcha_record(record).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_answers_solve_once() {
        let storage = Arc::new(SlowCaptchaStorage {
            inner: MemoryStorage::new(),
        });
        let service = Arc::new(CaptchaService::new(
            storage.clone(),
            Arc::new(ManualClock::new(10_000)),
        ));
        let peer = PeerId::generate();
        service.create(peer).await.unwrap();
        let answer = stored_answer(&storage.inner, peer).await;

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                let answer = answer.clone();
                tokio::spawn(async move { service.answer(peer, &answer).await.unwrap() })
            })
            .collect();

        let mut outcomes = Vec::new();
        for task in tasks {
            outcomes.push(task.await.unwrap());
        }
        let solved = outcomes.iter().filter(|o| **o == AnswerOutcome::Solved).count();
        assert_eq!(solved, 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == AnswerOutcome::AlreadySolved)
                .count(),
            3
        );
        assert!(service.peer_locks.is_empty());
    }
}
